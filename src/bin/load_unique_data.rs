use clap::Parser;
use scia_feed::cli::{init_tracing, DbArgs};
use scia_feed::config::Config;
use scia_feed::process::load_unique_data;

#[derive(Parser)]
#[command(name = "load_unique_data")]
#[command(about = "Copy the daily records missing from a schema out of another one", long_about = None)]
struct Cli {
    #[command(flatten)]
    db: DbArgs,

    /// Schema the records are copied from (default: SCIA_SCHEMA)
    #[arg(long)]
    start_schema: Option<String>,

    /// Schema receiving the records (default: SCIA_FLAGSYNC_SCHEMA)
    #[arg(long)]
    target_schema: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env();
    let repos = cli.db.connect(&config).await?;
    let start = cli.start_schema.unwrap_or_else(|| config.schema.clone());
    let target = cli.target_schema.unwrap_or_else(|| config.flagsync_schema.clone());
    load_unique_data(&repos.daily, &start, &target).await?;
    Ok(())
}
