use clap::Parser;
use scia_feed::cli::{init_tracing, DbArgs};
use scia_feed::config::Config;
use scia_feed::db::WritePolicy;
use scia_feed::process::process_dma;

#[derive(Parser)]
#[command(name = "process_dma")]
#[command(about = "Aggregate the daily records by decade, month and year", long_about = None)]
struct Cli {
    #[command(flatten)]
    db: DbArgs,

    /// Schema of the daily records
    #[arg(long, default_value = "dailypdbanpaclima")]
    start_schema: String,

    /// Schema receiving the aggregations
    #[arg(long, default_value = "dmapdbanpaclima")]
    target_schema: String,

    /// Overwrite existing records or keep them
    #[arg(long, value_enum, default_value_t = WritePolicy::Upsert)]
    policy: WritePolicy,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env();
    let repos = cli.db.connect(&config).await?;
    process_dma(&repos.daily, &cli.start_schema, &cli.target_schema, cli.policy).await?;
    Ok(())
}
