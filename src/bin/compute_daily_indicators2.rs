use clap::Parser;
use scia_feed::cli::{init_tracing, DbArgs};
use scia_feed::config::Config;
use scia_feed::process::compute_daily_indicators2;

#[derive(Parser)]
#[command(name = "compute_daily_indicators2")]
#[command(about = "Compute degree days, evapotranspiration and water balance in a schema", long_about = None)]
struct Cli {
    #[command(flatten)]
    db: DbArgs,

    /// Schema of the daily records (default: SCIA_SCHEMA)
    #[arg(long)]
    schema: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env();
    let repos = cli.db.connect(&config).await?;
    let schema = cli.schema.unwrap_or_else(|| config.schema.clone());
    compute_daily_indicators2(&repos.daily, &repos.stations, &schema).await?;
    Ok(())
}
