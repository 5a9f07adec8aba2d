use clap::Parser;
use scia_feed::cli::{init_tracing, DbArgs};
use scia_feed::config::Config;
use scia_feed::db::WritePolicy;
use scia_feed::process::insert_daily_indicators;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "insert_daily_indicators")]
#[command(about = "Insert the daily indicator CSVs of a folder into the database", long_about = None)]
struct Cli {
    #[command(flatten)]
    db: DbArgs,

    /// Folder of the indicator CSVs (ds__<table>.csv)
    indicators_folder: PathBuf,

    /// Target schema (default: SCIA_SCHEMA)
    #[arg(long)]
    schema: Option<String>,

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
    let schema = cli.schema.unwrap_or_else(|| config.schema.clone());
    insert_daily_indicators(
        &repos.daily,
        &repos.stations,
        &cli.indicators_folder,
        &schema,
        cli.policy,
        config.parallel,
    )
    .await?;
    Ok(())
}
