use clap::Parser;
use scia_feed::cli::{init_tracing, DbArgs};
use scia_feed::config::Config;
use scia_feed::process::upsert_stations;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "upsert_stations")]
#[command(about = "Register the stations of a stations CSV", long_about = None)]
struct Cli {
    #[command(flatten)]
    db: DbArgs,

    /// CSV of the stations (as written by find_new_stations)
    stations_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env();
    let repos = cli.db.connect(&config).await?;
    upsert_stations(&repos.stations, &cli.stations_path).await?;
    Ok(())
}
