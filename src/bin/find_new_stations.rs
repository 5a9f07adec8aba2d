use clap::Parser;
use scia_feed::cli::{init_tracing, DbArgs};
use scia_feed::config::Config;
use scia_feed::process::find_new_stations;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "find_new_stations")]
#[command(about = "List the stations of a data folder missing from the stations registry", long_about = None)]
struct Cli {
    #[command(flatten)]
    db: DbArgs,

    /// Folder of station files or exported data
    data_folder: PathBuf,

    /// CSV where the new stations are written
    stations_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env();
    let repos = cli.db.connect(&config).await?;
    find_new_stations(
        &repos.stations,
        &cli.data_folder,
        &cli.stations_path,
        config.parallel,
    )
    .await?;
    Ok(())
}
