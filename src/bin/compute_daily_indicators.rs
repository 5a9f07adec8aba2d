use clap::Parser;
use scia_feed::cli::init_tracing;
use scia_feed::process::compute_daily_indicators;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "compute_daily_indicators")]
#[command(about = "Compute the daily indicators of the data exported by make_reports", long_about = None)]
struct Cli {
    /// Folder of the exported data (CSV)
    data_folder: PathBuf,

    /// Folder where one CSV per daily table is written
    indicators_folder: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();
    let written = compute_daily_indicators(&cli.data_folder, &cli.indicators_folder)?;
    for path in written {
        info!("Written {}", path.display());
    }
    Ok(())
}
