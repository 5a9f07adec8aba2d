use clap::Parser;
use scia_feed::checks::FileChecks;
use scia_feed::cli::init_tracing;
use scia_feed::process::{make_reports, ReportOptions};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "make_reports")]
#[command(about = "Parse and check every station file of a folder", long_about = None)]
struct Cli {
    /// Folder of the station files
    input: PathBuf,

    /// Append the reports to this file instead of printing them
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Folder where the data of each file is saved as CSV
    #[arg(short = 'd', long)]
    outdata: Option<PathBuf>,

    /// Check values against the thresholds of the parameters
    #[arg(long)]
    weak_climatologic_check: bool,

    /// Check values against their limiting parameters
    #[arg(long)]
    internal_consistency_check: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();
    let options = ReportOptions {
        checks: FileChecks {
            weak_climatologic: cli.weak_climatologic_check,
            internal_consistency: cli.internal_consistency_check,
        },
        ..ReportOptions::default()
    };
    let reports = make_reports(
        &cli.input,
        cli.report.as_deref(),
        cli.outdata.as_deref(),
        &options,
    )?;
    if cli.report.is_none() {
        for line in reports.iter().flat_map(|r| r.lines.iter()) {
            println!("{}", line);
        }
    }
    let unknown = reports.iter().filter(|r| r.measures.is_none()).count();
    info!("{} files analysed, {} of unknown format", reports.len(), unknown);
    Ok(())
}
