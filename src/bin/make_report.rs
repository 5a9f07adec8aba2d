use clap::Parser;
use scia_feed::checks::FileChecks;
use scia_feed::cli::init_tracing;
use scia_feed::process::{make_report, ReportOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "make_report")]
#[command(about = "Parse and check a station file, reporting the errors found", long_about = None)]
struct Cli {
    /// Station file to analyse
    input: PathBuf,

    /// Append the report to this file instead of printing it
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Save the data parsed into this CSV
    #[arg(short = 'd', long)]
    outdata: Option<PathBuf>,

    /// Custom parameter table
    #[arg(short, long)]
    parameters: Option<PathBuf>,

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
        parameters: cli.parameters.as_deref(),
        limiting: None,
    };
    let report = make_report(&cli.input, cli.report.as_deref(), cli.outdata.as_deref(), &options)?;
    if cli.report.is_none() {
        for line in &report.lines {
            println!("{}", line);
        }
    }
    Ok(())
}
