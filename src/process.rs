//! Operations combining parsing, checks, computations and the database: what the entry
//! points run.
pub mod chain;
pub mod daily;
pub mod dma;
pub mod report;
pub mod secondary;
pub mod stations;

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::db::DbError;
use crate::export::ExportError;
use crate::formats::FormatError;
use crate::parameters::ParameterError;

pub use chain::{check_chain, ChainOptions};
pub use daily::{compute_daily_indicators, insert_daily_indicators, load_unique_data};
pub use dma::process_dma;
pub use report::{make_report, make_reports, Report, ReportOptions};
pub use secondary::compute_daily_indicators2;
pub use stations::{find_new_stations, upsert_stations};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Parameters(#[from] ParameterError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Regular files of a folder sorted by name, optionally only the ones with the given
/// extension
pub fn folder_files(folder: &Path, extension: Option<&str>) -> Result<Vec<PathBuf>, ProcessError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = extension.map_or(true, |wanted| {
            path.extension()
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(wanted))
        });
        if matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Progress bar over the items of a batch operation
pub fn progress_bar(len: usize) -> indicatif::ProgressBar {
    let pb = indicatif::ProgressBar::new(len as u64);
    if let Ok(style) = indicatif::ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("##-"));
    }
    pb
}
