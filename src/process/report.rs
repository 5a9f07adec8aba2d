//! Reports on the analysis of station files.
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use crate::checks::{check_file, FileChecks};
use crate::export::export2csv;
use crate::formats::guess_format;
use crate::models::{quoted, Measure};
use crate::parameters::LimitingParameters;
use crate::process::{folder_files, progress_bar, ProcessError};

/// How files are analysed
#[derive(Debug, Clone, Default)]
pub struct ReportOptions<'a> {
    pub checks: FileChecks,
    /// Parameter table overriding the one of the format
    pub parameters: Option<&'a Path>,
    /// Limiting parameters overriding the ones of the format
    pub limiting: Option<&'a LimitingParameters>,
}

/// Lines of the report of a file and the measures parsed, if the format was recognised
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub lines: Vec<String>,
    pub measures: Option<Vec<Measure>>,
}

fn underline(line: &str) -> String {
    "=".repeat(line.chars().count())
}

fn append_lines(path: &Path, lines: &[String]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    Ok(())
}

/// Parse and check a file, appending the report to `report_path` and saving the measures
/// into `outdata_path` when given
pub fn make_report(
    path: &Path,
    report_path: Option<&Path>,
    outdata_path: Option<&Path>,
    options: &ReportOptions,
) -> Result<Report, ProcessError> {
    let shown = quoted(&path.display().to_string());
    let Some(format) = guess_format(path) else {
        warn!("file {} has unknown format", shown);
        let report = Report {
            lines: vec![format!("file {} has unknown format", shown), String::new()],
            measures: None,
        };
        if let Some(report_path) = report_path {
            append_lines(report_path, &report.lines)?;
        }
        return Ok(report);
    };

    let mut lines = Vec::new();
    let start = format!("START OF ANALYSIS OF {} FILE {}", format.label(), shown);
    lines.push(underline(&start));
    lines.insert(0, start);
    lines.push(String::new());

    let params = format.load_parameters(options.parameters)?;
    let outcome = check_file(&*format, path, &params, options.limiting, options.checks)?;
    if outcome.errors.is_empty() {
        lines.push("No errors found".to_string());
    } else {
        lines.extend(outcome.errors.iter().map(ToString::to_string));
    }

    if let Some(outdata_path) = outdata_path {
        lines.push(String::new());
        export2csv(&outcome.measures, outdata_path, &HashSet::new(), false)?;
        lines.push(format!(
            "Data saved on file {}",
            quoted(&outdata_path.display().to_string())
        ));
    }

    lines.push(String::new());
    let end = format!("END OF ANALYSIS OF {} FILE", format.label());
    lines.push(underline(&end));
    lines.insert(lines.len() - 1, end);
    lines.push(String::new());

    if let Some(report_path) = report_path {
        append_lines(report_path, &lines)?;
    }
    info!(
        path = %path.display(),
        format = format.label(),
        errors = outcome.errors.len(),
        measures = outcome.measures.len(),
        "report done"
    );
    Ok(Report {
        lines,
        measures: Some(outcome.measures),
    })
}

/// [`make_report`] on every file of a folder, the data of `<file>` being saved as
/// `<outdata_folder>/<file stem>.csv`
pub fn make_reports(
    folder: &Path,
    report_path: Option<&Path>,
    outdata_folder: Option<&Path>,
    options: &ReportOptions,
) -> Result<Vec<Report>, ProcessError> {
    if let Some(outdata_folder) = outdata_folder {
        std::fs::create_dir_all(outdata_folder)?;
    }
    let files = folder_files(folder, None)?;
    let pb = progress_bar(files.len());
    let mut reports = Vec::with_capacity(files.len());
    for path in files {
        pb.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
        );
        let outdata_path = outdata_folder.zip(path.file_stem()).map(|(folder, stem)| {
            folder.join(format!("{}.csv", stem.to_string_lossy()))
        });
        reports.push(make_report(&path, report_path, outdata_path.as_deref(), options)?);
        pb.inc(1);
    }
    pb.finish_with_message("done");
    info!("Analysed {} files of {}", reports.len(), folder.display());
    Ok(reports)
}
