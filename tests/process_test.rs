use scia_feed::export::{csv2data, read_indicators};
use scia_feed::models::FieldValue;
use scia_feed::process::{compute_daily_indicators, make_report, make_reports, ReportOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const TRENTINO_TMIN: &str = "Time,T0001\n\
and,Air Temp Min\n\
Station,Name,Info,T0001 - Pergine Valsugana (Convento) Lat:46.06227631 Long:11.23670156 Elev:475.00\n\
,,Qual\n\
\"09:00:00 01/05/1930\",10.0,1\n\
\"09:00:00 02/05/1930\",8.5,1\n\
\"09:00:00 03/05/1930\",1A,1\n\
\"09:00:00 04/05/1930\",6.0,1\n";

/// A folder named after the network of its files
fn network_folder(root: &TempDir) -> PathBuf {
    let folder = root.path().join("3_trentino");
    fs::create_dir_all(&folder).unwrap();
    folder
}

fn write(folder: &Path, name: &str, content: &str) -> PathBuf {
    let path = folder.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_make_report_with_errors_and_data() {
    let root = TempDir::new().unwrap();
    let input = write(&network_folder(&root), "T0001.csv", TRENTINO_TMIN);
    let report_path = root.path().join("report.txt");
    let outdata = root.path().join("out.csv");

    let report = make_report(
        &input,
        Some(&report_path),
        Some(&outdata),
        &ReportOptions::default(),
    )
    .unwrap();

    let start = format!("START OF ANALYSIS OF TRENTINO FILE '{}'", input.display());
    let end = "END OF ANALYSIS OF TRENTINO FILE".to_string();
    let expected = vec![
        start.clone(),
        "=".repeat(start.len()),
        String::new(),
        "Row 7: the value for Tmin is not numeric".to_string(),
        String::new(),
        format!("Data saved on file '{}'", outdata.display()),
        String::new(),
        end.clone(),
        "=".repeat(end.len()),
        String::new(),
    ];
    assert_eq!(report.lines, expected);
    assert_eq!(report.measures.as_ref().map(Vec::len), Some(3));

    let written = fs::read_to_string(&report_path).unwrap();
    assert_eq!(written, expected.join("\n") + "\n");

    let measures = csv2data(&outdata).unwrap();
    assert_eq!(measures.len(), 3);
    assert_eq!(measures[0].meta.station_key(), ("0001".to_string(), "3".to_string()));
    assert_eq!(measures[0].par_code, "Tmin");
    assert_eq!(measures[1].value, Some(8.5));
}

#[test]
fn test_make_report_without_errors() {
    let root = TempDir::new().unwrap();
    let content: String = TRENTINO_TMIN
        .lines()
        .filter(|l| !l.contains("1A"))
        .map(|l| format!("{}\n", l))
        .collect();
    let input = write(&network_folder(&root), "T0001.csv", &content);

    let report = make_report(&input, None, None, &ReportOptions::default()).unwrap();

    assert_eq!(report.lines[3], "No errors found");
    assert_eq!(report.lines[4], "");
    assert_eq!(report.lines[5], "END OF ANALYSIS OF TRENTINO FILE");
}

#[test]
fn test_make_report_unknown_format_is_appended() {
    let root = TempDir::new().unwrap();
    let input = write(root.path(), "notes.txt", "nothing to see here\n");
    let report_path = write(root.path(), "report.txt", "previous\n");

    let report = make_report(&input, Some(&report_path), None, &ReportOptions::default()).unwrap();

    let line = format!("file '{}' has unknown format", input.display());
    assert_eq!(report.lines, vec![line.clone(), String::new()]);
    assert!(report.measures.is_none());
    assert_eq!(fs::read_to_string(&report_path).unwrap(), format!("previous\n{}\n\n", line));
}

#[test]
fn test_make_reports_saves_data_per_file() {
    let root = TempDir::new().unwrap();
    let folder = network_folder(&root);
    write(&folder, "T0001.csv", TRENTINO_TMIN);
    write(&folder, "readme.txt", "not data\n");
    let outdata = root.path().join("outdata");

    let reports = make_reports(&folder, None, Some(&outdata), &ReportOptions::default()).unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports.iter().filter(|r| r.measures.is_some()).count(), 1);
    assert!(outdata.join("T0001.csv").is_file());
    assert!(!outdata.join("readme.csv").exists());
}

#[test]
fn test_compute_daily_indicators_from_exported_data() {
    let root = TempDir::new().unwrap();
    let input = write(&network_folder(&root), "T0001.csv", TRENTINO_TMIN);
    let data_folder = root.path().join("data");
    fs::create_dir_all(&data_folder).unwrap();
    make_report(
        &input,
        None,
        Some(&data_folder.join("T0001.csv")),
        &ReportOptions::default(),
    )
    .unwrap();
    let indicators = root.path().join("indicators");

    let written = compute_daily_indicators(&data_folder, &indicators).unwrap();

    assert_eq!(written, vec![indicators.join("ds__t200.csv")]);
    let items = read_indicators(&written[0]).unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].table, "ds__t200");
    assert_eq!(items[0].station, ("0001".to_string(), "3".to_string()));
    assert_eq!(items[0].get("tmngg.val_md").and_then(FieldValue::as_f64), Some(10.0));
    assert_eq!(items[0].get("tmngg.flag.wht"), Some(&FieldValue::Int(1)));
}
