//! CSV files exchanged between the steps: parsed data, daily indicators and new stations.
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::models::{
    FieldValue, Measure, Metadata, ObservedAt, Station, StationCode, TableItem, COD_AGGR_DAY,
};
use crate::utils::{parse_decimal, read_text_lossy, split_csv_line};

pub const DATA_HEADER: &str = "cod_utente;cod_rete;date;time;parameter;value;valid;source;format";
pub const INDICATORS_HEADER: &str = "cod_utente;cod_rete;data_i;field;value";
pub const STATIONS_HEADER: &str = "cod_utente;cod_rete;nome;lat;lon;quota;source";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{path}, row {row}: {message}")]
    Malformed {
        path: String,
        row: usize,
        message: String,
    },
}

fn malformed(path: &Path, row: usize, message: impl Into<String>) -> ExportError {
    ExportError::Malformed {
        path: path.display().to_string(),
        row,
        message: message.into(),
    }
}

/// Rows of a `;` CSV after its expected header, with their 1-based line numbers
fn csv_rows(path: &Path, header: &str) -> Result<Vec<(usize, Vec<String>)>, ExportError> {
    let text = read_text_lossy(path)?;
    let mut lines = text.lines().enumerate();
    match lines.next() {
        Some((_, first)) if first.trim_start_matches('\u{feff}').trim() == header => {}
        _ => return Err(malformed(path, 1, format!("expected header '{}'", header))),
    }
    let columns = header.split(';').count();
    lines
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let fields = split_csv_line(line, ';');
            if fields.len() != columns {
                return Err(malformed(path, i + 1, "wrong number of columns"));
            }
            Ok((i + 1, fields))
        })
        .collect()
}

fn optional(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn number_text(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write measures to a CSV sorted by time, skipping parameters in `omit_parameters` and,
/// with `omit_missing`, measures without value
pub fn export2csv(
    measures: &[Measure],
    path: impl AsRef<Path>,
    omit_parameters: &HashSet<String>,
    omit_missing: bool,
) -> Result<usize, ExportError> {
    let mut rows: Vec<&Measure> = measures
        .iter()
        .filter(|m| !omit_parameters.contains(&m.par_code))
        .filter(|m| !omit_missing || m.value.is_some())
        .collect();
    rows.sort_by_key(|m| m.at);

    let mut out = BufWriter::new(File::create(path.as_ref())?);
    writeln!(out, "{}", DATA_HEADER)?;
    for measure in &rows {
        let (cod_utente, cod_rete) = measure.meta.station_key();
        let (date, time) = match measure.at {
            ObservedAt::Day(d) => (d, String::new()),
            ObservedAt::Instant(dt) => (dt.date(), dt.format("%H:%M:%S").to_string()),
        };
        writeln!(
            out,
            "{};{};{};{};{};{};{};{};{}",
            cod_utente,
            cod_rete,
            date.format("%Y-%m-%d"),
            time,
            measure.par_code,
            number_text(measure.value),
            u8::from(measure.valid),
            measure.meta.source,
            measure.meta.format
        )?;
    }
    out.flush()?;
    debug!(path = %path.as_ref().display(), rows = rows.len(), "data exported");
    Ok(rows.len())
}

/// Measures of a CSV written by [`export2csv`]
pub fn csv2data(path: impl AsRef<Path>) -> Result<Vec<Measure>, ExportError> {
    let path = path.as_ref();
    csv_rows(path, DATA_HEADER)?
        .into_iter()
        .map(|(row, f)| {
            let date = NaiveDate::parse_from_str(&f[2], "%Y-%m-%d")
                .map_err(|_| malformed(path, row, "date not parsable"))?;
            let at = match f[3].trim() {
                "" => ObservedAt::Day(date),
                time => NaiveTime::parse_from_str(time, "%H:%M:%S")
                    .map(|t| ObservedAt::Instant(NaiveDateTime::new(date, t)))
                    .map_err(|_| malformed(path, row, "time not parsable"))?,
            };
            let value = match f[5].trim() {
                "" => None,
                text => Some(
                    parse_decimal(text).ok_or_else(|| malformed(path, row, "value not numeric"))?,
                ),
            };
            let meta = Metadata {
                cod_utente: f[0].clone(),
                cod_rete: optional(&f[1]),
                source: f[7].clone(),
                format: f[8].clone(),
                row,
                ..Default::default()
            };
            Ok(Measure::new(meta, at, f[4].clone(), value, f[6].trim() == "1"))
        })
        .collect()
}

/// Write indicator items into `<folder>/<table>.csv`, one file per table
pub fn write_indicators(
    items: &[TableItem<StationCode>],
    folder: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, ExportError> {
    let mut by_table: BTreeMap<&str, Vec<&TableItem<StationCode>>> = BTreeMap::new();
    for item in items {
        by_table.entry(item.table.as_str()).or_default().push(item);
    }
    let mut written = Vec::new();
    for (table, items) in by_table {
        let path = folder.as_ref().join(format!("{}.csv", table));
        let mut out = BufWriter::new(File::create(&path)?);
        writeln!(out, "{}", INDICATORS_HEADER)?;
        for item in items {
            let (cod_utente, cod_rete) = &item.station;
            for (field, value) in &item.fields {
                writeln!(
                    out,
                    "{};{};{};{};{}",
                    cod_utente,
                    cod_rete,
                    item.data_i.format("%Y-%m-%d"),
                    field,
                    value
                )?;
            }
        }
        out.flush()?;
        written.push(path);
    }
    Ok(written)
}

/// Daily indicator items of a `<table>.csv`, the table being named by the file
pub fn read_indicators(path: impl AsRef<Path>) -> Result<Vec<TableItem<StationCode>>, ExportError> {
    let path = path.as_ref();
    let table = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let mut items: Vec<TableItem<StationCode>> = Vec::new();
    for (row, f) in csv_rows(path, INDICATORS_HEADER)? {
        let data_i = NaiveDate::parse_from_str(&f[2], "%Y-%m-%d")
            .map_err(|_| malformed(path, row, "data_i not parsable"))?;
        let value = FieldValue::parse(&f[4])
            .ok_or_else(|| malformed(path, row, format!("value '{}' not parsable", f[4])))?;
        let station = (f[0].clone(), f[1].clone());
        match items.last_mut() {
            Some(item) if item.station == station && item.data_i == data_i => {
                item.set(f[3].clone(), value);
            }
            _ => {
                let mut item = TableItem::new(table.clone(), station, data_i, COD_AGGR_DAY);
                item.set(f[3].clone(), value);
                items.push(item);
            }
        }
    }
    Ok(items)
}

pub fn write_stations(stations: &[Station], path: impl AsRef<Path>) -> Result<(), ExportError> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{}", STATIONS_HEADER)?;
    for s in stations {
        writeln!(
            out,
            "{};{};{};{};{};{};{}",
            s.cod_utente,
            s.cod_rete,
            s.nome.as_deref().unwrap_or_default(),
            number_text(s.lat),
            number_text(s.lon),
            s.quota.as_deref().unwrap_or_default(),
            s.source
        )?;
    }
    out.flush()?;
    Ok(())
}

pub fn read_stations(path: impl AsRef<Path>) -> Result<Vec<Station>, ExportError> {
    let path = path.as_ref();
    csv_rows(path, STATIONS_HEADER)?
        .into_iter()
        .map(|(row, f)| {
            let coordinate = |text: &str, name: &str| match text.trim() {
                "" => Ok(None),
                t => parse_decimal(t)
                    .map(Some)
                    .ok_or_else(|| malformed(path, row, format!("{} not numeric", name))),
            };
            Ok(Station {
                cod_utente: f[0].trim().to_string(),
                cod_rete: f[1].trim().to_string(),
                nome: optional(&f[2]),
                lat: coordinate(&f[3], "lat")?,
                lon: coordinate(&f[4], "lon")?,
                quota: optional(&f[5]),
                source: f[6].trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn measure(at: ObservedAt, par_code: &str, value: Option<f64>, valid: bool) -> Measure {
        let meta = Metadata {
            cod_utente: "70001".to_string(),
            cod_rete: Some("11".to_string()),
            source: "arpa19/loc01_70001_201301010000_201401010100.dat".to_string(),
            format: "ARPA-19".to_string(),
            ..Default::default()
        };
        Measure::new(meta, at, par_code, value, valid)
    }

    fn instant(hour: u32) -> ObservedAt {
        ObservedAt::Instant(
            NaiveDate::from_ymd_opt(2013, 1, 1)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
        )
    }

    #[test]
    fn test_export2csv_sorts_and_omits() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let measures = vec![
            measure(instant(2), "Tmedia", Some(1.5), true),
            measure(instant(1), "Tmedia", Some(-0.5), false),
            measure(instant(1), "UR media", None, true),
            measure(instant(1), "FF", Some(3.0), true),
        ];
        let omit: HashSet<String> = ["FF".to_string()].into_iter().collect();
        let written = export2csv(&measures, &path, &omit, true).unwrap();
        assert_eq!(written, 2);
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                DATA_HEADER,
                "70001;11;2013-01-01;01:00:00;Tmedia;-0.5;0;arpa19/loc01_70001_201301010000_201401010100.dat;ARPA-19",
                "70001;11;2013-01-01;02:00:00;Tmedia;1.5;1;arpa19/loc01_70001_201301010000_201401010100.dat;ARPA-19",
            ]
        );
    }

    #[test]
    fn test_csv2data_reads_back_exported_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let day = ObservedAt::Day(NaiveDate::from_ymd_opt(2013, 1, 2).unwrap());
        let measures = vec![
            measure(instant(1), "Tmedia", Some(-0.5), false),
            measure(day, "PREC", None, true),
        ];
        export2csv(&measures, &path, &HashSet::new(), false).unwrap();
        let read = csv2data(&path).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].at, instant(1));
        assert_eq!(read[0].value, Some(-0.5));
        assert!(!read[0].valid);
        assert_eq!(read[1].at, day);
        assert_eq!(read[1].value, None);
        assert_eq!(read[1].meta.station_key(), ("70001".to_string(), "11".to_string()));
        assert_eq!(read[1].meta.row, 3);
    }

    #[test]
    fn test_csv2data_rejects_bad_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "a;b;c\n").unwrap();
        assert!(matches!(csv2data(&path), Err(ExportError::Malformed { row: 1, .. })));
    }

    #[test]
    fn test_indicators_files() {
        let dir = tempdir().unwrap();
        let day = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        let station = ("70001".to_string(), "11".to_string());
        let mut preci = TableItem::new("ds__preci", station.clone(), day, COD_AGGR_DAY);
        preci.set("prec24.val_tot", 12.5).set("prec24.val_mx", FieldValue::Null);
        let mut t200 = TableItem::new("ds__t200", station.clone(), day, COD_AGGR_DAY);
        t200.set("tmxgg.val_md", 20.0)
            .set("tmxgg.data_x", day.and_hms_opt(14, 0, 0).unwrap());
        let written = write_indicators(&[preci.clone(), t200.clone()], dir.path()).unwrap();
        assert_eq!(
            written,
            vec![dir.path().join("ds__preci.csv"), dir.path().join("ds__t200.csv")]
        );
        let text = std::fs::read_to_string(&written[0]).unwrap();
        assert_eq!(
            text,
            "cod_utente;cod_rete;data_i;field;value\n\
             70001;11;2020-03-01;prec24.val_tot;12.5\n\
             70001;11;2020-03-01;prec24.val_mx;\n"
        );
        assert_eq!(read_indicators(&written[0]).unwrap(), vec![preci]);
        let read = read_indicators(&written[1]).unwrap();
        assert_eq!(read, vec![t200]);
        assert_eq!(read[0].get("tmxgg.val_md"), Some(&FieldValue::Float(20.0)));
        assert_eq!(
            read[0].get("tmxgg.data_x"),
            Some(&FieldValue::Time(day.and_hms_opt(14, 0, 0).unwrap()))
        );
    }

    #[test]
    fn test_stations_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stations.csv");
        let stations = vec![
            Station {
                cod_utente: "70001".to_string(),
                cod_rete: "11".to_string(),
                nome: Some("Passo Rolle".to_string()),
                lat: Some(46.3),
                lon: Some(11.78),
                quota: Some("2012".to_string()),
                source: "trentino/T0001.csv".to_string(),
            },
            Station {
                cod_utente: "990".to_string(),
                cod_rete: "15".to_string(),
                source: "hiscentral/serie_990-reg.abruzzoTmax.csv".to_string(),
                ..Default::default()
            },
        ];
        write_stations(&stations, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n990;15;;;;;hiscentral/serie_990-reg.abruzzoTmax.csv\n"));
        assert_eq!(read_stations(&path).unwrap(), stations);
    }
}
