//! Daily spreadsheets of the Bolzano network. A block of station properties precedes the
//! table of daily values.
use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use std::path::Path;
use tracing::debug;

use crate::formats::{
    base_metadata, reject_not_compliant, Format, FormatError, RowSequence, Sequenced,
};
use crate::models::{Measure, Metadata, ObservedAt, ParseOutcome, RowError, StationProps};
use crate::parameters::ParameterTable;
use crate::utils::dotted_extension;

pub const LABEL: &str = "BOLZANO";
const NOT_COMPLIANT: &str = "BOLZANO file not compliant";
const DATE_COLUMN: usize = 1;
/// The station block is searched only in the first rows
const HEADER_ROWS: usize = 20;

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(d) => d
            .as_datetime()
            .map(|dt| dt.format("%d.%m.%Y").to_string())
            .unwrap_or_default(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}

/// Cells of the first sheet rendered as text
pub fn load_sheet(path: &Path) -> Result<Vec<Vec<String>>, FormatError> {
    let ext = dotted_extension(path).to_ascii_lowercase();
    if ext != ".xls" && ext != ".xlsx" {
        return Err(FormatError::NotCompliant(format!(
            "Extension expected must be .xls, found {}",
            dotted_extension(path)
        )));
    }
    let mut workbook =
        open_workbook_auto(path).map_err(|e| FormatError::WorkbookOpen(e.to_string()))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => return Err(FormatError::WorkbookOpen(e.to_string())),
        None => return Err(FormatError::NotCompliant(NOT_COMPLIANT.to_string())),
    };
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

fn station_block(rows: &[Vec<String>], i: usize, j: usize) -> Option<(String, StationProps)> {
    let cell = |i: usize| rows.get(i)?.get(j + 1).map(|c| c.trim().to_string());
    let code: String = cell(i + 1)?.chars().take(4).collect();
    let props = StationProps {
        desc: Some(cell(i)?),
        utmx: Some(cell(i + 2)?),
        utmy: Some(cell(i + 3)?),
        height: Some(cell(i + 4)?),
        ..Default::default()
    };
    Some((code, props))
}

/// Station code and properties from the block starting at the cell containing `stazione`
pub fn station_props(rows: &[Vec<String>]) -> Result<(String, StationProps), String> {
    rows.iter()
        .take(HEADER_ROWS)
        .enumerate()
        .find_map(|(i, row)| {
            row.iter()
                .position(|c| c.contains("stazione"))
                .map(|j| station_block(rows, i, j))
        })
        .flatten()
        .ok_or_else(|| NOT_COMPLIANT.to_string())
}

fn parse_date(cell: Option<&String>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(cell?.trim(), "%d.%m.%Y").ok()
}

fn normalized(cell: &str) -> String {
    cell.trim().replace(',', ".")
}

fn is_missing(cell: &str) -> bool {
    cell.is_empty() || cell.contains("quota")
}

fn validate_row(row: &[String]) -> Option<&'static str> {
    row.iter()
        .skip(DATE_COLUMN + 1)
        .map(|c| normalized(c))
        .any(|c| !is_missing(&c) && c.parse::<f64>().is_err())
        .then_some("the row contains values not numeric")
}

/// Measures and errors of the data table
pub(crate) fn parse_rows(
    rows: &[Vec<String>],
    meta: &Metadata,
    params: &ParameterTable,
) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();
    let mut sequence = RowSequence::new();
    let mut table_started = false;
    for (i, row) in rows.iter().enumerate().map(|(i, r)| (i + 1, r)) {
        let date = parse_date(row.get(DATE_COLUMN));
        if !table_started {
            if date.is_none() {
                continue;
            }
            table_started = true;
        }
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let Some(date) = date else {
            outcome.errors.push(RowError::new(i, "the date format is wrong"));
            continue;
        };
        if let Some(msg) = validate_row(row) {
            outcome.errors.push(RowError::new(i, msg));
            continue;
        }
        let at = ObservedAt::Day(date);
        match sequence.push(at, row.clone()) {
            Sequenced::Reject(msg) => {
                outcome.errors.push(RowError::new(i, msg));
                continue;
            }
            Sequenced::Repeated => continue,
            Sequenced::Accept => {}
        }
        for param in params.iter() {
            let Some(column) = param.position() else {
                continue;
            };
            let cell = row
                .get(column.saturating_sub(1))
                .map(|c| normalized(c))
                .unwrap_or_default();
            let value = if is_missing(&cell) {
                None
            } else {
                cell.parse::<f64>().ok().map(|v| param.conversion.apply(v))
            };
            outcome.measures.push(Measure::new(
                meta.with_row(i),
                at,
                param.par_code.clone(),
                value,
                true,
            ));
        }
    }
    outcome
}

fn metadata_from(path: &Path, rows: &[Vec<String>]) -> Result<Metadata, FormatError> {
    let (code, props) = station_props(rows).map_err(FormatError::NotCompliant)?;
    let mut meta = base_metadata(path, LABEL);
    meta.cod_utente = code;
    meta.station = props;
    Ok(meta)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Bolzano;

impl Format for Bolzano {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn default_parameters(&self) -> &'static str {
        include_str!("../../templates/bolzano_params.csv")
    }

    fn is_format_compliant(&self, path: &Path) -> bool {
        load_sheet(path)
            .ok()
            .is_some_and(|rows| station_props(&rows).is_ok())
    }

    fn extract_metadata(&self, path: &Path, _: &ParameterTable) -> Result<Metadata, FormatError> {
        metadata_from(path, &load_sheet(path)?)
    }

    fn parse(&self, path: &Path, params: &ParameterTable) -> Result<ParseOutcome, FormatError> {
        let found = load_sheet(path).and_then(|rows| Ok((metadata_from(path, &rows)?, rows)));
        let (meta, rows) = match found {
            Ok(found) => found,
            Err(e) => return reject_not_compliant(e),
        };
        let outcome = parse_rows(&rows, &meta, params);
        debug!(
            path = %path.display(),
            measures = outcome.measures.len(),
            errors = outcome.errors.len(),
            "parsed BOLZANO workbook"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn sample() -> Vec<Vec<String>> {
        sheet(&[
            &["", "Misure giornaliere", "", "", ""],
            &["", "Nome della stazione", "Bolzano", "", ""],
            &["", "Codice", "0200 Bolzano", "", ""],
            &["", "Coord. X UTM", "680077", "", ""],
            &["", "Coord. Y UTM", "5151900", "", ""],
            &["", "Quota", "254", "", ""],
            &["", "Data", "Precipitazione", "Tmax", "Tmin"],
            &["", "01.01.1981", "0,0", "3,5", "-3,0"],
            &["", "02.01.1981", "", "quota", "-5,5"],
            &["", "02.01.1981", "1,0", "4", "-5,5"],
            &["", "", "", "", ""],
            &["", "04.01.1981", "1a", "4", "-5,5"],
            &["", "totale", "", "", ""],
        ])
    }

    #[test]
    fn test_station_props() {
        let (code, props) = station_props(&sample()).unwrap();
        assert_eq!(code, "0200");
        assert_eq!(props.desc.as_deref(), Some("Bolzano"));
        assert_eq!(props.utmx.as_deref(), Some("680077"));
        assert_eq!(props.utmy.as_deref(), Some("5151900"));
        assert_eq!(props.height.as_deref(), Some("254"));
        assert_eq!(station_props(&sample()[6..]).unwrap_err(), NOT_COMPLIANT);
    }

    #[test]
    fn test_parse_rows() {
        let params = Bolzano.load_parameters(None).unwrap();
        let outcome = parse_rows(&sample(), &Metadata::default(), &params);
        assert_eq!(
            outcome.errors,
            vec![
                RowError::new(10, "the row is duplicated with different values"),
                RowError::new(12, "the row contains values not numeric"),
                RowError::new(13, "the date format is wrong"),
            ]
        );
        assert_eq!(outcome.measures.len(), 6);
        let first: Vec<(&str, Option<f64>)> = outcome.measures[..3]
            .iter()
            .map(|m| (m.par_code.as_str(), m.value))
            .collect();
        assert_eq!(first, vec![("PREC", Some(0.0)), ("Tmax", Some(3.5)), ("Tmin", Some(-3.0))]);
        assert_eq!(outcome.measures[3].value, None);
        assert_eq!(outcome.measures[4].value, None);
        assert_eq!(outcome.measures[5].meta.row, 9);
    }
}
