//! Daily series exported by the HISCENTRAL services: one station and one variable per file,
//! both named in the file name (e.g. `serie_990-reg.abruzzoTmax.csv`).
use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::Path;

use crate::formats::{
    base_metadata, reject_not_compliant, Format, FormatError, RowSequence, Sequenced,
};
use crate::models::{quoted, Measure, Metadata, ObservedAt, ParseOutcome, RowError};
use crate::parameters::{Parameter, ParameterTable};
use crate::utils::{dotted_extension, file_name, first_lines, parse_decimal, read_text_lossy};

pub const LABEL: &str = "HISCENTRAL";
pub const MISSING_VALUE_MARKER: &str = "-9999";
pub const ALLOWED_VARIABLES: [&str; 3] = ["Precipitation", "Tmax", "Tmin"];
pub const FIELDNAMES: [&str; 9] = [
    "time",
    "DataValue",
    "UTCOffset",
    "Qualifier",
    "CensorCode",
    "DateTimeUTC",
    "MethodCode",
    "SourceCode",
    "QualityControlLevelCode",
];

/// `(cod_utente, variable)` of a file name
pub fn parse_file_name(name: &str) -> Result<(String, &'static str), String> {
    let ext = dotted_extension(name);
    if !ext.eq_ignore_ascii_case(".csv") {
        return Err(format!("Extension expected must be .csv, found {}", ext));
    }
    let stem = name[..name.len() - ext.len()].to_string();
    let cod_utente = stem
        .split('-')
        .next()
        .and_then(|head| head.split('_').nth(1))
        .filter(|_| stem.contains('-'))
        .ok_or_else(|| "cod_utente not parsable from the file name".to_string())?;
    let lower = stem.to_lowercase();
    let variable = ALLOWED_VARIABLES
        .iter()
        .find(|v| lower.ends_with(&v.to_lowercase()))
        .copied()
        .ok_or_else(|| "variable name is not parsable from the file name".to_string())?;
    Ok((cod_utente.to_string(), variable))
}

fn header_fields(line: &str) -> Vec<String> {
    line.trim_start_matches('\u{feff}')
        .split(';')
        .map(|f| f.trim().to_string())
        .collect()
}

fn check_header(path: &Path) -> Result<(), FormatError> {
    let header = first_lines(path, 1)?
        .first()
        .map(|l| header_fields(l))
        .unwrap_or_default();
    let found: HashSet<&str> = header.iter().map(String::as_str).collect();
    if found != FIELDNAMES.iter().copied().collect::<HashSet<_>>() {
        return Err(FormatError::NotCompliant(
            "The CSV header is not compliant with the format".to_string(),
        ));
    }
    Ok(())
}

fn read_metadata(path: &Path) -> Result<(Metadata, &'static str), FormatError> {
    let (cod_utente, variable) =
        parse_file_name(&file_name(path)).map_err(FormatError::NotCompliant)?;
    let mut meta = base_metadata(path, LABEL);
    meta.cod_utente = cod_utente;
    Ok((meta, variable))
}

fn parse_row(
    row: &str,
    columns: &[String],
    param: &Parameter,
) -> Result<(NaiveDate, Option<f64>), String> {
    let cells: Vec<&str> = row.split(';').map(str::trim).collect();
    let cell = |name: &str| {
        columns
            .iter()
            .position(|c| c == name)
            .and_then(|i| cells.get(i).copied())
            .unwrap_or("")
    };
    let date = NaiveDate::parse_from_str(cell("time"), "%Y-%m-%d")
        .map_err(|_| "the reference time for the row is not parsable".to_string())?;
    let raw = cell("DataValue");
    if raw.is_empty() || raw == "-" {
        return Ok((date, None));
    }
    let value =
        parse_decimal(raw).ok_or_else(|| format!("the value {} is not numeric", quoted(raw)))?;
    if raw == MISSING_VALUE_MARKER {
        return Ok((date, None));
    }
    Ok((date, Some(param.conversion.apply(value))))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Hiscentral;

impl Format for Hiscentral {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn default_parameters(&self) -> &'static str {
        include_str!("../../templates/hiscentral_params.csv")
    }

    fn is_format_compliant(&self, path: &Path) -> bool {
        if parse_file_name(&file_name(path)).is_err() {
            return false;
        }
        first_lines(path, 1)
            .ok()
            .and_then(|lines| lines.first().map(|l| header_fields(l)))
            .is_some_and(|header| header == FIELDNAMES)
    }

    fn extract_metadata(&self, path: &Path, _: &ParameterTable) -> Result<Metadata, FormatError> {
        Ok(read_metadata(path)?.0)
    }

    fn parse(&self, path: &Path, params: &ParameterTable) -> Result<ParseOutcome, FormatError> {
        let found = read_metadata(path).and_then(|found| {
            check_header(path)?;
            Ok(found)
        });
        let (meta, variable) = match found {
            Ok(found) => found,
            Err(e) => return reject_not_compliant(e),
        };
        let text = read_text_lossy(path)?;
        let mut rows = text.lines().enumerate().map(|(i, r)| (i + 1, r));
        let columns = rows.next().map(|(_, l)| header_fields(l)).unwrap_or_default();
        let Some(param) = params.by_key(variable) else {
            return Ok(ParseOutcome::default());
        };

        let mut outcome = ParseOutcome::default();
        let mut sequence = RowSequence::new();
        for (i, row) in rows {
            if row.trim().is_empty() {
                continue;
            }
            let (date, value) = match parse_row(row, &columns, param) {
                Ok(parsed) => parsed,
                Err(msg) => {
                    outcome.errors.push(RowError::new(i, msg));
                    continue;
                }
            };
            let at = ObservedAt::Day(date);
            match sequence.push(at, row.trim()) {
                Sequenced::Reject(msg) => {
                    outcome.errors.push(RowError::new(i, msg));
                    continue;
                }
                Sequenced::Repeated => continue,
                Sequenced::Accept => {}
            }
            outcome.measures.push(Measure::new(
                meta.with_row(i),
                at,
                param.par_code.clone(),
                value,
                true,
            ));
        }
        Ok(outcome)
    }
}
