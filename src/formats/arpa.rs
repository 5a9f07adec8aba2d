//! Conventions shared by the ARPA station files: the file name carries the station code
//! and the covered interval, rows are fixed-width numeric records.
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::path::Path;
use tracing::debug;

use crate::formats::{base_metadata, reject_not_compliant, FormatError};
use crate::models::{Measure, Metadata, ObservedAt, ParseOutcome, RowError};
use crate::parameters::ParameterTable;
use crate::utils::{dotted_extension, file_name, first_lines, is_digits, read_text_lossy};

pub const MISSING_VALUE_MARKER: &str = "32767";

/// Station code and covered interval as read from a file name
#[derive(Debug, Clone, PartialEq)]
pub struct DatFileName {
    pub code: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Parse `YYYYmmddHHMM` (12 digits) or `YYYYmmddHH` (10 digits)
pub(crate) fn parse_compact_datetime(value: &str, digits: usize) -> Option<NaiveDateTime> {
    if value.len() != digits || !is_digits(value) {
        return None;
    }
    let num = |range: std::ops::Range<usize>| value[range].parse::<u32>().ok();
    let date = NaiveDate::from_ymd_opt(value[0..4].parse().ok()?, num(4..6)?, num(6..8)?)?;
    let minute = if digits >= 12 { num(10..12)? } else { 0 };
    date.and_hms_opt(num(8..10)?, minute, 0)
}

/// Validate a name like `loc01_70001_201301010000_201401010000.dat`. `digits` is the
/// length of the dates.
pub fn parse_file_name(name: &str, digits: usize) -> Result<DatFileName, String> {
    let ext = dotted_extension(name);
    if !ext.eq_ignore_ascii_case(".dat") {
        return Err(format!("Extension expected must be .dat, found {}", ext));
    }
    let stem = &name[..name.len() - ext.len()];
    let tokens: Vec<&str> = stem.split('_').collect();
    if tokens.len() != 4 {
        return Err(format!("File name '{}' is not standard", name));
    }
    let code = format!("{:0>5}", tokens[1]);
    if code.len() != 5 {
        return Err(format!("Station code '{}' is too long", code));
    }
    let start = parse_compact_datetime(tokens[2], digits)
        .ok_or_else(|| format!("Start date in file name '{}' is not standard", name))?;
    let end = parse_compact_datetime(tokens[3], digits)
        .ok_or_else(|| format!("End date in file name '{}' is not standard", name))?;
    if start > end {
        return Err(format!("The time interval in file name '{}' is not valid", name));
    }
    Ok(DatFileName { code, start, end })
}

pub(crate) fn dat_metadata(
    path: &Path,
    label: &str,
    digits: usize,
) -> Result<(Metadata, DatFileName), FormatError> {
    let name = parse_file_name(&file_name(path), digits).map_err(FormatError::NotCompliant)?;
    let mut meta = base_metadata(path, label);
    meta.cod_utente = name.code.clone();
    Ok((meta, name))
}

/// File level checks on the sequence of rows, applied after each row is well formatted
pub(crate) struct FileChecks {
    start: NaiveDateTime,
    end: NaiveDateTime,
    official_lat: Option<f64>,
    last: Option<(NaiveDateTime, String)>,
}

/// Outcome of the file level checks on a row
#[derive(Debug, PartialEq)]
pub(crate) enum RowCheck {
    Ok,
    /// Same time and same content of the previous row
    Repeated,
    Error(&'static str),
}

impl FileChecks {
    pub fn new(name: &DatFileName) -> Self {
        Self {
            start: name.start,
            end: name.end,
            official_lat: None,
            last: None,
        }
    }

    /// The latitude of the first row is the reference for the whole file
    pub fn check(&mut self, at: NaiveDateTime, lat: f64, row: &str) -> RowCheck {
        let official_lat = *self.official_lat.get_or_insert(lat);
        let row = row.trim_end();
        let outcome = match &self.last {
            Some((last_at, _)) if *last_at > at => {
                RowCheck::Error("it is not strictly after the previous")
            }
            _ if official_lat != lat => RowCheck::Error("the latitude changes"),
            Some((last_at, last_row)) if *last_at == at && last_row != row => {
                RowCheck::Error("duplication of rows with different data")
            }
            Some((last_at, _)) if *last_at == at => RowCheck::Repeated,
            _ if !(self.start <= at && at <= self.end) => {
                RowCheck::Error("the time is not coherent with the filename")
            }
            _ => RowCheck::Ok,
        };
        self.last = Some((at, row.to_string()));
        outcome
    }
}

/// Layout of the `.dat` files with a flag for every value
#[derive(Debug, Clone, Copy)]
pub(crate) struct DatLayout {
    pub label: &'static str,
    pub values: usize,
    /// Subtracted from the row time once the row is validated
    pub shift: Duration,
}

impl DatLayout {
    pub fn tokens(&self) -> usize {
        2 + 2 * self.values
    }

    /// Format error of a row, `None` when the row can be parsed
    pub fn validate_row(&self, row: &str) -> Option<&'static str> {
        let tokens: Vec<&str> = row.split_whitespace().collect();
        if tokens.len() != self.tokens() {
            return Some("The number of components in the row is wrong");
        }
        if parse_compact_datetime(tokens[0], 12).is_none() {
            return Some("The date format in the row is wrong");
        }
        if tokens[1..].iter().any(|t| t.parse::<f64>().is_err()) {
            return Some("The row contains not numeric values");
        }
        if row.get(0..12) != Some(tokens[0]) {
            return Some("The date length in the row is wrong");
        }
        if row.get(13..22) != Some(tokens[1]) {
            return Some("The latitude length in the row is wrong");
        }
        let par_row = row.get(22..).unwrap_or("").trim_end_matches(['\n', '\r']);
        let chunks = par_row.as_bytes().chunks(7);
        for (k, chunk) in chunks.enumerate() {
            let cell = std::str::from_utf8(chunk).unwrap_or("").trim_start();
            if tokens.get(k + 2) != Some(&cell) {
                return Some("The spacing in the row is wrong");
            }
        }
        None
    }

    pub fn is_format_compliant(&self, path: &Path) -> bool {
        if parse_file_name(&file_name(path), 12).is_err() {
            return false;
        }
        match first_lines(path, 1) {
            Ok(lines) => lines
                .first()
                .is_some_and(|l| l.split_whitespace().count() == self.tokens()),
            Err(_) => false,
        }
    }

    pub fn extract_metadata(&self, path: &Path) -> Result<Metadata, FormatError> {
        Ok(dat_metadata(path, self.label, 12)?.0)
    }

    pub fn parse(&self, path: &Path, params: &ParameterTable) -> Result<ParseOutcome, FormatError> {
        let (meta, name) = match dat_metadata(path, self.label, 12) {
            Ok(found) => found,
            Err(e) => return reject_not_compliant(e),
        };
        let text = read_text_lossy(path)?;
        let mut outcome = ParseOutcome::default();
        let mut checks = FileChecks::new(&name);
        for (i, row) in text.lines().enumerate().map(|(i, r)| (i + 1, r)) {
            if row.trim().is_empty() {
                continue;
            }
            if let Some(msg) = self.validate_row(row) {
                outcome.errors.push(RowError::new(i, msg));
                continue;
            }
            let tokens: Vec<&str> = row.split_whitespace().collect();
            let raw_at = parse_compact_datetime(tokens[0], 12);
            let (Some(raw_at), Ok(lat)) = (raw_at, tokens[1].parse::<f64>()) else {
                continue;
            };
            match checks.check(raw_at, lat, row) {
                RowCheck::Error(msg) => {
                    outcome.errors.push(RowError::new(i, msg));
                    continue;
                }
                RowCheck::Repeated => continue,
                RowCheck::Ok => {}
            }
            let mut row_meta = meta.with_row(i);
            row_meta.station.lat = Some(lat);
            let at = ObservedAt::Instant(raw_at - self.shift);
            let values = &tokens[2..2 + self.values];
            let flags = &tokens[2 + self.values..];
            for (k, (value, flag)) in values.iter().zip(flags).enumerate() {
                let Some(param) = params.by_position(k + 1) else {
                    continue;
                };
                let value = if *value == MISSING_VALUE_MARKER {
                    None
                } else {
                    value.parse::<f64>().ok().map(|v| param.conversion.apply(v))
                };
                let valid = flag.parse::<f64>().map(|f| f <= 1.0).unwrap_or(false);
                outcome.measures.push(Measure::new(
                    row_meta.clone(),
                    at,
                    param.par_code.clone(),
                    value,
                    valid,
                ));
            }
        }
        debug!(
            format = self.label,
            measures = outcome.measures.len(),
            errors = outcome.errors.len(),
            "parsed dat file"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_file_name() {
        let name = parse_file_name("loc01_70001_201301010000_201401010000.dat", 12).unwrap();
        assert_eq!(name.code, "70001");
        assert_eq!(name.start, dt(2013, 1, 1, 0));
        assert_eq!(name.end, dt(2014, 1, 1, 0));
        let name = parse_file_name("loc01_1_201301010000_201401010000.DAT", 12).unwrap();
        assert_eq!(name.code, "00001");
    }

    #[test]
    fn test_file_name_errors() {
        assert_eq!(
            parse_file_name("loc01_70001_201301010000_201401010000.txt", 12).unwrap_err(),
            "Extension expected must be .dat, found .txt"
        );
        assert_eq!(
            parse_file_name("loc01_70001_201301010000.dat", 12).unwrap_err(),
            "File name 'loc01_70001_201301010000.dat' is not standard"
        );
        assert_eq!(
            parse_file_name("loc01_700013_201301010000_201401010000.dat", 12).unwrap_err(),
            "Station code '700013' is too long"
        );
        assert_eq!(
            parse_file_name("loc01_70001_2013010100_201401010000.dat", 12).unwrap_err(),
            "Start date in file name 'loc01_70001_2013010100_201401010000.dat' is not standard"
        );
        assert_eq!(
            parse_file_name("loc01_70001_201301010000_2014010100.dat", 12).unwrap_err(),
            "End date in file name 'loc01_70001_201301010000_2014010100.dat' is not standard"
        );
        assert_eq!(
            parse_file_name("loc01_70001_201401010000_201301010000.dat", 12).unwrap_err(),
            "The time interval in file name 'loc01_70001_201401010000_201301010000.dat' is not valid"
        );
    }

    #[test]
    fn test_compact_datetime() {
        assert_eq!(parse_compact_datetime("2018010101", 10), Some(dt(2018, 1, 1, 1)));
        assert_eq!(parse_compact_datetime("201813010000", 12), None);
        assert_eq!(parse_compact_datetime("20180101", 12), None);
    }

    #[test]
    fn test_file_checks_sequence() {
        let name = DatFileName {
            code: "00001".to_string(),
            start: dt(2013, 1, 1, 0),
            end: dt(2013, 1, 2, 0),
        };
        let mut checks = FileChecks::new(&name);
        assert_eq!(checks.check(dt(2013, 1, 1, 1), 43.0, "a"), RowCheck::Ok);
        assert_eq!(checks.check(dt(2013, 1, 1, 1), 43.0, "a"), RowCheck::Repeated);
        assert_eq!(
            checks.check(dt(2013, 1, 1, 1), 43.0, "b"),
            RowCheck::Error("duplication of rows with different data")
        );
        assert_eq!(
            checks.check(dt(2013, 1, 1, 0), 43.0, "c"),
            RowCheck::Error("it is not strictly after the previous")
        );
        assert_eq!(
            checks.check(dt(2013, 1, 1, 2), 44.0, "d"),
            RowCheck::Error("the latitude changes")
        );
        assert_eq!(
            checks.check(dt(2013, 1, 3, 0), 43.0, "e"),
            RowCheck::Error("the time is not coherent with the filename")
        );
    }
}
