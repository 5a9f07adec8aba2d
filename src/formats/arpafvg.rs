//! ARPA files of Friuli-Venezia Giulia: hourly rows of 9 parameters, always valid
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::path::Path;
use tracing::debug;

use crate::formats::arpa::{dat_metadata, parse_file_name, FileChecks, RowCheck};
use crate::formats::{reject_not_compliant, Format, FormatError};
use crate::models::{Measure, Metadata, ObservedAt, ParseOutcome, RowError};
use crate::parameters::ParameterTable;
use crate::utils::{file_name, first_lines, is_digits, read_text_lossy};

pub const LABEL: &str = "ARPA-FVG";
const TOKENS: usize = 15;
const VALUES: usize = 9;

/// Time of a row from its first four tokens: `yy mm dd HH.MM`
fn parse_row_time(tokens: &[&str]) -> Option<NaiveDateTime> {
    let small = |t: &str| {
        if (1..=2).contains(&t.len()) && is_digits(t) {
            t.parse::<u32>().ok()
        } else {
            None
        }
    };
    let yy = small(tokens.first()?)? as i32;
    let year = if yy < 69 { 2000 + yy } else { 1900 + yy };
    let (hour, minute) = tokens.get(3)?.split_once('.')?;
    NaiveDate::from_ymd_opt(year, small(tokens.get(1)?)?, small(tokens.get(2)?)?)?
        .and_hms_opt(small(hour)?, small(minute)?, 0)
}

pub fn validate_row(row: &str) -> Option<&'static str> {
    let tokens: Vec<&str> = row.split_whitespace().collect();
    if tokens.len() != TOKENS {
        return Some("The number of components in the row is wrong");
    }
    if parse_row_time(&tokens).is_none() {
        return Some("The date format in the row is wrong");
    }
    if tokens[5..].iter().any(|t| t.parse::<f64>().is_err()) {
        return Some("The row contains not numeric values");
    }
    None
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ArpaFvg;

impl Format for ArpaFvg {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn default_parameters(&self) -> &'static str {
        include_str!("../../templates/arpafvg_params.csv")
    }

    fn is_format_compliant(&self, path: &Path) -> bool {
        if parse_file_name(&file_name(path), 10).is_err() {
            return false;
        }
        first_lines(path, 2)
            .map(|lines| {
                lines
                    .iter()
                    .any(|l| l.split_whitespace().count() == TOKENS)
            })
            .unwrap_or(false)
    }

    fn extract_metadata(&self, path: &Path, _: &ParameterTable) -> Result<Metadata, FormatError> {
        Ok(dat_metadata(path, LABEL, 10)?.0)
    }

    fn parse(&self, path: &Path, params: &ParameterTable) -> Result<ParseOutcome, FormatError> {
        let (meta, name) = match dat_metadata(path, LABEL, 10) {
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
            if let Some(msg) = validate_row(row) {
                outcome.errors.push(RowError::new(i, msg));
                continue;
            }
            let tokens: Vec<&str> = row.split_whitespace().collect();
            let raw_at = parse_row_time(&tokens);
            let (Some(raw_at), Ok(lat)) = (raw_at, tokens[14].parse::<f64>()) else {
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
            let at = ObservedAt::Instant(raw_at - Duration::hours(1));
            for (k, value) in tokens[5..5 + VALUES].iter().enumerate() {
                let Some(param) = params.by_position(k + 1) else {
                    continue;
                };
                let value = value.parse::<f64>().ok().map(|v| param.conversion.apply(v));
                outcome.measures.push(Measure::new(
                    row_meta.clone(),
                    at,
                    param.par_code.clone(),
                    value,
                    true,
                ));
            }
        }
        debug!(
            measures = outcome.measures.len(),
            errors = outcome.errors.len(),
            "parsed ARPA-FVG file"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_time() {
        let tokens = ["18", "01", "01", "01.00"];
        assert_eq!(
            parse_row_time(&tokens),
            NaiveDate::from_ymd_opt(2018, 1, 1).unwrap().and_hms_opt(1, 0, 0)
        );
        assert_eq!(parse_row_time(&["18", "13", "01", "01.00"]), None);
        assert_eq!(parse_row_time(&["18", "01", "01", "0100"]), None);
    }

    #[test]
    fn test_validate_row() {
        let row = " 18 01 01 01.00 01   0.0   2.8  86  58 357   0.5 1001     1   0 46.077222";
        assert_eq!(validate_row(row), None);
        assert_eq!(
            validate_row(" 18 01 01 01.00 01   0.0"),
            Some("The number of components in the row is wrong")
        );
        let row = " 18 01 01 01.00 01   0.0   2.8  86  58 357   0.5 1001     1   X 46.077222";
        assert_eq!(validate_row(row), Some("The row contains not numeric values"));
        let row = " 18 01 41 01.00 01   0.0   2.8  86  58 357   0.5 1001     1   0 46.077222";
        assert_eq!(validate_row(row), Some("The date format in the row is wrong"));
    }
}
