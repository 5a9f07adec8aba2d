//! NOAA Global Summary Of the Day files (`.op`): fixed-width daily rows in imperial units.
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::Path;

use crate::formats::{base_metadata, Format, FormatError};
use crate::models::{Measure, Metadata, ObservedAt, ParseOutcome, RowError};
use crate::parameters::{limiting, LimitingParameters, ParameterTable};
use crate::utils::{dotted_extension, first_lines, read_text_lossy, round_to};

pub const LABEL: &str = "NOAA";

pub const HEADER: &str = "STN--- WBAN   YEARMODA    TEMP       DEWP      SLP        STP       VISIB      \
WDSP     MXSPD   GUST    MAX     MIN   PRCP   SNDP   FRSHTT";

const ROW_LENGTH: usize = 138;
const PRECIPITATION_FLAGS: &str = "ABCDEFGHI ";
/// Key of the relative humidity derived from temperature and dew point
const DERIVED_HUMIDITY: &str = "UR";

/// `(field, start, end, missing value marker)`
const FIELDS: [(&str, usize, usize, &str); 12] = [
    ("TEMP", 24, 30, "9999.9"),
    ("DEWP", 35, 41, "9999.9"),
    ("SLP", 46, 52, "9999.9"),
    ("STP", 57, 63, "9999.9"),
    ("VISIB", 68, 73, "999.9"),
    ("WDSP", 78, 83, "999.9"),
    ("MXSPD", 88, 93, "999.9"),
    ("GUST", 95, 100, "999.9"),
    ("MAX", 102, 108, "9999.9"),
    ("MIN", 110, 116, "9999.9"),
    ("PRCP", 118, 123, "99.99"),
    ("SNDP", 125, 130, "999.9"),
];

fn row_date(row: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(row.get(14..22)?, "%Y%m%d").ok()
}

pub fn validate_row(row: &str) -> Option<&'static str> {
    if row.trim().len() != ROW_LENGTH {
        return Some("the length of the row is not standard");
    }
    if row_date(row).is_none() {
        return Some("the reference time for the row is not parsable");
    }
    match row.get(123..124) {
        Some(flag) if PRECIPITATION_FLAGS.contains(flag) => {}
        _ => return Some("the precipitation flag is not parsable"),
    }
    let tokens: Vec<&str> = row.split_whitespace().collect();
    if tokens.len() != 22 {
        return Some("The number of components in the row is wrong");
    }
    let numeric = tokens[3..19]
        .iter()
        .chain(&tokens[20..])
        .all(|t| t.replace('*', "").parse::<f64>().is_ok());
    if !numeric {
        return Some("The row contains not numeric values");
    }
    None
}

/// Relative humidity (%) from air and dew point temperatures in Celsius (Magnus formula)
pub fn relative_humidity(temperature: f64, dew_point: f64) -> f64 {
    let magnus = |t: f64| (17.625 * t / (243.04 + t)).exp();
    round_to(100.0 * magnus(dew_point) / magnus(temperature), 1)
}

/// Converted values of a validated row, by NOAA field name
fn row_values(row: &str, params: &ParameterTable) -> HashMap<&'static str, Option<f64>> {
    FIELDS
        .iter()
        .map(|(field, start, end, missing)| {
            let raw = row.get(*start..*end).unwrap_or("").trim();
            let value = if raw.is_empty() || raw == *missing {
                None
            } else {
                raw.replace('*', "").parse::<f64>().ok().map(|v| match params.by_key(field) {
                    Some(param) => param.conversion.apply(v),
                    None => v,
                })
            };
            (*field, value)
        })
        .collect()
}

fn row_measures(
    row: &str,
    meta: &Metadata,
    at: ObservedAt,
    params: &ParameterTable,
) -> Vec<Measure> {
    let values = row_values(row, params);
    let mut meta = meta.clone();
    meta.cod_utente = row.get(0..6).unwrap_or("").trim().to_string();
    params
        .iter()
        .filter_map(|param| {
            let value = if param.key == DERIVED_HUMIDITY {
                match (values.get("TEMP"), values.get("DEWP")) {
                    (Some(Some(t)), Some(Some(d))) => Some(relative_humidity(*t, *d)),
                    _ => None,
                }
            } else {
                *values.get(param.key.as_str())?
            };
            Some(Measure::new(meta.clone(), at, param.par_code.clone(), value, true))
        })
        .collect()
}

fn check_file(path: &Path) -> Result<(), FormatError> {
    if dotted_extension(path) != ".op" {
        return Err(FormatError::NotCompliant("file extension must be .op".to_string()));
    }
    let header_ok = first_lines(path, 1)?
        .first()
        .is_some_and(|l| l.trim() == HEADER);
    if !header_ok {
        return Err(FormatError::NotCompliant(
            "file doesn't include a correct header".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Noaa;

impl Format for Noaa {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn default_parameters(&self) -> &'static str {
        include_str!("../../templates/noaa_params.csv")
    }

    fn limiting_parameters(&self) -> LimitingParameters {
        limiting(&[("Tmedia", "Tmin", "Tmax")])
    }

    fn is_format_compliant(&self, path: &Path) -> bool {
        check_file(path).is_ok()
    }

    /// The station code is read from the first data row
    fn extract_metadata(&self, path: &Path, _: &ParameterTable) -> Result<Metadata, FormatError> {
        check_file(path)?;
        let mut meta = base_metadata(path, LABEL);
        if let Some(row) = first_lines(path, 2)?.get(1) {
            meta.cod_utente = row.get(0..6).unwrap_or("").trim().to_string();
        }
        Ok(meta)
    }

    fn parse(&self, path: &Path, params: &ParameterTable) -> Result<ParseOutcome, FormatError> {
        if let Err(e) = check_file(path) {
            return crate::formats::reject_not_compliant(e);
        }
        let meta = base_metadata(path, LABEL);
        let text = read_text_lossy(path)?;
        let mut outcome = ParseOutcome::default();
        let mut last: Option<(NaiveDate, &str)> = None;
        for (i, row) in text.lines().enumerate().map(|(i, r)| (i + 1, r)).skip(1) {
            if row.trim().is_empty() {
                continue;
            }
            if let Some(msg) = validate_row(row) {
                outcome.errors.push(RowError::new(i, msg));
                continue;
            }
            let Some(date) = row_date(row) else {
                continue;
            };
            match last {
                Some((last_date, _)) if last_date > date => {
                    outcome
                        .errors
                        .push(RowError::new(i, "it is not strictly after the previous"));
                    continue;
                }
                Some((last_date, last_row)) if last_date == date => {
                    if last_row != row {
                        outcome
                            .errors
                            .push(RowError::new(i, "duplication of rows with different data"));
                    }
                    continue;
                }
                _ => {}
            }
            last = Some((date, row));
            outcome.measures.extend(row_measures(
                row,
                &meta.with_row(i),
                ObservedAt::Day(date),
                params,
            ));
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROW: &str = "160080 99999  20190101    33.9 24    23.7 24  9999.9  0   859.6 24   \
11.0 24    7.9 24   11.1  999.9    41.0    28.4   0.00F   1.6  000000";

    #[test]
    fn test_validate_row() {
        assert_eq!(ROW.len(), ROW_LENGTH);
        assert_eq!(validate_row(ROW), None);
        assert_eq!(
            validate_row(&ROW[..100]),
            Some("the length of the row is not standard")
        );
        let wrong_date = ROW.replace("20190101", "20191301");
        assert_eq!(
            validate_row(&wrong_date),
            Some("the reference time for the row is not parsable")
        );
        let wrong_flag = ROW.replace("0.00F", "0.00Z");
        assert_eq!(
            validate_row(&wrong_flag),
            Some("the precipitation flag is not parsable")
        );
        let not_numeric = ROW.replace("859.6", "859.a");
        assert_eq!(
            validate_row(&not_numeric),
            Some("The row contains not numeric values")
        );
    }

    #[test]
    fn test_row_measures() {
        let params = Noaa.load_parameters(None).unwrap();
        let at = ObservedAt::Day(NaiveDate::from_ymd_opt(2019, 1, 1).unwrap());
        let measures = row_measures(ROW, &Metadata::default(), at, &params);
        let found: HashMap<&str, Option<f64>> = measures
            .iter()
            .map(|m| (m.par_code.as_str(), m.value))
            .collect();
        assert_eq!(found["Tmedia"], Some(1.0556));
        assert_eq!(found["DEWP"], Some(-4.6111));
        assert_eq!(found["P"], None);
        assert_eq!(found["STP"], Some(859.6));
        assert_eq!(found["VISIB"], Some(17702.74));
        assert_eq!(found["FF"], Some(4.0638));
        assert_eq!(found["MXSPD"], Some(5.7098));
        assert_eq!(found["GUST"], None);
        assert_eq!(found["Tmax"], Some(5.0));
        assert_eq!(found["Tmin"], Some(-2.0));
        assert_eq!(found["PREC"], Some(0.0));
        assert_eq!(found["SNDP"], Some(40.64));
        let ur = found["UR media"].unwrap();
        assert!(ur > 60.0 && ur < 70.0);
        assert!(measures.iter().all(|m| m.valid && m.meta.cod_utente == "160080"));
    }
}
