//! Quality checks.
//!
//! File level checks work on the measures parsed from a single file and report
//! [`RowError`]s; the checks on daily series stored in the database live in [`series`].
pub mod series;

use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::formats::{Format, FormatError};
use crate::models::{format_float, quoted, Measure, ParseOutcome, RowError};
use crate::parameters::{LimitingParameters, ParameterTable, Thresholds};

/// Values of parameters with thresholds must fall inside `[min, max]`
pub fn weak_climatologic_check(
    measures: Vec<Measure>,
    thresholds: &Thresholds,
) -> (Vec<RowError>, Vec<Measure>) {
    let mut errors = Vec::new();
    let checked = measures
        .into_iter()
        .map(|mut measure| {
            let (Some(value), Some((min, max))) =
                (measure.usable(), thresholds.get(&measure.par_code))
            else {
                return measure;
            };
            if value < *min || value > *max {
                measure.valid = false;
                errors.push(RowError::new(
                    measure.meta.row,
                    format!(
                        "The value of {} is out of range [{}, {}]",
                        quoted(&measure.par_code),
                        format_float(*min),
                        format_float(*max)
                    ),
                ));
            }
            measure
        })
        .collect();
    (errors, checked)
}

/// Inside a group of measures of the same station and time, a parameter must not be lower
/// than its minimum parameter or greater than its maximum one
pub fn internal_consistency_check(
    measures: Vec<Measure>,
    limiting: &LimitingParameters,
) -> (Vec<RowError>, Vec<Measure>) {
    let mut errors = Vec::new();
    let mut checked = Vec::with_capacity(measures.len());
    let mut rest = measures.as_slice();
    while let Some(first) = rest.first() {
        let key = (first.meta.station_key(), first.at);
        let len = rest
            .iter()
            .take_while(|m| (m.meta.station_key(), m.at) == key)
            .count();
        let (group, tail) = rest.split_at(len);
        rest = tail;

        // limits are read from the values as they were before this check
        let props: HashMap<&str, Option<f64>> = group
            .iter()
            .map(|m| (m.par_code.as_str(), m.usable()))
            .collect();
        for measure in group {
            let mut measure = measure.clone();
            if let (Some(value), Some((min_par, max_par))) =
                (measure.usable(), limiting.get(&measure.par_code))
            {
                if let Some(Some(min)) = props.get(min_par.as_str()) {
                    if value < *min {
                        measure.valid = false;
                        errors.push(not_consistent(&measure, min_par));
                    }
                }
                if let Some(Some(max)) = props.get(max_par.as_str()) {
                    if value > *max {
                        measure.valid = false;
                        errors.push(not_consistent(&measure, max_par));
                    }
                }
            }
            checked.push(measure);
        }
    }
    (errors, checked)
}

fn not_consistent(measure: &Measure, limit: &str) -> RowError {
    RowError::new(
        measure.meta.row,
        format!(
            "The values of {} and {} are not consistent",
            quoted(&measure.par_code),
            quoted(limit)
        ),
    )
}

/// Which file level checks to run after parsing
#[derive(Debug, Clone, Copy, Default)]
pub struct FileChecks {
    pub weak_climatologic: bool,
    pub internal_consistency: bool,
}

impl FileChecks {
    pub fn all() -> Self {
        Self {
            weak_climatologic: true,
            internal_consistency: true,
        }
    }
}

/// Parse a file and run the selected checks on the measures found.
///
/// Errors of the checks follow the formatting errors; a global error stops everything.
pub fn check_file(
    format: &dyn Format,
    path: &Path,
    params: &ParameterTable,
    limiting: Option<&LimitingParameters>,
    checks: FileChecks,
) -> Result<ParseOutcome, FormatError> {
    let mut outcome = format.parse(path, params)?;
    if outcome.has_global_error() {
        return Ok(outcome);
    }
    if checks.weak_climatologic {
        let (errors, measures) = weak_climatologic_check(outcome.measures, &params.thresholds());
        outcome.errors.extend(errors);
        outcome.measures = measures;
    }
    if checks.internal_consistency {
        let default_limiting = format.limiting_parameters();
        let limiting = limiting.unwrap_or(&default_limiting);
        let (errors, measures) = internal_consistency_check(outcome.measures, limiting);
        outcome.errors.extend(errors);
        outcome.measures = measures;
    }
    debug!(
        path = %path.display(),
        format = format.label(),
        errors = outcome.errors.len(),
        "file checked"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metadata, ObservedAt};
    use crate::parameters::limiting;
    use chrono::NaiveDate;

    fn measure(row: usize, day: u32, par_code: &str, value: Option<f64>, valid: bool) -> Measure {
        let meta = Metadata {
            cod_utente: "70001".to_string(),
            row,
            ..Default::default()
        };
        let at = ObservedAt::Day(NaiveDate::from_ymd_opt(2020, 1, day).unwrap());
        Measure::new(meta, at, par_code, value, valid)
    }

    #[test]
    fn test_weak_climatologic_check() {
        let thresholds: Thresholds = [("Tmax".to_string(), (-30.0, 50.0))].into_iter().collect();
        let measures = vec![
            measure(1, 1, "Tmax", Some(51.0), true),
            measure(1, 1, "Tmin", Some(100.0), true),
            measure(2, 2, "Tmax", Some(20.0), true),
            measure(3, 3, "Tmax", Some(-40.0), false),
            measure(4, 4, "Tmax", None, true),
        ];
        let (errors, checked) = weak_climatologic_check(measures, &thresholds);
        assert_eq!(
            errors,
            vec![RowError::new(1, "The value of 'Tmax' is out of range [-30.0, 50.0]")]
        );
        let valid: Vec<bool> = checked.iter().map(|m| m.valid).collect();
        assert_eq!(valid, vec![false, true, true, false, true]);
    }

    #[test]
    fn test_internal_consistency_check() {
        let limiting = limiting(&[("Tmedia", "Tmin", "Tmax")]);
        let measures = vec![
            measure(1, 1, "Tmedia", Some(10.0), true),
            measure(1, 1, "Tmin", Some(5.0), true),
            measure(1, 1, "Tmax", Some(15.0), true),
            measure(2, 2, "Tmedia", Some(3.0), true),
            measure(2, 2, "Tmin", Some(5.0), true),
            measure(2, 2, "Tmax", Some(2.0), true),
            measure(3, 3, "Tmedia", Some(30.0), true),
            measure(3, 3, "Tmin", Some(5.0), true),
            measure(3, 3, "Tmax", Some(15.0), false),
        ];
        let (errors, checked) = internal_consistency_check(measures, &limiting);
        assert_eq!(
            errors,
            vec![
                RowError::new(2, "The values of 'Tmedia' and 'Tmin' are not consistent"),
                RowError::new(2, "The values of 'Tmedia' and 'Tmax' are not consistent"),
            ]
        );
        assert!(!checked[3].valid);
        assert!(checked[6].valid);
        assert_eq!(checked.len(), 9);
    }
}
