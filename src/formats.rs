//! Station file formats of the regional networks feeding SCIA.
//!
//! Every format reads a file into [`Measure`]s plus the list of formatting errors found.
//! Rows with errors are skipped; a global error (row 0) means nothing was parsed.
pub mod arpa;
pub mod arpa19;
pub mod arpa21;
pub mod arpafvg;
pub mod bolzano;
pub mod hiscentral;
pub mod noaa;
pub mod rmn;
pub mod trentino;

use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::models::{Measure, Metadata, ObservedAt, ParseOutcome, RowError};
use crate::parameters::{LimitingParameters, ParameterError, ParameterTable};
use crate::utils::{folder2props, parent_folder_name, source_label};

pub use arpa19::Arpa19;
pub use arpa21::Arpa21;
pub use arpafvg::ArpaFvg;
pub use bolzano::Bolzano;
pub use hiscentral::Hiscentral;
pub use noaa::Noaa;
pub use rmn::Rmn;
pub use trentino::Trentino;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open workbook: {0}")]
    WorkbookOpen(String),

    /// The file does not follow the conventions of the format
    #[error("{0}")]
    NotCompliant(String),

    #[error(transparent)]
    Parameters(#[from] ParameterError),
}

/// A station file format
pub trait Format: Send + Sync {
    /// Label used in reports and exported data (e.g. `ARPA-19`)
    fn label(&self) -> &'static str;

    /// Embedded parameter table used when no custom one is given
    fn default_parameters(&self) -> &'static str;

    /// `{par: (min_par, max_par)}` for the internal consistency check
    fn limiting_parameters(&self) -> LimitingParameters {
        LimitingParameters::new()
    }

    fn load_parameters(&self, path: Option<&Path>) -> Result<ParameterTable, ParameterError> {
        match path {
            Some(path) => ParameterTable::from_path(path),
            None => ParameterTable::from_csv(self.default_parameters()),
        }
    }

    /// Cheap test on name and first rows to recognise the format
    fn is_format_compliant(&self, path: &Path) -> bool;

    fn extract_metadata(
        &self,
        path: &Path,
        params: &ParameterTable,
    ) -> Result<Metadata, FormatError>;

    /// Read the measures of the well formatted rows and the errors found
    fn parse(&self, path: &Path, params: &ParameterTable) -> Result<ParseOutcome, FormatError>;

    /// Formatting errors of a file, row 0 for global errors
    fn validate(&self, path: &Path, params: &ParameterTable) -> Result<Vec<RowError>, FormatError> {
        Ok(self.parse(path, params)?.errors)
    }
}

/// All supported formats, in the order they are tried by [`guess_format`]
pub fn registry() -> Vec<Box<dyn Format>> {
    vec![
        Box::new(Arpa19),
        Box::new(Arpa21),
        Box::new(ArpaFvg),
        Box::new(Bolzano),
        Box::new(Hiscentral),
        Box::new(Noaa),
        Box::new(Rmn),
        Box::new(Trentino),
    ]
}

pub fn by_label(label: &str) -> Option<Box<dyn Format>> {
    registry()
        .into_iter()
        .find(|f| f.label().eq_ignore_ascii_case(label))
}

/// The first format the file is compliant with
pub fn guess_format(path: &Path) -> Option<Box<dyn Format>> {
    let found = registry().into_iter().find(|f| f.is_format_compliant(path));
    match &found {
        Some(format) => debug!(path = %path.display(), format = format.label(), "format guessed"),
        None => debug!(path = %path.display(), "unknown format"),
    }
    found
}

/// Metadata every format derives from the file location
pub(crate) fn base_metadata(path: &Path, label: &str) -> Metadata {
    let props = folder2props(&parent_folder_name(path));
    Metadata {
        source: source_label(path),
        format: label.to_string(),
        cod_rete: props.cod_rete,
        cod_utente_prefix: props.cod_utente_prefix,
        reghiscentral: props.reghiscentral,
        ..Default::default()
    }
}

/// Non compliance found while reading the metadata becomes a global error of the file
pub(crate) fn reject_not_compliant(error: FormatError) -> Result<ParseOutcome, FormatError> {
    match error {
        FormatError::NotCompliant(msg) => Ok(ParseOutcome::rejected(vec![RowError::global(msg)])),
        e => Err(e),
    }
}

/// Detects rows out of order or duplicated with a different content
pub(crate) struct RowSequence<K: PartialEq> {
    last: Option<(ObservedAt, K)>,
}

pub(crate) const MSG_DUPLICATED: &str = "the row is duplicated with different values";
pub(crate) const MSG_NOT_AFTER: &str = "the row is not strictly after the previous";

/// What to do with a row after the ordering test
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Sequenced {
    Accept,
    /// Same time and content of the previous row
    Repeated,
    Reject(&'static str),
}

impl<K: PartialEq> RowSequence<K> {
    pub fn new() -> Self {
        Self { last: None }
    }

    pub fn push(&mut self, at: ObservedAt, content: K) -> Sequenced {
        if let Some((last_at, last_content)) = &self.last {
            if at == *last_at {
                if *last_content != content {
                    return Sequenced::Reject(MSG_DUPLICATED);
                }
                return Sequenced::Repeated;
            }
            if at < *last_at {
                return Sequenced::Reject(MSG_NOT_AFTER);
            }
        }
        self.last = Some((at, content));
        Sequenced::Accept
    }
}

/// Measures of a row whose values are all valid
pub(crate) fn valid_measures(
    meta: &Metadata,
    at: ObservedAt,
    values: impl IntoIterator<Item = (String, Option<f64>)>,
) -> Vec<Measure> {
    values
        .into_iter()
        .map(|(par_code, value)| Measure::new(meta.clone(), at, par_code, value, true))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> ObservedAt {
        ObservedAt::Day(NaiveDate::from_ymd_opt(2020, 1, d).unwrap())
    }

    #[test]
    fn test_row_sequence() {
        let mut seq = RowSequence::new();
        assert_eq!(seq.push(day(1), "a"), Sequenced::Accept);
        assert_eq!(seq.push(day(1), "a"), Sequenced::Repeated);
        assert_eq!(seq.push(day(1), "b"), Sequenced::Reject(MSG_DUPLICATED));
        assert_eq!(seq.push(day(3), "c"), Sequenced::Accept);
        assert_eq!(seq.push(day(2), "d"), Sequenced::Reject(MSG_NOT_AFTER));
        assert_eq!(seq.push(day(4), "e"), Sequenced::Accept);
    }

    #[test]
    fn test_registry_labels() {
        let labels: Vec<&str> = registry().iter().map(|f| f.label()).collect();
        assert_eq!(
            labels,
            vec![
                "ARPA-19",
                "ARPA-21",
                "ARPA-FVG",
                "BOLZANO",
                "HISCENTRAL",
                "NOAA",
                "RMN",
                "TRENTINO",
            ]
        );
    }

    #[test]
    fn test_default_parameters_load() {
        for format in registry() {
            let table = format.load_parameters(None).unwrap();
            assert!(!table.is_empty(), "{} has no parameters", format.label());
        }
    }

    #[test]
    fn test_by_label() {
        assert_eq!(by_label("noaa").unwrap().label(), "NOAA");
        assert!(by_label("ARPA-ER").is_none());
    }
}
