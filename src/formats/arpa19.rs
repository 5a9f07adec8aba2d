//! ARPA files with 19 parameters per row. Times are read one hour ahead of the
//! reference hour of the measure.
use chrono::Duration;
use std::path::Path;

use crate::formats::arpa::DatLayout;
use crate::formats::{Format, FormatError};
use crate::models::{Metadata, ParseOutcome};
use crate::parameters::{limiting, LimitingParameters, ParameterTable};

pub const LABEL: &str = "ARPA-19";

pub(crate) fn layout() -> DatLayout {
    DatLayout {
        label: LABEL,
        values: 19,
        shift: Duration::hours(1),
    }
}

/// Limits of the consistency check shared by the ARPA `.dat` files
pub(crate) fn arpa_limiting_parameters() -> LimitingParameters {
    limiting(&[
        ("Tmedia", "Tmin", "Tmax"),
        ("UR media", "UR min", "UR max"),
        ("P", "Pmin", "Pmax"),
    ])
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Arpa19;

impl Format for Arpa19 {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn default_parameters(&self) -> &'static str {
        include_str!("../../templates/arpa19_params.csv")
    }

    fn limiting_parameters(&self) -> LimitingParameters {
        arpa_limiting_parameters()
    }

    fn is_format_compliant(&self, path: &Path) -> bool {
        layout().is_format_compliant(path)
    }

    fn extract_metadata(&self, path: &Path, _: &ParameterTable) -> Result<Metadata, FormatError> {
        layout().extract_metadata(path)
    }

    fn parse(&self, path: &Path, params: &ParameterTable) -> Result<ParseOutcome, FormatError> {
        layout().parse(path, params)
    }
}
