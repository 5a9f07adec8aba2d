//! ARPA files with 21 parameters per row
use chrono::Duration;
use std::path::Path;

use crate::formats::arpa::DatLayout;
use crate::formats::arpa19::arpa_limiting_parameters;
use crate::formats::{Format, FormatError};
use crate::models::{Metadata, ParseOutcome};
use crate::parameters::{LimitingParameters, ParameterTable};

pub const LABEL: &str = "ARPA-21";

pub(crate) fn layout() -> DatLayout {
    DatLayout {
        label: LABEL,
        values: 21,
        shift: Duration::zero(),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Arpa21;

impl Format for Arpa21 {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn default_parameters(&self) -> &'static str {
        include_str!("../../templates/arpa21_params.csv")
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
