//! Parameter tables: where each format stores its parameters, how raw values are
//! converted and which thresholds the weak climatologic check applies.
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::utils::{parse_decimal, read_text_lossy, round_to};

#[derive(Error, Debug)]
pub enum ParameterError {
    #[error("Failed to read parameter file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parameter file header must be {expected:?}, found {found:?}")]
    InvalidHeader { expected: String, found: String },

    #[error("Invalid parameter row {row}: {msg}")]
    InvalidRow { row: usize, msg: String },
}

pub const HEADER: &str = "key;par_code;description;min;max;conversion";

/// Conversion applied to a raw value before storing it
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Conversion {
    Identity,
    Divide(f64),
    Multiply(f64),
    FahrenheitToCelsius,
    KnotsToMetersPerSecond,
    MilesToMeters,
    InchesToMillimeters,
}

impl Conversion {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Conversion::Identity => value,
            Conversion::Divide(d) => value / d,
            Conversion::Multiply(m) => value * m,
            Conversion::FahrenheitToCelsius => round_to((value - 32.0) * 5.0 / 9.0, 4),
            Conversion::KnotsToMetersPerSecond => round_to(value * 0.5144, 4),
            Conversion::MilesToMeters => round_to(value * 1609.34, 4),
            Conversion::InchesToMillimeters => round_to(value * 25.4, 4),
        }
    }
}

impl FromStr for Conversion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let factor = |raw: &str| {
            parse_decimal(raw)
                .filter(|f| *f != 0.0)
                .ok_or_else(|| format!("invalid conversion factor {:?}", raw))
        };
        match s.to_ascii_uppercase().as_str() {
            "" => Ok(Conversion::Identity),
            "F2C" => Ok(Conversion::FahrenheitToCelsius),
            "KNOTS" => Ok(Conversion::KnotsToMetersPerSecond),
            "MILES" => Ok(Conversion::MilesToMeters),
            "INCHES" => Ok(Conversion::InchesToMillimeters),
            _ => {
                if let Some(raw) = s.strip_prefix('/') {
                    Ok(Conversion::Divide(factor(raw)?))
                } else if let Some(raw) = s.strip_prefix('*') {
                    Ok(Conversion::Multiply(factor(raw)?))
                } else {
                    Err(format!("unknown conversion {:?}", s))
                }
            }
        }
    }
}

/// A parameter stored by a format
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub key: String,
    pub par_code: String,
    pub description: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub conversion: Conversion,
}

impl Parameter {
    /// Key interpreted as a 1-based position
    pub fn position(&self) -> Option<usize> {
        self.key.trim().parse().ok()
    }
}

/// The parameters of a format, in file order
#[derive(Debug, Clone, Default)]
pub struct ParameterTable {
    parameters: Vec<Parameter>,
}

impl ParameterTable {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ParameterError> {
        let text = read_text_lossy(path)?;
        Self::from_csv(&text)
    }

    pub fn from_csv(text: &str) -> Result<Self, ParameterError> {
        let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
        let header = lines
            .next()
            .map(|(_, l)| l.trim().trim_start_matches('\u{feff}').to_string())
            .unwrap_or_default();
        let columns: Vec<&str> = header.split(';').map(str::trim).collect();
        if columns != HEADER.split(';').collect::<Vec<_>>() {
            return Err(ParameterError::InvalidHeader {
                expected: HEADER.to_string(),
                found: header,
            });
        }

        let mut parameters = Vec::new();
        for (i, line) in lines {
            let cells: Vec<&str> = line.split(';').map(str::trim).collect();
            if cells.len() != 6 {
                return Err(ParameterError::InvalidRow {
                    row: i + 1,
                    msg: format!("expected 6 columns, found {}", cells.len()),
                });
            }
            let conversion = cells[5]
                .parse::<Conversion>()
                .map_err(|msg| ParameterError::InvalidRow { row: i + 1, msg })?;
            parameters.push(Parameter {
                key: cells[0].to_string(),
                par_code: cells[1].to_string(),
                description: cells[2].to_string(),
                min: parse_decimal(cells[3]),
                max: parse_decimal(cells[4]),
                conversion,
            });
        }
        Ok(Self { parameters })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn by_key(&self, key: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.key == key)
    }

    pub fn by_position(&self, position: usize) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.position() == Some(position))
    }

    pub fn by_par_code(&self, par_code: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.par_code == par_code)
    }

    /// `{par_code: (min, max)}` of the parameters with both thresholds numeric
    pub fn thresholds(&self) -> Thresholds {
        self.parameters
            .iter()
            .filter_map(|p| match (p.min, p.max) {
                (Some(min), Some(max)) => Some((p.par_code.clone(), (min, max))),
                _ => None,
            })
            .collect()
    }
}

pub type Thresholds = HashMap<String, (f64, f64)>;

/// `{par_code: (par_code_of_minimum, par_code_of_maximum)}`
pub type LimitingParameters = HashMap<String, (String, String)>;

pub fn limiting(pairs: &[(&str, &str, &str)]) -> LimitingParameters {
    pairs
        .iter()
        .map(|(par, min, max)| (par.to_string(), (min.to_string(), max.to_string())))
        .collect()
}
