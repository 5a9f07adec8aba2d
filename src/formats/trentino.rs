//! Daily series of the Trentino network: one parameter per file, described by a header
//! of a few lines before the data.
use chrono::NaiveDateTime;
use std::path::Path;

use crate::formats::{
    base_metadata, reject_not_compliant, Format, FormatError, RowSequence, Sequenced,
};
use crate::models::{
    format_float, Measure, Metadata, ObservedAt, ParseOutcome, RowError, StationProps,
};
use crate::parameters::ParameterTable;
use crate::utils::{dotted_extension, read_text_lossy, split_csv_line};

pub const LABEL: &str = "TRENTINO";
const HEADER_ERROR: &str = "trentino header not compliant";

/// What the header lines of a file tell about its content
#[derive(Debug, Clone, PartialEq)]
struct Header {
    station_code: String,
    par_code: String,
    props: StationProps,
}

fn header_tokens(line: &str) -> Vec<String> {
    line.split(',')
        .map(|t| t.replace(['"', '\''], "").trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// `T0001 - Pergine Valsugana (Convento) Lat:46.06 Long:11.23 Elev:475.00`
fn parse_station_props(line: &str) -> Option<StationProps> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let tagged = |tag: &str| {
        tokens
            .iter()
            .position(|t| t.starts_with(tag))
            .and_then(|i| tokens[i][tag.len()..].parse::<f64>().ok().map(|v| (i, v)))
    };
    let (lat_index, lat) = tagged("Lat:")?;
    let (_, lon) = tagged("Long:")?;
    let (_, height) = tagged("Elev:")?;
    let dash = tokens.iter().position(|t| *t == "-")?;
    let desc = tokens.get(dash + 1..lat_index)?.join(" ");
    Some(StationProps {
        desc: Some(desc),
        lat: Some(lat),
        lon: Some(lon),
        height: Some(format_float(height)),
        ..Default::default()
    })
}

fn scan_header(text: &str, params: &ParameterTable) -> Result<Header, String> {
    let mut station_code: Option<String> = None;
    let mut par_code: Option<String> = None;
    let mut props_line = String::new();
    for line in text.lines() {
        let tokens = header_tokens(line);
        if tokens.len() < 2 {
            continue;
        }
        if let Some(code) = &station_code {
            if tokens.len() > 3 && tokens[3].starts_with(code.as_str()) {
                props_line = tokens[3].clone();
                break;
            }
        }
        match tokens[0].as_str() {
            "Time" => station_code = Some(tokens[1].clone()),
            "and" => par_code = params.by_key(&tokens[1]).map(|p| p.par_code.clone()),
            _ => {}
        }
    }
    match (station_code, par_code) {
        (Some(station_code), Some(par_code)) if station_code.chars().count() >= 2 => {
            Ok(Header {
                props: parse_station_props(&props_line).unwrap_or_default(),
                station_code,
                par_code,
            })
        }
        _ => Err(HEADER_ERROR.to_string()),
    }
}

fn check_extension(path: &Path) -> Result<(), FormatError> {
    let ext = dotted_extension(path);
    if ext.eq_ignore_ascii_case(".csv") {
        Ok(())
    } else {
        Err(FormatError::NotCompliant(format!(
            "Extension expected must be .csv, found {}",
            ext
        )))
    }
}

fn read_header(path: &Path, params: &ParameterTable) -> Result<(String, Header), FormatError> {
    check_extension(path)?;
    let text = read_text_lossy(path)?;
    let header = scan_header(&text, params).map_err(FormatError::NotCompliant)?;
    Ok((text, header))
}

fn metadata_from(path: &Path, header: &Header) -> Metadata {
    let mut meta = base_metadata(path, LABEL);
    meta.cod_utente = header.station_code.chars().skip(1).collect();
    meta.station = header.props.clone();
    meta
}

/// A data row: `date, value, quality`
#[derive(Debug, Clone, PartialEq)]
struct DataRow {
    date: String,
    value: String,
    quality: String,
}

impl DataRow {
    fn from_line(line: &str) -> Self {
        let mut fields = split_csv_line(line, ',').into_iter().map(|f| f.trim().to_string());
        Self {
            date: fields.next().unwrap_or_default(),
            value: fields.next().unwrap_or_default(),
            quality: fields.next().unwrap_or_default(),
        }
    }

    fn time(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.date, "%H:%M:%S %d/%m/%Y").ok()
    }

    fn validate(&self, par_code: &str) -> Option<String> {
        if self.time().is_none() {
            return Some("the date format is wrong".to_string());
        }
        if self.quality.is_empty() {
            return Some("the value for quality is missing".to_string());
        }
        if !self.value.is_empty() && self.value.parse::<f64>().is_err() {
            return Some(format!("the value for {} is not numeric", par_code));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Trentino;

impl Format for Trentino {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn default_parameters(&self) -> &'static str {
        include_str!("../../templates/trentino_params.csv")
    }

    fn is_format_compliant(&self, path: &Path) -> bool {
        self.load_parameters(None)
            .ok()
            .is_some_and(|params| read_header(path, &params).is_ok())
    }

    fn extract_metadata(
        &self,
        path: &Path,
        params: &ParameterTable,
    ) -> Result<Metadata, FormatError> {
        let (_, header) = read_header(path, params)?;
        Ok(metadata_from(path, &header))
    }

    fn parse(&self, path: &Path, params: &ParameterTable) -> Result<ParseOutcome, FormatError> {
        let (text, header) = match read_header(path, params) {
            Ok(found) => found,
            Err(e) => return reject_not_compliant(e),
        };
        let meta = metadata_from(path, &header);
        let conversion = params
            .by_par_code(&header.par_code)
            .map(|p| p.conversion)
            .unwrap_or(crate::parameters::Conversion::Identity);

        let mut outcome = ParseOutcome::default();
        let mut sequence = RowSequence::new();
        let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));
        for (_, line) in lines.by_ref() {
            let row = DataRow::from_line(line);
            if row.date.is_empty() && row.quality == "Qual" {
                break;
            }
        }
        for (i, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let row = DataRow::from_line(line);
            if let Some(msg) = row.validate(&header.par_code) {
                outcome.errors.push(RowError::new(i, msg));
                continue;
            }
            let Some(time) = row.time() else {
                continue;
            };
            let at = ObservedAt::Day(time.date());
            match sequence.push(at, (row.value.clone(), row.quality.clone())) {
                Sequenced::Reject(msg) => {
                    outcome.errors.push(RowError::new(i, msg));
                    continue;
                }
                Sequenced::Repeated => continue,
                Sequenced::Accept => {}
            }
            let quality = row.quality.as_str();
            let value = if matches!(quality, "151" | "255") || row.value.is_empty() {
                None
            } else {
                row.value.parse::<f64>().ok().map(|v| conversion.apply(v))
            };
            let valid = matches!(quality, "1" | "76" | "151" | "255");
            outcome.measures.push(Measure::new(
                meta.with_row(i),
                at,
                header.par_code.clone(),
                value,
                valid,
            ));
        }
        Ok(outcome)
    }
}
