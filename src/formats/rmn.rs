//! Files of the Rete Mareografica Nazionale: `;` separated hourly rows whose header names
//! the station together with each parameter.
use chrono::NaiveDateTime;
use std::path::Path;

use crate::formats::{
    base_metadata, reject_not_compliant, valid_measures, Format, FormatError, RowSequence,
    Sequenced,
};
use crate::models::{quoted, Metadata, ObservedAt, ParseOutcome, RowError};
use crate::parameters::ParameterTable;
use crate::utils::{parse_decimal, read_text_lossy};

pub const LABEL: &str = "RMN";

/// A column of the data table
#[derive(Debug, Clone, PartialEq)]
enum Column {
    Date,
    Hour,
    Parameter(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Header {
    /// 1-based line of the header
    line: usize,
    columns: Vec<Column>,
    station: String,
}

fn normalize(token: &str) -> String {
    token.replace(['À', '\u{FFFD}'], "A").replace("Ã\u{80}", "A")
}

fn scan_header(text: &str, params: &ParameterTable) -> Result<Header, String> {
    let (index, line) = text
        .lines()
        .enumerate()
        .find(|(_, l)| l.contains("DATA") && l.contains("ORA"))
        .ok_or_else(|| "RMN header not found".to_string())?;
    let mut columns = Vec::new();
    let mut station = String::new();
    for token in line.split(';') {
        let token = normalize(token.trim());
        match token.as_str() {
            "DATA" => columns.push(Column::Date),
            "ORA" => columns.push(Column::Hour),
            _ => {
                let param = params
                    .iter()
                    .find(|p| !p.description.is_empty() && token.contains(&p.description))
                    .ok_or_else(|| format!("Unknown column on header: {}", quoted(&token)))?;
                if let Some(pos) = token.find(&param.description) {
                    station = token[..pos].trim().to_string();
                }
                columns.push(Column::Parameter(param.par_code.clone()));
            }
        }
    }
    if station.is_empty() {
        return Err("not found station name".to_string());
    }
    Ok(Header {
        line: index + 1,
        columns,
        station,
    })
}

fn is_missing(value: &str) -> bool {
    value.is_empty() || value == "-"
}

/// Time and values of a data row, or the error found
fn parse_row(
    row: &str,
    columns: &[Column],
) -> Result<(NaiveDateTime, Vec<(String, Option<f64>)>), String> {
    let cells: Vec<&str> = row.split(';').map(str::trim).collect();
    let cell = |wanted: &Column| {
        columns
            .iter()
            .position(|c| c == wanted)
            .and_then(|i| cells.get(i).copied())
            .unwrap_or("")
    };
    let time = format!("{} {}", cell(&Column::Date), cell(&Column::Hour));
    let time = NaiveDateTime::parse_from_str(&time, "%Y%m%d %H:%M")
        .map_err(|_| "the reference time for the row is not parsable".to_string())?;
    let mut values = Vec::new();
    for (column, value) in columns.iter().zip(cells.iter().chain(std::iter::repeat(&""))) {
        let Column::Parameter(par_code) = column else {
            continue;
        };
        let value = if is_missing(value) {
            None
        } else {
            Some(
                parse_decimal(value)
                    .ok_or_else(|| format!("the value {} is not numeric", quoted(value)))?,
            )
        };
        values.push((par_code.clone(), value));
    }
    Ok((time, values))
}

fn read_header(path: &Path, params: &ParameterTable) -> Result<(String, Header), FormatError> {
    let text = read_text_lossy(path)?;
    let header = scan_header(&text, params).map_err(FormatError::NotCompliant)?;
    Ok((text, header))
}

fn metadata_from(path: &Path, header: &Header) -> Metadata {
    let mut meta = base_metadata(path, LABEL);
    meta.cod_utente = header.station.clone();
    meta.station.desc = Some(header.station.clone());
    meta
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Rmn;

impl Format for Rmn {
    fn label(&self) -> &'static str {
        LABEL
    }

    fn default_parameters(&self) -> &'static str {
        include_str!("../../templates/rmn_params.csv")
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
        let mut outcome = ParseOutcome::default();
        let mut sequence = RowSequence::new();
        let rows = text.lines().enumerate().map(|(i, r)| (i + 1, r));
        for (i, row) in rows.skip(header.line) {
            if row.trim().is_empty() {
                continue;
            }
            let (time, values) = match parse_row(row, &header.columns) {
                Ok(parsed) => parsed,
                Err(msg) => {
                    outcome.errors.push(RowError::new(i, msg));
                    continue;
                }
            };
            let at = ObservedAt::Instant(time);
            match sequence.push(at, row.trim()) {
                Sequenced::Reject(msg) => {
                    outcome.errors.push(RowError::new(i, msg));
                    continue;
                }
                Sequenced::Repeated => continue,
                Sequenced::Accept => {}
            }
            outcome
                .measures
                .extend(valid_measures(&meta.with_row(i), at, values));
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_LINE: &str = "DATA;ORA;ANCONA DIREZIONE VENTO;ANCONA VELOCIT\u{C0} VENTO;\
ANCONA TEMPERATURA ARIA;ANCONA PRESSIONE;ANCONA UMIDIT\u{C0} RELATIVA";

    fn params() -> ParameterTable {
        Rmn.load_parameters(None).unwrap()
    }

    #[test]
    fn test_scan_header() {
        let text = format!(
            "Stazione di Ancona\n{}\n20180101;00:00;180;1,9;7,2;1018,1;63\n",
            HEADER_LINE
        );
        let header = scan_header(&text, &params()).unwrap();
        assert_eq!(header.line, 2);
        assert_eq!(header.station, "ANCONA");
        assert_eq!(
            header.columns,
            vec![
                Column::Date,
                Column::Hour,
                Column::Parameter("DD".to_string()),
                Column::Parameter("FF".to_string()),
                Column::Parameter("Tmedia".to_string()),
                Column::Parameter("P".to_string()),
                Column::Parameter("UR media".to_string()),
            ]
        );
    }

    #[test]
    fn test_scan_header_errors() {
        assert_eq!(scan_header("no header\n", &params()).unwrap_err(), "RMN header not found");
        assert_eq!(
            scan_header("DATA;ORA;ANCONA NEVE\n", &params()).unwrap_err(),
            "Unknown column on header: 'ANCONA NEVE'"
        );
    }

    #[test]
    fn test_parse_row() {
        let header = scan_header(HEADER_LINE, &params()).unwrap();
        let (time, values) =
            parse_row("20180101;00:00;180;1,9;7,2;1018,1;63", &header.columns).unwrap();
        assert_eq!(time.to_string(), "2018-01-01 00:00:00");
        assert_eq!(
            values,
            vec![
                ("DD".to_string(), Some(180.0)),
                ("FF".to_string(), Some(1.9)),
                ("Tmedia".to_string(), Some(7.2)),
                ("P".to_string(), Some(1018.1)),
                ("UR media".to_string(), Some(63.0)),
            ]
        );
        let (_, values) = parse_row("20180101;01:00;-;;7,2", &header.columns).unwrap();
        assert_eq!(values[0].1, None);
        assert_eq!(values[1].1, None);
        assert_eq!(values[4].1, None);
        assert_eq!(
            parse_row("20180101;25:00;180", &header.columns).unwrap_err(),
            "the reference time for the row is not parsable"
        );
        assert_eq!(
            parse_row("20180101;02:00;18O", &header.columns).unwrap_err(),
            "the value '18O' is not numeric"
        );
    }
}
