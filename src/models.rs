use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::cmp::Ordering;
use std::fmt;

/// Reference time of a measure: a whole day for daily networks, an instant otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservedAt {
    Day(NaiveDate),
    Instant(NaiveDateTime),
}

impl ObservedAt {
    pub fn date(&self) -> NaiveDate {
        match self {
            ObservedAt::Day(d) => *d,
            ObservedAt::Instant(dt) => dt.date(),
        }
    }

    /// Days sort at midnight
    pub fn as_datetime(&self) -> NaiveDateTime {
        match self {
            ObservedAt::Day(d) => d.and_time(NaiveTime::MIN),
            ObservedAt::Instant(dt) => *dt,
        }
    }

    pub fn hour(&self) -> u32 {
        self.as_datetime().hour()
    }

    pub fn is_instant(&self) -> bool {
        matches!(self, ObservedAt::Instant(_))
    }
}

impl Ord for ObservedAt {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_datetime().cmp(&other.as_datetime())
    }
}

impl PartialOrd for ObservedAt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ObservedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservedAt::Day(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            ObservedAt::Instant(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Properties of a station found inside a data file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationProps {
    pub desc: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub height: Option<String>,
    pub utmx: Option<String>,
    pub utmy: Option<String>,
}

/// Identification of the origin of a measure
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub cod_utente: String,
    pub cod_rete: Option<String>,
    pub cod_utente_prefix: Option<String>,
    pub reghiscentral: Option<String>,
    /// Last two components of the source path (folder/file)
    pub source: String,
    pub format: String,
    /// 1-based row of the measure inside its file
    pub row: usize,
    pub station: StationProps,
}

impl Metadata {
    /// Station code as registered in the stations registry
    pub fn full_cod_utente(&self) -> String {
        match &self.cod_utente_prefix {
            Some(prefix) => format!("{}{}", self.cod_utente, prefix),
            None => self.cod_utente.clone(),
        }
    }

    /// Key identifying a station independently of the row
    pub fn station_key(&self) -> (String, String) {
        (
            self.full_cod_utente(),
            self.cod_rete.clone().unwrap_or_default(),
        )
    }

    pub fn with_row(&self, row: usize) -> Self {
        let mut meta = self.clone();
        meta.row = row;
        meta
    }
}

/// A single parameter value measured by a station
#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub meta: Metadata,
    pub at: ObservedAt,
    pub par_code: String,
    pub value: Option<f64>,
    pub valid: bool,
}

impl Measure {
    pub fn new(
        meta: Metadata,
        at: ObservedAt,
        par_code: impl Into<String>,
        value: Option<f64>,
        valid: bool,
    ) -> Self {
        Self {
            meta,
            at,
            par_code: par_code.into(),
            value,
            valid,
        }
    }

    /// Value usable for computations: valid and not missing
    pub fn usable(&self) -> Option<f64> {
        if self.valid {
            self.value
        } else {
            None
        }
    }
}

/// A formatting problem found in a file. Row 0 is reserved for global errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

impl RowError {
    pub fn new(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            message: message.into(),
        }
    }

    pub fn global(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }

    pub fn is_global(&self) -> bool {
        self.row == 0
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}: {}", self.row, self.message)
    }
}

/// Result of parsing a file: the measures of the well formatted rows and the errors found
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub measures: Vec<Measure>,
    pub errors: Vec<RowError>,
}

impl ParseOutcome {
    pub fn rejected(errors: Vec<RowError>) -> Self {
        Self {
            measures: Vec::new(),
            errors,
        }
    }

    pub fn has_global_error(&self) -> bool {
        self.errors.iter().any(RowError::is_global)
    }
}

/// Aggregation level of a row of a daily table (`cod_aggr`)
pub const COD_AGGR_DECADE: i16 = 1;
pub const COD_AGGR_MONTH: i16 = 2;
pub const COD_AGGR_YEAR: i16 = 3;
pub const COD_AGGR_DAY: i16 = 4;

/// `(ndati, wht)`: number of data used and whether the value is reliable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flag {
    pub ndati: i32,
    pub wht: i32,
}

impl Flag {
    pub const fn new(ndati: i32, wht: i32) -> Self {
        Self { ndati, wht }
    }

    /// Flag of a value copied from daily input data
    pub const fn daily() -> Self {
        Self::new(1, 1)
    }
}

/// Value of a sub-field of a daily table
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Time(NaiveDateTime),
    Null,
}

impl FieldValue {
    pub const TIME_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    /// Inverse of `Display`: empty text is null
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Some(FieldValue::Null);
        }
        if let Ok(i) = text.parse::<i64>() {
            return Some(FieldValue::Int(i));
        }
        if let Ok(f) = text.parse::<f64>() {
            return Some(FieldValue::Float(f));
        }
        NaiveDateTime::parse_from_str(text, Self::TIME_FORMAT)
            .ok()
            .map(FieldValue::Time)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(v) => f.write_str(&format_float(*v)),
            FieldValue::Time(t) => write!(f, "{}", t.format(Self::TIME_FORMAT)),
            FieldValue::Null => Ok(()),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(value.into())
    }
}

impl From<usize> for FieldValue {
    fn from(value: usize) -> Self {
        FieldValue::Int(value as i64)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        FieldValue::Time(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(FieldValue::Null, Into::into)
    }
}

/// Station of a table item by code and network, before it is resolved to `cod_staz`
pub type StationCode = (String, String);

/// A row of a daily table: the station and day it refers to, and the sub-fields to write
/// as dotted paths (`prec24.flag.ndati`)
#[derive(Debug, Clone, PartialEq)]
pub struct TableItem<S = i32> {
    pub table: String,
    pub station: S,
    pub data_i: NaiveDate,
    pub cod_aggr: i16,
    pub fields: Vec<(String, FieldValue)>,
}

impl<S> TableItem<S> {
    pub fn new(table: impl Into<String>, station: S, data_i: NaiveDate, cod_aggr: i16) -> Self {
        Self {
            table: table.into(),
            station,
            data_i,
            cod_aggr,
            fields: Vec::new(),
        }
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        self.fields.push((field.into(), value.into()));
        self
    }

    /// Set `<field>.flag.ndati` and `<field>.flag.wht`
    pub fn set_flag(&mut self, field: &str, flag: Flag) -> &mut Self {
        self.set(format!("{}.flag.ndati", field), flag.ndati)
            .set(format!("{}.flag.wht", field), flag.wht)
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(f, _)| f == field).map(|(_, v)| v)
    }

    pub fn with_station<T>(self, station: T) -> TableItem<T> {
        TableItem {
            table: self.table,
            station,
            data_i: self.data_i,
            cod_aggr: self.cod_aggr,
            fields: self.fields,
        }
    }
}

/// A station as listed in the stations CSV and registered in the stations registry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Station {
    pub cod_utente: String,
    pub cod_rete: String,
    pub nome: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub quota: Option<String>,
    pub source: String,
}

impl Station {
    /// The station a measure was found for, with the properties its file reports
    pub fn from_metadata(meta: &Metadata) -> Self {
        let (cod_utente, cod_rete) = meta.station_key();
        Self {
            cod_utente,
            cod_rete,
            nome: meta.station.desc.clone(),
            lat: meta.station.lat,
            lon: meta.station.lon,
            quota: meta.station.height.clone(),
            source: meta.source.clone(),
        }
    }
}

/// Renders a float the way the reports show thresholds: always with a decimal part
pub(crate) fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Single-quoted rendering used by messages that name a value
pub(crate) fn quoted(value: &str) -> String {
    format!("'{}'", value)
}
