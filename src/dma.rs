//! Decade, month and year aggregations (DMA) of the daily tables.
//!
//! Each job reads daily records (`cod_aggr = 4`) of a table and writes the aggregations of
//! every station into the same table of a target schema: decades (`cod_aggr = 1`, dated on
//! day 10, 20 and the last day of the month), months (`2`, last day) and years (`3`,
//! December 31).
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

use crate::checks::series::mean_stdev;
use crate::models::{
    FieldValue, Flag, TableItem, COD_AGGR_DECADE, COD_AGGR_MONTH, COD_AGGR_YEAR,
};
use crate::utils::round_to;

pub const ROUND_PRECISION: i32 = 1;
const AT_LEAST_PERC: f64 = 0.75;
const PREC_AT_LEAST_PERC: f64 = 0.9;

/// A daily record read for the aggregations: the values selected and their flag
#[derive(Debug, Clone, PartialEq)]
pub struct DayValues {
    pub cod_staz: i32,
    pub data_i: NaiveDate,
    pub values: Vec<Option<f64>>,
    pub wht: i32,
}

impl DayValues {
    pub fn new(
        cod_staz: i32,
        data_i: NaiveDate,
        values: Vec<Option<f64>>,
        wht: Option<i32>,
    ) -> Self {
        Self {
            cod_staz,
            data_i,
            values,
            wht: wht.unwrap_or(0),
        }
    }

    fn value(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    fn is_valid(&self) -> bool {
        self.wht > 0
    }
}

/// Sub-fields of an aggregated field, relative to it (`flag.ndati`, `val_md`, ...)
pub type SubFields = Vec<(&'static str, FieldValue)>;

/// Aggregation of the records of a period given the number of days expected in it
pub type Aggregator = fn(&[DayValues], usize) -> Option<SubFields>;

fn round(value: f64) -> f64 {
    round_to(value, ROUND_PRECISION)
}

/// `(ndati, wht)`: valid records with a value, and whether they are at least
/// `at_least_perc` of the expected ones
pub fn compute_flag(records: &[DayValues], at_least_perc: f64, num_expected: usize) -> Flag {
    let ndati = records
        .iter()
        .filter(|r| r.is_valid() && r.value(0).is_some())
        .count();
    let wht = num_expected > 0 && ndati as f64 / num_expected as f64 >= at_least_perc;
    Flag::new(ndati as i32, i32::from(wht))
}

fn is_summer(day: NaiveDate) -> bool {
    (6..=8).contains(&day.month())
}

fn is_winter(day: NaiveDate) -> bool {
    matches!(day.month(), 12 | 1 | 2)
}

/// As [`compute_flag`]; a year is also unreliable when its summer and winter valid days
/// differ by more than 20
pub fn compute_temp_flag(records: &[DayValues], at_least_perc: f64, num_expected: usize) -> Flag {
    let flag = compute_flag(records, at_least_perc, num_expected);
    if !matches!(num_expected, 365 | 366) || flag.wht == 0 {
        return flag;
    }
    let valid = || records.iter().filter(|r| r.is_valid() && r.value(0).is_some());
    let summer = valid().filter(|r| is_summer(r.data_i)).count();
    let winter = valid().filter(|r| is_winter(r.data_i)).count();
    if summer.abs_diff(winter) > 20 {
        Flag::new(flag.ndati, 0)
    } else {
        flag
    }
}

fn valid_values(records: &[DayValues], index: usize) -> Vec<f64> {
    records
        .iter()
        .filter(|r| r.is_valid())
        .filter_map(|r| r.value(index))
        .collect()
}

fn flag_fields(flag: Flag) -> SubFields {
    vec![("flag.ndati", flag.ndati.into()), ("flag.wht", flag.wht.into())]
}

fn stdev(values: &[f64]) -> Option<f64> {
    mean_stdev(values).map(|(_, s)| round(s))
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| round(values.iter().sum::<f64>() / values.len() as f64))
}

fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max).map(round)
}

fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min).map(round)
}

/// Mean, standard deviation, maximum and minimum of the first value
pub fn compute_stats(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    let values = valid_values(records, 0);
    if values.is_empty() {
        return None;
    }
    let mut fields = flag_fields(compute_flag(records, AT_LEAST_PERC, num_expected));
    fields.extend([
        ("val_md", FieldValue::from(mean(&values))),
        ("val_vr", FieldValue::from(stdev(&values))),
        ("val_mx", FieldValue::from(max(&values))),
        ("val_mn", FieldValue::from(min(&values))),
    ]);
    Some(fields)
}

/// Bagnatura fogliare: the statistics plus the total
pub fn compute_bagna(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    let mut fields = compute_stats(records, num_expected)?;
    let total: f64 = valid_values(records, 0).iter().sum();
    fields.push(("val_tot", round(total).into()));
    Some(fields)
}

/// Eliofania: total and standard deviation
pub fn compute_elio(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    let values = valid_values(records, 0);
    if values.is_empty() {
        return None;
    }
    let mut fields = flag_fields(compute_flag(records, AT_LEAST_PERC, num_expected));
    fields.extend([
        ("val_md", FieldValue::from(round(values.iter().sum()))),
        ("val_vr", FieldValue::from(stdev(&values))),
    ]);
    Some(fields)
}

/// Gradi giorno: means of the five degree days
pub fn compute_grgg(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    if !records.iter().any(DayValues::is_valid) {
        return None;
    }
    let mut fields = flag_fields(compute_flag(records, AT_LEAST_PERC, num_expected));
    for (i, name) in ["tot00", "tot05", "tot10", "tot15", "tot21"].into_iter().enumerate() {
        fields.push((name, mean(&valid_values(records, i)).into()));
    }
    Some(fields)
}

/// Mean of the mean values, maximum and minimum of the dedicated values (`md, mx, mn`)
/// falling back to the mean values
fn mean_max_min(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    let (md, mx, mn) = (
        valid_values(records, 0),
        valid_values(records, 1),
        valid_values(records, 2),
    );
    if md.is_empty() && mx.is_empty() && mn.is_empty() {
        return None;
    }
    let mut fields = flag_fields(compute_flag(records, AT_LEAST_PERC, num_expected));
    fields.extend([
        ("val_md", FieldValue::from(mean(&md))),
        ("val_vr", FieldValue::from(stdev(&md))),
        ("val_mx", FieldValue::from(max(&mx).or_else(|| max(&md)))),
        ("val_mn", FieldValue::from(min(&mn).or_else(|| min(&md)))),
    ]);
    Some(fields)
}

/// Pressione atmosferica
pub fn compute_press(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    mean_max_min(records, num_expected)
}

/// Umidità relativa
pub fn compute_ur(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    mean_max_min(records, num_expected)
}

/// Vento massimo: the maximum intensity and the direction of the day it was reached
pub fn compute_vntmxgg(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    let best = records
        .iter()
        .filter(|r| r.is_valid())
        .filter_map(|r| r.value(0).map(|ff| (ff, r.value(1))))
        .reduce(|best, r| if r.0 > best.0 { r } else { best })?;
    let mut fields = flag_fields(compute_flag(records, AT_LEAST_PERC, num_expected));
    fields.extend([
        ("ff", FieldValue::from(round(best.0))),
        ("dd", FieldValue::from(best.1.map(round))),
    ]);
    Some(fields)
}

/// Velocità media del vento
pub fn compute_vntmd(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    let values = valid_values(records, 0);
    let ff = mean(&values)?;
    let mut fields = flag_fields(compute_flag(records, AT_LEAST_PERC, num_expected));
    fields.push(("ff", ff.into()));
    Some(fields)
}

/// The valid record with the greatest first value
fn max_record(records: &[DayValues]) -> Option<(&DayValues, f64)> {
    records
        .iter()
        .filter(|r| r.is_valid())
        .filter_map(|r| r.value(0).map(|v| (r, v)))
        .reduce(|best, r| if r.1 > best.1 { r } else { best })
}

fn day_start(day: NaiveDate) -> FieldValue {
    FieldValue::Time(day.and_time(chrono::NaiveTime::MIN))
}

/// Precipitazione cumulata: total, maximum and its day
pub fn compute_prec24(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    let (max_day, val_mx) = max_record(records)?;
    let total: f64 = valid_values(records, 0).iter().sum();
    let mut fields = flag_fields(compute_flag(records, PREC_AT_LEAST_PERC, num_expected));
    fields.extend([
        ("val_tot", FieldValue::from(round(total))),
        ("val_mx", FieldValue::from(round(val_mx))),
        ("data_mx", day_start(max_day.data_i)),
    ]);
    Some(fields)
}

/// Precipitazione cumulata su 1, 6 o 12 ore: maximum and its day
pub fn compute_prec_hours(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    let (max_day, val_mx) = max_record(records)?;
    let mut fields = flag_fields(compute_flag(records, PREC_AT_LEAST_PERC, num_expected));
    fields.extend([
        ("val_mx", FieldValue::from(round(val_mx))),
        ("data_mx", day_start(max_day.data_i)),
    ]);
    Some(fields)
}

const DISTRIBUTION: [&str; 6] = ["dry", "wet_01", "wet_02", "wet_03", "wet_04", "wet_05"];

fn distribution_fields(classes: [usize; 6]) -> SubFields {
    DISTRIBUTION
        .into_iter()
        .zip(classes)
        .map(|(name, count)| (name, FieldValue::from(count)))
        .collect()
}

/// Distribuzione precipitazione cumulata: daily totals counted by class
pub fn compute_cl_prec24(records: &[DayValues], _: usize) -> Option<SubFields> {
    let values = valid_values(records, 0);
    if values.is_empty() {
        return None;
    }
    Some(distribution_fields(crate::compute::wet_distribution(values)))
}

/// Distribuzione precipitazione su 6 o 12 ore: sum of the daily distributions
pub fn compute_cl_prec_hours(records: &[DayValues], _: usize) -> Option<SubFields> {
    let valid: Vec<&DayValues> = records
        .iter()
        .filter(|r| r.is_valid() && r.values.iter().any(Option::is_some))
        .collect();
    if valid.is_empty() {
        return None;
    }
    let mut classes = [0usize; 6];
    for record in valid {
        for (i, class) in classes.iter_mut().enumerate() {
            *class += record.value(i).unwrap_or(0.0).max(0.0) as usize;
        }
    }
    Some(distribution_fields(classes))
}

/// Days with mean temperature and relative humidity (values 0 and 1) satisfying `test`
fn bioclimatic_count(
    records: &[DayValues],
    num_expected: usize,
    test: fn(f64, f64) -> bool,
) -> Option<SubFields> {
    let num = records
        .iter()
        .filter(|r| r.is_valid())
        .filter_map(|r| r.value(0).zip(r.value(1)))
        .filter(|(t, ur)| test(*t, *ur))
        .count();
    let mut fields = flag_fields(compute_flag(records, AT_LEAST_PERC, num_expected));
    fields.push(("num", num.into()));
    Some(fields)
}

/// Indice di freddo secco: tmedia < 5 and UR < 40
pub fn compute_ifs(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    bioclimatic_count(records, num_expected, |t, ur| t < 5.0 && ur < 40.0)
}

/// Indice di freddo umido: tmedia < 5 and UR > 90
pub fn compute_ifu(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    bioclimatic_count(records, num_expected, |t, ur| t < 5.0 && ur > 90.0)
}

/// Indice di caldo secco: tmedia > 25 and UR < 40
pub fn compute_ics(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    bioclimatic_count(records, num_expected, |t, ur| t > 25.0 && ur < 40.0)
}

/// Indice di caldo umido: tmedia > 25 and UR > 90
pub fn compute_icu(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    bioclimatic_count(records, num_expected, |t, ur| t > 25.0 && ur > 90.0)
}

/// Persistenza di siccità e di precipitazione: the three longest dry (`<= 1` mm) and wet
/// sequences of valid days, with their first day and, for the wet ones, the total
pub fn compute_prs_prec(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    let mut dry: Vec<Vec<(NaiveDate, f64)>> = Vec::new();
    let mut wet: Vec<Vec<(NaiveDate, f64)>> = Vec::new();
    let mut last_is_dry: Option<bool> = None;
    for record in records.iter().filter(|r| r.is_valid()) {
        let Some(value) = record.value(0) else {
            continue;
        };
        let is_dry = value <= 1.0;
        let sequences = if is_dry { &mut dry } else { &mut wet };
        if last_is_dry == Some(is_dry) {
            if let Some(current) = sequences.last_mut() {
                current.push((record.data_i, value));
            }
        } else {
            sequences.push(vec![(record.data_i, value)]);
        }
        last_is_dry = Some(is_dry);
    }
    // stable sort keeps the earliest of sequences of equal length first
    dry.sort_by_key(|s| std::cmp::Reverse(s.len()));
    wet.sort_by_key(|s| std::cmp::Reverse(s.len()));

    let mut fields = flag_fields(compute_flag(records, PREC_AT_LEAST_PERC, num_expected));
    let names = [
        ("ndry_01", "datadry_01", "nwet_01", "totwet_01", "datawet_01"),
        ("ndry_02", "datadry_02", "nwet_02", "totwet_02", "datawet_02"),
        ("ndry_03", "datadry_03", "nwet_03", "totwet_03", "datawet_03"),
    ];
    for (i, (ndry, datadry, nwet, totwet, datawet)) in names.into_iter().enumerate() {
        let dry_seq = dry.get(i);
        fields.push((ndry, dry_seq.map(Vec::len).into()));
        fields.push((datadry, dry_seq.map_or(FieldValue::Null, |s| day_start(s[0].0))));
        let wet_seq = wet.get(i);
        fields.push((nwet, wet_seq.map(Vec::len).into()));
        fields.push((
            totwet,
            wet_seq.map(|s| round(s.iter().map(|(_, v)| v).sum())).into(),
        ));
        fields.push((datawet, wet_seq.map_or(FieldValue::Null, |s| day_start(s[0].0))));
    }
    Some(fields)
}

fn temperature(
    records: &[DayValues],
    num_expected: usize,
    extreme: Option<bool>,
) -> Option<SubFields> {
    let values = valid_values(records, 0);
    let val_md = mean(&values)?;
    let mut fields = flag_fields(compute_temp_flag(records, AT_LEAST_PERC, num_expected));
    fields.extend([
        ("val_md", FieldValue::from(val_md)),
        ("val_vr", FieldValue::from(stdev(&values))),
    ]);
    if let Some(highest) = extreme {
        let pick = records
            .iter()
            .filter(|r| r.is_valid())
            .filter_map(|r| r.value(0).map(|v| (r.data_i, v)))
            .reduce(|best, r| match (highest, r.1 > best.1, r.1 < best.1) {
                (true, true, _) | (false, _, true) => r,
                _ => best,
            });
        if let Some((day, value)) = pick {
            fields.extend([("val_x", FieldValue::from(round(value))), ("data_x", day_start(day))]);
        }
    }
    Some(fields)
}

/// Temperatura massima: statistics and the highest value
pub fn compute_tmxgg(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    temperature(records, num_expected, Some(true))
}

/// Temperatura minima: statistics and the lowest value
pub fn compute_tmngg(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    temperature(records, num_expected, Some(false))
}

/// Temperatura media
pub fn compute_tmdgg(records: &[DayValues], num_expected: usize) -> Option<SubFields> {
    temperature(records, num_expected, None)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map_or(30, |d| d.day())
}

fn decade(day: NaiveDate) -> u32 {
    match day.day() {
        1..=10 => 1,
        11..=20 => 2,
        _ => 3,
    }
}

/// An aggregated row: `(cod_staz, data_i, cod_aggr, sub-fields)`
pub type DmaRecord = (i32, NaiveDate, i16, SubFields);

/// Aggregations by year, month and decade of records sorted by station and day
pub fn compute_dma_records(records: &[DayValues], aggregate: Aggregator) -> Vec<DmaRecord> {
    let mut years = Vec::new();
    let mut months = Vec::new();
    let mut decades = Vec::new();
    for station in records.chunk_by(|a, b| a.cod_staz == b.cod_staz) {
        let cod_staz = station[0].cod_staz;
        for year_records in station.chunk_by(|a, b| a.data_i.year() == b.data_i.year()) {
            let year = year_records[0].data_i.year();
            let expected = if NaiveDate::from_ymd_opt(year, 2, 29).is_some() { 366 } else { 365 };
            if let (Some(date), Some(fields)) = (
                NaiveDate::from_ymd_opt(year, 12, 31),
                aggregate(year_records, expected),
            ) {
                years.push((cod_staz, date, COD_AGGR_YEAR, fields));
            }
            let same_month = |a: &DayValues, b: &DayValues| a.data_i.month() == b.data_i.month();
            for month_records in year_records.chunk_by(same_month) {
                let month = month_records[0].data_i.month();
                let last_day = days_in_month(year, month);
                if let (Some(date), Some(fields)) = (
                    NaiveDate::from_ymd_opt(year, month, last_day),
                    aggregate(month_records, last_day as usize),
                ) {
                    months.push((cod_staz, date, COD_AGGR_MONTH, fields));
                }
                let same_decade =
                    |a: &DayValues, b: &DayValues| decade(a.data_i) == decade(b.data_i);
                for dec_records in month_records.chunk_by(same_decade) {
                    let (day, expected) = match decade(dec_records[0].data_i) {
                        3 => (last_day, last_day as usize - 20),
                        d => (d * 10, 10),
                    };
                    if let (Some(date), Some(fields)) = (
                        NaiveDate::from_ymd_opt(year, month, day),
                        aggregate(dec_records, expected),
                    ) {
                        decades.push((cod_staz, date, COD_AGGR_DECADE, fields));
                    }
                }
            }
        }
    }
    years.into_iter().chain(months).chain(decades).collect()
}

/// A field of a job: the expressions to select for it and how to aggregate them
#[derive(Clone, Copy)]
pub struct DmaPart {
    pub field: &'static str,
    /// Value expressions, in the order the aggregator reads them
    pub columns: &'static [&'static str],
    /// Expression of the flag validating the values
    pub flag: &'static str,
    pub aggregate: Aggregator,
}

/// An aggregation job over a daily table
#[derive(Clone, Copy)]
pub struct DmaJob {
    pub name: &'static str,
    pub table: &'static str,
    /// Source of the records, `{schema}` being replaced by the start schema
    pub from: &'static str,
    pub parts: &'static [DmaPart],
}

impl DmaJob {
    pub fn from_clause(&self, schema: &str) -> String {
        self.from.replace("{schema}", schema)
    }
}

macro_rules! simple_part {
    ($field:literal, $aggregate:expr) => {
        DmaPart {
            field: $field,
            columns: &[concat!("(", $field, ").val_md")],
            flag: concat!("((", $field, ").flag).wht"),
            aggregate: $aggregate,
        }
    };
}

const PREC_FLAG: &str = "((prec24).flag).wht";

/// The aggregation jobs, in the order they run
pub const JOBS: [DmaJob; 12] = [
    DmaJob {
        name: "bagnatura",
        table: "ds__bagna",
        from: "{schema}.ds__bagna",
        parts: &[simple_part!("bagna", compute_bagna)],
    },
    DmaJob {
        name: "bilancio idrico",
        table: "ds__delta_idro",
        from: "{schema}.ds__delta_idro",
        parts: &[simple_part!("deltaidro", compute_stats)],
    },
    DmaJob {
        name: "eliofania",
        table: "ds__elio",
        from: "{schema}.ds__elio",
        parts: &[simple_part!("elio", compute_elio)],
    },
    DmaJob {
        name: "radiazione globale",
        table: "ds__radglob",
        from: "{schema}.ds__radglob",
        parts: &[simple_part!("radglob", compute_stats)],
    },
    DmaJob {
        name: "evapotraspirazione",
        table: "ds__etp",
        from: "{schema}.ds__etp",
        parts: &[simple_part!("etp", compute_stats)],
    },
    DmaJob {
        name: "gradi giorno",
        table: "ds__grgg",
        from: "{schema}.ds__grgg",
        parts: &[DmaPart {
            field: "grgg",
            columns: &[
                "(grgg).tot00",
                "(grgg).tot05",
                "(grgg).tot10",
                "(grgg).tot15",
                "(grgg).tot21",
            ],
            flag: "((grgg).flag).wht",
            aggregate: compute_grgg,
        }],
    },
    DmaJob {
        name: "pressione",
        table: "ds__press",
        from: "{schema}.ds__press",
        parts: &[DmaPart {
            field: "press",
            columns: &["(press).val_md", "(press).val_mx", "(press).val_mn"],
            flag: "((press).flag).wht",
            aggregate: compute_press,
        }],
    },
    DmaJob {
        name: "umidita relativa",
        table: "ds__urel",
        from: "{schema}.ds__urel",
        parts: &[DmaPart {
            field: "ur",
            columns: &["(ur).val_md", "(ur).val_mx", "(ur).val_mn"],
            flag: "((ur).flag).wht",
            aggregate: compute_ur,
        }],
    },
    DmaJob {
        name: "bioclimatologia",
        table: "ds__bioclima",
        from: "{schema}.ds__t200 JOIN {schema}.ds__urel USING (cod_staz, data_i, cod_aggr)",
        parts: &[
            DmaPart {
                field: "ifs",
                columns: &["(tmdgg).val_md", "(ur).val_md"],
                flag: "LEAST(((tmdgg).flag).wht, ((ur).flag).wht)",
                aggregate: compute_ifs,
            },
            DmaPart {
                field: "ifu",
                columns: &["(tmdgg).val_md", "(ur).val_md"],
                flag: "LEAST(((tmdgg).flag).wht, ((ur).flag).wht)",
                aggregate: compute_ifu,
            },
            DmaPart {
                field: "ics",
                columns: &["(tmdgg).val_md", "(ur).val_md"],
                flag: "LEAST(((tmdgg).flag).wht, ((ur).flag).wht)",
                aggregate: compute_ics,
            },
            DmaPart {
                field: "icu",
                columns: &["(tmdgg).val_md", "(ur).val_md"],
                flag: "LEAST(((tmdgg).flag).wht, ((ur).flag).wht)",
                aggregate: compute_icu,
            },
        ],
    },
    DmaJob {
        name: "precipitazione",
        table: "ds__preci",
        from: "{schema}.ds__preci",
        parts: &[
            DmaPart {
                field: "prec24",
                columns: &["(prec24).val_tot"],
                flag: PREC_FLAG,
                aggregate: compute_prec24,
            },
            DmaPart {
                field: "cl_prec24",
                columns: &["(prec24).val_tot"],
                flag: PREC_FLAG,
                aggregate: compute_cl_prec24,
            },
            DmaPart {
                field: "prs_prec",
                columns: &["(prec24).val_tot"],
                flag: PREC_FLAG,
                aggregate: compute_prs_prec,
            },
            DmaPart {
                field: "prec01",
                columns: &["(prec01).val_mx"],
                flag: "((prec01).flag).wht",
                aggregate: compute_prec_hours,
            },
            DmaPart {
                field: "prec06",
                columns: &["(prec06).val_mx"],
                flag: "((prec06).flag).wht",
                aggregate: compute_prec_hours,
            },
            DmaPart {
                field: "prec12",
                columns: &["(prec12).val_mx"],
                flag: "((prec12).flag).wht",
                aggregate: compute_prec_hours,
            },
            DmaPart {
                field: "cl_prec06",
                columns: &[
                    "(cl_prec06).dry",
                    "(cl_prec06).wet_01",
                    "(cl_prec06).wet_02",
                    "(cl_prec06).wet_03",
                    "(cl_prec06).wet_04",
                    "(cl_prec06).wet_05",
                ],
                flag: "((prec06).flag).wht",
                aggregate: compute_cl_prec_hours,
            },
            DmaPart {
                field: "cl_prec12",
                columns: &[
                    "(cl_prec12).dry",
                    "(cl_prec12).wet_01",
                    "(cl_prec12).wet_02",
                    "(cl_prec12).wet_03",
                    "(cl_prec12).wet_04",
                    "(cl_prec12).wet_05",
                ],
                flag: "((prec12).flag).wht",
                aggregate: compute_cl_prec_hours,
            },
        ],
    },
    DmaJob {
        name: "vento",
        table: "ds__vnt10",
        from: "{schema}.ds__vnt10",
        parts: &[
            DmaPart {
                field: "vntmd",
                columns: &["(vntmd).ff"],
                flag: "((vntmd).flag).wht",
                aggregate: compute_vntmd,
            },
            DmaPart {
                field: "vntmxgg",
                columns: &["(vntmxgg).ff", "(vntmxgg).dd"],
                flag: "((vntmxgg).flag).wht",
                aggregate: compute_vntmxgg,
            },
        ],
    },
    DmaJob {
        name: "temperatura",
        table: "ds__t200",
        from: "{schema}.ds__t200",
        parts: &[
            simple_part!("tmxgg", compute_tmxgg),
            simple_part!("tmngg", compute_tmngg),
            simple_part!("tmdgg", compute_tmdgg),
        ],
    },
];

/// Aggregated items of a job, one per station, day and aggregation level, from the daily
/// records selected for each of its parts
pub fn job_items(job: &DmaJob, part_records: &[(DmaPart, Vec<DayValues>)]) -> Vec<TableItem> {
    let mut items: BTreeMap<(i32, NaiveDate, i16), TableItem> = BTreeMap::new();
    for (part, records) in part_records {
        for (cod_staz, data_i, cod_aggr, fields) in compute_dma_records(records, part.aggregate) {
            let item = items
                .entry((cod_staz, data_i, cod_aggr))
                .or_insert_with(|| TableItem::new(job.table, cod_staz, data_i, cod_aggr));
            for (sub_field, value) in fields {
                item.set(format!("{}.{}", part.field, sub_field), value);
            }
        }
    }
    items.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(year: i32, month: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, d).unwrap()
    }

    fn record(data_i: NaiveDate, value: Option<f64>, wht: i32) -> DayValues {
        DayValues::new(1, data_i, vec![value], Some(wht))
    }

    fn get<'a>(fields: &'a SubFields, name: &str) -> Option<&'a FieldValue> {
        fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    #[test]
    fn test_compute_flag() {
        let records: Vec<DayValues> = (1..=10)
            .map(|d| record(day(2000, 1, d), (d <= 8).then_some(1.0), 1))
            .collect();
        assert_eq!(compute_flag(&records, 0.75, 10), Flag::new(8, 1));
        assert_eq!(compute_flag(&records, 0.9, 10), Flag::new(8, 0));
        assert_eq!(compute_flag(&[], 0.75, 10), Flag::new(0, 0));
    }

    #[test]
    fn test_compute_temp_flag() {
        let year: Vec<DayValues> = (0..366)
            .map(|i| day(2000, 1, 1) + chrono::Duration::days(i))
            .filter(|d| d.year() == 2000)
            .map(|d| record(d, Some(10.0), if is_winter(d) && d.day() > 5 { 0 } else { 1 }))
            .collect();
        let flag = compute_temp_flag(&year, 0.75, 366);
        assert_eq!(flag.wht, 0);
        assert_eq!(compute_flag(&year, 0.75, 366).wht, 1);
    }

    #[test]
    fn test_compute_stats() {
        let records = vec![
            record(day(2000, 1, 1), Some(1.0), 1),
            record(day(2000, 1, 2), Some(3.0), 1),
            record(day(2000, 1, 3), Some(100.0), 0),
        ];
        let fields = compute_stats(&records, 10).unwrap();
        assert_eq!(get(&fields, "flag.ndati"), Some(&FieldValue::Int(2)));
        assert_eq!(get(&fields, "flag.wht"), Some(&FieldValue::Int(0)));
        assert_eq!(get(&fields, "val_md"), Some(&FieldValue::Float(2.0)));
        assert_eq!(get(&fields, "val_vr"), Some(&FieldValue::Float(1.4)));
        assert_eq!(get(&fields, "val_mx"), Some(&FieldValue::Float(3.0)));
        assert_eq!(get(&fields, "val_mn"), Some(&FieldValue::Float(1.0)));
        assert_eq!(compute_stats(&records[2..], 10), None);
    }

    #[test]
    fn test_compute_bagna_total() {
        let records = vec![
            record(day(2000, 1, 1), Some(10.0), 1),
            record(day(2000, 1, 2), Some(20.0), 1),
        ];
        let fields = compute_bagna(&records, 10).unwrap();
        assert_eq!(get(&fields, "val_md"), Some(&FieldValue::Float(15.0)));
        assert_eq!(get(&fields, "val_tot"), Some(&FieldValue::Float(30.0)));
    }

    #[test]
    fn test_compute_prec24() {
        let records = vec![
            record(day(2000, 1, 1), Some(0.0), 1),
            record(day(2000, 1, 2), Some(12.5), 1),
            record(day(2000, 1, 3), Some(2.5), 1),
        ];
        let fields = compute_prec24(&records, 3).unwrap();
        assert_eq!(get(&fields, "val_tot"), Some(&FieldValue::Float(15.0)));
        assert_eq!(get(&fields, "val_mx"), Some(&FieldValue::Float(12.5)));
        assert_eq!(get(&fields, "data_mx"), Some(&day_start(day(2000, 1, 2))));
        let classes = compute_cl_prec24(&records, 3).unwrap();
        assert_eq!(get(&classes, "dry"), Some(&FieldValue::Int(1)));
        assert_eq!(get(&classes, "wet_01"), Some(&FieldValue::Int(1)));
        assert_eq!(get(&classes, "wet_03"), Some(&FieldValue::Int(1)));
    }

    #[test]
    fn test_compute_prs_prec() {
        let values = [0.0, 0.0, 5.0, 6.0, 7.0, 0.5, 2.0, 0.0, 0.0, 0.0];
        let records: Vec<DayValues> = values
            .iter()
            .enumerate()
            .map(|(i, v)| record(day(2000, 1, i as u32 + 1), Some(*v), 1))
            .collect();
        let fields = compute_prs_prec(&records, 10).unwrap();
        assert_eq!(get(&fields, "ndry_01"), Some(&FieldValue::Int(3)));
        assert_eq!(get(&fields, "datadry_01"), Some(&day_start(day(2000, 1, 8))));
        assert_eq!(get(&fields, "ndry_02"), Some(&FieldValue::Int(2)));
        assert_eq!(get(&fields, "nwet_01"), Some(&FieldValue::Int(3)));
        assert_eq!(get(&fields, "totwet_01"), Some(&FieldValue::Float(18.0)));
        assert_eq!(get(&fields, "datawet_01"), Some(&day_start(day(2000, 1, 3))));
        assert_eq!(get(&fields, "nwet_02"), Some(&FieldValue::Int(1)));
        assert_eq!(get(&fields, "nwet_03"), Some(&FieldValue::Null));
    }

    #[test]
    fn test_bioclimatic_indexes() {
        let records = vec![
            DayValues::new(1, day(2000, 1, 1), vec![Some(2.0), Some(30.0)], Some(1)),
            DayValues::new(1, day(2000, 1, 2), vec![Some(2.0), Some(95.0)], Some(1)),
            DayValues::new(1, day(2000, 7, 1), vec![Some(30.0), Some(95.0)], Some(1)),
        ];
        for (aggregate, expected) in [
            (compute_ifs as Aggregator, 1),
            (compute_ifu, 1),
            (compute_ics, 0),
            (compute_icu, 1),
        ] {
            let fields = aggregate(&records, 365).unwrap();
            assert_eq!(get(&fields, "num"), Some(&FieldValue::Int(expected)));
        }
    }

    #[test]
    fn test_compute_dma_records() {
        let records: Vec<DayValues> = (1..=31)
            .map(|d| record(day(2001, 1, d), Some(d as f64), 1))
            .chain([record(day(2001, 2, 1), Some(1.0), 1)])
            .collect();
        let found = compute_dma_records(&records, compute_stats);
        let keys: Vec<(NaiveDate, i16)> = found.iter().map(|r| (r.1, r.2)).collect();
        assert_eq!(
            keys,
            vec![
                (day(2001, 12, 31), COD_AGGR_YEAR),
                (day(2001, 1, 31), COD_AGGR_MONTH),
                (day(2001, 2, 28), COD_AGGR_MONTH),
                (day(2001, 1, 10), COD_AGGR_DECADE),
                (day(2001, 1, 20), COD_AGGR_DECADE),
                (day(2001, 1, 31), COD_AGGR_DECADE),
                (day(2001, 2, 10), COD_AGGR_DECADE),
            ]
        );
        // the third decade of January has 11 days
        let third = &found[5].3;
        assert_eq!(get(third, "flag.ndati"), Some(&FieldValue::Int(11)));
        assert_eq!(get(third, "flag.wht"), Some(&FieldValue::Int(1)));
        assert_eq!(get(third, "val_md"), Some(&FieldValue::Float(26.0)));
    }

    #[test]
    fn test_job_items_merge_parts() {
        let job = JOBS[10];
        assert_eq!(job.table, "ds__vnt10");
        let records = vec![DayValues::new(
            3,
            day(2001, 1, 1),
            vec![Some(2.0), Some(90.0)],
            Some(1),
        )];
        let part_records: Vec<(DmaPart, Vec<DayValues>)> = job
            .parts
            .iter()
            .map(|part| (*part, records.clone()))
            .collect();
        let items = job_items(&job, &part_records);
        // one year, one month, one decade
        assert_eq!(items.len(), 3);
        let decade = items.iter().find(|i| i.cod_aggr == COD_AGGR_DECADE).unwrap();
        assert_eq!(decade.get("vntmd.ff"), Some(&FieldValue::Float(2.0)));
        assert_eq!(decade.get("vntmxgg.dd"), Some(&FieldValue::Float(90.0)));
        assert_eq!(decade.station, 3);
    }

    #[test]
    fn test_from_clause() {
        let job = JOBS[8];
        assert_eq!(
            job.from_clause("dailypdbanpaclima"),
            "dailypdbanpaclima.ds__t200 JOIN dailypdbanpaclima.ds__urel USING (cod_staz, data_i, cod_aggr)"
        );
    }
}
