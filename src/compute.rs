//! Daily indicators computed from the measures of a station.
//!
//! Functions working on `day_records` expect the measures of one station, one day and one
//! parameter. Only valid measures with a value are used.
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use tracing::debug;

use crate::checks::series::mean_stdev;
use crate::models::{Flag, Measure, StationCode, TableItem, COD_AGGR_DAY};
use crate::utils::round_to;

/// Decimal digits of computed values
pub const ROUND_PRECISION: i32 = 1;
/// Share of the 24 hourly data needed for a reliable daily value
pub const AT_LEAST_PERC: f64 = 0.75;
const HOURS: f64 = 24.0;

/// `(dry, wet_01, wet_02, wet_03, wet_04, wet_05)`
pub type WetDistribution = [usize; 6];

fn round(value: f64) -> f64 {
    round_to(value, ROUND_PRECISION)
}

fn usable(day_records: &[Measure]) -> Vec<(NaiveDateTime, f64)> {
    day_records
        .iter()
        .filter_map(|m| m.usable().map(|v| (m.at.as_datetime(), v)))
        .collect()
}

fn flag_at_least(ndati: usize, at_least_perc: f64) -> Flag {
    Flag::new(ndati as i32, i32::from(ndati as f64 / HOURS >= at_least_perc))
}

/// The first record with the maximum value
fn max_record(records: &[(NaiveDateTime, f64)]) -> Option<(NaiveDateTime, f64)> {
    records
        .iter()
        .copied()
        .reduce(|best, r| if r.1 > best.1 { r } else { best })
}

fn min_record(records: &[(NaiveDateTime, f64)]) -> Option<(NaiveDateTime, f64)> {
    records
        .iter()
        .copied()
        .reduce(|best, r| if r.1 < best.1 { r } else { best })
}

fn sample_variance(values: &[f64]) -> Option<f64> {
    mean_stdev(values).map(|(_, stdev)| round(stdev * stdev))
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| round(values.iter().sum::<f64>() / values.len() as f64))
}

/// Sums of the records falling in the same group of `hours_interval` hours, timed at the
/// start of the group
pub fn sum_records_by_hour_groups(
    records: &[(NaiveDateTime, f64)],
    hours_interval: u32,
) -> Vec<(NaiveDateTime, f64)> {
    let Some((first, _)) = records.first() else {
        return Vec::new();
    };
    let start = first.date().and_time(NaiveTime::MIN);
    (0..24)
        .step_by(hours_interval as usize)
        .filter_map(|min_hour| {
            let group: Vec<f64> = records
                .iter()
                .filter(|(t, _)| (min_hour..min_hour + hours_interval).contains(&t.hour()))
                .map(|(_, v)| *v)
                .collect();
            (!group.is_empty()).then(|| {
                (
                    start + chrono::Duration::hours(min_hour.into()),
                    group.iter().sum::<f64>(),
                )
            })
        })
        .collect()
}

/// Counts of precipitation values by class: `<= 1`, `(1, 5]`, `(5, 10]`, `(10, 20]`,
/// `(20, 50]`, `> 50`
pub fn wet_distribution(values: impl IntoIterator<Item = f64>) -> WetDistribution {
    let mut classes = [0; 6];
    for value in values {
        let class = match value {
            v if v <= 1.0 => 0,
            v if v <= 5.0 => 1,
            v if v <= 10.0 => 2,
            v if v <= 20.0 => 3,
            v if v <= 50.0 => 4,
            _ => 5,
        };
        classes[class] += 1;
    }
    classes
}

/// Precipitazione cumulata giornaliera: `(flag, val_tot, val_mx, data_mx)`
pub fn prec24(
    day_records: &[Measure],
    at_least_perc: f64,
) -> (Flag, Option<f64>, Option<f64>, Option<NaiveDateTime>) {
    let records = usable(day_records);
    let Some((data_mx, val_mx)) = max_record(&records) else {
        return (Flag::default(), None, None, None);
    };
    let val_tot = round(records.iter().map(|(_, v)| v).sum());
    (
        flag_at_least(records.len(), at_least_perc),
        Some(val_tot),
        Some(val_mx),
        Some(data_mx),
    )
}

pub fn cl_prec24(day_records: &[Measure]) -> WetDistribution {
    wet_distribution(usable(day_records).into_iter().map(|(_, v)| v))
}

/// Maximum of the sums over groups of `hours` hours: `(flag, val_mx, data_mx)`.
///
/// The flag is reliable unless the data are at most `at_least_perc` of the day.
fn prec_hours(
    day_records: &[Measure],
    hours: u32,
    at_least_perc: f64,
) -> Option<(Flag, f64, NaiveDateTime)> {
    let records = usable(day_records);
    if records.is_empty() {
        return None;
    }
    let ndati = records.len();
    let wht = i32::from(ndati as f64 / HOURS > at_least_perc);
    let groups = sum_records_by_hour_groups(&records, hours);
    let (data_mx, val_mx) = max_record(&groups)?;
    Some((Flag::new(ndati as i32, wht), round(val_mx), data_mx))
}

/// Precipitazione cumulata su 1 ora: the hourly maximum
pub fn prec01(day_records: &[Measure], at_least_perc: f64) -> Option<(Flag, f64, NaiveDateTime)> {
    let records = usable(day_records);
    let (data_mx, val_mx) = max_record(&records)?;
    Some((flag_at_least(records.len(), at_least_perc), val_mx, data_mx))
}

pub fn prec06(day_records: &[Measure], at_least_perc: f64) -> Option<(Flag, f64, NaiveDateTime)> {
    prec_hours(day_records, 6, at_least_perc)
}

pub fn prec12(day_records: &[Measure], at_least_perc: f64) -> Option<(Flag, f64, NaiveDateTime)> {
    prec_hours(day_records, 12, at_least_perc)
}

pub fn cl_prec06(day_records: &[Measure]) -> WetDistribution {
    let groups = sum_records_by_hour_groups(&usable(day_records), 6);
    wet_distribution(groups.into_iter().map(|(_, v)| v))
}

pub fn cl_prec12(day_records: &[Measure]) -> WetDistribution {
    let groups = sum_records_by_hour_groups(&usable(day_records), 12);
    wet_distribution(groups.into_iter().map(|(_, v)| v))
}

/// A daily temperature is reliable with enough data, at least one taken in the night
/// (0-8) and one in the day (9-20)
pub fn temperature_flag(day_records: &[Measure], at_least_perc: f64) -> Flag {
    let records = usable(day_records);
    let night = records.iter().any(|(t, _)| t.hour() <= 8);
    let day = records.iter().any(|(t, _)| (9..=20).contains(&t.hour()));
    let flag = flag_at_least(records.len(), at_least_perc);
    Flag::new(flag.ndati, i32::from(flag.wht == 1 && night && day))
}

/// Temperatura media giornaliera: `(flag, val_md, val_vr)`
pub fn tmdgg(day_records: &[Measure], at_least_perc: f64) -> Option<(Flag, f64, Option<f64>)> {
    let values: Vec<f64> = usable(day_records).into_iter().map(|(_, v)| v).collect();
    let val_md = mean(&values)?;
    Some((
        temperature_flag(day_records, at_least_perc),
        val_md,
        sample_variance(&values),
    ))
}

/// Daily extreme temperature: `(flag, val_md, val_vr, val_x, data_x)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extreme {
    pub flag: Flag,
    pub val_md: f64,
    pub val_vr: Option<f64>,
    pub val_x: f64,
    pub data_x: NaiveDateTime,
}

fn extreme(
    day_records: &[Measure],
    at_least_perc: f64,
    pick: fn(&[(NaiveDateTime, f64)]) -> Option<(NaiveDateTime, f64)>,
) -> Option<Extreme> {
    let records = usable(day_records);
    let values: Vec<f64> = records.iter().map(|(_, v)| *v).collect();
    let (data_x, val_x) = pick(&records)?;
    Some(Extreme {
        flag: temperature_flag(day_records, at_least_perc),
        val_md: mean(&values)?,
        val_vr: sample_variance(&values),
        val_x,
        data_x,
    })
}

/// Temperatura massima giornaliera
pub fn tmxgg(day_records: &[Measure], at_least_perc: f64) -> Option<Extreme> {
    extreme(day_records, at_least_perc, max_record)
}

/// Temperatura minima giornaliera
pub fn tmngg(day_records: &[Measure], at_least_perc: f64) -> Option<Extreme> {
    extreme(day_records, at_least_perc, min_record)
}

/// Mean, variance, maximum and minimum of a day: `(flag, val_md, val_vr, val_mx, val_mn)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub flag: Flag,
    pub val_md: Option<f64>,
    pub val_vr: Option<f64>,
    pub val_mx: Option<f64>,
    pub val_mn: Option<f64>,
}

/// Statistics of the mean values, with maximum and minimum taken from the dedicated
/// measures when present
fn mean_max_min(
    means: &[Measure],
    maxs: &[Measure],
    mins: &[Measure],
    at_least_perc: f64,
) -> Option<Stats> {
    let values: Vec<f64> = usable(means).into_iter().map(|(_, v)| v).collect();
    let max_values: Vec<f64> = usable(maxs).into_iter().map(|(_, v)| v).collect();
    let min_values: Vec<f64> = usable(mins).into_iter().map(|(_, v)| v).collect();
    if values.is_empty() && max_values.is_empty() && min_values.is_empty() {
        return None;
    }
    let max_of = |v: &[f64]| v.iter().copied().reduce(f64::max);
    let min_of = |v: &[f64]| v.iter().copied().reduce(f64::min);
    Some(Stats {
        flag: flag_at_least(values.len(), at_least_perc),
        val_md: mean(&values),
        val_vr: sample_variance(&values),
        val_mx: max_of(&max_values).or_else(|| max_of(&values)),
        val_mn: min_of(&min_values).or_else(|| min_of(&values)),
    })
}

/// Pressione atmosferica media, massima e minima
pub fn press(
    pmedia: &[Measure],
    pmax: &[Measure],
    pmin: &[Measure],
    at_least_perc: f64,
) -> Option<Stats> {
    mean_max_min(pmedia, pmax, pmin, at_least_perc)
}

/// Umidità relativa media, massima e minima
pub fn ur(
    umedia: &[Measure],
    umax: &[Measure],
    umin: &[Measure],
    at_least_perc: f64,
) -> Option<Stats> {
    mean_max_min(umedia, umax, umin, at_least_perc)
}

/// Velocità media del vento: `(flag, ff)`
pub fn vntmd(day_records: &[Measure], at_least_perc: f64) -> Option<(Flag, f64)> {
    let values: Vec<f64> = usable(day_records).into_iter().map(|(_, v)| v).collect();
    Some((flag_at_least(values.len(), at_least_perc), mean(&values)?))
}

/// Intensità e direzione massima del vento: `(flag, ff, dd)`, the direction being the one
/// measured at the time of the maximum intensity
pub fn vntmxgg(
    ff_records: &[Measure],
    dd_records: &[Measure],
    at_least_perc: f64,
) -> Option<(Flag, f64, Option<f64>)> {
    let records = usable(ff_records);
    let (time, ff) = max_record(&records)?;
    let dd = usable(dd_records)
        .into_iter()
        .find(|(t, _)| *t == time)
        .map(|(_, v)| v);
    Some((flag_at_least(records.len(), at_least_perc), ff, dd))
}

/// Bagnatura fogliare: `(flag, val_md, val_vr, val_mx, val_mn, val_tot)`
pub fn bagna(day_records: &[Measure], at_least_perc: f64) -> Option<(Stats, f64)> {
    let values: Vec<f64> = usable(day_records).into_iter().map(|(_, v)| v).collect();
    let stats = mean_max_min(day_records, &[], &[], at_least_perc)?;
    Some((stats, round(values.iter().sum())))
}

/// Eliofania: `(flag, val_md, val_vr, val_mx)`, `val_md` being the total of the day
pub fn elio(day_records: &[Measure], at_least_perc: f64) -> Option<(Flag, f64, Option<f64>, f64)> {
    let values: Vec<f64> = usable(day_records).into_iter().map(|(_, v)| v).collect();
    let val_mx = values.iter().copied().reduce(f64::max)?;
    Some((
        flag_at_least(values.len(), at_least_perc),
        round(values.iter().sum()),
        sample_variance(&values),
        val_mx,
    ))
}

/// Radiazione globale: `(flag, val_md, val_vr, val_mx, val_mn)`
pub fn radglob(day_records: &[Measure], at_least_perc: f64) -> Option<Stats> {
    mean_max_min(day_records, &[], &[], at_least_perc)
}

/// Base temperatures of the degree days
pub const GRGG_BASES: [f64; 5] = [0.0, 5.0, 10.0, 15.0, 21.0];

/// Gradi giorno on bases 0, 5, 10, 15 and 21 degrees
pub fn grgg(tmedia: f64) -> (Flag, [f64; 5]) {
    (
        Flag::daily(),
        GRGG_BASES.map(|base| round((tmedia - base).max(0.0))),
    )
}

/// Extraterrestrial radiation (mm/day of evaporated water) at latitude `lat` (degrees)
/// on the day of the year `jd`
fn extraterrestrial_radiation(lat: f64, jd: u32) -> f64 {
    const SOLAR_CONSTANT: f64 = 0.0820;
    let phi = lat.to_radians();
    let angle = 2.0 * PI * f64::from(jd) / 365.0;
    let dr = 1.0 + 0.033 * angle.cos();
    let delta = 0.409 * (angle - 1.39).sin();
    let ws = (-phi.tan() * delta.tan()).clamp(-1.0, 1.0).acos();
    let ra = 24.0 * 60.0 / PI
        * SOLAR_CONSTANT
        * dr
        * (ws * phi.sin() * delta.sin() + phi.cos() * delta.cos() * ws.sin());
    0.408 * ra
}

/// Evapotraspirazione potenziale (Hargreaves)
pub fn etp(tmedia: f64, tmax: f64, tmin: f64, lat: f64, jd: u32) -> Option<(Flag, f64)> {
    if tmax < tmin {
        return None;
    }
    let ra = extraterrestrial_radiation(lat, jd);
    let etp = 0.0023 * ra * (tmedia + 17.8) * (tmax - tmin).sqrt();
    Some((Flag::daily(), round(etp.max(0.0))))
}

/// Bilancio idrico
pub fn deltaidro(prec24: f64, etp: f64) -> (Flag, f64) {
    (Flag::daily(), round(prec24 - etp))
}

/// Table and field receiving the value of each parameter of daily input data
const DAILY_FIELDS: [(&str, &str, &str); 7] = [
    ("PREC", "ds__preci", "prec24.val_tot"),
    ("Tmax", "ds__t200", "tmxgg.val_md"),
    ("Tmin", "ds__t200", "tmngg.val_md"),
    ("Tmedia", "ds__t200", "tmdgg.val_md"),
    ("P", "ds__press", "press.val_md"),
    ("UR media", "ds__urel", "ur.val_md"),
    ("FF", "ds__vnt10", "vntmd.ff"),
];

/// Measures of a station and day grouped by parameter
type DayMeasures<'a> = BTreeMap<&'a str, Vec<Measure>>;

fn records<'a>(day: &'a DayMeasures, par_code: &str) -> &'a [Measure] {
    day.get(par_code).map(Vec::as_slice).unwrap_or(&[])
}

fn hourly_items(
    station: &StationCode,
    date: NaiveDate,
    day: &DayMeasures,
) -> Vec<TableItem<StationCode>> {
    let new_item = |table: &str| TableItem::new(table, station.clone(), date, COD_AGGR_DAY);
    let mut items = Vec::new();

    let prec = records(day, "PREC");
    if let (flag, Some(val_tot), val_mx, data_mx) = prec24(prec, AT_LEAST_PERC) {
        let mut item = new_item("ds__preci");
        item.set_flag("prec24", flag)
            .set("prec24.val_tot", val_tot)
            .set("prec24.val_mx", val_mx)
            .set("prec24.data_mx", data_mx);
        set_distribution(&mut item, "cl_prec24", cl_prec24(prec));
        for (field, found) in [
            ("prec01", prec01(prec, AT_LEAST_PERC)),
            ("prec06", prec06(prec, AT_LEAST_PERC)),
            ("prec12", prec12(prec, AT_LEAST_PERC)),
        ] {
            if let Some((flag, val_mx, data_mx)) = found {
                item.set_flag(field, flag)
                    .set(format!("{}.val_mx", field), val_mx)
                    .set(format!("{}.data_mx", field), data_mx);
            }
        }
        set_distribution(&mut item, "cl_prec06", cl_prec06(prec));
        set_distribution(&mut item, "cl_prec12", cl_prec12(prec));
        items.push(item);
    }

    let tmedia = records(day, "Tmedia");
    let tmax = Some(records(day, "Tmax")).filter(|r| !r.is_empty()).unwrap_or(tmedia);
    let tmin = Some(records(day, "Tmin")).filter(|r| !r.is_empty()).unwrap_or(tmedia);
    let mut item = new_item("ds__t200");
    if let Some((flag, val_md, val_vr)) = tmdgg(tmedia, AT_LEAST_PERC) {
        item.set_flag("tmdgg", flag)
            .set("tmdgg.val_md", val_md)
            .set("tmdgg.val_vr", val_vr);
    }
    for (field, found) in [
        ("tmxgg", tmxgg(tmax, AT_LEAST_PERC)),
        ("tmngg", tmngg(tmin, AT_LEAST_PERC)),
    ] {
        if let Some(e) = found {
            item.set_flag(field, e.flag)
                .set(format!("{}.val_md", field), e.val_md)
                .set(format!("{}.val_vr", field), e.val_vr)
                .set(format!("{}.val_x", field), e.val_x)
                .set(format!("{}.data_x", field), e.data_x);
        }
    }
    if !item.fields.is_empty() {
        items.push(item);
    }

    for (table, field, found) in [
        (
            "ds__press",
            "press",
            press(records(day, "P"), records(day, "Pmax"), records(day, "Pmin"), AT_LEAST_PERC),
        ),
        (
            "ds__urel",
            "ur",
            ur(
                records(day, "UR media"),
                records(day, "UR max"),
                records(day, "UR min"),
                AT_LEAST_PERC,
            ),
        ),
        ("ds__radglob", "radglob", radglob(records(day, "RADSOL"), AT_LEAST_PERC)),
    ] {
        if let Some(stats) = found {
            let mut item = new_item(table);
            set_stats(&mut item, field, &stats);
            items.push(item);
        }
    }

    let mut item = new_item("ds__vnt10");
    if let Some((flag, ff)) = vntmd(records(day, "FF"), AT_LEAST_PERC) {
        item.set_flag("vntmd", flag).set("vntmd.ff", ff);
    }
    if let Some((flag, ff, dd)) = vntmxgg(records(day, "FF"), records(day, "DD"), AT_LEAST_PERC) {
        item.set_flag("vntmxgg", flag)
            .set("vntmxgg.ff", ff)
            .set("vntmxgg.dd", dd);
    }
    if !item.fields.is_empty() {
        items.push(item);
    }

    if let Some((stats, val_tot)) = bagna(records(day, "Bagnatura_f"), AT_LEAST_PERC) {
        let mut item = new_item("ds__bagna");
        set_stats(&mut item, "bagna", &stats);
        item.set("bagna.val_tot", val_tot);
        items.push(item);
    }

    let insol = Some(records(day, "INSOL"))
        .filter(|r| !r.is_empty())
        .unwrap_or(records(day, "INSOL_00"));
    if let Some((flag, val_md, val_vr, val_mx)) = elio(insol, AT_LEAST_PERC) {
        let mut item = new_item("ds__elio");
        item.set_flag("elio", flag)
            .set("elio.val_md", val_md)
            .set("elio.val_vr", val_vr)
            .set("elio.val_mx", val_mx);
        items.push(item);
    }
    items
}

fn set_stats<S>(item: &mut TableItem<S>, field: &str, stats: &Stats) {
    item.set_flag(field, stats.flag)
        .set(format!("{}.val_md", field), stats.val_md)
        .set(format!("{}.val_vr", field), stats.val_vr)
        .set(format!("{}.val_mx", field), stats.val_mx)
        .set(format!("{}.val_mn", field), stats.val_mn);
}

fn set_distribution<S>(item: &mut TableItem<S>, field: &str, classes: WetDistribution) {
    let names = ["dry", "wet_01", "wet_02", "wet_03", "wet_04", "wet_05"];
    for (name, count) in names.iter().zip(classes) {
        item.set(format!("{}.{}", field, name), count);
    }
}

/// Daily input data are copied, one item per table, with flag `(1, 1)`
fn daily_items(
    station: &StationCode,
    date: NaiveDate,
    day: &DayMeasures,
) -> Vec<TableItem<StationCode>> {
    let mut items: Vec<TableItem<StationCode>> = Vec::new();
    for (par_code, table, field) in DAILY_FIELDS {
        let Some(value) = records(day, par_code).iter().find_map(Measure::usable) else {
            continue;
        };
        let position = match items.iter().position(|i| i.table == table) {
            Some(position) => position,
            None => {
                items.push(TableItem::new(table, station.clone(), date, COD_AGGR_DAY));
                items.len() - 1
            }
        };
        let root = field.split('.').next().unwrap_or(field);
        items[position].set_flag(root, Flag::daily()).set(field, value);
    }
    items
}

/// Indicator items for the measures of any station and day, hourly measures being
/// aggregated and daily ones copied
pub fn compute_daily_indicators(measures: &[Measure]) -> Vec<TableItem<StationCode>> {
    let mut groups: BTreeMap<(StationCode, NaiveDate, bool), DayMeasures> = BTreeMap::new();
    for measure in measures {
        let key = (measure.meta.station_key(), measure.at.date(), measure.at.is_instant());
        groups
            .entry(key)
            .or_default()
            .entry(measure.par_code.as_str())
            .or_default()
            .push(measure.clone());
    }
    let items: Vec<TableItem<StationCode>> = groups
        .iter()
        .flat_map(|((station, date, hourly), day)| {
            if *hourly {
                hourly_items(station, *date, day)
            } else {
                daily_items(station, *date, day)
            }
        })
        .collect();
    debug!(measures = measures.len(), items = items.len(), "daily indicators computed");
    items
}

/// Day of the year used by [`etp`]
pub fn julian_day(date: NaiveDate) -> u32 {
    date.ordinal()
}
