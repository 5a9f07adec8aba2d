//! Checks on daily series read from the database.
//!
//! Records are sorted by station and day. Every check marks the records it rejects with a
//! negative flag. Flags set by a previous check (`<= -10`) and flags validated by an
//! operator (`5`) are never overwritten.
use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;
use tracing::debug;

pub const VALIDATED_FLAG: i32 = 5;

pub const FLAG_CONSISTENCY: i32 = -10;
pub const FLAG_REPEATED_ZEROS: i32 = -11;
pub const FLAG_REPEATED_VALUES: i32 = -12;
pub const FLAG_DUPLICATED_MONTHS: i32 = -13;
pub const FLAG_DUPLICATED_MONTHS_YEARS: i32 = -14;
pub const FLAG_TMAX_EQ_TMIN: i32 = -15;
pub const FLAG_TMAX_EQ_TMIN_ZERO: i32 = -16;
pub const FLAG_WORLD_EXCEDENCE: i32 = -17;
pub const FLAG_GAP: i32 = -18;
pub const FLAG_TEMPERATURE_ZSCORE: i32 = -19;
pub const FLAG_PRECIPITATION_ZSCORE: i32 = -20;
pub const FLAG_JUMP: i32 = -21;
pub const FLAG_TMAX_LT_TMIN: i32 = -22;
pub const FLAG_DTR: i32 = -23;
pub const FLAG_PRECIPITATION_ZSCORE_ICE: i32 = -26;

/// Precipitation up to this amount makes a dry day
const DRY_DAY_PREC: f64 = 1.0;

/// A value and its validation flag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub value: Option<f64>,
    pub flag: i32,
}

impl Slot {
    /// A missing flag counts as valid
    pub fn new(value: Option<f64>, flag: Option<i32>) -> Self {
        Self {
            value,
            flag: flag.unwrap_or(1),
        }
    }
}

/// A daily record of a station: `cod_staz, data_i` and the values under analysis
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRecord {
    pub cod_staz: i32,
    pub data_i: NaiveDate,
    pub slots: Vec<Slot>,
}

/// Address of a value inside a record, and of the flag that validates it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Col {
    pub value: usize,
    pub flag: usize,
}

impl Col {
    pub const fn new(slot: usize) -> Self {
        Self {
            value: slot,
            flag: slot,
        }
    }

    /// A value validated by the flag of another slot
    pub const fn flagged_by(value: usize, flag: usize) -> Self {
        Self { value, flag }
    }
}

impl DailyRecord {
    pub fn new(cod_staz: i32, data_i: NaiveDate, slots: Vec<Slot>) -> Self {
        Self {
            cod_staz,
            data_i,
            slots,
        }
    }

    pub fn value(&self, col: Col) -> Option<f64> {
        self.slots.get(col.value).and_then(|s| s.value)
    }

    pub fn flag(&self, col: Col) -> i32 {
        self.slots.get(col.flag).map_or(1, |s| s.flag)
    }

    /// Value not missing and with a positive flag
    pub fn usable(&self, col: Col) -> Option<f64> {
        self.value(col).filter(|_| self.flag(col) > 0)
    }

    /// Set `flag` unless the record is already flagged or validated by an operator
    pub fn mark(&mut self, col: Col, flag: i32) {
        if let Some(slot) = self.slots.get_mut(col.flag) {
            if slot.flag != VALIDATED_FLAG && slot.flag > -10 {
                slot.flag = flag;
            }
        }
    }

    fn station_day(&self) -> (i32, NaiveDate) {
        (self.cod_staz, self.data_i)
    }
}

/// Flags of a previous chain run (`< -9`) are reset to valid; values flagged invalid by
/// hand (`-9..=0`) are dropped
pub fn normalize_flags(records: &mut [DailyRecord], slots: &[usize]) {
    for record in records.iter_mut() {
        for &slot in slots {
            let Some(slot) = record.slots.get_mut(slot) else {
                continue;
            };
            if slot.flag < -9 {
                slot.flag = 1;
            } else if slot.flag <= 0 {
                slot.value = None;
            }
        }
    }
}

/// Records flagged `<= -10` on the flag of `col`, the ones to write back
pub fn flagged(records: &[DailyRecord], col: Col) -> Vec<&DailyRecord> {
    records.iter().filter(|r| r.flag(col) <= -10).collect()
}

fn by_station(records: &mut [DailyRecord]) -> impl Iterator<Item = &mut [DailyRecord]> {
    records.chunk_by_mut(|a, b| a.cod_staz == b.cod_staz)
}

fn mark_all(records: &mut [DailyRecord], indexes: &[usize], col: Col, flag: i32) -> usize {
    for &i in indexes {
        records[i].mark(col, flag);
    }
    indexes.len()
}

/// Runs of consecutive equal values among the usable records of a station
fn equal_runs(
    records: &[DailyRecord],
    col: Col,
    filter: impl Fn(&DailyRecord) -> bool,
) -> Vec<(f64, Vec<usize>)> {
    let mut runs: Vec<(f64, Vec<usize>)> = Vec::new();
    for (i, record) in records.iter().enumerate() {
        let Some(value) = record.usable(col).filter(|_| filter(record)) else {
            continue;
        };
        match runs.last_mut() {
            Some((last, indexes)) if *last == value => indexes.push(i),
            _ => runs.push((value, vec![i])),
        }
    }
    runs
}

/// Controllo valori ripetuti = 0: runs of at least `len_threshold` zeros
pub fn check1(records: &mut [DailyRecord], col: Col, len_threshold: usize, flag: i32) {
    let mut count = 0;
    for station in by_station(records) {
        for (value, indexes) in equal_runs(station, col, |_| true) {
            if value == 0.0 && indexes.len() >= len_threshold {
                count += mark_all(station, &indexes, col, flag);
            }
        }
    }
    debug!(count, flag, "repeated zeros");
}

/// Controllo valori ripetuti: runs of at least `len_threshold` equal values, skipping the
/// `excluded` values and the records the filter rejects
pub fn check2(
    records: &mut [DailyRecord],
    col: Col,
    len_threshold: usize,
    excluded: &[f64],
    filter: impl Fn(&DailyRecord) -> bool,
    flag: i32,
) {
    let mut count = 0;
    for station in by_station(records) {
        for (value, indexes) in equal_runs(station, col, &filter) {
            if !excluded.contains(&value) && indexes.len() >= len_threshold {
                count += mark_all(station, &indexes, col, flag);
            }
        }
    }
    debug!(count, flag, "repeated values");
}

/// Usable values of a month as `(day, value)`, or None when too few to be compared
fn month_signature(
    records: &[DailyRecord],
    indexes: &[usize],
    col: Col,
    min_not_null: usize,
) -> Option<Vec<(u32, f64)>> {
    let signature: Vec<(u32, f64)> = indexes
        .iter()
        .filter_map(|&i| records[i].usable(col).map(|v| (records[i].data_i.day(), v)))
        .collect();
    (!signature.is_empty() && signature.len() >= min_not_null).then_some(signature)
}

/// Indexes of a station's records grouped by (year, month), in order
fn months(records: &[DailyRecord]) -> Vec<((i32, u32), Vec<usize>)> {
    let mut months: Vec<((i32, u32), Vec<usize>)> = Vec::new();
    for (i, record) in records.iter().enumerate() {
        let key = (record.data_i.year(), record.data_i.month());
        match months.last_mut() {
            Some((last, indexes)) if *last == key => indexes.push(i),
            _ => months.push((key, vec![i])),
        }
    }
    months
}

fn duplicated_months(
    records: &mut [DailyRecord],
    col: Col,
    min_not_null: usize,
    flag: i32,
    same_year: bool,
) -> usize {
    let mut count = 0;
    for station in by_station(records) {
        let signatures: Vec<((i32, u32), Vec<usize>, Option<Vec<(u32, f64)>>)> = months(station)
            .into_iter()
            .map(|(key, indexes)| {
                let signature = month_signature(station, &indexes, col, min_not_null);
                (key, indexes, signature)
            })
            .collect();
        let mut duplicated: HashSet<usize> = HashSet::new();
        for (a, (key_a, _, sig_a)) in signatures.iter().enumerate() {
            for (b, (key_b, _, sig_b)) in signatures.iter().enumerate().skip(a + 1) {
                let comparable = if same_year {
                    key_a.0 == key_b.0
                } else {
                    key_a.0 != key_b.0 && key_a.1 == key_b.1
                };
                if comparable && sig_a.is_some() && sig_a == sig_b {
                    duplicated.insert(a);
                    duplicated.insert(b);
                }
            }
        }
        for month in duplicated {
            count += mark_all(station, &signatures[month].1, col, flag);
        }
    }
    count
}

/// Controllo mesi duplicati (stesso anno): two months of the same year with the same values
pub fn check3(records: &mut [DailyRecord], col: Col, min_not_null: usize, flag: i32) {
    let count = duplicated_months(records, col, min_not_null, flag, true);
    debug!(count, flag, "duplicated months in the same year");
}

/// Controllo mesi duplicati (anni differenti): the same month of different years with the
/// same values
pub fn check4(records: &mut [DailyRecord], col: Col, min_not_null: usize, flag: i32) {
    let count = duplicated_months(records, col, min_not_null, flag, false);
    debug!(count, flag, "duplicated months in different years");
}

/// Controllo Tmax = Tmin, for values different from zero
pub fn check5(records: &mut [DailyRecord], tmax: Col, tmin: Col, flag: i32) {
    let mut count = 0;
    for record in records.iter_mut() {
        if let (Some(max), Some(min)) = (record.usable(tmax), record.usable(tmin)) {
            if max == min && max != 0.0 {
                record.mark(tmax, flag);
                record.mark(tmin, flag);
                count += 1;
            }
        }
    }
    debug!(count, flag, "Tmax equal to Tmin");
}

/// Controllo Tmax = Tmin = 0
pub fn check6(records: &mut [DailyRecord], tmax: Col, tmin: Col, flag: i32) {
    let mut count = 0;
    for record in records.iter_mut() {
        if let (Some(max), Some(min)) = (record.usable(tmax), record.usable(tmin)) {
            if max == 0.0 && min == 0.0 {
                record.mark(tmax, flag);
                record.mark(tmin, flag);
                count += 1;
            }
        }
    }
    debug!(count, flag, "Tmax and Tmin equal to zero");
}

/// Controllo world excedence: values not strictly inside `(min, max)`
pub fn check7(records: &mut [DailyRecord], col: Col, min: f64, max: f64, flag: i32) {
    let mut count = 0;
    for record in records.iter_mut() {
        if let Some(value) = record.usable(col) {
            if value <= min || value >= max {
                record.mark(col, flag);
                count += 1;
            }
        }
    }
    debug!(count, flag, min, max, "world excedence");
}

/// First value after a gap larger than `threshold` walking a sorted list
fn gap_cut(sorted: &[f64], threshold: f64) -> Option<f64> {
    sorted
        .windows(2)
        .find(|w| (w[1] - w[0]).abs() > threshold)
        .map(|w| w[1])
}

fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2]),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
    }
}

/// Controllo gap checks: per station and calendar month, values beyond a gap wider than
/// `threshold` in the sorted distribution. With `split` the upper and lower tails are
/// analysed separately starting from the median, otherwise only the upper tail is.
pub fn check8(records: &mut [DailyRecord], col: Col, threshold: f64, split: bool, flag: i32) {
    let mut count = 0;
    for station in by_station(records) {
        for month in 1..=12 {
            let indexes: Vec<usize> = (0..station.len())
                .filter(|&i| station[i].data_i.month() == month && station[i].usable(col).is_some())
                .collect();
            let mut values: Vec<f64> =
                indexes.iter().filter_map(|&i| station[i].usable(col)).collect();
            values.sort_by(f64::total_cmp);
            let (upper, lower) = if split {
                let Some(median) = median(&values) else {
                    continue;
                };
                let upper: Vec<f64> = values.iter().copied().filter(|v| *v >= median).collect();
                let mut lower: Vec<f64> = values.iter().copied().filter(|v| *v <= median).collect();
                lower.reverse();
                (gap_cut(&upper, threshold), gap_cut(&lower, threshold))
            } else {
                (gap_cut(&values, threshold), None)
            };
            for &i in &indexes {
                let Some(value) = station[i].usable(col) else {
                    continue;
                };
                let above = upper.is_some_and(|cut| value >= cut);
                let below = lower.is_some_and(|cut| value <= cut);
                if above || below {
                    station[i].mark(col, flag);
                    count += 1;
                }
            }
        }
    }
    debug!(count, flag, threshold, "gap check");
}

/// Mean and sample standard deviation
pub fn mean_stdev(values: &[f64]) -> Option<(f64, f64)> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, variance.sqrt()))
}

/// Controllo z-score checks temperatura: per station and calendar month, values whose
/// z-score exceeds `max_zscore` in absolute value
pub fn check9(records: &mut [DailyRecord], col: Col, max_zscore: f64, flag: i32) {
    let mut count = 0;
    for station in by_station(records) {
        for month in 1..=12 {
            let indexes: Vec<usize> = (0..station.len())
                .filter(|&i| station[i].data_i.month() == month && station[i].usable(col).is_some())
                .collect();
            let values: Vec<f64> = indexes.iter().filter_map(|&i| station[i].usable(col)).collect();
            let Some((mean, stdev)) = mean_stdev(&values) else {
                continue;
            };
            if stdev == 0.0 {
                continue;
            }
            for &i in &indexes {
                if let Some(value) = station[i].usable(col) {
                    if ((value - mean) / stdev).abs() > max_zscore {
                        station[i].mark(col, flag);
                        count += 1;
                    }
                }
            }
        }
    }
    debug!(count, flag, "temperature z-score");
}

/// Controllo z-score checks: per station, wet days among `days` with precipitation above
/// mean + `times_std` x standard deviation of those wet days
pub fn check10(
    records: &mut [DailyRecord],
    col: Col,
    days: &HashSet<(i32, NaiveDate)>,
    times_std: f64,
    flag: i32,
) {
    let mut count = 0;
    for station in by_station(records) {
        let indexes: Vec<usize> = (0..station.len())
            .filter(|&i| days.contains(&station[i].station_day()))
            .filter(|&i| station[i].usable(col).is_some_and(|v| v > DRY_DAY_PREC))
            .collect();
        let values: Vec<f64> = indexes.iter().filter_map(|&i| station[i].usable(col)).collect();
        let Some((mean, stdev)) = mean_stdev(&values) else {
            continue;
        };
        let limit = mean + times_std * stdev;
        for &i in &indexes {
            if station[i].usable(col).is_some_and(|v| v > limit) {
                station[i].mark(col, flag);
                count += 1;
            }
        }
    }
    debug!(count, flag, "precipitation z-score");
}

/// Controllo jump checks: a value differing from the one of the previous day by at
/// least `max_jump`
pub fn check11(records: &mut [DailyRecord], col: Col, max_jump: f64, flag: i32) {
    let mut count = 0;
    for station in by_station(records) {
        let mut previous: Option<(NaiveDate, f64)> = None;
        for record in station.iter_mut() {
            let Some(value) = record.usable(col) else {
                continue;
            };
            if let Some((day, last)) = previous {
                if record.data_i.pred_opt() == Some(day) && (value - last).abs() >= max_jump {
                    record.mark(col, flag);
                    count += 1;
                }
            }
            previous = Some((record.data_i, value));
        }
    }
    debug!(count, flag, "jump check");
}

/// Controllo Tmax < Tmin: the first value lower than the second one by more than
/// `min_diff` flags both
pub fn check12(records: &mut [DailyRecord], first: Col, second: Col, min_diff: f64, flag: i32) {
    let mut count = 0;
    for record in records.iter_mut() {
        if let (Some(a), Some(b)) = (record.usable(first), record.usable(second)) {
            if b - a > min_diff {
                record.mark(first, flag);
                record.mark(second, flag);
                count += 1;
            }
        }
    }
    debug!(count, flag, "first value lower than the second");
}

/// How check13 reduces and compares the differences of a value from the other variable
#[derive(Debug, Clone, Copy)]
pub struct DtrOperators {
    pub reduce: fn(f64, f64) -> f64,
    pub compare: fn(f64, f64) -> bool,
}

impl DtrOperators {
    /// For Tmax: the largest difference, flagged when `>= jump`
    pub const MAX_GE: DtrOperators = DtrOperators {
        reduce: f64::max,
        compare: |diff, jump| diff >= jump,
    };
    /// For Tmin: the smallest difference, flagged when `<= jump`
    pub const MIN_LE: DtrOperators = DtrOperators {
        reduce: f64::min,
        compare: |diff, jump| diff <= jump,
    };
}

/// Controllo dtr (diurnal temperature range): differences between `cols.0` of a day and
/// `cols.1` of the same and of the adjacent days, reduced and compared to `jump`
pub fn check13(
    records: &mut [DailyRecord],
    cols: (Col, Col),
    operators: DtrOperators,
    jump: f64,
    flag: i32,
) {
    let (value_col, other_col) = cols;
    let mut count = 0;
    for station in by_station(records) {
        let mut marks = Vec::new();
        for i in 0..station.len() {
            let Some(value) = station[i].usable(value_col) else {
                continue;
            };
            let day = station[i].data_i;
            let neighbours = [i.checked_sub(1), Some(i), Some(i + 1)];
            let reduced = neighbours
                .into_iter()
                .flatten()
                .filter_map(|j| station.get(j))
                .filter(|r| (r.data_i - day).num_days().abs() <= 1)
                .filter_map(|r| r.usable(other_col))
                .map(|other| value - other)
                .reduce(operators.reduce);
            if reduced.is_some_and(|diff| (operators.compare)(diff, jump)) {
                marks.push(i);
            }
        }
        count += mark_all(station, &marks, value_col, flag);
    }
    debug!(count, flag, jump, "diurnal temperature range");
}

/// Values of `cols = (min, mean, max)` must be ordered; otherwise the flag of `flag_col`
/// is set
pub fn check_consistency(
    records: &mut [DailyRecord],
    cols: (usize, usize, usize),
    flag_col: usize,
    flag: i32,
) {
    let (mn, md, mx) = cols;
    let flag_col = Col::new(flag_col);
    let mut count = 0;
    for record in records.iter_mut() {
        let value = |slot: usize| record.slots.get(slot).and_then(|s| s.value);
        let (min, mean, max) = (value(mn), value(md), value(mx));
        let ordered = |a: Option<f64>, b: Option<f64>| match (a, b) {
            (Some(a), Some(b)) => a <= b,
            _ => true,
        };
        if !(ordered(min, mean) && ordered(mean, max) && ordered(min, max)) {
            record.mark(flag_col, flag);
            count += 1;
        }
    }
    debug!(count, flag, "consistency of minimum, mean and maximum");
}

/// Days of each station with mean temperature `>= 0` and `< 0`, from temperature records
/// of slots `(tmax, tmin, tmedia)`. Tmedia is used when usable, otherwise the mean of
/// Tmax and Tmin.
pub fn split_days_by_average_temp(
    records: &[DailyRecord],
) -> (HashSet<(i32, NaiveDate)>, HashSet<(i32, NaiveDate)>) {
    let (tmax, tmin, tmedia) = (Col::new(0), Col::new(1), Col::new(2));
    let mut positive = HashSet::new();
    let mut negative = HashSet::new();
    for record in records {
        let mean = record.usable(tmedia).or_else(|| {
            record
                .usable(tmax)
                .zip(record.usable(tmin))
                .map(|(max, min)| (max + min) / 2.0)
        });
        match mean {
            Some(t) if t >= 0.0 => positive.insert(record.station_day()),
            Some(_) => negative.insert(record.station_day()),
            None => false,
        };
    }
    (positive, negative)
}

#[cfg(test)]
mod tests {
    use super::*;

    const V: Col = Col::new(0);

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2001, 1, 1).unwrap() + chrono::Duration::days(offset)
    }

    fn series(station: i32, values: &[Option<f64>]) -> Vec<DailyRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| DailyRecord::new(station, day(i as i64), vec![Slot::new(*v, Some(1))]))
            .collect()
    }

    fn temp(station: i32, offset: i64, tmax: f64, tmin: f64) -> DailyRecord {
        DailyRecord::new(
            station,
            day(offset),
            vec![Slot::new(Some(tmax), Some(1)), Slot::new(Some(tmin), Some(1))],
        )
    }

    fn flags(records: &[DailyRecord], col: Col) -> Vec<i32> {
        records.iter().map(|r| r.flag(col)).collect()
    }

    #[test]
    fn test_normalize_flags() {
        let mut records = vec![
            DailyRecord::new(1, day(0), vec![Slot::new(Some(1.0), None)]),
            DailyRecord::new(1, day(1), vec![Slot::new(Some(1.0), Some(-12))]),
            DailyRecord::new(1, day(2), vec![Slot::new(Some(1.0), Some(-9))]),
            DailyRecord::new(1, day(3), vec![Slot::new(Some(1.0), Some(5))]),
        ];
        normalize_flags(&mut records, &[0]);
        assert_eq!(flags(&records, V), vec![1, 1, -9, 5]);
        assert_eq!(records[2].value(V), None);
        assert_eq!(records[3].usable(V), Some(1.0));
    }

    #[test]
    fn test_mark_keeps_previous_and_validated_flags() {
        let mut records = series(1, &[Some(1.0), Some(2.0)]);
        records[1].slots[0].flag = VALIDATED_FLAG;
        records[0].mark(V, -11);
        records[0].mark(V, -12);
        records[1].mark(V, -11);
        assert_eq!(flags(&records, V), vec![-11, VALIDATED_FLAG]);
    }

    #[test]
    fn test_check1() {
        let mut values = vec![Some(0.0); 20];
        values.push(Some(3.0));
        values.extend(vec![Some(0.0); 19]);
        let mut records = series(1, &values);
        check1(&mut records, V, 20, FLAG_REPEATED_ZEROS);
        assert!(records[..20].iter().all(|r| r.flag(V) == FLAG_REPEATED_ZEROS));
        assert!(records[20..].iter().all(|r| r.flag(V) == 1));
    }

    #[test]
    fn test_check1_runs_do_not_cross_stations() {
        let mut records = series(1, &vec![Some(0.0); 10]);
        records.extend(series(2, &vec![Some(0.0); 10]));
        check1(&mut records, V, 20, FLAG_REPEATED_ZEROS);
        assert!(records.iter().all(|r| r.flag(V) == 1));
    }

    #[test]
    fn test_check2() {
        let mut values = vec![Some(2.5); 3];
        values.push(None);
        values.extend(vec![Some(2.5); 2]);
        values.extend(vec![Some(0.0); 6]);
        let mut records = series(1, &values);
        check2(&mut records, V, 5, &[0.0], |_| true, FLAG_REPEATED_VALUES);
        assert_eq!(
            flags(&records, V),
            vec![-12, -12, -12, 1, -12, -12, 1, 1, 1, 1, 1, 1]
        );
    }

    #[test]
    fn test_check2_with_filter() {
        let mut records = series(1, &vec![Some(1.0); 12]);
        check2(&mut records, V, 10, &[], |r| r.value(V).is_some_and(|v| v > 2.0), -12);
        assert!(records.iter().all(|r| r.flag(V) == 1));
    }

    #[test]
    fn test_check3_and_check4() {
        let month = |year: i32, m: u32, values: &[f64]| -> Vec<DailyRecord> {
            values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let date = NaiveDate::from_ymd_opt(year, m, i as u32 + 1).unwrap();
                    DailyRecord::new(1, date, vec![Slot::new(Some(*v), Some(1))])
                })
                .collect()
        };
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let mut records = month(2000, 1, &values);
        records.extend(month(2000, 3, &values));
        records.extend(month(2000, 5, &[1.0, 2.0]));
        records.extend(month(2000, 7, &[1.0, 2.0]));
        records.extend(month(2001, 1, &[9.0, 2.0]));
        check3(&mut records, V, 5, FLAG_DUPLICATED_MONTHS);
        let found = flags(&records, V);
        assert!(found[..12].iter().all(|f| *f == FLAG_DUPLICATED_MONTHS));
        // months with too few values are not compared
        assert!(found[12..].iter().all(|f| *f == 1));

        let mut records = month(2000, 2, &[3.0, 4.0]);
        records.extend(month(2001, 2, &[3.0, 4.0]));
        records.extend(month(2001, 3, &[3.0, 4.0]));
        check4(&mut records, V, 1, FLAG_DUPLICATED_MONTHS_YEARS);
        assert_eq!(flags(&records, V), vec![-14, -14, -14, -14, 1, 1]);
    }

    #[test]
    fn test_check5_and_check6() {
        let (tmax, tmin) = (Col::new(0), Col::new(1));
        let mut records = vec![temp(1, 0, 10.0, 10.0), temp(1, 1, 0.0, 0.0), temp(1, 2, 10.0, 2.0)];
        check5(&mut records, tmax, tmin, FLAG_TMAX_EQ_TMIN);
        check6(&mut records, tmax, tmin, FLAG_TMAX_EQ_TMIN_ZERO);
        assert_eq!(flags(&records, tmax), vec![-15, -16, 1]);
        assert_eq!(flags(&records, tmin), vec![-15, -16, 1]);
    }

    #[test]
    fn test_check7() {
        let mut records = series(1, &[Some(-1.0), Some(0.0), Some(24.9), Some(25.0), None]);
        check7(&mut records, V, -1.0, 25.0, FLAG_WORLD_EXCEDENCE);
        assert_eq!(flags(&records, V), vec![-17, 1, 1, -17, 1]);
    }

    #[test]
    fn test_check7_flag_of_another_slot() {
        let mut records = vec![DailyRecord::new(
            1,
            day(0),
            vec![Slot::new(Some(1000.0), Some(1)), Slot::new(Some(1100.0), Some(1))],
        )];
        check7(&mut records, Col::flagged_by(1, 0), 959.0, 1061.0, FLAG_WORLD_EXCEDENCE);
        assert_eq!(records[0].slots[0].flag, FLAG_WORLD_EXCEDENCE);
        assert_eq!(records[0].slots[1].flag, 1);
    }

    #[test]
    fn test_check8() {
        let mut records = series(1, &[Some(0.0), Some(10.0), Some(20.0), Some(400.0), Some(900.0)]);
        check8(&mut records, V, 300.0, false, FLAG_GAP);
        assert_eq!(flags(&records, V), vec![1, 1, 1, -18, -18]);
    }

    #[test]
    fn test_check8_split() {
        let values = [-30.0, -5.0, -4.0, -3.0, 0.0, 1.0, 2.0, 3.0, 20.0];
        let mut records = series(1, &values.map(Some));
        check8(&mut records, V, 10.0, true, FLAG_GAP);
        assert_eq!(flags(&records, V), vec![-18, 1, 1, 1, 1, 1, 1, 1, -18]);
    }

    #[test]
    fn test_check9() {
        let mut values = vec![Some(5.0), Some(6.0)];
        values.extend((0..29).map(|i| Some(5.0 + (i % 2) as f64)));
        // a month of two alternating values plus an outlier
        let mut records = series(1, &values[..30]);
        records.push(DailyRecord::new(1, day(30), vec![Slot::new(Some(100.0), Some(1))]));
        check9(&mut records, V, 5.0, FLAG_TEMPERATURE_ZSCORE);
        assert_eq!(records[30].flag(V), FLAG_TEMPERATURE_ZSCORE);
        assert!(records[..30].iter().all(|r| r.flag(V) == 1));
    }

    #[test]
    fn test_check10() {
        let mut values: Vec<Option<f64>> = (0..20).map(|i| Some(2.0 + (i % 3) as f64)).collect();
        values.push(Some(300.0));
        values.push(Some(0.0));
        let mut records = series(1, &values);
        let days: HashSet<(i32, NaiveDate)> = records.iter().map(|r| (1, r.data_i)).collect();
        check10(&mut records, V, &days, 3.0, FLAG_PRECIPITATION_ZSCORE);
        assert_eq!(records[20].flag(V), FLAG_PRECIPITATION_ZSCORE);
        assert_eq!(records.iter().filter(|r| r.flag(V) < 0).count(), 1);

        let mut records = series(1, &values);
        check10(&mut records, V, &HashSet::new(), 3.0, FLAG_PRECIPITATION_ZSCORE_ICE);
        assert!(records.iter().all(|r| r.flag(V) == 1));
    }

    #[test]
    fn test_check11() {
        let mut records = series(1, &[Some(10.0), Some(56.0), Some(20.0)]);
        records.push(DailyRecord::new(1, day(5), vec![Slot::new(Some(-40.0), Some(1))]));
        check11(&mut records, V, 45.0, FLAG_JUMP);
        assert_eq!(flags(&records, V), vec![1, -21, 1, 1]);
    }

    #[test]
    fn test_check12() {
        let (tmax, tmin) = (Col::new(0), Col::new(1));
        let mut records = vec![temp(1, 0, 10.0, 12.0), temp(1, 1, 10.0, 10.0)];
        check12(&mut records, tmax, tmin, 0.0, FLAG_TMAX_LT_TMIN);
        assert_eq!(flags(&records, tmax), vec![-22, 1]);
        assert_eq!(flags(&records, tmin), vec![-22, 1]);
    }

    #[test]
    fn test_check13() {
        let (tmax, tmin) = (Col::new(0), Col::new(1));
        let mut records = vec![
            temp(1, 0, 20.0, 5.0),
            temp(1, 1, 45.0, 15.0),
            temp(1, 2, 20.0, 10.0),
        ];
        check13(&mut records, (tmax, tmin), DtrOperators::MAX_GE, 35.0, FLAG_DTR);
        assert_eq!(flags(&records, tmax), vec![1, -23, 1]);

        let mut records = vec![
            temp(1, 0, 20.0, 5.0),
            temp(1, 1, 15.0, -20.0),
            temp(1, 2, 20.0, 10.0),
        ];
        check13(&mut records, (tmin, tmax), DtrOperators::MIN_LE, -35.0, FLAG_DTR);
        assert_eq!(flags(&records, tmin), vec![1, -23, 1]);
    }

    #[test]
    fn test_check_consistency() {
        let record = |md: f64, mx: f64, mn: f64| {
            DailyRecord::new(
                1,
                day(0),
                vec![
                    Slot::new(Some(md), Some(1)),
                    Slot::new(Some(mx), Some(1)),
                    Slot::new(Some(mn), Some(1)),
                ],
            )
        };
        let mut records = vec![record(1000.0, 1010.0, 990.0), record(1000.0, 990.0, 980.0)];
        check_consistency(&mut records, (2, 0, 1), 0, FLAG_CONSISTENCY);
        assert_eq!(flags(&records, Col::new(0)), vec![1, FLAG_CONSISTENCY]);
    }

    #[test]
    fn test_split_days_by_average_temp() {
        let records = vec![
            DailyRecord::new(
                1,
                day(0),
                vec![
                    Slot::new(Some(5.0), Some(1)),
                    Slot::new(Some(-1.0), Some(1)),
                    Slot::new(Some(-0.5), Some(1)),
                ],
            ),
            DailyRecord::new(
                1,
                day(1),
                vec![
                    Slot::new(Some(5.0), Some(1)),
                    Slot::new(Some(-1.0), Some(1)),
                    Slot::new(None, Some(1)),
                ],
            ),
        ];
        let (positive, negative) = split_days_by_average_temp(&records);
        assert!(negative.contains(&(1, day(0))));
        assert!(positive.contains(&(1, day(1))));
        assert_eq!(positive.len() + negative.len(), 2);
    }
}
