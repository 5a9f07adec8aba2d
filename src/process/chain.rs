//! The chain of quality checks on the daily records of a schema.
//!
//! Each table is read, checked in memory and the flags set by the checks (`<= -10`) are
//! written back. The checks of a table are plain functions over the records so that they
//! can run without a database.
use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::checks::series::{
    check1, check10, check11, check12, check13, check2, check3, check4, check5, check6, check7,
    check8, check9, check_consistency, flagged, normalize_flags, split_days_by_average_temp, Col,
    DailyRecord, DtrOperators, FLAG_CONSISTENCY, FLAG_DTR, FLAG_DUPLICATED_MONTHS,
    FLAG_DUPLICATED_MONTHS_YEARS, FLAG_GAP, FLAG_JUMP, FLAG_PRECIPITATION_ZSCORE,
    FLAG_PRECIPITATION_ZSCORE_ICE, FLAG_REPEATED_VALUES, FLAG_REPEATED_ZEROS,
    FLAG_TEMPERATURE_ZSCORE, FLAG_TMAX_EQ_TMIN, FLAG_TMAX_EQ_TMIN_ZERO, FLAG_TMAX_LT_TMIN,
    FLAG_WORLD_EXCEDENCE,
};
use crate::db::{DailyRepository, RecordFilter, SlotQuery};
use crate::process::ProcessError;

/// Flags copied from the reference schema before the checks run
pub const SYNC_FLAGS: [i32; 2] = [-9, 5];

const TMAX: Col = Col::new(0);
const TMIN: Col = Col::new(1);
const TMEDIA: Col = Col::new(2);

/// `(name, table, field, slot, min, max)` of the tables checked by [`range_checks`]
const RANGE_TABLES: [(&str, &str, &str, SlotQuery, f64, f64); 3] = [
    ("BAGNA", "ds__bagna", "bagna", SlotQuery::reset("bagna.val_md", "bagna.flag.wht"), -1.0, 25.0),
    ("ELIO", "ds__elio", "elio", SlotQuery::reset("elio.val_md", "elio.flag.wht"), -1.0, 19.0),
    (
        "RADGLOB",
        "ds__radglob",
        "radglob",
        SlotQuery::reset("radglob.val_md", "radglob.flag.wht"),
        -1.0,
        601.0,
    ),
];

type MinMeanMaxTable = (
    &'static str,
    &'static str,
    &'static str,
    [SlotQuery; 3],
    f64,
    f64,
    Option<usize>,
);

/// Tables checked by [`min_mean_max_checks`]
const MIN_MEAN_MAX_TABLES: [MinMeanMaxTable; 2] = [
    (
        "PRESS",
        "ds__press",
        "press",
        [
            SlotQuery::new("press.val_md", "press.flag.wht"),
            SlotQuery::new("press.val_mx", "press.flag.wht"),
            SlotQuery::new("press.val_mn", "press.flag.wht"),
        ],
        959.0,
        1061.0,
        Some(10),
    ),
    (
        "UREL",
        "ds__urel",
        "ur",
        [
            SlotQuery::new("ur.val_md", "ur.flag.wht"),
            SlotQuery::new("ur.val_mx", "ur.flag.wht"),
            SlotQuery::new("ur.val_mn", "ur.flag.wht"),
        ],
        -1.0,
        101.0,
        None,
    ),
];

#[derive(Debug, Clone)]
pub struct ChainOptions {
    pub schema: String,
    /// Schema the operator flags are synchronized from
    pub flagsync_schema: String,
    /// Restrict the checks to these `cod_staz`
    pub stations: Option<Vec<i32>>,
    pub omit_flagsync: bool,
}

/// Flags set by the checks on `col`, as they are written back
fn flags_to_write(records: &[DailyRecord], col: Col) -> Vec<(i32, NaiveDate, i32)> {
    flagged(records, col)
        .into_iter()
        .map(|r| (r.cod_staz, r.data_i, r.flag(col)))
        .collect()
}

pub fn t200_checks(records: &mut [DailyRecord]) {
    normalize_flags(records, &[0, 1, 2]);
    for (col, name) in [(TMAX, "Tmax"), (TMIN, "Tmin")] {
        info!("* 'controllo valori ripetuti' ({})", name);
        check2(records, col, 20, &[], |_| true, FLAG_REPEATED_VALUES);
    }
    for (col, name) in [(TMAX, "Tmax"), (TMIN, "Tmin")] {
        info!("* 'controllo mesi duplicati (mesi differenti)' ({})", name);
        check3(records, col, 15, FLAG_DUPLICATED_MONTHS);
        info!("* 'controllo mesi duplicati (anni differenti)' ({})", name);
        check4(records, col, 15, FLAG_DUPLICATED_MONTHS_YEARS);
    }
    info!("* 'controllo Tmax=Tmin'");
    check5(records, TMAX, TMIN, FLAG_TMAX_EQ_TMIN);
    info!("* 'controllo Tmax=Tmin=0'");
    check6(records, TMAX, TMIN, FLAG_TMAX_EQ_TMIN_ZERO);
    info!("* 'controllo world excedence' (Tmax, Tmin)");
    check7(records, TMAX, -30.0, 50.0, FLAG_WORLD_EXCEDENCE);
    check7(records, TMIN, -40.0, 40.0, FLAG_WORLD_EXCEDENCE);
    for (col, name) in [(TMAX, "Tmax"), (TMIN, "Tmin")] {
        info!("* 'controllo gap checks temperatura' ({})", name);
        check8(records, col, 10.0, true, FLAG_GAP);
    }
    for (col, name) in [(TMAX, "Tmax"), (TMIN, "Tmin")] {
        info!("* 'controllo z-score temperatura' ({})", name);
        check9(records, col, 6.0, FLAG_TEMPERATURE_ZSCORE);
    }
    for (col, name) in [(TMAX, "Tmax"), (TMIN, "Tmin")] {
        info!("* 'controllo jump checks' ({})", name);
        check11(records, col, 45.0, FLAG_JUMP);
    }
    info!("* 'controllo Tmax < Tmin'");
    check12(records, TMAX, TMIN, 0.0, FLAG_TMAX_LT_TMIN);
    info!("* 'controllo dtr (diurnal temperature range)' (Tmax, Tmin)");
    check13(records, (TMAX, TMIN), DtrOperators::MAX_GE, 35.0, FLAG_DTR);
    check13(records, (TMIN, TMAX), DtrOperators::MIN_LE, -35.0, FLAG_DTR);
    info!("* 'controllo world excedence' (Tmedia)");
    check7(records, TMEDIA, -36.0, 46.0, FLAG_WORLD_EXCEDENCE);
}

/// Checks on `prec24`; `temperatures` are the checked T200 records used to tell apart
/// the days above and below zero
pub fn preci_checks(records: &mut [DailyRecord], temperatures: &[DailyRecord]) {
    let prec = Col::new(0);
    info!("* 'controllo valori ripetuti = 0'");
    check1(records, prec, 20, FLAG_REPEATED_ZEROS);
    info!("* 'controllo valori ripetuti'");
    check2(records, prec, 20, &[0.0], |_| true, FLAG_REPEATED_VALUES);
    info!("* 'controllo mesi duplicati (mesi differenti)'");
    check3(records, prec, 5, FLAG_DUPLICATED_MONTHS);
    info!("* 'controllo mesi duplicati (anni differenti)'");
    check4(records, prec, 5, FLAG_DUPLICATED_MONTHS_YEARS);
    info!("* 'controllo world excedence'");
    check7(records, prec, f64::NEG_INFINITY, 800.0, FLAG_WORLD_EXCEDENCE);
    info!("* 'controllo gap checks precipitazione'");
    check8(records, prec, 300.0, false, FLAG_GAP);
    let (positive, negative) = split_days_by_average_temp(temperatures);
    info!("* 'controllo z-score precipitazione' (temperatura >= 0)");
    check10(records, prec, &positive, 9.0, FLAG_PRECIPITATION_ZSCORE);
    info!("* 'controllo z-score precipitazione' (temperatura < 0)");
    check10(records, prec, &negative, 5.0, FLAG_PRECIPITATION_ZSCORE_ICE);
}

/// World excedence on a single value, the checks of BAGNA, ELIO and RADGLOB
pub fn range_checks(records: &mut [DailyRecord], min: f64, max: f64) {
    info!("* 'controllo world excedence'");
    check7(records, Col::new(0), min, max, FLAG_WORLD_EXCEDENCE);
}

/// Checks on `(val_md, val_mx, val_mn)` sharing the flag of slot 0; pressure also looks
/// for repeated mean values among the ones inside the range
pub fn min_mean_max_checks(
    records: &mut [DailyRecord],
    min: f64,
    max: f64,
    repeated: Option<usize>,
) {
    normalize_flags(records, &[0, 1, 2]);
    info!("* 'controllo world excedence'");
    for slot in 0..3 {
        check7(records, Col::flagged_by(slot, 0), min, max, FLAG_WORLD_EXCEDENCE);
    }
    if let Some(len) = repeated {
        info!("* 'controllo valori ripetuti'");
        check2(records, Col::new(0), len, &[], |_| true, FLAG_REPEATED_VALUES);
    }
    info!("* 'controllo consistenza'");
    check_consistency(records, (2, 0, 1), 0, FLAG_CONSISTENCY);
}

/// Checks on `(vntmd.ff, vntmxgg.dd, vntmxgg.ff)`, both `vntmxgg` values sharing the flag
/// of slot 1
pub fn wind_checks(records: &mut [DailyRecord]) {
    let vntmd = Col::new(0);
    let dd = Col::new(1);
    let ff = Col::flagged_by(2, 1);
    normalize_flags(records, &[0, 1, 2]);
    info!("* 'controllo world excedence'");
    check7(records, vntmd, -1.0, 103.0, FLAG_WORLD_EXCEDENCE);
    check7(records, dd, -1.0, 361.0, FLAG_WORLD_EXCEDENCE);
    check7(records, ff, -1.0, 103.0, FLAG_WORLD_EXCEDENCE);
    let windy = |r: &DailyRecord| r.value(vntmd).is_some_and(|v| v > 2.0);
    let breezy = |r: &DailyRecord| r.value(vntmd).is_some_and(|v| v > 0.5);
    info!("* 'controllo valori ripetuti' (vntmd)");
    check2(records, vntmd, 10, &[], windy, FLAG_REPEATED_VALUES);
    info!("* 'controllo valori ripetuti' (vntmxgg)");
    check2(records, ff, 10, &[], windy, FLAG_REPEATED_VALUES);
    check2(records, dd, 10, &[], breezy, FLAG_REPEATED_VALUES);
    info!("* 'controllo velocità massima < velocità media'");
    check12(records, ff, vntmd, 0.0, FLAG_TMAX_LT_TMIN);
}

fn selection(stations: &Option<Vec<i32>>) -> RecordFilter {
    RecordFilter {
        stations: stations.clone(),
        ..RecordFilter::default()
    }
}

fn valid_selection(stations: &Option<Vec<i32>>) -> RecordFilter {
    RecordFilter {
        stations: stations.clone(),
        exclude_flags: Some((-9, 0)),
        exclude_null: true,
    }
}

/// Run the checks of every table. Returns the number of flags written
#[instrument(skip(repo, options), fields(schema = %options.schema))]
pub async fn check_chain(
    repo: &DailyRepository,
    options: &ChainOptions,
) -> Result<u64, ProcessError> {
    let schema = options.schema.as_str();
    let stations = options.stations.as_deref();
    info!("== Start process ==");
    repo.reset_flags(schema, stations).await?;
    if !options.omit_flagsync {
        info!(
            "* synchronization of flags +5 and -9 loading from schema {}...",
            options.flagsync_schema
        );
        repo.sync_flags(&SYNC_FLAGS, &options.flagsync_schema, schema).await?;
        info!("* end of synchronization of flags +5 and -9");
    }
    let mut written = 0;

    info!("* checks on T200");
    let slots = [
        SlotQuery::new("tmxgg.val_md", "tmxgg.flag.wht"),
        SlotQuery::new("tmngg.val_md", "tmngg.flag.wht"),
        SlotQuery::new("tmdgg.val_md", "tmdgg.flag.wht"),
    ];
    let mut temperatures = repo
        .select_records(schema, "ds__t200", &slots, &selection(&options.stations))
        .await?;
    t200_checks(&mut temperatures);
    for (field, col) in [("tmxgg", TMAX), ("tmngg", TMIN), ("tmdgg", TMEDIA)] {
        let flags = flags_to_write(&temperatures, col);
        written += repo.write_flags(schema, "ds__t200", &[field], &flags).await?;
    }

    info!("* checks on PRECI");
    let slots = [SlotQuery::reset("prec24.val_tot", "prec24.flag.wht")];
    let mut records = repo
        .select_records(schema, "ds__preci", &slots, &valid_selection(&options.stations))
        .await?;
    preci_checks(&mut records, &temperatures);
    let flags = flags_to_write(&records, Col::new(0));
    written += repo
        .write_flags(schema, "ds__preci", &["prec24", "prec01", "prec06", "prec12"], &flags)
        .await?;

    for (name, table, field, slot, min, max) in RANGE_TABLES {
        info!("* checks on {}", name);
        let mut records = repo
            .select_records(schema, table, &[slot], &valid_selection(&options.stations))
            .await?;
        range_checks(&mut records, min, max);
        let flags = flags_to_write(&records, Col::new(0));
        written += repo.write_flags(schema, table, &[field], &flags).await?;
    }

    for (name, table, field, slots, min, max, repeated) in MIN_MEAN_MAX_TABLES {
        info!("* checks on {}", name);
        let mut records = repo
            .select_records(schema, table, &slots, &selection(&options.stations))
            .await?;
        min_mean_max_checks(&mut records, min, max, repeated);
        let flags = flags_to_write(&records, Col::new(0));
        written += repo.write_flags(schema, table, &[field], &flags).await?;
    }

    info!("* checks on WIND");
    let slots = [
        SlotQuery::new("vntmd.ff", "vntmd.flag.wht"),
        SlotQuery::new("vntmxgg.dd", "vntmxgg.flag.wht"),
        SlotQuery::new("vntmxgg.ff", "vntmxgg.flag.wht"),
    ];
    let mut records = repo
        .select_records(schema, "ds__vnt10", &slots, &selection(&options.stations))
        .await?;
    wind_checks(&mut records);
    for (field, col) in [("vntmd", Col::new(0)), ("vntmxgg", Col::new(1))] {
        let flags = flags_to_write(&records, col);
        written += repo.write_flags(schema, "ds__vnt10", &[field], &flags).await?;
    }

    info!("== End process ==");
    info!("Written {} flags", written);
    Ok(written)
}
