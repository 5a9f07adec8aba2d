//! Indicators computed from daily indicators already in the database.
use chrono::NaiveDate;
use tracing::{info, instrument};

use crate::compute::{deltaidro, etp, grgg, julian_day};
use crate::db::daily_repository::TemperatureRow;
use crate::db::{DailyRepository, StationRepository, WritePolicy};
use crate::models::{Flag, TableItem, COD_AGGR_DAY};
use crate::process::ProcessError;
use crate::utils::round_to;

/// Items of `ds__t200` (`tmdgg1`, `deltagg`), `ds__grgg` and `ds__etp` for the daily
/// temperatures. Degree days need a valid Tmedia, `tmdgg1` and `deltagg` valid Tmax and
/// Tmin, the evapotranspiration all of them and the latitude of the station.
pub fn temperature_items(
    rows: &[TemperatureRow],
) -> (Vec<TableItem>, Vec<TableItem>, Vec<TableItem>) {
    let mut t200 = Vec::new();
    let mut grgg_items = Vec::new();
    let mut etp_items = Vec::new();
    let usable = |value: Option<f64>, flag: i32| value.filter(|_| flag > 0);

    for row in rows {
        let item = |table: &str| TableItem::new(table, row.cod_staz, row.data_i, COD_AGGR_DAY);
        let tmedia = usable(row.tmedia.value, row.tmedia.flag);
        let tmax = usable(row.tmax.value, row.tmax.flag);
        let tmin = usable(row.tmin.value, row.tmin.flag);

        if let Some(tmedia) = tmedia {
            let (flag, totals) = grgg(tmedia);
            let mut grgg_item = item("ds__grgg");
            grgg_item.set_flag("grgg", flag);
            for (name, total) in ["tot00", "tot05", "tot10", "tot15", "tot21"].iter().zip(totals) {
                grgg_item.set(format!("grgg.{}", name), total);
            }
            grgg_items.push(grgg_item);
        }

        let Some((tmax, tmin)) = tmax.zip(tmin) else {
            continue;
        };
        let mut t200_item = item("ds__t200");
        t200_item
            .set_flag("tmdgg1", Flag::daily())
            .set("tmdgg1.val_md", round_to((tmax + tmin) / 2.0, 1))
            .set_flag("deltagg", Flag::daily())
            .set("deltagg.val_md", round_to(tmax - tmin, 1));
        t200.push(t200_item);

        if let (Some(tmedia), Some(lat)) = (tmedia, row.lat) {
            if let Some((flag, value)) = etp(tmedia, tmax, tmin, lat, julian_day(row.data_i)) {
                let mut etp_item = item("ds__etp");
                etp_item.set_flag("etp", flag).set("etp.val_md", value);
                etp_items.push(etp_item);
            }
        }
    }
    (t200, grgg_items, etp_items)
}

/// Items of `ds__delta_idro` for `(cod_staz, data_i, prec24, etp)`
pub fn water_balance_items(rows: &[(i32, NaiveDate, f64, f64)]) -> Vec<TableItem> {
    rows.iter()
        .map(|&(cod_staz, data_i, prec24, etp)| {
            let (flag, value) = deltaidro(prec24, etp);
            let mut item = TableItem::new("ds__delta_idro", cod_staz, data_i, COD_AGGR_DAY);
            item.set_flag("deltaidro", flag).set("deltaidro.val_md", value);
            item
        })
        .collect()
}

/// Compute and write the secondary daily indicators of `schema`
#[instrument(skip(daily, stations))]
pub async fn compute_daily_indicators2(
    daily: &DailyRepository,
    stations: &StationRepository,
    schema: &str,
) -> Result<usize, ProcessError> {
    info!("* querying ds__t200 for compute temperature indicators...");
    let rows = daily.select_temperatures(schema, stations.table()).await?;
    info!("* computing temperature indicators...");
    let (t200, grgg_items, etp_items) = temperature_items(&rows);
    let mut written = 0;
    for (table, items) in [("ds__t200", t200), ("ds__etp", etp_items), ("ds__grgg", grgg_items)] {
        info!("updating temperature indicators on table {}.{}", schema, table);
        written += daily.upsert_items(schema, &items, WritePolicy::Upsert).await?;
    }

    info!("* computing bilancio idrico...");
    let balance = daily.select_water_balance(schema).await?;
    let items = water_balance_items(&balance);
    info!("updating bilancio idrico on table {}.ds__delta_idro", schema);
    written += daily.upsert_items(schema, &items, WritePolicy::Upsert).await?;
    Ok(written)
}
