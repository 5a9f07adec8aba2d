mod common;

use chrono::NaiveDate;
use scia_feed::checks::series::{FLAG_TMAX_LT_TMIN, FLAG_WORLD_EXCEDENCE};
use scia_feed::compute::compute_daily_indicators;
use scia_feed::db::{DailyRepository, RecordFilter, SlotQuery, StationRepository, WritePolicy};
use scia_feed::models::{
    Flag, Measure, Metadata, ObservedAt, Station, TableItem, COD_AGGR_DAY, COD_AGGR_DECADE,
};
use scia_feed::process::{check_chain, process_dma, ChainOptions};
use serial_test::serial;
use std::collections::BTreeSet;

const SCHEMA: &str = "dailypdbanpacarica";

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2003, 7, d).unwrap()
}

fn station(cod_utente: &str, cod_rete: &str) -> Station {
    Station {
        cod_utente: cod_utente.to_string(),
        cod_rete: cod_rete.to_string(),
        nome: Some("Pergine".to_string()),
        lat: Some(46.06),
        lon: Some(11.23),
        quota: Some("475.0".to_string()),
        source: "3_trentino/T0001.csv".to_string(),
    }
}

fn t200_item(cod_staz: i32, data_i: NaiveDate, tmax: f64, tmin: f64) -> TableItem {
    let mut item = TableItem::new("ds__t200", cod_staz, data_i, COD_AGGR_DAY);
    item.set_flag("tmxgg", Flag::daily())
        .set("tmxgg.val_md", tmax)
        .set_flag("tmngg", Flag::daily())
        .set("tmngg.val_md", tmin);
    item
}

#[tokio::test]
#[serial]
#[ignore = "requires a PostgreSQL database"]
async fn test_upsert_and_find_stations() {
    let pool = common::test_pool().await;
    common::clean_tables(&pool).await;
    let repo = StationRepository::new(pool.clone(), "sciapgm").unwrap();

    let (inserted, updated) = repo
        .upsert_stations(&[station("0001", "3"), station("0002", "3")])
        .await
        .unwrap();
    assert_eq!((inserted, updated), (2, 0));

    let mut renamed = station("0001", "3");
    renamed.nome = Some("Pergine Valsugana".to_string());
    let (inserted, updated) = repo.upsert_stations(&[renamed]).await.unwrap();
    assert_eq!((inserted, updated), (0, 1));

    let id = repo.find_station_id("0001", "3").await.unwrap();
    assert!(id.is_some());
    assert_eq!(repo.find_station_id("0001", "").await.unwrap(), None);
    assert_eq!(repo.find_station_id("9999", "3").await.unwrap(), None);

    let codes = vec![
        ("0001".to_string(), "3".to_string()),
        ("0002".to_string(), "3".to_string()),
        ("0003".to_string(), "3".to_string()),
    ];
    let found = repo.find_station_ids(&codes, 2).await.unwrap();
    assert_eq!(found.len(), 2);
    assert_eq!(found.get(&codes[0]).copied(), id);
}

#[tokio::test]
#[serial]
#[ignore = "requires a PostgreSQL database"]
async fn test_upsert_items_policies() {
    let pool = common::test_pool().await;
    common::clean_tables(&pool).await;
    let repo = DailyRepository::new(pool.clone());

    let written = repo
        .upsert_items(SCHEMA, &[t200_item(1, day(1), 30.0, 15.0)], WritePolicy::Upsert)
        .await
        .unwrap();
    assert_eq!(written, 1);

    let skipped = repo
        .upsert_items(SCHEMA, &[t200_item(1, day(1), 31.0, 16.0)], WritePolicy::OnlyInsert)
        .await
        .unwrap();
    assert_eq!(skipped, 0);

    let slots = [SlotQuery::new("tmxgg.val_md", "tmxgg.flag.wht")];
    let records = repo
        .select_records(SCHEMA, "ds__t200", &slots, &RecordFilter::default())
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].slots[0].value, Some(30.0));

    repo.upsert_items(SCHEMA, &[t200_item(1, day(1), 32.0, 16.0)], WritePolicy::Upsert)
        .await
        .unwrap();
    let records = repo
        .select_records(SCHEMA, "ds__t200", &slots, &RecordFilter::default())
        .await
        .unwrap();
    assert_eq!(records[0].slots[0].value, Some(32.0));
}

#[tokio::test]
#[serial]
#[ignore = "requires a PostgreSQL database"]
async fn test_load_unique_data_keeps_target_rows() {
    let pool = common::test_pool().await;
    common::clean_tables(&pool).await;
    let repo = DailyRepository::new(pool.clone());
    let target = "dailypdbanpaclima";

    repo.upsert_items(
        SCHEMA,
        &[t200_item(1, day(1), 30.0, 15.0), t200_item(1, day(2), 29.0, 14.0)],
        WritePolicy::Upsert,
    )
    .await
    .unwrap();
    repo.upsert_items(target, &[t200_item(1, day(1), 25.0, 10.0)], WritePolicy::Upsert)
        .await
        .unwrap();

    let loaded = repo.load_unique_data(SCHEMA, target).await.unwrap();
    assert_eq!(loaded, 1);

    let slots = [SlotQuery::new("tmxgg.val_md", "tmxgg.flag.wht")];
    let records = repo
        .select_records(target, "ds__t200", &slots, &RecordFilter::default())
        .await
        .unwrap();
    let values: Vec<Option<f64>> = records.iter().map(|r| r.slots[0].value).collect();
    assert_eq!(values, vec![Some(25.0), Some(29.0)]);
}

#[tokio::test]
#[serial]
#[ignore = "requires a PostgreSQL database"]
async fn test_check_chain_writes_flags() {
    let pool = common::test_pool().await;
    common::clean_tables(&pool).await;
    let repo = DailyRepository::new(pool.clone());

    let items: Vec<TableItem> = (1..=10)
        .map(|d| match d {
            3 => t200_item(5, day(d), 55.0, 15.0),
            6 => t200_item(5, day(d), 20.0, 22.0),
            _ => t200_item(5, day(d), 28.0 + (d % 3) as f64, 14.0 + (d % 4) as f64),
        })
        .collect();
    repo.upsert_items(SCHEMA, &items, WritePolicy::Upsert).await.unwrap();

    let options = ChainOptions {
        schema: SCHEMA.to_string(),
        flagsync_schema: "dailypdbanpaclima".to_string(),
        stations: Some(vec![5]),
        omit_flagsync: true,
    };
    let written = check_chain(&repo, &options).await.unwrap();
    assert!(written >= 2);

    let slots = [SlotQuery::new("tmxgg.val_md", "tmxgg.flag.wht")];
    let records = repo
        .select_records(SCHEMA, "ds__t200", &slots, &RecordFilter::default())
        .await
        .unwrap();
    assert_eq!(records[2].slots[0].flag, FLAG_WORLD_EXCEDENCE);
    assert_eq!(records[5].slots[0].flag, FLAG_TMAX_LT_TMIN);
    assert_eq!(records[0].slots[0].flag, 1);

    // a second run starts from clean flags and gets to the same result
    check_chain(&repo, &options).await.unwrap();
    let again = repo
        .select_records(SCHEMA, "ds__t200", &slots, &RecordFilter::default())
        .await
        .unwrap();
    assert_eq!(again, records);
}

#[tokio::test]
#[serial]
#[ignore = "requires a PostgreSQL database"]
async fn test_process_dma_aggregates_temperatures() {
    let pool = common::test_pool().await;
    common::clean_tables(&pool).await;
    let repo = DailyRepository::new(pool.clone());
    let start = "dailypdbanpaclima";
    let target = "dmapdbanpaclima";

    let items: Vec<TableItem> = (1..=10).map(|d| t200_item(8, day(d), 30.0, 20.0)).collect();
    repo.upsert_items(start, &items, WritePolicy::Upsert).await.unwrap();

    let written = process_dma(&repo, start, target, WritePolicy::Upsert).await.unwrap();
    // year, month and first decade of the station
    assert_eq!(written, 3);

    let value: Option<f64> = sqlx::query_scalar(
        "SELECT (tmxgg).val_md FROM dmapdbanpaclima.ds__t200 WHERE cod_staz = 8 AND cod_aggr = 1",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(value, Some(30.0));
}

/// Hourly measures of a station for the first ten days of July 2003: 0.5 mm of rain,
/// pressure, humidity and wind constant over the day
fn hourly_measures() -> Vec<Measure> {
    let meta = Metadata {
        cod_utente: "0009".to_string(),
        cod_rete: Some("3".to_string()),
        ..Default::default()
    };
    let mut measures = Vec::new();
    for d in 1..=10 {
        for hour in 0..24 {
            let at = ObservedAt::Instant(day(d).and_hms_opt(hour, 0, 0).unwrap());
            for (par_code, value) in [
                ("PREC", 0.5),
                ("P", 1010.0),
                ("Pmax", 1015.0),
                ("Pmin", 1005.0),
                ("UR media", 60.0),
                ("FF", 3.0),
                ("DD", 180.0),
            ] {
                measures.push(Measure::new(meta.clone(), at, par_code, Some(value), true));
            }
        }
    }
    measures
}

/// A sub-field of the decade ending on 2003-07-10 of station 9, read as a float
async fn decade_value(pool: &sqlx::PgPool, table: &str, expr: &str) -> Option<f64> {
    let sql = format!(
        "SELECT ({})::double precision FROM dmapdbanpaclima.{} \
         WHERE cod_staz = 9 AND data_i = '2003-07-10' AND cod_aggr = {}",
        expr, table, COD_AGGR_DECADE
    );
    sqlx::query_scalar(&sql).fetch_one(pool).await.unwrap()
}

#[tokio::test]
#[serial]
#[ignore = "requires a PostgreSQL database"]
async fn test_process_dma_aggregates_hourly_indicators() {
    let pool = common::test_pool().await;
    common::clean_tables(&pool).await;
    let repo = DailyRepository::new(pool.clone());
    let start = "dailypdbanpaclima";

    let items: Vec<TableItem> = compute_daily_indicators(&hourly_measures())
        .into_iter()
        .map(|item| item.with_station(9))
        .collect();
    let tables: BTreeSet<&str> = items.iter().map(|i| i.table.as_str()).collect();
    assert_eq!(
        tables.into_iter().collect::<Vec<_>>(),
        vec!["ds__preci", "ds__press", "ds__urel", "ds__vnt10"]
    );
    repo.upsert_items(start, &items, WritePolicy::Upsert).await.unwrap();

    let written = process_dma(&repo, start, "dmapdbanpaclima", WritePolicy::Upsert)
        .await
        .unwrap();
    // year, month and decade of each of the four tables
    assert_eq!(written, 12);

    assert_eq!(decade_value(&pool, "ds__preci", "(prec24).val_tot").await, Some(120.0));
    assert_eq!(decade_value(&pool, "ds__preci", "((prec24).flag).wht").await, Some(1.0));
    // every day has 12 mm, four 6-hour sums of 3 mm and two 12-hour sums of 6 mm
    assert_eq!(decade_value(&pool, "ds__preci", "(cl_prec24).wet_03").await, Some(10.0));
    assert_eq!(decade_value(&pool, "ds__preci", "(cl_prec06).wet_01").await, Some(40.0));
    assert_eq!(decade_value(&pool, "ds__preci", "(cl_prec12).wet_02").await, Some(20.0));
    assert_eq!(decade_value(&pool, "ds__preci", "(cl_prec12).dry").await, Some(0.0));

    assert_eq!(decade_value(&pool, "ds__press", "(press).val_md").await, Some(1010.0));
    assert_eq!(decade_value(&pool, "ds__press", "(press).val_mx").await, Some(1015.0));
    assert_eq!(decade_value(&pool, "ds__urel", "(ur).val_md").await, Some(60.0));
    assert_eq!(decade_value(&pool, "ds__vnt10", "(vntmd).ff").await, Some(3.0));
    assert_eq!(decade_value(&pool, "ds__vnt10", "(vntmxgg).dd").await, Some(180.0));
}
