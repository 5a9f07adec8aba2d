use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};
use tracing::{debug, info, instrument};

use crate::checks::series::{DailyRecord, Slot, VALIDATED_FLAG};
use crate::db::sql::{field_path, flag_path, qualified, read_expr};
use crate::db::DbError;
use crate::dma::{DayValues, DmaJob, DmaPart};
use crate::models::{FieldValue, TableItem, COD_AGGR_DAY};

/// The daily tables, all sharing the key `(cod_staz, data_i, cod_aggr)`
pub const DAILY_TABLES: [&str; 12] = [
    "ds__preci",
    "ds__t200",
    "ds__press",
    "ds__urel",
    "ds__radglob",
    "ds__bagna",
    "ds__elio",
    "ds__vnt10",
    "ds__grgg",
    "ds__etp",
    "ds__delta_idro",
    "ds__bioclima",
];

/// Indicator fields whose flags the quality checks manage, by table
pub const CHECKED_FIELDS: [(&str, &[&str]); 8] = [
    ("ds__t200", &["tmxgg", "tmngg", "tmdgg"]),
    ("ds__preci", &["prec24", "prec01", "prec06", "prec12"]),
    ("ds__bagna", &["bagna"]),
    ("ds__elio", &["elio"]),
    ("ds__radglob", &["radglob"]),
    ("ds__press", &["press"]),
    ("ds__urel", &["ur"]),
    ("ds__vnt10", &["vntmd", "vntmxgg"]),
];

/// How rows already in a table are treated when writing items
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum WritePolicy {
    /// Overwrite the fields written
    #[default]
    Upsert,
    /// Keep existing rows untouched
    #[value(name = "onlyinsert")]
    OnlyInsert,
}

/// A value to select with the flag validating it, both as field paths
#[derive(Debug, Clone, Copy)]
pub struct SlotQuery {
    pub value: &'static str,
    pub flag: &'static str,
    /// Read the flag as valid (1) unless validated by an operator (5)
    pub reset_flag: bool,
}

impl SlotQuery {
    pub const fn new(value: &'static str, flag: &'static str) -> Self {
        Self {
            value,
            flag,
            reset_flag: false,
        }
    }

    pub const fn reset(value: &'static str, flag: &'static str) -> Self {
        Self {
            value,
            flag,
            reset_flag: true,
        }
    }

    fn flag_expr(&self) -> String {
        let flag = read_expr("", self.flag);
        if self.reset_flag {
            format!("CASE WHEN {} = {} THEN {} ELSE 1 END", flag, VALIDATED_FLAG, VALIDATED_FLAG)
        } else {
            flag
        }
    }
}

/// Which daily records to select
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub stations: Option<Vec<i32>>,
    /// Skip records whose first flag falls in this closed interval
    pub exclude_flags: Option<(i32, i32)>,
    /// Skip records without the first value
    pub exclude_null: bool,
}

/// A daily temperature row with the latitude of its station
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureRow {
    pub cod_staz: i32,
    pub data_i: NaiveDate,
    pub lat: Option<f64>,
    pub tmax: Slot,
    pub tmin: Slot,
    pub tmedia: Slot,
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    value: &FieldValue,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    match value {
        FieldValue::Int(i) => query.bind(*i),
        FieldValue::Float(f) => query.bind(*f),
        FieldValue::Time(t) => query.bind(*t),
        FieldValue::Null => query,
    }
}

/// SELECT of the daily records of a DMA part. Values are read as `double precision`
/// whatever their column type (the precipitation classes are integers)
fn dma_select_sql(schema: &str, job: &DmaJob, part: &DmaPart) -> Result<String, DbError> {
    qualified(schema, job.table)?;
    let columns: Vec<String> = part
        .columns
        .iter()
        .map(|column| format!("({})::double precision", column))
        .collect();
    Ok(format!(
        "SELECT cod_staz, data_i, {}, {} FROM {} WHERE cod_aggr = {} ORDER BY cod_staz, data_i",
        columns.join(", "),
        part.flag,
        job.from_clause(schema),
        COD_AGGR_DAY
    ))
}

/// INSERT of an item, null values being written as literals
fn upsert_sql(table: &str, item: &TableItem, policy: WritePolicy) -> Result<String, DbError> {
    let mut columns = vec!["cod_staz".to_string(), "data_i".to_string(), "cod_aggr".to_string()];
    let mut values = vec!["$1".to_string(), "$2".to_string(), "$3".to_string()];
    let mut updates = Vec::new();
    let mut next_param = 4;
    for (field, value) in &item.fields {
        let field = field_path(field)?;
        columns.push(field.to_string());
        values.push(match value {
            FieldValue::Null => "NULL".to_string(),
            _ => {
                next_param += 1;
                format!("${}", next_param - 1)
            }
        });
        updates.push(format!("{} = {}", field, read_expr("EXCLUDED.", field)));
    }
    let on_conflict = match policy {
        WritePolicy::Upsert if !updates.is_empty() => {
            format!("DO UPDATE SET {}", updates.join(", "))
        }
        _ => "DO NOTHING".to_string(),
    };
    Ok(format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT (cod_staz, data_i, cod_aggr) {}",
        table,
        columns.join(", "),
        values.join(", "),
        on_conflict
    ))
}

#[derive(Clone)]
pub struct DailyRepository {
    pool: PgPool,
}

impl DailyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Daily records (`cod_aggr = 4`) sorted by station and day, one slot per query
    #[instrument(skip(self, slots, filter), fields(slots = slots.len()))]
    pub async fn select_records(
        &self,
        schema: &str,
        table: &str,
        slots: &[SlotQuery],
        filter: &RecordFilter,
    ) -> Result<Vec<DailyRecord>, DbError> {
        let mut selected = vec!["cod_staz".to_string(), "data_i".to_string()];
        for slot in slots {
            selected.push(read_expr("", field_path(slot.value)?));
            field_path(slot.flag)?;
            selected.push(slot.flag_expr());
        }
        let mut conditions = vec![format!("cod_aggr = {}", COD_AGGR_DAY)];
        if filter.stations.is_some() {
            conditions.push("cod_staz = ANY($1)".to_string());
        }
        if let Some(first) = slots.first() {
            if let Some((low, high)) = filter.exclude_flags {
                conditions.push(format!(
                    "COALESCE({}, 1) NOT BETWEEN {} AND {}",
                    read_expr("", first.flag),
                    low,
                    high
                ));
            }
            if filter.exclude_null {
                conditions.push(format!("{} IS NOT NULL", read_expr("", first.value)));
            }
        }
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY cod_staz, data_i",
            selected.join(", "),
            qualified(schema, table)?,
            conditions.join(" AND ")
        );
        debug!("Selecting records: {}", sql);

        let mut query = sqlx::query(&sql);
        if let Some(stations) = &filter.stations {
            query = query.bind(stations.clone());
        }
        let rows = query.fetch_all(&self.pool).await?;
        let records = rows
            .iter()
            .map(|row| {
                let slots = (0..slots.len())
                    .map(|i| {
                        Ok(Slot::new(
                            row.try_get::<Option<f64>, _>(2 + 2 * i)?,
                            row.try_get::<Option<i32>, _>(3 + 2 * i)?,
                        ))
                    })
                    .collect::<Result<Vec<Slot>, sqlx::Error>>()?;
                Ok(DailyRecord::new(row.try_get(0)?, row.try_get(1)?, slots))
            })
            .collect::<Result<Vec<DailyRecord>, sqlx::Error>>()?;
        info!("Selected {} records from {}.{}", records.len(), schema, table);
        Ok(records)
    }

    /// Write the flag of each `(cod_staz, data_i, flag)` into the flags of the `targets` fields
    #[instrument(skip(self, targets, flags), fields(count = flags.len()))]
    pub async fn write_flags(
        &self,
        schema: &str,
        table: &str,
        targets: &[&str],
        flags: &[(i32, NaiveDate, i32)],
    ) -> Result<u64, DbError> {
        if flags.is_empty() || targets.is_empty() {
            return Ok(0);
        }
        let assignments = targets
            .iter()
            .map(|f| Ok(format!("{} = $1", field_path(&flag_path(f))?)))
            .collect::<Result<Vec<String>, DbError>>()?;
        let sql = format!(
            "UPDATE {} SET {} WHERE cod_staz = $2 AND data_i = $3 AND cod_aggr = {}",
            qualified(schema, table)?,
            assignments.join(", "),
            COD_AGGR_DAY
        );
        let mut tx = self.pool.begin().await?;
        let mut updated = 0;
        for (cod_staz, data_i, flag) in flags {
            updated += sqlx::query(&sql)
                .bind(*flag)
                .bind(*cod_staz)
                .bind(*data_i)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;
        info!("Updated {} flags of {} on {}.{}", updated, targets.join(", "), schema, table);
        Ok(updated)
    }

    /// Copy the flags with the given values from the daily records of `source` to the
    /// same records of `target`
    #[instrument(skip(self))]
    pub async fn sync_flags(
        &self,
        flags: &[i32],
        source: &str,
        target: &str,
    ) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut synced = 0;
        for (table, fields) in CHECKED_FIELDS {
            for field in fields {
                let flag = flag_path(field);
                let sql = format!(
                    "UPDATE {target} AS t SET {flag} = {source_flag} FROM {source} AS s \
                     WHERE s.cod_staz = t.cod_staz AND s.data_i = t.data_i \
                     AND s.cod_aggr = t.cod_aggr AND t.cod_aggr = {day} \
                     AND {source_flag} = ANY($1)",
                    target = qualified(target, table)?,
                    source = qualified(source, table)?,
                    flag = field_path(&flag)?,
                    source_flag = read_expr("s.", &flag),
                    day = COD_AGGR_DAY,
                );
                synced += sqlx::query(&sql)
                    .bind(flags.to_vec())
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();
            }
        }
        tx.commit().await?;
        info!("Synchronized {} flags from {} to {}", synced, source, target);
        Ok(synced)
    }

    /// Set back to valid the flags set by the quality checks (`<= -10`)
    #[instrument(skip(self))]
    pub async fn reset_flags(
        &self,
        schema: &str,
        stations: Option<&[i32]>,
    ) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut reset = 0;
        for (table, fields) in CHECKED_FIELDS {
            for field in fields {
                let flag = flag_path(field);
                let mut sql = format!(
                    "UPDATE {} SET {} = 1 WHERE cod_aggr = {} AND {} <= -10",
                    qualified(schema, table)?,
                    field_path(&flag)?,
                    COD_AGGR_DAY,
                    read_expr("", &flag)
                );
                let mut query_stations = None;
                if let Some(stations) = stations {
                    sql.push_str(" AND cod_staz = ANY($1)");
                    query_stations = Some(stations.to_vec());
                }
                let mut query = sqlx::query(&sql);
                if let Some(stations) = query_stations {
                    query = query.bind(stations);
                }
                reset += query.execute(&mut *tx).await?.rows_affected();
            }
        }
        tx.commit().await?;
        info!("Reset {} flags on schema {}", reset, schema);
        Ok(reset)
    }

    /// Write items into their tables of `schema`. Returns the number of rows written
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn upsert_items(
        &self,
        schema: &str,
        items: &[TableItem],
        policy: WritePolicy,
    ) -> Result<usize, DbError> {
        debug!("Beginning transaction to write {} items", items.len());
        let mut tx = self.pool.begin().await?;
        let mut written = 0;
        let mut skipped = 0;

        for item in items {
            let sql = upsert_sql(&qualified(schema, &item.table)?, item, policy)?;
            let mut query = sqlx::query(&sql)
                .bind(item.station)
                .bind(item.data_i)
                .bind(item.cod_aggr);
            for (_, value) in &item.fields {
                query = bind_value(query, value);
            }
            let result = query.execute(&mut *tx).await?;
            if result.rows_affected() > 0 {
                written += 1;
            } else {
                skipped += 1;
            }
        }

        tx.commit().await?;
        info!("Written {} rows, {} existing rows skipped", written, skipped);
        Ok(written)
    }

    /// Copy the rows of every daily table from `start` to `target`, keeping the rows
    /// `target` already has
    #[instrument(skip(self))]
    pub async fn load_unique_data(&self, start: &str, target: &str) -> Result<u64, DbError> {
        let mut tx = self.pool.begin().await?;
        let mut loaded = 0;
        for table in DAILY_TABLES {
            let sql = format!(
                "INSERT INTO {} SELECT * FROM {} ON CONFLICT (cod_staz, data_i, cod_aggr) DO NOTHING",
                qualified(target, table)?,
                qualified(start, table)?
            );
            let rows = sqlx::query(&sql).execute(&mut *tx).await?.rows_affected();
            info!("Loaded {} new rows into {}.{}", rows, target, table);
            loaded += rows;
        }
        tx.commit().await?;
        Ok(loaded)
    }

    /// Daily temperatures with the latitude of the station from the stations registry
    #[instrument(skip(self))]
    pub async fn select_temperatures(
        &self,
        schema: &str,
        stations_table: &str,
    ) -> Result<Vec<TemperatureRow>, DbError> {
        let sql = format!(
            "SELECT cod_staz, data_i, lat, \
             (tmxgg).val_md, ((tmxgg).flag).wht, \
             (tmngg).val_md, ((tmngg).flag).wht, \
             (tmdgg).val_md, ((tmdgg).flag).wht \
             FROM {} LEFT JOIN {} ON cod_staz = id_staz \
             WHERE cod_aggr = {} ORDER BY cod_staz, data_i",
            qualified(schema, "ds__t200")?,
            stations_table,
            COD_AGGR_DAY
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let slot = |row: &PgRow, i: usize| -> Result<Slot, sqlx::Error> {
            Ok(Slot::new(row.try_get(i)?, row.try_get(i + 1)?))
        };
        let temperatures = rows
            .iter()
            .map(|row| {
                Ok(TemperatureRow {
                    cod_staz: row.try_get(0)?,
                    data_i: row.try_get(1)?,
                    lat: row.try_get(2)?,
                    tmax: slot(row, 3)?,
                    tmin: slot(row, 5)?,
                    tmedia: slot(row, 7)?,
                })
            })
            .collect::<Result<Vec<TemperatureRow>, sqlx::Error>>()?;
        debug!("Found {} temperature records", temperatures.len());
        Ok(temperatures)
    }

    /// `(cod_staz, data_i, prec24, etp)` of the days with both values valid
    #[instrument(skip(self))]
    pub async fn select_water_balance(
        &self,
        schema: &str,
    ) -> Result<Vec<(i32, NaiveDate, f64, f64)>, DbError> {
        let sql = format!(
            "SELECT cod_staz, data_i, (prec24).val_tot, (etp).val_md \
             FROM {} JOIN {} USING (cod_staz, data_i, cod_aggr) \
             WHERE cod_aggr = {} AND ((prec24).flag).wht > 0 AND ((etp).flag).wht > 0 \
             AND (prec24).val_tot IS NOT NULL AND (etp).val_md IS NOT NULL \
             ORDER BY cod_staz, data_i",
            qualified(schema, "ds__etp")?,
            qualified(schema, "ds__preci")?,
            COD_AGGR_DAY
        );
        let rows: Vec<(i32, NaiveDate, f64, f64)> =
            sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        debug!("Found {} water balance records", rows.len());
        Ok(rows)
    }

    /// Daily records of a part of an aggregation job, sorted by station and day
    #[instrument(skip(self, job, part), fields(job = job.name, field = part.field))]
    pub async fn select_dma_records(
        &self,
        schema: &str,
        job: &DmaJob,
        part: &DmaPart,
    ) -> Result<Vec<DayValues>, DbError> {
        let sql = dma_select_sql(schema, job, part)?;
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        let flag_index = 2 + part.columns.len();
        let records = rows
            .iter()
            .map(|row| {
                let values = (2..flag_index)
                    .map(|i| row.try_get::<Option<f64>, _>(i))
                    .collect::<Result<Vec<Option<f64>>, sqlx::Error>>()?;
                Ok(DayValues::new(
                    row.try_get(0)?,
                    row.try_get(1)?,
                    values,
                    row.try_get(flag_index)?,
                ))
            })
            .collect::<Result<Vec<DayValues>, sqlx::Error>>()?;
        debug!("Found {} daily records", records.len());
        Ok(records)
    }
}
