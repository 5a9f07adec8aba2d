use futures::stream::{self, StreamExt};
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

use crate::db::sql::qualified;
use crate::db::DbError;
use crate::models::{Station, StationCode};

/// Registry of the stations (`anag__stazioni`)
#[derive(Clone)]
pub struct StationRepository {
    pool: PgPool,
    table: String,
}

impl StationRepository {
    pub fn new(pool: PgPool, schema: &str) -> Result<Self, DbError> {
        Ok(Self {
            pool,
            table: qualified(schema, "anag__stazioni")?,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// `id_staz` of the station registered with the code and network; a station matching
    /// more than one row is not identified
    #[instrument(skip(self))]
    pub async fn find_station_id(
        &self,
        cod_utente: &str,
        cod_rete: &str,
    ) -> Result<Option<i32>, DbError> {
        if cod_utente.is_empty() || cod_rete.is_empty() {
            return Ok(None);
        }
        let sql = format!(
            "SELECT id_staz FROM {} WHERE cod_utente = $1 AND cod_rete = $2",
            self.table
        );
        let ids: Vec<i32> = sqlx::query_scalar(&sql)
            .bind(cod_utente)
            .bind(cod_rete)
            .fetch_all(&self.pool)
            .await?;
        debug!("Found {} stations", ids.len());
        Ok(match ids.as_slice() {
            [id] => Some(*id),
            _ => None,
        })
    }

    /// Resolve many stations at once, `parallel` lookups at a time. Stations not
    /// identified are left out
    #[instrument(skip(self, codes), fields(count = codes.len()))]
    pub async fn find_station_ids(
        &self,
        codes: &[StationCode],
        parallel: usize,
    ) -> Result<HashMap<StationCode, i32>, DbError> {
        let results: Vec<Result<(StationCode, Option<i32>), DbError>> =
            stream::iter(codes.iter().cloned())
                .map(|code| async move {
                    let id = self.find_station_id(&code.0, &code.1).await?;
                    Ok((code, id))
                })
                .buffer_unordered(parallel.max(1))
                .collect()
                .await;
        let mut found = HashMap::new();
        for result in results {
            if let (code, Some(id)) = result? {
                found.insert(code, id);
            }
        }
        info!("Identified {} of {} stations", found.len(), codes.len());
        Ok(found)
    }

    /// Update the stations already registered and insert the others. Returns the number of
    /// `(inserted, updated)` stations
    #[instrument(skip(self, stations), fields(count = stations.len()))]
    pub async fn upsert_stations(&self, stations: &[Station]) -> Result<(usize, usize), DbError> {
        debug!("Beginning transaction to upsert {} stations", stations.len());
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        let mut updated = 0;
        let update_sql = format!(
            "UPDATE {} SET nome = COALESCE($3, nome), lat = COALESCE($4, lat), \
             lon = COALESCE($5, lon), quota = COALESCE($6, quota), source = $7 \
             WHERE cod_utente = $1 AND cod_rete = $2",
            self.table
        );
        let insert_sql = format!(
            "INSERT INTO {} (cod_utente, cod_rete, nome, lat, lon, quota, source) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            self.table
        );

        for station in stations {
            let result = sqlx::query(&update_sql)
                .bind(&station.cod_utente)
                .bind(&station.cod_rete)
                .bind(&station.nome)
                .bind(station.lat)
                .bind(station.lon)
                .bind(&station.quota)
                .bind(&station.source)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() > 0 {
                updated += 1;
                continue;
            }
            sqlx::query(&insert_sql)
                .bind(&station.cod_utente)
                .bind(&station.cod_rete)
                .bind(&station.nome)
                .bind(station.lat)
                .bind(station.lon)
                .bind(&station.quota)
                .bind(&station.source)
                .execute(&mut *tx)
                .await?;
            inserted += 1;
        }

        tx.commit().await?;
        info!("Inserted {} new stations, {} updated", inserted, updated);
        Ok((inserted, updated))
    }
}
