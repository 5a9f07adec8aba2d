use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::compute;
use crate::db::{DailyRepository, StationRepository, WritePolicy};
use crate::export::{csv2data, read_indicators, write_indicators};
use crate::models::{StationCode, TableItem};
use crate::process::{folder_files, progress_bar, ProcessError};

/// Compute the daily indicators of the exported data files (`*.csv`) of `data_folder`
/// and write them into `indicators_folder`, one CSV per daily table
pub fn compute_daily_indicators(
    data_folder: &Path,
    indicators_folder: &Path,
) -> Result<Vec<PathBuf>, ProcessError> {
    std::fs::create_dir_all(indicators_folder)?;
    let files = folder_files(data_folder, Some("csv"))?;
    let pb = progress_bar(files.len());
    let mut measures = Vec::new();
    for path in &files {
        measures.extend(csv2data(path)?);
        pb.inc(1);
    }
    pb.finish_with_message("data loaded");
    let items = compute::compute_daily_indicators(&measures);
    let written = write_indicators(&items, indicators_folder)?;
    info!(
        "Computed {} indicator rows from {} files into {} tables",
        items.len(),
        files.len(),
        written.len()
    );
    Ok(written)
}

/// Resolve the stations of the items; items of stations missing from the registry are
/// dropped
async fn resolve_stations(
    stations: &StationRepository,
    items: Vec<TableItem<StationCode>>,
    parallel: usize,
) -> Result<Vec<TableItem>, ProcessError> {
    let codes: Vec<StationCode> = items
        .iter()
        .map(|item| item.station.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let ids = stations.find_station_ids(&codes, parallel).await?;
    for code in codes.iter().filter(|code| !ids.contains_key(*code)) {
        warn!("station {}/{} not found: its records are skipped", code.0, code.1);
    }
    Ok(items
        .into_iter()
        .filter_map(|item| {
            let id = *ids.get(&item.station)?;
            Some(item.with_station(id))
        })
        .collect())
}

/// Insert the indicator files (`ds__*.csv`) of `indicators_folder` into the daily tables
/// of `schema`. Returns the number of rows written
#[instrument(skip(daily, stations))]
pub async fn insert_daily_indicators(
    daily: &DailyRepository,
    stations: &StationRepository,
    indicators_folder: &Path,
    schema: &str,
    policy: WritePolicy,
    parallel: usize,
) -> Result<usize, ProcessError> {
    let files: Vec<PathBuf> = folder_files(indicators_folder, Some("csv"))?
        .into_iter()
        .filter(|path| {
            path.file_stem()
                .is_some_and(|stem| stem.to_string_lossy().starts_with("ds__"))
        })
        .collect();
    let mut written = 0;
    for path in files {
        info!("Loading {}", path.display());
        let read_path = path.clone();
        let items = tokio::task::spawn_blocking(move || read_indicators(read_path)).await??;
        let items = resolve_stations(stations, items, parallel).await?;
        written += daily.upsert_items(schema, &items, policy).await?;
    }
    info!("Inserted {} daily rows into schema {}", written, schema);
    Ok(written)
}

/// Copy the daily tables of `start_schema` into `target_schema` without touching the
/// records already there
#[instrument(skip(daily))]
pub async fn load_unique_data(
    daily: &DailyRepository,
    start_schema: &str,
    target_schema: &str,
) -> Result<u64, ProcessError> {
    Ok(daily.load_unique_data(start_schema, target_schema).await?)
}
