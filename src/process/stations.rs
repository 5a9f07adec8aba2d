use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::db::StationRepository;
use crate::export::{csv2data, read_stations, write_stations};
use crate::formats::guess_format;
use crate::models::{Measure, Station, StationCode};
use crate::process::{folder_files, progress_bar, ProcessError};

/// Measures of a station file, or of a CSV exported by `make_report`. Files that cannot
/// be read are skipped with a warning
fn file_measures(path: &Path) -> Vec<Measure> {
    if let Some(format) = guess_format(path) {
        let outcome = format
            .load_parameters(None)
            .map_err(ProcessError::from)
            .and_then(|params| Ok(format.parse(path, &params)?));
        return match outcome {
            Ok(outcome) => outcome.measures,
            Err(e) => {
                warn!("cannot parse {}: {}", path.display(), e);
                Vec::new()
            }
        };
    }
    match csv2data(path) {
        Ok(measures) => measures,
        Err(e) => {
            debug!("{} skipped: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Stations found in the files of a folder, once each, keyed by code and network
pub fn stations_in_folder(folder: &Path) -> Result<BTreeMap<StationCode, Station>, ProcessError> {
    let files = folder_files(folder, None)?;
    let pb = progress_bar(files.len());
    let mut stations = BTreeMap::new();
    for path in files {
        for measure in file_measures(&path) {
            stations
                .entry(measure.meta.station_key())
                .or_insert_with(|| Station::from_metadata(&measure.meta));
        }
        pb.inc(1);
    }
    pb.finish_with_message("files scanned");
    Ok(stations)
}

/// Write into `stations_path` the stations of the files of `data_folder` that are not in
/// the registry
#[instrument(skip(repo))]
pub async fn find_new_stations(
    repo: &StationRepository,
    data_folder: &Path,
    stations_path: &Path,
    parallel: usize,
) -> Result<Vec<Station>, ProcessError> {
    let folder: PathBuf = data_folder.to_path_buf();
    let found = tokio::task::spawn_blocking(move || stations_in_folder(&folder)).await??;
    let codes: Vec<StationCode> = found.keys().cloned().collect();
    let known = repo.find_station_ids(&codes, parallel).await?;
    let new_stations: Vec<Station> = found
        .into_iter()
        .filter(|(code, _)| !known.contains_key(code))
        .map(|(_, station)| station)
        .collect();
    write_stations(&new_stations, stations_path)?;
    info!(
        "Found {} stations, {} new ones written to {}",
        codes.len(),
        new_stations.len(),
        stations_path.display()
    );
    Ok(new_stations)
}

/// Register the stations of a stations CSV. Returns the number of `(inserted, updated)`
#[instrument(skip(repo))]
pub async fn upsert_stations(
    repo: &StationRepository,
    stations_path: &Path,
) -> Result<(usize, usize), ProcessError> {
    let stations = read_stations(stations_path)?;
    let (inserted, updated) = repo.upsert_stations(&stations).await?;
    info!("Stations from {}: {} inserted, {} updated", stations_path.display(), inserted, updated);
    Ok((inserted, updated))
}
