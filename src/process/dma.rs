use tracing::{info, instrument};

use crate::db::{DailyRepository, WritePolicy};
use crate::dma::{job_items, DayValues, DmaPart, JOBS};
use crate::process::ProcessError;

/// Aggregate by decade, month and year the daily records of `start_schema` into
/// `target_schema`. Returns the number of rows written
#[instrument(skip(daily))]
pub async fn process_dma(
    daily: &DailyRepository,
    start_schema: &str,
    target_schema: &str,
    policy: WritePolicy,
) -> Result<usize, ProcessError> {
    let mut written = 0;
    for job in &JOBS {
        info!("* starting process dma {}...", job.name);
        let mut part_records: Vec<(DmaPart, Vec<DayValues>)> = Vec::with_capacity(job.parts.len());
        for part in job.parts {
            let records = daily.select_dma_records(start_schema, job, part).await?;
            part_records.push((*part, records));
        }
        let items = job_items(job, &part_records);
        info!(
            "* writing {} aggregations of {} into {}.{}",
            items.len(),
            job.name,
            target_schema,
            job.table
        );
        written += daily.upsert_items(target_schema, &items, policy).await?;
    }
    info!("Written {} aggregated rows into schema {}", written, target_schema);
    Ok(written)
}
