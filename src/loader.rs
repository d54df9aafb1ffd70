//! Bulk Loader stage: cleaned artifact -> rows in the `sales` table.

use crate::artifact::{file_sha256, read_artifact};
use crate::config::{LoadMode, PipelineConfig};
use crate::db::SalesDatabase;
use crate::error::Result;
use metrics::{counter, histogram};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument};

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub artifact: PathBuf,
    pub artifact_sha256: String,
    pub mode: LoadMode,
    pub persisted_derived: bool,
    /// Rows inserted by this run
    pub row_count: usize,
}

/// Load the configured cleaned artifact into an already provisioned store.
pub fn load(config: &PipelineConfig, db: &mut SalesDatabase) -> Result<LoadReport> {
    load_artifact(
        &config.cleaned_file(),
        db,
        config.load.mode,
        config.load.persist_derived,
    )
}

#[instrument(skip(artifact, db), fields(artifact = %artifact.display()))]
pub fn load_artifact(
    artifact: &Path,
    db: &mut SalesDatabase,
    mode: LoadMode,
    persist_derived: bool,
) -> Result<LoadReport> {
    let started = Instant::now();
    let records = read_artifact(artifact)?;
    let artifact_sha256 = file_sha256(artifact)?;
    info!(rows = records.len(), sha256 = %artifact_sha256, %mode, "Loading cleaned artifact");

    let row_count = db.insert_all(&records, mode, persist_derived)?;

    counter!("pipeline_rows_loaded_total").increment(row_count as u64);
    histogram!("pipeline_load_duration_seconds").record(started.elapsed().as_secs_f64());
    info!(row_count, "Load committed");

    Ok(LoadReport {
        artifact: artifact.to_path_buf(),
        artifact_sha256,
        mode,
        persisted_derived: persist_derived,
        row_count,
    })
}
