use crate::cleaner::{self, CleanReport};
use crate::config::PipelineConfig;
use crate::db::SalesDatabase;
use crate::error::PipelineError;
use crate::loader::{self, LoadReport};
use crate::verify::{self, VerificationReport};
use metrics::{counter, histogram};
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, instrument};

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Clean,
    Provision,
    Load,
    Verify,
}

impl Stage {
    pub fn description(&self) -> &'static str {
        match self {
            Stage::Clean => "Running data cleaning & analysis",
            Stage::Provision => "Setting up database schema",
            Stage::Load => "Loading data into the store",
            Stage::Verify => "Verifying stored data",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Clean => "clean",
            Stage::Provision => "provision",
            Stage::Load => "load",
            Stage::Verify => "verify",
        };
        write!(f, "{name}")
    }
}

/// The first failure of a run, tagged with the stage that produced it.
#[derive(Error, Debug)]
#[error("stage '{stage}' failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: PipelineError,
}

/// Result of a complete pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub clean: CleanReport,
    pub load: LoadReport,
    pub verification: Option<VerificationReport>,
    pub duration_secs: f64,
}

/// Clean the raw source into the cleaned artifact.
pub fn run_clean(config: &PipelineConfig) -> Result<CleanReport, PipelineError> {
    cleaner::clean(config)
}

/// Ensure the database and the `sales` table exist. The connection is only
/// held for the duration of this call.
#[instrument(skip_all, fields(database = %config.store.database))]
pub fn run_provision(config: &PipelineConfig) -> Result<(), PipelineError> {
    let db = SalesDatabase::open(config)?;
    db.provision(config.load.persist_derived)?;
    info!("Store provisioned");
    Ok(())
}

/// Load the cleaned artifact over a fresh connection.
pub fn run_load(config: &PipelineConfig) -> Result<LoadReport, PipelineError> {
    let mut db = SalesDatabase::open(config)?;
    loader::load(config, &mut db)
}

pub fn run_verify(config: &PipelineConfig) -> Result<VerificationReport, PipelineError> {
    let db = SalesDatabase::open(config)?;
    verify::verify(&db)
}

pub struct Pipeline;

impl Pipeline {
    /// Run clean, provision and load (and verify when asked) in order,
    /// stopping at the first failed stage.
    #[instrument(skip(config))]
    pub fn run(config: &PipelineConfig, with_verify: bool) -> Result<PipelineResult, StageError> {
        let started = Instant::now();
        let total = if with_verify { 4 } else { 3 };
        counter!("pipeline_runs_total").increment(1);

        println!("{}", "=".repeat(70));
        println!("SUPERSTORE DATA PIPELINE");
        println!("{}", "=".repeat(70));

        let clean = Self::stage(Stage::Clean, 1, total, || run_clean(config))?;
        Self::stage(Stage::Provision, 2, total, || run_provision(config))?;
        let load = Self::stage(Stage::Load, 3, total, || run_load(config))?;
        let verification = if with_verify {
            let report = Self::stage(Stage::Verify, 4, total, || run_verify(config))?;
            report.print();
            Some(report)
        } else {
            None
        };

        let duration_secs = started.elapsed().as_secs_f64();
        histogram!("pipeline_duration_seconds").record(duration_secs);
        info!(duration_secs, rows = load.row_count, "Pipeline completed");

        println!("\n{}", "=".repeat(70));
        println!("PIPELINE COMPLETED SUCCESSFULLY");
        println!("{}", "=".repeat(70));
        println!("\nOutput:");
        println!("  - Cleaned data: {}", clean.artifact.display());
        println!(
            "  - Database: '{}' ({} rows loaded, {} mode)",
            config.store.database, load.row_count, load.mode
        );
        println!("\n{}", "=".repeat(70));

        Ok(PipelineResult {
            clean,
            load,
            verification,
            duration_secs,
        })
    }

    fn stage<T, F>(stage: Stage, step: usize, total: usize, run: F) -> Result<T, StageError>
    where
        F: FnOnce() -> Result<T, PipelineError>,
    {
        println!("\n[STEP {step}/{total}] {}...", stage.description());
        println!("{}", "-".repeat(70));
        let started = Instant::now();

        match run() {
            Ok(value) => {
                histogram!("pipeline_stage_duration_seconds", "stage" => stage.to_string())
                    .record(started.elapsed().as_secs_f64());
                println!("Success: {stage} stage complete");
                Ok(value)
            }
            Err(source) => {
                counter!("pipeline_stage_failures_total", "stage" => stage.to_string()).increment(1);
                error!(%stage, error = %source, "Stage failed");
                Err(StageError { stage, source })
            }
        }
    }
}
