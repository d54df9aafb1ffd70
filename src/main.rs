use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use superstore_pipeline::config::{LoadMode, PipelineConfig};
use superstore_pipeline::error::PipelineError;
use superstore_pipeline::logging;
use superstore_pipeline::pipeline::{self, Pipeline, Stage};
use tracing::error;

#[derive(Parser)]
#[command(name = "superstore_pipeline")]
#[command(about = "Clean Superstore orders and load them into the sales store")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

/// Flags applied on top of the file and environment configuration
#[derive(Args)]
struct Overrides {
    /// TOML config file (defaults to ./pipeline.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Raw source CSV
    #[arg(long, global = true)]
    raw_file: Option<PathBuf>,

    /// Cleaned artifact CSV
    #[arg(long, global = true)]
    cleaned_file: Option<PathBuf>,

    /// Database name
    #[arg(long, global = true)]
    database: Option<String>,

    /// What loading does with existing rows: append or replace
    #[arg(long, global = true)]
    load_mode: Option<LoadMode>,

    /// Also store Year, Month and Profit_Ratio
    #[arg(long, global = true)]
    persist_derived: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean the raw source into the cleaned artifact
    Clean,
    /// Create the database and the sales table if missing
    Provision,
    /// Insert the cleaned artifact into the sales table
    Load,
    /// Print correlation and summary statistics of the stored data
    Verify {
        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run clean, provision and load in order
    Run {
        /// Verify the stored data after loading
        #[arg(long)]
        verify: bool,
    },
}

impl Overrides {
    fn resolve(&self) -> Result<PipelineConfig, PipelineError> {
        let mut config = PipelineConfig::load(self.config.as_deref())?;
        if let Some(path) = &self.raw_file {
            config.paths.raw_file = Some(path.clone());
        }
        if let Some(path) = &self.cleaned_file {
            config.paths.cleaned_file = Some(path.clone());
        }
        if let Some(name) = &self.database {
            config.store.database = name.clone();
        }
        if let Some(mode) = self.load_mode {
            config.load.mode = mode;
        }
        if self.persist_derived {
            config.load.persist_derived = true;
        }
        Ok(config)
    }
}

fn fail(stage: Stage, err: &PipelineError) -> ExitCode {
    error!(%stage, "{}", err);
    eprintln!("❌ Error in {stage} stage: {err}");
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    logging::init_logging();

    let cli = Cli::parse();

    let config = match cli.overrides.resolve() {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration failed: {}", e);
            eprintln!("❌ Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Clean => match pipeline::run_clean(&config) {
            Ok(report) => {
                println!(
                    "✅ Cleaned {} of {} rows into {}",
                    report.cleaned_rows,
                    report.raw_rows,
                    report.artifact.display()
                );
                ExitCode::SUCCESS
            }
            Err(e) => fail(Stage::Clean, &e),
        },
        Commands::Provision => match pipeline::run_provision(&config) {
            Ok(()) => {
                println!("✅ Database schema ready at {}", config.database_path().display());
                ExitCode::SUCCESS
            }
            Err(e) => fail(Stage::Provision, &e),
        },
        Commands::Load => match pipeline::run_load(&config) {
            Ok(report) => {
                println!("✅ Uploaded {} rows to the sales table", report.row_count);
                ExitCode::SUCCESS
            }
            Err(e) => fail(Stage::Load, &e),
        },
        Commands::Verify { json } => match pipeline::run_verify(&config) {
            Ok(report) => {
                if json {
                    match serde_json::to_string_pretty(&report) {
                        Ok(text) => println!("{text}"),
                        Err(e) => {
                            eprintln!("❌ Failed to serialize report: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    report.print();
                }
                ExitCode::SUCCESS
            }
            Err(e) => fail(Stage::Verify, &e),
        },
        Commands::Run { verify } => match Pipeline::run(&config, verify) {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => fail(e.stage, &e.source),
        },
    }
}
