use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Source file '{path}' is unreadable: {reason}")]
    SourceUnreadable { path: PathBuf, reason: String },

    #[error("Required column '{0}' is missing from the source header")]
    MissingColumn(String),

    #[error("Line {line}: found {found} fields, but the header has {expected}")]
    TooManyFields {
        line: u64,
        found: usize,
        expected: usize,
    },

    #[error("Line {line}: field '{column}' has malformed value '{value}'")]
    MalformedRecord {
        line: u64,
        column: String,
        value: String,
    },

    #[error("Line {line}: cannot parse '{value}' in '{column}' as a date")]
    DateParseFailure {
        line: u64,
        column: String,
        value: String,
    },

    #[error("Cleaned artifact '{path}' is unreadable: {reason}")]
    ArtifactUnreadable { path: PathBuf, reason: String },

    #[error("Failed to write cleaned artifact '{path}': {reason}")]
    ArtifactWrite { path: PathBuf, reason: String },

    #[error("Store unreachable: {0}")]
    StoreUnreachable(String),

    #[error("Schema provisioning failed: {0}")]
    SchemaError(String),

    /// `record` is the 1-based position in the cleaned artifact
    #[error("Insert of record {record} failed: {reason}")]
    InsertFailure { record: usize, reason: String },

    #[error("Store query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
