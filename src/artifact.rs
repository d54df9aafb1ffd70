//! The cleaned artifact: the only hand-off between the cleaner and the loader.
//! UTF-8 CSV with a header row and no index column.

use crate::constants::{DERIVED_COLUMNS, SOURCE_COLUMNS};
use crate::error::{PipelineError, Result};
use crate::types::CleanedRecord;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Write `records` to `path`, replacing any previous file. The header is
/// written even when there are no records. Returns the SHA-256 of the file.
pub fn write_artifact(path: &Path, records: &[CleanedRecord]) -> Result<String> {
    let write_err = |reason: String| PipelineError::ArtifactWrite {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| write_err(e.to_string()))?;

    writer
        .write_record(SOURCE_COLUMNS.iter().chain(DERIVED_COLUMNS.iter()))
        .map_err(|e| write_err(e.to_string()))?;
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| write_err(e.to_string()))?;
    }
    writer.flush().map_err(|e| write_err(e.to_string()))?;
    drop(writer);

    let checksum = file_sha256(path)?;
    debug!(rows = records.len(), sha256 = %checksum, "Artifact written");
    Ok(checksum)
}

/// Read every record of a cleaned artifact, in file order.
pub fn read_artifact(path: &Path) -> Result<Vec<CleanedRecord>> {
    let unreadable = |reason: String| PipelineError::ArtifactUnreadable {
        path: path.to_path_buf(),
        reason,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| unreadable(e.to_string()))?;

    reader
        .deserialize::<CleanedRecord>()
        .map(|row| row.map_err(|e| unreadable(e.to_string())))
        .collect()
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn record(row_id: i64, sales: f64, profit: f64) -> CleanedRecord {
        let order_date = NaiveDate::from_ymd_opt(2016, 11, 8).unwrap();
        CleanedRecord {
            row_id,
            order_id: "CA-2016-152156".into(),
            order_date,
            ship_date: NaiveDate::from_ymd_opt(2016, 11, 11).unwrap(),
            ship_mode: "Second Class".into(),
            customer_id: "CG-12520".into(),
            customer_name: "Claire Gute".into(),
            segment: "Consumer".into(),
            country: "United States".into(),
            city: "Henderson".into(),
            state: "Kentucky".into(),
            postal_code: "42420".into(),
            region: "South".into(),
            product_id: "FUR-BO-10001798".into(),
            category: "Furniture".into(),
            sub_category: "Bookcases".into(),
            product_name: "Bush Somerset Collection Bookcase, \"Oak\"".into(),
            sales,
            quantity: 2,
            discount: 0.2,
            profit,
            year: 2016,
            month: 11,
            profit_ratio: profit / sales,
        }
    }

    #[test]
    fn artifact_round_trips_row_for_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("cleaned.csv");
        let records = vec![record(1, 261.96, 41.9136), record(2, 731.94, -219.582)];

        write_artifact(&path, &records).unwrap();
        let back = read_artifact(&path).unwrap();

        assert_eq!(back, records);
    }

    #[test]
    fn header_uses_source_names_plus_derived() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        write_artifact(&path, &[]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.starts_with("Row ID,Order ID,Order Date"));
        assert!(header.ends_with("Profit,Year,Month,Profit Ratio"));
        assert!(read_artifact(&path).unwrap().is_empty());
    }

    #[test]
    fn dates_are_written_iso() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        write_artifact(&path, &[record(1, 10.0, 1.0)]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains(",2016-11-08,2016-11-11,"));
    }

    #[test]
    fn non_finite_ratio_survives_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        write_artifact(&path, &[record(1, 0.0, 5.0)]).unwrap();
        let back = read_artifact(&path).unwrap();
        assert_eq!(back[0].profit_ratio, f64::INFINITY);
    }

    #[test]
    fn overwrite_replaces_previous_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cleaned.csv");
        let first = write_artifact(&path, &[record(1, 10.0, 1.0), record(2, 10.0, 1.0)]).unwrap();
        let second = write_artifact(&path, &[record(3, 10.0, 1.0)]).unwrap();
        assert_ne!(first, second);
        assert_eq!(read_artifact(&path).unwrap().len(), 1);
    }

    #[test]
    fn missing_artifact_is_unreadable() {
        let dir = tempdir().unwrap();
        let err = read_artifact(&dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactUnreadable { .. }));
    }
}
