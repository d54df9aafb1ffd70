//! Loader/Cleaner stage: raw source file -> cleaned artifact.
//!
//! Steps run in a fixed order, each consuming the previous step's output:
//! parse, remove exact duplicates, parse dates, drop incomplete rows, derive
//! fields, write the artifact.

use crate::artifact;
use crate::config::{PipelineConfig, SourceEncoding};
use crate::constants::SOURCE_COLUMNS;
use crate::dates::parse_date;
use crate::error::{PipelineError, Result};
use crate::summary::{CleanedSummary, SourceProfile};
use crate::types::{col, profit_ratio, CleanedRecord, DatedRecord, RawRecord};
use chrono::Datelike;
use csv::StringRecord;
use metrics::counter;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

/// Cell values read as missing, matching the usual CSV null markers.
pub const MISSING_MARKERS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Outcome of one cleaning run.
#[derive(Debug, Clone, Serialize)]
pub struct CleanReport {
    pub raw_rows: usize,
    pub duplicate_rows: usize,
    pub incomplete_rows: usize,
    pub cleaned_rows: usize,
    /// Cleaned rows whose `sales` is zero, leaving the profit ratio undefined
    pub undefined_profit_ratio_rows: usize,
    pub artifact: PathBuf,
    pub artifact_sha256: String,
}

/// Run the cleaner with the paths and encoding from `config`.
pub fn clean(config: &PipelineConfig) -> Result<CleanReport> {
    clean_file(
        &config.raw_file(),
        config.source.encoding,
        &config.cleaned_file(),
    )
}

#[instrument(skip_all, fields(source = %source.display(), artifact = %artifact_path.display()))]
pub fn clean_file(
    source: &Path,
    encoding: SourceEncoding,
    artifact_path: &Path,
) -> Result<CleanReport> {
    info!("Reading source file");
    let raw = read_source(source, encoding)?;
    let raw_rows = raw.len();
    counter!("pipeline_raw_rows_total").increment(raw_rows as u64);

    let profile = SourceProfile::of(&raw);
    profile.print();

    let (deduped, duplicate_rows) = remove_duplicates(raw);
    let dated = parse_dates(deduped)?;
    let (complete, incomplete_rows) = drop_incomplete(dated);
    let cleaned = derive_fields(complete)?;

    let undefined_profit_ratio_rows = cleaned
        .iter()
        .filter(|r| !r.has_defined_profit_ratio())
        .count();
    if undefined_profit_ratio_rows > 0 {
        warn!(
            rows = undefined_profit_ratio_rows,
            "Rows with zero sales have an undefined profit ratio"
        );
    }

    CleanedSummary::of(&cleaned).print();

    let artifact_sha256 = artifact::write_artifact(artifact_path, &cleaned)?;
    counter!("pipeline_cleaned_rows_total").increment(cleaned.len() as u64);
    info!(
        raw_rows,
        duplicate_rows,
        incomplete_rows,
        cleaned_rows = cleaned.len(),
        sha256 = %artifact_sha256,
        "Cleaned artifact written"
    );

    Ok(CleanReport {
        raw_rows,
        duplicate_rows,
        incomplete_rows,
        cleaned_rows: cleaned.len(),
        undefined_profit_ratio_rows,
        artifact: artifact_path.to_path_buf(),
        artifact_sha256,
    })
}

/// Read and decode the source file, then parse every row.
pub fn read_source(path: &Path, encoding: SourceEncoding) -> Result<Vec<RawRecord>> {
    let unreadable = |reason: String| PipelineError::SourceUnreadable {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = fs::read(path).map_err(|e| unreadable(e.to_string()))?;
    let text = decode(&bytes, encoding).map_err(unreadable)?;
    parse_source(&text).map_err(|e| match e {
        PipelineError::Csv(err) => unreadable(err.to_string()),
        err @ PipelineError::TooManyFields { .. } => unreadable(err.to_string()),
        other => other,
    })
}

fn decode(bytes: &[u8], encoding: SourceEncoding) -> std::result::Result<String, String> {
    match encoding {
        // ISO-8859-1 proper: every byte maps to the code point of the same value
        SourceEncoding::Latin1 => Ok(encoding_rs::mem::decode_latin1(bytes).into_owned()),
        SourceEncoding::Utf8 => {
            let (text, had_errors) = encoding_rs::UTF_8.decode_with_bom_removal(bytes);
            if had_errors {
                return Err("invalid UTF-8 byte sequence".to_string());
            }
            Ok(text.into_owned())
        }
    }
}

/// Parse decoded CSV text into raw records. Columns outside the known set
/// are ignored; a missing known column is fatal. A row shorter than the
/// header reads its absent trailing fields as missing, a longer one is fatal.
pub fn parse_source(text: &str) -> Result<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let positions = column_positions(&headers)?;

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.len() > headers.len() {
            return Err(PipelineError::TooManyFields {
                line,
                found: record.len(),
                expected: headers.len(),
            });
        }
        let values = positions
            .iter()
            .map(|&pos| record.get(pos).and_then(normalize_cell))
            .collect();
        records.push(RawRecord { line, values });
    }

    debug!("Parsed {} raw rows", records.len());
    Ok(records)
}

fn column_positions(headers: &StringRecord) -> Result<Vec<usize>> {
    SOURCE_COLUMNS
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h.trim() == *name)
                .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
        })
        .collect()
}

fn normalize_cell(cell: &str) -> Option<String> {
    if MISSING_MARKERS.contains(&cell) {
        None
    } else {
        Some(cell.to_string())
    }
}

/// Number of rows that repeat an earlier row across every source column.
pub fn duplicate_count(records: &[RawRecord]) -> usize {
    let mut seen = HashSet::new();
    records.iter().filter(|r| !seen.insert(&r.values)).count()
}

/// Keep the first occurrence of each distinct row, preserving file order.
/// Returns the survivors and the number of rows removed.
pub fn remove_duplicates(records: Vec<RawRecord>) -> (Vec<RawRecord>, usize) {
    let before = records.len();
    let mut seen = HashSet::new();
    let kept: Vec<RawRecord> = records
        .into_iter()
        .filter(|r| seen.insert(r.values.clone()))
        .collect();
    let removed = before - kept.len();
    if removed > 0 {
        info!(removed, "Removed duplicate rows");
    }
    (kept, removed)
}

/// Parse both date columns of every row. A present value that is not a date
/// aborts the run; a missing value stays missing.
pub fn parse_dates(records: Vec<RawRecord>) -> Result<Vec<DatedRecord>> {
    records
        .into_iter()
        .map(|raw| {
            let order_date = date_field(&raw, col::ORDER_DATE)?;
            let ship_date = date_field(&raw, col::SHIP_DATE)?;
            Ok(DatedRecord {
                raw,
                order_date,
                ship_date,
            })
        })
        .collect()
}

fn date_field(raw: &RawRecord, idx: usize) -> Result<Option<chrono::NaiveDate>> {
    match raw.value(idx) {
        None => Ok(None),
        Some(value) => parse_date(value)
            .map(Some)
            .ok_or_else(|| PipelineError::DateParseFailure {
                line: raw.line,
                column: SOURCE_COLUMNS[idx].to_string(),
                value: value.to_string(),
            }),
    }
}

/// Drop rows with a missing value in any column.
pub fn drop_incomplete(records: Vec<DatedRecord>) -> (Vec<DatedRecord>, usize) {
    let before = records.len();
    let kept: Vec<DatedRecord> = records.into_iter().filter(|r| r.is_complete()).collect();
    let dropped = before - kept.len();
    if dropped > 0 {
        info!(dropped, "Dropped rows with missing values");
    }
    (kept, dropped)
}

/// Coerce numeric columns and compute Year, Month and Profit Ratio.
pub fn derive_fields(records: Vec<DatedRecord>) -> Result<Vec<CleanedRecord>> {
    records.iter().map(derive_record).collect()
}

fn derive_record(rec: &DatedRecord) -> Result<CleanedRecord> {
    let raw = &rec.raw;
    let text = |idx: usize| -> Result<String> {
        raw.value(idx)
            .map(str::to_string)
            .ok_or_else(|| malformed(raw, idx, ""))
    };
    let order_date = rec
        .order_date
        .ok_or_else(|| malformed(raw, col::ORDER_DATE, ""))?;
    let ship_date = rec
        .ship_date
        .ok_or_else(|| malformed(raw, col::SHIP_DATE, ""))?;

    let sales: f64 = number(raw, col::SALES)?;
    let profit: f64 = number(raw, col::PROFIT)?;

    Ok(CleanedRecord {
        row_id: integer(raw, col::ROW_ID)?,
        order_id: text(col::ORDER_ID)?,
        order_date,
        ship_date,
        ship_mode: text(col::SHIP_MODE)?,
        customer_id: text(col::CUSTOMER_ID)?,
        customer_name: text(col::CUSTOMER_NAME)?,
        segment: text(col::SEGMENT)?,
        country: text(col::COUNTRY)?,
        city: text(col::CITY)?,
        state: text(col::STATE)?,
        postal_code: text(col::POSTAL_CODE)?,
        region: text(col::REGION)?,
        product_id: text(col::PRODUCT_ID)?,
        category: text(col::CATEGORY)?,
        sub_category: text(col::SUB_CATEGORY)?,
        product_name: text(col::PRODUCT_NAME)?,
        sales,
        quantity: integer(raw, col::QUANTITY)?,
        discount: number(raw, col::DISCOUNT)?,
        profit,
        year: order_date.year(),
        month: order_date.month(),
        profit_ratio: profit_ratio(profit, sales),
    })
}

fn malformed(raw: &RawRecord, idx: usize, value: &str) -> PipelineError {
    PipelineError::MalformedRecord {
        line: raw.line,
        column: SOURCE_COLUMNS[idx].to_string(),
        value: value.to_string(),
    }
}

fn number<T: FromStr>(raw: &RawRecord, idx: usize) -> Result<T> {
    let value = raw.value(idx).unwrap_or_default();
    value
        .trim()
        .parse::<T>()
        .map_err(|_| malformed(raw, idx, value))
}

/// Integers may arrive written as whole floats ("3.0").
fn integer(raw: &RawRecord, idx: usize) -> Result<i64> {
    number::<i64>(raw, idx).or_else(|err| match number::<f64>(raw, idx) {
        Ok(f) if f.fract() == 0.0 && f.is_finite() => Ok(f as i64),
        _ => Err(err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Row ID,Order ID,Order Date,Ship Date,Ship Mode,Customer ID,Customer Name,Segment,Country,City,State,Postal Code,Region,Product ID,Category,Sub-Category,Product Name,Sales,Quantity,Discount,Profit";

    fn row(id: u32, order_date: &str, region: &str, sales: &str, profit: &str) -> String {
        format!(
            "{id},CA-2016-152156,{order_date},11/11/2016,Second Class,CG-12520,Claire Gute,Consumer,United States,Henderson,Kentucky,42420,{region},FUR-BO-10001798,Furniture,Bookcases,\"Bush Somerset Collection Bookcase, Oak\",{sales},2,0,{profit}"
        )
    }

    fn source(rows: &[String]) -> String {
        let mut text = String::from(HEADER);
        for r in rows {
            text.push('\n');
            text.push_str(r);
        }
        text.push('\n');
        text
    }

    fn clean_text(text: &str) -> Result<Vec<CleanedRecord>> {
        let raw = parse_source(text)?;
        let (deduped, _) = remove_duplicates(raw);
        let (complete, _) = drop_incomplete(parse_dates(deduped)?);
        derive_fields(complete)
    }

    #[test]
    fn identical_rows_collapse_to_one() {
        let text = source(&[
            row(1, "11/8/2016", "South", "261.96", "41.9136"),
            row(1, "11/8/2016", "South", "261.96", "41.9136"),
            row(2, "11/8/2016", "South", "731.94", "219.582"),
        ]);
        let cleaned = clean_text(&text).unwrap();
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[0].row_id, 1);
        assert_eq!(cleaned[1].row_id, 2);
    }

    #[test]
    fn deduplication_is_idempotent() {
        let raw = parse_source(&source(&[
            row(1, "11/8/2016", "South", "10", "1"),
            row(1, "11/8/2016", "South", "10", "1"),
            row(1, "11/8/2016", "South", "10", "1"),
            row(2, "11/8/2016", "West", "10", "1"),
        ]))
        .unwrap();
        assert_eq!(duplicate_count(&raw), 2);

        let (once, removed) = remove_duplicates(raw);
        assert_eq!(removed, 2);
        let (twice, removed_again) = remove_duplicates(once.clone());
        assert_eq!(removed_again, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn row_missing_region_is_dropped() {
        let text = source(&[
            row(1, "11/8/2016", "South", "10", "1"),
            row(2, "11/8/2016", "", "10", "1"),
            row(3, "11/8/2016", "West", "10", "1"),
        ]);
        let cleaned = clean_text(&text).unwrap();
        assert_eq!(cleaned.len(), 2);
        assert!(cleaned.iter().all(|r| !r.region.is_empty()));
    }

    #[test]
    fn null_markers_count_as_missing() {
        let text = source(&[
            row(1, "11/8/2016", "NA", "10", "1"),
            row(2, "11/8/2016", "null", "10", "1"),
            row(3, "11/8/2016", "East", "10", "1"),
        ]);
        let cleaned = clean_text(&text).unwrap();
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].row_id, 3);
    }

    #[test]
    fn derived_fields_follow_order_date_and_ratio() {
        let text = source(&[row(7, "3/15/2017", "Central", "200", "50")]);
        let cleaned = clean_text(&text).unwrap();
        let rec = &cleaned[0];
        assert_eq!(rec.year, 2017);
        assert_eq!(rec.month, 3);
        assert_eq!(rec.profit_ratio, 0.25);
        assert!(rec.has_defined_profit_ratio());
    }

    #[test]
    fn zero_sales_flags_undefined_ratio() {
        let text = source(&[row(1, "3/15/2017", "Central", "0", "-5")]);
        let cleaned = clean_text(&text).unwrap();
        assert!(!cleaned[0].has_defined_profit_ratio());
        assert_eq!(cleaned[0].profit_ratio, f64::NEG_INFINITY);
    }

    #[test]
    fn unparseable_date_is_fatal() {
        let text = source(&[
            row(1, "11/8/2016", "South", "10", "1"),
            row(2, "someday", "South", "10", "1"),
        ]);
        match clean_text(&text) {
            Err(PipelineError::DateParseFailure { line, column, value }) => {
                assert_eq!(line, 3);
                assert_eq!(column, "Order Date");
                assert_eq!(value, "someday");
            }
            other => panic!("expected DateParseFailure, got {other:?}"),
        }
    }

    #[test]
    fn missing_date_is_dropped_not_fatal() {
        let text = source(&[
            row(1, "", "South", "10", "1"),
            row(2, "11/8/2016", "South", "10", "1"),
        ]);
        let cleaned = clean_text(&text).unwrap();
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].row_id, 2);
    }

    #[test]
    fn non_numeric_sales_is_malformed() {
        let text = source(&[row(1, "11/8/2016", "South", "lots", "1")]);
        assert!(matches!(
            clean_text(&text),
            Err(PipelineError::MalformedRecord { ref column, .. }) if column == "Sales"
        ));
    }

    #[test]
    fn whole_float_integers_are_accepted() {
        let text = source(&[row(1, "11/8/2016", "South", "10", "1")]).replacen("\n1,", "\n1.0,", 1);
        let cleaned = clean_text(&text).unwrap();
        assert_eq!(cleaned[0].row_id, 1);
    }

    #[test]
    fn short_row_is_dropped_as_incomplete() {
        let truncated = row(2, "11/8/2016", "South", "10", "1");
        let truncated = &truncated[..truncated.rfind(',').unwrap()];
        let text = source(&[
            row(1, "11/8/2016", "South", "10", "1"),
            truncated.to_string(),
            row(3, "11/8/2016", "West", "10", "1"),
        ]);

        let raw = parse_source(&text).unwrap();
        assert_eq!(raw.len(), 3);
        assert_eq!(raw[1].value(col::PROFIT), None);

        let cleaned = clean_text(&text).unwrap();
        let ids: Vec<i64> = cleaned.iter().map(|r| r.row_id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn overlong_row_is_fatal() {
        let text = source(&[
            row(1, "11/8/2016", "South", "10", "1"),
            row(2, "11/8/2016", "South", "10", "1") + ",surplus",
        ]);
        match parse_source(&text) {
            Err(PipelineError::TooManyFields {
                line,
                found,
                expected,
            }) => {
                assert_eq!(line, 3);
                assert_eq!(found, 22);
                assert_eq!(expected, 21);
            }
            other => panic!("expected TooManyFields, got {other:?}"),
        }
    }

    #[test]
    fn overlong_row_makes_the_source_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Superstore.csv");
        let text = source(&[row(1, "11/8/2016", "South", "10", "1") + ",surplus"]);
        fs::write(&path, text).unwrap();
        assert!(matches!(
            read_source(&path, SourceEncoding::Utf8),
            Err(PipelineError::SourceUnreadable { ref reason, .. }) if reason.contains("Line 2")
        ));
    }

    #[test]
    fn missing_required_column_is_reported() {
        let text = HEADER.replace(",Region", "") + "\n";
        assert!(matches!(
            parse_source(&text),
            Err(PipelineError::MissingColumn(ref c)) if c == "Region"
        ));
    }

    #[test]
    fn extra_columns_and_reordering_are_tolerated() {
        let text = format!("Notes,{HEADER}\nhello,{}\n", row(4, "1/2/2015", "East", "5", "1"));
        let cleaned = clean_text(&text).unwrap();
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].row_id, 4);
        assert_eq!(cleaned[0].product_name, "Bush Somerset Collection Bookcase, Oak");
    }

    #[test]
    fn latin1_bytes_decode_to_matching_code_points() {
        let decoded = decode(b"Caf\xe9", SourceEncoding::Latin1).unwrap();
        assert_eq!(decoded, "Café");
        assert!(decode(b"Caf\xe9", SourceEncoding::Utf8).is_err());
        assert_eq!(
            decode(b"\xEF\xBB\xBFok", SourceEncoding::Utf8).unwrap(),
            "ok"
        );
        // 0x80..0x9F are C1 controls, not the windows-1252 punctuation
        assert_eq!(
            decode(b"\x80\x93", SourceEncoding::Latin1).unwrap(),
            "\u{80}\u{93}"
        );
    }
}
