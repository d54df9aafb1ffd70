use crate::config::{LoadMode, PipelineConfig};
use crate::constants::*;
use crate::error::{PipelineError, Result};
use crate::types::CleanedRecord;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// SQL type of each store column, in positional insert order.
const SOURCE_COLUMN_TYPES: [(&str, &str); 21] = [
    (ROW_ID, "INTEGER NOT NULL"),
    (ORDER_ID, "TEXT NOT NULL"),
    (ORDER_DATE, "DATE NOT NULL"),
    (SHIP_DATE, "DATE NOT NULL"),
    (SHIP_MODE, "TEXT NOT NULL"),
    (CUSTOMER_ID, "TEXT NOT NULL"),
    (CUSTOMER_NAME, "TEXT NOT NULL"),
    (SEGMENT, "TEXT NOT NULL"),
    (COUNTRY, "TEXT NOT NULL"),
    (CITY, "TEXT NOT NULL"),
    (STATE, "TEXT NOT NULL"),
    (POSTAL_CODE, "TEXT NOT NULL"),
    (REGION, "TEXT NOT NULL"),
    (PRODUCT_ID, "TEXT NOT NULL"),
    (CATEGORY, "TEXT NOT NULL"),
    (SUB_CATEGORY, "TEXT NOT NULL"),
    (PRODUCT_NAME, "TEXT NOT NULL"),
    (SALES, "DECIMAL(12,4) NOT NULL"),
    (QUANTITY, "INTEGER NOT NULL"),
    (DISCOUNT, "DECIMAL(6,4) NOT NULL"),
    (PROFIT, "DECIMAL(12,4) NOT NULL"),
];

// Nullable so a table provisioned with them still accepts 21-column loads.
// SQLite also stores a NaN (0/0) Profit_Ratio as NULL.
const DERIVED_COLUMN_TYPES: [(&str, &str); 3] = [
    (YEAR, "INTEGER"),
    (MONTH, "INTEGER"),
    (PROFIT_RATIO, "REAL"),
];

/// DDL for the `sales` table, as a list of complete statements.
pub fn schema_statements(include_derived: bool) -> Vec<String> {
    let derived: &[(&str, &str)] = if include_derived {
        &DERIVED_COLUMN_TYPES
    } else {
        &[]
    };
    let columns: Vec<String> = SOURCE_COLUMN_TYPES
        .iter()
        .chain(derived.iter())
        .map(|(name, ty)| format!("    {} {}", store_column_name(name), ty))
        .collect();

    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS {SALES_TABLE} (\n{}\n)",
            columns.join(",\n")
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS idx_{SALES_TABLE}_order_date ON {SALES_TABLE} (Order_Date)"
        ),
    ]
}

/// Connection to the relational store holding the `sales` table.
/// The connection is closed when this value is dropped.
pub struct SalesDatabase {
    conn: Connection,
}

impl SalesDatabase {
    /// Open the configured database, creating its file (and directory) when
    /// it does not exist yet.
    pub fn open(config: &PipelineConfig) -> Result<Self> {
        let path = config.database_path();
        info!(
            database = %config.store.database,
            host = %config.store.host,
            user = %config.store.user,
            path = %path.display(),
            "Connecting to store"
        );
        Self::open_at(&path)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                PipelineError::StoreUnreachable(format!(
                    "cannot create store directory '{}': {e}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path).map_err(|e| {
            PipelineError::StoreUnreachable(format!(
                "cannot open database '{}': {e}",
                path.display()
            ))
        })?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| PipelineError::StoreUnreachable(e.to_string()))?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Create the `sales` table if needed. Safe to call repeatedly. Fails when
    /// an existing table lacks a column this run needs.
    pub fn provision(&self, include_derived: bool) -> Result<()> {
        let batch = schema_statements(include_derived)
            .into_iter()
            .map(|stmt| stmt + ";")
            .collect::<Vec<_>>()
            .join("\n");

        self.conn
            .execute_batch(&batch)
            .map_err(|e| PipelineError::SchemaError(e.to_string()))?;

        let existing = self.table_columns()?;
        for expected in store_columns(include_derived) {
            if !existing.iter().any(|c| c.eq_ignore_ascii_case(&expected)) {
                return Err(PipelineError::SchemaError(format!(
                    "table '{SALES_TABLE}' exists without column '{expected}'"
                )));
            }
        }

        debug!(columns = existing.len(), "Schema provisioned");
        Ok(())
    }

    fn table_columns(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({SALES_TABLE})"))
            .map_err(|e| PipelineError::SchemaError(e.to_string()))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    /// Insert every record in order inside one transaction, committed once at
    /// the end. The first failing insert aborts the run and rolls back every
    /// row of this run. In `Replace` mode existing rows are deleted inside the
    /// same transaction.
    pub fn insert_all(
        &mut self,
        records: &[CleanedRecord],
        mode: LoadMode,
        include_derived: bool,
    ) -> Result<usize> {
        let columns = store_columns(include_derived);
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {SALES_TABLE} ({}) VALUES ({placeholders})",
            columns.join(", ")
        );

        let tx = self
            .conn
            .transaction()
            .map_err(|e| PipelineError::StoreUnreachable(e.to_string()))?;

        if mode == LoadMode::Replace {
            let removed = tx.execute(&format!("DELETE FROM {SALES_TABLE}"), [])?;
            info!(removed, "Cleared existing rows before load");
        }

        {
            let mut stmt = tx.prepare(&sql)?;
            for (idx, record) in records.iter().enumerate() {
                stmt.execute(params_from_iter(row_values(record, include_derived)))
                    .map_err(|e| PipelineError::InsertFailure {
                        record: idx + 1,
                        reason: e.to_string(),
                    })?;
            }
        }

        tx.commit()?;
        Ok(records.len())
    }

    pub fn row_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {SALES_TABLE}"),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Delete every row of `sales`, keeping the table.
    pub fn clear(&self) -> Result<usize> {
        let removed = self
            .conn
            .execute(&format!("DELETE FROM {SALES_TABLE}"), [])?;
        Ok(removed)
    }

    /// Sales, Profit, Quantity and Discount of every stored row, in insert order.
    pub fn numeric_rows(&self) -> Result<Vec<[f64; 4]>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT Sales, Profit, Quantity, Discount FROM {SALES_TABLE} ORDER BY rowid"
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok([
                    row.get::<_, f64>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                ])
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

fn row_values(record: &CleanedRecord, include_derived: bool) -> Vec<Value> {
    let mut values = vec![
        Value::Integer(record.row_id),
        Value::Text(record.order_id.clone()),
        Value::Text(record.order_date.to_string()),
        Value::Text(record.ship_date.to_string()),
        Value::Text(record.ship_mode.clone()),
        Value::Text(record.customer_id.clone()),
        Value::Text(record.customer_name.clone()),
        Value::Text(record.segment.clone()),
        Value::Text(record.country.clone()),
        Value::Text(record.city.clone()),
        Value::Text(record.state.clone()),
        Value::Text(record.postal_code.clone()),
        Value::Text(record.region.clone()),
        Value::Text(record.product_id.clone()),
        Value::Text(record.category.clone()),
        Value::Text(record.sub_category.clone()),
        Value::Text(record.product_name.clone()),
        Value::Real(record.sales),
        Value::Integer(record.quantity),
        Value::Real(record.discount),
        Value::Real(record.profit),
    ];
    if include_derived {
        values.push(Value::Integer(record.year as i64));
        values.push(Value::Integer(record.month as i64));
        values.push(if record.profit_ratio.is_nan() {
            Value::Null
        } else {
            Value::Real(record.profit_ratio)
        });
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lists_columns_in_insert_order() {
        let ddl = &schema_statements(false)[0];
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS sales ("));
        let row_id = ddl.find("Row_ID").unwrap();
        let sub_category = ddl.find("Sub_Category").unwrap();
        let profit = ddl.rfind("Profit ").unwrap();
        assert!(row_id < sub_category && sub_category < profit);
        assert!(!ddl.contains("Profit_Ratio"));
        assert!(schema_statements(true)[0].contains("Profit_Ratio REAL"));
    }

    #[test]
    fn provisioning_is_idempotent() {
        let db = SalesDatabase::open_in_memory().unwrap();
        db.provision(false).unwrap();
        db.provision(false).unwrap();
        assert_eq!(db.table_columns().unwrap().len(), 21);
        assert_eq!(db.row_count().unwrap(), 0);
    }

    #[test]
    fn derived_columns_need_a_matching_table() {
        let db = SalesDatabase::open_in_memory().unwrap();
        db.provision(false).unwrap();
        let err = db.provision(true).unwrap_err();
        assert!(matches!(err, PipelineError::SchemaError(ref m) if m.contains("Year")));
    }

    #[test]
    fn open_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("superstore.db");
        let db = SalesDatabase::open_at(&path).unwrap();
        db.provision(false).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn unopenable_path_is_store_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let err = SalesDatabase::open_at(&blocker.join("superstore.db"))
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::StoreUnreachable(ref m) if m.contains("blocker")));
    }

    #[test]
    fn table_with_derived_columns_accepts_base_loads() {
        let db = SalesDatabase::open_in_memory().unwrap();
        db.provision(true).unwrap();
        // a later run without derived columns reuses the wider table
        db.provision(false).unwrap();
        let year_nullable: i64 = db
            .connection()
            .query_row(
                "SELECT \"notnull\" FROM pragma_table_info('sales') WHERE name = 'Year'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(year_nullable, 0);
    }
}
