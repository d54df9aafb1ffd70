/// Column names shared by the raw source, the cleaned artifact and the store.
/// Source/artifact headers use the human-readable names; the store uses the
/// underscored names in the same positional order.

// Source columns, in file order
pub const ROW_ID: &str = "Row ID";
pub const ORDER_ID: &str = "Order ID";
pub const ORDER_DATE: &str = "Order Date";
pub const SHIP_DATE: &str = "Ship Date";
pub const SHIP_MODE: &str = "Ship Mode";
pub const CUSTOMER_ID: &str = "Customer ID";
pub const CUSTOMER_NAME: &str = "Customer Name";
pub const SEGMENT: &str = "Segment";
pub const COUNTRY: &str = "Country";
pub const CITY: &str = "City";
pub const STATE: &str = "State";
pub const POSTAL_CODE: &str = "Postal Code";
pub const REGION: &str = "Region";
pub const PRODUCT_ID: &str = "Product ID";
pub const CATEGORY: &str = "Category";
pub const SUB_CATEGORY: &str = "Sub-Category";
pub const PRODUCT_NAME: &str = "Product Name";
pub const SALES: &str = "Sales";
pub const QUANTITY: &str = "Quantity";
pub const DISCOUNT: &str = "Discount";
pub const PROFIT: &str = "Profit";

// Derived columns appended by the cleaner
pub const YEAR: &str = "Year";
pub const MONTH: &str = "Month";
pub const PROFIT_RATIO: &str = "Profit Ratio";

pub const SOURCE_COLUMNS: [&str; 21] = [
    ROW_ID, ORDER_ID, ORDER_DATE, SHIP_DATE, SHIP_MODE, CUSTOMER_ID, CUSTOMER_NAME, SEGMENT,
    COUNTRY, CITY, STATE, POSTAL_CODE, REGION, PRODUCT_ID, CATEGORY, SUB_CATEGORY, PRODUCT_NAME,
    SALES, QUANTITY, DISCOUNT, PROFIT,
];

pub const DERIVED_COLUMNS: [&str; 3] = [YEAR, MONTH, PROFIT_RATIO];

/// Target table in the relational store
pub const SALES_TABLE: &str = "sales";

// Environment variables read by the config layer
pub const ENV_DB_HOST: &str = "DB_HOST";
pub const ENV_DB_USER: &str = "DB_USER";
pub const ENV_DB_PASSWORD: &str = "DB_PASSWORD";
pub const ENV_DB_NAME: &str = "DB_NAME";
pub const ENV_DATA_DIR: &str = "PIPELINE_DATA_DIR";
pub const ENV_OUTPUT_DIR: &str = "PIPELINE_OUTPUT_DIR";

// Developer defaults
pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_USER: &str = "root";
pub const DEFAULT_DB_PASSWORD: &str = "admin123";
pub const DEFAULT_DB_NAME: &str = "superstore";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_OUTPUT_DIR: &str = "output";
pub const RAW_FILE_NAME: &str = "Superstore.csv";
pub const CLEANED_FILE_NAME: &str = "cleaned_superstore.csv";
pub const DEFAULT_CONFIG_FILE: &str = "pipeline.toml";

/// Convert a human-readable column name to the store column name
/// ("Sub-Category" -> "Sub_Category", "Row ID" -> "Row_ID").
pub fn store_column_name(column: &str) -> String {
    column.replace([' ', '-'], "_")
}

/// Store column names in positional insert order.
pub fn store_columns(include_derived: bool) -> Vec<String> {
    let derived: &[&str] = if include_derived { &DERIVED_COLUMNS } else { &[] };
    SOURCE_COLUMNS
        .iter()
        .chain(derived.iter())
        .map(|c| store_column_name(c))
        .collect()
}
