use crate::constants::SOURCE_COLUMNS;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Index of each source column inside `RawRecord::values`.
pub mod col {
    pub const ROW_ID: usize = 0;
    pub const ORDER_ID: usize = 1;
    pub const ORDER_DATE: usize = 2;
    pub const SHIP_DATE: usize = 3;
    pub const SHIP_MODE: usize = 4;
    pub const CUSTOMER_ID: usize = 5;
    pub const CUSTOMER_NAME: usize = 6;
    pub const SEGMENT: usize = 7;
    pub const COUNTRY: usize = 8;
    pub const CITY: usize = 9;
    pub const STATE: usize = 10;
    pub const POSTAL_CODE: usize = 11;
    pub const REGION: usize = 12;
    pub const PRODUCT_ID: usize = 13;
    pub const CATEGORY: usize = 14;
    pub const SUB_CATEGORY: usize = 15;
    pub const PRODUCT_NAME: usize = 16;
    pub const SALES: usize = 17;
    pub const QUANTITY: usize = 18;
    pub const DISCOUNT: usize = 19;
    pub const PROFIT: usize = 20;
}

/// One order line exactly as read from the source file.
///
/// `values` follows `SOURCE_COLUMNS` order; `None` marks a missing value.
/// `line` is the source line the record started on and takes no part in
/// duplicate detection.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub line: u64,
    pub values: Vec<Option<String>>,
}

impl RawRecord {
    pub fn value(&self, idx: usize) -> Option<&str> {
        self.values.get(idx).and_then(|v| v.as_deref())
    }

    pub fn is_complete(&self) -> bool {
        self.values.len() == SOURCE_COLUMNS.len() && self.values.iter().all(Option::is_some)
    }
}

/// A raw record whose date columns went through date parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct DatedRecord {
    pub raw: RawRecord,
    pub order_date: Option<NaiveDate>,
    pub ship_date: Option<NaiveDate>,
}

impl DatedRecord {
    pub fn is_complete(&self) -> bool {
        self.raw.is_complete() && self.order_date.is_some() && self.ship_date.is_some()
    }
}

/// A fully typed, deduplicated, complete record with derived fields.
/// Serialized as one row of the cleaned artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedRecord {
    #[serde(rename = "Row ID")]
    pub row_id: i64,
    #[serde(rename = "Order ID")]
    pub order_id: String,
    #[serde(rename = "Order Date")]
    pub order_date: NaiveDate,
    #[serde(rename = "Ship Date")]
    pub ship_date: NaiveDate,
    #[serde(rename = "Ship Mode")]
    pub ship_mode: String,
    #[serde(rename = "Customer ID")]
    pub customer_id: String,
    #[serde(rename = "Customer Name")]
    pub customer_name: String,
    #[serde(rename = "Segment")]
    pub segment: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "City")]
    pub city: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "Postal Code")]
    pub postal_code: String,
    #[serde(rename = "Region")]
    pub region: String,
    #[serde(rename = "Product ID")]
    pub product_id: String,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Sub-Category")]
    pub sub_category: String,
    #[serde(rename = "Product Name")]
    pub product_name: String,
    #[serde(rename = "Sales")]
    pub sales: f64,
    #[serde(rename = "Quantity")]
    pub quantity: i64,
    #[serde(rename = "Discount")]
    pub discount: f64,
    #[serde(rename = "Profit")]
    pub profit: f64,
    #[serde(rename = "Year")]
    pub year: i32,
    #[serde(rename = "Month")]
    pub month: u32,
    /// `profit / sales`; non-finite when `sales` is zero.
    #[serde(rename = "Profit Ratio")]
    pub profit_ratio: f64,
}

impl CleanedRecord {
    /// False when `sales` is zero and the ratio is undefined.
    pub fn has_defined_profit_ratio(&self) -> bool {
        self.profit_ratio.is_finite()
    }
}

/// Profit ratio as IEEE division: a zero `sales` yields ±inf (or NaN when
/// profit is also zero) rather than an error.
pub fn profit_ratio(profit: f64, sales: f64) -> f64 {
    profit / sales
}
