use std::io::Read;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::error::Result;

/// Sentinel in `purchased_product` marking a row without a purchase.
pub const NO_PURCHASE: &str = "No Purchase";

/// Sentinel in `processed_by` marking a purchase nobody was credited for.
pub const UNASSIGNED: &str = "Unassigned";

/// Source columns the engine understands. Anything else in the CSV is carried
/// through as an extra column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Timestamp,
    SessionId,
    UserId,
    Country,
    PageName,
    UrlCategory,
    PurchasedProduct,
    ProductCategory,
    Referrer,
    ProcessedBy,
}

impl Column {
    pub const ALL: [Column; 10] = [
        Column::Timestamp,
        Column::SessionId,
        Column::UserId,
        Column::Country,
        Column::PageName,
        Column::UrlCategory,
        Column::PurchasedProduct,
        Column::ProductCategory,
        Column::Referrer,
        Column::ProcessedBy,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Timestamp => "timestamp",
            Column::SessionId => "session_id",
            Column::UserId => "user_id",
            Column::Country => "country",
            Column::PageName => "page_name",
            Column::UrlCategory => "url_category",
            Column::PurchasedProduct => "purchased_product",
            Column::ProductCategory => "product_category",
            Column::Referrer => "referrer",
            Column::ProcessedBy => "processed_by",
        }
    }

    pub fn from_header(header: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == header)
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Headers of fields the normalizer derives from the timestamp. They are
/// written on export and ignored (recomputed) on import.
pub const DERIVED_HEADERS: [&str; 6] = ["date", "month", "year", "hour", "quarter", "day_of_week"];

/// A CSV file as read: header names plus string records, nothing parsed yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl RawTable {
    /// Read a CSV with a header row. Ragged rows are accepted; short rows are
    /// padded with empty cells when normalized.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>();

        let mut records = Vec::new();
        for record in rdr.records() {
            let record = record?;
            records.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, records })
    }

    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// One normalized event. Descriptive fields are `None` when the cell was
/// empty or the column is absent from the source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRow {
    /// Position in the source file, or the index column of a re-read export.
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub country: Option<String>,
    pub page_name: Option<String>,
    pub url_category: Option<String>,
    pub purchased_product: Option<String>,
    pub product_category: Option<String>,
    pub referrer: Option<String>,
    pub processed_by: Option<String>,
    /// Values of unknown source columns, aligned with `EventTable::extra_headers`.
    pub extra: Vec<Option<String>>,

    pub date: NaiveDate,
    pub month: String,
    pub year: i32,
    pub hour: u32,
    pub quarter: String,
    pub day_of_week: String,
}

impl EventRow {
    pub fn value(&self, column: Column) -> Option<&str> {
        match column {
            Column::Timestamp => None,
            Column::SessionId => self.session_id.as_deref(),
            Column::UserId => self.user_id.as_deref(),
            Column::Country => self.country.as_deref(),
            Column::PageName => self.page_name.as_deref(),
            Column::UrlCategory => self.url_category.as_deref(),
            Column::PurchasedProduct => self.purchased_product.as_deref(),
            Column::ProductCategory => self.product_category.as_deref(),
            Column::Referrer => self.referrer.as_deref(),
            Column::ProcessedBy => self.processed_by.as_deref(),
        }
    }

    /// A purchase row names a real product. Missing values and the
    /// "No Purchase" sentinel do not count.
    pub fn is_purchase(&self) -> bool {
        matches!(self.purchased_product.as_deref(), Some(p) if p != NO_PURCHASE)
    }

    /// Lowercased page name, or an empty string when missing.
    pub fn page_name_lower(&self) -> String {
        self.page_name
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_default()
    }
}

/// Normalized event table: rows sorted ascending by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventTable {
    /// Source headers in source order, excluding the index column and any
    /// derived-field headers.
    pub headers: Vec<String>,
    /// Known columns present in the source.
    pub columns: Vec<Column>,
    /// Unknown source headers, in source order.
    pub extra_headers: Vec<String>,
    pub rows: Vec<EventRow>,
}

impl EventTable {
    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Same schema, different rows.
    pub fn with_rows(&self, rows: Vec<EventRow>) -> Self {
        Self {
            headers: self.headers.clone(),
            columns: self.columns.clone(),
            extra_headers: self.extra_headers.clone(),
            rows,
        }
    }

    /// First and last calendar date, or `None` for an empty table.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.rows.first()?.date;
        let last = self.rows.last()?.date;
        Some((first, last))
    }

    pub fn purchases(&self) -> impl Iterator<Item = &EventRow> {
        self.rows.iter().filter(|r| r.is_purchase())
    }
}
