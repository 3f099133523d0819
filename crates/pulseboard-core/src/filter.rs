//! Filter selection and the row filter applied on every selection change.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::event::{EventRow, EventTable, UNASSIGNED};

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedDateRange")]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Deserialize)]
struct UncheckedDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<UncheckedDateRange> for DateRange {
    type Error = CoreError;

    fn try_from(raw: UncheckedDateRange) -> Result<Self> {
        DateRange::new(raw.start, raw.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(CoreError::InvalidSelection(format!(
                "end date {end} is before start date {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Number of calendar days covered, counting both ends.
    pub fn span_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// User-selected filters. Every dimension is ANDed; an empty dimension does
/// not restrict anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    pub date_range: Option<DateRange>,
    pub countries: BTreeSet<String>,
    pub salespersons: BTreeSet<String>,
    pub products: BTreeSet<String>,
    pub quarters: BTreeSet<String>,
}

impl FilterSelection {
    /// The unrestricted selection.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to `start..=end`. A malformed range is logged and leaves the
    /// date dimension unrestricted.
    pub fn with_date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        match DateRange::new(start, end) {
            Ok(range) => self.date_range = Some(range),
            Err(e) => {
                warn!(error = %e, "ignoring date range, falling back to the full period");
                self.date_range = None;
            }
        }
        self
    }

    pub fn with_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.countries = countries.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_salespersons<I, S>(mut self, salespersons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.salespersons = salespersons.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_products<I, S>(mut self, products: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.products = products.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_quarters<I, S>(mut self, quarters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.quarters = quarters.into_iter().map(Into::into).collect();
        self
    }

    /// Fill in the date range when none was selected.
    pub fn or_date_range(mut self, fallback: Option<DateRange>) -> Self {
        if self.date_range.is_none() {
            self.date_range = fallback;
        }
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        self.date_range.is_none()
            && self.countries.is_empty()
            && self.salespersons.is_empty()
            && self.products.is_empty()
            && self.quarters.is_empty()
    }

    pub fn matches(&self, row: &EventRow) -> bool {
        if let Some(range) = &self.date_range {
            if !range.contains(row.date) {
                return false;
            }
        }
        member(&self.countries, row.country.as_deref())
            && member(&self.salespersons, row.processed_by.as_deref())
            && member(&self.products, row.purchased_product.as_deref())
            && (self.quarters.is_empty() || self.quarters.contains(&row.quarter))
    }
}

fn member(selected: &BTreeSet<String>, value: Option<&str>) -> bool {
    if selected.is_empty() {
        return true;
    }
    value.is_some_and(|v| selected.contains(v))
}

/// Apply `selection` to `table`. Rows keep their order and index.
pub fn filter(table: &EventTable, selection: &FilterSelection) -> EventTable {
    if selection.is_unrestricted() {
        return table.clone();
    }
    let rows: Vec<EventRow> = table
        .rows
        .iter()
        .filter(|row| selection.matches(row))
        .cloned()
        .collect();
    debug!(kept = rows.len(), total = table.len(), "filtered event table");
    table.with_rows(rows)
}

/// Values offered for each filter dimension, in first-appearance order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub countries: Vec<String>,
    pub salespersons: Vec<String>,
    pub products: Vec<String>,
    pub quarters: Vec<String>,
}

impl FilterOptions {
    pub fn from_table(table: &EventTable) -> Self {
        let (min_date, max_date) = table.date_bounds().unzip();
        let mut opts = Self {
            min_date,
            max_date,
            ..Self::default()
        };
        for row in &table.rows {
            push_unique(&mut opts.countries, row.country.as_deref());
            if let Some(person) = row.processed_by.as_deref() {
                if !person.eq_ignore_ascii_case(UNASSIGNED) {
                    push_unique(&mut opts.salespersons, Some(person));
                }
            }
            if row.is_purchase() {
                push_unique(&mut opts.products, row.purchased_product.as_deref());
            }
            push_unique(&mut opts.quarters, Some(&row.quarter));
        }
        opts
    }
}

fn push_unique(values: &mut Vec<String>, value: Option<&str>) {
    if let Some(v) = value {
        if !values.iter().any(|existing| existing == v) {
            values.push(v.to_string());
        }
    }
}
