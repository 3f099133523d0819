//! Raw CSV table to normalized, time-sorted event table.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::event::{Column, EventRow, EventTable, RawTable, DERIVED_HEADERS};

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Parse an ISO-like timestamp. Values carrying a UTC offset are converted to
/// UTC; naive values are taken as-is.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_utc());
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Quarter label in the "2025Q1" form.
pub fn quarter_label(ts: &NaiveDateTime) -> String {
    format!("{}Q{}", ts.year(), ts.month0() / 3 + 1)
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Index,
    Known(Column),
    Extra,
    Derived,
}

fn layout(headers: &[String]) -> Vec<Slot> {
    let mut seen = Vec::new();
    headers
        .iter()
        .enumerate()
        .map(|(pos, header)| {
            if pos == 0 && header.is_empty() {
                return Slot::Index;
            }
            if DERIVED_HEADERS.contains(&header.as_str()) {
                return Slot::Derived;
            }
            match Column::from_header(header) {
                Some(column) if !seen.contains(&column) => {
                    seen.push(column);
                    Slot::Known(column)
                }
                _ => Slot::Extra,
            }
        })
        .collect()
}

fn cell(record: &[String], pos: usize) -> Option<String> {
    record
        .get(pos)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

fn build_row(index: usize, timestamp: NaiveDateTime) -> EventRow {
    EventRow {
        index,
        timestamp,
        session_id: None,
        user_id: None,
        country: None,
        page_name: None,
        url_category: None,
        purchased_product: None,
        product_category: None,
        referrer: None,
        processed_by: None,
        extra: Vec::new(),
        date: timestamp.date(),
        month: timestamp.format("%Y-%m").to_string(),
        year: timestamp.year(),
        hour: timestamp.hour(),
        quarter: quarter_label(&timestamp),
        day_of_week: timestamp.format("%A").to_string(),
    }
}

fn assign(row: &mut EventRow, column: Column, value: Option<String>) {
    match column {
        Column::Timestamp => {}
        Column::SessionId => row.session_id = value,
        Column::UserId => row.user_id = value,
        Column::Country => row.country = value,
        Column::PageName => row.page_name = value,
        Column::UrlCategory => row.url_category = value,
        Column::PurchasedProduct => row.purchased_product = value,
        Column::ProductCategory => row.product_category = value,
        Column::Referrer => row.referrer = value,
        Column::ProcessedBy => row.processed_by = value,
    }
}

/// Coerce timestamps, drop rows that fail, sort ascending and add the
/// derived date/month/year/hour/quarter/day-of-week fields.
///
/// Fails with [`CoreError::MissingColumn`] without a `timestamp` column and
/// with [`CoreError::EmptyDataset`] when no row survives coercion.
pub fn normalize(raw: RawTable) -> Result<EventTable> {
    let ts_pos = raw
        .column_position(Column::Timestamp.name())
        .ok_or_else(|| CoreError::MissingColumn {
            column: Column::Timestamp.name().to_string(),
        })?;

    let slots = layout(&raw.headers);
    let mut headers = Vec::new();
    let mut columns = Vec::new();
    let mut extra_headers = Vec::new();
    for (header, slot) in raw.headers.iter().zip(&slots) {
        match slot {
            Slot::Known(column) => {
                headers.push(header.clone());
                columns.push(*column);
            }
            Slot::Extra => {
                headers.push(header.clone());
                extra_headers.push(header.clone());
            }
            Slot::Index | Slot::Derived => {}
        }
    }

    let total = raw.records.len();
    let mut rows = Vec::with_capacity(total);
    for (position, record) in raw.records.iter().enumerate() {
        let Some(timestamp) = record.get(ts_pos).and_then(|v| parse_timestamp(v)) else {
            continue;
        };

        let mut row = build_row(position, timestamp);
        for (pos, slot) in slots.iter().enumerate() {
            match slot {
                Slot::Index => {
                    row.index = record
                        .get(pos)
                        .and_then(|v| v.trim().parse().ok())
                        .unwrap_or(position);
                }
                Slot::Known(column) => assign(&mut row, *column, cell(record, pos)),
                Slot::Extra => row.extra.push(cell(record, pos)),
                Slot::Derived => {}
            }
        }
        rows.push(row);
    }

    let dropped = total - rows.len();
    if dropped > 0 {
        warn!(dropped, total, "dropped rows with unparseable timestamps");
    }
    if rows.is_empty() {
        return Err(CoreError::EmptyDataset);
    }

    rows.sort_by_key(|r| r.timestamp);
    debug!(rows = rows.len(), columns = columns.len(), "normalized event table");

    Ok(EventTable {
        headers,
        columns,
        extra_headers,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(csv: &str) -> RawTable {
        RawTable::from_reader(csv.as_bytes()).expect("read csv")
    }

    #[test]
    fn parses_accepted_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(14, 30, 0))
            .expect("valid");
        for input in [
            "2024-03-05 14:30:00",
            "2024-03-05T14:30:00",
            "2024-03-05 14:30",
            "2024-03-05T14:30:00Z",
            "2024-03-05T16:30:00+02:00",
            "2024-03-05 16:30:00+02:00",
        ] {
            assert_eq!(parse_timestamp(input), Some(expected), "input {input}");
        }
        assert_eq!(
            parse_timestamp("2024-03-05").map(|t| t.hour()),
            Some(0),
            "date-only values land at midnight"
        );
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn missing_timestamp_column_is_an_error() {
        let err = normalize(raw("session_id,country\ns1,Spain\n")).expect_err("must fail");
        assert!(matches!(err, CoreError::MissingColumn { ref column } if column == "timestamp"));
    }

    #[test]
    fn all_invalid_timestamps_is_empty_dataset() {
        let err = normalize(raw("timestamp,session_id\nnope,s1\n,s2\n")).expect_err("must fail");
        assert!(matches!(err, CoreError::EmptyDataset));
    }

    #[test]
    fn drops_invalid_rows_and_sorts_ascending() {
        let table = normalize(raw(
            "timestamp,session_id\n\
             2024-02-01 09:00:00,b\n\
             garbage,x\n\
             2024-01-15 18:45:00,a\n",
        ))
        .expect("normalize");

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].session_id.as_deref(), Some("a"));
        assert_eq!(table.rows[0].index, 2);
        assert_eq!(table.rows[1].index, 0);
    }

    #[test]
    fn sort_is_stable_for_equal_timestamps() {
        let table = normalize(raw(
            "timestamp,session_id\n\
             2024-01-01 10:00:00,first\n\
             2024-01-01 10:00:00,second\n",
        ))
        .expect("normalize");
        assert_eq!(table.rows[0].session_id.as_deref(), Some("first"));
        assert_eq!(table.rows[1].session_id.as_deref(), Some("second"));
    }

    #[test]
    fn derives_temporal_fields() {
        let table = normalize(raw("timestamp\n2025-08-17 23:05:00\n")).expect("normalize");
        let row = &table.rows[0];
        assert_eq!(row.date.to_string(), "2025-08-17");
        assert_eq!(row.month, "2025-08");
        assert_eq!(row.year, 2025);
        assert_eq!(row.hour, 23);
        assert_eq!(row.quarter, "2025Q3");
        assert_eq!(row.day_of_week, "Sunday");
    }

    #[test]
    fn tracks_known_extra_and_missing_columns() {
        let table = normalize(raw(
            "timestamp,session_id,campaign,country\n2024-01-01 10:00:00,s1,spring,\n",
        ))
        .expect("normalize");

        assert_eq!(table.headers, vec!["timestamp", "session_id", "campaign", "country"]);
        assert_eq!(table.extra_headers, vec!["campaign"]);
        assert!(table.has_column(Column::Country));
        assert!(!table.has_column(Column::UserId));
        assert_eq!(table.rows[0].country, None, "empty cells are missing values");
        assert_eq!(table.rows[0].extra, vec![Some("spring".to_string())]);
    }

    #[test]
    fn index_column_and_derived_headers_are_recognized() {
        let table = normalize(raw(
            ",timestamp,session_id,date,hour\n\
             7,2024-01-01 10:00:00,s1,1999-01-01,3\n",
        ))
        .expect("normalize");

        assert_eq!(table.headers, vec!["timestamp", "session_id"]);
        assert_eq!(table.rows[0].index, 7);
        assert_eq!(table.rows[0].hour, 10, "derived fields are recomputed");
    }
}
