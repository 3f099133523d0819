//! Raw-data download: the (filtered) table written back out as CSV.

use crate::error::Result;
use crate::event::{Column, EventRow, EventTable};

const EXPORTED_DERIVED: [&str; 5] = ["date", "month", "year", "hour", "quarter"];

#[derive(Debug, Clone, Copy)]
enum Field {
    Known(Column),
    Extra(usize),
}

fn fields(table: &EventTable) -> Vec<Field> {
    let mut seen = Vec::new();
    let mut next_extra = 0;
    table
        .headers
        .iter()
        .map(|header| match Column::from_header(header) {
            Some(column) if !seen.contains(&column) => {
                seen.push(column);
                Field::Known(column)
            }
            _ => {
                next_extra += 1;
                Field::Extra(next_extra - 1)
            }
        })
        .collect()
}

fn field_value(row: &EventRow, field: Field) -> String {
    match field {
        Field::Known(Column::Timestamp) => format_timestamp(row),
        Field::Known(column) => row.value(column).unwrap_or_default().to_string(),
        Field::Extra(i) => row
            .extra
            .get(i)
            .and_then(|v| v.as_deref())
            .unwrap_or_default()
            .to_string(),
    }
}

fn format_timestamp(row: &EventRow) -> String {
    row.timestamp.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

/// Serialize `table` as UTF-8, comma-delimited, `\n`-terminated CSV.
///
/// Layout: an unnamed index column, the source columns in source order, then
/// the derived date/month/year/hour/quarter columns. Missing values are
/// written as empty fields. Re-reading the output and normalizing it yields
/// the same table.
pub fn to_csv(table: &EventTable) -> Result<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::with_capacity(table.len().saturating_mul(128)));

    let fields = fields(table);

    let mut header: Vec<&str> = Vec::with_capacity(fields.len() + 1 + EXPORTED_DERIVED.len());
    header.push("");
    header.extend(table.headers.iter().map(String::as_str));
    header.extend(EXPORTED_DERIVED);
    wtr.write_record(&header)?;

    for row in &table.rows {
        let mut record = Vec::with_capacity(header.len());
        record.push(row.index.to_string());
        record.extend(fields.iter().map(|f| field_value(row, *f)));
        record.push(row.date.format("%Y-%m-%d").to_string());
        record.push(row.month.clone());
        record.push(row.year.to_string());
        record.push(row.hour.to_string());
        record.push(row.quarter.clone());
        wtr.write_record(&record)?;
    }

    wtr.into_inner().map_err(|e| e.into_error().into())
}
