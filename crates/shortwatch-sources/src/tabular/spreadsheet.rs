//! Excel and OpenDocument workbooks.

use super::Table;
use crate::error::{Result, SourceError};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use shortwatch_core::normalize::excel_serial_to_date;
use shortwatch_core::RawValue;
use std::io::Cursor;

const ZIP_MAGIC: &[u8] = b"PK";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

/// Whether the bytes look like a workbook (xlsx/ods zip or legacy xls).
#[must_use]
pub fn is_workbook(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC)
}

/// Read every sheet of a workbook, in workbook order.
///
/// Sheets that fail to load are skipped with a warning; a workbook that
/// cannot be opened at all is a [`SourceError::Parse`].
pub fn parse_workbook(bytes: &[u8]) -> Result<Vec<Table>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| SourceError::Parse(format!("cannot open workbook: {e}")))?;

    let mut tables = Vec::new();
    for name in workbook.sheet_names() {
        match workbook.worksheet_range(&name) {
            Ok(range) => {
                let rows: Vec<Vec<RawValue>> = range
                    .rows()
                    .map(|row| row.iter().map(cell_value).collect())
                    .collect();
                tracing::debug!(sheet = %name, rows = rows.len(), "Read sheet");
                tables.push(Table::new(name, rows));
            }
            Err(e) => tracing::warn!(sheet = %name, "Skipping unreadable sheet: {}", e),
        }
    }

    Ok(tables)
}

fn cell_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty | Data::Error(_) => RawValue::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => RawValue::text(s.as_str()),
        #[allow(clippy::cast_precision_loss)]
        Data::Int(i) => RawValue::Number(*i as f64),
        Data::Float(f) => RawValue::Number(*f),
        Data::Bool(b) => RawValue::text(b.to_string()),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map_or_else(|| RawValue::Number(dt.as_f64()), RawValue::Date),
    }
}
