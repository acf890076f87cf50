//! CSV and other delimited files.

use super::text::{decode_text, detect_delimiter};
use super::Table;
use crate::error::{Result, SourceError};
use csv::{ReaderBuilder, Terminator};
use shortwatch_core::RawValue;

/// Parse delimited bytes into a table without interpreting a header row.
///
/// `delimiter` of `None` auto-detects among `;`, `,` and tab. Rows that fail
/// to parse are skipped with a debug log; a file with no rows is a
/// [`SourceError::Parse`].
pub fn parse_delimited(bytes: &[u8], delimiter: Option<u8>, name: &str) -> Result<Table> {
    let text = decode_text(bytes);
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(&text));

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .terminator(Terminator::Any(b'\n'))
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        match record {
            Ok(record) => rows.push(
                record
                    .iter()
                    .map(|field| RawValue::text(field.trim_end_matches('\r')))
                    .collect(),
            ),
            Err(e) => tracing::debug!(table = %name, row = index + 1, "Skipping malformed row: {}", e),
        }
    }

    if rows.is_empty() {
        return Err(SourceError::Parse(format!("{name}: file contains no rows")));
    }

    tracing::debug!(table = %name, rows = rows.len(), delimiter = %char::from(delimiter), "Parsed delimited file");
    Ok(Table::new(name, rows))
}
