//! Tabular data parsing.
//!
//! Every format (CSV, spreadsheet, HTML table) is reduced to a [`Table`]:
//! an ordered list of rows of loosely typed cells. Header detection and
//! column mapping work on tables only, see [`crate::headers`].

pub mod delimited;
pub mod html;
pub mod spreadsheet;
pub mod text;

use shortwatch_core::RawValue;

pub use delimited::parse_delimited;
pub use html::{
    find_form, find_links, parse_html_tables, resolve_url, FormInput, HtmlForm, HtmlRow, HtmlTable,
};
pub use spreadsheet::{is_workbook, parse_workbook};
pub use text::{decode_text, detect_delimiter};

/// A named grid of cells (a sheet, a CSV file or an HTML table).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    /// Sheet name, file label or table heading
    pub name: String,
    /// Rows in source order; rows may differ in length
    pub rows: Vec<Vec<RawValue>>,
}

impl Table {
    /// Create a table.
    #[must_use]
    pub fn new(name: impl Into<String>, rows: Vec<Vec<RawValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Build a table from string cells; blank strings become `Empty`.
    #[must_use]
    pub fn from_strings<S: AsRef<str>>(name: impl Into<String>, rows: &[Vec<S>]) -> Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|cell| RawValue::text(cell.as_ref())).collect())
            .collect();
        Self::new(name, rows)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cells of row `index` rendered as trimmed text (empty for blanks).
    #[must_use]
    pub fn row_text(&self, index: usize) -> Vec<String> {
        self.rows
            .get(index)
            .map(|row| row.iter().map(cell_text).collect())
            .unwrap_or_default()
    }
}

/// Render one cell as trimmed text.
#[must_use]
pub fn cell_text(value: &RawValue) -> String {
    value
        .as_text()
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

/// Whether every cell in the row is blank.
#[must_use]
pub fn is_blank_row(row: &[RawValue]) -> bool {
    row.iter().all(RawValue::is_blank)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_strings_maps_blanks() {
        let table = Table::from_strings("t", &[vec!["Holder", " ", "ISIN"]]);
        assert_eq!(table.rows[0][1], RawValue::Empty);
        assert_eq!(table.row_text(0), vec!["Holder", "", "ISIN"]);
        assert!(table.row_text(5).is_empty());
    }

    #[test]
    fn test_blank_row() {
        assert!(is_blank_row(&[RawValue::Empty, RawValue::text("  ")]));
        assert!(!is_blank_row(&[RawValue::Empty, RawValue::Number(0.0)]));
    }
}
