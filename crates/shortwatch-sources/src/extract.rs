//! Table to raw record extraction shared by the tabular sources.

use crate::adapter::Extraction;
use crate::headers::{normalize_header, ColumnMap, Field, HeaderSpec};
use crate::tabular::{cell_text, is_blank_row, Table};
use shortwatch_core::{JurisdictionCode, Provenance, RawExtractedRecord, RawValue};

/// Rows searched for a header when no explicit locator is set.
pub const DEFAULT_HEADER_SEARCH_ROWS: usize = 10;

const TOTAL_LABELS: [&str; 3] = ["SUM", "TOTAL", "SUMMARY"];

/// Reads records out of a [`Table`] according to a [`HeaderSpec`].
#[derive(Debug, Clone, Copy)]
pub struct TableExtractor<'a> {
    spec: &'a HeaderSpec,
    header_search_rows: usize,
    header_row: Option<fn(&[String]) -> bool>,
    skip_totals: bool,
    fix_text: Option<fn(&str) -> String>,
}

impl<'a> TableExtractor<'a> {
    /// Extractor searching the first rows for a header matching `spec`.
    #[must_use]
    pub fn new(spec: &'a HeaderSpec) -> Self {
        Self {
            spec,
            header_search_rows: DEFAULT_HEADER_SEARCH_ROWS,
            header_row: None,
            skip_totals: false,
            fix_text: None,
        }
    }

    /// Search the first `rows` rows for the header.
    #[must_use]
    pub fn header_search_rows(mut self, rows: usize) -> Self {
        self.header_search_rows = rows;
        self
    }

    /// Take the first row satisfying `predicate` as the header.
    #[must_use]
    pub fn header_row_where(mut self, predicate: fn(&[String]) -> bool) -> Self {
        self.header_row = Some(predicate);
        self
    }

    /// Skip `SUM`/`TOTAL` summary rows.
    #[must_use]
    pub fn skip_total_rows(mut self) -> Self {
        self.skip_totals = true;
        self
    }

    /// Rewrite every text cell with `fix` before use.
    #[must_use]
    pub fn fix_text(mut self, fix: fn(&str) -> String) -> Self {
        self.fix_text = Some(fix);
        self
    }

    fn locate_header(&self, table: &Table) -> Option<(usize, ColumnMap)> {
        let Some(predicate) = self.header_row else {
            return self.spec.find_header_row(table, self.header_search_rows);
        };

        let index = (0..table.len().min(self.header_search_rows))
            .find(|index| predicate(&table.row_text(*index)))?;
        let map = self.spec.map_columns(&table.row_text(index));
        self.spec.is_satisfied(&map).then_some((index, map))
    }

    /// Extract every data row of `table`.
    ///
    /// Without a usable header the result is empty and carries a layout
    /// issue; the discovered headers are logged.
    #[must_use]
    pub fn extract(
        &self,
        table: &Table,
        jurisdiction: &JurisdictionCode,
        provenance: &Provenance,
        source_url: &str,
    ) -> Extraction {
        let Some((header_index, columns)) = self.locate_header(table) else {
            let discovered: Vec<Vec<String>> = (0..table.len().min(self.header_search_rows))
                .map(|i| table.row_text(i))
                .filter(|row| row.iter().any(|cell| !cell.is_empty()))
                .take(3)
                .collect();
            tracing::warn!(
                jurisdiction = %jurisdiction,
                table = %table.name,
                headers = ?discovered,
                "No column mapping found"
            );
            return Extraction::layout(format!("{}: no recognizable header row", table.name));
        };

        tracing::debug!(
            jurisdiction = %jurisdiction,
            table = %table.name,
            header_row = header_index,
            fields = ?columns.fields(),
            "Mapped columns"
        );

        let header_manager = columns
            .get(Field::Manager)
            .and_then(|c| table.rows[header_index].get(c))
            .map(|cell| normalize_header(&cell_text(cell)));

        let mut records = Vec::new();
        for (offset, row) in table.rows.iter().enumerate().skip(header_index + 1) {
            if is_blank_row(row) {
                continue;
            }

            let manager = self.cell(row, &columns, Field::Manager);
            let manager_text = cell_text(&manager);
            if header_manager.as_deref() == Some(normalize_header(&manager_text).as_str()) {
                tracing::debug!(table = %table.name, row = offset + 1, "Skipping repeated header row");
                continue;
            }
            if self.skip_totals && TOTAL_LABELS.contains(&manager_text.to_uppercase().as_str()) {
                tracing::debug!(table = %table.name, row = offset + 1, "Skipping {} row", manager_text);
                continue;
            }

            let provenance = match columns.get(Field::Status) {
                Some(_) => row_flag(&self.cell(row, &columns, Field::Status)),
                None => provenance.clone(),
            };

            let mut record = RawExtractedRecord::new(jurisdiction.clone(), provenance);
            record.manager_name = manager;
            record.company_name = self.cell(row, &columns, Field::Issuer);
            record.isin = self.cell(row, &columns, Field::Isin);
            record.position_size = self.cell(row, &columns, Field::PositionSize);
            record.date = self.cell(row, &columns, Field::Date);
            if record.date.is_blank() {
                record.date = self.cell(row, &columns, Field::FallbackDate);
            }
            record.end_date = self.cell(row, &columns, Field::EndDate);
            record.source_url = Some(source_url.to_string());
            records.push(record);
        }

        tracing::debug!(table = %table.name, count = records.len(), "Extracted rows");
        Extraction::from_records(records)
    }

    fn cell(&self, row: &[RawValue], columns: &ColumnMap, field: Field) -> RawValue {
        let value = columns
            .get(field)
            .and_then(|c| row.get(c))
            .cloned()
            .unwrap_or_default();
        match (value, self.fix_text) {
            (RawValue::Text(text), Some(fix)) => RawValue::text(fix(&text)),
            (value, _) => value,
        }
    }
}

/// Provenance from a per-row status cell: active iff it says "active" and
/// not "historical".
#[must_use]
pub fn row_flag(status: &RawValue) -> Provenance {
    let status = cell_text(status).to_lowercase();
    if status.contains("active") && !status.contains("historical") {
        Provenance::current("row:active")
    } else {
        Provenance::historical("row:historical")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortwatch_core::ProvenanceKind;

    const SPEC: HeaderSpec = HeaderSpec::exact(&[
        (Field::Manager, &["Position holder"]),
        (Field::Issuer, &["Issuer"]),
        (Field::Isin, &["ISIN"]),
        (Field::PositionSize, &["Net short position"]),
        (Field::Date, &["Position date"]),
        (Field::FallbackDate, &["Publication date"]),
        (Field::Status, &["Active/Historical"]),
    ]);

    fn code() -> JurisdictionCode {
        JurisdictionCode::new("BE").unwrap()
    }

    #[test]
    fn test_extracts_rows_and_skips_repeated_headers() {
        let table = Table::from_strings(
            "current",
            &[
                vec!["Position holder", "Issuer", "ISIN", "Net short position", "Position date"],
                vec!["Acme", "Foo NV", "BE0000000001", "0,52", "01/03/2024"],
                vec!["", "", "", "", ""],
                vec!["Position holder", "Issuer", "ISIN", "Net short position", "Position date"],
                vec!["Bar LLP", "Baz SA", "BE0000000002", "0,61", "02/03/2024"],
            ],
        );

        let extraction = TableExtractor::new(&SPEC).extract(
            &table,
            &code(),
            &Provenance::current("file:current"),
            "https://www.fsma.be/x.csv",
        );

        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.records[1].manager_name, RawValue::from("Bar LLP"));
        assert_eq!(extraction.records[0].position_size, RawValue::from("0,52"));
        assert_eq!(
            extraction.records[0].source_url.as_deref(),
            Some("https://www.fsma.be/x.csv")
        );
        assert!(!extraction.is_degraded());
    }

    #[test]
    fn test_missing_header_is_layout_issue() {
        let table = Table::from_strings("sheet", &[vec!["Foo", "Bar"], vec!["1", "2"]]);
        let extraction =
            TableExtractor::new(&SPEC).extract(&table, &code(), &Provenance::mixed("file"), "u");

        assert!(extraction.records.is_empty());
        assert_eq!(extraction.layout_issues, vec!["sheet: no recognizable header row"]);
    }

    #[test]
    fn test_status_column_overrides_provenance() {
        let table = Table::from_strings(
            "English",
            &[
                vec!["Position holder", "ISIN", "Net short position", "Position date", "Active/Historical"],
                vec!["Acme", "DK0000000001", "0.6", "01-03-2024", "Active"],
                vec!["Acme", "DK0000000001", "0.4", "01-02-2024", "Historical"],
            ],
        );
        let extraction =
            TableExtractor::new(&SPEC).extract(&table, &code(), &Provenance::mixed("file"), "u");

        assert_eq!(extraction.records[0].provenance.kind, ProvenanceKind::Current);
        assert_eq!(extraction.records[1].provenance.kind, ProvenanceKind::Historical);
    }

    #[test]
    fn test_fallback_date_and_totals() {
        let table = Table::from_strings(
            "t",
            &[
                vec!["Position holder", "Issuer", "Net short position", "Position date", "Publication date"],
                vec!["Acme", "Foo", "0,7", "", "05/03/2024"],
                vec!["SUM", "", "0,7", "", ""],
            ],
        );
        let extraction = TableExtractor::new(&SPEC)
            .skip_total_rows()
            .extract(&table, &code(), &Provenance::current("section:active"), "u");

        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].date, RawValue::from("05/03/2024"));
    }

    #[test]
    fn test_custom_header_locator_and_fixup() {
        fn has_lei_and_isin(row: &[String]) -> bool {
            row.iter().any(|c| c == "LEI") && row.iter().any(|c| c == "ISIN")
        }
        fn fix(text: &str) -> String {
            text.replace('\u{9c}', "o")
        }

        let table = Table::from_strings(
            "Última",
            &[
                vec!["Position holder", "Issuer", "", "", ""],
                vec!["LEI", "Position holder", "Issuer", "ISIN", "Net short position", "Position date"],
                vec!["529900", "Gesti\u{9c}n SA", "Foo", "ES0000000001", "0,5", "01/03/2024"],
            ],
        );
        let extraction = TableExtractor::new(&SPEC)
            .header_row_where(has_lei_and_isin)
            .fix_text(fix)
            .extract(&table, &code(), &Provenance::current("sheet:Última"), "u");

        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].manager_name, RawValue::from("Gestion SA"));
    }

    #[test]
    fn test_row_flag() {
        assert_eq!(row_flag(&RawValue::from("Active")).label, "row:active");
        assert_eq!(row_flag(&RawValue::from("Historical")).label, "row:historical");
        assert_eq!(row_flag(&RawValue::Empty).kind, ProvenanceKind::Historical);
    }
}
