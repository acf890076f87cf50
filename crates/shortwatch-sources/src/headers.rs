//! Column identification.
//!
//! A [`HeaderSpec`] lists exact header names per field and keyword synonyms
//! used as a fallback. Matching runs on normalized header text: BOM and
//! quotes stripped, trailing colon removed, whitespace collapsed, lowercase.

use crate::tabular::Table;
use shortwatch_core::normalize::collapse_whitespace;
use std::collections::HashMap;
use std::fmt;

/// A column the extractors know how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    /// Position holder
    Manager,
    /// Share issuer
    Issuer,
    /// ISIN
    Isin,
    /// Net short position in percent
    PositionSize,
    /// Disclosure date
    Date,
    /// Secondary date used when the disclosure date cell is blank
    FallbackDate,
    /// Publication end date
    EndDate,
    /// Per-row current/historical flag
    Status,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Manager => "manager",
            Self::Issuer => "issuer",
            Self::Isin => "isin",
            Self::PositionSize => "position_size",
            Self::Date => "date",
            Self::FallbackDate => "fallback_date",
            Self::EndDate => "end_date",
            Self::Status => "status",
        };
        f.write_str(name)
    }
}

/// Order in which keyword fallback assigns fields. Date and holder columns
/// often contain the word "position", so they claim their columns before
/// the size field looks.
const KEYWORD_PRIORITY: [Field; 8] = [
    Field::Isin,
    Field::Status,
    Field::EndDate,
    Field::Date,
    Field::Manager,
    Field::Issuer,
    Field::PositionSize,
    Field::FallbackDate,
];

/// Generic synonyms shared by every source.
pub const COMMON_KEYWORDS: &[(Field, &[&str])] = &[
    (Field::Isin, &["isin"]),
    (Field::Date, &["date", "datum", "dato", "fecha", "data", "päivämäärä"]),
    (
        Field::Manager,
        &["holder", "owner", "manager", "inhaber", "innehavare", "haltija", "detentore", "titolare", "tenedor", "houder"],
    ),
    (
        Field::Issuer,
        &["issuer", "emittent", "emittente", "emisor", "emetteur", "utsteder", "udsteder", "liikkeeseenlaskija", "company"],
    ),
    (
        Field::PositionSize,
        &["net short position", "short position", "position", "procent", "percent", "%", "ratio", "posizione", "positie", "netta corta"],
    ),
];

/// Header names and synonyms for one source layout.
#[derive(Debug, Clone, Copy)]
pub struct HeaderSpec {
    /// Exact header names per field, matched after normalization
    pub exact: &'static [(Field, &'static [&'static str])],
    /// Substring synonyms per field, used for columns no exact name matched
    pub keywords: &'static [(Field, &'static [&'static str])],
    /// Fields that must all be mapped for the mapping to be usable
    pub required: &'static [Field],
}

/// Fields every source must provide. Issuer may be replaced by ISIN.
pub const DEFAULT_REQUIRED: &[Field] = &[Field::Manager, Field::PositionSize, Field::Date];

impl HeaderSpec {
    /// Spec using only exact names.
    #[must_use]
    pub const fn exact(exact: &'static [(Field, &'static [&'static str])]) -> Self {
        Self {
            exact,
            keywords: &[],
            required: DEFAULT_REQUIRED,
        }
    }

    /// Spec with exact names and keyword fallback.
    #[must_use]
    pub const fn with_keywords(
        exact: &'static [(Field, &'static [&'static str])],
        keywords: &'static [(Field, &'static [&'static str])],
    ) -> Self {
        Self {
            exact,
            keywords,
            required: DEFAULT_REQUIRED,
        }
    }

    /// Map header cells to field columns.
    #[must_use]
    pub fn map_columns<S: AsRef<str>>(&self, headers: &[S]) -> ColumnMap {
        let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h.as_ref())).collect();
        let mut map = ColumnMap::default();

        for (index, header) in normalized.iter().enumerate() {
            if header.is_empty() {
                continue;
            }
            let matched = self.exact.iter().find(|(field, names)| {
                !map.contains(*field) && names.iter().any(|name| normalize_header(name) == *header)
            });
            if let Some((field, _)) = matched {
                map.insert(*field, index);
            }
        }

        if self.keywords.is_empty() {
            return map;
        }

        for field in KEYWORD_PRIORITY {
            if map.contains(field) {
                continue;
            }
            let Some((_, keywords)) = self.keywords.iter().find(|(f, _)| *f == field) else {
                continue;
            };
            let column = normalized.iter().enumerate().find(|(index, header)| {
                !header.is_empty()
                    && !map.uses_column(*index)
                    && keywords.iter().any(|keyword| header.contains(keyword))
            });
            if let Some((index, _)) = column {
                map.insert(field, index);
            }
        }

        map
    }

    /// Whether `map` covers the required fields plus an issuer or ISIN.
    #[must_use]
    pub fn is_satisfied(&self, map: &ColumnMap) -> bool {
        self.required.iter().all(|field| map.contains(*field))
            && (map.contains(Field::Issuer) || map.contains(Field::Isin))
    }

    /// Find the first of the top `max_rows` rows whose cells map confidently.
    #[must_use]
    pub fn find_header_row(&self, table: &Table, max_rows: usize) -> Option<(usize, ColumnMap)> {
        (0..table.len().min(max_rows)).find_map(|index| {
            let map = self.map_columns(&table.row_text(index));
            self.is_satisfied(&map).then_some((index, map))
        })
    }
}

/// Field to column index assignment.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnMap {
    columns: HashMap<Field, usize>,
}

impl ColumnMap {
    /// Column of `field`, if mapped.
    #[must_use]
    pub fn get(&self, field: Field) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    /// Whether `field` is mapped.
    #[must_use]
    pub fn contains(&self, field: Field) -> bool {
        self.columns.contains_key(&field)
    }

    /// Assign `field` to `column`.
    pub fn insert(&mut self, field: Field, column: usize) {
        self.columns.insert(field, column);
    }

    fn uses_column(&self, column: usize) -> bool {
        self.columns.values().any(|c| *c == column)
    }

    /// Mapped fields in a stable order, for logging.
    #[must_use]
    pub fn fields(&self) -> Vec<Field> {
        let mut fields: Vec<Field> = self.columns.keys().copied().collect();
        fields.sort();
        fields
    }
}

/// Normalize header text for comparison.
#[must_use]
pub fn normalize_header(header: &str) -> String {
    let cleaned: String = header
        .chars()
        .filter(|c| !matches!(c, '\u{feff}' | '"'))
        .collect();
    let cleaned = cleaned.replace("ï»¿", "");
    let collapsed = collapse_whitespace(&cleaned);
    collapsed
        .trim_end_matches(':')
        .trim_end()
        .to_lowercase()
}
