//! Field normalizer.
//!
//! Pure, source-agnostic functions turning raw cell values into typed
//! values. None of them panic or substitute defaults: anything that cannot
//! be read is reported as a [`FieldError`].

use crate::records::{EntityName, RawValue};
use crate::types::{DateOrder, EntityKind, Isin};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::str::FromStr;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Why a raw value could not be normalized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    /// The value is absent or a placeholder such as `n/a`
    #[error("missing {field}")]
    Missing {
        /// Field being parsed
        field: &'static str,
    },

    /// The value is present but cannot be interpreted
    #[error("unparseable {field}: '{raw}'")]
    Unparseable {
        /// Field being parsed
        field: &'static str,
        /// Offending input
        raw: String,
    },
}

/// Decimal places kept for percentages.
const PERCENT_SCALE: u32 = 6;

/// Legal forms restored after title casing manager names.
const MANAGER_LEGAL_FORMS: &[&str] = &[
    "LLC", "LLP", "LP", "PLC", "AS", "ASA", "GmbH", "SA", "SAS", "BV", "NV", "AB", "OY",
];

/// Legal forms restored after title casing issuer names.
const ISSUER_LEGAL_FORMS: &[&str] = &[
    "AB", "ASA", "AS", "PLC", "LLC", "SpA", "SRL", "NV", "BV", "GmbH", "AG", "SE", "OY", "OYJ",
    "A/S", "publ",
];

/// Tokens regulators use for "no value".
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return true;
    }
    matches!(
        trimmed.to_lowercase().as_str(),
        "-" | "—" | "–" | "n/a" | "#n/a" | "na" | "nan" | "none" | "null"
    )
}

/// Collapse whitespace runs (including non-breaking spaces) to single spaces
/// and apply NFC composition. Diacritics and non-Latin scripts are kept.
#[must_use]
pub fn collapse_whitespace(value: &str) -> String {
    let composed: String = value.nfc().collect();
    composed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a manager or issuer name and derive its identity slug.
pub fn normalize_display_name(raw: &RawValue) -> Result<EntityName, FieldError> {
    const FIELD: &str = "name";

    let text = match raw {
        RawValue::Empty => return Err(FieldError::Missing { field: FIELD }),
        RawValue::Date(d) => {
            return Err(FieldError::Unparseable {
                field: FIELD,
                raw: d.to_string(),
            })
        }
        other => other.as_text().ok_or(FieldError::Missing { field: FIELD })?,
    };

    if is_placeholder(&text) {
        return Err(FieldError::Missing { field: FIELD });
    }

    let display = collapse_whitespace(&text);
    let slug = slugify(&display);
    Ok(EntityName { display, slug })
}

/// Derive an identity slug.
///
/// Lowercases, turns every run of non-alphanumeric characters into a single
/// hyphen and trims hyphens at both ends. Letters outside ASCII are kept.
/// Names without any alphanumeric character get a stable hash placeholder.
#[must_use]
pub fn slugify(name: &str) -> String {
    let composed: String = name.nfc().collect();
    let mut slug = String::with_capacity(composed.len());
    let mut pending_hyphen = false;

    for ch in composed.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch);
        } else {
            pending_hyphen = true;
        }
    }

    if slug.is_empty() {
        let digest = Sha256::digest(name.as_bytes());
        return format!("entity-{}", &hex::encode(digest)[..12]);
    }

    slug
}

/// Title-case a name and restore legal-form abbreviations.
///
/// A character is uppercased when it starts the string or follows
/// whitespace; everything else is lowercased.
#[must_use]
pub fn title_case_entity(name: &str, kind: EntityKind) -> String {
    let forms = match kind {
        EntityKind::Manager => MANAGER_LEGAL_FORMS,
        EntityKind::Issuer => ISSUER_LEGAL_FORMS,
    };

    collapse_whitespace(name)
        .split(' ')
        .map(|word| restore_legal_form(&title_case_word(word), forms))
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn restore_legal_form(word: &str, forms: &[&str]) -> String {
    // Keep surrounding punctuation such as "(Publ)" or "Plc,"
    let start = word
        .char_indices()
        .find(|(_, c)| c.is_alphanumeric())
        .map_or(word.len(), |(i, _)| i);
    let end = word
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_alphanumeric())
        .map_or(start, |(i, c)| i + c.len_utf8());

    if start >= end {
        return word.to_string();
    }

    let core = &word[start..end];
    match forms.iter().find(|form| form.eq_ignore_ascii_case(core)) {
        Some(form) => format!("{}{}{}", &word[..start], form, &word[end..]),
        None => word.to_string(),
    }
}

/// Parse a net short position percentage.
///
/// Accepts numeric cells and text with an optional `%`, surrounding
/// whitespace and either `,` or `.` as decimal separator. Bounded tokens
/// such as `<0.5` are unparseable, never zero.
pub fn parse_percentage(raw: &RawValue) -> Result<Decimal, FieldError> {
    const FIELD: &str = "position size";

    match raw {
        RawValue::Empty => Err(FieldError::Missing { field: FIELD }),
        RawValue::Number(n) => decimal_from_f64(*n).ok_or_else(|| FieldError::Unparseable {
            field: FIELD,
            raw: n.to_string(),
        }),
        RawValue::Date(d) => Err(FieldError::Unparseable {
            field: FIELD,
            raw: d.to_string(),
        }),
        RawValue::Text(s) => parse_percentage_text(s),
    }
}

/// Parse a percentage published as a fraction or other multiple.
pub fn parse_scaled_percentage(raw: &RawValue, scale: Decimal) -> Result<Decimal, FieldError> {
    let value = parse_percentage(raw)?;
    Ok((value * scale).round_dp(PERCENT_SCALE).normalize())
}

fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value).map(|d| d.round_dp(PERCENT_SCALE).normalize())
}

fn parse_percentage_text(raw: &str) -> Result<Decimal, FieldError> {
    const FIELD: &str = "position size";

    if is_placeholder(raw) {
        return Err(FieldError::Missing { field: FIELD });
    }

    let unparseable = || FieldError::Unparseable {
        field: FIELD,
        raw: raw.to_string(),
    };

    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '%')
        .collect();

    if compact.is_empty() {
        return Err(FieldError::Missing { field: FIELD });
    }
    if compact.contains(['<', '>', '≤', '≥']) {
        return Err(unparseable());
    }

    let commas = compact.matches(',').count();
    let dots = compact.matches('.').count();
    let canonical = match (commas, dots) {
        (0, _) => compact,
        (1, 0) => compact.replace(',', "."),
        (_, 0) => return Err(unparseable()),
        _ => {
            // Both present: the last separator is the decimal mark
            let last_comma = compact.rfind(',').unwrap_or(0);
            let last_dot = compact.rfind('.').unwrap_or(0);
            if last_comma > last_dot {
                compact.replace('.', "").replace(',', ".")
            } else {
                compact.replace(',', "")
            }
        }
    };

    Decimal::from_str(&canonical)
        .or_else(|_| Decimal::from_scientific(&canonical))
        .map(|d| d.round_dp(PERCENT_SCALE).normalize())
        .map_err(|_| unparseable())
}

/// Excel's day zero in the 1900 date system (accounts for the 1900 leap bug).
fn excel_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

/// Parse a disclosure date.
///
/// ISO forms are always accepted; ambiguous numeric forms follow `order`.
/// Spreadsheet serial numbers and native date cells are supported. A time
/// suffix is ignored. Failures are reported, never replaced by today.
pub fn parse_date(raw: &RawValue, order: DateOrder) -> Result<NaiveDate, FieldError> {
    const FIELD: &str = "date";

    match raw {
        RawValue::Empty => Err(FieldError::Missing { field: FIELD }),
        RawValue::Date(d) => Ok(*d),
        RawValue::Number(n) => excel_serial_to_date(*n).ok_or_else(|| FieldError::Unparseable {
            field: FIELD,
            raw: n.to_string(),
        }),
        RawValue::Text(s) => parse_date_text(s, order),
    }
}

/// Convert an Excel serial day number (1900 date system) to a date.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    excel_epoch()?.checked_add_signed(Duration::days(serial.floor() as i64))
}

const ISO_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];
const DAY_FIRST_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];
const MONTH_FIRST_FORMATS: &[&str] = &["%m/%d/%Y", "%m-%d-%Y", "%m.%d.%Y"];
const DAY_FIRST_SHORT_FORMATS: &[&str] = &["%d/%m/%y", "%d-%m-%y", "%d.%m.%y"];
const MONTH_FIRST_SHORT_FORMATS: &[&str] = &["%m/%d/%y", "%m-%d-%y", "%m.%d.%y"];
const TEXTUAL_FORMATS: &[&str] = &["%d %B %Y", "%d %b %Y", "%B %d, %Y", "%b %d, %Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

fn parse_date_text(raw: &str, order: DateOrder) -> Result<NaiveDate, FieldError> {
    const FIELD: &str = "date";

    if is_placeholder(raw) {
        return Err(FieldError::Missing { field: FIELD });
    }

    let text = collapse_whitespace(raw);

    // Full timestamps (ISO with time, optionally with a zone suffix)
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&text, format) {
            return Ok(dt.date());
        }
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&text) {
        return Ok(dt.date_naive());
    }

    // Drop a trailing time component ("31/12/2024 00:00:00")
    let date_part = match text.split_once(' ') {
        Some((head, tail)) if tail.contains(':') => head,
        _ => text.as_str(),
    };

    let (long_formats, short_formats) = match order {
        DateOrder::DayFirst => (DAY_FIRST_FORMATS, DAY_FIRST_SHORT_FORMATS),
        DateOrder::MonthFirst => (MONTH_FIRST_FORMATS, MONTH_FIRST_SHORT_FORMATS),
    };

    let four_digit = ISO_FORMATS
        .iter()
        .chain(long_formats)
        .filter_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
        .find(|date| chrono::Datelike::year(date) >= 1900);
    if let Some(date) = four_digit {
        return Ok(date);
    }

    if let Some(date) = short_formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
    {
        return Ok(date);
    }

    if let Some(date) = TEXTUAL_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&text, format).ok())
    {
        return Ok(date);
    }

    // Compact ISO ("20240131")
    if date_part.len() == 8 && date_part.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(date) = NaiveDate::parse_from_str(date_part, "%Y%m%d") {
            return Ok(date);
        }
    }

    Err(FieldError::Unparseable {
        field: FIELD,
        raw: raw.to_string(),
    })
}

/// Normalize an ISIN: trim, drop inner whitespace, uppercase.
///
/// Empty and placeholder values yield `None`. No checksum is enforced.
#[must_use]
pub fn validate_isin(raw: &RawValue) -> Option<Isin> {
    let RawValue::Text(text) = raw else {
        return None;
    };

    if is_placeholder(text) {
        return None;
    }

    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();

    if compact.is_empty() {
        None
    } else {
        Some(Isin::from_normalized(compact))
    }
}
