//! Record validation.
//!
//! Turns a [`RawExtractedRecord`] into a [`NormalizedRecord`] or a
//! [`RecordRejection`] explaining why the row was dropped.

use crate::normalize::{
    parse_date, parse_percentage, parse_scaled_percentage, slugify, title_case_entity,
    normalize_display_name, validate_isin, FieldError,
};
use crate::records::{EntityName, NormalizedRecord, RawExtractedRecord, RawValue};
use crate::types::{DateOrder, EntityKind};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Why a record was dropped during validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordRejection {
    /// No usable position holder
    #[error("missing manager name")]
    MissingManager,

    /// No usable issuer
    #[error("missing issuer name")]
    MissingIssuer,

    /// Position size absent or unreadable
    #[error("unparseable position size: {0}")]
    UnparseableSize(FieldError),

    /// Position size outside `[0, 100]`
    #[error("position size {value} outside [0, 100]")]
    SizeOutOfRange {
        /// Parsed value
        value: Decimal,
    },

    /// Disclosure date absent or unreadable
    #[error("unparseable disclosure date: {0}")]
    UnparseableDate(FieldError),

    /// Disclosure date after the ingestion date
    #[error("disclosure date {date} is in the future")]
    FutureDate {
        /// Parsed date
        date: NaiveDate,
    },
}

/// How a source's raw values should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Interpretation of ambiguous numeric dates
    pub date_order: DateOrder,
    /// Multiplier for feeds that publish fractions instead of percent
    pub scale: Option<Decimal>,
    /// Title-case names before deriving identities
    pub title_case: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            date_order: DateOrder::DayFirst,
            scale: None,
            title_case: true,
        }
    }
}

/// Validate and normalize one raw record.
///
/// Out-of-range sizes are rejected, never clamped. An unreadable end date is
/// treated as absent since it only narrows activity. A blank issuer with a
/// usable ISIN is named after the ISIN.
pub fn validate_record(
    raw: &RawExtractedRecord,
    options: &ValidationOptions,
    today: NaiveDate,
) -> Result<NormalizedRecord, RecordRejection> {
    let manager = entity_name(&raw.manager_name, EntityKind::Manager, options.title_case)
        .ok_or(RecordRejection::MissingManager)?;
    let isin = validate_isin(&raw.isin);
    // Rows keyed only by ISIN keep the code as the issuer name
    let issuer = entity_name(&raw.company_name, EntityKind::Issuer, options.title_case)
        .or_else(|| {
            isin.as_ref().map(|isin| EntityName {
                display: isin.as_str().to_string(),
                slug: slugify(isin.as_str()),
            })
        })
        .ok_or(RecordRejection::MissingIssuer)?;

    let position_size = match options.scale {
        Some(scale) => parse_scaled_percentage(&raw.position_size, scale),
        None => parse_percentage(&raw.position_size),
    }
    .map_err(RecordRejection::UnparseableSize)?;

    if position_size < Decimal::ZERO || position_size > Decimal::ONE_HUNDRED {
        return Err(RecordRejection::SizeOutOfRange {
            value: position_size,
        });
    }

    let disclosure_date =
        parse_date(&raw.date, options.date_order).map_err(RecordRejection::UnparseableDate)?;
    if disclosure_date > today {
        return Err(RecordRejection::FutureDate {
            date: disclosure_date,
        });
    }

    let end_date = parse_date(&raw.end_date, options.date_order).ok();

    Ok(NormalizedRecord {
        jurisdiction: raw.jurisdiction.clone(),
        manager,
        issuer,
        isin,
        position_size,
        disclosure_date,
        end_date,
        provenance: raw.provenance.clone(),
        source_url: raw.source_url.clone(),
    })
}

fn entity_name(raw: &RawValue, kind: EntityKind, title_case: bool) -> Option<EntityName> {
    let name = normalize_display_name(raw).ok()?;
    if !title_case {
        return Some(name);
    }
    let display = title_case_entity(&name.display, kind);
    let slug = slugify(&display);
    Some(EntityName { display, slug })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{JurisdictionCode, Provenance};
    use rust_decimal_macros::dec;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).expect("valid date")
    }

    fn raw(manager: &str, issuer: &str, size: RawValue, date: &str) -> RawExtractedRecord {
        let mut record = RawExtractedRecord::new(
            JurisdictionCode::new("GB").expect("valid code"),
            Provenance::current("current sheet"),
        );
        record.manager_name = RawValue::from(manager);
        record.company_name = RawValue::from(issuer);
        record.isin = RawValue::from("gb0002634946");
        record.position_size = size;
        record.date = RawValue::from(date);
        record
    }

    #[test]
    fn test_valid_record() {
        let record = raw("MARSHALL WACE LLP", "BAE SYSTEMS PLC", "0,62".into(), "10/01/2025");
        let normalized =
            validate_record(&record, &ValidationOptions::default(), today()).expect("valid");

        assert_eq!(normalized.manager.display, "Marshall Wace LLP");
        assert_eq!(normalized.manager.slug, "marshall-wace-llp");
        assert_eq!(normalized.issuer.display, "Bae Systems PLC");
        assert_eq!(normalized.position_size, dec!(0.62));
        assert_eq!(
            normalized.disclosure_date,
            NaiveDate::from_ymd_opt(2025, 1, 10).expect("valid date")
        );
        assert_eq!(normalized.isin.map(|i| i.to_string()).as_deref(), Some("GB0002634946"));
    }

    #[test]
    fn test_title_case_disabled_keeps_display() {
        let record = raw("MARSHALL WACE LLP", "BAE SYSTEMS PLC", "0.62".into(), "2025-01-10");
        let options = ValidationOptions {
            title_case: false,
            ..ValidationOptions::default()
        };
        let normalized = validate_record(&record, &options, today()).expect("valid");
        assert_eq!(normalized.manager.display, "MARSHALL WACE LLP");
        assert_eq!(normalized.manager.slug, "marshall-wace-llp");
    }

    #[test]
    fn test_missing_identities_rejected() {
        let record = raw("", "BAE SYSTEMS PLC", "0.62".into(), "2025-01-10");
        assert_eq!(
            validate_record(&record, &ValidationOptions::default(), today()),
            Err(RecordRejection::MissingManager)
        );

        let mut record = raw("Marshall Wace", "n/a", "0.62".into(), "2025-01-10");
        record.isin = RawValue::Empty;
        assert_eq!(
            validate_record(&record, &ValidationOptions::default(), today()),
            Err(RecordRejection::MissingIssuer)
        );
    }

    #[test]
    fn test_blank_issuer_named_after_isin() {
        let record = raw("Marshall Wace", "", "0.62".into(), "2025-01-10");
        let normalized =
            validate_record(&record, &ValidationOptions::default(), today()).expect("valid");

        assert_eq!(normalized.issuer.display, "GB0002634946");
        assert_eq!(normalized.issuer.slug, "gb0002634946");
        assert_eq!(normalized.isin.map(|i| i.to_string()).as_deref(), Some("GB0002634946"));
    }

    #[test]
    fn test_size_out_of_range_not_clamped() {
        let record = raw("Marshall Wace", "BAE", "150".into(), "2025-01-10");
        assert_eq!(
            validate_record(&record, &ValidationOptions::default(), today()),
            Err(RecordRejection::SizeOutOfRange { value: dec!(150) })
        );

        let record = raw("Marshall Wace", "BAE", "-0.1".into(), "2025-01-10");
        assert!(matches!(
            validate_record(&record, &ValidationOptions::default(), today()),
            Err(RecordRejection::SizeOutOfRange { .. })
        ));
    }

    #[test]
    fn test_zero_size_accepted() {
        let record = raw("Marshall Wace", "BAE", "0,00%".into(), "2025-01-10");
        let normalized =
            validate_record(&record, &ValidationOptions::default(), today()).expect("valid");
        assert!(normalized.position_size.is_zero());
    }

    #[test]
    fn test_bounded_size_rejected() {
        let record = raw("Marshall Wace", "BAE", "< 0,5%".into(), "2025-01-10");
        assert!(matches!(
            validate_record(&record, &ValidationOptions::default(), today()),
            Err(RecordRejection::UnparseableSize(_))
        ));
    }

    #[test]
    fn test_future_and_bad_dates() {
        let record = raw("Marshall Wace", "BAE", "0.7".into(), "2025-02-01");
        assert!(matches!(
            validate_record(&record, &ValidationOptions::default(), today()),
            Err(RecordRejection::FutureDate { .. })
        ));

        let record = raw("Marshall Wace", "BAE", "0.7".into(), "not a date");
        assert!(matches!(
            validate_record(&record, &ValidationOptions::default(), today()),
            Err(RecordRejection::UnparseableDate(_))
        ));
    }

    #[test]
    fn test_scaled_fraction() {
        let record = raw("Marshall Wace", "Ryanair", RawValue::Number(0.0061), "2025-01-10");
        let options = ValidationOptions {
            scale: Some(dec!(100)),
            ..ValidationOptions::default()
        };
        let normalized = validate_record(&record, &options, today()).expect("valid");
        assert_eq!(normalized.position_size, dec!(0.61));
    }

    #[test]
    fn test_unreadable_end_date_is_absent() {
        let mut record = raw("Marshall Wace", "BAE", "0.7".into(), "2025-01-10");
        record.end_date = RawValue::from("garbage");
        let normalized =
            validate_record(&record, &ValidationOptions::default(), today()).expect("valid");
        assert_eq!(normalized.end_date, None);
    }
}
