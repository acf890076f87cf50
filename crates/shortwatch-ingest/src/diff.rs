//! Watermark diffing.
//!
//! A rerun reconsiders everything disclosed on or after the watermark minus
//! the lookback, so late corrections and closures near the boundary are
//! picked up again. Exact duplicates are filtered later by the store.

use chrono::{Duration, NaiveDate};
use shortwatch_core::ResolvedRecord;

/// Earliest disclosure date still considered, or `None` to take everything.
#[must_use]
pub fn cutoff(watermark: Option<NaiveDate>, lookback_days: u32) -> Option<NaiveDate> {
    watermark.map(|latest| latest - Duration::days(i64::from(lookback_days)))
}

/// Records selected for persisting, plus how many fell before the cutoff.
#[must_use]
pub fn select_candidates(
    records: Vec<ResolvedRecord>,
    cutoff: Option<NaiveDate>,
) -> (Vec<ResolvedRecord>, usize) {
    let Some(cutoff) = cutoff else {
        return (records, 0);
    };
    let total = records.len();
    let selected: Vec<ResolvedRecord> = records
        .into_iter()
        .filter(|resolved| resolved.record.disclosure_date >= cutoff)
        .collect();
    let excluded = total - selected.len();
    (selected, excluded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shortwatch_core::{EntityName, JurisdictionCode, NormalizedRecord, Provenance};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn resolved(disclosed: NaiveDate) -> ResolvedRecord {
        let name = EntityName {
            display: "Acme".to_string(),
            slug: "acme".to_string(),
        };
        ResolvedRecord {
            record: NormalizedRecord {
                jurisdiction: JurisdictionCode::new("GB").unwrap(),
                manager: name.clone(),
                issuer: name,
                isin: None,
                position_size: Decimal::ONE,
                disclosure_date: disclosed,
                end_date: None,
                provenance: Provenance::current("sheet:current"),
                source_url: None,
            },
            is_active: true,
            was_active_at_row_time: None,
            transition: None,
        }
    }

    #[test]
    fn test_cutoff() {
        assert_eq!(cutoff(None, 30), None);
        assert_eq!(cutoff(Some(date(2024, 3, 31)), 30), Some(date(2024, 3, 1)));
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let records = vec![
            resolved(date(2024, 2, 29)),
            resolved(date(2024, 3, 1)),
            resolved(date(2024, 3, 31)),
        ];

        let (selected, excluded) = select_candidates(records, cutoff(Some(date(2024, 3, 31)), 30));

        assert_eq!(excluded, 1);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].record.disclosure_date, date(2024, 3, 1));
    }

    #[test]
    fn test_no_watermark_selects_everything() {
        let records = vec![resolved(date(2001, 1, 1)), resolved(date(2024, 3, 1))];
        let (selected, excluded) = select_candidates(records, None);
        assert_eq!(selected.len(), 2);
        assert_eq!(excluded, 0);
    }
}
