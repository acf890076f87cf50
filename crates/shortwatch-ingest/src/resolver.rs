//! Active-state resolution.
//!
//! Decides, for every normalized record of one jurisdiction in one run,
//! whether the disclosure is currently in force.
//!
//! - [`ActivityRule::Provenance`]: the resource says whether a record is
//!   current. Only the newest current record per key stays active.
//! - [`ActivityRule::Composite`]: records are ranked newest first per key.
//!   The rank-1 record is active when it is at or above the threshold, has
//!   no publication end date and falls inside the recency window. It also
//!   carries the [`Transition`] against the rank-2 record.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use shortwatch_core::{ActivityRule, CompositeRule, NormalizedRecord, ResolvedRecord, Transition};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Resolve activity for one jurisdiction's records. Output order matches
/// input order.
#[must_use]
pub fn resolve(
    records: Vec<NormalizedRecord>,
    rule: &ActivityRule,
    today: NaiveDate,
) -> Vec<ResolvedRecord> {
    match rule {
        ActivityRule::Provenance => resolve_by_provenance(records),
        ActivityRule::Composite(composite) => resolve_composite(records, composite, today),
    }
}

/// Newest first; on equal dates a record without an end date wins, then
/// the larger size.
fn rank_order(a: &NormalizedRecord, b: &NormalizedRecord) -> Ordering {
    b.disclosure_date
        .cmp(&a.disclosure_date)
        .then_with(|| a.end_date.is_some().cmp(&b.end_date.is_some()))
        .then_with(|| b.position_size.cmp(&a.position_size))
}

fn group_by_key(records: &[NormalizedRecord]) -> HashMap<(String, String), Vec<usize>> {
    let mut groups: HashMap<(String, String), Vec<usize>> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        groups.entry(record.identity_key()).or_default().push(index);
    }
    groups
}

fn resolve_by_provenance(records: Vec<NormalizedRecord>) -> Vec<ResolvedRecord> {
    let mut active: Vec<bool> = records
        .iter()
        .map(|record| record.provenance.reported_active().unwrap_or(false))
        .collect();

    let mut demoted = 0usize;
    for indices in group_by_key(&records).into_values() {
        let mut current: Vec<usize> = indices.into_iter().filter(|&i| active[i]).collect();
        if current.len() < 2 {
            continue;
        }
        current.sort_by(|&a, &b| rank_order(&records[a], &records[b]));
        for &index in &current[1..] {
            active[index] = false;
            demoted += 1;
        }
    }
    if demoted > 0 {
        tracing::debug!(count = demoted, "Demoted older current records sharing a key");
    }

    records
        .into_iter()
        .zip(active)
        .map(|(record, is_active)| ResolvedRecord {
            record,
            is_active,
            was_active_at_row_time: None,
            transition: None,
        })
        .collect()
}

fn resolve_composite(
    records: Vec<NormalizedRecord>,
    rule: &CompositeRule,
    today: NaiveDate,
) -> Vec<ResolvedRecord> {
    let mut verdicts: Vec<(bool, Option<Transition>)> = vec![(false, None); records.len()];

    for mut indices in group_by_key(&records).into_values() {
        indices.sort_by(|&a, &b| rank_order(&records[a], &records[b]));
        let newest = &records[indices[0]];
        let previous = indices.get(1).map(|&i| records[i].position_size);

        let age_days = (today - newest.disclosure_date).num_days();
        let eligible = newest.position_size >= rule.threshold
            && newest.end_date.is_none()
            && age_days <= i64::from(rule.recency_days);

        verdicts[indices[0]] = (
            eligible,
            Some(classify_transition(newest.position_size, previous, rule.threshold)),
        );
    }

    records
        .into_iter()
        .zip(verdicts)
        .map(|(record, (is_active, transition))| {
            let was_active = record.position_size >= rule.threshold;
            ResolvedRecord {
                record,
                is_active,
                was_active_at_row_time: Some(was_active),
                transition,
            }
        })
        .collect()
}

/// Classify the newest disclosure of a key against the one before it.
#[must_use]
pub fn classify_transition(current: Decimal, previous: Option<Decimal>, threshold: Decimal) -> Transition {
    let now_above = current >= threshold;
    match previous {
        None if now_above => Transition::Entered,
        None => Transition::InactiveFirst,
        Some(prev) => match (prev >= threshold, now_above) {
            (false, true) => Transition::Entered,
            (true, false) => Transition::Exited,
            (true, true) if current != prev => Transition::ActiveSizeChange,
            (true, true) => Transition::ActiveUnchanged,
            (false, false) => Transition::InactiveUnchanged,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use shortwatch_core::normalize::validate_isin;
    use shortwatch_core::{EntityName, JurisdictionCode, Provenance, RawValue};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    fn days_ago(days: i64) -> NaiveDate {
        today() - chrono::Duration::days(days)
    }

    fn name(display: &str) -> EntityName {
        EntityName {
            display: display.to_string(),
            slug: display.to_lowercase().replace(' ', "-"),
        }
    }

    fn record(manager: &str, size: Decimal, date: NaiveDate, provenance: Provenance) -> NormalizedRecord {
        NormalizedRecord {
            jurisdiction: JurisdictionCode::new("FR").unwrap(),
            manager: name(manager),
            issuer: name("Foo SA"),
            isin: validate_isin(&RawValue::from("FR0000120271")),
            position_size: size,
            disclosure_date: date,
            end_date: None,
            provenance,
            source_url: None,
        }
    }

    fn composite() -> ActivityRule {
        ActivityRule::Composite(CompositeRule::default())
    }

    #[test]
    fn test_provenance_rule_follows_resource() {
        let records = vec![
            record("Acme", dec!(0.7), days_ago(3), Provenance::current("file:current")),
            record("Bar", dec!(0.6), days_ago(30), Provenance::historical("file:historical")),
            record("Baz", dec!(0.6), days_ago(30), Provenance::mixed("file:mixed")),
        ];

        let resolved = resolve(records, &ActivityRule::Provenance, today());

        assert!(resolved[0].is_active);
        assert!(!resolved[1].is_active);
        assert!(!resolved[2].is_active);
        assert!(resolved.iter().all(|r| r.transition.is_none()));
    }

    #[test]
    fn test_provenance_rule_keeps_one_active_per_key() {
        let records = vec![
            record("Acme", dec!(0.7), days_ago(20), Provenance::current("file:current")),
            record("Acme", dec!(0.9), days_ago(3), Provenance::current("file:current")),
        ];

        let resolved = resolve(records, &ActivityRule::Provenance, today());

        assert!(!resolved[0].is_active);
        assert!(resolved[1].is_active);
    }

    #[test]
    fn test_composite_entered_transition() {
        let records = vec![
            record("Acme", dec!(0.2), days_ago(60), Provenance::mixed("file:mixed")),
            record("Acme", dec!(1.0), days_ago(5), Provenance::mixed("file:mixed")),
        ];

        let resolved = resolve(records, &composite(), today());

        assert!(!resolved[0].is_active);
        assert_eq!(resolved[0].was_active_at_row_time, Some(false));
        assert_eq!(resolved[0].transition, None);
        assert!(resolved[1].is_active);
        assert_eq!(resolved[1].transition, Some(Transition::Entered));
    }

    #[test]
    fn test_composite_threshold_exact_is_active() {
        let records = vec![record("Acme", dec!(0.5), days_ago(1), Provenance::mixed("file:mixed"))];
        let resolved = resolve(records, &composite(), today());
        assert!(resolved[0].is_active);
        assert_eq!(resolved[0].transition, Some(Transition::Entered));
    }

    #[test]
    fn test_composite_end_date_and_recency_disqualify() {
        let mut ended = record("Acme", dec!(0.8), days_ago(10), Provenance::mixed("file:mixed"));
        ended.end_date = Some(days_ago(2));
        let stale = record("Bar", dec!(0.8), days_ago(731), Provenance::mixed("file:mixed"));
        let edge = record("Baz", dec!(0.8), days_ago(730), Provenance::mixed("file:mixed"));

        let resolved = resolve(vec![ended, stale, edge], &composite(), today());

        assert!(!resolved[0].is_active);
        assert!(!resolved[1].is_active);
        assert!(resolved[2].is_active);
    }

    #[test]
    fn test_composite_tie_break() {
        let mut with_end = record("Acme", dec!(0.9), days_ago(10), Provenance::mixed("file:mixed"));
        with_end.end_date = Some(days_ago(1));
        let open_small = record("Acme", dec!(0.6), days_ago(10), Provenance::mixed("file:mixed"));
        let open_large = record("Acme", dec!(0.7), days_ago(10), Provenance::mixed("file:mixed"));

        let resolved = resolve(vec![with_end, open_small, open_large], &composite(), today());

        assert!(!resolved[0].is_active);
        assert!(!resolved[1].is_active);
        assert!(resolved[2].is_active);
        assert_eq!(resolved[2].transition, Some(Transition::ActiveSizeChange));
    }

    #[test]
    fn test_composite_at_most_one_active_per_key() {
        let records: Vec<_> = (0..6)
            .map(|i| record("Acme", dec!(0.9), days_ago(i * 7), Provenance::mixed("file:mixed")))
            .chain((0..3).map(|i| record("Bar", dec!(0.6), days_ago(i), Provenance::mixed("file:mixed"))))
            .collect();

        let resolved = resolve(records, &composite(), today());

        let mut active_per_key: HashMap<(String, String), usize> = HashMap::new();
        for r in resolved.iter().filter(|r| r.is_active) {
            *active_per_key.entry(r.record.identity_key()).or_default() += 1;
        }
        assert_eq!(active_per_key.len(), 2);
        assert!(active_per_key.values().all(|&count| count == 1));
    }

    #[test]
    fn test_classify_transition() {
        let t = dec!(0.5);
        assert_eq!(classify_transition(dec!(0.3), None, t), Transition::InactiveFirst);
        assert_eq!(classify_transition(dec!(0.4), Some(dec!(0.7)), t), Transition::Exited);
        assert_eq!(classify_transition(dec!(0.7), Some(dec!(0.7)), t), Transition::ActiveUnchanged);
        assert_eq!(classify_transition(dec!(0.2), Some(dec!(0.3)), t), Transition::InactiveUnchanged);
        assert_eq!(classify_transition(dec!(0.0), Some(dec!(0.5)), t), Transition::Exited);
    }
}
