use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Utc};
use tracing::{debug, warn};

use crate::models::{Cohort, GroupBy, IssueRecord, MalformedRecord, MONTH_NAMES};

/// Cohorts keyed so that lexicographic order is also chronological order.
#[derive(Debug, Clone, Default)]
pub struct CohortSet {
    pub cohorts: BTreeMap<String, Cohort>,
    pub rejected: Vec<MalformedRecord>,
}

impl CohortSet {
    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }

    pub fn total_members(&self) -> usize {
        self.cohorts.values().map(|cohort| cohort.members.len()).sum()
    }
}

pub fn build_cohorts(
    records: &[IssueRecord],
    group_by: GroupBy,
    year: Option<i32>,
    category: Option<&str>,
) -> CohortSet {
    let mut set = CohortSet::default();

    if let Some(year) = year {
        let slots = match group_by {
            GroupBy::Month => 12,
            GroupBy::Quarter => 4,
            GroupBy::Year | GroupBy::Category => 0,
        };
        for slot in 1..=slots {
            let (key, label) = period_key(group_by, year, slot);
            set.cohorts
                .insert(key.clone(), empty_cohort(key, label, group_by));
        }
    }

    for record in records {
        if let Some(wanted) = category.map(str::trim) {
            if record.category.as_deref().map(str::trim) != Some(wanted) {
                continue;
            }
        }

        let needs_timestamp = group_by != GroupBy::Category || year.is_some();
        let occurred_at = match (record.occurred_at, needs_timestamp) {
            (Some(at), _) => Some(at),
            (None, false) => None,
            (None, true) => {
                reject(&mut set, record, "missing occurred_at timestamp");
                continue;
            }
        };

        if let (Some(wanted), Some(at)) = (year, occurred_at) {
            if at.year() != wanted {
                continue;
            }
        }

        let (key, label) = match (group_by, occurred_at) {
            (GroupBy::Category, _) => match record.category.as_deref().map(str::trim) {
                Some(value) if !value.is_empty() => (value.to_string(), value.to_string()),
                _ => {
                    reject(&mut set, record, "missing category");
                    continue;
                }
            },
            (_, Some(at)) => time_key(group_by, at),
            (_, None) => continue,
        };

        set.cohorts
            .entry(key.clone())
            .or_insert_with(|| empty_cohort(key, label, group_by))
            .members
            .push(record.clone());
    }

    if !set.rejected.is_empty() {
        warn!(
            group_by = %group_by,
            rejected = set.rejected.len(),
            "skipped records that cannot be grouped"
        );
    }

    set
}

pub fn available_years(records: &[IssueRecord]) -> Vec<i32> {
    let years: BTreeSet<i32> = records
        .iter()
        .filter_map(|record| record.occurred_at.map(|at| at.year()))
        .collect();
    years.into_iter().rev().collect()
}

pub fn available_categories(records: &[IssueRecord]) -> Vec<String> {
    let categories: BTreeSet<String> = records
        .iter()
        .filter_map(|record| record.category.as_deref().map(str::trim))
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect();
    categories.into_iter().collect()
}

fn time_key(group_by: GroupBy, at: DateTime<Utc>) -> (String, String) {
    match group_by {
        GroupBy::Month => period_key(group_by, at.year(), at.month()),
        GroupBy::Quarter => period_key(group_by, at.year(), (at.month() - 1) / 3 + 1),
        GroupBy::Year | GroupBy::Category => period_key(GroupBy::Year, at.year(), 0),
    }
}

fn period_key(group_by: GroupBy, year: i32, slot: u32) -> (String, String) {
    match group_by {
        GroupBy::Month => (
            format!("{year}-{slot:02}"),
            format!("{} {year}", MONTH_NAMES[(slot - 1) as usize]),
        ),
        GroupBy::Quarter => (format!("{year}-Q{slot}"), format!("Q{slot} {year}")),
        GroupBy::Year | GroupBy::Category => (format!("{year}"), format!("{year}")),
    }
}

fn empty_cohort(key: String, label: String, period_kind: GroupBy) -> Cohort {
    Cohort {
        key,
        label,
        period_kind,
        members: Vec::new(),
    }
}

fn reject(set: &mut CohortSet, record: &IssueRecord, reason: &str) {
    debug!(record_id = %record.id, reason, "rejected issue record");
    set.rejected.push(MalformedRecord {
        record_id: record.id,
        reason: reason.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn issue(code: &str, date: Option<(i32, u32, u32)>, category: Option<&str>) -> IssueRecord {
        IssueRecord {
            id: Uuid::new_v4(),
            taxonomy_code: code.to_string(),
            severity: Severity::Medium,
            prong_affected: None,
            occurred_at: date.map(|(y, m, d)| Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()),
            category: category.map(str::to_string),
            outcome_type: None,
            source_document_id: "doc-1".to_string(),
        }
    }

    #[test]
    fn month_grouping_preallocates_all_twelve_months() {
        let set = build_cohorts(&[], GroupBy::Month, Some(2025), None);
        assert_eq!(set.cohorts.len(), 12);
        assert!(set.cohorts.values().all(|cohort| cohort.members.is_empty()));
        let keys: Vec<&String> = set.cohorts.keys().collect();
        assert_eq!(keys.first().map(|k| k.as_str()), Some("2025-01"));
        assert_eq!(keys.last().map(|k| k.as_str()), Some("2025-12"));
        assert_eq!(set.cohorts["2025-03"].label, "March 2025");
    }

    #[test]
    fn quarter_grouping_places_records_by_calendar_quarter() {
        let records = vec![
            issue("EV-01", Some((2025, 2, 10)), None),
            issue("EV-02", Some((2025, 5, 1)), None),
            issue("EV-02", Some((2025, 6, 30)), None),
            issue("EV-03", Some((2024, 6, 30)), None),
        ];
        let set = build_cohorts(&records, GroupBy::Quarter, Some(2025), None);
        assert_eq!(set.cohorts.len(), 4);
        assert_eq!(set.cohorts["2025-Q1"].members.len(), 1);
        assert_eq!(set.cohorts["2025-Q2"].members.len(), 2);
        assert_eq!(set.cohorts["2025-Q3"].members.len(), 0);
        assert_eq!(set.cohorts["2025-Q2"].label, "Q2 2025");
    }

    #[test]
    fn year_grouping_creates_cohorts_lazily() {
        let records = vec![
            issue("EV-01", Some((2023, 1, 1)), None),
            issue("EV-01", Some((2025, 1, 1)), None),
        ];
        let set = build_cohorts(&records, GroupBy::Year, None, None);
        let keys: Vec<&str> = set.cohorts.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["2023", "2025"]);
    }

    #[test]
    fn missing_grouping_fields_are_rejected_not_dropped_silently() {
        let records = vec![
            issue("EV-01", None, Some("biotech")),
            issue("EV-02", Some((2025, 1, 5)), None),
            issue("EV-03", Some((2025, 1, 5)), Some("biotech")),
        ];

        let by_month = build_cohorts(&records, GroupBy::Month, None, None);
        assert_eq!(by_month.rejected_count(), 1);
        assert_eq!(by_month.total_members(), 2);

        let by_category = build_cohorts(&records, GroupBy::Category, None, None);
        assert_eq!(by_category.rejected_count(), 1);
        assert_eq!(by_category.cohorts["biotech"].members.len(), 2);
    }

    #[test]
    fn category_filter_scopes_records() {
        let records = vec![
            issue("EV-01", Some((2025, 1, 5)), Some("biotech")),
            issue("EV-02", Some((2025, 1, 5)), Some("fintech")),
        ];
        let set = build_cohorts(&records, GroupBy::Month, Some(2025), Some("fintech"));
        assert_eq!(set.total_members(), 1);
        assert_eq!(set.rejected_count(), 0);
    }

    #[test]
    fn category_filter_trims_the_requested_name() {
        let records = vec![
            issue("EV-01", Some((2025, 1, 5)), Some(" biotech")),
            issue("EV-02", Some((2025, 1, 5)), Some("fintech")),
        ];
        let set = build_cohorts(&records, GroupBy::Month, Some(2025), Some("biotech "));
        assert_eq!(set.total_members(), 1);
        assert_eq!(set.cohorts["2025-01"].members[0].taxonomy_code, "EV-01");
    }

    #[test]
    fn lists_available_years_and_categories() {
        let records = vec![
            issue("EV-01", Some((2023, 1, 5)), Some("fintech")),
            issue("EV-02", Some((2025, 1, 5)), Some(" biotech ")),
            issue("EV-03", None, None),
        ];
        assert_eq!(available_years(&records), vec![2025, 2023]);
        assert_eq!(available_categories(&records), vec!["biotech", "fintech"]);
    }
}
