use crate::config::AnalysisConfig;
use crate::drift::detect_drift;
use crate::models::{
    Cohort, Direction, Distribution, Insight, InsightKind, PairwiseComparison, Prong, Severity,
};

const INCREASE_PCT: f64 = 50.0;
const REDUCTION_PCT: f64 = -30.0;
const NEW_PATTERN_MIN_CODES: usize = 2;
const NEW_PATTERN_EXAMPLES: usize = 2;
const PRONG_SCRUTINY_PCT: f64 = 30.0;
const CRITICAL_COUNT_RISE: usize = 5;

#[derive(Debug, Clone, Default)]
pub struct Timeline {
    pub comparisons: Vec<PairwiseComparison>,
    pub insights: Vec<Insight>,
}

pub fn action(kind: InsightKind) -> &'static str {
    match kind {
        InsightKind::SignificantIncrease => {
            "Check whether filing volume or adjudication standards changed in this period."
        }
        InsightKind::Reduction => "Confirm the drop reflects fewer issues rather than fewer documents ingested.",
        InsightKind::NewPatterns => "Review the new issue types and add guidance for them to petition checklists.",
        InsightKind::ProngScrutiny => "Strengthen evidence addressing this criterion in upcoming petitions.",
        InsightKind::CriticalIncrease => "Prioritize critical deficiencies in pending cases.",
        InsightKind::NoData => "Ingest adjudication documents for this period to keep the trend complete.",
    }
}

/// Period-over-period comparisons for chronologically ordered cohorts.
pub fn compare_timeline(timeline: &[(&Cohort, &Distribution)], config: &AnalysisConfig) -> Timeline {
    let mut result = Timeline::default();

    for pair in timeline.windows(2) {
        let (prev_cohort, prev) = pair[0];
        let (cur_cohort, cur) = pair[1];

        let drift = detect_drift(prev, cur, config);
        let total_change = cur.total as i64 - prev.total as i64;
        let total_change_pct =
            (prev.total > 0).then(|| total_change as f64 / prev.total as f64 * 100.0);

        let comparison = PairwiseComparison {
            from_cohort: prev_cohort.key.clone(),
            to_cohort: cur_cohort.key.clone(),
            previous_total: prev.total,
            current_total: cur.total,
            total_change,
            total_change_pct,
            drift,
        };

        result
            .insights
            .extend(insights_for(&comparison, prev_cohort, cur_cohort, prev, cur));
        result.comparisons.push(comparison);
    }

    result
}

fn insights_for(
    comparison: &PairwiseComparison,
    prev_cohort: &Cohort,
    cur_cohort: &Cohort,
    prev: &Distribution,
    cur: &Distribution,
) -> Vec<Insight> {
    let mut insights = Vec::new();
    let mut push = |kind: InsightKind, title: String, text: String| {
        insights.push(Insight {
            kind,
            title,
            text,
            action: action(kind).to_string(),
            from_cohort: prev_cohort.key.clone(),
            to_cohort: cur_cohort.key.clone(),
        });
    };

    if let Some(change) = comparison.total_change_pct {
        if change >= INCREASE_PCT {
            push(
                InsightKind::SignificantIncrease,
                format!("Significant increase in {}", cur_cohort.label),
                format!(
                    "Issues rose {:.0}% from {} ({}) to {} ({}).",
                    change, prev_cohort.label, prev.total, cur_cohort.label, cur.total
                ),
            );
        }
        if change <= REDUCTION_PCT {
            push(
                InsightKind::Reduction,
                format!("Reduction in {}", cur_cohort.label),
                format!(
                    "Issues fell {:.0}% from {} ({}) to {} ({}).",
                    change.abs(),
                    prev_cohort.label,
                    prev.total,
                    cur_cohort.label,
                    cur.total
                ),
            );
        }
    }

    let new_codes = &comparison.drift.new_codes;
    if new_codes.len() >= NEW_PATTERN_MIN_CODES {
        let examples: Vec<&str> = new_codes
            .iter()
            .take(NEW_PATTERN_EXAMPLES)
            .map(|code| code.code.as_str())
            .collect();
        push(
            InsightKind::NewPatterns,
            format!("New issue patterns in {}", cur_cohort.label),
            format!(
                "{} issue types appeared with no occurrences in {}, e.g. {}.",
                new_codes.len(),
                prev_cohort.label,
                examples.join(", ")
            ),
        );
    }

    for entry in comparison
        .drift
        .prong_drifts
        .iter()
        .filter(|e| e.direction == Direction::Up && e.relative_change_pct > PRONG_SCRUTINY_PCT)
    {
        let name = entry
            .code
            .parse::<Prong>()
            .map(Prong::display_name)
            .unwrap_or(entry.code.as_str());
        push(
            InsightKind::ProngScrutiny,
            format!("Increased scrutiny on {name}"),
            format!(
                "{name} rose {:.0}% ({:.1}% -> {:.1}% of issues) between {} and {}.",
                entry.relative_change_pct,
                entry.baseline_pct,
                entry.recent_pct,
                prev_cohort.label,
                cur_cohort.label
            ),
        );
    }

    let critical = |dist: &Distribution| {
        dist.by_severity
            .get(&Severity::Critical)
            .map_or(0, |share| share.count)
    };
    let (critical_before, critical_now) = (critical(prev), critical(cur));
    if critical_now >= critical_before + CRITICAL_COUNT_RISE {
        push(
            InsightKind::CriticalIncrease,
            "Critical issues increasing".to_string(),
            format!(
                "Critical issues went from {} in {} to {} in {}.",
                critical_before, prev_cohort.label, critical_now, cur_cohort.label
            ),
        );
    }

    if cur.total == 0 && prev.total > 0 {
        push(
            InsightKind::NoData,
            format!("No data for {}", cur_cohort.label),
            format!(
                "No issues were recorded for {} after {} in {}.",
                cur_cohort.label, prev.total, prev_cohort.label
            ),
        );
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::compute_distribution;
    use crate::distribution::tests::{cohort_from_counts, cohort_of};

    fn run(cohorts: &[Cohort]) -> Timeline {
        let dists: Vec<Distribution> = cohorts.iter().map(compute_distribution).collect();
        let timeline: Vec<(&Cohort, &Distribution)> = cohorts.iter().zip(dists.iter()).collect();
        compare_timeline(&timeline, &AnalysisConfig::default())
    }

    fn kinds(timeline: &Timeline) -> Vec<InsightKind> {
        timeline.insights.iter().map(|i| i.kind).collect()
    }

    #[test]
    fn compares_consecutive_cohorts_only() {
        let cohorts = vec![
            cohort_from_counts("2025-01", &[("A", 10)]),
            cohort_from_counts("2025-02", &[("A", 10)]),
            cohort_from_counts("2025-03", &[("A", 10)]),
        ];
        let timeline = run(&cohorts);
        assert_eq!(timeline.comparisons.len(), 2);
        assert_eq!(timeline.comparisons[1].from_cohort, "2025-02");
        assert_eq!(timeline.comparisons[1].to_cohort, "2025-03");
        assert_eq!(timeline.comparisons[0].total_change_pct, Some(0.0));
        assert!(timeline.insights.is_empty());
    }

    #[test]
    fn volume_rise_and_new_codes_fire_independently() {
        let cohorts = vec![
            cohort_from_counts("2025-01", &[("A", 10)]),
            cohort_from_counts("2025-02", &[("A", 10), ("C", 3), ("B", 3), ("D", 1)]),
        ];
        let timeline = run(&cohorts);
        assert_eq!(
            kinds(&timeline),
            vec![InsightKind::SignificantIncrease, InsightKind::NewPatterns]
        );
        let patterns = &timeline.insights[1];
        assert!(patterns.text.contains("B, C"));
        assert!(!patterns.text.contains('D'));
        assert_eq!(patterns.action, action(InsightKind::NewPatterns));
    }

    #[test]
    fn empty_cohort_after_data_reports_reduction_and_no_data() {
        let cohorts = vec![
            cohort_from_counts("2025-01", &[("A", 4)]),
            cohort_from_counts("2025-02", &[]),
        ];
        let timeline = run(&cohorts);
        assert_eq!(kinds(&timeline), vec![InsightKind::Reduction, InsightKind::NoData]);
    }

    #[test]
    fn growth_from_empty_cohort_has_no_percentage() {
        let cohorts = vec![
            cohort_from_counts("2025-01", &[]),
            cohort_from_counts("2025-02", &[("A", 4)]),
        ];
        let timeline = run(&cohorts);
        assert_eq!(timeline.comparisons[0].total_change_pct, None);
        assert!(kinds(&timeline).is_empty());
    }

    #[test]
    fn prong_and_critical_rules() {
        let before = cohort_of(
            "2025-Q1",
            &[
                ("EV-01", Severity::Low, Some(Prong::Evidence)),
                ("EV-01", Severity::Low, Some(Prong::Evidence)),
                ("EV-01", Severity::Low, Some(Prong::Evidence)),
                ("P2-01", Severity::Low, Some(Prong::P2)),
            ],
        );
        let mut rows = vec![("EV-01", Severity::Low, Some(Prong::Evidence)); 3];
        rows.extend(vec![("P2-01", Severity::Critical, Some(Prong::P2)); 5]);
        let after = cohort_of("2025-Q2", &rows);

        let timeline = run(&[before, after]);
        let found = kinds(&timeline);
        assert!(found.contains(&InsightKind::ProngScrutiny));
        assert!(found.contains(&InsightKind::CriticalIncrease));
        assert!(found.contains(&InsightKind::SignificantIncrease));
        let scrutiny = timeline
            .insights
            .iter()
            .find(|i| i.kind == InsightKind::ProngScrutiny)
            .unwrap();
        assert!(scrutiny.title.contains(Prong::P2.display_name()));
    }
}
