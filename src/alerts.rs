use crate::models::{Alert, AlertKind, AlertSeverity, Direction, DriftReport, Prong, Severity};

const MAX_CODE_ALERTS: usize = 5;
const HIGH_CODE_CHANGE_PCT: f64 = 50.0;
const HIGH_PRONG_CHANGE_PCT: f64 = 30.0;
const CRITICAL_SHARE_RISE_PTS: f64 = 5.0;
const NEW_PATTERN_MIN_CODES: usize = 3;

pub fn recommendation(kind: AlertKind) -> &'static str {
    match kind {
        AlertKind::CodeIncrease => {
            "Review recent petitions for this issue and strengthen the supporting exhibits before filing."
        }
        AlertKind::ProngScrutiny => {
            "Reinforce arguments and evidence for this criterion in pending and upcoming petitions."
        }
        AlertKind::CriticalSeverity => {
            "Escalate pending cases for senior review and address critical deficiencies first."
        }
        AlertKind::NewPatterns => {
            "Examine the new issue types and update petition templates and checklists accordingly."
        }
    }
}

/// Ranked alerts for a drift report: rising codes, rising prongs, critical share, new codes.
/// High-severity alerts come first; order within a severity follows rule order.
pub fn generate_alerts(report: &DriftReport, threshold_pct: f64) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for entry in report
        .code_drifts
        .iter()
        .filter(|e| {
            e.direction == Direction::Up && e.significant && e.relative_change_pct >= threshold_pct
        })
        .take(MAX_CODE_ALERTS)
    {
        let severity = if entry.relative_change_pct >= HIGH_CODE_CHANGE_PCT {
            AlertSeverity::High
        } else {
            AlertSeverity::Medium
        };
        alerts.push(alert(
            AlertKind::CodeIncrease,
            severity,
            format!(
                "Issue {} rose {:.0}% ({:.1}% -> {:.1}% of issues, {} occurrences)",
                entry.code,
                entry.relative_change_pct,
                entry.baseline_pct,
                entry.recent_pct,
                entry.recent_count
            ),
        ));
    }

    for entry in report
        .prong_drifts
        .iter()
        .filter(|e| e.significant && e.direction == Direction::Up)
    {
        let severity = if entry.relative_change_pct >= HIGH_PRONG_CHANGE_PCT {
            AlertSeverity::High
        } else {
            AlertSeverity::Medium
        };
        let name = entry
            .code
            .parse::<Prong>()
            .map(Prong::display_name)
            .unwrap_or(entry.code.as_str());
        alerts.push(alert(
            AlertKind::ProngScrutiny,
            severity,
            format!(
                "Increased scrutiny on {} (+{:.0}%, {:.1}% -> {:.1}% of issues)",
                name, entry.relative_change_pct, entry.baseline_pct, entry.recent_pct
            ),
        ));
    }

    if let Some(critical) = report.severity(Severity::Critical) {
        if critical.direction == Direction::Up && critical.absolute_change >= CRITICAL_SHARE_RISE_PTS {
            alerts.push(alert(
                AlertKind::CriticalSeverity,
                AlertSeverity::High,
                format!(
                    "Critical issues grew by {:.1} points ({:.1}% -> {:.1}% of issues)",
                    critical.absolute_change, critical.baseline_pct, critical.recent_pct
                ),
            ));
        }
    }

    if report.new_codes.len() >= NEW_PATTERN_MIN_CODES {
        alerts.push(alert(
            AlertKind::NewPatterns,
            AlertSeverity::Medium,
            format!(
                "{} issue types appeared that were absent from the baseline period",
                report.new_codes.len()
            ),
        ));
    }

    alerts.sort_by_key(|a| a.severity);
    alerts
}

fn alert(kind: AlertKind, severity: AlertSeverity, message: String) -> Alert {
    Alert {
        kind,
        severity,
        message,
        recommendation: recommendation(kind).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::distribution::compute_distribution;
    use crate::distribution::tests::{cohort_from_counts, cohort_of};
    use crate::drift::detect_drift;

    #[test]
    fn ranks_high_alerts_before_medium() {
        // B: +25% relative (medium), C/D/E new (+100%, high) and 3 new codes (medium summary)
        let baseline = compute_distribution(&cohort_from_counts("b", &[("A", 60), ("B", 40)]));
        let recent = compute_distribution(&cohort_from_counts(
            "r",
            &[("A", 30), ("B", 50), ("C", 10), ("D", 6), ("E", 4)],
        ));
        let report = detect_drift(&baseline, &recent, &AnalysisConfig::default());
        let alerts = &report.alerts;

        let kinds: Vec<(AlertKind, AlertSeverity)> =
            alerts.iter().map(|a| (a.kind, a.severity)).collect();
        assert_eq!(
            kinds,
            vec![
                (AlertKind::CodeIncrease, AlertSeverity::High),
                (AlertKind::CodeIncrease, AlertSeverity::High),
                (AlertKind::CodeIncrease, AlertSeverity::High),
                (AlertKind::CodeIncrease, AlertSeverity::Medium),
                (AlertKind::NewPatterns, AlertSeverity::Medium),
            ]
        );
        assert!(alerts[0].message.contains('C'));
        assert_eq!(alerts[4].recommendation, recommendation(AlertKind::NewPatterns));
    }

    #[test]
    fn caps_code_alerts_at_five() {
        let baseline = compute_distribution(&cohort_from_counts("b", &[("A", 100)]));
        let recent = compute_distribution(&cohort_from_counts(
            "r",
            &[("A", 10), ("B", 1), ("C", 1), ("D", 1), ("E", 1), ("F", 1), ("G", 1), ("H", 1)],
        ));
        let report = detect_drift(&baseline, &recent, &AnalysisConfig::default());
        let code_alerts = report
            .alerts
            .iter()
            .filter(|a| a.kind == AlertKind::CodeIncrease)
            .count();
        assert_eq!(code_alerts, 5);
    }

    #[test]
    fn critical_share_and_prong_rise_raise_high_alerts() {
        let baseline = compute_distribution(&cohort_of(
            "b",
            &[
                ("EV-01", Severity::Low, Some(Prong::Evidence)),
                ("EV-01", Severity::Low, Some(Prong::Evidence)),
                ("P1-01", Severity::Low, Some(Prong::P1)),
                ("P1-01", Severity::Low, Some(Prong::P1)),
            ],
        ));
        let recent = compute_distribution(&cohort_of(
            "r",
            &[
                ("EV-01", Severity::Low, Some(Prong::Evidence)),
                ("P1-01", Severity::Critical, Some(Prong::P1)),
                ("P1-01", Severity::Critical, Some(Prong::P1)),
                ("P1-01", Severity::Low, Some(Prong::P1)),
            ],
        ));
        let report = detect_drift(&baseline, &recent, &AnalysisConfig::default());

        let prong = report
            .alerts
            .iter()
            .find(|a| a.kind == AlertKind::ProngScrutiny)
            .unwrap();
        assert_eq!(prong.severity, AlertSeverity::High);
        assert!(prong.message.contains(Prong::P1.display_name()));

        let critical = report
            .alerts
            .iter()
            .find(|a| a.kind == AlertKind::CriticalSeverity)
            .unwrap();
        assert_eq!(critical.severity, AlertSeverity::High);
        assert!(report.alerts.iter().all(|a| a.kind != AlertKind::NewPatterns));
    }

    fn repeated(
        rows: &[(&'static str, Severity, Option<Prong>, usize)],
    ) -> Vec<(&'static str, Severity, Option<Prong>)> {
        rows.iter()
            .flat_map(|&(code, severity, prong, n)| std::iter::repeat((code, severity, prong)).take(n))
            .collect()
    }

    #[test]
    fn moderate_prong_rise_is_a_medium_alert() {
        // P1 share 40% -> 50%: +10 points, +25% relative
        let baseline = compute_distribution(&cohort_of(
            "b",
            &repeated(&[
                ("P1-01", Severity::Low, Some(Prong::P1), 40),
                ("EV-01", Severity::Low, Some(Prong::Evidence), 60),
            ]),
        ));
        let recent = compute_distribution(&cohort_of(
            "r",
            &repeated(&[
                ("P1-01", Severity::Low, Some(Prong::P1), 50),
                ("EV-01", Severity::Low, Some(Prong::Evidence), 50),
            ]),
        ));
        let report = detect_drift(&baseline, &recent, &AnalysisConfig::default());

        let prong_alerts: Vec<&Alert> = report
            .alerts
            .iter()
            .filter(|a| a.kind == AlertKind::ProngScrutiny)
            .collect();
        assert_eq!(prong_alerts.len(), 1);
        assert_eq!(prong_alerts[0].severity, AlertSeverity::Medium);
        assert!(prong_alerts[0].message.contains(Prong::P1.display_name()));
        assert!(prong_alerts[0].message.contains("+25%"));
    }

    #[test]
    fn significant_rise_below_threshold_raises_no_code_alert() {
        // A: 66.7% -> 74.1% is significant on the 2-point floor but only +11% relative
        let baseline = compute_distribution(&cohort_from_counts("b", &[("A", 10), ("B", 5)]));
        let recent = compute_distribution(&cohort_from_counts("r", &[("A", 20), ("B", 2), ("C", 5)]));
        let report = detect_drift(&baseline, &recent, &AnalysisConfig::default());

        let a = report.code("A").unwrap();
        assert!(a.significant);
        assert!(a.relative_change_pct < AnalysisConfig::default().threshold_pct);

        let code_alerts: Vec<&Alert> = report
            .alerts
            .iter()
            .filter(|a| a.kind == AlertKind::CodeIncrease)
            .collect();
        assert_eq!(code_alerts.len(), 1);
        assert!(code_alerts[0].message.starts_with("Issue C "));
        assert!(report.alerts.iter().all(|a| !a.message.contains("Issue A ")));
    }

    #[test]
    fn critical_rise_of_exactly_five_points_alerts() {
        // 1/20 -> 2/20 critical is exactly +5 points
        let baseline = compute_distribution(&cohort_of(
            "b",
            &repeated(&[("X", Severity::Critical, None, 1), ("X", Severity::Low, None, 19)]),
        ));
        let recent = compute_distribution(&cohort_of(
            "r",
            &repeated(&[("X", Severity::Critical, None, 2), ("X", Severity::Low, None, 18)]),
        ));
        let report = detect_drift(&baseline, &recent, &AnalysisConfig::default());
        assert_eq!(report.severity(Severity::Critical).unwrap().absolute_change, 5.0);
        let critical: Vec<&Alert> = report
            .alerts
            .iter()
            .filter(|a| a.kind == AlertKind::CriticalSeverity)
            .collect();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].severity, AlertSeverity::High);

        // 1/25 -> 2/25 is +4 points
        let baseline = compute_distribution(&cohort_of(
            "b",
            &repeated(&[("X", Severity::Critical, None, 1), ("X", Severity::Low, None, 24)]),
        ));
        let recent = compute_distribution(&cohort_of(
            "r",
            &repeated(&[("X", Severity::Critical, None, 2), ("X", Severity::Low, None, 23)]),
        ));
        let report = detect_drift(&baseline, &recent, &AnalysisConfig::default());
        assert!(report.alerts.iter().all(|a| a.kind != AlertKind::CriticalSeverity));
    }
}
