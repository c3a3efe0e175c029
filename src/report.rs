use std::fmt::Write;

use crate::models::{AlertSeverity, CohortAnalysis, DriftReport, DriftStatus, Prong};

fn status_line(report: &DriftReport) -> &'static str {
    match report.summary.status {
        DriftStatus::NoData => "No issues recorded in the recent window; drift was not scored.",
        DriftStatus::NoBaseline => "No issues recorded in the baseline window; every recent issue is new.",
        DriftStatus::Stable => "Rejection criteria look stable.",
        DriftStatus::ModerateDrift => "Rejection criteria are shifting moderately.",
        DriftStatus::HighDrift => "Rejection criteria are shifting sharply.",
    }
}

pub fn render_drift(output: &mut String, report: &DriftReport) {
    let _ = writeln!(output, "## Drift: {} vs {}", report.recent_period, report.baseline_period);
    let _ = writeln!(
        output,
        "Status **{}**, drift score {}/100 ({} recent issues, {} baseline issues).",
        report.summary.status.as_str(),
        report.overall_drift_score,
        report.summary.recent_total,
        report.summary.baseline_total
    );
    let _ = writeln!(output, "{}", status_line(report));
    if report.summary.rejected_count > 0 {
        let _ = writeln!(
            output,
            "{} issues were skipped as undated or unreadable.",
            report.summary.rejected_count
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "### Alerts");
    if report.alerts.is_empty() {
        let _ = writeln!(output, "No alerts for this comparison.");
    } else {
        for alert in &report.alerts {
            let severity = match alert.severity {
                AlertSeverity::High => "HIGH",
                AlertSeverity::Medium => "MEDIUM",
            };
            let _ = writeln!(output, "- [{severity}] {} ({})", alert.message, alert.recommendation);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "### Largest Code Shifts");
    let significant: Vec<_> = report.code_drifts.iter().filter(|e| e.significant).collect();
    if significant.is_empty() {
        let _ = writeln!(output, "No significant code shifts.");
    } else {
        for entry in significant.iter().take(10) {
            let _ = writeln!(
                output,
                "- {}: {:.1}% -> {:.1}% ({:+.1} pts, {:+.0}%)",
                entry.code,
                entry.baseline_pct,
                entry.recent_pct,
                entry.absolute_change,
                entry.relative_change_pct
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "### Prongs");
    for entry in &report.prong_drifts {
        let name = entry
            .code
            .parse::<Prong>()
            .map(Prong::display_name)
            .unwrap_or(entry.code.as_str());
        let _ = writeln!(
            output,
            "- {}: {} -> {} issues ({:.1}% -> {:.1}%)",
            name, entry.baseline_count, entry.recent_count, entry.baseline_pct, entry.recent_pct
        );
    }

    if !report.new_codes.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "### New Issue Types");
        for code in &report.new_codes {
            let _ = writeln!(output, "- {} ({} occurrences)", code.code, code.count);
        }
    }

    if !report.disappeared_codes.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "### Disappeared Issue Types");
        for code in &report.disappeared_codes {
            let _ = writeln!(output, "- {} (previously {})", code.code, code.previous_count);
        }
    }
}

pub fn render_cohorts(output: &mut String, analysis: &CohortAnalysis) {
    let _ = writeln!(output, "## Cohorts by {}", analysis.group_by);

    if analysis.cohorts.is_empty() {
        let _ = writeln!(output, "No cohorts for this selection.");
        return;
    }

    for cohort in &analysis.cohorts {
        let top = analysis
            .top_codes_by_cohort
            .get(&cohort.key)
            .map(|codes| {
                codes
                    .iter()
                    .take(3)
                    .map(|c| format!("{} ({})", c.code, c.count))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        if cohort.total == 0 {
            let _ = writeln!(output, "- {}: no issues", cohort.label);
        } else {
            let _ = writeln!(
                output,
                "- {}: {} issues, {} critical; top {}",
                cohort.label, cohort.total, cohort.critical_count, top
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "### Insights");
    if analysis.insights.is_empty() {
        let _ = writeln!(output, "No notable period-over-period changes.");
    } else {
        for insight in &analysis.insights {
            let _ = writeln!(output, "- **{}**: {} {}", insight.title, insight.text, insight.action);
        }
    }

    if analysis.summary.rejected_count > 0 {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "{} issues could not be grouped and were skipped.",
            analysis.summary.rejected_count
        );
    }
}

pub fn build_report(title_scope: Option<&str>, drift: &DriftReport, cohorts: &CohortAnalysis) -> String {
    let mut output = String::new();
    let scope = title_scope.unwrap_or("all categories");

    let _ = writeln!(output, "# Adjudication Drift Report");
    let _ = writeln!(output, "Generated for {scope}");
    let _ = writeln!(output);
    render_drift(&mut output, drift);
    let _ = writeln!(output);
    render_cohorts(&mut output, cohorts);

    output
}
