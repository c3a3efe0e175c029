//! Distribution-to-distribution drift detection.
//!
//! A comparison produces one [`DriftEntry`] per taxonomy code (union of both sides),
//! per prong and per severity. Entries are ordered by relative change, then absolute
//! change, then code, so reports are reproducible for a fixed input.
//!
//! Relative change is baseline-relative: a code absent from the baseline reports +100%
//! no matter how many times it appears in the recent window. Those codes are also
//! listed in `new_codes` with their counts.

use std::collections::BTreeSet;

use crate::alerts::generate_alerts;
use crate::config::AnalysisConfig;
use crate::models::{
    Direction, DisappearedCode, Distribution, DriftEntry, DriftReport, DriftStatus, DriftSummary,
    NewCode, Prong, Severity,
};

/// Changes smaller than this many percentage points count as no change.
const STABLE_EPSILON: f64 = 1e-9;

pub const HIGH_DRIFT_SCORE: u8 = 70;

pub fn detect_drift(
    baseline: &Distribution,
    recent: &Distribution,
    config: &AnalysisConfig,
) -> DriftReport {
    let codes: BTreeSet<&String> = baseline.by_code.keys().chain(recent.by_code.keys()).collect();

    let mut code_drifts: Vec<DriftEntry> = codes
        .into_iter()
        .map(|code| {
            let base = baseline.by_code.get(code);
            let now = recent.by_code.get(code);
            drift_entry(
                code,
                (base.map_or(0, |s| s.count), base.map_or(0.0, |s| s.percentage)),
                (now.map_or(0, |s| s.count), now.map_or(0.0, |s| s.percentage)),
                config,
            )
        })
        .collect();
    sort_entries(&mut code_drifts);

    let mut prong_drifts: Vec<DriftEntry> = Prong::ALL
        .into_iter()
        .map(|prong| {
            let base = baseline.by_prong.get(&prong).copied().unwrap_or_default();
            let now = recent.by_prong.get(&prong).copied().unwrap_or_default();
            drift_entry(
                prong.as_str(),
                (base.count, base.percentage),
                (now.count, now.percentage),
                config,
            )
        })
        .collect();
    sort_entries(&mut prong_drifts);

    let mut severity_drifts: Vec<DriftEntry> = Severity::ALL
        .into_iter()
        .map(|severity| {
            let base = baseline.by_severity.get(&severity).copied().unwrap_or_default();
            let now = recent.by_severity.get(&severity).copied().unwrap_or_default();
            drift_entry(
                severity.as_str(),
                (base.count, base.percentage),
                (now.count, now.percentage),
                config,
            )
        })
        .collect();
    sort_entries(&mut severity_drifts);

    let mut new_codes: Vec<NewCode> = code_drifts
        .iter()
        .filter(|entry| entry.baseline_count == 0 && entry.recent_count > 0)
        .map(|entry| NewCode {
            code: entry.code.clone(),
            count: entry.recent_count,
            percentage: entry.recent_pct,
        })
        .collect();
    new_codes.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.code.cmp(&b.code)));

    let mut disappeared_codes: Vec<DisappearedCode> = code_drifts
        .iter()
        .filter(|entry| entry.recent_count == 0 && entry.baseline_count > 0)
        .map(|entry| DisappearedCode {
            code: entry.code.clone(),
            previous_count: entry.baseline_count,
        })
        .collect();
    disappeared_codes.sort_by(|a, b| {
        b.previous_count
            .cmp(&a.previous_count)
            .then_with(|| a.code.cmp(&b.code))
    });

    let significant_code_drifts = code_drifts.iter().filter(|e| e.significant).count();
    let overall_drift_score = if recent.total == 0 {
        0
    } else {
        drift_score(&code_drifts, &prong_drifts, new_codes.len())
    };

    let status = classify(
        baseline.total,
        recent.total,
        overall_drift_score,
        config.threshold_pct,
    );

    let mut report = DriftReport {
        recent_period: recent.cohort_key.clone(),
        baseline_period: baseline.cohort_key.clone(),
        code_drifts,
        prong_drifts,
        severity_drifts,
        new_codes,
        disappeared_codes,
        overall_drift_score,
        alerts: Vec::new(),
        summary: DriftSummary {
            status,
            recent_total: recent.total,
            baseline_total: baseline.total,
            significant_code_drifts,
            rejected_count: 0,
        },
    };
    report.alerts = generate_alerts(&report, config.threshold_pct);
    report
}

pub fn drift_entry(
    code: &str,
    (baseline_count, baseline_pct): (usize, f64),
    (recent_count, recent_pct): (usize, f64),
    config: &AnalysisConfig,
) -> DriftEntry {
    let absolute_change = recent_pct - baseline_pct;
    let relative_change_pct = if baseline_pct > 0.0 {
        absolute_change / baseline_pct * 100.0
    } else if recent_pct > 0.0 {
        100.0
    } else {
        0.0
    };

    let direction = if absolute_change > STABLE_EPSILON {
        Direction::Up
    } else if absolute_change < -STABLE_EPSILON {
        Direction::Down
    } else {
        Direction::Stable
    };

    let significant = direction != Direction::Stable
        && (absolute_change.abs() >= config.absolute_pt_floor
            || relative_change_pct.abs() >= config.threshold_pct);

    DriftEntry {
        code: code.to_string(),
        recent_count,
        baseline_count,
        recent_pct,
        baseline_pct,
        absolute_change,
        relative_change_pct,
        direction,
        significant,
    }
}

/// Bounded 0..=100 score: significant codes (max 40), significant prongs (max 30),
/// new codes (max 20) and mean relative change (max 10).
pub fn drift_score(code_drifts: &[DriftEntry], prong_drifts: &[DriftEntry], new_codes: usize) -> u8 {
    let significant_codes = code_drifts.iter().filter(|e| e.significant).count() as f64;
    let significant_prongs = prong_drifts.iter().filter(|e| e.significant).count() as f64;
    let mean_relative = if code_drifts.is_empty() {
        0.0
    } else {
        code_drifts
            .iter()
            .map(|e| e.relative_change_pct.abs())
            .sum::<f64>()
            / code_drifts.len() as f64
    };

    let score = (5.0 * significant_codes).min(40.0)
        + (10.0 * significant_prongs).min(30.0)
        + (5.0 * new_codes as f64).min(20.0)
        + (mean_relative / 10.0).min(10.0);

    score.round().clamp(0.0, 100.0) as u8
}

pub fn classify(baseline_total: usize, recent_total: usize, score: u8, threshold_pct: f64) -> DriftStatus {
    if recent_total == 0 {
        DriftStatus::NoData
    } else if baseline_total == 0 {
        DriftStatus::NoBaseline
    } else if score >= HIGH_DRIFT_SCORE {
        DriftStatus::HighDrift
    } else if f64::from(score) < threshold_pct {
        DriftStatus::Stable
    } else {
        DriftStatus::ModerateDrift
    }
}

fn sort_entries(entries: &mut [DriftEntry]) {
    entries.sort_by(|a, b| {
        b.relative_change_pct
            .abs()
            .total_cmp(&a.relative_change_pct.abs())
            .then_with(|| b.absolute_change.abs().total_cmp(&a.absolute_change.abs()))
            .then_with(|| a.code.cmp(&b.code))
    });
}

impl DriftReport {
    pub fn code(&self, code: &str) -> Option<&DriftEntry> {
        self.code_drifts.iter().find(|entry| entry.code == code)
    }

    pub fn prong(&self, prong: Prong) -> Option<&DriftEntry> {
        self.prong_drifts.iter().find(|entry| entry.code == prong.as_str())
    }

    pub fn severity(&self, severity: Severity) -> Option<&DriftEntry> {
        self.severity_drifts
            .iter()
            .find(|entry| entry.code == severity.as_str())
    }

    pub fn significant_count(&self) -> usize {
        self.code_drifts
            .iter()
            .chain(&self.prong_drifts)
            .chain(&self.severity_drifts)
            .filter(|entry| entry.significant)
            .count()
    }
}
