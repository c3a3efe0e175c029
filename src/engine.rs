//! Query surface over an [`IssueSource`]: cohort timelines and windowed drift.
//!
//! Each request fetches one snapshot, then runs the pure transform on the blocking
//! pool under the configured timeout. An expired timeout yields
//! [`EngineError::Timeout`]; partial reports are never returned.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{info, warn};

use crate::cohort::{available_categories, available_years, build_cohorts};
use crate::compare::compare_timeline;
use crate::config::AnalysisConfig;
use crate::distribution::{compute_distribution, compute_distributions, top_codes};
use crate::drift::detect_drift;
use crate::error::{EngineError, EngineResult};
use crate::models::{
    Cohort, CohortAnalysis, CohortOverview, CohortSummary, Distribution, DriftReport, GroupBy,
    IssueRecord, Severity,
};
use crate::source::{IssueFilter, IssueSource};

const TOP_CODES_PER_COHORT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortQuery {
    pub group_by: GroupBy,
    pub year: Option<i32>,
    pub category: Option<String>,
}

/// `category` scopes both windows to one category; `None` compares everything.
#[derive(Debug, Clone, PartialEq)]
pub struct DriftQuery {
    pub recent_window_days: i64,
    pub baseline_window_days: i64,
    pub threshold_pct: f64,
    pub category: Option<String>,
}

impl Default for DriftQuery {
    fn default() -> Self {
        Self::from(&AnalysisConfig::default())
    }
}

impl From<&AnalysisConfig> for DriftQuery {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            recent_window_days: config.recent_window_days,
            baseline_window_days: config.baseline_window_days,
            threshold_pct: config.threshold_pct,
            category: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DriftEngine<S> {
    source: S,
    config: AnalysisConfig,
}

impl<S: IssueSource> DriftEngine<S> {
    pub fn new(source: S, config: AnalysisConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { source, config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub async fn get_cohorts(&self, query: CohortQuery) -> EngineResult<CohortAnalysis> {
        let batch = self.source.list_issues(&IssueFilter::default()).await?;
        let unreadable = batch.unreadable;
        let config = self.config.clone();
        let mut analysis =
            run_bounded(&self.config, move || analyze_cohorts(&batch.records, &query, &config)).await?;
        analysis.summary.rejected_count += unreadable;

        info!(
            group_by = %analysis.group_by,
            cohorts = analysis.cohorts.len(),
            insights = analysis.insights.len(),
            rejected = analysis.summary.rejected_count,
            "cohort analysis complete"
        );
        Ok(analysis)
    }

    /// Drift of the recent window against the baseline window immediately before it.
    pub async fn get_drift(&self, query: DriftQuery, as_of: DateTime<Utc>) -> EngineResult<DriftReport> {
        let config = AnalysisConfig {
            recent_window_days: query.recent_window_days,
            baseline_window_days: query.baseline_window_days,
            threshold_pct: query.threshold_pct,
            ..self.config.clone()
        };
        config.validate()?;

        let windows = DriftWindows::ending_at(as_of, &config)?;
        let filter = IssueFilter {
            date_from: Some(windows.baseline_from),
            date_to: Some(windows.recent_to),
            category: query.category,
        };
        let batch = self.source.list_issues(&filter).await?;
        let unreadable = batch.unreadable;

        let timeout_config = config.clone();
        let mut report = run_bounded(&timeout_config, move || {
            analyze_windows(&batch.records, &windows, &config)
        })
        .await?;
        report.summary.rejected_count += unreadable;

        info!(
            category = filter.category.as_deref().unwrap_or("all"),
            status = report.summary.status.as_str(),
            score = report.overall_drift_score,
            alerts = report.alerts.len(),
            "drift analysis complete"
        );
        Ok(report)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriftWindows {
    pub baseline_from: DateTime<Utc>,
    pub recent_from: DateTime<Utc>,
    pub recent_to: DateTime<Utc>,
}

impl DriftWindows {
    /// Fails with `InvalidConfiguration` when a window reaches past the
    /// representable date range.
    pub fn ending_at(as_of: DateTime<Utc>, config: &AnalysisConfig) -> EngineResult<Self> {
        let recent_from = days_before(as_of, config.recent_window_days, "recent_window_days")?;
        let baseline_from = days_before(recent_from, config.baseline_window_days, "baseline_window_days")?;
        Ok(Self {
            baseline_from,
            recent_from,
            recent_to: as_of,
        })
    }

    pub fn baseline_label(&self) -> String {
        format!("{}..{}", self.baseline_from.date_naive(), self.recent_from.date_naive())
    }

    pub fn recent_label(&self) -> String {
        format!("{}..{}", self.recent_from.date_naive(), self.recent_to.date_naive())
    }
}

fn days_before(at: DateTime<Utc>, days: i64, field: &str) -> EngineResult<DateTime<Utc>> {
    TimeDelta::try_days(days)
        .and_then(|span| at.checked_sub_signed(span))
        .ok_or_else(|| {
            EngineError::InvalidConfiguration(format!(
                "{field} of {days} days reaches outside the supported date range"
            ))
        })
}

pub fn analyze_windows(
    records: &[IssueRecord],
    windows: &DriftWindows,
    config: &AnalysisConfig,
) -> DriftReport {
    let mut baseline = window_cohort(windows.baseline_label());
    let mut recent = window_cohort(windows.recent_label());
    let mut rejected = 0usize;

    for record in records {
        match record.occurred_at {
            None => rejected += 1,
            Some(at) if at >= windows.recent_from && at < windows.recent_to => {
                recent.members.push(record.clone())
            }
            Some(at) if at >= windows.baseline_from && at < windows.recent_from => {
                baseline.members.push(record.clone())
            }
            Some(_) => {}
        }
    }

    if rejected > 0 {
        warn!(rejected, "skipped issue records without a timestamp");
    }

    let mut report = detect_drift(
        &compute_distribution(&baseline),
        &compute_distribution(&recent),
        config,
    );
    report.summary.rejected_count = rejected;
    report
}

pub fn analyze_cohorts(
    records: &[IssueRecord],
    query: &CohortQuery,
    config: &AnalysisConfig,
) -> CohortAnalysis {
    let set = build_cohorts(records, query.group_by, query.year, query.category.as_deref());
    let cohorts: Vec<&Cohort> = set.cohorts.values().collect();
    let distributions = compute_distributions(cohorts.iter().copied());

    let timeline: Vec<(&Cohort, &Distribution)> =
        cohorts.iter().copied().zip(distributions.iter()).collect();
    let compared = compare_timeline(&timeline, config);

    let summaries: Vec<CohortSummary> = timeline
        .iter()
        .map(|(cohort, dist)| CohortSummary {
            key: cohort.key.clone(),
            label: cohort.label.clone(),
            period_kind: cohort.period_kind,
            total: dist.total,
            critical_count: dist
                .by_severity
                .get(&Severity::Critical)
                .map_or(0, |share| share.count),
        })
        .collect();

    let top_codes_by_cohort: BTreeMap<_, _> = distributions
        .iter()
        .map(|dist| (dist.cohort_key.clone(), top_codes(dist, TOP_CODES_PER_COHORT)))
        .collect();
    let prong_distribution_by_cohort: BTreeMap<_, _> = distributions
        .iter()
        .map(|dist| (dist.cohort_key.clone(), dist.by_prong.clone()))
        .collect();

    let peak_cohort = summaries
        .iter()
        .filter(|summary| summary.total > 0)
        .max_by(|a, b| a.total.cmp(&b.total).then_with(|| b.key.cmp(&a.key)))
        .map(|summary| summary.key.clone());

    let summary = CohortOverview {
        total_issues: set.total_members(),
        cohort_count: summaries.len(),
        non_empty_cohorts: summaries.iter().filter(|s| s.total > 0).count(),
        rejected_count: set.rejected_count(),
        peak_cohort,
    };

    CohortAnalysis {
        group_by: query.group_by,
        cohorts: summaries,
        comparisons: compared.comparisons,
        insights: compared.insights,
        top_codes_by_cohort,
        prong_distribution_by_cohort,
        available_years: available_years(records),
        available_categories: available_categories(records),
        summary,
    }
}

/// Drift windows are ad hoc date ranges rather than calendar periods.
fn window_cohort(label: String) -> Cohort {
    Cohort {
        key: label.clone(),
        label,
        period_kind: GroupBy::Category,
        members: Vec::new(),
    }
}

async fn run_bounded<T, F>(config: &AnalysisConfig, work: F) -> EngineResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let timeout = config.timeout();
    let handle = tokio::task::spawn_blocking(work);

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_err)) => Err(EngineError::TaskFailed(join_err.to_string())),
        Err(_) => {
            let timeout_ms = timeout.as_millis() as u64;
            warn!(timeout_ms, "analysis timed out");
            Err(EngineError::Timeout { timeout_ms })
        }
    }
}
