use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .into_iter()
            .find(|severity| severity.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown severity '{value}'"))
    }
}

/// Evaluation criterion an issue is mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Prong {
    P1,
    P2,
    P3,
    Evidence,
    Coherence,
    Procedural,
}

impl Prong {
    pub const ALL: [Prong; 6] = [
        Prong::P1,
        Prong::P2,
        Prong::P3,
        Prong::Evidence,
        Prong::Coherence,
        Prong::Procedural,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Prong::P1 => "P1",
            Prong::P2 => "P2",
            Prong::P3 => "P3",
            Prong::Evidence => "EVIDENCE",
            Prong::Coherence => "COHERENCE",
            Prong::Procedural => "PROCEDURAL",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Prong::P1 => "Prong 1: Merit & National Importance",
            Prong::P2 => "Prong 2: Well Positioned",
            Prong::P3 => "Prong 3: Balance of Factors",
            Prong::Evidence => "Evidentiary Sufficiency",
            Prong::Coherence => "Narrative Coherence",
            Prong::Procedural => "Procedural Requirements",
        }
    }
}

impl FromStr for Prong {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Prong::ALL
            .into_iter()
            .find(|prong| prong.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown prong '{value}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeType {
    #[serde(rename = "RFE")]
    Rfe,
    #[serde(rename = "NOID")]
    Noid,
    Denial,
}

impl OutcomeType {
    pub fn as_str(self) -> &'static str {
        match self {
            OutcomeType::Rfe => "RFE",
            OutcomeType::Noid => "NOID",
            OutcomeType::Denial => "Denial",
        }
    }
}

impl FromStr for OutcomeType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rfe" => Ok(OutcomeType::Rfe),
            "noid" => Ok(OutcomeType::Noid),
            "denial" => Ok(OutcomeType::Denial),
            _ => Err(format!("unknown outcome type '{value}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: Uuid,
    pub taxonomy_code: String,
    pub severity: Severity,
    pub prong_affected: Option<Prong>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub category: Option<String>,
    pub outcome_type: Option<OutcomeType>,
    pub source_document_id: String,
}

/// A record left out of every cohort because the field it would be grouped by is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedRecord {
    pub record_id: Uuid,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Month,
    Quarter,
    Year,
    Category,
}

impl GroupBy {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupBy::Month => "month",
            GroupBy::Quarter => "quarter",
            GroupBy::Year => "year",
            GroupBy::Category => "category",
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupBy {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "month" => Ok(GroupBy::Month),
            "quarter" => Ok(GroupBy::Quarter),
            "year" => Ok(GroupBy::Year),
            "category" => Ok(GroupBy::Category),
            other => Err(EngineError::InvalidConfiguration(format!(
                "unknown grouping mode '{other}' (expected month, quarter, year or category)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Cohort {
    pub key: String,
    pub label: String,
    pub period_kind: GroupBy,
    pub members: Vec<IssueRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct CountShare {
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CodeStats {
    pub count: usize,
    pub percentage: f64,
    pub severity_breakdown: BTreeMap<Severity, usize>,
    pub prong_breakdown: BTreeMap<Prong, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub cohort_key: String,
    pub total: usize,
    pub by_code: BTreeMap<String, CodeStats>,
    pub by_severity: BTreeMap<Severity, CountShare>,
    pub by_prong: BTreeMap<Prong, CountShare>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftEntry {
    pub code: String,
    pub recent_count: usize,
    pub baseline_count: usize,
    pub recent_pct: f64,
    pub baseline_pct: f64,
    pub absolute_change: f64,
    pub relative_change_pct: f64,
    pub direction: Direction,
    pub significant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCode {
    pub code: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisappearedCode {
    pub code: String,
    pub previous_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftStatus {
    NoData,
    NoBaseline,
    Stable,
    ModerateDrift,
    HighDrift,
}

impl DriftStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DriftStatus::NoData => "no_data",
            DriftStatus::NoBaseline => "no_baseline",
            DriftStatus::Stable => "stable",
            DriftStatus::ModerateDrift => "moderate_drift",
            DriftStatus::HighDrift => "high_drift",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftSummary {
    pub status: DriftStatus,
    pub recent_total: usize,
    pub baseline_total: usize,
    pub significant_code_drifts: usize,
    pub rejected_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftReport {
    pub recent_period: String,
    pub baseline_period: String,
    pub code_drifts: Vec<DriftEntry>,
    pub prong_drifts: Vec<DriftEntry>,
    pub severity_drifts: Vec<DriftEntry>,
    pub new_codes: Vec<NewCode>,
    pub disappeared_codes: Vec<DisappearedCode>,
    pub overall_drift_score: u8,
    pub alerts: Vec<Alert>,
    pub summary: DriftSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    CodeIncrease,
    ProngScrutiny,
    CriticalSeverity,
    NewPatterns,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub message: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    SignificantIncrease,
    Reduction,
    NewPatterns,
    ProngScrutiny,
    CriticalIncrease,
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub title: String,
    pub text: String,
    pub action: String,
    pub from_cohort: String,
    pub to_cohort: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairwiseComparison {
    pub from_cohort: String,
    pub to_cohort: String,
    pub previous_total: usize,
    pub current_total: usize,
    pub total_change: i64,
    /// `None` when the previous cohort was empty.
    pub total_change_pct: Option<f64>,
    pub drift: DriftReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortSummary {
    pub key: String,
    pub label: String,
    pub period_kind: GroupBy,
    pub total: usize,
    pub critical_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeCount {
    pub code: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortOverview {
    pub total_issues: usize,
    pub cohort_count: usize,
    pub non_empty_cohorts: usize,
    pub rejected_count: usize,
    pub peak_cohort: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortAnalysis {
    pub group_by: GroupBy,
    pub cohorts: Vec<CohortSummary>,
    pub comparisons: Vec<PairwiseComparison>,
    pub insights: Vec<Insight>,
    pub top_codes_by_cohort: BTreeMap<String, Vec<CodeCount>>,
    pub prong_distribution_by_cohort: BTreeMap<String, BTreeMap<Prong, CountShare>>,
    pub available_years: Vec<i32>,
    pub available_categories: Vec<String>,
    pub summary: CohortOverview,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_case_insensitively() {
        assert_eq!("CRITICAL".parse::<Severity>(), Ok(Severity::Critical));
        assert_eq!("evidence".parse::<Prong>(), Ok(Prong::Evidence));
        assert_eq!("noid".parse::<OutcomeType>(), Ok(OutcomeType::Noid));
        assert!("urgent".parse::<Severity>().is_err());
    }

    #[test]
    fn unknown_grouping_mode_is_invalid_configuration() {
        assert_eq!("Quarter".parse::<GroupBy>().ok(), Some(GroupBy::Quarter));
        let err = "week".parse::<GroupBy>().unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration(_)));
    }

    #[test]
    fn alert_severity_orders_high_first() {
        assert!(AlertSeverity::High < AlertSeverity::Medium);
    }

    #[test]
    fn prong_serializes_with_wire_names() {
        let json = serde_json::to_string(&Prong::Coherence).unwrap();
        assert_eq!(json, "\"COHERENCE\"");
        let json = serde_json::to_string(&OutcomeType::Rfe).unwrap();
        assert_eq!(json, "\"RFE\"");
    }
}
