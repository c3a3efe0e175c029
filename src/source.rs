use std::future::Future;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineResult;
use crate::models::{IssueRecord, OutcomeType, Prong, Severity};

/// `date_from` is inclusive, `date_to` exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueFilter {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub category: Option<String>,
}

impl IssueFilter {
    pub fn matches(&self, record: &IssueRecord) -> bool {
        if self.date_from.is_some() || self.date_to.is_some() {
            let Some(at) = record.occurred_at else {
                return false;
            };
            if self.date_from.is_some_and(|from| at < from) {
                return false;
            }
            if self.date_to.is_some_and(|to| at >= to) {
                return false;
            }
        }
        match &self.category {
            Some(wanted) => record.category.as_deref().map(str::trim) == Some(wanted.trim()),
            None => true,
        }
    }
}

/// Records matching a filter, plus the number of stored rows that could not
/// be read back as issue events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueBatch {
    pub records: Vec<IssueRecord>,
    pub unreadable: usize,
}

impl IssueBatch {
    pub fn new(records: Vec<IssueRecord>) -> Self {
        Self {
            records,
            unreadable: 0,
        }
    }
}

/// Supplier of normalized issue events.
pub trait IssueSource {
    fn list_issues(&self, filter: &IssueFilter) -> impl Future<Output = EngineResult<IssueBatch>> + Send;
}

/// A snapshot held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    records: Vec<IssueRecord>,
    unreadable: usize,
}

impl InMemorySource {
    pub fn new(records: Vec<IssueRecord>) -> Self {
        Self {
            records,
            unreadable: 0,
        }
    }

    /// Rows the CSV reader dropped are reported with every listing, since
    /// their dates and categories are unknown.
    pub fn from_csv(path: &Path) -> EngineResult<Self> {
        let loaded = read_csv(path)?;
        Ok(Self {
            records: loaded.records,
            unreadable: loaded.rejected,
        })
    }

    pub fn with_unreadable(mut self, unreadable: usize) -> Self {
        self.unreadable = unreadable;
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl IssueSource for InMemorySource {
    async fn list_issues(&self, filter: &IssueFilter) -> EngineResult<IssueBatch> {
        let records = self
            .records
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        Ok(IssueBatch {
            records,
            unreadable: self.unreadable,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CsvRow {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub taxonomy_code: String,
    pub severity: String,
    #[serde(default)]
    pub prong_affected: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub outcome_type: Option<String>,
    pub source_document_id: String,
}

impl TryFrom<CsvRow> for IssueRecord {
    type Error = String;

    fn try_from(row: CsvRow) -> Result<Self, Self::Error> {
        let taxonomy_code = row.taxonomy_code.trim().to_string();
        if taxonomy_code.is_empty() {
            return Err("missing taxonomy_code".to_string());
        }

        Ok(IssueRecord {
            id: row.id.unwrap_or_else(Uuid::new_v4),
            taxonomy_code,
            severity: row.severity.parse::<Severity>()?,
            prong_affected: non_blank(row.prong_affected)
                .map(|v| v.parse::<Prong>())
                .transpose()?,
            occurred_at: non_blank(row.occurred_at).and_then(|v| parse_timestamp(&v)),
            category: non_blank(row.category),
            outcome_type: non_blank(row.outcome_type)
                .map(|v| v.parse::<OutcomeType>())
                .transpose()?,
            source_document_id: row.source_document_id,
        })
    }
}

#[derive(Debug, Default)]
pub struct CsvLoad {
    pub records: Vec<IssueRecord>,
    pub rejected: usize,
}

pub fn read_csv(path: &Path) -> EngineResult<CsvLoad> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut loaded = CsvLoad::default();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result?;
        match IssueRecord::try_from(row) {
            Ok(record) => loaded.records.push(record),
            Err(reason) => {
                warn!(line = line + 2, reason = %reason, "skipping malformed issue row");
                loaded.rejected += 1;
            }
        }
    }

    info!(
        path = %path.display(),
        records = loaded.records.len(),
        rejected = loaded.rejected,
        "loaded issue snapshot from csv"
    );
    Ok(loaded)
}

/// RFC 3339 or a bare `YYYY-MM-DD` (taken as midnight UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
