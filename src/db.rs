use chrono::{NaiveDate, Utc};
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineResult;
use crate::models::{IssueRecord, OutcomeType, Prong, Severity};
use crate::source::{read_csv, IssueBatch, IssueFilter, IssueSource};

pub async fn init_db(pool: &PgPool) -> EngineResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const SEED_CODES: [(&str, Severity, Option<Prong>); 10] = [
    ("NIW-P1-IMPORTANCE", Severity::High, Some(Prong::P1)),
    ("NIW-P1-MERIT", Severity::Medium, Some(Prong::P1)),
    ("NIW-P2-TRACK-RECORD", Severity::High, Some(Prong::P2)),
    ("NIW-P2-PLAN", Severity::Medium, Some(Prong::P2)),
    ("NIW-P3-LABOR-CERT", Severity::Critical, Some(Prong::P3)),
    ("EVD-LETTERS-GENERIC", Severity::Medium, Some(Prong::Evidence)),
    ("EVD-CITATIONS", Severity::Low, Some(Prong::Evidence)),
    ("COH-ENDEAVOR-VAGUE", Severity::High, Some(Prong::Coherence)),
    ("PROC-TRANSLATION", Severity::Low, Some(Prong::Procedural)),
    ("GEN-FORMATTING", Severity::Low, None),
];

const SEED_CATEGORIES: [&str; 3] = ["biotech", "software", "energy"];
const SEED_OUTCOMES: [OutcomeType; 3] = [OutcomeType::Rfe, OutcomeType::Noid, OutcomeType::Denial];

/// Twenty-one months of sample issues starting January 2025, with prong 3
/// findings picking up over the last six months.
pub async fn seed(pool: &PgPool) -> EngineResult<u64> {
    let mut inserted = 0u64;
    let mut serial = 0u128;

    for month_index in 0..21u32 {
        let year = 2025 + (month_index / 12) as i32;
        let month = month_index % 12 + 1;

        for (code_index, (code, severity, prong)) in SEED_CODES.iter().enumerate() {
            let mut count = (month_index as usize * 7 + code_index * 3) % 5;
            if code_index == 4 && month_index >= 15 {
                count += 4;
            }

            for occurrence in 0..count {
                serial += 1;
                let day = 1 + ((occurrence * 5 + code_index) % 27) as u32;
                let Some(occurred_at) = NaiveDate::from_ymd_opt(year, month, day)
                    .and_then(|date| date.and_hms_opt(9, 0, 0))
                    .map(|naive| naive.and_utc())
                else {
                    continue;
                };
                let record = IssueRecord {
                    id: Uuid::from_u128(0x5eed_0000_0000_0000_0000_0000_0000_0000 + serial),
                    taxonomy_code: code.to_string(),
                    severity: *severity,
                    prong_affected: *prong,
                    occurred_at: Some(occurred_at),
                    category: Some(SEED_CATEGORIES[(occurrence + code_index) % 3].to_string()),
                    outcome_type: Some(SEED_OUTCOMES[(month_index as usize + occurrence) % 3]),
                    source_document_id: format!("seed-doc-{year}-{month:02}-{:03}", occurrence + 1),
                };
                inserted += insert_issue(pool, &record).await?;
            }
        }
    }

    info!(inserted, "seeded sample issue events");
    Ok(inserted)
}

/// Returns `(inserted, rejected)`; rows already present (same id) are left untouched.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> EngineResult<(u64, usize)> {
    let loaded = read_csv(csv_path)?;
    let mut inserted = 0u64;

    for record in &loaded.records {
        inserted += insert_issue(pool, record).await?;
    }

    Ok((inserted, loaded.rejected))
}

async fn insert_issue(pool: &PgPool, record: &IssueRecord) -> EngineResult<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO adjudication_drift.issue_events
        (id, taxonomy_code, severity, prong_affected, occurred_at, category, outcome_type, source_document_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(record.id)
    .bind(&record.taxonomy_code)
    .bind(record.severity.as_str())
    .bind(record.prong_affected.map(Prong::as_str))
    .bind(record.occurred_at)
    .bind(&record.category)
    .bind(record.outcome_type.map(OutcomeType::as_str))
    .bind(&record.source_document_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

#[derive(Debug, Clone)]
pub struct PgIssueSource {
    pool: PgPool,
}

impl PgIssueSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl IssueSource for PgIssueSource {
    async fn list_issues(&self, filter: &IssueFilter) -> EngineResult<IssueBatch> {
        let (query, _) = select_issues_sql(filter);

        let mut rows = sqlx::query(&query);
        if let Some(from) = filter.date_from {
            rows = rows.bind(from);
        }
        if let Some(to) = filter.date_to {
            rows = rows.bind(to);
        }
        if let Some(category) = &filter.category {
            rows = rows.bind(category.trim().to_string());
        }

        let fetched = rows.fetch_all(&self.pool).await?;
        let mut batch = IssueBatch::new(Vec::with_capacity(fetched.len()));

        for row in fetched {
            let id: Uuid = row.try_get("id")?;
            let severity: String = row.try_get("severity")?;
            let prong: Option<String> = row.try_get("prong_affected")?;
            let outcome: Option<String> = row.try_get("outcome_type")?;

            let (severity, prong_affected, outcome_type) =
                match parse_labels(&severity, prong.as_deref(), outcome.as_deref()) {
                    Ok(values) => values,
                    Err(reason) => {
                        batch.unreadable += 1;
                        warn!(record_id = %id, reason = %reason, "skipping unreadable issue row");
                        continue;
                    }
                };

            batch.records.push(IssueRecord {
                id,
                taxonomy_code: row.try_get("taxonomy_code")?,
                severity,
                prong_affected,
                occurred_at: row.try_get::<Option<chrono::DateTime<Utc>>, _>("occurred_at")?,
                category: row.try_get("category")?,
                outcome_type,
                source_document_id: row.try_get("source_document_id")?,
            });
        }

        if batch.unreadable > 0 {
            warn!(unreadable = batch.unreadable, "issue rows skipped while listing");
        }
        Ok(batch)
    }
}

type Labels = (Severity, Option<Prong>, Option<OutcomeType>);

/// Parses the enum columns of a stored row.
fn parse_labels(severity: &str, prong: Option<&str>, outcome: Option<&str>) -> Result<Labels, String> {
    Ok((
        severity.parse::<Severity>()?,
        prong.map(str::parse::<Prong>).transpose()?,
        outcome.map(str::parse::<OutcomeType>).transpose()?,
    ))
}

/// SQL for a filtered issue listing and the number of bind parameters it expects,
/// in the order date_from, date_to, category.
fn select_issues_sql(filter: &IssueFilter) -> (String, usize) {
    let mut query = String::from(
        "SELECT id, taxonomy_code, severity, prong_affected, occurred_at, category, \
         outcome_type, source_document_id \
         FROM adjudication_drift.issue_events \
         WHERE TRUE",
    );
    let mut binds = 0;

    if filter.date_from.is_some() {
        binds += 1;
        query.push_str(&format!(" AND occurred_at >= ${binds}"));
    }
    if filter.date_to.is_some() {
        binds += 1;
        query.push_str(&format!(" AND occurred_at < ${binds}"));
    }
    if filter.category.is_some() {
        binds += 1;
        query.push_str(&format!(" AND btrim(category) = ${binds}"));
    }
    query.push_str(" ORDER BY occurred_at NULLS LAST, id");

    (query, binds)
}
