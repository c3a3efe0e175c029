use std::path::PathBuf;

use adjudication_drift::db::{self, PgIssueSource};
use adjudication_drift::engine::{CohortQuery, DriftEngine, DriftQuery};
use adjudication_drift::models::GroupBy;
use adjudication_drift::report;
use adjudication_drift::source::{InMemorySource, IssueBatch, IssueFilter, IssueSource};
use adjudication_drift::{AnalysisConfig, EngineResult};
use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "adjudication-drift")]
#[command(about = "Cohort and drift analysis of adjudication issue events", long_about = None)]
struct Cli {
    /// Analyze a CSV snapshot instead of the Postgres issue store
    #[arg(long, global = true)]
    csv: Option<PathBuf>,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
    /// Seconds before an analysis is abandoned
    #[arg(long, global = true, default_value_t = 30)]
    timeout_secs: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample issue events
    Seed,
    /// Import issue events from a CSV file
    Import {
        #[arg(long = "file")]
        file: PathBuf,
    },
    /// Group issues into cohorts and compare consecutive periods
    Cohorts {
        #[arg(long, default_value = "month")]
        group_by: String,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Compare the recent window against the baseline window
    Drift {
        #[arg(long, default_value_t = 60)]
        recent_days: i64,
        #[arg(long, default_value_t = 180)]
        baseline_days: i64,
        #[arg(long, default_value_t = 20.0)]
        threshold: f64,
        #[arg(long, default_value_t = 2.0)]
        floor: f64,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "month")]
        group_by: String,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value = "drift-report.md")]
        out: PathBuf,
    },
}

enum Source {
    Postgres(PgIssueSource),
    Snapshot(InMemorySource),
}

impl IssueSource for Source {
    async fn list_issues(&self, filter: &IssueFilter) -> EngineResult<IssueBatch> {
        match self {
            Source::Postgres(source) => source.list_issues(filter).await,
            Source::Snapshot(source) => source.list_issues(filter).await,
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_env("ADJUDICATION_DRIFT_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set (or pass --csv to analyze a snapshot)")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn open_source(csv: Option<&PathBuf>) -> anyhow::Result<Source> {
    match csv {
        Some(path) => {
            let snapshot = InMemorySource::from_csv(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(Source::Snapshot(snapshot))
        }
        None => Ok(Source::Postgres(PgIssueSource::new(connect().await?))),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let base_config = AnalysisConfig {
        timeout_secs: cli.timeout_secs,
        ..AnalysisConfig::default()
    };

    match cli.command {
        Commands::InitDb => {
            db::init_db(&connect().await?).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let inserted = db::seed(&connect().await?).await?;
            println!("Inserted {inserted} sample issue events.");
        }
        Commands::Import { file } => {
            let (inserted, rejected) = db::import_csv(&connect().await?, &file).await?;
            println!(
                "Inserted {inserted} issue events from {} ({rejected} rows rejected).",
                file.display()
            );
        }
        Commands::Cohorts {
            group_by,
            year,
            category,
            json,
        } => {
            let query = CohortQuery {
                group_by: group_by.parse::<GroupBy>()?,
                year,
                category,
            };
            let engine = DriftEngine::new(open_source(cli.csv.as_ref()).await?, base_config)?;
            let analysis = engine.get_cohorts(query).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                let mut output = String::new();
                report::render_cohorts(&mut output, &analysis);
                print!("{output}");
            }
        }
        Commands::Drift {
            recent_days,
            baseline_days,
            threshold,
            floor,
            category,
            json,
        } => {
            let config = AnalysisConfig {
                absolute_pt_floor: floor,
                ..base_config
            };
            let engine = DriftEngine::new(open_source(cli.csv.as_ref()).await?, config)?;
            let query = DriftQuery {
                recent_window_days: recent_days,
                baseline_window_days: baseline_days,
                threshold_pct: threshold,
                category,
            };
            let drift = engine.get_drift(query, chrono::Utc::now()).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&drift)?);
            } else {
                let mut output = String::new();
                report::render_drift(&mut output, &drift);
                print!("{output}");
            }
        }
        Commands::Report {
            group_by,
            year,
            category,
            out,
        } => {
            let query = CohortQuery {
                group_by: group_by.parse::<GroupBy>()?,
                year,
                category: category.clone(),
            };
            let engine = DriftEngine::new(open_source(cli.csv.as_ref()).await?, base_config)?;
            let drift_query = DriftQuery {
                category: category.clone(),
                ..DriftQuery::from(engine.config())
            };
            let drift = engine.get_drift(drift_query, chrono::Utc::now()).await?;
            let cohorts = engine.get_cohorts(query).await?;
            let markdown = report::build_report(category.as_deref(), &drift, &cohorts);
            std::fs::write(&out, markdown)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
