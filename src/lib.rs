//! Cohort and drift analysis over normalized adjudication issue events.
//!
//! Records flow one way: [`cohort`] partitions them, [`distribution`] counts each
//! cohort, [`drift`] and [`compare`] contrast distributions, and [`alerts`] ranks
//! what changed. [`engine`] ties these to an [`source::IssueSource`].

pub mod alerts;
pub mod cohort;
pub mod compare;
pub mod config;
pub mod db;
pub mod distribution;
pub mod drift;
pub mod engine;
pub mod error;
pub mod models;
pub mod report;
pub mod source;

pub use config::AnalysisConfig;
pub use engine::{CohortQuery, DriftEngine, DriftQuery};
pub use error::{EngineError, EngineResult};
