//! Coach Score - On-device scoring engine for a fitness-coaching app
//!
//! Coach Score turns raw user inputs (fitness-test measurements, questionnaire
//! answers, calendar sessions) into the scores the app displays:
//! fitness-test banding → questionnaire score and BMI → activity index with
//! decayed questionnaire baseline → weekly and monthly series.
//!
//! ## Modules
//!
//! - **Scoring**: banding tables, questionnaire scoring, activity index
//! - **Series**: weekly and monthly activity-index buckets
//! - **Processor**: stateful engine with test history, fetch fallbacks and refresh notifications

pub mod activity_index;
pub mod banding;
pub mod config;
pub mod error;
pub mod feed;
pub mod history;
pub mod pipeline;
pub mod questionnaire;
pub mod refresh;
pub mod series;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use activity_index::{compute_activity_index, compute_activity_index_with};
pub use banding::{score_test_result, BandingTable, FlexibilityLevel};
pub use config::EngineConfig;
pub use error::ScoreError;
pub use feed::FetchOutcome;
pub use pipeline::{
    activity_index_to_json, monthly_series_to_json, questionnaire_to_json, score_test_to_json,
    weekly_series_to_json, ScoreProcessor,
};
pub use questionnaire::{compute_imc, compute_questionnaire_score};
pub use refresh::{RefreshDomain, RefreshHub};
pub use series::{bucket_by_iso_week, bucket_by_month_of_year};

/// Engine version embedded in persisted state and CLI output
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "coachscore";
