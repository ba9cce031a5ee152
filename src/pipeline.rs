//! Public API
//!
//! Stateless JSON entry points for each scoring operation, and the stateful
//! [`ScoreProcessor`] that remembers the last known questionnaire and index
//! so that a failed fetch still yields something to display.

use crate::activity_index::compute_activity_index_with;
use crate::banding::BandingTable;
use crate::config::EngineConfig;
use crate::error::ScoreError;
use crate::feed::{FeedPayloadAdapter, FetchOutcome, QuestionnaireFeedAdapter, SessionFeedAdapter};
use crate::history::TestHistory;
use crate::questionnaire::{coarse_percentage, compute_questionnaire_score, QuestionnaireAnswers};
use crate::refresh::{RefreshDomain, RefreshHub};
use crate::series::{bucket_by_iso_week_with, bucket_by_month_of_year_with};
use crate::types::{
    Gender, HealthTestResult, IndexOutcome, MonthBucket, QuestionnaireResult, SessionRecord,
    TestSlug, WeekBucket,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Input of [`activity_index_to_json`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityIndexRequest {
    #[serde(default)]
    pub questionnaire: Option<QuestionnaireResult>,
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
    /// Reference time, defaults to the current time
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
}

/// Output of [`activity_index_to_json`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityIndexResponse {
    pub activity_index: Option<f64>,
    pub computed_at: DateTime<Utc>,
}

/// Score a fitness test and return the submission body `{value, score, form}`.
///
/// # Example
/// ```ignore
/// let body = score_test_to_json("endurance", 640.0, 42, "F")?;
/// ```
pub fn score_test_to_json(
    test: &str,
    raw_value: f64,
    age: u32,
    gender: &str,
) -> Result<String, ScoreError> {
    let form = TestSlug::parse(test)?;
    let score = crate::banding::score_test_result(test, raw_value, age, gender)?;
    let submission = crate::types::TestSubmission {
        value: raw_value,
        score,
        form,
    };
    Ok(serde_json::to_string(&submission)?)
}

/// Score questionnaire answers given as a JSON object
pub fn questionnaire_to_json(answers_json: &str) -> Result<String, ScoreError> {
    let answers: QuestionnaireAnswers = serde_json::from_str(answers_json)?;
    let score = compute_questionnaire_score(&answers);
    Ok(serde_json::to_string(&score)?)
}

/// Compute the activity index from an [`ActivityIndexRequest`] JSON
pub fn activity_index_to_json(request_json: &str) -> Result<String, ScoreError> {
    let request: ActivityIndexRequest = serde_json::from_str(request_json)?;
    let now = request.now.unwrap_or_else(Utc::now);
    let activity_index = compute_activity_index_with(
        request.questionnaire.as_ref(),
        &request.sessions,
        now,
        &EngineConfig::default(),
    );
    Ok(serde_json::to_string(&ActivityIndexResponse {
        activity_index,
        computed_at: now,
    })?)
}

/// Weekly series for a month from a session feed JSON
pub fn weekly_series_to_json(
    sessions_json: &str,
    year: i32,
    month: u32,
) -> Result<String, ScoreError> {
    let sessions = SessionFeedAdapter.parse(sessions_json)?;
    let buckets = bucket_by_iso_week_with(&sessions, year, month, &EngineConfig::default())?;
    Ok(serde_json::to_string(&buckets)?)
}

/// Monthly series for a year from a session feed JSON
pub fn monthly_series_to_json(
    sessions_json: &str,
    year: i32,
    today: NaiveDate,
) -> Result<String, ScoreError> {
    let sessions = SessionFeedAdapter.parse(sessions_json)?;
    let buckets = bucket_by_month_of_year_with(&sessions, year, today, &EngineConfig::default())?;
    Ok(serde_json::to_string(&buckets)?)
}

/// Persisted processor state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorState {
    #[serde(default)]
    pub history: TestHistory,
    #[serde(default)]
    pub last_questionnaire: Option<QuestionnaireResult>,
    #[serde(default)]
    pub last_index: Option<LastIndex>,
}

/// Most recent successfully computed index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastIndex {
    pub value: f64,
    pub computed_at: DateTime<Utc>,
}

/// Stateful processor keeping test history and last known values.
///
/// Use this when results must survive failed fetches or app restarts.
pub struct ScoreProcessor {
    config: EngineConfig,
    table: BandingTable,
    state: ProcessorState,
    hub: Arc<RefreshHub>,
}

impl Default for ScoreProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreProcessor {
    /// Create a processor with the default configuration and tables
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            table: BandingTable::standard(),
            state: ProcessorState::default(),
            hub: Arc::new(RefreshHub::new()),
        }
    }

    /// Create a processor with a validated configuration and custom tables
    pub fn with_config(config: EngineConfig, table: BandingTable) -> Result<Self, ScoreError> {
        config.validate()?;
        table.validate()?;
        Ok(Self {
            config,
            table,
            ..Self::new()
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn table(&self) -> &BandingTable {
        &self.table
    }

    pub fn history(&self) -> &TestHistory {
        &self.state.history
    }

    pub fn last_index(&self) -> Option<LastIndex> {
        self.state.last_index
    }

    /// Hub on which the processor announces changes
    pub fn refresh_hub(&self) -> Arc<RefreshHub> {
        Arc::clone(&self.hub)
    }

    /// Score and record a fitness test
    pub fn record_test(
        &mut self,
        test: TestSlug,
        raw_value: f64,
        age: u32,
        gender: Gender,
        at: DateTime<Utc>,
    ) -> Result<HealthTestResult, ScoreError> {
        let result = self
            .state
            .history
            .record(&self.table, test, raw_value, age, gender, at)?;
        self.hub.publish(RefreshDomain::FormScan, at);
        Ok(result)
    }

    /// Record a test from the backend's string identifiers
    pub fn record_test_raw(
        &mut self,
        test: &str,
        raw_value: f64,
        age: u32,
        gender: &str,
        at: DateTime<Utc>,
    ) -> Result<HealthTestResult, ScoreError> {
        let test = TestSlug::parse(test)?;
        let gender = Gender::parse(gender)?;
        self.record_test(test, raw_value, age, gender, at)
    }

    /// Announce that the user's sessions changed (session finished, planned or deleted)
    pub fn sessions_changed(&self, at: DateTime<Utc>) {
        self.hub.publish(RefreshDomain::Training, at);
        self.hub.publish(RefreshDomain::ActivityScore, at);
    }

    /// Resolve the activity index from the outcome of the two backend fetches.
    ///
    /// - sessions fetched: computed index, using the fetched questionnaire or
    ///   the last known one if that fetch failed
    /// - sessions failed with a recent questionnaire: its coarse percentage
    /// - sessions failed otherwise: the last computed index, if any
    pub fn resolve_index(
        &mut self,
        questionnaire: FetchOutcome<Option<QuestionnaireResult>>,
        sessions: FetchOutcome<Vec<SessionRecord>>,
        now: DateTime<Utc>,
    ) -> IndexOutcome {
        match questionnaire {
            FetchOutcome::Fetched(latest) => self.state.last_questionnaire = latest,
            FetchOutcome::Failed(reason) => {
                warn!(%reason, "questionnaire fetch failed, using last known result");
            }
        }
        let questionnaire = self.state.last_questionnaire.as_ref();

        let outcome = match sessions {
            FetchOutcome::Fetched(sessions) => {
                match compute_activity_index_with(questionnaire, &sessions, now, &self.config) {
                    Some(value) => {
                        self.state.last_index = Some(LastIndex {
                            value,
                            computed_at: now,
                        });
                        IndexOutcome::Computed { value }
                    }
                    None => IndexOutcome::NoData,
                }
            }
            FetchOutcome::Failed(reason) => {
                warn!(%reason, "session fetch failed, falling back");
                let recent = questionnaire.filter(|q| {
                    Duration::try_days(self.config.decay_window_days)
                        .map_or(true, |window| now - q.created_at < window)
                });
                match (recent, self.state.last_index) {
                    (Some(q), _) => {
                        let max_score = self.config.questionnaire_max_score;
                        IndexOutcome::QuestionnaireFallback {
                            value: coarse_percentage(q.total_score, max_score),
                        }
                    }
                    (None, Some(last)) => IndexOutcome::LastKnown {
                        value: last.value,
                        computed_at: last.computed_at,
                    },
                    (None, None) => IndexOutcome::NoData,
                }
            }
        };

        debug!(?outcome, "resolved activity index");
        if outcome != IndexOutcome::NoData {
            self.hub.publish(RefreshDomain::ActivityScore, now);
        }
        outcome
    }

    /// Resolve the index from raw response bodies; `None` marks a failed fetch
    pub fn resolve_index_json(
        &mut self,
        questionnaire_json: Option<&str>,
        sessions_json: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<IndexOutcome, ScoreError> {
        let questionnaire = match questionnaire_json {
            Some(json) => FetchOutcome::Fetched(QuestionnaireFeedAdapter.parse(json)?),
            None => FetchOutcome::Failed("questionnaire unavailable".to_string()),
        };
        let sessions = match sessions_json {
            Some(json) => FetchOutcome::Fetched(SessionFeedAdapter.parse(json)?),
            None => FetchOutcome::Failed("sessions unavailable".to_string()),
        };
        Ok(self.resolve_index(questionnaire, sessions, now))
    }

    /// Weekly series with this processor's configuration
    pub fn weekly_series(
        &self,
        sessions: &[SessionRecord],
        year: i32,
        month: u32,
    ) -> Result<Vec<WeekBucket>, ScoreError> {
        bucket_by_iso_week_with(sessions, year, month, &self.config)
    }

    /// Monthly series with this processor's configuration
    pub fn monthly_series(
        &self,
        sessions: &[SessionRecord],
        year: i32,
        today: NaiveDate,
    ) -> Result<Vec<MonthBucket>, ScoreError> {
        bucket_by_month_of_year_with(sessions, year, today, &self.config)
    }

    /// Load persisted state from JSON
    pub fn load_state(&mut self, json: &str) -> Result<(), ScoreError> {
        self.state =
            serde_json::from_str(json).map_err(|e| ScoreError::ParseError(e.to_string()))?;
        Ok(())
    }

    /// Save state to JSON
    pub fn save_state(&self) -> Result<String, ScoreError> {
        Ok(serde_json::to_string(&self.state)?)
    }
}
