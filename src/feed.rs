//! Backend feed adapters
//!
//! Parses the REST payloads the coaching backend returns (calendar sessions,
//! questionnaire submissions) into engine records, and models the outcome of
//! a fetch so that "the request failed" is never confused with "the request
//! returned nothing".

use crate::error::ScoreError;
use crate::types::{QuestionnaireResult, SessionRecord};
use serde::Deserialize;
use std::fmt::Display;
use tracing::warn;

/// Result of fetching a record set from the backend
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    /// The request succeeded; the value may still be empty
    Fetched(T),
    /// The request failed for the given reason
    Failed(String),
}

impl<T> FetchOutcome<T> {
    /// Wrap a fetch result, logging failures
    pub fn from_result<E: Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => FetchOutcome::Fetched(value),
            Err(e) => {
                warn!(error = %e, "backend fetch failed");
                FetchOutcome::Failed(e.to_string())
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FetchOutcome::Failed(_))
    }

    pub fn fetched(self) -> Option<T> {
        match self {
            FetchOutcome::Fetched(value) => Some(value),
            FetchOutcome::Failed(_) => None,
        }
    }

    pub fn as_ref(&self) -> FetchOutcome<&T> {
        match self {
            FetchOutcome::Fetched(value) => FetchOutcome::Fetched(value),
            FetchOutcome::Failed(reason) => FetchOutcome::Failed(reason.clone()),
        }
    }

    /// Convert into a `Result`, turning a failure into [`ScoreError::FetchFailed`]
    pub fn into_result(self) -> Result<T, ScoreError> {
        match self {
            FetchOutcome::Fetched(value) => Ok(value),
            FetchOutcome::Failed(reason) => Err(ScoreError::FetchFailed(reason)),
        }
    }
}

/// Trait for backend payload adapters
pub trait FeedPayloadAdapter {
    type Output;

    /// Parse a raw JSON response body
    fn parse(&self, raw_json: &str) -> Result<Self::Output, ScoreError>;
}

/// Adapter for the calendar query (`{"results": [{date, mood, realDuration, state}]}`)
pub struct SessionFeedAdapter;

/// Adapter for the latest questionnaire submission
pub struct QuestionnaireFeedAdapter;

#[derive(Deserialize)]
#[serde(untagged)]
enum SessionPayload {
    Envelope { results: Vec<SessionRecord> },
    List(Vec<SessionRecord>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QuestionnairePayload {
    Envelope { results: Vec<QuestionnaireResult> },
    Single(QuestionnaireResult),
}

impl FeedPayloadAdapter for SessionFeedAdapter {
    type Output = Vec<SessionRecord>;

    fn parse(&self, raw_json: &str) -> Result<Vec<SessionRecord>, ScoreError> {
        let payload: SessionPayload = serde_json::from_str(raw_json).map_err(|e| {
            ScoreError::ParseError(format!("session feed: {e}"))
        })?;

        let mut sessions = match payload {
            SessionPayload::Envelope { results } => results,
            SessionPayload::List(list) => list,
        };
        sessions.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(sessions)
    }
}

impl FeedPayloadAdapter for QuestionnaireFeedAdapter {
    type Output = Option<QuestionnaireResult>;

    fn parse(&self, raw_json: &str) -> Result<Option<QuestionnaireResult>, ScoreError> {
        if raw_json.trim() == "null" {
            return Ok(None);
        }
        let payload: QuestionnairePayload = serde_json::from_str(raw_json).map_err(|e| {
            ScoreError::ParseError(format!("questionnaire feed: {e}"))
        })?;

        Ok(match payload {
            QuestionnairePayload::Single(result) => Some(result),
            QuestionnairePayload::Envelope { results } => {
                results.into_iter().max_by_key(|r| r.created_at)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionState;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_parse_session_envelope() {
        let json = r#"{
            "results": [
                {"date": "2025-06-12T10:00:00Z", "mood": 3, "realDuration": 1800,
                 "state": "finished"},
                {"date": "2025-06-10", "mood": 2, "realDuration": 900, "state": "finished"},
                {"date": "2025-06-20T08:00:00Z", "state": "planned"}
            ]
        }"#;
        let sessions = SessionFeedAdapter.parse(json).unwrap();

        assert_eq!(sessions.len(), 3);
        assert_eq!(sessions[0].date, Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap());
        assert_eq!(sessions[2].state, SessionState::Planned);
        assert_eq!(sessions[1].real_duration, Some(1800.0));
    }

    #[test]
    fn test_parse_session_list_and_empty() {
        let sessions = SessionFeedAdapter.parse("[]").unwrap();
        assert!(sessions.is_empty());

        let sessions = SessionFeedAdapter.parse(r#"{"results": []}"#).unwrap();
        assert!(sessions.is_empty());
    }

    #[test]
    fn test_parse_session_errors() {
        assert!(SessionFeedAdapter.parse("not json").is_err());
        assert!(SessionFeedAdapter
            .parse(r#"{"results": [{"date": "yesterday", "state": "finished"}]}"#)
            .is_err());
    }

    #[test]
    fn test_parse_questionnaire() {
        let single = QuestionnaireFeedAdapter
            .parse(r#"{"totalScore": 28, "createdAt": "2025-06-11T09:00:00Z"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(single.total_score, 28);

        let latest = QuestionnaireFeedAdapter
            .parse(
                r#"{"results": [
                    {"totalScore": 20, "createdAt": "2025-05-01T09:00:00Z"},
                    {"totalScore": 31, "createdAt": "2025-06-01T09:00:00Z"},
                    {"totalScore": 12, "createdAt": "2025-04-01T09:00:00Z"}
                ]}"#,
            )
            .unwrap()
            .unwrap();
        assert_eq!(latest.total_score, 31);

        assert_eq!(QuestionnaireFeedAdapter.parse(r#"{"results": []}"#).unwrap(), None);
        assert_eq!(QuestionnaireFeedAdapter.parse("null").unwrap(), None);
    }

    #[test]
    fn test_fetch_outcome() {
        let ok: FetchOutcome<Vec<u8>> = FetchOutcome::from_result(Ok::<_, String>(vec![]));
        assert!(!ok.is_failed());
        assert_eq!(ok.fetched(), Some(vec![]));

        let failed: FetchOutcome<Vec<u8>> =
            FetchOutcome::from_result(Err::<Vec<u8>, _>("timeout"));
        assert!(failed.is_failed());
        assert!(matches!(failed.into_result(), Err(ScoreError::FetchFailed(_))));
    }
}
