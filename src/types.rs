//! Core types for the Coach Score engine
//!
//! This module defines the records consumed by the engine (sessions,
//! questionnaire results, fitness-test results) and the values it produces
//! (questionnaire scores, activity-index outcomes, chart buckets).

use crate::error::ScoreError;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Biological sex used to select a banding table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
        }
    }

    /// Parse the backend's one-letter gender code
    pub fn parse(s: &str) -> Result<Self, ScoreError> {
        match s.trim() {
            "M" => Ok(Gender::Male),
            "F" => Ok(Gender::Female),
            other => Err(ScoreError::UnsupportedGender(other.to_string())),
        }
    }
}

/// Fitness test identifier, as stored in the `form` field of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestSlug {
    /// Single-leg balance, seconds held
    Equilibre,
    /// Flexibility, qualitative level picked by the user
    Souplesse,
    /// Arm strength, repetitions
    ForceBras,
    /// Leg strength, repetitions
    ForceJambes,
    /// Endurance walk, meters
    Endurance,
}

impl TestSlug {
    pub const ALL: [TestSlug; 5] = [
        TestSlug::Equilibre,
        TestSlug::Souplesse,
        TestSlug::ForceBras,
        TestSlug::ForceJambes,
        TestSlug::Endurance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestSlug::Equilibre => "equilibre",
            TestSlug::Souplesse => "souplesse",
            TestSlug::ForceBras => "force-bras",
            TestSlug::ForceJambes => "force-jambes",
            TestSlug::Endurance => "endurance",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ScoreError> {
        Self::ALL
            .into_iter()
            .find(|slug| slug.as_str() == s.trim())
            .ok_or_else(|| ScoreError::UnknownTest(s.to_string()))
    }

    /// Unit of the raw value entered for this test
    pub fn unit(&self) -> &'static str {
        match self {
            TestSlug::Equilibre => "seconds",
            TestSlug::Souplesse => "level",
            TestSlug::ForceBras | TestSlug::ForceJambes => "repetitions",
            TestSlug::Endurance => "meters",
        }
    }

    /// Whether the score comes from a qualitative picker rather than banding
    pub fn is_qualitative(&self) -> bool {
        matches!(self, TestSlug::Souplesse)
    }
}

/// Body sent to the backend when a fitness test is submitted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSubmission {
    pub value: f64,
    pub score: u8,
    pub form: TestSlug,
}

/// One scored fitness-test submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthTestResult {
    pub id: String,
    pub form: TestSlug,
    /// Raw value entered by the user, unit depends on `form`
    pub value: f64,
    /// Banded score, 1-5
    pub score: u8,
    pub created_at: DateTime<Utc>,
}

impl HealthTestResult {
    pub fn submission(&self) -> TestSubmission {
        TestSubmission {
            value: self.value,
            score: self.score,
            form: self.form,
        }
    }
}

/// Lifecycle state of a calendar element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Planned,
    Finished,
}

/// A scheduled or completed training session (calendar element)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(deserialize_with = "deserialize_flexible_datetime")]
    pub date: DateTime<Utc>,
    pub state: SessionState,
    /// Perceived effort, 1-4
    #[serde(default)]
    pub mood: Option<u8>,
    /// Duration in seconds, present once finished
    #[serde(default)]
    pub real_duration: Option<f64>,
}

impl SessionRecord {
    /// Create a finished session
    pub fn finished(date: DateTime<Utc>, mood: u8, real_duration_sec: f64) -> Self {
        Self {
            date,
            state: SessionState::Finished,
            mood: Some(mood),
            real_duration: Some(real_duration_sec),
        }
    }

    /// Create a planned session
    pub fn planned(date: DateTime<Utc>) -> Self {
        Self {
            date,
            state: SessionState::Planned,
            mood: None,
            real_duration: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state == SessionState::Finished
    }
}

/// Latest questionnaire submission as returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireResult {
    pub total_score: i64,
    #[serde(deserialize_with = "deserialize_flexible_datetime")]
    pub created_at: DateTime<Utc>,
}

/// Lifestyle category of a questionnaire question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Sedentary,
    Leisure,
    Daily,
}

/// Activity band derived from the questionnaire total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionnaireBand {
    #[serde(rename = "Inactif")]
    Inactive,
    #[serde(rename = "Actif")]
    Active,
    #[serde(rename = "Très Actif")]
    VeryActive,
}

impl QuestionnaireBand {
    pub fn label(&self) -> &'static str {
        match self {
            QuestionnaireBand::Inactive => "Inactif",
            QuestionnaireBand::Active => "Actif",
            QuestionnaireBand::VeryActive => "Très Actif",
        }
    }
}

/// Body mass index, or "N/A" when it cannot be computed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Imc {
    Value(f64),
    NotAvailable,
}

impl Imc {
    pub fn value(&self) -> Option<f64> {
        match self {
            Imc::Value(v) => Some(*v),
            Imc::NotAvailable => None,
        }
    }
}

impl Serialize for Imc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Imc::Value(v) => serializer.serialize_f64(*v),
            Imc::NotAvailable => serializer.serialize_str("N/A"),
        }
    }
}

impl<'de> Deserialize<'de> for Imc {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Ok(Imc::Value(v)),
            Raw::Text(s) if s == "N/A" => Ok(Imc::NotAvailable),
            Raw::Text(s) => Err(serde::de::Error::custom(format!("invalid imc: {s}"))),
        }
    }
}

/// Result of scoring a completed questionnaire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionnaireScore {
    pub total_score: i64,
    pub band: QuestionnaireBand,
    pub imc: Imc,
    /// Subtotals for the questions of the standard battery
    pub by_category: BTreeMap<QuestionCategory, i64>,
}

/// One Monday-to-Sunday bucket of the weekly series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekBucket {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub activity_index: f64,
}

/// One calendar month of the yearly series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthBucket {
    /// `YYYY-MM`
    pub month: String,
    pub activity_index: f64,
}

/// Activity index as resolved by the processor, tagged with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexOutcome {
    /// Computed from freshly fetched sessions
    Computed { value: f64 },
    /// Sessions unavailable; coarse percentage of a recent questionnaire
    QuestionnaireFallback { value: f64 },
    /// Sessions unavailable; last index successfully computed
    LastKnown {
        value: f64,
        computed_at: DateTime<Utc>,
    },
    /// Nothing to show yet
    NoData,
}

impl IndexOutcome {
    pub fn value(&self) -> Option<f64> {
        match self {
            IndexOutcome::Computed { value }
            | IndexOutcome::QuestionnaireFallback { value }
            | IndexOutcome::LastKnown { value, .. } => Some(*value),
            IndexOutcome::NoData => None,
        }
    }
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC)
pub fn parse_flexible_datetime(s: &str) -> Result<DateTime<Utc>, ScoreError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .map_err(|e| ScoreError::DateParseError(format!("{s}: {e}")))
}

fn deserialize_flexible_datetime<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_flexible_datetime(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_gender_parse() {
        assert_eq!(Gender::parse("M").unwrap(), Gender::Male);
        assert_eq!(Gender::parse("F").unwrap(), Gender::Female);
        assert!(matches!(
            Gender::parse("X"),
            Err(ScoreError::UnsupportedGender(_))
        ));
    }

    #[test]
    fn test_slug_roundtrip_names() {
        for slug in TestSlug::ALL {
            assert_eq!(TestSlug::parse(slug.as_str()).unwrap(), slug);
        }
        assert!(TestSlug::parse("natation").is_err());

        let json = serde_json::to_string(&TestSlug::ForceJambes).unwrap();
        assert_eq!(json, "\"force-jambes\"");
    }

    #[test]
    fn test_imc_serialization() {
        assert_eq!(serde_json::to_string(&Imc::Value(25.3)).unwrap(), "25.3");
        assert_eq!(serde_json::to_string(&Imc::NotAvailable).unwrap(), "\"N/A\"");

        let imc: Imc = serde_json::from_str("\"N/A\"").unwrap();
        assert_eq!(imc, Imc::NotAvailable);
        assert!(serde_json::from_str::<Imc>("\"abc\"").is_err());
    }

    #[test]
    fn test_session_deserialization() {
        let json = r#"{"date": "2025-03-04", "state": "finished", "mood": 3, "realDuration": 600}"#;
        let session: SessionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(session.date, Utc.with_ymd_and_hms(2025, 3, 4, 0, 0, 0).unwrap());
        assert!(session.is_finished());
        assert_eq!(session.real_duration, Some(600.0));

        let json = r#"{"date": "2025-03-04T18:30:00+02:00", "state": "planned"}"#;
        let session: SessionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(session.date, Utc.with_ymd_and_hms(2025, 3, 4, 16, 30, 0).unwrap());
        assert_eq!(session.mood, None);
    }

    #[test]
    fn test_band_labels_serialize_in_french() {
        let json = serde_json::to_string(&QuestionnaireBand::VeryActive).unwrap();
        assert_eq!(json, "\"Très Actif\"");
        assert_eq!(QuestionnaireBand::Inactive.label(), "Inactif");
    }

    #[test]
    fn test_index_outcome_value() {
        assert_eq!(IndexOutcome::Computed { value: 12.0 }.value(), Some(12.0));
        assert_eq!(IndexOutcome::NoData.value(), None);

        let json = serde_json::to_value(IndexOutcome::NoData).unwrap();
        assert_eq!(json["status"], "no_data");
    }
}
