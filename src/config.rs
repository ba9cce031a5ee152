//! Engine configuration
//!
//! Windows and normalization constants used by the activity-index and series
//! computations. The defaults are the calibrated values used in production;
//! a JSON file can override any subset of them.

use crate::error::ScoreError;
use serde::{Deserialize, Serialize};

/// Default questionnaire decay window in days
pub const DEFAULT_DECAY_WINDOW_DAYS: i64 = 7;

/// Default rolling session window in days
pub const DEFAULT_SESSION_WINDOW_DAYS: i64 = 7;

/// Sessions up to this many days ahead of `now` still count (timezone slack)
pub const DEFAULT_LOOKAHEAD_DAYS: i64 = 1;

/// Maximum attainable questionnaire score (9 questions x 5 points)
pub const DEFAULT_QUESTIONNAIRE_MAX_SCORE: f64 = 45.0;

/// Upper bound of every activity index
pub const DEFAULT_INDEX_CEILING: f64 = 100.0;

/// Longest window, in days, a configuration may ask for
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Tunable constants for the scoring engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Days over which a questionnaire's contribution fades to zero
    pub decay_window_days: i64,
    /// Days of finished sessions counted before `now`
    pub session_window_days: i64,
    /// Days after `now` still counted in the session window
    pub lookahead_days: i64,
    /// Denominator of the coarse questionnaire percentage
    pub questionnaire_max_score: f64,
    /// Activity indices are clamped to `[0, index_ceiling]`
    pub index_ceiling: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decay_window_days: DEFAULT_DECAY_WINDOW_DAYS,
            session_window_days: DEFAULT_SESSION_WINDOW_DAYS,
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
            questionnaire_max_score: DEFAULT_QUESTIONNAIRE_MAX_SCORE,
            index_ceiling: DEFAULT_INDEX_CEILING,
        }
    }
}

impl EngineConfig {
    /// Load and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ScoreError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, ScoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values that would make the formulas meaningless
    pub fn validate(&self) -> Result<(), ScoreError> {
        check_window("decay_window_days", self.decay_window_days, 1)?;
        check_window("session_window_days", self.session_window_days, 1)?;
        check_window("lookahead_days", self.lookahead_days, 0)?;
        if !(self.questionnaire_max_score > 0.0) {
            return Err(ScoreError::Configuration(format!(
                "questionnaire_max_score must be positive, got {}",
                self.questionnaire_max_score
            )));
        }
        if !(self.index_ceiling > 0.0) {
            return Err(ScoreError::Configuration(format!(
                "index_ceiling must be positive, got {}",
                self.index_ceiling
            )));
        }
        Ok(())
    }

    /// Clamp a raw index to `[0, index_ceiling]`
    pub fn clamp_index(&self, value: f64) -> f64 {
        if value.is_nan() {
            return 0.0;
        }
        value.clamp(0.0, self.index_ceiling)
    }
}

fn check_window(name: &str, days: i64, min: i64) -> Result<(), ScoreError> {
    if !(min..=MAX_WINDOW_DAYS).contains(&days) {
        return Err(ScoreError::Configuration(format!(
            "{name} must be between {min} and {MAX_WINDOW_DAYS}, got {days}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_json(r#"{"session_window_days": 14}"#).unwrap();
        assert_eq!(config.session_window_days, 14);
        assert_eq!(config.decay_window_days, DEFAULT_DECAY_WINDOW_DAYS);
        assert_eq!(config.index_ceiling, DEFAULT_INDEX_CEILING);
    }

    #[test]
    fn test_rejects_non_positive_window() {
        let err = EngineConfig::from_json(r#"{"decay_window_days": 0}"#).unwrap_err();
        assert!(matches!(err, ScoreError::Configuration(_)));
    }

    #[test]
    fn test_rejects_oversized_windows() {
        for json in [
            r#"{"session_window_days": 9223372036854775807}"#,
            r#"{"decay_window_days": 3651}"#,
            r#"{"lookahead_days": 9223372036854775807}"#,
            r#"{"lookahead_days": -1}"#,
        ] {
            let err = EngineConfig::from_json(json).unwrap_err();
            assert!(matches!(err, ScoreError::Configuration(_)), "{json}");
        }

        let longest = EngineConfig::from_json(r#"{"session_window_days": 3650}"#).unwrap();
        assert_eq!(longest.session_window_days, MAX_WINDOW_DAYS);
    }

    #[test]
    fn test_clamp_index() {
        let config = EngineConfig::default();
        assert_eq!(config.clamp_index(-3.0), 0.0);
        assert_eq!(config.clamp_index(250.0), 100.0);
        assert_eq!(config.clamp_index(f64::NAN), 0.0);
        assert_eq!(config.clamp_index(42.5), 42.5);
    }
}
