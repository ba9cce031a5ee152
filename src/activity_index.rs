//! Activity index aggregation
//!
//! The activity index (0-100) blends two contributions:
//!
//! - a baseline from the latest questionnaire, fading linearly to zero over
//!   the decay window
//! - the weighted minutes of finished sessions in the rolling window
//!   `[now - window, now + lookahead)`
//!
//! Session minutes are weighted by a mood coefficient that stands in for
//! exercise intensity.

use crate::config::EngineConfig;
use crate::types::{QuestionnaireResult, SessionRecord};
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Intensity weight for a perceived-effort rating (1-4), 0 for anything else
pub fn mood_coefficient(mood: u8) -> f64 {
    match mood {
        1 => 0.12495,
        2 => 0.249975,
        3 => 0.4995,
        4 => 0.6,
        _ => 0.0,
    }
}

/// Weighted minutes contributed by one session
///
/// Planned sessions and sessions without a mood or duration contribute 0.
pub fn session_load(session: &SessionRecord) -> f64 {
    if !session.is_finished() {
        return 0.0;
    }
    match (session.mood, session.real_duration) {
        (Some(mood), Some(seconds)) if seconds.is_finite() && seconds > 0.0 => {
            mood_coefficient(mood) * seconds / 60.0
        }
        _ => 0.0,
    }
}

/// Questionnaire contribution after linear decay
pub fn decayed_baseline(
    questionnaire: Option<&QuestionnaireResult>,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> f64 {
    let Some(q) = questionnaire else {
        return 0.0;
    };

    let window = config.decay_window_days as f64;
    let age_seconds = (now - q.created_at).num_milliseconds() as f64 / 1000.0;
    let age_days = (age_seconds / SECONDS_PER_DAY).max(0.0);
    if age_days >= window {
        return 0.0;
    }
    q.total_score as f64 * (window - age_days) / window
}

/// Start and exclusive end of the rolling session window.
///
/// Bounds beyond the representable range saturate at the earliest and latest
/// timestamps.
pub fn session_window(
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Duration::try_days(config.session_window_days)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    let end = Duration::try_days(config.lookahead_days)
        .and_then(|lookahead| now.checked_add_signed(lookahead))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    (start, end)
}

/// Compute the activity index with the default configuration.
///
/// `sessions` is the user's finished-session history (anything older than the
/// window only tells "has trained before" from "never trained").
///
/// Returns `None` when the user has no finished session in or before the
/// window, otherwise a value in `[0, 100]`.
pub fn compute_activity_index(
    questionnaire: Option<&QuestionnaireResult>,
    sessions: &[SessionRecord],
    now: DateTime<Utc>,
) -> Option<f64> {
    compute_activity_index_with(questionnaire, sessions, now, &EngineConfig::default())
}

/// Compute the activity index with an explicit configuration
pub fn compute_activity_index_with(
    questionnaire: Option<&QuestionnaireResult>,
    sessions: &[SessionRecord],
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Option<f64> {
    let (window_start, window_end) = session_window(now, config);

    let mut in_window = 0usize;
    let mut earlier = 0usize;
    let mut session_total = 0.0;

    for session in sessions.iter().filter(|s| s.is_finished()) {
        if session.date < window_start {
            earlier += 1;
        } else if session.date < window_end {
            in_window += 1;
            session_total += session_load(session);
        }
    }

    if in_window == 0 && earlier == 0 {
        debug!("no finished sessions, activity index unavailable");
        return None;
    }

    let baseline = decayed_baseline(questionnaire, now, config);
    let index = config.clamp_index(baseline + session_total);
    debug!(
        baseline,
        session_total,
        in_window,
        earlier,
        index,
        "computed activity index"
    );
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn questionnaire(total_score: i64, age: Duration) -> QuestionnaireResult {
        QuestionnaireResult {
            total_score,
            created_at: now() - age,
        }
    }

    #[test]
    fn test_mood_coefficients() {
        assert_eq!(mood_coefficient(1), 0.12495);
        assert_eq!(mood_coefficient(2), 0.249975);
        assert_eq!(mood_coefficient(3), 0.4995);
        assert_eq!(mood_coefficient(4), 0.6);
        assert_eq!(mood_coefficient(0), 0.0);
        assert_eq!(mood_coefficient(5), 0.0);
    }

    #[test]
    fn test_decay_halfway() {
        let q = questionnaire(45, Duration::hours(84));
        let baseline = decayed_baseline(Some(&q), now(), &EngineConfig::default());
        assert!((baseline - 22.5).abs() < 1e-9);
    }

    #[test]
    fn test_decay_window_edges() {
        let config = EngineConfig::default();
        let fresh = questionnaire(30, Duration::zero());
        assert!((decayed_baseline(Some(&fresh), now(), &config) - 30.0).abs() < 1e-9);

        let expired = questionnaire(30, Duration::days(7));
        assert_eq!(decayed_baseline(Some(&expired), now(), &config), 0.0);

        let future = questionnaire(30, -Duration::hours(5));
        assert!((decayed_baseline(Some(&future), now(), &config) - 30.0).abs() < 1e-9);

        assert_eq!(decayed_baseline(None, now(), &config), 0.0);
    }

    #[test]
    fn test_mood_weight_linearity() {
        let sessions = vec![
            SessionRecord::finished(now() - Duration::days(1), 3, 600.0),
            SessionRecord::finished(now() - Duration::days(2), 3, 600.0),
        ];
        assert!((session_load(&sessions[0]) - 4.995).abs() < 1e-9);

        let index = compute_activity_index(None, &sessions, now()).unwrap();
        assert!((index - 9.99).abs() < 1e-9);
    }

    #[test]
    fn test_never_trained_is_none() {
        assert_eq!(compute_activity_index(None, &[], now()), None);

        // A questionnaire alone does not make an index
        let q = questionnaire(40, Duration::days(1));
        assert_eq!(compute_activity_index(Some(&q), &[], now()), None);

        // Planned sessions do not count as training
        let planned = vec![SessionRecord::planned(now() - Duration::days(20))];
        assert_eq!(compute_activity_index(None, &planned, now()), None);
    }

    #[test]
    fn test_old_sessions_only_gives_baseline() {
        let sessions = vec![SessionRecord::finished(now() - Duration::days(12), 4, 3600.0)];
        assert_eq!(compute_activity_index(None, &sessions, now()), Some(0.0));

        let q = questionnaire(45, Duration::hours(84));
        let index = compute_activity_index(Some(&q), &sessions, now()).unwrap();
        assert!((index - 22.5).abs() < 1e-9);
    }

    #[test]
    fn test_window_bounds() {
        let sessions = vec![
            // exactly at the window start: counted
            SessionRecord::finished(now() - Duration::days(7), 4, 600.0),
            // inside the look-ahead day: counted
            SessionRecord::finished(now() + Duration::hours(23), 4, 600.0),
            // at the exclusive end: ignored
            SessionRecord::finished(now() + Duration::days(1), 4, 600.0),
        ];
        let index = compute_activity_index(None, &sessions, now()).unwrap();
        assert!((index - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_index_is_clamped() {
        let sessions: Vec<SessionRecord> = (0..7)
            .map(|d| SessionRecord::finished(now() - Duration::days(d), 4, 7200.0))
            .collect();
        let q = questionnaire(45, Duration::zero());
        assert_eq!(compute_activity_index(Some(&q), &sessions, now()), Some(100.0));
    }

    #[test]
    fn test_index_always_in_range() {
        for mood in 0..=5u8 {
            for minutes in [0.0, 1.0, 30.0, 90.0, 600.0] {
                for total in [0, 20, 45] {
                    let sessions = vec![
                        SessionRecord::finished(now() - Duration::days(3), mood, minutes * 60.0),
                        SessionRecord::finished(now() - Duration::days(30), mood, minutes * 60.0),
                    ];
                    let q = questionnaire(total, Duration::days(2));
                    let index = compute_activity_index(Some(&q), &sessions, now()).unwrap();
                    assert!((0.0..=100.0).contains(&index));
                }
            }
        }
    }

    #[test]
    fn test_custom_window() {
        let config = EngineConfig {
            session_window_days: 14,
            ..EngineConfig::default()
        };
        let sessions = vec![SessionRecord::finished(now() - Duration::days(10), 3, 600.0)];
        let index = compute_activity_index_with(None, &sessions, now(), &config).unwrap();
        assert!((index - 4.995).abs() < 1e-9);
    }

    #[test]
    fn test_unrepresentable_window_saturates() {
        let config = EngineConfig {
            session_window_days: i64::MAX,
            lookahead_days: i64::MAX,
            ..EngineConfig::default()
        };
        let (start, end) = session_window(now(), &config);
        assert_eq!(start, DateTime::<Utc>::MIN_UTC);
        assert_eq!(end, DateTime::<Utc>::MAX_UTC);

        assert_eq!(compute_activity_index_with(None, &[], now(), &config), None);
        let sessions = vec![SessionRecord::finished(now() - Duration::days(100), 4, 600.0)];
        let index = compute_activity_index_with(None, &sessions, now(), &config).unwrap();
        assert!((index - 6.0).abs() < 1e-9);
    }
}
