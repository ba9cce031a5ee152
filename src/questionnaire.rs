//! Health questionnaire scoring
//!
//! Scores a completed lifestyle questionnaire: total of the 1-5 answers, the
//! resulting activity band, and the body mass index from the two personal
//! measurements recorded alongside the answers.

use crate::types::{Imc, QuestionCategory, QuestionnaireBand, QuestionnaireScore};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Answers keyed by question id; measurements live under [`WEIGHT_KEY`] and [`HEIGHT_KEY`]
pub type QuestionnaireAnswers = BTreeMap<String, Value>;

/// Key of the weight measurement (kg)
pub const WEIGHT_KEY: &str = "weight";

/// Key of the height measurement (cm)
pub const HEIGHT_KEY: &str = "height";

/// Highest answer that counts toward the total
pub const MAX_ANSWER: f64 = 5.0;

/// Totals below this are "Inactif"
pub const ACTIVE_THRESHOLD: i64 = 18;

/// Totals above this are "Très Actif"
pub const VERY_ACTIVE_THRESHOLD: i64 = 35;

/// A question of the standard battery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    pub id: &'static str,
    pub category: QuestionCategory,
}

/// The nine lifestyle questions
pub const QUESTION_BATTERY: [Question; 9] = [
    Question {
        id: "A1",
        category: QuestionCategory::Sedentary,
    },
    Question {
        id: "A2",
        category: QuestionCategory::Sedentary,
    },
    Question {
        id: "A3",
        category: QuestionCategory::Sedentary,
    },
    Question {
        id: "B1",
        category: QuestionCategory::Leisure,
    },
    Question {
        id: "B2",
        category: QuestionCategory::Leisure,
    },
    Question {
        id: "B3",
        category: QuestionCategory::Leisure,
    },
    Question {
        id: "C1",
        category: QuestionCategory::Daily,
    },
    Question {
        id: "C2",
        category: QuestionCategory::Daily,
    },
    Question {
        id: "C3",
        category: QuestionCategory::Daily,
    },
];

/// Score a completed questionnaire.
///
/// Only numeric answers `<= 5` are summed, which keeps the weight and height
/// measurements out of the total.
pub fn compute_questionnaire_score(answers: &QuestionnaireAnswers) -> QuestionnaireScore {
    let total: f64 = answers.values().filter_map(countable_answer).sum();
    let total_score = total.round() as i64;

    let mut by_category = BTreeMap::new();
    for question in &QUESTION_BATTERY {
        let points = answers
            .get(question.id)
            .and_then(countable_answer)
            .unwrap_or(0.0);
        *by_category.entry(question.category).or_insert(0.0) += points;
    }
    let by_category = by_category
        .into_iter()
        .map(|(category, points)| (category, points.round() as i64))
        .collect();

    let imc = compute_imc(
        answers.get(WEIGHT_KEY).and_then(Value::as_f64),
        answers.get(HEIGHT_KEY).and_then(Value::as_f64),
    );

    let band = band_for_total(total_score);
    debug!(total_score, band = band.label(), "scored questionnaire");

    QuestionnaireScore {
        total_score,
        band,
        imc,
        by_category,
    }
}

fn countable_answer(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| *v <= MAX_ANSWER)
}

/// Activity band for a questionnaire total
pub fn band_for_total(total_score: i64) -> QuestionnaireBand {
    if total_score < ACTIVE_THRESHOLD {
        QuestionnaireBand::Inactive
    } else if total_score <= VERY_ACTIVE_THRESHOLD {
        QuestionnaireBand::Active
    } else {
        QuestionnaireBand::VeryActive
    }
}

/// Body mass index rounded to one decimal, "N/A" without a usable weight and height
pub fn compute_imc(weight_kg: Option<f64>, height_cm: Option<f64>) -> Imc {
    match (weight_kg, height_cm) {
        (Some(weight), Some(height)) if weight > 0.0 && height > 0.0 => {
            let meters = height / 100.0;
            let imc = weight / (meters * meters);
            if imc.is_finite() {
                Imc::Value((imc * 10.0).round() / 10.0)
            } else {
                Imc::NotAvailable
            }
        }
        _ => Imc::NotAvailable,
    }
}

/// Questionnaire total as a percentage of the maximum attainable score.
///
/// Used when no session data can be fetched.
pub fn coarse_percentage(total_score: i64, max_score: f64) -> f64 {
    if max_score <= 0.0 {
        return 0.0;
    }
    (total_score as f64 / max_score * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn answers(value: Value) -> QuestionnaireAnswers {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_measurements_excluded_from_total() {
        let score = compute_questionnaire_score(&answers(json!({
            "A1": 5,
            "weight": 80,
            "height": 178
        })));

        assert_eq!(score.total_score, 5);
        assert_eq!(score.band, QuestionnaireBand::Inactive);
        assert_eq!(score.imc, Imc::Value(25.2));
    }

    #[test]
    fn test_imc_rounding() {
        // 80 / 1.78^2 = 25.249...
        let imc = compute_imc(Some(80.0), Some(178.0)).value().unwrap();
        assert!((imc - 25.2).abs() < 1e-9);
        assert!((imc - 80.0 / (1.78 * 1.78)).abs() < 0.1);

        assert_eq!(compute_imc(Some(70.0), Some(175.0)), Imc::Value(22.9));
    }

    #[test]
    fn test_imc_guards() {
        let score = compute_questionnaire_score(&answers(json!({"weight": 0, "height": 170})));
        assert_eq!(score.imc, Imc::NotAvailable);

        assert_eq!(compute_imc(Some(70.0), Some(0.0)), Imc::NotAvailable);
        assert_eq!(compute_imc(None, Some(170.0)), Imc::NotAvailable);
        assert_eq!(compute_imc(Some(70.0), None), Imc::NotAvailable);

        let score = compute_questionnaire_score(&answers(json!({"weight": "80", "height": 170})));
        assert_eq!(score.imc, Imc::NotAvailable);
    }

    #[test]
    fn test_non_numeric_answers_ignored() {
        let score = compute_questionnaire_score(&answers(json!({
            "A1": 4,
            "A2": "souvent",
            "A3": null,
            "B1": true,
            "B2": 3
        })));
        assert_eq!(score.total_score, 7);
    }

    #[test]
    fn test_band_thresholds() {
        assert_eq!(band_for_total(0), QuestionnaireBand::Inactive);
        assert_eq!(band_for_total(17), QuestionnaireBand::Inactive);
        assert_eq!(band_for_total(18), QuestionnaireBand::Active);
        assert_eq!(band_for_total(35), QuestionnaireBand::Active);
        assert_eq!(band_for_total(36), QuestionnaireBand::VeryActive);
        assert_eq!(band_for_total(45), QuestionnaireBand::VeryActive);
    }

    #[test]
    fn test_full_battery() {
        let mut all = QuestionnaireAnswers::new();
        for question in &QUESTION_BATTERY {
            all.insert(question.id.to_string(), json!(5));
        }
        all.insert(WEIGHT_KEY.to_string(), json!(62.5));
        all.insert(HEIGHT_KEY.to_string(), json!(165));

        let score = compute_questionnaire_score(&all);
        assert_eq!(score.total_score, 45);
        assert_eq!(score.band, QuestionnaireBand::VeryActive);
        assert_eq!(score.by_category[&QuestionCategory::Sedentary], 15);
        assert_eq!(score.by_category[&QuestionCategory::Leisure], 15);
        assert_eq!(score.by_category[&QuestionCategory::Daily], 15);
    }

    #[test]
    fn test_score_serializes_for_backend() {
        let score = compute_questionnaire_score(&answers(json!({"A1": 2, "weight": 0})));
        let value = serde_json::to_value(&score).unwrap();
        assert_eq!(value["totalScore"], 2);
        assert_eq!(value["band"], "Inactif");
        assert_eq!(value["imc"], "N/A");
    }

    #[test]
    fn test_coarse_percentage() {
        assert!((coarse_percentage(45, 45.0) - 100.0).abs() < 1e-9);
        assert!((coarse_percentage(9, 45.0) - 20.0).abs() < 1e-9);
        assert_eq!(coarse_percentage(60, 45.0), 100.0);
        assert_eq!(coarse_percentage(10, 0.0), 0.0);
    }
}
