//! Fitness-test banding
//!
//! Converts a raw fitness-test value into a 1-5 score using age/gender-banded
//! threshold tables. Tables are plain data rows resolved by a single lookup:
//!
//! - rows are grouped by test and gender, each row covering one age bracket
//! - brackets are searched from the oldest down with inclusive lower bounds,
//!   so a user exactly at a boundary age lands in the older bracket
//! - thresholds are sorted descending when the table is built; the first one
//!   the raw value meets or exceeds gives the score, otherwise 1
//!
//! The flexibility test (`souplesse`) is not banded: the user picks one of
//! five qualitative levels, see [`FlexibilityLevel`].

use crate::error::ScoreError;
use crate::types::{Gender, TestSlug};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Score given when no threshold is met
pub const FALLBACK_SCORE: u8 = 1;

/// Score reported by the lenient path when the user's gender is unusable
pub const UNSCORED: u8 = 0;

/// Best possible score
pub const MAX_SCORE: u8 = 5;

/// A single threshold: values `>= min` earn `score`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub min: f64,
    pub score: u8,
}

/// One age bracket of one test for one gender
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandRow {
    pub test: TestSlug,
    pub gender: Gender,
    /// Inclusive lower age bound
    pub min_age: u32,
    /// Inclusive upper age bound, `None` for the open-ended oldest bracket
    #[serde(default)]
    pub max_age: Option<u32>,
    pub thresholds: Vec<Threshold>,
}

impl BandRow {
    fn resolve(&self, raw_value: f64) -> u8 {
        self.thresholds
            .iter()
            .find(|t| raw_value >= t.min)
            .map(|t| t.score)
            .unwrap_or(FALLBACK_SCORE)
    }
}

/// Qualitative flexibility levels offered by the `souplesse` picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlexibilityLevel {
    BelowKnees,
    Knees,
    Shins,
    Ankles,
    Toes,
}

impl FlexibilityLevel {
    pub const ALL: [FlexibilityLevel; 5] = [
        FlexibilityLevel::BelowKnees,
        FlexibilityLevel::Knees,
        FlexibilityLevel::Shins,
        FlexibilityLevel::Ankles,
        FlexibilityLevel::Toes,
    ];

    /// Map a picker selection (1-5) to a level
    pub fn from_selection(selection: f64) -> Result<Self, ScoreError> {
        if selection.fract() != 0.0 || !(1.0..=5.0).contains(&selection) {
            return Err(ScoreError::InvalidSelection(format!(
                "flexibility selection must be an integer between 1 and 5, got {selection}"
            )));
        }
        Ok(Self::ALL[selection as usize - 1])
    }

    pub fn score(&self) -> u8 {
        match self {
            FlexibilityLevel::BelowKnees => 1,
            FlexibilityLevel::Knees => 2,
            FlexibilityLevel::Shins => 3,
            FlexibilityLevel::Ankles => 4,
            FlexibilityLevel::Toes => 5,
        }
    }

    /// Text shown in the picker
    pub fn description(&self) -> &'static str {
        match self {
            FlexibilityLevel::BelowKnees => "Je n'atteins pas mes genoux",
            FlexibilityLevel::Knees => "J'atteins mes genoux",
            FlexibilityLevel::Shins => "J'atteins le milieu de mes tibias",
            FlexibilityLevel::Ankles => "J'atteins mes chevilles",
            FlexibilityLevel::Toes => "Je touche mes orteils ou le sol",
        }
    }
}

/// Age bracket lower bound plus thresholds for scores 5, 4, 3 and 2
type Bracket = (u32, [f64; 4]);

// Seconds standing on one leg.
const EQUILIBRE_M: [Bracket; 5] = [
    (0, [50.0, 40.0, 30.0, 20.0]),
    (31, [45.0, 35.0, 25.0, 15.0]),
    (41, [40.0, 30.0, 20.0, 12.0]),
    (51, [35.0, 25.0, 15.0, 10.0]),
    (61, [30.0, 20.0, 12.0, 6.0]),
];
const EQUILIBRE_F: [Bracket; 5] = [
    (0, [48.0, 38.0, 28.0, 18.0]),
    (31, [43.0, 33.0, 23.0, 14.0]),
    (41, [38.0, 28.0, 18.0, 11.0]),
    (51, [32.0, 22.0, 14.0, 9.0]),
    (61, [27.0, 18.0, 10.0, 5.0]),
];

// Arm curls in 30 seconds.
const FORCE_BRAS_M: [Bracket; 5] = [
    (0, [30.0, 26.0, 22.0, 18.0]),
    (31, [28.0, 24.0, 20.0, 16.0]),
    (41, [26.0, 22.0, 18.0, 14.0]),
    (51, [24.0, 20.0, 16.0, 12.0]),
    (61, [22.0, 18.0, 14.0, 11.0]),
];
const FORCE_BRAS_F: [Bracket; 5] = [
    (0, [26.0, 22.0, 18.0, 15.0]),
    (31, [24.0, 20.0, 16.0, 13.0]),
    (41, [22.0, 18.0, 15.0, 12.0]),
    (51, [20.0, 17.0, 14.0, 11.0]),
    (61, [19.0, 16.0, 13.0, 10.0]),
];

// Chair stands in 30 seconds.
const FORCE_JAMBES_M: [Bracket; 5] = [
    (0, [25.0, 21.0, 17.0, 14.0]),
    (31, [23.0, 19.0, 16.0, 13.0]),
    (41, [21.0, 18.0, 15.0, 12.0]),
    (51, [19.0, 16.0, 14.0, 11.0]),
    (61, [17.0, 15.0, 12.0, 10.0]),
];
const FORCE_JAMBES_F: [Bracket; 5] = [
    (0, [23.0, 19.0, 16.0, 13.0]),
    (31, [21.0, 18.0, 15.0, 12.0]),
    (41, [19.0, 16.0, 14.0, 11.0]),
    (51, [18.0, 15.0, 13.0, 10.0]),
    (61, [16.0, 14.0, 11.0, 9.0]),
];

// Meters walked in six minutes; brackets start a year earlier than the others.
const ENDURANCE_M: [Bracket; 5] = [
    (0, [750.0, 680.0, 610.0, 540.0]),
    (30, [720.0, 650.0, 580.0, 510.0]),
    (40, [690.0, 620.0, 550.0, 480.0]),
    (50, [650.0, 580.0, 510.0, 440.0]),
    (60, [600.0, 530.0, 460.0, 400.0]),
];
const ENDURANCE_F: [Bracket; 5] = [
    (0, [700.0, 630.0, 560.0, 490.0]),
    (30, [670.0, 600.0, 530.0, 460.0]),
    (40, [640.0, 570.0, 500.0, 430.0]),
    (50, [600.0, 530.0, 470.0, 410.0]),
    (60, [560.0, 490.0, 430.0, 370.0]),
];

fn expand(test: TestSlug, gender: Gender, brackets: &[Bracket]) -> Vec<BandRow> {
    brackets
        .iter()
        .enumerate()
        .map(|(i, (min_age, limits))| BandRow {
            test,
            gender,
            min_age: *min_age,
            max_age: brackets.get(i + 1).map(|(next, _)| next - 1),
            thresholds: limits
                .iter()
                .zip([5u8, 4, 3, 2])
                .map(|(min, score)| Threshold { min: *min, score })
                .collect(),
        })
        .collect()
}

/// Age/gender-banded threshold tables for the numeric fitness tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandingTable {
    rows: Vec<BandRow>,
}

impl Default for BandingTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl BandingTable {
    /// The built-in tables
    pub fn standard() -> Self {
        let sources: [(TestSlug, Gender, &[Bracket]); 8] = [
            (TestSlug::Equilibre, Gender::Male, &EQUILIBRE_M),
            (TestSlug::Equilibre, Gender::Female, &EQUILIBRE_F),
            (TestSlug::ForceBras, Gender::Male, &FORCE_BRAS_M),
            (TestSlug::ForceBras, Gender::Female, &FORCE_BRAS_F),
            (TestSlug::ForceJambes, Gender::Male, &FORCE_JAMBES_M),
            (TestSlug::ForceJambes, Gender::Female, &FORCE_JAMBES_F),
            (TestSlug::Endurance, Gender::Male, &ENDURANCE_M),
            (TestSlug::Endurance, Gender::Female, &ENDURANCE_F),
        ];

        let rows = sources
            .iter()
            .flat_map(|(test, gender, brackets)| expand(*test, *gender, brackets))
            .collect();
        Self::normalized(rows)
    }

    /// Build a table from rows, sorting and validating them
    pub fn from_rows(rows: Vec<BandRow>) -> Result<Self, ScoreError> {
        let table = Self::normalized(rows);
        table.validate()?;
        Ok(table)
    }

    /// Load a table from a JSON array of rows
    pub fn from_json(json: &str) -> Result<Self, ScoreError> {
        let rows: Vec<BandRow> = serde_json::from_str(json)?;
        Self::from_rows(rows)
    }

    /// Serialize the rows to pretty JSON for review
    pub fn to_json(&self) -> Result<String, ScoreError> {
        Ok(serde_json::to_string_pretty(&self.rows)?)
    }

    pub fn rows(&self) -> &[BandRow] {
        &self.rows
    }

    fn normalized(mut rows: Vec<BandRow>) -> Self {
        for row in &mut rows {
            row.thresholds.sort_by(|a, b| b.min.total_cmp(&a.min));
        }
        rows.sort_by(|a, b| {
            (a.test, a.gender, a.min_age).cmp(&(b.test, b.gender, b.min_age))
        });
        Self { rows }
    }

    /// Check coverage of every age, score ranges and threshold ordering.
    pub fn validate(&self) -> Result<(), ScoreError> {
        if let Some(row) = self.rows.iter().find(|r| r.test.is_qualitative()) {
            return Err(ScoreError::Configuration(format!(
                "{} is scored by selection and takes no banding rows",
                row.test.as_str()
            )));
        }

        for test in TestSlug::ALL.into_iter().filter(|t| !t.is_qualitative()) {
            for gender in [Gender::Male, Gender::Female] {
                let rows: Vec<&BandRow> = self
                    .rows
                    .iter()
                    .filter(|r| r.test == test && r.gender == gender)
                    .collect();
                validate_brackets(test, gender, &rows)?;
            }
        }

        for row in &self.rows {
            let ctx = format!("{}/{}/{}+", row.test.as_str(), row.gender.as_str(), row.min_age);
            for t in &row.thresholds {
                if !(FALLBACK_SCORE..=MAX_SCORE).contains(&t.score) {
                    return Err(ScoreError::Configuration(format!(
                        "{ctx}: score {} outside 1-5",
                        t.score
                    )));
                }
                if !t.min.is_finite() {
                    return Err(ScoreError::Configuration(format!(
                        "{ctx}: threshold must be finite"
                    )));
                }
            }
            // Descending thresholds with non-increasing scores keep the
            // lookup monotone in the raw value.
            if row.thresholds.windows(2).any(|w| w[1].score > w[0].score) {
                return Err(ScoreError::Configuration(format!(
                    "{ctx}: a lower threshold awards a higher score"
                )));
            }
        }
        Ok(())
    }

    /// Row that applies to a user of the given age and gender
    pub fn bracket(&self, test: TestSlug, gender: Gender, age: u32) -> Option<&BandRow> {
        self.rows
            .iter()
            .rev()
            .filter(|r| r.test == test && r.gender == gender)
            .find(|r| age >= r.min_age)
    }

    /// Score a raw value, failing on anything that cannot be scored reliably
    pub fn score(
        &self,
        test: TestSlug,
        raw_value: f64,
        age: u32,
        gender: Gender,
    ) -> Result<u8, ScoreError> {
        if test.is_qualitative() {
            return FlexibilityLevel::from_selection(raw_value).map(|level| level.score());
        }

        if !raw_value.is_finite() || raw_value < 0.0 {
            return Err(ScoreError::InvalidValue(format!(
                "{} expects a non-negative number of {}, got {raw_value}",
                test.as_str(),
                test.unit()
            )));
        }

        let row = self.bracket(test, gender, age).ok_or_else(|| {
            ScoreError::Configuration(format!(
                "no banding row for {} / {} at age {age}",
                test.as_str(),
                gender.as_str()
            ))
        })?;

        let score = row.resolve(raw_value);
        debug!(
            test = test.as_str(),
            gender = gender.as_str(),
            age,
            raw_value,
            bracket = row.min_age,
            score,
            "banded fitness test"
        );
        Ok(score)
    }

    /// Score from the backend's string identifiers
    pub fn score_raw(
        &self,
        test: &str,
        raw_value: f64,
        age: u32,
        gender: &str,
    ) -> Result<u8, ScoreError> {
        let test = TestSlug::parse(test)?;
        let gender = Gender::parse(gender)?;
        self.score(test, raw_value, age, gender)
    }

    /// Score without failing.
    ///
    /// An unusable gender yields [`UNSCORED`], any other problem the fallback
    /// score of 1, so a bad submission never scores higher than warranted.
    /// Every fallback is logged.
    pub fn score_or_fallback(&self, test: &str, raw_value: f64, age: u32, gender: &str) -> u8 {
        match self.score_raw(test, raw_value, age, gender) {
            Ok(score) => score,
            Err(ScoreError::UnsupportedGender(g)) => {
                warn!(test, gender = %g, "unsupported gender, test left unscored");
                UNSCORED
            }
            Err(e) => {
                warn!(test, raw_value, age, error = %e, "falling back to lowest score");
                FALLBACK_SCORE
            }
        }
    }
}

fn validate_brackets(test: TestSlug, gender: Gender, rows: &[&BandRow]) -> Result<(), ScoreError> {
    let ctx = format!("{}/{}", test.as_str(), gender.as_str());
    let Some(first) = rows.first() else {
        return Err(ScoreError::Configuration(format!("{ctx}: no age brackets")));
    };
    if first.min_age != 0 {
        return Err(ScoreError::Configuration(format!(
            "{ctx}: youngest bracket starts at {} instead of 0",
            first.min_age
        )));
    }
    for pair in rows.windows(2) {
        match pair[0].max_age {
            Some(max) if max.checked_add(1) == Some(pair[1].min_age) => {}
            Some(max) => {
                return Err(ScoreError::Configuration(format!(
                    "{ctx}: bracket ending at {max} is followed by one starting at {}",
                    pair[1].min_age
                )))
            }
            None => {
                return Err(ScoreError::Configuration(format!(
                    "{ctx}: open-ended bracket at {} is not the oldest",
                    pair[0].min_age
                )))
            }
        }
    }
    if let Some(last) = rows.last() {
        if last.max_age.is_some() {
            return Err(ScoreError::Configuration(format!(
                "{ctx}: oldest bracket must be open-ended"
            )));
        }
    }
    Ok(())
}

fn standard_table() -> &'static BandingTable {
    static STANDARD: OnceLock<BandingTable> = OnceLock::new();
    STANDARD.get_or_init(BandingTable::standard)
}

/// Score a fitness test against the built-in tables.
///
/// # Arguments
/// * `test` - Test slug (`equilibre`, `souplesse`, `force-bras`, `force-jambes`, `endurance`)
/// * `raw_value` - Seconds, repetitions or meters; the picker level for `souplesse`
/// * `age` - User age in years
/// * `gender` - `"M"` or `"F"`
pub fn score_test_result(
    test: &str,
    raw_value: f64,
    age: u32,
    gender: &str,
) -> Result<u8, ScoreError> {
    standard_table().score_raw(test, raw_value, age, gender)
}
