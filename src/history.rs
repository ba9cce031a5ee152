//! Fitness-test history
//!
//! Test results accumulate over time and are never edited. The history keeps
//! them in submission order and exposes the latest score per test.

use crate::banding::{BandingTable, MAX_SCORE};
use crate::error::ScoreError;
use crate::types::{Gender, HealthTestResult, TestSlug};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// Latest score of every test taken so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitnessProfile {
    pub scores: BTreeMap<TestSlug, u8>,
    /// Sum of the latest scores
    pub total: u32,
    /// Highest attainable total given the tests taken
    pub max_total: u32,
}

/// Append-only list of scored test submissions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestHistory {
    results: Vec<HealthTestResult>,
}

impl TestHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score a raw value and append the result
    pub fn record(
        &mut self,
        table: &BandingTable,
        test: TestSlug,
        raw_value: f64,
        age: u32,
        gender: Gender,
        at: DateTime<Utc>,
    ) -> Result<HealthTestResult, ScoreError> {
        let score = table.score(test, raw_value, age, gender)?;
        let result = HealthTestResult {
            id: Uuid::new_v4().to_string(),
            form: test,
            value: raw_value,
            score,
            created_at: at,
        };
        self.append(result.clone());
        Ok(result)
    }

    /// Append a result that was scored elsewhere (e.g. loaded from the backend)
    pub fn append(&mut self, result: HealthTestResult) {
        debug!(test = result.form.as_str(), score = result.score, "recorded test result");
        // Keep chronological order even when older results arrive late.
        let pos = self
            .results
            .partition_point(|r| r.created_at <= result.created_at);
        self.results.insert(pos, result);
    }

    pub fn results(&self) -> &[HealthTestResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// All results of one test, oldest first
    pub fn for_test(&self, test: TestSlug) -> impl Iterator<Item = &HealthTestResult> {
        self.results.iter().filter(move |r| r.form == test)
    }

    /// Most recent result of one test
    pub fn latest(&self, test: TestSlug) -> Option<&HealthTestResult> {
        self.for_test(test).last()
    }

    pub fn profile(&self) -> FitnessProfile {
        let scores: BTreeMap<TestSlug, u8> = TestSlug::ALL
            .into_iter()
            .filter_map(|test| self.latest(test).map(|r| (test, r.score)))
            .collect();
        let total = scores.values().map(|s| *s as u32).sum();
        let max_total = scores.len() as u32 * MAX_SCORE as u32;
        FitnessProfile {
            scores,
            total,
            max_total,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ScoreError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ScoreError> {
        Ok(serde_json::to_string(self)?)
    }
}
