//! Types for soak run results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::harness::types::HarnessConfig;
use crate::trial::{MarkerMode, TrialResult};

/// Running tally of a soak run
///
/// Counts only ever increase. Failures are kept in generation order no matter
/// in which order results are recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    total_trials: usize,
    passed_trials: usize,
    processed: usize,
    failures: Vec<TrialResult>,
}

impl RunSummary {
    /// Empty summary for a run of `total_trials` trials
    pub fn new(total_trials: usize) -> Self {
        Self {
            total_trials,
            passed_trials: 0,
            processed: 0,
            failures: Vec::new(),
        }
    }

    /// Add one trial outcome
    pub fn record(&mut self, result: TrialResult) {
        self.processed += 1;
        if result.passed {
            self.passed_trials += 1;
        } else {
            let ordinal = result.spec.ordinal;
            let pos = self.failures.partition_point(|f| f.spec.ordinal < ordinal);
            self.failures.insert(pos, result);
        }
    }

    pub fn total_trials(&self) -> usize {
        self.total_trials
    }

    pub fn passed_trials(&self) -> usize {
        self.passed_trials
    }

    pub fn failed_trials(&self) -> usize {
        self.failures.len()
    }

    /// Number of results recorded so far
    pub fn processed(&self) -> usize {
        self.processed
    }

    /// Failing trials in generation order
    pub fn failures(&self) -> &[TrialResult] {
        &self.failures
    }

    pub fn is_complete(&self) -> bool {
        self.processed == self.total_trials
    }

    pub fn all_passed(&self) -> bool {
        self.is_complete() && self.failures.is_empty()
    }

    /// `Score: passed/total`
    pub fn score_line(&self) -> String {
        format!("Score: {}/{}", self.passed_trials, self.total_trials)
    }

    /// Score line followed by every failure record, one per line
    pub fn render(&self) -> String {
        let mut out = self.score_line();
        out.push('\n');
        for failure in &self.failures {
            out.push_str(&failure.failure_record());
            out.push('\n');
        }
        out
    }
}

/// Full record of a finished run, as written to `--json` and session reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Whether every trial passed
    pub success: bool,

    pub started_at: DateTime<Utc>,

    pub finished_at: DateTime<Utc>,

    /// Machine the soak ran on
    pub host: Option<String>,

    /// Driver executable
    pub driver: String,

    /// Subject executable
    pub subject: String,

    pub repetitions: u32,

    pub seeds: Vec<u64>,

    /// Key of the auxiliary parameter stream (rerun with `--aux-seed`)
    pub aux_seed: u64,

    pub workers: usize,

    /// Per-trial timeout in milliseconds, if any
    pub timeout_ms: Option<u64>,

    /// Success marker text
    pub marker: String,

    pub marker_mode: MarkerMode,

    pub summary: RunSummary,
}

impl RunReport {
    /// Build a report for a finished run
    pub fn new(config: &HarnessConfig, summary: RunSummary, started_at: DateTime<Utc>) -> Self {
        let classifier = config.classifier();
        Self {
            success: summary.all_passed(),
            started_at,
            finished_at: Utc::now(),
            host: hostname::get()
                .ok()
                .map(|h| h.to_string_lossy().into_owned()),
            driver: config.invoker.driver.to_string_lossy().into_owned(),
            subject: config.invoker.subject.to_string_lossy().into_owned(),
            repetitions: config.repetitions,
            seeds: config.seeds.clone(),
            aux_seed: config.aux_seed,
            workers: config.workers,
            timeout_ms: config.invoker.timeout.map(|t| t.as_millis() as u64),
            marker: classifier.marker,
            marker_mode: classifier.mode,
            summary,
        }
    }
}
