// Core types for a single trial

use serde::{Deserialize, Serialize};

use super::backend::Invocation;
use super::classify::Classifier;

/// Parameters of one invocation of the subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrialSpec {
    /// Position in generation order (0-based)
    pub ordinal: usize,

    /// Outer loop index (1-based)
    pub repetition: u32,

    /// Seed handed to the subject
    pub seed: u64,

    /// Window size handed to the subject (tracks `repetition`)
    pub window: u32,

    /// Randomized auxiliary parameter in `[1, 14]`
    pub auxiliary: u32,
}

/// How a trial was judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Success marker found
    Passed,
    /// Success marker absent from the output
    MarkerMissing,
    /// Marker present but the subject exited non-zero (strict policy only)
    NonZeroExit,
    /// Killed after exceeding the per-trial timeout
    TimedOut,
}

impl Verdict {
    pub fn is_pass(self) -> bool {
        matches!(self, Verdict::Passed)
    }
}

/// Knobs that decide how an invocation maps to a verdict
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictPolicy {
    /// Fail trials whose subject exited non-zero even if the marker is present
    pub fail_on_nonzero_exit: bool,
}

/// Outcome of one trial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialResult {
    /// Parameters that produced this result
    pub spec: TrialSpec,

    /// Captured standard output, unmodified
    pub raw_output: String,

    /// Whether the trial passed
    pub passed: bool,

    /// Reason for the pass/fail decision
    pub verdict: Verdict,

    /// Exit code of the subject (None if killed by a signal)
    pub exit_code: Option<i32>,

    /// Wall-clock duration of the invocation in milliseconds
    pub duration_ms: u64,
}

impl TrialResult {
    /// Classify an invocation into a result
    pub fn judge(
        spec: TrialSpec,
        invocation: Invocation,
        classifier: &dyn Classifier,
        policy: VerdictPolicy,
    ) -> Self {
        let verdict = if invocation.timed_out {
            Verdict::TimedOut
        } else if !classifier.classify(&invocation.output) {
            Verdict::MarkerMissing
        } else if policy.fail_on_nonzero_exit && invocation.exit_code != Some(0) {
            Verdict::NonZeroExit
        } else {
            Verdict::Passed
        };

        Self {
            spec,
            raw_output: invocation.output,
            passed: verdict.is_pass(),
            verdict,
            exit_code: invocation.exit_code,
            duration_ms: invocation.duration.as_millis() as u64,
        }
    }

    /// Failure record: raw output followed by the parameters that produced it
    pub fn failure_record(&self) -> String {
        let suffix = match self.verdict {
            Verdict::TimedOut => " (timed out)",
            Verdict::NonZeroExit => " (non-zero exit)",
            _ => "",
        };
        format!(
            "{}\n seed: {}, w: {}{}",
            self.raw_output, self.spec.seed, self.spec.window, suffix
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trial::classify::MarkerClassifier;
    use std::time::Duration;

    fn spec() -> TrialSpec {
        TrialSpec {
            ordinal: 0,
            repetition: 3,
            seed: 2,
            window: 3,
            auxiliary: 7,
        }
    }

    fn invocation(output: &str, exit_code: Option<i32>, timed_out: bool) -> Invocation {
        Invocation {
            output: output.to_string(),
            exit_code,
            timed_out,
            duration: Duration::from_millis(12),
        }
    }

    #[test]
    fn test_judge_pass() {
        let classifier = MarkerClassifier::default();
        let result = TrialResult::judge(
            spec(),
            invocation("14/14", Some(0), false),
            &classifier,
            VerdictPolicy::default(),
        );
        assert!(result.passed);
        assert_eq!(result.verdict, Verdict::Passed);
        assert_eq!(result.duration_ms, 12);
    }

    #[test]
    fn test_judge_nonzero_exit_is_permissive_by_default() {
        let classifier = MarkerClassifier::default();
        let result = TrialResult::judge(
            spec(),
            invocation("14/14", Some(3), false),
            &classifier,
            VerdictPolicy::default(),
        );
        assert!(result.passed);
    }

    #[test]
    fn test_judge_nonzero_exit_strict() {
        let classifier = MarkerClassifier::default();
        let policy = VerdictPolicy {
            fail_on_nonzero_exit: true,
        };
        let result = TrialResult::judge(spec(), invocation("14/14", Some(3), false), &classifier, policy);
        assert!(!result.passed);
        assert_eq!(result.verdict, Verdict::NonZeroExit);
    }

    #[test]
    fn test_judge_timeout_beats_marker() {
        let classifier = MarkerClassifier::default();
        let result = TrialResult::judge(
            spec(),
            invocation("14/14", None, true),
            &classifier,
            VerdictPolicy::default(),
        );
        assert!(!result.passed);
        assert_eq!(result.verdict, Verdict::TimedOut);
        assert!(result.failure_record().ends_with("seed: 2, w: 3 (timed out)"));
    }

    #[test]
    fn test_failure_record_layout() {
        let classifier = MarkerClassifier::default();
        let result = TrialResult::judge(
            spec(),
            invocation("0/14\n", Some(0), false),
            &classifier,
            VerdictPolicy::default(),
        );
        assert_eq!(result.verdict, Verdict::MarkerMissing);
        assert_eq!(result.failure_record(), "0/14\n\n seed: 2, w: 3");
    }
}
