//! Success-marker classification of captured subject output.
//!
//! The subject reports a `<passed>/<total>` fraction somewhere in its output.
//! [`MarkerClassifier`] looks for the full-score fraction in one of two modes:
//!
//! - [`MarkerMode::Substring`]: any occurrence counts, including inside a larger
//!   number (`"114/14"` passes). This is the legacy contract and the default.
//! - [`MarkerMode::Token`]: the occurrence must not touch an ASCII digit on
//!   either side (`"114/14"` and `"14/142"` fail).

use serde::{Deserialize, Serialize};

/// Default number of sub-checks the subject runs per invocation
pub const DEFAULT_EXPECTED_CHECKS: u32 = 14;

/// Decides whether captured output represents a passing trial
pub trait Classifier: Send + Sync {
    /// True if the output reports full success
    fn classify(&self, output: &str) -> bool;

    /// Short human-readable description (e.g. for reports)
    fn describe(&self) -> String;
}

/// How the marker must appear in the output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerMode {
    #[default]
    Substring,
    Token,
}

impl MarkerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkerMode::Substring => "substring",
            MarkerMode::Token => "token",
        }
    }
}

/// Classifier that searches for a literal marker such as `14/14`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerClassifier {
    /// Literal marker text
    pub marker: String,

    /// Matching mode
    pub mode: MarkerMode,
}

impl MarkerClassifier {
    /// Substring match on an arbitrary marker
    pub fn substring(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            mode: MarkerMode::Substring,
        }
    }

    /// Digit-bounded match on an arbitrary marker
    pub fn token(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            mode: MarkerMode::Token,
        }
    }

    /// Marker `n/n` for a subject that runs `n` checks
    pub fn full_score(checks: u32, mode: MarkerMode) -> Self {
        Self {
            marker: format!("{}/{}", checks, checks),
            mode,
        }
    }

    fn matches_token(&self, output: &str) -> bool {
        if self.marker.is_empty() {
            return true;
        }
        let bytes = output.as_bytes();
        output.match_indices(self.marker.as_str()).any(|(start, matched)| {
            let end = start + matched.len();
            let before_ok = start == 0 || !bytes[start - 1].is_ascii_digit();
            let after_ok = end == bytes.len() || !bytes[end].is_ascii_digit();
            before_ok && after_ok
        })
    }
}

impl Default for MarkerClassifier {
    fn default() -> Self {
        Self::full_score(DEFAULT_EXPECTED_CHECKS, MarkerMode::Substring)
    }
}

impl Classifier for MarkerClassifier {
    fn classify(&self, output: &str) -> bool {
        match self.mode {
            MarkerMode::Substring => output.contains(self.marker.as_str()),
            MarkerMode::Token => self.matches_token(output),
        }
    }

    fn describe(&self) -> String {
        format!("{} \"{}\"", self.mode.as_str(), self.marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_examples() {
        let c = MarkerClassifier::default();
        assert!(c.classify("sub-check 14/14 ok"));
        assert!(!c.classify("13/14"));
        assert!(!c.classify(""));
        // brittle but deliberate
        assert!(c.classify("114/14"));
    }

    #[test]
    fn test_token_rejects_embedded_marker() {
        let c = MarkerClassifier::full_score(14, MarkerMode::Token);
        assert!(c.classify("sub-check 14/14 ok"));
        assert!(c.classify("14/14"));
        assert!(c.classify("passed:14/14."));
        assert!(!c.classify("114/14"));
        assert!(!c.classify("14/142"));
        assert!(!c.classify("13/14"));
        assert!(!c.classify(""));
    }

    #[test]
    fn test_token_finds_later_clean_occurrence() {
        let c = MarkerClassifier::token("14/14");
        assert!(c.classify("114/14 then 14/14"));
    }

    #[test]
    fn test_full_score_marker() {
        let c = MarkerClassifier::full_score(9, MarkerMode::Substring);
        assert_eq!(c.marker, "9/9");
        assert!(c.classify("Result: 9/9"));
        assert!(!c.classify("Result: 8/9"));
    }

    #[test]
    fn test_describe() {
        assert_eq!(MarkerClassifier::default().describe(), "substring \"14/14\"");
        assert_eq!(MarkerClassifier::token("2/2").describe(), "token \"2/2\"");
    }
}
