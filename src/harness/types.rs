use serde::{Deserialize, Serialize};

use crate::trial::{
    DEFAULT_EXPECTED_CHECKS, InvokerConfig, MarkerClassifier, MarkerMode, TrialPlan, VerdictPolicy,
};

/// Configuration for a soak run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Number of outer repetitions; the window size follows the repetition index
    pub repetitions: u32,

    /// Seeds enumerated within each repetition
    pub seeds: Vec<u64>,

    /// Key for the auxiliary parameter stream
    pub aux_seed: u64,

    /// How each trial's process is built
    pub invoker: InvokerConfig,

    /// Number of checks the subject runs; the success marker is `N/N`
    pub expected_checks: u32,

    /// How strictly the marker must match
    pub marker_mode: MarkerMode,

    /// Exit-code policy
    pub policy: VerdictPolicy,

    /// Number of concurrent trials (1 = strictly sequential)
    pub workers: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            repetitions: 100,
            seeds: (1..=5).collect(),
            aux_seed: 0,
            invoker: InvokerConfig::default(),
            expected_checks: DEFAULT_EXPECTED_CHECKS,
            marker_mode: MarkerMode::Substring,
            policy: VerdictPolicy::default(),
            workers: 1,
        }
    }
}

impl HarnessConfig {
    /// Trial plan described by this config
    pub fn plan(&self) -> TrialPlan {
        TrialPlan::with_seeds(self.repetitions, self.seeds.clone()).aux_seed(self.aux_seed)
    }

    /// Classifier described by this config
    pub fn classifier(&self) -> MarkerClassifier {
        MarkerClassifier::full_score(self.expected_checks, self.marker_mode)
    }

    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> HarnessResult<()> {
        if self.repetitions == 0 {
            return Err(HarnessError::Config("repetitions must be at least 1".to_string()));
        }
        if self.seeds.is_empty() {
            return Err(HarnessError::Config("seed set must not be empty".to_string()));
        }
        if self.workers == 0 {
            return Err(HarnessError::Config("workers must be at least 1".to_string()));
        }
        if self.invoker.driver.as_os_str().is_empty() {
            return Err(HarnessError::Config("driver path must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Error types for harness operations
#[derive(Debug)]
pub enum HarnessError {
    /// The driver binary could not be started (missing, not executable, ...)
    Spawn {
        program: String,
        source: std::io::Error,
    },

    /// Error interacting with a running process
    Process(String),

    /// Invalid harness configuration
    Config(String),

    /// I/O error
    Io(std::io::Error),

    /// Serialization error
    Serialization(serde_json::Error),
}

impl HarnessError {
    /// True if the error means the test environment itself is broken
    pub fn is_environment(&self) -> bool {
        matches!(self, HarnessError::Spawn { .. })
    }
}

impl std::fmt::Display for HarnessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HarnessError::Spawn { program, source } => {
                write!(f, "Failed to start '{}': {}", program, source)
            }
            HarnessError::Process(msg) => write!(f, "Process error: {}", msg),
            HarnessError::Config(msg) => write!(f, "Configuration error: {}", msg),
            HarnessError::Io(err) => write!(f, "I/O error: {}", err),
            HarnessError::Serialization(err) => write!(f, "Serialization error: {}", err),
        }
    }
}

impl std::error::Error for HarnessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HarnessError::Spawn { source, .. } => Some(source),
            HarnessError::Process(_) | HarnessError::Config(_) => None,
            HarnessError::Io(err) => Some(err),
            HarnessError::Serialization(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for HarnessError {
    fn from(err: std::io::Error) -> Self {
        HarnessError::Io(err)
    }
}

impl From<serde_json::Error> for HarnessError {
    fn from(err: serde_json::Error) -> Self {
        HarnessError::Serialization(err)
    }
}
