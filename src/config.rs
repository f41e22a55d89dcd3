//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for the soak harness, supporting:
//! - Environment variables for all configurable values
//! - Defaults that reproduce the legacy `tester`/`reliable` soak
//! - Seed set parsing shared with the CLI
//!
//! Command-line options always win; anything left unset on the command line
//! falls back to these values.
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SOAK_HARNESS_DRIVER` | Driver executable | `./tester` |
//! | `SOAK_HARNESS_SUBJECT` | Subject executable passed to the driver | `./reliable` |
//! | `SOAK_HARNESS_REPETITIONS` | Outer repetitions (window sizes) | `100` |
//! | `SOAK_HARNESS_SEEDS` | Seed set, e.g. `1-5` or `1,3,8` | `1-5` |
//! | `SOAK_HARNESS_TIMEOUT` | Per-trial timeout in seconds, `0` = none | `0` |
//! | `SOAK_HARNESS_WORKERS` | Concurrent trials | `1` |
//! | `SOAK_HARNESS_EXPECTED_CHECKS` | Checks per run; marker is `N/N` | `14` |
//! | `SOAK_HARNESS_SESSION_DIR` | Base directory for sessions | `/tmp/soak-harness` |
//!
//! # Example
//!
//! ```bash
//! export SOAK_HARNESS_DRIVER=/opt/cs144/tester
//! export SOAK_HARNESS_SEEDS=1-10
//! soak-harness run -r 20
//! ```

use std::env;
use std::sync::OnceLock;
use std::time::Duration;

// ============================================================================
// Default Values (matching the legacy soak script)
// ============================================================================

/// Default driver executable
pub const DEFAULT_DRIVER: &str = "./tester";

/// Default subject executable
pub const DEFAULT_SUBJECT: &str = "./reliable";

/// Default number of repetitions
pub const DEFAULT_REPETITIONS: u32 = 100;

/// Default seed set
pub const DEFAULT_SEEDS: &str = "1-5";

/// Default per-trial timeout (seconds, 0 = none)
pub const DEFAULT_TIMEOUT_SECS: u64 = 0;

/// Default worker count
pub const DEFAULT_WORKERS: usize = 1;

/// Default number of sub-checks per subject run
pub const DEFAULT_EXPECTED_CHECKS: u32 = crate::trial::DEFAULT_EXPECTED_CHECKS;

/// Default session base directory
pub const DEFAULT_SESSION_DIR: &str = "/tmp/soak-harness";

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable for the driver executable
pub const ENV_DRIVER: &str = "SOAK_HARNESS_DRIVER";

/// Environment variable for the subject executable
pub const ENV_SUBJECT: &str = "SOAK_HARNESS_SUBJECT";

/// Environment variable for the repetition count
pub const ENV_REPETITIONS: &str = "SOAK_HARNESS_REPETITIONS";

/// Environment variable for the seed set
pub const ENV_SEEDS: &str = "SOAK_HARNESS_SEEDS";

/// Environment variable for the per-trial timeout
pub const ENV_TIMEOUT: &str = "SOAK_HARNESS_TIMEOUT";

/// Environment variable for the worker count
pub const ENV_WORKERS: &str = "SOAK_HARNESS_WORKERS";

/// Environment variable for the expected check count
pub const ENV_EXPECTED_CHECKS: &str = "SOAK_HARNESS_EXPECTED_CHECKS";

/// Environment variable for the session directory
pub const ENV_SESSION_DIR: &str = "SOAK_HARNESS_SESSION_DIR";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for the soak harness
#[derive(Debug, Clone)]
pub struct Config {
    /// Subject invocation settings
    pub subject: SubjectSettings,
    /// Trial matrix settings
    pub matrix: MatrixSettings,
    /// Session configuration
    pub session: SessionSettings,
}

/// How the subject is invoked
#[derive(Debug, Clone)]
pub struct SubjectSettings {
    /// Driver executable
    pub driver: String,
    /// Subject executable
    pub subject: String,
    /// Per-trial timeout (seconds, 0 = none)
    pub timeout_secs: u64,
    /// Checks per run
    pub expected_checks: u32,
}

/// Shape of the trial matrix
#[derive(Debug, Clone)]
pub struct MatrixSettings {
    /// Outer repetitions
    pub repetitions: u32,
    /// Seed set
    pub seeds: Vec<u64>,
    /// Concurrent trials
    pub workers: usize,
}

/// Session-related settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Base directory for session storage
    pub base_dir: String,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            subject: SubjectSettings::from_env(),
            matrix: MatrixSettings::from_env(),
            session: SessionSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            subject: SubjectSettings::defaults(),
            matrix: MatrixSettings::defaults(),
            session: SessionSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl SubjectSettings {
    /// Create subject settings from environment variables
    pub fn from_env() -> Self {
        Self {
            driver: env::var(ENV_DRIVER).unwrap_or_else(|_| DEFAULT_DRIVER.to_string()),
            subject: env::var(ENV_SUBJECT).unwrap_or_else(|_| DEFAULT_SUBJECT.to_string()),
            timeout_secs: env_parsed(ENV_TIMEOUT).unwrap_or(DEFAULT_TIMEOUT_SECS),
            expected_checks: env_parsed(ENV_EXPECTED_CHECKS).unwrap_or(DEFAULT_EXPECTED_CHECKS),
        }
    }

    /// Create subject settings with defaults
    pub fn defaults() -> Self {
        Self {
            driver: DEFAULT_DRIVER.to_string(),
            subject: DEFAULT_SUBJECT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            expected_checks: DEFAULT_EXPECTED_CHECKS,
        }
    }

    /// Timeout as a duration (None when disabled)
    pub fn timeout(&self) -> Option<Duration> {
        timeout_from_secs(self.timeout_secs)
    }
}

impl MatrixSettings {
    /// Create matrix settings from environment variables
    pub fn from_env() -> Self {
        let seeds = env::var(ENV_SEEDS)
            .ok()
            .and_then(|s| parse_seed_set(&s))
            .unwrap_or_else(default_seeds);

        Self {
            repetitions: env_parsed(ENV_REPETITIONS).unwrap_or(DEFAULT_REPETITIONS),
            seeds,
            workers: env_parsed(ENV_WORKERS)
                .filter(|w: &usize| *w > 0)
                .unwrap_or(DEFAULT_WORKERS),
        }
    }

    /// Create matrix settings with defaults
    pub fn defaults() -> Self {
        Self {
            repetitions: DEFAULT_REPETITIONS,
            seeds: default_seeds(),
            workers: DEFAULT_WORKERS,
        }
    }
}

impl SessionSettings {
    /// Create session settings from environment variables
    pub fn from_env() -> Self {
        Self {
            base_dir: env::var(ENV_SESSION_DIR)
                .unwrap_or_else(|_| DEFAULT_SESSION_DIR.to_string()),
        }
    }

    /// Create session settings with defaults
    pub fn defaults() -> Self {
        Self {
            base_dir: DEFAULT_SESSION_DIR.to_string(),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn default_seeds() -> Vec<u64> {
    (1..=5).collect()
}

/// Timeout in seconds to a duration; 0 disables the timeout
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Largest number of seeds a seed set may expand to
pub const MAX_SEED_SET: u64 = 1_000_000;

/// Parse a seed set such as `1-5`, `1,3,5` or `1-3,8`
///
/// Order is kept as written. Returns None for empty input, malformed
/// numbers, descending ranges or sets larger than [`MAX_SEED_SET`].
pub fn parse_seed_set(spec: &str) -> Option<Vec<u64>> {
    let mut seeds = Vec::new();
    for part in spec.split(',').map(str::trim) {
        if part.is_empty() {
            return None;
        }
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: u64 = lo.trim().parse().ok()?;
                let hi: u64 = hi.trim().parse().ok()?;
                if lo > hi || hi - lo >= MAX_SEED_SET - seeds.len() as u64 {
                    return None;
                }
                seeds.extend(lo..=hi);
            }
            None => {
                if seeds.len() as u64 >= MAX_SEED_SET {
                    return None;
                }
                seeds.push(part.parse().ok()?);
            }
        }
    }
    (!seeds.is_empty()).then_some(seeds)
}

/// Get the session base directory (convenience function)
pub fn session_base_dir() -> String {
    get().session.base_dir.clone()
}
