//! Soak Harness - parameterized soak testing of black-box subject binaries.
//!
//! This crate provides:
//! - Deterministic trial generation over a (repetition x seed) matrix
//! - Process invocation with stdout capture and optional per-trial timeouts
//! - Success-marker classification of captured output
//! - Aggregation into a score plus ordered, reproducible failure records
//! - Sequential or bounded-pool execution
//!
//! # Example
//!
//! ```rust,no_run
//! use soak_harness::{HarnessConfig, InvokerConfig, run_harness};
//!
//! let config = HarnessConfig {
//!     repetitions: 10,
//!     invoker: InvokerConfig::new("./tester", "./reliable"),
//!     ..Default::default()
//! };
//! let summary = run_harness(&config, &mut std::io::stdout()).unwrap();
//! print!("{}", summary.render());
//! ```

pub mod config;
pub mod harness;
pub mod logging;
pub mod runner;
pub mod session;
pub mod trial;

// Re-export runner types
pub use runner::{RunReport, RunSummary};

// Re-export harness types
pub use harness::{HarnessConfig, HarnessError, HarnessResult, RunOptions, run_harness, run_trials};

// Re-export trial types and backends
pub use trial::{
    Classifier, Invocation, Invoker, InvokerConfig, MarkerClassifier, MarkerMode, ProcessInvoker,
    ScriptedInvoker, StderrMode, TrialPlan, TrialResult, TrialSpec, Verdict, VerdictPolicy,
};

// Re-export session management
pub use session::{Session, cleanup_old_sessions, list_sessions};
