pub mod backend;
pub mod classify;
pub mod plan;
pub mod types;

pub use backend::{Invocation, Invoker, InvokerConfig, ProcessInvoker, ScriptedInvoker, StderrMode};
pub use classify::{Classifier, DEFAULT_EXPECTED_CHECKS, MarkerClassifier, MarkerMode};
pub use plan::{AUX_MAX, AUX_MIN, TrialPlan, Trials};
pub use types::{TrialResult, TrialSpec, Verdict, VerdictPolicy};
