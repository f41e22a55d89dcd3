pub mod driver;
pub mod types;

pub use driver::{RunOptions, run_harness, run_trials};
pub use types::{HarnessConfig, HarnessError, HarnessResult};
