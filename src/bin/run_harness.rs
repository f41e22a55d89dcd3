//! Fixed legacy soak: `./tester --seed S -w W ./reliable` for 100 windows x seeds 1..5.

use soak_harness::{HarnessConfig, InvokerConfig, run_harness};
use std::process::ExitCode;

fn main() -> ExitCode {
    soak_harness::logging::init_tracing(false, tracing::Level::WARN);

    let config = HarnessConfig {
        repetitions: 100,
        seeds: (1..=5).collect(),
        aux_seed: chrono::Utc::now().timestamp_micros() as u64,
        invoker: InvokerConfig::new("./tester", "./reliable"),
        ..Default::default()
    };

    eprintln!("Auxiliary seed: {}", config.aux_seed);

    match run_harness(&config, &mut std::io::stdout()) {
        Ok(summary) => {
            println!();
            print!("{}", summary.render());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Harness failed: {}", e);
            ExitCode::from(2)
        }
    }
}
