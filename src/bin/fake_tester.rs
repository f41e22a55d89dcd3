//! # Fake Tester
//!
//! Stand-in for the real `tester` driver, used by the integration tests and for
//! trying the harness without the real subject. It accepts the same command
//! line (`--seed S -w W TARGET`), pretends to run `--total` sub-checks and
//! prints a `passed/total` line.
//!
//! Behaviour is controlled through the environment:
//!
//! - `FAKE_TESTER_FAIL_SEEDS`: comma-separated seeds that report one failed check
//! - `FAKE_TESTER_HANG_SEEDS`: comma-separated seeds that sleep for a minute
//!   before printing anything further
//! - `FAKE_TESTER_EXIT_CODE`: exit status to return

use clap::{Arg, Command, value_parser};
use std::{env, process::ExitCode, thread, time::Duration};

fn seeds_from_env(name: &str) -> Vec<u64> {
    env::var(name)
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect()
}

fn main() -> ExitCode {
    let matches = Command::new("fake_tester")
        .about("Deterministic stand-in for the reliable-transport tester")
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("SEED")
                .value_parser(value_parser!(u64))
                .default_value("1"),
        )
        .arg(
            Arg::new("window")
                .short('w')
                .value_name("WINDOW")
                .value_parser(value_parser!(u32))
                .default_value("1"),
        )
        .arg(
            Arg::new("total")
                .long("total")
                .value_name("N")
                .value_parser(value_parser!(u32))
                .default_value("14"),
        )
        .arg(Arg::new("target").required(true))
        .get_matches();

    let seed = matches.get_one::<u64>("seed").copied().unwrap_or(1);
    let window = matches.get_one::<u32>("window").copied().unwrap_or(1);
    let total = matches.get_one::<u32>("total").copied().unwrap_or(14);
    let target = matches
        .get_one::<String>("target")
        .cloned()
        .unwrap_or_default();

    println!("Testing {} (seed {}, window {})", target, seed, window);

    if seeds_from_env("FAKE_TESTER_HANG_SEEDS").contains(&seed) {
        println!("waiting for peer...");
        thread::sleep(Duration::from_secs(60));
    }

    let failing = seeds_from_env("FAKE_TESTER_FAIL_SEEDS").contains(&seed);
    let failed_check = if failing { Some(1 + (window % total.max(1))) } else { None };

    let mut passed = 0;
    for check in 1..=total {
        if Some(check) == failed_check {
            println!("  check {:>2}: FAILED", check);
        } else {
            println!("  check {:>2}: ok", check);
            passed += 1;
        }
    }
    println!("{}/{}", passed, total);

    let code = env::var("FAKE_TESTER_EXIT_CODE")
        .ok()
        .and_then(|s| s.parse::<u8>().ok())
        .unwrap_or(0);
    ExitCode::from(code)
}
