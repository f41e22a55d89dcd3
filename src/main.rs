use chrono::Utc;
use clap::{Parser, Subcommand};
use std::error::Error;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use soak_harness::config::{self, parse_seed_set, timeout_from_secs};
use soak_harness::logging;
use soak_harness::runner::RunReport;
use soak_harness::session::Session;
use soak_harness::trial::{
    Classifier, Invoker, InvokerConfig, MarkerClassifier, MarkerMode, ProcessInvoker, StderrMode,
    VerdictPolicy,
};
use soak_harness::{HarnessConfig, run_harness};

/// Soak Harness - parameterized soak testing of black-box subject binaries
#[derive(Parser, Debug)]
#[command(
    name = "soak-harness",
    about = "Run a subject binary across a seed x window matrix and tally full-score runs",
    after_help = "ENVIRONMENT VARIABLES:\n\
        SOAK_HARNESS_DRIVER           Driver executable\n\
        SOAK_HARNESS_SUBJECT          Subject executable\n\
        SOAK_HARNESS_REPETITIONS      Outer repetitions\n\
        SOAK_HARNESS_SEEDS            Seed set (e.g. 1-5)\n\
        SOAK_HARNESS_TIMEOUT          Per-trial timeout in seconds (0 = none)\n\
        SOAK_HARNESS_WORKERS          Concurrent trials\n\
        SOAK_HARNESS_EXPECTED_CHECKS  Checks per run (marker is N/N)\n\
        SOAK_HARNESS_SESSION_DIR      Base directory for sessions\n\
        RUST_LOG                      Log filter (overrides -v)"
)]
struct Args {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every trial of the matrix and print the score
    Run {
        #[command(flatten)]
        matrix: MatrixArgs,

        /// Do not echo subject output
        #[arg(long)]
        no_echo: bool,

        /// Print the run report as JSON (subject output is echoed to stderr)
        #[arg(long)]
        json: bool,

        /// Persist the run (report and failure logs) into this directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Persist the run into an auto-named session directory
        #[arg(long, short = 'k')]
        keep: bool,
    },

    /// Print the trial plan and command lines without running anything
    Plan {
        #[command(flatten)]
        matrix: MatrixArgs,

        /// Output the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify captured subject output read from a file ("-" for stdin)
    Classify {
        /// File holding the captured output
        input: PathBuf,

        /// Checks per run; the marker is N/N
        #[arg(long)]
        expected_checks: Option<u32>,

        /// Require the marker not to touch other digits
        #[arg(long)]
        strict_marker: bool,
    },
}

/// Options shared by `run` and `plan`
#[derive(clap::Args, Debug)]
struct MatrixArgs {
    /// Outer repetitions; the window size follows the repetition index
    #[arg(short, long)]
    repetitions: Option<u32>,

    /// Seed set: 1-5, 1,3,5 or 1-3,8
    #[arg(short, long)]
    seeds: Option<String>,

    /// Driver executable
    #[arg(long)]
    driver: Option<PathBuf>,

    /// Subject executable passed to the driver
    #[arg(long)]
    subject: Option<PathBuf>,

    /// Extra argument placed before the trial flags (repeatable)
    #[arg(long = "driver-arg", allow_hyphen_values = true)]
    driver_args: Vec<String>,

    /// Flag carrying the seed
    #[arg(long, default_value = "--seed", allow_hyphen_values = true)]
    seed_flag: String,

    /// Flag carrying the window size
    #[arg(long, default_value = "-w", allow_hyphen_values = true)]
    window_flag: String,

    /// Also pass the auxiliary parameter under this flag
    #[arg(long, allow_hyphen_values = true)]
    aux_flag: Option<String>,

    /// Key for the auxiliary parameter stream (default: clock)
    #[arg(long)]
    aux_seed: Option<u64>,

    /// Per-trial timeout in seconds (0 = none)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Concurrent trials
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Checks per run; the marker is N/N
    #[arg(long)]
    expected_checks: Option<u32>,

    /// Require the marker not to touch other digits (rejects "114/14")
    #[arg(long)]
    strict_marker: bool,

    /// Fail trials whose subject exits non-zero
    #[arg(long)]
    fail_on_nonzero_exit: bool,

    /// Discard subject stderr instead of passing it through
    #[arg(long)]
    quiet_stderr: bool,
}

impl MatrixArgs {
    /// Merge command-line options over the environment configuration
    fn to_config(&self) -> Result<HarnessConfig, Box<dyn Error>> {
        let env = config::get();

        let seeds = match &self.seeds {
            Some(s) => parse_seed_set(s)
                .ok_or_else(|| format!("Invalid seed set '{}'. Use e.g. 1-5, 1,3,5 or 1-3,8", s))?,
            None => env.matrix.seeds.clone(),
        };

        let timeout = match self.timeout {
            Some(secs) => timeout_from_secs(secs),
            None => env.subject.timeout(),
        };

        let mut invoker = InvokerConfig::new(
            self.driver.clone().unwrap_or_else(|| PathBuf::from(&env.subject.driver)),
            self.subject.clone().unwrap_or_else(|| PathBuf::from(&env.subject.subject)),
        )
        .driver_args(self.driver_args.iter().cloned())
        .flags(&self.seed_flag, &self.window_flag)
        .timeout(timeout)
        .stderr(if self.quiet_stderr {
            StderrMode::Discard
        } else {
            StderrMode::Inherit
        });
        if let Some(flag) = &self.aux_flag {
            invoker = invoker.aux_flag(flag);
        }

        let config = HarnessConfig {
            repetitions: self.repetitions.unwrap_or(env.matrix.repetitions),
            seeds,
            aux_seed: self.aux_seed.unwrap_or_else(clock_seed),
            invoker,
            expected_checks: self.expected_checks.unwrap_or(env.subject.expected_checks),
            marker_mode: marker_mode(self.strict_marker),
            policy: VerdictPolicy {
                fail_on_nonzero_exit: self.fail_on_nonzero_exit,
            },
            workers: self.workers.unwrap_or(env.matrix.workers),
        };
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init_tracing(args.log_json, logging::level_for_verbosity(args.verbose));

    match execute(args.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(2)
        }
    }
}

fn execute(command: Option<Commands>) -> Result<ExitCode, Box<dyn Error>> {
    match command {
        Some(Commands::Run {
            matrix,
            no_echo,
            json,
            output,
            keep,
        }) => {
            let config = matrix.to_config()?;

            // Only persist when asked to
            let session = match &output {
                Some(dir) => Some(Session::in_dir(dir)),
                None if keep => {
                    let subject_name = config
                        .invoker
                        .subject
                        .file_stem()
                        .map(|s| s.to_string_lossy().to_string())
                        .unwrap_or_else(|| "soak".to_string());
                    Some(Session::with_name(&subject_name).keep(true))
                }
                None => None,
            };
            if let Some(session) = &session {
                session.init()?;
            }

            // JSON runs carry it in the report
            if !json {
                eprintln!(
                    "Auxiliary seed: {} (rerun with --aux-seed {})",
                    config.aux_seed, config.aux_seed
                );
            }

            let started_at = Utc::now();
            let summary = if no_echo {
                run_harness(&config, &mut io::sink())?
            } else if json {
                run_harness(&config, &mut io::stderr())?
            } else {
                run_harness(&config, &mut io::stdout())?
            };

            let all_passed = summary.all_passed();
            let report = RunReport::new(&config, summary, started_at);

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!();
                print!("{}", report.summary.render());
            }

            if let Some(session) = &session {
                session.write_failures(&report.summary)?;
                session.write_report(&report)?;
                if !json {
                    println!("\nSession: {}", session.dir.display());
                }
            }
            io::stdout().flush()?;

            Ok(if all_passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }

        Some(Commands::Plan { matrix, json }) => {
            let config = matrix.to_config()?;
            let plan = config.plan();
            let invoker = ProcessInvoker::new(config.invoker.clone());

            if json {
                let specs: Vec<_> = plan.iter().collect();
                println!("{}", serde_json::to_string_pretty(&specs)?);
            } else {
                println!(
                    "# {} trials ({} repetitions x {} seeds), aux seed {}",
                    plan.total_trials(),
                    plan.repetitions,
                    plan.seeds.len(),
                    plan.aux_seed
                );
                for spec in plan.iter() {
                    println!(
                        "{:>5}  rep={:<4} seed={:<4} w={:<4} aux={:<3} {}",
                        spec.ordinal,
                        spec.repetition,
                        spec.seed,
                        spec.window,
                        spec.auxiliary,
                        invoker.command_line(&spec).join(" ")
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }

        Some(Commands::Classify {
            input,
            expected_checks,
            strict_marker,
        }) => {
            let mut text = String::new();
            if input.as_os_str() == "-" {
                io::stdin().read_to_string(&mut text)?;
            } else {
                text = String::from_utf8_lossy(&std::fs::read(&input)?).into_owned();
            }

            let classifier = MarkerClassifier::full_score(
                expected_checks.unwrap_or(config::get().subject.expected_checks),
                marker_mode(strict_marker),
            );
            let passed = classifier.classify(&text);
            println!("{} ({})", if passed { "pass" } else { "fail" }, classifier.describe());

            Ok(if passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }

        None => {
            println!("Soak Harness - parameterized soak testing of black-box subject binaries");
            println!();
            println!("Usage: soak-harness <COMMAND>");
            println!();
            println!("Commands:");
            println!("  run       Run every trial of the matrix and print the score");
            println!("  plan      Print the trial plan without running anything");
            println!("  classify  Classify captured subject output");
            println!();
            println!("Run with --help for more information.");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn marker_mode(strict: bool) -> MarkerMode {
    if strict {
        MarkerMode::Token
    } else {
        MarkerMode::Substring
    }
}

fn clock_seed() -> u64 {
    Utc::now().timestamp_micros() as u64
}
