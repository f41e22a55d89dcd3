use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, mpsc};
use std::thread;

use crate::harness::types::{HarnessConfig, HarnessResult};
use crate::runner::RunSummary;
use crate::trial::{
    Classifier, Invocation, Invoker, ProcessInvoker, TrialPlan, TrialResult, TrialSpec, Verdict,
    VerdictPolicy,
};

/// Execution knobs for [`run_trials`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Number of concurrent trials (1 = strictly sequential)
    pub workers: usize,
    /// Exit-code policy
    pub policy: VerdictPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            policy: VerdictPolicy::default(),
        }
    }
}

/// Runs a soak described by `config` against the real driver binary.
///
/// Each trial's captured output is written to `echo` as soon as the trial
/// finishes. Returns the complete summary, or the first environment error.
pub fn run_harness(config: &HarnessConfig, echo: &mut dyn Write) -> HarnessResult<RunSummary> {
    config.validate()?;

    let plan = config.plan();
    let classifier = config.classifier();
    let invoker = ProcessInvoker::new(config.invoker.clone());
    let options = RunOptions {
        workers: config.workers,
        policy: config.policy,
    };

    tracing::info!(
        driver = %config.invoker.driver.display(),
        subject = %config.invoker.subject.display(),
        repetitions = config.repetitions,
        seeds = ?config.seeds,
        aux_seed = config.aux_seed,
        workers = config.workers,
        marker = %classifier.describe(),
        "starting soak run"
    );

    let summary = run_trials(&plan, &invoker, &classifier, options, echo)?;

    tracing::info!(
        passed = summary.passed_trials(),
        failed = summary.failed_trials(),
        total = summary.total_trials(),
        "soak run finished"
    );
    Ok(summary)
}

/// Runs every trial of `plan` exactly once.
///
/// With one worker the trials run strictly in generation order. With more,
/// a bounded pool runs them concurrently and this thread alone echoes and
/// records results; failures still come out in generation order, echo
/// follows completion order.
///
/// An `Err` from the invoker aborts the run; no summary is produced.
pub fn run_trials(
    plan: &TrialPlan,
    invoker: &dyn Invoker,
    classifier: &dyn Classifier,
    options: RunOptions,
    echo: &mut dyn Write,
) -> HarnessResult<RunSummary> {
    let total = plan.total_trials();
    let workers = options.workers.clamp(1, total.max(1));

    if workers == 1 {
        let mut summary = RunSummary::new(total);
        for spec in plan.iter() {
            let invocation = invoker.invoke(&spec)?;
            summary.record(finish_trial(spec, invocation, classifier, options.policy, echo));
        }
        return Ok(summary);
    }

    let queue = Mutex::new(plan.iter());
    let abort = AtomicBool::new(false);
    let (tx, rx) = mpsc::channel::<HarnessResult<(TrialSpec, Invocation)>>();

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let queue = &queue;
            let abort = &abort;
            scope.spawn(move || {
                while !abort.load(Ordering::Acquire) {
                    let next = queue.lock().ok().and_then(|mut trials| trials.next());
                    let Some(spec) = next else { break };

                    let outcome = invoker.invoke(&spec).map(|invocation| (spec, invocation));
                    let failed = outcome.is_err();
                    if failed {
                        abort.store(true, Ordering::Release);
                    }
                    if tx.send(outcome).is_err() || failed {
                        break;
                    }
                }
            });
        }
        drop(tx);

        let mut summary = RunSummary::new(total);
        let mut first_error = None;
        for outcome in rx {
            match outcome {
                Ok((spec, invocation)) if first_error.is_none() => {
                    summary.record(finish_trial(spec, invocation, classifier, options.policy, echo));
                }
                Ok(_) => {}
                Err(err) => {
                    abort.store(true, Ordering::Release);
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(summary),
        }
    })
}

fn finish_trial(
    spec: TrialSpec,
    invocation: Invocation,
    classifier: &dyn Classifier,
    policy: VerdictPolicy,
    echo: &mut dyn Write,
) -> TrialResult {
    if let Err(err) = echo.write_all(invocation.output.as_bytes()).and_then(|_| echo.flush()) {
        tracing::warn!(error = %err, "failed to echo trial output");
    }

    let result = TrialResult::judge(spec, invocation, classifier, policy);
    match result.verdict {
        Verdict::Passed => tracing::debug!(
            ordinal = spec.ordinal,
            seed = spec.seed,
            window = spec.window,
            duration_ms = result.duration_ms,
            "trial passed"
        ),
        Verdict::TimedOut => tracing::warn!(
            ordinal = spec.ordinal,
            seed = spec.seed,
            window = spec.window,
            duration_ms = result.duration_ms,
            "trial timed out"
        ),
        verdict => tracing::info!(
            ordinal = spec.ordinal,
            seed = spec.seed,
            window = spec.window,
            exit_code = ?result.exit_code,
            ?verdict,
            "trial failed"
        ),
    }
    result
}
