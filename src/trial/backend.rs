//! Invocation backends for running one trial.
//!
//! This module provides a unified interface for different ways of running a trial:
//! - `ProcessInvoker` spawns the driver binary and captures its stdout
//! - `ScriptedInvoker` answers from a closure (tests, dry runs)

use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use super::types::TrialSpec;
use crate::harness::types::{HarnessError, HarnessResult};

/// Poll interval while waiting for subject output
const READ_POLL: Duration = Duration::from_millis(50);
/// Poll interval while waiting for the subject to exit after EOF
const EXIT_POLL: Duration = Duration::from_millis(10);
/// How long to keep collecting output after killing a timed-out subject
const KILL_DRAIN_WINDOW: Duration = Duration::from_millis(200);

/// Raw outcome of running one trial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Captured standard output
    pub output: String,
    /// Exit code (None if the process was killed or terminated by a signal)
    pub exit_code: Option<i32>,
    /// Whether the per-trial timeout fired
    pub timed_out: bool,
    /// Wall-clock duration
    pub duration: Duration,
}

impl Invocation {
    /// A run that exited normally with status 0
    pub fn completed(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            exit_code: Some(0),
            timed_out: false,
            duration: Duration::ZERO,
        }
    }

    /// A run that was killed after the timeout, with whatever it printed so far
    pub fn timed_out(partial_output: impl Into<String>) -> Self {
        Self {
            output: partial_output.into(),
            exit_code: None,
            timed_out: true,
            duration: Duration::ZERO,
        }
    }

    /// Override the exit code
    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }
}

/// Trait for trial backends
///
/// Implementations must be shareable across worker threads.
pub trait Invoker: Send + Sync {
    /// Run one trial to completion and return its captured output.
    ///
    /// An `Err` means the test environment is broken and aborts the run.
    fn invoke(&self, spec: &TrialSpec) -> HarnessResult<Invocation>;

    /// The argv this backend would run for a trial
    fn command_line(&self, spec: &TrialSpec) -> Vec<String>;

    /// Get the source type identifier (e.g., "process", "scripted")
    fn source_type(&self) -> &str;
}

/// What happens to the subject's standard error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StderrMode {
    /// Pass through to the harness's own stderr
    #[default]
    Inherit,
    /// Send to the null device
    Discard,
}

/// Configuration for process-based invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokerConfig {
    /// Driver executable (e.g. `./tester`)
    pub driver: PathBuf,
    /// Arguments placed before the trial flags
    pub driver_args: Vec<String>,
    /// Subject executable handed to the driver as the final positional argument
    pub subject: PathBuf,
    /// Flag carrying the seed
    pub seed_flag: String,
    /// Flag carrying the window size
    pub window_flag: String,
    /// Flag carrying the auxiliary parameter; not passed when unset
    pub aux_flag: Option<String>,
    /// Per-trial timeout; None waits forever
    pub timeout: Option<Duration>,
    /// Standard error handling
    pub stderr: StderrMode,
    /// Extra environment variables for the driver
    pub env: Vec<(String, String)>,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            driver: PathBuf::from("./tester"),
            driver_args: Vec::new(),
            subject: PathBuf::from("./reliable"),
            seed_flag: "--seed".to_string(),
            window_flag: "-w".to_string(),
            aux_flag: None,
            timeout: None,
            stderr: StderrMode::Inherit,
            env: Vec::new(),
        }
    }
}

impl InvokerConfig {
    /// Create a config for the given driver and subject
    pub fn new(driver: impl Into<PathBuf>, subject: impl Into<PathBuf>) -> Self {
        Self {
            driver: driver.into(),
            subject: subject.into(),
            ..Default::default()
        }
    }

    /// Add an argument before the trial flags
    pub fn driver_arg(mut self, arg: impl Into<String>) -> Self {
        self.driver_args.push(arg.into());
        self
    }

    /// Add multiple arguments before the trial flags
    pub fn driver_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.driver_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the seed and window flag names
    pub fn flags(mut self, seed_flag: impl Into<String>, window_flag: impl Into<String>) -> Self {
        self.seed_flag = seed_flag.into();
        self.window_flag = window_flag.into();
        self
    }

    /// Pass the auxiliary parameter under this flag
    pub fn aux_flag(mut self, flag: impl Into<String>) -> Self {
        self.aux_flag = Some(flag.into());
        self
    }

    /// Set the per-trial timeout
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the stderr handling
    pub fn stderr(mut self, mode: StderrMode) -> Self {
        self.stderr = mode;
        self
    }

    /// Add an environment variable for the driver
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Arguments passed to the driver for a trial
    pub fn args_for(&self, spec: &TrialSpec) -> Vec<String> {
        let mut args = self.driver_args.clone();
        args.push(self.seed_flag.clone());
        args.push(spec.seed.to_string());
        args.push(self.window_flag.clone());
        args.push(spec.window.to_string());
        if let Some(flag) = &self.aux_flag {
            args.push(flag.clone());
            args.push(spec.auxiliary.to_string());
        }
        args.push(self.subject.to_string_lossy().into_owned());
        args
    }
}

/// Process-based backend
///
/// Spawns the driver once per trial with stdout piped, drains stdout to EOF,
/// then reaps the child before returning.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    config: InvokerConfig,
}

impl ProcessInvoker {
    /// Create a new process backend with the given configuration
    pub fn new(config: InvokerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    fn program(&self) -> String {
        self.config.driver.to_string_lossy().into_owned()
    }
}

impl Invoker for ProcessInvoker {
    fn invoke(&self, spec: &TrialSpec) -> HarnessResult<Invocation> {
        let start = Instant::now();
        let args = self.config.args_for(spec);
        tracing::debug!(ordinal = spec.ordinal, program = %self.program(), ?args, "spawning trial");

        let stderr = match self.config.stderr {
            StderrMode::Inherit => Stdio::inherit(),
            StderrMode::Discard => Stdio::null(),
        };
        let mut command = Command::new(&self.config.driver);
        command
            .args(&args)
            .envs(self.config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(stderr);
        // With a timeout the driver leads its own process group, so the kill
        // reaches the subject it launched too. Without one it stays in ours
        // and receives terminal signals such as Ctrl-C.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            if self.config.timeout.is_some() {
                command.process_group(0);
            }
        }
        let mut child = command
            .spawn()
            .map_err(|source| HarnessError::Spawn {
                program: self.program(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HarnessError::Process("child stdout was not captured".to_string()))?;
        let rx = spawn_reader(stdout);

        let deadline = self.config.timeout.map(|t| start + t);
        let mut output = Vec::new();
        let mut timed_out = !drain_until_eof(&rx, &mut output, deadline);

        let status = if timed_out {
            kill_and_reap(&mut child)?;
            None
        } else {
            match wait_with_deadline(&mut child, deadline)? {
                Some(status) => Some(status),
                None => {
                    timed_out = true;
                    kill_and_reap(&mut child)?;
                    None
                }
            }
        };

        if timed_out {
            drain_for(&rx, &mut output, KILL_DRAIN_WINDOW);
        }

        Ok(Invocation {
            output: String::from_utf8_lossy(&output).into_owned(),
            exit_code: status.and_then(|s| s.code()),
            timed_out,
            duration: start.elapsed(),
        })
    }

    fn command_line(&self, spec: &TrialSpec) -> Vec<String> {
        let mut argv = vec![self.program()];
        argv.extend(self.config.args_for(spec));
        argv
    }

    fn source_type(&self) -> &str {
        "process"
    }
}

type Script = Box<dyn Fn(&TrialSpec) -> HarnessResult<Invocation> + Send + Sync>;

/// Closure-backed invoker for tests and dry runs
pub struct ScriptedInvoker {
    script: Script,
}

impl ScriptedInvoker {
    /// Answer each trial with the closure's result
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&TrialSpec) -> HarnessResult<Invocation> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
        }
    }

    /// Answer each trial with a completed run printing the closure's text
    pub fn outputs<F>(output: F) -> Self
    where
        F: Fn(&TrialSpec) -> String + Send + Sync + 'static,
    {
        Self::new(move |spec| Ok(Invocation::completed(output(spec))))
    }
}

impl std::fmt::Debug for ScriptedInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedInvoker").finish_non_exhaustive()
    }
}

impl Invoker for ScriptedInvoker {
    fn invoke(&self, spec: &TrialSpec) -> HarnessResult<Invocation> {
        (self.script)(spec)
    }

    fn command_line(&self, spec: &TrialSpec) -> Vec<String> {
        vec![
            "<scripted>".to_string(),
            format!("seed={}", spec.seed),
            format!("window={}", spec.window),
        ]
    }

    fn source_type(&self) -> &str {
        "scripted"
    }
}

fn spawn_reader(mut reader: ChildStdout) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buffer = [0u8; 4096];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(size) => {
                    if tx.send(buffer[..size].to_vec()).is_err() {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    });
    rx
}

/// Collect output until the reader hits EOF. Returns false if the deadline
/// passed first.
fn drain_until_eof(rx: &Receiver<Vec<u8>>, output: &mut Vec<u8>, deadline: Option<Instant>) -> bool {
    loop {
        let poll = match deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left.is_zero() {
                    return false;
                }
                left.min(READ_POLL)
            }
            None => READ_POLL,
        };

        match rx.recv_timeout(poll) {
            Ok(chunk) => output.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return true,
        }
    }
}

fn drain_for(rx: &Receiver<Vec<u8>>, output: &mut Vec<u8>, window: Duration) {
    let start = Instant::now();
    while start.elapsed() < window {
        match rx.recv_timeout(EXIT_POLL) {
            Ok(chunk) => output.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Wait for exit. Returns None if the deadline passed with the child still running.
fn wait_with_deadline(child: &mut Child, deadline: Option<Instant>) -> HarnessResult<Option<ExitStatus>> {
    let Some(deadline) = deadline else {
        return Ok(Some(child.wait()?));
    };

    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(EXIT_POLL);
    }
}

/// Kill the driver's whole process group, then reap the driver itself.
#[cfg(unix)]
fn kill_and_reap(child: &mut Child) -> HarnessResult<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
        // ESRCH: the group is already gone
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => {
            tracing::warn!(error = %err, pid = child.id(), "failed to kill timed-out process group");
            kill_child(child);
        }
    }
    child.wait()?;
    Ok(())
}

#[cfg(not(unix))]
fn kill_and_reap(child: &mut Child) -> HarnessResult<()> {
    kill_child(child);
    child.wait()?;
    Ok(())
}

fn kill_child(child: &mut Child) {
    if let Err(err) = child.kill() {
        // InvalidInput means it already exited
        if err.kind() != ErrorKind::InvalidInput {
            tracing::warn!(error = %err, "failed to kill timed-out subject");
        }
    }
}
