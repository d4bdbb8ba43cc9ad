//! Background `lintall:` workers.
//!
//! Each lint worker is a long-running shell command started once, before the
//! mount and transform stages. Its output is forwarded line by line to the
//! progress channel. Lint results never abort a build; they are collected
//! when the handles are joined.

use crate::events::{Reporter, WorkerState};
use crate::exec::{forward_lines, shell_command};
use crate::workers::WorkerSpec;
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, OnceLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Worker id suffix that turns on type-checker state tracking.
pub const TSC_SUFFIX: &str = ":tsc";

/// A lint worker that did not finish cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintFailure {
    pub id: String,
    pub message: String,
}

/// A running lint worker.
#[derive(Debug)]
pub struct LintHandle {
    pub id: String,
    handle: JoinHandle<Result<(), String>>,
}

impl LintHandle {
    /// Wait for the worker to exit.
    pub async fn join(self) -> Result<(), LintFailure> {
        let id = self.id;
        match self.handle.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(message)) => Err(LintFailure { id, message }),
            Err(e) => Err(LintFailure {
                id,
                message: format!("lint task failed: {e}"),
            }),
        }
    }
}

/// Start a lint worker in the background.
#[must_use]
pub fn spawn_lint(worker: Arc<WorkerSpec>, root: PathBuf, reporter: Reporter) -> LintHandle {
    let id = worker.id.clone();
    reporter.update(&id, WorkerState::Running);
    let handle = tokio::spawn(async move {
        let result = run_lint(&worker, &root, &reporter).await;
        let error = result.as_ref().err().cloned();
        if let Some(message) = &error {
            warn!(worker = %worker.id, "{message}");
        }
        reporter.complete(&worker.id, error);
        result
    });
    LintHandle { id, handle }
}

/// Join every handle. Never returns early; all failures are collected.
pub async fn join_lints(handles: Vec<LintHandle>) -> Vec<LintFailure> {
    futures::future::join_all(handles.into_iter().map(LintHandle::join))
        .await
        .into_iter()
        .filter_map(Result::err)
        .collect()
}

async fn run_lint(worker: &WorkerSpec, root: &Path, reporter: &Reporter) -> Result<(), String> {
    debug!(worker = %worker.id, command = %worker.command, "starting lint worker");

    let mut child = shell_command(&worker.command, root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to start {:?}: {e}", worker.command))?;

    let tracks_tsc = worker.id.ends_with(TSC_SUFFIX);
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let forward_stdout = async {
        if let Some(stdout) = stdout {
            forward_lines(stdout, |line| {
                if tracks_tsc {
                    handle_tsc_line(&worker.id, line, reporter);
                } else {
                    reporter.log(&worker.id, line);
                }
            })
            .await;
        }
    };
    let forward_stderr = async {
        if let Some(stderr) = stderr {
            forward_lines(stderr, |line| reporter.error(&worker.id, line)).await;
        }
    };
    tokio::join!(forward_stdout, forward_stderr);

    let status = child
        .wait()
        .await
        .map_err(|e| format!("failed to wait for {:?}: {e}", worker.command))?;
    if status.success() {
        Ok(())
    } else {
        Err(match status.code() {
            Some(code) => format!("exited with code {code}"),
            None => "terminated by signal".to_string(),
        })
    }
}

/// Type-checker output signals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TscSignals {
    /// The line started with a clear-screen sequence.
    pub reset: bool,
    pub state: Option<WorkerState>,
    /// The line with clear-screen sequences removed.
    pub text: String,
}

/// Inspect one line of type-checker output.
#[must_use]
pub fn tsc_signals(line: &str) -> TscSignals {
    // Cursor-home usually accompanies a clear but does not signal one by itself.
    const CLEAR_SEQUENCES: &[&str] = &["\x1bc", "\x1b[2J", "\x1b[3J"];
    const CURSOR_HOME: &str = "\x1b[H";

    let reset = CLEAR_SEQUENCES.iter().any(|seq| line.contains(seq));
    let text = if reset {
        CLEAR_SEQUENCES
            .iter()
            .chain(std::iter::once(&CURSOR_HOME))
            .fold(line.to_string(), |acc, seq| acc.replace(seq, ""))
    } else {
        line.to_string()
    };

    // tsc prints "Found N errors. Watching for file changes." on one line.
    let state = if found_errors(&text).is_some_and(|n| n > 0) {
        Some(WorkerState::Error)
    } else if text.contains("Watching for file changes") {
        Some(WorkerState::Watching)
    } else {
        None
    };

    TscSignals { reset, state, text }
}

fn found_errors(text: &str) -> Option<u64> {
    static FOUND: OnceLock<Option<Regex>> = OnceLock::new();
    let re = FOUND
        .get_or_init(|| Regex::new(r"Found (\d+) errors?").ok())
        .as_ref()?;
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn handle_tsc_line(id: &str, line: &str, reporter: &Reporter) {
    let signals = tsc_signals(line);
    if signals.reset {
        reporter.reset(id);
    }
    if let Some(state) = signals.state {
        reporter.update(id, state);
    }
    if !signals.text.trim().is_empty() {
        reporter.log(id, signals.text);
    }
}
