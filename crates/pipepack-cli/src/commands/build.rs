//! `pipepack build` command implementation.

use miette::{miette, IntoDiagnostic, Result};
use pipepack_core::events::drain_events;
use pipepack_core::version::SCHEMA_VERSION;
use pipepack_core::{
    BuildConfig, BuildOutcome, BuildReport, Error, MsgLevel, Pipeline, PipelineEvent, Reporter,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Build command action.
#[derive(Debug, Clone)]
pub struct BuildAction {
    pub cwd: PathBuf,
    pub config_path: Option<PathBuf>,
    pub out: Option<String>,
    /// `Some` when `--bundle` or `--no-bundle` was passed.
    pub bundle: Option<bool>,
}

/// Summary printed as the last stdout line with `--json`.
#[derive(Serialize)]
struct BuildSummaryJson {
    schema_version: u32,
    ok: bool,
    cwd: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    nothing_to_build: bool,
    files_written: usize,
    files_skipped: usize,
    files_mounted: u64,
    bundled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dir: Option<String>,
    failures: Vec<FailureJson>,
    lint_failures: Vec<FailureJson>,
    notes: Vec<String>,
}

#[derive(Serialize)]
struct FailureJson {
    worker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    message: String,
}

impl BuildSummaryJson {
    fn new(cwd: &Path) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            ok: true,
            cwd: cwd.display().to_string(),
            code: None,
            message: None,
            nothing_to_build: false,
            files_written: 0,
            files_skipped: 0,
            files_mounted: 0,
            bundled: false,
            output_dir: None,
            failures: Vec::new(),
            lint_failures: Vec::new(),
            notes: Vec::new(),
        }
    }

    fn from_error(cwd: &Path, err: &Error) -> Self {
        Self {
            ok: false,
            code: Some(err.code()),
            message: Some(err.to_string()),
            ..Self::new(cwd)
        }
    }

    fn from_report(cwd: &Path, report: &BuildReport) -> Self {
        Self {
            ok: report.is_success(),
            files_written: report.files_written,
            files_skipped: report.files_skipped,
            files_mounted: report.files_mounted,
            bundled: report.bundled,
            output_dir: Some(report.output_dir.display().to_string()),
            failures: report
                .failures
                .iter()
                .map(|f| FailureJson {
                    worker: f.worker.clone(),
                    path: Some(f.path.display().to_string()),
                    message: f.message.clone(),
                })
                .collect(),
            lint_failures: report
                .lint_failures
                .iter()
                .map(|f| FailureJson {
                    worker: f.id.clone(),
                    path: None,
                    message: f.message.clone(),
                })
                .collect(),
            ..Self::new(cwd)
        }
    }
}

/// Run the build command.
pub fn run(action: BuildAction, json: bool) -> Result<()> {
    let mut config = match BuildConfig::load(&action.cwd, action.config_path.as_deref()) {
        Ok(config) => config,
        Err(err) => return fail(&action.cwd, &err, json),
    };
    if let Some(out) = action.out {
        config.out = out;
    }
    if let Some(bundle) = action.bundle {
        config.bundle.enabled = bundle;
    }

    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    let result = runtime.block_on(build(&action.cwd, config, json));

    match result {
        Ok(BuildOutcome::NothingToBuild) => {
            if json {
                let summary = BuildSummaryJson {
                    nothing_to_build: true,
                    notes: vec!["no build: or plugin: workers configured".to_string()],
                    ..BuildSummaryJson::new(&action.cwd)
                };
                print_json(&summary)?;
            } else {
                eprintln!("No build or plugin workers configured, nothing to build.");
            }
            Ok(())
        }
        Ok(BuildOutcome::Built(report)) => {
            if json {
                print_json(&BuildSummaryJson::from_report(&action.cwd, &report))?;
            } else {
                print_human_summary(&report);
            }
            if report.is_success() {
                Ok(())
            } else {
                std::process::exit(1);
            }
        }
        Err(err) => fail(&action.cwd, &err, json),
    }
}

/// Run the pipeline while rendering its events as they arrive.
async fn build(cwd: &Path, config: BuildConfig, json: bool) -> Result<BuildOutcome, Error> {
    let (reporter, mut rx) = Reporter::channel();
    let pipeline = Pipeline::new(cwd, config).with_reporter(reporter);

    let run = pipeline.run();
    tokio::pin!(run);

    let outcome = loop {
        tokio::select! {
            biased;
            Some(event) = rx.recv() => render_event(&event, json),
            outcome = &mut run => break outcome,
        }
    };

    for event in drain_events(&mut rx) {
        render_event(&event, json);
    }
    outcome
}

fn fail(cwd: &Path, err: &Error, json: bool) -> Result<()> {
    if json {
        print_json(&BuildSummaryJson::from_error(cwd, err))?;
        std::process::exit(1);
    }
    Err(miette!(code = err.code(), "{err}"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value).into_diagnostic()?);
    Ok(())
}

fn render_event(event: &PipelineEvent, json: bool) {
    if json {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
        return;
    }

    match event {
        PipelineEvent::WorkerUpdate { id, state, .. } => {
            eprintln!("[{id}] {}", state.as_str());
        }
        PipelineEvent::WorkerMsg { id, level, text } => {
            let text = text
                .strip_prefix(&format!("[{id}] "))
                .unwrap_or(text.as_str());
            match level {
                MsgLevel::Log => eprintln!("[{id}] {text}"),
                MsgLevel::Error => eprintln!("[{id}] error: {text}"),
            }
        }
        PipelineEvent::WorkerComplete { id, error: None } => eprintln!("[{id}] done"),
        PipelineEvent::WorkerComplete {
            id,
            error: Some(error),
        } => eprintln!("[{id}] failed: {error}"),
        PipelineEvent::WorkerReset { id } => {
            tracing::debug!(worker = %id, "worker output reset");
        }
        PipelineEvent::MissingWebModule { specifier } => {
            eprintln!(
                "warning: {specifier:?} is not in the import map; falling back to /web_modules/{specifier}.js"
            );
        }
    }
}

fn print_human_summary(report: &BuildReport) {
    eprintln!();
    if report.is_success() {
        eprintln!(
            "Built {} file(s) into {} ({} skipped, {} mounted{})",
            report.files_written,
            report.output_dir.display(),
            report.files_skipped,
            report.files_mounted,
            if report.bundled { ", bundled" } else { "" }
        );
        return;
    }

    for failure in &report.failures {
        eprintln!("  \u{2717} {failure}");
    }
    for failure in &report.lint_failures {
        eprintln!("  \u{2717} [{}] {}", failure.id, failure.message);
    }
    eprintln!(
        "Build failed: {} file(s) failed, {} lint worker(s) failed",
        report.failures.len(),
        report.lint_failures.len()
    );
}
