//! Transform dispatch.
//!
//! Build and plugin workers run one after another in declaration order. Each
//! worker processes the source files the extension index assigns to it, in
//! enumeration order. A failure is isolated to its file: it is reported and
//! the next file proceeds.

use crate::events::{Reporter, WorkerState};
use crate::exec::run_script;
use crate::imports::{rewrite_module, ImportMap, SpecifierWarning};
use crate::plugin::ResolvedPlugins;
use crate::remap::{remap, SCRIPT_EXTENSION};
use crate::sources::SourceFile;
use crate::workers::{Classified, WorkerCategory, WorkerSpec};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

/// A single file failed under a single worker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("[{worker}] {message}")]
pub struct TransformError {
    pub worker: String,
    pub path: PathBuf,
    pub message: String,
}

/// Everything the dispatcher needs besides the workers and files.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    /// Working root; build commands run here.
    pub root: &'a Path,
    /// Prefix stripped from source paths.
    pub include_root: &'a Path,
    /// Prefix output paths are placed under.
    pub dist_root: &'a Path,
    pub import_map: &'a ImportMap,
    pub plugins: &'a ResolvedPlugins,
    pub reporter: &'a Reporter,
}

/// Outcome of a dispatch run.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Output files written, in write order. A path appears once per write.
    pub written: Vec<PathBuf>,
    /// (worker, file) pairs that produced no output.
    pub skipped: usize,
    pub failures: Vec<TransformError>,
}

impl DispatchReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Where the output for `source` goes: include root replaced by `dist_root`,
/// extension remapped.
///
/// Returns `None` if `source` is not under `include_root`.
#[must_use]
pub fn output_path(source: &Path, include_root: &Path, dist_root: &Path) -> Option<PathBuf> {
    let relative = source.strip_prefix(include_root).ok()?;
    let mut out = dist_root.join(relative);
    if let Some(ext) = source.extension().and_then(|e| e.to_str()) {
        let mapped = remap(ext);
        if mapped != ext {
            out.set_extension(mapped);
        }
    }
    Some(out)
}

/// Run every Build/Plugin worker over the files it matches.
pub async fn dispatch(
    ctx: DispatchContext<'_>,
    classified: &Classified,
    files: &[SourceFile],
) -> DispatchReport {
    let mut report = DispatchReport::default();

    for worker in classified
        .workers
        .iter()
        .filter(|w| w.category.transforms_files())
    {
        ctx.reporter.update(&worker.id, WorkerState::Running);
        let failures_before = report.failures.len();

        let claimed = files.iter().filter(|f| {
            classified
                .index
                .get(&f.ext)
                .iter()
                .any(|w| Arc::ptr_eq(w, worker))
        });
        for file in claimed {
            match transform_file(ctx, worker, file).await {
                Ok(Some(written)) => report.written.push(written),
                Ok(None) => report.skipped += 1,
                Err(err) => {
                    warn!(worker = %worker.id, file = %file.path.display(), "{}", err.message);
                    ctx.reporter.error(&worker.id, err.to_string());
                    report.failures.push(err);
                }
            }
        }

        let failed = report.failures.len() - failures_before;
        let error = (failed > 0).then(|| format!("{failed} file(s) failed"));
        ctx.reporter.complete(&worker.id, error);
    }

    report
}

/// Transform one file with one worker. `Ok(None)` means the worker produced nothing.
async fn transform_file(
    ctx: DispatchContext<'_>,
    worker: &WorkerSpec,
    file: &SourceFile,
) -> Result<Option<PathBuf>, TransformError> {
    let fail = |message: String| TransformError {
        worker: worker.id.clone(),
        path: file.path.clone(),
        message,
    };

    let code = match worker.category {
        WorkerCategory::Build => run_build_worker(ctx, worker, file).await.map_err(fail)?,
        WorkerCategory::Plugin => run_plugin_worker(ctx, worker, file).await.map_err(fail)?,
        _ => return Ok(None),
    };

    let Some(code) = code else {
        debug!(worker = %worker.id, file = %file.path.display(), "no output, skipping");
        return Ok(None);
    };

    let out_path = output_path(&file.path, ctx.include_root, ctx.dist_root).ok_or_else(|| {
        fail(format!(
            "{} is outside {}",
            file.path.display(),
            ctx.include_root.display()
        ))
    })?;

    let code = if out_path.extension().is_some_and(|e| e == SCRIPT_EXTENSION) {
        rewrite_for_browser(ctx, &worker.id, &file.path, &code)
    } else {
        code
    };

    let target = out_path.clone();
    tokio::task::spawn_blocking(move || pipepack_util::fs::atomic_write(&target, code.as_bytes()))
        .await
        .map_err(|e| fail(format!("write task failed: {e}")))?
        .map_err(|e| fail(format!("failed to write {}: {e}", out_path.display())))?;

    debug!(worker = %worker.id, out = %out_path.display(), "wrote");
    Ok(Some(out_path))
}

async fn run_build_worker(
    ctx: DispatchContext<'_>,
    worker: &WorkerSpec,
    file: &SourceFile,
) -> Result<Option<String>, String> {
    let input = tokio::fs::read(&file.path)
        .await
        .map_err(|e| format!("failed to read {}: {e}", file.path.display()))?;

    let output = run_script(&worker.command, ctx.root, &input)
        .await
        .map_err(|e| format!("failed to run {:?}: {e}", worker.command))?;

    let stderr = output.stderr.trim_end();
    if !stderr.is_empty() {
        error!(worker = %worker.id, file = %file.path.display(), "{stderr}");
        ctx.reporter.error(&worker.id, stderr);
    }

    if !output.success() {
        return Err(format!(
            "{} exited with code {}",
            file.path.display(),
            output.exit_code
        ));
    }

    Ok((!output.stdout.is_empty()).then_some(output.stdout))
}

async fn run_plugin_worker(
    ctx: DispatchContext<'_>,
    worker: &WorkerSpec,
    file: &SourceFile,
) -> Result<Option<String>, String> {
    let plugin = ctx
        .plugins
        .get(&worker.id)
        .ok_or_else(|| format!("no plugin resolved for {:?}", worker.command))?;

    let path = file.path.clone();
    let output = tokio::task::spawn_blocking(move || plugin.build(&path))
        .await
        .map_err(|e| format!("plugin task failed: {e}"))?
        .map_err(|e| e.to_string())?;

    Ok(Some(output.result))
}

fn rewrite_for_browser(
    ctx: DispatchContext<'_>,
    worker_id: &str,
    source: &Path,
    code: &str,
) -> String {
    rewrite_module(code, ctx.import_map, |warning| match warning {
        SpecifierWarning::MissingExtension(spec) => {
            let text = format!(
                "{}: import {spec:?} is missing a file extension",
                source.display()
            );
            warn!(worker = %worker_id, "{text}");
            ctx.reporter.error(worker_id, text);
        }
        SpecifierWarning::MissingWebModule(spec) => {
            warn!(specifier = %spec, file = %source.display(), "bare import not found in import map");
            ctx.reporter.missing_web_module(spec);
        }
    })
}
