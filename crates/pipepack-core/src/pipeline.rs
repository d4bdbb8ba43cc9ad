//! Build orchestration.
//!
//! Stage order:
//! 1. classify workers, load the import map, resolve plugins, parse mounts
//! 2. prepare output directories and copy `web_modules`
//! 3. start lint workers in the background
//! 4. mount stage
//! 5. transform dispatch
//! 6. join lint workers
//! 7. bundle stage, if enabled
//!
//! Everything in step 1 is validated before anything touches disk.

use crate::bundle::{run_bundle, BundleJob};
use crate::config::BuildConfig;
use crate::dispatch::{dispatch, DispatchContext, TransformError};
use crate::error::Error;
use crate::events::Reporter;
use crate::imports::{ImportMap, IMPORT_MAP_FILE};
use crate::lint::{join_lints, spawn_lint, LintFailure};
use crate::mount::{parse_mounts, run_mounts};
use crate::plugin::PluginRegistry;
use crate::sources::{compile_excludes, enumerate_sources};
use crate::workers::{classify, WorkerCategory};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Name of the intermediate directory used while bundling.
pub const INTERMEDIATE_DIR: &str = ".build";

/// Name of the dependency directory inside the build tree.
pub const WEB_MODULES_DIR: &str = "web_modules";

/// Resolved directories for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    pub root: PathBuf,
    pub include_dir: PathBuf,
    /// Final output directory.
    pub final_dir: PathBuf,
    /// Where stages write. Same as `final_dir` unless bundling.
    pub build_dir: PathBuf,
    /// Transformed sources go here.
    pub dist_dir: PathBuf,
    /// Installed dependencies in the project.
    pub web_modules_dir: PathBuf,
}

impl BuildLayout {
    #[must_use]
    pub fn new(root: &Path, config: &BuildConfig) -> Self {
        let final_dir = root.join(&config.out);
        let build_dir = if config.bundle.enabled {
            root.join(INTERMEDIATE_DIR)
        } else {
            final_dir.clone()
        };
        let dist = config.dist_relative();
        let dist_dir = if dist.is_empty() {
            build_dir.clone()
        } else {
            build_dir.join(dist)
        };
        Self {
            root: root.to_path_buf(),
            include_dir: config.include_dir(root),
            final_dir,
            build_dir,
            dist_dir,
            web_modules_dir: root.join(&config.web_modules),
        }
    }

    #[must_use]
    pub fn import_map_path(&self) -> PathBuf {
        self.web_modules_dir.join(IMPORT_MAP_FILE)
    }
}

/// Result of a completed run.
#[derive(Debug)]
pub enum BuildOutcome {
    /// No build or plugin workers are configured.
    NothingToBuild,
    Built(BuildReport),
}

impl BuildOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        match self {
            Self::NothingToBuild => true,
            Self::Built(report) => report.is_success(),
        }
    }
}

/// Summary of a run that got past setup.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub files_written: usize,
    pub files_skipped: usize,
    pub files_mounted: u64,
    pub failures: Vec<TransformError>,
    pub lint_failures: Vec<LintFailure>,
    pub bundled: bool,
    pub output_dir: PathBuf,
}

impl BuildReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.lint_failures.is_empty()
    }
}

/// A configured build.
#[derive(Debug)]
pub struct Pipeline {
    root: PathBuf,
    config: BuildConfig,
    plugins: PluginRegistry,
    reporter: Reporter,
}

impl Pipeline {
    /// A pipeline for `root` with the built-in plugins and no event receiver.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, config: BuildConfig) -> Self {
        let root = root.into();
        let root = dunce::canonicalize(&root).unwrap_or(root);
        Self {
            root,
            config,
            plugins: PluginRegistry::with_builtins(),
            reporter: Reporter::silent(),
        }
    }

    #[must_use]
    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    #[must_use]
    pub fn layout(&self) -> BuildLayout {
        BuildLayout::new(&self.root, &self.config)
    }

    /// Run the build.
    ///
    /// Fatal errors (configuration, mount, bundle) are returned as `Err`.
    /// Per-file and lint failures are collected in the report.
    pub async fn run(&self) -> Result<BuildOutcome, Error> {
        let layout = self.layout();
        let reporter = &self.reporter;
        let bundle = &self.config.bundle;

        let classified = classify(
            &self.config.scripts,
            bundle.enabled.then_some(bundle.bundler.as_str()),
        );
        debug!(
            workers = classified.workers.len(),
            extensions = ?classified.index.extensions(),
            "classified workers"
        );

        let import_map = ImportMap::load(&layout.import_map_path())?;
        let plugins = self.plugins.resolve(&classified)?;
        let mounts = parse_mounts(
            classified.of(WorkerCategory::Mount).map(|w| &**w),
            &layout.root,
        )?;

        if !classified.has_transform_workers() {
            warn!("no build or plugin workers configured, nothing to build");
            return Ok(BuildOutcome::NothingToBuild);
        }

        prepare_dirs(&layout).await?;

        let lints: Vec<_> = classified
            .of(WorkerCategory::LintAll)
            .map(|w| spawn_lint(w.clone(), layout.root.clone(), reporter.clone()))
            .collect();

        let files_mounted = run_mounts(&mounts, &layout.build_dir, reporter).await?;

        let excludes = compile_excludes(&self.config.exclude);
        let include_dir = layout.include_dir.clone();
        let files = tokio::task::spawn_blocking(move || enumerate_sources(&include_dir, &excludes))
            .await
            .map_err(|e| Error::other(format!("source enumeration failed: {e}")))??;
        info!(files = files.len(), include = %layout.include_dir.display(), "enumerated sources");

        let ctx = DispatchContext {
            root: &layout.root,
            include_root: &layout.include_dir,
            dist_root: &layout.dist_dir,
            import_map: &import_map,
            plugins: &plugins,
            reporter,
        };
        let dispatched = dispatch(ctx, &classified, &files).await;

        let lint_failures = join_lints(lints).await;
        for failure in &lint_failures {
            warn!(worker = %failure.id, "{}", failure.message);
        }

        let mut report = BuildReport {
            files_written: dispatched.written.len(),
            files_skipped: dispatched.skipped,
            files_mounted,
            failures: dispatched.failures,
            lint_failures,
            bundled: false,
            output_dir: layout.final_dir.clone(),
        };

        if let Some(marker) = classified.bundle_marker() {
            let job = BundleJob {
                id: marker.id.clone(),
                root: layout.root.clone(),
                build_dir: layout.build_dir.clone(),
                final_dir: layout.final_dir.clone(),
                dist_dir: layout.dist_dir.clone(),
                bundler: bundle.bundler.clone(),
                entry: bundle.entry.clone(),
            };
            run_bundle(&job, reporter).await?;
            report.bundled = true;
        }

        info!(
            written = report.files_written,
            skipped = report.files_skipped,
            failed = report.failures.len(),
            "build finished"
        );
        Ok(BuildOutcome::Built(report))
    }
}

/// Clear the final directory, create the build directory and copy `web_modules` in.
async fn prepare_dirs(layout: &BuildLayout) -> Result<(), Error> {
    let layout = layout.clone();
    tokio::task::spawn_blocking(move || -> Result<(), Error> {
        pipepack_util::fs::remove_dir_all_if_exists(&layout.final_dir)?;
        if layout.build_dir != layout.final_dir {
            pipepack_util::fs::remove_dir_all_if_exists(&layout.build_dir)?;
        }
        std::fs::create_dir_all(&layout.build_dir)?;

        if layout.web_modules_dir.is_dir() {
            let copied = pipepack_util::fs::copy_dir_all(
                &layout.web_modules_dir,
                &layout.build_dir.join(WEB_MODULES_DIR),
            )?;
            debug!(files = copied, "copied web_modules");
        }
        Ok(())
    })
    .await
    .map_err(|e| Error::other(format!("directory preparation failed: {e}")))?
}
