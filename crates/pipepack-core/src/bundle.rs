//! Bundle stage.
//!
//! Hands the intermediate build directory to an external bundler:
//!
//! 1. copy the intermediate tree into the final directory, minus
//!    `web_modules` and the dist directory (the bundler regenerates both)
//! 2. write a `package.json` without `name` and with `@babel/core`
//! 3. write a `.babelrc` enabling `import.meta`
//! 4. run `<bundler> build <entry> --out-dir <final>` in the intermediate directory
//! 5. delete the intermediate directory

use crate::error::Error;
use crate::events::{Reporter, WorkerState};
use crate::exec::forward_lines;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Version range added when the manifest has no `@babel/core`.
pub const BABEL_CORE_VERSION: &str = "^7.9.0";

/// Babel plugin needed for `import.meta` in bundled sources.
pub const IMPORT_META_PLUGIN: &str = "@babel/plugin-syntax-import-meta";

/// Inputs to the bundle stage.
#[derive(Debug, Clone)]
pub struct BundleJob {
    /// Bundle marker worker id (`bundle:<bundler>`).
    pub id: String,
    /// Working root; holds `package.json` and `node_modules`.
    pub root: PathBuf,
    /// Intermediate build directory.
    pub build_dir: PathBuf,
    /// Final output directory.
    pub final_dir: PathBuf,
    /// Dist directory inside `build_dir`.
    pub dist_dir: PathBuf,
    /// Bundler command; extra words become leading arguments.
    pub bundler: String,
    /// Entry file, relative to `build_dir`.
    pub entry: String,
}

impl BundleJob {
    fn fail(&self, message: impl Into<String>) -> Error {
        Error::Bundle {
            id: self.id.clone(),
            message: message.into(),
        }
    }
}

/// Run the bundle stage. Any failure is reported under the marker id and returned.
pub async fn run_bundle(job: &BundleJob, reporter: &Reporter) -> Result<(), Error> {
    reporter.update(&job.id, WorkerState::Running);

    match bundle(job, reporter).await {
        Ok(()) => {
            info!(worker = %job.id, out = %job.final_dir.display(), "bundle complete");
            reporter.complete(&job.id, None);
            Ok(())
        }
        Err(err) => {
            reporter.error(&job.id, err.to_string());
            reporter.complete(&job.id, Some(err.to_string()));
            Err(err)
        }
    }
}

async fn bundle(job: &BundleJob, reporter: &Reporter) -> Result<(), Error> {
    if job.build_dir != job.final_dir {
        let (src, dst) = (job.build_dir.clone(), job.final_dir.clone());
        let skip_web_modules = job.build_dir.join("web_modules");
        let skip_dist = job.dist_dir.clone();
        tokio::task::spawn_blocking(move || {
            pipepack_util::fs::copy_dir_filtered(&src, &dst, |path| {
                path != skip_web_modules && path != skip_dist
            })
        })
        .await
        .map_err(|e| job.fail(format!("copy task failed: {e}")))?
        .map_err(|e| job.fail(format!("failed to copy build output: {e}")))?;
    }

    let manifest = bundle_manifest(&job.root).map_err(|m| job.fail(m))?;
    write_json(&job.build_dir.join("package.json"), &manifest).map_err(|m| job.fail(m))?;
    write_json(&job.build_dir.join(".babelrc"), &babelrc(&job.root)).map_err(|m| job.fail(m))?;

    run_bundler(job, reporter).await?;

    if job.build_dir != job.final_dir {
        pipepack_util::fs::remove_dir_all_if_exists(&job.build_dir).map_err(|e| {
            job.fail(format!(
                "failed to remove {}: {e}",
                job.build_dir.display()
            ))
        })?;
    }
    Ok(())
}

/// The project manifest rewritten for the bundler.
///
/// `name` is removed so the bundler does not treat the output as a library,
/// and `devDependencies["@babel/core"]` is added unless already present.
pub fn bundle_manifest(root: &Path) -> Result<Value, String> {
    let path = root.join("package.json");
    let mut manifest = match std::fs::read_to_string(&path) {
        Ok(content) => serde_json::from_str::<Value>(&content)
            .map_err(|e| format!("failed to parse {}: {e}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Value::Object(Map::new()),
        Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
    };

    let object = manifest
        .as_object_mut()
        .ok_or_else(|| format!("{} is not a JSON object", path.display()))?;
    object.remove("name");

    let dev_deps = object
        .entry("devDependencies")
        .or_insert_with(|| Value::Object(Map::new()));
    let dev_deps = dev_deps
        .as_object_mut()
        .ok_or_else(|| format!("devDependencies in {} is not an object", path.display()))?;
    dev_deps
        .entry("@babel/core")
        .or_insert_with(|| Value::String(BABEL_CORE_VERSION.to_string()));

    Ok(manifest)
}

/// `.babelrc` enabling `import.meta`, pointing at the installed plugin if there is one.
#[must_use]
pub fn babelrc(root: &Path) -> Value {
    let installed = root.join("node_modules").join(IMPORT_META_PLUGIN);
    let plugin = if installed.exists() {
        installed.to_string_lossy().into_owned()
    } else {
        IMPORT_META_PLUGIN.to_string()
    };
    json!({ "plugins": [[plugin]] })
}

fn write_json(path: &Path, value: &Value) -> Result<(), String> {
    let mut content = serde_json::to_string_pretty(value)
        .map_err(|e| format!("failed to serialize {}: {e}", path.display()))?;
    content.push('\n');
    pipepack_util::fs::atomic_write(path, content.as_bytes())
        .map_err(|e| format!("failed to write {}: {e}", path.display()))
}

async fn run_bundler(job: &BundleJob, reporter: &Reporter) -> Result<(), Error> {
    let mut words = job.bundler.split_whitespace();
    let program = words.next().ok_or_else(|| job.fail("bundler is empty"))?;

    let mut cmd = Command::new(program);
    cmd.args(words)
        .arg("build")
        .arg(&job.entry)
        .arg("--out-dir")
        .arg(&job.final_dir)
        .current_dir(&job.build_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    debug!(worker = %job.id, command = ?cmd.as_std(), "running bundler");

    let mut child = cmd
        .spawn()
        .map_err(|e| job.fail(format!("failed to start {program:?}: {e}")))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let forward_stdout = async {
        if let Some(stdout) = stdout {
            forward_lines(stdout, |line| reporter.log(&job.id, line)).await;
        }
    };
    let forward_stderr = async {
        if let Some(stderr) = stderr {
            forward_lines(stderr, |line| reporter.error(&job.id, line)).await;
        }
    };
    tokio::join!(forward_stdout, forward_stderr);

    let status = child
        .wait()
        .await
        .map_err(|e| job.fail(format!("failed to wait for {program:?}: {e}")))?;
    if status.success() {
        Ok(())
    } else {
        Err(job.fail(match status.code() {
            Some(code) => format!("{program} exited with code {code}"),
            None => format!("{program} terminated by signal"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_manifest_absent_is_empty_object() {
        let dir = tempdir().unwrap();
        let manifest = bundle_manifest(dir.path()).unwrap();
        assert_eq!(
            manifest,
            json!({ "devDependencies": { "@babel/core": BABEL_CORE_VERSION } })
        );
    }

    #[test]
    fn test_manifest_drops_name_and_keeps_existing_babel() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name": "app", "version": "1.0.0", "devDependencies": {"@babel/core": "7.20.0"}}"#,
        )
        .unwrap();

        let manifest = bundle_manifest(dir.path()).unwrap();
        assert!(manifest.get("name").is_none());
        assert_eq!(manifest["version"], "1.0.0");
        assert_eq!(manifest["devDependencies"]["@babel/core"], "7.20.0");
    }

    #[test]
    fn test_manifest_not_an_object() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "[]").unwrap();
        assert!(bundle_manifest(dir.path()).is_err());
    }

    #[test]
    fn test_babelrc_prefers_installed_plugin() {
        let dir = tempdir().unwrap();
        assert_eq!(
            babelrc(dir.path()),
            json!({ "plugins": [[IMPORT_META_PLUGIN]] })
        );

        let installed = dir.path().join("node_modules").join(IMPORT_META_PLUGIN);
        std::fs::create_dir_all(&installed).unwrap();
        assert_eq!(
            babelrc(dir.path())["plugins"][0][0],
            &*installed.to_string_lossy()
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_bundler_fails_under_marker() {
        use crate::events::{drain_events, PipelineEvent};

        let dir = tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let build_dir = root.join(".build");
        std::fs::create_dir_all(&build_dir).unwrap();

        let job = BundleJob {
            id: "bundle:definitely-not-a-bundler".to_string(),
            root: root.clone(),
            build_dir: build_dir.clone(),
            final_dir: root.join("build"),
            dist_dir: build_dir.join("_dist_"),
            bundler: "definitely-not-a-bundler".to_string(),
            entry: "index.html".to_string(),
        };
        let (reporter, mut rx) = Reporter::channel();

        let err = run_bundle(&job, &reporter).await.unwrap_err();
        assert!(matches!(err, Error::Bundle { .. }));
        // Intermediate directory is kept for inspection
        assert!(build_dir.join("package.json").exists());

        let events = drain_events(&mut rx);
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::WorkerComplete { id, error: Some(_) }) if id == &job.id
        ));
    }
}
