//! Mount stage: verbatim directory copies into the build tree.
//!
//! A mount command has the form `mount <dir> [--to <urlPath>]`. Without
//! `--to`, the directory is mounted at `/<dir name>`.

use crate::error::Error;
use crate::events::{Reporter, WorkerState};
use crate::workers::WorkerSpec;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A parsed `mount:` worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    pub worker_id: String,
    /// Absolute source directory.
    pub source: PathBuf,
    /// URL path inside the build tree, always starting with `/`.
    pub url_path: String,
}

impl MountSpec {
    /// Parse a mount worker's command. `root` resolves a relative source directory.
    pub fn parse(worker: &WorkerSpec, root: &Path) -> Result<Self, Error> {
        let invalid = |reason: &str| Error::InvalidMount {
            id: worker.id.clone(),
            command: worker.command.clone(),
            reason: reason.to_string(),
        };

        let mut tokens = worker.command.split_whitespace();
        if tokens.next() != Some("mount") {
            return Err(invalid("command must start with `mount`"));
        }
        let dir = tokens
            .next()
            .ok_or_else(|| invalid("missing source directory"))?;

        let mut url_path = None;
        while let Some(token) = tokens.next() {
            match token {
                "--to" => {
                    let to = tokens
                        .next()
                        .ok_or_else(|| invalid("`--to` requires a URL path"))?;
                    url_path = Some(to.to_string());
                }
                other => return Err(invalid(&format!("unexpected argument {other:?}"))),
            }
        }

        let source = root.join(dir);
        let url_path = match url_path {
            Some(to) if to.starts_with('/') => to,
            Some(to) => format!("/{to}"),
            None => {
                let name = source
                    .file_name()
                    .and_then(|n| n.to_str())
                    .ok_or_else(|| invalid("source directory has no name"))?;
                format!("/{name}")
            }
        };

        Ok(Self {
            worker_id: worker.id.clone(),
            source,
            url_path,
        })
    }

    /// Destination directory under `build_root`.
    #[must_use]
    pub fn destination(&self, build_root: &Path) -> PathBuf {
        let relative = self.url_path.trim_matches('/');
        if relative.is_empty() {
            build_root.to_path_buf()
        } else {
            build_root.join(relative)
        }
    }
}

/// Parse every mount worker. Stops at the first malformed command.
pub fn parse_mounts<'a, I>(workers: I, root: &Path) -> Result<Vec<MountSpec>, Error>
where
    I: IntoIterator<Item = &'a WorkerSpec>,
{
    workers
        .into_iter()
        .map(|w| MountSpec::parse(w, root))
        .collect()
}

/// Copy every mount into `build_root`, in order. The first failure aborts.
pub async fn run_mounts(
    mounts: &[MountSpec],
    build_root: &Path,
    reporter: &Reporter,
) -> Result<u64, Error> {
    let mut total = 0;
    for mount in mounts {
        total += run_mount(mount, build_root, reporter).await?;
    }
    Ok(total)
}

async fn run_mount(
    mount: &MountSpec,
    build_root: &Path,
    reporter: &Reporter,
) -> Result<u64, Error> {
    let id = &mount.worker_id;
    reporter.update(id, WorkerState::Running);

    let from = mount.source.clone();
    let to = mount.destination(build_root);
    debug!(worker = %id, from = %from.display(), to = %to.display(), "mounting");

    let result = {
        let (from, to) = (from.clone(), to.clone());
        tokio::task::spawn_blocking(move || pipepack_util::fs::copy_dir_all(&from, &to))
            .await
            .unwrap_or_else(|e| Err(std::io::Error::other(e)))
    };

    match result {
        Ok(copied) => {
            info!(worker = %id, files = copied, to = %mount.url_path, "mounted");
            reporter.complete(id, None);
            Ok(copied)
        }
        Err(source) => {
            let err = Error::Mount {
                id: id.clone(),
                from,
                to,
                source,
            };
            reporter.error(id, err.to_string());
            reporter.complete(id, Some(err.to_string()));
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{drain_events, PipelineEvent};
    use crate::workers::{classify, WorkerCategory, WorkerDeclaration};
    use tempfile::tempdir;

    fn mount_worker(command: &str) -> WorkerSpec {
        let classified = classify(&[WorkerDeclaration::new("mount:x", command)], None);
        (*classified.workers[0]).clone()
    }

    #[test]
    fn test_parse_default_url() {
        let spec = MountSpec::parse(&mount_worker("mount static"), Path::new("/app")).unwrap();
        assert_eq!(spec.source, PathBuf::from("/app/static"));
        assert_eq!(spec.url_path, "/static");
        assert_eq!(
            spec.destination(Path::new("/app/build")),
            PathBuf::from("/app/build/static")
        );
    }

    #[test]
    fn test_parse_to_root_and_nested() {
        let root = Path::new("/app");
        let spec = MountSpec::parse(&mount_worker("mount public --to /"), root).unwrap();
        assert_eq!(spec.url_path, "/");
        assert_eq!(spec.destination(Path::new("/b")), PathBuf::from("/b"));

        let spec = MountSpec::parse(&mount_worker("  mount  assets/img   --to  static/img "), root)
            .unwrap();
        assert_eq!(spec.source, PathBuf::from("/app/assets/img"));
        assert_eq!(spec.url_path, "/static/img");
        assert_eq!(
            spec.destination(Path::new("/b")),
            PathBuf::from("/b/static/img")
        );
    }

    #[test]
    fn test_parse_rejects_malformed_commands() {
        let root = Path::new("/app");
        for command in [
            "copy static",
            "",
            "mount",
            "mount static --to",
            "mount static --force",
            "mount a b",
        ] {
            let err = MountSpec::parse(&mount_worker(command), root).unwrap_err();
            assert!(
                matches!(err, Error::InvalidMount { .. }),
                "{command:?} -> {err}"
            );
            assert!(err.is_configuration());
        }
    }

    #[test]
    fn test_parse_mounts_only_takes_given_workers() {
        let classified = classify(
            &[
                WorkerDeclaration::new("mount:a", "mount a"),
                WorkerDeclaration::new("build:js", "cat"),
                WorkerDeclaration::new("mount:b", "mount b --to /"),
            ],
            None,
        );
        let mounts = parse_mounts(
            classified.of(WorkerCategory::Mount).map(|w| &**w),
            Path::new("/r"),
        )
        .unwrap();
        let urls: Vec<&str> = mounts.iter().map(|m| m.url_path.as_str()).collect();
        assert_eq!(urls, vec!["/a", "/"]);
    }

    #[tokio::test]
    async fn test_run_mount_copies_tree() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("static/css")).unwrap();
        std::fs::write(root.join("static/logo.svg"), "<svg/>").unwrap();
        std::fs::write(root.join("static/css/site.css"), "body{}").unwrap();

        let mounts = vec![MountSpec::parse(&mount_worker("mount static"), root).unwrap()];
        let build = root.join("build");
        let (reporter, mut rx) = Reporter::channel();

        let copied = run_mounts(&mounts, &build, &reporter).await.unwrap();
        assert_eq!(copied, 2);
        assert_eq!(
            std::fs::read_to_string(build.join("static/css/site.css")).unwrap(),
            "body{}"
        );

        let events = drain_events(&mut rx);
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::WorkerComplete { error: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_run_mount_missing_source_is_fatal() {
        let dir = tempdir().unwrap();
        let mounts = vec![MountSpec::parse(&mount_worker("mount nope"), dir.path()).unwrap()];
        let (reporter, mut rx) = Reporter::channel();

        let err = run_mounts(&mounts, &dir.path().join("build"), &reporter)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Mount { .. }));

        let events = drain_events(&mut rx);
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::WorkerComplete { error: Some(_), .. })
        ));
    }
}
