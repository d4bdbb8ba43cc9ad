//! Source file enumeration.

use glob::Pattern;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// A file to dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path.
    pub path: PathBuf,
    /// Extension without the dot. Empty if the file has none.
    pub ext: String,
}

impl SourceFile {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_string();
        Self { path, ext }
    }
}

/// Compile exclude globs. Invalid patterns are logged and dropped.
#[must_use]
pub fn compile_excludes(patterns: &[String]) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|p| match Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!(pattern = %p, error = %e, "ignoring invalid exclude pattern");
                None
            }
        })
        .collect()
}

/// Every regular file under `root` not matched by `excludes`, sorted by path.
///
/// Patterns are matched against the path relative to `root`, with `/`
/// separators. A missing root yields no files.
pub fn enumerate_sources(root: &Path, excludes: &[Pattern]) -> io::Result<Vec<SourceFile>> {
    if !root.is_dir() {
        debug!(root = %root.display(), "include root does not exist");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        if excludes.iter().any(|p| p.matches(&relative)) {
            debug!(file = %relative, "excluded");
            continue;
        }
        files.push(SourceFile::new(entry.into_path()));
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}
