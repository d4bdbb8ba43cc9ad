use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use walkdir::WalkDir;

/// Atomically write bytes to a file by writing to a temp file then renaming.
///
/// Missing parent directories are created first. The file will either have
/// the old contents or the new contents, never a partial write.
///
/// # Errors
/// Returns an error if the directories cannot be created or the write or rename fails.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;

    // Same directory as the target so the rename stays on one filesystem
    let mut temp_path = parent.to_path_buf();
    temp_path.push(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("file"),
        std::process::id()
    ));

    {
        let mut file = File::create(&temp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    match fs::rename(&temp_path, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            // On Windows, rename can fail if target exists. Try copy + remove as fallback.
            if cfg!(windows) {
                fs::copy(&temp_path, path)?;
                let _ = fs::remove_file(&temp_path);
                Ok(())
            } else {
                let _ = fs::remove_file(&temp_path);
                Err(e)
            }
        }
    }
}

/// Recursively copy `src` into `dst`, merging with whatever `dst` already holds.
///
/// `keep` is called with every source path below `src`; returning `false`
/// skips that entry (and, for a directory, everything beneath it).
/// Returns the number of files copied.
///
/// # Errors
/// Returns an error if `src` is not a directory or any copy fails.
pub fn copy_dir_filtered<F>(src: &Path, dst: &Path, mut keep: F) -> io::Result<u64>
where
    F: FnMut(&Path) -> bool,
{
    if !src.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", src.display()),
        ));
    }

    fs::create_dir_all(dst)?;
    let mut copied = 0;

    let walker = WalkDir::new(src)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || keep(entry.path()));

    for entry in walker {
        let entry = entry.map_err(io::Error::other)?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }

        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Recursively copy `src` into `dst`.
///
/// # Errors
/// Returns an error if `src` is not a directory or any copy fails.
pub fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<u64> {
    copy_dir_filtered(src, dst, |_| true)
}

/// Remove a directory tree, treating an already-missing directory as success.
///
/// # Errors
/// Returns an error if the directory exists but cannot be removed.
pub fn remove_dir_all_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_creates_parents_and_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("out.js");

        atomic_write(&path, b"first").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");

        atomic_write(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");

        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1, "no temp files should remain");
    }

    #[test]
    fn test_copy_dir_all_copies_nested_tree() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("public");
        fs::create_dir_all(src.join("img")).unwrap();
        fs::write(src.join("index.html"), "<html></html>").unwrap();
        fs::write(src.join("img").join("logo.svg"), "<svg/>").unwrap();

        let dst = dir.path().join("build").join("static");
        let copied = copy_dir_all(&src, &dst).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(
            fs::read_to_string(dst.join("index.html")).unwrap(),
            "<html></html>"
        );
        assert!(dst.join("img").join("logo.svg").exists());
    }

    #[test]
    fn test_copy_dir_filtered_skips_subtrees() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("web_modules")).unwrap();
        fs::create_dir_all(src.join("app")).unwrap();
        fs::write(src.join("web_modules").join("react.js"), "x").unwrap();
        fs::write(src.join("app").join("main.js"), "y").unwrap();

        let skip = src.join("web_modules");
        let dst = dir.path().join("dst");
        copy_dir_filtered(&src, &dst, |p| !p.starts_with(&skip)).unwrap();

        assert!(dst.join("app").join("main.js").exists());
        assert!(!dst.join("web_modules").exists());
    }

    #[test]
    fn test_copy_dir_missing_source_errors() {
        let dir = tempdir().unwrap();
        let err = copy_dir_all(&dir.path().join("nope"), &dir.path().join("out")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_remove_dir_all_if_exists() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("gone");
        remove_dir_all_if_exists(&target).unwrap();

        fs::create_dir_all(target.join("nested")).unwrap();
        remove_dir_all_if_exists(&target).unwrap();
        assert!(!target.exists());
    }
}
