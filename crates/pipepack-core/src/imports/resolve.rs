//! Specifier resolution policy.
//!
//! Decides what a single specifier becomes in the output tree:
//! - URLs and root-relative paths (`https://...`, `/lib.js`) are left alone
//! - relative paths (`./App.tsx`) keep their path, with the extension remapped
//! - bare specifiers (`react`) point into `/web_modules/` via the import map

use crate::error::Error;
use crate::remap::remap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

/// URL prefix under which installed dependencies are served.
pub const WEB_MODULES_URL: &str = "/web_modules/";

/// File name of the import map inside the installed dependency directory.
pub const IMPORT_MAP_FILE: &str = "import-map.json";

/// Bare specifier → installed path fragment, e.g. `react` → `react.js`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMap {
    #[serde(default)]
    pub imports: BTreeMap<String, String>,
}

impl ImportMap {
    /// Load an import map. A missing file is an empty map.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(Error::Io(e)),
        };
        serde_json::from_str(&content).map_err(|source| Error::ImportMapParse {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn get(&self, specifier: &str) -> Option<&str> {
        self.imports.get(specifier).map(String::as_str)
    }

    #[must_use]
    pub fn with(mut self, specifier: impl Into<String>, target: impl Into<String>) -> Self {
        self.imports.insert(specifier.into(), target.into());
        self
    }
}

/// What happened to one specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Already browser-resolvable.
    Unchanged,
    /// Replaced with a new specifier.
    Rewritten(String),
    /// Relative specifier without a file extension. Left as-is.
    MissingExtension,
    /// Bare specifier absent from the import map. Carries the best-effort fallback.
    MissingWebModule(String),
}

impl Resolution {
    /// The specifier to emit for `original`.
    #[must_use]
    pub fn into_specifier(self, original: &str) -> String {
        match self {
            Self::Unchanged | Self::MissingExtension => original.to_string(),
            Self::Rewritten(spec) | Self::MissingWebModule(spec) => spec,
        }
    }
}

/// Resolve one specifier. Pure: the same inputs always give the same result.
#[must_use]
pub fn resolve_specifier(specifier: &str, import_map: &ImportMap) -> Resolution {
    if specifier.starts_with('/') || has_url_scheme(specifier) {
        return Resolution::Unchanged;
    }

    if specifier.starts_with("./") || specifier.starts_with("../") {
        let Some(ext_start) = extension_start(specifier) else {
            return Resolution::MissingExtension;
        };
        let ext = &specifier[ext_start..];
        let mapped = remap(ext);
        if mapped == ext {
            return Resolution::Unchanged;
        }
        return Resolution::Rewritten(format!("{}{mapped}", &specifier[..ext_start]));
    }

    match import_map.get(specifier) {
        Some(target) => {
            let target = target.trim_start_matches("./").trim_start_matches('/');
            Resolution::Rewritten(format!("{WEB_MODULES_URL}{target}"))
        }
        None => Resolution::MissingWebModule(format!("{WEB_MODULES_URL}{specifier}.js")),
    }
}

/// `scheme:` per RFC 3986: a letter, then letters, digits, `+`, `-` or `.`.
fn has_url_scheme(specifier: &str) -> bool {
    let Some((scheme, _)) = specifier.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Byte offset where the extension of the last path segment starts (after the dot).
///
/// A dot at the start of the segment (`.env`, `..`) does not begin an extension.
fn extension_start(specifier: &str) -> Option<usize> {
    let segment_start = specifier.rfind('/').map_or(0, |i| i + 1);
    let segment = &specifier[segment_start..];
    let dot = segment.rfind('.')?;
    if dot == 0 || dot + 1 == segment.len() {
        return None;
    }
    Some(segment_start + dot + 1)
}
