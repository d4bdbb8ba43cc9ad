//! Worker classification.
//!
//! A worker is one configured pipeline step, declared as `id → command`.
//! The id prefix alone decides the category:
//!
//! | id                     | category | command                        |
//! |------------------------|----------|--------------------------------|
//! | `build:ts,tsx`         | Build    | shell command, file on stdin   |
//! | `plugin:json`          | Plugin   | registered plugin name         |
//! | `lintall:tsc`          | LintAll  | shell command, run once        |
//! | `mount:public`         | Mount    | `mount <dir> [--to <urlPath>]` |
//!
//! Anything else is ignored.

use std::collections::HashMap;
use std::sync::Arc;

/// Worker category, derived from the id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerCategory {
    Build,
    Plugin,
    LintAll,
    Mount,
    /// Synthetic worker that only exists so the bundle stage has an id to report under.
    BundleMarker,
}

impl WorkerCategory {
    /// Category for an id prefix (the text before the first `:`).
    #[must_use]
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "build" => Some(Self::Build),
            "plugin" => Some(Self::Plugin),
            "lintall" => Some(Self::LintAll),
            "mount" => Some(Self::Mount),
            _ => None,
        }
    }

    /// Whether workers of this category are dispatched against source files.
    #[must_use]
    pub fn transforms_files(self) -> bool {
        matches!(self, Self::Build | Self::Plugin)
    }
}

/// A raw `id → command` pair, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerDeclaration {
    pub id: String,
    pub command: String,
}

impl WorkerDeclaration {
    #[must_use]
    pub fn new(id: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command: command.into(),
        }
    }
}

/// A classified worker. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub id: String,
    pub command: String,
    pub category: WorkerCategory,
    /// File extensions (without the dot). Only non-empty for Build/Plugin.
    pub extensions: Vec<String>,
}

impl WorkerSpec {
    /// The synthetic bundle worker.
    #[must_use]
    pub fn bundle_marker(bundler: &str) -> Self {
        Self {
            id: format!("bundle:{bundler}"),
            command: bundler.to_string(),
            category: WorkerCategory::BundleMarker,
            extensions: Vec::new(),
        }
    }
}

/// Extension → workers, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ExtensionIndex {
    map: HashMap<String, Vec<Arc<WorkerSpec>>>,
}

impl ExtensionIndex {
    /// Workers registered for `ext` (no leading dot). Empty if none.
    #[must_use]
    pub fn get(&self, ext: &str) -> &[Arc<WorkerSpec>] {
        self.map.get(ext).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Registered extensions, sorted.
    #[must_use]
    pub fn extensions(&self) -> Vec<&str> {
        let mut exts: Vec<&str> = self.map.keys().map(String::as_str).collect();
        exts.sort_unstable();
        exts
    }

    fn insert(&mut self, ext: String, worker: Arc<WorkerSpec>) {
        self.map.entry(ext).or_default().push(worker);
    }
}

/// Output of [`classify`].
#[derive(Debug, Clone, Default)]
pub struct Classified {
    /// Relevant workers in declaration order (bundle marker last, if any).
    pub workers: Vec<Arc<WorkerSpec>>,
    pub index: ExtensionIndex,
}

impl Classified {
    /// Workers of one category, in declaration order.
    pub fn of(&self, category: WorkerCategory) -> impl Iterator<Item = &Arc<WorkerSpec>> {
        self.workers.iter().filter(move |w| w.category == category)
    }

    /// Whether any Build or Plugin worker was declared.
    #[must_use]
    pub fn has_transform_workers(&self) -> bool {
        self.workers.iter().any(|w| w.category.transforms_files())
    }

    #[must_use]
    pub fn bundle_marker(&self) -> Option<&Arc<WorkerSpec>> {
        self.of(WorkerCategory::BundleMarker).next()
    }
}

/// Classify declarations and build the extension index.
///
/// `bundler` is the bundler name when bundling is enabled; it adds the
/// synthetic bundle marker worker.
#[must_use]
pub fn classify(declarations: &[WorkerDeclaration], bundler: Option<&str>) -> Classified {
    let mut classified = Classified::default();

    for decl in declarations {
        let Some((prefix, rest)) = decl.id.split_once(':') else {
            continue;
        };
        let Some(category) = WorkerCategory::from_prefix(prefix) else {
            continue;
        };

        let extensions = if category.transforms_files() {
            parse_extension_list(rest)
        } else {
            Vec::new()
        };

        let worker = Arc::new(WorkerSpec {
            id: decl.id.clone(),
            command: decl.command.clone(),
            category,
            extensions,
        });

        for ext in &worker.extensions {
            classified.index.insert(ext.clone(), Arc::clone(&worker));
        }
        classified.workers.push(worker);
    }

    if let Some(bundler) = bundler {
        classified
            .workers
            .push(Arc::new(WorkerSpec::bundle_marker(bundler)));
    }

    classified
}

fn parse_extension_list(list: &str) -> Vec<String> {
    let mut exts: Vec<String> = Vec::new();
    for ext in list.split(',') {
        let ext = ext.trim().trim_start_matches('.');
        if !ext.is_empty() && !exts.iter().any(|e| e == ext) {
            exts.push(ext.to_string());
        }
    }
    exts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decls(pairs: &[(&str, &str)]) -> Vec<WorkerDeclaration> {
        pairs
            .iter()
            .map(|(id, cmd)| WorkerDeclaration::new(*id, *cmd))
            .collect()
    }

    #[test]
    fn test_classify_by_prefix_only() {
        let classified = classify(
            &decls(&[
                ("build:ts,tsx", "tsc-transpile"),
                ("plugin:json", "json"),
                ("lintall:eslint", "eslint src"),
                ("mount:public", "mount public"),
                ("run:serve", "serve ."),
                ("buildts", "nope"),
                ("bundle:parcel", "parcel"),
            ]),
            None,
        );

        let ids: Vec<&str> = classified.workers.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["build:ts,tsx", "plugin:json", "lintall:eslint", "mount:public"]
        );
        assert_eq!(classified.workers[2].category, WorkerCategory::LintAll);
        assert!(classified.workers[2].extensions.is_empty());
        assert!(classified.bundle_marker().is_none());
    }

    #[test]
    fn test_unrecognized_ids_never_reach_the_index() {
        let classified = classify(&decls(&[("transform:ts", "cat"), ("build:js", "cat")]), None);
        assert_eq!(classified.index.extensions(), vec!["js"]);
        assert!(classified.index.get("ts").is_empty());
    }

    #[test]
    fn test_index_preserves_declaration_order() {
        let classified = classify(
            &decls(&[
                ("build:ts", "first"),
                ("lintall:tsc", "tsc --noEmit"),
                ("plugin:ts,js", "second"),
            ]),
            None,
        );

        let ts: Vec<&str> = classified
            .index
            .get("ts")
            .iter()
            .map(|w| w.command.as_str())
            .collect();
        assert_eq!(ts, vec!["first", "second"]);
        assert_eq!(classified.index.get("js").len(), 1);
        assert!(classified.index.get("css").is_empty());
    }

    #[test]
    fn test_extension_list_normalization() {
        let classified = classify(&decls(&[("build: .ts, tsx,,ts", "cat")]), None);
        assert_eq!(classified.workers[0].extensions, vec!["ts", "tsx"]);
    }

    #[test]
    fn test_bundle_marker_added_last_and_never_indexed() {
        let classified = classify(&decls(&[("build:js", "cat")]), Some("parcel"));

        let marker = classified.bundle_marker().unwrap();
        assert_eq!(marker.id, "bundle:parcel");
        assert_eq!(marker.category, WorkerCategory::BundleMarker);
        assert!(marker.extensions.is_empty());
        assert_eq!(classified.workers.last().unwrap().id, "bundle:parcel");
        assert_eq!(classified.index.extensions(), vec!["js"]);
    }

    #[test]
    fn test_has_transform_workers() {
        assert!(!classify(&decls(&[("mount:public", "mount public")]), None).has_transform_workers());
        assert!(classify(&decls(&[("plugin:json", "json")]), None).has_transform_workers());
    }

    #[test]
    fn test_classification_is_deterministic() {
        let input = decls(&[("build:ts", "a"), ("plugin:ts", "b"), ("mount:x", "mount x")]);
        let a = classify(&input, Some("parcel"));
        let b = classify(&input, Some("parcel"));
        assert_eq!(a.workers, b.workers);
        assert_eq!(a.index.extensions(), b.index.extensions());
    }
}
