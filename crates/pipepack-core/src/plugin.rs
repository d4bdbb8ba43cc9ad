//! In-process transform plugins.
//!
//! A `plugin:<exts>` worker names a plugin instead of a shell command. Names
//! are looked up once, before the build starts, so a typo fails the run
//! before anything is written.
//!
//! ```ignore
//! use pipepack_core::plugin::{Plugin, PluginError, PluginOutput, PluginRegistry};
//!
//! struct Upper;
//!
//! impl Plugin for Upper {
//!     fn name(&self) -> &str { "upper" }
//!
//!     fn build(&self, path: &Path) -> Result<PluginOutput, PluginError> {
//!         let code = std::fs::read_to_string(path).map_err(|e| PluginError::io(path, e))?;
//!         Ok(PluginOutput::new(code.to_uppercase()))
//!     }
//! }
//!
//! let mut registry = PluginRegistry::with_builtins();
//! registry.register(Arc::new(Upper));
//! ```

use crate::error::Error;
use crate::workers::{Classified, WorkerCategory};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Error from a plugin's `build`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginError {
    pub message: String,
}

impl PluginError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn io(path: &Path, err: std::io::Error) -> Self {
        Self::new(format!("failed to read {}: {err}", path.display()))
    }
}

impl std::fmt::Display for PluginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for PluginError {}

/// What a plugin produced for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginOutput {
    pub result: String,
}

impl PluginOutput {
    #[must_use]
    pub fn new(result: impl Into<String>) -> Self {
        Self {
            result: result.into(),
        }
    }
}

/// A transform that runs in-process.
///
/// `build` is called from a blocking thread, once per matching file.
pub trait Plugin: Send + Sync {
    /// Name used in `plugin:` worker commands.
    fn name(&self) -> &str;

    /// Transform the file at `path` into browser code.
    fn build(&self, path: &Path) -> Result<PluginOutput, PluginError>;
}

/// `export default <json>;`
#[derive(Debug, Default)]
pub struct JsonPlugin;

impl Plugin for JsonPlugin {
    fn name(&self) -> &str {
        "json"
    }

    fn build(&self, path: &Path) -> Result<PluginOutput, PluginError> {
        let content = std::fs::read_to_string(path).map_err(|e| PluginError::io(path, e))?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| PluginError::new(format!("invalid JSON in {}: {e}", path.display())))?;
        Ok(PluginOutput::new(format!("export default {value};\n")))
    }
}

/// `export default "<file content>";`
#[derive(Debug, Default)]
pub struct RawPlugin;

impl Plugin for RawPlugin {
    fn name(&self) -> &str {
        "raw"
    }

    fn build(&self, path: &Path) -> Result<PluginOutput, PluginError> {
        let content = std::fs::read_to_string(path).map_err(|e| PluginError::io(path, e))?;
        let literal = serde_json::Value::String(content);
        Ok(PluginOutput::new(format!("export default {literal};\n")))
    }
}

/// Plugins available by name.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn Plugin>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.plugins.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("PluginRegistry").field("plugins", &names).finish()
    }
}

impl PluginRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with `json` and `raw`.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(JsonPlugin));
        registry.register(Arc::new(RawPlugin));
        registry
    }

    /// Add a plugin under its own name, replacing any previous one.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(name).cloned()
    }

    /// Look up the plugin for every `plugin:` worker.
    pub fn resolve(&self, classified: &Classified) -> Result<ResolvedPlugins, Error> {
        let mut by_worker = HashMap::new();
        for worker in classified.of(WorkerCategory::Plugin) {
            let name = worker.command.trim();
            let plugin = self.get(name).ok_or_else(|| Error::UnknownPlugin {
                id: worker.id.clone(),
                name: name.to_string(),
            })?;
            by_worker.insert(worker.id.clone(), plugin);
        }
        Ok(ResolvedPlugins { by_worker })
    }
}

/// Worker id → plugin, fixed for the run.
#[derive(Default, Clone)]
pub struct ResolvedPlugins {
    by_worker: HashMap<String, Arc<dyn Plugin>>,
}

impl ResolvedPlugins {
    #[must_use]
    pub fn get(&self, worker_id: &str) -> Option<Arc<dyn Plugin>> {
        self.by_worker.get(worker_id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_worker.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_worker.is_empty()
    }
}

impl std::fmt::Debug for ResolvedPlugins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&str> = self.by_worker.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("ResolvedPlugins").field("workers", &ids).finish()
    }
}
