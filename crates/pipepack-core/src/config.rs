use crate::error::Error;
use crate::workers::WorkerDeclaration;
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default config file name, looked up in the working root.
pub const CONFIG_FILE: &str = "pipepack.config.json";

/// Key holding the config inside `package.json` when there is no config file.
pub const PACKAGE_JSON_KEY: &str = "pipepack";

/// Runtime configuration for the pipepack CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Current working directory (the working root for builds).
    pub cwd: PathBuf,

    /// Whether to emit JSON logs.
    pub json_logs: bool,

    /// Verbosity level (0 = INFO, 1 = DEBUG, 2+ = TRACE).
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            json_logs: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Create a new config with the given working directory.
    #[must_use]
    pub fn new(cwd: PathBuf) -> Self {
        Self {
            cwd,
            ..Default::default()
        }
    }

    /// Set verbosity level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set JSON log output.
    #[must_use]
    pub fn with_json_logs(mut self, json: bool) -> Self {
        self.json_logs = json;
        self
    }
}

/// Build configuration, read from `pipepack.config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BuildConfig {
    /// Worker declarations, in the order they appear in the file.
    #[serde(deserialize_with = "deserialize_scripts")]
    pub scripts: Vec<WorkerDeclaration>,
    /// Include root, relative to the working root.
    pub include: String,
    /// Glob patterns relative to the include root.
    pub exclude: Vec<String>,
    /// Installed dependency directory, relative to the working root.
    pub web_modules: String,
    /// Final output directory, relative to the working root.
    pub out: String,
    /// URL path of transformed sources inside the output tree.
    pub dist: String,
    pub bundle: BundleConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            scripts: Vec::new(),
            include: "src".to_string(),
            exclude: vec![
                "**/__tests__/**".to_string(),
                "**/*.test.*".to_string(),
                "**/*.spec.*".to_string(),
            ],
            web_modules: "web_modules".to_string(),
            out: "build".to_string(),
            dist: "/_dist_".to_string(),
            bundle: BundleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BundleConfig {
    pub enabled: bool,
    /// Entry file handed to the bundler, relative to the build directory.
    pub entry: String,
    /// Bundler executable.
    pub bundler: String,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            entry: "index.html".to_string(),
            bundler: "parcel".to_string(),
        }
    }
}

impl BuildConfig {
    /// Load the build config for `root`.
    ///
    /// An explicit path must exist. Otherwise `pipepack.config.json` is tried,
    /// then the `"pipepack"` key of `package.json`, then defaults.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self, Error> {
        if let Some(path) = explicit {
            let path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                root.join(path)
            };
            let content = read_config(&path)?;
            return parse_config(&path, &content);
        }

        let path = root.join(CONFIG_FILE);
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                debug!(path = %path.display(), "loaded config file");
                return parse_config(&path, &content);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(Error::ConfigRead { path, source }),
        }

        let path = root.join("package.json");
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let manifest: serde_json::Value = serde_json::from_str(&content)
                    .map_err(|source| Error::ConfigParse {
                        path: path.clone(),
                        source,
                    })?;
                match manifest.get(PACKAGE_JSON_KEY) {
                    Some(value) => {
                        debug!(path = %path.display(), "loaded config from package.json");
                        Self::deserialize(value)
                            .map_err(|source| Error::ConfigParse { path, source })
                    }
                    None => Ok(Self::default()),
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(Error::ConfigRead { path, source }),
        }
    }

    /// Include root as a path relative to the working root.
    #[must_use]
    pub fn include_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.include)
    }

    /// `dist` without its leading slash, as a relative path.
    #[must_use]
    pub fn dist_relative(&self) -> &str {
        self.dist.trim_start_matches('/')
    }
}

fn read_config(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_config(path: &Path, content: &str) -> Result<BuildConfig, Error> {
    serde_json::from_str(content).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Deserialize `scripts` keeping key order. A repeated key replaces the
/// earlier command in place.
fn deserialize_scripts<'de, D>(deserializer: D) -> Result<Vec<WorkerDeclaration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ScriptsVisitor;

    impl<'de> Visitor<'de> for ScriptsVisitor {
        type Value = Vec<WorkerDeclaration>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of worker id to command")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut scripts: Vec<WorkerDeclaration> = Vec::new();
            while let Some((id, command)) = map.next_entry::<String, String>()? {
                if let Some(existing) = scripts.iter_mut().find(|d| d.id == id) {
                    warn!(worker = %id, "duplicate worker id, keeping the last command");
                    existing.command = command;
                } else {
                    scripts.push(WorkerDeclaration::new(id, command));
                }
            }
            Ok(scripts)
        }
    }

    deserializer.deserialize_map(ScriptsVisitor)
}
