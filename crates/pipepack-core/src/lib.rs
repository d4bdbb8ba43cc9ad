#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod bundle;
pub mod codes;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod exec;
pub mod imports;
pub mod lint;
pub mod mount;
pub mod pipeline;
pub mod plugin;
pub mod remap;
pub mod sources;
pub mod version;
pub mod workers;

pub use config::{BuildConfig, BundleConfig, Config};
pub use dispatch::{DispatchReport, TransformError};
pub use error::Error;
pub use events::{MsgLevel, PipelineEvent, Reporter, StatusColor, WorkerState};
pub use imports::{resolve_specifier, rewrite_imports, rewrite_module, ImportMap, Resolution};
pub use pipeline::{BuildLayout, BuildOutcome, BuildReport, Pipeline};
pub use plugin::{Plugin, PluginError, PluginOutput, PluginRegistry};
pub use remap::remap;
pub use version::VERSION;
pub use workers::{classify, Classified, WorkerCategory, WorkerDeclaration, WorkerSpec};
