use crate::codes;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal error for a pipeline run.
///
/// Per-file transform failures are not represented here; they are isolated
/// and reported as [`crate::dispatch::TransformError`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse import map at {path}: {source}")]
    ImportMapParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("[{id}] invalid mount command {command:?}: {reason}")]
    InvalidMount {
        id: String,
        command: String,
        reason: String,
    },

    #[error("[{id}] failed to mount {from} at {to}: {source}")]
    Mount {
        id: String,
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[{id}] unknown plugin {name:?}")]
    UnknownPlugin { id: String, name: String },

    #[error("[{id}] bundle failed: {message}")]
    Bundle { id: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl Error {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => codes::BUILD_IO_ERROR,
            Self::ConfigRead { .. } => codes::BUILD_CONFIG_READ_FAILED,
            Self::ConfigParse { .. } => codes::BUILD_CONFIG_INVALID,
            Self::ImportMapParse { .. } => codes::BUILD_IMPORT_MAP_INVALID,
            Self::InvalidMount { .. } => codes::BUILD_MOUNT_COMMAND_INVALID,
            Self::Mount { .. } => codes::BUILD_MOUNT_FAILED,
            Self::UnknownPlugin { .. } => codes::BUILD_PLUGIN_NOT_FOUND,
            Self::Bundle { .. } => codes::BUILD_BUNDLE_FAILED,
            Self::Other(_) => codes::BUILD_INTERNAL_ERROR,
        }
    }

    /// Whether this is a configuration problem (as opposed to a runtime failure).
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigRead { .. }
                | Self::ConfigParse { .. }
                | Self::ImportMapParse { .. }
                | Self::InvalidMount { .. }
                | Self::UnknownPlugin { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_categories() {
        let err = Error::InvalidMount {
            id: "mount:public".into(),
            command: "copy public".into(),
            reason: "expected `mount`".into(),
        };
        assert_eq!(err.code(), codes::BUILD_MOUNT_COMMAND_INVALID);
        assert!(err.is_configuration());
        assert!(err.to_string().starts_with("[mount:public]"));

        let err = Error::Bundle {
            id: "bundle:parcel".into(),
            message: "exit code 1".into(),
        };
        assert_eq!(err.code(), codes::BUILD_BUNDLE_FAILED);
        assert!(!err.is_configuration());
    }
}
