//! Stable error codes for the build pipeline.
//!
//! All codes are SCREAMING_SNAKE_CASE and stable across versions.

/// Generic I/O failure.
pub const BUILD_IO_ERROR: &str = "BUILD_IO_ERROR";

/// Config file could not be read.
pub const BUILD_CONFIG_READ_FAILED: &str = "BUILD_CONFIG_READ_FAILED";

/// Config file is not valid JSON or has the wrong shape.
pub const BUILD_CONFIG_INVALID: &str = "BUILD_CONFIG_INVALID";

/// Dependency import map is not valid JSON or has the wrong shape.
pub const BUILD_IMPORT_MAP_INVALID: &str = "BUILD_IMPORT_MAP_INVALID";

/// A `mount:` worker command is malformed.
pub const BUILD_MOUNT_COMMAND_INVALID: &str = "BUILD_MOUNT_COMMAND_INVALID";

/// A `mount:` worker failed to copy its directory.
pub const BUILD_MOUNT_FAILED: &str = "BUILD_MOUNT_FAILED";

/// A `plugin:` worker names a plugin that is not registered.
pub const BUILD_PLUGIN_NOT_FOUND: &str = "BUILD_PLUGIN_NOT_FOUND";

/// The bundle stage failed.
pub const BUILD_BUNDLE_FAILED: &str = "BUILD_BUNDLE_FAILED";

/// Catch-all.
pub const BUILD_INTERNAL_ERROR: &str = "BUILD_INTERNAL_ERROR";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_codes_are_screaming_snake_case() {
        let codes = [
            BUILD_IO_ERROR,
            BUILD_CONFIG_READ_FAILED,
            BUILD_CONFIG_INVALID,
            BUILD_IMPORT_MAP_INVALID,
            BUILD_MOUNT_COMMAND_INVALID,
            BUILD_MOUNT_FAILED,
            BUILD_PLUGIN_NOT_FOUND,
            BUILD_BUNDLE_FAILED,
            BUILD_INTERNAL_ERROR,
        ];

        for code in codes {
            assert!(
                code.chars().all(|c| c.is_uppercase() || c == '_'),
                "Code '{code}' should be SCREAMING_SNAKE_CASE"
            );
        }
    }
}
