//! Import rewriting for compiled modules.
//!
//! [`scan_specifiers`] finds the byte spans of static, re-export and dynamic
//! import specifiers, [`resolve_specifier`] decides what each one becomes, and
//! [`rewrite_module`] splices the results back into the source.

mod resolve;
mod rewrite;
mod scan;

pub use resolve::{resolve_specifier, ImportMap, Resolution, IMPORT_MAP_FILE, WEB_MODULES_URL};
pub use rewrite::{rewrite_imports, rewrite_module, SpecifierWarning};
pub use scan::{scan_specifiers, SpecifierKind, SpecifierSpan};
