//! Span-splicing import rewriter.

use super::resolve::{resolve_specifier, ImportMap, Resolution};
use super::scan::scan_specifiers;

/// A specifier that could not be resolved cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecifierWarning<'a> {
    /// Relative specifier without an extension; left unchanged.
    MissingExtension(&'a str),
    /// Bare specifier not in the import map; a fallback path was used.
    MissingWebModule(&'a str),
}

/// Replace every import/export specifier in `code` with `resolve(specifier)`.
///
/// Text outside specifier spans is copied byte for byte.
pub fn rewrite_imports<F>(code: &str, mut resolve: F) -> String
where
    F: FnMut(&str) -> String,
{
    let spans = scan_specifiers(code);
    if spans.is_empty() {
        return code.to_string();
    }

    let mut out = String::with_capacity(code.len() + spans.len() * 16);
    let mut cursor = 0;
    for span in &spans {
        out.push_str(&code[cursor..span.start]);
        out.push_str(&resolve(span.text(code)));
        cursor = span.end;
    }
    out.push_str(&code[cursor..]);
    out
}

/// Rewrite a compiled module for the browser, calling `warn` once per
/// specifier occurrence that needed a fallback.
pub fn rewrite_module<W>(code: &str, import_map: &ImportMap, mut warn: W) -> String
where
    W: FnMut(SpecifierWarning<'_>),
{
    rewrite_imports(code, |spec| {
        let resolution = resolve_specifier(spec, import_map);
        match &resolution {
            Resolution::MissingExtension => warn(SpecifierWarning::MissingExtension(spec)),
            Resolution::MissingWebModule(_) => warn(SpecifierWarning::MissingWebModule(spec)),
            Resolution::Unchanged | Resolution::Rewritten(_) => {}
        }
        resolution.into_specifier(spec)
    })
}
