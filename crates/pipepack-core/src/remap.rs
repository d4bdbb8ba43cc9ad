//! Source extension → browser extension table.

/// Extension every script output ends up with.
pub const SCRIPT_EXTENSION: &str = "js";

/// Source extensions and the extension their compiled output uses.
const EXTENSION_MAP: &[(&str, &str)] = &[
    ("mjs", "js"),
    ("jsx", "js"),
    ("ts", "js"),
    ("tsx", "js"),
    ("vue", "js"),
    ("svelte", "js"),
    ("mdx", "js"),
    ("svx", "js"),
    ("elm", "js"),
    ("scss", "css"),
    ("sass", "css"),
    ("less", "css"),
];

/// Map a source extension (no leading dot) to its output extension.
///
/// Unknown extensions are returned unchanged.
#[must_use]
pub fn remap(ext: &str) -> &str {
    EXTENSION_MAP
        .iter()
        .find(|(from, _)| *from == ext)
        .map_or(ext, |&(_, to)| to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remap_known_extensions() {
        assert_eq!(remap("ts"), "js");
        assert_eq!(remap("tsx"), "js");
        assert_eq!(remap("jsx"), "js");
        assert_eq!(remap("svelte"), "js");
        assert_eq!(remap("scss"), "css");
    }

    #[test]
    fn test_remap_unknown_passes_through() {
        assert_eq!(remap("js"), "js");
        assert_eq!(remap("json"), "json");
        assert_eq!(remap("png"), "png");
        assert_eq!(remap(""), "");
        // Case-sensitive, like the file system it describes
        assert_eq!(remap("TS"), "TS");
    }

    #[test]
    fn test_remap_is_stable_across_calls() {
        for ext in ["ts", "vue", "md", "less"] {
            let first = remap(ext).to_string();
            for _ in 0..3 {
                assert_eq!(remap(ext), first);
            }
        }
    }

    #[test]
    fn test_remap_outputs_are_fixed_points() {
        for (_, to) in EXTENSION_MAP {
            assert_eq!(remap(to), *to);
        }
    }
}
