//! Filename normalization for storage keys and manifest references.
//!
//! A sanitized name contains only ASCII alphanumerics, `-` and `_` in its
//! base, plus an optional lowercase alphanumeric extension. Such a name can
//! be used as a storage key segment and embedded in a glTF URI without
//! escaping.

/// Split a filename at its last dot into `(base, extension)`.
///
/// A name without a dot has no extension.
pub fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rsplit_once('.') {
        Some((base, ext)) => (base, Some(ext)),
        None => (name, None),
    }
}

/// Lowercase extension of `name`, if it has a non-empty one.
pub fn extension_of(name: &str) -> Option<String> {
    split_extension(name)
        .1
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
}

/// Normalize an uploaded filename.
///
/// - whitespace runs in the base become a single `-`
/// - anything but ASCII alphanumerics, `-` and `_` is dropped from the base
/// - repeated `-` collapse to one
/// - the extension is lowercased and reduced to ASCII alphanumerics
///
/// The base keeps its case. Never fails: an all-symbol base yields an empty
/// base followed by the extension.
pub fn sanitize_filename(name: &str) -> String {
    let (base, ext) = split_extension(name);

    let mut out = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for c in base.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                push_hyphen(&mut out);
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        match c {
            '-' => push_hyphen(&mut out),
            '_' => out.push('_'),
            c if c.is_ascii_alphanumeric() => out.push(c),
            _ => {}
        }
    }

    let ext: String = ext
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect();

    if !ext.is_empty() {
        out.push('.');
        out.push_str(&ext);
    }
    out
}

fn push_hyphen(out: &mut String) {
    if !out.ends_with('-') {
        out.push('-');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_is_clean(name: &str) -> bool {
        split_extension(name)
            .0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    #[test]
    fn replaces_whitespace_and_lowercases_extension() {
        assert_eq!(sanitize_filename("Wheel Hub.BIN"), "Wheel-Hub.bin");
        assert_eq!(sanitize_filename("front  \t view.JPG"), "front-view.jpg");
    }

    #[test]
    fn strips_symbols_and_collapses_hyphens() {
        assert_eq!(sanitize_filename("pump (v2) -- final!.png"), "pump-v2-final.png");
        assert_eq!(sanitize_filename("a---b.gltf"), "a-b.gltf");
        assert_eq!(sanitize_filename("valve_body.v3.gltf"), "valve_bodyv3.gltf");
    }

    #[test]
    fn keeps_base_case() {
        assert_eq!(sanitize_filename("M.bin"), "M.bin");
        assert_eq!(sanitize_filename("FlangeTop.PNG"), "FlangeTop.png");
    }

    #[test]
    fn degenerate_inputs_never_fail() {
        assert_eq!(sanitize_filename(""), "");
        assert_eq!(sanitize_filename("###.png"), ".png");
        assert_eq!(sanitize_filename("README"), "README");
        assert_eq!(sanitize_filename("trailing."), "trailing");
        assert_eq!(sanitize_filename("ümlaut.png"), "mlaut.png");
    }

    #[test]
    fn sanitizing_twice_changes_nothing() {
        let samples = [
            "Wheel Hub.BIN",
            "pump (v2) -- final!.png",
            " lead space.gltf",
            "tab\there.jpeg",
            "###.png",
            "a.b.c.D",
            "dots...and - hyphens -.glb",
            "",
            "no_extension",
            "trailing.",
            "ünïcödé näme.PNG",
        ];
        for sample in samples {
            let once = sanitize_filename(sample);
            assert_eq!(sanitize_filename(&once), once, "input {sample:?}");
            assert!(base_is_clean(&once), "input {sample:?} gave {once:?}");
            if let Some(ext) = split_extension(&once).1 {
                assert_eq!(ext, ext.to_ascii_lowercase());
            }
        }
    }

    #[test]
    fn extension_lookup() {
        assert_eq!(extension_of("Scene.GLTF").as_deref(), Some("gltf"));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of("dot."), None);
    }
}
