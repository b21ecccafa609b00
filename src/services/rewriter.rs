//! Rewrites filename references inside a glTF manifest so they match the
//! sanitized names its sibling files are stored under.
//!
//! Only text manifests are touched. Binary buffers and textures are stored
//! as-is.

use crate::models::name_mapping::NameMapping;
use bytes::Bytes;
use serde::Deserialize;
use std::borrow::Cow;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("manifest is not valid glTF JSON: {0}")]
pub struct ManifestParseError(#[from] serde_json::Error);

/// Replace every literal occurrence of each changed original name with its
/// sanitized name.
///
/// glTF URIs may be percent-encoded, fully or in part. Besides the raw and
/// fully encoded spellings of each original name, every `buffers[].uri` and
/// `images[].uri` whose decoded form is a changed original is replaced
/// exactly as it is written in the manifest. Matching is byte-literal and
/// happens in a single left-to-right pass that prefers the longest needle at
/// each position; replaced text is never scanned again.
///
/// When nothing matches, the input buffer is returned as-is.
pub fn rewrite_manifest(manifest: Bytes, mapping: &NameMapping) -> Bytes {
    if mapping.is_empty() {
        return manifest;
    }
    let patterns = substitution_table(mapping, &manifest);
    if patterns.is_empty() {
        return manifest;
    }

    let input = manifest.as_ref();
    let mut out: Option<Vec<u8>> = None;
    let mut copied_up_to = 0;
    let mut pos = 0;

    while pos < input.len() {
        let hit = patterns
            .iter()
            .find(|(old, _)| input[pos..].starts_with(old.as_bytes()));
        match hit {
            Some((old, new)) => {
                let buf = out.get_or_insert_with(|| Vec::with_capacity(input.len()));
                buf.extend_from_slice(&input[copied_up_to..pos]);
                buf.extend_from_slice(new.as_bytes());
                pos += old.len();
                copied_up_to = pos;
            }
            None => pos += 1,
        }
    }

    match out {
        Some(mut buf) => {
            buf.extend_from_slice(&input[copied_up_to..]);
            Bytes::from(buf)
        }
        None => manifest,
    }
}

/// Build `(needle, replacement)` pairs, longest needle first.
fn substitution_table<'a>(
    mapping: &'a NameMapping,
    manifest: &[u8],
) -> Vec<(Cow<'a, str>, &'a str)> {
    let mut patterns: Vec<(Cow<'a, str>, &'a str)> = Vec::new();
    for (old, new) in mapping.changed() {
        if old.is_empty() {
            continue;
        }
        let encoded = urlencoding::encode(old);
        if encoded != old {
            patterns.push((Cow::Owned(encoded.into_owned()), new));
        }
        patterns.push((Cow::Borrowed(old), new));
    }

    // References spelled the way the exporter wrote them. A manifest that
    // does not parse has no references to add.
    for raw in raw_uris(manifest).unwrap_or_default() {
        let decoded = decode_uri(&raw);
        let Some(new) = mapping.get(&decoded) else {
            continue;
        };
        if raw == new || patterns.iter().any(|(needle, _)| *needle == raw) {
            continue;
        }
        patterns.push((Cow::Owned(raw), new));
    }

    patterns.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    patterns
}

#[derive(Debug, Default, Deserialize)]
struct GltfDocument {
    #[serde(default)]
    buffers: Vec<GltfUriEntry>,
    #[serde(default)]
    images: Vec<GltfUriEntry>,
}

#[derive(Debug, Deserialize)]
struct GltfUriEntry {
    uri: Option<String>,
}

/// Relative file references in a glTF manifest (`buffers[].uri` and
/// `images[].uri`), percent-decoded.
///
/// Embedded `data:` URIs and absolute URLs are skipped.
pub fn referenced_uris(manifest: &[u8]) -> Result<Vec<String>, ManifestParseError> {
    Ok(raw_uris(manifest)?.iter().map(|uri| decode_uri(uri)).collect())
}

/// Relative references exactly as written in the manifest.
fn raw_uris(manifest: &[u8]) -> Result<Vec<String>, ManifestParseError> {
    let doc: GltfDocument = serde_json::from_slice(manifest)?;
    let uris = doc
        .buffers
        .into_iter()
        .chain(doc.images)
        .filter_map(|entry| entry.uri)
        .filter(|uri| !uri.starts_with("data:") && !uri.contains("://"))
        .collect();
    Ok(uris)
}

fn decode_uri(uri: &str) -> String {
    match urlencoding::decode(uri) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => uri.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, &str)]) -> NameMapping {
        pairs.iter().copied().collect()
    }

    #[test]
    fn replaces_changed_names_only() {
        let manifest = Bytes::from_static(
            br#"{"buffers":[{"uri":"a.bin"}],"images":[{"uri":"b.png"},{"uri":"a.bin"}]}"#,
        );
        let map = mapping(&[("a.bin", "a_1.bin"), ("b.png", "b.png")]);

        let out = rewrite_manifest(manifest, &map);
        let text = std::str::from_utf8(&out).unwrap();
        assert_eq!(
            text,
            r#"{"buffers":[{"uri":"a_1.bin"}],"images":[{"uri":"b.png"},{"uri":"a_1.bin"}]}"#
        );
    }

    #[test]
    fn untouched_manifest_is_the_same_buffer() {
        let manifest = Bytes::from(br#"{"buffers":[{"uri":"b.png"}]}"#.to_vec());
        let ptr = manifest.as_ptr();
        let map = mapping(&[("b.png", "b.png"), ("c d.bin", "c-d.bin")]);

        let out = rewrite_manifest(manifest.clone(), &map);
        assert_eq!(out, manifest);
        assert_eq!(out.as_ptr(), ptr);
    }

    #[test]
    fn rewrites_percent_encoded_references() {
        let manifest = Bytes::from_static(br#"{"buffers":[{"uri":"Wheel%20Hub.bin"}]}"#);
        let map = mapping(&[("Wheel Hub.bin", "Wheel-Hub.bin")]);

        let out = rewrite_manifest(manifest, &map);
        assert_eq!(&out[..], br#"{"buffers":[{"uri":"Wheel-Hub.bin"}]}"#);
    }

    #[test]
    fn rewrites_partially_encoded_references() {
        // Spaces encoded, parentheses left alone, as `encodeURI` writes them.
        let manifest = Bytes::from_static(
            br#"{"buffers":[{"uri":"Wheel%20Hub%20(1).bin"}],"images":[{"uri":"Rim%20Finish!.png"}]}"#,
        );
        let map = mapping(&[
            ("Wheel Hub (1).bin", "Wheel-Hub-1.bin"),
            ("Rim Finish!.png", "Rim-Finish.png"),
        ]);

        let out = rewrite_manifest(manifest, &map);
        assert_eq!(
            &out[..],
            br#"{"buffers":[{"uri":"Wheel-Hub-1.bin"}],"images":[{"uri":"Rim-Finish.png"}]}"#
        );
        assert_eq!(
            referenced_uris(&out).unwrap(),
            vec!["Wheel-Hub-1.bin".to_string(), "Rim-Finish.png".to_string()]
        );
    }

    #[test]
    fn replacement_output_is_not_rescanned() {
        // "x.bin" -> "ab.bin" and "ab.bin" -> "c.bin": a sequential replace
        // would turn the first reference into "c.bin".
        let manifest = Bytes::from_static(b"x.bin ab.bin");
        let map = mapping(&[("x.bin", "ab.bin"), ("ab.bin", "c.bin")]);

        let out = rewrite_manifest(manifest, &map);
        assert_eq!(&out[..], b"ab.bin c.bin");
    }

    #[test]
    fn longest_original_wins() {
        let manifest = Bytes::from_static(b"big part.bin part.bin");
        let map = mapping(&[("part.bin", "p.bin"), ("big part.bin", "big-part.bin")]);

        let out = rewrite_manifest(manifest, &map);
        assert_eq!(&out[..], b"big-part.bin p.bin");
    }

    #[test]
    fn collects_relative_references() {
        let manifest = br#"{
            "asset": {"version": "2.0"},
            "buffers": [{"uri": "Wheel%20Hub.bin", "byteLength": 4}, {"byteLength": 8}],
            "images": [
                {"uri": "steel.png"},
                {"uri": "data:image/png;base64,AAAA"},
                {"uri": "https://cdn.example.com/x.png"},
                {"bufferView": 2}
            ]
        }"#;
        let uris = referenced_uris(manifest).unwrap();
        assert_eq!(uris, vec!["Wheel Hub.bin".to_string(), "steel.png".to_string()]);
    }

    #[test]
    fn rejects_non_json_manifest() {
        assert!(referenced_uris(b"not json").is_err());
    }
}
