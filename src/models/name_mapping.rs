//! Per-batch table of original filenames to their sanitized storage names.

use serde::Serialize;

/// Ordered original → sanitized filename table for one upload batch.
///
/// Original names are unique; a name that needed no change maps to itself.
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct NameMapping {
    entries: Vec<(String, String)>,
}

impl NameMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pair. Returns `false` (and leaves the table untouched) when
    /// `original` is already present.
    pub fn insert(&mut self, original: impl Into<String>, sanitized: impl Into<String>) -> bool {
        let original = original.into();
        if self.get(&original).is_some() {
            return false;
        }
        self.entries.push((original, sanitized.into()));
        true
    }

    pub fn get(&self, original: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(old, _)| old == original)
            .map(|(_, new)| new.as_str())
    }

    /// Original name that sanitizes to `sanitized`, if any.
    pub fn original_of(&self, sanitized: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, new)| new == sanitized)
            .map(|(old, _)| old.as_str())
    }

    /// True when `name` is either an original or a sanitized name in the batch.
    pub fn knows(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|(old, new)| old == name || new == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(old, new)| (old.as_str(), new.as_str()))
    }

    /// Pairs whose sanitized name differs from the original.
    pub fn changed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(old, new)| old != new)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<O, S> FromIterator<(O, S)> for NameMapping
where
    O: Into<String>,
    S: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (O, S)>>(iter: I) -> Self {
        let mut mapping = NameMapping::new();
        for (old, new) in iter {
            mapping.insert(old, new);
        }
        mapping
    }
}
