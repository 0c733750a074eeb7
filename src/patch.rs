//! Merge-patch computation for map attributes (labels).
//!
//! Updates send only what changed: new or modified keys carry their new
//! value, removed keys carry `null`, unchanged keys are left out.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::Attr;

/// A string map attribute such as `labels`.
pub type Labels = BTreeMap<String, String>;

/// A JSON merge-patch body for a string map. `None` deletes the key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MergePatch(BTreeMap<String, Option<String>>);

impl MergePatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of keys touched by the patch.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The patch entry for a key: `Some(None)` is a deletion.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.0.get(key).map(|v| v.as_deref())
    }

    /// Iterate over patch entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Option<String>)> {
        self.0.iter()
    }

    /// Apply the patch to a map.
    pub fn apply(&self, base: &Labels) -> Labels {
        let mut out = base.clone();
        for (key, value) in &self.0 {
            match value {
                Some(v) => {
                    out.insert(key.clone(), v.clone());
                }
                None => {
                    out.remove(key);
                }
            }
        }
        out
    }
}

/// Diff two concrete maps into a merge-patch.
pub fn diff(previous: &Labels, desired: &Labels) -> MergePatch {
    let mut patch = BTreeMap::new();
    for (key, value) in desired {
        if previous.get(key) != Some(value) {
            patch.insert(key.clone(), Some(value.clone()));
        }
    }
    for key in previous.keys() {
        if !desired.contains_key(key) {
            patch.insert(key.clone(), None);
        }
    }
    MergePatch(patch)
}

/// Compute the update for a map attribute.
///
/// A null (or unknown) desired map is diffed as an empty map, so every
/// persisted key is deleted. Returns `None` when the attribute should not be
/// sent at all: nothing is desired and nothing was persisted.
pub fn compute_update(previous: &Attr<Labels>, desired: &Attr<Labels>) -> Option<MergePatch> {
    let empty = Labels::new();
    let prev = previous.as_known().unwrap_or(&empty);
    match desired.as_known() {
        Some(want) => Some(diff(prev, want)),
        None if prev.is_empty() => None,
        None => Some(diff(prev, &empty)),
    }
}

/// Convert labels from an API response into state.
///
/// An empty or absent map stays null when the prior value was null, so an
/// unset `labels` attribute does not show a diff after every refresh.
pub fn labels_from_wire(wire: Option<&Labels>, prior: &Attr<Labels>) -> Attr<Labels> {
    match wire {
        Some(map) if !map.is_empty() => Attr::Known(map.clone()),
        _ if prior.is_null_or_unknown() => Attr::Null,
        _ => Attr::Known(Labels::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_diff() {
        let previous = labels(&[("env", "dev"), ("team", "net"), ("keep", "1")]);
        let desired = labels(&[("env", "prod"), ("keep", "1"), ("new", "x")]);

        let patch = diff(&previous, &desired);
        assert_eq!(patch.len(), 3);
        assert_eq!(patch.get("env"), Some(Some("prod")));
        assert_eq!(patch.get("new"), Some(Some("x")));
        assert_eq!(patch.get("team"), Some(None));
        assert_eq!(patch.get("keep"), None);

        assert_eq!(patch.apply(&previous), desired);
    }

    #[test]
    fn test_serializes_deletions_as_null() {
        let patch = diff(&labels(&[("a", "1")]), &labels(&[("b", "2")]));
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(json, serde_json::json!({"a": null, "b": "2"}));
    }

    #[test]
    fn test_compute_update_null_desired() {
        let previous = Attr::Known(labels(&[("a", "1")]));
        let patch = compute_update(&previous, &Attr::Null).unwrap();
        assert_eq!(patch.get("a"), Some(None));

        assert!(compute_update(&Attr::Null, &Attr::Null).is_none());
        assert!(compute_update(&Attr::Known(Labels::new()), &Attr::Unknown).is_none());
    }

    #[test]
    fn test_compute_update_unchanged() {
        let m = Attr::Known(labels(&[("a", "1"), ("b", "2")]));
        let patch = compute_update(&m, &m).unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn test_labels_from_wire() {
        assert_eq!(labels_from_wire(None, &Attr::Null), Attr::Null);
        assert_eq!(labels_from_wire(Some(&Labels::new()), &Attr::Null), Attr::Null);
        assert_eq!(
            labels_from_wire(None, &Attr::Known(Labels::new())),
            Attr::Known(Labels::new())
        );
        let wire = labels(&[("a", "1")]);
        assert_eq!(labels_from_wire(Some(&wire), &Attr::Null), Attr::Known(wire.clone()));
    }
}
