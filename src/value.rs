//! Three-state attribute values.
//!
//! Configuration and state documents carry attributes that are either unset
//! (`null`), not yet known (they will be computed during apply) or known.
//! API payloads only know "absent" and "present". [`Attr`] models the first
//! and converts to and from `Option<T>` for the second.
//!
//! Unknown values travel through JSON documents as [`UNKNOWN`], the sentinel
//! string Terraform's shims use for "known after apply".

use std::fmt;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ProviderError;

/// The JSON encoding of an unknown value.
pub const UNKNOWN: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// Returns true when a raw JSON value is the unknown sentinel.
pub fn is_unknown_value(value: &serde_json::Value) -> bool {
    value.as_str() == Some(UNKNOWN)
}

/// A configuration or state attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Attr<T> {
    /// Absent from configuration or state.
    Null,
    /// Will be computed; not resolved yet.
    Unknown,
    /// A concrete value.
    Known(T),
}

impl<T> Default for Attr<T> {
    fn default() -> Self {
        Self::Null
    }
}

impl<T> Attr<T> {
    /// Wrap a concrete value.
    pub fn known(value: impl Into<T>) -> Self {
        Self::Known(value.into())
    }

    /// Whether the attribute is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether the attribute is unknown.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Whether the attribute carries a concrete value.
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Null and unknown both mean "nothing to send".
    pub fn is_null_or_unknown(&self) -> bool {
        !self.is_known()
    }

    /// Borrow the value if known.
    pub fn as_known(&self) -> Option<&T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Take the value if known.
    pub fn into_known(self) -> Option<T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Map a known value, keeping null and unknown as they are.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Attr<U> {
        match self {
            Self::Null => Attr::Null,
            Self::Unknown => Attr::Unknown,
            Self::Known(v) => Attr::Known(f(v)),
        }
    }

    /// Convert a wire value into an attribute: present becomes known, absent
    /// becomes null.
    pub fn from_wire(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Known(v),
            None => Self::Null,
        }
    }
}

impl<T: Clone> Attr<T> {
    /// Convert to a wire value: null and unknown are absent.
    pub fn to_wire(&self) -> Option<T> {
        self.as_known().cloned()
    }

    /// Require a known value, naming the attribute in the error.
    pub fn require(&self, name: &str) -> Result<T, ProviderError> {
        self.as_known().cloned().ok_or_else(|| {
            ProviderError::Validation(format!("attribute \"{}\" must be set", name))
        })
    }
}

impl<T: Clone + PartialEq> Attr<T> {
    /// The known value when it differs from `prior`, for partial updates.
    pub fn changed_from(&self, prior: &Self) -> Option<T> {
        match self {
            Self::Known(v) if self != prior => Some(v.clone()),
            _ => None,
        }
    }
}

impl Attr<String> {
    /// Borrow a known string.
    pub fn as_str(&self) -> Option<&str> {
        self.as_known().map(String::as_str)
    }
}

impl Attr<i64> {
    /// Narrow a known 64-bit integer for a payload field that carries a
    /// smaller integer type. Out-of-range values are an error.
    pub fn narrow<N>(&self, name: &str) -> Result<Option<N>, ProviderError>
    where
        N: TryFrom<i64>,
    {
        match self {
            Self::Known(v) => N::try_from(*v).map(Some).map_err(|_| {
                ProviderError::Validation(format!(
                    "attribute \"{}\" value {} is out of range",
                    name, v
                ))
            }),
            _ => Ok(None),
        }
    }
}

impl<T> From<Option<T>> for Attr<T> {
    fn from(value: Option<T>) -> Self {
        Self::from_wire(value)
    }
}

impl<T: fmt::Display> fmt::Display for Attr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("<null>"),
            Self::Unknown => f.write_str("<unknown>"),
            Self::Known(v) => v.fmt(f),
        }
    }
}

impl<T: Serialize> Serialize for Attr<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Unknown => serializer.serialize_str(UNKNOWN),
            Self::Known(v) => v.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Attr<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        if raw.is_null() {
            return Ok(Self::Null);
        }
        if is_unknown_value(&raw) {
            return Ok(Self::Unknown);
        }
        serde_json::from_value(raw)
            .map(Self::Known)
            .map_err(D::Error::custom)
    }
}

/// Log a value the API was expected to return but did not.
///
/// Mapping continues with the attribute left null.
pub(crate) fn warn_missing(resource: &str, field: &str) {
    tracing::warn!(
        resource = resource,
        field = field,
        "API response did not contain an expected field, leaving it null"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Model {
        name: Attr<String>,
        replicas: Attr<i64>,
        labels: Attr<BTreeMap<String, String>>,
    }

    #[test]
    fn test_wire_bridge() {
        assert_eq!(Attr::from_wire(Some(3_i64)), Attr::Known(3));
        assert_eq!(Attr::<i64>::from_wire(None), Attr::Null);

        assert_eq!(Attr::Known("x".to_string()).to_wire(), Some("x".to_string()));
        assert_eq!(Attr::<String>::Null.to_wire(), None);
        assert_eq!(Attr::<String>::Unknown.to_wire(), None);
    }

    #[test]
    fn test_narrow() {
        let replicas: Attr<i64> = Attr::Known(3);
        assert_eq!(replicas.narrow::<i32>("replicas").unwrap(), Some(3));

        let too_big: Attr<i64> = Attr::Known(i64::from(i32::MAX) + 1);
        let err = too_big.narrow::<i32>("replicas").unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let negative: Attr<i64> = Attr::Known(-1);
        assert!(negative.narrow::<u32>("size").is_err());

        assert_eq!(Attr::<i64>::Unknown.narrow::<i32>("replicas").unwrap(), None);
    }

    #[test]
    fn test_json_three_states() {
        let model: Model = serde_json::from_value(json!({
            "name": UNKNOWN,
            "replicas": 1
        }))
        .unwrap();

        assert_eq!(model.name, Attr::Unknown);
        assert_eq!(model.replicas, Attr::Known(1));
        assert_eq!(model.labels, Attr::Null);

        let back = serde_json::to_value(&model).unwrap();
        assert_eq!(back, json!({"name": UNKNOWN, "replicas": 1, "labels": null}));
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let result: Result<Model, _> = serde_json::from_value(json!({"replicas": "three"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_require() {
        let attr: Attr<String> = Attr::Null;
        let err = attr.require("project_id").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: attribute \"project_id\" must be set"
        );
    }

    #[test]
    fn test_changed_from() {
        let prior = Attr::known("a");
        assert_eq!(Attr::<String>::known("b").changed_from(&prior), Some("b".to_string()));
        assert_eq!(Attr::<String>::known("a").changed_from(&prior), None);
        assert_eq!(Attr::<String>::Unknown.changed_from(&prior), None);
        assert_eq!(Attr::<String>::Null.changed_from(&prior), None);
    }
}
