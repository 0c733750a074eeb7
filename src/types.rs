//! Plan, import and metadata values exchanged with the host.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One top-level attribute that differs between prior and planned state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Attribute name.
    pub path: String,
    /// Prior value; `None` when the attribute was previously unset.
    pub before: Option<Value>,
    /// Planned value; `None` when the attribute is being cleared.
    pub after: Option<Value>,
}

impl AttributeChange {
    /// A change from `before` to `after`.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// An attribute that gains a value.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// An attribute that loses its value.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// An attribute whose value changes.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }

    /// Whether the planned value is still unknown.
    pub fn is_deferred(&self) -> bool {
        self.after
            .as_ref()
            .and_then(Value::as_str)
            .is_some_and(|s| s == crate::value::UNKNOWN)
    }
}

/// Outcome of planning one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// State the host passes to create or update. `Null` for a destroy plan.
    pub planned_state: Value,
    /// Attributes that differ from the prior state.
    pub changes: Vec<AttributeChange>,
    /// Set when a force-new attribute or the region changed.
    pub requires_replace: bool,
}

impl PlanResult {
    /// A plan that leaves `state` untouched.
    pub fn no_change(state: Value) -> Self {
        Self::with_changes(state, Vec::new(), false)
    }

    /// A plan with the given changes.
    pub fn with_changes(planned_state: Value, changes: Vec<AttributeChange>, requires_replace: bool) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// The change recorded for `path`, if any.
    pub fn change(&self, path: &str) -> Option<&AttributeChange> {
        self.changes.iter().find(|c| c.path == path)
    }
}

/// State skeleton produced by an import.
///
/// Only the path-segment identifiers (and `id`) are set; the host follows up
/// with a read to fill everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// Resource type name, e.g. `stackit_postgresflex_user`.
    pub resource_type: String,
    /// Identifier attributes parsed from the import id.
    pub state: Value,
}

impl ImportedResource {
    /// Wrap an import skeleton for `resource_type`.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Registered type names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names.
    pub resources: Vec<String>,
    /// Data source type names.
    pub data_sources: Vec<String>,
}
