//! Generic plan computation.
//!
//! Every resource plans the same way. The effective region is fixed first.
//! On update, computed attributes the configuration leaves unset start from
//! their prior value; once anything configurable changes, those the API may
//! rewrite become unknown again (see [`Attribute::use_state_for_unknown`]).
//! On create and on replacement every unset computed attribute is unknown.
//! The result is diffed against prior state attribute by attribute.
//!
//! [`Attribute::use_state_for_unknown`]: crate::schema::Attribute::use_state_for_unknown

use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::region::plan_region;
use crate::schema::{Block, BlockNestingMode, Schema};
use crate::types::{AttributeChange, PlanResult};
use crate::value::{is_unknown_value, Attr, UNKNOWN};

const REGION: &str = "region";

/// Plan one resource.
///
/// `proposed` is the configuration merged with prior state by the host,
/// `config` the raw configuration. A null `proposed` plans a deletion.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use stackit_provider::plan::plan_resource;
/// use stackit_provider::schema::{Attribute, Schema};
///
/// let schema = Schema::v0()
///     .with_attribute("instance_id", Attribute::computed_id())
///     .with_attribute("name", Attribute::required_string())
///     .with_attribute("updated_at", Attribute::computed_string());
/// let prior = json!({"instance_id": "i", "name": "a", "updated_at": "t0"});
/// let config = json!({"name": "b"});
///
/// let plan = plan_resource(&schema, Some(&prior), &config, &config, "eu01").unwrap();
/// assert_eq!(plan.planned_state["instance_id"], "i");
/// assert_eq!(plan.planned_state["updated_at"], stackit_provider::value::UNKNOWN);
/// ```
pub fn plan_resource(
    schema: &Schema,
    prior: Option<&Value>,
    proposed: &Value,
    config: &Value,
    default_region: &str,
) -> Result<PlanResult, ProviderError> {
    if proposed.is_null() {
        let changes = match prior {
            Some(Value::Object(prior)) => prior
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| AttributeChange::removed(k.clone(), v.clone()))
                .collect(),
            _ => Vec::new(),
        };
        return Ok(PlanResult::with_changes(Value::Null, changes, false));
    }

    let proposed = as_object(proposed, "proposed state")?;
    let config = match config {
        Value::Null => Map::new(),
        other => as_object(other, "configuration")?.clone(),
    };
    let prior = match prior {
        None | Some(Value::Null) => None,
        Some(other) => Some(as_object(other, "prior state")?),
    };

    let mut planned = proposed.clone();
    let mut requires_replace = false;

    if schema.is_regional() {
        let configured: Attr<String> = match config.get(REGION) {
            Some(v) => serde_json::from_value(v.clone())?,
            None => Attr::Null,
        };
        let prior_region = prior.and_then(|p| p.get(REGION)).and_then(Value::as_str);
        let region = plan_region(&configured, prior_region, default_region);
        requires_replace |= region.requires_replace;
        planned.insert(REGION.to_string(), serde_json::to_value(&region.region)?);
    }

    if let Some(prior) = prior {
        requires_replace |= forces_replacement(&schema.block, prior, &planned);
    }

    let carry = if requires_replace { None } else { prior };
    fill_computed(&schema.block, &mut planned, carry, &config);

    let mut changes = diff(&schema.block, prior, &planned);
    if prior.is_some() && changes.is_empty() {
        return Ok(PlanResult::no_change(Value::Object(planned)));
    }
    if let Some(prior) = carry {
        defer_rewritten(&schema.block, &mut planned, prior, &config, true);
        changes = diff(&schema.block, Some(prior), &planned);
    }
    Ok(PlanResult::with_changes(
        Value::Object(planned),
        changes,
        requires_replace,
    ))
}

/// Whether an applied state honours a plan: every known planned value must
/// come back unchanged, unknown ones may resolve to anything.
///
/// Returns the path of the first mismatch.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use stackit_provider::plan::first_divergence;
/// use stackit_provider::value::UNKNOWN;
///
/// let planned = json!({"name": "db", "flavor": {"id": UNKNOWN, "cpu": 4}});
/// assert_eq!(first_divergence(&planned, &json!({"name": "db", "flavor": {"id": "4.8", "cpu": 4}})), None);
/// assert_eq!(
///     first_divergence(&planned, &json!({"name": "db", "flavor": {"id": "4.8", "cpu": 2}})),
///     Some("flavor.cpu".to_string())
/// );
/// ```
pub fn first_divergence(planned: &Value, applied: &Value) -> Option<String> {
    diverges(planned, applied, "")
}

fn diverges(planned: &Value, applied: &Value, path: &str) -> Option<String> {
    let at = |key: &str| {
        if path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", path, key)
        }
    };
    if is_unknown_value(planned) {
        return None;
    }
    match (planned, applied) {
        (Value::Object(p), Value::Object(a)) => p
            .keys()
            .chain(a.keys())
            .find_map(|k| diverges(get(p, k), get(a, k), &at(k))),
        (Value::Array(p), Value::Array(a)) if p.len() == a.len() => p
            .iter()
            .zip(a)
            .enumerate()
            .find_map(|(i, (x, y))| diverges(x, y, &at(&i.to_string()))),
        _ if same(planned, applied) => None,
        _ => Some(if path.is_empty() { "(root)".to_string() } else { path.to_string() }),
    }
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, ProviderError> {
    value
        .as_object()
        .ok_or_else(|| ProviderError::InvalidRequest(format!("{} must be an object", what)))
}

fn get<'a>(object: &'a Map<String, Value>, key: &str) -> &'a Value {
    object.get(key).unwrap_or(&Value::Null)
}

fn unknown() -> Value {
    Value::String(UNKNOWN.to_string())
}

/// Value equality where an absent object key equals an explicit null.
fn same(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => same_object(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same(x, y))
        },
        _ => a == b,
    }
}

fn same_object(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
    a.keys().chain(b.keys()).all(|k| same(get(a, k), get(b, k)))
}

/// Whether a configurable force-new attribute or block changes.
fn forces_replacement(block: &Block, prior: &Map<String, Value>, planned: &Map<String, Value>) -> bool {
    let attributes = block
        .attributes
        .iter()
        .filter(|(name, attr)| attr.force_new && !attr.flags.computed_only() && name.as_str() != REGION)
        .any(|(name, _)| {
            let after = get(planned, name);
            // unset optional+computed attributes keep their prior value
            !after.is_null() && !same(after, get(prior, name))
        });
    attributes
        || block.blocks.iter().any(|(name, nested)| {
            let (before, after) = (get(prior, name), get(planned, name));
            if nested.force_new {
                return !same(after, before);
            }
            match (nested.nesting_mode, before.as_object(), after.as_object()) {
                (BlockNestingMode::Single, Some(before), Some(after)) => {
                    forces_replacement(&nested.block, before, after)
                },
                _ => false,
            }
        })
}

/// Fill computed attributes the configuration leaves unset: with the prior
/// value (null included) when there is one, otherwise with unknown.
fn fill_computed(
    block: &Block,
    planned: &mut Map<String, Value>,
    prior: Option<&Map<String, Value>>,
    config: &Map<String, Value>,
) {
    let prior_or_unknown = |name: &str| prior.map_or_else(unknown, |p| get(p, name).clone());

    for (name, attr) in &block.attributes {
        if !attr.flags.computed || name == REGION || !get(config, name).is_null() {
            continue;
        }
        planned.insert(name.clone(), prior_or_unknown(name));
    }

    for (name, nested) in &block.blocks {
        let configured = get(config, name);
        if configured.is_null() {
            if nested.computed {
                planned.insert(name.clone(), prior_or_unknown(name));
            }
            continue;
        }
        if nested.nesting_mode != BlockNestingMode::Single {
            continue;
        }
        let (Some(config_obj), Some(Value::Object(planned_obj))) =
            (configured.as_object(), planned.get_mut(name))
        else {
            continue;
        };
        let prior_obj = prior.and_then(|p| p.get(name)).and_then(Value::as_object);
        fill_computed(&nested.block, planned_obj, prior_obj, config_obj);
    }
}

/// Mark computed attributes the update may rewrite as unknown.
///
/// `changed` tells whether anything configurable in this block differs from
/// prior state. Configured single nested blocks are judged on their own
/// contents, so resizing a flavor defers `flavor.id` but renaming the
/// instance does not.
fn defer_rewritten(
    block: &Block,
    planned: &mut Map<String, Value>,
    prior: &Map<String, Value>,
    config: &Map<String, Value>,
    changed: bool,
) {
    if changed {
        for (name, attr) in &block.attributes {
            if attr.flags.computed
                && !attr.use_state_for_unknown
                && name != REGION
                && get(config, name).is_null()
            {
                planned.insert(name.clone(), unknown());
            }
        }
    }

    for (name, nested) in &block.blocks {
        if nested.nesting_mode != BlockNestingMode::Single {
            continue;
        }
        let (Some(config_obj), Some(prior_obj)) =
            (get(config, name).as_object(), prior.get(name).and_then(Value::as_object))
        else {
            continue;
        };
        let Some(Value::Object(planned_obj)) = planned.get_mut(name) else {
            continue;
        };
        let block_changed = !same_object(prior_obj, planned_obj);
        defer_rewritten(&nested.block, planned_obj, prior_obj, config_obj, block_changed);
    }
}

fn diff(block: &Block, prior: Option<&Map<String, Value>>, planned: &Map<String, Value>) -> Vec<AttributeChange> {
    let names = block.attributes.keys().chain(block.blocks.keys());
    let mut changes = Vec::new();
    for name in names {
        let after = get(planned, name);
        match prior {
            None if !after.is_null() => changes.push(AttributeChange::added(name.clone(), after.clone())),
            None => {},
            Some(prior) => {
                let before = get(prior, name);
                if same(before, after) {
                    continue;
                }
                changes.push(match (before.is_null(), after.is_null()) {
                    (true, _) => AttributeChange::added(name.clone(), after.clone()),
                    (false, true) => AttributeChange::removed(name.clone(), before.clone()),
                    (false, false) => AttributeChange::modified(name.clone(), before.clone(), after.clone()),
                });
            },
        }
    }
    changes
}
