//! Attribute schemas for the provider block, resources and data sources.
//!
//! The host renders these into Terraform schemas; the provider itself uses
//! them for validation, planning (computed and force-new attributes) and
//! import.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// UTF-8 string.
    String,
    /// Signed 64-bit integer. Narrower API fields are range-checked on conversion.
    Int64,
    /// Boolean.
    Bool,
    /// Ordered collection.
    List(Box<AttributeType>),
    /// Unordered collection of unique values.
    Set(Box<AttributeType>),
    /// String-keyed map, e.g. `labels`.
    Map(Box<AttributeType>),
}

impl AttributeType {
    /// `list(element_type)`.
    pub fn list(element_type: AttributeType) -> Self {
        Self::List(Box::new(element_type))
    }

    /// `set(element_type)`.
    pub fn set(element_type: AttributeType) -> Self {
        Self::Set(Box::new(element_type))
    }

    /// `map(element_type)`.
    pub fn map(element_type: AttributeType) -> Self {
        Self::Map(Box::new(element_type))
    }
}

/// Who may set an attribute: the configuration, the provider, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// Must be present in configuration.
    pub required: bool,
    /// May be present in configuration.
    pub optional: bool,
    /// Filled by the provider when not configured.
    pub computed: bool,
    /// Masked in plan output. Passwords and connection uris.
    pub sensitive: bool,
}

impl AttributeFlags {
    const fn of(required: bool, optional: bool, computed: bool) -> Self {
        Self {
            required,
            optional,
            computed,
            sensitive: false,
        }
    }

    /// Configuration must set it.
    pub fn required() -> Self {
        Self::of(true, false, false)
    }

    /// Configuration may set it; otherwise it stays null.
    pub fn optional() -> Self {
        Self::of(false, true, false)
    }

    /// Only the provider sets it.
    pub fn computed() -> Self {
        Self::of(false, false, true)
    }

    /// Configuration may set it; otherwise the provider does.
    pub fn optional_computed() -> Self {
        Self::of(false, true, true)
    }

    /// Mask the value in plan output.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Whether only the provider ever sets the value.
    pub fn computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// A value check applied to known string attributes during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeValidator {
    /// Must not contain the composite id separator.
    NoSeparator,
    /// Must be a UUID.
    Uuid,
    /// Must not be empty.
    NonEmpty,
    /// Must be one of the listed values.
    OneOf(Vec<String>),
}

/// One attribute of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Value type.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Required / optional / computed / sensitive.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Shown in the generated documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A change to this attribute replaces the resource.
    #[serde(default)]
    pub force_new: bool,
    /// Checks applied to the configured value.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<AttributeValidator>,
    /// A computed value that no update rewrites: plans keep the prior value
    /// instead of marking it unknown.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub use_state_for_unknown: bool,
}

impl Attribute {
    /// An attribute of `attr_type` with no description or validators.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            validators: Vec::new(),
            use_state_for_unknown: false,
        }
    }

    /// Required string.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    /// Optional string.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    /// Provider-set string.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    /// Required integer.
    pub fn required_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::required())
    }

    /// Optional integer.
    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional())
    }

    /// Provider-set integer.
    pub fn computed_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::computed())
    }

    /// Provider-set boolean.
    pub fn computed_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::computed())
    }

    /// Optional `map(string)`, the shape of `labels`.
    pub fn optional_string_map() -> Self {
        Self::new(AttributeType::map(AttributeType::String), AttributeFlags::optional())
    }

    /// A configured path-segment identifier: a UUID that cannot change
    /// in place.
    ///
    /// The value is validated as a UUID and must not contain the composite
    /// id separator, since it becomes one segment of the resource `id`.
    ///
    /// # Example
    ///
    /// ```
    /// use stackit_provider::schema::{Attribute, AttributeValidator};
    ///
    /// let project_id = Attribute::required_id();
    /// assert!(project_id.flags.required);
    /// assert!(project_id.force_new);
    /// assert!(project_id.validators.contains(&AttributeValidator::Uuid));
    /// ```
    pub fn required_id() -> Self {
        Self::required_string()
            .with_force_new()
            .with_validator(AttributeValidator::Uuid)
            .with_validator(AttributeValidator::NoSeparator)
    }

    /// A path-segment identifier assigned by the API.
    pub fn computed_id() -> Self {
        Self::computed_string().use_state_for_unknown()
    }

    /// The `region` attribute shared by regional resources.
    ///
    /// Optional and computed: when configuration leaves it unset, planning
    /// fills in the provider default region. Any change replaces the resource.
    ///
    /// # Example
    ///
    /// ```
    /// use stackit_provider::schema::{Attribute, Schema};
    ///
    /// let schema = Schema::v0()
    ///     .with_attribute("project_id", Attribute::required_id())
    ///     .with_attribute("region", Attribute::region());
    /// assert!(schema.is_regional());
    /// ```
    pub fn region() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional_computed())
            .with_description("The resource region. If not defined, the provider region is used.")
            .with_force_new()
            .with_validator(AttributeValidator::NoSeparator)
    }

    /// Attach documentation.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the resource when this attribute changes.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Append a value check.
    pub fn with_validator(mut self, validator: AttributeValidator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Restrict the attribute to a fixed set of values.
    pub fn one_of(self, values: &[&str]) -> Self {
        self.with_validator(AttributeValidator::OneOf(
            values.iter().map(|v| v.to_string()).collect(),
        ))
    }

    /// Mask the value in plan output.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }

    /// Keep the prior value of a computed attribute when planning an update.
    ///
    /// Unflagged computed attributes are planned unknown whenever anything
    /// configurable changes, because the API may rewrite them (`updated_at`,
    /// a re-resolved flavor id). Flag only values fixed at creation.
    ///
    /// # Example
    ///
    /// ```
    /// use stackit_provider::schema::Attribute;
    ///
    /// let created_at = Attribute::computed_string().use_state_for_unknown();
    /// assert!(created_at.use_state_for_unknown);
    /// assert!(!Attribute::computed_string().use_state_for_unknown);
    /// ```
    pub fn use_state_for_unknown(mut self) -> Self {
        self.use_state_for_unknown = true;
        self
    }
}

/// How many objects a nested block holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// Zero or one object.
    #[default]
    Single,
    /// An ordered list of objects.
    List,
}

/// A set of attributes and nested blocks.
///
/// Blocks hold objects with their own attributes, such as a route's
/// `destination` or an instance's `storage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    /// Attributes by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    /// Nested blocks by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, NestedBlock>,
    /// Shown in the generated documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    /// An empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Add or replace a nested block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.blocks.insert(name.into(), block);
        self
    }

    /// Attach documentation.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The `{type, value}` object of a tagged union.
    ///
    /// # Arguments
    ///
    /// * `kinds` - The accepted `type` values, e.g. `["cidrv4", "cidrv6"]`
    ///
    /// # Example
    ///
    /// ```
    /// use stackit_provider::schema::{Block, NestedBlock};
    ///
    /// let destination = NestedBlock::single(Block::typed_value(&["cidrv4", "cidrv6"])).required();
    /// assert!(destination.block.attributes["type"].flags.required);
    /// assert!(destination.block.attributes["value"].flags.optional);
    /// ```
    pub fn typed_value(kinds: &[&str]) -> Self {
        Self::new()
            .with_attribute("type", Attribute::required_string().one_of(kinds))
            .with_attribute("value", Attribute::optional_string())
    }
}

/// A block nested under a parent, with its cardinality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// Contents of each object.
    #[serde(flatten)]
    pub block: Block,
    /// Single object or list.
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    /// Fewest objects accepted.
    #[serde(default)]
    pub min_items: u32,
    /// Most objects accepted; 0 means no limit.
    #[serde(default)]
    pub max_items: u32,
    /// Filled by the provider.
    #[serde(default)]
    pub computed: bool,
    /// A change anywhere in the block replaces the resource.
    #[serde(default)]
    pub force_new: bool,
}

impl NestedBlock {
    fn with_mode(block: Block, nesting_mode: BlockNestingMode, max_items: u32) -> Self {
        Self {
            block,
            nesting_mode,
            min_items: 0,
            max_items,
            computed: false,
            force_new: false,
        }
    }

    /// At most one object.
    ///
    /// # Example
    ///
    /// ```
    /// use stackit_provider::schema::{Attribute, Block, NestedBlock};
    ///
    /// let storage = NestedBlock::single(
    ///     Block::new()
    ///         .with_attribute("class", Attribute::required_string().with_force_new())
    ///         .with_attribute("size", Attribute::required_int64()),
    /// )
    /// .required();
    /// assert_eq!((storage.min_items, storage.max_items), (1, 1));
    /// ```
    pub fn single(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::Single, 1)
    }

    /// Any number of objects.
    pub fn list(block: Block) -> Self {
        Self::with_mode(block, BlockNestingMode::List, 0)
    }

    /// Set the lower bound on the object count.
    pub fn with_min_items(mut self, min: u32) -> Self {
        self.min_items = min;
        self
    }

    /// Set the upper bound on the object count.
    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }

    /// Require at least one object in configuration.
    pub fn required(self) -> Self {
        self.with_min_items(1)
    }

    /// Let the provider fill the block.
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    /// Replace the resource when the block changes.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }
}

/// Schema of one resource or data source type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    /// State version, bumped when the stored shape changes.
    #[serde(default)]
    pub version: u64,
    /// Top-level attributes and blocks.
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    /// An empty schema at `version`.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            block: Block::new(),
        }
    }

    /// An empty schema at version 0.
    pub fn v0() -> Self {
        Self::new(0)
    }

    /// Add or replace a top-level attribute.
    ///
    /// # Arguments
    ///
    /// * `name` - The attribute name as written in configuration
    /// * `attr` - The attribute definition
    ///
    /// # Example
    ///
    /// ```
    /// use stackit_provider::schema::{Attribute, Schema};
    ///
    /// let schema = Schema::v0()
    ///     .with_description("Routing table resource schema.")
    ///     .with_attribute("name", Attribute::required_string())
    ///     .with_attribute("labels", Attribute::optional_string_map());
    /// assert!(schema.block.attributes.contains_key("labels"));
    /// assert!(!schema.is_regional());
    /// ```
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block = self.block.with_attribute(name, attr);
        self
    }

    /// Add or replace a top-level block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block = self.block.with_block(name, block);
        self
    }

    /// Attach documentation.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.block = self.block.with_description(description);
        self
    }

    /// Whether the schema has a top-level `region` attribute.
    pub fn is_regional(&self) -> bool {
        self.block.attributes.contains_key("region")
    }
}

/// Every schema the provider exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// The `provider "stackit"` block.
    #[serde(default)]
    pub provider: Schema,
    /// Resource schemas by type name.
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
    /// Data source schemas by type name.
    #[serde(default)]
    pub data_sources: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    /// No provider block, resources or data sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider block schema.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Register a resource schema.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    /// Register a data source schema.
    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

/// Whether a diagnostic blocks the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// Blocks the operation.
    Error,
    /// Reported but not blocking.
    Warning,
}

/// A problem reported to the user, optionally pinned to an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: DiagnosticSeverity,
    /// One-line summary.
    pub summary: String,
    /// Longer explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Dotted attribute path, e.g. `destination.value`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn with_severity(severity: DiagnosticSeverity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// A blocking diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Error, summary)
    }

    /// A non-blocking diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Warning, summary)
    }

    /// Attach a longer explanation.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Pin the diagnostic to an attribute path.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether the diagnostic blocks the operation.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_combinations() {
        let required = AttributeFlags::required();
        assert!(required.required && !required.optional && !required.computed);

        assert!(AttributeFlags::computed().computed_only());

        let optional_computed = AttributeFlags::optional_computed();
        assert!(optional_computed.optional && optional_computed.computed);
        assert!(!optional_computed.computed_only());

        assert!(AttributeFlags::optional().sensitive().sensitive);
    }

    #[test]
    fn identifier_and_region_attributes() {
        let id = Attribute::required_id();
        assert!(id.flags.required);
        assert!(id.force_new);
        assert!(id.validators.contains(&AttributeValidator::Uuid));
        assert!(id.validators.contains(&AttributeValidator::NoSeparator));

        let region = Attribute::region();
        assert!(region.flags.optional && region.flags.computed);
        assert!(region.force_new);
    }

    #[test]
    fn route_destination_block() {
        let schema = Schema::v0()
            .with_attribute("labels", Attribute::optional_string_map())
            .with_attribute("region", Attribute::region())
            .with_block(
                "destination",
                NestedBlock::single(Block::typed_value(&["cidrv4", "cidrv6"]))
                    .required()
                    .with_force_new(),
            );

        assert!(schema.is_regional());
        assert_eq!(
            schema.block.attributes["labels"].attr_type,
            AttributeType::map(AttributeType::String)
        );
        let destination = &schema.block.blocks["destination"];
        assert_eq!((destination.min_items, destination.max_items), (1, 1));
        assert!(destination.force_new);
        assert_eq!(
            destination.block.attributes["type"].validators,
            vec![AttributeValidator::OneOf(vec![
                "cidrv4".to_string(),
                "cidrv6".to_string()
            ])]
        );
    }

    #[test]
    fn provider_schema_registers_types() {
        let schema = ProviderSchema::new()
            .with_provider_config(
                Schema::v0().with_attribute("service_account_token", Attribute::optional_string().sensitive()),
            )
            .with_resource(
                "stackit_routing_table",
                Schema::v0().with_attribute("routing_table_id", Attribute::computed_id()),
            )
            .with_data_source("stackit_routing_table", Schema::v0());

        assert!(schema.provider.block.attributes["service_account_token"].flags.sensitive);
        assert!(schema.resources.contains_key("stackit_routing_table"));
        assert!(schema.data_sources.contains_key("stackit_routing_table"));
        assert!(!schema.resources["stackit_routing_table"].is_regional());
    }

    #[test]
    fn diagnostic_builder() {
        let err = Diagnostic::error("Invalid replicas")
            .with_detail("replicas must be 1 or 3")
            .with_attribute("replicas");

        assert!(err.is_error());
        assert!(!Diagnostic::warning("deprecated").is_error());
        assert_eq!(err.detail.as_deref(), Some("replicas must be 1 or 3"));
        assert_eq!(err.attribute.as_deref(), Some("replicas"));
    }
}
