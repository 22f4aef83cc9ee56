//! Attribute schemas for the provider block, resources and data sources.
//!
//! A [`Schema`] is a tree of [`Block`]s. It drives config validation, default
//! filling and planning, and the descriptions the host renders.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Value type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// UTF-8 string.
    String,
    /// Signed 64-bit integer.
    Int64,
    /// `true` or `false`.
    Bool,
    /// Ordered list of one element type.
    List(Box<AttributeType>),
    /// Object with named, typed fields. Computed lists of blocks use this.
    Object(HashMap<String, AttributeType>),
}

impl AttributeType {
    /// `List` of `element_type`.
    pub fn list(element_type: AttributeType) -> Self {
        Self::List(Box::new(element_type))
    }

    /// `Object` with the given fields.
    pub fn object(fields: HashMap<String, AttributeType>) -> Self {
        Self::Object(fields)
    }
}

/// Who sets an attribute, and whether its value is secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// Must be configured.
    pub required: bool,
    /// May be configured.
    pub optional: bool,
    /// Filled in by the provider.
    pub computed: bool,
    /// Redacted in host output.
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Configured by the user, always.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// Configured by the user, or left out.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Read-only; set from the control plane.
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }

    /// Configured by the user, or filled in by the provider when left out.
    pub fn optional_computed() -> Self {
        Self {
            optional: true,
            computed: true,
            ..Default::default()
        }
    }

    /// Also redact the value.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }
}

/// One attribute of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Value type.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Required/optional/computed/sensitive.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// User-facing documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A change replaces the resource.
    #[serde(default)]
    pub force_new: bool,
    /// Value used when the attribute is absent or null.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    /// Checks run against configured values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<ValueValidator>,
    /// Attributes that may not be set together with this one.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts_with: Vec<String>,
}

impl Attribute {
    /// An attribute with no description, default or checks.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
            validators: Vec::new(),
            conflicts_with: Vec::new(),
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

    /// Read-only string.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    /// A string the provider fills in when it is not configured.
    pub fn optional_computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional_computed())
    }

    /// Optional integer.
    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::optional())
    }

    /// Read-only integer.
    pub fn computed_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::computed())
    }

    /// Optional bool.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    /// Read-only bool.
    pub fn computed_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::computed())
    }

    /// A read-only list of strings.
    pub fn computed_string_list() -> Self {
        Self::new(AttributeType::list(AttributeType::String), AttributeFlags::computed())
    }

    /// A read-only list of objects shaped like `block`.
    pub fn computed_list_of(block: &Block) -> Self {
        Self::new(AttributeType::list(block.object_type()), AttributeFlags::computed())
    }

    /// Attach user-facing documentation.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the resource when this attribute changes.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Value to use when unset.
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Redact the value in host output.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }

    /// Also let the provider fill the attribute in.
    pub fn computed(mut self) -> Self {
        self.flags.computed = true;
        self
    }

    /// Check configured values with `validator`.
    pub fn with_validator(mut self, validator: ValueValidator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Reject configs that set both this attribute and `other`.
    pub fn conflicts_with(mut self, other: impl Into<String>) -> Self {
        self.conflicts_with.push(other.into());
        self
    }

    /// True when only the provider sets the attribute.
    pub fn is_computed_only(&self) -> bool {
        self.flags.computed && !self.flags.required && !self.flags.optional
    }

    /// The description as shown to users, with the default appended.
    pub fn rendered_description(&self) -> Option<String> {
        let default = match &self.default {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => return self.description.clone(),
        };
        match &self.description {
            Some(desc) => Some(format!("{} Defaults to `{}`.", desc, default)),
            None => Some(format!("Defaults to `{}`.", default)),
        }
    }
}

/// A check applied to a configured attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueValidator {
    /// A UUID in its 8-4-4-4-12 hex form.
    Uuid,
    /// One of a fixed set of strings.
    OneOf {
        /// Accepted values.
        values: Vec<String>,
        /// Compare without regard to ASCII case.
        ignore_case: bool,
    },
    /// An integer within `min..=max`.
    IntBetween(i64, i64),
    /// A target group health check port: `traffic-port` or a port number.
    TargetGroupHealthCheckPort,
}

impl ValueValidator {
    /// A case-sensitive [`ValueValidator::OneOf`].
    pub fn one_of(values: &[&str]) -> Self {
        Self::OneOf {
            values: values.iter().map(|v| v.to_string()).collect(),
            ignore_case: false,
        }
    }

    /// A case-insensitive [`ValueValidator::OneOf`].
    pub fn one_of_ignore_case(values: &[&str]) -> Self {
        Self::OneOf {
            values: values.iter().map(|v| v.to_string()).collect(),
            ignore_case: true,
        }
    }

    /// Check a non-null value, returning a message when it is rejected.
    pub fn check(&self, value: &serde_json::Value) -> Result<(), String> {
        match self {
            Self::Uuid => {
                let s = value.as_str().unwrap_or_default();
                if is_uuid(s) {
                    Ok(())
                } else {
                    Err(format!("expected a valid UUID, got {:?}", s))
                }
            },
            Self::OneOf {
                values,
                ignore_case,
            } => {
                let s = value.as_str().unwrap_or_default();
                let found = values.iter().any(|v| {
                    if *ignore_case {
                        v.eq_ignore_ascii_case(s)
                    } else {
                        v == s
                    }
                });
                if found {
                    Ok(())
                } else {
                    Err(format!("expected one of {:?}, got {:?}", values, s))
                }
            },
            Self::IntBetween(min, max) => match value.as_i64() {
                Some(n) if (*min..=*max).contains(&n) => Ok(()),
                Some(n) => Err(format!("expected to be in the range ({} - {}), got {}", min, max, n)),
                None => Err(format!("expected an integer, got {}", value)),
            },
            Self::TargetGroupHealthCheckPort => {
                let s = value.as_str().unwrap_or_default();
                if s == "traffic-port" {
                    return Ok(());
                }
                match s.parse::<u32>() {
                    Ok(port) if (1..=65535).contains(&port) => Ok(()),
                    _ => Err(format!(
                        "expected \"traffic-port\" or a port number between 1 and 65535, got {:?}",
                        s
                    )),
                }
            },
        }
    }
}

fn is_uuid(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    groups.len() == lengths.len()
        && groups
            .iter()
            .zip(lengths)
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
}

/// How a nested block appears in config: one object or a list of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// At most one object.
    #[default]
    Single,
    /// Zero or more objects, in order.
    List,
}

/// Attributes and nested blocks at one level of a schema, such as the
/// `health_check` block of a target group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Attributes by name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, Attribute>,
    /// Nested blocks by name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub blocks: HashMap<String, NestedBlock>,
    /// User-facing documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    /// A block with nothing in it.
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

    /// Attach user-facing documentation.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The object type a value of this block has in state.
    pub fn object_type(&self) -> AttributeType {
        let mut fields: HashMap<String, AttributeType> = self
            .attributes
            .iter()
            .map(|(name, attr)| (name.clone(), attr.attr_type.clone()))
            .collect();
        for (name, nested) in &self.blocks {
            let inner = nested.block.object_type();
            let ty = match nested.nesting_mode {
                BlockNestingMode::Single => inner,
                BlockNestingMode::List => AttributeType::list(inner),
            };
            fields.insert(name.clone(), ty);
        }
        AttributeType::object(fields)
    }

    /// Fold attribute defaults into their descriptions, recursively.
    pub fn render_descriptions(&mut self) {
        for attr in self.attributes.values_mut() {
            attr.description = attr.rendered_description();
        }
        for nested in self.blocks.values_mut() {
            nested.block.render_descriptions();
        }
    }
}

/// A block nested under a parent, with item-count limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// The nested block's own schema.
    #[serde(flatten)]
    pub block: Block,
    /// One object or a list.
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    /// Fewest items accepted.
    #[serde(default)]
    pub min_items: u32,
    /// Most items accepted; `0` means no limit.
    #[serde(default)]
    pub max_items: u32,
}

impl NestedBlock {
    /// An optional single object.
    pub fn single(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::Single,
            min_items: 0,
            max_items: 1,
        }
    }

    /// An unbounded list of objects.
    pub fn list(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::List,
            min_items: 0,
            max_items: 0,
        }
    }

    /// Require at least `min` items.
    pub fn with_min_items(mut self, min: u32) -> Self {
        self.min_items = min;
        self
    }

    /// Accept at most `max` items.
    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }
}

/// The schema of one resource or data source type, or of the provider block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Bumped when stored state needs upgrading.
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

    /// A schema whose state has never needed upgrading.
    pub fn v0() -> Self {
        Self::new(0)
    }

    /// Add or replace a top-level attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    /// Add or replace a top-level nested block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    /// Document the resource or data source.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.block.description = Some(description.into());
        self
    }

    /// Look up a top-level attribute.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.block.attributes.get(name)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::v0()
    }
}

/// Everything the host learns from `schema()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// The `provider "duplocloud"` block.
    #[serde(default)]
    pub provider: Schema,
    /// Resource schemas by type name.
    #[serde(default)]
    pub resources: HashMap<String, Schema>,
    /// Data source schemas by type name.
    #[serde(default)]
    pub data_sources: HashMap<String, Schema>,
}

impl ProviderSchema {
    /// No provider block, resources or data sources yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider block schema.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Register a resource type.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    /// Register a data source type.
    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

/// How serious a [`Diagnostic`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// The operation fails.
    Error,
    /// Shown to the user; the operation continues.
    Warning,
}

/// A message for the user about their configuration or the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: DiagnosticSeverity,
    /// One-line summary.
    pub summary: String,
    /// Longer explanation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Dotted path of the offending attribute, e.g. `health_check.0.port`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    /// An error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Error, summary)
    }

    /// A warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Warning, summary)
    }

    fn with_severity(severity: DiagnosticSeverity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Longer explanation below the summary.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Point the diagnostic at an attribute path.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }
}
