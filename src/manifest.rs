//! Desired-state manifests
//!
//! A manifest is a YAML document declaring the resources that should (or
//! should not) exist. Schema validation happens here, before any
//! reconciliation starts: unknown fields, missing required fields and
//! invalid enum choices are rejected up front.

use crate::reconcile::DesiredState;
use crate::resource::registry::{get_all_resource_keys, get_resource, FieldDef, FieldType};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// A desired-state manifest
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// Subscription override; the CLI flag and the persisted config are
    /// consulted when absent
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

/// One declared resource
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceEntry {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    pub resource_group: String,
    #[serde(default)]
    pub state: DesiredState,
    #[serde(default = "empty_mapping")]
    pub properties: Value,
}

fn empty_mapping() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Manifest {
    /// Load a manifest from a YAML file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Could not parse manifest {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let manifest: Manifest =
            serde_yaml::from_str(content).context("Manifest is not valid YAML")?;
        Ok(manifest)
    }

    /// Validate every entry against the registry schemas.
    pub fn validate(&self) -> Result<()> {
        for entry in &self.resources {
            entry
                .validate()
                .with_context(|| format!("Invalid resource '{}'", entry.name))?;
        }
        Ok(())
    }
}

impl ResourceEntry {
    fn validate(&self) -> Result<()> {
        let Some(def) = get_resource(&self.resource_type) else {
            bail!(
                "unknown resource type '{}' (known types: {})",
                self.resource_type,
                get_all_resource_keys().join(", ")
            );
        };

        // Absent resources only need identification; their properties are
        // never sent anywhere
        if self.state == DesiredState::Absent {
            return Ok(());
        }

        validate_properties(&def.fields, &self.properties, true)
    }
}

fn validate_properties(
    fields: &BTreeMap<String, FieldDef>,
    properties: &Value,
    check_required: bool,
) -> Result<()> {
    let Value::Object(props) = properties else {
        bail!("properties must be a mapping");
    };

    for (name, value) in props {
        let Some(field) = fields.get(name) else {
            bail!("unsupported parameter '{}'", name);
        };
        validate_field(name, field, value)?;
    }

    if check_required {
        for (name, field) in fields {
            if field.required && !props.contains_key(name) {
                bail!("missing required parameter '{}'", name);
            }
        }
    }

    Ok(())
}

fn validate_field(name: &str, field: &FieldDef, value: &Value) -> Result<()> {
    if value.is_null() {
        return Ok(());
    }

    match field.field_type {
        FieldType::Str => {
            let Some(s) = value.as_str() else {
                bail!("parameter '{}' must be a string", name);
            };
            if !field.choices.is_empty() && !field.choices.iter().any(|c| c == s) {
                bail!(
                    "invalid choice '{}' for parameter '{}' (expected one of: {})",
                    s,
                    name,
                    field.choices.join(", ")
                );
            }
        }
        FieldType::Int => {
            if !value.is_i64() && !value.is_u64() {
                bail!("parameter '{}' must be an integer", name);
            }
        }
        FieldType::Float => {
            if !value.is_number() {
                bail!("parameter '{}' must be a number", name);
            }
        }
        FieldType::Bool => {
            if !value.is_boolean() {
                bail!("parameter '{}' must be a boolean", name);
            }
        }
        FieldType::Dict => {
            if !field.fields.is_empty() {
                validate_properties(&field.fields, value, true)
                    .with_context(|| format!("in parameter '{}'", name))?;
            } else if !value.is_object() {
                bail!("parameter '{}' must be a mapping", name);
            }
        }
        FieldType::List => {
            let Some(items) = value.as_array() else {
                bail!("parameter '{}' must be a list", name);
            };
            if let Some(element_fields) = field.nested_fields() {
                for (index, item) in items.iter().enumerate() {
                    validate_properties(element_fields, item, true)
                        .with_context(|| format!("in parameter '{}[{}]'", name, index))?;
                }
            }
        }
    }

    Ok(())
}
