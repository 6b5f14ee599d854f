//! Request body expansion
//!
//! Turns the schema-keyed properties from a manifest into the wire-shaped
//! body that ARM receives, by moving each declared field to its
//! disposition path. A disposition may contain slashes, in which case the
//! intermediate objects are created (or merged) as needed.

use crate::resource::registry::{FieldDef, FieldType};
use anyhow::{bail, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Expand manifest properties into the ARM request body.
pub fn expand_body(fields: &BTreeMap<String, FieldDef>, properties: &Value) -> Result<Value> {
    let Value::Object(props) = properties else {
        bail!("properties must be a mapping");
    };

    let mut body = Map::new();
    for (name, value) in props {
        let Some(field) = fields.get(name) else {
            bail!("unknown field '{}'", name);
        };
        let expanded = expand_field(field, value)
            .map_err(|e| e.context(format!("in field '{}'", name)))?;
        insert_at(&mut body, field.wire_segment(name), expanded);
    }

    Ok(Value::Object(body))
}

fn expand_field(field: &FieldDef, value: &Value) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    match field.field_type {
        FieldType::Dict if !field.fields.is_empty() => expand_body(&field.fields, value),
        FieldType::List => {
            let Value::Array(items) = value else {
                bail!("expected a list");
            };
            match field.nested_fields() {
                Some(element_fields) => {
                    let expanded: Result<Vec<Value>> = items
                        .iter()
                        .map(|item| expand_body(element_fields, item))
                        .collect();
                    Ok(Value::Array(expanded?))
                }
                // Lists of scalars (or undeclared elements) pass through
                None => Ok(value.clone()),
            }
        }
        // Free-form dicts (tags) and scalars pass through
        _ => Ok(value.clone()),
    }
}

/// Insert `value` at a slash-separated path, merging with any objects the
/// earlier fields already created along the way.
fn insert_at(map: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('/') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(inner) = entry {
                insert_at(inner, rest, value);
            }
        }
    }
}
