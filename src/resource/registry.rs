//! Resource Registry - Load resource type definitions from JSON
//!
//! This module loads all ARM resource type definitions from embedded JSON
//! files and provides lookup functions for the rest of the application.
//! A definition carries everything the engine needs: the ARM provider
//! namespace, collection segment and api-version for URL construction, and
//! the declared field schema that drives body expansion and diffing.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/storage.json"),
    include_str!("../resources/containerinstance.json"),
    include_str!("../resources/monitor.json"),
    include_str!("../resources/iothub.json"),
    include_str!("../resources/media.json"),
];

/// Type tag of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Str,
    Int,
    Float,
    Bool,
    Dict,
    List,
}

fn default_updatable() -> bool {
    true
}

/// Field definition from JSON
///
/// `updatable` marks whether the field may be changed on an existing
/// resource (default true); `disposition` is the wire-path segment the
/// field maps to in the request body when it differs from the declared
/// name (it may contain slashes, e.g. `properties/accessTier`).
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDef {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default = "default_updatable")]
    pub updatable: bool,
    #[serde(default)]
    pub disposition: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub choices: Vec<String>,
    /// Sub-schema for `dict` fields
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDef>,
    /// Element schema for `list` fields
    #[serde(default)]
    pub element: Option<Box<FieldDef>>,
}

impl FieldDef {
    /// Wire-path segment this field occupies in the request body.
    /// Falls back to the declared field name when no disposition is given.
    pub fn wire_segment<'a>(&'a self, name: &'a str) -> &'a str {
        self.disposition.as_deref().unwrap_or(name)
    }

    /// Sub-schema worth recursing into: a dict's fields, or the fields of
    /// a list-of-dicts element. List elements share the list's own path.
    pub fn nested_fields(&self) -> Option<&BTreeMap<String, FieldDef>> {
        match self.field_type {
            FieldType::Dict if !self.fields.is_empty() => Some(&self.fields),
            FieldType::List => self
                .element
                .as_deref()
                .filter(|e| e.field_type == FieldType::Dict && !e.fields.is_empty())
                .map(|e| &e.fields),
            _ => None,
        }
    }
}

/// Resource type definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub display_name: String,
    /// ARM provider namespace, e.g. `Microsoft.Storage`
    pub provider: String,
    /// Collection path segment, e.g. `storageAccounts`
    pub collection: String,
    pub api_version: String,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDef>,
}

impl ResourceDef {
    /// Fully qualified ARM type, e.g. `Microsoft.Storage/storageAccounts`
    pub fn arm_type(&self) -> String {
        format!("{}/{}", self.provider, self.collection)
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub resources: HashMap<String, ResourceDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            resources: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.resources.extend(partial.resources);
        }

        final_config
    })
}

/// Get a resource definition by key
pub fn get_resource(key: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(key)
}

/// Get all resource keys, sorted for stable CLI output
pub fn get_all_resource_keys() -> Vec<&'static str> {
    let mut keys: Vec<&str> = get_registry().resources.keys().map(|s| s.as_str()).collect();
    keys.sort_unstable();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_loads_successfully() {
        let registry = get_registry();
        assert!(
            !registry.resources.is_empty(),
            "Registry should have resources"
        );
    }

    #[test]
    fn test_storage_account_resource_exists() {
        let resource = get_resource("storage-account");
        assert!(resource.is_some(), "Storage account resource should exist");

        let resource = resource.unwrap();
        assert_eq!(resource.display_name, "Storage Account");
        assert_eq!(resource.provider, "Microsoft.Storage");
        assert_eq!(resource.arm_type(), "Microsoft.Storage/storageAccounts");
    }

    #[test]
    fn test_get_all_resource_keys() {
        let keys = get_all_resource_keys();
        assert!(!keys.is_empty(), "Should have resource types");
        assert!(
            keys.contains(&"container-group"),
            "Should contain container-group"
        );
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        assert_eq!(keys, sorted, "Keys should come out sorted");
    }

    #[test]
    fn test_updatable_defaults_to_true() {
        let resource = get_resource("storage-account").unwrap();
        let sku = resource.fields.get("sku").unwrap();
        assert!(sku.updatable);

        let location = resource.fields.get("location").unwrap();
        assert!(!location.updatable, "location is not updatable");
    }

    #[test]
    fn test_disposition_falls_back_to_name() {
        let resource = get_resource("storage-account").unwrap();
        let sku = resource.fields.get("sku").unwrap();
        assert_eq!(sku.wire_segment("sku"), "sku");

        let tier = resource.fields.get("access_tier").unwrap();
        assert_eq!(tier.wire_segment("access_tier"), "properties/accessTier");
    }
}
