//! Modifier map construction
//!
//! Walks a resource type's declared field schema and produces a flat map
//! from wire path (e.g. `/sku/name`) to whether the field at that path may
//! be changed in place on an existing resource.

use crate::resource::registry::FieldDef;
use std::collections::{BTreeMap, HashMap};

/// Build the modifier map for a field schema.
///
/// Pre-order traversal: each field's absolute path is its parent path
/// joined with the field's disposition (or its declared name when no
/// disposition is given). Dict fields and list-of-dict fields recurse with
/// the computed path as the new parent; list elements share the list's
/// path, so there is no index component and every element of a sequence
/// gets one updatability verdict.
pub fn build_modifier_map(fields: &BTreeMap<String, FieldDef>) -> HashMap<String, bool> {
    let mut map = HashMap::new();
    walk(fields, "", &mut map);
    map
}

fn walk(fields: &BTreeMap<String, FieldDef>, parent: &str, map: &mut HashMap<String, bool>) {
    for (name, field) in fields {
        let path = format!("{}/{}", parent, field.wire_segment(name));
        map.insert(path.clone(), field.updatable);

        if let Some(nested) = field.nested_fields() {
            walk(nested, &path, map);
        }
    }
}

/// Look up the updatability verdict for a wire path.
/// Paths without an entry (free-form dict keys, intermediate segments of a
/// slashed disposition) default to updatable.
pub fn is_updatable(map: &HashMap<String, bool>, path: &str) -> bool {
    map.get(path).copied().unwrap_or(true)
}
