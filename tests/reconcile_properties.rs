//! Property-based tests for the comparison and action-selection core

use azrec::reconcile::{build_modifier_map, default_compare, select_action, Action, DesiredState};
use azrec::resource::registry::FieldDef;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

fn arb_scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-z]{1,8}".prop_map(Value::String),
        any::<bool>().prop_map(Value::Bool),
        (0i64..1000).prop_map(|n| json!(n)),
    ]
}

fn arb_tree() -> impl Strategy<Value = Value> {
    arb_scalar().prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn arb_object() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z]{1,6}", arb_tree(), 0..4)
        .prop_map(|m| Value::Object(m.into_iter().collect()))
}

proptest! {
    /// A desired tree never drifts from itself
    #[test]
    fn compare_is_reflexive(desired in arb_object()) {
        let mut records = Vec::new();
        prop_assert!(default_compare(&HashMap::new(), &desired, &desired, "", &mut records));
        prop_assert!(records.is_empty());
    }

    /// Observed-only fields never cause drift (one-directional comparison)
    #[test]
    fn observed_extras_are_ignored(desired in arb_object(), extra in arb_tree()) {
        let Value::Object(mut have) = desired.clone() else { unreachable!() };
        // Generated keys match [a-z]{1,6}, so this key cannot collide
        have.insert("observed_only".to_string(), extra);
        let mut records = Vec::new();
        prop_assert!(default_compare(
            &HashMap::new(),
            &desired,
            &Value::Object(have),
            "",
            &mut records
        ));
        prop_assert!(records.is_empty());
    }

    /// Sequences of different lengths always differ, whatever the elements
    #[test]
    fn list_length_mismatch_always_differs(
        items in prop::collection::vec(arb_scalar(), 0..4),
        extra in arb_scalar(),
    ) {
        let desired = json!({"items": items});
        let mut longer = items.clone();
        longer.push(extra);
        let observed = json!({"items": longer});

        let mut records = Vec::new();
        prop_assert!(!default_compare(&HashMap::new(), &desired, &observed, "", &mut records));
        prop_assert_eq!(records[0].path.as_str(), "/items");
    }

    /// Scalar drift drives an update; equality drives nothing
    #[test]
    fn scalar_drift_drives_update(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
        let desired = json!({"tier": a});
        let observed = json!({"tier": b});
        let mut records = Vec::new();
        let in_sync = default_compare(&HashMap::new(), &desired, &observed, "", &mut records);

        let expected = if a == b { Action::NoAction } else { Action::Update };
        prop_assert_eq!(select_action(true, DesiredState::Present, in_sync), expected);
    }

    /// An absent resource is only ever created or left alone; the comparison
    /// verdict cannot make it something else
    #[test]
    fn absent_observed_never_updates_or_deletes(in_sync in any::<bool>()) {
        prop_assert_eq!(
            select_action(false, DesiredState::Present, in_sync),
            Action::Create
        );
        prop_assert_eq!(
            select_action(false, DesiredState::Absent, in_sync),
            Action::NoAction
        );
    }

    /// When the desire is absence, the verdict is decided by existence alone
    #[test]
    fn absence_ignores_comparison(in_sync in any::<bool>()) {
        prop_assert_eq!(
            select_action(true, DesiredState::Absent, in_sync),
            Action::Delete
        );
    }
}

/// Nested dispositions concatenate into one slash-joined wire path, and the
/// innermost flag wins
#[test]
fn modifier_paths_concatenate_dispositions() {
    let schema: BTreeMap<String, FieldDef> = serde_json::from_value(json!({
        "a": {
            "type": "dict",
            "fields": {
                "b": {
                    "type": "dict",
                    "fields": {
                        "c": {"type": "str", "updatable": false}
                    }
                }
            }
        }
    }))
    .unwrap();

    let map = build_modifier_map(&schema);
    assert_eq!(map.get("/a/b/c"), Some(&false));
    assert_eq!(map.get("/a/b"), Some(&true));
    assert_eq!(map.get("/a"), Some(&true));
}
