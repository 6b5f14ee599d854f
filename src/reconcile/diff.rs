//! Desired/observed comparison
//!
//! Decides whether the desired configuration differs from the observed one
//! in any field present in the desired tree. The comparison is
//! one-directional: observed fields that the caller never declared are
//! ignored. Every mismatch is appended to a record accumulator together
//! with the modifier-map verdict for its path; a mismatch at a
//! non-updatable path is informational only and does not change the
//! outcome (it still counts as "differs").

use super::modifiers::is_updatable;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// One recorded mismatch between desired and observed state
#[derive(Debug, Clone, Serialize)]
pub struct DiffRecord {
    pub path: String,
    pub desired: Value,
    pub observed: Value,
    pub updatable: bool,
}

impl fmt::Display for DiffRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {}{}",
            self.path,
            self.observed,
            self.desired,
            if self.updatable {
                ""
            } else {
                " (not updatable in place)"
            }
        )
    }
}

/// Compare the desired wire body against the observed configuration.
///
/// Returns `true` when the observed resource already satisfies the desired
/// configuration (no update required). `path` is the wire path of the
/// subtree being compared; pass `""` at the root.
pub fn default_compare(
    modifiers: &HashMap<String, bool>,
    desired: &Value,
    observed: &Value,
    path: &str,
    results: &mut Vec<DiffRecord>,
) -> bool {
    match (desired, observed) {
        (Value::Object(want), Value::Object(have)) => {
            let mut in_sync = true;
            for (key, want_value) in want {
                let child_path = format!("{}/{}", path, key);
                match have.get(key) {
                    Some(have_value) => {
                        if !default_compare(modifiers, want_value, have_value, &child_path, results)
                        {
                            in_sync = false;
                        }
                    }
                    None => {
                        // Absent observed value only matters when the
                        // desired value is non-empty
                        if !is_empty(want_value) {
                            record(modifiers, want_value, &Value::Null, &child_path, results);
                            in_sync = false;
                        }
                    }
                }
            }
            in_sync
        }
        (Value::Array(want), Value::Array(have)) => {
            if want.len() != have.len() {
                record(modifiers, desired, observed, path, results);
                return false;
            }
            let mut in_sync = true;
            for (want_item, have_item) in want.iter().zip(have.iter()) {
                // Elements share the sequence's path; the index does not
                // participate in modifier lookup
                if !default_compare(modifiers, want_item, have_item, path, results) {
                    in_sync = false;
                }
            }
            in_sync
        }
        (want, have) => {
            if want == have {
                true
            } else {
                record(modifiers, want, have, path, results);
                false
            }
        }
    }
}

fn record(
    modifiers: &HashMap<String, bool>,
    desired: &Value,
    observed: &Value,
    path: &str,
    results: &mut Vec<DiffRecord>,
) {
    results.push(DiffRecord {
        path: path.to_string(),
        desired: desired.clone(),
        observed: observed.clone(),
        updatable: is_updatable(modifiers, path),
    });
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
