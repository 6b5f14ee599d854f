//! Action selection
//!
//! The reconciler computes exactly one action per invocation from three
//! inputs: whether the resource was observed, the requested desired state,
//! and whether the desired and observed configurations are in sync.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Requested state of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    #[default]
    Present,
    Absent,
}

/// What the reconciler will do to converge observed onto desired state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    NoAction,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::NoAction => "no-action",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Choose the action for one reconciliation.
///
/// `in_sync` is only consulted when the resource exists and is requested
/// present; the other branches are decided by existence alone.
pub fn select_action(observed_exists: bool, desired: DesiredState, in_sync: bool) -> Action {
    match (observed_exists, desired) {
        (false, DesiredState::Present) => Action::Create,
        (false, DesiredState::Absent) => Action::NoAction,
        (true, DesiredState::Absent) => Action::Delete,
        (true, DesiredState::Present) => {
            if in_sync {
                Action::NoAction
            } else {
                Action::Update
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        use Action::*;
        use DesiredState::*;

        assert_eq!(select_action(false, Present, false), Create);
        assert_eq!(select_action(false, Present, true), Create);
        assert_eq!(select_action(false, Absent, false), NoAction);
        assert_eq!(select_action(false, Absent, true), NoAction);
        assert_eq!(select_action(true, Absent, false), Delete);
        assert_eq!(select_action(true, Absent, true), Delete);
        assert_eq!(select_action(true, Present, true), NoAction);
        assert_eq!(select_action(true, Present, false), Update);
    }

    #[test]
    fn test_desired_state_parses_lowercase() {
        let present: DesiredState = serde_json::from_str("\"present\"").unwrap();
        let absent: DesiredState = serde_json::from_str("\"absent\"").unwrap();
        assert_eq!(present, DesiredState::Present);
        assert_eq!(absent, DesiredState::Absent);
        assert_eq!(DesiredState::default(), DesiredState::Present);
    }
}
