//! Reconciliation engine
//!
//! One reconciliation = one optional fetch plus at most one mutating call,
//! executed sequentially:
//!
//! 1. Fetch the observed configuration (HTTP 404 means "absent").
//! 2. Expand the manifest properties into the wire-shaped request body.
//! 3. Compare desired against observed through the modifier map.
//! 4. Select and perform the action (create / update / delete / nothing).
//!
//! In check mode the engine stops after step 4's decision and reports what
//! it would have done without touching the backend.

pub mod action;
pub mod body;
pub mod diff;
pub mod modifiers;

pub use action::{select_action, Action, DesiredState};
pub use body::expand_body;
pub use diff::{default_compare, DiffRecord};
pub use modifiers::build_modifier_map;

use crate::azure::client::ArmClient;
use crate::resource::registry::ResourceDef;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::Value;

/// Result of reconciling a single resource
#[derive(Debug, Serialize)]
pub struct Outcome {
    pub action: Action,
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diff: Vec<DiffRecord>,
}

/// Drives a resource toward its desired state with at most one mutating
/// ARM call
pub struct Reconciler<'a> {
    client: &'a ArmClient,
    check_mode: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(client: &'a ArmClient, check_mode: bool) -> Self {
        Self { client, check_mode }
    }

    pub async fn reconcile(
        &self,
        def: &ResourceDef,
        resource_group: &str,
        name: &str,
        state: DesiredState,
        properties: &Value,
    ) -> Result<Outcome> {
        let url = self.client.resource_url(def, resource_group, name);

        let observed = self
            .client
            .get_optional(&url)
            .await
            .with_context(|| format!("Could not read {} '{}'", def.display_name, name))?
            .map(normalize_observed);

        // Absent entries only need identification; their properties are
        // never expanded or compared
        let desired_body = match state {
            DesiredState::Present => Some(expand_body(&def.fields, properties).with_context(
                || format!("Invalid properties for {} '{}'", def.display_name, name),
            )?),
            DesiredState::Absent => None,
        };

        let mut diff = Vec::new();
        let in_sync = match (&desired_body, &observed) {
            (Some(want), Some(current)) => {
                let modifiers = build_modifier_map(&def.fields);
                default_compare(&modifiers, want, current, "", &mut diff)
            }
            _ => false,
        };

        for record in &diff {
            if record.updatable {
                tracing::debug!("{} '{}' drift at {}", def.display_name, name, record);
            } else {
                tracing::warn!(
                    "{} '{}' differs at {} which cannot be changed in place; the update is attempted anyway",
                    def.display_name,
                    name,
                    record.path
                );
            }
        }

        let action = select_action(observed.is_some(), state, in_sync);
        tracing::info!(
            "{} '{}' in '{}': {}",
            def.display_name,
            name,
            resource_group,
            action
        );

        if self.check_mode {
            return Ok(Outcome {
                action,
                changed: action != Action::NoAction,
                resource: observed,
                diff,
            });
        }

        match action {
            Action::NoAction => Ok(Outcome {
                action,
                changed: false,
                resource: observed,
                diff,
            }),
            Action::Create | Action::Update => {
                // select_action only picks these when the state is present
                let body = desired_body
                    .as_ref()
                    .ok_or_else(|| anyhow!("{} selected without a request body", action))?;
                let resource = self
                    .client
                    .put(&url, body)
                    .await
                    .with_context(|| {
                        format!("Could not {} {} '{}'", action, def.display_name, name)
                    })?;
                Ok(Outcome {
                    action,
                    changed: true,
                    resource: Some(resource),
                    diff,
                })
            }
            Action::Delete => {
                self.client.delete(&url).await.with_context(|| {
                    format!("Could not delete {} '{}'", def.display_name, name)
                })?;
                Ok(Outcome {
                    action,
                    changed: true,
                    resource: None,
                    diff,
                })
            }
        }
    }
}

/// ARM echoes location strings in display form ("West Europe") while
/// manifests use the canonical form ("westeurope"). Normalize the observed
/// value so the differ can stay a plain equality check.
fn normalize_observed(mut value: Value) -> Value {
    if let Some(location) = value.get("location").and_then(|v| v.as_str()) {
        let canonical = location.replace(' ', "").to_lowercase();
        if let Value::Object(map) = &mut value {
            map.insert("location".to_string(), Value::String(canonical));
        }
    }
    value
}
