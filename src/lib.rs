//! azrec - declarative reconciler for Azure Resource Manager resources
//!
//! Given a YAML manifest declaring resources (`state: present` or
//! `absent` plus a typed property tree), azrec fetches the live resource,
//! compares desired against observed through a schema-driven differ, and
//! performs at most one mutating ARM call per resource: create, update,
//! delete, or nothing at all.
//!
//! # Module Structure
//!
//! - [`azure`] - ARM REST client: auth, HTTP, long-running operations
//! - [`resource`] - Data-driven resource registry and the read path
//! - [`reconcile`] - Modifier map, differ, action selection, engine
//! - [`manifest`] - Desired-state manifest loading and validation
//! - [`config`] - Persistent user configuration

pub mod azure;
pub mod config;
pub mod manifest;
pub mod reconcile;
pub mod resource;
