//! Resource abstraction layer
//!
//! This module provides a data-driven approach to describing ARM
//! resources. Resource definitions are loaded from JSON files at compile
//! time, so new resource types can be added without code changes: the
//! generic reconcile engine and the read path are driven entirely by the
//! definition's field schema.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches resource definitions from embedded JSON
//! - [`query`] - Informational get/list with `nextLink` pagination
//!
//! # Resource Definitions
//!
//! Resources are defined in JSON files under `src/resources/`:
//! - `storage.json` - Storage accounts
//! - `containerinstance.json` - Container groups
//! - `monitor.json` - Autoscale settings
//! - `iothub.json` - IoT hubs
//! - `media.json` - Media services

pub mod query;
pub mod registry;

pub use query::{query_all_types, query_resources, QueryIntent};
pub use registry::{get_all_resource_keys, get_registry, get_resource, FieldDef, FieldType, ResourceDef};
