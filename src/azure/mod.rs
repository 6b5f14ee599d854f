//! Azure Resource Manager interaction module
//!
//! This module provides the core functionality for talking to ARM:
//! authentication, HTTP, URL construction and long-running-operation
//! polling.
//!
//! # Module Structure
//!
//! - [`auth`] - Token acquisition (service principal, Azure CLI, static)
//! - [`client`] - Main ARM client for making API requests
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use azrec::azure::auth::ArmCredentials;
//! use azrec::azure::client::ArmClient;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let credentials = ArmCredentials::from_env()?;
//!     let client = ArmClient::new(credentials, "my-subscription-id")?;
//!     let body = client.get("https://management.azure.com/...").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
