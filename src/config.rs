//! Configuration Management
//!
//! Handles persistent configuration storage for azrec.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default subscription ID
    #[serde(default)]
    pub subscription_id: Option<String>,
    /// Default resource group for queries
    #[serde(default)]
    pub resource_group: Option<String>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("azrec").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Get effective subscription (config > env / Azure CLI profile)
    pub fn effective_subscription(&self) -> Option<String> {
        self.subscription_id
            .clone()
            .or_else(crate::azure::auth::get_default_subscription)
    }

    /// Set subscription and save
    pub fn set_subscription(&mut self, subscription_id: &str) -> Result<()> {
        self.subscription_id = Some(subscription_id.to_string());
        self.save()
    }

    /// Set default resource group and save
    pub fn set_resource_group(&mut self, resource_group: &str) -> Result<()> {
        self.resource_group = Some(resource_group.to_string());
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_subscription_wins() {
        let config = Config {
            subscription_id: Some("12345678-1234-1234-1234-123456789abc".to_string()),
            resource_group: None,
        };
        assert_eq!(
            config.effective_subscription().as_deref(),
            Some("12345678-1234-1234-1234-123456789abc")
        );
    }
}
