//! Utility network configuration
//!
//! Loaded from JSON. Every field has a default, so an empty object is a
//! valid configuration.

use crate::graph::ObjectManagerConfig;
use crate::handlers::EQUIPMENT_MODIFICATION_CATEGORY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Change notification settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Capacity of the notification channel
    pub channel_capacity: usize,
    /// Category attached to every notification
    pub category: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1000,
            category: EQUIPMENT_MODIFICATION_CATEGORY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UtilityNetworkConfig {
    pub object_manager: ObjectManagerConfig,
    pub notifications: NotificationConfig,
}

impl UtilityNetworkConfig {
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notifications.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "notifications.channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.object_manager.retained_versions == Some(0) {
            return Err(ConfigError::Invalid(
                "object_manager.retained_versions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config =
            UtilityNetworkConfig::from_json_str(r#"{ "notifications": { "category": "Test" } }"#)
                .unwrap();
        assert_eq!(config.notifications.category, "Test");
        assert_eq!(config.notifications.channel_capacity, 1000);
        assert_eq!(config.object_manager, ObjectManagerConfig::default());
    }

    #[test]
    fn test_unbounded_history_and_invalid_values() {
        let config =
            UtilityNetworkConfig::from_json_str(r#"{ "object_manager": { "retained_versions": null } }"#)
                .unwrap();
        assert_eq!(config.object_manager.retained_versions, None);

        assert!(matches!(
            UtilityNetworkConfig::from_json_str(r#"{ "notifications": { "channel_capacity": 0 } }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            UtilityNetworkConfig::from_json_str("not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
