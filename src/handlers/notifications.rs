//! Change notifications
//!
//! After a command's events are stored and projected, listeners (map
//! renderers, search indexes) are told which route network elements gained
//! or lost equipment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Equipment contained in some route network elements changed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteNetworkElementContainedEquipmentUpdated {
    pub event_id: Uuid,
    pub category: String,
    /// Name of the command that caused the change
    pub change_type: String,
    pub affected_route_network_element_ids: Vec<Uuid>,
    pub equipment_ids: Vec<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

impl RouteNetworkElementContainedEquipmentUpdated {
    pub fn new(
        category: impl Into<String>,
        change_type: impl Into<String>,
        affected_route_network_element_ids: Vec<Uuid>,
        equipment_ids: Vec<Uuid>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            category: category.into(),
            change_type: change_type.into(),
            affected_route_network_element_ids,
            equipment_ids,
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification channel is full")]
    ChannelFull,

    #[error("Notification channel is disconnected")]
    Disconnected,
}

/// Publishes change notifications to listeners
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(
        &self,
        notification: RouteNetworkElementContainedEquipmentUpdated,
    ) -> Result<(), NotificationError>;
}
