//! Notification publishers
//!
//! [`LoggingNotificationPublisher`] only traces notifications.
//! [`ChannelNotificationPublisher`] hands them to a synchronous consumer over
//! a bounded crossbeam channel.

use crate::handlers::{
    NotificationError, NotificationPublisher, RouteNetworkElementContainedEquipmentUpdated,
};
use async_trait::async_trait;
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use tracing::info;

/// Publisher that writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotificationPublisher;

#[async_trait]
impl NotificationPublisher for LoggingNotificationPublisher {
    async fn publish(
        &self,
        notification: RouteNetworkElementContainedEquipmentUpdated,
    ) -> Result<(), NotificationError> {
        info!(
            category = %notification.category,
            change_type = %notification.change_type,
            route_network_elements = notification.affected_route_network_element_ids.len(),
            equipment = notification.equipment_ids.len(),
            "Route network element contained equipment updated"
        );
        Ok(())
    }
}

/// Publisher feeding a bounded channel. Publishing never blocks, a full
/// channel is reported as [`NotificationError::ChannelFull`].
#[derive(Clone)]
pub struct ChannelNotificationPublisher {
    tx: Sender<RouteNetworkElementContainedEquipmentUpdated>,
}

/// Receiving side of a [`ChannelNotificationPublisher`]
pub struct NotificationReceiver {
    rx: Receiver<RouteNetworkElementContainedEquipmentUpdated>,
}

impl ChannelNotificationPublisher {
    pub fn new(capacity: usize) -> (Self, NotificationReceiver) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, NotificationReceiver { rx })
    }
}

#[async_trait]
impl NotificationPublisher for ChannelNotificationPublisher {
    async fn publish(
        &self,
        notification: RouteNetworkElementContainedEquipmentUpdated,
    ) -> Result<(), NotificationError> {
        self.tx.try_send(notification).map_err(|e| match e {
            TrySendError::Full(_) => NotificationError::ChannelFull,
            TrySendError::Disconnected(_) => NotificationError::Disconnected,
        })
    }
}

impl NotificationReceiver {
    /// Drain up to `max` pending notifications
    pub fn receive_notifications(&self, max: usize) -> Vec<RouteNetworkElementContainedEquipmentUpdated> {
        let mut notifications = Vec::new();
        while notifications.len() < max {
            match self.rx.try_recv() {
                Ok(n) => notifications.push(n),
                Err(_) => break,
            }
        }
        notifications
    }

    pub fn try_recv(&self) -> Option<RouteNetworkElementContainedEquipmentUpdated> {
        self.rx.try_recv().ok()
    }
}
