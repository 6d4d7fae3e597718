//! Utility network command handling
//!
//! Command handlers process utility network commands, validate them against
//! the aggregates, the utility graph and the route network, and emit events.
//! They serve as the bridge between commands and the domain aggregates.

mod command_handler;
mod event_store;
mod notifications;

pub use command_handler::{UtilityNetworkCommandHandler, EQUIPMENT_MODIFICATION_CATEGORY};
pub use event_store::{concurrent_modification, AggregateRepository, EventStore, StoredEvent};
pub use notifications::{
    NotificationError, NotificationPublisher, RouteNetworkElementContainedEquipmentUpdated,
};

use crate::commands::{UtilityNetworkCommand, UtilityNetworkCommandResult};
use crate::domain_events::UtilityNetworkEvent;
use async_trait::async_trait;

/// Trait for handling utility network commands
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle a command and return the events it stored
    async fn handle_command(
        &self,
        command: UtilityNetworkCommand,
    ) -> UtilityNetworkCommandResult<Vec<UtilityNetworkEvent>>;
}
