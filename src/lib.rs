//! Utility network domain
//!
//! Manages the as-built topology of a fiber-optic utility network: span
//! equipment (conduits, cables), terminal equipment and node containers
//! overlaid on a route network. The core is the versioned utility
//! connectivity graph and its trace engine; equipment aggregates keep it in
//! sync through events applied by the utility network projection.

pub mod aggregate;
pub mod commands;
pub mod config;
pub mod domain_events;
pub mod events;
pub mod graph;
pub mod handlers;
pub mod infrastructure;
pub mod projections;
pub mod queries;
pub mod route_network;
pub mod value_objects;

// Re-export main types
pub use aggregate::*;
pub use domain_events::*;
pub use events::*;

// Re-export commands and their types
pub use commands::{
    UtilityNetworkCommand, UtilityNetworkCommandError, UtilityNetworkCommandResult,
};

// Re-export configuration
pub use config::{ConfigError, NotificationConfig, UtilityNetworkConfig};

// Re-export the graph core
pub use graph::{
    ObjectManagerConfig, TraceMode, TraceResult, UtilityGraph, UtilityGraphElement,
    UtilityGraphError, UtilityGraphResult,
};

// Re-export command handlers
pub use handlers::{
    CommandHandler, EventStore, NotificationPublisher,
    RouteNetworkElementContainedEquipmentUpdated, UtilityNetworkCommandHandler,
};

// Re-export infrastructure
pub use infrastructure::{
    ChannelNotificationPublisher, InMemoryEventStore, InMemoryRouteNetwork,
    LoggingNotificationPublisher,
};

// Re-export projections
pub use projections::UtilityNetworkProjection;

// Re-export query types
pub use queries::{
    ResultEnvelope, UtilityNetworkQueryError, UtilityNetworkQueryHandler,
    UtilityNetworkQueryHandlerImpl, UtilityNetworkQueryResult,
};

// Re-export route network types
pub use route_network::{RouteNetworkError, RouteNetworkQueries};
