//! Infrastructure implementations
//!
//! In-process implementations of the handler and route network traits.

pub mod event_store_impl;
pub mod notification_publisher_impl;
pub mod route_network_impl;

pub use event_store_impl::InMemoryEventStore;
pub use notification_publisher_impl::{
    ChannelNotificationPublisher, LoggingNotificationPublisher, NotificationReceiver,
};
pub use route_network_impl::{InMemoryRouteNetwork, RouteNode, RouteSegment};
