//! Utility network projections
//!
//! Pure snapshot functions shared with the aggregates, and the projection
//! that keeps the utility graph in sync with stored events.

pub mod snapshot_functions;
pub mod utility_network;

pub use snapshot_functions::*;
pub use utility_network::UtilityNetworkProjection;
