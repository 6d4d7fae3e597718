//! Utility network aggregates
//!
//! Each aggregate wraps an immutable equipment snapshot. Command methods
//! validate against the snapshot (and the utility graph where connectivity
//! matters), raise exactly the events describing the change and apply them
//! to the snapshot through the pure functions in
//! [`crate::projections::snapshot_functions`]. Graph changes happen when the
//! [`crate::projections::UtilityNetworkProjection`] applies the stored events.

pub mod node_container;
pub mod span_equipment;
pub mod terminal_equipment;

pub use node_container::*;
pub use span_equipment::*;
pub use terminal_equipment::*;

use crate::domain_events::UtilityNetworkEvent;
use uuid::Uuid;

/// Identity and persisted version of an aggregate
pub trait AggregateRoot {
    fn id(&self) -> Uuid;

    /// Number of events persisted for this aggregate
    fn version(&self) -> u64;
}

/// Aggregate rebuilt from and persisted as a stream of its own events
pub trait EventSourcedAggregate: AggregateRoot + Sized {
    type Event: Clone + Into<UtilityNetworkEvent>;

    /// Aggregate with no history
    fn empty(id: Uuid) -> Self;

    /// Apply a persisted event to the snapshot
    fn apply(&mut self, event: &Self::Event);

    /// This aggregate's event, if the wrapped event belongs to its kind
    fn extract(event: &UtilityNetworkEvent) -> Option<&Self::Event>;

    /// Events raised since the aggregate was loaded
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Hand over the uncommitted events once they are persisted
    fn mark_committed(&mut self, version: u64) -> Vec<Self::Event>;

    /// Replay a persisted history
    fn from_history<'e>(id: Uuid, events: impl IntoIterator<Item = &'e Self::Event>) -> Self
    where
        Self::Event: 'e,
    {
        let mut aggregate = Self::empty(id);
        for event in events {
            aggregate.apply(event);
        }
        aggregate
    }
}

/// State shared by every aggregate implementation
#[derive(Debug, Clone)]
pub(crate) struct AggregateState<S, E> {
    pub id: Uuid,
    pub version: u64,
    pub snapshot: Option<S>,
    pub uncommitted: Vec<E>,
}

impl<S, E> AggregateState<S, E> {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            snapshot: None,
            uncommitted: Vec::new(),
        }
    }

    pub fn mark_committed(&mut self, version: u64) -> Vec<E> {
        self.version = version;
        std::mem::take(&mut self.uncommitted)
    }
}
