//! Event store and aggregate repository
//!
//! The store keeps one ordered stream per aggregate with optimistic
//! concurrency on the stream version. [`AggregateRepository`] rebuilds
//! aggregates from their stream and persists uncommitted events.

use crate::aggregate::EventSourcedAggregate;
use crate::commands::{UtilityNetworkCommandError, UtilityNetworkCommandResult};
use crate::domain_events::UtilityNetworkEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// An event as persisted in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Position in the global log, starting at 1
    pub sequence: u64,
    pub aggregate_id: Uuid,
    /// Stream version after this event
    pub version: u64,
    pub event: UtilityNetworkEvent,
    pub recorded_at: DateTime<Utc>,
}

/// Append-only store of utility network events
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Events of one aggregate in stream order
    async fn load_events(&self, aggregate_id: Uuid) -> UtilityNetworkCommandResult<Vec<StoredEvent>>;

    /// Append events if the stream is still at `expected_version`.
    /// Returns the new stream version.
    async fn append(
        &self,
        aggregate_id: Uuid,
        expected_version: u64,
        events: Vec<UtilityNetworkEvent>,
    ) -> UtilityNetworkCommandResult<u64>;

    /// Every stored event in global order
    async fn all_events(&self) -> UtilityNetworkCommandResult<Vec<StoredEvent>>;
}

/// Loads and saves one kind of event sourced aggregate
pub struct AggregateRepository<A> {
    store: Arc<dyn EventStore>,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A> Clone for AggregateRepository<A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _aggregate: PhantomData,
        }
    }
}

impl<A: EventSourcedAggregate> AggregateRepository<A> {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self {
            store,
            _aggregate: PhantomData,
        }
    }

    /// Rebuild an aggregate from its stream. Unknown ids give an empty
    /// aggregate at version 0.
    pub async fn load(&self, aggregate_id: Uuid) -> UtilityNetworkCommandResult<A> {
        let stored = self.store.load_events(aggregate_id).await?;
        let events = stored.iter().filter_map(|s| A::extract(&s.event));
        let mut aggregate = A::from_history(aggregate_id, events);
        let version = stored.last().map(|s| s.version).unwrap_or(0);
        aggregate.mark_committed(version);
        Ok(aggregate)
    }

    /// Persist the uncommitted events and return them
    pub async fn save(&self, aggregate: &mut A) -> UtilityNetworkCommandResult<Vec<UtilityNetworkEvent>> {
        let events: Vec<UtilityNetworkEvent> = aggregate
            .uncommitted_events()
            .iter()
            .cloned()
            .map(Into::into)
            .collect();
        if events.is_empty() {
            return Ok(events);
        }

        let version = self
            .store
            .append(aggregate.id(), aggregate.version(), events.clone())
            .await?;
        aggregate.mark_committed(version);

        debug!(
            aggregate_id = %aggregate.id(),
            version,
            events = events.len(),
            "Aggregate saved"
        );
        Ok(events)
    }
}

/// Build the error an event store returns on a version mismatch
pub fn concurrent_modification(aggregate_id: Uuid, expected: u64, actual: u64) -> UtilityNetworkCommandError {
    UtilityNetworkCommandError::ConcurrentModification {
        aggregate_id,
        expected,
        actual,
    }
}
