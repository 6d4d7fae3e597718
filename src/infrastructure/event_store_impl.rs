//! In-memory event store
//!
//! Keeps the global log and a per-aggregate index behind one lock so
//! version checks and appends are atomic.

use crate::commands::UtilityNetworkCommandResult;
use crate::domain_events::{DomainEvent, UtilityNetworkEvent};
use crate::handlers::{concurrent_modification, EventStore, StoredEvent};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Log {
    events: Vec<StoredEvent>,
    /// Positions in `events` per aggregate
    streams: HashMap<Uuid, Vec<usize>>,
}

/// Event store held in process memory
#[derive(Default)]
pub struct InMemoryEventStore {
    log: RwLock<Log>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a recorded history, e.g. from a dump file
    pub fn with_history(events: impl IntoIterator<Item = UtilityNetworkEvent>) -> Self {
        let store = Self::new();
        {
            let mut log = store.log.write();
            for event in events {
                let aggregate_id = event.aggregate_id();
                let version = log.streams.get(&aggregate_id).map_or(0, Vec::len) as u64 + 1;
                push(&mut log, aggregate_id, version, event);
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.log.read().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn push(log: &mut Log, aggregate_id: Uuid, version: u64, event: UtilityNetworkEvent) {
    let position = log.events.len();
    log.events.push(StoredEvent {
        sequence: position as u64 + 1,
        aggregate_id,
        version,
        event,
        recorded_at: Utc::now(),
    });
    log.streams.entry(aggregate_id).or_default().push(position);
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn load_events(&self, aggregate_id: Uuid) -> UtilityNetworkCommandResult<Vec<StoredEvent>> {
        let log = self.log.read();
        Ok(log
            .streams
            .get(&aggregate_id)
            .map(|positions| positions.iter().map(|p| log.events[*p].clone()).collect())
            .unwrap_or_default())
    }

    async fn append(
        &self,
        aggregate_id: Uuid,
        expected_version: u64,
        events: Vec<UtilityNetworkEvent>,
    ) -> UtilityNetworkCommandResult<u64> {
        let mut log = self.log.write();
        let current = log.streams.get(&aggregate_id).map_or(0, Vec::len) as u64;
        if current != expected_version {
            return Err(concurrent_modification(aggregate_id, expected_version, current));
        }

        let mut version = current;
        for event in events {
            version += 1;
            push(&mut log, aggregate_id, version, event);
        }
        debug!(aggregate_id = %aggregate_id, version, "Events appended");
        Ok(version)
    }

    async fn all_events(&self) -> UtilityNetworkCommandResult<Vec<StoredEvent>> {
        Ok(self.log.read().events.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{NodeContainerEvent, NodeContainerRemoved};

    fn removed(id: Uuid) -> UtilityNetworkEvent {
        UtilityNetworkEvent::NodeContainer(NodeContainerEvent::NodeContainerRemoved(
            NodeContainerRemoved {
                node_container_id: id,
            },
        ))
    }

    #[tokio::test]
    async fn test_append_checks_expected_version() {
        let store = InMemoryEventStore::new();
        let id = Uuid::new_v4();

        assert_eq!(store.append(id, 0, vec![removed(id)]).await.unwrap(), 1);
        let err = store.append(id, 0, vec![removed(id)]).await.unwrap_err();
        assert_eq!(err.error_code(), "CONCURRENT_MODIFICATION");

        assert_eq!(store.append(id, 1, vec![removed(id)]).await.unwrap(), 2);
        let stream = store.load_events(id).await.unwrap();
        assert_eq!(stream.iter().map(|e| e.version).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_global_order_spans_streams() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let store = InMemoryEventStore::with_history([removed(a), removed(b), removed(a)]);

        let all = store.all_events().await.unwrap();
        assert_eq!(all.iter().map(|e| e.sequence).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(all[2].version, 2);
        assert!(store.load_events(Uuid::new_v4()).await.unwrap().is_empty());
    }
}
