//! Versioned object manager
//!
//! Stores the membership of the utility graph (nodes, edges and their
//! adjacency) as per-object version chains. Every commit advances a single
//! monotonic version counter; readers pass an explicit version and see the
//! graph exactly as it was committed at that version.
//!
//! Snapshots and transactions pin their version. Retention never prunes a
//! pinned version, so a long running reader only ever sees stale data.
//!
//! ```mermaid
//! sequenceDiagram
//!     participant C as Caller
//!     participant T as Transaction
//!     participant M as ObjectManager
//!     C->>M: create_transaction()
//!     M-->>T: base_version
//!     C->>T: add_node / add_edge / remove_edge
//!     C->>T: commit()
//!     T->>M: conflict check + append versions
//!     M-->>C: new version
//! ```

use super::{GraphEdgeKind, GraphNodeKind, UtilityGraphError, UtilityGraphResult};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// A node of the utility graph with its adjacency list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: Uuid,
    pub kind: GraphNodeKind,
    /// Ids of the edges ending in this node, in insertion order
    pub edges: Vec<Uuid>,
}

/// An edge of the utility graph. A missing endpoint is a dangling end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: Uuid,
    pub kind: GraphEdgeKind,
    pub from_node_id: Option<Uuid>,
    pub to_node_id: Option<Uuid>,
}

impl GraphEdge {
    /// The endpoint opposite to `node_id`. `None` when that end dangles.
    pub fn other_end(&self, node_id: Uuid) -> Option<Uuid> {
        if self.from_node_id == Some(node_id) {
            self.to_node_id
        } else if self.to_node_id == Some(node_id) {
            self.from_node_id
        } else {
            None
        }
    }

    pub fn endpoints(&self) -> impl Iterator<Item = Uuid> {
        self.from_node_id.into_iter().chain(self.to_node_id)
    }
}

/// Settings for history retention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectManagerConfig {
    /// Number of committed versions kept readable. `None` keeps everything.
    pub retained_versions: Option<u64>,
}

impl Default for ObjectManagerConfig {
    fn default() -> Self {
        Self {
            retained_versions: Some(64),
        }
    }
}

/// Ascending list of `(version, value)` entries, `None` marking a removal
#[derive(Debug)]
struct VersionChain<T> {
    entries: Vec<(u64, Option<Arc<T>>)>,
}

impl<T> VersionChain<T> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn at(&self, version: u64) -> Option<&Arc<T>> {
        let idx = self.entries.partition_point(|(v, _)| *v <= version);
        if idx == 0 {
            return None;
        }
        self.entries[idx - 1].1.as_ref()
    }

    fn last_version(&self) -> u64 {
        self.entries.last().map(|(v, _)| *v).unwrap_or(0)
    }

    fn push(&mut self, version: u64, value: Option<T>) {
        self.entries.push((version, value.map(Arc::new)));
    }

    /// Drop entries that can no longer be read. Returns true when nothing
    /// readable remains and the chain can be discarded.
    fn prune(&mut self, cutoff: u64) -> bool {
        let idx = self.entries.partition_point(|(v, _)| *v <= cutoff);
        if idx > 1 {
            self.entries.drain(..idx - 1);
        }
        matches!(self.entries.as_slice(), [(v, None)] if *v <= cutoff)
    }
}

#[derive(Debug, Clone, Copy)]
enum ObjectRef {
    Node(Uuid),
    Edge(Uuid),
}

#[derive(Debug)]
struct Store {
    latest_version: u64,
    oldest_readable_version: u64,
    nodes: HashMap<Uuid, VersionChain<GraphNode>>,
    edges: HashMap<Uuid, VersionChain<GraphEdge>>,
    commit_log: VecDeque<(u64, Vec<ObjectRef>)>,
    /// Live snapshot count per pinned version
    pins: BTreeMap<u64, usize>,
}

impl Store {
    fn pin(&mut self, version: u64) {
        *self.pins.entry(version).or_insert(0) += 1;
    }

    fn unpin(&mut self, version: u64) {
        if let Some(count) = self.pins.get_mut(&version) {
            *count -= 1;
            if *count == 0 {
                self.pins.remove(&version);
            }
        }
    }

    fn oldest_pinned_version(&self) -> Option<u64> {
        self.pins.keys().next().copied()
    }

    fn check_readable(&self, version: u64) -> UtilityGraphResult<()> {
        if version < self.oldest_readable_version {
            return Err(UtilityGraphError::SnapshotExpired {
                requested: version,
                oldest_readable: self.oldest_readable_version,
            });
        }
        Ok(())
    }

    fn node(&self, id: Uuid, version: u64) -> UtilityGraphResult<Option<Arc<GraphNode>>> {
        self.check_readable(version)?;
        Ok(self.nodes.get(&id).and_then(|c| c.at(version)).cloned())
    }

    fn edge(&self, id: Uuid, version: u64) -> UtilityGraphResult<Option<Arc<GraphEdge>>> {
        self.check_readable(version)?;
        Ok(self.edges.get(&id).and_then(|c| c.at(version)).cloned())
    }

    fn prune(&mut self, cutoff: u64) {
        let cutoff = match self.oldest_pinned_version() {
            Some(pinned) => cutoff.min(pinned),
            None => cutoff,
        };
        if cutoff <= self.oldest_readable_version {
            return;
        }
        self.oldest_readable_version = cutoff;

        while let Some((version, _)) = self.commit_log.front() {
            if *version > cutoff {
                break;
            }
            let Some((_, touched)) = self.commit_log.pop_front() else {
                break;
            };
            for object in touched {
                match object {
                    ObjectRef::Node(id) => {
                        if self.nodes.get_mut(&id).is_some_and(|c| c.prune(cutoff)) {
                            self.nodes.remove(&id);
                        }
                    }
                    ObjectRef::Edge(id) => {
                        if self.edges.get_mut(&id).is_some_and(|c| c.prune(cutoff)) {
                            self.edges.remove(&id);
                        }
                    }
                }
            }
        }
    }
}

/// Transactional, versioned store of graph nodes and edges
#[derive(Debug)]
pub struct ObjectManager {
    store: RwLock<Store>,
    config: ObjectManagerConfig,
}

impl Default for ObjectManager {
    fn default() -> Self {
        Self::new(ObjectManagerConfig::default())
    }
}

impl ObjectManager {
    pub fn new(config: ObjectManagerConfig) -> Self {
        Self {
            store: RwLock::new(Store {
                latest_version: 0,
                oldest_readable_version: 0,
                nodes: HashMap::new(),
                edges: HashMap::new(),
                commit_log: VecDeque::new(),
                pins: BTreeMap::new(),
            }),
            config,
        }
    }

    /// Monotonic version of the most recent commit
    pub fn latest_committed_version(&self) -> u64 {
        self.store.read().latest_version
    }

    /// Versions below this one have been pruned
    pub fn oldest_readable_version(&self) -> u64 {
        self.store.read().oldest_readable_version
    }

    /// Open a transaction based on the latest committed version.
    ///
    /// Nothing becomes visible until [`Transaction::commit`] succeeds.
    /// Dropping the transaction discards its writes.
    pub fn create_transaction(&self) -> Transaction<'_> {
        Transaction {
            base: self.snapshot(),
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
        }
    }

    /// A read view pinned at the latest committed version
    pub fn snapshot(&self) -> GraphSnapshot<'_> {
        let mut store = self.store.write();
        let version = store.latest_version;
        store.pin(version);
        GraphSnapshot {
            manager: self,
            version,
        }
    }

    /// A read view pinned at `version`
    pub fn snapshot_at(&self, version: u64) -> UtilityGraphResult<GraphSnapshot<'_>> {
        let mut store = self.store.write();
        store.check_readable(version)?;
        store.pin(version);
        Ok(GraphSnapshot {
            manager: self,
            version,
        })
    }

    /// Number of live snapshots and transactions
    pub fn pinned_snapshot_count(&self) -> usize {
        self.store.read().pins.values().sum()
    }

    pub fn get_node(&self, id: Uuid, version: u64) -> UtilityGraphResult<Option<Arc<GraphNode>>> {
        self.store.read().node(id, version)
    }

    pub fn get_edge(&self, id: Uuid, version: u64) -> UtilityGraphResult<Option<Arc<GraphEdge>>> {
        self.store.read().edge(id, version)
    }

    pub fn get_latest_node(&self, id: Uuid) -> Option<Arc<GraphNode>> {
        let store = self.store.read();
        store
            .nodes
            .get(&id)
            .and_then(|c| c.at(store.latest_version))
            .cloned()
    }

    pub fn get_latest_edge(&self, id: Uuid) -> Option<Arc<GraphEdge>> {
        let store = self.store.read();
        store
            .edges
            .get(&id)
            .and_then(|c| c.at(store.latest_version))
            .cloned()
    }

    /// Append the write set as a new version. `published` runs before the
    /// store lock is released, so readers never see the version without it.
    fn commit<F>(
        &self,
        base_version: u64,
        nodes: IndexMap<Uuid, Option<GraphNode>>,
        edges: IndexMap<Uuid, Option<GraphEdge>>,
        published: F,
    ) -> UtilityGraphResult<u64>
    where
        F: FnOnce(u64),
    {
        let mut store = self.store.write();

        if nodes.is_empty() && edges.is_empty() {
            let version = store.latest_version;
            published(version);
            return Ok(version);
        }

        let conflict = nodes
            .keys()
            .filter_map(|id| store.nodes.get(id).map(|c| (*id, c.last_version())))
            .chain(
                edges
                    .keys()
                    .filter_map(|id| store.edges.get(id).map(|c| (*id, c.last_version()))),
            )
            .find(|(_, committed)| *committed > base_version);

        if let Some((object_id, committed_version)) = conflict {
            return Err(UtilityGraphError::TransactionConflict {
                object_id,
                base_version,
                committed_version,
            });
        }

        let version = store.latest_version + 1;
        let mut touched = Vec::with_capacity(nodes.len() + edges.len());

        for (id, node) in nodes {
            store
                .nodes
                .entry(id)
                .or_insert_with(VersionChain::new)
                .push(version, node);
            touched.push(ObjectRef::Node(id));
        }
        for (id, edge) in edges {
            store
                .edges
                .entry(id)
                .or_insert_with(VersionChain::new)
                .push(version, edge);
            touched.push(ObjectRef::Edge(id));
        }

        debug!(version, objects = touched.len(), "Committed graph transaction");

        store.commit_log.push_back((version, touched));
        store.latest_version = version;
        published(version);

        if let Some(retained) = self.config.retained_versions {
            store.prune(version.saturating_sub(retained));
        }

        Ok(version)
    }
}

/// Immutable read view of the graph at one committed version. The version
/// stays readable until the snapshot is dropped.
#[derive(Debug)]
pub struct GraphSnapshot<'a> {
    manager: &'a ObjectManager,
    version: u64,
}

impl Clone for GraphSnapshot<'_> {
    fn clone(&self) -> Self {
        self.manager.store.write().pin(self.version);
        Self {
            manager: self.manager,
            version: self.version,
        }
    }
}

impl Drop for GraphSnapshot<'_> {
    fn drop(&mut self) {
        self.manager.store.write().unpin(self.version);
    }
}

impl<'a> GraphSnapshot<'a> {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn node(&self, id: Uuid) -> UtilityGraphResult<Option<Arc<GraphNode>>> {
        self.manager.get_node(id, self.version)
    }

    pub fn edge(&self, id: Uuid) -> UtilityGraphResult<Option<Arc<GraphEdge>>> {
        self.manager.get_edge(id, self.version)
    }
}

/// Write set against one base version of the [`ObjectManager`]
#[derive(Debug)]
pub struct Transaction<'a> {
    base: GraphSnapshot<'a>,
    nodes: IndexMap<Uuid, Option<GraphNode>>,
    edges: IndexMap<Uuid, Option<GraphEdge>>,
}

impl<'a> Transaction<'a> {
    pub fn base_version(&self) -> u64 {
        self.base.version()
    }

    /// True when the transaction has no pending writes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Node as seen by this transaction, pending writes included
    pub fn node(&self, id: Uuid) -> UtilityGraphResult<Option<GraphNode>> {
        if let Some(pending) = self.nodes.get(&id) {
            return Ok(pending.clone());
        }
        Ok(self.base.node(id)?.map(|n| n.as_ref().clone()))
    }

    /// Edge as seen by this transaction, pending writes included
    pub fn edge(&self, id: Uuid) -> UtilityGraphResult<Option<GraphEdge>> {
        if let Some(pending) = self.edges.get(&id) {
            return Ok(pending.clone());
        }
        Ok(self.base.edge(id)?.map(|e| e.as_ref().clone()))
    }

    fn require_node(&self, id: Uuid) -> UtilityGraphResult<GraphNode> {
        self.node(id)?.ok_or(UtilityGraphError::NodeNotFound(id))
    }

    fn require_edge(&self, id: Uuid) -> UtilityGraphResult<GraphEdge> {
        self.edge(id)?.ok_or(UtilityGraphError::EdgeNotFound(id))
    }

    fn ensure_free(&self, id: Uuid) -> UtilityGraphResult<()> {
        if self.node(id)?.is_some() || self.edge(id)?.is_some() {
            return Err(UtilityGraphError::ObjectAlreadyExists(id));
        }
        Ok(())
    }

    pub fn add_node(&mut self, id: Uuid, kind: GraphNodeKind) -> UtilityGraphResult<()> {
        self.ensure_free(id)?;
        self.nodes.insert(
            id,
            Some(GraphNode {
                id,
                kind,
                edges: Vec::new(),
            }),
        );
        Ok(())
    }

    /// Add an edge and register it in the adjacency of both endpoints
    pub fn add_edge(
        &mut self,
        id: Uuid,
        kind: GraphEdgeKind,
        from_node_id: Option<Uuid>,
        to_node_id: Option<Uuid>,
    ) -> UtilityGraphResult<()> {
        self.ensure_free(id)?;

        for node_id in from_node_id.iter().chain(to_node_id.iter()) {
            self.require_node(*node_id)?;
        }

        self.edges.insert(
            id,
            Some(GraphEdge {
                id,
                kind,
                from_node_id,
                to_node_id,
            }),
        );

        if let Some(from) = from_node_id {
            self.attach(from, id)?;
        }
        if let Some(to) = to_node_id {
            if Some(to) != from_node_id {
                self.attach(to, id)?;
            }
        }
        Ok(())
    }

    /// Remove an edge and unregister it from its endpoints
    pub fn remove_edge(&mut self, id: Uuid) -> UtilityGraphResult<GraphEdge> {
        let edge = self.require_edge(id)?;
        for node_id in edge.endpoints() {
            self.detach(node_id, id)?;
        }
        self.edges.insert(id, None);
        Ok(edge)
    }

    /// Remove a node. Fails while any edge still ends in it.
    pub fn remove_node(&mut self, id: Uuid) -> UtilityGraphResult<GraphNode> {
        let node = self.require_node(id)?;
        if !node.edges.is_empty() {
            return Err(UtilityGraphError::NodeStillHasEdges {
                node_id: id,
                edge_count: node.edges.len(),
            });
        }
        self.nodes.insert(id, None);
        Ok(node)
    }

    pub fn update_node_kind(&mut self, id: Uuid, kind: GraphNodeKind) -> UtilityGraphResult<()> {
        let mut node = self.require_node(id)?;
        node.kind = kind;
        self.nodes.insert(id, Some(node));
        Ok(())
    }

    pub fn update_edge_kind(&mut self, id: Uuid, kind: GraphEdgeKind) -> UtilityGraphResult<()> {
        let mut edge = self.require_edge(id)?;
        edge.kind = kind;
        self.edges.insert(id, Some(edge));
        Ok(())
    }

    /// Move both ends of an existing edge, keeping adjacency in sync
    pub fn reconnect_edge(
        &mut self,
        id: Uuid,
        from_node_id: Option<Uuid>,
        to_node_id: Option<Uuid>,
    ) -> UtilityGraphResult<()> {
        for node_id in from_node_id.iter().chain(to_node_id.iter()) {
            self.require_node(*node_id)?;
        }

        let mut edge = self.require_edge(id)?;
        for node_id in edge.endpoints().collect::<Vec<_>>() {
            self.detach(node_id, id)?;
        }

        edge.from_node_id = from_node_id;
        edge.to_node_id = to_node_id;
        self.edges.insert(id, Some(edge));

        if let Some(from) = from_node_id {
            self.attach(from, id)?;
        }
        if let Some(to) = to_node_id {
            if Some(to) != from_node_id {
                self.attach(to, id)?;
            }
        }
        Ok(())
    }

    /// Atomically publish all writes. Returns the new committed version.
    pub fn commit(self) -> UtilityGraphResult<u64> {
        self.commit_with(|_| {})
    }

    /// Commit and run `published` while the new version is being made
    /// visible
    pub fn commit_with<F>(self, published: F) -> UtilityGraphResult<u64>
    where
        F: FnOnce(u64),
    {
        let Transaction { base, nodes, edges } = self;
        base.manager.commit(base.version, nodes, edges, published)
    }

    fn attach(&mut self, node_id: Uuid, edge_id: Uuid) -> UtilityGraphResult<()> {
        let mut node = self.require_node(node_id)?;
        if !node.edges.contains(&edge_id) {
            node.edges.push(edge_id);
        }
        self.nodes.insert(node_id, Some(node));
        Ok(())
    }

    fn detach(&mut self, node_id: Uuid, edge_id: Uuid) -> UtilityGraphResult<()> {
        let mut node = self.require_node(node_id)?;
        node.edges.retain(|e| *e != edge_id);
        self.nodes.insert(node_id, Some(node));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{UtilityGraphConnectedSegment, UtilityGraphConnectedTerminal};

    fn terminal_kind() -> GraphNodeKind {
        GraphNodeKind::Terminal(UtilityGraphConnectedTerminal::simple(
            Uuid::new_v4(),
            Uuid::new_v4(),
        ))
    }

    fn segment_kind(id: Uuid) -> GraphEdgeKind {
        GraphEdgeKind::Segment(UtilityGraphConnectedSegment {
            id,
            span_equipment_id: Uuid::new_v4(),
            structure_index: 0,
            segment_index: 0,
        })
    }

    #[test]
    fn test_commit_advances_version_and_maintains_adjacency() {
        let manager = ObjectManager::default();
        let (a, b, e) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let mut txn = manager.create_transaction();
        txn.add_node(a, terminal_kind()).unwrap();
        txn.add_node(b, terminal_kind()).unwrap();
        txn.add_edge(e, segment_kind(e), Some(a), Some(b)).unwrap();
        let version = txn.commit().unwrap();

        assert_eq!(version, 1);
        assert_eq!(manager.latest_committed_version(), 1);
        assert_eq!(manager.get_latest_node(a).unwrap().edges, vec![e]);
        assert_eq!(manager.get_latest_node(b).unwrap().edges, vec![e]);
        assert_eq!(manager.get_latest_edge(e).unwrap().other_end(a), Some(b));
    }

    #[test]
    fn test_dropped_transaction_discards_writes() {
        let manager = ObjectManager::default();
        let a = Uuid::new_v4();

        {
            let mut txn = manager.create_transaction();
            txn.add_node(a, terminal_kind()).unwrap();
        }

        assert_eq!(manager.latest_committed_version(), 0);
        assert!(manager.get_latest_node(a).is_none());
    }

    #[test]
    fn test_reads_at_old_version_see_old_state() {
        let manager = ObjectManager::default();
        let (a, b, e) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let mut txn = manager.create_transaction();
        txn.add_node(a, terminal_kind()).unwrap();
        txn.add_node(b, terminal_kind()).unwrap();
        let v1 = txn.commit().unwrap();

        let mut txn = manager.create_transaction();
        txn.add_edge(e, segment_kind(e), Some(a), Some(b)).unwrap();
        let v2 = txn.commit().unwrap();

        assert!(manager.get_node(a, v1).unwrap().unwrap().edges.is_empty());
        assert_eq!(manager.get_node(a, v2).unwrap().unwrap().edges, vec![e]);
        assert!(manager.get_edge(e, v1).unwrap().is_none());
    }

    #[test]
    fn test_remove_node_with_edges_fails() {
        let manager = ObjectManager::default();
        let (a, e) = (Uuid::new_v4(), Uuid::new_v4());

        let mut txn = manager.create_transaction();
        txn.add_node(a, terminal_kind()).unwrap();
        txn.add_edge(e, segment_kind(e), Some(a), None).unwrap();

        assert!(matches!(
            txn.remove_node(a),
            Err(UtilityGraphError::NodeStillHasEdges { edge_count: 1, .. })
        ));

        txn.remove_edge(e).unwrap();
        txn.remove_node(a).unwrap();
        txn.commit().unwrap();
        assert!(manager.get_latest_node(a).is_none());
    }

    #[test]
    fn test_concurrent_write_conflict_is_detected() {
        let manager = ObjectManager::default();
        let a = Uuid::new_v4();

        let mut setup = manager.create_transaction();
        setup.add_node(a, terminal_kind()).unwrap();
        setup.commit().unwrap();

        let mut first = manager.create_transaction();
        let mut second = manager.create_transaction();
        first.update_node_kind(a, terminal_kind()).unwrap();
        second.update_node_kind(a, terminal_kind()).unwrap();

        first.commit().unwrap();
        let result = second.commit();
        assert!(matches!(
            result,
            Err(UtilityGraphError::TransactionConflict { object_id, base_version: 1, committed_version: 2 }) if object_id == a
        ));
    }

    #[test]
    fn test_retention_prunes_old_versions() {
        let manager = ObjectManager::new(ObjectManagerConfig {
            retained_versions: Some(2),
        });
        let a = Uuid::new_v4();

        let mut txn = manager.create_transaction();
        txn.add_node(a, terminal_kind()).unwrap();
        txn.commit().unwrap();

        for _ in 0..4 {
            let mut txn = manager.create_transaction();
            txn.update_node_kind(a, terminal_kind()).unwrap();
            txn.commit().unwrap();
        }

        assert_eq!(manager.latest_committed_version(), 5);
        assert_eq!(manager.oldest_readable_version(), 3);
        assert!(matches!(
            manager.get_node(a, 1),
            Err(UtilityGraphError::SnapshotExpired { requested: 1, oldest_readable: 3 })
        ));
        assert!(manager.get_node(a, 3).unwrap().is_some());
    }

    #[test]
    fn test_removed_objects_are_eventually_forgotten() {
        let manager = ObjectManager::new(ObjectManagerConfig {
            retained_versions: Some(1),
        });
        let a = Uuid::new_v4();

        let mut txn = manager.create_transaction();
        txn.add_node(a, terminal_kind()).unwrap();
        txn.commit().unwrap();

        let mut txn = manager.create_transaction();
        txn.remove_node(a).unwrap();
        txn.commit().unwrap();

        let mut txn = manager.create_transaction();
        txn.add_node(Uuid::new_v4(), terminal_kind()).unwrap();
        txn.commit().unwrap();

        assert!(manager.store.read().nodes.get(&a).is_none());
    }

    #[test]
    fn test_pinned_snapshot_outlives_retention() {
        let manager = ObjectManager::new(ObjectManagerConfig {
            retained_versions: Some(2),
        });
        let a = Uuid::new_v4();

        let mut txn = manager.create_transaction();
        txn.add_node(a, terminal_kind()).unwrap();
        let pinned_version = txn.commit().unwrap();

        let snapshot = manager.snapshot();
        for _ in 0..10 {
            let mut txn = manager.create_transaction();
            txn.update_node_kind(a, terminal_kind()).unwrap();
            txn.commit().unwrap();
        }

        assert_eq!(snapshot.version(), pinned_version);
        assert!(snapshot.node(a).unwrap().is_some());
        assert!(manager.oldest_readable_version() <= pinned_version);
        assert_eq!(manager.pinned_snapshot_count(), 1);

        drop(snapshot);
        assert_eq!(manager.pinned_snapshot_count(), 0);

        let mut txn = manager.create_transaction();
        txn.update_node_kind(a, terminal_kind()).unwrap();
        let latest = txn.commit().unwrap();
        assert_eq!(manager.oldest_readable_version(), latest - 2);
        assert!(manager.snapshot_at(pinned_version).is_err());
    }

    #[test]
    fn test_conflict_with_pruned_removal_is_detected() {
        let manager = ObjectManager::new(ObjectManagerConfig {
            retained_versions: Some(1),
        });
        let a = Uuid::new_v4();

        let mut setup = manager.create_transaction();
        setup.add_node(a, terminal_kind()).unwrap();
        let base = setup.commit().unwrap();

        let mut stale = manager.create_transaction();
        stale.update_node_kind(a, terminal_kind()).unwrap();

        let mut removal = manager.create_transaction();
        removal.remove_node(a).unwrap();
        let removed_at = removal.commit().unwrap();

        for _ in 0..3 {
            let mut txn = manager.create_transaction();
            txn.add_node(Uuid::new_v4(), terminal_kind()).unwrap();
            txn.commit().unwrap();
        }

        assert!(matches!(
            stale.commit(),
            Err(UtilityGraphError::TransactionConflict { object_id, base_version, committed_version })
                if object_id == a && base_version == base && committed_version == removed_at
        ));
    }

    #[test]
    fn test_commit_hook_runs_before_version_is_readable() {
        let manager = ObjectManager::default();
        let mut txn = manager.create_transaction();
        txn.add_node(Uuid::new_v4(), terminal_kind()).unwrap();

        let mut seen = None;
        let version = txn.commit_with(|v| seen = Some(v)).unwrap();

        assert_eq!(seen, Some(version));
        assert_eq!(manager.pinned_snapshot_count(), 0);
    }

    #[test]
    fn test_reconnect_edge_moves_adjacency() {
        let manager = ObjectManager::default();
        let (a, b, c, e) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

        let mut txn = manager.create_transaction();
        txn.add_node(a, terminal_kind()).unwrap();
        txn.add_node(b, terminal_kind()).unwrap();
        txn.add_node(c, terminal_kind()).unwrap();
        txn.add_edge(e, segment_kind(e), Some(a), Some(b)).unwrap();
        txn.reconnect_edge(e, Some(a), Some(c)).unwrap();
        txn.commit().unwrap();

        assert!(manager.get_latest_node(b).unwrap().edges.is_empty());
        assert_eq!(manager.get_latest_node(c).unwrap().edges, vec![e]);
    }
}
