//! The utility graph: element index plus versioned graph membership

use super::edit::UtilityGraphEdit;
use super::object_manager::{GraphSnapshot, ObjectManager, ObjectManagerConfig, Transaction};
use super::trace::{self, TraceMode, TraceResult};
use super::{
    GraphElementVariant, UtilityGraphDisconnectedSegment, UtilityGraphDisconnectedTerminal,
    UtilityGraphElement, UtilityGraphError, UtilityGraphResult,
};
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

/// In-memory connectivity graph of the utility network.
///
/// Owns the id → element index and the [`ObjectManager`] holding the
/// connected part of the graph. Equipment projections keep it in sync; it is
/// never mutated directly by command callers.
#[derive(Debug, Default)]
pub struct UtilityGraph {
    objects: ObjectManager,
    index: DashMap<Uuid, UtilityGraphElement>,
}

impl UtilityGraph {
    /// Create an empty graph
    pub fn new(config: ObjectManagerConfig) -> Self {
        Self {
            objects: ObjectManager::new(config),
            index: DashMap::new(),
        }
    }

    /// The underlying versioned object store
    pub fn objects(&self) -> &ObjectManager {
        &self.objects
    }

    pub fn latest_committed_version(&self) -> u64 {
        self.objects.latest_committed_version()
    }

    /// Open a raw graph transaction. Index changes are not covered, use
    /// [`UtilityGraph::begin_edit`] to change both together.
    pub fn create_transaction(&self) -> Transaction<'_> {
        self.objects.create_transaction()
    }

    /// Start an edit covering both graph membership and the element index
    pub fn begin_edit(&self) -> UtilityGraphEdit<'_> {
        UtilityGraphEdit::new(self)
    }

    /// Read view pinned at the latest committed version
    pub fn snapshot(&self) -> GraphSnapshot<'_> {
        self.objects.snapshot()
    }

    pub fn get_graph_element(&self, id: Uuid) -> Option<UtilityGraphElement> {
        self.index.get(&id).map(|e| *e.value())
    }

    /// Typed lookup. `None` when the id is unknown or holds another variant.
    pub fn try_get_graph_element<T: GraphElementVariant>(&self, id: Uuid) -> Option<T> {
        self.index.get(&id).and_then(|e| T::from_element(e.value()))
    }

    /// Typed lookup that treats absence or a different variant as corruption
    pub fn get_required<T: GraphElementVariant>(&self, id: Uuid) -> UtilityGraphResult<T> {
        let element = self
            .get_graph_element(id)
            .ok_or(UtilityGraphError::ElementNotFound(id))?;
        T::from_element(&element).ok_or_else(|| UtilityGraphError::UnexpectedElementKind {
            id,
            expected: T::KIND.to_string(),
            actual: element.kind_name().to_string(),
        })
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.index.contains_key(&id)
    }

    pub fn element_count(&self) -> usize {
        self.index.len()
    }

    /// Register a placeholder for a segment that is not wired yet
    pub fn add_disconnected_segment(
        &self,
        segment: UtilityGraphDisconnectedSegment,
    ) -> UtilityGraphResult<()> {
        self.add_graph_element(segment.into())
    }

    /// Register a placeholder for a terminal that is not wired yet
    pub fn add_disconnected_terminal(
        &self,
        terminal: UtilityGraphDisconnectedTerminal,
    ) -> UtilityGraphResult<()> {
        self.add_graph_element(terminal.into())
    }

    /// Insert a new index entry. An existing id is a fatal error.
    pub fn add_graph_element(&self, element: UtilityGraphElement) -> UtilityGraphResult<()> {
        use dashmap::mapref::entry::Entry;

        match self.index.entry(element.id()) {
            Entry::Occupied(_) => Err(UtilityGraphError::ElementAlreadyExists(element.id())),
            Entry::Vacant(slot) => {
                slot.insert(element);
                Ok(())
            }
        }
    }

    /// Replace an existing index entry in one step
    pub fn update_index(&self, id: Uuid, element: UtilityGraphElement) -> UtilityGraphResult<()> {
        if element.id() != id {
            return Err(UtilityGraphError::InconsistentIndex(format!(
                "cannot store element {} under id {}",
                element.id(),
                id
            )));
        }
        match self.index.get_mut(&id) {
            Some(mut entry) => {
                *entry = element;
                Ok(())
            }
            None => Err(UtilityGraphError::ElementNotFound(id)),
        }
    }

    /// Drop an index entry, returning what was stored
    pub fn remove_graph_element(&self, id: Uuid) -> Option<UtilityGraphElement> {
        self.index.remove(&id).map(|(_, e)| e)
    }

    /// Apply a batch of index changes produced by a committed edit
    pub(crate) fn apply_index_changes(
        &self,
        changes: impl IntoIterator<Item = (Uuid, Option<UtilityGraphElement>)>,
    ) {
        for (id, change) in changes {
            match change {
                Some(element) => {
                    self.index.insert(id, element);
                }
                None => {
                    self.index.remove(&id);
                }
            }
        }
    }

    /// Number of segment and terminal-to-terminal edges ending in a terminal
    pub fn non_internal_neighbor_count(&self, terminal_id: Uuid) -> usize {
        let snapshot = self.snapshot();
        let Ok(Some(node)) = snapshot.node(terminal_id) else {
            return 0;
        };
        node.edges
            .iter()
            .filter_map(|e| snapshot.edge(*e).ok().flatten())
            .filter(|e| !e.kind.is_internal_link())
            .count()
    }

    /// True when a segment or cross-connect ends in the terminal
    pub fn terminal_has_connections(&self, terminal_id: Uuid) -> bool {
        self.non_internal_neighbor_count(terminal_id) > 0
    }

    /// Ordinary physical path trace that stops at splitters
    pub fn simple_trace(&self, id: Uuid) -> UtilityGraphResult<TraceResult> {
        debug!(element_id = %id, "Running simple trace");
        trace::trace(self, id, TraceMode::Simple)
    }

    /// Trace through splitters, used for outage impact analysis
    pub fn outage_view_trace(&self, id: Uuid) -> UtilityGraphResult<TraceResult> {
        debug!(element_id = %id, "Running outage view trace");
        trace::trace(self, id, TraceMode::OutageView)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{SegmentEnd, TerminalEnd, UtilityGraphConnectedSegment};
    use crate::value_objects::TerminalDirection;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn segment() -> UtilityGraphDisconnectedSegment {
        UtilityGraphDisconnectedSegment {
            id: Uuid::new_v4(),
            span_equipment_id: Uuid::new_v4(),
            structure_index: 0,
            segment_index: 0,
        }
    }

    #[test]
    fn test_add_disconnected_segment_twice_fails() {
        let graph = UtilityGraph::default();
        let s = segment();

        graph.add_disconnected_segment(s).unwrap();
        assert_eq!(
            graph.add_disconnected_segment(s),
            Err(UtilityGraphError::ElementAlreadyExists(s.id))
        );
        assert_eq!(graph.element_count(), 1);
    }

    #[test]
    fn test_typed_lookup() {
        let graph = UtilityGraph::default();
        let s = segment();
        graph.add_disconnected_segment(s).unwrap();

        assert_eq!(
            graph.try_get_graph_element::<UtilityGraphDisconnectedSegment>(s.id),
            Some(s)
        );
        assert!(graph
            .try_get_graph_element::<UtilityGraphConnectedSegment>(s.id)
            .is_none());
        assert!(matches!(
            graph.get_required::<UtilityGraphConnectedSegment>(s.id),
            Err(UtilityGraphError::UnexpectedElementKind { .. })
        ));
        assert!(graph
            .try_get_graph_element::<UtilityGraphDisconnectedSegment>(Uuid::new_v4())
            .is_none());
    }

    #[test]
    fn test_update_index_requires_existing_entry() {
        let graph = UtilityGraph::default();
        let s = segment();

        assert_eq!(
            graph.update_index(s.id, s.into()),
            Err(UtilityGraphError::ElementNotFound(s.id))
        );

        graph.add_disconnected_segment(s).unwrap();
        let moved = UtilityGraphDisconnectedSegment {
            segment_index: 3,
            ..s
        };
        graph.update_index(s.id, moved.into()).unwrap();
        assert_eq!(
            graph
                .try_get_graph_element::<UtilityGraphDisconnectedSegment>(s.id)
                .map(|e| e.segment_index),
            Some(3)
        );
    }

    #[test]
    fn test_remove_graph_element() {
        let graph = UtilityGraph::default();
        let t = UtilityGraphDisconnectedTerminal {
            id: Uuid::new_v4(),
            route_node_id: Uuid::new_v4(),
            terminal_equipment_id: Uuid::new_v4(),
            structure_index: 0,
            terminal_index: 0,
            direction: TerminalDirection::In,
        };
        graph.add_disconnected_terminal(t).unwrap();

        assert!(graph.remove_graph_element(t.id).is_some());
        assert!(!graph.contains(t.id));
        assert!(graph.remove_graph_element(t.id).is_none());
    }

    #[test]
    fn test_traces_stay_consistent_during_rewiring() {
        let graph = UtilityGraph::new(ObjectManagerConfig {
            retained_versions: Some(1),
        });
        let (a, b) = (segment(), segment());
        let t = TerminalEnd {
            terminal_id: Uuid::new_v4(),
            route_node_id: Uuid::new_v4(),
        };
        let mut edit = graph.begin_edit();
        edit.register_segment(a, None, Some(t)).unwrap();
        edit.register_segment(b, Some(t), None).unwrap();
        edit.commit().unwrap();

        let done = AtomicBool::new(false);
        let failures = std::thread::scope(|scope| {
            let reader = scope.spawn(|| {
                let mut failures = Vec::new();
                while !done.load(Ordering::Acquire) {
                    for seed in [a.id, b.id, t.terminal_id] {
                        if let Err(e) = graph.simple_trace(seed) {
                            failures.push(e);
                        }
                    }
                }
                failures
            });

            for _ in 0..500 {
                let mut edit = graph.begin_edit();
                edit.disconnect_segment_end(a.id, SegmentEnd::To).unwrap();
                edit.disconnect_segment_end(b.id, SegmentEnd::From).unwrap();
                edit.release_terminal_if_unused(t.terminal_id).unwrap();
                edit.commit().unwrap();

                let mut edit = graph.begin_edit();
                edit.connect_segment_end(a.id, SegmentEnd::To, t).unwrap();
                edit.connect_segment_end(b.id, SegmentEnd::From, t).unwrap();
                edit.commit().unwrap();
            }
            done.store(true, Ordering::Release);
            reader.join().unwrap()
        });

        assert!(failures.is_empty(), "{failures:?}");
        assert_eq!(graph.objects().pinned_snapshot_count(), 0);
        let trace = graph.simple_trace(a.id).unwrap();
        assert_eq!(trace.downstream.iter().map(|e| e.id()).collect::<Vec<_>>(), vec![t.terminal_id, b.id, Uuid::nil()]);
    }

    #[test]
    fn test_trace_of_disconnected_segment_is_empty() {
        let graph = UtilityGraph::default();
        let s = segment();
        graph.add_disconnected_segment(s).unwrap();

        let result = graph.simple_trace(s.id).unwrap();
        assert!(result.source.is_none());
        assert!(result.downstream.is_empty());
        assert!(result.upstream.is_empty());
    }
}
