//! Combined edits of graph membership and the element index
//!
//! A [`UtilityGraphEdit`] wraps one object manager transaction together with
//! the index changes that belong to it. Nothing is visible until
//! [`UtilityGraphEdit::commit`]; dropping the edit discards everything.

use super::object_manager::Transaction;
use super::{
    GraphEdgeKind, GraphNodeKind, UtilityGraph, UtilityGraphConnectedSegment,
    UtilityGraphConnectedTerminal, UtilityGraphDisconnectedSegment,
    UtilityGraphDisconnectedTerminal, UtilityGraphElement, UtilityGraphError,
    UtilityGraphInternalEquipmentConnectivityLink, UtilityGraphInternalEquipmentConnectivityNode,
    UtilityGraphResult, UtilityGraphTerminalToTerminalConnectivityLink,
};
use crate::value_objects::TerminalDirection;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Which end of a span segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentEnd {
    From,
    To,
}

impl fmt::Display for SegmentEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentEnd::From => write!(f, "from"),
            SegmentEnd::To => write!(f, "to"),
        }
    }
}

/// A terminal a segment end should be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalEnd {
    pub terminal_id: Uuid,
    /// Route node used when a simple terminal has to be created
    pub route_node_id: Uuid,
}

/// Member terminal of a terminal structure being registered
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StructureTerminal {
    pub terminal: UtilityGraphDisconnectedTerminal,
    pub internal_connectivity_node_id: Option<Uuid>,
}

/// Pending edit of the utility graph
pub struct UtilityGraphEdit<'a> {
    graph: &'a UtilityGraph,
    txn: Transaction<'a>,
    index: IndexMap<Uuid, Option<UtilityGraphElement>>,
}

impl<'a> UtilityGraphEdit<'a> {
    pub(crate) fn new(graph: &'a UtilityGraph) -> Self {
        Self {
            graph,
            txn: graph.create_transaction(),
            index: IndexMap::new(),
        }
    }

    /// Element as seen by this edit, pending index changes included
    pub fn element(&self, id: Uuid) -> Option<UtilityGraphElement> {
        match self.index.get(&id) {
            Some(pending) => *pending,
            None => self.graph.get_graph_element(id),
        }
    }

    fn require_element(&self, id: Uuid) -> UtilityGraphResult<UtilityGraphElement> {
        self.element(id)
            .ok_or(UtilityGraphError::ElementNotFound(id))
    }

    fn insert_element(&mut self, element: UtilityGraphElement) -> UtilityGraphResult<()> {
        if self.element(element.id()).is_some() {
            return Err(UtilityGraphError::ElementAlreadyExists(element.id()));
        }
        self.index.insert(element.id(), Some(element));
        Ok(())
    }

    fn replace_element(&mut self, element: UtilityGraphElement) -> UtilityGraphResult<()> {
        self.require_element(element.id())?;
        self.index.insert(element.id(), Some(element));
        Ok(())
    }

    fn drop_element(&mut self, id: Uuid) {
        self.index.insert(id, None);
    }

    pub fn register_disconnected_segment(
        &mut self,
        segment: UtilityGraphDisconnectedSegment,
    ) -> UtilityGraphResult<()> {
        self.insert_element(segment.into())
    }

    pub fn register_disconnected_terminal(
        &mut self,
        terminal: UtilityGraphDisconnectedTerminal,
    ) -> UtilityGraphResult<()> {
        self.insert_element(terminal.into())
    }

    /// Register a new segment, wired to the given terminals if any
    pub fn register_segment(
        &mut self,
        segment: UtilityGraphDisconnectedSegment,
        from: Option<TerminalEnd>,
        to: Option<TerminalEnd>,
    ) -> UtilityGraphResult<()> {
        self.register_disconnected_segment(segment)?;
        if let Some(end) = from {
            self.connect_segment_end(segment.id, SegmentEnd::From, end)?;
        }
        if let Some(end) = to {
            self.connect_segment_end(segment.id, SegmentEnd::To, end)?;
        }
        Ok(())
    }

    /// Change the owner and position of a segment, keeping its wiring
    pub fn reindex_segment(
        &mut self,
        segment_id: Uuid,
        span_equipment_id: Uuid,
        structure_index: u16,
        segment_index: u16,
    ) -> UtilityGraphResult<()> {
        match self.require_element(segment_id)? {
            UtilityGraphElement::DisconnectedSegment(s) => {
                let moved = UtilityGraphDisconnectedSegment {
                    span_equipment_id,
                    structure_index,
                    segment_index,
                    ..s
                };
                if moved != s {
                    self.replace_element(moved.into())?;
                }
                Ok(())
            }
            UtilityGraphElement::ConnectedSegment(s) => {
                let moved = UtilityGraphConnectedSegment {
                    span_equipment_id,
                    structure_index,
                    segment_index,
                    ..s
                };
                if moved != s {
                    self.txn
                        .update_edge_kind(segment_id, GraphEdgeKind::Segment(moved))?;
                    self.replace_element(moved.into())?;
                }
                Ok(())
            }
            other => Err(unexpected(segment_id, "segment", &other)),
        }
    }

    /// Terminal currently attached to one end of a segment
    pub fn segment_end_terminal(
        &self,
        segment_id: Uuid,
        end: SegmentEnd,
    ) -> UtilityGraphResult<Option<Uuid>> {
        match self.require_element(segment_id)? {
            UtilityGraphElement::DisconnectedSegment(_) => Ok(None),
            UtilityGraphElement::ConnectedSegment(_) => {
                let edge = self
                    .txn
                    .edge(segment_id)?
                    .ok_or(UtilityGraphError::EdgeNotFound(segment_id))?;
                Ok(match end {
                    SegmentEnd::From => edge.from_node_id,
                    SegmentEnd::To => edge.to_node_id,
                })
            }
            other => Err(unexpected(segment_id, "segment", &other)),
        }
    }

    /// Make sure a terminal is a graph node.
    ///
    /// A disconnected equipment terminal is promoted, an unknown id becomes a
    /// simple terminal at `route_node_id`.
    pub fn ensure_terminal_node(
        &mut self,
        terminal_id: Uuid,
        route_node_id: Uuid,
    ) -> UtilityGraphResult<UtilityGraphConnectedTerminal> {
        match self.element(terminal_id) {
            Some(UtilityGraphElement::ConnectedTerminal(t)) => Ok(t),
            Some(UtilityGraphElement::DisconnectedTerminal(t)) => {
                let connected = t.connect();
                self.txn
                    .add_node(terminal_id, GraphNodeKind::Terminal(connected))?;
                self.replace_element(connected.into())?;
                Ok(connected)
            }
            Some(other) => Err(unexpected(terminal_id, "terminal", &other)),
            None => self.ensure_simple_terminal(terminal_id, route_node_id),
        }
    }

    /// Create a bare terminal with no owning equipment
    pub fn ensure_simple_terminal(
        &mut self,
        terminal_id: Uuid,
        route_node_id: Uuid,
    ) -> UtilityGraphResult<UtilityGraphConnectedTerminal> {
        if let Some(UtilityGraphElement::ConnectedTerminal(t)) = self.element(terminal_id) {
            return Ok(t);
        }
        let terminal = UtilityGraphConnectedTerminal::simple(terminal_id, route_node_id);
        self.txn
            .add_node(terminal_id, GraphNodeKind::Terminal(terminal))?;
        self.insert_element(terminal.into())?;
        Ok(terminal)
    }

    /// Attach one end of a segment to a terminal, promoting the segment to a
    /// graph edge when needed. The end must currently be free.
    pub fn connect_segment_end(
        &mut self,
        segment_id: Uuid,
        end: SegmentEnd,
        terminal: TerminalEnd,
    ) -> UtilityGraphResult<()> {
        let element = self.require_element(segment_id)?;
        self.ensure_terminal_node(terminal.terminal_id, terminal.route_node_id)?;

        match element {
            UtilityGraphElement::DisconnectedSegment(s) => {
                let connected = s.connect();
                let (from, to) = match end {
                    SegmentEnd::From => (Some(terminal.terminal_id), None),
                    SegmentEnd::To => (None, Some(terminal.terminal_id)),
                };
                self.txn
                    .add_edge(segment_id, GraphEdgeKind::Segment(connected), from, to)?;
                self.replace_element(connected.into())?;
            }
            UtilityGraphElement::ConnectedSegment(_) => {
                let edge = self
                    .txn
                    .edge(segment_id)?
                    .ok_or(UtilityGraphError::EdgeNotFound(segment_id))?;
                let (from, to) = match end {
                    SegmentEnd::From if edge.from_node_id.is_none() => {
                        (Some(terminal.terminal_id), edge.to_node_id)
                    }
                    SegmentEnd::To if edge.to_node_id.is_none() => {
                        (edge.from_node_id, Some(terminal.terminal_id))
                    }
                    _ => {
                        return Err(UtilityGraphError::InconsistentIndex(format!(
                            "{end} end of segment {segment_id} is already connected"
                        )))
                    }
                };
                self.txn.reconnect_edge(segment_id, from, to)?;
            }
            other => return Err(unexpected(segment_id, "segment", &other)),
        }

        debug!(
            segment_id = %segment_id,
            terminal_id = %terminal.terminal_id,
            end = %end,
            "Connected segment end"
        );
        Ok(())
    }

    /// Detach one end of a segment. A segment with both ends free is demoted
    /// to a disconnected placeholder. Returns the terminal that was attached;
    /// the caller decides whether to release it.
    pub fn disconnect_segment_end(
        &mut self,
        segment_id: Uuid,
        end: SegmentEnd,
    ) -> UtilityGraphResult<Option<Uuid>> {
        let segment = match self.require_element(segment_id)? {
            UtilityGraphElement::ConnectedSegment(s) => s,
            UtilityGraphElement::DisconnectedSegment(_) => return Ok(None),
            other => return Err(unexpected(segment_id, "segment", &other)),
        };

        let edge = self
            .txn
            .edge(segment_id)?
            .ok_or(UtilityGraphError::EdgeNotFound(segment_id))?;

        let (released, from, to) = match end {
            SegmentEnd::From => (edge.from_node_id, None, edge.to_node_id),
            SegmentEnd::To => (edge.to_node_id, edge.from_node_id, None),
        };

        if released.is_none() {
            return Ok(None);
        }

        if from.is_none() && to.is_none() {
            self.txn.remove_edge(segment_id)?;
            self.replace_element(segment.disconnect().into())?;
        } else {
            self.txn.reconnect_edge(segment_id, from, to)?;
        }

        debug!(segment_id = %segment_id, end = %end, "Disconnected segment end");
        Ok(released)
    }

    /// Bring both ends of a segment in line with the wanted terminals.
    /// Returns the terminals that lost this segment.
    pub fn set_segment_ends(
        &mut self,
        segment_id: Uuid,
        from: Option<TerminalEnd>,
        to: Option<TerminalEnd>,
    ) -> UtilityGraphResult<Vec<Uuid>> {
        let mut released = Vec::new();

        for (end, wanted) in [(SegmentEnd::From, from), (SegmentEnd::To, to)] {
            let current = self.segment_end_terminal(segment_id, end)?;
            if current == wanted.map(|w| w.terminal_id) {
                continue;
            }
            if current.is_some() {
                released.extend(self.disconnect_segment_end(segment_id, end)?);
            }
        }

        for (end, wanted) in [(SegmentEnd::From, from), (SegmentEnd::To, to)] {
            let Some(wanted) = wanted else { continue };
            if self.segment_end_terminal(segment_id, end)? != Some(wanted.terminal_id) {
                self.connect_segment_end(segment_id, end, wanted)?;
            }
        }

        Ok(released)
    }

    /// Remove a segment entirely. Returns the terminals it was attached to.
    pub fn remove_segment(&mut self, segment_id: Uuid) -> UtilityGraphResult<Vec<Uuid>> {
        let released = match self.require_element(segment_id)? {
            UtilityGraphElement::DisconnectedSegment(_) => Vec::new(),
            UtilityGraphElement::ConnectedSegment(_) => {
                self.txn.remove_edge(segment_id)?.endpoints().collect()
            }
            other => return Err(unexpected(segment_id, "segment", &other)),
        };
        self.drop_element(segment_id);
        Ok(released)
    }

    /// Drop a terminal from the graph once nothing physical ends in it.
    ///
    /// Simple terminals disappear, equipment terminals fall back to a
    /// disconnected placeholder. Terminals still wired to an internal
    /// connectivity node stay in the graph.
    pub fn release_terminal_if_unused(&mut self, terminal_id: Uuid) -> UtilityGraphResult<()> {
        let Some(UtilityGraphElement::ConnectedTerminal(terminal)) = self.element(terminal_id)
        else {
            return Ok(());
        };
        let node = self
            .txn
            .node(terminal_id)?
            .ok_or(UtilityGraphError::NodeNotFound(terminal_id))?;
        if !node.edges.is_empty() {
            return Ok(());
        }

        self.txn.remove_node(terminal_id)?;
        if terminal.is_simple_terminal() {
            self.drop_element(terminal_id);
        } else {
            self.replace_element(terminal.disconnect().into())?;
        }
        debug!(terminal_id = %terminal_id, "Released unused terminal");
        Ok(())
    }

    /// Register the terminals of one terminal structure. Terminals sharing an
    /// internal connectivity node are wired to it through internal links,
    /// the rest become disconnected placeholders.
    pub fn register_terminal_structure(
        &mut self,
        terminal_equipment_id: Uuid,
        route_node_id: Uuid,
        structure_index: u16,
        terminals: &[StructureTerminal],
    ) -> UtilityGraphResult<()> {
        for member in terminals {
            let terminal = member.terminal;
            self.register_disconnected_terminal(terminal)?;

            let Some(hub_id) = member.internal_connectivity_node_id else {
                continue;
            };

            if self.element(hub_id).is_none() {
                let hub = UtilityGraphInternalEquipmentConnectivityNode {
                    id: hub_id,
                    terminal_equipment_id,
                    route_node_id,
                    structure_index,
                };
                self.txn
                    .add_node(hub_id, GraphNodeKind::InternalConnectivity(hub))?;
                self.insert_element(hub.into())?;
            }

            self.ensure_terminal_node(terminal.id, route_node_id)?;

            let link = UtilityGraphInternalEquipmentConnectivityLink {
                id: Uuid::new_v4(),
                terminal_equipment_id,
                route_node_id,
                structure_index,
            };
            let (from, to) = match terminal.direction {
                TerminalDirection::Out => (hub_id, terminal.id),
                _ => (terminal.id, hub_id),
            };
            self.txn.add_edge(
                link.id,
                GraphEdgeKind::InternalLink(link),
                Some(from),
                Some(to),
            )?;
            self.insert_element(link.into())?;
        }
        Ok(())
    }

    /// Remove a terminal together with its internal links. Connectivity
    /// nodes left without links are removed too. Fails if a segment or
    /// cross-connect still ends in the terminal.
    pub fn remove_terminal(&mut self, terminal_id: Uuid) -> UtilityGraphResult<()> {
        match self.element(terminal_id) {
            None => Ok(()),
            Some(UtilityGraphElement::DisconnectedTerminal(_)) => {
                self.drop_element(terminal_id);
                Ok(())
            }
            Some(UtilityGraphElement::ConnectedTerminal(_)) => {
                let node = self
                    .txn
                    .node(terminal_id)?
                    .ok_or(UtilityGraphError::NodeNotFound(terminal_id))?;

                for edge_id in node.edges {
                    let Some(edge) = self.txn.edge(edge_id)? else {
                        continue;
                    };
                    if !edge.kind.is_internal_link() {
                        continue;
                    }
                    self.txn.remove_edge(edge_id)?;
                    self.drop_element(edge_id);

                    if let Some(hub_id) = edge.other_end(terminal_id) {
                        self.remove_hub_if_unused(hub_id)?;
                    }
                }

                self.txn.remove_node(terminal_id)?;
                self.drop_element(terminal_id);
                Ok(())
            }
            Some(other) => Err(unexpected(terminal_id, "terminal", &other)),
        }
    }

    fn remove_hub_if_unused(&mut self, hub_id: Uuid) -> UtilityGraphResult<()> {
        let Some(hub) = self.txn.node(hub_id)? else {
            return Ok(());
        };
        if hub.edges.is_empty() && matches!(hub.kind, GraphNodeKind::InternalConnectivity(_)) {
            self.txn.remove_node(hub_id)?;
            self.drop_element(hub_id);
        }
        Ok(())
    }

    /// Cross-connect two terminals
    pub fn add_terminal_to_terminal_link(
        &mut self,
        link: UtilityGraphTerminalToTerminalConnectivityLink,
        from_terminal_id: Uuid,
        to_terminal_id: Uuid,
    ) -> UtilityGraphResult<()> {
        self.ensure_terminal_node(from_terminal_id, link.route_node_id)?;
        self.ensure_terminal_node(to_terminal_id, link.route_node_id)?;
        self.txn.add_edge(
            link.id,
            GraphEdgeKind::TerminalToTerminal(link),
            Some(from_terminal_id),
            Some(to_terminal_id),
        )?;
        self.insert_element(link.into())
    }

    /// Remove a cross-connect. Returns the terminals it joined.
    pub fn remove_terminal_to_terminal_link(
        &mut self,
        link_id: Uuid,
    ) -> UtilityGraphResult<Vec<Uuid>> {
        match self.require_element(link_id)? {
            UtilityGraphElement::TerminalToTerminalConnectivityLink(_) => {
                let edge = self.txn.remove_edge(link_id)?;
                self.drop_element(link_id);
                Ok(edge.endpoints().collect())
            }
            other => Err(unexpected(link_id, "TerminalToTerminalConnectivityLink", &other)),
        }
    }

    /// Commit graph membership and publish the index changes before the
    /// new version becomes readable
    pub fn commit(self) -> UtilityGraphResult<u64> {
        let UtilityGraphEdit { graph, txn, index } = self;
        txn.commit_with(|_| graph.apply_index_changes(index))
    }
}

fn unexpected(id: Uuid, expected: &str, actual: &UtilityGraphElement) -> UtilityGraphError {
    UtilityGraphError::UnexpectedElementKind {
        id,
        expected: expected.to_string(),
        actual: actual.kind_name().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment() -> UtilityGraphDisconnectedSegment {
        UtilityGraphDisconnectedSegment {
            id: Uuid::new_v4(),
            span_equipment_id: Uuid::new_v4(),
            structure_index: 0,
            segment_index: 0,
        }
    }

    fn end(route_node_id: Uuid) -> TerminalEnd {
        TerminalEnd {
            terminal_id: Uuid::new_v4(),
            route_node_id,
        }
    }

    #[test]
    fn test_uncommitted_edit_is_invisible() {
        let graph = UtilityGraph::default();
        let s = segment();
        {
            let mut edit = graph.begin_edit();
            edit.register_disconnected_segment(s).unwrap();
        }
        assert!(!graph.contains(s.id));
        assert_eq!(graph.latest_committed_version(), 0);
    }

    #[test]
    fn test_connect_promotes_segment_and_creates_simple_terminal() {
        let graph = UtilityGraph::default();
        let s = segment();
        let node = Uuid::new_v4();
        let t = end(node);

        let mut edit = graph.begin_edit();
        edit.register_disconnected_segment(s).unwrap();
        edit.connect_segment_end(s.id, SegmentEnd::To, t).unwrap();
        edit.commit().unwrap();

        assert!(graph
            .try_get_graph_element::<UtilityGraphConnectedSegment>(s.id)
            .is_some());
        let terminal = graph
            .try_get_graph_element::<UtilityGraphConnectedTerminal>(t.terminal_id)
            .unwrap();
        assert!(terminal.is_simple_terminal());
        assert_eq!(terminal.route_node_id, node);
        assert_eq!(graph.non_internal_neighbor_count(t.terminal_id), 1);
    }

    #[test]
    fn test_disconnect_demotes_segment_and_removes_simple_terminal() {
        let graph = UtilityGraph::default();
        let s = segment();
        let t = end(Uuid::new_v4());

        let mut edit = graph.begin_edit();
        edit.register_segment(s, None, Some(t)).unwrap();
        edit.commit().unwrap();

        let mut edit = graph.begin_edit();
        let released = edit.disconnect_segment_end(s.id, SegmentEnd::To).unwrap();
        assert_eq!(released, Some(t.terminal_id));
        edit.release_terminal_if_unused(t.terminal_id).unwrap();
        edit.commit().unwrap();

        assert_eq!(
            graph.try_get_graph_element::<UtilityGraphDisconnectedSegment>(s.id),
            Some(s)
        );
        assert!(!graph.contains(t.terminal_id));
    }

    #[test]
    fn test_connect_already_connected_end_fails() {
        let graph = UtilityGraph::default();
        let s = segment();
        let node = Uuid::new_v4();

        let mut edit = graph.begin_edit();
        edit.register_segment(s, Some(end(node)), None).unwrap();
        assert!(matches!(
            edit.connect_segment_end(s.id, SegmentEnd::From, end(node)),
            Err(UtilityGraphError::InconsistentIndex(_))
        ));
    }

    #[test]
    fn test_equipment_terminal_is_demoted_not_removed() {
        let graph = UtilityGraph::default();
        let s = segment();
        let terminal = UtilityGraphDisconnectedTerminal {
            id: Uuid::new_v4(),
            route_node_id: Uuid::new_v4(),
            terminal_equipment_id: Uuid::new_v4(),
            structure_index: 0,
            terminal_index: 2,
            direction: TerminalDirection::Bi,
        };

        let mut edit = graph.begin_edit();
        edit.register_disconnected_terminal(terminal).unwrap();
        edit.register_segment(
            s,
            Some(TerminalEnd {
                terminal_id: terminal.id,
                route_node_id: terminal.route_node_id,
            }),
            None,
        )
        .unwrap();
        edit.commit().unwrap();

        assert!(graph
            .try_get_graph_element::<UtilityGraphConnectedTerminal>(terminal.id)
            .is_some());

        let mut edit = graph.begin_edit();
        let released = edit.set_segment_ends(s.id, None, None).unwrap();
        for t in released {
            edit.release_terminal_if_unused(t).unwrap();
        }
        edit.commit().unwrap();

        assert_eq!(
            graph.try_get_graph_element::<UtilityGraphDisconnectedTerminal>(terminal.id),
            Some(terminal)
        );
    }

    #[test]
    fn test_register_and_remove_splitter_structure() {
        let graph = UtilityGraph::default();
        let equipment_id = Uuid::new_v4();
        let route_node_id = Uuid::new_v4();
        let hub_id = Uuid::new_v4();

        let terminals: Vec<StructureTerminal> = [TerminalDirection::In, TerminalDirection::Out, TerminalDirection::Out]
            .into_iter()
            .enumerate()
            .map(|(i, direction)| StructureTerminal {
                terminal: UtilityGraphDisconnectedTerminal {
                    id: Uuid::new_v4(),
                    route_node_id,
                    terminal_equipment_id: equipment_id,
                    structure_index: 0,
                    terminal_index: i as u16,
                    direction,
                },
                internal_connectivity_node_id: Some(hub_id),
            })
            .collect();

        let mut edit = graph.begin_edit();
        edit.register_terminal_structure(equipment_id, route_node_id, 0, &terminals)
            .unwrap();
        edit.commit().unwrap();

        // three terminals, one hub, three internal links
        assert_eq!(graph.element_count(), 7);
        for t in &terminals {
            assert!(graph
                .try_get_graph_element::<UtilityGraphConnectedTerminal>(t.terminal.id)
                .is_some());
            assert_eq!(graph.non_internal_neighbor_count(t.terminal.id), 0);
        }

        let mut edit = graph.begin_edit();
        for t in &terminals {
            edit.remove_terminal(t.terminal.id).unwrap();
        }
        edit.commit().unwrap();

        assert_eq!(graph.element_count(), 0);
        assert!(graph.objects().get_latest_node(hub_id).is_none());
    }

    #[test]
    fn test_terminal_to_terminal_link() {
        let graph = UtilityGraph::default();
        let route_node_id = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let link = UtilityGraphTerminalToTerminalConnectivityLink {
            id: Uuid::new_v4(),
            route_node_id,
            fiber_coord_length: 0.0,
        };

        let mut edit = graph.begin_edit();
        edit.add_terminal_to_terminal_link(link, a, b).unwrap();
        edit.commit().unwrap();

        assert!(graph.terminal_has_connections(a));
        assert!(graph.terminal_has_connections(b));

        let mut edit = graph.begin_edit();
        let released = edit.remove_terminal_to_terminal_link(link.id).unwrap();
        assert_eq!(released, vec![a, b]);
        for t in released {
            edit.release_terminal_if_unused(t).unwrap();
        }
        edit.commit().unwrap();

        assert!(!graph.contains(a));
        assert!(!graph.contains(link.id));
    }
}
