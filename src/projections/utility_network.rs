//! Utility network projection
//!
//! Owns the equipment snapshots and the utility graph. Every stored
//! equipment event passes through [`UtilityNetworkProjection::apply`], which
//! replaces the snapshot and brings the graph index in line with it. Startup
//! rebuild replays the event history through the same path.

use super::snapshot_functions::{
    apply_node_container_event, apply_span_equipment_event, apply_terminal_equipment_event,
};
use crate::domain_events::{DomainEvent, UtilityNetworkEvent};
use crate::events::{NodeContainerEvent, SpanEquipmentEvent, TerminalEquipmentEvent};
use crate::graph::{
    ObjectManagerConfig, StructureTerminal, TerminalEnd, UtilityGraph,
    UtilityGraphDisconnectedSegment, UtilityGraphDisconnectedTerminal, UtilityGraphElement,
    UtilityGraphResult, UtilityGraphTerminalToTerminalConnectivityLink,
};
use crate::value_objects::{NodeContainer, SpanEquipment, TerminalEquipment};
use dashmap::DashMap;
use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::{debug, info};
use uuid::Uuid;

/// Where a live segment should sit in the graph
#[derive(Debug, Clone, Copy)]
struct WantedSegment {
    structure_index: u16,
    segment_index: u16,
    from: Option<TerminalEnd>,
    to: Option<TerminalEnd>,
}

/// Equipment snapshots plus the utility graph derived from them
pub struct UtilityNetworkProjection {
    graph: UtilityGraph,
    span_equipment: DashMap<Uuid, SpanEquipment>,
    terminal_equipment: DashMap<Uuid, TerminalEquipment>,
    node_containers: DashMap<Uuid, NodeContainer>,
    containers_by_route_node: DashMap<Uuid, Uuid>,
    /// Terminal id to owning terminal equipment id
    terminal_owners: DashMap<Uuid, Uuid>,
}

impl Default for UtilityNetworkProjection {
    fn default() -> Self {
        Self::new(ObjectManagerConfig::default())
    }
}

impl UtilityNetworkProjection {
    pub fn new(config: ObjectManagerConfig) -> Self {
        Self {
            graph: UtilityGraph::new(config),
            span_equipment: DashMap::new(),
            terminal_equipment: DashMap::new(),
            node_containers: DashMap::new(),
            containers_by_route_node: DashMap::new(),
            terminal_owners: DashMap::new(),
        }
    }

    /// Build a projection from a full event history
    pub fn rebuild<'e>(
        config: ObjectManagerConfig,
        events: impl IntoIterator<Item = &'e UtilityNetworkEvent>,
    ) -> UtilityGraphResult<Self> {
        let projection = Self::new(config);
        let mut count = 0usize;
        for event in events {
            projection.apply(event)?;
            count += 1;
        }
        info!(
            events = count,
            graph_elements = projection.graph.element_count(),
            span_equipment = projection.span_equipment.len(),
            "Utility network projection rebuilt"
        );
        Ok(projection)
    }

    pub fn graph(&self) -> &UtilityGraph {
        &self.graph
    }

    pub fn apply(&self, event: &UtilityNetworkEvent) -> UtilityGraphResult<()> {
        debug!(
            event_type = event.event_type(),
            aggregate_id = %event.aggregate_id(),
            "Projecting utility network event"
        );
        match event {
            UtilityNetworkEvent::SpanEquipment(e) => self.apply_span_equipment(e),
            UtilityNetworkEvent::TerminalEquipment(e) => self.apply_terminal_equipment(e),
            UtilityNetworkEvent::NodeContainer(e) => self.apply_node_container(e),
        }
    }

    fn apply_span_equipment(&self, event: &SpanEquipmentEvent) -> UtilityGraphResult<()> {
        let id = event.aggregate_id();
        if let SpanEquipmentEvent::SpanEquipmentMergedInto(_) = event {
            // segments were taken over by the surviving span equipment
            self.span_equipment.remove(&id);
            return Ok(());
        }

        let before = self.span_equipment(id);
        let after = apply_span_equipment_event(before.clone(), event);

        let mut previous_segment_ids: Vec<Uuid> = before
            .iter()
            .flat_map(|e| e.segments().map(|(_, _, s)| s.id).collect::<Vec<_>>())
            .collect();
        if let SpanEquipmentEvent::SpanEquipmentMerged(e) = event {
            if let Some(merged) = self.span_equipment(e.merged_span_equipment_id) {
                previous_segment_ids.extend(merged.segments().map(|(_, _, s)| s.id));
            }
        }

        self.sync_span_segments(id, &previous_segment_ids, after.as_ref())?;

        match after {
            Some(equipment) => {
                self.span_equipment.insert(id, equipment);
            }
            None => {
                self.span_equipment.remove(&id);
            }
        }
        Ok(())
    }

    /// Remove segments that disappeared, reindex and rewire the ones that
    /// stay, register new ones, then drop terminals nothing ends in anymore
    fn sync_span_segments(
        &self,
        span_equipment_id: Uuid,
        previous_segment_ids: &[Uuid],
        after: Option<&SpanEquipment>,
    ) -> UtilityGraphResult<()> {
        let mut wanted: IndexMap<Uuid, WantedSegment> = IndexMap::new();
        if let Some(equipment) = after {
            let end = |terminal_id: Option<Uuid>, index: u16| {
                terminal_id.map(|terminal_id| TerminalEnd {
                    terminal_id,
                    route_node_id: equipment.route_node_at(index).unwrap_or_default(),
                })
            };
            for (structure_index, segment_index, segment) in equipment.segments() {
                wanted.insert(
                    segment.id,
                    WantedSegment {
                        structure_index,
                        segment_index,
                        from: end(segment.from_terminal_id, segment.from_node_of_interest_index),
                        to: end(segment.to_terminal_id, segment.to_node_of_interest_index),
                    },
                );
            }
        }

        let mut edit = self.graph.begin_edit();
        let mut released = Vec::new();

        for segment_id in previous_segment_ids {
            if !wanted.contains_key(segment_id) && edit.element(*segment_id).is_some() {
                released.extend(edit.remove_segment(*segment_id)?);
            }
        }

        for (segment_id, w) in &wanted {
            if edit.element(*segment_id).is_some() {
                edit.reindex_segment(*segment_id, span_equipment_id, w.structure_index, w.segment_index)?;
                released.extend(edit.set_segment_ends(*segment_id, w.from, w.to)?);
            } else {
                edit.register_segment(
                    UtilityGraphDisconnectedSegment {
                        id: *segment_id,
                        span_equipment_id,
                        structure_index: w.structure_index,
                        segment_index: w.segment_index,
                    },
                    w.from,
                    w.to,
                )?;
            }
        }

        for terminal_id in released {
            edit.release_terminal_if_unused(terminal_id)?;
        }

        edit.commit()?;
        Ok(())
    }

    fn apply_terminal_equipment(&self, event: &TerminalEquipmentEvent) -> UtilityGraphResult<()> {
        let id = event.aggregate_id();
        let before = self.terminal_equipment(id);
        let after = apply_terminal_equipment_event(before.clone(), event);

        let live = |equipment: Option<&TerminalEquipment>| -> HashSet<Uuid> {
            equipment
                .map(|e| e.active_structures().map(|(_, s)| s.id).collect())
                .unwrap_or_default()
        };
        let live_before = live(before.as_ref());
        let live_after = live(after.as_ref());

        let mut edit = self.graph.begin_edit();

        if let Some(equipment) = &before {
            for (_, structure) in equipment.active_structures() {
                if live_after.contains(&structure.id) {
                    continue;
                }
                for terminal in &structure.terminals {
                    edit.remove_terminal(terminal.id)?;
                    self.terminal_owners.remove(&terminal.id);
                }
            }
        }

        if let Some(equipment) = &after {
            for (structure_index, structure) in equipment.active_structures() {
                if live_before.contains(&structure.id) {
                    continue;
                }
                let members: Vec<StructureTerminal> = structure
                    .terminals
                    .iter()
                    .enumerate()
                    .map(|(terminal_index, terminal)| StructureTerminal {
                        terminal: UtilityGraphDisconnectedTerminal {
                            id: terminal.id,
                            route_node_id: equipment.route_node_id,
                            terminal_equipment_id: equipment.id,
                            structure_index,
                            terminal_index: terminal_index as u16,
                            direction: terminal.direction,
                        },
                        internal_connectivity_node_id: terminal.internal_connectivity_node_id,
                    })
                    .collect();
                edit.register_terminal_structure(
                    equipment.id,
                    equipment.route_node_id,
                    structure_index,
                    &members,
                )?;
                for terminal in &structure.terminals {
                    self.terminal_owners.insert(terminal.id, equipment.id);
                }
            }
        }

        edit.commit()?;

        match after {
            Some(equipment) => {
                self.terminal_equipment.insert(id, equipment);
            }
            None => {
                self.terminal_equipment.remove(&id);
            }
        }
        Ok(())
    }

    fn apply_node_container(&self, event: &NodeContainerEvent) -> UtilityGraphResult<()> {
        let id = event.aggregate_id();
        let before = self.node_container(id);
        let after = apply_node_container_event(before.clone(), event);

        let connections_after: HashSet<Uuid> = after
            .iter()
            .flat_map(|c| c.terminal_to_terminal_connections.iter().map(|t| t.id))
            .collect();
        let connections_before: HashSet<Uuid> = before
            .iter()
            .flat_map(|c| c.terminal_to_terminal_connections.iter().map(|t| t.id))
            .collect();

        let mut edit = self.graph.begin_edit();
        let mut released = Vec::new();

        for connection_id in connections_before.difference(&connections_after) {
            if edit.element(*connection_id).is_some() {
                released.extend(edit.remove_terminal_to_terminal_link(*connection_id)?);
            }
        }

        if let Some(container) = &after {
            for connection in &container.terminal_to_terminal_connections {
                if connections_before.contains(&connection.id) {
                    continue;
                }
                edit.add_terminal_to_terminal_link(
                    UtilityGraphTerminalToTerminalConnectivityLink {
                        id: connection.id,
                        route_node_id: container.route_node_id,
                        fiber_coord_length: connection.fiber_coord_length,
                    },
                    connection.from_terminal_id,
                    connection.to_terminal_id,
                )?;
            }
        }

        for terminal_id in released {
            edit.release_terminal_if_unused(terminal_id)?;
        }
        edit.commit()?;

        match after {
            Some(container) => {
                self.containers_by_route_node.insert(container.route_node_id, id);
                self.node_containers.insert(id, container);
            }
            None => {
                if let Some((_, removed)) = self.node_containers.remove(&id) {
                    self.containers_by_route_node.remove(&removed.route_node_id);
                }
            }
        }
        Ok(())
    }

    pub fn span_equipment(&self, id: Uuid) -> Option<SpanEquipment> {
        self.span_equipment.get(&id).map(|e| e.value().clone())
    }

    pub fn terminal_equipment(&self, id: Uuid) -> Option<TerminalEquipment> {
        self.terminal_equipment.get(&id).map(|e| e.value().clone())
    }

    pub fn node_container(&self, id: Uuid) -> Option<NodeContainer> {
        self.node_containers.get(&id).map(|c| c.value().clone())
    }

    pub fn node_container_at(&self, route_node_id: Uuid) -> Option<NodeContainer> {
        let container_id = *self.containers_by_route_node.get(&route_node_id)?;
        self.node_container(container_id)
    }

    /// Span equipment owning a span segment, resolved through the graph index
    pub fn span_equipment_of_segment(&self, span_segment_id: Uuid) -> Option<SpanEquipment> {
        let span_equipment_id = match self.graph.get_graph_element(span_segment_id)? {
            UtilityGraphElement::ConnectedSegment(s) => s.span_equipment_id,
            UtilityGraphElement::DisconnectedSegment(s) => s.span_equipment_id,
            _ => return None,
        };
        self.span_equipment(span_equipment_id)
    }

    /// Terminal equipment owning a terminal
    pub fn terminal_equipment_of_terminal(&self, terminal_id: Uuid) -> Option<TerminalEquipment> {
        let owner = *self.terminal_owners.get(&terminal_id)?;
        self.terminal_equipment(owner)
    }

    /// Span equipment entering a node container
    pub fn span_equipment_affixed_to_container(&self, node_container_id: Uuid) -> Vec<Uuid> {
        self.span_equipment
            .iter()
            .filter(|e| {
                e.node_container_affixes
                    .iter()
                    .any(|a| a.node_container_id == node_container_id)
            })
            .map(|e| *e.key())
            .collect()
    }

    /// Span equipment with a node of interest at the route node
    pub fn span_equipment_at_route_node(&self, route_node_id: Uuid) -> Vec<Uuid> {
        self.span_equipment
            .iter()
            .filter(|e| e.route_node_ids.contains(&route_node_id))
            .map(|e| *e.key())
            .collect()
    }

    /// Span equipment routed through segments of the given parent
    pub fn children_of(&self, parent_span_equipment: &SpanEquipment) -> Vec<Uuid> {
        let parent_segments: HashSet<Uuid> = parent_span_equipment
            .segments()
            .map(|(_, _, s)| s.id)
            .collect();
        self.span_equipment
            .iter()
            .filter(|e| {
                e.utility_network_hops.iter().any(|hop| {
                    hop.parent_affixes
                        .iter()
                        .any(|a| parent_segments.contains(&a.span_segment_id))
                })
            })
            .map(|e| *e.key())
            .collect()
    }

    pub fn span_equipment_count(&self) -> usize {
        self.span_equipment.len()
    }

    pub fn terminal_equipment_count(&self) -> usize {
        self.terminal_equipment.len()
    }

    pub fn node_container_count(&self) -> usize {
        self.node_containers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{
        SpanEquipmentPlacedInRouteNetwork, SpanSegmentToTerminalConnectInfo,
        SpanSegmentsConnectedToSimpleTerminals, SpanSegmentsDisconnectedFromTerminals,
    };
    use crate::graph::{UtilityGraphConnectedSegment, UtilityGraphConnectedTerminal};
    use crate::value_objects::{SpanSegment, SpanStructure};

    fn placed(route_node_ids: Vec<Uuid>) -> SpanEquipment {
        SpanEquipment {
            id: Uuid::new_v4(),
            specification_id: Uuid::new_v4(),
            walk_of_interest_id: Uuid::new_v4(),
            node_of_interest_ids: route_node_ids.iter().map(|_| Uuid::new_v4()).collect(),
            route_node_ids,
            span_structures: vec![SpanStructure {
                id: Uuid::new_v4(),
                specification_id: Uuid::new_v4(),
                level: 1,
                parent_position: 0,
                position: 1,
                deleted: false,
                span_segments: vec![SpanSegment::new(Uuid::new_v4(), 0, 1)],
            }],
            name: None,
            marking_info: None,
            manufacturer_id: None,
            is_cable: false,
            utility_network_hops: vec![],
            node_container_affixes: vec![],
        }
    }

    fn event(e: impl Into<SpanEquipmentEvent>) -> UtilityNetworkEvent {
        UtilityNetworkEvent::SpanEquipment(e.into())
    }

    #[test]
    fn test_placement_registers_disconnected_segments() {
        let projection = UtilityNetworkProjection::default();
        let equipment = placed(vec![Uuid::new_v4(), Uuid::new_v4()]);
        let segment_id = equipment.span_structures[0].span_segments[0].id;

        projection
            .apply(&event(SpanEquipmentPlacedInRouteNetwork {
                span_equipment: equipment.clone(),
            }))
            .unwrap();

        assert!(projection
            .graph()
            .try_get_graph_element::<UtilityGraphDisconnectedSegment>(segment_id)
            .is_some());
        assert_eq!(
            projection.span_equipment_of_segment(segment_id).map(|e| e.id),
            Some(equipment.id)
        );
    }

    #[test]
    fn test_connect_and_disconnect_maintain_simple_terminal() {
        let projection = UtilityNetworkProjection::default();
        let shared = Uuid::new_v4();
        let a = placed(vec![Uuid::new_v4(), shared]);
        let b = placed(vec![shared, Uuid::new_v4()]);
        let (seg_a, seg_b) = (
            a.span_structures[0].span_segments[0].id,
            b.span_structures[0].span_segments[0].id,
        );
        let terminal_id = Uuid::new_v4();

        for equipment in [&a, &b] {
            projection
                .apply(&event(SpanEquipmentPlacedInRouteNetwork {
                    span_equipment: equipment.clone(),
                }))
                .unwrap();
        }
        for (equipment, segment_id) in [(&a, seg_a), (&b, seg_b)] {
            projection
                .apply(&event(SpanSegmentsConnectedToSimpleTerminals {
                    span_equipment_id: equipment.id,
                    route_node_id: shared,
                    connects: vec![SpanSegmentToTerminalConnectInfo {
                        segment_id,
                        terminal_id,
                    }],
                }))
                .unwrap();
        }

        let graph = projection.graph();
        let terminal = graph
            .try_get_graph_element::<UtilityGraphConnectedTerminal>(terminal_id)
            .unwrap();
        assert!(terminal.is_simple_terminal());
        assert_eq!(terminal.route_node_id, shared);
        assert_eq!(graph.non_internal_neighbor_count(terminal_id), 2);
        assert!(graph
            .try_get_graph_element::<UtilityGraphConnectedSegment>(seg_a)
            .is_some());

        for (equipment, segment_id) in [(&a, seg_a), (&b, seg_b)] {
            projection
                .apply(&event(SpanSegmentsDisconnectedFromTerminals {
                    span_equipment_id: equipment.id,
                    disconnects: vec![SpanSegmentToTerminalConnectInfo {
                        segment_id,
                        terminal_id,
                    }],
                }))
                .unwrap();
        }

        assert!(!graph.contains(terminal_id));
        assert!(graph
            .try_get_graph_element::<UtilityGraphDisconnectedSegment>(seg_b)
            .is_some());
    }
}
