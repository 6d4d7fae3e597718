//! Node Container Aggregate
//!
//! Wells, cabinets and buildings at a route node. A node container owns its
//! racks, the placement of terminal equipment and the cross-connects between
//! terminals inside it.

use super::{AggregateRoot, AggregateState, EventSourcedAggregate};
use crate::commands::{
    NodeContainerErrorCode as Code, SubrackPlacementInfo, UtilityNetworkCommandError,
    UtilityNetworkCommandResult,
};
use crate::domain_events::UtilityNetworkEvent;
use crate::events::*;
use crate::graph::UtilityGraph;
use crate::projections::snapshot_functions::apply_node_container_event;
use crate::value_objects::{
    NodeContainer, NodeContainerSpecification, Rack, RackSpecification, SubrackPlacement,
    TerminalEquipmentSpecification, TerminalToTerminalConnection, VerticalContentAlignment,
};
use uuid::Uuid;

fn error(code: Code, message: impl Into<String>) -> UtilityNetworkCommandError {
    UtilityNetworkCommandError::node_container(code, message)
}

/// Node container aggregate
#[derive(Debug, Clone)]
pub struct NodeContainerAggregate {
    state: AggregateState<NodeContainer, NodeContainerEvent>,
}

impl NodeContainerAggregate {
    pub fn snapshot(&self) -> Option<&NodeContainer> {
        self.state.snapshot.as_ref()
    }

    fn require(&self) -> UtilityNetworkCommandResult<&NodeContainer> {
        self.state.snapshot.as_ref().ok_or_else(|| {
            error(
                Code::NodeContainerNotFound,
                format!("Node container {} not found", self.state.id),
            )
        })
    }

    fn raise(&mut self, event: impl Into<NodeContainerEvent>) {
        let event = event.into();
        self.state.snapshot = apply_node_container_event(self.state.snapshot.take(), &event);
        self.state.uncommitted.push(event);
    }

    /// Place the container. Uniqueness per route node is checked by the
    /// caller, which registers `interest_id` with the route network.
    pub fn place(
        &mut self,
        specification: &NodeContainerSpecification,
        route_node_id: Uuid,
        interest_id: Uuid,
        manufacturer_id: Option<Uuid>,
    ) -> UtilityNetworkCommandResult<()> {
        if self.state.snapshot.is_some() || self.state.version > 0 {
            return Err(error(
                Code::NodeContainerAlreadyExists,
                format!("Node container {} already exists", self.state.id),
            ));
        }

        self.raise(NodeContainerPlacedInRouteNetwork {
            container: NodeContainer {
                id: self.state.id,
                route_node_id,
                interest_id,
                specification_id: specification.id,
                manufacturer_id,
                vertical_content_alignment: VerticalContentAlignment::default(),
                racks: Vec::new(),
                terminal_equipment_reference_ids: Vec::new(),
                terminal_to_terminal_connections: Vec::new(),
            },
        });
        Ok(())
    }

    pub fn update_properties(
        &mut self,
        specification: Option<&NodeContainerSpecification>,
        manufacturer_id: Option<Uuid>,
    ) -> UtilityNetworkCommandResult<()> {
        let container = self.require()?;
        let specification_id = specification.map_or(container.specification_id, |s| s.id);
        let manufacturer_id = manufacturer_id.or(container.manufacturer_id);

        if specification_id == container.specification_id
            && manufacturer_id == container.manufacturer_id
        {
            return Err(error(
                Code::NoChange,
                format!("No properties of node container {} changed", container.id),
            ));
        }

        let node_container_id = container.id;
        self.raise(NodeContainerPropertiesChanged {
            node_container_id,
            specification_id,
            manufacturer_id,
        });
        Ok(())
    }

    pub fn reverse_vertical_content_alignment(&mut self) -> UtilityNetworkCommandResult<()> {
        let container = self.require()?;
        let node_container_id = container.id;
        let new_alignment = container.vertical_content_alignment.reverse();
        self.raise(NodeContainerVerticalContentAlignmentReversed {
            node_container_id,
            new_alignment,
        });
        Ok(())
    }

    pub fn place_rack(
        &mut self,
        rack_id: Uuid,
        specification: Option<&RackSpecification>,
        name: String,
        height_in_units: u16,
    ) -> UtilityNetworkCommandResult<()> {
        let container = self.require()?;
        let specification = specification.ok_or_else(|| {
            error(
                Code::InvalidRackSpecification,
                format!("Rack specification for rack {rack_id} not found"),
            )
        })?;
        if container.find_rack(rack_id).is_some() {
            return Err(error(
                Code::RackAlreadyExists,
                format!("Rack {rack_id} already exists in node container {}", container.id),
            ));
        }
        if container.racks.iter().any(|r| r.name == name) {
            return Err(error(
                Code::RackNameNotUnique,
                format!("A rack named '{name}' already exists in node container {}", container.id),
            ));
        }

        let node_container_id = container.id;
        let position = container.racks.len() as u16 + 1;
        self.raise(NodeContainerRackAdded {
            node_container_id,
            rack: Rack {
                id: rack_id,
                name,
                position,
                specification_id: specification.id,
                height_in_units,
                subrack_placements: Vec::new(),
            },
        });
        Ok(())
    }

    /// Register newly placed terminal equipment. Rack placements stack
    /// upwards from the start unit.
    pub fn add_terminal_equipment(
        &mut self,
        terminal_equipment_ids: &[Uuid],
        specification: &TerminalEquipmentSpecification,
        subrack_placement: Option<SubrackPlacementInfo>,
    ) -> UtilityNetworkCommandResult<()> {
        let container = self.require()?;
        if terminal_equipment_ids.is_empty() {
            return Err(error(
                Code::InvalidNumberOfEquipment,
                "Number of equipment must be at least one",
            ));
        }
        let node_container_id = container.id;

        let Some(placement) = subrack_placement else {
            self.raise(NodeContainerTerminalEquipmentsAdded {
                node_container_id,
                terminal_equipment_ids: terminal_equipment_ids.to_vec(),
            });
            return Ok(());
        };

        if !specification.is_rack_equipment {
            return Err(error(
                Code::TerminalEquipmentNotRackEquipment,
                format!("Terminal equipment specification {} is not rack equipment", specification.id),
            ));
        }
        let rack = container.find_rack(placement.rack_id).ok_or_else(|| {
            error(
                Code::RackNotFound,
                format!("Rack {} not found in node container {node_container_id}", placement.rack_id),
            )
        })?;

        let height = specification.height_in_rack_units.max(1);
        let mut placements = Vec::with_capacity(terminal_equipment_ids.len());
        let mut next_unit = Some(placement.start_unit_position);
        for id in terminal_equipment_ids {
            let position = next_unit
                .filter(|unit| rack.fits(*unit, height))
                .ok_or_else(|| {
                    error(
                        Code::RackUnitsOutOfRange,
                        format!(
                            "{} equipment of height {height} from unit {} do not fit in rack {} with {} units",
                            terminal_equipment_ids.len(),
                            placement.start_unit_position,
                            rack.id,
                            rack.height_in_units
                        ),
                    )
                })?;
            placements.push(SubrackPlacement {
                terminal_equipment_id: *id,
                position,
                height_in_units: specification.height_in_rack_units,
            });
            next_unit = position.checked_add(height);
        }

        if let Some(clash) = placements
            .iter()
            .find(|p| rack.is_occupied(p.position, p.height_in_units, None))
        {
            return Err(error(
                Code::RackUnitsOccupied,
                format!("Rack {} units from {} are occupied", rack.id, clash.position),
            ));
        }

        let rack_id = rack.id;
        self.raise(NodeContainerTerminalEquipmentsAddedToRack {
            node_container_id,
            rack_id,
            placements,
        });
        Ok(())
    }

    /// Move rack mounted equipment to another rack or unit
    pub fn arrange_rack_equipment(
        &mut self,
        terminal_equipment_id: Uuid,
        to_rack_id: Uuid,
        to_start_unit: u16,
    ) -> UtilityNetworkCommandResult<()> {
        let container = self.require()?;
        let (from_rack, placement) = container
            .rack_of(terminal_equipment_id)
            .and_then(|rack| rack.placement_of(terminal_equipment_id).map(|p| (rack, *p)))
            .ok_or_else(|| {
                error(
                    Code::TerminalEquipmentNotInRack,
                    format!("Terminal equipment {terminal_equipment_id} is not mounted in a rack"),
                )
            })?;
        let to_rack = container.find_rack(to_rack_id).ok_or_else(|| {
            error(
                Code::RackNotFound,
                format!("Rack {to_rack_id} not found in node container {}", container.id),
            )
        })?;
        if !to_rack.fits(to_start_unit, placement.height_in_units) {
            return Err(error(
                Code::RackUnitsOutOfRange,
                format!(
                    "Unit {to_start_unit} with height {} is outside rack {to_rack_id} with {} units",
                    placement.height_in_units, to_rack.height_in_units
                ),
            ));
        }
        if to_rack.is_occupied(to_start_unit, placement.height_in_units, Some(terminal_equipment_id)) {
            return Err(error(
                Code::RackUnitsOccupied,
                format!("Rack {to_rack_id} units from {to_start_unit} are occupied"),
            ));
        }

        let node_container_id = container.id;
        let from_rack_id = from_rack.id;
        self.raise(NodeContainerRackEquipmentMoved {
            node_container_id,
            terminal_equipment_id,
            from_rack_id,
            to_rack_id,
            start_unit: to_start_unit,
        });
        Ok(())
    }

    pub fn remove_terminal_equipment_reference(
        &mut self,
        terminal_equipment_id: Uuid,
    ) -> UtilityNetworkCommandResult<()> {
        let container = self.require()?;
        if !container.contains_terminal_equipment(terminal_equipment_id) {
            return Err(error(
                Code::TerminalEquipmentNotFound,
                format!(
                    "Terminal equipment {terminal_equipment_id} not found in node container {}",
                    container.id
                ),
            ));
        }

        let node_container_id = container.id;
        self.raise(NodeContainerTerminalEquipmentReferenceRemoved {
            node_container_id,
            terminal_equipment_id,
        });
        Ok(())
    }

    /// Cross-connect two terminals. The caller has resolved both terminals
    /// to equipment in this container; the graph supplies their degree.
    pub fn connect_terminals(
        &mut self,
        from_terminal_id: Uuid,
        to_terminal_id: Uuid,
        fiber_coord_length: f64,
        graph: &UtilityGraph,
    ) -> UtilityNetworkCommandResult<TerminalToTerminalConnection> {
        let container = self.require()?;
        if from_terminal_id == to_terminal_id {
            return Err(error(
                Code::CannotConnectTerminalToItself,
                format!("Terminal {from_terminal_id} cannot be connected to itself"),
            ));
        }
        if container
            .connection_between(from_terminal_id, to_terminal_id)
            .is_some()
        {
            return Err(error(
                Code::TerminalAlreadyConnected,
                format!("Terminals {from_terminal_id} and {to_terminal_id} are already connected"),
            ));
        }
        for terminal_id in [from_terminal_id, to_terminal_id] {
            if graph.non_internal_neighbor_count(terminal_id) >= 2 {
                return Err(error(
                    Code::TerminalAlreadyConnected,
                    format!("Terminal {terminal_id} already has two connections"),
                ));
            }
        }

        let connection = TerminalToTerminalConnection {
            id: Uuid::new_v4(),
            from_terminal_id,
            to_terminal_id,
            fiber_coord_length,
        };
        let node_container_id = container.id;
        self.raise(NodeContainerTerminalsConnected {
            node_container_id,
            connection,
        });
        Ok(connection)
    }

    pub fn disconnect_terminals(
        &mut self,
        from_terminal_id: Uuid,
        to_terminal_id: Uuid,
    ) -> UtilityNetworkCommandResult<()> {
        let container = self.require()?;
        let connection_id = container
            .connection_between(from_terminal_id, to_terminal_id)
            .map(|c| c.id)
            .ok_or_else(|| {
                error(
                    Code::TerminalConnectionNotFound,
                    format!("No connection between terminals {from_terminal_id} and {to_terminal_id}"),
                )
            })?;

        let node_container_id = container.id;
        self.raise(NodeContainerTerminalsDisconnected {
            node_container_id,
            connection_id,
        });
        Ok(())
    }

    /// Remove an empty container. `has_affixed_span_equipment` is supplied
    /// by the caller from the span equipment affixes.
    pub fn remove(&mut self, has_affixed_span_equipment: bool) -> UtilityNetworkCommandResult<()> {
        let container = self.require()?;
        if !container.is_empty() {
            return Err(error(
                Code::CannotRemoveNodeContainerWithTerminalEquipment,
                format!("Node container {} still holds terminal equipment", container.id),
            ));
        }
        if has_affixed_span_equipment {
            return Err(error(
                Code::CannotRemoveNodeContainerWithAffixedSpanEquipment,
                format!("Span equipment is still affixed to node container {}", container.id),
            ));
        }

        let node_container_id = container.id;
        self.raise(NodeContainerRemoved { node_container_id });
        Ok(())
    }
}

impl AggregateRoot for NodeContainerAggregate {
    fn id(&self) -> Uuid {
        self.state.id
    }

    fn version(&self) -> u64 {
        self.state.version
    }
}

impl EventSourcedAggregate for NodeContainerAggregate {
    type Event = NodeContainerEvent;

    fn empty(id: Uuid) -> Self {
        Self {
            state: AggregateState::new(id),
        }
    }

    fn apply(&mut self, event: &NodeContainerEvent) {
        self.state.snapshot = apply_node_container_event(self.state.snapshot.take(), event);
        self.state.version += 1;
    }

    fn extract(event: &UtilityNetworkEvent) -> Option<&NodeContainerEvent> {
        match event {
            UtilityNetworkEvent::NodeContainer(e) => Some(e),
            _ => None,
        }
    }

    fn uncommitted_events(&self) -> &[NodeContainerEvent] {
        &self.state.uncommitted
    }

    fn mark_committed(&mut self, version: u64) -> Vec<NodeContainerEvent> {
        self.state.mark_committed(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ObjectManagerConfig;

    fn container_spec() -> NodeContainerSpecification {
        NodeContainerSpecification {
            id: Uuid::new_v4(),
            category: "Well".into(),
            name: "Well 80x80".into(),
            short_name: "W80".into(),
        }
    }

    fn rack_spec() -> RackSpecification {
        RackSpecification {
            id: Uuid::new_v4(),
            name: "Rack 42U".into(),
            short_name: "R42".into(),
        }
    }

    fn equipment_spec(is_rack_equipment: bool, height: u16) -> TerminalEquipmentSpecification {
        TerminalEquipmentSpecification {
            id: Uuid::new_v4(),
            category: "Patch panels".into(),
            name: "LISA 1U".into(),
            short_name: "L1".into(),
            is_rack_equipment,
            height_in_rack_units: height,
            structure_templates: vec![],
            deprecated: false,
        }
    }

    fn placed() -> NodeContainerAggregate {
        let mut aggregate = NodeContainerAggregate::empty(Uuid::new_v4());
        aggregate
            .place(&container_spec(), Uuid::new_v4(), Uuid::new_v4(), None)
            .unwrap();
        aggregate
    }

    #[test]
    fn test_alignment_reversal() {
        let mut aggregate = placed();
        aggregate.reverse_vertical_content_alignment().unwrap();
        assert_eq!(
            aggregate.snapshot().unwrap().vertical_content_alignment,
            VerticalContentAlignment::Top
        );
    }

    #[test]
    fn test_racks_need_unique_names() {
        let mut aggregate = placed();
        let spec = rack_spec();
        aggregate
            .place_rack(Uuid::new_v4(), Some(&spec), "Rack 1".into(), 42)
            .unwrap();

        let err = aggregate
            .place_rack(Uuid::new_v4(), Some(&spec), "Rack 1".into(), 42)
            .unwrap_err();
        assert_eq!(err.error_code(), "RACK_NAME_NOT_UNIQUE");

        let err = aggregate
            .place_rack(Uuid::new_v4(), None, "Rack 2".into(), 42)
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_RACK_SPECIFICATION");
    }

    #[test]
    fn test_rack_placement_stacks_and_detects_overlap() {
        let mut aggregate = placed();
        let rack_id = Uuid::new_v4();
        aggregate
            .place_rack(rack_id, Some(&rack_spec()), "Rack 1".into(), 42)
            .unwrap();
        let spec = equipment_spec(true, 2);
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let placement = SubrackPlacementInfo {
            rack_id,
            start_unit_position: 10,
        };

        aggregate
            .add_terminal_equipment(&ids, &spec, Some(placement))
            .unwrap();
        let rack = aggregate.snapshot().unwrap().find_rack(rack_id).unwrap().clone();
        let positions: Vec<u16> = rack.subrack_placements.iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![10, 12, 14]);

        let err = aggregate
            .add_terminal_equipment(
                &[Uuid::new_v4()],
                &spec,
                Some(SubrackPlacementInfo {
                    rack_id,
                    start_unit_position: 15,
                }),
            )
            .unwrap_err();
        assert_eq!(err.error_code(), "RACK_UNITS_OCCUPIED");

        let err = aggregate
            .add_terminal_equipment(&[Uuid::new_v4()], &equipment_spec(false, 0), Some(placement))
            .unwrap_err();
        assert_eq!(err.error_code(), "TERMINAL_EQUIPMENT_NOT_RACK_EQUIPMENT");

        // moving the top equipment up by one unit only overlaps itself
        aggregate.arrange_rack_equipment(ids[2], rack_id, 15).unwrap();
        let err = aggregate.arrange_rack_equipment(ids[2], rack_id, 11).unwrap_err();
        assert_eq!(err.error_code(), "RACK_UNITS_OCCUPIED");
    }

    #[test]
    fn test_rack_placement_must_fit_the_rack() {
        let mut aggregate = placed();
        let rack_id = Uuid::new_v4();
        aggregate
            .place_rack(rack_id, Some(&rack_spec()), "Rack 1".into(), 42)
            .unwrap();
        let spec = equipment_spec(true, 1);
        let at = |start_unit_position| {
            Some(SubrackPlacementInfo {
                rack_id,
                start_unit_position,
            })
        };

        for (count, start) in [(2, u16::MAX), (1, 60), (1, 0), (2, 42)] {
            let ids: Vec<Uuid> = (0..count).map(|_| Uuid::new_v4()).collect();
            let err = aggregate
                .add_terminal_equipment(&ids, &spec, at(start))
                .unwrap_err();
            assert_eq!(err.error_code(), "RACK_UNITS_OUT_OF_RANGE");
        }
        assert!(aggregate.snapshot().unwrap().find_rack(rack_id).unwrap().subrack_placements.is_empty());

        let top = Uuid::new_v4();
        aggregate.add_terminal_equipment(&[top], &spec, at(42)).unwrap();
        let err = aggregate.arrange_rack_equipment(top, rack_id, 43).unwrap_err();
        assert_eq!(err.error_code(), "RACK_UNITS_OUT_OF_RANGE");
        let err = aggregate.arrange_rack_equipment(top, rack_id, u16::MAX).unwrap_err();
        assert_eq!(err.error_code(), "RACK_UNITS_OUT_OF_RANGE");
        aggregate.arrange_rack_equipment(top, rack_id, 1).unwrap();
    }

    #[test]
    fn test_terminal_connections() {
        let mut aggregate = placed();
        let graph = UtilityGraph::new(ObjectManagerConfig::default());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let err = aggregate.connect_terminals(a, a, 0.0, &graph).unwrap_err();
        assert_eq!(err.error_code(), "CANNOT_CONNECT_TERMINAL_TO_ITSELF");

        aggregate.connect_terminals(a, b, 1.5, &graph).unwrap();
        let err = aggregate.connect_terminals(b, a, 1.5, &graph).unwrap_err();
        assert_eq!(err.error_code(), "TERMINAL_ALREADY_CONNECTED");

        aggregate.disconnect_terminals(b, a).unwrap();
        let err = aggregate.disconnect_terminals(a, b).unwrap_err();
        assert_eq!(err.error_code(), "TERMINAL_CONNECTION_NOT_FOUND");
    }

    #[test]
    fn test_remove_requires_empty_container() {
        let mut aggregate = placed();
        let equipment_id = Uuid::new_v4();
        aggregate
            .add_terminal_equipment(&[equipment_id], &equipment_spec(false, 0), None)
            .unwrap();

        let err = aggregate.remove(false).unwrap_err();
        assert_eq!(err.error_code(), "CANNOT_REMOVE_NODE_CONTAINER_WITH_TERMINAL_EQUIPMENT");

        aggregate.remove_terminal_equipment_reference(equipment_id).unwrap();
        let err = aggregate.remove(true).unwrap_err();
        assert_eq!(err.error_code(), "CANNOT_REMOVE_NODE_CONTAINER_WITH_AFFIXED_SPAN_EQUIPMENT");

        aggregate.remove(false).unwrap();
        assert!(aggregate.snapshot().is_none());
    }
}
