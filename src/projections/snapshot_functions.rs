//! Pure event application on equipment snapshots
//!
//! Every function takes the current snapshot by value and returns the next
//! one. `None` means the equipment does not exist (not yet placed, removed or
//! merged away). Events that do not fit the current state leave it untouched;
//! aggregates validate before raising, so that only happens on replay of a
//! foreign stream.

use crate::events::*;
use crate::value_objects::{NodeContainer, SpanEquipment, SpanSegment, TerminalEquipment};
use crate::graph::SegmentEnd;

pub fn apply_span_equipment_event(
    state: Option<SpanEquipment>,
    event: &SpanEquipmentEvent,
) -> Option<SpanEquipment> {
    match event {
        SpanEquipmentEvent::SpanEquipmentPlacedInRouteNetwork(e) => Some(e.span_equipment.clone()),
        SpanEquipmentEvent::SpanEquipmentRemoved(_)
        | SpanEquipmentEvent::SpanEquipmentMergedInto(_) => None,
        _ => state.map(|equipment| apply_to_existing_span_equipment(equipment, event)),
    }
}

fn apply_to_existing_span_equipment(
    mut equipment: SpanEquipment,
    event: &SpanEquipmentEvent,
) -> SpanEquipment {
    match event {
        SpanEquipmentEvent::SpanSegmentsCut(e) => apply_cut(equipment, e),

        SpanEquipmentEvent::SpanSegmentsConnectedToSimpleTerminals(e) => {
            connect_segment_ends(equipment, e.route_node_id, &e.connects)
        }

        SpanEquipmentEvent::SpanSegmentsConnectedToTerminals(e) => {
            connect_segment_ends(equipment, e.route_node_id, &e.connects)
        }

        SpanEquipmentEvent::SpanSegmentsDisconnectedFromTerminals(e) => {
            for info in &e.disconnects {
                update_segment(&mut equipment, info.segment_id, |segment| {
                    let mut segment = segment;
                    if segment.from_terminal_id == Some(info.terminal_id) {
                        segment.from_terminal_id = None;
                    }
                    if segment.to_terminal_id == Some(info.terminal_id) {
                        segment.to_terminal_id = None;
                    }
                    segment
                });
            }
            equipment
        }

        SpanEquipmentEvent::SpanEquipmentAffixedToParent(e) => {
            equipment.utility_network_hops.push(e.hop.clone());
            equipment
        }

        SpanEquipmentEvent::SpanEquipmentDetachedFromParent(e) => {
            equipment.utility_network_hops.retain(|hop| *hop != e.hop);
            equipment
        }

        SpanEquipmentEvent::SpanEquipmentAffixedToContainer(e) => {
            equipment.node_container_affixes.push(e.affix);
            equipment
        }

        SpanEquipmentEvent::SpanEquipmentDetachedFromContainer(e) => {
            equipment
                .node_container_affixes
                .retain(|a| a.node_container_id != e.node_container_id);
            equipment
        }

        SpanEquipmentEvent::AdditionalStructuresAddedToSpanEquipment(e) => {
            equipment
                .span_structures
                .extend(e.span_structures_to_add.iter().cloned());
            equipment
        }

        SpanEquipmentEvent::SpanStructureRemoved(e) => {
            if let Some(structure) = equipment
                .span_structures
                .iter_mut()
                .find(|s| s.id == e.span_structure_id)
            {
                structure.deleted = true;
            }
            equipment
        }

        SpanEquipmentEvent::SpanEquipmentMerged(e) => {
            equipment.walk_of_interest_id = e.walk_of_interest_id;
            equipment.node_of_interest_ids = e.node_of_interest_ids.clone();
            equipment.route_node_ids = e.route_node_ids.clone();
            equipment.span_structures = e.span_structures.clone();
            equipment
        }

        SpanEquipmentEvent::SpanEquipmentPropertiesUpdated(e) => {
            equipment.specification_id = e.specification_id;
            for (structure, specification_id) in equipment
                .span_structures
                .iter_mut()
                .zip(&e.structure_specification_ids)
            {
                structure.specification_id = *specification_id;
            }
            equipment.name = e.name.clone();
            equipment.marking_info = e.marking_info.clone();
            equipment.manufacturer_id = e.manufacturer_id;
            equipment
        }

        SpanEquipmentEvent::SpanEquipmentPlacedInRouteNetwork(_)
        | SpanEquipmentEvent::SpanEquipmentRemoved(_)
        | SpanEquipmentEvent::SpanEquipmentMergedInto(_) => equipment,
    }
}

fn apply_cut(mut equipment: SpanEquipment, cut: &SpanSegmentsCut) -> SpanEquipment {
    let index = cut.cut_node_of_interest_index;

    if cut.node_of_interest_inserted {
        let at = (index as usize).min(equipment.node_of_interest_ids.len());
        equipment
            .node_of_interest_ids
            .insert(at, cut.cut_node_of_interest_id);
        let at = (index as usize).min(equipment.route_node_ids.len());
        equipment.route_node_ids.insert(at, cut.route_node_id);

        for structure in &mut equipment.span_structures {
            for segment in &mut structure.span_segments {
                if segment.from_node_of_interest_index >= index {
                    segment.from_node_of_interest_index += 1;
                }
                if segment.to_node_of_interest_index >= index {
                    segment.to_node_of_interest_index += 1;
                }
            }
        }
    }

    for info in &cut.cuts {
        for structure in &mut equipment.span_structures {
            let Some(position) = structure
                .span_segments
                .iter()
                .position(|s| s.id == info.old_span_segment_id)
            else {
                continue;
            };
            let old = structure.span_segments[position];
            let first = SpanSegment {
                id: info.new_span_segment_id1,
                from_node_of_interest_index: old.from_node_of_interest_index,
                to_node_of_interest_index: index,
                from_terminal_id: old.from_terminal_id,
                to_terminal_id: None,
            };
            let second = SpanSegment {
                id: info.new_span_segment_id2,
                from_node_of_interest_index: index,
                to_node_of_interest_index: old.to_node_of_interest_index,
                from_terminal_id: None,
                to_terminal_id: old.to_terminal_id,
            };
            structure
                .span_segments
                .splice(position..=position, [first, second]);
            break;
        }
    }

    equipment
}

fn connect_segment_ends(
    mut equipment: SpanEquipment,
    route_node_id: uuid::Uuid,
    connects: &[SpanSegmentToTerminalConnectInfo],
) -> SpanEquipment {
    for info in connects {
        let Some(end) = equipment
            .find_segment(info.segment_id)
            .and_then(|(_, _, segment)| equipment.segment_end_at(segment, route_node_id))
        else {
            continue;
        };
        update_segment(&mut equipment, info.segment_id, |segment| {
            segment.with_terminal(end, Some(info.terminal_id))
        });
    }
    equipment
}

fn update_segment(
    equipment: &mut SpanEquipment,
    segment_id: uuid::Uuid,
    change: impl FnOnce(SpanSegment) -> SpanSegment,
) {
    let Some((structure_index, segment_index, _)) = equipment.find_segment(segment_id) else {
        return;
    };
    let slot = &mut equipment.span_structures[structure_index as usize].span_segments
        [segment_index as usize];
    *slot = change(*slot);
}

/// Segment ends of a span equipment that sit on a route node and carry a
/// terminal
pub fn connected_ends_at(
    equipment: &SpanEquipment,
    route_node_id: uuid::Uuid,
) -> Vec<(uuid::Uuid, SegmentEnd, uuid::Uuid)> {
    equipment
        .segments()
        .filter_map(|(_, _, segment)| {
            let end = equipment.segment_end_at(segment, route_node_id)?;
            segment.terminal_at(end).map(|t| (segment.id, end, t))
        })
        .collect()
}

pub fn apply_terminal_equipment_event(
    state: Option<TerminalEquipment>,
    event: &TerminalEquipmentEvent,
) -> Option<TerminalEquipment> {
    match event {
        TerminalEquipmentEvent::TerminalEquipmentPlacedInNodeContainer(e) => {
            Some(e.terminal_equipment.clone())
        }
        TerminalEquipmentEvent::TerminalEquipmentRemoved(_) => None,
        TerminalEquipmentEvent::AdditionalStructuresAddedToTerminalEquipment(e) => {
            state.map(|mut equipment| {
                equipment
                    .terminal_structures
                    .extend(e.structures_to_add.iter().cloned());
                equipment
            })
        }
        TerminalEquipmentEvent::TerminalStructureRemoved(e) => state.map(|mut equipment| {
            if let Some(structure) = equipment
                .terminal_structures
                .iter_mut()
                .find(|s| s.id == e.terminal_structure_id)
            {
                structure.deleted = true;
            }
            equipment
        }),
        TerminalEquipmentEvent::TerminalEquipmentPropertiesChanged(e) => {
            state.map(|mut equipment| {
                equipment.name = e.name.clone();
                equipment.manufacturer_id = e.manufacturer_id;
                equipment
            })
        }
    }
}

pub fn apply_node_container_event(
    state: Option<NodeContainer>,
    event: &NodeContainerEvent,
) -> Option<NodeContainer> {
    match event {
        NodeContainerEvent::NodeContainerPlacedInRouteNetwork(e) => Some(e.container.clone()),
        NodeContainerEvent::NodeContainerRemoved(_) => None,
        _ => state.map(|container| apply_to_existing_node_container(container, event)),
    }
}

fn apply_to_existing_node_container(
    mut container: NodeContainer,
    event: &NodeContainerEvent,
) -> NodeContainer {
    match event {
        NodeContainerEvent::NodeContainerPropertiesChanged(e) => {
            container.specification_id = e.specification_id;
            container.manufacturer_id = e.manufacturer_id;
        }
        NodeContainerEvent::NodeContainerVerticalContentAlignmentReversed(e) => {
            container.vertical_content_alignment = e.new_alignment;
        }
        NodeContainerEvent::NodeContainerRackAdded(e) => {
            container.racks.push(e.rack.clone());
        }
        NodeContainerEvent::NodeContainerTerminalEquipmentsAdded(e) => {
            container
                .terminal_equipment_reference_ids
                .extend(e.terminal_equipment_ids.iter().copied());
        }
        NodeContainerEvent::NodeContainerTerminalEquipmentsAddedToRack(e) => {
            if let Some(rack) = container.racks.iter_mut().find(|r| r.id == e.rack_id) {
                rack.subrack_placements.extend(e.placements.iter().copied());
            }
        }
        NodeContainerEvent::NodeContainerRackEquipmentMoved(e) => {
            let placement = container
                .racks
                .iter_mut()
                .find(|r| r.id == e.from_rack_id)
                .and_then(|rack| {
                    let position = rack
                        .subrack_placements
                        .iter()
                        .position(|p| p.terminal_equipment_id == e.terminal_equipment_id)?;
                    Some(rack.subrack_placements.remove(position))
                });
            if let (Some(mut placement), Some(rack)) = (
                placement,
                container.racks.iter_mut().find(|r| r.id == e.to_rack_id),
            ) {
                placement.position = e.start_unit;
                rack.subrack_placements.push(placement);
            }
        }
        NodeContainerEvent::NodeContainerTerminalEquipmentReferenceRemoved(e) => {
            container
                .terminal_equipment_reference_ids
                .retain(|id| *id != e.terminal_equipment_id);
            for rack in &mut container.racks {
                rack.subrack_placements
                    .retain(|p| p.terminal_equipment_id != e.terminal_equipment_id);
            }
        }
        NodeContainerEvent::NodeContainerTerminalsConnected(e) => {
            container.terminal_to_terminal_connections.push(e.connection);
        }
        NodeContainerEvent::NodeContainerTerminalsDisconnected(e) => {
            container
                .terminal_to_terminal_connections
                .retain(|c| c.id != e.connection_id);
        }
        NodeContainerEvent::NodeContainerPlacedInRouteNetwork(_)
        | NodeContainerEvent::NodeContainerRemoved(_) => {}
    }
    container
}
