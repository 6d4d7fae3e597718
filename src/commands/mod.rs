//! Utility network commands
//!
//! Commands represent intent to change the utility network. They are processed
//! by [`crate::handlers::UtilityNetworkCommandHandler`], which validates them
//! against the equipment aggregates and the utility graph before any event is
//! stored.

pub mod errors;

pub use errors::*;

use crate::value_objects::{MarkingInfo, NodeContainerSide};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Segment to terminal pairing used by connect and disconnect commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanSegmentTerminalPair {
    pub span_segment_id: Uuid,
    pub terminal_id: Uuid,
}

/// Where rack mounted terminal equipment goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubrackPlacementInfo {
    pub rack_id: Uuid,
    /// Lowest unit of the first equipment, following ones stack upwards
    pub start_unit_position: u16,
}

/// Commands for utility network operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UtilityNetworkCommand {
    /// Place a span equipment along a walk of route segments
    PlaceSpanEquipmentInRouteNetwork {
        span_equipment_id: Uuid,
        specification_id: Uuid,
        /// Route segment ids forming the walk
        walk: Vec<Uuid>,
        name: Option<String>,
        marking_info: Option<MarkingInfo>,
        manufacturer_id: Option<Uuid>,
    },

    /// Split span segments in two at a route node
    CutSpanSegmentsAtRouteNode {
        route_node_id: Uuid,
        span_segment_ids: Vec<Uuid>,
    },

    /// Join span segment ends pairwise at a route node. Segments of two span
    /// equipment are paired in order, segments of one span equipment are
    /// paired consecutively.
    ConnectSpanSegmentsAtRouteNode {
        route_node_id: Uuid,
        span_segment_ids: Vec<Uuid>,
    },

    /// Join a range of structures of two span equipment at a route node
    ConnectSpanSegmentsByIndexAtRouteNode {
        route_node_id: Uuid,
        from_span_equipment_id: Uuid,
        to_span_equipment_id: Uuid,
        from_structure_index: u16,
        to_structure_index: u16,
        number_of_units: u16,
    },

    /// Connect span segment ends to terminal equipment terminals
    ConnectSpanSegmentsWithTerminalsAtRouteNode {
        route_node_id: Uuid,
        connects: Vec<SpanSegmentTerminalPair>,
    },

    /// Undo a segment to segment join at a route node
    DisconnectSpanSegmentsAtRouteNode {
        route_node_id: Uuid,
        span_segment_ids: Vec<Uuid>,
    },

    /// Detach span segment ends from specific terminals
    DisconnectSpanSegmentsFromTerminals {
        disconnects: Vec<SpanSegmentTerminalPair>,
    },

    /// Route a span equipment through a chain of parent span segments
    AffixSpanEquipmentToParent {
        span_equipment_id: Uuid,
        parent_span_segment_ids: Vec<Uuid>,
    },

    /// Remove the hop that routes through the given parent segment
    DetachSpanEquipmentFromParent {
        span_equipment_id: Uuid,
        parent_span_segment_id: Uuid,
    },

    AffixSpanEquipmentToNodeContainer {
        span_equipment_id: Uuid,
        node_container_id: Uuid,
        ingoing_side: NodeContainerSide,
    },

    DetachSpanEquipmentFromNodeContainer {
        span_equipment_id: Uuid,
        node_container_id: Uuid,
    },

    /// Add inner structures, one per structure specification
    PlaceAdditionalStructuresInSpanEquipment {
        span_equipment_id: Uuid,
        structure_specification_ids: Vec<Uuid>,
    },

    /// Remove the structure owning a segment. Removing the outer structure
    /// removes the whole span equipment.
    RemoveSpanStructureFromSpanEquipment { span_segment_id: Uuid },

    /// Merge the second span equipment into the first at a common end node
    MergeSpanEquipment {
        route_node_id: Uuid,
        span_equipment_id: Uuid,
        merge_span_equipment_id: Uuid,
    },

    /// `None` leaves a property untouched
    UpdateSpanEquipmentProperties {
        span_equipment_id: Uuid,
        specification_id: Option<Uuid>,
        name: Option<String>,
        marking_info: Option<MarkingInfo>,
        manufacturer_id: Option<Uuid>,
    },

    PlaceNodeContainerInRouteNetwork {
        node_container_id: Uuid,
        specification_id: Uuid,
        route_node_id: Uuid,
        manufacturer_id: Option<Uuid>,
    },

    UpdateNodeContainerProperties {
        node_container_id: Uuid,
        specification_id: Option<Uuid>,
        manufacturer_id: Option<Uuid>,
    },

    ReverseNodeContainerVerticalContentAlignment { node_container_id: Uuid },

    PlaceRackInNodeContainer {
        node_container_id: Uuid,
        rack_id: Uuid,
        specification_id: Uuid,
        name: String,
        height_in_units: u16,
    },

    /// Place one or more terminal equipment, in a rack or directly
    PlaceTerminalEquipmentInNodeContainer {
        node_container_id: Uuid,
        /// Id of the first equipment, further ones get fresh ids
        terminal_equipment_id: Uuid,
        specification_id: Uuid,
        number_of_equipment: u16,
        /// Name of a single equipment, or the prefix of a numbered series
        name: Option<String>,
        manufacturer_id: Option<Uuid>,
        subrack_placement: Option<SubrackPlacementInfo>,
    },

    /// Move rack mounted terminal equipment to another rack position
    ArrangeRackEquipmentInNodeContainer {
        node_container_id: Uuid,
        terminal_equipment_id: Uuid,
        to_rack_id: Uuid,
        to_start_unit: u16,
    },

    /// Append structures after the last occupied position
    PlaceAdditionalStructuresInTerminalEquipment {
        terminal_equipment_id: Uuid,
        structure_specification_id: Uuid,
        number_of_structures: u16,
    },

    /// Place one structure at an explicit position
    PlaceAdditionalStructureInTerminalEquipment {
        terminal_equipment_id: Uuid,
        structure_specification_id: Uuid,
        position: u16,
        name: Option<String>,
    },

    RemoveTerminalStructureFromTerminalEquipment {
        terminal_equipment_id: Uuid,
        terminal_structure_id: Uuid,
    },

    UpdateTerminalEquipmentProperties {
        terminal_equipment_id: Uuid,
        name: Option<String>,
        manufacturer_id: Option<Uuid>,
    },

    RemoveTerminalEquipment { terminal_equipment_id: Uuid },

    /// Cross-connect two terminals inside the node container at a route node
    ConnectTerminalsAtRouteNode {
        route_node_id: Uuid,
        from_terminal_id: Uuid,
        to_terminal_id: Uuid,
        fiber_coord_length: f64,
    },

    DisconnectTerminalsAtRouteNode {
        route_node_id: Uuid,
        from_terminal_id: Uuid,
        to_terminal_id: Uuid,
    },

    RemoveNodeContainerFromRouteNetwork { node_container_id: Uuid },
}

impl UtilityNetworkCommand {
    /// Name of the command, for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlaceSpanEquipmentInRouteNetwork { .. } => "PlaceSpanEquipmentInRouteNetwork",
            Self::CutSpanSegmentsAtRouteNode { .. } => "CutSpanSegmentsAtRouteNode",
            Self::ConnectSpanSegmentsAtRouteNode { .. } => "ConnectSpanSegmentsAtRouteNode",
            Self::ConnectSpanSegmentsByIndexAtRouteNode { .. } => {
                "ConnectSpanSegmentsByIndexAtRouteNode"
            }
            Self::ConnectSpanSegmentsWithTerminalsAtRouteNode { .. } => {
                "ConnectSpanSegmentsWithTerminalsAtRouteNode"
            }
            Self::DisconnectSpanSegmentsAtRouteNode { .. } => "DisconnectSpanSegmentsAtRouteNode",
            Self::DisconnectSpanSegmentsFromTerminals { .. } => {
                "DisconnectSpanSegmentsFromTerminals"
            }
            Self::AffixSpanEquipmentToParent { .. } => "AffixSpanEquipmentToParent",
            Self::DetachSpanEquipmentFromParent { .. } => "DetachSpanEquipmentFromParent",
            Self::AffixSpanEquipmentToNodeContainer { .. } => "AffixSpanEquipmentToNodeContainer",
            Self::DetachSpanEquipmentFromNodeContainer { .. } => {
                "DetachSpanEquipmentFromNodeContainer"
            }
            Self::PlaceAdditionalStructuresInSpanEquipment { .. } => {
                "PlaceAdditionalStructuresInSpanEquipment"
            }
            Self::RemoveSpanStructureFromSpanEquipment { .. } => {
                "RemoveSpanStructureFromSpanEquipment"
            }
            Self::MergeSpanEquipment { .. } => "MergeSpanEquipment",
            Self::UpdateSpanEquipmentProperties { .. } => "UpdateSpanEquipmentProperties",
            Self::PlaceNodeContainerInRouteNetwork { .. } => "PlaceNodeContainerInRouteNetwork",
            Self::UpdateNodeContainerProperties { .. } => "UpdateNodeContainerProperties",
            Self::ReverseNodeContainerVerticalContentAlignment { .. } => {
                "ReverseNodeContainerVerticalContentAlignment"
            }
            Self::PlaceRackInNodeContainer { .. } => "PlaceRackInNodeContainer",
            Self::PlaceTerminalEquipmentInNodeContainer { .. } => {
                "PlaceTerminalEquipmentInNodeContainer"
            }
            Self::ArrangeRackEquipmentInNodeContainer { .. } => {
                "ArrangeRackEquipmentInNodeContainer"
            }
            Self::PlaceAdditionalStructuresInTerminalEquipment { .. } => {
                "PlaceAdditionalStructuresInTerminalEquipment"
            }
            Self::PlaceAdditionalStructureInTerminalEquipment { .. } => {
                "PlaceAdditionalStructureInTerminalEquipment"
            }
            Self::RemoveTerminalStructureFromTerminalEquipment { .. } => {
                "RemoveTerminalStructureFromTerminalEquipment"
            }
            Self::UpdateTerminalEquipmentProperties { .. } => "UpdateTerminalEquipmentProperties",
            Self::RemoveTerminalEquipment { .. } => "RemoveTerminalEquipment",
            Self::ConnectTerminalsAtRouteNode { .. } => "ConnectTerminalsAtRouteNode",
            Self::DisconnectTerminalsAtRouteNode { .. } => "DisconnectTerminalsAtRouteNode",
            Self::RemoveNodeContainerFromRouteNetwork { .. } => {
                "RemoveNodeContainerFromRouteNetwork"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serialization() {
        let command = UtilityNetworkCommand::CutSpanSegmentsAtRouteNode {
            route_node_id: Uuid::new_v4(),
            span_segment_ids: vec![Uuid::new_v4()],
        };

        let json = serde_json::to_string(&command).unwrap();
        let back: UtilityNetworkCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, command);
        assert_eq!(back.name(), "CutSpanSegmentsAtRouteNode");
    }
}
