//! Span equipment events

use super::{aggregate_event_enum, impl_domain_event};
use crate::value_objects::{
    MarkingInfo, SpanEquipment, SpanEquipmentNodeContainerAffix, SpanStructure, UtilityNetworkHop,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A span equipment was placed along a validated walk of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEquipmentPlacedInRouteNetwork {
    pub span_equipment: SpanEquipment,
}

/// One segment split in two by a cut
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanSegmentCutInfo {
    pub old_span_segment_id: Uuid,
    /// Part before the cut node, keeps the old from-terminal
    pub new_span_segment_id1: Uuid,
    /// Part after the cut node, keeps the old to-terminal
    pub new_span_segment_id2: Uuid,
}

/// Segments were cut at a route node of the walk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanSegmentsCut {
    pub span_equipment_id: Uuid,
    pub route_node_id: Uuid,
    pub cut_node_of_interest_id: Uuid,
    pub cut_node_of_interest_index: u16,
    /// True when the cut created a new node of interest in the walk
    pub node_of_interest_inserted: bool,
    pub cuts: Vec<SpanSegmentCutInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanSegmentToTerminalConnectInfo {
    pub segment_id: Uuid,
    pub terminal_id: Uuid,
}

/// Segment ends were joined through bare terminals at a route node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanSegmentsConnectedToSimpleTerminals {
    pub span_equipment_id: Uuid,
    pub route_node_id: Uuid,
    pub connects: Vec<SpanSegmentToTerminalConnectInfo>,
}

/// Segment ends were connected to terminal equipment terminals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanSegmentsConnectedToTerminals {
    pub span_equipment_id: Uuid,
    pub route_node_id: Uuid,
    pub connects: Vec<SpanSegmentToTerminalConnectInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanSegmentsDisconnectedFromTerminals {
    pub span_equipment_id: Uuid,
    pub disconnects: Vec<SpanSegmentToTerminalConnectInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEquipmentAffixedToParent {
    pub span_equipment_id: Uuid,
    pub hop: UtilityNetworkHop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEquipmentDetachedFromParent {
    pub span_equipment_id: Uuid,
    pub hop: UtilityNetworkHop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEquipmentAffixedToContainer {
    pub span_equipment_id: Uuid,
    pub affix: SpanEquipmentNodeContainerAffix,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEquipmentDetachedFromContainer {
    pub span_equipment_id: Uuid,
    pub node_container_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalStructuresAddedToSpanEquipment {
    pub span_equipment_id: Uuid,
    pub span_structures_to_add: Vec<SpanStructure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanStructureRemoved {
    pub span_equipment_id: Uuid,
    pub span_structure_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEquipmentRemoved {
    pub span_equipment_id: Uuid,
}

/// Another span equipment was merged into this one at a common end node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEquipmentMerged {
    pub span_equipment_id: Uuid,
    pub merged_span_equipment_id: Uuid,
    pub walk_of_interest_id: Uuid,
    pub node_of_interest_ids: Vec<Uuid>,
    pub route_node_ids: Vec<Uuid>,
    pub span_structures: Vec<SpanStructure>,
}

/// This span equipment ceased to exist because it was merged into another.
/// Its segments live on in the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEquipmentMergedInto {
    pub span_equipment_id: Uuid,
    pub target_span_equipment_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEquipmentPropertiesUpdated {
    pub span_equipment_id: Uuid,
    pub specification_id: Uuid,
    /// Structure specification per structure index
    pub structure_specification_ids: Vec<Uuid>,
    pub name: Option<String>,
    pub marking_info: Option<MarkingInfo>,
    pub manufacturer_id: Option<Uuid>,
}

impl_domain_event!(
    SpanEquipmentPlacedInRouteNetwork,
    span_equipment.id,
    "utility_network.span_equipment.placed.v1"
);
impl_domain_event!(
    SpanSegmentsCut,
    span_equipment_id,
    "utility_network.span_equipment.segments_cut.v1"
);
impl_domain_event!(
    SpanSegmentsConnectedToSimpleTerminals,
    span_equipment_id,
    "utility_network.span_equipment.connected_to_simple_terminals.v1"
);
impl_domain_event!(
    SpanSegmentsConnectedToTerminals,
    span_equipment_id,
    "utility_network.span_equipment.connected_to_terminals.v1"
);
impl_domain_event!(
    SpanSegmentsDisconnectedFromTerminals,
    span_equipment_id,
    "utility_network.span_equipment.disconnected_from_terminals.v1"
);
impl_domain_event!(
    SpanEquipmentAffixedToParent,
    span_equipment_id,
    "utility_network.span_equipment.affixed_to_parent.v1"
);
impl_domain_event!(
    SpanEquipmentDetachedFromParent,
    span_equipment_id,
    "utility_network.span_equipment.detached_from_parent.v1"
);
impl_domain_event!(
    SpanEquipmentAffixedToContainer,
    span_equipment_id,
    "utility_network.span_equipment.affixed_to_container.v1"
);
impl_domain_event!(
    SpanEquipmentDetachedFromContainer,
    span_equipment_id,
    "utility_network.span_equipment.detached_from_container.v1"
);
impl_domain_event!(
    AdditionalStructuresAddedToSpanEquipment,
    span_equipment_id,
    "utility_network.span_equipment.structures_added.v1"
);
impl_domain_event!(
    SpanStructureRemoved,
    span_equipment_id,
    "utility_network.span_equipment.structure_removed.v1"
);
impl_domain_event!(
    SpanEquipmentRemoved,
    span_equipment_id,
    "utility_network.span_equipment.removed.v1"
);
impl_domain_event!(
    SpanEquipmentMerged,
    span_equipment_id,
    "utility_network.span_equipment.merged.v1"
);
impl_domain_event!(
    SpanEquipmentMergedInto,
    span_equipment_id,
    "utility_network.span_equipment.merged_into.v1"
);
impl_domain_event!(
    SpanEquipmentPropertiesUpdated,
    span_equipment_id,
    "utility_network.span_equipment.properties_updated.v1"
);

aggregate_event_enum!(
    /// Events raised by the span equipment aggregate
    SpanEquipmentEvent {
        SpanEquipmentPlacedInRouteNetwork,
        SpanSegmentsCut,
        SpanSegmentsConnectedToSimpleTerminals,
        SpanSegmentsConnectedToTerminals,
        SpanSegmentsDisconnectedFromTerminals,
        SpanEquipmentAffixedToParent,
        SpanEquipmentDetachedFromParent,
        SpanEquipmentAffixedToContainer,
        SpanEquipmentDetachedFromContainer,
        AdditionalStructuresAddedToSpanEquipment,
        SpanStructureRemoved,
        SpanEquipmentRemoved,
        SpanEquipmentMerged,
        SpanEquipmentMergedInto,
        SpanEquipmentPropertiesUpdated,
    }
);
