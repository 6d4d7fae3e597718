//! Node container events

use super::{aggregate_event_enum, impl_domain_event};
use crate::value_objects::{
    NodeContainer, Rack, SubrackPlacement, TerminalToTerminalConnection, VerticalContentAlignment,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContainerPlacedInRouteNetwork {
    pub container: NodeContainer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContainerPropertiesChanged {
    pub node_container_id: Uuid,
    pub specification_id: Uuid,
    pub manufacturer_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContainerVerticalContentAlignmentReversed {
    pub node_container_id: Uuid,
    pub new_alignment: VerticalContentAlignment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContainerRackAdded {
    pub node_container_id: Uuid,
    pub rack: Rack,
}

/// Terminal equipment placed directly in the container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContainerTerminalEquipmentsAdded {
    pub node_container_id: Uuid,
    pub terminal_equipment_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContainerTerminalEquipmentsAddedToRack {
    pub node_container_id: Uuid,
    pub rack_id: Uuid,
    pub placements: Vec<SubrackPlacement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContainerRackEquipmentMoved {
    pub node_container_id: Uuid,
    pub terminal_equipment_id: Uuid,
    pub from_rack_id: Uuid,
    pub to_rack_id: Uuid,
    pub start_unit: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContainerTerminalEquipmentReferenceRemoved {
    pub node_container_id: Uuid,
    pub terminal_equipment_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContainerTerminalsConnected {
    pub node_container_id: Uuid,
    pub connection: TerminalToTerminalConnection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContainerTerminalsDisconnected {
    pub node_container_id: Uuid,
    pub connection_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContainerRemoved {
    pub node_container_id: Uuid,
}

impl_domain_event!(
    NodeContainerPlacedInRouteNetwork,
    container.id,
    "utility_network.node_container.placed.v1"
);
impl_domain_event!(
    NodeContainerPropertiesChanged,
    node_container_id,
    "utility_network.node_container.properties_changed.v1"
);
impl_domain_event!(
    NodeContainerVerticalContentAlignmentReversed,
    node_container_id,
    "utility_network.node_container.alignment_reversed.v1"
);
impl_domain_event!(
    NodeContainerRackAdded,
    node_container_id,
    "utility_network.node_container.rack_added.v1"
);
impl_domain_event!(
    NodeContainerTerminalEquipmentsAdded,
    node_container_id,
    "utility_network.node_container.terminal_equipment_added.v1"
);
impl_domain_event!(
    NodeContainerTerminalEquipmentsAddedToRack,
    node_container_id,
    "utility_network.node_container.terminal_equipment_added_to_rack.v1"
);
impl_domain_event!(
    NodeContainerRackEquipmentMoved,
    node_container_id,
    "utility_network.node_container.rack_equipment_moved.v1"
);
impl_domain_event!(
    NodeContainerTerminalEquipmentReferenceRemoved,
    node_container_id,
    "utility_network.node_container.terminal_equipment_reference_removed.v1"
);
impl_domain_event!(
    NodeContainerTerminalsConnected,
    node_container_id,
    "utility_network.node_container.terminals_connected.v1"
);
impl_domain_event!(
    NodeContainerTerminalsDisconnected,
    node_container_id,
    "utility_network.node_container.terminals_disconnected.v1"
);
impl_domain_event!(
    NodeContainerRemoved,
    node_container_id,
    "utility_network.node_container.removed.v1"
);

aggregate_event_enum!(
    /// Events raised by the node container aggregate
    NodeContainerEvent {
        NodeContainerPlacedInRouteNetwork,
        NodeContainerPropertiesChanged,
        NodeContainerVerticalContentAlignmentReversed,
        NodeContainerRackAdded,
        NodeContainerTerminalEquipmentsAdded,
        NodeContainerTerminalEquipmentsAddedToRack,
        NodeContainerRackEquipmentMoved,
        NodeContainerTerminalEquipmentReferenceRemoved,
        NodeContainerTerminalsConnected,
        NodeContainerTerminalsDisconnected,
        NodeContainerRemoved,
    }
);
