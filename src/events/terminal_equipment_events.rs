//! Terminal equipment events

use super::{aggregate_event_enum, impl_domain_event};
use crate::value_objects::{TerminalEquipment, TerminalStructure};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalEquipmentPlacedInNodeContainer {
    pub terminal_equipment: TerminalEquipment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalStructuresAddedToTerminalEquipment {
    pub terminal_equipment_id: Uuid,
    pub structures_to_add: Vec<TerminalStructure>,
}

/// The structure is kept with its deleted flag set so indices stay stable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalStructureRemoved {
    pub terminal_equipment_id: Uuid,
    pub terminal_structure_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalEquipmentPropertiesChanged {
    pub terminal_equipment_id: Uuid,
    pub name: Option<String>,
    pub manufacturer_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalEquipmentRemoved {
    pub terminal_equipment_id: Uuid,
}

impl_domain_event!(
    TerminalEquipmentPlacedInNodeContainer,
    terminal_equipment.id,
    "utility_network.terminal_equipment.placed.v1"
);
impl_domain_event!(
    AdditionalStructuresAddedToTerminalEquipment,
    terminal_equipment_id,
    "utility_network.terminal_equipment.structures_added.v1"
);
impl_domain_event!(
    TerminalStructureRemoved,
    terminal_equipment_id,
    "utility_network.terminal_equipment.structure_removed.v1"
);
impl_domain_event!(
    TerminalEquipmentPropertiesChanged,
    terminal_equipment_id,
    "utility_network.terminal_equipment.properties_changed.v1"
);
impl_domain_event!(
    TerminalEquipmentRemoved,
    terminal_equipment_id,
    "utility_network.terminal_equipment.removed.v1"
);

aggregate_event_enum!(
    /// Events raised by the terminal equipment aggregate
    TerminalEquipmentEvent {
        TerminalEquipmentPlacedInNodeContainer,
        AdditionalStructuresAddedToTerminalEquipment,
        TerminalStructureRemoved,
        TerminalEquipmentPropertiesChanged,
        TerminalEquipmentRemoved,
    }
);
