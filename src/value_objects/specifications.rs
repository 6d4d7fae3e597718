//! Equipment specifications
//!
//! Templates that equipment is instantiated from. Import and export of
//! specifications happens elsewhere; the catalog is an in-memory registry.

use super::TerminalDirection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEquipmentSpecification {
    pub id: Uuid,
    pub category: String,
    pub name: String,
    pub version: String,
    pub root_template: SpanStructureTemplate,
    pub is_fixed: bool,
    pub is_cable: bool,
    pub deprecated: bool,
}

/// Structure template tree: the root is the outer structure, its children the
/// inner ones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanStructureTemplate {
    pub span_structure_specification_id: Uuid,
    pub level: u8,
    pub position: u16,
    pub child_templates: Vec<SpanStructureTemplate>,
}

impl SpanStructureTemplate {
    pub fn leaf(span_structure_specification_id: Uuid, level: u8, position: u16) -> Self {
        Self {
            span_structure_specification_id,
            level,
            position,
            child_templates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalEquipmentSpecification {
    pub id: Uuid,
    pub category: String,
    pub name: String,
    pub short_name: String,
    pub is_rack_equipment: bool,
    pub height_in_rack_units: u16,
    pub structure_templates: Vec<TerminalStructureTemplate>,
    pub deprecated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalStructureTemplate {
    pub terminal_structure_specification_id: Uuid,
    pub position: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalStructureSpecification {
    pub id: Uuid,
    pub category: String,
    pub name: String,
    pub short_name: String,
    pub terminal_templates: Vec<TerminalTemplate>,
    pub deprecated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalTemplate {
    pub name: String,
    pub direction: TerminalDirection,
    pub is_pigtail: bool,
    pub is_splice: bool,
    pub connector_type: Option<String>,
    /// Terminals naming the same group are wired together internally
    pub internal_connectivity_node: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeContainerSpecification {
    pub id: Uuid,
    pub category: String,
    pub name: String,
    pub short_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RackSpecification {
    pub id: Uuid,
    pub name: String,
    pub short_name: String,
}

/// In-memory registry of every specification kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecificationCatalog {
    span_equipment: HashMap<Uuid, SpanEquipmentSpecification>,
    terminal_equipment: HashMap<Uuid, TerminalEquipmentSpecification>,
    terminal_structures: HashMap<Uuid, TerminalStructureSpecification>,
    node_containers: HashMap<Uuid, NodeContainerSpecification>,
    racks: HashMap<Uuid, RackSpecification>,
}

impl SpecificationCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_span_equipment(mut self, spec: SpanEquipmentSpecification) -> Self {
        self.span_equipment.insert(spec.id, spec);
        self
    }

    pub fn with_terminal_equipment(mut self, spec: TerminalEquipmentSpecification) -> Self {
        self.terminal_equipment.insert(spec.id, spec);
        self
    }

    pub fn with_terminal_structure(mut self, spec: TerminalStructureSpecification) -> Self {
        self.terminal_structures.insert(spec.id, spec);
        self
    }

    pub fn with_node_container(mut self, spec: NodeContainerSpecification) -> Self {
        self.node_containers.insert(spec.id, spec);
        self
    }

    pub fn with_rack(mut self, spec: RackSpecification) -> Self {
        self.racks.insert(spec.id, spec);
        self
    }

    pub fn span_equipment(&self, id: Uuid) -> Option<&SpanEquipmentSpecification> {
        self.span_equipment.get(&id)
    }

    pub fn terminal_equipment(&self, id: Uuid) -> Option<&TerminalEquipmentSpecification> {
        self.terminal_equipment.get(&id)
    }

    pub fn terminal_structure(&self, id: Uuid) -> Option<&TerminalStructureSpecification> {
        self.terminal_structures.get(&id)
    }

    pub fn node_container(&self, id: Uuid) -> Option<&NodeContainerSpecification> {
        self.node_containers.get(&id)
    }

    pub fn rack(&self, id: Uuid) -> Option<&RackSpecification> {
        self.racks.get(&id)
    }
}
