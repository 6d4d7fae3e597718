//! Terminal Equipment Aggregate
//!
//! Closures, trays, patch panels and splitters inside a node container.
//! Structures are instantiated from terminal structure specifications;
//! terminals naming the same internal connectivity group share a hub node
//! in the utility graph.

use super::{AggregateRoot, AggregateState, EventSourcedAggregate};
use crate::commands::{
    TerminalEquipmentErrorCode as Code, UtilityNetworkCommandError, UtilityNetworkCommandResult,
};
use crate::domain_events::UtilityNetworkEvent;
use crate::events::*;
use crate::graph::UtilityGraph;
use crate::projections::snapshot_functions::apply_terminal_equipment_event;
use crate::value_objects::{
    SpecificationCatalog, Terminal, TerminalEquipment, TerminalEquipmentSpecification,
    TerminalStructure, TerminalStructureSpecification,
};
use std::collections::HashMap;
use uuid::Uuid;

fn error(code: Code, message: impl Into<String>) -> UtilityNetworkCommandError {
    UtilityNetworkCommandError::terminal_equipment(code, message)
}

/// Instantiate a terminal structure from its specification
pub fn build_terminal_structure(
    specification: &TerminalStructureSpecification,
    position: u16,
    name: Option<String>,
) -> TerminalStructure {
    let mut connectivity_nodes: HashMap<&str, Uuid> = HashMap::new();

    let terminals = specification
        .terminal_templates
        .iter()
        .map(|template| Terminal {
            id: Uuid::new_v4(),
            name: template.name.clone(),
            direction: template.direction,
            is_pigtail: template.is_pigtail,
            is_splice: template.is_splice,
            connector_type: template.connector_type.clone(),
            internal_connectivity_node_id: template
                .internal_connectivity_node
                .as_deref()
                .map(|group| *connectivity_nodes.entry(group).or_insert_with(Uuid::new_v4)),
        })
        .collect();

    TerminalStructure {
        id: Uuid::new_v4(),
        specification_id: specification.id,
        position,
        explicit_name: name,
        deleted: false,
        terminals,
    }
}

fn usable_structure_specification(
    specification: &TerminalStructureSpecification,
) -> UtilityNetworkCommandResult<()> {
    if specification.deprecated {
        return Err(error(
            Code::InvalidTerminalStructureSpecification,
            format!("Terminal structure specification {} is deprecated", specification.id),
        ));
    }
    Ok(())
}

/// Terminal equipment aggregate
#[derive(Debug, Clone)]
pub struct TerminalEquipmentAggregate {
    state: AggregateState<TerminalEquipment, TerminalEquipmentEvent>,
}

impl TerminalEquipmentAggregate {
    pub fn snapshot(&self) -> Option<&TerminalEquipment> {
        self.state.snapshot.as_ref()
    }

    fn require(&self) -> UtilityNetworkCommandResult<&TerminalEquipment> {
        self.state.snapshot.as_ref().ok_or_else(|| {
            error(
                Code::TerminalEquipmentNotFound,
                format!("Terminal equipment {} not found", self.state.id),
            )
        })
    }

    fn raise(&mut self, event: impl Into<TerminalEquipmentEvent>) {
        let event = event.into();
        self.state.snapshot = apply_terminal_equipment_event(self.state.snapshot.take(), &event);
        self.state.uncommitted.push(event);
    }

    pub fn place(
        &mut self,
        specification: &TerminalEquipmentSpecification,
        catalog: &SpecificationCatalog,
        node_container_id: Uuid,
        route_node_id: Uuid,
        name: Option<String>,
        manufacturer_id: Option<Uuid>,
    ) -> UtilityNetworkCommandResult<()> {
        if self.state.snapshot.is_some() || self.state.version > 0 {
            return Err(error(
                Code::TerminalEquipmentAlreadyExists,
                format!("Terminal equipment {} already exists", self.state.id),
            ));
        }
        if specification.deprecated {
            return Err(error(
                Code::InvalidTerminalEquipmentSpecification,
                format!("Terminal equipment specification {} is deprecated", specification.id),
            ));
        }

        let mut terminal_structures = Vec::with_capacity(specification.structure_templates.len());
        for template in &specification.structure_templates {
            let structure_spec = catalog
                .terminal_structure(template.terminal_structure_specification_id)
                .ok_or_else(|| {
                    error(
                        Code::InvalidTerminalStructureSpecification,
                        format!(
                            "Terminal structure specification {} not found",
                            template.terminal_structure_specification_id
                        ),
                    )
                })?;
            usable_structure_specification(structure_spec)?;
            terminal_structures.push(build_terminal_structure(structure_spec, template.position, None));
        }

        self.raise(TerminalEquipmentPlacedInNodeContainer {
            terminal_equipment: TerminalEquipment {
                id: self.state.id,
                specification_id: specification.id,
                node_container_id,
                route_node_id,
                name,
                manufacturer_id,
                terminal_structures,
            },
        });
        Ok(())
    }

    /// Append structures after the highest occupied position
    pub fn add_structures(
        &mut self,
        specification: &TerminalStructureSpecification,
        number_of_structures: u16,
    ) -> UtilityNetworkCommandResult<()> {
        let equipment = self.require()?;
        if number_of_structures == 0 {
            return Err(error(
                Code::InvalidNumberOfStructures,
                "Number of structures must be at least one",
            ));
        }
        usable_structure_specification(specification)?;

        let positions = equipment
            .next_free_position()
            .and_then(|first| Some(first..=first.checked_add(number_of_structures - 1)?))
            .ok_or_else(|| {
                error(
                    Code::InvalidNumberOfStructures,
                    format!(
                        "Terminal equipment {} has no room for {number_of_structures} more structures",
                        equipment.id
                    ),
                )
            })?;
        let structures_to_add = positions
            .map(|position| build_terminal_structure(specification, position, None))
            .collect();

        let terminal_equipment_id = equipment.id;
        self.raise(AdditionalStructuresAddedToTerminalEquipment {
            terminal_equipment_id,
            structures_to_add,
        });
        Ok(())
    }

    /// Place one structure at an explicit position
    pub fn add_structure(
        &mut self,
        specification: &TerminalStructureSpecification,
        position: u16,
        name: Option<String>,
    ) -> UtilityNetworkCommandResult<()> {
        let equipment = self.require()?;
        if equipment.is_position_taken(position) {
            return Err(error(
                Code::TerminalStructurePositionAlreadyTaken,
                format!("Position {position} of terminal equipment {} is taken", equipment.id),
            ));
        }
        usable_structure_specification(specification)?;

        let terminal_equipment_id = equipment.id;
        self.raise(AdditionalStructuresAddedToTerminalEquipment {
            terminal_equipment_id,
            structures_to_add: vec![build_terminal_structure(specification, position, name)],
        });
        Ok(())
    }

    /// Remove a structure whose terminals carry no segment or cross-connect
    pub fn remove_structure(
        &mut self,
        terminal_structure_id: Uuid,
        graph: &UtilityGraph,
    ) -> UtilityNetworkCommandResult<()> {
        let equipment = self.require()?;
        let structure = equipment
            .active_structures()
            .map(|(_, s)| s)
            .find(|s| s.id == terminal_structure_id)
            .ok_or_else(|| {
                error(
                    Code::TerminalStructureNotFound,
                    format!(
                        "Terminal structure {terminal_structure_id} not found in terminal equipment {}",
                        equipment.id
                    ),
                )
            })?;

        if structure
            .terminals
            .iter()
            .any(|t| graph.terminal_has_connections(t.id))
        {
            return Err(error(
                Code::CannotRemoveTerminalStructureWithConnectedTerminals,
                format!("Terminal structure {terminal_structure_id} has connected terminals"),
            ));
        }

        let terminal_equipment_id = equipment.id;
        self.raise(TerminalStructureRemoved {
            terminal_equipment_id,
            terminal_structure_id,
        });
        Ok(())
    }

    /// `None` keeps the current value
    pub fn change_properties(
        &mut self,
        name: Option<String>,
        manufacturer_id: Option<Uuid>,
    ) -> UtilityNetworkCommandResult<()> {
        let equipment = self.require()?;
        let name = name.or_else(|| equipment.name.clone());
        let manufacturer_id = manufacturer_id.or(equipment.manufacturer_id);

        if name == equipment.name && manufacturer_id == equipment.manufacturer_id {
            return Err(error(
                Code::NoChange,
                format!("No properties of terminal equipment {} changed", equipment.id),
            ));
        }

        let terminal_equipment_id = equipment.id;
        self.raise(TerminalEquipmentPropertiesChanged {
            terminal_equipment_id,
            name,
            manufacturer_id,
        });
        Ok(())
    }

    pub fn remove(&mut self, graph: &UtilityGraph) -> UtilityNetworkCommandResult<()> {
        let equipment = self.require()?;
        if equipment
            .terminal_ids()
            .any(|terminal_id| graph.terminal_has_connections(terminal_id))
        {
            return Err(error(
                Code::CannotRemoveTerminalEquipmentWithConnectedTerminals,
                format!("Terminal equipment {} has connected terminals", equipment.id),
            ));
        }

        let terminal_equipment_id = equipment.id;
        self.raise(TerminalEquipmentRemoved {
            terminal_equipment_id,
        });
        Ok(())
    }
}

impl AggregateRoot for TerminalEquipmentAggregate {
    fn id(&self) -> Uuid {
        self.state.id
    }

    fn version(&self) -> u64 {
        self.state.version
    }
}

impl EventSourcedAggregate for TerminalEquipmentAggregate {
    type Event = TerminalEquipmentEvent;

    fn empty(id: Uuid) -> Self {
        Self {
            state: AggregateState::new(id),
        }
    }

    fn apply(&mut self, event: &TerminalEquipmentEvent) {
        self.state.snapshot = apply_terminal_equipment_event(self.state.snapshot.take(), event);
        self.state.version += 1;
    }

    fn extract(event: &UtilityNetworkEvent) -> Option<&TerminalEquipmentEvent> {
        match event {
            UtilityNetworkEvent::TerminalEquipment(e) => Some(e),
            _ => None,
        }
    }

    fn uncommitted_events(&self) -> &[TerminalEquipmentEvent] {
        &self.state.uncommitted
    }

    fn mark_committed(&mut self, version: u64) -> Vec<TerminalEquipmentEvent> {
        self.state.mark_committed(version)
    }
}
