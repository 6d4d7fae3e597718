//! Terminal equipment snapshot: closures, trays, patch panels, splitters

use super::TerminalDirection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable snapshot of one terminal equipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalEquipment {
    pub id: Uuid,
    pub specification_id: Uuid,
    pub node_container_id: Uuid,
    /// Route node of the owning node container
    pub route_node_id: Uuid,
    pub name: Option<String>,
    pub manufacturer_id: Option<Uuid>,
    pub terminal_structures: Vec<TerminalStructure>,
}

impl TerminalEquipment {
    /// Locate a terminal as `(structure_index, terminal_index, terminal)`
    pub fn find_terminal(&self, terminal_id: Uuid) -> Option<(u16, u16, &Terminal)> {
        self.terminal_structures
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.deleted)
            .find_map(|(structure_index, structure)| {
                structure
                    .terminals
                    .iter()
                    .position(|t| t.id == terminal_id)
                    .map(|i| (structure_index as u16, i as u16, &structure.terminals[i]))
            })
    }

    pub fn active_structures(&self) -> impl Iterator<Item = (u16, &TerminalStructure)> {
        self.terminal_structures
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.deleted)
            .map(|(i, s)| (i as u16, s))
    }

    /// Terminal ids of every structure that is not deleted
    pub fn terminal_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.active_structures()
            .flat_map(|(_, s)| s.terminals.iter().map(|t| t.id))
    }

    pub fn is_position_taken(&self, position: u16) -> bool {
        self.active_structures().any(|(_, s)| s.position == position)
    }

    /// Position after the highest active structure. `None` once the
    /// highest position is taken.
    pub fn next_free_position(&self) -> Option<u16> {
        match self.active_structures().map(|(_, s)| s.position).max() {
            Some(highest) => highest.checked_add(1),
            None => Some(1),
        }
    }
}

/// A card or tray of a terminal equipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalStructure {
    pub id: Uuid,
    pub specification_id: Uuid,
    pub position: u16,
    #[serde(rename = "name")]
    pub explicit_name: Option<String>,
    pub deleted: bool,
    pub terminals: Vec<Terminal>,
}

impl TerminalStructure {
    /// Display name, the position when no name was given
    pub fn name(&self) -> String {
        match &self.explicit_name {
            Some(name) => name.clone(),
            None => self.position.to_string(),
        }
    }
}

/// One connection point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminal {
    pub id: Uuid,
    pub name: String,
    pub direction: TerminalDirection,
    pub is_pigtail: bool,
    pub is_splice: bool,
    pub connector_type: Option<String>,
    /// Terminals of the same structure sharing this id are wired together
    /// inside the equipment
    pub internal_connectivity_node_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structure(position: u16, name: Option<&str>) -> TerminalStructure {
        TerminalStructure {
            id: Uuid::new_v4(),
            specification_id: Uuid::new_v4(),
            position,
            explicit_name: name.map(str::to_string),
            deleted: false,
            terminals: vec![Terminal {
                id: Uuid::new_v4(),
                name: "1".into(),
                direction: TerminalDirection::Bi,
                is_pigtail: false,
                is_splice: true,
                connector_type: None,
                internal_connectivity_node_id: None,
            }],
        }
    }

    #[test]
    fn test_structure_name_falls_back_to_position() {
        assert_eq!(structure(4, None).name(), "4");
        assert_eq!(structure(4, Some("Tray A")).name(), "Tray A");
    }

    #[test]
    fn test_deleted_structures_are_skipped() {
        let mut removed = structure(1, None);
        removed.deleted = true;
        let kept = structure(2, None);
        let terminal_id = removed.terminals[0].id;

        let equipment = TerminalEquipment {
            id: Uuid::new_v4(),
            specification_id: Uuid::new_v4(),
            node_container_id: Uuid::new_v4(),
            route_node_id: Uuid::new_v4(),
            name: None,
            manufacturer_id: None,
            terminal_structures: vec![removed, kept],
        };

        assert!(equipment.find_terminal(terminal_id).is_none());
        assert_eq!(equipment.terminal_ids().count(), 1);
        assert!(!equipment.is_position_taken(1));
        assert_eq!(equipment.next_free_position(), Some(3));
    }
}
