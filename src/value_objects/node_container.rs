//! Node container snapshot: wells, cabinets and buildings at a route node

use super::VerticalContentAlignment;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeContainer {
    pub id: Uuid,
    pub route_node_id: Uuid,
    pub interest_id: Uuid,
    pub specification_id: Uuid,
    pub manufacturer_id: Option<Uuid>,
    pub vertical_content_alignment: VerticalContentAlignment,
    pub racks: Vec<Rack>,
    /// Terminal equipment placed directly in the container, outside racks
    pub terminal_equipment_reference_ids: Vec<Uuid>,
    pub terminal_to_terminal_connections: Vec<TerminalToTerminalConnection>,
}

impl NodeContainer {
    pub fn find_rack(&self, rack_id: Uuid) -> Option<&Rack> {
        self.racks.iter().find(|r| r.id == rack_id)
    }

    /// Rack holding a terminal equipment, if it is rack mounted
    pub fn rack_of(&self, terminal_equipment_id: Uuid) -> Option<&Rack> {
        self.racks
            .iter()
            .find(|r| r.placement_of(terminal_equipment_id).is_some())
    }

    pub fn contains_terminal_equipment(&self, terminal_equipment_id: Uuid) -> bool {
        self.terminal_equipment_reference_ids
            .contains(&terminal_equipment_id)
            || self.rack_of(terminal_equipment_id).is_some()
    }

    /// Every terminal equipment in the container, direct ones first
    pub fn all_terminal_equipment_ids(&self) -> Vec<Uuid> {
        self.terminal_equipment_reference_ids
            .iter()
            .copied()
            .chain(
                self.racks
                    .iter()
                    .flat_map(|r| r.subrack_placements.iter().map(|p| p.terminal_equipment_id)),
            )
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.terminal_equipment_reference_ids.is_empty()
            && self.racks.iter().all(|r| r.subrack_placements.is_empty())
    }

    pub fn find_connection(&self, connection_id: Uuid) -> Option<&TerminalToTerminalConnection> {
        self.terminal_to_terminal_connections
            .iter()
            .find(|c| c.id == connection_id)
    }

    pub fn connection_between(
        &self,
        from_terminal_id: Uuid,
        to_terminal_id: Uuid,
    ) -> Option<&TerminalToTerminalConnection> {
        self.terminal_to_terminal_connections
            .iter()
            .find(|c| c.joins(from_terminal_id, to_terminal_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rack {
    pub id: Uuid,
    pub name: String,
    pub position: u16,
    pub specification_id: Uuid,
    pub height_in_units: u16,
    pub subrack_placements: Vec<SubrackPlacement>,
}

impl Rack {
    pub fn placement_of(&self, terminal_equipment_id: Uuid) -> Option<&SubrackPlacement> {
        self.subrack_placements
            .iter()
            .find(|p| p.terminal_equipment_id == terminal_equipment_id)
    }

    /// True when `height` units from `start_unit` lie inside the rack.
    /// Units are numbered from 1 at the bottom.
    pub fn fits(&self, start_unit: u16, height: u16) -> bool {
        start_unit >= 1
            && start_unit
                .checked_add(height.max(1) - 1)
                .is_some_and(|top_unit| top_unit <= self.height_in_units)
    }

    /// True when the unit range overlaps an existing placement
    pub fn is_occupied(&self, start_unit: u16, height: u16, ignore: Option<Uuid>) -> bool {
        let end_unit = u32::from(start_unit) + u32::from(height.max(1));
        self.subrack_placements
            .iter()
            .filter(|p| Some(p.terminal_equipment_id) != ignore)
            .any(|p| {
                let placed_end = u32::from(p.position) + u32::from(p.height_in_units.max(1));
                u32::from(start_unit) < placed_end && u32::from(p.position) < end_unit
            })
    }
}

/// Terminal equipment mounted in a rack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubrackPlacement {
    pub terminal_equipment_id: Uuid,
    /// Lowest rack unit occupied
    pub position: u16,
    pub height_in_units: u16,
}

/// Cross-connect between two terminals in the same container
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerminalToTerminalConnection {
    pub id: Uuid,
    pub from_terminal_id: Uuid,
    pub to_terminal_id: Uuid,
    pub fiber_coord_length: f64,
}

impl TerminalToTerminalConnection {
    pub fn joins(&self, a: Uuid, b: Uuid) -> bool {
        (self.from_terminal_id == a && self.to_terminal_id == b)
            || (self.from_terminal_id == b && self.to_terminal_id == a)
    }

    pub fn touches(&self, terminal_id: Uuid) -> bool {
        self.from_terminal_id == terminal_id || self.to_terminal_id == terminal_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rack_occupancy() {
        let occupant = Uuid::new_v4();
        let rack = Rack {
            id: Uuid::new_v4(),
            name: "Rack 1".into(),
            position: 1,
            specification_id: Uuid::new_v4(),
            height_in_units: 42,
            subrack_placements: vec![SubrackPlacement {
                terminal_equipment_id: occupant,
                position: 10,
                height_in_units: 2,
            }],
        };

        assert!(rack.is_occupied(11, 1, None));
        assert!(rack.is_occupied(9, 2, None));
        assert!(!rack.is_occupied(12, 4, None));
        assert!(!rack.is_occupied(8, 2, None));
        assert!(!rack.is_occupied(10, 2, Some(occupant)));
        assert!(!rack.is_occupied(u16::MAX, u16::MAX, None));
    }

    #[test]
    fn test_rack_bounds() {
        let rack = Rack {
            id: Uuid::new_v4(),
            name: "Rack 1".into(),
            position: 1,
            specification_id: Uuid::new_v4(),
            height_in_units: 42,
            subrack_placements: vec![],
        };

        assert!(rack.fits(1, 1));
        assert!(rack.fits(41, 2));
        assert!(rack.fits(42, 0));
        assert!(!rack.fits(0, 1));
        assert!(!rack.fits(42, 2));
        assert!(!rack.fits(60, 1));
        assert!(!rack.fits(u16::MAX, 2));
    }

    #[test]
    fn test_connection_joins_either_way() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let c = TerminalToTerminalConnection {
            id: Uuid::new_v4(),
            from_terminal_id: a,
            to_terminal_id: b,
            fiber_coord_length: 0.0,
        };
        assert!(c.joins(b, a));
        assert!(c.touches(a));
        assert!(!c.joins(a, a));
    }
}
