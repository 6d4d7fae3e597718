//! Utility graph elements
//!
//! Every span segment and terminal known to the utility network is registered
//! in the graph index as one of these variants. Connected variants are also
//! members of the versioned graph, disconnected ones are index-only
//! placeholders that keep unused structure cheap.

use crate::value_objects::TerminalDirection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A span segment wired into the graph as an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UtilityGraphConnectedSegment {
    /// Span segment id
    pub id: Uuid,
    /// Owning span equipment
    pub span_equipment_id: Uuid,
    /// Index of the span structure within the span equipment
    pub structure_index: u16,
    /// Index of the segment within the span structure
    pub segment_index: u16,
}

impl UtilityGraphConnectedSegment {
    /// Demote to the index-only representation
    pub fn disconnect(&self) -> UtilityGraphDisconnectedSegment {
        UtilityGraphDisconnectedSegment {
            id: self.id,
            span_equipment_id: self.span_equipment_id,
            structure_index: self.structure_index,
            segment_index: self.segment_index,
        }
    }
}

/// A span segment not yet wired into the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UtilityGraphDisconnectedSegment {
    pub id: Uuid,
    pub span_equipment_id: Uuid,
    pub structure_index: u16,
    pub segment_index: u16,
}

impl UtilityGraphDisconnectedSegment {
    /// Promote to a graph edge representation
    pub fn connect(&self) -> UtilityGraphConnectedSegment {
        UtilityGraphConnectedSegment {
            id: self.id,
            span_equipment_id: self.span_equipment_id,
            structure_index: self.structure_index,
            segment_index: self.segment_index,
        }
    }
}

/// A terminal wired into the graph as a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UtilityGraphConnectedTerminal {
    /// Terminal id (nil for a synthesized trace end)
    pub id: Uuid,
    /// Route node the terminal sits in
    pub route_node_id: Uuid,
    /// Owning terminal equipment, nil for a simple terminal
    pub terminal_equipment_id: Uuid,
    pub structure_index: u16,
    pub terminal_index: u16,
    pub direction: TerminalDirection,
}

impl UtilityGraphConnectedTerminal {
    /// A bare terminal with no owning equipment, used where span segments are
    /// joined directly at a route node.
    pub fn simple(id: Uuid, route_node_id: Uuid) -> Self {
        Self {
            id,
            route_node_id,
            terminal_equipment_id: Uuid::nil(),
            structure_index: 0,
            terminal_index: 0,
            direction: TerminalDirection::Bi,
        }
    }

    /// Placeholder terminating a trace at a dangling segment end
    pub fn dummy() -> Self {
        Self::simple(Uuid::nil(), Uuid::nil())
    }

    /// True when the terminal is not owned by any terminal equipment
    pub fn is_simple_terminal(&self) -> bool {
        self.terminal_equipment_id.is_nil()
    }

    /// True for a synthesized trace end
    pub fn is_dummy(&self) -> bool {
        self.id.is_nil()
    }

    pub fn disconnect(&self) -> UtilityGraphDisconnectedTerminal {
        UtilityGraphDisconnectedTerminal {
            id: self.id,
            route_node_id: self.route_node_id,
            terminal_equipment_id: self.terminal_equipment_id,
            structure_index: self.structure_index,
            terminal_index: self.terminal_index,
            direction: self.direction,
        }
    }
}

/// A terminal not yet wired into the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UtilityGraphDisconnectedTerminal {
    pub id: Uuid,
    pub route_node_id: Uuid,
    pub terminal_equipment_id: Uuid,
    pub structure_index: u16,
    pub terminal_index: u16,
    pub direction: TerminalDirection,
}

impl UtilityGraphDisconnectedTerminal {
    pub fn connect(&self) -> UtilityGraphConnectedTerminal {
        UtilityGraphConnectedTerminal {
            id: self.id,
            route_node_id: self.route_node_id,
            terminal_equipment_id: self.terminal_equipment_id,
            structure_index: self.structure_index,
            terminal_index: self.terminal_index,
            direction: self.direction,
        }
    }
}

/// Hub node joining the terminals of one internal connectivity group,
/// e.g. the input and outputs of a splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UtilityGraphInternalEquipmentConnectivityNode {
    pub id: Uuid,
    pub terminal_equipment_id: Uuid,
    pub route_node_id: Uuid,
    pub structure_index: u16,
}

/// Same-equipment wiring between a terminal and its connectivity hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UtilityGraphInternalEquipmentConnectivityLink {
    pub id: Uuid,
    pub terminal_equipment_id: Uuid,
    pub route_node_id: Uuid,
    pub structure_index: u16,
}

/// Cross-connect between two terminals at a route node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilityGraphTerminalToTerminalConnectivityLink {
    pub id: Uuid,
    pub route_node_id: Uuid,
    /// Cumulative fiber coordinate length, used for length budgeting only
    pub fiber_coord_length: f64,
}

/// Closed set of elements held by the graph index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum UtilityGraphElement {
    ConnectedSegment(UtilityGraphConnectedSegment),
    DisconnectedSegment(UtilityGraphDisconnectedSegment),
    ConnectedTerminal(UtilityGraphConnectedTerminal),
    DisconnectedTerminal(UtilityGraphDisconnectedTerminal),
    InternalEquipmentConnectivityNode(UtilityGraphInternalEquipmentConnectivityNode),
    InternalEquipmentConnectivityLink(UtilityGraphInternalEquipmentConnectivityLink),
    TerminalToTerminalConnectivityLink(UtilityGraphTerminalToTerminalConnectivityLink),
}

impl UtilityGraphElement {
    /// Stable id of the element
    pub fn id(&self) -> Uuid {
        match self {
            Self::ConnectedSegment(e) => e.id,
            Self::DisconnectedSegment(e) => e.id,
            Self::ConnectedTerminal(e) => e.id,
            Self::DisconnectedTerminal(e) => e.id,
            Self::InternalEquipmentConnectivityNode(e) => e.id,
            Self::InternalEquipmentConnectivityLink(e) => e.id,
            Self::TerminalToTerminalConnectivityLink(e) => e.id,
        }
    }

    /// Whether the element is a member of the versioned graph
    pub fn is_connected(&self) -> bool {
        !matches!(
            self,
            Self::DisconnectedSegment(_) | Self::DisconnectedTerminal(_)
        )
    }

    /// Internal equipment wiring is hidden from simple trace results
    pub fn is_internal_connectivity(&self) -> bool {
        matches!(
            self,
            Self::InternalEquipmentConnectivityNode(_) | Self::InternalEquipmentConnectivityLink(_)
        )
    }

    /// Short name of the variant, used in error messages
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::ConnectedSegment(_) => "ConnectedSegment",
            Self::DisconnectedSegment(_) => "DisconnectedSegment",
            Self::ConnectedTerminal(_) => "ConnectedTerminal",
            Self::DisconnectedTerminal(_) => "DisconnectedTerminal",
            Self::InternalEquipmentConnectivityNode(_) => "InternalEquipmentConnectivityNode",
            Self::InternalEquipmentConnectivityLink(_) => "InternalEquipmentConnectivityLink",
            Self::TerminalToTerminalConnectivityLink(_) => "TerminalToTerminalConnectivityLink",
        }
    }
}

/// Typed access to one variant of [`UtilityGraphElement`]
pub trait GraphElementVariant: Sized + Copy {
    /// Variant name as reported by [`UtilityGraphElement::kind_name`]
    const KIND: &'static str;

    /// Extract the variant payload, `None` for any other variant
    fn from_element(element: &UtilityGraphElement) -> Option<Self>;
}

macro_rules! graph_element_variant {
    ($ty:ty, $variant:ident) => {
        impl GraphElementVariant for $ty {
            const KIND: &'static str = stringify!($variant);

            fn from_element(element: &UtilityGraphElement) -> Option<Self> {
                match element {
                    UtilityGraphElement::$variant(e) => Some(*e),
                    _ => None,
                }
            }
        }

        impl From<$ty> for UtilityGraphElement {
            fn from(e: $ty) -> Self {
                UtilityGraphElement::$variant(e)
            }
        }
    };
}

graph_element_variant!(UtilityGraphConnectedSegment, ConnectedSegment);
graph_element_variant!(UtilityGraphDisconnectedSegment, DisconnectedSegment);
graph_element_variant!(UtilityGraphConnectedTerminal, ConnectedTerminal);
graph_element_variant!(UtilityGraphDisconnectedTerminal, DisconnectedTerminal);
graph_element_variant!(
    UtilityGraphInternalEquipmentConnectivityNode,
    InternalEquipmentConnectivityNode
);
graph_element_variant!(
    UtilityGraphInternalEquipmentConnectivityLink,
    InternalEquipmentConnectivityLink
);
graph_element_variant!(
    UtilityGraphTerminalToTerminalConnectivityLink,
    TerminalToTerminalConnectivityLink
);

/// Payload of a node in the versioned graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GraphNodeKind {
    Terminal(UtilityGraphConnectedTerminal),
    InternalConnectivity(UtilityGraphInternalEquipmentConnectivityNode),
}

impl GraphNodeKind {
    /// The terminal payload, if this node is a terminal
    pub fn terminal(&self) -> Option<&UtilityGraphConnectedTerminal> {
        match self {
            GraphNodeKind::Terminal(t) => Some(t),
            GraphNodeKind::InternalConnectivity(_) => None,
        }
    }

    pub fn to_element(&self) -> UtilityGraphElement {
        match *self {
            GraphNodeKind::Terminal(t) => t.into(),
            GraphNodeKind::InternalConnectivity(n) => n.into(),
        }
    }
}

/// Payload of an edge in the versioned graph
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GraphEdgeKind {
    Segment(UtilityGraphConnectedSegment),
    InternalLink(UtilityGraphInternalEquipmentConnectivityLink),
    TerminalToTerminal(UtilityGraphTerminalToTerminalConnectivityLink),
}

impl GraphEdgeKind {
    pub fn is_internal_link(&self) -> bool {
        matches!(self, GraphEdgeKind::InternalLink(_))
    }

    pub fn to_element(&self) -> UtilityGraphElement {
        match *self {
            GraphEdgeKind::Segment(s) => s.into(),
            GraphEdgeKind::InternalLink(l) => l.into(),
            GraphEdgeKind::TerminalToTerminal(l) => l.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_variant_access() {
        let segment = UtilityGraphDisconnectedSegment {
            id: Uuid::new_v4(),
            span_equipment_id: Uuid::new_v4(),
            structure_index: 2,
            segment_index: 1,
        };
        let element: UtilityGraphElement = segment.into();

        assert_eq!(
            UtilityGraphDisconnectedSegment::from_element(&element),
            Some(segment)
        );
        assert!(UtilityGraphConnectedSegment::from_element(&element).is_none());
        assert!(!element.is_connected());
        assert_eq!(element.kind_name(), UtilityGraphDisconnectedSegment::KIND);
    }

    #[test]
    fn test_connect_disconnect_preserves_identity() {
        let terminal = UtilityGraphDisconnectedTerminal {
            id: Uuid::new_v4(),
            route_node_id: Uuid::new_v4(),
            terminal_equipment_id: Uuid::new_v4(),
            structure_index: 0,
            terminal_index: 7,
            direction: TerminalDirection::Out,
        };

        let connected = terminal.connect();
        assert!(!connected.is_simple_terminal());
        assert_eq!(connected.disconnect(), terminal);
    }

    #[test]
    fn test_dummy_terminal_is_simple() {
        let dummy = UtilityGraphConnectedTerminal::dummy();
        assert!(dummy.is_dummy());
        assert!(dummy.is_simple_terminal());
    }

    #[test]
    fn test_element_serialization_is_tagged() {
        let link = UtilityGraphTerminalToTerminalConnectivityLink {
            id: Uuid::new_v4(),
            route_node_id: Uuid::new_v4(),
            fiber_coord_length: 1.5,
        };
        let json = serde_json::to_value(UtilityGraphElement::from(link)).unwrap();
        assert_eq!(json["kind"], "TerminalToTerminalConnectivityLink");
    }
}
