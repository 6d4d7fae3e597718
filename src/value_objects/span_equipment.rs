//! Span equipment snapshot: conduits and cables placed along a walk

use super::{MarkingInfo, NodeContainerSide, SpanEquipmentAffixDirection};
use crate::graph::SegmentEnd;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable snapshot of one span equipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEquipment {
    pub id: Uuid,
    pub specification_id: Uuid,
    pub walk_of_interest_id: Uuid,
    /// Ordered interests along the walk, one per structural waypoint
    pub node_of_interest_ids: Vec<Uuid>,
    /// Route node of each node of interest, parallel to `node_of_interest_ids`
    pub route_node_ids: Vec<Uuid>,
    /// Outer structure first, inner structures after it
    pub span_structures: Vec<SpanStructure>,
    pub name: Option<String>,
    pub marking_info: Option<MarkingInfo>,
    pub manufacturer_id: Option<Uuid>,
    pub is_cable: bool,
    pub utility_network_hops: Vec<UtilityNetworkHop>,
    pub node_container_affixes: Vec<SpanEquipmentNodeContainerAffix>,
}

impl SpanEquipment {
    pub fn from_route_node_id(&self) -> Option<Uuid> {
        self.route_node_ids.first().copied()
    }

    pub fn to_route_node_id(&self) -> Option<Uuid> {
        self.route_node_ids.last().copied()
    }

    /// Index of the node of interest sitting on a route node
    pub fn node_of_interest_index(&self, route_node_id: Uuid) -> Option<u16> {
        self.route_node_ids
            .iter()
            .position(|n| *n == route_node_id)
            .map(|i| i as u16)
    }

    pub fn route_node_at(&self, node_of_interest_index: u16) -> Option<Uuid> {
        self.route_node_ids
            .get(node_of_interest_index as usize)
            .copied()
    }

    /// Locate a segment, returning `(structure_index, segment_index, segment)`
    pub fn find_segment(&self, span_segment_id: Uuid) -> Option<(u16, u16, &SpanSegment)> {
        self.span_structures
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.deleted)
            .find_map(|(structure_index, structure)| {
                structure
                    .span_segments
                    .iter()
                    .position(|seg| seg.id == span_segment_id)
                    .map(|segment_index| {
                        (
                            structure_index as u16,
                            segment_index as u16,
                            &structure.span_segments[segment_index],
                        )
                    })
            })
    }

    /// Which end of a segment sits on the route node, if any
    pub fn segment_end_at(&self, segment: &SpanSegment, route_node_id: Uuid) -> Option<SegmentEnd> {
        let index = self.node_of_interest_index(route_node_id)?;
        if segment.from_node_of_interest_index == index {
            Some(SegmentEnd::From)
        } else if segment.to_node_of_interest_index == index {
            Some(SegmentEnd::To)
        } else {
            None
        }
    }

    /// All live segments as `(structure_index, segment_index, segment)`
    pub fn segments(&self) -> impl Iterator<Item = (u16, u16, &SpanSegment)> {
        self.span_structures
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.deleted)
            .flat_map(|(structure_index, structure)| {
                structure
                    .span_segments
                    .iter()
                    .enumerate()
                    .map(move |(segment_index, seg)| {
                        (structure_index as u16, segment_index as u16, seg)
                    })
            })
    }

    /// True when any segment end is attached to a terminal
    pub fn has_connections(&self) -> bool {
        self.segments().any(|(_, _, s)| s.is_connected())
    }

    pub fn is_affixed_to_parent(&self) -> bool {
        !self.utility_network_hops.is_empty()
    }
}

/// One conduit tube or cable jacket layer of a span equipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanStructure {
    pub id: Uuid,
    pub specification_id: Uuid,
    /// 1 for the outer structure, 2 for inner ones
    pub level: u8,
    pub parent_position: u16,
    pub position: u16,
    pub deleted: bool,
    pub span_segments: Vec<SpanSegment>,
}

impl SpanStructure {
    pub fn is_outer(&self) -> bool {
        self.level == 1
    }

    pub fn has_connections(&self) -> bool {
        self.span_segments.iter().any(SpanSegment::is_connected)
    }
}

/// Cuttable piece of a span structure between two nodes of interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanSegment {
    pub id: Uuid,
    pub from_node_of_interest_index: u16,
    pub to_node_of_interest_index: u16,
    pub from_terminal_id: Option<Uuid>,
    pub to_terminal_id: Option<Uuid>,
}

impl SpanSegment {
    pub fn new(id: Uuid, from: u16, to: u16) -> Self {
        Self {
            id,
            from_node_of_interest_index: from,
            to_node_of_interest_index: to,
            from_terminal_id: None,
            to_terminal_id: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.from_terminal_id.is_some() || self.to_terminal_id.is_some()
    }

    pub fn terminal_at(&self, end: SegmentEnd) -> Option<Uuid> {
        match end {
            SegmentEnd::From => self.from_terminal_id,
            SegmentEnd::To => self.to_terminal_id,
        }
    }

    pub fn with_terminal(mut self, end: SegmentEnd, terminal_id: Option<Uuid>) -> Self {
        match end {
            SegmentEnd::From => self.from_terminal_id = terminal_id,
            SegmentEnd::To => self.to_terminal_id = terminal_id,
        }
        self
    }

    /// Whether the node of interest lies strictly inside the segment
    pub fn spans_over(&self, node_of_interest_index: u16) -> bool {
        self.from_node_of_interest_index < node_of_interest_index
            && node_of_interest_index < self.to_node_of_interest_index
    }
}

/// A span segment of a parent span equipment a child is routed through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEquipmentSpanEquipmentAffix {
    pub span_segment_id: Uuid,
    pub direction: SpanEquipmentAffixDirection,
}

/// Stretch of a child span equipment routed through parent segments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtilityNetworkHop {
    pub from_node_id: Uuid,
    pub to_node_id: Uuid,
    pub parent_affixes: Vec<SpanEquipmentSpanEquipmentAffix>,
}

impl UtilityNetworkHop {
    /// The same hop walked from the other end
    pub fn reverse(&self) -> Self {
        Self {
            from_node_id: self.to_node_id,
            to_node_id: self.from_node_id,
            parent_affixes: self
                .parent_affixes
                .iter()
                .rev()
                .map(|a| SpanEquipmentSpanEquipmentAffix {
                    span_segment_id: a.span_segment_id,
                    direction: a.direction.reverse(),
                })
                .collect(),
        }
    }

    pub fn references_segment(&self, span_segment_id: Uuid) -> bool {
        self.parent_affixes
            .iter()
            .any(|a| a.span_segment_id == span_segment_id)
    }
}

/// Span equipment entering a node container at one of its nodes of interest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEquipmentNodeContainerAffix {
    pub route_node_of_interest_id: Uuid,
    pub node_container_id: Uuid,
    pub node_container_ingoing_side: NodeContainerSide,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equipment() -> SpanEquipment {
        let route_node_ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        SpanEquipment {
            id: Uuid::new_v4(),
            specification_id: Uuid::new_v4(),
            walk_of_interest_id: Uuid::new_v4(),
            node_of_interest_ids: (0..3).map(|_| Uuid::new_v4()).collect(),
            route_node_ids,
            span_structures: vec![SpanStructure {
                id: Uuid::new_v4(),
                specification_id: Uuid::new_v4(),
                level: 1,
                parent_position: 0,
                position: 0,
                deleted: false,
                span_segments: vec![
                    SpanSegment::new(Uuid::new_v4(), 0, 1),
                    SpanSegment::new(Uuid::new_v4(), 1, 2),
                ],
            }],
            name: None,
            marking_info: None,
            manufacturer_id: None,
            is_cable: false,
            utility_network_hops: vec![],
            node_container_affixes: vec![],
        }
    }

    #[test]
    fn test_find_segment_and_end() {
        let e = equipment();
        let second = e.span_structures[0].span_segments[1];

        let (structure_index, segment_index, found) = e.find_segment(second.id).unwrap();
        assert_eq!((structure_index, segment_index), (0, 1));
        assert_eq!(found.id, second.id);

        assert_eq!(e.segment_end_at(&second, e.route_node_ids[1]), Some(SegmentEnd::From));
        assert_eq!(e.segment_end_at(&second, e.route_node_ids[2]), Some(SegmentEnd::To));
        assert_eq!(e.segment_end_at(&second, e.route_node_ids[0]), None);
    }

    #[test]
    fn test_hop_reverse() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let hop = UtilityNetworkHop {
            from_node_id: Uuid::new_v4(),
            to_node_id: Uuid::new_v4(),
            parent_affixes: vec![
                SpanEquipmentSpanEquipmentAffix {
                    span_segment_id: a,
                    direction: SpanEquipmentAffixDirection::Forward,
                },
                SpanEquipmentSpanEquipmentAffix {
                    span_segment_id: b,
                    direction: SpanEquipmentAffixDirection::Backward,
                },
            ],
        };

        let reversed = hop.reverse();
        assert_eq!(reversed.from_node_id, hop.to_node_id);
        assert_eq!(reversed.to_node_id, hop.from_node_id);
        assert_eq!(reversed.parent_affixes[0].span_segment_id, b);
        assert_eq!(
            reversed.parent_affixes[0].direction,
            SpanEquipmentAffixDirection::Forward
        );
        assert_eq!(reversed.reverse(), hop);
    }

    #[test]
    fn test_spans_over() {
        let segment = SpanSegment::new(Uuid::new_v4(), 0, 3);
        assert!(segment.spans_over(1));
        assert!(!segment.spans_over(0));
        assert!(!segment.spans_over(3));
    }
}
