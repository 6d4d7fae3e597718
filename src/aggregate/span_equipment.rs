//! Span Equipment Aggregate
//!
//! Conduits and cables placed along a walk of the route network. Segment
//! ends are cut, connected and disconnected here; the resulting graph edits
//! are derived from the raised events by the utility network projection.

use super::{AggregateRoot, AggregateState, EventSourcedAggregate};
use crate::commands::{
    SpanEquipmentErrorCode as Code, UtilityNetworkCommandError, UtilityNetworkCommandResult,
};
use crate::domain_events::UtilityNetworkEvent;
use crate::events::*;
use crate::projections::snapshot_functions::{apply_span_equipment_event, connected_ends_at};
use crate::value_objects::{
    MarkingInfo, NodeContainer, NodeContainerSide, SpanEquipment, SpanEquipmentAffixDirection,
    SpanEquipmentNodeContainerAffix, SpanEquipmentSpanEquipmentAffix,
    SpanEquipmentSpecification, SpanSegment, SpanStructure, SpanStructureTemplate,
    UtilityNetworkHop,
};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

fn error(code: Code, message: impl Into<String>) -> UtilityNetworkCommandError {
    UtilityNetworkCommandError::span_equipment(code, message)
}

/// Validated cut waiting for its node of interest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutPlan {
    pub route_node_id: Uuid,
    pub node_of_interest_index: u16,
    /// The cut node is not yet a node of interest of the span equipment
    pub requires_new_node_of_interest: bool,
    pub span_segment_ids: Vec<Uuid>,
}

/// Validated merge of another span equipment into this one
#[derive(Debug, Clone, PartialEq)]
pub struct MergePlan {
    pub route_node_id: Uuid,
    pub merged_span_equipment_id: Uuid,
    /// This span equipment's walk has to be reversed to end at the merge node
    pub reverse_survivor_walk: bool,
    /// The merged span equipment's walk has to be reversed to start there
    pub reverse_merged_walk: bool,
    pub node_of_interest_ids: Vec<Uuid>,
    pub route_node_ids: Vec<Uuid>,
    pub span_structures: Vec<SpanStructure>,
    /// Interests at the merge node that no longer mark a segment end
    pub dropped_node_of_interest_ids: Vec<Uuid>,
}

/// A parent span segment resolved to the route nodes it runs between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentSegmentEnds {
    pub span_segment_id: Uuid,
    pub from_route_node_id: Uuid,
    pub to_route_node_id: Uuid,
}

/// Span equipment aggregate
#[derive(Debug, Clone)]
pub struct SpanEquipmentAggregate {
    state: AggregateState<SpanEquipment, SpanEquipmentEvent>,
}

impl SpanEquipmentAggregate {
    /// Current snapshot, `None` until placed and after removal
    pub fn snapshot(&self) -> Option<&SpanEquipment> {
        self.state.snapshot.as_ref()
    }

    fn require(&self) -> UtilityNetworkCommandResult<&SpanEquipment> {
        self.state.snapshot.as_ref().ok_or_else(|| {
            error(
                Code::SpanEquipmentNotFound,
                format!("Span equipment {} not found", self.state.id),
            )
        })
    }

    fn raise(&mut self, event: impl Into<SpanEquipmentEvent>) {
        let event = event.into();
        debug!(
            span_equipment_id = %self.state.id,
            event_type = crate::domain_events::DomainEvent::event_type(&event),
            "Span equipment event raised"
        );
        self.state.snapshot = apply_span_equipment_event(self.state.snapshot.take(), &event);
        self.state.uncommitted.push(event);
    }

    /// Place the span equipment along a validated walk. The walk's end nodes
    /// become the first two nodes of interest.
    #[allow(clippy::too_many_arguments)]
    pub fn place(
        &mut self,
        specification: &SpanEquipmentSpecification,
        walk_of_interest_id: Uuid,
        from_node_of_interest: (Uuid, Uuid),
        to_node_of_interest: (Uuid, Uuid),
        name: Option<String>,
        marking_info: Option<MarkingInfo>,
        manufacturer_id: Option<Uuid>,
    ) -> UtilityNetworkCommandResult<()> {
        if self.state.snapshot.is_some() || self.state.version > 0 {
            return Err(error(
                Code::SpanEquipmentAlreadyExists,
                format!("Span equipment {} already exists", self.state.id),
            ));
        }
        if specification.deprecated {
            return Err(error(
                Code::InvalidSpanEquipmentSpecification,
                format!("Span equipment specification {} is deprecated", specification.id),
            ));
        }

        let span_structures = flatten_templates(&specification.root_template)
            .into_iter()
            .map(|(template, parent_position)| SpanStructure {
                id: Uuid::new_v4(),
                specification_id: template.span_structure_specification_id,
                level: template.level,
                parent_position,
                position: template.position,
                deleted: false,
                span_segments: vec![SpanSegment::new(Uuid::new_v4(), 0, 1)],
            })
            .collect();

        let span_equipment = SpanEquipment {
            id: self.state.id,
            specification_id: specification.id,
            walk_of_interest_id,
            node_of_interest_ids: vec![from_node_of_interest.0, to_node_of_interest.0],
            route_node_ids: vec![from_node_of_interest.1, to_node_of_interest.1],
            span_structures,
            name,
            marking_info,
            manufacturer_id,
            is_cable: specification.is_cable,
            utility_network_hops: Vec::new(),
            node_container_affixes: Vec::new(),
        };

        self.raise(SpanEquipmentPlacedInRouteNetwork { span_equipment });
        Ok(())
    }

    /// Check a cut and work out where the cut node sits among the nodes of
    /// interest. `walk_node_ids` are the route nodes of the walk in order.
    pub fn plan_cut(
        &self,
        route_node_id: Uuid,
        walk_node_ids: &[Uuid],
        span_segment_ids: &[Uuid],
    ) -> UtilityNetworkCommandResult<CutPlan> {
        let equipment = self.require()?;

        let walk_position = walk_node_ids
            .iter()
            .position(|n| *n == route_node_id)
            .ok_or_else(|| {
                error(
                    Code::CutNodeNotPartOfWalk,
                    format!(
                        "Route node {route_node_id} is not part of the walk of span equipment {}",
                        equipment.id
                    ),
                )
            })?;
        if walk_position == 0 || walk_position + 1 == walk_node_ids.len() {
            return Err(error(
                Code::CannotCutAtWalkEnd,
                format!("Route node {route_node_id} is an end of the walk"),
            ));
        }
        if span_segment_ids.is_empty() {
            return Err(error(Code::SpanSegmentNotFound, "No span segments to cut"));
        }

        let existing = equipment.node_of_interest_index(route_node_id);
        let node_of_interest_index = match existing {
            Some(index) => index,
            None => equipment
                .route_node_ids
                .iter()
                .filter(|n| {
                    walk_node_ids
                        .iter()
                        .position(|w| w == *n)
                        .is_some_and(|p| p < walk_position)
                })
                .count() as u16,
        };

        let mut seen = HashSet::new();
        let mut segments = Vec::new();
        for segment_id in span_segment_ids {
            if !seen.insert(*segment_id) {
                continue;
            }
            let (_, _, segment) = equipment.find_segment(*segment_id).ok_or_else(|| {
                error(
                    Code::SpanSegmentNotFound,
                    format!("Span segment {segment_id} not found in span equipment {}", equipment.id),
                )
            })?;

            let within = match existing {
                Some(index) => {
                    if segment.from_node_of_interest_index == index
                        || segment.to_node_of_interest_index == index
                    {
                        return Err(error(
                            Code::SpanSegmentAlreadyCutAtNode,
                            format!("Span segment {segment_id} is already cut at route node {route_node_id}"),
                        ));
                    }
                    segment.spans_over(index)
                }
                None => {
                    segment.from_node_of_interest_index < node_of_interest_index
                        && node_of_interest_index <= segment.to_node_of_interest_index
                }
            };
            if !within {
                return Err(error(
                    Code::CutNodeNotWithinSpanSegment,
                    format!("Route node {route_node_id} is not within span segment {segment_id}"),
                ));
            }
            segments.push(*segment_id);
        }

        Ok(CutPlan {
            route_node_id,
            node_of_interest_index,
            requires_new_node_of_interest: existing.is_none(),
            span_segment_ids: segments,
        })
    }

    /// Execute a planned cut. `new_node_of_interest_id` is only used when the
    /// plan requires a new node of interest.
    pub fn cut(
        &mut self,
        plan: &CutPlan,
        new_node_of_interest_id: Uuid,
    ) -> UtilityNetworkCommandResult<Vec<SpanSegmentCutInfo>> {
        let equipment = self.require()?;

        let cut_node_of_interest_id = if plan.requires_new_node_of_interest {
            new_node_of_interest_id
        } else {
            equipment.node_of_interest_ids[plan.node_of_interest_index as usize]
        };

        let cuts: Vec<SpanSegmentCutInfo> = plan
            .span_segment_ids
            .iter()
            .map(|old| SpanSegmentCutInfo {
                old_span_segment_id: *old,
                new_span_segment_id1: Uuid::new_v4(),
                new_span_segment_id2: Uuid::new_v4(),
            })
            .collect();

        self.raise(SpanSegmentsCut {
            span_equipment_id: equipment.id,
            route_node_id: plan.route_node_id,
            cut_node_of_interest_id,
            cut_node_of_interest_index: plan.node_of_interest_index,
            node_of_interest_inserted: plan.requires_new_node_of_interest,
            cuts: cuts.clone(),
        });
        Ok(cuts)
    }

    fn validate_connects(
        &self,
        route_node_id: Uuid,
        connects: &[SpanSegmentToTerminalConnectInfo],
    ) -> UtilityNetworkCommandResult<Uuid> {
        let equipment = self.require()?;
        let mut seen = HashSet::new();

        for info in connects {
            let (_, _, segment) = equipment.find_segment(info.segment_id).ok_or_else(|| {
                error(
                    Code::SpanSegmentNotFound,
                    format!("Span segment {} not found in span equipment {}", info.segment_id, equipment.id),
                )
            })?;
            let end = equipment
                .segment_end_at(segment, route_node_id)
                .ok_or_else(|| {
                    error(
                        Code::SpanSegmentEndNotAtRouteNode,
                        format!(
                            "No end of span segment {} is located at route node {route_node_id}",
                            info.segment_id
                        ),
                    )
                })?;
            if segment.terminal_at(end).is_some() || !seen.insert(info.segment_id) {
                return Err(error(
                    Code::SpanSegmentAlreadyConnected,
                    format!(
                        "The {end} end of span segment {} is already connected",
                        info.segment_id
                    ),
                ));
            }
        }
        Ok(equipment.id)
    }

    /// Attach segment ends to bare terminals shared with other segment ends
    pub fn connect_to_simple_terminals(
        &mut self,
        route_node_id: Uuid,
        connects: Vec<SpanSegmentToTerminalConnectInfo>,
    ) -> UtilityNetworkCommandResult<()> {
        let span_equipment_id = self.validate_connects(route_node_id, &connects)?;
        self.raise(SpanSegmentsConnectedToSimpleTerminals {
            span_equipment_id,
            route_node_id,
            connects,
        });
        Ok(())
    }

    /// Attach segment ends to terminal equipment terminals. Terminal
    /// existence, location and capacity are checked by the caller, which
    /// knows the terminal equipment involved.
    pub fn connect_to_terminals(
        &mut self,
        route_node_id: Uuid,
        connects: Vec<SpanSegmentToTerminalConnectInfo>,
    ) -> UtilityNetworkCommandResult<()> {
        let span_equipment_id = self.validate_connects(route_node_id, &connects)?;
        self.raise(SpanSegmentsConnectedToTerminals {
            span_equipment_id,
            route_node_id,
            connects,
        });
        Ok(())
    }

    /// The connection of a segment end at a route node
    pub fn connection_at(
        &self,
        span_segment_id: Uuid,
        route_node_id: Uuid,
    ) -> UtilityNetworkCommandResult<SpanSegmentToTerminalConnectInfo> {
        let equipment = self.require()?;
        let (_, _, segment) = equipment.find_segment(span_segment_id).ok_or_else(|| {
            error(
                Code::SpanSegmentNotFound,
                format!("Span segment {span_segment_id} not found"),
            )
        })?;
        equipment
            .segment_end_at(segment, route_node_id)
            .and_then(|end| segment.terminal_at(end))
            .map(|terminal_id| SpanSegmentToTerminalConnectInfo {
                segment_id: span_segment_id,
                terminal_id,
            })
            .ok_or_else(|| {
                error(
                    Code::SpanSegmentNotConnectedToTerminal,
                    format!("Span segment {span_segment_id} is not connected at route node {route_node_id}"),
                )
            })
    }

    pub fn disconnect_from_terminals(
        &mut self,
        disconnects: Vec<SpanSegmentToTerminalConnectInfo>,
    ) -> UtilityNetworkCommandResult<()> {
        let equipment = self.require()?;

        for info in &disconnects {
            let (_, _, segment) = equipment.find_segment(info.segment_id).ok_or_else(|| {
                error(
                    Code::SpanSegmentNotFound,
                    format!("Span segment {} not found", info.segment_id),
                )
            })?;
            if segment.from_terminal_id != Some(info.terminal_id)
                && segment.to_terminal_id != Some(info.terminal_id)
            {
                return Err(error(
                    Code::SpanSegmentNotConnectedToTerminal,
                    format!(
                        "Span segment {} is not connected to terminal {}",
                        info.segment_id, info.terminal_id
                    ),
                ));
            }
        }

        let span_equipment_id = equipment.id;
        self.raise(SpanSegmentsDisconnectedFromTerminals {
            span_equipment_id,
            disconnects,
        });
        Ok(())
    }

    /// Route this span equipment through parent segments. The hop is stored
    /// in the direction of this span equipment's walk.
    pub fn affix_to_parent(
        &mut self,
        hop: UtilityNetworkHop,
        walk_node_ids: &[Uuid],
    ) -> UtilityNetworkCommandResult<()> {
        let equipment = self.require()?;

        let position = |node: Uuid| walk_node_ids.iter().position(|n| *n == node);
        let (Some(from), Some(to)) = (position(hop.from_node_id), position(hop.to_node_id)) else {
            return Err(error(
                Code::HopNotOnSpanEquipmentWalk,
                format!(
                    "Hop {} -> {} is not on the walk of span equipment {}",
                    hop.from_node_id, hop.to_node_id, equipment.id
                ),
            ));
        };

        let hop = if from > to { hop.reverse() } else { hop };

        let already_affixed = hop.parent_affixes.iter().any(|affix| {
            equipment
                .utility_network_hops
                .iter()
                .any(|existing| existing.references_segment(affix.span_segment_id))
        });
        if already_affixed {
            return Err(error(
                Code::SpanEquipmentAlreadyAffixedToParent,
                format!("Span equipment {} is already affixed to those parent segments", equipment.id),
            ));
        }

        let span_equipment_id = equipment.id;
        self.raise(SpanEquipmentAffixedToParent {
            span_equipment_id,
            hop,
        });
        Ok(())
    }

    pub fn detach_from_parent(&mut self, parent_span_segment_id: Uuid) -> UtilityNetworkCommandResult<()> {
        let equipment = self.require()?;
        let hop = equipment
            .utility_network_hops
            .iter()
            .find(|hop| hop.references_segment(parent_span_segment_id))
            .cloned()
            .ok_or_else(|| {
                error(
                    Code::SpanEquipmentNotAffixedToParent,
                    format!(
                        "Span equipment {} is not affixed to parent segment {parent_span_segment_id}",
                        equipment.id
                    ),
                )
            })?;

        let span_equipment_id = equipment.id;
        self.raise(SpanEquipmentDetachedFromParent {
            span_equipment_id,
            hop,
        });
        Ok(())
    }

    pub fn affix_to_node_container(
        &mut self,
        container: &NodeContainer,
        ingoing_side: NodeContainerSide,
        walk_node_ids: &[Uuid],
    ) -> UtilityNetworkCommandResult<()> {
        let equipment = self.require()?;

        if !walk_node_ids.contains(&container.route_node_id) {
            return Err(error(
                Code::NodeContainerNotOnSpanEquipmentWalk,
                format!(
                    "Node container {} is not located on the walk of span equipment {}",
                    container.id, equipment.id
                ),
            ));
        }
        if equipment
            .node_container_affixes
            .iter()
            .any(|a| a.node_container_id == container.id)
        {
            return Err(error(
                Code::SpanEquipmentAlreadyAffixedToNodeContainer,
                format!("Span equipment {} is already affixed to node container {}", equipment.id, container.id),
            ));
        }

        let span_equipment_id = equipment.id;
        self.raise(SpanEquipmentAffixedToContainer {
            span_equipment_id,
            affix: SpanEquipmentNodeContainerAffix {
                route_node_of_interest_id: container.interest_id,
                node_container_id: container.id,
                node_container_ingoing_side: ingoing_side,
            },
        });
        Ok(())
    }

    pub fn detach_from_node_container(&mut self, node_container_id: Uuid) -> UtilityNetworkCommandResult<()> {
        let equipment = self.require()?;
        if !equipment
            .node_container_affixes
            .iter()
            .any(|a| a.node_container_id == node_container_id)
        {
            return Err(error(
                Code::SpanEquipmentNotAffixedToNodeContainer,
                format!("Span equipment {} is not affixed to node container {node_container_id}", equipment.id),
            ));
        }

        let span_equipment_id = equipment.id;
        self.raise(SpanEquipmentDetachedFromContainer {
            span_equipment_id,
            node_container_id,
        });
        Ok(())
    }

    /// Add inner structures. New structures are cut wherever the outer
    /// structure is cut.
    pub fn add_structures(&mut self, structure_specification_ids: &[Uuid]) -> UtilityNetworkCommandResult<()> {
        let equipment = self.require()?;
        if structure_specification_ids.is_empty() {
            return Err(error(Code::NoStructuresToAdd, "No structures to add"));
        }

        let outer = equipment
            .span_structures
            .iter()
            .find(|s| s.is_outer())
            .ok_or_else(|| {
                error(
                    Code::SpanStructureNotFound,
                    format!("Span equipment {} has no outer structure", equipment.id),
                )
            })?;

        let next_position = equipment
            .span_structures
            .iter()
            .filter(|s| !s.is_outer())
            .map(|s| s.position)
            .max()
            .unwrap_or(0)
            + 1;

        let span_structures_to_add = structure_specification_ids
            .iter()
            .enumerate()
            .map(|(i, specification_id)| SpanStructure {
                id: Uuid::new_v4(),
                specification_id: *specification_id,
                level: outer.level + 1,
                parent_position: outer.position,
                position: next_position + i as u16,
                deleted: false,
                span_segments: outer
                    .span_segments
                    .iter()
                    .map(|s| {
                        SpanSegment::new(
                            Uuid::new_v4(),
                            s.from_node_of_interest_index,
                            s.to_node_of_interest_index,
                        )
                    })
                    .collect(),
            })
            .collect();

        let span_equipment_id = equipment.id;
        self.raise(AdditionalStructuresAddedToSpanEquipment {
            span_equipment_id,
            span_structures_to_add,
        });
        Ok(())
    }

    /// Remove the structure owning a segment. The outer structure takes the
    /// whole span equipment with it.
    pub fn remove_structure(&mut self, span_segment_id: Uuid) -> UtilityNetworkCommandResult<()> {
        let equipment = self.require()?;
        let (structure_index, _, _) = equipment.find_segment(span_segment_id).ok_or_else(|| {
            error(
                Code::SpanSegmentNotFound,
                format!("Span segment {span_segment_id} not found in span equipment {}", equipment.id),
            )
        })?;
        let structure = &equipment.span_structures[structure_index as usize];
        let span_equipment_id = equipment.id;

        if structure.is_outer() {
            if equipment.has_connections() {
                return Err(error(
                    Code::CannotRemoveSpanEquipmentWithConnectedSegments,
                    format!("Span equipment {span_equipment_id} has connected segments"),
                ));
            }
            self.raise(SpanEquipmentRemoved { span_equipment_id });
        } else {
            if structure.has_connections() {
                return Err(error(
                    Code::CannotRemoveSpanStructureWithConnectedSegments,
                    format!("Span structure {} has connected segments", structure.id),
                ));
            }
            let span_structure_id = structure.id;
            self.raise(SpanStructureRemoved {
                span_equipment_id,
                span_structure_id,
            });
        }
        Ok(())
    }

    /// Check a merge of `other` into this span equipment at a common end node
    pub fn plan_merge(&self, other: &SpanEquipment, route_node_id: Uuid) -> UtilityNetworkCommandResult<MergePlan> {
        let survivor = self.require()?;

        if survivor.id == other.id {
            return Err(error(
                Code::CannotMergeSpanEquipmentWithItself,
                format!("Span equipment {} cannot be merged with itself", survivor.id),
            ));
        }
        if survivor.specification_id != other.specification_id {
            return Err(error(
                Code::SpanEquipmentSpecificationMismatch,
                format!(
                    "Span equipment {} and {} have different specifications",
                    survivor.id, other.id
                ),
            ));
        }
        let same_layout = survivor.span_structures.len() == other.span_structures.len()
            && survivor
                .span_structures
                .iter()
                .zip(&other.span_structures)
                .all(|(a, b)| {
                    a.deleted == b.deleted && (a.deleted || a.specification_id == b.specification_id)
                });
        if !same_layout {
            return Err(error(
                Code::SpanEquipmentStructureMismatch,
                format!("Span equipment {} and {} have different structures", survivor.id, other.id),
            ));
        }

        let no_common_end = || {
            error(
                Code::SpanEquipmentsHaveNoCommonEndNode,
                format!(
                    "Span equipment {} and {} do not both end in route node {route_node_id}",
                    survivor.id, other.id
                ),
            )
        };
        let reverse_survivor_walk = match end_of_walk(survivor, route_node_id) {
            Some(WalkEnd::Last) => false,
            Some(WalkEnd::First) => true,
            None => return Err(no_common_end()),
        };
        let reverse_merged_walk = match end_of_walk(other, route_node_id) {
            Some(WalkEnd::First) => false,
            Some(WalkEnd::Last) => true,
            None => return Err(no_common_end()),
        };

        for equipment in [survivor, other] {
            if !connected_ends_at(equipment, route_node_id).is_empty() {
                return Err(error(
                    Code::SpanEquipmentConnectedAtMergeNode,
                    format!("Span equipment {} is connected at route node {route_node_id}", equipment.id),
                ));
            }
        }

        let a = Oriented::of(survivor, reverse_survivor_walk);
        let b = Oriented::of(other, reverse_merged_walk);
        let merge_index = (a.node_of_interest_ids.len() - 1) as u16;

        let mut node_of_interest_ids = a.node_of_interest_ids.clone();
        node_of_interest_ids.extend(b.node_of_interest_ids.iter().skip(1));
        let mut route_node_ids = a.route_node_ids.clone();
        route_node_ids.extend(b.route_node_ids.iter().skip(1));
        node_of_interest_ids.remove(merge_index as usize);
        route_node_ids.remove(merge_index as usize);

        let span_structures = a
            .span_structures
            .iter()
            .zip(&b.span_structures)
            .map(|(sa, sb)| SpanStructure {
                span_segments: if sa.deleted {
                    Vec::new()
                } else {
                    fuse_segments(&sa.span_segments, &sb.span_segments, merge_index)
                },
                ..sa.clone()
            })
            .collect();

        let dropped_node_of_interest_ids = vec![
            a.node_of_interest_ids[merge_index as usize],
            b.node_of_interest_ids[0],
        ];

        Ok(MergePlan {
            route_node_id,
            merged_span_equipment_id: other.id,
            reverse_survivor_walk,
            reverse_merged_walk,
            node_of_interest_ids,
            route_node_ids,
            span_structures,
            dropped_node_of_interest_ids,
        })
    }

    /// Take over the segments of the merged span equipment
    pub fn merge(&mut self, plan: MergePlan, walk_of_interest_id: Uuid) -> UtilityNetworkCommandResult<()> {
        let span_equipment_id = self.require()?.id;
        self.raise(SpanEquipmentMerged {
            span_equipment_id,
            merged_span_equipment_id: plan.merged_span_equipment_id,
            walk_of_interest_id,
            node_of_interest_ids: plan.node_of_interest_ids,
            route_node_ids: plan.route_node_ids,
            span_structures: plan.span_structures,
        });
        Ok(())
    }

    /// Retire this span equipment after its segments moved to the target
    pub fn merged_into(&mut self, target_span_equipment_id: Uuid) -> UtilityNetworkCommandResult<()> {
        let span_equipment_id = self.require()?.id;
        self.raise(SpanEquipmentMergedInto {
            span_equipment_id,
            target_span_equipment_id,
        });
        Ok(())
    }

    /// Change descriptive properties or switch to a specification with the
    /// same structure layout. `None` keeps the current value.
    pub fn update_properties(
        &mut self,
        specification: Option<&SpanEquipmentSpecification>,
        name: Option<String>,
        marking_info: Option<MarkingInfo>,
        manufacturer_id: Option<Uuid>,
    ) -> UtilityNetworkCommandResult<()> {
        let equipment = self.require()?;

        let mut structure_specification_ids: Vec<Uuid> = equipment
            .span_structures
            .iter()
            .map(|s| s.specification_id)
            .collect();

        let specification_id = match specification {
            Some(spec) if spec.id != equipment.specification_id => {
                if spec.deprecated {
                    return Err(error(
                        Code::InvalidSpanEquipmentSpecification,
                        format!("Span equipment specification {} is deprecated", spec.id),
                    ));
                }
                let templates = flatten_templates(&spec.root_template);
                if templates.len() != equipment.span_structures.len() || spec.is_cable != equipment.is_cable {
                    return Err(error(
                        Code::SpanEquipmentSpecificationMismatch,
                        format!(
                            "Specification {} does not match the structures of span equipment {}",
                            spec.id, equipment.id
                        ),
                    ));
                }
                structure_specification_ids = templates
                    .iter()
                    .map(|(t, _)| t.span_structure_specification_id)
                    .collect();
                spec.id
            }
            _ => equipment.specification_id,
        };

        let name = name.or_else(|| equipment.name.clone());
        let marking_info = marking_info.or_else(|| equipment.marking_info.clone());
        let manufacturer_id = manufacturer_id.or(equipment.manufacturer_id);

        if specification_id == equipment.specification_id
            && name == equipment.name
            && marking_info == equipment.marking_info
            && manufacturer_id == equipment.manufacturer_id
        {
            return Err(error(
                Code::NoChange,
                format!("No properties of span equipment {} changed", equipment.id),
            ));
        }

        let span_equipment_id = equipment.id;
        self.raise(SpanEquipmentPropertiesUpdated {
            span_equipment_id,
            specification_id,
            structure_specification_ids,
            name,
            marking_info,
            manufacturer_id,
        });
        Ok(())
    }
}

impl AggregateRoot for SpanEquipmentAggregate {
    fn id(&self) -> Uuid {
        self.state.id
    }

    fn version(&self) -> u64 {
        self.state.version
    }
}

impl EventSourcedAggregate for SpanEquipmentAggregate {
    type Event = SpanEquipmentEvent;

    fn empty(id: Uuid) -> Self {
        Self {
            state: AggregateState::new(id),
        }
    }

    fn apply(&mut self, event: &SpanEquipmentEvent) {
        self.state.snapshot = apply_span_equipment_event(self.state.snapshot.take(), event);
        self.state.version += 1;
    }

    fn extract(event: &UtilityNetworkEvent) -> Option<&SpanEquipmentEvent> {
        match event {
            UtilityNetworkEvent::SpanEquipment(e) => Some(e),
            _ => None,
        }
    }

    fn uncommitted_events(&self) -> &[SpanEquipmentEvent] {
        &self.state.uncommitted
    }

    fn mark_committed(&mut self, version: u64) -> Vec<SpanEquipmentEvent> {
        self.state.mark_committed(version)
    }
}

/// Chain parent segments into one hop. Consecutive segments must share a
/// route node; the hop runs from the free end of the first segment to the
/// free end of the last.
pub fn build_hop(parents: &[ParentSegmentEnds]) -> UtilityNetworkCommandResult<UtilityNetworkHop> {
    let not_adjacent = |id: Uuid| {
        error(
            Code::ParentSpanSegmentsNotAdjacent,
            format!("Parent span segment {id} does not continue the previous one"),
        )
    };

    let first = parents
        .first()
        .ok_or_else(|| error(Code::SpanSegmentNotFound, "No parent span segments given"))?;

    let first_forward = match parents.get(1) {
        None => true,
        Some(next) => {
            let touches = |node: Uuid| node == next.from_route_node_id || node == next.to_route_node_id;
            if touches(first.to_route_node_id) {
                true
            } else if touches(first.from_route_node_id) {
                false
            } else {
                return Err(not_adjacent(next.span_segment_id));
            }
        }
    };

    let (from_node_id, mut current) = if first_forward {
        (first.from_route_node_id, first.to_route_node_id)
    } else {
        (first.to_route_node_id, first.from_route_node_id)
    };
    let mut parent_affixes = vec![SpanEquipmentSpanEquipmentAffix {
        span_segment_id: first.span_segment_id,
        direction: if first_forward {
            SpanEquipmentAffixDirection::Forward
        } else {
            SpanEquipmentAffixDirection::Backward
        },
    }];

    for parent in &parents[1..] {
        let direction = if parent.from_route_node_id == current {
            current = parent.to_route_node_id;
            SpanEquipmentAffixDirection::Forward
        } else if parent.to_route_node_id == current {
            current = parent.from_route_node_id;
            SpanEquipmentAffixDirection::Backward
        } else {
            return Err(not_adjacent(parent.span_segment_id));
        };
        parent_affixes.push(SpanEquipmentSpanEquipmentAffix {
            span_segment_id: parent.span_segment_id,
            direction,
        });
    }

    Ok(UtilityNetworkHop {
        from_node_id,
        to_node_id: current,
        parent_affixes,
    })
}

/// Structure templates depth first, paired with their parent position
fn flatten_templates(root: &SpanStructureTemplate) -> Vec<(&SpanStructureTemplate, u16)> {
    let mut out = vec![(root, 0)];
    let mut stack: Vec<&SpanStructureTemplate> = vec![root];
    while let Some(parent) = stack.pop() {
        for child in &parent.child_templates {
            out.push((child, parent.position));
        }
        stack.extend(parent.child_templates.iter().rev());
    }
    out
}

enum WalkEnd {
    First,
    Last,
}

fn end_of_walk(equipment: &SpanEquipment, route_node_id: Uuid) -> Option<WalkEnd> {
    if equipment.from_route_node_id() == Some(route_node_id) {
        Some(WalkEnd::First)
    } else if equipment.to_route_node_id() == Some(route_node_id) {
        Some(WalkEnd::Last)
    } else {
        None
    }
}

/// Node of interest order and structures of a span equipment, optionally
/// walked backwards
struct Oriented {
    node_of_interest_ids: Vec<Uuid>,
    route_node_ids: Vec<Uuid>,
    span_structures: Vec<SpanStructure>,
}

impl Oriented {
    fn of(equipment: &SpanEquipment, reverse: bool) -> Self {
        if !reverse {
            return Self {
                node_of_interest_ids: equipment.node_of_interest_ids.clone(),
                route_node_ids: equipment.route_node_ids.clone(),
                span_structures: equipment.span_structures.clone(),
            };
        }

        let last = (equipment.node_of_interest_ids.len() - 1) as u16;
        Self {
            node_of_interest_ids: equipment.node_of_interest_ids.iter().rev().copied().collect(),
            route_node_ids: equipment.route_node_ids.iter().rev().copied().collect(),
            span_structures: equipment
                .span_structures
                .iter()
                .map(|s| SpanStructure {
                    span_segments: s
                        .span_segments
                        .iter()
                        .rev()
                        .map(|seg| SpanSegment {
                            id: seg.id,
                            from_node_of_interest_index: last - seg.to_node_of_interest_index,
                            to_node_of_interest_index: last - seg.from_node_of_interest_index,
                            from_terminal_id: seg.to_terminal_id,
                            to_terminal_id: seg.from_terminal_id,
                        })
                        .collect(),
                    ..s.clone()
                })
                .collect(),
        }
    }
}

/// Join the segments of two oriented structures meeting at `merge_index`.
/// The last segment of the first absorbs the first segment of the second
/// and the merge node stops being a node of interest.
fn fuse_segments(first: &[SpanSegment], second: &[SpanSegment], merge_index: u16) -> Vec<SpanSegment> {
    let shift = |index: u16| if index > merge_index { index - 1 } else { index };

    let mut segments: Vec<SpanSegment> = first.to_vec();
    let (Some(last), Some(head)) = (segments.pop(), second.first()) else {
        return first.to_vec();
    };

    segments.push(SpanSegment {
        to_node_of_interest_index: head.to_node_of_interest_index + merge_index,
        to_terminal_id: head.to_terminal_id,
        ..last
    });
    segments.extend(second.iter().skip(1).map(|s| SpanSegment {
        from_node_of_interest_index: s.from_node_of_interest_index + merge_index,
        to_node_of_interest_index: s.to_node_of_interest_index + merge_index,
        ..*s
    }));

    segments
        .into_iter()
        .map(|s| SpanSegment {
            from_node_of_interest_index: shift(s.from_node_of_interest_index),
            to_node_of_interest_index: shift(s.to_node_of_interest_index),
            ..s
        })
        .collect()
}
