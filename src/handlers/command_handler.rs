//! Utility network command handler
//!
//! Orchestrates commands spanning several aggregates and the route network.
//! Every command is validated completely before anything is stored; the
//! stored events are then fed to the projection and a change notification
//! is published.

use super::event_store::{AggregateRepository, EventStore};
use super::notifications::{NotificationPublisher, RouteNetworkElementContainedEquipmentUpdated};
use super::CommandHandler;
use crate::aggregate::{
    build_hop, AggregateRoot, NodeContainerAggregate, ParentSegmentEnds,
    SpanEquipmentAggregate, TerminalEquipmentAggregate,
};
use crate::commands::{
    NodeContainerErrorCode as ContainerCode, SpanEquipmentErrorCode as SpanCode,
    SpanSegmentTerminalPair, SubrackPlacementInfo, TerminalEquipmentErrorCode as TerminalCode,
    UtilityNetworkCommand, UtilityNetworkCommandError, UtilityNetworkCommandResult,
};
use crate::domain_events::UtilityNetworkEvent;
use crate::events::SpanSegmentToTerminalConnectInfo;
use crate::projections::UtilityNetworkProjection;
use crate::route_network::{RouteNetworkError, RouteNetworkQueries};
use crate::value_objects::{
    MarkingInfo, NodeContainer, NodeContainerSide, SpanEquipment, SpecificationCatalog,
    TerminalEquipment, TerminalStructureSpecification,
};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Default notification category
pub const EQUIPMENT_MODIFICATION_CATEGORY: &str = "EquipmentModification";

/// Stored events of one command and what they touched
#[derive(Debug, Default)]
struct Change {
    events: Vec<UtilityNetworkEvent>,
    route_network_element_ids: Vec<Uuid>,
    equipment_ids: Vec<Uuid>,
}

impl Change {
    fn at_route_node(events: Vec<UtilityNetworkEvent>, route_node_id: Uuid, equipment_ids: Vec<Uuid>) -> Self {
        Self {
            events,
            route_network_element_ids: vec![route_node_id],
            equipment_ids,
        }
    }
}

fn span_error(code: SpanCode, message: impl Into<String>) -> UtilityNetworkCommandError {
    UtilityNetworkCommandError::span_equipment(code, message)
}

fn terminal_error(code: TerminalCode, message: impl Into<String>) -> UtilityNetworkCommandError {
    UtilityNetworkCommandError::terminal_equipment(code, message)
}

fn container_error(code: ContainerCode, message: impl Into<String>) -> UtilityNetworkCommandError {
    UtilityNetworkCommandError::node_container(code, message)
}

fn span_snapshot(aggregate: &SpanEquipmentAggregate) -> UtilityNetworkCommandResult<SpanEquipment> {
    aggregate.snapshot().cloned().ok_or_else(|| {
        span_error(
            SpanCode::SpanEquipmentNotFound,
            format!("Span equipment {} not found", aggregate.id()),
        )
    })
}

fn terminal_snapshot(aggregate: &TerminalEquipmentAggregate) -> UtilityNetworkCommandResult<TerminalEquipment> {
    aggregate.snapshot().cloned().ok_or_else(|| {
        terminal_error(
            TerminalCode::TerminalEquipmentNotFound,
            format!("Terminal equipment {} not found", aggregate.id()),
        )
    })
}

fn container_snapshot(aggregate: &NodeContainerAggregate) -> UtilityNetworkCommandResult<NodeContainer> {
    aggregate.snapshot().cloned().ok_or_else(|| {
        container_error(
            ContainerCode::NodeContainerNotFound,
            format!("Node container {} not found", aggregate.id()),
        )
    })
}

/// Processes utility network commands against the event store, the route
/// network and the projection
pub struct UtilityNetworkCommandHandler {
    span_equipment: AggregateRepository<SpanEquipmentAggregate>,
    terminal_equipment: AggregateRepository<TerminalEquipmentAggregate>,
    node_containers: AggregateRepository<NodeContainerAggregate>,
    route_network: Arc<dyn RouteNetworkQueries>,
    projection: Arc<UtilityNetworkProjection>,
    specifications: Arc<SpecificationCatalog>,
    publisher: Arc<dyn NotificationPublisher>,
    notification_category: String,
    /// Commands are applied one at a time
    write_lock: Mutex<()>,
}

impl UtilityNetworkCommandHandler {
    pub fn new(
        event_store: Arc<dyn EventStore>,
        route_network: Arc<dyn RouteNetworkQueries>,
        projection: Arc<UtilityNetworkProjection>,
        specifications: Arc<SpecificationCatalog>,
        publisher: Arc<dyn NotificationPublisher>,
    ) -> Self {
        Self {
            span_equipment: AggregateRepository::new(event_store.clone()),
            terminal_equipment: AggregateRepository::new(event_store.clone()),
            node_containers: AggregateRepository::new(event_store),
            route_network,
            projection,
            specifications,
            publisher,
            notification_category: EQUIPMENT_MODIFICATION_CATEGORY.to_string(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_notification_category(mut self, category: impl Into<String>) -> Self {
        self.notification_category = category.into();
        self
    }

    pub fn projection(&self) -> &Arc<UtilityNetworkProjection> {
        &self.projection
    }

    /// Validate and execute a command. Returns the stored events.
    pub async fn handle(&self, command: UtilityNetworkCommand) -> UtilityNetworkCommandResult<Vec<UtilityNetworkEvent>> {
        let _guard = self.write_lock.lock().await;
        let command_name = command.name();
        debug!(command = command_name, "Handling utility network command");

        let change = match self.execute(command).await {
            Ok(change) => change,
            Err(e) => {
                if e.is_validation_error() {
                    info!(command = command_name, error_code = e.error_code(), error = %e, "Command rejected");
                } else {
                    error!(command = command_name, error = %e, "Command failed");
                }
                return Err(e);
            }
        };

        for event in &change.events {
            if let Err(e) = self.projection.apply(event) {
                error!(command = command_name, error = %e, "Stored event could not be projected");
                return Err(e.into());
            }
        }

        if !change.events.is_empty() {
            let notification = RouteNetworkElementContainedEquipmentUpdated::new(
                self.notification_category.clone(),
                command_name,
                change.route_network_element_ids,
                change.equipment_ids,
            );
            if let Err(e) = self.publisher.publish(notification).await {
                warn!(command = command_name, error = %e, "Change notification not delivered");
            }
        }

        debug!(command = command_name, events = change.events.len(), "Command handled");
        Ok(change.events)
    }

    async fn execute(&self, command: UtilityNetworkCommand) -> UtilityNetworkCommandResult<Change> {
        match command {
            UtilityNetworkCommand::PlaceSpanEquipmentInRouteNetwork {
                span_equipment_id,
                specification_id,
                walk,
                name,
                marking_info,
                manufacturer_id,
            } => {
                self.place_span_equipment(span_equipment_id, specification_id, &walk, name, marking_info, manufacturer_id)
                    .await
            }

            UtilityNetworkCommand::CutSpanSegmentsAtRouteNode {
                route_node_id,
                span_segment_ids,
            } => self.cut_span_segments(route_node_id, &span_segment_ids).await,

            UtilityNetworkCommand::ConnectSpanSegmentsAtRouteNode {
                route_node_id,
                span_segment_ids,
            } => {
                let pairs = self.pair_span_segments(&span_segment_ids)?;
                self.connect_segment_pairs(route_node_id, pairs).await
            }

            UtilityNetworkCommand::ConnectSpanSegmentsByIndexAtRouteNode {
                route_node_id,
                from_span_equipment_id,
                to_span_equipment_id,
                from_structure_index,
                to_structure_index,
                number_of_units,
            } => {
                if number_of_units == 0 {
                    return Err(span_error(SpanCode::InvalidNumberOfUnits, "Number of units must be at least 1"));
                }
                let from = span_snapshot(&self.span_equipment.load(from_span_equipment_id).await?)?;
                let to = span_snapshot(&self.span_equipment.load(to_span_equipment_id).await?)?;
                let mut pairs = Vec::with_capacity(number_of_units as usize);
                for i in 0..number_of_units {
                    pairs.push((
                        segment_ending_at(&from, from_structure_index + i, route_node_id)?,
                        segment_ending_at(&to, to_structure_index + i, route_node_id)?,
                    ));
                }
                self.connect_segment_pairs(route_node_id, pairs).await
            }

            UtilityNetworkCommand::ConnectSpanSegmentsWithTerminalsAtRouteNode { route_node_id, connects } => {
                self.connect_to_terminals(route_node_id, &connects).await
            }

            UtilityNetworkCommand::DisconnectSpanSegmentsAtRouteNode {
                route_node_id,
                span_segment_ids,
            } => {
                let mut aggregates = self.load_segment_owners(&span_segment_ids).await?;
                let mut disconnects: IndexMap<Uuid, Vec<SpanSegmentToTerminalConnectInfo>> = IndexMap::new();
                for segment_id in &span_segment_ids {
                    let owner = self.owner_of_segment(*segment_id)?;
                    if let Some(aggregate) = aggregates.get(&owner) {
                        let info = aggregate.connection_at(*segment_id, route_node_id)?;
                        disconnects.entry(owner).or_default().push(info);
                    }
                }
                for (owner, infos) in disconnects {
                    if let Some(aggregate) = aggregates.get_mut(&owner) {
                        aggregate.disconnect_from_terminals(infos)?;
                    }
                }
                let events = self.save_span_equipment(aggregates.values_mut()).await?;
                Ok(Change::at_route_node(events, route_node_id, aggregates.keys().copied().collect()))
            }

            UtilityNetworkCommand::DisconnectSpanSegmentsFromTerminals { disconnects } => {
                let segment_ids: Vec<Uuid> = disconnects.iter().map(|d| d.span_segment_id).collect();
                let mut aggregates = self.load_segment_owners(&segment_ids).await?;
                let mut grouped: IndexMap<Uuid, Vec<SpanSegmentToTerminalConnectInfo>> = IndexMap::new();
                for pair in &disconnects {
                    grouped
                        .entry(self.owner_of_segment(pair.span_segment_id)?)
                        .or_default()
                        .push(SpanSegmentToTerminalConnectInfo {
                            segment_id: pair.span_segment_id,
                            terminal_id: pair.terminal_id,
                        });
                }
                for (owner, infos) in grouped {
                    if let Some(aggregate) = aggregates.get_mut(&owner) {
                        aggregate.disconnect_from_terminals(infos)?;
                    }
                }
                let events = self.save_span_equipment(aggregates.values_mut()).await?;
                let snapshots: Vec<SpanEquipment> = aggregates.values().filter_map(|a| a.snapshot().cloned()).collect();
                self.span_change(events, &snapshots).await
            }

            UtilityNetworkCommand::AffixSpanEquipmentToParent {
                span_equipment_id,
                parent_span_segment_ids,
            } => {
                let mut ends = Vec::with_capacity(parent_span_segment_ids.len());
                for segment_id in &parent_span_segment_ids {
                    ends.push(self.parent_segment_ends(span_equipment_id, *segment_id)?);
                }
                let hop = build_hop(&ends)?;

                let mut aggregate = self.span_equipment.load(span_equipment_id).await?;
                let equipment = span_snapshot(&aggregate)?;
                let walk = self.route_network.get_walk_of_interest(equipment.walk_of_interest_id).await?;
                aggregate.affix_to_parent(hop, &walk.walk.node_ids)?;
                self.save_single_span_equipment(aggregate).await
            }

            UtilityNetworkCommand::DetachSpanEquipmentFromParent {
                span_equipment_id,
                parent_span_segment_id,
            } => {
                let mut aggregate = self.span_equipment.load(span_equipment_id).await?;
                aggregate.detach_from_parent(parent_span_segment_id)?;
                self.save_single_span_equipment(aggregate).await
            }

            UtilityNetworkCommand::AffixSpanEquipmentToNodeContainer {
                span_equipment_id,
                node_container_id,
                ingoing_side,
            } => {
                self.affix_to_node_container(span_equipment_id, node_container_id, ingoing_side)
                    .await
            }

            UtilityNetworkCommand::DetachSpanEquipmentFromNodeContainer {
                span_equipment_id,
                node_container_id,
            } => {
                let mut aggregate = self.span_equipment.load(span_equipment_id).await?;
                aggregate.detach_from_node_container(node_container_id)?;
                self.save_single_span_equipment(aggregate).await
            }

            UtilityNetworkCommand::PlaceAdditionalStructuresInSpanEquipment {
                span_equipment_id,
                structure_specification_ids,
            } => {
                let mut aggregate = self.span_equipment.load(span_equipment_id).await?;
                aggregate.add_structures(&structure_specification_ids)?;
                self.save_single_span_equipment(aggregate).await
            }

            UtilityNetworkCommand::RemoveSpanStructureFromSpanEquipment { span_segment_id } => {
                let owner = self.owner_of_segment(span_segment_id)?;
                let mut aggregate = self.span_equipment.load(owner).await?;
                let before = span_snapshot(&aggregate)?;
                aggregate.remove_structure(span_segment_id)?;
                let events = self.span_equipment.save(&mut aggregate).await?;
                let change = self.span_change(events, std::slice::from_ref(&before)).await?;

                if aggregate.snapshot().is_none() {
                    let mut interests = vec![before.walk_of_interest_id];
                    interests.extend(&before.node_of_interest_ids);
                    self.unregister_interests(&interests).await;
                }
                Ok(change)
            }

            UtilityNetworkCommand::MergeSpanEquipment {
                route_node_id,
                span_equipment_id,
                merge_span_equipment_id,
            } => {
                self.merge_span_equipment(route_node_id, span_equipment_id, merge_span_equipment_id)
                    .await
            }

            UtilityNetworkCommand::UpdateSpanEquipmentProperties {
                span_equipment_id,
                specification_id,
                name,
                marking_info,
                manufacturer_id,
            } => {
                let specification = match specification_id {
                    Some(id) => Some(self.specifications.span_equipment(id).ok_or_else(|| {
                        span_error(
                            SpanCode::InvalidSpanEquipmentSpecification,
                            format!("Span equipment specification {id} not found"),
                        )
                    })?),
                    None => None,
                };
                let mut aggregate = self.span_equipment.load(span_equipment_id).await?;
                aggregate.update_properties(specification, name, marking_info, manufacturer_id)?;
                self.save_single_span_equipment(aggregate).await
            }

            UtilityNetworkCommand::PlaceNodeContainerInRouteNetwork {
                node_container_id,
                specification_id,
                route_node_id,
                manufacturer_id,
            } => {
                let specification = self.specifications.node_container(specification_id).ok_or_else(|| {
                    container_error(
                        ContainerCode::InvalidNodeContainerSpecification,
                        format!("Node container specification {specification_id} not found"),
                    )
                })?;
                if let Some(existing) = self.projection.node_container_at(route_node_id) {
                    return Err(container_error(
                        ContainerCode::NodeContainerAlreadyExistsInRouteNode,
                        format!("Route node {route_node_id} already holds node container {}", existing.id),
                    ));
                }

                let interest_id = Uuid::new_v4();
                let mut aggregate = self.node_containers.load(node_container_id).await?;
                aggregate.place(specification, route_node_id, interest_id, manufacturer_id)?;
                self.route_network
                    .register_node_of_interest(interest_id, route_node_id)
                    .await?;
                let events = self.node_containers.save(&mut aggregate).await?;
                Ok(Change::at_route_node(events, route_node_id, vec![node_container_id]))
            }

            UtilityNetworkCommand::UpdateNodeContainerProperties {
                node_container_id,
                specification_id,
                manufacturer_id,
            } => {
                let specification = match specification_id {
                    Some(id) => Some(self.specifications.node_container(id).ok_or_else(|| {
                        container_error(
                            ContainerCode::InvalidNodeContainerSpecification,
                            format!("Node container specification {id} not found"),
                        )
                    })?),
                    None => None,
                };
                self.with_node_container(node_container_id, |c| c.update_properties(specification, manufacturer_id))
                    .await
            }

            UtilityNetworkCommand::ReverseNodeContainerVerticalContentAlignment { node_container_id } => {
                self.with_node_container(node_container_id, |c| c.reverse_vertical_content_alignment())
                    .await
            }

            UtilityNetworkCommand::PlaceRackInNodeContainer {
                node_container_id,
                rack_id,
                specification_id,
                name,
                height_in_units,
            } => {
                let specification = self.specifications.rack(specification_id);
                self.with_node_container(node_container_id, |c| {
                    c.place_rack(rack_id, specification, name, height_in_units)
                })
                .await
            }

            UtilityNetworkCommand::PlaceTerminalEquipmentInNodeContainer {
                node_container_id,
                terminal_equipment_id,
                specification_id,
                number_of_equipment,
                name,
                manufacturer_id,
                subrack_placement,
            } => {
                self.place_terminal_equipment(
                    node_container_id,
                    terminal_equipment_id,
                    specification_id,
                    number_of_equipment,
                    name,
                    manufacturer_id,
                    subrack_placement,
                )
                .await
            }

            UtilityNetworkCommand::ArrangeRackEquipmentInNodeContainer {
                node_container_id,
                terminal_equipment_id,
                to_rack_id,
                to_start_unit,
            } => {
                self.with_node_container(node_container_id, |c| {
                    c.arrange_rack_equipment(terminal_equipment_id, to_rack_id, to_start_unit)
                })
                .await
            }

            UtilityNetworkCommand::PlaceAdditionalStructuresInTerminalEquipment {
                terminal_equipment_id,
                structure_specification_id,
                number_of_structures,
            } => {
                let specification = self.terminal_structure_specification(structure_specification_id)?;
                self.with_terminal_equipment(terminal_equipment_id, |t| {
                    t.add_structures(specification, number_of_structures)
                })
                .await
            }

            UtilityNetworkCommand::PlaceAdditionalStructureInTerminalEquipment {
                terminal_equipment_id,
                structure_specification_id,
                position,
                name,
            } => {
                let specification = self.terminal_structure_specification(structure_specification_id)?;
                self.with_terminal_equipment(terminal_equipment_id, |t| t.add_structure(specification, position, name))
                    .await
            }

            UtilityNetworkCommand::RemoveTerminalStructureFromTerminalEquipment {
                terminal_equipment_id,
                terminal_structure_id,
            } => {
                let graph = self.projection.graph();
                self.with_terminal_equipment(terminal_equipment_id, |t| t.remove_structure(terminal_structure_id, graph))
                    .await
            }

            UtilityNetworkCommand::UpdateTerminalEquipmentProperties {
                terminal_equipment_id,
                name,
                manufacturer_id,
            } => {
                self.with_terminal_equipment(terminal_equipment_id, |t| t.change_properties(name, manufacturer_id))
                    .await
            }

            UtilityNetworkCommand::RemoveTerminalEquipment { terminal_equipment_id } => {
                let mut terminal_equipment = self.terminal_equipment.load(terminal_equipment_id).await?;
                let equipment = terminal_snapshot(&terminal_equipment)?;
                terminal_equipment.remove(self.projection.graph())?;

                let mut container = self.node_containers.load(equipment.node_container_id).await?;
                container.remove_terminal_equipment_reference(terminal_equipment_id)?;

                let mut events = self.terminal_equipment.save(&mut terminal_equipment).await?;
                events.extend(self.node_containers.save(&mut container).await?);
                Ok(Change::at_route_node(
                    events,
                    equipment.route_node_id,
                    vec![terminal_equipment_id, equipment.node_container_id],
                ))
            }

            UtilityNetworkCommand::ConnectTerminalsAtRouteNode {
                route_node_id,
                from_terminal_id,
                to_terminal_id,
                fiber_coord_length,
            } => {
                let container = self.container_at(route_node_id)?;
                let mut equipment_ids = Vec::new();
                for terminal_id in [from_terminal_id, to_terminal_id] {
                    let owner = self
                        .projection
                        .terminal_equipment_of_terminal(terminal_id)
                        .filter(|owner| container.contains_terminal_equipment(owner.id))
                        .ok_or_else(|| {
                            container_error(
                                ContainerCode::TerminalNotFound,
                                format!("Terminal {terminal_id} not found in node container {}", container.id),
                            )
                        })?;
                    equipment_ids.push(owner.id);
                }

                let mut aggregate = self.node_containers.load(container.id).await?;
                aggregate.connect_terminals(from_terminal_id, to_terminal_id, fiber_coord_length, self.projection.graph())?;
                let events = self.node_containers.save(&mut aggregate).await?;
                equipment_ids.push(container.id);
                Ok(Change::at_route_node(events, route_node_id, equipment_ids))
            }

            UtilityNetworkCommand::DisconnectTerminalsAtRouteNode {
                route_node_id,
                from_terminal_id,
                to_terminal_id,
            } => {
                let container = self.container_at(route_node_id)?;
                self.with_node_container(container.id, |c| c.disconnect_terminals(from_terminal_id, to_terminal_id))
                    .await
            }

            UtilityNetworkCommand::RemoveNodeContainerFromRouteNetwork { node_container_id } => {
                let mut aggregate = self.node_containers.load(node_container_id).await?;
                let container = container_snapshot(&aggregate)?;
                let affixed = !self
                    .projection
                    .span_equipment_affixed_to_container(node_container_id)
                    .is_empty();
                aggregate.remove(affixed)?;
                let events = self.node_containers.save(&mut aggregate).await?;
                self.unregister_interests(&[container.interest_id]).await;
                Ok(Change::at_route_node(events, container.route_node_id, vec![node_container_id]))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn place_span_equipment(
        &self,
        span_equipment_id: Uuid,
        specification_id: Uuid,
        walk: &[Uuid],
        name: Option<String>,
        marking_info: Option<MarkingInfo>,
        manufacturer_id: Option<Uuid>,
    ) -> UtilityNetworkCommandResult<Change> {
        let specification = self.specifications.span_equipment(specification_id).ok_or_else(|| {
            span_error(
                SpanCode::InvalidSpanEquipmentSpecification,
                format!("Span equipment specification {specification_id} not found"),
            )
        })?;
        let validated = self.route_network.validate_walk(walk).await?;
        let (from_node_id, to_node_id) = validated
            .from_node_id()
            .zip(validated.to_node_id())
            .ok_or(RouteNetworkError::InvalidWalkCannotBeEmpty)?;

        let walk_of_interest_id = Uuid::new_v4();
        let from_interest_id = Uuid::new_v4();
        let to_interest_id = Uuid::new_v4();

        let mut aggregate = self.span_equipment.load(span_equipment_id).await?;
        aggregate.place(
            specification,
            walk_of_interest_id,
            (from_interest_id, from_node_id),
            (to_interest_id, to_node_id),
            name,
            marking_info,
            manufacturer_id,
        )?;

        let placed = async {
            self.route_network
                .register_walk_of_interest(walk_of_interest_id, walk)
                .await?;
            self.route_network
                .register_node_of_interest(from_interest_id, from_node_id)
                .await?;
            self.route_network
                .register_node_of_interest(to_interest_id, to_node_id)
                .await?;
            self.span_equipment.save(&mut aggregate).await
        }
        .await;

        // Interests only live as long as the equipment referencing them
        let events = match placed {
            Ok(events) => events,
            Err(e) => {
                self.unregister_interests(&[walk_of_interest_id, from_interest_id, to_interest_id])
                    .await;
                return Err(e);
            }
        };
        Ok(Change {
            events,
            route_network_element_ids: validated.element_ids(),
            equipment_ids: vec![span_equipment_id],
        })
    }

    async fn cut_span_segments(
        &self,
        route_node_id: Uuid,
        span_segment_ids: &[Uuid],
    ) -> UtilityNetworkCommandResult<Change> {
        let first = span_segment_ids
            .first()
            .ok_or_else(|| span_error(SpanCode::SpanSegmentNotFound, "No span segments to cut"))?;
        let owner = self.owner_of_segment(*first)?;

        let mut aggregate = self.span_equipment.load(owner).await?;
        let equipment = span_snapshot(&aggregate)?;
        let walk = self.route_network.get_walk_of_interest(equipment.walk_of_interest_id).await?;

        let plan = aggregate.plan_cut(route_node_id, &walk.walk.node_ids, span_segment_ids)?;
        let node_of_interest_id = Uuid::new_v4();
        aggregate.cut(&plan, node_of_interest_id)?;
        if plan.requires_new_node_of_interest {
            self.route_network
                .register_node_of_interest(node_of_interest_id, route_node_id)
                .await?;
        }

        let events = self.span_equipment.save(&mut aggregate).await?;
        Ok(Change {
            events,
            route_network_element_ids: walk.walk.element_ids(),
            equipment_ids: vec![owner],
        })
    }

    /// Pair segments for segment to segment joins. Segments of two span
    /// equipment pair in order, segments of one pair consecutively.
    fn pair_span_segments(&self, span_segment_ids: &[Uuid]) -> UtilityNetworkCommandResult<Vec<(Uuid, Uuid)>> {
        let mut by_owner: IndexMap<Uuid, Vec<Uuid>> = IndexMap::new();
        for segment_id in span_segment_ids {
            by_owner
                .entry(self.owner_of_segment(*segment_id)?)
                .or_default()
                .push(*segment_id);
        }

        let groups: Vec<&Vec<Uuid>> = by_owner.values().collect();
        match groups.as_slice() {
            [single] => {
                if single.len() % 2 != 0 {
                    return Err(span_error(
                        SpanCode::ExpectedEvenNumberOfSpanSegments,
                        format!("Expected an even number of span segments, got {}", single.len()),
                    ));
                }
                Ok(single.chunks(2).map(|pair| (pair[0], pair[1])).collect())
            }
            [from, to] => {
                if from.len() != to.len() {
                    return Err(span_error(
                        SpanCode::ExpectedSameNumberOfSpanSegments,
                        format!(
                            "Expected the same number of span segments from both span equipment, got {} and {}",
                            from.len(),
                            to.len()
                        ),
                    ));
                }
                Ok(from.iter().copied().zip(to.iter().copied()).collect())
            }
            _ => Err(span_error(
                SpanCode::ExpectedSpanSegmentsFromOneOrTwoSpanEquipment,
                format!("Span segments belong to {} span equipment", groups.len()),
            )),
        }
    }

    /// Join each pair of segment ends through a new simple terminal
    async fn connect_segment_pairs(
        &self,
        route_node_id: Uuid,
        pairs: Vec<(Uuid, Uuid)>,
    ) -> UtilityNetworkCommandResult<Change> {
        let mut connects: IndexMap<Uuid, Vec<SpanSegmentToTerminalConnectInfo>> = IndexMap::new();
        for (from_segment_id, to_segment_id) in pairs {
            let terminal_id = Uuid::new_v4();
            for segment_id in [from_segment_id, to_segment_id] {
                connects
                    .entry(self.owner_of_segment(segment_id)?)
                    .or_default()
                    .push(SpanSegmentToTerminalConnectInfo {
                        segment_id,
                        terminal_id,
                    });
            }
        }

        let mut aggregates = IndexMap::new();
        for (owner, infos) in connects {
            let mut aggregate = self.span_equipment.load(owner).await?;
            aggregate.connect_to_simple_terminals(route_node_id, infos)?;
            aggregates.insert(owner, aggregate);
        }

        let events = self.save_span_equipment(aggregates.values_mut()).await?;
        Ok(Change::at_route_node(events, route_node_id, aggregates.keys().copied().collect()))
    }

    async fn connect_to_terminals(
        &self,
        route_node_id: Uuid,
        pairs: &[SpanSegmentTerminalPair],
    ) -> UtilityNetworkCommandResult<Change> {
        let graph = self.projection.graph();
        let mut pending: HashMap<Uuid, usize> = HashMap::new();
        let mut equipment_ids = Vec::new();
        let mut connects: IndexMap<Uuid, Vec<SpanSegmentToTerminalConnectInfo>> = IndexMap::new();

        for pair in pairs {
            let terminal_equipment = self
                .projection
                .terminal_equipment_of_terminal(pair.terminal_id)
                .ok_or_else(|| {
                    span_error(SpanCode::TerminalNotFound, format!("Terminal {} not found", pair.terminal_id))
                })?;
            if terminal_equipment.route_node_id != route_node_id {
                return Err(span_error(
                    SpanCode::TerminalNotAtRouteNode,
                    format!("Terminal {} is not located at route node {route_node_id}", pair.terminal_id),
                ));
            }

            let count = pending.entry(pair.terminal_id).or_insert(0);
            *count += 1;
            if graph.non_internal_neighbor_count(pair.terminal_id) + *count > 2 {
                return Err(span_error(
                    SpanCode::TerminalAlreadyConnected,
                    format!("Terminal {} cannot take another connection", pair.terminal_id),
                ));
            }

            if !equipment_ids.contains(&terminal_equipment.id) {
                equipment_ids.push(terminal_equipment.id);
            }
            connects
                .entry(self.owner_of_segment(pair.span_segment_id)?)
                .or_default()
                .push(SpanSegmentToTerminalConnectInfo {
                    segment_id: pair.span_segment_id,
                    terminal_id: pair.terminal_id,
                });
        }

        let mut aggregates = IndexMap::new();
        for (owner, infos) in connects {
            let mut aggregate = self.span_equipment.load(owner).await?;
            aggregate.connect_to_terminals(route_node_id, infos)?;
            aggregates.insert(owner, aggregate);
        }

        let events = self.save_span_equipment(aggregates.values_mut()).await?;
        equipment_ids.extend(aggregates.keys());
        Ok(Change::at_route_node(events, route_node_id, equipment_ids))
    }

    fn parent_segment_ends(
        &self,
        span_equipment_id: Uuid,
        parent_span_segment_id: Uuid,
    ) -> UtilityNetworkCommandResult<ParentSegmentEnds> {
        let not_found = || {
            span_error(
                SpanCode::SpanSegmentNotFound,
                format!("Parent span segment {parent_span_segment_id} not found"),
            )
        };
        let parent = self
            .projection
            .span_equipment_of_segment(parent_span_segment_id)
            .ok_or_else(not_found)?;
        if parent.id == span_equipment_id {
            return Err(span_error(
                SpanCode::CannotAffixSpanEquipmentToItself,
                format!("Span equipment {span_equipment_id} cannot be affixed to its own segments"),
            ));
        }

        let (_, _, segment) = parent.find_segment(parent_span_segment_id).ok_or_else(not_found)?;
        let from_route_node_id = parent
            .route_node_at(segment.from_node_of_interest_index)
            .ok_or_else(not_found)?;
        let to_route_node_id = parent
            .route_node_at(segment.to_node_of_interest_index)
            .ok_or_else(not_found)?;
        Ok(ParentSegmentEnds {
            span_segment_id: parent_span_segment_id,
            from_route_node_id,
            to_route_node_id,
        })
    }

    async fn affix_to_node_container(
        &self,
        span_equipment_id: Uuid,
        node_container_id: Uuid,
        ingoing_side: NodeContainerSide,
    ) -> UtilityNetworkCommandResult<Change> {
        let container = container_snapshot(&self.node_containers.load(node_container_id).await?)?;
        let mut aggregate = self.span_equipment.load(span_equipment_id).await?;
        let equipment = span_snapshot(&aggregate)?;
        let walk = self.route_network.get_walk_of_interest(equipment.walk_of_interest_id).await?;

        aggregate.affix_to_node_container(&container, ingoing_side, &walk.walk.node_ids)?;
        let events = self.span_equipment.save(&mut aggregate).await?;
        Ok(Change::at_route_node(
            events,
            container.route_node_id,
            vec![span_equipment_id, node_container_id],
        ))
    }

    async fn merge_span_equipment(
        &self,
        route_node_id: Uuid,
        span_equipment_id: Uuid,
        merge_span_equipment_id: Uuid,
    ) -> UtilityNetworkCommandResult<Change> {
        let mut survivor = self.span_equipment.load(span_equipment_id).await?;
        let survivor_snapshot = span_snapshot(&survivor)?;
        let mut merged = self.span_equipment.load(merge_span_equipment_id).await?;
        let merged_snapshot = span_snapshot(&merged)?;

        let plan = survivor.plan_merge(&merged_snapshot, route_node_id)?;

        let survivor_walk = self
            .route_network
            .get_walk_of_interest(survivor_snapshot.walk_of_interest_id)
            .await?
            .walk;
        let merged_walk = self
            .route_network
            .get_walk_of_interest(merged_snapshot.walk_of_interest_id)
            .await?
            .walk;
        let survivor_walk = if plan.reverse_survivor_walk { survivor_walk.reversed() } else { survivor_walk };
        let merged_walk = if plan.reverse_merged_walk { merged_walk.reversed() } else { merged_walk };

        let mut segment_ids = survivor_walk.segment_ids;
        segment_ids.extend(merged_walk.segment_ids);
        let walk_of_interest_id = Uuid::new_v4();
        let walk = self
            .route_network
            .register_walk_of_interest(walk_of_interest_id, &segment_ids)
            .await?;

        let dropped = plan.dropped_node_of_interest_ids.clone();
        survivor.merge(plan, walk_of_interest_id)?;
        merged.merged_into(span_equipment_id)?;

        let mut events = self.span_equipment.save(&mut survivor).await?;
        events.extend(self.span_equipment.save(&mut merged).await?);

        let mut retired = vec![survivor_snapshot.walk_of_interest_id, merged_snapshot.walk_of_interest_id];
        retired.extend(dropped);
        self.unregister_interests(&retired).await;

        Ok(Change {
            events,
            route_network_element_ids: walk.walk.element_ids(),
            equipment_ids: vec![span_equipment_id, merge_span_equipment_id],
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn place_terminal_equipment(
        &self,
        node_container_id: Uuid,
        terminal_equipment_id: Uuid,
        specification_id: Uuid,
        number_of_equipment: u16,
        name: Option<String>,
        manufacturer_id: Option<Uuid>,
        subrack_placement: Option<SubrackPlacementInfo>,
    ) -> UtilityNetworkCommandResult<Change> {
        if number_of_equipment == 0 {
            return Err(container_error(
                ContainerCode::InvalidNumberOfEquipment,
                "Number of equipment must be at least 1",
            ));
        }
        let specification = self.specifications.terminal_equipment(specification_id).ok_or_else(|| {
            terminal_error(
                TerminalCode::InvalidTerminalEquipmentSpecification,
                format!("Terminal equipment specification {specification_id} not found"),
            )
        })?;

        let mut container = self.node_containers.load(node_container_id).await?;
        let route_node_id = container_snapshot(&container)?.route_node_id;

        let ids: Vec<Uuid> = std::iter::once(terminal_equipment_id)
            .chain((1..number_of_equipment).map(|_| Uuid::new_v4()))
            .collect();
        container.add_terminal_equipment(&ids, specification, subrack_placement)?;

        let mut placed = Vec::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            let equipment_name = if number_of_equipment > 1 {
                name.as_ref().map(|prefix| format!("{prefix} {}", i + 1))
            } else {
                name.clone()
            };
            let mut aggregate = self.terminal_equipment.load(*id).await?;
            aggregate.place(
                specification,
                &self.specifications,
                node_container_id,
                route_node_id,
                equipment_name,
                manufacturer_id,
            )?;
            placed.push(aggregate);
        }

        let mut events = Vec::new();
        for aggregate in &mut placed {
            events.extend(self.terminal_equipment.save(aggregate).await?);
        }
        events.extend(self.node_containers.save(&mut container).await?);

        let mut equipment_ids = ids;
        equipment_ids.push(node_container_id);
        Ok(Change::at_route_node(events, route_node_id, equipment_ids))
    }

    async fn with_node_container<F>(&self, node_container_id: Uuid, command: F) -> UtilityNetworkCommandResult<Change>
    where
        F: FnOnce(&mut NodeContainerAggregate) -> UtilityNetworkCommandResult<()>,
    {
        let mut aggregate = self.node_containers.load(node_container_id).await?;
        command(&mut aggregate)?;
        let route_node_id = container_snapshot(&aggregate)?.route_node_id;
        let events = self.node_containers.save(&mut aggregate).await?;
        Ok(Change::at_route_node(events, route_node_id, vec![node_container_id]))
    }

    async fn with_terminal_equipment<F>(&self, terminal_equipment_id: Uuid, command: F) -> UtilityNetworkCommandResult<Change>
    where
        F: FnOnce(&mut TerminalEquipmentAggregate) -> UtilityNetworkCommandResult<()>,
    {
        let mut aggregate = self.terminal_equipment.load(terminal_equipment_id).await?;
        command(&mut aggregate)?;
        let route_node_id = terminal_snapshot(&aggregate)?.route_node_id;
        let events = self.terminal_equipment.save(&mut aggregate).await?;
        Ok(Change::at_route_node(events, route_node_id, vec![terminal_equipment_id]))
    }

    async fn save_single_span_equipment(&self, mut aggregate: SpanEquipmentAggregate) -> UtilityNetworkCommandResult<Change> {
        let events = self.span_equipment.save(&mut aggregate).await?;
        let snapshots: Vec<SpanEquipment> = aggregate.snapshot().cloned().into_iter().collect();
        self.span_change(events, &snapshots).await
    }

    async fn save_span_equipment<'a>(
        &self,
        aggregates: impl Iterator<Item = &'a mut SpanEquipmentAggregate>,
    ) -> UtilityNetworkCommandResult<Vec<UtilityNetworkEvent>> {
        let mut events = Vec::new();
        for aggregate in aggregates {
            events.extend(self.span_equipment.save(aggregate).await?);
        }
        Ok(events)
    }

    /// Change touching the walks of the given span equipment
    async fn span_change(
        &self,
        events: Vec<UtilityNetworkEvent>,
        span_equipment: &[SpanEquipment],
    ) -> UtilityNetworkCommandResult<Change> {
        let mut route_network_element_ids = Vec::new();
        for equipment in span_equipment {
            match self.route_network.get_walk_of_interest(equipment.walk_of_interest_id).await {
                Ok(walk) => route_network_element_ids.extend(walk.walk.element_ids()),
                Err(e) => {
                    debug!(span_equipment_id = %equipment.id, error = %e, "Walk of interest unavailable");
                    route_network_element_ids.extend(&equipment.route_node_ids);
                }
            }
        }
        Ok(Change {
            events,
            route_network_element_ids,
            equipment_ids: span_equipment.iter().map(|e| e.id).collect(),
        })
    }

    async fn load_segment_owners(
        &self,
        span_segment_ids: &[Uuid],
    ) -> UtilityNetworkCommandResult<IndexMap<Uuid, SpanEquipmentAggregate>> {
        let mut aggregates = IndexMap::new();
        for segment_id in span_segment_ids {
            let owner = self.owner_of_segment(*segment_id)?;
            if !aggregates.contains_key(&owner) {
                aggregates.insert(owner, self.span_equipment.load(owner).await?);
            }
        }
        Ok(aggregates)
    }

    fn owner_of_segment(&self, span_segment_id: Uuid) -> UtilityNetworkCommandResult<Uuid> {
        self.projection
            .span_equipment_of_segment(span_segment_id)
            .map(|e| e.id)
            .ok_or_else(|| span_error(SpanCode::SpanSegmentNotFound, format!("Span segment {span_segment_id} not found")))
    }

    fn container_at(&self, route_node_id: Uuid) -> UtilityNetworkCommandResult<NodeContainer> {
        self.projection.node_container_at(route_node_id).ok_or_else(|| {
            container_error(
                ContainerCode::NodeContainerNotFound,
                format!("No node container at route node {route_node_id}"),
            )
        })
    }

    fn terminal_structure_specification(
        &self,
        specification_id: Uuid,
    ) -> UtilityNetworkCommandResult<&TerminalStructureSpecification> {
        self.specifications.terminal_structure(specification_id).ok_or_else(|| {
            terminal_error(
                TerminalCode::InvalidTerminalStructureSpecification,
                format!("Terminal structure specification {specification_id} not found"),
            )
        })
    }

    /// Interests are released after the events are stored; a failure leaves
    /// a stale interest behind and is only logged
    async fn unregister_interests(&self, interest_ids: &[Uuid]) {
        for interest_id in interest_ids {
            if let Err(e) = self.route_network.unregister_interest(*interest_id).await {
                warn!(interest_id = %interest_id, error = %e, "Interest could not be unregistered");
            }
        }
    }
}

/// Segment of a structure with an end at the route node
fn segment_ending_at(
    equipment: &SpanEquipment,
    structure_index: u16,
    route_node_id: Uuid,
) -> UtilityNetworkCommandResult<Uuid> {
    let structure = equipment
        .span_structures
        .get(structure_index as usize)
        .filter(|s| !s.deleted)
        .ok_or_else(|| {
            span_error(
                SpanCode::StructureIndexOutOfRange,
                format!("Span equipment {} has no structure at index {structure_index}", equipment.id),
            )
        })?;
    structure
        .span_segments
        .iter()
        .find(|s| equipment.segment_end_at(s, route_node_id).is_some())
        .map(|s| s.id)
        .ok_or_else(|| {
            span_error(
                SpanCode::SpanSegmentEndNotAtRouteNode,
                format!(
                    "No segment of structure {structure_index} of span equipment {} ends at route node {route_node_id}",
                    equipment.id
                ),
            )
        })
}

#[async_trait]
impl CommandHandler for UtilityNetworkCommandHandler {
    async fn handle_command(&self, command: UtilityNetworkCommand) -> UtilityNetworkCommandResult<Vec<UtilityNetworkEvent>> {
        self.handle(command).await
    }
}
