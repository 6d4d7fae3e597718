//! Utility network queries
//!
//! Queries provide read-only access to the utility network. They operate on
//! the projection and the route network rather than on aggregates.

use crate::commands::UtilityNetworkCommandError;
use crate::graph::{TraceMode, TraceResult, UtilityGraphError};
use crate::projections::UtilityNetworkProjection;
use crate::route_network::{
    RouteNetworkElementFilterOptions, RouteNetworkElementInfo, RouteNetworkError,
    RouteNetworkQueries,
};
use crate::value_objects::{NodeContainer, SpanEquipment, TerminalEquipment};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Query result type
pub type UtilityNetworkQueryResult<T> = Result<T, UtilityNetworkQueryError>;

/// Errors that can occur during utility network queries
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UtilityNetworkQueryError {
    #[error("Span equipment {0} not found")]
    SpanEquipmentNotFound(Uuid),

    #[error("Terminal equipment {0} not found")]
    TerminalEquipmentNotFound(Uuid),

    #[error("Node container {0} not found")]
    NodeContainerNotFound(Uuid),

    #[error(transparent)]
    RouteNetwork(#[from] RouteNetworkError),

    #[error(transparent)]
    Graph(#[from] UtilityGraphError),
}

/// Errors carrying a stable code for API consumers
pub trait CodedError: Display {
    fn error_code(&self) -> &'static str;
}

impl CodedError for UtilityNetworkQueryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::SpanEquipmentNotFound(_) => "SPAN_EQUIPMENT_NOT_FOUND",
            Self::TerminalEquipmentNotFound(_) => "TERMINAL_EQUIPMENT_NOT_FOUND",
            Self::NodeContainerNotFound(_) => "NODE_CONTAINER_NOT_FOUND",
            Self::RouteNetwork(e) => e.code().as_str(),
            Self::Graph(_) => "UTILITY_GRAPH_CORRUPTION",
        }
    }
}

impl CodedError for UtilityNetworkCommandError {
    fn error_code(&self) -> &'static str {
        UtilityNetworkCommandError::error_code(self)
    }
}

/// Uniform success/failure wrapper for API consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope<T> {
    pub success: bool,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub value: Option<T>,
}

impl<T> ResultEnvelope<T> {
    pub fn ok(value: T) -> Self {
        Self {
            success: true,
            error_code: None,
            error_message: None,
            value: Some(value),
        }
    }

    pub fn from_result<E: CodedError>(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::ok(value),
            Err(e) => Self {
                success: false,
                error_code: Some(e.error_code().to_string()),
                error_message: Some(e.to_string()),
                value: None,
            },
        }
    }
}

/// Everything placed at one route node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentAtRouteNode {
    pub route_node_id: Uuid,
    pub node_container: Option<NodeContainer>,
    pub terminal_equipment: Vec<TerminalEquipment>,
    /// Span equipment with a node of interest at the route node
    pub span_equipment_ids: Vec<Uuid>,
}

/// Parent and child span equipment of a span equipment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedSpanEquipment {
    /// Span equipment this one is routed through
    pub parent_ids: Vec<Uuid>,
    /// Span equipment routed through this one
    pub child_ids: Vec<Uuid>,
}

/// Trait for utility network query operations
#[async_trait]
pub trait UtilityNetworkQueryHandler: Send + Sync {
    /// Trace from a span segment or terminal
    async fn trace(&self, element_id: Uuid, mode: TraceMode) -> UtilityNetworkQueryResult<TraceResult>;

    async fn get_span_equipment(&self, span_equipment_id: Uuid) -> UtilityNetworkQueryResult<SpanEquipment>;

    async fn get_terminal_equipment(&self, terminal_equipment_id: Uuid) -> UtilityNetworkQueryResult<TerminalEquipment>;

    async fn get_node_container(&self, node_container_id: Uuid) -> UtilityNetworkQueryResult<NodeContainer>;

    async fn get_equipment_at_route_node(&self, route_node_id: Uuid) -> UtilityNetworkQueryResult<EquipmentAtRouteNode>;

    async fn get_related_span_equipment(&self, span_equipment_id: Uuid) -> UtilityNetworkQueryResult<RelatedSpanEquipment>;

    async fn get_route_network_elements(
        &self,
        element_ids: &[Uuid],
        options: RouteNetworkElementFilterOptions,
    ) -> UtilityNetworkQueryResult<Vec<RouteNetworkElementInfo>>;

    /// Alternating node and segment ids between two route nodes
    async fn shortest_path_between_route_nodes(
        &self,
        from_route_node_id: Uuid,
        to_route_node_id: Uuid,
    ) -> UtilityNetworkQueryResult<Vec<Uuid>>;
}

/// Query handler reading from the utility network projection
pub struct UtilityNetworkQueryHandlerImpl {
    projection: Arc<UtilityNetworkProjection>,
    route_network: Arc<dyn RouteNetworkQueries>,
}

impl UtilityNetworkQueryHandlerImpl {
    pub fn new(projection: Arc<UtilityNetworkProjection>, route_network: Arc<dyn RouteNetworkQueries>) -> Self {
        Self {
            projection,
            route_network,
        }
    }
}

#[async_trait]
impl UtilityNetworkQueryHandler for UtilityNetworkQueryHandlerImpl {
    async fn trace(&self, element_id: Uuid, mode: TraceMode) -> UtilityNetworkQueryResult<TraceResult> {
        let graph = self.projection.graph();
        let result = match mode {
            TraceMode::Simple => graph.simple_trace(element_id)?,
            TraceMode::OutageView => graph.outage_view_trace(element_id)?,
        };
        debug!(
            element_id = %element_id,
            mode = ?mode,
            upstream = result.upstream.len(),
            downstream = result.downstream.len(),
            "Trace completed"
        );
        Ok(result)
    }

    async fn get_span_equipment(&self, span_equipment_id: Uuid) -> UtilityNetworkQueryResult<SpanEquipment> {
        self.projection
            .span_equipment(span_equipment_id)
            .ok_or(UtilityNetworkQueryError::SpanEquipmentNotFound(span_equipment_id))
    }

    async fn get_terminal_equipment(&self, terminal_equipment_id: Uuid) -> UtilityNetworkQueryResult<TerminalEquipment> {
        self.projection
            .terminal_equipment(terminal_equipment_id)
            .ok_or(UtilityNetworkQueryError::TerminalEquipmentNotFound(terminal_equipment_id))
    }

    async fn get_node_container(&self, node_container_id: Uuid) -> UtilityNetworkQueryResult<NodeContainer> {
        self.projection
            .node_container(node_container_id)
            .ok_or(UtilityNetworkQueryError::NodeContainerNotFound(node_container_id))
    }

    async fn get_equipment_at_route_node(&self, route_node_id: Uuid) -> UtilityNetworkQueryResult<EquipmentAtRouteNode> {
        let node_container = self.projection.node_container_at(route_node_id);
        let terminal_equipment = node_container
            .iter()
            .flat_map(|c| c.all_terminal_equipment_ids())
            .filter_map(|id| self.projection.terminal_equipment(id))
            .collect();
        Ok(EquipmentAtRouteNode {
            route_node_id,
            node_container,
            terminal_equipment,
            span_equipment_ids: self.projection.span_equipment_at_route_node(route_node_id),
        })
    }

    async fn get_related_span_equipment(&self, span_equipment_id: Uuid) -> UtilityNetworkQueryResult<RelatedSpanEquipment> {
        let equipment = self.get_span_equipment(span_equipment_id).await?;

        let mut parent_ids = Vec::new();
        for affix in equipment
            .utility_network_hops
            .iter()
            .flat_map(|hop| hop.parent_affixes.iter())
        {
            if let Some(parent) = self.projection.span_equipment_of_segment(affix.span_segment_id) {
                if !parent_ids.contains(&parent.id) {
                    parent_ids.push(parent.id);
                }
            }
        }

        Ok(RelatedSpanEquipment {
            parent_ids,
            child_ids: self.projection.children_of(&equipment),
        })
    }

    async fn get_route_network_elements(
        &self,
        element_ids: &[Uuid],
        options: RouteNetworkElementFilterOptions,
    ) -> UtilityNetworkQueryResult<Vec<RouteNetworkElementInfo>> {
        Ok(self
            .route_network
            .get_route_network_elements(element_ids, options)
            .await?)
    }

    async fn shortest_path_between_route_nodes(
        &self,
        from_route_node_id: Uuid,
        to_route_node_id: Uuid,
    ) -> UtilityNetworkQueryResult<Vec<Uuid>> {
        Ok(self
            .route_network
            .shortest_path_between_route_nodes(from_route_node_id, to_route_node_id)
            .await?)
    }
}
