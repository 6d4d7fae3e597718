//! Route network collaborator
//!
//! The utility network is overlaid on a route network of nodes and segments.
//! Equipment only needs a narrow slice of it: walk validation, interests
//! (walks and nodes the equipment is attached to), shortest paths and element
//! lookups. [`crate::infrastructure::InMemoryRouteNetwork`] implements the
//! trait for tests and tooling.

use crate::commands::{RouteNetworkErrorCode, UtilityNetworkCommandError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Route network failures
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouteNetworkError {
    #[error("A walk must contain at least one route segment")]
    InvalidWalkCannotBeEmpty,

    #[error("Walk element {0} is a route node, a walk should contain route segment ids only")]
    InvalidWalkShouldContainRouteSegmentIdsOnly(Uuid),

    #[error("Route segments {previous} and {next} of the walk are not adjacent")]
    InvalidWalkSegmentsAreNotAdjacent { previous: Uuid, next: Uuid },

    #[error("Route network element {0} not found")]
    ElementNotFound(Uuid),

    #[error("Interest {0} not found")]
    InterestNotFound(Uuid),

    #[error("Cannot find a path from route node {0} to itself")]
    RouteNodesAreEqual(Uuid),

    #[error("No path found between route nodes {from} and {to}")]
    NoPathFound { from: Uuid, to: Uuid },
}

impl RouteNetworkError {
    pub fn code(&self) -> RouteNetworkErrorCode {
        match self {
            Self::InvalidWalkCannotBeEmpty => RouteNetworkErrorCode::InvalidWalkCannotBeEmpty,
            Self::InvalidWalkShouldContainRouteSegmentIdsOnly(_) => {
                RouteNetworkErrorCode::InvalidWalkShouldContainRouteSegmentIdsOnly
            }
            Self::InvalidWalkSegmentsAreNotAdjacent { .. } => {
                RouteNetworkErrorCode::InvalidWalkSegmentsAreNotAdjacent
            }
            Self::ElementNotFound(_) => RouteNetworkErrorCode::RouteNetworkElementNotFound,
            Self::InterestNotFound(_) => RouteNetworkErrorCode::InterestNotFound,
            Self::RouteNodesAreEqual(_) => RouteNetworkErrorCode::RouteNodesAreEqual,
            Self::NoPathFound { .. } => RouteNetworkErrorCode::NoPathFound,
        }
    }
}

impl From<RouteNetworkError> for UtilityNetworkCommandError {
    fn from(error: RouteNetworkError) -> Self {
        UtilityNetworkCommandError::route_network(error.code(), error.to_string())
    }
}

pub type RouteNetworkResult<T> = Result<T, RouteNetworkError>;

/// A walk whose segments were checked to form one continuous path.
/// `node_ids` has one more entry than `segment_ids`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedRouteNetworkWalk {
    pub node_ids: Vec<Uuid>,
    pub segment_ids: Vec<Uuid>,
}

impl ValidatedRouteNetworkWalk {
    pub fn from_node_id(&self) -> Option<Uuid> {
        self.node_ids.first().copied()
    }

    pub fn to_node_id(&self) -> Option<Uuid> {
        self.node_ids.last().copied()
    }

    pub fn reversed(&self) -> Self {
        Self {
            node_ids: self.node_ids.iter().rev().copied().collect(),
            segment_ids: self.segment_ids.iter().rev().copied().collect(),
        }
    }

    /// Node and segment ids alternating along the walk
    pub fn element_ids(&self) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(self.node_ids.len() + self.segment_ids.len());
        for (i, node_id) in self.node_ids.iter().enumerate() {
            ids.push(*node_id);
            if let Some(segment_id) = self.segment_ids.get(i) {
                ids.push(*segment_id);
            }
        }
        ids
    }
}

/// Walk registered as the path of a span equipment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkOfInterest {
    pub id: Uuid,
    pub walk: ValidatedRouteNetworkWalk,
}

/// Route node registered as a waypoint or container location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOfInterest {
    pub id: Uuid,
    pub route_node_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteNetworkElementKind {
    RouteNode,
    RouteSegment,
}

/// Which optional parts of an element to return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteNetworkElementFilterOptions {
    pub include_naming_info: bool,
    pub include_coordinates: bool,
    pub include_route_node_info: bool,
    pub include_mapping_info: bool,
    pub include_lifecycle_info: bool,
    pub include_safety_info: bool,
}

impl RouteNetworkElementFilterOptions {
    pub fn all() -> Self {
        Self {
            include_naming_info: true,
            include_coordinates: true,
            include_route_node_info: true,
            include_mapping_info: true,
            include_lifecycle_info: true,
            include_safety_info: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NamingInfo {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RouteNodeInfo {
    pub kind: Option<String>,
    pub function: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MappingInfo {
    pub method: Option<String>,
    pub horizontal_accuracy: Option<f64>,
    pub source_info: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LifecycleInfo {
    pub deployment_state: Option<String>,
    pub installation_date: Option<DateTime<Utc>>,
    pub removal_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SafetyInfo {
    pub classification: Option<String>,
    pub remark: Option<String>,
}

/// One route node or segment, with the requested optional parts filled in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteNetworkElementInfo {
    pub id: Uuid,
    pub kind: RouteNetworkElementKind,
    pub naming_info: Option<NamingInfo>,
    /// A point for nodes, the end points for segments
    pub coordinates: Option<Vec<[f64; 2]>>,
    pub route_node_info: Option<RouteNodeInfo>,
    pub mapping_info: Option<MappingInfo>,
    pub lifecycle_info: Option<LifecycleInfo>,
    pub safety_info: Option<SafetyInfo>,
}

/// Route network operations the utility network depends on
#[async_trait]
pub trait RouteNetworkQueries: Send + Sync {
    /// Check that route segment ids form one continuous path
    async fn validate_walk(&self, segment_ids: &[Uuid]) -> RouteNetworkResult<ValidatedRouteNetworkWalk>;

    /// Validate a walk and keep it under the given interest id
    async fn register_walk_of_interest(
        &self,
        interest_id: Uuid,
        segment_ids: &[Uuid],
    ) -> RouteNetworkResult<WalkOfInterest>;

    async fn get_walk_of_interest(&self, interest_id: Uuid) -> RouteNetworkResult<WalkOfInterest>;

    async fn register_node_of_interest(
        &self,
        interest_id: Uuid,
        route_node_id: Uuid,
    ) -> RouteNetworkResult<NodeOfInterest>;

    async fn get_node_of_interest(&self, interest_id: Uuid) -> RouteNetworkResult<NodeOfInterest>;

    /// Drop a walk or node interest
    async fn unregister_interest(&self, interest_id: Uuid) -> RouteNetworkResult<()>;

    /// Alternating node and segment ids from `from` to `to`, both included
    async fn shortest_path_between_route_nodes(
        &self,
        from_route_node_id: Uuid,
        to_route_node_id: Uuid,
    ) -> RouteNetworkResult<Vec<Uuid>>;

    async fn get_route_network_elements(
        &self,
        element_ids: &[Uuid],
        options: RouteNetworkElementFilterOptions,
    ) -> RouteNetworkResult<Vec<RouteNetworkElementInfo>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_network_error_maps_to_command_error() {
        let error: UtilityNetworkCommandError = RouteNetworkError::InvalidWalkCannotBeEmpty.into();
        assert_eq!(error.error_code(), "INVALID_WALK_CANNOT_BE_EMPTY");
        assert!(error.is_validation_error());
    }

    #[test]
    fn test_walk_reversal() {
        let (a, b, s) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let walk = ValidatedRouteNetworkWalk {
            node_ids: vec![a, b],
            segment_ids: vec![s],
        };
        let reversed = walk.reversed();
        assert_eq!(reversed.from_node_id(), Some(b));
        assert_eq!(reversed.to_node_id(), Some(a));
        assert_eq!(walk.element_ids(), vec![a, s, b]);
    }
}
