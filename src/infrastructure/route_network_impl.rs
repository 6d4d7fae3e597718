//! In-memory route network
//!
//! Holds route nodes, route segments and registered interests. Shortest
//! paths are computed with petgraph's A* over segment lengths.

use crate::route_network::{
    NamingInfo, NodeOfInterest, RouteNetworkElementFilterOptions, RouteNetworkElementInfo,
    RouteNetworkElementKind, RouteNetworkError, RouteNetworkQueries, RouteNetworkResult,
    RouteNodeInfo, ValidatedRouteNetworkWalk, WalkOfInterest,
};
use async_trait::async_trait;
use dashmap::DashMap;
use petgraph::algo::astar;
use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteNode {
    pub id: Uuid,
    pub name: Option<String>,
    pub coordinates: [f64; 2],
    pub kind: Option<String>,
    pub function: Option<String>,
}

impl RouteNode {
    pub fn new(id: Uuid, name: impl Into<String>, coordinates: [f64; 2]) -> Self {
        Self {
            id,
            name: Some(name.into()),
            coordinates,
            kind: None,
            function: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub id: Uuid,
    pub from_node_id: Uuid,
    pub to_node_id: Uuid,
    pub length: f64,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
enum Interest {
    Walk(WalkOfInterest),
    Node(NodeOfInterest),
}

/// In-memory [`RouteNetworkQueries`] implementation
#[derive(Debug, Default)]
pub struct InMemoryRouteNetwork {
    nodes: DashMap<Uuid, RouteNode>,
    segments: DashMap<Uuid, RouteSegment>,
    interests: DashMap<Uuid, Interest>,
}

impl InMemoryRouteNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&self, node: RouteNode) {
        self.nodes.insert(node.id, node);
    }

    /// Add a segment between two known route nodes
    pub fn add_segment(&self, segment: RouteSegment) -> RouteNetworkResult<()> {
        for end in [segment.from_node_id, segment.to_node_id] {
            if !self.nodes.contains_key(&end) {
                return Err(RouteNetworkError::ElementNotFound(end));
            }
        }
        self.segments.insert(segment.id, segment);
        Ok(())
    }

    pub fn node(&self, id: Uuid) -> Option<RouteNode> {
        self.nodes.get(&id).map(|n| n.value().clone())
    }

    pub fn segment(&self, id: Uuid) -> Option<RouteSegment> {
        self.segments.get(&id).map(|s| s.value().clone())
    }

    pub fn interest_count(&self) -> usize {
        self.interests.len()
    }

    fn walk(&self, segment_ids: &[Uuid]) -> RouteNetworkResult<ValidatedRouteNetworkWalk> {
        if segment_ids.is_empty() {
            return Err(RouteNetworkError::InvalidWalkCannotBeEmpty);
        }

        let mut segments = Vec::with_capacity(segment_ids.len());
        for id in segment_ids {
            if self.nodes.contains_key(id) {
                return Err(RouteNetworkError::InvalidWalkShouldContainRouteSegmentIdsOnly(*id));
            }
            let segment = self
                .segment(*id)
                .ok_or(RouteNetworkError::ElementNotFound(*id))?;
            segments.push(segment);
        }

        let first = &segments[0];
        let (start, mut current) = match segments.get(1) {
            None => (first.from_node_id, first.to_node_id),
            Some(next) => {
                let touches = |n: Uuid| n == next.from_node_id || n == next.to_node_id;
                if touches(first.to_node_id) {
                    (first.from_node_id, first.to_node_id)
                } else if touches(first.from_node_id) {
                    (first.to_node_id, first.from_node_id)
                } else {
                    return Err(RouteNetworkError::InvalidWalkSegmentsAreNotAdjacent {
                        previous: first.id,
                        next: next.id,
                    });
                }
            }
        };

        let mut node_ids = vec![start, current];
        for pair in segments.windows(2) {
            let (previous, next) = (&pair[0], &pair[1]);
            current = if next.from_node_id == current {
                next.to_node_id
            } else if next.to_node_id == current {
                next.from_node_id
            } else {
                return Err(RouteNetworkError::InvalidWalkSegmentsAreNotAdjacent {
                    previous: previous.id,
                    next: next.id,
                });
            };
            node_ids.push(current);
        }

        Ok(ValidatedRouteNetworkWalk {
            node_ids,
            segment_ids: segment_ids.to_vec(),
        })
    }

    fn element_info(
        &self,
        id: Uuid,
        options: RouteNetworkElementFilterOptions,
    ) -> RouteNetworkResult<RouteNetworkElementInfo> {
        let (kind, name, coordinates, route_node_info) = if let Some(node) = self.node(id) {
            (
                RouteNetworkElementKind::RouteNode,
                node.name,
                vec![node.coordinates],
                Some(RouteNodeInfo {
                    kind: node.kind,
                    function: node.function,
                }),
            )
        } else if let Some(segment) = self.segment(id) {
            let coordinates = [segment.from_node_id, segment.to_node_id]
                .iter()
                .filter_map(|n| self.node(*n).map(|n| n.coordinates))
                .collect();
            (RouteNetworkElementKind::RouteSegment, segment.name, coordinates, None)
        } else {
            return Err(RouteNetworkError::ElementNotFound(id));
        };

        Ok(RouteNetworkElementInfo {
            id,
            kind,
            naming_info: options.include_naming_info.then(|| NamingInfo {
                name,
                description: None,
            }),
            coordinates: options.include_coordinates.then_some(coordinates),
            route_node_info: route_node_info.filter(|_| options.include_route_node_info),
            mapping_info: options.include_mapping_info.then(Default::default),
            lifecycle_info: options.include_lifecycle_info.then(Default::default),
            safety_info: options.include_safety_info.then(Default::default),
        })
    }
}

#[async_trait]
impl RouteNetworkQueries for InMemoryRouteNetwork {
    async fn validate_walk(&self, segment_ids: &[Uuid]) -> RouteNetworkResult<ValidatedRouteNetworkWalk> {
        self.walk(segment_ids)
    }

    async fn register_walk_of_interest(
        &self,
        interest_id: Uuid,
        segment_ids: &[Uuid],
    ) -> RouteNetworkResult<WalkOfInterest> {
        let walk = self.walk(segment_ids)?;
        let interest = WalkOfInterest {
            id: interest_id,
            walk,
        };
        self.interests.insert(interest_id, Interest::Walk(interest.clone()));
        debug!(interest_id = %interest_id, segments = segment_ids.len(), "Walk of interest registered");
        Ok(interest)
    }

    async fn get_walk_of_interest(&self, interest_id: Uuid) -> RouteNetworkResult<WalkOfInterest> {
        match self.interests.get(&interest_id).map(|i| i.value().clone()) {
            Some(Interest::Walk(walk)) => Ok(walk),
            _ => Err(RouteNetworkError::InterestNotFound(interest_id)),
        }
    }

    async fn register_node_of_interest(
        &self,
        interest_id: Uuid,
        route_node_id: Uuid,
    ) -> RouteNetworkResult<NodeOfInterest> {
        if !self.nodes.contains_key(&route_node_id) {
            return Err(RouteNetworkError::ElementNotFound(route_node_id));
        }
        let interest = NodeOfInterest {
            id: interest_id,
            route_node_id,
        };
        self.interests.insert(interest_id, Interest::Node(interest));
        debug!(interest_id = %interest_id, route_node_id = %route_node_id, "Node of interest registered");
        Ok(interest)
    }

    async fn get_node_of_interest(&self, interest_id: Uuid) -> RouteNetworkResult<NodeOfInterest> {
        match self.interests.get(&interest_id).map(|i| i.value().clone()) {
            Some(Interest::Node(node)) => Ok(node),
            _ => Err(RouteNetworkError::InterestNotFound(interest_id)),
        }
    }

    async fn unregister_interest(&self, interest_id: Uuid) -> RouteNetworkResult<()> {
        self.interests
            .remove(&interest_id)
            .map(|_| ())
            .ok_or(RouteNetworkError::InterestNotFound(interest_id))
    }

    async fn shortest_path_between_route_nodes(
        &self,
        from_route_node_id: Uuid,
        to_route_node_id: Uuid,
    ) -> RouteNetworkResult<Vec<Uuid>> {
        for id in [from_route_node_id, to_route_node_id] {
            if !self.nodes.contains_key(&id) {
                return Err(RouteNetworkError::ElementNotFound(id));
            }
        }
        if from_route_node_id == to_route_node_id {
            return Err(RouteNetworkError::RouteNodesAreEqual(from_route_node_id));
        }

        let mut graph: UnGraph<Uuid, (Uuid, f64)> = UnGraph::new_undirected();
        let mut indices: HashMap<Uuid, NodeIndex> = HashMap::new();
        for node in self.nodes.iter() {
            indices.insert(*node.key(), graph.add_node(*node.key()));
        }
        for segment in self.segments.iter() {
            if let (Some(a), Some(b)) = (
                indices.get(&segment.from_node_id),
                indices.get(&segment.to_node_id),
            ) {
                graph.add_edge(*a, *b, (segment.id, segment.length));
            }
        }

        let no_path = || RouteNetworkError::NoPathFound {
            from: from_route_node_id,
            to: to_route_node_id,
        };
        let (start, goal) = match (indices.get(&from_route_node_id), indices.get(&to_route_node_id)) {
            (Some(start), Some(goal)) => (*start, *goal),
            _ => return Err(no_path()),
        };

        let (_, path) = astar(&graph, start, |n| n == goal, |e| e.weight().1, |_| 0.0)
            .ok_or_else(no_path)?;

        let mut elements = vec![graph[path[0]]];
        for pair in path.windows(2) {
            let segment = graph
                .edges_connecting(pair[0], pair[1])
                .min_by(|x, y| x.weight().1.total_cmp(&y.weight().1))
                .ok_or_else(no_path)?;
            elements.push(segment.weight().0);
            elements.push(graph[pair[1]]);
        }
        Ok(elements)
    }

    async fn get_route_network_elements(
        &self,
        element_ids: &[Uuid],
        options: RouteNetworkElementFilterOptions,
    ) -> RouteNetworkResult<Vec<RouteNetworkElementInfo>> {
        element_ids
            .iter()
            .map(|id| self.element_info(*id, options))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> (InMemoryRouteNetwork, Vec<Uuid>, Vec<Uuid>) {
        let network = InMemoryRouteNetwork::new();
        let nodes: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for (i, id) in nodes.iter().enumerate() {
            network.add_node(RouteNode::new(*id, format!("N{i}"), [i as f64, 0.0]));
        }
        let segments: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();
        for (i, id) in segments.iter().enumerate() {
            network
                .add_segment(RouteSegment {
                    id: *id,
                    from_node_id: nodes[i],
                    to_node_id: nodes[i + 1],
                    length: 10.0,
                    name: None,
                })
                .unwrap();
        }
        (network, nodes, segments)
    }

    #[tokio::test]
    async fn test_walk_orientation_follows_segment_order() {
        let (network, nodes, segments) = line();

        let walk = network.validate_walk(&[segments[1], segments[0]]).await.unwrap();
        assert_eq!(walk.node_ids, vec![nodes[2], nodes[1], nodes[0]]);

        let walk = network.validate_walk(&segments).await.unwrap();
        assert_eq!(walk.node_ids, nodes);
    }

    #[tokio::test]
    async fn test_interest_lifecycle() {
        let (network, nodes, segments) = line();
        let walk_id = Uuid::new_v4();

        let node_id = Uuid::new_v4();

        network.register_walk_of_interest(walk_id, &segments).await.unwrap();
        network.register_node_of_interest(node_id, nodes[1]).await.unwrap();
        assert_eq!(network.interest_count(), 2);
        assert_eq!(network.get_node_of_interest(node_id).await.unwrap().route_node_id, nodes[1]);
        assert_eq!(
            network.get_node_of_interest(walk_id).await.unwrap_err(),
            RouteNetworkError::InterestNotFound(walk_id)
        );

        network.unregister_interest(walk_id).await.unwrap();
        assert_eq!(
            network.get_walk_of_interest(walk_id).await.unwrap_err(),
            RouteNetworkError::InterestNotFound(walk_id)
        );
    }

    #[test]
    fn test_segment_with_unknown_end_is_rejected() {
        let network = InMemoryRouteNetwork::new();
        let missing = Uuid::new_v4();
        let err = network
            .add_segment(RouteSegment {
                id: Uuid::new_v4(),
                from_node_id: missing,
                to_node_id: missing,
                length: 1.0,
                name: None,
            })
            .unwrap_err();
        assert_eq!(err, RouteNetworkError::ElementNotFound(missing));
    }
}
