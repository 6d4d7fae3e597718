//! Route network walks, paths and element lookups

mod common;

use cim_domain_utility_network::commands::UtilityNetworkCommand;
use cim_domain_utility_network::queries::{CodedError, ResultEnvelope};
use cim_domain_utility_network::route_network::{
    RouteNetworkElementFilterOptions, RouteNetworkElementKind, RouteNetworkError, RouteNetworkQueries,
};
use cim_domain_utility_network::{UtilityNetworkQueryHandler, UtilityNetworkQueryHandlerImpl};
use common::{Harness, TestNetwork};
use uuid::Uuid;

#[tokio::test]
async fn test_shortest_path_prefers_short_detour() {
    let (n, route_network) = TestNetwork::build();

    let path = route_network
        .shortest_path_between_route_nodes(n.hh_10, n.j_2)
        .await
        .unwrap();

    assert_eq!(path, vec![n.hh_10, n.s13, n.cc_1, n.s5, n.sp_1, n.s6, n.j_1, n.s9, n.j_2]);
}

#[tokio::test]
async fn test_path_to_same_node_is_rejected() {
    let h = Harness::new();
    let queries = UtilityNetworkQueryHandlerImpl::new(h.projection.clone(), h.route_network.clone());

    let result = queries
        .shortest_path_between_route_nodes(h.network.j_1, h.network.j_1)
        .await;
    let envelope = ResultEnvelope::from_result(result);

    assert!(!envelope.success);
    assert_eq!(envelope.error_code.as_deref(), Some("ROUTE_NODES_ARE_EQUAL"));
}

#[tokio::test]
async fn test_walk_orientation_follows_first_segment() {
    let (n, route_network) = TestNetwork::build();

    let walk = route_network.validate_walk(&[n.s2, n.s1]).await.unwrap();
    assert_eq!(walk.node_ids, vec![n.hh_2, n.hh_1, n.co_1]);
    assert_eq!(walk.element_ids(), vec![n.hh_2, n.s2, n.hh_1, n.s1, n.co_1]);

    let walk = route_network.validate_walk(&[n.s11, n.s3, n.s5]).await.unwrap();
    assert_eq!(walk.from_node_id(), Some(n.hh_10));
    assert_eq!(walk.to_node_id(), Some(n.sp_1));
}

#[tokio::test]
async fn test_invalid_walks_are_rejected_before_anything_is_stored() {
    let h = Harness::new();
    let n = h.network;
    let place = |walk: Vec<Uuid>| UtilityNetworkCommand::PlaceSpanEquipmentInRouteNetwork {
        span_equipment_id: Uuid::new_v4(),
        specification_id: h.specs.conduit,
        walk,
        name: None,
        marking_info: None,
        manufacturer_id: None,
    };

    assert_eq!(h.rejection(place(vec![])).await, "INVALID_WALK_CANNOT_BE_EMPTY");
    assert_eq!(
        h.rejection(place(vec![n.s1, n.hh_1])).await,
        "INVALID_WALK_SHOULD_CONTAIN_ROUTE_SEGMENT_IDS_ONLY"
    );
    assert_eq!(
        h.rejection(place(vec![n.s1, n.s3])).await,
        "INVALID_WALK_SEGMENTS_ARE_NOT_ADJACENT"
    );
    assert_eq!(
        h.rejection(place(vec![Uuid::new_v4()])).await,
        "ROUTE_NETWORK_ELEMENT_NOT_FOUND"
    );

    assert!(h.store.is_empty());
    assert_eq!(h.route_network.interest_count(), 0);
    assert!(h.notifications.try_recv().is_none());
}

#[tokio::test]
async fn test_naming_only_element_query() {
    let (n, route_network) = TestNetwork::build();
    let options = RouteNetworkElementFilterOptions {
        include_naming_info: true,
        ..Default::default()
    };

    let elements = route_network
        .get_route_network_elements(&[n.co_1, n.s1], options)
        .await
        .unwrap();

    assert_eq!(elements.len(), 2);
    let co = &elements[0];
    assert_eq!(co.kind, RouteNetworkElementKind::RouteNode);
    assert_eq!(co.naming_info.as_ref().unwrap().name.as_deref(), Some("CO-1"));
    assert!(co.coordinates.is_none());
    assert!(co.route_node_info.is_none());
    assert!(co.mapping_info.is_none());
    assert!(co.lifecycle_info.is_none());
    assert!(co.safety_info.is_none());
    assert_eq!(elements[1].kind, RouteNetworkElementKind::RouteSegment);
}

#[tokio::test]
async fn test_segment_coordinates_are_its_end_points() {
    let (n, route_network) = TestNetwork::build();

    let elements = route_network
        .get_route_network_elements(&[n.s1], RouteNetworkElementFilterOptions::all())
        .await
        .unwrap();

    assert_eq!(elements[0].coordinates, Some(vec![[0.0, 0.0], [100.0, 0.0]]));
    assert!(elements[0].route_node_info.is_none());
}

#[tokio::test]
async fn test_unknown_element_lookup() {
    let (_, route_network) = TestNetwork::build();
    let missing = Uuid::new_v4();

    let error = route_network
        .get_route_network_elements(&[missing], RouteNetworkElementFilterOptions::default())
        .await
        .unwrap_err();

    assert_eq!(error, RouteNetworkError::ElementNotFound(missing));
    let wrapped: cim_domain_utility_network::UtilityNetworkQueryError = error.into();
    assert_eq!(wrapped.error_code(), "ROUTE_NETWORK_ELEMENT_NOT_FOUND");
}
