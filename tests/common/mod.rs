//! Shared fixture for the integration tests
//!
//! A small route network around a central office, a few hand holes, a
//! cabinet, a splitter point and three single dwelling units, plus a
//! command handler wired to in-memory infrastructure.
//!
//! ```text
//! CO_1 -S1- HH_1 -S2- HH_2 -S3- CC_1 -S5- SP_1 -S6- J_1 -S7- SDU_1
//!                     |  \       |                  |  \
//!                    S11  S4    S13                 S9  S8- SDU_2
//!                     |     \    |                  |
//!                   HH_10 ---+--+               J_2 -S10- SDU_3
//! ```
//! S4 (HH_2 - J_2) is long, S11 and S13 both start in HH_10.

#![allow(dead_code)]

use cim_domain_utility_network::commands::{SpanSegmentTerminalPair, UtilityNetworkCommand};
use cim_domain_utility_network::infrastructure::{
    ChannelNotificationPublisher, InMemoryEventStore, InMemoryRouteNetwork, NotificationReceiver,
    RouteNode, RouteSegment,
};
use cim_domain_utility_network::value_objects::{
    NodeContainerSpecification, RackSpecification, SpanEquipment, SpanEquipmentSpecification,
    SpanStructureTemplate, SpecificationCatalog, TerminalDirection,
    TerminalEquipmentSpecification, TerminalStructureSpecification, TerminalStructureTemplate,
    TerminalTemplate,
};
use cim_domain_utility_network::{
    UtilityNetworkCommandError, UtilityNetworkCommandHandler, UtilityNetworkConfig,
    UtilityNetworkProjection,
};
use std::sync::Arc;
use uuid::Uuid;

/// Route node and segment ids of the test network
#[derive(Debug, Clone, Copy)]
pub struct TestNetwork {
    pub co_1: Uuid,
    pub hh_1: Uuid,
    pub hh_2: Uuid,
    pub hh_10: Uuid,
    pub cc_1: Uuid,
    pub sp_1: Uuid,
    pub j_1: Uuid,
    pub j_2: Uuid,
    pub sdu_1: Uuid,
    pub sdu_2: Uuid,
    pub sdu_3: Uuid,
    pub s1: Uuid,
    pub s2: Uuid,
    pub s3: Uuid,
    pub s4: Uuid,
    pub s5: Uuid,
    pub s6: Uuid,
    pub s7: Uuid,
    pub s8: Uuid,
    pub s9: Uuid,
    pub s10: Uuid,
    pub s11: Uuid,
    pub s13: Uuid,
}

impl TestNetwork {
    pub fn build() -> (Self, InMemoryRouteNetwork) {
        let id = Uuid::new_v4;
        let n = Self {
            co_1: id(),
            hh_1: id(),
            hh_2: id(),
            hh_10: id(),
            cc_1: id(),
            sp_1: id(),
            j_1: id(),
            j_2: id(),
            sdu_1: id(),
            sdu_2: id(),
            sdu_3: id(),
            s1: id(),
            s2: id(),
            s3: id(),
            s4: id(),
            s5: id(),
            s6: id(),
            s7: id(),
            s8: id(),
            s9: id(),
            s10: id(),
            s11: id(),
            s13: id(),
        };

        let route_network = InMemoryRouteNetwork::new();
        let nodes = [
            (n.co_1, "CO-1", [0.0, 0.0]),
            (n.hh_1, "HH-1", [100.0, 0.0]),
            (n.hh_2, "HH-2", [200.0, 0.0]),
            (n.hh_10, "HH-10", [250.0, -100.0]),
            (n.cc_1, "CC-1", [300.0, 0.0]),
            (n.sp_1, "SP-1", [350.0, 0.0]),
            (n.j_1, "J-1", [400.0, 0.0]),
            (n.j_2, "J-2", [400.0, -60.0]),
            (n.sdu_1, "SDU-1", [420.0, 10.0]),
            (n.sdu_2, "SDU-2", [420.0, -10.0]),
            (n.sdu_3, "SDU-3", [420.0, -60.0]),
        ];
        for (node_id, name, coordinates) in nodes {
            route_network.add_node(RouteNode::new(node_id, name, coordinates));
        }

        let segments = [
            (n.s1, n.co_1, n.hh_1, 100.0),
            (n.s2, n.hh_1, n.hh_2, 100.0),
            (n.s3, n.hh_2, n.cc_1, 100.0),
            (n.s4, n.hh_2, n.j_2, 1000.0),
            (n.s5, n.cc_1, n.sp_1, 50.0),
            (n.s6, n.sp_1, n.j_1, 50.0),
            (n.s7, n.j_1, n.sdu_1, 20.0),
            (n.s8, n.j_1, n.sdu_2, 20.0),
            (n.s9, n.j_1, n.j_2, 60.0),
            (n.s10, n.j_2, n.sdu_3, 20.0),
            (n.s11, n.hh_10, n.hh_2, 300.0),
            (n.s13, n.hh_10, n.cc_1, 80.0),
        ];
        for (segment_id, from_node_id, to_node_id, length) in segments {
            route_network
                .add_segment(RouteSegment {
                    id: segment_id,
                    from_node_id,
                    to_node_id,
                    length,
                    name: None,
                })
                .unwrap();
        }

        (n, route_network)
    }
}

/// Specification ids registered in the fixture catalog
#[derive(Debug, Clone, Copy)]
pub struct TestSpecifications {
    /// Conduit with two inner tubes
    pub conduit: Uuid,
    /// Conduit of another kind, same layout
    pub other_conduit: Uuid,
    pub inner_tube: Uuid,
    pub well: Uuid,
    pub rack: Uuid,
    /// Holder with one 1:2 splitter at position 1
    pub splitter_holder: Uuid,
    pub splitter: Uuid,
    /// Closure with one four-terminal splice tray at position 1
    pub closure: Uuid,
    pub splice_tray: Uuid,
    /// One unit patch panel, rack mounted, no structures
    pub patch_panel: Uuid,
}

fn conduit_specification(id: Uuid, inner_tube: Uuid) -> SpanEquipmentSpecification {
    SpanEquipmentSpecification {
        id,
        category: "Conduit".into(),
        name: "Ø40 2x10".into(),
        version: "1".into(),
        root_template: SpanStructureTemplate {
            span_structure_specification_id: Uuid::new_v4(),
            level: 1,
            position: 1,
            child_templates: vec![
                SpanStructureTemplate::leaf(inner_tube, 2, 1),
                SpanStructureTemplate::leaf(inner_tube, 2, 2),
            ],
        },
        is_fixed: true,
        is_cable: false,
        deprecated: false,
    }
}

fn terminal_template(name: &str, direction: TerminalDirection, group: Option<&str>) -> TerminalTemplate {
    TerminalTemplate {
        name: name.into(),
        direction,
        is_pigtail: false,
        is_splice: true,
        connector_type: None,
        internal_connectivity_node: group.map(Into::into),
    }
}

impl TestSpecifications {
    pub fn catalog() -> (Self, SpecificationCatalog) {
        let specs = Self {
            conduit: Uuid::new_v4(),
            other_conduit: Uuid::new_v4(),
            inner_tube: Uuid::new_v4(),
            well: Uuid::new_v4(),
            rack: Uuid::new_v4(),
            splitter_holder: Uuid::new_v4(),
            splitter: Uuid::new_v4(),
            closure: Uuid::new_v4(),
            splice_tray: Uuid::new_v4(),
            patch_panel: Uuid::new_v4(),
        };

        let splitter = TerminalStructureSpecification {
            id: specs.splitter,
            category: "Splitters".into(),
            name: "1:2 splitter".into(),
            short_name: "1:2".into(),
            terminal_templates: vec![
                terminal_template("in", TerminalDirection::In, Some("splitter")),
                terminal_template("out1", TerminalDirection::Out, Some("splitter")),
                terminal_template("out2", TerminalDirection::Out, Some("splitter")),
            ],
            deprecated: false,
        };
        let splice_tray = TerminalStructureSpecification {
            id: specs.splice_tray,
            category: "Trays".into(),
            name: "Splice tray 4".into(),
            short_name: "T4".into(),
            terminal_templates: (1..=4)
                .map(|i| terminal_template(&i.to_string(), TerminalDirection::Bi, None))
                .collect(),
            deprecated: false,
        };
        let terminal_equipment = |id: Uuid, name: &str, structure: Option<Uuid>, is_rack_equipment: bool| {
            TerminalEquipmentSpecification {
                id,
                category: "Closures".into(),
                name: name.into(),
                short_name: name.into(),
                is_rack_equipment,
                height_in_rack_units: u16::from(is_rack_equipment),
                structure_templates: structure
                    .map(|terminal_structure_specification_id| TerminalStructureTemplate {
                        terminal_structure_specification_id,
                        position: 1,
                    })
                    .into_iter()
                    .collect(),
                deprecated: false,
            }
        };

        let catalog = SpecificationCatalog::new()
            .with_span_equipment(conduit_specification(specs.conduit, specs.inner_tube))
            .with_span_equipment(conduit_specification(specs.other_conduit, specs.inner_tube))
            .with_terminal_structure(splitter)
            .with_terminal_structure(splice_tray)
            .with_terminal_equipment(terminal_equipment(
                specs.splitter_holder,
                "Splitter holder",
                Some(specs.splitter),
                false,
            ))
            .with_terminal_equipment(terminal_equipment(specs.closure, "Closure", Some(specs.splice_tray), false))
            .with_terminal_equipment(terminal_equipment(specs.patch_panel, "Patch panel", None, true))
            .with_node_container(NodeContainerSpecification {
                id: specs.well,
                category: "Well".into(),
                name: "Well 80x80".into(),
                short_name: "W80".into(),
            })
            .with_rack(RackSpecification {
                id: specs.rack,
                name: "Rack 42U".into(),
                short_name: "R42".into(),
            });

        (specs, catalog)
    }
}

/// Command handler over in-memory infrastructure
pub struct Harness {
    pub network: TestNetwork,
    pub specs: TestSpecifications,
    pub route_network: Arc<InMemoryRouteNetwork>,
    pub store: Arc<InMemoryEventStore>,
    pub projection: Arc<UtilityNetworkProjection>,
    pub handler: UtilityNetworkCommandHandler,
    pub notifications: NotificationReceiver,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(UtilityNetworkConfig::default())
    }

    pub fn with_config(config: UtilityNetworkConfig) -> Self {
        let (network, route_network) = TestNetwork::build();
        let (specs, catalog) = TestSpecifications::catalog();
        let route_network = Arc::new(route_network);
        let store = Arc::new(InMemoryEventStore::new());
        let projection = Arc::new(UtilityNetworkProjection::new(config.object_manager));
        let (publisher, notifications) =
            ChannelNotificationPublisher::new(config.notifications.channel_capacity);

        let handler = UtilityNetworkCommandHandler::new(
            store.clone(),
            route_network.clone(),
            projection.clone(),
            Arc::new(catalog),
            Arc::new(publisher),
        )
        .with_notification_category(config.notifications.category);

        Self {
            network,
            specs,
            route_network,
            store,
            projection,
            handler,
            notifications,
        }
    }

    pub async fn run(&self, command: UtilityNetworkCommand) -> Result<(), UtilityNetworkCommandError> {
        self.handler.handle(command).await.map(|_| ())
    }

    /// Error code of a command expected to be rejected
    pub async fn rejection(&self, command: UtilityNetworkCommand) -> &'static str {
        self.handler.handle(command).await.unwrap_err().error_code()
    }

    pub async fn place_conduit(&self, walk: &[Uuid]) -> Uuid {
        self.place_span_equipment(self.specs.conduit, walk).await
    }

    pub async fn place_span_equipment(&self, specification_id: Uuid, walk: &[Uuid]) -> Uuid {
        let span_equipment_id = Uuid::new_v4();
        self.run(UtilityNetworkCommand::PlaceSpanEquipmentInRouteNetwork {
            span_equipment_id,
            specification_id,
            walk: walk.to_vec(),
            name: None,
            marking_info: None,
            manufacturer_id: None,
        })
        .await
        .unwrap();
        span_equipment_id
    }

    pub async fn place_container(&self, route_node_id: Uuid) -> Uuid {
        let node_container_id = Uuid::new_v4();
        self.run(UtilityNetworkCommand::PlaceNodeContainerInRouteNetwork {
            node_container_id,
            specification_id: self.specs.well,
            route_node_id,
            manufacturer_id: None,
        })
        .await
        .unwrap();
        node_container_id
    }

    pub async fn place_terminal_equipment(&self, node_container_id: Uuid, specification_id: Uuid) -> Uuid {
        let terminal_equipment_id = Uuid::new_v4();
        self.run(UtilityNetworkCommand::PlaceTerminalEquipmentInNodeContainer {
            node_container_id,
            terminal_equipment_id,
            specification_id,
            number_of_equipment: 1,
            name: None,
            manufacturer_id: None,
            subrack_placement: None,
        })
        .await
        .unwrap();
        terminal_equipment_id
    }

    pub async fn connect_to_terminal(&self, route_node_id: Uuid, span_segment_id: Uuid, terminal_id: Uuid) {
        self.run(UtilityNetworkCommand::ConnectSpanSegmentsWithTerminalsAtRouteNode {
            route_node_id,
            connects: vec![SpanSegmentTerminalPair {
                span_segment_id,
                terminal_id,
            }],
        })
        .await
        .unwrap();
    }

    pub fn span(&self, span_equipment_id: Uuid) -> SpanEquipment {
        self.projection.span_equipment(span_equipment_id).unwrap()
    }

    /// Id of one segment of a span equipment
    pub fn segment(&self, span_equipment_id: Uuid, structure_index: usize, segment_index: usize) -> Uuid {
        self.span(span_equipment_id).span_structures[structure_index].span_segments[segment_index].id
    }

    /// Terminal of a terminal equipment's first structure, by name
    pub fn terminal(&self, terminal_equipment_id: Uuid, name: &str) -> Uuid {
        self.projection
            .terminal_equipment(terminal_equipment_id)
            .unwrap()
            .terminal_structures[0]
            .terminals
            .iter()
            .find(|t| t.name == name)
            .unwrap()
            .id
    }

    /// Drop notifications published so far
    pub fn drain_notifications(&self) {
        self.notifications.receive_notifications(usize::MAX);
    }
}
