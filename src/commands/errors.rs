//! Command errors
//!
//! Validation failures carry a stable error code per aggregate plus a human
//! readable message. Graph corruption surfaces as [`UtilityGraphError`].

use crate::graph::UtilityGraphError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! error_code_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $code:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $code)]
                $variant,
            )+
        }

        impl $name {
            /// Stable wire name of the code
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $code,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

error_code_enum!(
    /// Span equipment validation failures
    SpanEquipmentErrorCode {
        SpanEquipmentAlreadyExists => "SPAN_EQUIPMENT_ALREADY_EXISTS",
        SpanEquipmentNotFound => "SPAN_EQUIPMENT_NOT_FOUND",
        InvalidSpanEquipmentSpecification => "INVALID_SPAN_EQUIPMENT_SPECIFICATION",
        CutNodeNotPartOfWalk => "CUT_NODE_NOT_PART_OF_WALK",
        CannotCutAtWalkEnd => "CANNOT_CUT_AT_WALK_END",
        SpanSegmentNotFound => "SPAN_SEGMENT_NOT_FOUND",
        SpanSegmentAlreadyCutAtNode => "SPAN_SEGMENT_ALREADY_CUT_AT_NODE",
        CutNodeNotWithinSpanSegment => "CUT_NODE_NOT_WITHIN_SPAN_SEGMENT",
        SpanSegmentEndNotAtRouteNode => "SPAN_SEGMENT_END_NOT_AT_ROUTE_NODE",
        SpanSegmentAlreadyConnected => "SPAN_SEGMENT_ALREADY_CONNECTED",
        SpanSegmentNotConnectedToTerminal => "SPAN_SEGMENT_NOT_CONNECTED_TO_TERMINAL",
        TerminalNotFound => "TERMINAL_NOT_FOUND",
        TerminalNotAtRouteNode => "TERMINAL_NOT_AT_ROUTE_NODE",
        TerminalAlreadyConnected => "TERMINAL_ALREADY_CONNECTED",
        ExpectedSameNumberOfSpanSegments => "EXPECTED_SAME_NUMBER_OF_SPAN_SEGMENTS",
        ExpectedEvenNumberOfSpanSegments => "EXPECTED_EVEN_NUMBER_OF_SPAN_SEGMENTS",
        ExpectedSpanSegmentsFromOneOrTwoSpanEquipment => "EXPECTED_SPAN_SEGMENTS_FROM_ONE_OR_TWO_SPAN_EQUIPMENT",
        StructureIndexOutOfRange => "STRUCTURE_INDEX_OUT_OF_RANGE",
        InvalidNumberOfUnits => "INVALID_NUMBER_OF_UNITS",
        SpanStructureNotFound => "SPAN_STRUCTURE_NOT_FOUND",
        CannotRemoveSpanStructureWithConnectedSegments => "CANNOT_REMOVE_SPAN_STRUCTURE_WITH_CONNECTED_SEGMENTS",
        CannotRemoveSpanEquipmentWithConnectedSegments => "CANNOT_REMOVE_SPAN_EQUIPMENT_WITH_CONNECTED_SEGMENTS",
        NoStructuresToAdd => "NO_STRUCTURES_TO_ADD",
        CannotAffixSpanEquipmentToItself => "CANNOT_AFFIX_SPAN_EQUIPMENT_TO_ITSELF",
        ParentSpanSegmentsNotAdjacent => "PARENT_SPAN_SEGMENTS_NOT_ADJACENT",
        HopNotOnSpanEquipmentWalk => "HOP_NOT_ON_SPAN_EQUIPMENT_WALK",
        SpanEquipmentAlreadyAffixedToParent => "SPAN_EQUIPMENT_ALREADY_AFFIXED_TO_PARENT",
        SpanEquipmentNotAffixedToParent => "SPAN_EQUIPMENT_NOT_AFFIXED_TO_PARENT",
        NodeContainerNotOnSpanEquipmentWalk => "NODE_CONTAINER_NOT_ON_SPAN_EQUIPMENT_WALK",
        SpanEquipmentAlreadyAffixedToNodeContainer => "SPAN_EQUIPMENT_ALREADY_AFFIXED_TO_NODE_CONTAINER",
        SpanEquipmentNotAffixedToNodeContainer => "SPAN_EQUIPMENT_NOT_AFFIXED_TO_NODE_CONTAINER",
        CannotMergeSpanEquipmentWithItself => "CANNOT_MERGE_SPAN_EQUIPMENT_WITH_ITSELF",
        SpanEquipmentSpecificationMismatch => "SPAN_EQUIPMENT_SPECIFICATION_MISMATCH",
        SpanEquipmentStructureMismatch => "SPAN_EQUIPMENT_STRUCTURE_MISMATCH",
        SpanEquipmentsHaveNoCommonEndNode => "SPAN_EQUIPMENTS_HAVE_NO_COMMON_END_NODE",
        SpanEquipmentConnectedAtMergeNode => "SPAN_EQUIPMENT_CONNECTED_AT_MERGE_NODE",
        NoChange => "NO_CHANGE",
    }
);

error_code_enum!(
    /// Terminal equipment validation failures
    TerminalEquipmentErrorCode {
        TerminalEquipmentAlreadyExists => "TERMINAL_EQUIPMENT_ALREADY_EXISTS",
        TerminalEquipmentNotFound => "TERMINAL_EQUIPMENT_NOT_FOUND",
        InvalidTerminalEquipmentSpecification => "INVALID_TERMINAL_EQUIPMENT_SPECIFICATION",
        InvalidTerminalStructureSpecification => "INVALID_TERMINAL_STRUCTURE_SPECIFICATION",
        TerminalStructureNotFound => "TERMINAL_STRUCTURE_NOT_FOUND",
        TerminalStructurePositionAlreadyTaken => "TERMINAL_STRUCTURE_POSITION_ALREADY_TAKEN",
        InvalidNumberOfStructures => "INVALID_NUMBER_OF_STRUCTURES",
        CannotRemoveTerminalStructureWithConnectedTerminals => "CANNOT_REMOVE_TERMINAL_STRUCTURE_WITH_CONNECTED_TERMINALS",
        CannotRemoveTerminalEquipmentWithConnectedTerminals => "CANNOT_REMOVE_TERMINAL_EQUIPMENT_WITH_CONNECTED_TERMINALS",
        NoChange => "NO_CHANGE",
    }
);

error_code_enum!(
    /// Node container validation failures
    NodeContainerErrorCode {
        NodeContainerAlreadyExists => "NODE_CONTAINER_ALREADY_EXISTS",
        NodeContainerNotFound => "NODE_CONTAINER_NOT_FOUND",
        NodeContainerAlreadyExistsInRouteNode => "NODE_CONTAINER_ALREADY_EXISTS_IN_ROUTE_NODE",
        InvalidNodeContainerSpecification => "INVALID_NODE_CONTAINER_SPECIFICATION",
        InvalidRackSpecification => "INVALID_RACK_SPECIFICATION",
        RackAlreadyExists => "RACK_ALREADY_EXISTS",
        RackNameNotUnique => "RACK_NAME_NOT_UNIQUE",
        RackNotFound => "RACK_NOT_FOUND",
        RackUnitsOccupied => "RACK_UNITS_OCCUPIED",
        RackUnitsOutOfRange => "RACK_UNITS_OUT_OF_RANGE",
        InvalidNumberOfEquipment => "INVALID_NUMBER_OF_EQUIPMENT",
        TerminalEquipmentNotRackEquipment => "TERMINAL_EQUIPMENT_NOT_RACK_EQUIPMENT",
        TerminalEquipmentNotFound => "TERMINAL_EQUIPMENT_NOT_FOUND",
        TerminalEquipmentNotInRack => "TERMINAL_EQUIPMENT_NOT_IN_RACK",
        TerminalNotFound => "TERMINAL_NOT_FOUND",
        TerminalAlreadyConnected => "TERMINAL_ALREADY_CONNECTED",
        CannotConnectTerminalToItself => "CANNOT_CONNECT_TERMINAL_TO_ITSELF",
        TerminalConnectionNotFound => "TERMINAL_CONNECTION_NOT_FOUND",
        CannotRemoveNodeContainerWithTerminalEquipment => "CANNOT_REMOVE_NODE_CONTAINER_WITH_TERMINAL_EQUIPMENT",
        CannotRemoveNodeContainerWithAffixedSpanEquipment => "CANNOT_REMOVE_NODE_CONTAINER_WITH_AFFIXED_SPAN_EQUIPMENT",
        NoChange => "NO_CHANGE",
    }
);

error_code_enum!(
    /// Route network failures
    RouteNetworkErrorCode {
        InvalidWalkCannotBeEmpty => "INVALID_WALK_CANNOT_BE_EMPTY",
        InvalidWalkShouldContainRouteSegmentIdsOnly => "INVALID_WALK_SHOULD_CONTAIN_ROUTE_SEGMENT_IDS_ONLY",
        InvalidWalkSegmentsAreNotAdjacent => "INVALID_WALK_SEGMENTS_ARE_NOT_ADJACENT",
        RouteNetworkElementNotFound => "ROUTE_NETWORK_ELEMENT_NOT_FOUND",
        InterestNotFound => "INTEREST_NOT_FOUND",
        RouteNodesAreEqual => "ROUTE_NODES_ARE_EQUAL",
        NoPathFound => "NO_PATH_FOUND",
    }
);

/// Errors returned by command processing
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum UtilityNetworkCommandError {
    #[error("{code}: {message}")]
    SpanEquipment {
        code: SpanEquipmentErrorCode,
        message: String,
    },

    #[error("{code}: {message}")]
    TerminalEquipment {
        code: TerminalEquipmentErrorCode,
        message: String,
    },

    #[error("{code}: {message}")]
    NodeContainer {
        code: NodeContainerErrorCode,
        message: String,
    },

    #[error("{code}: {message}")]
    RouteNetwork {
        code: RouteNetworkErrorCode,
        message: String,
    },

    #[error("Concurrent modification of aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrentModification {
        aggregate_id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error(transparent)]
    Graph(#[from] UtilityGraphError),

    #[error("Event store failure: {0}")]
    EventStore(String),
}

impl UtilityNetworkCommandError {
    pub fn span_equipment(code: SpanEquipmentErrorCode, message: impl Into<String>) -> Self {
        Self::SpanEquipment {
            code,
            message: message.into(),
        }
    }

    pub fn terminal_equipment(code: TerminalEquipmentErrorCode, message: impl Into<String>) -> Self {
        Self::TerminalEquipment {
            code,
            message: message.into(),
        }
    }

    pub fn node_container(code: NodeContainerErrorCode, message: impl Into<String>) -> Self {
        Self::NodeContainer {
            code,
            message: message.into(),
        }
    }

    pub fn route_network(code: RouteNetworkErrorCode, message: impl Into<String>) -> Self {
        Self::RouteNetwork {
            code,
            message: message.into(),
        }
    }

    /// Stable code for API consumers
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SpanEquipment { code, .. } => code.as_str(),
            Self::TerminalEquipment { code, .. } => code.as_str(),
            Self::NodeContainer { code, .. } => code.as_str(),
            Self::RouteNetwork { code, .. } => code.as_str(),
            Self::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            Self::Graph(_) => "UTILITY_GRAPH_CORRUPTION",
            Self::EventStore(_) => "EVENT_STORE_FAILURE",
        }
    }

    /// True for user-correctable failures, false for corruption and
    /// infrastructure failures
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::SpanEquipment { .. }
                | Self::TerminalEquipment { .. }
                | Self::NodeContainer { .. }
                | Self::RouteNetwork { .. }
        )
    }
}

/// Result type for command processing
pub type UtilityNetworkCommandResult<T> = Result<T, UtilityNetworkCommandError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_wire_names() {
        assert_eq!(
            serde_json::to_string(&SpanEquipmentErrorCode::CutNodeNotPartOfWalk).unwrap(),
            "\"CUT_NODE_NOT_PART_OF_WALK\""
        );
        assert_eq!(
            RouteNetworkErrorCode::InvalidWalkCannotBeEmpty.to_string(),
            "INVALID_WALK_CANNOT_BE_EMPTY"
        );
    }

    #[test]
    fn test_command_error_display_and_code() {
        let error = UtilityNetworkCommandError::terminal_equipment(
            TerminalEquipmentErrorCode::CannotRemoveTerminalEquipmentWithConnectedTerminals,
            "disconnect first",
        );
        assert_eq!(
            error.to_string(),
            "CANNOT_REMOVE_TERMINAL_EQUIPMENT_WITH_CONNECTED_TERMINALS: disconnect first"
        );
        assert!(error.is_validation_error());

        let corruption: UtilityNetworkCommandError =
            UtilityGraphError::ElementNotFound(Uuid::nil()).into();
        assert_eq!(corruption.error_code(), "UTILITY_GRAPH_CORRUPTION");
        assert!(!corruption.is_validation_error());
    }
}
