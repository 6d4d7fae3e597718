//! Utility network value objects
//!
//! Immutable equipment snapshots and the small enums they are built from.
//! Snapshots are replaced, never mutated, by the projection functions in
//! [`crate::projections::snapshot_functions`].

pub mod node_container;
pub mod span_equipment;
pub mod specifications;
pub mod terminal_equipment;

pub use node_container::*;
pub use span_equipment::*;
pub use specifications::*;
pub use terminal_equipment::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Signal direction of a terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TerminalDirection {
    In,
    Out,
    #[default]
    Bi,
}

impl TerminalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminalDirection::In => "IN",
            TerminalDirection::Out => "OUT",
            TerminalDirection::Bi => "BI",
        }
    }
}

impl fmt::Display for TerminalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where the content of a node container is drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VerticalContentAlignment {
    Top,
    #[default]
    Bottom,
}

impl VerticalContentAlignment {
    pub fn reverse(self) -> Self {
        match self {
            VerticalContentAlignment::Top => VerticalContentAlignment::Bottom,
            VerticalContentAlignment::Bottom => VerticalContentAlignment::Top,
        }
    }
}

/// Direction of a child span equipment relative to the parent it is affixed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpanEquipmentAffixDirection {
    Forward,
    Backward,
}

impl SpanEquipmentAffixDirection {
    pub fn reverse(self) -> Self {
        match self {
            SpanEquipmentAffixDirection::Forward => SpanEquipmentAffixDirection::Backward,
            SpanEquipmentAffixDirection::Backward => SpanEquipmentAffixDirection::Forward,
        }
    }
}

/// Side of a node container a span equipment enters through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeContainerSide {
    North,
    East,
    South,
    West,
}

/// Color and text printed on a cable or conduit
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MarkingInfo {
    pub marking_color: Option<String>,
    pub marking_text: Option<String>,
}
