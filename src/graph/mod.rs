//! Utility connectivity graph
//!
//! The in-memory, versioned graph of span segments, terminals and
//! connectivity links that every equipment aggregate keeps in sync, plus the
//! trace engine answering "what is this circuit physically connected to".
//!
//! ```mermaid
//! graph TD
//!     UG[UtilityGraph] --> IX[Element index]
//!     UG --> OM[ObjectManager]
//!     OM --> TX[Transaction]
//!     UG --> ED[UtilityGraphEdit]
//!     ED --> TX
//!     ED --> IX
//!     UG --> TR[Trace engine]
//!     TR --> SN[GraphSnapshot]
//! ```

pub mod edit;
pub mod elements;
pub mod object_manager;
pub mod trace;
pub mod utility_graph;

pub use edit::{SegmentEnd, StructureTerminal, TerminalEnd, UtilityGraphEdit};
pub use elements::*;
pub use object_manager::{
    GraphEdge, GraphNode, GraphSnapshot, ObjectManager, ObjectManagerConfig, Transaction,
};
pub use trace::{
    reached_terminals, trace_with_policy, Continuation, EdgeStep, TraceMode, TracePolicy,
    TraceResult,
};
pub use utility_graph::UtilityGraph;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Invariant and corruption errors raised by the utility graph.
///
/// These never describe a user-correctable condition. They indicate a bug
/// or corrupted state and are propagated, not retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum UtilityGraphError {
    #[error("Graph element {0} already exists in the utility graph index")]
    ElementAlreadyExists(Uuid),

    #[error("Graph element {0} not found in the utility graph index")]
    ElementNotFound(Uuid),

    #[error("Graph element {id} is a {actual}, expected {expected}")]
    UnexpectedElementKind {
        id: Uuid,
        expected: String,
        actual: String,
    },

    #[error("Graph node {0} not found")]
    NodeNotFound(Uuid),

    #[error("Graph edge {0} not found")]
    EdgeNotFound(Uuid),

    #[error("Graph object {0} already exists")]
    ObjectAlreadyExists(Uuid),

    #[error("Graph node {node_id} cannot be removed while it has {edge_count} edge(s)")]
    NodeStillHasEdges { node_id: Uuid, edge_count: usize },

    #[error("Terminal {terminal_id} has {neighbor_count} non-internal neighbors, at most 2 are allowed")]
    TerminalDegreeViolation {
        terminal_id: Uuid,
        neighbor_count: usize,
    },

    #[error("Object {object_id} was committed at version {committed_version} after transaction base version {base_version}")]
    TransactionConflict {
        object_id: Uuid,
        base_version: u64,
        committed_version: u64,
    },

    #[error("Snapshot version {requested} is older than the oldest readable version {oldest_readable}")]
    SnapshotExpired { requested: u64, oldest_readable: u64 },

    #[error("Utility graph index is inconsistent: {0}")]
    InconsistentIndex(String),
}

/// Result type for utility graph operations
pub type UtilityGraphResult<T> = Result<T, UtilityGraphError>;
