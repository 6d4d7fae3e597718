//! Connectivity trace engine
//!
//! Both traces run the same worklist depth-first traversal over one
//! [`GraphSnapshot`]. They differ only in the continuation policy applied to
//! each candidate edge and in how the visited elements are filtered.
//!
//! ```mermaid
//! graph LR
//!     S[Seed element] --> P{Partition}
//!     P -->|upstream side| U[DFS upstream]
//!     P -->|downstream side| D[DFS downstream]
//!     U --> F[Filter]
//!     D --> F
//!     F --> R[TraceResult]
//! ```

use super::object_manager::{GraphEdge, GraphNode, GraphSnapshot};
use super::{
    GraphNodeKind, UtilityGraph, UtilityGraphConnectedTerminal,
    UtilityGraphElement, UtilityGraphError, UtilityGraphResult,
};
use crate::value_objects::TerminalDirection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Which trace variant to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceMode {
    /// Stops at splitters and hides equipment internals
    Simple,
    /// Passes through splitters, unfiltered
    OutageView,
}

/// Outcome of a trace from one segment or terminal
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceResult {
    pub source_id: Uuid,
    /// The seed element, `None` when it is unknown or not wired into the graph
    pub source: Option<UtilityGraphElement>,
    pub downstream: Vec<UtilityGraphElement>,
    pub upstream: Vec<UtilityGraphElement>,
}

impl TraceResult {
    fn empty(source_id: Uuid) -> Self {
        Self {
            source_id,
            ..Default::default()
        }
    }

    /// All elements reached in either direction
    pub fn all(&self) -> impl Iterator<Item = &UtilityGraphElement> {
        self.upstream.iter().chain(self.downstream.iter())
    }
}

/// Decision taken for a candidate edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Stop,
    Continue,
    /// Continue and mark the rest of the path as walking backwards through
    /// equipment
    ContinueUpstream,
}

/// What the edge policy gets to look at
pub struct EdgeStep<'s> {
    pub edge: &'s GraphEdge,
    /// Node the traversal is leaving
    pub from: &'s GraphNode,
    /// Node the edge leads to, if the edge is not dangling there
    pub to: Option<&'s GraphNode>,
    pub upstream: bool,
}

/// Injected traversal policy
pub struct TracePolicy<N, E>
where
    N: Fn(&GraphNode, bool) -> bool,
    E: Fn(&EdgeStep<'_>) -> Continuation,
{
    pub continue_into_node: N,
    pub continue_across_edge: E,
}

fn terminal_direction(node: &GraphNode) -> Option<TerminalDirection> {
    node.kind.terminal().map(|t| t.direction)
}

fn simple_edge_policy(step: &EdgeStep<'_>) -> Continuation {
    if !step.edge.kind.is_internal_link() {
        return Continuation::Continue;
    }

    match step.from.kind {
        GraphNodeKind::Terminal(t) if t.direction == TerminalDirection::Out => {
            Continuation::ContinueUpstream
        }
        GraphNodeKind::InternalConnectivity(_) => {
            let into_out_terminal = step
                .to
                .and_then(terminal_direction)
                .is_some_and(|d| d == TerminalDirection::Out);
            if step.upstream && !into_out_terminal {
                Continuation::Continue
            } else {
                Continuation::Stop
            }
        }
        GraphNodeKind::Terminal(_) => Continuation::Stop,
    }
}

fn outage_edge_policy(step: &EdgeStep<'_>) -> Continuation {
    if step.edge.kind.is_internal_link()
        && terminal_direction(step.from) == Some(TerminalDirection::Out)
    {
        return Continuation::Stop;
    }
    Continuation::Continue
}

enum Frame {
    Node {
        id: Uuid,
        via_edge: Uuid,
        upstream: bool,
    },
    Edge {
        id: Uuid,
        from_node: Uuid,
        upstream: bool,
    },
}

struct Traversal<'g, N, E>
where
    N: Fn(&GraphNode, bool) -> bool,
    E: Fn(&EdgeStep<'_>) -> Continuation,
{
    snapshot: GraphSnapshot<'g>,
    policy: TracePolicy<N, E>,
    visited: HashSet<Uuid>,
}

impl<'g, N, E> Traversal<'g, N, E>
where
    N: Fn(&GraphNode, bool) -> bool,
    E: Fn(&EdgeStep<'_>) -> Continuation,
{
    fn node(&self, id: Uuid) -> UtilityGraphResult<Arc<GraphNode>> {
        self.snapshot
            .node(id)?
            .ok_or(UtilityGraphError::NodeNotFound(id))
    }

    fn edge(&self, id: Uuid) -> UtilityGraphResult<Arc<GraphEdge>> {
        self.snapshot
            .edge(id)?
            .ok_or(UtilityGraphError::EdgeNotFound(id))
    }

    /// Non-internal edges of a terminal, enforcing the degree invariant
    fn check_degree(&self, node: &GraphNode) -> UtilityGraphResult<()> {
        if node.kind.terminal().is_none() {
            return Ok(());
        }
        let mut count = 0;
        for edge_id in &node.edges {
            if !self.edge(*edge_id)?.kind.is_internal_link() {
                count += 1;
            }
        }
        if count > 2 {
            return Err(UtilityGraphError::TerminalDegreeViolation {
                terminal_id: node.id,
                neighbor_count: count,
            });
        }
        Ok(())
    }

    /// Walk from the given start frames, returning elements in visit order
    fn run(&mut self, start: Vec<Frame>) -> UtilityGraphResult<Vec<UtilityGraphElement>> {
        let mut out = Vec::new();
        let mut stack: Vec<Frame> = start.into_iter().rev().collect();

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Edge {
                    id,
                    from_node,
                    upstream,
                } => {
                    if !self.visited.insert(id) {
                        continue;
                    }
                    let edge = self.edge(id)?;
                    out.push(edge.kind.to_element());

                    match edge.other_end(from_node) {
                        Some(next) => stack.push(Frame::Node {
                            id: next,
                            via_edge: id,
                            upstream,
                        }),
                        None => out.push(UtilityGraphConnectedTerminal::dummy().into()),
                    }
                }
                Frame::Node {
                    id,
                    via_edge,
                    upstream,
                } => {
                    if !self.visited.insert(id) {
                        continue;
                    }
                    let node = self.node(id)?;
                    self.check_degree(&node)?;
                    out.push(node.kind.to_element());

                    if !(self.policy.continue_into_node)(&node, upstream) {
                        continue;
                    }

                    let mut next = Vec::new();
                    for edge_id in node.edges.iter().filter(|e| **e != via_edge) {
                        if self.visited.contains(edge_id) {
                            continue;
                        }
                        if let Some(frame) = self.step(&node, *edge_id, upstream)? {
                            next.push(frame);
                        }
                    }
                    stack.extend(next.into_iter().rev());
                }
            }
        }

        Ok(out)
    }

    /// Apply the edge policy to one candidate edge
    fn step(
        &self,
        from: &GraphNode,
        edge_id: Uuid,
        upstream: bool,
    ) -> UtilityGraphResult<Option<Frame>> {
        let edge = self.edge(edge_id)?;
        let to = match edge.other_end(from.id) {
            Some(id) => Some(self.node(id)?),
            None => None,
        };
        let decision = (self.policy.continue_across_edge)(&EdgeStep {
            edge: &edge,
            from,
            to: to.as_deref(),
            upstream,
        });

        Ok(match decision {
            Continuation::Stop => None,
            Continuation::Continue => Some(Frame::Edge {
                id: edge_id,
                from_node: from.id,
                upstream,
            }),
            Continuation::ContinueUpstream => Some(Frame::Edge {
                id: edge_id,
                from_node: from.id,
                upstream: true,
            }),
        })
    }

    /// Start frames for a terminal seed, split into (upstream, downstream)
    fn terminal_sides(
        &self,
        node: &GraphNode,
        direction: TerminalDirection,
    ) -> UtilityGraphResult<(Vec<Frame>, Vec<Frame>)> {
        let mut internal = Vec::new();
        let mut external = Vec::new();
        for edge_id in &node.edges {
            let edge = self.edge(*edge_id)?;
            if edge.kind.is_internal_link() {
                internal.push(edge);
            } else {
                external.push(edge);
            }
        }

        let internal_upstream = direction == TerminalDirection::Out;
        let (mut up, mut down) = (Vec::new(), Vec::new());

        match external.as_slice() {
            [] => {}
            [single] => {
                let single_upstream = if internal.is_empty() {
                    direction != TerminalDirection::Out
                } else {
                    !internal_upstream
                };
                if single_upstream {
                    up.push(single.clone());
                } else {
                    down.push(single.clone());
                }
            }
            [a, b] => {
                let ends_here = |e: &GraphEdge| e.to_node_id == Some(node.id);
                let starts_here = |e: &GraphEdge| e.from_node_id == Some(node.id);
                if starts_here(a) && ends_here(b) && !ends_here(a) {
                    up.push(b.clone());
                    down.push(a.clone());
                } else {
                    up.push(a.clone());
                    down.push(b.clone());
                }
            }
            _ => {
                return Err(UtilityGraphError::TerminalDegreeViolation {
                    terminal_id: node.id,
                    neighbor_count: external.len(),
                })
            }
        }

        if internal_upstream {
            up.extend(internal);
        } else {
            down.extend(internal);
        }

        let frames = |edges: Vec<Arc<GraphEdge>>| -> UtilityGraphResult<Vec<Frame>> {
            let mut out = Vec::new();
            for edge in edges {
                if let Some(frame) = self.step(node, edge.id, false)? {
                    out.push(frame);
                }
            }
            Ok(out)
        };

        Ok((frames(up)?, frames(down)?))
    }
}

/// Run a trace of the given mode from a segment or terminal
pub(crate) fn trace(
    graph: &UtilityGraph,
    id: Uuid,
    mode: TraceMode,
) -> UtilityGraphResult<TraceResult> {
    match mode {
        TraceMode::Simple => {
            let policy = TracePolicy {
                continue_into_node: |_: &GraphNode, _: bool| true,
                continue_across_edge: simple_edge_policy,
            };
            let mut result = trace_with_policy(graph, id, policy)?;
            filter_simple(&mut result);
            Ok(result)
        }
        TraceMode::OutageView => {
            let policy = TracePolicy {
                continue_into_node: |_: &GraphNode, _: bool| true,
                continue_across_edge: outage_edge_policy,
            };
            trace_with_policy(graph, id, policy)
        }
    }
}

/// Run the traversal from a seed with a custom policy, unfiltered
pub fn trace_with_policy<N, E>(
    graph: &UtilityGraph,
    id: Uuid,
    policy: TracePolicy<N, E>,
) -> UtilityGraphResult<TraceResult>
where
    N: Fn(&GraphNode, bool) -> bool,
    E: Fn(&EdgeStep<'_>) -> Continuation,
{
    // Connected elements live in the versioned store, so the seed is
    // resolved from the same snapshot the traversal reads.
    let snapshot = graph.snapshot();
    let seed_edge = snapshot.edge(id)?;
    let seed_node = match seed_edge {
        Some(_) => None,
        None => snapshot.node(id)?,
    };

    let mut traversal = Traversal {
        snapshot,
        policy,
        visited: HashSet::from([id]),
    };

    let (source, up, down) = match (seed_edge, seed_node) {
        (Some(edge), _) => {
            let upstream = traversal.run(start_from_end(edge.from_node_id, id))?;
            let downstream = traversal.run(start_from_end(edge.to_node_id, id))?;
            (
                edge.kind.to_element(),
                with_dangling_end(edge.from_node_id, upstream),
                with_dangling_end(edge.to_node_id, downstream),
            )
        }
        (None, Some(node)) => match node.kind {
            GraphNodeKind::Terminal(terminal) => {
                traversal.check_degree(&node)?;
                let (up_frames, down_frames) =
                    traversal.terminal_sides(&node, terminal.direction)?;
                let upstream = traversal.run(up_frames)?;
                let downstream = traversal.run(down_frames)?;
                (node.kind.to_element(), upstream, downstream)
            }
            GraphNodeKind::InternalConnectivity(_) => {
                let mut frames = Vec::new();
                for edge_id in &node.edges {
                    if let Some(frame) = traversal.step(&node, *edge_id, false)? {
                        frames.push(frame);
                    }
                }
                (node.kind.to_element(), Vec::new(), traversal.run(frames)?)
            }
        },
        (None, None) => return Ok(TraceResult::empty(id)),
    };

    Ok(TraceResult {
        source_id: id,
        source: Some(source),
        downstream: down,
        upstream: up,
    })
}

fn start_from_end(node_id: Option<Uuid>, via_edge: Uuid) -> Vec<Frame> {
    node_id
        .map(|id| Frame::Node {
            id,
            via_edge,
            upstream: false,
        })
        .into_iter()
        .collect()
}

fn with_dangling_end(
    node_id: Option<Uuid>,
    mut elements: Vec<UtilityGraphElement>,
) -> Vec<UtilityGraphElement> {
    if node_id.is_none() {
        elements.push(UtilityGraphConnectedTerminal::dummy().into());
    }
    elements
}

/// Hide equipment internals and direction-inconsistent equipment terminals
fn filter_simple(result: &mut TraceResult) {
    let keep = |element: &UtilityGraphElement, dropped: TerminalDirection| match element {
        UtilityGraphElement::InternalEquipmentConnectivityNode(_)
        | UtilityGraphElement::InternalEquipmentConnectivityLink(_) => false,
        UtilityGraphElement::ConnectedTerminal(t) => {
            t.is_simple_terminal() || t.direction != dropped
        }
        _ => true,
    };
    result
        .downstream
        .retain(|e| keep(e, TerminalDirection::Out));
    result.upstream.retain(|e| keep(e, TerminalDirection::In));
}

/// Elements of a trace that are terminals, nil ids excluded
pub fn reached_terminals(elements: &[UtilityGraphElement]) -> Vec<Uuid> {
    elements
        .iter()
        .filter_map(|e| match e {
            UtilityGraphElement::ConnectedTerminal(t) if !t.is_dummy() => Some(t.id),
            _ => None,
        })
        .collect()
}
