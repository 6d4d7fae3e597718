//! Traces through splitters, closures and cut span equipment

mod common;

use cim_domain_utility_network::commands::{SpanSegmentTerminalPair, UtilityNetworkCommand};
use cim_domain_utility_network::graph::TraceMode;
use cim_domain_utility_network::{
    UtilityGraphElement, UtilityNetworkQueryHandler, UtilityNetworkQueryHandlerImpl,
};
use common::Harness;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

fn ids(elements: &[UtilityGraphElement]) -> Vec<Uuid> {
    elements.iter().map(|e| e.id()).collect()
}

/// Splitter at SP_1 fed from CC_1, with two drops towards J_1
struct SplitterSetup {
    h: Harness,
    feeder: Uuid,
    drop_1: Uuid,
    drop_2: Uuid,
    input: Uuid,
    output_1: Uuid,
}

async fn splitter_setup() -> SplitterSetup {
    let h = Harness::new();
    let n = h.network;
    let container = h.place_container(n.sp_1).await;
    let holder = h.place_terminal_equipment(container, h.specs.splitter_holder).await;

    let a = h.place_conduit(&[n.s5]).await;
    let b = h.place_conduit(&[n.s6]).await;
    let c = h.place_conduit(&[n.s6]).await;
    let (feeder, drop_1, drop_2) = (h.segment(a, 1, 0), h.segment(b, 1, 0), h.segment(c, 1, 0));
    let (input, output_1) = (h.terminal(holder, "in"), h.terminal(holder, "out1"));

    h.connect_to_terminal(n.sp_1, feeder, input).await;
    h.connect_to_terminal(n.sp_1, drop_1, output_1).await;
    h.connect_to_terminal(n.sp_1, drop_2, h.terminal(holder, "out2")).await;

    SplitterSetup {
        h,
        feeder,
        drop_1,
        drop_2,
        input,
        output_1,
    }
}

#[tokio::test]
async fn test_simple_trace_from_drop_reaches_feeder_only() {
    let s = splitter_setup().await;

    let trace = s.h.projection.graph().simple_trace(s.drop_1).unwrap();

    let upstream = ids(&trace.upstream);
    assert!(upstream.contains(&s.feeder));
    assert!(!upstream.contains(&s.drop_2));
    assert!(!upstream.contains(&s.input));
    assert!(trace.upstream.iter().all(|e| !e.is_internal_connectivity()));
    assert_eq!(ids(&trace.downstream), vec![Uuid::nil()]);
}

#[tokio::test]
async fn test_simple_trace_from_feeder_stops_at_splitter() {
    let s = splitter_setup().await;

    let trace = s.h.projection.graph().simple_trace(s.feeder).unwrap();

    assert_eq!(ids(&trace.downstream), vec![s.input]);
    assert_eq!(ids(&trace.upstream), vec![Uuid::nil()]);
}

#[tokio::test]
async fn test_outage_trace_passes_through_splitter() {
    let s = splitter_setup().await;
    let queries = UtilityNetworkQueryHandlerImpl::new(s.h.projection.clone(), s.h.route_network.clone());

    let trace = queries.trace(s.feeder, TraceMode::OutageView).await.unwrap();

    let downstream = ids(&trace.downstream);
    assert!(downstream.contains(&s.drop_1));
    assert!(downstream.contains(&s.drop_2));
    assert!(trace.downstream.iter().any(|e| e.is_internal_connectivity()));
    assert_eq!(trace.source.map(|e| e.id()), Some(s.feeder));
}

#[tokio::test]
async fn test_splitter_terminals_as_seeds() {
    let s = splitter_setup().await;
    let graph = s.h.projection.graph();

    let from_output = graph.simple_trace(s.output_1).unwrap();
    assert_eq!(ids(&from_output.upstream), vec![s.feeder, Uuid::nil()]);
    assert_eq!(ids(&from_output.downstream), vec![s.drop_1, Uuid::nil()]);

    let from_input = graph.outage_view_trace(s.input).unwrap();
    assert_eq!(ids(&from_input.upstream), vec![s.feeder, Uuid::nil()]);
    let downstream = ids(&from_input.downstream);
    assert!(downstream.contains(&s.drop_1));
    assert!(downstream.contains(&s.drop_2));
}

#[tokio::test]
async fn test_traces_during_rewiring_never_fail() {
    let s = splitter_setup().await;
    let seeds = [s.feeder, s.drop_1, s.output_1];
    let done = Arc::new(AtomicBool::new(false));

    let reader = {
        let projection = s.h.projection.clone();
        let done = done.clone();
        std::thread::spawn(move || {
            let mut failures = Vec::new();
            while !done.load(Ordering::Acquire) {
                for seed in seeds {
                    let graph = projection.graph();
                    for result in [graph.simple_trace(seed), graph.outage_view_trace(seed)] {
                        match result {
                            Ok(trace) if trace.source.is_some_and(|e| e.id() != seed) => {
                                failures.push(format!("trace from {seed} reports another source"))
                            }
                            Ok(_) => {}
                            Err(e) => failures.push(e.to_string()),
                        }
                    }
                }
            }
            failures
        })
    };

    let pair = SpanSegmentTerminalPair {
        span_segment_id: s.drop_1,
        terminal_id: s.output_1,
    };
    for _ in 0..200 {
        s.h.run(UtilityNetworkCommand::DisconnectSpanSegmentsFromTerminals { disconnects: vec![pair] })
            .await
            .unwrap();
        s.h.run(UtilityNetworkCommand::ConnectSpanSegmentsWithTerminalsAtRouteNode {
            route_node_id: s.h.network.sp_1,
            connects: vec![pair],
        })
        .await
        .unwrap();
    }
    done.store(true, Ordering::Release);

    let failures = reader.join().unwrap();
    assert!(failures.is_empty(), "{:?}", failures);
    assert_eq!(s.h.projection.graph().objects().pinned_snapshot_count(), 0);
}

#[tokio::test]
async fn test_unwired_elements_trace_empty() {
    let h = Harness::new();
    let n = h.network;
    let k1 = h.place_conduit(&[n.s1]).await;
    let container = h.place_container(n.hh_1).await;
    let closure = h.place_terminal_equipment(container, h.specs.closure).await;
    let graph = h.projection.graph();

    for seed in [h.segment(k1, 1, 0), h.terminal(closure, "1"), Uuid::new_v4()] {
        for trace in [graph.simple_trace(seed).unwrap(), graph.outage_view_trace(seed).unwrap()] {
            assert_eq!(trace.source_id, seed);
            assert!(trace.source.is_none());
            assert!(trace.upstream.is_empty());
            assert!(trace.downstream.is_empty());
        }
    }
}

#[tokio::test]
async fn test_terminal_trace_splits_by_segment_direction() {
    let h = Harness::new();
    let n = h.network;
    let container = h.place_container(n.hh_2).await;
    let closure = h.place_terminal_equipment(container, h.specs.closure).await;
    let terminal = h.terminal(closure, "1");
    let incoming = h.place_conduit(&[n.s1, n.s2]).await;
    let outgoing = h.place_conduit(&[n.s3]).await;

    // outgoing first, so insertion order does not decide the sides
    h.connect_to_terminal(n.hh_2, h.segment(outgoing, 1, 0), terminal).await;
    h.connect_to_terminal(n.hh_2, h.segment(incoming, 1, 0), terminal).await;

    let trace = h.projection.graph().simple_trace(terminal).unwrap();
    assert_eq!(ids(&trace.upstream), vec![h.segment(incoming, 1, 0), Uuid::nil()]);
    assert_eq!(ids(&trace.downstream), vec![h.segment(outgoing, 1, 0), Uuid::nil()]);
}

#[tokio::test]
async fn test_cut_segments_trace_through_closure() {
    let h = Harness::new();
    let n = h.network;
    let container = h.place_container(n.hh_1).await;
    let closure = h.place_terminal_equipment(container, h.specs.closure).await;
    let k1 = h.place_conduit(&[n.s1, n.s2]).await;
    h.run(UtilityNetworkCommand::CutSpanSegmentsAtRouteNode {
        route_node_id: n.hh_1,
        span_segment_ids: vec![h.segment(k1, 1, 0)],
    })
    .await
    .unwrap();
    let (west, east) = (h.segment(k1, 1, 0), h.segment(k1, 1, 1));
    let terminal = h.terminal(closure, "2");

    h.run(UtilityNetworkCommand::ConnectSpanSegmentsWithTerminalsAtRouteNode {
        route_node_id: n.hh_1,
        connects: vec![
            SpanSegmentTerminalPair {
                span_segment_id: west,
                terminal_id: terminal,
            },
            SpanSegmentTerminalPair {
                span_segment_id: east,
                terminal_id: terminal,
            },
        ],
    })
    .await
    .unwrap();

    let from_west = h.projection.graph().simple_trace(west).unwrap();
    let from_east = h.projection.graph().simple_trace(east).unwrap();
    assert_eq!(ids(&from_west.downstream), vec![terminal, east, Uuid::nil()]);
    assert_eq!(ids(&from_east.upstream), vec![terminal, west, Uuid::nil()]);
}

const HH_2_SEGMENTS: usize = 8;
const TRAY_TERMINALS: usize = 4;

/// Span segments ending at HH_2 and the terminals of a closure there
async fn closure_at_hh_2(h: &Harness) -> (Vec<Uuid>, Vec<Uuid>) {
    let n = h.network;
    let container = h.place_container(n.hh_2).await;
    let closure = h.place_terminal_equipment(container, h.specs.closure).await;

    let mut segments = Vec::new();
    for walk in [vec![n.s1, n.s2], vec![n.s3], vec![n.s4], vec![n.s11]] {
        let id = h.place_conduit(&walk).await;
        segments.push(h.segment(id, 1, 0));
        segments.push(h.segment(id, 2, 0));
    }
    let terminals = ["1", "2", "3", "4"].iter().map(|name| h.terminal(closure, name)).collect();
    (segments, terminals)
}

/// Apply random connects and disconnects, returning every broken invariant
async fn run_operations(operations: &[(usize, usize, bool)]) -> Vec<String> {
    let h = Harness::new();
    let (segments, terminals) = closure_at_hh_2(&h).await;
    let mut violations = Vec::new();

    for &(segment, terminal, connect) in operations {
        let pair = SpanSegmentTerminalPair {
            span_segment_id: segments[segment],
            terminal_id: terminals[terminal],
        };
        let command = if connect {
            UtilityNetworkCommand::ConnectSpanSegmentsWithTerminalsAtRouteNode {
                route_node_id: h.network.hh_2,
                connects: vec![pair],
            }
        } else {
            UtilityNetworkCommand::DisconnectSpanSegmentsFromTerminals { disconnects: vec![pair] }
        };
        if let Err(e) = h.run(command).await {
            if !e.is_validation_error() {
                violations.push(format!("unexpected failure: {e}"));
            }
        }

        let graph = h.projection.graph();
        for terminal_id in &terminals {
            let degree = graph.non_internal_neighbor_count(*terminal_id);
            if degree > 2 {
                violations.push(format!("terminal {terminal_id} has {degree} connections"));
            }
        }
        for seed in segments.iter().chain(terminals.iter()) {
            match graph.simple_trace(*seed) {
                Ok(trace) => {
                    let mut seen = HashSet::new();
                    for id in trace.all().map(|e| e.id()).filter(|id| !id.is_nil()) {
                        if id == *seed || !seen.insert(id) {
                            violations.push(format!("trace from {seed} repeats {id}"));
                        }
                    }
                }
                Err(e) => violations.push(format!("trace from {seed} failed: {e}")),
            }
        }
    }
    violations
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_terminals_never_exceed_two_connections(
        operations in proptest::collection::vec(
            (0..HH_2_SEGMENTS, 0..TRAY_TERMINALS, any::<bool>()),
            1..30,
        )
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let violations = runtime.block_on(run_operations(&operations));
        prop_assert!(violations.is_empty(), "{:?}", violations);
    }
}
