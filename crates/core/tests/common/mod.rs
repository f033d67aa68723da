//! Shared helpers for building dependency graphs and running the cycle
//! driver in tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use adya_core::anomaly::{AnomalyMap, RelNameExplainer};
use adya_core::driver;
use adya_core::graph::DependencyGraph;
use adya_core::history::TxnId;
use adya_core::relation::{Rel, RelSet};

pub const WW: RelSet = RelSet::single(Rel::Ww);
pub const WR: RelSet = RelSet::single(Rel::Wr);
pub const RW: RelSet = RelSet::single(Rel::Rw);
pub const PROCESS: RelSet = RelSet::single(Rel::Process);
pub const REALTIME: RelSet = RelSet::single(Rel::Realtime);

#[must_use]
pub fn t(i: u64) -> TxnId {
    TxnId(i)
}

/// Build a graph from `(from, label, to)` triples.
#[must_use]
pub fn graph(edges: &[(u64, RelSet, u64)]) -> DependencyGraph {
    let mut graph = DependencyGraph::default();
    for (from, label, to) in edges {
        graph.add_edge(TxnId(*from), TxnId(*to), *label);
    }
    graph
}

/// Run the SCC driver over `graph` with a generous budget.
#[must_use]
pub fn detect(graph: DependencyGraph) -> AnomalyMap<&'static str, u64> {
    detect_with_timeout(graph, Duration::from_secs(5))
}

#[must_use]
pub fn detect_with_timeout(
    graph: DependencyGraph,
    timeout: Duration,
) -> AnomalyMap<&'static str, u64> {
    let graph = Arc::new(graph);
    let sccs = graph.sccs();
    driver::cycles(timeout, &graph, &RelNameExplainer, &sccs)
}
