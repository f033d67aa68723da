//! Transactional anomaly detection for distributed database histories.
//!
//! `adya_core` takes a recorded history of transactions, builds (or is
//! handed) a multi-relational dependency graph over them, and classifies
//! the cycles of that graph into Adya's isolation-anomaly taxonomy:
//!
//! - **G0** -- dirty-write cycles (ww edges alone).
//! - **G1c** -- cyclic information flow (ww and wr edges).
//! - **G-single** -- an otherwise-consistent cycle with exactly one
//!   anti-dependency (rw) edge.
//! - **G-nonadjacent** -- two or more anti-dependencies, never adjacent.
//! - **G2-item / G2** -- item or predicate anti-dependency cycles.
//!
//! Each kind also comes in a `-process` and a `-realtime` refinement when
//! session-order or wall-clock-order edges participate in the cycle.
//! Alongside the cycle taxonomy, a direct scanner reports lost-update
//! patterns the version-order inference may have missed.
//!
//! Cycle search runs per strongly connected component, in parallel, one
//! witness per anomaly spec, under a wall-clock budget; exhausting the
//! budget yields an inconclusive timeout record plus a best-effort
//! fallback cycle, never a hang.
//!
//! # Entry point
//!
//! The main entry point is [`check_history()`], which analyzes a history,
//! hunts anomalies, and renders a [`Verdict`] against the declared
//! consistency models:
//!
//! ```rust,ignore
//! use adya_core::{check_history, CheckOptions, Validity};
//!
//! let verdict = check_history(&CheckOptions::default(), &history)?;
//! match verdict.valid {
//!     Validity::Valid => println!("consistent"),
//!     Validity::Unknown => println!("inconclusive: {:?}", verdict.anomaly_types),
//!     Validity::Invalid => println!("violation: {:?}", verdict.anomaly_types),
//! }
//! ```
//!
//! Callers with their own dependency-graph construction can skip the
//! built-in analyzer and drive [`driver::cycles()`] and
//! [`verdict::verdict()`] directly with any graph built from
//! [`graph::DependencyGraph`] operations.
//!
//! # Crate features
//!
//! - **`serde`** -- enables `Serialize`/`Deserialize` derives on core
//!   types (histories, anomalies, verdicts).

pub mod anomaly;
pub mod driver;
pub mod graph;
pub mod history;
pub mod models;
pub mod relation;
pub mod search;
pub mod verdict;

use std::time::Duration;

use crate::anomaly::{insert, Anomaly, AnomalyMap};
use crate::history::analyzer::{self, Analysis};
use crate::history::Transaction;

pub use crate::anomaly::AnomalyType;
pub use crate::models::ConsistencyModel;
pub use crate::verdict::{Validity, Verdict};

/// What a check should expect and how long it may search.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    /// Models the history is expected to satisfy.
    pub consistency_models: Vec<ConsistencyModel>,
    /// Extra anomaly kinds to flag beyond what the models prohibit.
    pub anomalies: Vec<AnomalyType>,
    /// Extra dependency graphs to union into the analyzed one, e.g. from
    /// domain-specific analyzers.
    pub additional_graphs: Vec<graph::DependencyGraph>,
    /// Wall-clock cycle-search budget per strongly connected component.
    pub cycle_search_timeout: Duration,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            consistency_models: vec![ConsistencyModel::StrictSerializable],
            anomalies: Vec::new(),
            additional_graphs: Vec::new(),
            cycle_search_timeout: Duration::from_millis(1000),
        }
    }
}

/// Check a history for isolation anomalies and render a verdict.
///
/// Pure and side-effect-free: analyzes the history into a dependency
/// graph, searches every SCC for anomaly witnesses, scans for lost
/// updates, and projects the findings onto the declared consistency
/// models. An empty dependency graph yields an inconclusive
/// `empty-transaction-graph` finding.
///
/// # Errors
///
/// Returns an [`analyzer::Error`] when the history itself is malformed
/// (duplicate written versions, reads of unwritten versions).
pub fn check_history<Variable, Version>(
    options: &CheckOptions,
    history: &[Transaction<Variable, Version>],
) -> Result<Verdict<Variable, Version>, analyzer::Error<Variable, Version>>
where
    Variable: Eq + core::hash::Hash + Clone + Ord + core::fmt::Debug + Send,
    Version: Eq + core::hash::Hash + Clone + Ord + core::fmt::Debug + Send,
{
    let Analysis {
        mut graph,
        explainer,
        mut sccs,
    } = analyzer::analyze(history)?;

    if !options.additional_graphs.is_empty() {
        let mut combined = (*graph).clone();
        for extra in &options.additional_graphs {
            combined.union(extra);
        }
        sccs = combined.sccs();
        graph = std::sync::Arc::new(combined);
    }

    let mut detected: AnomalyMap<Variable, Version> = if graph.is_empty() {
        let mut map = AnomalyMap::new();
        insert(&mut map, Anomaly::EmptyTransactionGraph);
        map
    } else {
        driver::cycles(
            options.cycle_search_timeout,
            &graph,
            explainer.as_ref(),
            &sccs,
        )
    };

    for case in anomaly::lost_update::scan(history) {
        insert(&mut detected, case.into());
    }

    Ok(verdict::verdict(
        &options.consistency_models,
        &options.anomalies,
        detected,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Mop;

    #[test]
    fn test_empty_history_is_inconclusive() {
        let verdict = check_history::<&str, u64>(&CheckOptions::default(), &[]).unwrap();
        assert_eq!(verdict.valid, Validity::Unknown);
        assert_eq!(
            verdict.anomaly_types,
            vec![AnomalyType::EmptyTransactionGraph]
        );
    }

    #[test]
    fn test_serial_history_is_valid() {
        let history = vec![
            Transaction::ok(0, 0, vec![Mop::write("x", 1u64)]),
            Transaction::ok(1, 1, vec![Mop::read("x", 1), Mop::write("x", 2)]),
            Transaction::ok(2, 0, vec![Mop::read("x", 2)]),
        ];

        let verdict = check_history(&CheckOptions::default(), &history).unwrap();
        assert_eq!(verdict.valid, Validity::Valid);
    }

    #[test]
    fn test_additional_graph_contributes_edges() {
        use crate::graph::DependencyGraph;
        use crate::history::TxnId;
        use crate::relation::{Rel, RelSet};

        // A benign history of unrelated writers, plus an external graph
        // supplying a ww cycle between them.
        let history = vec![
            Transaction::ok(0, 0, vec![Mop::write("x", 1u64)]),
            Transaction::ok(1, 1, vec![Mop::write("y", 1)]),
        ];

        let mut extra = DependencyGraph::default();
        extra.add_edge(TxnId(0), TxnId(1), RelSet::single(Rel::Ww));
        extra.add_edge(TxnId(1), TxnId(0), RelSet::single(Rel::Ww));

        let options = CheckOptions {
            additional_graphs: vec![extra],
            ..CheckOptions::default()
        };
        let verdict = check_history(&options, &history).unwrap();
        assert_eq!(verdict.valid, Validity::Invalid);
        assert!(verdict.anomaly_types.contains(&AnomalyType::G0));
    }
}
