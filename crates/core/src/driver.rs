//! Walks every strongly connected component of the dependency graph,
//! hunting one witness per anomaly spec under a wall-clock budget.
//!
//! Each SCC is an independent task: it owns its induced subgraph and a
//! private projection cache, reads the shared pair explainer, and walks
//! the spec table in priority order. Tasks run in parallel; the merge
//! preserves per-type discovery order because SCC results come back in
//! SCC order.
//!
//! On budget expiry a task stops where it is, keeps everything already
//! found, and appends one timeout record plus one best-effort fallback
//! cycle found over a cascade of relation subsets -- a cheap witness the
//! operator can stare at even when the constrained searches ran out of
//! time.

use std::sync::Arc;
use std::time::Duration;

use hashbrown::HashSet;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::anomaly::classify::explain;
use crate::anomaly::spec::{spec_table, AnomalySpec};
use crate::anomaly::{insert, Anomaly, AnomalyMap, AnomalyType, PairExplainer};
use crate::graph::dependency::DependencyGraph;
use crate::graph::projection::ProjectionCache;
use crate::history::TxnId;
use crate::relation::{Rel, RelSet};
use crate::search::{find_cycle, Cycle, Deadline, SearchOutcome};

/// Relation subsets tried, in order, for the post-timeout fallback
/// witness. Coarse to fine; the first projection holding a non-trivial
/// SCC supplies the cycle.
const FALLBACK_CASCADE: [RelSet; 6] = [
    RelSet::single(Rel::Ww),
    RelSet::of(&[Rel::Ww, Rel::Realtime, Rel::Process]),
    RelSet::of(&[Rel::Ww, Rel::Wr]),
    RelSet::of(&[Rel::Ww, Rel::Wr, Rel::Realtime, Rel::Process]),
    RelSet::of(&[Rel::Ww, Rel::Wr, Rel::Rw]),
    RelSet::ALL,
];

/// Search every SCC for anomaly witnesses, `timeout` wall-clock budget
/// per SCC.
///
/// Returns the classified cycles (plus any timeout records) keyed by
/// anomaly type.
#[must_use]
pub fn cycles<Variable, Version>(
    timeout: Duration,
    graph: &Arc<DependencyGraph>,
    explainer: &dyn PairExplainer,
    sccs: &[Vec<TxnId>],
) -> AnomalyMap<Variable, Version>
where
    Variable: Send,
    Version: Send,
{
    let table = spec_table();
    let nontrivial: Vec<&Vec<TxnId>> = sccs.iter().filter(|scc| scc.len() >= 2).collect();

    tracing::debug!(
        sccs = sccs.len(),
        nontrivial = nontrivial.len(),
        ?timeout,
        "searching SCCs for anomaly witnesses"
    );

    let per_scc: Vec<Vec<Anomaly<Variable, Version>>> = nontrivial
        .par_iter()
        .map(|scc| check_scc(timeout, graph, explainer, scc.as_slice(), &table))
        .collect();

    let mut merged = AnomalyMap::new();
    for anomaly in per_scc.into_iter().flatten() {
        insert(&mut merged, anomaly);
    }
    merged
}

/// Walk the spec table over one SCC under its own deadline.
fn check_scc<Variable, Version>(
    timeout: Duration,
    graph: &Arc<DependencyGraph>,
    explainer: &dyn PairExplainer,
    scc: &[TxnId],
    table: &[AnomalySpec],
) -> Vec<Anomaly<Variable, Version>> {
    let members: HashSet<TxnId> = scc.iter().copied().collect();
    let mut cache = ProjectionCache::new(Arc::new(graph.induced(&members)));

    // Materialize every projection the table will ask for before the
    // clock starts; lazy materialization burns the budget on graph
    // construction instead of searching.
    cache.warm(table.iter().flat_map(AnomalySpec::warm_rels));

    let deadline = Deadline::after(timeout);
    let mut found: Vec<Anomaly<Variable, Version>> = Vec::new();
    let mut checked: Vec<AnomalyType> = Vec::new();

    for spec in table {
        if deadline.expired() {
            expire(spec, &checked, scc, &mut cache, explainer, &mut found);
            return found;
        }

        match spec.run(&mut cache, &deadline) {
            SearchOutcome::Found(cycle) => {
                tracing::trace!(spec = %spec.name, %cycle, "witness found");
                found.push(Anomaly::Cycle(explain(cycle, explainer)));
                checked.push(spec.name);
            }
            SearchOutcome::NotFound => checked.push(spec.name),
            SearchOutcome::Expired => {
                expire(spec, &checked, scc, &mut cache, explainer, &mut found);
                return found;
            }
        }
    }

    found
}

/// Record a timeout and append the best-effort fallback witness.
fn expire<Variable, Version>(
    active: &AnomalySpec,
    checked: &[AnomalyType],
    scc: &[TxnId],
    cache: &mut ProjectionCache,
    explainer: &dyn PairExplainer,
    found: &mut Vec<Anomaly<Variable, Version>>,
) {
    tracing::debug!(
        spec = %active.name,
        specs_checked = checked.len(),
        scc_size = scc.len(),
        "cycle search timed out"
    );

    found.push(Anomaly::CycleSearchTimeout {
        anomaly_spec_type: active.name,
        specs_checked: checked.to_vec(),
        scc_size: scc.len(),
    });

    if let Some(cycle) = fallback_cycle(cache) {
        found.push(Anomaly::Cycle(explain(cycle, explainer)));
    }
}

/// A cycle from the cheapest projection that still has one.
///
/// Walks [`FALLBACK_CASCADE`]; the first projection with a non-trivial
/// SCC contributes a witness from its smallest such component. When no
/// projection does, any cycle of the full subgraph serves (one exists:
/// the subgraph is strongly connected with at least two vertices).
fn fallback_cycle(cache: &mut ProjectionCache) -> Option<Cycle> {
    for rels in FALLBACK_CASCADE {
        let projection = cache.get(rels);
        let smallest = projection
            .sccs()
            .into_iter()
            .filter(|component| component.len() >= 2)
            .min_by_key(|component| (component.len(), component[0]));

        if let Some(component) = smallest {
            let members: HashSet<TxnId> = component.iter().copied().collect();
            let sub = projection.induced(&members);
            if let SearchOutcome::Found(cycle) = find_cycle(&sub, &Deadline::never()) {
                return Some(cycle);
            }
        }
    }

    find_cycle(cache.base(), &Deadline::never()).found()
}
