//! Builds the multi-relational dependency graph from a recorded history.
//!
//! The analyzer assumes the workload invariant that every written
//! version is unique per variable, and takes the per-variable version
//! order to be the order writes appear in the history. From that it
//! derives:
//!
//! - `wr` -- from the writer of a version to each external reader of it;
//! - `ww` -- between consecutive writers in a variable's version order;
//! - `rw` -- from each external reader of a version to the writer of the
//!   next version of that variable;
//! - `process` -- between consecutive committed transactions of the same
//!   logical client;
//! - `realtime` -- from a transaction whose recorded interval ends
//!   before another's begins. Pairs are scanned exhaustively; histories
//!   here are test-fixture scale.
//!
//! Only committed transactions participate. The result bundles the
//! graph, a [`PairExplainer`] that cites the variable and versions
//! justifying each edge, and the graph's SCC decomposition -- the
//! contract the cycle driver consumes. Client-built bundles work just as
//! well; this analyzer is merely the built-in one.

use core::fmt::Debug;
use core::hash::Hash;
use std::collections::BTreeMap;
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};

use crate::anomaly::PairExplainer;
use crate::graph::dependency::DependencyGraph;
use crate::history::{Mop, Transaction, TxnId};
use crate::relation::{Rel, RelSet};

/// Error converting a history into a dependency graph.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error<Variable, Version> {
    /// Two writes produced the same version of a variable.
    DuplicateWrite {
        variable: Variable,
        version: Version,
        writers: [TxnId; 2],
    },
    /// A committed transaction read a version nobody wrote.
    UnwrittenVersionRead {
        variable: Variable,
        version: Version,
        reader: TxnId,
    },
}

/// The analyzer's output: everything the cycle driver needs.
pub struct Analysis {
    pub graph: Arc<DependencyGraph>,
    pub explainer: Box<dyn PairExplainer>,
    pub sccs: Vec<Vec<TxnId>>,
}

/// Explains edges by citing the variable and versions that induced them.
struct EvidenceExplainer {
    reasons: HashMap<(TxnId, TxnId), Vec<(Rel, String)>>,
}

impl PairExplainer for EvidenceExplainer {
    fn explain(&self, from: TxnId, to: TxnId, rels: RelSet) -> String {
        let relevant: Vec<&str> = self
            .reasons
            .get(&(from, to))
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(rel, _)| rels.contains(*rel))
                    .map(|(_, reason)| reason.as_str())
                    .collect()
            })
            .unwrap_or_default();

        if relevant.is_empty() {
            format!("{from} -{rels}-> {to}")
        } else {
            relevant.join("; ")
        }
    }
}

/// Analyze a history into a dependency graph bundle.
///
/// # Errors
///
/// Returns [`Error::DuplicateWrite`] when the unique-writes invariant is
/// broken, and [`Error::UnwrittenVersionRead`] when a committed read
/// observes a version with no writer.
pub fn analyze<Variable, Version>(
    history: &[Transaction<Variable, Version>],
) -> Result<Analysis, Error<Variable, Version>>
where
    Variable: Eq + Hash + Clone + Ord + Debug,
    Version: Eq + Hash + Clone + Debug,
{
    let mut committed: Vec<&Transaction<Variable, Version>> =
        history.iter().filter(|txn| txn.committed()).collect();
    committed.sort_by_key(|txn| txn.id);

    tracing::debug!(
        transactions = history.len(),
        committed = committed.len(),
        "analyzing history"
    );

    let mut graph = DependencyGraph::default();
    let mut reasons: HashMap<(TxnId, TxnId), Vec<(Rel, String)>> = HashMap::new();

    for txn in &committed {
        graph.add_vertex(txn.id);
    }

    // Version index: writer per (variable, version), and per-variable
    // version chains in history order. The chain map is ordered so edge
    // evidence renders deterministically.
    let mut writer_of: HashMap<(Variable, Version), TxnId> = HashMap::new();
    let mut chains: BTreeMap<Variable, Vec<(Version, TxnId)>> = BTreeMap::new();

    for txn in &committed {
        for mop in &txn.mops {
            if let Mop::Write { variable, version } = mop {
                if let Some(previous) =
                    writer_of.insert((variable.clone(), version.clone()), txn.id)
                {
                    return Err(Error::DuplicateWrite {
                        variable: variable.clone(),
                        version: version.clone(),
                        writers: [previous, txn.id],
                    });
                }
                chains
                    .entry(variable.clone())
                    .or_default()
                    .push((version.clone(), txn.id));
            }
        }
    }

    // External reads: the first access to a variable within the
    // transaction is a read of another transaction's write.
    let mut external_reads: Vec<(TxnId, Variable, Version)> = Vec::new();
    for txn in &committed {
        let mut accessed: HashSet<Variable> = HashSet::new();
        for mop in &txn.mops {
            match mop {
                Mop::Read { variable, version } => {
                    if accessed.insert(variable.clone()) {
                        if let Some(version) = version {
                            if !writer_of.contains_key(&(variable.clone(), version.clone())) {
                                return Err(Error::UnwrittenVersionRead {
                                    variable: variable.clone(),
                                    version: version.clone(),
                                    reader: txn.id,
                                });
                            }
                            external_reads.push((txn.id, variable.clone(), version.clone()));
                        }
                    }
                }
                Mop::Write { variable, .. } => {
                    accessed.insert(variable.clone());
                }
            }
        }
    }

    let mut add = |graph: &mut DependencyGraph,
                   from: TxnId,
                   to: TxnId,
                   rel: Rel,
                   reason: String| {
        graph.add_edge(from, to, RelSet::single(rel));
        reasons.entry((from, to)).or_default().push((rel, reason));
    };

    // wr edges.
    for (reader, variable, version) in &external_reads {
        let writer = writer_of[&(variable.clone(), version.clone())];
        if writer != *reader {
            add(
                &mut graph,
                writer,
                *reader,
                Rel::Wr,
                format!("{writer} wrote {variable:?} = {version:?}, which {reader} read"),
            );
        }
    }

    // ww edges along each version chain.
    for (variable, chain) in &chains {
        for window in chain.windows(2) {
            let (earlier_version, earlier) = &window[0];
            let (later_version, later) = &window[1];
            if earlier != later {
                add(
                    &mut graph,
                    *earlier,
                    *later,
                    Rel::Ww,
                    format!(
                        "{earlier} wrote {variable:?} = {earlier_version:?}, \
                         overwritten by {later}'s {variable:?} = {later_version:?}"
                    ),
                );
            }
        }
    }

    // rw edges: a reader of version i anti-depends on the writer of
    // version i+1.
    let mut successor_write: HashMap<(Variable, Version), (Version, TxnId)> = HashMap::new();
    for (variable, chain) in &chains {
        for window in chain.windows(2) {
            let (version, _) = &window[0];
            successor_write.insert(
                (variable.clone(), version.clone()),
                window[1].clone(),
            );
        }
    }
    for (reader, variable, version) in &external_reads {
        if let Some((next_version, next_writer)) =
            successor_write.get(&(variable.clone(), version.clone()))
        {
            if next_writer != reader {
                add(
                    &mut graph,
                    *reader,
                    *next_writer,
                    Rel::Rw,
                    format!(
                        "{reader} read {variable:?} = {version:?}, \
                         overwritten by {next_writer}'s {variable:?} = {next_version:?}"
                    ),
                );
            }
        }
    }

    // process edges: consecutive committed transactions per client.
    let mut by_process: BTreeMap<u64, Vec<TxnId>> = BTreeMap::new();
    for txn in &committed {
        by_process.entry(txn.process).or_default().push(txn.id);
    }
    for (process, ids) in &by_process {
        for window in ids.windows(2) {
            add(
                &mut graph,
                window[0],
                window[1],
                Rel::Process,
                format!("process {process} ran {} before {}", window[0], window[1]),
            );
        }
    }

    // realtime edges: a's interval ends strictly before b's begins.
    for a in &committed {
        let Some((_, a_end)) = a.interval else {
            continue;
        };
        for b in &committed {
            let Some((b_start, _)) = b.interval else {
                continue;
            };
            if a.id != b.id && a_end < b_start {
                add(
                    &mut graph,
                    a.id,
                    b.id,
                    Rel::Realtime,
                    format!("{} completed before {} began", a.id, b.id),
                );
            }
        }
    }

    let sccs = graph.sccs();
    tracing::debug!(
        vertices = graph.vertex_count(),
        edges = graph.edge_count(),
        sccs = sccs.len(),
        "dependency graph built"
    );

    Ok(Analysis {
        graph: Arc::new(graph),
        explainer: Box::new(EvidenceExplainer { reasons }),
        sccs,
    })
}
