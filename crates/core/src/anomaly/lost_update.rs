//! Direct lost-update detection.
//!
//! Two committed transactions that both externally read the same version
//! of a key and both wrote that key form the classical lost-update
//! pattern. The cycle search can miss these when version-order inference
//! misses a ww edge, so they are reported directly from the history.

use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};

use crate::anomaly::LostUpdateCase;
use crate::history::{Mop, Transaction, TxnId};

/// Scan committed transactions for lost-update cases.
///
/// A transaction participates for key `k` when its first access to `k`
/// is a read and it writes `k` later. Every group of two or more such
/// transactions sharing the read version yields one case. Cases are
/// ordered by key then version; transactions within a case appear in
/// history order.
#[must_use]
pub fn scan<Variable, Version>(
    history: &[Transaction<Variable, Version>],
) -> Vec<LostUpdateCase<Variable, Version>>
where
    Variable: Eq + core::hash::Hash + Clone + Ord,
    Version: Eq + Clone + Ord,
{
    let mut index: BTreeMap<Variable, BTreeMap<Option<Version>, Vec<TxnId>>> = BTreeMap::new();

    for txn in history.iter().filter(|txn| txn.committed()) {
        // First access per variable, in mop order.
        let mut seen: HashSet<Variable> = HashSet::new();
        let mut external_reads: HashMap<Variable, Option<Version>> = HashMap::new();
        let mut wrote: HashSet<Variable> = HashSet::new();

        for mop in &txn.mops {
            match mop {
                Mop::Read { variable, version } => {
                    if seen.insert(variable.clone()) {
                        external_reads.insert(variable.clone(), version.clone());
                    }
                }
                Mop::Write { variable, .. } => {
                    seen.insert(variable.clone());
                    wrote.insert(variable.clone());
                }
            }
        }

        for (variable, version) in external_reads {
            if wrote.contains(&variable) {
                index
                    .entry(variable)
                    .or_default()
                    .entry(version)
                    .or_default()
                    .push(txn.id);
            }
        }
    }

    let mut cases = Vec::new();
    for (variable, by_version) in index {
        for (version, txns) in by_version {
            if txns.len() >= 2 {
                cases.push(LostUpdateCase {
                    variable: variable.clone(),
                    version,
                    txns,
                });
            }
        }
    }
    cases
}
