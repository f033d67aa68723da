//! Assigns an anomaly type to a cycle from its edge composition.
//!
//! Each step is counted by its primary data relation (rw over ww over
//! wr, when an edge carries several); process and realtime participation
//! is counted by label membership so that, say, a `{ww,realtime}` edge
//! still drives the `-realtime` refinement. Adjacency of
//! anti-dependencies treats the last step and the first step as
//! neighbors.

use crate::anomaly::{AnomalyType, CycleExplanation, PairExplainer, Suffix};
use crate::relation::Rel;
use crate::search::{Cycle, CycleStep};

/// The primary data relation of a step, if it has one.
const fn primary(step: &CycleStep) -> Option<Rel> {
    if step.label.contains(Rel::Rw) {
        Some(Rel::Rw)
    } else if step.label.contains(Rel::Ww) {
        Some(Rel::Ww)
    } else if step.label.contains(Rel::Wr) {
        Some(Rel::Wr)
    } else {
        None
    }
}

/// Classify a cycle into the anomaly taxonomy.
///
/// # Panics
///
/// A cycle with no ww, wr, or rw step at all cannot be classified; that
/// is an internal invariant violation, not an analysis outcome.
#[must_use]
pub fn classify(cycle: &Cycle) -> AnomalyType {
    let steps = cycle.steps();
    let primaries: Vec<Option<Rel>> = steps.iter().map(primary).collect();

    let count = |rel: Rel| primaries.iter().filter(|p| **p == Some(rel)).count();
    let rw = count(Rel::Rw);
    let ww = count(Rel::Ww);
    let wr = count(Rel::Wr);

    let adjacent_rw = (0..steps.len()).any(|i| {
        primaries[i] == Some(Rel::Rw) && primaries[(i + 1) % steps.len()] == Some(Rel::Rw)
    });

    let base = if rw == 1 {
        AnomalyType::GSingle
    } else if rw > 1 && adjacent_rw {
        if steps.iter().any(|step| step.predicate) {
            AnomalyType::G2
        } else {
            AnomalyType::G2Item
        }
    } else if rw > 1 {
        AnomalyType::GNonadjacent
    } else if wr > 0 {
        AnomalyType::G1c
    } else if ww > 0 {
        AnomalyType::G0
    } else {
        panic!("cycle has no data dependency to classify: {cycle}");
    };

    // Realtime dominates: realtime order implies process order.
    let suffix = if steps.iter().any(|step| step.label.contains(Rel::Realtime)) {
        Suffix::Realtime
    } else if steps.iter().any(|step| step.label.contains(Rel::Process)) {
        Suffix::Process
    } else {
        Suffix::None
    };

    base.with_suffix(suffix)
}

/// Classify a cycle and render one explanation per step through the
/// pair explainer.
#[must_use]
pub fn explain(cycle: Cycle, explainer: &dyn PairExplainer) -> CycleExplanation {
    let anomaly_type = classify(&cycle);
    let steps = cycle
        .steps()
        .iter()
        .map(|step| explainer.explain(step.from, step.to, step.label))
        .collect();
    CycleExplanation {
        anomaly_type,
        cycle,
        steps,
    }
}
