//! Declarative anomaly specifications and their interpreter.
//!
//! Each [`AnomalySpec`] names a cycle shape: a base edge alphabet plus
//! optional constraints (a rel set that must appear exactly once, at
//! least twice, at least once, or never at adjacent positions). The
//! interpreter compiles a spec into a [`Transition`] and a conjunction of
//! [`PathPredicate`]s, picks the cheapest applicable search, and runs it
//! over the right projection.
//!
//! The table is a plain ordered `Vec`, worst anomaly first; the driver's
//! walk order is observable (it decides what is found before a timeout),
//! so the table must never be hash-ordered.

use crate::anomaly::classify::classify;
use crate::anomaly::{AnomalyType, Suffix};
use crate::graph::projection::ProjectionCache;
use crate::relation::{Rel, RelSet};
use crate::search::{
    find_cycle, find_cycle_starting_with, find_cycle_with, Deadline, PathPredicate, SearchOutcome,
    Transition,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnomalySpec {
    /// The anomaly this spec hunts; also its display name.
    pub name: AnomalyType,
    /// Base edge alphabet for the cycle.
    pub rels: RelSet,
    /// Must appear, but never at adjacent positions (wrap included).
    pub nonadjacent: Option<RelSet>,
    /// Must appear exactly once, as the first edge.
    pub single: Option<RelSet>,
    /// Must appear at least twice.
    pub multiple: Option<RelSet>,
    /// Must appear at least once.
    pub required: Option<RelSet>,
    /// Force a process edge somewhere in the cycle.
    pub process: bool,
    /// Force a realtime edge somewhere in the cycle.
    pub realtime: bool,
    /// Reject witnesses whose classified type differs.
    pub filter: Option<AnomalyType>,
}

impl AnomalySpec {
    const fn new(name: AnomalyType, rels: RelSet) -> Self {
        Self {
            name,
            rels,
            nonadjacent: None,
            single: None,
            multiple: None,
            required: None,
            process: false,
            realtime: false,
            filter: None,
        }
    }

    const fn nonadjacent(mut self, rels: RelSet) -> Self {
        self.nonadjacent = Some(rels);
        self
    }

    const fn single(mut self, rels: RelSet) -> Self {
        self.single = Some(rels);
        self
    }

    const fn multiple(mut self, rels: RelSet) -> Self {
        self.multiple = Some(rels);
        self
    }

    const fn required(mut self, rels: RelSet) -> Self {
        self.required = Some(rels);
        self
    }

    const fn filter(mut self, anomaly_type: AnomalyType) -> Self {
        self.filter = Some(anomaly_type);
        self
    }

    /// The -process / -realtime refinement of this spec: the matching rel
    /// joins the alphabet, its presence becomes mandatory, and the name
    /// and filter are suffixed.
    #[must_use]
    pub fn variant(&self, suffix: Suffix) -> Self {
        let mut spec = *self;
        spec.name = spec.name.with_suffix(suffix);
        spec.filter = spec.filter.map(|filter| filter.with_suffix(suffix));
        match suffix {
            Suffix::None => {}
            Suffix::Process => {
                spec.rels = spec.rels.with(Rel::Process);
                spec.process = true;
            }
            Suffix::Realtime => {
                spec.rels = spec.rels.with(Rel::Realtime);
                spec.realtime = true;
            }
        }
        spec
    }

    /// # Panics
    ///
    /// An empty base alphabet is a configuration error.
    pub fn validate(&self) {
        assert!(
            !self.rels.is_empty(),
            "anomaly spec {} has an empty rel set",
            self.name
        );
    }

    /// Rel set of the projection searched when any path predicate or
    /// nonadjacency constraint is in play.
    #[must_use]
    pub fn combined_rels(&self) -> RelSet {
        [self.nonadjacent, self.single, self.multiple, self.required]
            .into_iter()
            .flatten()
            .fold(self.rels, RelSet::union)
    }

    /// Every projection [`run`] may request, for cache warm-up.
    ///
    /// [`run`]: AnomalySpec::run
    #[must_use]
    pub fn warm_rels(&self) -> Vec<RelSet> {
        let mut sets = vec![self.rels, self.combined_rels()];
        sets.extend(self.single);
        sets
    }

    fn compile_predicates(&self) -> Vec<PathPredicate> {
        let mut predicates = Vec::new();
        if let Some(multiple) = self.multiple {
            predicates.push(PathPredicate::Multiple(multiple));
        }
        if let Some(required) = self.required {
            predicates.push(PathPredicate::Required(required));
        }
        if self.process {
            predicates.push(PathPredicate::Required(RelSet::single(Rel::Process)));
        }
        if self.realtime {
            predicates.push(PathPredicate::Required(RelSet::single(Rel::Realtime)));
        }
        predicates
    }

    fn compile_transition(&self) -> Transition {
        if let Some(single) = self.single {
            Transition::FirstOnly(single)
        } else if let Some(nonadjacent) = self.nonadjacent {
            Transition::Nonadjacent(nonadjacent)
        } else {
            Transition::Trivial
        }
    }

    /// Search for one witness of this spec over the cached projections.
    #[must_use]
    pub fn run(&self, cache: &mut ProjectionCache, deadline: &Deadline) -> SearchOutcome {
        let predicates = self.compile_predicates();
        let transition = self.compile_transition();

        let outcome = if !predicates.is_empty() || self.nonadjacent.is_some() {
            let graph = cache.get(self.combined_rels());
            find_cycle_with(&transition, &predicates, &graph, deadline)
        } else if let Some(single) = self.single {
            let first = cache.get(single);
            let rest = cache.get(self.rels);
            find_cycle_starting_with(&first, &rest, deadline)
        } else {
            find_cycle(&cache.get(self.rels), deadline)
        };

        match outcome {
            SearchOutcome::Found(cycle) => {
                if self
                    .filter
                    .is_some_and(|filter| classify(&cycle) != filter)
                {
                    SearchOutcome::NotFound
                } else {
                    SearchOutcome::Found(cycle)
                }
            }
            other => other,
        }
    }
}

const WW: RelSet = RelSet::single(Rel::Ww);
const WR: RelSet = RelSet::single(Rel::Wr);
const RW: RelSet = RelSet::single(Rel::Rw);
const WW_WR: RelSet = RelSet::of(&[Rel::Ww, Rel::Wr]);
const WW_WR_RW: RelSet = RelSet::of(&[Rel::Ww, Rel::Wr, Rel::Rw]);

const BASE_SPECS: [AnomalySpec; 6] = [
    AnomalySpec::new(AnomalyType::G0, WW),
    AnomalySpec::new(AnomalyType::G1c, WW_WR).required(WR),
    AnomalySpec::new(AnomalyType::GSingle, WW_WR).single(RW),
    AnomalySpec::new(AnomalyType::GNonadjacent, WW_WR)
        .nonadjacent(RW)
        .multiple(RW)
        .filter(AnomalyType::GNonadjacent),
    AnomalySpec::new(AnomalyType::G2Item, WW_WR_RW)
        .multiple(RW)
        .filter(AnomalyType::G2Item),
    AnomalySpec::new(AnomalyType::G2, WW_WR_RW)
        .multiple(RW)
        .filter(AnomalyType::G2),
];

/// The fixed, priority-ordered anomaly spec table: the six base specs,
/// then their -process variants, then their -realtime variants. Lower
/// index is worse.
#[must_use]
pub fn spec_table() -> Vec<AnomalySpec> {
    let mut table: Vec<AnomalySpec> = BASE_SPECS.to_vec();
    table.extend(BASE_SPECS.iter().map(|spec| spec.variant(Suffix::Process)));
    table.extend(BASE_SPECS.iter().map(|spec| spec.variant(Suffix::Realtime)));
    for spec in &table {
        spec.validate();
    }
    table
}
