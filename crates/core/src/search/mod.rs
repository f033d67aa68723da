//! Bounded cycle searches over a projected dependency graph.
//!
//! Three searches, all returning at most one witness:
//!
//! 1. [`find_cycle`] -- any simple cycle.
//! 2. [`find_cycle_starting_with`] -- a cycle whose first edge comes from
//!    one graph and whose remaining edges come from another.
//! 3. [`find_cycle_with`] -- the general form: a per-step [`Transition`]
//!    filters each edge as the path grows, and a conjunction of
//!    [`PathPredicate`]s must hold over the whole path once it closes.
//!
//! All three iterate vertices and successors in ascending index order, so
//! the witness for a given graph is deterministic. Paths never repeat an
//! interior vertex, and `find_cycle_with` memoizes expanded
//! (vertex, state) pairs per start so each call is O(|V|·|E|) in the
//! worst case -- which is what makes the driver's wall-clock budget
//! meaningful.
//!
//! Searches never fail for a "no cycle" outcome; they report
//! [`SearchOutcome::NotFound`]. An expired [`Deadline`] is reported
//! in-band as [`SearchOutcome::Expired`], checked at every expansion.

use std::time::{Duration, Instant};

use hashbrown::HashSet;

use crate::graph::dependency::DependencyGraph;
use crate::history::TxnId;
use crate::relation::RelSet;

/// One step of a cycle: a labeled edge between two transactions.
///
/// `predicate` marks a predicate anti-dependency; nothing in this crate
/// sets it, but externally built cycles may, and the classifier consumes
/// it to distinguish G2 from G2-item.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleStep {
    pub from: TxnId,
    pub label: RelSet,
    pub to: TxnId,
    pub predicate: bool,
}

impl CycleStep {
    #[must_use]
    pub const fn new(from: TxnId, label: RelSet, to: TxnId) -> Self {
        Self {
            from,
            label,
            to,
            predicate: false,
        }
    }
}

/// A simple cycle: at least two chained steps, the last wrapping back to
/// the first step's source.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cycle {
    steps: Vec<CycleStep>,
}

impl Cycle {
    /// # Panics
    ///
    /// Panics if the steps do not chain into a closed cycle of length >= 2.
    #[must_use]
    pub fn new(steps: Vec<CycleStep>) -> Self {
        assert!(steps.len() >= 2, "a cycle has at least two steps");
        for window in steps.windows(2) {
            assert_eq!(window[0].to, window[1].from, "cycle steps must chain");
        }
        assert_eq!(
            steps.last().map(|step| step.to),
            steps.first().map(|step| step.from),
            "cycle must wrap to its first vertex"
        );
        Self { steps }
    }

    #[must_use]
    pub fn steps(&self) -> &[CycleStep] {
        &self.steps
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The vertex sequence `v0, v1, ..` (without the closing repeat).
    #[must_use]
    pub fn vertices(&self) -> Vec<TxnId> {
        self.steps.iter().map(|step| step.from).collect()
    }
}

impl core::fmt::Display for Cycle {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        for step in &self.steps {
            write!(f, "{} -{}-> ", step.from, step.label)?;
        }
        write!(f, "{}", self.steps[0].from)
    }
}

/// Wall-clock budget for a search, checked cooperatively.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    #[must_use]
    pub const fn never() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn after(budget: Duration) -> Self {
        Self(Some(Instant::now() + budget))
    }

    #[must_use]
    pub fn expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }
}

/// The edge labels a search has traversed so far, in path order.
#[derive(Debug, Default, Clone)]
pub struct PathState {
    labels: Vec<RelSet>,
}

impl PathState {
    #[must_use]
    pub fn labels(&self) -> &[RelSet] {
        &self.labels
    }

    fn push(&mut self, label: RelSet) {
        self.labels.push(label);
    }

    fn pop(&mut self) {
        self.labels.pop();
    }
}

/// Per-step edge filter, applied as the path grows.
///
/// Each variant is a small state machine over a single boolean; the
/// interpreter keeps dispatch deterministic and the spec table pure data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Accept every edge.
    Trivial,
    /// The first edge must lie in the rel set; no later edge may.
    FirstOnly(RelSet),
    /// Edges in the rel set must never be adjacent. The initial state
    /// behaves as if the previous edge were in the set, which also rules
    /// out the last-to-first wrap pairing two such edges.
    Nonadjacent(RelSet),
}

impl Transition {
    #[must_use]
    pub const fn initial_state(&self) -> bool {
        match self {
            Self::Trivial => false,
            Self::FirstOnly(_) | Self::Nonadjacent(_) => true,
        }
    }

    /// Apply one edge. Returns the successor state, or `None` to reject.
    #[must_use]
    pub fn step(&self, state: bool, label: RelSet) -> Option<bool> {
        match self {
            Self::Trivial => Some(false),
            Self::FirstOnly(rels) => match (state, label.is_subset(*rels)) {
                (true, true) => Some(false),
                (true, false) | (false, true) => None,
                (false, false) => Some(false),
            },
            Self::Nonadjacent(rels) => {
                let in_rels = label.is_subset(*rels);
                if state && in_rels {
                    None
                } else {
                    Some(in_rels)
                }
            }
        }
    }
}

/// Whole-path acceptance test, run once a candidate cycle closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathPredicate {
    /// At least two edges lie in the rel set.
    Multiple(RelSet),
    /// At least one edge lies in the rel set.
    Required(RelSet),
}

impl PathPredicate {
    #[must_use]
    pub fn holds(&self, path: &PathState) -> bool {
        match self {
            Self::Multiple(rels) => {
                path.labels()
                    .iter()
                    .filter(|label| label.is_subset(*rels))
                    .count()
                    >= 2
            }
            Self::Required(rels) => path
                .labels()
                .iter()
                .any(|label| label.is_subset(*rels)),
        }
    }
}

/// Short-circuit conjunction of path predicates.
#[must_use]
pub fn all_hold(predicates: &[PathPredicate], path: &PathState) -> bool {
    predicates.iter().all(|predicate| predicate.holds(path))
}

/// Outcome of a bounded search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Found(Cycle),
    NotFound,
    Expired,
}

impl SearchOutcome {
    #[must_use]
    pub fn found(self) -> Option<Cycle> {
        match self {
            Self::Found(cycle) => Some(cycle),
            Self::NotFound | Self::Expired => None,
        }
    }
}

/// Find any simple cycle in `graph`.
///
/// Single DFS over the whole graph; the first back edge to a vertex on
/// the current path closes the witness. Self-loops are not cycles here
/// (a cycle has at least two vertices).
#[must_use]
pub fn find_cycle(graph: &DependencyGraph, deadline: &Deadline) -> SearchOutcome {
    let mut visited: HashSet<TxnId> = HashSet::new();

    for root in graph.sorted_vertices() {
        if visited.contains(&root) {
            continue;
        }
        if deadline.expired() {
            return SearchOutcome::Expired;
        }

        // Frame: (vertex, successors, next position).
        let mut frames: Vec<(TxnId, Vec<(TxnId, RelSet)>, usize)> = Vec::new();
        let mut path: Vec<CycleStep> = Vec::new();
        let mut on_path: HashSet<TxnId> = HashSet::new();

        visited.insert(root);
        on_path.insert(root);
        frames.push((root, graph.sorted_successors(&root), 0));

        while let Some(frame) = frames.last_mut() {
            let (vertex, successors, position) = frame;
            let vertex = *vertex;

            if *position >= successors.len() {
                frames.pop();
                path.pop();
                on_path.remove(&vertex);
                continue;
            }

            let (target, label) = successors[*position];
            *position += 1;

            if target == vertex {
                continue;
            }
            if on_path.contains(&target) {
                let close = CycleStep::new(vertex, label, target);
                let start = path
                    .iter()
                    .position(|step| step.from == target)
                    .unwrap_or(0);
                let mut steps: Vec<CycleStep> = path[start..].to_vec();
                steps.push(close);
                if steps.len() >= 2 {
                    return SearchOutcome::Found(Cycle::new(steps));
                }
                continue;
            }
            if visited.contains(&target) {
                continue;
            }
            if deadline.expired() {
                return SearchOutcome::Expired;
            }

            visited.insert(target);
            on_path.insert(target);
            path.push(CycleStep::new(vertex, label, target));
            frames.push((target, graph.sorted_successors(&target), 0));
        }
    }

    SearchOutcome::NotFound
}

/// Find a simple cycle whose first edge is drawn from `first` and whose
/// remaining edges are drawn from `rest`.
#[must_use]
pub fn find_cycle_starting_with(
    first: &DependencyGraph,
    rest: &DependencyGraph,
    deadline: &Deadline,
) -> SearchOutcome {
    for start in first.sorted_vertices() {
        // Vertices known not to reach `start` through `rest`; shared
        // across this start's first-edge attempts.
        let mut dead: HashSet<TxnId> = HashSet::new();

        for (entry, first_label) in first.sorted_successors(&start) {
            if entry == start {
                continue;
            }
            if deadline.expired() {
                return SearchOutcome::Expired;
            }

            match reach(rest, entry, start, &mut dead, deadline) {
                ReachOutcome::Path(tail) => {
                    let mut steps = vec![CycleStep::new(start, first_label, entry)];
                    steps.extend(tail);
                    return SearchOutcome::Found(Cycle::new(steps));
                }
                ReachOutcome::NoPath => {}
                ReachOutcome::Expired => return SearchOutcome::Expired,
            }
        }
    }

    SearchOutcome::NotFound
}

enum ReachOutcome {
    /// Steps from the source vertex to the target, in order.
    Path(Vec<CycleStep>),
    NoPath,
    Expired,
}

/// DFS from `from` to `target`, skipping vertices already proven dead.
/// The DFS tree branch is the returned path, so it is simple.
fn reach(
    graph: &DependencyGraph,
    from: TxnId,
    target: TxnId,
    dead: &mut HashSet<TxnId>,
    deadline: &Deadline,
) -> ReachOutcome {
    if dead.contains(&from) {
        return ReachOutcome::NoPath;
    }

    let mut frames: Vec<(TxnId, Vec<(TxnId, RelSet)>, usize)> = Vec::new();
    let mut path: Vec<CycleStep> = Vec::new();
    let mut on_path: HashSet<TxnId> = HashSet::new();

    on_path.insert(from);
    frames.push((from, graph.sorted_successors(&from), 0));

    while let Some(frame) = frames.last_mut() {
        let (vertex, successors, position) = frame;
        let vertex = *vertex;

        if *position >= successors.len() {
            frames.pop();
            path.pop();
            on_path.remove(&vertex);
            dead.insert(vertex);
            continue;
        }

        let (next, label) = successors[*position];
        *position += 1;

        if next == target {
            let mut steps = path.clone();
            steps.push(CycleStep::new(vertex, label, target));
            return ReachOutcome::Path(steps);
        }
        if on_path.contains(&next) || dead.contains(&next) {
            continue;
        }
        if deadline.expired() {
            return ReachOutcome::Expired;
        }

        on_path.insert(next);
        path.push(CycleStep::new(vertex, label, next));
        frames.push((next, graph.sorted_successors(&next), 0));
    }

    ReachOutcome::NoPath
}

/// General path-constrained cycle search.
///
/// Grows a simple path from each start vertex, filtering every edge
/// (including the closing one) through `transition`; when the path wraps
/// back to its start with at least two steps, the conjunction of
/// `predicates` over the traversed labels decides acceptance.
///
/// Expanded (vertex, transition-state) pairs are memoized per start, so
/// the state space is at most 2·|V| expansions per start.
#[must_use]
pub fn find_cycle_with(
    transition: &Transition,
    predicates: &[PathPredicate],
    graph: &DependencyGraph,
    deadline: &Deadline,
) -> SearchOutcome {
    for start in graph.sorted_vertices() {
        let mut expanded: HashSet<(TxnId, bool)> = HashSet::new();

        // Frame: (vertex, state on arrival, successors, next position).
        let mut frames: Vec<(TxnId, bool, Vec<(TxnId, RelSet)>, usize)> = Vec::new();
        let mut path: Vec<CycleStep> = Vec::new();
        let mut labels = PathState::default();
        let mut on_path: HashSet<TxnId> = HashSet::new();

        expanded.insert((start, transition.initial_state()));
        on_path.insert(start);
        frames.push((
            start,
            transition.initial_state(),
            graph.sorted_successors(&start),
            0,
        ));

        while let Some(frame) = frames.last_mut() {
            let (vertex, state, successors, position) = frame;
            let vertex = *vertex;
            let state = *state;

            if *position >= successors.len() {
                frames.pop();
                path.pop();
                labels.pop();
                on_path.remove(&vertex);
                continue;
            }

            let (target, label) = successors[*position];
            *position += 1;

            if deadline.expired() {
                return SearchOutcome::Expired;
            }

            let Some(next_state) = transition.step(state, label) else {
                continue;
            };

            if target == start {
                if path.is_empty() {
                    // A self-closing first edge is a self-loop, not a cycle.
                    continue;
                }
                labels.push(label);
                let accepted = all_hold(predicates, &labels);
                labels.pop();
                if accepted {
                    let mut steps = path.clone();
                    steps.push(CycleStep::new(vertex, label, start));
                    return SearchOutcome::Found(Cycle::new(steps));
                }
                continue;
            }
            if on_path.contains(&target) {
                continue;
            }
            if !expanded.insert((target, next_state)) {
                continue;
            }

            on_path.insert(target);
            path.push(CycleStep::new(vertex, label, target));
            labels.push(label);
            frames.push((target, next_state, graph.sorted_successors(&target), 0));
        }
    }

    SearchOutcome::NotFound
}
