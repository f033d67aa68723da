//! The multi-relational dependency graph over transactions.
//!
//! Vertices are [`TxnId`]s; every edge carries a non-empty [`RelSet`]
//! label. A single edge may bear several relations at once (e.g. `ww`
//! and `realtime` between the same pair). Adjacency tables are keyed by
//! transaction index, so vertices never own each other and edges own
//! only their labels.

use hashbrown::{HashMap, HashSet};

use crate::history::TxnId;
use crate::relation::RelSet;

#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    adj_map: HashMap<TxnId, HashMap<TxnId, RelSet>>,
}

impl DependencyGraph {
    pub fn add_vertex(&mut self, vertex: TxnId) {
        self.adj_map.entry(vertex).or_default();
    }

    /// Add an edge, unioning `rels` into any existing label.
    ///
    /// # Panics
    ///
    /// An empty label is a configuration error.
    pub fn add_edge(&mut self, source: TxnId, target: TxnId, rels: RelSet) {
        assert!(!rels.is_empty(), "edge {source}->{target} with empty label");
        let label = self
            .adj_map
            .entry(source)
            .or_default()
            .entry(target)
            .or_default();
        *label = label.union(rels);
        self.adj_map.entry(target).or_default();
    }

    #[must_use]
    pub fn edge_label(&self, source: &TxnId, target: &TxnId) -> Option<RelSet> {
        self.adj_map.get(source).and_then(|out| out.get(target)).copied()
    }

    #[must_use]
    pub fn has_edge(&self, source: &TxnId, target: &TxnId) -> bool {
        self.edge_label(source, target).is_some()
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.adj_map.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.adj_map.values().map(HashMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adj_map.is_empty()
    }

    pub fn vertices(&self) -> impl Iterator<Item = TxnId> + '_ {
        self.adj_map.keys().copied()
    }

    /// Vertices in ascending index order. Searches iterate this so
    /// witnesses are deterministic.
    #[must_use]
    pub fn sorted_vertices(&self) -> Vec<TxnId> {
        let mut vertices: Vec<TxnId> = self.adj_map.keys().copied().collect();
        vertices.sort_unstable();
        vertices
    }

    /// Successors of `source` with their labels, in ascending index order.
    #[must_use]
    pub fn sorted_successors(&self, source: &TxnId) -> Vec<(TxnId, RelSet)> {
        let mut successors: Vec<(TxnId, RelSet)> = self
            .adj_map
            .get(source)
            .map(|out| out.iter().map(|(t, l)| (*t, *l)).collect())
            .unwrap_or_default();
        successors.sort_unstable_by_key(|(t, _)| *t);
        successors
    }

    /// The projection `G|R`: every vertex of `G`, and exactly those edges
    /// whose label is a subset of `rels`.
    #[must_use]
    pub fn project(&self, rels: RelSet) -> Self {
        let adj_map = self
            .adj_map
            .iter()
            .map(|(source, out)| {
                let kept = out
                    .iter()
                    .filter(|(_, label)| label.is_subset(rels))
                    .map(|(t, l)| (*t, *l))
                    .collect();
                (*source, kept)
            })
            .collect();
        Self { adj_map }
    }

    /// The subgraph induced by `keep`: those vertices, and every edge
    /// between two of them.
    #[must_use]
    pub fn induced(&self, keep: &HashSet<TxnId>) -> Self {
        let adj_map = keep
            .iter()
            .map(|source| {
                let out = self
                    .adj_map
                    .get(source)
                    .map(|out| {
                        out.iter()
                            .filter(|(target, _)| keep.contains(*target))
                            .map(|(t, l)| (*t, *l))
                            .collect()
                    })
                    .unwrap_or_default();
                (*source, out)
            })
            .collect();
        Self { adj_map }
    }

    /// Merge every vertex and edge of `other` into this graph, unioning
    /// labels on shared edges. Returns whether anything changed.
    pub fn union(&mut self, other: &Self) -> bool {
        let mut change = false;
        for (source, out) in &other.adj_map {
            if !self.adj_map.contains_key(source) {
                self.add_vertex(*source);
                change = true;
            }
            for (target, label) in out {
                let before = self.edge_label(source, target);
                self.add_edge(*source, *target, *label);
                change |= self.edge_label(source, target) != before;
            }
        }
        change
    }

    /// Strongly connected components, via iterative Tarjan.
    ///
    /// Components are returned with sorted members, ordered by their
    /// smallest member, so the decomposition is deterministic.
    #[must_use]
    pub fn sccs(&self) -> Vec<Vec<TxnId>> {
        let mut state = TarjanState {
            graph: self,
            index: HashMap::new(),
            lowlink: HashMap::new(),
            on_stack: HashSet::new(),
            stack: Vec::new(),
            next_index: 0,
            components: Vec::new(),
        };

        for root in self.sorted_vertices() {
            if !state.index.contains_key(&root) {
                state.visit(root);
            }
        }

        let mut components = state.components;
        for component in &mut components {
            component.sort_unstable();
        }
        components.sort_unstable_by_key(|component| component[0]);
        components
    }
}

struct TarjanState<'a> {
    graph: &'a DependencyGraph,
    index: HashMap<TxnId, usize>,
    lowlink: HashMap<TxnId, usize>,
    on_stack: HashSet<TxnId>,
    stack: Vec<TxnId>,
    next_index: usize,
    components: Vec<Vec<TxnId>>,
}

impl TarjanState<'_> {
    /// Iterative Tarjan visit rooted at `root`, with an explicit frame
    /// stack so deep SCCs cannot overflow the call stack.
    fn visit(&mut self, root: TxnId) {
        // Frame: (vertex, successors, next successor position).
        let mut frames: Vec<(TxnId, Vec<TxnId>, usize)> = Vec::new();

        self.open(root);
        let successors = self.successor_ids(&root);
        frames.push((root, successors, 0));

        while let Some(frame) = frames.last_mut() {
            let (vertex, successors, position) = frame;
            let vertex = *vertex;

            if *position < successors.len() {
                let target = successors[*position];
                *position += 1;

                if !self.index.contains_key(&target) {
                    self.open(target);
                    let target_successors = self.successor_ids(&target);
                    frames.push((target, target_successors, 0));
                } else if self.on_stack.contains(&target) {
                    let target_index = self.index[&target];
                    let lowlink = self
                        .lowlink
                        .get_mut(&vertex)
                        .expect("opened vertices have lowlinks");
                    *lowlink = (*lowlink).min(target_index);
                }
            } else {
                frames.pop();

                if let Some((parent, _, _)) = frames.last() {
                    let child_lowlink = self.lowlink[&vertex];
                    let parent_lowlink = self
                        .lowlink
                        .get_mut(parent)
                        .expect("opened vertices have lowlinks");
                    *parent_lowlink = (*parent_lowlink).min(child_lowlink);
                }

                if self.lowlink[&vertex] == self.index[&vertex] {
                    let mut component = Vec::new();
                    loop {
                        let member = self.stack.pop().expect("SCC root is on the stack");
                        self.on_stack.remove(&member);
                        component.push(member);
                        if member == vertex {
                            break;
                        }
                    }
                    self.components.push(component);
                }
            }
        }
    }

    fn open(&mut self, vertex: TxnId) {
        self.index.insert(vertex, self.next_index);
        self.lowlink.insert(vertex, self.next_index);
        self.next_index += 1;
        self.stack.push(vertex);
        self.on_stack.insert(vertex);
    }

    fn successor_ids(&self, vertex: &TxnId) -> Vec<TxnId> {
        self.graph
            .sorted_successors(vertex)
            .into_iter()
            .map(|(target, _)| target)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::{Rel, RelSet};

    fn t(i: u64) -> TxnId {
        TxnId(i)
    }

    const WW: RelSet = RelSet::single(Rel::Ww);
    const WR: RelSet = RelSet::single(Rel::Wr);

    #[test]
    fn test_add_edge_unions_labels() {
        let mut graph = DependencyGraph::default();
        graph.add_edge(t(1), t(2), WW);
        graph.add_edge(t(1), t(2), WR);

        assert_eq!(graph.edge_label(&t(1), &t(2)), Some(WW.union(WR)));
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.vertex_count(), 2);
    }

    #[test]
    #[should_panic(expected = "empty label")]
    fn test_empty_label_rejected() {
        let mut graph = DependencyGraph::default();
        graph.add_edge(t(1), t(2), RelSet::EMPTY);
    }

    #[test]
    fn test_projection_subset_semantics() {
        let mut graph = DependencyGraph::default();
        graph.add_edge(t(1), t(2), WW);
        graph.add_edge(t(2), t(3), WW.union(WR));
        graph.add_edge(t(3), t(1), WR);

        let ww_only = graph.project(WW);
        assert!(ww_only.has_edge(&t(1), &t(2)));
        // {ww,wr} is not a subset of {ww}: dropped.
        assert!(!ww_only.has_edge(&t(2), &t(3)));
        assert!(!ww_only.has_edge(&t(3), &t(1)));
        // Projection preserves the vertex set.
        assert_eq!(ww_only.vertex_count(), 3);

        let both = graph.project(WW.union(WR));
        assert_eq!(both.edge_count(), 3);
    }

    #[test]
    fn test_induced_subgraph() {
        let mut graph = DependencyGraph::default();
        graph.add_edge(t(1), t(2), WW);
        graph.add_edge(t(2), t(3), WW);
        graph.add_edge(t(3), t(1), WW);

        let keep: HashSet<TxnId> = [t(1), t(2)].into_iter().collect();
        let sub = graph.induced(&keep);

        assert_eq!(sub.vertex_count(), 2);
        assert!(sub.has_edge(&t(1), &t(2)));
        assert!(!sub.has_edge(&t(2), &t(3)));
    }

    #[test]
    fn test_sccs_two_components() {
        let mut graph = DependencyGraph::default();
        // Component {1, 2} and component {3, 4, 5}, bridged acyclically.
        graph.add_edge(t(1), t(2), WW);
        graph.add_edge(t(2), t(1), WW);
        graph.add_edge(t(2), t(3), WW);
        graph.add_edge(t(3), t(4), WW);
        graph.add_edge(t(4), t(5), WW);
        graph.add_edge(t(5), t(3), WW);

        let sccs = graph.sccs();
        let nontrivial: Vec<Vec<TxnId>> =
            sccs.into_iter().filter(|scc| scc.len() >= 2).collect();

        assert_eq!(nontrivial, vec![vec![t(1), t(2)], vec![t(3), t(4), t(5)]]);
    }

    #[test]
    fn test_sccs_acyclic() {
        let mut graph = DependencyGraph::default();
        graph.add_edge(t(1), t(2), WW);
        graph.add_edge(t(2), t(3), WW);

        assert!(graph.sccs().iter().all(|scc| scc.len() == 1));
    }
}
