//! Memoized relation-subset projections of a dependency graph.
//!
//! Every anomaly spec searches a projection of the SCC's subgraph onto
//! some rel set. Projections are memoized per rel set, and [`warm`]
//! materializes every projection the spec table will request *before*
//! the search clock starts: lazy materialization under a tight timeout
//! burns the budget on graph construction instead of searching.
//!
//! A cache belongs to exactly one SCC task and is never shared.
//!
//! [`warm`]: ProjectionCache::warm

use std::sync::Arc;

use hashbrown::HashMap;

use crate::graph::dependency::DependencyGraph;
use crate::relation::RelSet;

#[derive(Debug)]
pub struct ProjectionCache {
    base: Arc<DependencyGraph>,
    projections: HashMap<RelSet, Arc<DependencyGraph>>,
}

impl ProjectionCache {
    #[must_use]
    pub fn new(base: Arc<DependencyGraph>) -> Self {
        Self {
            base,
            projections: HashMap::new(),
        }
    }

    /// The unprojected graph this cache was built over.
    #[must_use]
    pub fn base(&self) -> &Arc<DependencyGraph> {
        &self.base
    }

    /// The projection of the base graph onto `rels`, memoized.
    pub fn get(&mut self, rels: RelSet) -> Arc<DependencyGraph> {
        if rels == RelSet::ALL {
            return Arc::clone(&self.base);
        }
        Arc::clone(
            self.projections
                .entry(rels)
                .or_insert_with(|| Arc::new(self.base.project(rels))),
        )
    }

    /// Eagerly materialize the projections for every rel set in `sets`.
    pub fn warm<I>(&mut self, sets: I)
    where
        I: IntoIterator<Item = RelSet>,
    {
        for rels in sets {
            let _ = self.get(rels);
        }
    }

    /// Number of distinct projections materialized so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.projections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.projections.is_empty()
    }
}
