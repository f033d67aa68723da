//! Detected anomalies and their taxonomy.
//!
//! Anomalies are data, never errors: a detection run produces an
//! [`AnomalyMap`] keyed by [`AnomalyType`], and the verdict layer decides
//! what the map means under the declared consistency models.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use crate::history::TxnId;
use crate::relation::RelSet;
use crate::search::Cycle;

pub mod classify;
pub mod lost_update;
pub mod spec;

/// The -process / -realtime refinement of a cycle anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Suffix {
    None,
    Process,
    Realtime,
}

/// Every anomaly kind this crate can report.
///
/// The first eighteen are Adya's cycle taxonomy: six data-dependency base
/// types, each refined by process- or realtime-order participation.
/// `LostUpdate` comes from the direct scanner, and the last two are
/// synthetic, inconclusive kinds.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnomalyType {
    /// Dirty write: a cycle of ww edges alone.
    G0,
    G0Process,
    G0Realtime,
    /// Cyclic information flow: ww and wr edges.
    G1c,
    G1cProcess,
    G1cRealtime,
    /// An otherwise-consistent cycle with exactly one anti-dependency.
    GSingle,
    GSingleProcess,
    GSingleRealtime,
    /// Two or more anti-dependencies, never adjacent.
    GNonadjacent,
    GNonadjacentProcess,
    GNonadjacentRealtime,
    /// Item anti-dependency cycle (adjacent anti-dependencies).
    G2Item,
    G2ItemProcess,
    G2ItemRealtime,
    /// Predicate anti-dependency cycle.
    G2,
    G2Process,
    G2Realtime,
    /// Two committed transactions read the same version of a key and both
    /// wrote that key.
    LostUpdate,
    /// A cycle search exhausted its wall-clock budget; inconclusive.
    CycleSearchTimeout,
    /// The dependency graph had no transactions; inconclusive.
    EmptyTransactionGraph,
}

impl AnomalyType {
    /// The six data-dependency base types, worst first. This is also the
    /// priority order of the anomaly spec table.
    pub const BASES: [Self; 6] = [
        Self::G0,
        Self::G1c,
        Self::GSingle,
        Self::GNonadjacent,
        Self::G2Item,
        Self::G2,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::G0 => "G0",
            Self::G0Process => "G0-process",
            Self::G0Realtime => "G0-realtime",
            Self::G1c => "G1c",
            Self::G1cProcess => "G1c-process",
            Self::G1cRealtime => "G1c-realtime",
            Self::GSingle => "G-single",
            Self::GSingleProcess => "G-single-process",
            Self::GSingleRealtime => "G-single-realtime",
            Self::GNonadjacent => "G-nonadjacent",
            Self::GNonadjacentProcess => "G-nonadjacent-process",
            Self::GNonadjacentRealtime => "G-nonadjacent-realtime",
            Self::G2Item => "G2-item",
            Self::G2ItemProcess => "G2-item-process",
            Self::G2ItemRealtime => "G2-item-realtime",
            Self::G2 => "G2",
            Self::G2Process => "G2-process",
            Self::G2Realtime => "G2-realtime",
            Self::LostUpdate => "lost-update",
            Self::CycleSearchTimeout => "cycle-search-timeout",
            Self::EmptyTransactionGraph => "empty-transaction-graph",
        }
    }

    /// The base type of a cycle kind; non-cycle kinds return themselves.
    #[must_use]
    pub const fn base(self) -> Self {
        match self {
            Self::G0 | Self::G0Process | Self::G0Realtime => Self::G0,
            Self::G1c | Self::G1cProcess | Self::G1cRealtime => Self::G1c,
            Self::GSingle | Self::GSingleProcess | Self::GSingleRealtime => Self::GSingle,
            Self::GNonadjacent | Self::GNonadjacentProcess | Self::GNonadjacentRealtime => {
                Self::GNonadjacent
            }
            Self::G2Item | Self::G2ItemProcess | Self::G2ItemRealtime => Self::G2Item,
            Self::G2 | Self::G2Process | Self::G2Realtime => Self::G2,
            other => other,
        }
    }

    #[must_use]
    pub const fn suffix(self) -> Suffix {
        match self {
            Self::G0Process
            | Self::G1cProcess
            | Self::GSingleProcess
            | Self::GNonadjacentProcess
            | Self::G2ItemProcess
            | Self::G2Process => Suffix::Process,
            Self::G0Realtime
            | Self::G1cRealtime
            | Self::GSingleRealtime
            | Self::GNonadjacentRealtime
            | Self::G2ItemRealtime
            | Self::G2Realtime => Suffix::Realtime,
            _ => Suffix::None,
        }
    }

    /// Refine a base cycle kind with a suffix.
    ///
    /// # Panics
    ///
    /// Panics if `self` is not one of [`Self::BASES`].
    #[must_use]
    pub const fn with_suffix(self, suffix: Suffix) -> Self {
        match (self, suffix) {
            (base, Suffix::None) => base,
            (Self::G0, Suffix::Process) => Self::G0Process,
            (Self::G0, Suffix::Realtime) => Self::G0Realtime,
            (Self::G1c, Suffix::Process) => Self::G1cProcess,
            (Self::G1c, Suffix::Realtime) => Self::G1cRealtime,
            (Self::GSingle, Suffix::Process) => Self::GSingleProcess,
            (Self::GSingle, Suffix::Realtime) => Self::GSingleRealtime,
            (Self::GNonadjacent, Suffix::Process) => Self::GNonadjacentProcess,
            (Self::GNonadjacent, Suffix::Realtime) => Self::GNonadjacentRealtime,
            (Self::G2Item, Suffix::Process) => Self::G2ItemProcess,
            (Self::G2Item, Suffix::Realtime) => Self::G2ItemRealtime,
            (Self::G2, Suffix::Process) => Self::G2Process,
            (Self::G2, Suffix::Realtime) => Self::G2Realtime,
            _ => panic!("suffix applied to a non-base anomaly type"),
        }
    }

    /// Inconclusive kinds make a verdict `unknown`, never `invalid`.
    #[must_use]
    pub const fn is_inconclusive(self) -> bool {
        matches!(self, Self::CycleSearchTimeout | Self::EmptyTransactionGraph)
    }
}

impl Display for AnomalyType {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Renders the evidence for one dependency edge.
///
/// Supplied by the analyzer that built the graph; must be pure with
/// respect to its inputs and must not mutate the graph. SCC tasks share
/// one explainer across threads.
pub trait PairExplainer: Send + Sync {
    fn explain(&self, from: TxnId, to: TxnId, rels: RelSet) -> String;
}

/// Fallback explainer naming only the relations.
#[derive(Debug, Default, Clone, Copy)]
pub struct RelNameExplainer;

impl PairExplainer for RelNameExplainer {
    fn explain(&self, from: TxnId, to: TxnId, rels: RelSet) -> String {
        format!("{from} -{rels}-> {to}")
    }
}

/// A classified cycle with one rendered explanation per step.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleExplanation {
    pub anomaly_type: AnomalyType,
    pub cycle: Cycle,
    pub steps: Vec<String>,
}

/// One lost-update case: every transaction in `txns` read
/// `variable = version` (`None` for the uninitialized version) and then
/// wrote `variable`.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LostUpdateCase<Variable, Version> {
    pub variable: Variable,
    pub version: Option<Version>,
    pub txns: Vec<TxnId>,
}

/// A single detected anomaly.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, ::derive_more::From)]
pub enum Anomaly<Variable, Version> {
    #[from]
    Cycle(CycleExplanation),
    #[from]
    LostUpdate(LostUpdateCase<Variable, Version>),
    CycleSearchTimeout {
        /// The spec that was running when the budget expired.
        anomaly_spec_type: AnomalyType,
        /// Specs fully evaluated before the expiry, in priority order.
        specs_checked: Vec<AnomalyType>,
        scc_size: usize,
    },
    EmptyTransactionGraph,
}

impl<Variable, Version> Anomaly<Variable, Version> {
    #[must_use]
    pub const fn anomaly_type(&self) -> AnomalyType {
        match self {
            Self::Cycle(explanation) => explanation.anomaly_type,
            Self::LostUpdate(_) => AnomalyType::LostUpdate,
            Self::CycleSearchTimeout { .. } => AnomalyType::CycleSearchTimeout,
            Self::EmptyTransactionGraph => AnomalyType::EmptyTransactionGraph,
        }
    }
}

/// All detected anomalies, keyed by type. Per-type order is discovery
/// order.
pub type AnomalyMap<Variable, Version> = BTreeMap<AnomalyType, Vec<Anomaly<Variable, Version>>>;

/// Append an anomaly under its own type.
pub fn insert<Variable, Version>(
    map: &mut AnomalyMap<Variable, Version>,
    anomaly: Anomaly<Variable, Version>,
) {
    map.entry(anomaly.anomaly_type()).or_default().push(anomaly);
}
