//! The static mapping between consistency models and the anomalies they
//! rule out.
//!
//! Models are ordered from weakest to strongest. Each model prohibits a
//! complete set of anomaly kinds; strict serializability additionally
//! rules out the process- and realtime-refined cycle kinds, since those
//! witnesses need session or wall-clock edges to close and say nothing
//! about plain serializability.

use std::collections::BTreeSet;

use crate::anomaly::{AnomalyType, Suffix};

/// Consistency models a history can be checked against, weakest first.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConsistencyModel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    SnapshotIsolation,
    Serializable,
    StrictSerializable,
}

impl ConsistencyModel {
    pub const ALL: [Self; 6] = [
        Self::ReadUncommitted,
        Self::ReadCommitted,
        Self::RepeatableRead,
        Self::SnapshotIsolation,
        Self::Serializable,
        Self::StrictSerializable,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "read-uncommitted",
            Self::ReadCommitted => "read-committed",
            Self::RepeatableRead => "repeatable-read",
            Self::SnapshotIsolation => "snapshot-isolation",
            Self::Serializable => "serializable",
            Self::StrictSerializable => "strict-serializable",
        }
    }

    /// The anomaly kinds this model rules out.
    #[must_use]
    pub fn prohibited(self) -> BTreeSet<AnomalyType> {
        use crate::anomaly::AnomalyType as A;
        match self {
            Self::ReadUncommitted => [A::G0].into(),
            Self::ReadCommitted => [A::G0, A::G1c].into(),
            Self::RepeatableRead => [A::G0, A::G1c, A::G2Item, A::LostUpdate].into(),
            Self::SnapshotIsolation => [A::G0, A::G1c, A::GSingle, A::LostUpdate].into(),
            Self::Serializable => [
                A::G0,
                A::G1c,
                A::GSingle,
                A::GNonadjacent,
                A::G2Item,
                A::G2,
                A::LostUpdate,
            ]
            .into(),
            Self::StrictSerializable => {
                let mut kinds = Self::Serializable.prohibited();
                for base in AnomalyType::BASES {
                    kinds.insert(base.with_suffix(Suffix::Process));
                    kinds.insert(base.with_suffix(Suffix::Realtime));
                }
                kinds
            }
        }
    }
}

impl core::fmt::Display for ConsistencyModel {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Union of the anomaly kinds prohibited by the given models.
#[must_use]
pub fn anomalies_prohibited_by(models: &[ConsistencyModel]) -> BTreeSet<AnomalyType> {
    models
        .iter()
        .flat_map(|model| model.prohibited())
        .collect()
}

/// The kinds whose detection implies `kind` is present.
///
/// A ww-only cycle is also a cyclic-information-flow witness, and any
/// single- or multi-anti-dependency cycle witnesses the G2 class. A
/// refined kind is implied by refined kinds of implied bases at the same
/// suffix, and by the plain kinds (a data-only cycle is a cycle of the
/// wider alphabet too); -process never implies -realtime or vice versa.
#[must_use]
pub fn anomalies_implying(kind: AnomalyType) -> BTreeSet<AnomalyType> {
    use crate::anomaly::AnomalyType as A;

    let implying_base = |base: AnomalyType| -> Vec<AnomalyType> {
        match base {
            A::G1c => vec![A::G1c, A::G0],
            A::G2 => vec![A::G2, A::G2Item, A::GSingle, A::GNonadjacent],
            other => vec![other],
        }
    };

    let suffix = kind.suffix();
    match kind {
        A::LostUpdate | A::CycleSearchTimeout | A::EmptyTransactionGraph => [kind].into(),
        cycle_kind => implying_base(cycle_kind.base())
            .into_iter()
            .flat_map(|base| match suffix {
                Suffix::None => vec![base],
                refined => vec![base, base.with_suffix(refined)],
            })
            .collect(),
    }
}

/// The kinds whose detection implies at least one of `extras`.
#[must_use]
pub fn all_anomalies_implying(extras: &[AnomalyType]) -> BTreeSet<AnomalyType> {
    extras.iter().flat_map(|kind| anomalies_implying(*kind)).collect()
}

/// Models ruled out by the detected anomaly kinds: the friendly boundary
/// reported alongside a failing verdict.
#[must_use]
pub fn models_violated_by<'a, I>(kinds: I) -> BTreeSet<ConsistencyModel>
where
    I: IntoIterator<Item = &'a AnomalyType>,
{
    let detected: BTreeSet<AnomalyType> = kinds.into_iter().copied().collect();
    ConsistencyModel::ALL
        .into_iter()
        .filter(|model| !model.prohibited().is_disjoint(&detected))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::AnomalyType as A;

    #[test]
    fn test_models_strengthen_monotonically() {
        // Every model's prohibitions are contained in serializable's,
        // which are contained in strict serializable's.
        let serializable = ConsistencyModel::Serializable.prohibited();
        let strict = ConsistencyModel::StrictSerializable.prohibited();
        for model in [
            ConsistencyModel::ReadUncommitted,
            ConsistencyModel::ReadCommitted,
        ] {
            assert!(model.prohibited().is_subset(&serializable));
        }
        assert!(serializable.is_subset(&strict));
    }

    #[test]
    fn test_strict_serializable_prohibits_refined_kinds() {
        let strict = ConsistencyModel::StrictSerializable.prohibited();
        assert!(strict.contains(&A::GSingleRealtime));
        assert!(strict.contains(&A::G0Process));
        assert!(!ConsistencyModel::Serializable
            .prohibited()
            .contains(&A::GSingleRealtime));
    }

    #[test]
    fn test_implication_g1c() {
        let implying = anomalies_implying(A::G1c);
        assert!(implying.contains(&A::G0));
        assert!(implying.contains(&A::G1c));
        assert!(!implying.contains(&A::GSingle));
    }

    #[test]
    fn test_implication_g2_realtime() {
        let implying = anomalies_implying(A::G2Realtime);
        assert!(implying.contains(&A::G2ItemRealtime));
        assert!(implying.contains(&A::GSingle));
        assert!(implying.contains(&A::G2));
        // A process-refined witness needs process edges; it does not
        // demonstrate a realtime-class violation.
        assert!(!implying.contains(&A::G2ItemProcess));
    }

    #[test]
    fn test_violated_models() {
        let violated = models_violated_by(&[A::G1c]);
        assert!(violated.contains(&ConsistencyModel::ReadCommitted));
        assert!(violated.contains(&ConsistencyModel::StrictSerializable));
        assert!(!violated.contains(&ConsistencyModel::ReadUncommitted));

        let violated = models_violated_by(&[A::GSingleRealtime]);
        assert_eq!(
            violated.into_iter().collect::<Vec<_>>(),
            vec![ConsistencyModel::StrictSerializable]
        );
    }
}
