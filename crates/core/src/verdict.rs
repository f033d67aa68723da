//! Maps detected anomalies and declared consistency models to a final
//! verdict.
//!
//! A history is `valid` when nothing reportable was detected, `invalid`
//! when a prohibited anomaly was, and `unknown` when only inconclusive
//! kinds (timeouts, an empty graph) turned up.

use std::collections::BTreeSet;

use crate::anomaly::{AnomalyMap, AnomalyType};
use crate::models::{
    all_anomalies_implying, anomalies_prohibited_by, models_violated_by, ConsistencyModel,
};

#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    /// Only inconclusive kinds detected; the history may or may not be
    /// consistent.
    Unknown,
    Invalid,
}

/// The final result of a check.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict<Variable, Version> {
    pub valid: Validity,
    /// Sorted kinds of the reported anomalies.
    pub anomaly_types: Vec<AnomalyType>,
    /// The reportable subset of the detected anomalies.
    pub anomalies: AnomalyMap<Variable, Version>,
    /// Models ruled out by *all* detected anomalies, reportable or not.
    pub violated_models: BTreeSet<ConsistencyModel>,
}

impl<Variable, Version> Verdict<Variable, Version> {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.valid == Validity::Valid
    }
}

/// Project the detected anomalies onto what the declared models (plus
/// explicitly requested extra kinds) make reportable.
#[must_use]
pub fn verdict<Variable, Version>(
    models: &[ConsistencyModel],
    extras: &[AnomalyType],
    detected: AnomalyMap<Variable, Version>,
) -> Verdict<Variable, Version> {
    let mut reportable = anomalies_prohibited_by(models);
    reportable.extend(all_anomalies_implying(extras));
    let prohibited = reportable.clone();
    reportable.insert(AnomalyType::CycleSearchTimeout);
    reportable.insert(AnomalyType::EmptyTransactionGraph);

    let detected_kinds: BTreeSet<AnomalyType> = detected.keys().copied().collect();
    let bad: BTreeSet<AnomalyType> = detected_kinds
        .intersection(&prohibited)
        .copied()
        .collect();

    let report: AnomalyMap<Variable, Version> = detected
        .into_iter()
        .filter(|(kind, _)| reportable.contains(kind))
        .collect();

    if report.is_empty() {
        return Verdict {
            valid: Validity::Valid,
            anomaly_types: Vec::new(),
            anomalies: AnomalyMap::new(),
            violated_models: BTreeSet::new(),
        };
    }

    let valid = if bad.is_empty() {
        Validity::Unknown
    } else {
        Validity::Invalid
    };

    Verdict {
        valid,
        anomaly_types: report.keys().copied().collect(),
        anomalies: report,
        violated_models: models_violated_by(detected_kinds.iter()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{insert, Anomaly, CycleExplanation};
    use crate::history::TxnId;
    use crate::relation::{Rel, RelSet};
    use crate::search::{Cycle, CycleStep};

    type Map = AnomalyMap<&'static str, u64>;

    fn g0_map() -> Map {
        let ww = RelSet::single(Rel::Ww);
        let cycle = Cycle::new(vec![
            CycleStep::new(TxnId(1), ww, TxnId(2)),
            CycleStep::new(TxnId(2), ww, TxnId(1)),
        ]);
        let mut map = Map::new();
        insert(
            &mut map,
            Anomaly::Cycle(CycleExplanation {
                anomaly_type: AnomalyType::G0,
                cycle,
                steps: vec![],
            }),
        );
        map
    }

    #[test]
    fn test_empty_map_is_valid() {
        let verdict = verdict(&[ConsistencyModel::StrictSerializable], &[], Map::new());
        assert_eq!(verdict.valid, Validity::Valid);
        assert!(verdict.anomaly_types.is_empty());
    }

    #[test]
    fn test_prohibited_anomaly_is_invalid() {
        let verdict = verdict(&[ConsistencyModel::Serializable], &[], g0_map());
        assert_eq!(verdict.valid, Validity::Invalid);
        assert_eq!(verdict.anomaly_types, vec![AnomalyType::G0]);
        assert!(verdict
            .violated_models
            .contains(&ConsistencyModel::ReadUncommitted));
    }

    #[test]
    fn test_unreported_anomaly_is_valid() {
        // A G2-item witness does not violate read committed.
        let rw = RelSet::single(Rel::Rw);
        let cycle = Cycle::new(vec![
            CycleStep::new(TxnId(1), rw, TxnId(2)),
            CycleStep::new(TxnId(2), rw, TxnId(1)),
        ]);
        let mut map = Map::new();
        insert(
            &mut map,
            Anomaly::Cycle(CycleExplanation {
                anomaly_type: AnomalyType::G2Item,
                cycle,
                steps: vec![],
            }),
        );

        let verdict = verdict(&[ConsistencyModel::ReadCommitted], &[], map);
        assert_eq!(verdict.valid, Validity::Valid);
    }

    #[test]
    fn test_extras_make_anomalies_reportable() {
        let rw = RelSet::single(Rel::Rw);
        let cycle = Cycle::new(vec![
            CycleStep::new(TxnId(1), rw, TxnId(2)),
            CycleStep::new(TxnId(2), rw, TxnId(1)),
        ]);
        let mut map = Map::new();
        insert(
            &mut map,
            Anomaly::Cycle(CycleExplanation {
                anomaly_type: AnomalyType::G2Item,
                cycle,
                steps: vec![],
            }),
        );

        // Asking for G2 explicitly pulls in G2-item (which implies it).
        let verdict = verdict(&[ConsistencyModel::ReadCommitted], &[AnomalyType::G2], map);
        assert_eq!(verdict.valid, Validity::Invalid);
        assert_eq!(verdict.anomaly_types, vec![AnomalyType::G2Item]);
    }

    #[test]
    fn test_timeout_alone_is_unknown() {
        let mut map = Map::new();
        insert(
            &mut map,
            Anomaly::CycleSearchTimeout {
                anomaly_spec_type: AnomalyType::G1c,
                specs_checked: vec![AnomalyType::G0],
                scc_size: 100,
            },
        );

        let verdict = verdict(&[ConsistencyModel::StrictSerializable], &[], map);
        assert_eq!(verdict.valid, Validity::Unknown);
        assert_eq!(
            verdict.anomaly_types,
            vec![AnomalyType::CycleSearchTimeout]
        );
    }

    #[test]
    fn test_monotonicity_under_stronger_models() {
        // G0 under read uncommitted: invalid. Under the stronger strict
        // serializable: still invalid, never back toward valid.
        let weak = verdict(&[ConsistencyModel::ReadUncommitted], &[], g0_map());
        let strong = verdict(&[ConsistencyModel::StrictSerializable], &[], g0_map());
        assert_eq!(weak.valid, Validity::Invalid);
        assert_eq!(strong.valid, Validity::Invalid);
    }
}
