//! Wall-clock budget behavior: timeout records and fallback witnesses.

use std::time::Duration;

use adya_core::anomaly::{Anomaly, AnomalyType};
use adya_core::{check_history, CheckOptions, Validity};

mod common;
use common::{detect_with_timeout, graph, RW, WR, WW};

#[test]
fn expired_budget_emits_timeout_and_fallback() {
    let edges = [(1, WW, 2), (2, WW, 1), (2, WR, 3), (3, RW, 1)];
    let map = detect_with_timeout(graph(&edges), Duration::ZERO);

    // Exactly one timeout record, naming the spec that was active and
    // the size of the SCC.
    let timeouts = map
        .get(&AnomalyType::CycleSearchTimeout)
        .expect("expected a timeout record");
    assert_eq!(timeouts.len(), 1);
    let Anomaly::CycleSearchTimeout {
        anomaly_spec_type,
        specs_checked,
        scc_size,
    } = &timeouts[0]
    else {
        panic!("expected a timeout anomaly");
    };
    // With a zero budget nothing ran: the worst spec was active.
    assert_eq!(*anomaly_spec_type, AnomalyType::G0);
    assert!(specs_checked.is_empty());
    assert_eq!(*scc_size, 3);

    // Exactly one fallback cycle, classified normally, with every step
    // an edge of the original graph.
    let cycles: Vec<_> = map
        .iter()
        .filter(|(kind, _)| !kind.is_inconclusive())
        .flat_map(|(_, anomalies)| anomalies)
        .collect();
    assert_eq!(cycles.len(), 1);
    let Anomaly::Cycle(explanation) = cycles[0] else {
        panic!("expected a cycle anomaly");
    };
    let original = graph(&edges);
    for step in explanation.cycle.steps() {
        let label = original
            .edge_label(&step.from, &step.to)
            .expect("fallback step must be a graph edge");
        assert_eq!(label, step.label);
    }
}

#[test]
fn fallback_prefers_the_coarsest_projection() {
    // The full SCC is {1,2,3}, but a pure ww 2-cycle hides inside: the
    // cascade should surface the ww witness rather than an arbitrary one.
    let edges = [(1, WW, 2), (2, WW, 1), (2, WR, 3), (3, RW, 1)];
    let map = detect_with_timeout(graph(&edges), Duration::ZERO);

    let g0 = map.get(&AnomalyType::G0).expect("expected the ww fallback");
    let Anomaly::Cycle(explanation) = &g0[0] else {
        panic!("expected a cycle anomaly");
    };
    assert!(explanation.cycle.steps().iter().all(|s| s.label == WW));
}

#[test]
fn generous_budget_reports_no_timeout() {
    let map = detect_with_timeout(graph(&[(1, WW, 2), (2, WW, 1)]), Duration::from_secs(5));
    assert!(!map.contains_key(&AnomalyType::CycleSearchTimeout));
    assert!(map.contains_key(&AnomalyType::G0));
}

#[test]
fn timeout_verdict_is_unknown_not_invalid() {
    // Real history, zero budget: the only finding is inconclusive.
    use adya_core::history::{Mop, Transaction};

    let history = vec![
        Transaction::ok(0, 1, vec![Mop::write("x", 1u64), Mop::read("y", 1)]),
        Transaction::ok(1, 2, vec![Mop::write("y", 1), Mop::read("x", 1)]),
    ];

    let options = CheckOptions {
        cycle_search_timeout: Duration::ZERO,
        ..CheckOptions::default()
    };
    let verdict = check_history(&options, &history).unwrap();

    // The fallback cycle is still a real G1c witness, so the verdict is
    // invalid; the timeout record rides along as reportable.
    assert!(verdict
        .anomaly_types
        .contains(&AnomalyType::CycleSearchTimeout));
    assert_eq!(verdict.valid, Validity::Invalid);
}
