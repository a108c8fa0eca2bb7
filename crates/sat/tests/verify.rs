//! End-to-end verdicts for the classic snapshot-isolation litmus
//! histories, plus determinism and option-agreement checks.

mod common;

use sicheck_core::graph::known::Edge;
use sicheck_core::history::error::Error;
use sicheck_core::history::types::{Event, Session, Transaction};
use sicheck_core::verifier::{Verdict, VerifyOptions};
use sicheck_sat::verify;

type History = Vec<Session<&'static str, u64>>;

fn check(history: &History) -> Verdict<&'static str> {
    verify(history, &VerifyOptions::default()).expect("history is well formed")
}

/// Init transaction writing x and y, then the two write-skew halves.
fn write_skew() -> History {
    history![
        [{ w(x, 0), w(y, 0) }],
        [{ r(x, 0), w(y, 1) }],
        [{ r(y, 0), w(x, 1) }],
    ]
}

/// Two sessions fork from init but observe each other's writes in
/// incompatible orders.
fn long_fork() -> History {
    history![
        [{ w(x, 0), w(y, 0) }],
        [{ w(x, 1) }],
        [{ w(y, 1) }],
        [{ r(x, 1), r(y, 0) }],
        [{ r(x, 0), r(y, 1) }],
    ]
}

#[test]
fn empty_history_accepts() {
    let history: History = vec![];
    assert_eq!(check(&history), Verdict::Accept);

    let all_empty: History = vec![vec![], vec![]];
    assert_eq!(check(&all_empty), Verdict::Accept);
}

#[test]
fn single_transaction_self_reads_accept() {
    let history = history![[{ w(x, 1), r(x, 1), w(x, 2), r(x, 2) }]];
    assert_eq!(check(&history), Verdict::Accept);
}

#[test]
fn lost_update_pair_accepts() {
    // Two blind writes of the same variable: either commit order works.
    let history = history![[{ w(x, 1) }], [{ w(x, 2) }]];
    assert_eq!(check(&history), Verdict::Accept);
}

#[test]
fn write_skew_is_admitted() {
    // Disjoint write sets; the anti-dependency cycle never enters
    // A ∪ (A∘B). Snapshot isolation allows write skew.
    assert_eq!(check(&write_skew()), Verdict::Accept);
}

#[test]
fn long_fork_rejects_with_anti_dependency_witness() {
    let Verdict::Reject(counterexample) = check(&long_fork()) else {
        panic!("long fork must be rejected");
    };
    assert!(!counterexample.edges.is_empty());
    // The witness names the folded anti-dependencies.
    let has_rw = counterexample
        .edges
        .iter()
        .any(|(_, _, edges)| edges.iter().any(|e| matches!(e, Edge::Rw(_))));
    assert!(has_rw, "witness should contain an RW edge: {counterexample:?}");
}

#[test]
fn stale_read_within_session_rejects() {
    // The third transaction reads x=1 after its own session overwrote it.
    let history = history![[{ w(x, 1) }, { r(x, 1), w(x, 2) }, { r(x, 1) }]];
    let Verdict::Reject(counterexample) = check(&history) else {
        panic!("stale session read must be rejected");
    };
    assert!(!counterexample.edges.is_empty() || !counterexample.constraints.is_empty());
}

#[test]
fn pruner_cycle_short_circuits_with_graph_witness() {
    // Long fork plus an undecidable blind-write pair keeps the pruner
    // running into the round that sees the cycle in A∘B.
    let history = history![
        [{ w(x, 0), w(y, 0) }],
        [{ w(x, 1) }],
        [{ w(y, 1) }],
        [{ r(x, 1), r(y, 0) }],
        [{ r(x, 0), r(y, 1) }],
        [{ w(z, 1) }],
        [{ w(z, 2) }],
    ];
    let Verdict::Reject(counterexample) = check(&history) else {
        panic!("expected rejection");
    };
    // Graph-only witness: no constraints, alternating WR/RW hops.
    assert!(counterexample.constraints.is_empty());
    assert!(!counterexample.edges.is_empty());
}

#[test]
fn chained_reads_accept() {
    let history = history![
        [{ w(x, 1) }],
        [{ r(x, 1), w(x, 2) }],
        [{ r(x, 2), w(y, 1) }],
        [{ r(y, 1) }],
    ];
    assert_eq!(check(&history), Verdict::Accept);
}

#[test]
fn verdict_is_deterministic() {
    let first = check(&long_fork());
    let second = check(&long_fork());
    assert_eq!(first, second);

    let accept_first = check(&write_skew());
    let accept_second = check(&write_skew());
    assert_eq!(accept_first, accept_second);
}

#[test]
fn options_do_not_change_the_verdict() {
    let histories = vec![
        write_skew(),
        long_fork(),
        history![[{ w(x, 1) }], [{ w(x, 2) }]],
        history![[{ w(x, 1) }, { r(x, 1), w(x, 2) }, { r(x, 1) }]],
        history![
            [{ w(x, 1) }],
            [{ r(x, 1), w(x, 2) }],
            [{ r(x, 2), w(y, 1) }],
            [{ r(y, 1) }],
        ],
    ];

    for (i, history) in histories.iter().enumerate() {
        let default = verify(history, &VerifyOptions::default()).unwrap();
        for options in [
            VerifyOptions::builder().coalesce_constraints(false).build(),
            VerifyOptions::builder().enable_pruning(false).build(),
            VerifyOptions::builder()
                .coalesce_constraints(false)
                .enable_pruning(false)
                .build(),
            VerifyOptions::builder().stop_threshold(0.0).build(),
        ] {
            let verdict = verify(history, &options).unwrap();
            assert_eq!(
                verdict.is_accept(),
                default.is_accept(),
                "history {i} disagrees under {options:?}"
            );
        }
    }
}

#[test]
fn thin_air_read_is_an_invalid_history() {
    let history = history![[{ r(x, 7) }]];
    assert!(matches!(
        verify(&history, &VerifyOptions::default()),
        Err(Error::IncompleteRead { .. })
    ));
}

#[test]
fn uncommitted_transaction_is_an_invalid_history() {
    let history: History = vec![vec![Transaction::uncommitted(vec![Event::write("x", 1)])]];
    assert!(matches!(
        verify(&history, &VerifyOptions::default()),
        Err(Error::UncommittedTransaction { .. })
    ));
}

#[test]
fn text_loader_round_trips_into_the_verifier() {
    // Session 1 writes x=10 then x=11; session 2 reads the final version.
    let input = "w(1,10,1,1)\nw(1,11,1,2)\nr(1,11,2,3)\n";
    let sessions = sicheck_core::history::text::parse_history(input).unwrap();
    assert_eq!(
        verify(&sessions, &VerifyOptions::default()).unwrap(),
        Verdict::Accept
    );
}

#[test]
fn text_loader_surfaces_si_violations() {
    // Two client sessions race on key 1; a third session observes both
    // orders of the fork on keys 1 and 2.
    let input = "\
w(1,1,1,1)
w(2,1,2,2)
r(1,1,3,3)
r(2,0,3,3)
r(1,0,4,4)
r(2,1,4,4)
";
    let sessions = sicheck_core::history::text::parse_history(input).unwrap();
    let verdict = verify(&sessions, &VerifyOptions::default()).unwrap();
    assert!(matches!(verdict, Verdict::Reject(_)));
}
