//! Reachability-based constraint pruning.
//!
//! Each round builds bitmap graphs for the known relations, computes the
//! reachability of `A ∪ (A∘B)`, and discharges every constraint with one
//! side already contradicted, folding the other side into the known graph.
//! Rounds repeat until the marginal yield drops below the stop threshold.
//! A cycle in `A∘B` proves the violation outright.

use core::hash::Hash;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::graph::known::KnownGraph;
use crate::graph::matrix::MatrixGraph;
use crate::history::types::TransactionId;
use crate::verifier::constraints::{SiConstraint, SiEdge, SiEdgeKind};
use crate::verifier::{reduce_edges, Counterexample, VerifyOptions};

/// How a pruning run ended.
#[derive(Debug)]
pub enum PruneOutcome<Variable> {
    /// The fixed point (or stop threshold) was reached; the residual
    /// constraints go to the solver.
    Completed { rounds: usize, solved: usize },
    /// `A∘B` contains a cycle: the history violates snapshot isolation and
    /// the solver is not needed.
    Cycle(Counterexample<Variable>),
}

enum Round<Variable> {
    Solved(usize),
    Cycle(Counterexample<Variable>),
}

/// Runs pruning rounds until the yield drops below
/// `options.stop_threshold` of the constraint total, or a cycle appears.
///
/// The known graph only gains edges and the constraint set only shrinks;
/// each discharged constraint has one side contradicted by reachability
/// over known edges, so folding the other side preserves satisfiability.
pub fn prune_constraints<Variable>(
    known: &mut KnownGraph<Variable>,
    constraints: &mut Vec<SiConstraint<Variable>>,
    options: &VerifyOptions,
) -> PruneOutcome<Variable>
where
    Variable: Eq + Ord + Hash + Clone,
{
    if !options.enable_pruning {
        return PruneOutcome::Completed {
            rounds: 0,
            solved: 0,
        };
    }

    let total = constraints.len();
    let threshold = options.stop_threshold * total as f64;
    let mut rounds = 0;
    let mut solved_total = 0;

    loop {
        rounds += 1;
        match prune_round(known, constraints) {
            Round::Cycle(counterexample) => {
                tracing::debug!(rounds, "cycle found in pruning");
                return PruneOutcome::Cycle(counterexample);
            }
            Round::Solved(solved) => {
                solved_total += solved;
                tracing::debug!(rounds, solved, residual = constraints.len(), "pruning round");
                if solved as f64 <= threshold || (total - solved_total) as f64 <= threshold {
                    break;
                }
            }
        }
    }

    tracing::debug!(
        rounds,
        solved = solved_total,
        graph_a = known.graph_a().edge_count(),
        graph_b = known.graph_b().edge_count(),
        "pruning finished"
    );
    PruneOutcome::Completed {
        rounds,
        solved: solved_total,
    }
}

fn prune_round<Variable>(
    known: &mut KnownGraph<Variable>,
    constraints: &mut Vec<SiConstraint<Variable>>,
) -> Round<Variable>
where
    Variable: Eq + Ord + Hash + Clone,
{
    let nodes: Vec<TransactionId> = known.graph_a().nodes().collect();
    let edges_a: Vec<(TransactionId, TransactionId)> = known
        .graph_a()
        .edges()
        .map(|(source, target, _)| (source, target))
        .collect();
    let edges_b: Vec<(TransactionId, TransactionId)> = known
        .graph_b()
        .edges()
        .map(|(source, target, _)| (source, target))
        .collect();

    let mat_a = MatrixGraph::new(nodes, &edges_a);
    let mat_b = MatrixGraph::with_node_map(Arc::clone(mat_a.node_map()), &edges_b);
    let mat_c = mat_a.composition(&mat_b);

    if let Some(cycle) = mat_c.find_cycle() {
        return Round::Cycle(composed_cycle_witness(known, &cycle));
    }

    let reachability = reduce_edges(&mat_a.union(&mat_c)).reachability();
    tracing::debug!(
        sparsity = 1.0
            - reachability.edge_count() as f64 / (reachability.node_count() as f64).powi(2),
        "reachability matrix"
    );

    let mut discharged: Vec<usize> = Vec::new();
    for index in 0..constraints.len() {
        if has_conflict(&constraints[index].edges1, &reachability, known) {
            let folded = constraints[index].edges2.clone();
            fold_into_known(known, &folded);
            discharged.push(index);
        } else if has_conflict(&constraints[index].edges2, &reachability, known) {
            let folded = constraints[index].edges1.clone();
            fold_into_known(known, &folded);
            discharged.push(index);
        }
    }

    let mut keep = discharged.into_iter().peekable();
    let mut index = 0;
    let before = constraints.len();
    constraints.retain(|_| {
        let drop = keep.peek() == Some(&index);
        if drop {
            keep.next();
        }
        index += 1;
        !drop
    });

    Round::Solved(before - constraints.len())
}

/// One side conflicts when reachability already contradicts it: a WW edge
/// `u -> v` with `v ~> u` known, or an RW edge `u -> v` where some `p` with
/// `p ->A u` satisfies `v ~> p` (so `p` would both precede and follow `v`).
fn has_conflict<Variable>(
    edges: &[SiEdge<Variable>],
    reachability: &MatrixGraph<TransactionId>,
    known: &KnownGraph<Variable>,
) -> bool
where
    Variable: Eq + Ord + Hash + Clone,
{
    edges.iter().any(|edge| match edge.kind {
        SiEdgeKind::Ww => reachability.has_edge(&edge.to, &edge.from),
        SiEdgeKind::Rw => known
            .graph_a()
            .predecessors(&edge.from)
            .any(|p| reachability.has_edge(&edge.to, &p)),
    })
}

fn fold_into_known<Variable>(known: &mut KnownGraph<Variable>, edges: &[SiEdge<Variable>])
where
    Variable: Eq + Hash + Clone,
{
    for edge in edges {
        known.put_edge(edge.from, edge.to, edge.to_known());
    }
}

/// Expands a cycle of the composed graph `A∘B` into the witnessing known
/// edges: each hop `u -> w` is some `u ->A mid ->B w`.
fn composed_cycle_witness<Variable>(
    known: &KnownGraph<Variable>,
    cycle: &[TransactionId],
) -> Counterexample<Variable>
where
    Variable: Eq + Ord + Hash + Clone,
{
    let mut edges = Vec::new();
    let mut seen: BTreeSet<(TransactionId, TransactionId)> = BTreeSet::new();

    for (i, &u) in cycle.iter().enumerate() {
        let w = cycle[(i + 1) % cycle.len()];
        let mid = known
            .graph_a()
            .successors(&u)
            .map(|(mid, _)| mid)
            .find(|mid| known.graph_b().has_edge(mid, &w))
            .expect("every composed edge has a middle transaction");
        if seen.insert((u, mid)) {
            edges.push((u, mid, known.graph_a().edges_between(&u, &mid).to_vec()));
        }
        if seen.insert((mid, w)) {
            edges.push((mid, w, known.graph_b().edges_between(&mid, &w).to_vec()));
        }
    }

    Counterexample {
        edges,
        constraints: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::types::{Event, Session, Transaction};
    use crate::verifier::constraints::generate_constraints;

    type History = Vec<Session<&'static str, u64>>;

    fn prune(
        history: &History,
        options: &VerifyOptions,
    ) -> (
        KnownGraph<&'static str>,
        Vec<SiConstraint<&'static str>>,
        PruneOutcome<&'static str>,
    ) {
        let mut known = KnownGraph::new(history);
        let mut constraints = generate_constraints(history, &known, true);
        let outcome = prune_constraints(&mut known, &mut constraints, options);
        (known, constraints, outcome)
    }

    /// Init writes x and y; two one-transaction sessions read one variable
    /// and write the other. Both constraints are forced by the WR edges.
    fn write_skew_history() -> History {
        vec![
            vec![Transaction::committed(vec![
                Event::write("x", 0),
                Event::write("y", 0),
            ])],
            vec![Transaction::committed(vec![
                Event::read("x", 0),
                Event::write("y", 1),
            ])],
            vec![Transaction::committed(vec![
                Event::read("y", 0),
                Event::write("x", 1),
            ])],
        ]
    }

    #[test]
    fn discharges_forced_orientations() {
        let (known, constraints, outcome) = prune(&write_skew_history(), &VerifyOptions::default());

        assert!(matches!(outcome, PruneOutcome::Completed { solved: 2, .. }));
        assert!(constraints.is_empty());

        // The init transaction is ordered before both writers, and the
        // induced anti-dependencies went into B.
        let init = TransactionId::new(0, 0);
        let t1 = TransactionId::new(1, 0);
        let t2 = TransactionId::new(2, 0);
        assert!(known.graph_a().has_edge(&init, &t1));
        assert!(known.graph_a().has_edge(&init, &t2));
        assert!(known.graph_b().has_edge(&t1, &t2));
        assert!(known.graph_b().has_edge(&t2, &t1));
    }

    #[test]
    fn known_graph_only_grows() {
        let history = write_skew_history();
        let mut known = KnownGraph::new(&history);
        let edges_before = known.graph_a().edge_count();
        let mut constraints = generate_constraints(&history, &known, true);
        let total = constraints.len();

        prune_constraints(&mut known, &mut constraints, &VerifyOptions::default());

        assert!(known.graph_a().edge_count() >= edges_before);
        assert!(constraints.len() <= total);
    }

    #[test]
    fn pruning_disabled_is_a_no_op() {
        let options = VerifyOptions::builder().enable_pruning(false).build();
        let (known, constraints, outcome) = prune(&write_skew_history(), &options);

        assert!(matches!(
            outcome,
            PruneOutcome::Completed {
                rounds: 0,
                solved: 0
            }
        ));
        assert_eq!(constraints.len(), 2);
        assert!(known.graph_b().edges().next().is_none());
    }

    /// Long fork plus an undischargeable blind-write pair: round one folds
    /// the long-fork anti-dependencies, round two sees the cycle in `A∘B`.
    #[test]
    fn detects_cycle_in_composed_graph() {
        let history: History = vec![
            vec![Transaction::committed(vec![
                Event::write("x", 0),
                Event::write("y", 0),
            ])],
            vec![Transaction::committed(vec![Event::write("x", 1)])],
            vec![Transaction::committed(vec![Event::write("y", 1)])],
            vec![Transaction::committed(vec![
                Event::read("x", 1),
                Event::read("y", 0),
            ])],
            vec![Transaction::committed(vec![
                Event::read("x", 0),
                Event::read("y", 1),
            ])],
            vec![Transaction::committed(vec![Event::write("z", 1)])],
            vec![Transaction::committed(vec![Event::write("z", 2)])],
        ];
        let (_, _, outcome) = prune(&history, &VerifyOptions::default());

        match outcome {
            PruneOutcome::Cycle(counterexample) => {
                assert!(counterexample.constraints.is_empty());
                assert!(!counterexample.edges.is_empty());
                // The witness alternates A and B hops; every endpoint pair
                // carries its known edges.
                for (_, _, edges) in &counterexample.edges {
                    assert!(!edges.is_empty());
                }
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }
}
