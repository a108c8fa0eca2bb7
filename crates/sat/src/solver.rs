//! The SAT encoding of the residual snapshot-isolation problem.
//!
//! Two literal-labelled graphs mirror the known relations: `A` (SO, WR,
//! WW) and `B` (RW). Every known edge gets a literal that is assumed true;
//! every constraint side gets one literal per candidate edge, and the
//! constraint itself contributes an assumed literal for
//! `(all₁ ∧ none₂) ∨ (all₂ ∧ none₁)`. The composed graph `A∘B` is
//! materialised edge by edge with conjunction literals, and acyclicity of
//! `A ∪ (A∘B)` is asserted to the graph theory. An unsat core then names
//! the known edges and constraints that witness the violation.

use core::fmt::Debug;
use core::hash::Hash;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use hashbrown::HashMap;
use rustsat::solvers::SolverResult;
use rustsat::types::Lit;

use sicheck_core::graph::known::KnownGraph;
use sicheck_core::graph::matrix::MatrixGraph;
use sicheck_core::history::types::TransactionId;
use sicheck_core::verifier::constraints::{SiConstraint, SiEdge, SiEdgeKind};
use sicheck_core::verifier::{reduce_edges, Counterexample, KnownEdge};

use crate::logic::Formula;
use crate::theory::AcyclicityTheory;

/// Literal-labelled directed multigraph over transactions.
#[derive(Debug, Default)]
struct LitGraph {
    adj: BTreeMap<TransactionId, BTreeMap<TransactionId, Vec<Lit>>>,
}

impl LitGraph {
    fn add_vertex(&mut self, node: TransactionId) {
        self.adj.entry(node).or_default();
    }

    fn add_edge(&mut self, source: TransactionId, target: TransactionId, lit: Lit) {
        self.add_vertex(target);
        self.adj
            .entry(source)
            .or_default()
            .entry(target)
            .or_default()
            .push(lit);
    }

    fn lits_between(&self, source: &TransactionId, target: &TransactionId) -> &[Lit] {
        self.adj
            .get(source)
            .and_then(|neighbors| neighbors.get(target))
            .map_or(&[], Vec::as_slice)
    }

    fn nodes(&self) -> impl Iterator<Item = TransactionId> + '_ {
        self.adj.keys().copied()
    }

    fn successors(
        &self,
        node: &TransactionId,
    ) -> impl Iterator<Item = (TransactionId, &Vec<Lit>)> {
        self.adj
            .get(node)
            .into_iter()
            .flat_map(|neighbors| neighbors.iter().map(|(&target, lits)| (target, lits)))
    }

    fn endpoint_pairs(&self) -> Vec<(TransactionId, TransactionId)> {
        self.adj
            .iter()
            .flat_map(|(&source, neighbors)| neighbors.keys().map(move |&target| (source, target)))
            .collect()
    }
}

/// Allocates a literal per candidate edge of one constraint side, routes
/// the edges into the literal graphs, and returns the side's `all` and
/// `none` conjunction gates.
fn encode_side<Variable>(
    formula: &mut Formula,
    lit_graph_a: &mut LitGraph,
    lit_graph_b: &mut LitGraph,
    edges: &[SiEdge<Variable>],
) -> (Lit, Lit) {
    let mut lits = Vec::with_capacity(edges.len());
    for edge in edges {
        let lit = formula.fresh();
        lits.push(lit);
        match edge.kind {
            SiEdgeKind::Ww => lit_graph_a.add_edge(edge.from, edge.to, lit),
            SiEdgeKind::Rw => lit_graph_b.add_edge(edge.from, edge.to, lit),
        }
    }
    let all = formula.and_all(&lits);
    let negated: Vec<Lit> = lits.iter().map(|&lit| !lit).collect();
    let none = formula.and_all(&negated);
    (all, none)
}

/// One verification's solver. Created per run and dropped with it; the
/// underlying SAT solver is released on every exit path.
pub struct SiSolver<Variable> {
    formula: Formula,
    theory: AcyclicityTheory,
    assumptions: Vec<Lit>,
    known_literals: Vec<(Lit, KnownEdge<Variable>)>,
    constraint_literals: Vec<(Lit, SiConstraint<Variable>)>,
}

impl<Variable> SiSolver<Variable>
where
    Variable: Eq + Ord + Hash + Clone + Debug,
{
    /// Builds the encoding from the known graph and residual constraints.
    pub fn new(known: &KnownGraph<Variable>, constraints: Vec<SiConstraint<Variable>>) -> Self {
        let mut formula = Formula::new();
        let mut known_literals = Vec::new();

        // One literal per known endpoint pair, in both relations.
        let mut lit_graph_a = LitGraph::default();
        let mut lit_graph_b = LitGraph::default();
        for node in known.graph_a().nodes() {
            lit_graph_a.add_vertex(node);
            lit_graph_b.add_vertex(node);
        }
        for (graph, lit_graph) in [
            (known.graph_a(), &mut lit_graph_a),
            (known.graph_b(), &mut lit_graph_b),
        ] {
            for (source, target, edges) in graph.edges() {
                let lit = formula.fresh();
                known_literals.push((lit, (source, target, edges.clone())));
                lit_graph.add_edge(source, target, lit);
            }
        }

        // Reachability over known edges decides which potential edges are
        // worth materialising at all.
        let nodes: Vec<TransactionId> = lit_graph_a.nodes().collect();
        let mat_a = MatrixGraph::new(nodes.clone(), &lit_graph_a.endpoint_pairs());
        let mat_b = MatrixGraph::with_node_map(
            Arc::clone(mat_a.node_map()),
            &lit_graph_b.endpoint_pairs(),
        );
        let mat_ac = reduce_edges(&mat_a.union(&mat_a.composition(&mat_b)));
        let reachability = mat_ac.reachability();

        // Known edges of A ∪ (A∘B): direct edges carry their own literal,
        // composed edges the conjunction of their two halves.
        let mut edges: Vec<(TransactionId, TransactionId, Lit)> = Vec::new();
        for (&n, &m) in mat_ac.edges() {
            if let Some(&lit) = lit_graph_a.lits_between(&n, &m).first() {
                edges.push((n, m, lit));
                continue;
            }
            let (first_a, first_b) = lit_graph_a
                .successors(&n)
                .find_map(|(mid, lits)| {
                    let first_b = lit_graph_b.lits_between(&mid, &m).first()?;
                    Some((lits[0], *first_b))
                })
                .expect("every composed edge has a middle transaction");
            let lit = formula.and(first_a, first_b);
            edges.push((n, m, lit));
        }

        // Constraint sides: a literal per candidate edge, and an assumed
        // disjunction literal per constraint.
        let mut constraint_literals = Vec::new();
        for constraint in constraints {
            let (all1, none1) = encode_side(
                &mut formula,
                &mut lit_graph_a,
                &mut lit_graph_b,
                &constraint.edges1,
            );
            let (all2, none2) = encode_side(
                &mut formula,
                &mut lit_graph_a,
                &mut lit_graph_b,
                &constraint.edges2,
            );

            let first = formula.and(all1, none2);
            let second = formula.and(all2, none1);
            let lit = formula.or(first, second);
            constraint_literals.push((lit, constraint));
        }

        // Potential edges whose existence the solver decides: direct A
        // edges and A∘B compositions not already known to be reachable.
        for p in &nodes {
            for (n, pred_lits) in lit_graph_a.successors(p) {
                if *p == n || !reachability.has_edge(p, &n) {
                    for &lit in pred_lits {
                        edges.push((*p, n, lit));
                    }
                }
                for (s, succ_lits) in lit_graph_b
                    .successors(&n)
                    .filter(|(s, _)| *p == *s || !reachability.has_edge(p, s))
                {
                    for &e1 in pred_lits {
                        for &e2 in succ_lits {
                            let lit = formula.and(e1, e2);
                            edges.push((*p, s, lit));
                        }
                    }
                }
            }
        }

        // Hand everything to the acyclicity theory over the shared node
        // bijection.
        let mut theory = AcyclicityTheory::new();
        let index: BTreeMap<TransactionId, u32> = nodes
            .iter()
            .map(|&node| (node, theory.add_node()))
            .collect();
        for (source, target, lit) in edges {
            theory.add_edge(index[&source], index[&target], lit);
        }

        let assumptions: Vec<Lit> = known_literals
            .iter()
            .map(|(lit, _)| *lit)
            .chain(constraint_literals.iter().map(|(lit, _)| *lit))
            .collect();

        tracing::debug!(
            known = known_literals.len(),
            constraints = constraint_literals.len(),
            theory_edges = theory.edge_count(),
            "solver encoding built"
        );

        Self {
            formula,
            theory,
            assumptions,
            known_literals,
            constraint_literals,
        }
    }

    /// `true` iff the residual problem is satisfiable, i.e. the history
    /// admits a snapshot-isolation order.
    pub fn solve(&mut self) -> bool {
        matches!(
            self.theory.solve_acyclic(&mut self.formula, &self.assumptions),
            SolverResult::Sat
        )
    }

    /// The witness of an unsatisfiable result: the known edges and
    /// constraints named by the solver's conflict clause.
    pub fn into_conflicts(mut self) -> Counterexample<Variable> {
        let known: HashMap<Lit, usize> = self
            .known_literals
            .iter()
            .enumerate()
            .map(|(i, (lit, _))| (*lit, i))
            .collect();
        let constraints: HashMap<Lit, usize> = self
            .constraint_literals
            .iter()
            .enumerate()
            .map(|(i, (lit, _))| (*lit, i))
            .collect();

        let mut edge_indices = BTreeSet::new();
        let mut constraint_indices = BTreeSet::new();
        for core_lit in self.formula.core() {
            let assumption = !core_lit;
            if let Some(&i) = known.get(&assumption) {
                edge_indices.insert(i);
            } else if let Some(&i) = constraints.get(&assumption) {
                constraint_indices.insert(i);
            }
        }

        Counterexample {
            edges: edge_indices
                .into_iter()
                .map(|i| self.known_literals[i].1.clone())
                .collect(),
            constraints: constraint_indices
                .into_iter()
                .map(|i| self.constraint_literals[i].1.clone())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sicheck_core::history::types::{Event, Session, Transaction};
    use sicheck_core::verifier::generate_constraints;

    type History = Vec<Session<&'static str, u64>>;

    fn solve(history: &History) -> bool {
        let known = KnownGraph::new(history);
        let constraints = generate_constraints(history, &known, true);
        SiSolver::new(&known, constraints).solve()
    }

    #[test]
    fn blind_conflicting_writes_are_orderable() {
        let history: History = vec![
            vec![Transaction::committed(vec![Event::write("x", 1)])],
            vec![Transaction::committed(vec![Event::write("x", 2)])],
        ];
        assert!(solve(&history));
    }

    #[test]
    fn serial_chain_is_orderable() {
        let history: History = vec![
            vec![Transaction::committed(vec![Event::write("x", 1)])],
            vec![Transaction::committed(vec![
                Event::read("x", 1),
                Event::write("x", 2),
            ])],
            vec![Transaction::committed(vec![Event::read("x", 2)])],
        ];
        assert!(solve(&history));
    }

    #[test]
    fn unsat_core_names_known_edges() {
        // One session: T0 writes x twice over T1's head, T1 reads stale
        // through session order. A ∪ (A∘B) is cyclic on known edges alone.
        let history: History = vec![vec![
            Transaction::committed(vec![Event::write("x", 1)]),
            Transaction::committed(vec![Event::write("x", 2)]),
            Transaction::committed(vec![Event::read("x", 1)]),
        ]];
        let known = KnownGraph::new(&history);
        let constraints = generate_constraints(&history, &known, true);
        let mut solver = SiSolver::new(&known, constraints);
        assert!(!solver.solve());
        let conflicts = solver.into_conflicts();
        assert!(!conflicts.edges.is_empty() || !conflicts.constraints.is_empty());
    }
}
