//! Directed-graph acyclicity as a theory on top of the CDCL core.
//!
//! Edges are labelled with literals; the theory asserts that the subgraph
//! of true-labelled edges is acyclic. Instead of encoding all transitivity
//! constraints eagerly, the solve loop refines lazily: whenever a model
//! activates a cycle, one blocking clause forbids that cycle's labels and
//! the search resumes. Every blocking clause is entailed by acyclicity, so
//! the final answer and the unsat core are exactly those of the eager
//! encoding.

use std::collections::BTreeMap;

use rustsat::solvers::SolverResult;
use rustsat::types::Lit;
use sicheck_core::graph::digraph::DiGraph;

use crate::logic::Formula;

/// A literal-labelled directed graph whose acyclicity is enforced during
/// solving. Nodes are dense indices; parallel edges are allowed.
#[derive(Debug, Default)]
pub struct AcyclicityTheory {
    node_count: u32,
    edges: Vec<(u32, u32, Lit)>,
}

impl AcyclicityTheory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node and returns its index.
    pub fn add_node(&mut self) -> u32 {
        let node = self.node_count;
        self.node_count += 1;
        node
    }

    /// Adds an edge that exists iff `lit` is true.
    ///
    /// # Panics
    ///
    /// Panics if an endpoint was not added first.
    pub fn add_edge(&mut self, from: u32, to: u32, lit: Lit) {
        assert!(from < self.node_count && to < self.node_count);
        self.edges.push((from, to, lit));
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Solves `formula` under `assumptions` with the acyclicity of this
    /// graph enforced.
    ///
    /// On `Unsat` the formula's core describes the conflict in terms of the
    /// assumptions, as usual.
    pub fn solve_acyclic(&self, formula: &mut Formula, assumptions: &[Lit]) -> SolverResult {
        let mut refinements = 0usize;
        loop {
            match formula.solve_assumps(assumptions) {
                SolverResult::Unsat => {
                    tracing::debug!(refinements, "acyclicity solve: unsat");
                    return SolverResult::Unsat;
                }
                SolverResult::Interrupted => return SolverResult::Interrupted,
                SolverResult::Sat => {
                    // The subgraph the model activates; one representative
                    // literal per endpoint pair suffices for blocking.
                    let mut active = DiGraph::<u32>::default();
                    let mut labels: BTreeMap<(u32, u32), Lit> = BTreeMap::new();
                    for &(from, to, lit) in &self.edges {
                        if formula.value(lit) {
                            active.add_edge(from, to);
                            labels.entry((from, to)).or_insert(lit);
                        }
                    }

                    let Some(cycle) = active.find_cycle() else {
                        tracing::debug!(refinements, "acyclicity solve: sat");
                        return SolverResult::Sat;
                    };

                    let clause: Vec<Lit> = cycle
                        .iter()
                        .enumerate()
                        .map(|(i, &from)| {
                            let to = cycle[(i + 1) % cycle.len()];
                            !labels[&(from, to)]
                        })
                        .collect();
                    formula.add_clause(clause);
                    refinements += 1;
                }
            }
        }
    }
}
