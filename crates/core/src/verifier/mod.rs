//! Verification building blocks: the internal-consistency check,
//! constraint generation, pruning, and the verdict types shared with the
//! solver.

use std::collections::BTreeMap;
use std::sync::Arc;

use typed_builder::TypedBuilder;

use crate::graph::known::Edge;
use crate::graph::matrix::MatrixGraph;
use crate::history::types::TransactionId;

pub mod constraints;
pub mod internal;
pub mod pruning;

pub use constraints::{generate_constraints, SiConstraint, SiEdge, SiEdgeKind};
pub use internal::check_internal_consistency;
pub use pruning::{prune_constraints, PruneOutcome};

/// Tunables of one verification run. Passed in at the start; never process
/// globals.
#[derive(Debug, Clone, TypedBuilder)]
pub struct VerifyOptions {
    /// Merge all constraints of a conflicting transaction pair into one.
    #[builder(default = true)]
    pub coalesce_constraints: bool,
    /// Run the reachability pruner before the solver.
    #[builder(default = true)]
    pub enable_pruning: bool,
    /// Stop pruning when a round discharges at most this fraction of the
    /// constraint total (also when at most this fraction remains).
    #[builder(default = 0.01)]
    pub stop_threshold: f64,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A known-graph edge bundle of the witness: the endpoint pair and every
/// parallel edge it carries.
pub type KnownEdge<Variable> = (TransactionId, TransactionId, Vec<Edge<Variable>>);

/// The minimal evidence of an SI violation: known edges and residual
/// constraints that cannot be jointly ordered without a cycle.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counterexample<Variable> {
    pub edges: Vec<KnownEdge<Variable>>,
    pub constraints: Vec<SiConstraint<Variable>>,
}

/// The outcome of a verification run on a structurally valid history.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict<Variable> {
    /// The history satisfies snapshot isolation.
    Accept,
    /// The history violates snapshot isolation; the counterexample
    /// witnesses a forbidden cycle.
    Reject(Counterexample<Variable>),
}

impl<Variable> Verdict<Variable> {
    #[must_use]
    pub const fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }
}

/// Thins a graph over transactions without changing reachability.
///
/// For each node, keep only its earliest successor within each session plus
/// its immediate session neighbour. Later transactions of a session stay
/// reachable through the session-order chain, so transitive closure over
/// the reduced graph equals closure over the input.
#[must_use]
pub fn reduce_edges(graph: &MatrixGraph<TransactionId>) -> MatrixGraph<TransactionId> {
    let mut reduced = MatrixGraph::of_nodes(Arc::clone(graph.node_map()));

    for n in graph.nodes() {
        let mut first_in_session: BTreeMap<u64, TransactionId> = BTreeMap::new();
        for &m in graph.successors(n) {
            first_in_session
                .entry(m.session_id)
                .and_modify(|current| {
                    if m.session_height < current.session_height {
                        *current = m;
                    }
                })
                .or_insert(m);
            if m.session_id == n.session_id && m.session_height == n.session_height + 1 {
                reduced.put_edge(n, &m);
            }
        }
        for m in first_in_session.values() {
            reduced.put_edge(n, m);
        }
    }

    tracing::trace!(
        before = graph.edge_count(),
        after = reduced.edge_count(),
        "reduced edges"
    );
    reduced
}
