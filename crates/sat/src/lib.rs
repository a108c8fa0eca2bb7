//! SAT-backed decision procedure for snapshot isolation.
//!
//! [`verify`] runs the full pipeline over a history: internal-consistency
//! checking, known-graph construction, constraint generation, reachability
//! pruning, and finally the SAT-reduced acyclicity check. Structural
//! violations of the history contract are errors; a genuine SI violation
//! is a [`Verdict::Reject`] carrying a counterexample.

use core::fmt::Debug;
use core::hash::Hash;

use sicheck_core::graph::known::KnownGraph;
use sicheck_core::history::error::Error;
use sicheck_core::history::types::Session;
use sicheck_core::verifier::{
    check_internal_consistency, generate_constraints, prune_constraints, PruneOutcome, Verdict,
    VerifyOptions,
};

pub mod logic;
pub mod solver;
pub mod theory;

pub use solver::SiSolver;

/// Decides whether `sessions` satisfies snapshot isolation.
///
/// # Errors
///
/// Returns the first history-contract violation found (uncommitted
/// transaction, read without a producing write, duplicate write, stale or
/// future read). These are loader-level problems, not SI violations, and
/// no witness graph is built for them.
pub fn verify<Variable, Version>(
    sessions: &[Session<Variable, Version>],
    options: &VerifyOptions,
) -> Result<Verdict<Variable>, Error<Variable, Version>>
where
    Variable: Eq + Ord + Hash + Clone + Debug,
    Version: Eq + Hash + Clone,
{
    tracing::debug!(
        sessions = sessions.len(),
        transactions = sessions.iter().map(Vec::len).sum::<usize>(),
        events = sessions
            .iter()
            .flatten()
            .map(|txn| txn.events.len())
            .sum::<usize>(),
        "verifying history"
    );

    check_internal_consistency(sessions)?;

    if sessions.iter().all(Vec::is_empty) {
        return Ok(Verdict::Accept);
    }

    let mut known = KnownGraph::new(sessions);
    tracing::debug!(known_edges = known.graph_a().edge_count(), "known graph built");

    let mut constraints = generate_constraints(sessions, &known, options.coalesce_constraints);

    if let PruneOutcome::Cycle(counterexample) =
        prune_constraints(&mut known, &mut constraints, options)
    {
        return Ok(Verdict::Reject(counterexample));
    }

    let mut solver = SiSolver::new(&known, constraints);
    if solver.solve() {
        Ok(Verdict::Accept)
    } else {
        Ok(Verdict::Reject(solver.into_conflicts()))
    }
}
