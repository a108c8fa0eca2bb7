//! Rendering of counterexamples: plain text for terminals, Graphviz dot
//! for visual inspection.

use core::fmt::{Display, Write as _};

use std::collections::BTreeSet;

use sicheck_core::history::types::{Session, TransactionId};
use sicheck_core::verifier::Counterexample;

/// Transactions mentioned anywhere in the counterexample, in id order.
fn related_transactions<Variable>(
    counterexample: &Counterexample<Variable>,
) -> BTreeSet<TransactionId> {
    let mut transactions = BTreeSet::new();
    for (source, target, _) in &counterexample.edges {
        transactions.insert(*source);
        transactions.insert(*target);
    }
    for constraint in &counterexample.constraints {
        for edge in constraint.edges1.iter().chain(&constraint.edges2) {
            transactions.insert(edge.from);
            transactions.insert(edge.to);
        }
    }
    transactions
}

/// Plain-text rendering: the conflicting edges and constraints, then the
/// operations of every transaction involved.
pub fn to_text<Variable, Version>(
    sessions: &[Session<Variable, Version>],
    counterexample: &Counterexample<Variable>,
) -> String
where
    Variable: Display + Ord,
    Version: Display,
{
    let mut out = String::new();

    for (source, target, edges) in &counterexample.edges {
        let labels: Vec<String> = edges.iter().map(ToString::to_string).collect();
        let _ = writeln!(out, "Edge: {source} -> {target} [{}]", labels.join(", "));
    }
    for constraint in &counterexample.constraints {
        let _ = writeln!(out, "Constraint: {constraint}");
        for edge in &constraint.edges1 {
            let _ = writeln!(out, "  either: {edge}");
        }
        for edge in &constraint.edges2 {
            let _ = writeln!(out, "  or:     {edge}");
        }
    }

    let _ = writeln!(out, "Related transactions:");
    for id in related_transactions(counterexample) {
        let _ = writeln!(out, "{id}:");
        let transaction = sessions
            .get(id.session_id as usize)
            .and_then(|session| session.get(id.session_height as usize));
        if let Some(transaction) = transaction {
            for event in &transaction.events {
                let _ = writeln!(out, "  {event}");
            }
        }
    }

    out
}

/// Graphviz rendering: known edges solid and labelled, constraint sides
/// dotted (first orientation) or dashed (second), one colour per
/// constraint.
pub fn to_dot<Variable>(counterexample: &Counterexample<Variable>) -> String
where
    Variable: Display + Ord,
{
    let mut out = String::new();
    let _ = writeln!(out, "digraph {{");

    for id in related_transactions(counterexample) {
        let _ = writeln!(out, "\"{id}\";");
    }

    for (source, target, edges) in &counterexample.edges {
        let mut label = String::new();
        for edge in edges {
            let _ = write!(label, "{edge}\\n");
        }
        let _ = writeln!(out, "\"{source}\" -> \"{target}\" [label=\"{label}\"];");
    }

    let color_step = 0x100_0000 / (counterexample.constraints.len() + 1);
    let mut color = 0;
    for constraint in &counterexample.constraints {
        color += color_step;
        for edge in &constraint.edges1 {
            let _ = writeln!(
                out,
                "\"{}\" -> \"{}\" [style=dotted,color=\"#{color:06x}\"];",
                edge.from, edge.to
            );
        }
        for edge in &constraint.edges2 {
            let _ = writeln!(
                out,
                "\"{}\" -> \"{}\" [style=dashed,color=\"#{color:06x}\"];",
                edge.from, edge.to
            );
        }
    }

    let _ = writeln!(out, "}}");
    out
}
