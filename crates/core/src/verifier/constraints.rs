//! Disjunctive ordering constraints for write-write conflicts.
//!
//! Every pair of transactions writing a common variable must commit in one
//! of two orders. Each order implies a set of WW and RW edges; a
//! [`SiConstraint`] records both candidate sets, and the solver asserts
//! that exactly one of them holds in full.

use core::fmt::{self, Display, Formatter};
use core::hash::Hash;

use std::collections::{BTreeMap, BTreeSet};

use hashbrown::{HashMap, HashSet};

use crate::graph::known::{Edge, KnownGraph};
use crate::history::types::{transactions, Event, Session, TransactionId};

/// Edge kinds permitted inside constraints.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SiEdgeKind {
    Ww,
    Rw,
}

/// A candidate edge of one constraint side.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SiEdge<Variable> {
    pub from: TransactionId,
    pub to: TransactionId,
    pub kind: SiEdgeKind,
    pub variable: Variable,
}

impl<Variable> SiEdge<Variable> {
    pub const fn ww(from: TransactionId, to: TransactionId, variable: Variable) -> Self {
        Self {
            from,
            to,
            kind: SiEdgeKind::Ww,
            variable,
        }
    }

    pub const fn rw(from: TransactionId, to: TransactionId, variable: Variable) -> Self {
        Self {
            from,
            to,
            kind: SiEdgeKind::Rw,
            variable,
        }
    }

    /// The known-graph edge this candidate becomes once proven.
    pub fn to_known(&self) -> Edge<Variable>
    where
        Variable: Clone,
    {
        match self.kind {
            SiEdgeKind::Ww => Edge::Ww(self.variable.clone()),
            SiEdgeKind::Rw => Edge::Rw(self.variable.clone()),
        }
    }
}

impl<Variable: Display> Display for SiEdge<Variable> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let kind = match self.kind {
            SiEdgeKind::Ww => "WW",
            SiEdgeKind::Rw => "RW",
        };
        write!(f, "{} -{kind}({})-> {}", self.from, self.variable, self.to)
    }
}

/// Exactly one of `edges1`, `edges2` must hold in full: `edges1` orders
/// `write_transaction1` before `write_transaction2`, `edges2` the reverse.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiConstraint<Variable> {
    pub edges1: Vec<SiEdge<Variable>>,
    pub edges2: Vec<SiEdge<Variable>>,
    pub write_transaction1: TransactionId,
    pub write_transaction2: TransactionId,
    pub id: u32,
}

impl<Variable: Display> Display for SiConstraint<Variable> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "constraint {}: {} <-> {}",
            self.id, self.write_transaction1, self.write_transaction2
        )
    }
}

/// Transactions writing each variable, in deterministic order.
fn writes_by_variable<Variable, Version>(
    sessions: &[Session<Variable, Version>],
) -> BTreeMap<&Variable, BTreeSet<TransactionId>>
where
    Variable: Ord,
{
    let mut writes: BTreeMap<&Variable, BTreeSet<TransactionId>> = BTreeMap::new();
    for (id, txn) in transactions(sessions) {
        for event in &txn.events {
            if let Event::Write { variable, .. } = event {
                writes.entry(variable).or_default().insert(id);
            }
        }
    }
    writes
}

/// Generates one constraint per conflicting transaction pair, aggregating
/// every conflicting variable and all induced RW edges into the pair's two
/// orientations.
fn generate_coalesced<Variable, Version>(
    sessions: &[Session<Variable, Version>],
    graph: &KnownGraph<Variable>,
) -> Vec<SiConstraint<Variable>>
where
    Variable: Eq + Ord + Hash + Clone,
    Version: Eq + Hash + Clone,
{
    let writes = writes_by_variable(sessions);

    // One edge list per oriented pair; both orientations of a conflicting
    // pair are always populated together.
    let mut constraint_edges: HashMap<(TransactionId, TransactionId), Vec<SiEdge<Variable>>> =
        HashMap::new();

    for (&variable, writers) in &writes {
        let writers: Vec<TransactionId> = writers.iter().copied().collect();
        for (i, &a) in writers.iter().enumerate() {
            for &c in &writers[i + 1..] {
                constraint_edges
                    .entry((a, c))
                    .or_default()
                    .push(SiEdge::ww(a, c, variable.clone()));
                constraint_edges
                    .entry((c, a))
                    .or_default()
                    .push(SiEdge::ww(c, a, variable.clone()));
            }
        }
    }

    // If a precedes c, every transaction b that read a's write of the
    // conflicting variable anti-depends on c.
    for a in graph.read_from().nodes() {
        for (b, edges) in graph.read_from().successors(&a) {
            for edge in edges {
                let Edge::Wr(variable) = edge else {
                    continue;
                };
                // A variable nobody else writes has no entry; that just
                // means there is no conflicting pair to extend.
                for &c in writes.get(variable).into_iter().flatten() {
                    if c == a || c == b {
                        continue;
                    }
                    constraint_edges
                        .entry((a, c))
                        .or_default()
                        .push(SiEdge::rw(b, c, variable.clone()));
                }
            }
        }
    }

    let mut constraints = Vec::new();
    let mut added: HashSet<(TransactionId, TransactionId)> = HashSet::new();
    let mut next_id = 0;
    for writers in writes.values() {
        let writers: Vec<TransactionId> = writers.iter().copied().collect();
        for (i, &a) in writers.iter().enumerate() {
            for &c in &writers[i + 1..] {
                if added.contains(&(a, c)) || added.contains(&(c, a)) {
                    continue;
                }
                added.insert((a, c));
                constraints.push(SiConstraint {
                    edges1: constraint_edges.remove(&(a, c)).unwrap_or_default(),
                    edges2: constraint_edges.remove(&(c, a)).unwrap_or_default(),
                    write_transaction1: a,
                    write_transaction2: c,
                    id: next_id,
                });
                next_id += 1;
            }
        }
    }

    constraints
}

/// Generates one constraint per `(writer, reader, other-writer, variable)`
/// triple plus one per conflicting pair and variable. Semantically the same
/// disjunctions as the coalesced form, just not merged.
fn generate_uncoalesced<Variable, Version>(
    sessions: &[Session<Variable, Version>],
    graph: &KnownGraph<Variable>,
) -> Vec<SiConstraint<Variable>>
where
    Variable: Eq + Ord + Hash + Clone,
    Version: Eq + Hash + Clone,
{
    let writes = writes_by_variable(sessions);
    let mut constraints = Vec::new();
    let mut next_id = 0;

    for a in graph.read_from().nodes() {
        for (b, edges) in graph.read_from().successors(&a) {
            for edge in edges {
                let Edge::Wr(variable) = edge else {
                    continue;
                };
                for &c in writes.get(variable).into_iter().flatten() {
                    if c == a || c == b {
                        continue;
                    }
                    constraints.push(SiConstraint {
                        edges1: vec![
                            SiEdge::ww(a, c, variable.clone()),
                            SiEdge::rw(b, c, variable.clone()),
                        ],
                        edges2: vec![SiEdge::ww(c, a, variable.clone())],
                        write_transaction1: a,
                        write_transaction2: c,
                        id: next_id,
                    });
                    next_id += 1;
                }
            }
        }
    }

    for (&variable, writers) in &writes {
        let writers: Vec<TransactionId> = writers.iter().copied().collect();
        for (i, &a) in writers.iter().enumerate() {
            for &c in &writers[i + 1..] {
                constraints.push(SiConstraint {
                    edges1: vec![SiEdge::ww(a, c, variable.clone())],
                    edges2: vec![SiEdge::ww(c, a, variable.clone())],
                    write_transaction1: a,
                    write_transaction2: c,
                    id: next_id,
                });
                next_id += 1;
            }
        }
    }

    constraints
}

/// Generates the SI constraints of a history.
pub fn generate_constraints<Variable, Version>(
    sessions: &[Session<Variable, Version>],
    graph: &KnownGraph<Variable>,
    coalesce: bool,
) -> Vec<SiConstraint<Variable>>
where
    Variable: Eq + Ord + Hash + Clone,
    Version: Eq + Hash + Clone,
{
    let constraints = if coalesce {
        generate_coalesced(sessions, graph)
    } else {
        generate_uncoalesced(sessions, graph)
    };
    tracing::debug!(
        count = constraints.len(),
        edges = constraints
            .iter()
            .map(|c| c.edges1.len() + c.edges2.len())
            .sum::<usize>(),
        coalesce,
        "generated constraints"
    );
    constraints
}
