//! The known precedence graph derived from a history.
//!
//! Relation `A` holds the orderings that are certain (session order,
//! writes-read, plus any write-write edges proven later); relation `B`
//! holds the anti-dependencies (read-write). `read_from` is the WR-only
//! view used by the constraint generator to find the readers of a write.

use core::fmt::{self, Display, Formatter};
use core::hash::Hash;

use std::collections::{BTreeMap, BTreeSet};

use hashbrown::HashMap;

use crate::history::types::{transactions, Event, Session, TransactionId};

/// A known precedence edge, tagged with the variable that witnesses it.
/// Session-order edges carry no variable.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Edge<Variable> {
    /// Session order between consecutive transactions of one session.
    So,
    /// Writes-read: the target read the tagged variable from the source.
    Wr(Variable),
    /// Write-write: both wrote the tagged variable, source first.
    Ww(Variable),
    /// Read-write anti-dependency: the source read a version of the tagged
    /// variable that the target overwrote.
    Rw(Variable),
}

impl<Variable: Display> Display for Edge<Variable> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::So => write!(f, "SO"),
            Self::Wr(variable) => write!(f, "WR({variable})"),
            Self::Ww(variable) => write!(f, "WW({variable})"),
            Self::Rw(variable) => write!(f, "RW({variable})"),
        }
    }
}

/// Directed multigraph over transactions with `Edge` payloads.
///
/// Between two endpoints there may be several parallel edges differing by
/// type and variable; they are stored as one `Vec` per endpoint pair.
/// Adjacency is ordered so that iteration, and everything derived from it
/// (constraint ids, node bijections, verdicts), is deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepGraph<Variable> {
    adj: BTreeMap<TransactionId, BTreeMap<TransactionId, Vec<Edge<Variable>>>>,
    preds: BTreeMap<TransactionId, BTreeSet<TransactionId>>,
}

impl<Variable> Default for DepGraph<Variable> {
    fn default() -> Self {
        Self {
            adj: BTreeMap::new(),
            preds: BTreeMap::new(),
        }
    }
}

impl<Variable> DepGraph<Variable> {
    /// Adds a vertex with no edges (if not already present).
    pub fn add_vertex(&mut self, node: TransactionId) {
        self.adj.entry(node).or_default();
        self.preds.entry(node).or_default();
    }

    /// Appends one parallel edge from `source` to `target`.
    pub fn add_edge(&mut self, source: TransactionId, target: TransactionId, edge: Edge<Variable>) {
        self.add_vertex(source);
        self.add_vertex(target);
        self.adj
            .get_mut(&source)
            .expect("vertex inserted above")
            .entry(target)
            .or_default()
            .push(edge);
        self.preds
            .get_mut(&target)
            .expect("vertex inserted above")
            .insert(source);
    }

    pub fn has_edge(&self, source: &TransactionId, target: &TransactionId) -> bool {
        self.adj
            .get(source)
            .is_some_and(|neighbors| neighbors.contains_key(target))
    }

    /// The parallel edges from `source` to `target`, empty if none.
    pub fn edges_between(&self, source: &TransactionId, target: &TransactionId) -> &[Edge<Variable>] {
        self.adj
            .get(source)
            .and_then(|neighbors| neighbors.get(target))
            .map_or(&[], Vec::as_slice)
    }

    /// All vertices, in id order.
    pub fn nodes(&self) -> impl Iterator<Item = TransactionId> + '_ {
        self.adj.keys().copied()
    }

    /// Successors of `node` with their parallel edges, in id order.
    pub fn successors(
        &self,
        node: &TransactionId,
    ) -> impl Iterator<Item = (TransactionId, &Vec<Edge<Variable>>)> {
        self.adj
            .get(node)
            .into_iter()
            .flat_map(|neighbors| neighbors.iter().map(|(&target, edges)| (target, edges)))
    }

    /// Predecessors of `node`, in id order.
    pub fn predecessors(&self, node: &TransactionId) -> impl Iterator<Item = TransactionId> + '_ {
        self.preds
            .get(node)
            .into_iter()
            .flat_map(|sources| sources.iter().copied())
    }

    /// All endpoint pairs that carry at least one edge, in id order.
    pub fn edges(
        &self,
    ) -> impl Iterator<Item = (TransactionId, TransactionId, &Vec<Edge<Variable>>)> {
        self.adj.iter().flat_map(|(&source, neighbors)| {
            neighbors
                .iter()
                .map(move |(&target, edges)| (source, target, edges))
        })
    }

    /// Number of endpoint pairs carrying at least one edge.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.adj.values().map(BTreeMap::len).sum()
    }
}

/// The known precedence graph: `A` (SO, WR, and folded WW), `B` (RW), and
/// the WR-only `read_from` view.
#[derive(Debug, Clone)]
pub struct KnownGraph<Variable> {
    graph_a: DepGraph<Variable>,
    graph_b: DepGraph<Variable>,
    read_from: DepGraph<Variable>,
}

impl<Variable> KnownGraph<Variable>
where
    Variable: Eq + Hash + Clone,
{
    /// Builds the graph from a history: all transactions as vertices, one
    /// SO edge per adjacent transaction pair within a session, and one WR
    /// edge per cross-transaction read.
    pub fn new<Version>(sessions: &[Session<Variable, Version>]) -> Self
    where
        Version: Eq + Hash + Clone,
    {
        let mut graph = Self {
            graph_a: DepGraph::default(),
            graph_b: DepGraph::default(),
            read_from: DepGraph::default(),
        };

        for (id, _) in transactions(sessions) {
            graph.graph_a.add_vertex(id);
            graph.graph_b.add_vertex(id);
            graph.read_from.add_vertex(id);
        }

        // SO edges between consecutive transactions of each session.
        for (i_session, session) in sessions.iter().enumerate() {
            for i_txn in 1..session.len() {
                graph.graph_a.add_edge(
                    TransactionId::new(i_session as u64, i_txn as u64 - 1),
                    TransactionId::new(i_session as u64, i_txn as u64),
                    Edge::So,
                );
            }
        }

        // WR edges: map each written (variable, version) to its writer, then
        // connect it to every external reader.
        let mut writes: HashMap<(&Variable, &Version), TransactionId> = HashMap::new();
        for (id, txn) in transactions(sessions) {
            for event in &txn.events {
                if let Event::Write { variable, version } = event {
                    writes.insert((variable, version), id);
                }
            }
        }

        for (id, txn) in transactions(sessions) {
            for event in &txn.events {
                if let Event::Read { variable, version } = event {
                    let Some(&writer) = writes.get(&(variable, version)) else {
                        // Internal-consistency checking rejects such reads
                        // before graph construction.
                        continue;
                    };
                    if writer != id {
                        graph.put_edge(writer, id, Edge::Wr(variable.clone()));
                    }
                }
            }
        }

        graph
    }

    /// Routes an edge into the relation its type belongs to: SO/WW/WR into
    /// `A` (WR additionally into `read_from`), RW into `B`.
    pub fn put_edge(&mut self, source: TransactionId, target: TransactionId, edge: Edge<Variable>)
    where
        Variable: Clone,
    {
        match &edge {
            Edge::Wr(_) => {
                self.read_from.add_edge(source, target, edge.clone());
                self.graph_a.add_edge(source, target, edge);
            }
            Edge::So | Edge::Ww(_) => self.graph_a.add_edge(source, target, edge),
            Edge::Rw(_) => self.graph_b.add_edge(source, target, edge),
        }
    }

    #[must_use]
    pub const fn graph_a(&self) -> &DepGraph<Variable> {
        &self.graph_a
    }

    #[must_use]
    pub const fn graph_b(&self) -> &DepGraph<Variable> {
        &self.graph_b
    }

    #[must_use]
    pub const fn read_from(&self) -> &DepGraph<Variable> {
        &self.read_from
    }
}
