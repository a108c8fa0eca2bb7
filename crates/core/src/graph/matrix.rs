//! Dense-row bitmap graph for reachability computations.
//!
//! A `MatrixGraph` fixes its node set at construction: nodes are mapped to
//! `0..n` through a shared bijection, and the edges out of node `i` are one
//! roaring bitmap. Composition, union, and transitive closure are then
//! row-wise bitmap operations. When the input is acyclic the bijection is a
//! topological order, so closure reduces to one reverse sweep.

use core::fmt::Debug;
use core::hash::Hash;

use std::sync::Arc;

use hashbrown::HashMap;
use rayon::prelude::*;
use roaring::RoaringBitmap;

/// Immutable node-to-index bijection shared between related graphs.
///
/// Row-wise operations on two graphs are only meaningful when both use the
/// same bijection, so derived graphs hold an `Arc` to their parent's map.
#[derive(Debug)]
pub struct NodeMap<T> {
    order: Vec<T>,
    index: HashMap<T, u32>,
}

impl<T> NodeMap<T>
where
    T: Eq + Hash + Clone,
{
    fn from_order(order: Vec<T>) -> Self {
        let index = order
            .iter()
            .enumerate()
            .map(|(i, node)| (node.clone(), i as u32))
            .collect();
        Self { order, index }
    }

    pub fn index_of(&self, node: &T) -> Option<u32> {
        self.index.get(node).copied()
    }

    pub fn node(&self, index: u32) -> &T {
        &self.order[index as usize]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Directed graph with a fixed node set and bitmap rows of successors.
#[derive(Debug, Clone)]
pub struct MatrixGraph<T> {
    node_map: Arc<NodeMap<T>>,
    rows: Vec<RoaringBitmap>,
}

impl<T> PartialEq for MatrixGraph<T>
where
    T: Eq + Hash + Clone,
{
    fn eq(&self, other: &Self) -> bool {
        self.node_map.order == other.node_map.order && self.rows == other.rows
    }
}

impl<T> MatrixGraph<T>
where
    T: Eq + Hash + Ord + Clone + Debug + Send + Sync,
{
    /// Builds a graph from explicit nodes and edges.
    ///
    /// If the edge relation is acyclic the node bijection is a topological
    /// order, so that every edge goes from a lower to a higher index;
    /// otherwise the given node order is kept.
    pub fn new(nodes: Vec<T>, edges: &[(T, T)]) -> Self {
        let order = topological_order(&nodes, edges).unwrap_or(nodes);
        let node_map = Arc::new(NodeMap::from_order(order));
        Self::with_node_map(node_map, edges)
    }

    /// Builds a graph over an existing bijection.
    ///
    /// # Panics
    ///
    /// Panics if an edge endpoint is not in the bijection.
    pub fn with_node_map(node_map: Arc<NodeMap<T>>, edges: &[(T, T)]) -> Self {
        let mut graph = Self::of_nodes(node_map);
        for (source, target) in edges {
            graph.put_edge(source, target);
        }
        graph
    }

    /// An edgeless graph sharing `node_map`.
    pub fn of_nodes(node_map: Arc<NodeMap<T>>) -> Self {
        let rows = vec![RoaringBitmap::new(); node_map.len()];
        Self { node_map, rows }
    }

    #[must_use]
    pub fn node_map(&self) -> &Arc<NodeMap<T>> {
        &self.node_map
    }

    pub fn nodes(&self) -> impl Iterator<Item = &T> {
        self.node_map.order.iter()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_map.len()
    }

    pub fn put_edge(&mut self, source: &T, target: &T) {
        let i = self.index_of(source);
        let j = self.index_of(target);
        self.rows[i as usize].insert(j);
    }

    pub fn has_edge(&self, source: &T, target: &T) -> bool {
        self.rows[self.index_of(source) as usize].contains(self.index_of(target))
    }

    fn index_of(&self, node: &T) -> u32 {
        self.node_map
            .index_of(node)
            .unwrap_or_else(|| panic!("node {node:?} not in the bijection"))
    }

    /// All edges as endpoint pairs, in row-major index order.
    pub fn edges(&self) -> impl Iterator<Item = (&T, &T)> {
        self.rows.iter().enumerate().flat_map(move |(i, row)| {
            row.iter()
                .map(move |j| (self.node_map.node(i as u32), self.node_map.node(j)))
        })
    }

    /// Successors of `node` in index order.
    pub fn successors<'a>(&'a self, node: &T) -> impl Iterator<Item = &'a T> {
        self.rows[self.index_of(node) as usize]
            .iter()
            .map(move |j| self.node_map.node(j))
    }

    /// Total number of edges.
    #[must_use]
    pub fn edge_count(&self) -> u64 {
        self.rows.iter().map(RoaringBitmap::len).sum()
    }

    /// Relational composition: `result[i] = union of other[j] for j in self[i]`.
    ///
    /// Both graphs must share the node bijection. Operands are not mutated.
    #[must_use]
    pub fn composition(&self, other: &Self) -> Self {
        debug_assert!(Arc::ptr_eq(&self.node_map, &other.node_map));

        let rows = self
            .rows
            .par_iter()
            .map(|row| {
                let mut out = RoaringBitmap::new();
                for j in row {
                    out |= &other.rows[j as usize];
                }
                out
            })
            .collect();

        Self {
            node_map: Arc::clone(&self.node_map),
            rows,
        }
    }

    /// Row-wise union. Both graphs must share the node bijection.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        debug_assert!(Arc::ptr_eq(&self.node_map, &other.node_map));

        let rows = self
            .rows
            .par_iter()
            .zip(other.rows.par_iter())
            .map(|(a, b)| a | b)
            .collect();

        Self {
            node_map: Arc::clone(&self.node_map),
            rows,
        }
    }

    /// Kahn's algorithm over the rows; `None` if the graph has a cycle.
    fn topo_sort_ids(&self) -> Option<Vec<u32>> {
        let n = self.rows.len();
        let mut in_degrees = vec![0u32; n];
        for row in &self.rows {
            for j in row {
                in_degrees[j as usize] += 1;
            }
        }

        let mut order: Vec<u32> = (0..n as u32)
            .filter(|&i| in_degrees[i as usize] == 0)
            .collect();

        let mut head = 0;
        while head < order.len() {
            let i = order[head];
            head += 1;
            for j in &self.rows[i as usize] {
                in_degrees[j as usize] -= 1;
                if in_degrees[j as usize] == 0 {
                    order.push(j);
                }
            }
        }

        (order.len() == n).then_some(order)
    }

    /// `true` iff no topological order exists.
    #[must_use]
    pub fn has_loops(&self) -> bool {
        self.topo_sort_ids().is_none()
    }

    /// Reflexive transitive closure.
    ///
    /// With a topological order this is one reverse sweep: the closure row
    /// of a node is its successors plus the union of their closure rows.
    /// Cyclic graphs fall back to per-node BFS. Self-loops are added for
    /// every node either way.
    #[must_use]
    pub fn reachability(&self) -> Self {
        let mut result = match self.topo_sort_ids() {
            Some(order) => self.closure_along(&order),
            None => self.closure_bfs(),
        };
        for (i, row) in result.rows.iter_mut().enumerate() {
            row.insert(i as u32);
        }
        result
    }

    fn closure_along(&self, topo_order: &[u32]) -> Self {
        let mut result = Self::of_nodes(Arc::clone(&self.node_map));
        for &i in topo_order.iter().rev() {
            let mut row = RoaringBitmap::new();
            for j in &self.rows[i as usize] {
                row.insert(j);
                row |= &result.rows[j as usize];
            }
            result.rows[i as usize] = row;
        }
        result
    }

    fn closure_bfs(&self) -> Self {
        let rows: Vec<RoaringBitmap> = (0..self.rows.len() as u32)
            .into_par_iter()
            .map(|i| {
                let mut reachable = RoaringBitmap::new();
                let mut queue = vec![i];
                while let Some(j) = queue.pop() {
                    for k in &self.rows[j as usize] {
                        if reachable.insert(k) {
                            queue.push(k);
                        }
                    }
                }
                reachable
            })
            .collect();

        Self {
            node_map: Arc::clone(&self.node_map),
            rows,
        }
    }

    /// Returns the nodes of one cycle (`[n1, ..., nk]` meaning
    /// `n1 -> ... -> nk -> n1`), or `None` if the graph is acyclic.
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<T>> {
        const WHITE: u8 = 0;
        const GRAY: u8 = 1;
        const BLACK: u8 = 2;

        let n = self.rows.len();
        let mut colors = vec![WHITE; n];
        let mut path: Vec<u32> = Vec::new();

        for root in 0..n as u32 {
            if colors[root as usize] != WHITE {
                continue;
            }
            let mut stack: Vec<(u32, bool)> = vec![(root, true)];
            while let Some((i, entering)) = stack.pop() {
                if !entering {
                    colors[i as usize] = BLACK;
                    path.pop();
                    continue;
                }
                if colors[i as usize] != WHITE {
                    continue;
                }
                colors[i as usize] = GRAY;
                path.push(i);
                stack.push((i, false));
                for j in &self.rows[i as usize] {
                    match colors[j as usize] {
                        BLACK => {}
                        GRAY => {
                            let start = path.iter().position(|&p| p == j)?;
                            return Some(
                                path[start..]
                                    .iter()
                                    .map(|&p| self.node_map.node(p).clone())
                                    .collect(),
                            );
                        }
                        _ => stack.push((j, true)),
                    }
                }
            }
        }

        None
    }
}

/// Kahn's algorithm over explicit node and edge lists; `None` on a cycle.
/// Deterministic: seeds in node-list order, neighbors in edge-list order.
fn topological_order<T>(nodes: &[T], edges: &[(T, T)]) -> Option<Vec<T>>
where
    T: Eq + Hash + Clone,
{
    let mut in_degrees: HashMap<&T, usize> = nodes.iter().map(|n| (n, 0)).collect();
    let mut successors: HashMap<&T, Vec<&T>> = HashMap::new();
    for (source, target) in edges {
        *in_degrees.get_mut(target)? += 1;
        successors.entry(source).or_default().push(target);
    }

    let mut order: Vec<&T> = nodes
        .iter()
        .filter(|&n| in_degrees.get(n) == Some(&0))
        .collect();

    let mut head = 0;
    while head < order.len() {
        let node = order[head];
        head += 1;
        for &next in successors.get(node).into_iter().flatten() {
            let degree = in_degrees.get_mut(&next).expect("all endpoints are nodes");
            *degree -= 1;
            if *degree == 0 {
                order.push(next);
            }
        }
    }

    (order.len() == nodes.len()).then(|| order.into_iter().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(nodes: &[u32], edges: &[(u32, u32)]) -> MatrixGraph<u32> {
        MatrixGraph::new(nodes.to_vec(), edges)
    }

    #[test]
    fn acyclic_construction_orders_topologically() {
        let g = graph(&[3, 1, 2], &[(1, 2), (2, 3)]);
        let i1 = g.node_map().index_of(&1).unwrap();
        let i2 = g.node_map().index_of(&2).unwrap();
        let i3 = g.node_map().index_of(&3).unwrap();
        assert!(i1 < i2 && i2 < i3);
    }

    #[test]
    fn edge_queries() {
        let g = graph(&[1, 2, 3], &[(1, 2), (2, 3)]);
        assert!(g.has_edge(&1, &2));
        assert!(!g.has_edge(&1, &3));
        assert_eq!(g.edge_count(), 2);
    }

    #[test]
    fn reachability_is_reflexive_transitive_closure() {
        let g = graph(&[1, 2, 3, 4], &[(1, 2), (2, 3), (3, 4)]);
        let r = g.reachability();
        for n in [1, 2, 3, 4] {
            assert!(r.has_edge(&n, &n), "missing self-loop on {n}");
        }
        assert!(r.has_edge(&1, &3));
        assert!(r.has_edge(&1, &4));
        assert!(r.has_edge(&2, &4));
        assert!(!r.has_edge(&4, &1));
    }

    #[test]
    fn reachability_with_cycle_falls_back_to_bfs() {
        let g = graph(&[1, 2, 3], &[(1, 2), (2, 3), (3, 1)]);
        let r = g.reachability();
        for a in [1, 2, 3] {
            for b in [1, 2, 3] {
                assert!(r.has_edge(&a, &b), "missing {a} ~> {b}");
            }
        }
    }

    #[test]
    fn union_is_idempotent_for_reachability() {
        let g = graph(&[1, 2, 3], &[(1, 2), (2, 3)]);
        assert_eq!(g.union(&g).reachability(), g.reachability());
    }

    #[test]
    fn composition_with_identity_is_identity() {
        let g = graph(&[1, 2, 3], &[(1, 2), (2, 3)]);
        let mut identity = MatrixGraph::of_nodes(Arc::clone(g.node_map()));
        for n in [1, 2, 3] {
            identity.put_edge(&n, &n);
        }
        assert_eq!(g.composition(&identity), g);
    }

    #[test]
    fn composition_chains_relations() {
        let a = graph(&[1, 2, 3], &[(1, 2)]);
        let b = MatrixGraph::with_node_map(Arc::clone(a.node_map()), &[(2, 3)]);
        let c = a.composition(&b);
        assert!(c.has_edge(&1, &3));
        assert_eq!(c.edge_count(), 1);
        // Operands unchanged.
        assert!(!a.has_edge(&1, &3));
        assert!(b.has_edge(&2, &3));
    }

    #[test]
    fn has_loops_detects_cycles() {
        assert!(!graph(&[1, 2], &[(1, 2)]).has_loops());
        assert!(graph(&[1, 2], &[(1, 2), (2, 1)]).has_loops());
        // A self-loop counts.
        assert!(graph(&[1], &[(1, 1)]).has_loops());
    }

    #[test]
    fn find_cycle_returns_real_edges() {
        let g = graph(&[1, 2, 3, 4], &[(1, 2), (2, 3), (3, 2), (3, 4)]);
        let cycle = g.find_cycle().unwrap();
        assert_eq!(cycle.len(), 2);
        for (i, n) in cycle.iter().enumerate() {
            let next = &cycle[(i + 1) % cycle.len()];
            assert!(g.has_edge(n, next));
        }
    }

    #[test]
    fn find_cycle_none_when_acyclic() {
        assert!(graph(&[1, 2, 3], &[(1, 2), (2, 3)]).find_cycle().is_none());
    }

    #[test]
    fn empty_graph_is_trivial() {
        let g: MatrixGraph<u32> = graph(&[], &[]);
        assert!(!g.has_loops());
        assert_eq!(g.reachability().edge_count(), 0);
        assert!(g.find_cycle().is_none());
    }
}
