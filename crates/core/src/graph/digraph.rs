use core::fmt::Debug;

use std::collections::{BTreeMap, BTreeSet};

/// Directed graph backed by an ordered adjacency map.
///
/// Each vertex of type `T` maps to the set of its outgoing neighbors.
/// Vertices are added implicitly when they appear in an edge, or explicitly
/// via [`add_vertex`](Self::add_vertex). Self-loops are permitted.
///
/// Adjacency is kept in `BTreeMap`/`BTreeSet` so every traversal is
/// deterministic; cycle extraction feeds SAT blocking clauses, which must
/// not depend on hash iteration order.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct DiGraph<T>
where
    T: Ord + Clone + Debug,
{
    /// Maps each vertex to the set of vertices it has edges to.
    pub adj_map: BTreeMap<T, BTreeSet<T>>,
}

impl<T> DiGraph<T>
where
    T: Ord + Clone + Debug,
{
    /// Inserts a directed edge from `source` to `target`.
    ///
    /// Both vertices are added to the graph if not already present.
    pub fn add_edge(&mut self, source: T, target: T) {
        self.adj_map
            .entry(source)
            .or_default()
            .insert(target.clone());
        self.adj_map.entry(target).or_default();
    }

    /// Adds a vertex with no outgoing edges (if not already present).
    pub fn add_vertex(&mut self, source: T) {
        self.adj_map.entry(source).or_default();
    }

    /// Returns `true` if an edge from `source` to `target` exists.
    pub fn has_edge(&self, source: &T, target: &T) -> bool {
        self.adj_map
            .get(source)
            .is_some_and(|neighbors| neighbors.contains(target))
    }

    /// Detects if the graph contains a cycle using Kahn's algorithm.
    /// Time complexity: O(V+E)
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        self.topological_sort().is_none()
    }

    /// Returns a valid topological ordering of vertices if the graph is
    /// acyclic, or `None` if the graph contains a cycle.
    /// Uses Kahn's algorithm with time complexity O(V+E).
    #[must_use]
    pub fn topological_sort(&self) -> Option<Vec<T>> {
        let mut in_degree: BTreeMap<&T, usize> = BTreeMap::new();

        for vertex in self.adj_map.keys() {
            in_degree.entry(vertex).or_insert(0);
        }
        for neighbors in self.adj_map.values() {
            for neighbor in neighbors {
                *in_degree.entry(neighbor).or_insert(0) += 1;
            }
        }

        let mut queue: Vec<&T> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&vertex, _)| vertex)
            .collect();

        let mut result = Vec::new();

        while let Some(vertex) = queue.pop() {
            result.push(vertex.clone());

            if let Some(neighbors) = self.adj_map.get(vertex) {
                for neighbor in neighbors {
                    if let Some(degree) = in_degree.get_mut(neighbor) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push(neighbor);
                        }
                    }
                }
            }
        }

        (result.len() == self.adj_map.len()).then_some(result)
    }

    /// Returns the vertices of one cycle, or `None` if the graph is acyclic.
    ///
    /// The result `[n1, n2, ..., nk]` means the edges `n1 -> n2 -> ... ->
    /// nk -> n1` all exist. A self-loop yields a single-element cycle.
    /// Uses iterative DFS with three-color marking, O(V+E).
    #[must_use]
    pub fn find_cycle(&self) -> Option<Vec<T>> {
        #[derive(PartialEq)]
        enum Color {
            Gray,
            Black,
        }

        let mut colors: BTreeMap<&T, Color> = BTreeMap::new();
        // Path of gray vertices from the DFS root to the current vertex.
        let mut path: Vec<&T> = Vec::new();

        for root in self.adj_map.keys() {
            if colors.contains_key(root) {
                continue;
            }

            // Stack entries: (vertex, whether we are entering or leaving).
            let mut stack: Vec<(&T, bool)> = vec![(root, true)];
            while let Some((vertex, entering)) = stack.pop() {
                if !entering {
                    colors.insert(vertex, Color::Black);
                    path.pop();
                    continue;
                }
                if colors.contains_key(vertex) {
                    continue;
                }
                colors.insert(vertex, Color::Gray);
                path.push(vertex);
                stack.push((vertex, false));
                if let Some(neighbors) = self.adj_map.get(vertex) {
                    for neighbor in neighbors.iter().rev() {
                        match colors.get(neighbor) {
                            Some(Color::Black) => {}
                            Some(Color::Gray) => {
                                // Back edge: the cycle is the path suffix
                                // starting at `neighbor`.
                                let start = path.iter().position(|&p| p == neighbor)?;
                                return Some(path[start..].iter().map(|&p| p.clone()).collect());
                            }
                            None => stack.push((neighbor, true)),
                        }
                    }
                }
            }
        }

        None
    }
}
