//! Immutable undirected graphs with a stable name/index bijection.
//!
//! Parsing network files is left to callers; graphs are built from a node
//! name list and an edge list of indices.

use crate::error::{AlignError, Result};
use std::collections::HashMap;

/// An undirected simple graph.
///
/// Node indices are contiguous `0..n`. Self loops and duplicate edges in the
/// input are dropped. Adjacency lists are sorted so [`Graph::has_edge`] is a
/// binary search.
#[derive(Debug, Clone)]
pub struct Graph {
    name: String,
    node_names: Vec<String>,
    index_by_name: HashMap<String, usize>,
    adjacency: Vec<Vec<usize>>,
    num_edges: usize,
}

impl Graph {
    /// Builds a graph from node names and index pairs.
    ///
    /// Fails with [`AlignError::Configuration`] on duplicate node names or
    /// out-of-range edge endpoints.
    pub fn new(
        name: impl Into<String>,
        node_names: Vec<String>,
        edges: &[(usize, usize)],
    ) -> Result<Self> {
        let name = name.into();
        let n = node_names.len();

        let mut index_by_name = HashMap::with_capacity(n);
        for (i, node) in node_names.iter().enumerate() {
            if index_by_name.insert(node.clone(), i).is_some() {
                return Err(AlignError::Configuration(format!(
                    "graph `{name}`: duplicate node name `{node}`"
                )));
            }
        }

        let mut adjacency = vec![Vec::new(); n];
        for &(a, b) in edges {
            if a >= n || b >= n {
                return Err(AlignError::Configuration(format!(
                    "graph `{name}`: edge ({a}, {b}) out of range for {n} nodes"
                )));
            }
            if a == b {
                continue;
            }
            adjacency[a].push(b);
            adjacency[b].push(a);
        }

        let mut num_edges = 0;
        for list in &mut adjacency {
            list.sort_unstable();
            list.dedup();
            num_edges += list.len();
        }

        Ok(Self {
            name,
            node_names,
            index_by_name,
            adjacency,
            num_edges: num_edges / 2,
        })
    }

    /// Builds a graph from name pairs, creating nodes in first-seen order.
    pub fn from_named_edges(name: impl Into<String>, edges: &[(&str, &str)]) -> Result<Self> {
        let mut names: Vec<String> = Vec::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut indexed = Vec::with_capacity(edges.len());
        for &(a, b) in edges {
            let mut pair = [0usize; 2];
            for (slot, node) in pair.iter_mut().zip([a, b]) {
                *slot = match seen.get(node) {
                    Some(&i) => i,
                    None => {
                        names.push(node.to_string());
                        seen.insert(node.to_string(), names.len() - 1);
                        names.len() - 1
                    }
                };
            }
            indexed.push((pair[0], pair[1]));
        }
        Self::new(name, names, &indexed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_nodes(&self) -> usize {
        self.node_names.len()
    }

    pub fn num_edges(&self) -> usize {
        self.num_edges
    }

    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.index_by_name.get(name).copied()
    }

    pub fn node_name(&self, index: usize) -> &str {
        &self.node_names[index]
    }

    pub fn node_names(&self) -> &[String] {
        &self.node_names
    }

    pub fn neighbors(&self, node: usize) -> &[usize] {
        &self.adjacency[node]
    }

    pub fn degree(&self, node: usize) -> usize {
        self.adjacency[node].len()
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        let (short, other) = if self.adjacency[a].len() <= self.adjacency[b].len() {
            (&self.adjacency[a], b)
        } else {
            (&self.adjacency[b], a)
        };
        short.binary_search(&other).is_ok()
    }

    /// Iterates each undirected edge once as `(a, b)` with `a < b`.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.adjacency
            .iter()
            .enumerate()
            .flat_map(|(a, list)| list.iter().filter(move |&&b| a < b).map(move |&b| (a, b)))
    }
}

/// The two networks being aligned.
///
/// G1 must not be larger than G2, so every G1 node can receive a distinct
/// image.
#[derive(Debug, Clone)]
pub struct GraphPair {
    g1: Graph,
    g2: Graph,
}

impl GraphPair {
    pub fn new(g1: Graph, g2: Graph) -> Result<Self> {
        if g1.num_nodes() > g2.num_nodes() {
            return Err(AlignError::Configuration(format!(
                "G1 `{}` has {} nodes but G2 `{}` only has {}",
                g1.name(),
                g1.num_nodes(),
                g2.name(),
                g2.num_nodes()
            )));
        }
        Ok(Self { g1, g2 })
    }

    pub fn g1(&self) -> &Graph {
        &self.g1
    }

    pub fn g2(&self) -> &Graph {
        &self.g2
    }

    pub fn n1(&self) -> usize {
        self.g1.num_nodes()
    }

    pub fn n2(&self) -> usize {
        self.g2.num_nodes()
    }
}
