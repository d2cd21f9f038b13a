//! All-pairs shortest-path tables over the static network
//!
//! A table is built once by running Dijkstra from every node and is read-only
//! afterwards. Costs use the static edge weights of the chosen [`Metric`], so
//! closures or live congestion are never reflected here.

use anyhow::{Context, Result};
use log::{debug, info};
use ordered_float::OrderedFloat;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::Path;

use super::network::Network;
use super::types::{EdgeId, JunctionId, Metric};

/// Key type of the nodes a table is built over
pub trait NodeKey: Copy + Eq + std::fmt::Debug {
    fn from_index(index: usize) -> Self;
    fn to_index(self) -> usize;
}

impl NodeKey for JunctionId {
    fn from_index(index: usize) -> Self {
        JunctionId(index)
    }

    fn to_index(self) -> usize {
        self.0
    }
}

impl NodeKey for EdgeId {
    fn from_index(index: usize) -> Self {
        EdgeId(index)
    }

    fn to_index(self) -> usize {
        self.0
    }
}

/// Shortest path and its cost for one (start, end) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PathEntry<K> {
    path: Vec<K>,
    cost: f64,
}

/// Precomputed shortest paths between every pair of nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortestPathTable<K> {
    metric: Metric,
    /// `entries[start][end]`, `None` when `end` is unreachable from `start`
    entries: Vec<Vec<Option<PathEntry<K>>>>,
    max_path_cost: f64,
    max_element_cost: f64,
}

/// Paths between junctions, weighted by the connecting edges
pub type JunctionPathTable = ShortestPathTable<JunctionId>;

/// Paths between edges, where moving onto the next edge costs the current one
pub type EdgePathTable = ShortestPathTable<EdgeId>;

impl ShortestPathTable<JunctionId> {
    pub fn build(network: &Network, metric: Metric) -> Self {
        let adjacency = network
            .junctions()
            .iter()
            .map(|junction| {
                network
                    .out_edges(junction.id)
                    .map(|edge_id| {
                        let edge = network.edge(edge_id);
                        (edge.to.index(), edge.weight(metric))
                    })
                    .collect()
            })
            .collect::<Vec<Vec<_>>>();

        Self::from_adjacency(&adjacency, metric, network.max_edge_weight(metric))
    }
}

impl ShortestPathTable<EdgeId> {
    pub fn build(network: &Network, metric: Metric) -> Self {
        let adjacency = network
            .edges()
            .iter()
            .map(|edge| {
                let weight = edge.weight(metric);
                network
                    .successors(edge.id)
                    .map(|next| (next.index(), weight))
                    .collect()
            })
            .collect::<Vec<Vec<_>>>();

        Self::from_adjacency(&adjacency, metric, network.max_edge_weight(metric))
    }
}

impl<K: NodeKey> ShortestPathTable<K> {
    /// Runs Dijkstra from every node of a weighted adjacency list.
    /// Weights must be non-negative.
    pub fn from_adjacency(adjacency: &[Vec<(usize, f64)>], metric: Metric, max_element_cost: f64) -> Self {
        let node_count = adjacency.len();
        let mut entries = Vec::with_capacity(node_count);
        let mut max_path_cost: f64 = 0.0;

        for start in 0..node_count {
            let (dist, prev) = dijkstra(adjacency, start);
            let row = (0..node_count)
                .map(|end| {
                    if !dist[end].is_finite() {
                        return None;
                    }
                    max_path_cost = max_path_cost.max(dist[end]);
                    Some(PathEntry {
                        path: reconstruct(&prev, start, end),
                        cost: dist[end],
                    })
                })
                .collect::<Vec<_>>();
            entries.push(row);
            debug!("Shortest paths {} of {} completed", start + 1, node_count);
        }

        info!(
            "Built {:?} shortest-path table over {} nodes (max path cost {:.2})",
            metric, node_count, max_path_cost
        );

        Self {
            metric,
            entries,
            max_path_cost,
            max_element_cost,
        }
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn node_count(&self) -> usize {
        self.entries.len()
    }

    /// Cost of the shortest path, `f64::INFINITY` when unreachable
    pub fn cost(&self, start: K, end: K) -> f64 {
        self.entries[start.to_index()][end.to_index()]
            .as_ref()
            .map(|entry| entry.cost)
            .unwrap_or(f64::INFINITY)
    }

    /// The shortest path including both endpoints, `None` when unreachable
    pub fn path(&self, start: K, end: K) -> Option<&[K]> {
        self.entries[start.to_index()][end.to_index()]
            .as_ref()
            .map(|entry| entry.path.as_slice())
    }

    pub fn is_reachable(&self, start: K, end: K) -> bool {
        self.entries[start.to_index()][end.to_index()].is_some()
    }

    /// Largest finite path cost in the table
    pub fn max_path_cost(&self) -> f64 {
        self.max_path_cost
    }

    /// Largest single-element weight in the underlying graph
    pub fn max_element_cost(&self) -> f64 {
        self.max_element_cost
    }
}

impl<K: NodeKey + Serialize> ShortestPathTable<K> {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Couldn't serialize shortest-path table")
    }

    /// Writes the table to disk as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)
            .with_context(|| format!("Couldn't write shortest-path table {}", path.display()))
    }
}

impl<K: NodeKey + DeserializeOwned> ShortestPathTable<K> {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Malformed shortest-path table")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Couldn't read shortest-path table {}", path.display()))?;
        Self::from_json(&text)
    }
}

/// Single-source Dijkstra returning distances and predecessors
fn dijkstra(adjacency: &[Vec<(usize, f64)>], source: usize) -> (Vec<f64>, Vec<Option<usize>>) {
    let mut dist = vec![f64::INFINITY; adjacency.len()];
    let mut prev = vec![None; adjacency.len()];
    dist[source] = 0.0;

    let mut heap: BinaryHeap<Reverse<(OrderedFloat<f64>, usize)>> = BinaryHeap::new();
    heap.push(Reverse((OrderedFloat(0.0), source)));

    while let Some(Reverse((OrderedFloat(cost), node))) = heap.pop() {
        // Stale heap entry
        if cost > dist[node] {
            continue;
        }

        for &(next, weight) in &adjacency[node] {
            let new_cost = cost + weight;
            if new_cost < dist[next] {
                dist[next] = new_cost;
                prev[next] = Some(node);
                heap.push(Reverse((OrderedFloat(new_cost), next)));
            }
        }
    }

    (dist, prev)
}

/// Walks the predecessors back from `end` and reverses the result
fn reconstruct<K: NodeKey>(prev: &[Option<usize>], start: usize, end: usize) -> Vec<K> {
    let mut path = vec![K::from_index(end)];
    let mut current = end;
    while current != start {
        match prev[current] {
            Some(node) => {
                path.push(K::from_index(node));
                current = node;
            }
            None => break,
        }
    }
    path.reverse();
    path
}
