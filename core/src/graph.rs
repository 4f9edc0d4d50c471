//! Point-in-time graph snapshot and component analysis.
//!
//! Detectors only ever see a `GraphSnapshot` — an immutable copy of the
//! edge table taken at phase start. Concurrent ingestion during a pipeline
//! run lands in the next snapshot, never this one.
//!
//! Everything here iterates in sorted order (BTree collections, sorted edge
//! loads) so that component discovery and feature computation are
//! order-independent: re-running detection over an identical snapshot must
//! reproduce identical clusters and identical scores.

use crate::signal::EdgeType;
use crate::types::{Timestamp, UserId};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// One materialized edge from the store.
#[derive(Debug, Clone)]
pub struct EdgeRecord {
    pub user_a: UserId,
    pub user_b: UserId,
    pub edge_type: EdgeType,
    pub weight: f64,
    pub last_reinforced_at: Timestamp,
}

/// Read-only snapshot of the full graph, including weak edges.
/// The ring isolation score needs weak edges in its denominator, so the
/// snapshot carries everything and detectors filter by weight themselves.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    edges: Vec<EdgeRecord>,
    nodes: BTreeSet<UserId>,
}

impl GraphSnapshot {
    pub fn new(mut edges: Vec<EdgeRecord>) -> Self {
        edges.sort_by(|x, y| {
            (&x.user_a, &x.user_b, x.edge_type).cmp(&(&y.user_a, &y.user_b, y.edge_type))
        });
        let mut nodes = BTreeSet::new();
        for edge in &edges {
            nodes.insert(edge.user_a.clone());
            nodes.insert(edge.user_b.clone());
        }
        Self { edges, nodes }
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> &[EdgeRecord] {
        &self.edges
    }

    /// Undirected adjacency restricted to edges at or above `min_weight`.
    pub fn adjacency_above(&self, min_weight: f64) -> BTreeMap<UserId, BTreeSet<UserId>> {
        let mut adjacency: BTreeMap<UserId, BTreeSet<UserId>> = BTreeMap::new();
        for edge in &self.edges {
            if edge.weight >= min_weight {
                adjacency
                    .entry(edge.user_a.clone())
                    .or_default()
                    .insert(edge.user_b.clone());
                adjacency
                    .entry(edge.user_b.clone())
                    .or_default()
                    .insert(edge.user_a.clone());
            }
        }
        adjacency
    }

    /// Edges with both endpoints inside `members`, any weight.
    pub fn edges_within(&self, members: &BTreeSet<UserId>) -> Vec<&EdgeRecord> {
        self.edges
            .iter()
            .filter(|e| members.contains(&e.user_a) && members.contains(&e.user_b))
            .collect()
    }

    /// Count of edges touching any member, including weak external ones.
    pub fn edge_count_touching(&self, members: &BTreeSet<UserId>) -> usize {
        self.edges
            .iter()
            .filter(|e| members.contains(&e.user_a) || members.contains(&e.user_b))
            .count()
    }

    /// Strongest edge of any type between a pair, if one exists.
    pub fn max_weight_between(&self, a: &str, b: &str) -> Option<f64> {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        self.edges
            .iter()
            .filter(|e| e.user_a == lo && e.user_b == hi)
            .map(|e| e.weight)
            .fold(None, |acc, w| Some(acc.map_or(w, |m: f64| m.max(w))))
    }
}

/// Connected components over a prebuilt adjacency map, BFS from each
/// unvisited node in sorted order. Members come back sorted, components
/// ordered by their smallest member. Components below `min_size` are
/// discarded.
pub fn connected_components(
    adjacency: &BTreeMap<UserId, BTreeSet<UserId>>,
    min_size: usize,
) -> Vec<Vec<UserId>> {
    let mut visited: BTreeSet<&str> = BTreeSet::new();
    let mut components = Vec::new();

    for start in adjacency.keys() {
        if visited.contains(start.as_str()) {
            continue;
        }
        let mut members: Vec<UserId> = Vec::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(start.as_str());
        visited.insert(start.as_str());

        while let Some(node) = queue.pop_front() {
            members.push(node.to_string());
            if let Some(neighbors) = adjacency.get(node) {
                for next in neighbors {
                    if visited.insert(next.as_str()) {
                        queue.push_back(next.as_str());
                    }
                }
            }
        }

        if members.len() >= min_size {
            members.sort();
            components.push(members);
        }
    }

    components
}
