//! Bounded breadth-first traversal, shortest paths, and node text search.
//!
//! All walks track a visited set (the graph may grow cycles as edge types are
//! added) and follow edges in either direction, so a CWE node reaches the
//! findings pointing at it just as a finding reaches its CWE.

use super::{Direction, EdgeKey, EdgeType, KnowledgeGraph, NodeType};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Hard cap on nodes visited per traversal unless the caller overrides it.
pub const DEFAULT_NODE_CAP: usize = 10_000;

/// Default depth bound for [`KnowledgeGraph::find_path`].
pub const DEFAULT_PATH_DEPTH: usize = 10;

/// One node discovered during a traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: String,
    pub node_type: NodeType,
    /// BFS distance from the start node.
    pub depth: usize,
}

/// Result of a bounded BFS walk. `order` is discovery order; `truncated` is
/// set when the node-visit cap stopped the walk before exhausting reachable
/// nodes, so an incomplete result is always visible to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traversal {
    pub order: Vec<NodeRecord>,
    pub truncated: bool,
}

impl Traversal {
    fn empty() -> Self {
        Self {
            order: Vec::new(),
            truncated: false,
        }
    }

    /// Discovered node IDs in visit order.
    pub fn ids(&self) -> Vec<&str> {
        self.order.iter().map(|r| r.id.as_str()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.order.iter().any(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl KnowledgeGraph {
    /// Breadth-first walk from `start`, bounded by `max_depth` and the
    /// default node-visit cap. `edge_types` is an allow-list; `None` follows
    /// every edge type. An absent start ID yields an empty result.
    pub fn traverse(
        &self,
        start: &str,
        max_depth: usize,
        edge_types: Option<&[EdgeType]>,
    ) -> Traversal {
        self.traverse_capped(start, max_depth, edge_types, DEFAULT_NODE_CAP)
    }

    /// [`Self::traverse`] with an explicit node-visit cap. Reaching the cap
    /// truncates the result and sets `truncated`.
    pub fn traverse_capped(
        &self,
        start: &str,
        max_depth: usize,
        edge_types: Option<&[EdgeType]>,
        node_cap: usize,
    ) -> Traversal {
        let Some(start_node) = self.node(start) else {
            return Traversal::empty();
        };
        let mut result = Traversal::empty();
        if node_cap == 0 {
            result.truncated = true;
            return result;
        }

        let mut visited = rustc_hash::FxHashSet::default();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        visited.insert(start.to_string());
        queue.push_back((start.to_string(), 0));
        result.order.push(NodeRecord {
            id: start.to_string(),
            node_type: start_node.node_type,
            depth: 0,
        });

        while let Some((id, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for (neighbor, _) in self.undirected_neighbors(&id, edge_types) {
                if visited.contains(&neighbor) {
                    continue;
                }
                if result.order.len() >= node_cap {
                    result.truncated = true;
                    return result;
                }
                visited.insert(neighbor.clone());
                let node_type = match self.node(&neighbor) {
                    Some(node) => node.node_type,
                    None => continue,
                };
                result.order.push(NodeRecord {
                    id: neighbor.clone(),
                    node_type,
                    depth: depth + 1,
                });
                queue.push_back((neighbor, depth + 1));
            }
        }
        result
    }

    /// BFS shortest path (by edge count) between two nodes, following edges
    /// in either direction. `find_path(x, x)` is the trivial zero-length
    /// path `[x]`. Returns `None` when either ID is absent, the nodes are in
    /// disconnected components, or no path exists within `DEFAULT_PATH_DEPTH`.
    pub fn find_path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        self.find_path_within(from, to, DEFAULT_PATH_DEPTH, None)
    }

    /// [`Self::find_path`] with an explicit depth bound and optional
    /// edge-type allow-list.
    pub fn find_path_within(
        &self,
        from: &str,
        to: &str,
        max_depth: usize,
        edge_types: Option<&[EdgeType]>,
    ) -> Option<Vec<String>> {
        if !self.contains_node(from) || !self.contains_node(to) {
            return None;
        }
        if from == to {
            return Some(vec![from.to_string()]);
        }

        let mut predecessor: rustc_hash::FxHashMap<String, String> = Default::default();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        predecessor.insert(from.to_string(), String::new());
        queue.push_back((from.to_string(), 0));

        while let Some((id, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for (neighbor, _) in self.undirected_neighbors(&id, edge_types) {
                if predecessor.contains_key(&neighbor) {
                    continue;
                }
                predecessor.insert(neighbor.clone(), id.clone());
                if neighbor == to {
                    let mut path = vec![neighbor];
                    let mut current = id.clone();
                    while !current.is_empty() {
                        path.push(current.clone());
                        current = predecessor.get(&current).cloned().unwrap_or_default();
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back((neighbor, depth + 1));
            }
        }
        None
    }

    /// Case-insensitive substring search over node names and descriptions.
    ///
    /// Ranked for deterministic output: exact ID matches first, then matches
    /// by position within the name, then description-only matches; ties break
    /// on node ID.
    pub fn find_nodes_by_query(&self, text: &str) -> Vec<String> {
        let needle = text.to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        // (rank, position, id); lower sorts first.
        let mut hits: Vec<(u8, usize, String)> = Vec::new();
        for (id, node) in self.nodes() {
            if id.to_lowercase() == needle {
                hits.push((0, 0, id.clone()));
                continue;
            }
            let name_pos = node
                .attr_str("name")
                .and_then(|name| name.to_lowercase().find(&needle));
            if let Some(pos) = name_pos {
                hits.push((1, pos, id.clone()));
                continue;
            }
            let in_description = node
                .attr_str("description")
                .map(|d| d.to_lowercase().contains(&needle))
                .unwrap_or(false);
            if in_description || id.to_lowercase().contains(&needle) {
                hits.push((2, 0, id.clone()));
            }
        }
        hits.sort();
        hits.into_iter().map(|(_, _, id)| id).collect()
    }

    /// Neighbors over outgoing then incoming edges, each list in insertion
    /// order, so BFS tie-breaking is reproducible.
    fn undirected_neighbors(
        &self,
        id: &str,
        edge_types: Option<&[EdgeType]>,
    ) -> Vec<(String, Direction)> {
        let allowed = |key: &EdgeKey| edge_types.map_or(true, |ets| ets.contains(&key.edge_type));
        let mut neighbors = Vec::new();
        for key in self.edge_keys_out(id) {
            if allowed(key) {
                neighbors.push((key.to.clone(), Direction::Outgoing));
            }
        }
        for key in self.edge_keys_in(id) {
            if allowed(key) {
                neighbors.push((key.from.clone(), Direction::Incoming));
            }
        }
        neighbors
    }
}
