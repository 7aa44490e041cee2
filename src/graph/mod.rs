//! Typed directed multigraph linking findings to taxonomy and project nodes.
//!
//! Plain adjacency lists over hash maps: node ID -> node, edge key
//! `(from, to, type)` -> attrs. Per-node edge lists keep insertion order so
//! traversals are reproducible. The graph is always rebuildable by replaying
//! stored findings, so nothing here touches disk.

mod traversal;

pub use traversal::{NodeRecord, Traversal, DEFAULT_NODE_CAP, DEFAULT_PATH_DEPTH};

use crate::error::{GraphError, Result};
use crate::finding::{Finding, MetaValue};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Kind of node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Finding,
    Cwe,
    Owasp,
    Project,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Finding => "finding",
            NodeType::Cwe => "cwe",
            NodeType::Owasp => "owasp",
            NodeType::Project => "project",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of edge. The same node pair may carry several edge types; duplicates
/// of one type collapse into a single edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Finding -> CWE.
    InstanceOf,
    /// CWE -> OWASP category.
    CategorizedAs,
    /// Finding -> Project.
    FoundIn,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::InstanceOf => "instance_of",
            EdgeType::CategorizedAs => "categorized_as",
            EdgeType::FoundIn => "found_in",
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which edges `get_neighbors` follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Outgoing,
    Incoming,
}

/// Attribute map attached to nodes and edges.
pub type Attrs = BTreeMap<String, MetaValue>;

/// A node: its type plus an open attribute map.
#[derive(Debug, Clone)]
pub struct Node {
    pub node_type: NodeType,
    pub attrs: Attrs,
}

impl Node {
    /// String attribute accessor; `None` when absent or non-string.
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(MetaValue::as_str)
    }
}

/// Identity of one edge: endpoints plus type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub from: String,
    pub to: String,
    pub edge_type: EdgeType,
}

/// Node/edge totals, broken down by node type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub node_type_counts: BTreeMap<String, usize>,
}

/// In-memory knowledge graph over findings, CWE/OWASP taxonomy, and projects.
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    nodes: FxHashMap<String, Node>,
    edges: FxHashMap<EdgeKey, Attrs>,
    /// Insertion-ordered outgoing edge keys per node.
    outgoing: FxHashMap<String, Vec<EdgeKey>>,
    /// Insertion-ordered incoming edge keys per node.
    incoming: FxHashMap<String, Vec<EdgeKey>>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent node upsert. Merges `attrs` into any existing node without
    /// clobbering unspecified keys. Returns `true` if the node was created.
    ///
    /// Re-using an ID under a different node type is an ingestion bug and is
    /// rejected with [`GraphError::TypeMismatch`].
    pub fn add_node(&mut self, id: impl Into<String>, node_type: NodeType, attrs: Attrs) -> Result<bool> {
        let id = id.into();
        match self.nodes.get_mut(&id) {
            Some(node) => {
                if node.node_type != node_type {
                    return Err(GraphError::TypeMismatch {
                        id,
                        existing: node.node_type.as_str().to_string(),
                        requested: node_type.as_str().to_string(),
                    });
                }
                node.attrs.extend(attrs);
                Ok(false)
            }
            None => {
                debug!(id = %id, node_type = %node_type, "graph: add node");
                self.nodes.insert(id, Node { node_type, attrs });
                Ok(true)
            }
        }
    }

    /// Idempotent edge upsert keyed by `(from, to, type)`. Duplicate keys
    /// collapse (attrs merge). Fails fast with
    /// [`GraphError::MissingReference`] when either endpoint is absent; the
    /// graph is left unchanged in that case.
    pub fn add_edge(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        edge_type: EdgeType,
        attrs: Attrs,
    ) -> Result<bool> {
        let from = from.into();
        let to = to.into();
        for endpoint in [&from, &to] {
            if !self.nodes.contains_key(endpoint.as_str()) {
                return Err(GraphError::missing_reference(
                    from.clone(),
                    to.clone(),
                    edge_type.as_str(),
                    endpoint.clone(),
                ));
            }
        }
        let key = EdgeKey {
            from: from.clone(),
            to: to.clone(),
            edge_type,
        };
        match self.edges.get_mut(&key) {
            Some(existing) => {
                existing.extend(attrs);
                Ok(false)
            }
            None => {
                debug!(from = %from, to = %to, edge_type = %edge_type, "graph: add edge");
                self.outgoing.entry(from).or_default().push(key.clone());
                self.incoming.entry(to).or_default().push(key.clone());
                self.edges.insert(key, attrs);
                Ok(true)
            }
        }
    }

    /// Ingest one canonical finding: upserts the finding node, lazily creates
    /// its project node and (placeholder-named) CWE node when absent, then
    /// links `found_in` and `instance_of` edges.
    ///
    /// Project identity is safe to auto-create; taxonomy nodes created here
    /// get a placeholder name until seed data fills them in.
    pub fn ingest_finding(&mut self, finding: &Finding) -> Result<()> {
        let mut attrs = Attrs::new();
        attrs.insert("title".into(), finding.title.clone().into());
        attrs.insert("tool".into(), finding.tool.clone().into());
        attrs.insert("severity".into(), finding.severity.as_str().into());
        attrs.insert("type".into(), finding.finding_type.as_str().into());
        attrs.insert("artifact".into(), finding.artifact.clone().into());
        // Status is externally driven (open -> resolved); a replayed scan run
        // must not reset it on a node that already exists.
        if !self.nodes.contains_key(&finding.id) {
            attrs.insert("status".into(), finding.status.as_str().into());
        }
        self.add_node(finding.id.clone(), NodeType::Finding, attrs)?;

        if !self.nodes.contains_key(&finding.project_id) {
            let mut attrs = Attrs::new();
            attrs.insert("name".into(), finding.project_id.clone().into());
            self.add_node(finding.project_id.clone(), NodeType::Project, attrs)?;
        }
        self.add_edge(
            finding.id.clone(),
            finding.project_id.clone(),
            EdgeType::FoundIn,
            Attrs::new(),
        )?;

        if let Some(cwe) = finding.cwe() {
            if !self.nodes.contains_key(cwe) {
                let mut attrs = Attrs::new();
                attrs.insert("name".into(), cwe.into());
                self.add_node(cwe.to_string(), NodeType::Cwe, attrs)?;
            }
            self.add_edge(finding.id.clone(), cwe.to_string(), EdgeType::InstanceOf, Attrs::new())?;
        }
        Ok(())
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn edge_attrs(&self, from: &str, to: &str, edge_type: EdgeType) -> Option<&Attrs> {
        self.edges.get(&EdgeKey {
            from: from.to_string(),
            to: to.to_string(),
            edge_type,
        })
    }

    /// Neighbor IDs of a node, optionally filtered by edge type. An absent ID
    /// yields an empty list; stale IDs are expected during rescans.
    pub fn get_neighbors(
        &self,
        id: &str,
        edge_type: Option<EdgeType>,
        direction: Direction,
    ) -> Vec<String> {
        let lists = match direction {
            Direction::Outgoing => &self.outgoing,
            Direction::Incoming => &self.incoming,
        };
        let Some(keys) = lists.get(id) else {
            return Vec::new();
        };
        keys.iter()
            .filter(|key| edge_type.map_or(true, |et| key.edge_type == et))
            .map(|key| match direction {
                Direction::Outgoing => key.to.clone(),
                Direction::Incoming => key.from.clone(),
            })
            .collect()
    }

    pub fn stats(&self) -> GraphStats {
        let mut node_type_counts: BTreeMap<String, usize> = BTreeMap::new();
        for node in self.nodes.values() {
            *node_type_counts
                .entry(node.node_type.as_str().to_string())
                .or_default() += 1;
        }
        GraphStats {
            total_nodes: self.nodes.len(),
            total_edges: self.edges.len(),
            node_type_counts,
        }
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.nodes.iter()
    }

    pub(crate) fn edge_keys_out(&self, id: &str) -> &[EdgeKey] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn edge_keys_in(&self, id: &str) -> &[EdgeKey] {
        self.incoming.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}
