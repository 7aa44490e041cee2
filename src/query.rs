//! Correlation and rollup queries over the knowledge graph.
//!
//! All rollups compute on demand by walking edges under a read lock; at the
//! expected scale (tens of thousands of nodes per engagement) there is
//! nothing to materialize.

use crate::error::{GraphError, Result};
use crate::finding::Severity;
use crate::graph::{Direction, EdgeType, KnowledgeGraph};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

/// Read-side query surface over a shared graph. Cheap to clone; many callers
/// may query concurrently while ingestion holds the write lock only in bursts.
#[derive(Clone)]
pub struct GraphQueryEngine {
    graph: Arc<RwLock<KnowledgeGraph>>,
}

impl GraphQueryEngine {
    pub fn new(graph: Arc<RwLock<KnowledgeGraph>>) -> Self {
        Self { graph }
    }

    /// Projects containing at least one finding that is an instance of the
    /// given CWE. Answers "does this vulnerability class recur across
    /// codebases?".
    pub fn cross_project_pattern(&self, cwe_id: &str) -> Result<BTreeSet<String>> {
        let graph = self.read()?;
        let mut projects = BTreeSet::new();
        for finding in graph.get_neighbors(cwe_id, Some(EdgeType::InstanceOf), Direction::Incoming) {
            for project in
                graph.get_neighbors(&finding, Some(EdgeType::FoundIn), Direction::Outgoing)
            {
                projects.insert(project);
            }
        }
        Ok(projects)
    }

    /// Findings per severity for one project, walking its incoming `found_in`
    /// edges. Severities with no findings are omitted.
    pub fn severity_rollup(&self, project_id: &str) -> Result<BTreeMap<Severity, usize>> {
        let graph = self.read()?;
        let mut rollup = BTreeMap::new();
        for finding in graph.get_neighbors(project_id, Some(EdgeType::FoundIn), Direction::Incoming)
        {
            let severity = graph
                .node(&finding)
                .and_then(|node| node.attr_str("severity"))
                .and_then(Severity::from_canonical)
                .unwrap_or(Severity::Unknown);
            *rollup.entry(severity).or_default() += 1;
        }
        Ok(rollup)
    }

    /// Two-hop aggregation `finding -instance_of-> CWE -categorized_as->
    /// OWASP`, counting findings at or above the severity threshold per OWASP
    /// category.
    pub fn owasp_exposure(&self, min_severity: Severity) -> Result<BTreeMap<String, usize>> {
        let graph = self.read()?;
        let mut exposure = BTreeMap::new();
        for (id, node) in graph.nodes() {
            if node.node_type != crate::graph::NodeType::Finding {
                continue;
            }
            let severity = node
                .attr_str("severity")
                .and_then(Severity::from_canonical)
                .unwrap_or(Severity::Unknown);
            if severity < min_severity {
                continue;
            }
            for cwe in graph.get_neighbors(id, Some(EdgeType::InstanceOf), Direction::Outgoing) {
                for owasp in
                    graph.get_neighbors(&cwe, Some(EdgeType::CategorizedAs), Direction::Outgoing)
                {
                    *exposure.entry(owasp).or_default() += 1;
                }
            }
        }
        Ok(exposure)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, KnowledgeGraph>> {
        self.graph.read().map_err(|_| GraphError::LockPoisoned)
    }
}
