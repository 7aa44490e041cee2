//! Ingestion pipeline: normalize a tool payload, dedup into the store, link
//! into the graph. Single writer, many readers.

use crate::error::{GraphError, Result};
use crate::finding::{Finding, FindingStatus, FindingType};
use crate::graph::{EdgeType, GraphStats, KnowledgeGraph, Traversal};
use crate::normalizer::{NormalizeContext, NormalizerRegistry};
use crate::query::GraphQueryEngine;
use crate::store::{FindingQuery, FindingStore};
use crate::taxonomy;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Outcome of ingesting one tool payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestSummary {
    pub tool: String,
    pub run_id: String,
    /// Findings the normalizer produced.
    pub total: usize,
    /// Newly stored (not previously seen) findings.
    pub new_findings: usize,
    /// Findings whose dedup key was already present.
    pub duplicates: usize,
    /// Synthetic error findings among `total` (malformed payload markers).
    pub errors: usize,
}

/// Wires a normalizer registry, the finding store, and the shared knowledge
/// graph. Ingestion takes the write lock per batch; queries read in parallel
/// through [`GraphQueryEngine`] or the read-side passthroughs here.
pub struct ScanPipeline {
    registry: NormalizerRegistry,
    store: RwLock<FindingStore>,
    graph: Arc<RwLock<KnowledgeGraph>>,
}

impl ScanPipeline {
    /// Pipeline over a fresh graph, seeded with the CWE/OWASP taxonomy.
    pub fn new(registry: NormalizerRegistry) -> Result<Self> {
        let mut graph = KnowledgeGraph::new();
        taxonomy::seed(&mut graph)?;
        Ok(Self {
            registry,
            store: RwLock::new(FindingStore::new()),
            graph: Arc::new(RwLock::new(graph)),
        })
    }

    /// Pipeline with every built-in adapter.
    pub fn with_default_adapters() -> Result<Self> {
        Self::new(NormalizerRegistry::with_defaults())
    }

    /// Shared handle to the graph, for query engines and read-side callers.
    pub fn graph(&self) -> Arc<RwLock<KnowledgeGraph>> {
        Arc::clone(&self.graph)
    }

    pub fn query_engine(&self) -> GraphQueryEngine {
        GraphQueryEngine::new(self.graph())
    }

    /// Normalize one tool payload and ingest the results. Idempotent:
    /// replaying a run changes nothing. Normalization failures are contained
    /// per tool (error findings); graph-mutation failures propagate so the
    /// batch can be retried.
    pub fn ingest_scan(
        &self,
        tool: &str,
        raw: &Value,
        run_id: &str,
        project_id: &str,
    ) -> Result<IngestSummary> {
        let ctx = NormalizeContext::new(run_id, project_id);
        let findings = self.registry.normalize(tool, raw, &ctx)?;
        let errors = findings
            .iter()
            .filter(|f| f.finding_type == FindingType::Error)
            .count();

        let mut new_findings = 0;
        {
            let mut store = self.store.write().map_err(|_| GraphError::LockPoisoned)?;
            let mut graph = self.graph.write().map_err(|_| GraphError::LockPoisoned)?;
            for finding in &findings {
                if store.add(finding.clone()) {
                    new_findings += 1;
                }
                graph.ingest_finding(finding)?;
            }
        }

        let summary = IngestSummary {
            tool: tool.to_string(),
            run_id: run_id.to_string(),
            total: findings.len(),
            new_findings,
            duplicates: findings.len() - new_findings,
            errors,
        };
        info!(
            tool,
            run_id,
            project_id,
            total = summary.total,
            new = summary.new_findings,
            duplicates = summary.duplicates,
            errors = summary.errors,
            "scan ingested"
        );
        Ok(summary)
    }

    /// [`Self::ingest_scan`] over a raw JSON string as captured from the
    /// tool's stdout.
    pub fn ingest_raw(
        &self,
        tool: &str,
        raw: &str,
        run_id: &str,
        project_id: &str,
    ) -> Result<IngestSummary> {
        let value: Value = serde_json::from_str(raw)?;
        self.ingest_scan(tool, &value, run_id, project_id)
    }

    pub fn finding(&self, id: &str) -> Result<Option<Finding>> {
        let store = self.store.read().map_err(|_| GraphError::LockPoisoned)?;
        Ok(store.get(id).cloned())
    }

    pub fn query_findings(&self, query: &FindingQuery) -> Result<Vec<Finding>> {
        let store = self.store.read().map_err(|_| GraphError::LockPoisoned)?;
        Ok(store.query(query))
    }

    /// Externally driven status flip; also mirrored onto the graph node so
    /// graph-only consumers see it.
    pub fn set_status(&self, id: &str, status: FindingStatus) -> Result<bool> {
        let mut store = self.store.write().map_err(|_| GraphError::LockPoisoned)?;
        if !store.set_status(id, status) {
            return Ok(false);
        }
        let mut graph = self.graph.write().map_err(|_| GraphError::LockPoisoned)?;
        if graph.contains_node(id) {
            let mut attrs = crate::graph::Attrs::new();
            attrs.insert("status".into(), status.as_str().into());
            graph.add_node(id, crate::graph::NodeType::Finding, attrs)?;
        }
        Ok(true)
    }

    pub fn traverse(
        &self,
        start: &str,
        max_depth: usize,
        edge_types: Option<&[EdgeType]>,
    ) -> Result<Traversal> {
        let graph = self.graph.read().map_err(|_| GraphError::LockPoisoned)?;
        Ok(graph.traverse(start, max_depth, edge_types))
    }

    pub fn find_path(&self, from: &str, to: &str) -> Result<Option<Vec<String>>> {
        let graph = self.graph.read().map_err(|_| GraphError::LockPoisoned)?;
        Ok(graph.find_path(from, to))
    }

    pub fn find_nodes_by_query(&self, text: &str) -> Result<Vec<String>> {
        let graph = self.graph.read().map_err(|_| GraphError::LockPoisoned)?;
        Ok(graph.find_nodes_by_query(text))
    }

    pub fn stats(&self) -> Result<GraphStats> {
        let graph = self.graph.read().map_err(|_| GraphError::LockPoisoned)?;
        Ok(graph.stats())
    }
}
