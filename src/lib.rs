//! scangraph: security-scanner output normalization and a cross-project
//! knowledge graph.
//!
//! Raw tool JSON goes through a per-tool [`normalizer`] adapter into the
//! canonical [`Finding`] schema, is deduplicated by the [`store`], and linked
//! into the [`graph`] (findings, CWE and OWASP taxonomy, projects). The
//! [`query`] layer answers correlation questions over that graph, and
//! [`pipeline`] wires all of it behind a single-writer/many-reader lock.

pub mod error;
pub mod finding;
pub mod graph;
pub mod normalizer;
pub mod pipeline;
pub mod query;
pub mod store;
pub mod taxonomy;

pub use error::{GraphError, Result};
pub use finding::{Finding, FindingStatus, FindingType, Location, MetaValue, Severity};
pub use graph::{
    Direction, EdgeType, GraphStats, KnowledgeGraph, NodeRecord, NodeType, Traversal,
};
pub use normalizer::{NormalizeContext, NormalizerRegistry, ToolAdapter};
pub use pipeline::{IngestSummary, ScanPipeline};
pub use query::GraphQueryEngine;
pub use store::{FindingQuery, FindingStore};
