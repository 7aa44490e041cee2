//! Unified error type for scangraph.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Unified error type for all scangraph operations.
#[derive(Error, Debug)]
pub enum GraphError {
    /// An edge references a node that does not exist.
    #[error("cannot add {edge_type} edge {from} -> {to}: {missing} does not exist")]
    MissingReference {
        from: String,
        to: String,
        edge_type: String,
        /// Which endpoint was absent.
        missing: String,
    },

    /// A node ID was re-used with a different node type.
    #[error("node {id} already exists as {existing}, cannot upsert as {requested}")]
    TypeMismatch {
        id: String,
        existing: String,
        requested: String,
    },

    /// No adapter registered for the named tool.
    #[error("no normalizer registered for tool: {0}")]
    UnknownTool(String),

    /// Raw payload is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A writer panicked while holding the graph lock.
    #[error("graph lock poisoned")]
    LockPoisoned,
}

impl GraphError {
    /// Create a `MissingReference` error for an edge whose endpoint is absent.
    pub fn missing_reference(
        from: impl Into<String>,
        to: impl Into<String>,
        edge_type: impl Into<String>,
        missing: impl Into<String>,
    ) -> Self {
        Self::MissingReference {
            from: from.into(),
            to: to.into(),
            edge_type: edge_type.into(),
            missing: missing.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_reference_display() {
        let err = GraphError::missing_reference("f-1", "CWE-89", "instance_of", "CWE-89");
        let msg = err.to_string();
        assert!(msg.contains("instance_of"));
        assert!(msg.contains("CWE-89"));
        assert!(msg.contains("f-1"));
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = GraphError::TypeMismatch {
            id: "alpha".to_string(),
            existing: "project".to_string(),
            requested: "cwe".to_string(),
        };
        assert!(err.to_string().contains("alpha"));
        assert!(err.to_string().contains("project"));
    }

    #[test]
    fn test_unknown_tool_display() {
        let err = GraphError::UnknownTool("nmap".to_string());
        assert!(err.to_string().contains("nmap"));
    }
}
