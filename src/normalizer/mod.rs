//! Scanner-output normalization: one adapter per scanner family, mapping each
//! tool's idiosyncratic JSON into the canonical [`Finding`] schema.
//!
//! Normalization is total. Malformed input (missing keys, wrong types) never
//! panics or errors; it degrades to exactly one synthetic `error`-type
//! finding carrying a diagnostic, so one bad payload cannot abort a batch.

mod bandit;
mod checkov;
mod conftest;
mod gitleaks;
mod semgrep;
mod trivy;

pub use bandit::BanditAdapter;
pub use checkov::CheckovAdapter;
pub use conftest::ConftestAdapter;
pub use gitleaks::GitleaksAdapter;
pub use semgrep::SemgrepAdapter;
pub use trivy::TrivyAdapter;

use crate::error::{GraphError, Result};
use crate::finding::{Finding, FindingType, Severity};
use regex::Regex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::warn;

/// Fallback recommendation when a tool has no fix-suggestion field.
pub const GENERIC_RECOMMENDATION: &str = "Review and remediate the reported violation";

static CWE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)CWE-(\d+)").expect("static pattern compiles"));

/// Caller-supplied identity for one normalization batch.
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    /// Enables idempotent re-ingestion: identical run IDs yield identical
    /// finding IDs.
    pub run_id: String,
    pub project_id: String,
}

impl NormalizeContext {
    pub fn new(run_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            project_id: project_id.into(),
        }
    }
}

/// One scanner family's mapping into the canonical schema.
///
/// Implementations must be deterministic: identical `(raw, ctx)` inputs yield
/// identical finding IDs.
pub trait ToolAdapter: Send + Sync {
    /// Tool name as used for registry lookup and the `tool` finding field.
    fn tool(&self) -> &'static str;

    /// Map raw tool JSON to canonical findings. Total: returns the synthetic
    /// error finding from [`error_finding`] instead of failing.
    fn normalize(&self, raw: &Value, ctx: &NormalizeContext) -> Vec<Finding>;
}

/// Explicit adapter map, built at startup and passed into the pipeline.
/// No global mutable state; tests can register fakes.
pub struct NormalizerRegistry {
    adapters: FxHashMap<&'static str, Box<dyn ToolAdapter>>,
}

impl NormalizerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            adapters: FxHashMap::default(),
        }
    }

    /// Registry with every built-in scanner adapter.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(TrivyAdapter));
        registry.register(Box::new(CheckovAdapter));
        registry.register(Box::new(GitleaksAdapter));
        registry.register(Box::new(SemgrepAdapter));
        registry.register(Box::new(BanditAdapter));
        registry.register(Box::new(ConftestAdapter));
        registry
    }

    pub fn register(&mut self, adapter: Box<dyn ToolAdapter>) {
        self.adapters.insert(adapter.tool(), adapter);
    }

    /// Normalize one tool payload. An unregistered tool name is a
    /// configuration error and fails fast; malformed payloads for registered
    /// tools degrade to an error finding instead.
    pub fn normalize(&self, tool: &str, raw: &Value, ctx: &NormalizeContext) -> Result<Vec<Finding>> {
        let adapter = self
            .adapters
            .get(tool)
            .ok_or_else(|| GraphError::UnknownTool(tool.to_string()))?;
        Ok(adapter.normalize(raw, ctx))
    }

    /// Registered tool names, sorted.
    pub fn tools(&self) -> Vec<&'static str> {
        let mut tools: Vec<&'static str> = self.adapters.keys().copied().collect();
        tools.sort_unstable();
        tools
    }
}

impl Default for NormalizerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The single synthetic finding a malformed payload degrades to.
pub fn error_finding(tool: &'static str, ctx: &NormalizeContext, diagnostic: &str) -> Finding {
    warn!(tool, diagnostic, "normalization degraded to error finding");
    Finding::new(
        tool,
        "normalize-error",
        "<raw output>",
        &ctx.run_id,
        &ctx.project_id,
        FindingType::Error,
        Severity::Unknown,
        format!("{tool} output could not be normalized"),
    )
    .with_recommendation("Inspect the raw tool output and the scanner invocation")
    .with_meta("diagnostic", diagnostic)
}

/// First `CWE-<n>` identifier in free text, uppercased.
pub(crate) fn extract_cwe(text: &str) -> Option<String> {
    CWE_PATTERN
        .captures(text)
        .map(|caps| format!("CWE-{}", &caps[1]))
}

/// Defensive string-field access; never indexes into missing keys.
pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

pub(crate) fn u32_field(value: &Value, key: &str) -> Option<u32> {
    value
        .get(key)
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_defaults_cover_all_tools() {
        let registry = NormalizerRegistry::with_defaults();
        assert_eq!(
            registry.tools(),
            vec!["bandit", "checkov", "conftest", "gitleaks", "semgrep", "trivy"]
        );
    }

    #[test]
    fn test_registry_unknown_tool() {
        let registry = NormalizerRegistry::with_defaults();
        let ctx = NormalizeContext::new("run-1", "alpha");
        let err = registry.normalize("nmap", &json!({}), &ctx).unwrap_err();
        assert!(matches!(err, GraphError::UnknownTool(_)));
    }

    #[test]
    fn test_registry_dispatch() {
        let registry = NormalizerRegistry::with_defaults();
        let ctx = NormalizeContext::new("run-1", "alpha");
        let findings = registry.normalize("gitleaks", &json!([]), &ctx).unwrap();
        assert!(findings.is_empty());
    }

    #[test]
    fn test_error_finding_shape() {
        let ctx = NormalizeContext::new("run-1", "alpha");
        let finding = error_finding("trivy", &ctx, "missing Results key");
        assert_eq!(finding.finding_type, FindingType::Error);
        assert_eq!(finding.severity, Severity::Unknown);
        assert_eq!(finding.tool, "trivy");
        assert_eq!(finding.project_id, "alpha");
        assert_eq!(
            finding.metadata.get("diagnostic").and_then(|v| v.as_str()),
            Some("missing Results key")
        );
    }

    #[test]
    fn test_error_finding_deterministic_id() {
        let ctx = NormalizeContext::new("run-1", "alpha");
        let a = error_finding("trivy", &ctx, "bad");
        let b = error_finding("trivy", &ctx, "bad");
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn test_extract_cwe() {
        assert_eq!(extract_cwe("CWE-89: SQL Injection"), Some("CWE-89".to_string()));
        assert_eq!(extract_cwe("see cwe-798 for details"), Some("CWE-798".to_string()));
        assert_eq!(extract_cwe("no identifier here"), None);
    }

    #[test]
    fn test_str_field_defensive() {
        let value = json!({"name": "x", "count": 3});
        assert_eq!(str_field(&value, "name"), Some("x"));
        assert_eq!(str_field(&value, "count"), None);
        assert_eq!(str_field(&value, "absent"), None);
        assert_eq!(str_field(&json!(null), "name"), None);
    }

    #[test]
    fn test_u32_field_defensive() {
        let value = json!({"line": 42, "name": "x", "huge": 1_u64 << 40});
        assert_eq!(u32_field(&value, "line"), Some(42));
        assert_eq!(u32_field(&value, "name"), None);
        assert_eq!(u32_field(&value, "huge"), None);
    }
}
