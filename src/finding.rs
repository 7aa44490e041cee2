//! Canonical finding schema shared by every scanner adapter.
//!
//! Every tool's idiosyncratic JSON is mapped into [`Finding`] exactly once, at
//! the normalization boundary. Everything downstream (store, graph, queries)
//! only ever sees this shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Canonical severity scale. Every adapter collapses its tool's native
/// vocabulary into these six levels; nothing downstream sees tool-native words.
///
/// Ordering is ascending so `max()` and range filters work on the derived
/// `Ord`: `UNKNOWN < INFO < LOW < MEDIUM < HIGH < CRITICAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Unknown,
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Unknown => "UNKNOWN",
            Severity::Info => "INFO",
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }

    /// Parse a canonical severity word, case-insensitively.
    /// Returns `None` for anything outside the six-level scale.
    pub fn from_canonical(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "UNKNOWN" => Some(Severity::Unknown),
            "INFO" => Some(Severity::Info),
            "LOW" => Some(Severity::Low),
            "MEDIUM" => Some(Severity::Medium),
            "HIGH" => Some(Severity::High),
            "CRITICAL" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// All six levels, lowest first. Useful for exhaustive rollup buckets.
    pub fn all() -> [Severity; 6] {
        [
            Severity::Unknown,
            Severity::Info,
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ]
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What kind of observation a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingType {
    Vuln,
    Misconfig,
    Secret,
    Iac,
    Policy,
    /// Synthetic finding produced when a tool payload could not be normalized.
    Error,
}

impl FindingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingType::Vuln => "vuln",
            FindingType::Misconfig => "misconfig",
            FindingType::Secret => "secret",
            FindingType::Iac => "iac",
            FindingType::Policy => "policy",
            FindingType::Error => "error",
        }
    }
}

impl std::fmt::Display for FindingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a finding. The open -> resolved transition is driven by
/// an external rescan-reconciliation step; this crate only exposes the field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingStatus {
    #[default]
    Open,
    Resolved,
}

impl FindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingStatus::Open => "open",
            FindingStatus::Resolved => "resolved",
        }
    }
}

/// Where in the scanned artifact the finding was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Artifact path as reported by the tool.
    pub artifact: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_start: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_end: Option<u32>,
}

impl Location {
    pub fn new(artifact: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            line_start: None,
            line_end: None,
        }
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line_start = Some(line);
        self
    }

    pub fn with_range(mut self, start: u32, end: u32) -> Self {
        self.line_start = Some(start);
        self.line_end = Some(end);
        self
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.line_start, self.line_end) {
            (Some(start), Some(end)) if end != start => {
                write!(f, "{}:{}-{}", self.artifact, start, end)
            }
            (Some(start), _) => write!(f, "{}:{}", self.artifact, start),
            _ => write!(f, "{}", self.artifact),
        }
    }
}

/// Scalar value allowed in the open metadata map. Keeps the bag extensible
/// without loosening the fixed-field types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl MetaValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetaValue {
    fn from(s: &str) -> Self {
        MetaValue::Str(s.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(s: String) -> Self {
        MetaValue::Str(s)
    }
}

impl From<i64> for MetaValue {
    fn from(n: i64) -> Self {
        MetaValue::Int(n)
    }
}

impl From<bool> for MetaValue {
    fn from(b: bool) -> Self {
        MetaValue::Bool(b)
    }
}

/// One canonical security observation from a scanner run.
///
/// Immutable after creation except for `status`; never deleted. The JSON
/// field set is frozen because consumers outside this crate parse it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub ts: DateTime<Utc>,
    pub project_id: String,
    pub tool: String,
    pub run_id: String,
    pub artifact: String,
    #[serde(rename = "type")]
    pub finding_type: FindingType,
    /// Stable dedup key derived from (tool, check_id, artifact, run_id).
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub location: Location,
    pub status: FindingStatus,
    pub recommendation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, MetaValue>,
}

/// Metadata key under which a finding carries its CWE identifier.
/// The frozen field list has no dedicated CWE column.
pub const META_CWE: &str = "cwe";

impl Finding {
    /// Create a finding with a derived stable ID and defaulted fields.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tool: impl Into<String>,
        check_id: &str,
        artifact: impl Into<String>,
        run_id: impl Into<String>,
        project_id: impl Into<String>,
        finding_type: FindingType,
        severity: Severity,
        title: impl Into<String>,
    ) -> Self {
        let tool = tool.into();
        let artifact = artifact.into();
        let run_id = run_id.into();
        let id = finding_id(&tool, check_id, &artifact, &run_id);
        Self {
            ts: Utc::now(),
            project_id: project_id.into(),
            tool,
            run_id,
            location: Location::new(artifact.clone()),
            artifact,
            finding_type,
            id,
            severity,
            title: title.into(),
            status: FindingStatus::Open,
            recommendation: String::new(),
            evidence_sha256: None,
            links: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.artifact = location.artifact.clone();
        self.location = location;
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = recommendation.into();
        self
    }

    /// Record a SHA-256 digest of the evidence snippet backing this finding.
    pub fn with_evidence(mut self, evidence: &str) -> Self {
        self.evidence_sha256 = Some(sha256_hex(evidence));
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.links.push(link.into());
        self
    }

    pub fn with_cwe(mut self, cwe: impl Into<String>) -> Self {
        self.metadata
            .insert(META_CWE.to_string(), MetaValue::Str(cwe.into()));
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The CWE this finding carries, if any (e.g. `"CWE-89"`).
    pub fn cwe(&self) -> Option<&str> {
        self.metadata.get(META_CWE).and_then(MetaValue::as_str)
    }
}

/// Derive the stable dedup ID for a finding:
/// `<tool>-<first 16 hex of SHA-256(tool|check_id|artifact|run_id)>`.
///
/// Deterministic for identical inputs, which makes re-ingestion of the same
/// scan run a no-op downstream.
pub fn finding_id(tool: &str, check_id: &str, artifact: &str, run_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tool.as_bytes());
    hasher.update(b"|");
    hasher.update(check_id.as_bytes());
    hasher.update(b"|");
    hasher.update(artifact.as_bytes());
    hasher.update(b"|");
    hasher.update(run_id.as_bytes());
    let digest = hasher.finalize();
    let mut id = String::with_capacity(tool.len() + 17);
    id.push_str(tool);
    id.push('-');
    for byte in &digest[..8] {
        id.push_str(&format!("{byte:02x}"));
    }
    id
}

/// Hex-encoded SHA-256 of an evidence snippet.
pub fn sha256_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Unknown < Severity::Info);
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_severity_display() {
        assert_eq!(format!("{}", Severity::Critical), "CRITICAL");
        assert_eq!(format!("{}", Severity::Unknown), "UNKNOWN");
    }

    #[test]
    fn test_severity_from_canonical_case_insensitive() {
        assert_eq!(Severity::from_canonical("high"), Some(Severity::High));
        assert_eq!(Severity::from_canonical("CRITICAL"), Some(Severity::Critical));
        assert_eq!(Severity::from_canonical("Info"), Some(Severity::Info));
        assert_eq!(Severity::from_canonical("severe"), None);
    }

    #[test]
    fn test_severity_serialization() {
        let json = serde_json::to_string(&Severity::High).unwrap();
        assert_eq!(json, "\"HIGH\"");
        let back: Severity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Severity::High);
    }

    #[test]
    fn test_finding_type_serialization() {
        let json = serde_json::to_string(&FindingType::Misconfig).unwrap();
        assert_eq!(json, "\"misconfig\"");
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::new("main.tf").to_string(), "main.tf");
        assert_eq!(Location::new("main.tf").with_line(12).to_string(), "main.tf:12");
        assert_eq!(
            Location::new("main.tf").with_range(12, 20).to_string(),
            "main.tf:12-20"
        );
        assert_eq!(
            Location::new("main.tf").with_range(12, 12).to_string(),
            "main.tf:12"
        );
    }

    #[test]
    fn test_finding_id_deterministic() {
        let a = finding_id("trivy", "CVE-2021-1234", "Cargo.lock", "run-1");
        let b = finding_id("trivy", "CVE-2021-1234", "Cargo.lock", "run-1");
        assert_eq!(a, b);
        assert!(a.starts_with("trivy-"));
    }

    #[test]
    fn test_finding_id_varies_by_run() {
        let a = finding_id("trivy", "CVE-2021-1234", "Cargo.lock", "run-1");
        let b = finding_id("trivy", "CVE-2021-1234", "Cargo.lock", "run-2");
        assert_ne!(a, b);
    }

    #[test]
    fn test_finding_builder() {
        let finding = Finding::new(
            "semgrep",
            "rules.sqli",
            "src/db.py",
            "run-7",
            "alpha",
            FindingType::Vuln,
            Severity::High,
            "SQL injection",
        )
        .with_location(Location::new("src/db.py").with_line(42))
        .with_recommendation("Use parameterized queries")
        .with_cwe("CWE-89")
        .with_evidence("cursor.execute(\"SELECT * FROM t WHERE id=\" + uid)")
        .with_link("https://cwe.mitre.org/data/definitions/89.html");

        assert_eq!(finding.project_id, "alpha");
        assert_eq!(finding.status, FindingStatus::Open);
        assert_eq!(finding.cwe(), Some("CWE-89"));
        assert_eq!(finding.location.to_string(), "src/db.py:42");
        assert_eq!(finding.evidence_sha256.as_ref().map(|h| h.len()), Some(64));
        assert_eq!(finding.links.len(), 1);
    }

    #[test]
    fn test_finding_json_field_names() {
        let finding = Finding::new(
            "gitleaks",
            "aws-access-key",
            ".env",
            "run-1",
            "alpha",
            FindingType::Secret,
            Severity::High,
            "AWS access key",
        );
        let value = serde_json::to_value(&finding).unwrap();
        assert!(value.get("type").is_some());
        assert!(value.get("finding_type").is_none());
        assert_eq!(value["status"], "open");
        assert_eq!(value["severity"], "HIGH");
    }

    #[test]
    fn test_meta_value_untagged_serialization() {
        let mut metadata: BTreeMap<String, MetaValue> = BTreeMap::new();
        metadata.insert("cwe".into(), "CWE-798".into());
        metadata.insert("line_count".into(), MetaValue::Int(3));
        metadata.insert("verified".into(), MetaValue::Bool(true));
        let json = serde_json::to_string(&metadata).unwrap();
        assert!(json.contains("\"cwe\":\"CWE-798\""));
        assert!(json.contains("\"line_count\":3"));
        assert!(json.contains("\"verified\":true"));
    }
}
