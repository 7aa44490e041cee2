//! bandit adapter: Python SAST results from `bandit -f json`.

use super::{error_finding, str_field, u32_field, NormalizeContext, ToolAdapter, GENERIC_RECOMMENDATION};
use crate::finding::{Finding, FindingType, Location, Severity};
use serde_json::Value;

/// Adapter for bandit JSON reports.
pub struct BanditAdapter;

/// bandit grades HIGH/MEDIUM/LOW plus UNDEFINED.
fn map_severity(native: Option<&str>) -> Severity {
    match native.map(str::to_ascii_uppercase).as_deref() {
        Some("HIGH") => Severity::High,
        Some("MEDIUM") => Severity::Medium,
        Some("LOW") => Severity::Low,
        _ => Severity::Unknown,
    }
}

impl ToolAdapter for BanditAdapter {
    fn tool(&self) -> &'static str {
        "bandit"
    }

    fn normalize(&self, raw: &Value, ctx: &NormalizeContext) -> Vec<Finding> {
        let Some(results) = raw.get("results").and_then(Value::as_array) else {
            return vec![error_finding(self.tool(), ctx, "expected object with a results array")];
        };
        results.iter().map(|issue| self.issue(issue, ctx)).collect()
    }
}

impl BanditAdapter {
    fn issue(&self, issue: &Value, ctx: &NormalizeContext) -> Finding {
        let test_id = str_field(issue, "test_id").unwrap_or("<unknown test>");
        let filename = str_field(issue, "filename").unwrap_or("<unknown file>");
        let line = u32_field(issue, "line_number");

        let title = str_field(issue, "issue_text")
            .map(str::to_string)
            .unwrap_or_else(|| {
                str_field(issue, "test_name")
                    .unwrap_or(test_id)
                    .to_string()
            });

        let mut location = Location::new(filename);
        if let Some(line) = line {
            location = location.with_line(line);
        }

        let mut finding = Finding::new(
            self.tool(),
            &format!("{test_id}:{}", line.unwrap_or(0)),
            filename,
            &ctx.run_id,
            &ctx.project_id,
            FindingType::Vuln,
            map_severity(str_field(issue, "issue_severity")),
            title,
        )
        .with_location(location)
        .with_recommendation(GENERIC_RECOMMENDATION)
        .with_meta("test_id", test_id);

        if let Some(confidence) = str_field(issue, "issue_confidence") {
            finding = finding.with_meta("confidence", confidence.to_ascii_lowercase());
        }
        if let Some(cwe_id) = issue
            .get("issue_cwe")
            .and_then(|cwe| cwe.get("id"))
            .and_then(Value::as_u64)
        {
            finding = finding.with_cwe(format!("CWE-{cwe_id}"));
        }
        if let Some(link) = str_field(issue, "more_info") {
            finding = finding.with_link(link);
        }
        if let Some(code) = str_field(issue, "code") {
            finding = finding.with_evidence(code);
        }
        finding
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> NormalizeContext {
        NormalizeContext::new("run-1", "alpha")
    }

    #[test]
    fn test_issue_normalization() {
        let raw = json!({
            "results": [{
                "test_id": "B602",
                "test_name": "subprocess_popen_with_shell_equals_true",
                "filename": "app/tasks.py",
                "line_number": 88,
                "issue_severity": "HIGH",
                "issue_confidence": "HIGH",
                "issue_text": "subprocess call with shell=True identified",
                "issue_cwe": {"id": 78, "link": "https://cwe.mitre.org/data/definitions/78.html"},
                "more_info": "https://bandit.readthedocs.io/en/latest/plugins/b602.html",
                "code": "subprocess.Popen(cmd, shell=True)"
            }]
        });
        let findings = BanditAdapter.normalize(&raw, &ctx());
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.severity, Severity::High);
        assert_eq!(f.cwe(), Some("CWE-78"));
        assert_eq!(f.location.to_string(), "app/tasks.py:88");
        assert_eq!(f.metadata.get("confidence").and_then(|v| v.as_str()), Some("high"));
        assert_eq!(f.links.len(), 1);
    }

    #[test]
    fn test_severity_table() {
        for (native, expected) in [
            ("HIGH", Severity::High),
            ("MEDIUM", Severity::Medium),
            ("low", Severity::Low),
            ("UNDEFINED", Severity::Unknown),
        ] {
            let raw = json!({"results": [{"test_id": "B1", "filename": "f.py", "issue_severity": native}]});
            let findings = BanditAdapter.normalize(&raw, &ctx());
            assert_eq!(findings[0].severity, expected, "{native}");
        }
    }

    #[test]
    fn test_issue_without_cwe() {
        let raw = json!({"results": [{"test_id": "B101", "filename": "f.py", "issue_severity": "LOW"}]});
        let findings = BanditAdapter.normalize(&raw, &ctx());
        assert_eq!(findings[0].cwe(), None);
    }

    #[test]
    fn test_malformed_payload_degrades_to_single_error() {
        for raw in [json!({}), json!({"results": {}}), json!(17)] {
            let findings = BanditAdapter.normalize(&raw, &ctx());
            assert_eq!(findings.len(), 1);
            assert_eq!(findings[0].finding_type, FindingType::Error);
        }
    }

    #[test]
    fn test_empty_results_is_empty() {
        assert!(BanditAdapter.normalize(&json!({"results": []}), &ctx()).is_empty());
    }
}
