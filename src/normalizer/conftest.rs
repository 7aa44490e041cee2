//! conftest adapter: OPA policy results from `conftest test -o json`.

use super::{error_finding, str_field, NormalizeContext, ToolAdapter, GENERIC_RECOMMENDATION};
use crate::finding::{Finding, FindingType, Severity};
use serde_json::Value;

/// Adapter for conftest JSON reports (an array of per-file results).
pub struct ConftestAdapter;

impl ToolAdapter for ConftestAdapter {
    fn tool(&self) -> &'static str {
        "conftest"
    }

    fn normalize(&self, raw: &Value, ctx: &NormalizeContext) -> Vec<Finding> {
        let Some(files) = raw.as_array() else {
            return vec![error_finding(self.tool(), ctx, "expected a top-level array of file results")];
        };

        let mut findings = Vec::new();
        for file in files {
            let target = str_field(file, "filename").unwrap_or("<unknown file>");
            // conftest carries no severity: a failed policy blocks, a warning
            // advises, so MEDIUM and LOW respectively.
            for failure in violations(file, "failures") {
                findings.push(self.violation(failure, target, Severity::Medium, ctx));
            }
            for warning in violations(file, "warnings") {
                findings.push(self.violation(warning, target, Severity::Low, ctx));
            }
        }
        findings
    }
}

fn violations<'a>(file: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    file.get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
}

impl ConftestAdapter {
    fn violation(
        &self,
        violation: &Value,
        target: &str,
        severity: Severity,
        ctx: &NormalizeContext,
    ) -> Finding {
        let msg = str_field(violation, "msg").unwrap_or("<policy violation without message>");

        Finding::new(
            self.tool(),
            msg,
            target,
            &ctx.run_id,
            &ctx.project_id,
            FindingType::Policy,
            severity,
            msg,
        )
        .with_recommendation(GENERIC_RECOMMENDATION)
        .with_evidence(msg)
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
    fn test_failures_and_warnings() {
        let raw = json!([{
            "filename": "deployment.yaml",
            "successes": 4,
            "failures": [{"msg": "containers must not run as root"}],
            "warnings": [{"msg": "missing resource limits"}]
        }]);
        let findings = ConftestAdapter.normalize(&raw, &ctx());
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.finding_type == FindingType::Policy));

        let failure = &findings[0];
        assert_eq!(failure.severity, Severity::Medium);
        assert_eq!(failure.title, "containers must not run as root");
        assert_eq!(failure.artifact, "deployment.yaml");

        let warning = &findings[1];
        assert_eq!(warning.severity, Severity::Low);
    }

    #[test]
    fn test_all_policies_pass_is_empty() {
        let raw = json!([{"filename": "deployment.yaml", "successes": 9}]);
        assert!(ConftestAdapter.normalize(&raw, &ctx()).is_empty());
    }

    #[test]
    fn test_malformed_payload_degrades_to_single_error() {
        for raw in [json!({}), json!("results"), json!(null)] {
            let findings = ConftestAdapter.normalize(&raw, &ctx());
            assert_eq!(findings.len(), 1);
            assert_eq!(findings[0].finding_type, FindingType::Error);
        }
    }

    #[test]
    fn test_distinct_messages_get_distinct_ids() {
        let raw = json!([{
            "filename": "deployment.yaml",
            "failures": [{"msg": "rule a"}, {"msg": "rule b"}]
        }]);
        let findings = ConftestAdapter.normalize(&raw, &ctx());
        assert_ne!(findings[0].id, findings[1].id);
    }
}
