//! checkov adapter: failed IaC checks from `checkov -o json`.

use super::{error_finding, str_field, NormalizeContext, ToolAdapter, GENERIC_RECOMMENDATION};
use crate::finding::{Finding, FindingType, Location, Severity};
use crate::taxonomy;
use serde_json::Value;

/// Adapter for checkov JSON reports.
pub struct CheckovAdapter;

/// checkov reports severity only when running against a platform that grades
/// checks; plain runs omit the field entirely. Absent or unrecognized
/// severities map to UNKNOWN rather than a guessed default.
fn map_severity(native: Option<&str>) -> Severity {
    native
        .and_then(Severity::from_canonical)
        .unwrap_or(Severity::Unknown)
}

impl ToolAdapter for CheckovAdapter {
    fn tool(&self) -> &'static str {
        "checkov"
    }

    fn normalize(&self, raw: &Value, ctx: &NormalizeContext) -> Vec<Finding> {
        let Some(failed) = raw
            .get("results")
            .and_then(|r| r.get("failed_checks"))
            .and_then(Value::as_array)
        else {
            return vec![error_finding(
                self.tool(),
                ctx,
                "expected results.failed_checks array",
            )];
        };

        failed.iter().map(|check| self.failed_check(check, ctx)).collect()
    }
}

impl CheckovAdapter {
    fn failed_check(&self, check: &Value, ctx: &NormalizeContext) -> Finding {
        let check_id = str_field(check, "check_id").unwrap_or("<unknown check>");
        let file_path = str_field(check, "file_path").unwrap_or("<unknown file>");
        let title = str_field(check, "check_name")
            .map(str::to_string)
            .unwrap_or_else(|| check_id.to_string());

        let mut location = Location::new(file_path);
        if let Some(range) = check.get("file_line_range").and_then(Value::as_array) {
            if let (Some(start), Some(end)) = (
                range.first().and_then(Value::as_u64).and_then(|n| u32::try_from(n).ok()),
                range.get(1).and_then(Value::as_u64).and_then(|n| u32::try_from(n).ok()),
            ) {
                location = location.with_range(start, end);
            }
        }

        let mut finding = Finding::new(
            self.tool(),
            check_id,
            file_path,
            &ctx.run_id,
            &ctx.project_id,
            FindingType::Iac,
            map_severity(str_field(check, "severity")),
            title,
        )
        .with_location(location)
        .with_recommendation(GENERIC_RECOMMENDATION)
        .with_meta("check_id", check_id);

        if let Some(resource) = str_field(check, "resource") {
            finding = finding.with_meta("resource", resource).with_evidence(resource);
        }
        if let Some(guideline) = str_field(check, "guideline") {
            finding = finding.with_link(guideline);
        }
        if let Some(cwe) = taxonomy::checkov_cwe(check_id) {
            finding = finding.with_cwe(cwe);
        }
        finding
    }
}
