//! semgrep adapter: SAST results from `semgrep --json`.

use super::{
    error_finding, extract_cwe, str_field, u32_field, NormalizeContext, ToolAdapter,
    GENERIC_RECOMMENDATION,
};
use crate::finding::{Finding, FindingType, Location, Severity};
use serde_json::Value;

/// Adapter for semgrep JSON reports.
pub struct SemgrepAdapter;

/// semgrep grades results ERROR/WARNING/INFO.
fn map_severity(native: Option<&str>) -> Severity {
    match native.map(str::to_ascii_uppercase).as_deref() {
        Some("ERROR") => Severity::High,
        Some("WARNING") => Severity::Medium,
        Some("INFO") => Severity::Info,
        _ => Severity::Unknown,
    }
}

impl ToolAdapter for SemgrepAdapter {
    fn tool(&self) -> &'static str {
        "semgrep"
    }

    fn normalize(&self, raw: &Value, ctx: &NormalizeContext) -> Vec<Finding> {
        let Some(results) = raw.get("results").and_then(Value::as_array) else {
            return vec![error_finding(self.tool(), ctx, "expected object with a results array")];
        };
        results.iter().map(|result| self.result(result, ctx)).collect()
    }
}

impl SemgrepAdapter {
    fn result(&self, result: &Value, ctx: &NormalizeContext) -> Finding {
        let check_id = str_field(result, "check_id").unwrap_or("<unknown check>");
        let path = str_field(result, "path").unwrap_or("<unknown file>");
        let extra = result.get("extra");

        let start = result
            .get("start")
            .and_then(|s| u32_field(s, "line"));
        let end = result.get("end").and_then(|e| u32_field(e, "line"));
        let mut location = Location::new(path);
        match (start, end) {
            (Some(start), Some(end)) => location = location.with_range(start, end),
            (Some(start), None) => location = location.with_line(start),
            _ => {}
        }

        let message = extra
            .and_then(|e| str_field(e, "message"))
            .map(str::to_string)
            .unwrap_or_else(|| check_id.to_string());

        let recommendation = extra
            .and_then(|e| str_field(e, "fix"))
            .map(|fix| format!("Apply the suggested fix: {fix}"))
            .unwrap_or_else(|| GENERIC_RECOMMENDATION.to_string());

        let mut finding = Finding::new(
            self.tool(),
            &format!("{check_id}:{}", start.unwrap_or(0)),
            path,
            &ctx.run_id,
            &ctx.project_id,
            FindingType::Vuln,
            map_severity(extra.and_then(|e| str_field(e, "severity"))),
            message,
        )
        .with_location(location)
        .with_recommendation(recommendation)
        .with_meta("check_id", check_id);

        if let Some(cwe) = extra
            .and_then(|e| e.get("metadata"))
            .and_then(|m| m.get("cwe"))
            .and_then(cwe_from_metadata)
        {
            finding = finding.with_cwe(cwe);
        }
        if let Some(lines) = extra.and_then(|e| str_field(e, "lines")) {
            finding = finding.with_evidence(lines);
        }
        finding
    }
}

/// semgrep metadata carries CWE as either a string or an array of strings,
/// each of the form `"CWE-89: SQL Injection"`.
fn cwe_from_metadata(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => extract_cwe(s),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .find_map(extract_cwe),
        _ => None,
    }
}
