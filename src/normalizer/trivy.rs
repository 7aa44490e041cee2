//! trivy adapter: vulnerabilities, misconfigurations, and detected secrets.

use super::{error_finding, str_field, u32_field, NormalizeContext, ToolAdapter, GENERIC_RECOMMENDATION};
use crate::finding::{Finding, FindingType, Location, Severity};
use serde_json::Value;

/// Adapter for `trivy ... --format json` reports.
pub struct TrivyAdapter;

/// trivy already speaks the canonical vocabulary; anything else is UNKNOWN.
fn map_severity(native: Option<&str>) -> Severity {
    native
        .and_then(Severity::from_canonical)
        .unwrap_or(Severity::Unknown)
}

impl ToolAdapter for TrivyAdapter {
    fn tool(&self) -> &'static str {
        "trivy"
    }

    fn normalize(&self, raw: &Value, ctx: &NormalizeContext) -> Vec<Finding> {
        let Some(results) = raw.get("Results").and_then(Value::as_array) else {
            return vec![error_finding(
                self.tool(),
                ctx,
                "expected object with a Results array",
            )];
        };

        let mut findings = Vec::new();
        for result in results {
            let target = str_field(result, "Target").unwrap_or("<unknown target>");

            for vuln in list_field(result, "Vulnerabilities") {
                findings.push(self.vulnerability(vuln, target, ctx));
            }
            for misconfig in list_field(result, "Misconfigurations") {
                findings.push(self.misconfiguration(misconfig, target, ctx));
            }
            for (index, secret) in list_field(result, "Secrets").enumerate() {
                findings.push(self.secret(secret, index, target, ctx));
            }
        }
        findings
    }
}

fn list_field<'a>(result: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    result
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
        .iter()
}

impl TrivyAdapter {
    fn vulnerability(&self, vuln: &Value, target: &str, ctx: &NormalizeContext) -> Finding {
        let vuln_id = str_field(vuln, "VulnerabilityID").unwrap_or("<unknown vulnerability>");
        let pkg = str_field(vuln, "PkgName").unwrap_or("<unknown package>");
        let title = str_field(vuln, "Title")
            .map(str::to_string)
            .unwrap_or_else(|| format!("{vuln_id} in {pkg}"));

        let recommendation = match str_field(vuln, "FixedVersion") {
            Some(fixed) => format!("Upgrade {pkg} to {fixed}"),
            None => GENERIC_RECOMMENDATION.to_string(),
        };

        let mut finding = Finding::new(
            self.tool(),
            &format!("{vuln_id}:{pkg}"),
            target,
            &ctx.run_id,
            &ctx.project_id,
            FindingType::Vuln,
            map_severity(str_field(vuln, "Severity")),
            title,
        )
        .with_recommendation(recommendation)
        .with_meta("vulnerability_id", vuln_id)
        .with_meta("package", pkg);

        if let Some(cwe) = vuln
            .get("CweIDs")
            .and_then(Value::as_array)
            .and_then(|ids| ids.first())
            .and_then(Value::as_str)
        {
            finding = finding.with_cwe(cwe);
        }
        if let Some(url) = str_field(vuln, "PrimaryURL") {
            finding = finding.with_link(url);
        }
        if let Some(description) = str_field(vuln, "Description") {
            finding = finding.with_evidence(description);
        }
        finding
    }

    fn misconfiguration(&self, misconfig: &Value, target: &str, ctx: &NormalizeContext) -> Finding {
        let check_id = str_field(misconfig, "ID").unwrap_or("<unknown check>");
        let title = str_field(misconfig, "Title")
            .map(str::to_string)
            .unwrap_or_else(|| check_id.to_string());

        let mut finding = Finding::new(
            self.tool(),
            check_id,
            target,
            &ctx.run_id,
            &ctx.project_id,
            FindingType::Misconfig,
            map_severity(str_field(misconfig, "Severity")),
            title,
        )
        .with_recommendation(
            str_field(misconfig, "Resolution").unwrap_or(GENERIC_RECOMMENDATION),
        )
        .with_meta("check_id", check_id);

        if let Some(url) = str_field(misconfig, "PrimaryURL") {
            finding = finding.with_link(url);
        }
        finding
    }

    fn secret(&self, secret: &Value, index: usize, target: &str, ctx: &NormalizeContext) -> Finding {
        let rule_id = str_field(secret, "RuleID").unwrap_or("<unknown rule>");
        let title = str_field(secret, "Title")
            .map(str::to_string)
            .unwrap_or_else(|| format!("Secret detected by rule {rule_id}"));

        let start = u32_field(secret, "StartLine");
        let mut location = Location::new(target);
        if let (Some(start), Some(end)) = (start, u32_field(secret, "EndLine")) {
            location = location.with_range(start, end);
        }

        // Lineless secrets fall back to their report position so repeats of
        // the same rule in the same target stay distinct.
        let check_id = match start {
            Some(start) => format!("{rule_id}:{start}"),
            None => format!("{rule_id}:#{index}"),
        };

        let mut finding = Finding::new(
            self.tool(),
            &check_id,
            target,
            &ctx.run_id,
            &ctx.project_id,
            FindingType::Secret,
            map_severity(str_field(secret, "Severity")),
            title,
        )
        .with_location(location)
        .with_recommendation("Rotate the credential and remove it from the artifact")
        .with_cwe(crate::taxonomy::CWE_HARDCODED_CREDENTIALS)
        .with_meta("rule_id", rule_id);

        if let Some(matched) = str_field(secret, "Match") {
            finding = finding.with_evidence(matched);
        }
        finding
    }
}
