//! Idempotent keyed storage for canonical findings.

use crate::finding::{Finding, FindingStatus, Severity};
use rustc_hash::FxHashMap;

/// Filter for [`FindingStore::query`]. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct FindingQuery {
    pub project_id: Option<String>,
    pub severity: Option<Severity>,
    pub tool: Option<String>,
    pub status: Option<FindingStatus>,
    pub limit: Option<usize>,
}

impl FindingQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn status(mut self, status: FindingStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, finding: &Finding) -> bool {
        if let Some(project_id) = &self.project_id {
            if &finding.project_id != project_id {
                return false;
            }
        }
        if let Some(severity) = self.severity {
            if finding.severity != severity {
                return false;
            }
        }
        if let Some(tool) = &self.tool {
            if &finding.tool != tool {
                return false;
            }
        }
        if let Some(status) = self.status {
            if finding.status != status {
                return false;
            }
        }
        true
    }
}

/// Append-only store of findings keyed by their stable dedup ID.
///
/// Re-adding an already-stored finding is a no-op, so replaying a scan run
/// (retries, rescans) never inflates counts.
#[derive(Debug, Default)]
pub struct FindingStore {
    findings: Vec<Finding>,
    index: FxHashMap<String, usize>,
}

impl FindingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent upsert. Returns `true` if the finding was newly stored,
    /// `false` if its ID was already present (duplicate ingestion).
    pub fn add(&mut self, finding: Finding) -> bool {
        if self.index.contains_key(&finding.id) {
            return false;
        }
        self.index.insert(finding.id.clone(), self.findings.len());
        self.findings.push(finding);
        true
    }

    pub fn add_all(&mut self, findings: impl IntoIterator<Item = Finding>) -> usize {
        let mut added = 0;
        for finding in findings {
            if self.add(finding) {
                added += 1;
            }
        }
        added
    }

    pub fn get(&self, id: &str) -> Option<&Finding> {
        self.index.get(id).map(|&i| &self.findings[i])
    }

    /// Flip a finding's status. The open -> resolved transition is driven by
    /// an external rescan-reconciliation step.
    pub fn set_status(&mut self, id: &str, status: FindingStatus) -> bool {
        match self.index.get(id) {
            Some(&i) => {
                self.findings[i].status = status;
                true
            }
            None => false,
        }
    }

    /// Filtered query, ordered by severity descending then timestamp
    /// descending (most urgent and most recent first).
    pub fn query(&self, query: &FindingQuery) -> Vec<Finding> {
        let mut hits: Vec<&Finding> = self.findings.iter().filter(|f| query.matches(f)).collect();
        hits.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.ts.cmp(&a.ts))
        });
        let limit = query.limit.unwrap_or(usize::MAX);
        hits.into_iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::FindingType;

    fn make_finding(check_id: &str, project: &str, severity: Severity) -> Finding {
        Finding::new(
            "trivy",
            check_id,
            "Cargo.lock",
            "run-1",
            project,
            FindingType::Vuln,
            severity,
            format!("finding {check_id}"),
        )
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut store = FindingStore::new();
        let finding = make_finding("CVE-1", "alpha", Severity::High);

        assert!(store.add(finding.clone()));
        assert!(!store.add(finding));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_add_preserves_content() {
        let mut store = FindingStore::new();
        let original = make_finding("CVE-1", "alpha", Severity::High);
        store.add(original.clone());

        // Same dedup key, different content: first write wins.
        let mut replay = make_finding("CVE-1", "alpha", Severity::Low);
        replay.title = "mutated".to_string();
        store.add(replay);

        let stored = store.get(&original.id).unwrap();
        assert_eq!(stored.severity, Severity::High);
        assert_eq!(stored.title, original.title);
    }

    #[test]
    fn test_get_absent_id() {
        let store = FindingStore::new();
        assert!(store.get("trivy-0000000000000000").is_none());
    }

    #[test]
    fn test_query_orders_by_severity_then_recency() {
        let mut store = FindingStore::new();
        let low = make_finding("CVE-low", "alpha", Severity::Low);
        let critical = make_finding("CVE-crit", "alpha", Severity::Critical);
        let medium = make_finding("CVE-med", "alpha", Severity::Medium);
        store.add(low);
        store.add(critical);
        store.add(medium);

        let results = store.query(&FindingQuery::new());
        let severities: Vec<Severity> = results.iter().map(|f| f.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::Critical, Severity::Medium, Severity::Low]
        );
    }

    #[test]
    fn test_query_filters() {
        let mut store = FindingStore::new();
        store.add(make_finding("CVE-1", "alpha", Severity::High));
        store.add(make_finding("CVE-2", "beta", Severity::High));
        store.add(make_finding("CVE-3", "alpha", Severity::Low));

        let alpha = store.query(&FindingQuery::new().project("alpha"));
        assert_eq!(alpha.len(), 2);

        let alpha_high = store.query(&FindingQuery::new().project("alpha").severity(Severity::High));
        assert_eq!(alpha_high.len(), 1);

        let other_tool = store.query(&FindingQuery::new().tool("semgrep"));
        assert!(other_tool.is_empty());
    }

    #[test]
    fn test_query_limit() {
        let mut store = FindingStore::new();
        for i in 0..10 {
            store.add(make_finding(&format!("CVE-{i}"), "alpha", Severity::Medium));
        }
        let results = store.query(&FindingQuery::new().limit(3));
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_set_status() {
        let mut store = FindingStore::new();
        let finding = make_finding("CVE-1", "alpha", Severity::High);
        let id = finding.id.clone();
        store.add(finding);

        assert!(store.set_status(&id, FindingStatus::Resolved));
        assert_eq!(store.get(&id).unwrap().status, FindingStatus::Resolved);
        assert!(!store.set_status("absent", FindingStatus::Resolved));
    }

    #[test]
    fn test_query_by_status() {
        let mut store = FindingStore::new();
        let finding = make_finding("CVE-1", "alpha", Severity::High);
        let id = finding.id.clone();
        store.add(finding);
        store.add(make_finding("CVE-2", "alpha", Severity::High));
        store.set_status(&id, FindingStatus::Resolved);

        let open = store.query(&FindingQuery::new().status(FindingStatus::Open));
        assert_eq!(open.len(), 1);
        let resolved = store.query(&FindingQuery::new().status(FindingStatus::Resolved));
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, id);
    }
}
