//! Seed data for taxonomy nodes: CWE weakness classes, OWASP Top 10 (2021)
//! categories, and the `categorized_as` mapping between them.
//!
//! Also hosts the per-scanner lookup tables adapters consult when a tool does
//! not emit CWE identifiers itself.

use crate::error::Result;
use crate::graph::{Attrs, EdgeType, KnowledgeGraph, NodeType};

/// CWE assigned to every leaked secret (gitleaks has no taxonomy of its own).
pub const CWE_HARDCODED_CREDENTIALS: &str = "CWE-798";

/// One seeded CWE weakness class.
pub struct CweEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// OWASP Top 10 (2021) category this CWE belongs to.
    pub owasp: &'static str,
}

/// OWASP Top 10, 2021 edition. Node IDs follow `OWASP:<category>:<year>`.
pub const OWASP_2021: &[(&str, &str)] = &[
    ("OWASP:A01:2021", "Broken Access Control"),
    ("OWASP:A02:2021", "Cryptographic Failures"),
    ("OWASP:A03:2021", "Injection"),
    ("OWASP:A04:2021", "Insecure Design"),
    ("OWASP:A05:2021", "Security Misconfiguration"),
    ("OWASP:A06:2021", "Vulnerable and Outdated Components"),
    ("OWASP:A07:2021", "Identification and Authentication Failures"),
    ("OWASP:A08:2021", "Software and Data Integrity Failures"),
    ("OWASP:A09:2021", "Security Logging and Monitoring Failures"),
    ("OWASP:A10:2021", "Server-Side Request Forgery"),
];

/// Seeded weakness classes, the ones scanner output references in practice.
pub const CWE_CATALOG: &[CweEntry] = &[
    CweEntry {
        id: "CWE-22",
        name: "Path Traversal",
        description: "Improper limitation of a pathname to a restricted directory",
        owasp: "OWASP:A01:2021",
    },
    CweEntry {
        id: "CWE-77",
        name: "Command Injection",
        description: "Improper neutralization of special elements used in a command",
        owasp: "OWASP:A03:2021",
    },
    CweEntry {
        id: "CWE-78",
        name: "OS Command Injection",
        description: "Improper neutralization of special elements used in an OS command",
        owasp: "OWASP:A03:2021",
    },
    CweEntry {
        id: "CWE-79",
        name: "Cross-site Scripting",
        description: "Improper neutralization of input during web page generation",
        owasp: "OWASP:A03:2021",
    },
    CweEntry {
        id: "CWE-89",
        name: "SQL Injection",
        description: "Improper neutralization of special elements used in an SQL command",
        owasp: "OWASP:A03:2021",
    },
    CweEntry {
        id: "CWE-94",
        name: "Code Injection",
        description: "Improper control of generation of code",
        owasp: "OWASP:A03:2021",
    },
    CweEntry {
        id: "CWE-200",
        name: "Exposure of Sensitive Information",
        description: "Exposure of sensitive information to an unauthorized actor",
        owasp: "OWASP:A01:2021",
    },
    CweEntry {
        id: "CWE-284",
        name: "Improper Access Control",
        description: "Access restrictions not enforced for a resource",
        owasp: "OWASP:A01:2021",
    },
    CweEntry {
        id: "CWE-287",
        name: "Improper Authentication",
        description: "Actor identity claims are not proven correct",
        owasp: "OWASP:A07:2021",
    },
    CweEntry {
        id: "CWE-295",
        name: "Improper Certificate Validation",
        description: "Certificate is not validated or is validated incorrectly",
        owasp: "OWASP:A02:2021",
    },
    CweEntry {
        id: "CWE-326",
        name: "Inadequate Encryption Strength",
        description: "Encryption scheme is theoretically sound but too weak in practice",
        owasp: "OWASP:A02:2021",
    },
    CweEntry {
        id: "CWE-327",
        name: "Broken or Risky Cryptographic Algorithm",
        description: "Use of a broken or risky cryptographic algorithm",
        owasp: "OWASP:A02:2021",
    },
    CweEntry {
        id: "CWE-502",
        name: "Deserialization of Untrusted Data",
        description: "Deserializing untrusted data without sufficient verification",
        owasp: "OWASP:A08:2021",
    },
    CweEntry {
        id: "CWE-522",
        name: "Insufficiently Protected Credentials",
        description: "Credentials transmitted or stored using insecure methods",
        owasp: "OWASP:A07:2021",
    },
    CweEntry {
        id: "CWE-611",
        name: "XML External Entity Reference",
        description: "Improper restriction of XML external entity references",
        owasp: "OWASP:A05:2021",
    },
    CweEntry {
        id: "CWE-732",
        name: "Incorrect Permission Assignment",
        description: "Incorrect permission assignment for a critical resource",
        owasp: "OWASP:A01:2021",
    },
    CweEntry {
        id: "CWE-798",
        name: "Use of Hard-coded Credentials",
        description: "Hard-coded credentials such as passwords or keys",
        owasp: "OWASP:A07:2021",
    },
    CweEntry {
        id: "CWE-862",
        name: "Missing Authorization",
        description: "No authorization check when an actor accesses a resource",
        owasp: "OWASP:A01:2021",
    },
    CweEntry {
        id: "CWE-918",
        name: "Server-Side Request Forgery",
        description: "Web server retrieves a URL without validating the destination",
        owasp: "OWASP:A10:2021",
    },
];

/// checkov check ID -> CWE. checkov emits no CWE identifiers, so the common
/// cloud-misconfiguration checks are mapped statically.
pub const CHECKOV_CWE: &[(&str, &str)] = &[
    ("CKV_AWS_16", "CWE-326"),
    ("CKV_AWS_17", "CWE-200"),
    ("CKV_AWS_19", "CWE-326"),
    ("CKV_AWS_20", "CWE-200"),
    ("CKV_AWS_21", "CWE-200"),
    ("CKV_AWS_23", "CWE-200"),
    ("CKV_AWS_24", "CWE-284"),
    ("CKV_AWS_40", "CWE-732"),
    ("CKV_AWS_46", "CWE-798"),
    ("CKV_AWS_57", "CWE-200"),
];

/// CWE carried by a checkov check, if the check is in the static table.
pub fn checkov_cwe(check_id: &str) -> Option<&'static str> {
    CHECKOV_CWE
        .iter()
        .find(|(check, _)| *check == check_id)
        .map(|(_, cwe)| *cwe)
}

/// OWASP category of a seeded CWE.
pub fn cwe_owasp(cwe_id: &str) -> Option<&'static str> {
    CWE_CATALOG
        .iter()
        .find(|entry| entry.id == cwe_id)
        .map(|entry| entry.owasp)
}

/// Seed the taxonomy into a graph: OWASP category nodes, CWE nodes with names
/// and descriptions, and the `categorized_as` edges between them.
///
/// Idempotent, and safe to run after findings already lazily created
/// placeholder CWE nodes: the upsert fills in their names.
pub fn seed(graph: &mut KnowledgeGraph) -> Result<()> {
    for (id, name) in OWASP_2021 {
        let mut attrs = Attrs::new();
        attrs.insert("name".into(), (*name).into());
        graph.add_node(*id, NodeType::Owasp, attrs)?;
    }
    for entry in CWE_CATALOG {
        let mut attrs = Attrs::new();
        attrs.insert("name".into(), entry.name.into());
        attrs.insert("description".into(), entry.description.into());
        graph.add_node(entry.id, NodeType::Cwe, attrs)?;
        graph.add_edge(entry.id, entry.owasp, EdgeType::CategorizedAs, Attrs::new())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Direction;

    #[test]
    fn test_seed_is_idempotent() {
        let mut graph = KnowledgeGraph::new();
        seed(&mut graph).unwrap();
        let stats = graph.stats();
        seed(&mut graph).unwrap();
        assert_eq!(graph.stats(), stats);
        assert_eq!(stats.node_type_counts.get("owasp"), Some(&OWASP_2021.len()));
        assert_eq!(stats.node_type_counts.get("cwe"), Some(&CWE_CATALOG.len()));
    }

    #[test]
    fn test_every_cwe_links_to_a_seeded_owasp_category() {
        let mut graph = KnowledgeGraph::new();
        seed(&mut graph).unwrap();
        for entry in CWE_CATALOG {
            let categories =
                graph.get_neighbors(entry.id, Some(EdgeType::CategorizedAs), Direction::Outgoing);
            assert_eq!(categories, vec![entry.owasp.to_string()], "{}", entry.id);
        }
    }

    #[test]
    fn test_checkov_cwe_lookup() {
        assert_eq!(checkov_cwe("CKV_AWS_20"), Some("CWE-200"));
        assert_eq!(checkov_cwe("CKV_AWS_23"), Some("CWE-200"));
        assert_eq!(checkov_cwe("CKV_NOPE_1"), None);
    }

    #[test]
    fn test_cwe_owasp_lookup() {
        assert_eq!(cwe_owasp("CWE-89"), Some("OWASP:A03:2021"));
        assert_eq!(cwe_owasp("CWE-200"), Some("OWASP:A01:2021"));
        assert_eq!(cwe_owasp("CWE-0"), None);
    }

    #[test]
    fn test_seeded_cwe_searchable_by_name() {
        let mut graph = KnowledgeGraph::new();
        seed(&mut graph).unwrap();
        let hits = graph.find_nodes_by_query("sql injection");
        assert_eq!(hits, vec!["CWE-89"]);
    }
}
