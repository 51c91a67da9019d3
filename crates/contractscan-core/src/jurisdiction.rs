//! Jurisdiction profiles: legal-context instructions and standard-clause checklists.
//!
//! Profiles are static, immutable, and shared by every request. [`resolve`] is a
//! total function: any identifier that does not name a known jurisdiction maps
//! to [`Jurisdiction::Global`].
//!
//! # Checklists
//!
//! Every profile lists the six baseline clauses expected in a well-formed
//! commercial contract. India adds "Arbitration" (Arbitration and Conciliation
//! Act, 1996); the US and UK add "Governing Law". The checklist is the
//! authoritative list the response validator uses for its completeness check.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Closed set of supported legal regimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Jurisdiction {
    Global,
    India,
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "UK")]
    Uk,
}

impl Jurisdiction {
    pub const ALL: [Jurisdiction; 4] = [Self::Global, Self::India, Self::Us, Self::Uk];

    /// Canonical identifier, as accepted by [`resolve`] and stored on records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "Global",
            Self::India => "India",
            Self::Us => "US",
            Self::Uk => "UK",
        }
    }

    /// Parse a canonical jurisdiction identifier (`Global`, `India`, `US`, `UK`).
    ///
    /// Matching is exact; callers that accept looser user input normalise it first.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|j| j.as_str() == id)
    }

    /// The static profile for this jurisdiction.
    pub fn profile(self) -> &'static JurisdictionProfile {
        match self {
            Self::Global => &GLOBAL,
            Self::India => &INDIA,
            Self::Us => &US,
            Self::Uk => &UK,
        }
    }
}

impl fmt::Display for Jurisdiction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deterministic compliance check run against the source text.
///
/// The rule fires when none of `absent_terms` occurs in the document and no
/// existing alert already mentions `topic`.
#[derive(Debug)]
pub struct ComplianceRule {
    pub topic: &'static str,
    pub absent_terms: &'static [&'static str],
    pub alert: &'static str,
}

impl ComplianceRule {
    pub fn is_triggered(&self, source_text: &str, existing_alerts: &[String]) -> bool {
        let text = source_text.to_lowercase();
        if self.absent_terms.iter().any(|term| text.contains(term)) {
            return false;
        }
        let topic = self.topic.to_lowercase();
        !existing_alerts
            .iter()
            .any(|alert| alert.to_lowercase().contains(&topic))
    }
}

/// Legal context and standard-clause checklist for one jurisdiction.
#[derive(Debug)]
pub struct JurisdictionProfile {
    pub id: Jurisdiction,
    pub label: &'static str,
    pub description: &'static str,
    /// Narrative embedded verbatim ahead of the task instructions in the prompt.
    pub legal_context: &'static str,
    /// Ordered, non-empty, duplicate-free clause names.
    pub standard_clauses: &'static [&'static str],
    pub compliance_rules: &'static [ComplianceRule],
}

impl JurisdictionProfile {
    /// Look up a checklist entry by name, ignoring case and surrounding whitespace.
    ///
    /// Returns the canonical spelling from the checklist.
    pub fn standard_clause(&self, name: &str) -> Option<&'static str> {
        let name = name.trim();
        self.standard_clauses
            .iter()
            .copied()
            .find(|c| c.eq_ignore_ascii_case(name))
    }
}

/// Resolve a user-supplied jurisdiction identifier to its profile.
///
/// Unknown or empty input falls back to the Global profile; this never fails.
pub fn resolve(jurisdiction_id: &str) -> &'static JurisdictionProfile {
    match Jurisdiction::from_id(jurisdiction_id) {
        Some(j) => j.profile(),
        None => {
            if !jurisdiction_id.trim().is_empty() {
                debug!(
                    jurisdiction = jurisdiction_id,
                    "unknown jurisdiction, using Global"
                );
            }
            &GLOBAL
        }
    }
}

// ── Profiles ──

const BASELINE_CLAUSES: [&str; 6] = [
    "Confidentiality",
    "Indemnification",
    "Termination",
    "Liability Cap",
    "Force Majeure",
    "Dispute Resolution",
];

const INDIA_CLAUSES: [&str; 7] = [
    BASELINE_CLAUSES[0],
    BASELINE_CLAUSES[1],
    BASELINE_CLAUSES[2],
    BASELINE_CLAUSES[3],
    BASELINE_CLAUSES[4],
    BASELINE_CLAUSES[5],
    "Arbitration",
];

const COMMON_LAW_CLAUSES: [&str; 7] = [
    BASELINE_CLAUSES[0],
    BASELINE_CLAUSES[1],
    BASELINE_CLAUSES[2],
    BASELINE_CLAUSES[3],
    BASELINE_CLAUSES[4],
    BASELINE_CLAUSES[5],
    "Governing Law",
];

static GLOBAL: JurisdictionProfile = JurisdictionProfile {
    id: Jurisdiction::Global,
    label: "Global / General",
    description: "Standard analysis",
    legal_context: "You are a legal expert analyzing a contract for the Global jurisdiction.\n\
Apply generally accepted principles of commercial contract law. Do not assume any single \
national statute applies unless the contract names it.",
    standard_clauses: &BASELINE_CLAUSES,
    compliance_rules: &[],
};

static INDIA: JurisdictionProfile = JurisdictionProfile {
    id: Jurisdiction::India,
    label: "India",
    description: "Contract Act 1872 & Stamp Duty",
    legal_context: "You are a legal expert analyzing a contract for the India jurisdiction.\n\
Special Instructions for Indian Law (Indian Contract Act, 1872):\n\
1. Check for \"Stamp Duty\" payment (e.g. \"Maharashtra Stamp Act\", \"Non-Judicial Stamp Paper\"). \
If missing, add a compliance alert: \"No Stamp Duty reference found. Document may be inadmissible in court.\"\n\
2. Check for \"Arbitration\" citing the \"Arbitration and Conciliation Act, 1996\".\n\
3. CRITICAL: Any \"Non-Compete\" clause is generally VOID under Section 27 of the Indian Contract Act, \
unless for sale of goodwill. Flag this as High risk.\n\
4. CONSTITUTIONALITY CHECK: Flag any clause that might violate \"Public Policy\" (Section 23) or \
Fundamental Rights under the Constitution of India.",
    standard_clauses: &INDIA_CLAUSES,
    compliance_rules: &[ComplianceRule {
        topic: "stamp duty",
        absent_terms: &["stamp duty", "stamp act", "stamp paper", "stamped"],
        alert: "No Stamp Duty reference found. Document may be inadmissible in court.",
    }],
};

static US: JurisdictionProfile = JurisdictionProfile {
    id: Jurisdiction::Us,
    label: "United States",
    description: "UCC & State Laws",
    legal_context: "You are a legal expert analyzing a contract for the US jurisdiction.\n\
Flag \"Non-Compete\" clauses carefully, noting state-specific bans (e.g. California). \
Ensure clauses generally align with the Uniform Commercial Code (UCC) and public policy.",
    standard_clauses: &COMMON_LAW_CLAUSES,
    compliance_rules: &[],
};

static UK: JurisdictionProfile = JurisdictionProfile {
    id: Jurisdiction::Uk,
    label: "United Kingdom",
    description: "English Common Law",
    legal_context: "You are a legal expert analyzing a contract for the UK jurisdiction.\n\
Reference the \"Unfair Contract Terms Act 1977\" and the \"Consumer Rights Act 2015\" where applicable.",
    standard_clauses: &COMMON_LAW_CLAUSES,
    compliance_rules: &[],
};

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn resolves_known_ids() {
        assert_eq!(resolve("Global").id, Jurisdiction::Global);
        assert_eq!(resolve("India").id, Jurisdiction::India);
        assert_eq!(resolve("US").id, Jurisdiction::Us);
        assert_eq!(resolve("UK").id, Jurisdiction::Uk);
    }

    #[test]
    fn non_canonical_spellings_fall_back_to_global() {
        assert_eq!(resolve("india").id, Jurisdiction::Global);
        assert_eq!(resolve("  India ").id, Jurisdiction::Global);
        assert_eq!(resolve("us").id, Jurisdiction::Global);
        assert_eq!(resolve("Uk").id, Jurisdiction::Global);
    }

    #[test]
    fn unknown_and_empty_fall_back_to_global() {
        assert_eq!(resolve("").id, Jurisdiction::Global);
        assert_eq!(resolve("France").id, Jurisdiction::Global);
        assert_eq!(resolve("United Kingdom").id, Jurisdiction::Global);
    }

    #[test]
    fn checklists_non_empty_and_unique() {
        for j in Jurisdiction::ALL {
            let profile = j.profile();
            assert_eq!(profile.id, j);
            assert!(!profile.standard_clauses.is_empty());
            let unique: HashSet<_> = profile
                .standard_clauses
                .iter()
                .map(|c| c.to_ascii_lowercase())
                .collect();
            assert_eq!(unique.len(), profile.standard_clauses.len(), "{j}");
        }
    }

    #[test]
    fn legal_context_names_jurisdiction() {
        for j in Jurisdiction::ALL {
            assert!(
                j.profile()
                    .legal_context
                    .contains(&format!("for the {} jurisdiction", j.as_str()))
            );
        }
    }

    #[test]
    fn standard_clause_lookup_returns_canonical_name() {
        let india = resolve("India");
        assert_eq!(india.standard_clause(" confidentiality "), Some("Confidentiality"));
        assert_eq!(india.standard_clause("Arbitration"), Some("Arbitration"));
        assert_eq!(resolve("Global").standard_clause("Arbitration"), None);
    }

    #[test]
    fn serde_uses_canonical_ids() {
        assert_eq!(serde_json::to_string(&Jurisdiction::Us).unwrap(), "\"US\"");
        let parsed: Jurisdiction = serde_json::from_str("\"UK\"").unwrap();
        assert_eq!(parsed, Jurisdiction::Uk);
    }

    #[test]
    fn stamp_duty_rule_fires_only_when_absent() {
        let rule = &resolve("India").compliance_rules[0];
        assert!(rule.is_triggered("This agreement is made at Pune.", &[]));
        assert!(!rule.is_triggered("Executed on Non-Judicial Stamp Paper of Rs. 500.", &[]));
        assert!(!rule.is_triggered(
            "This agreement is made at Pune.",
            &["Stamp duty has not been paid.".into()]
        ));
    }

    proptest! {
        #[test]
        fn unknown_ids_resolve_to_global(id in "\\PC*|[GgIiUuSsKk ]{1,6}") {
            prop_assume!(!["Global", "India", "US", "UK"].contains(&id.as_str()));
            prop_assert_eq!(resolve(&id).id, Jurisdiction::Global);
            // Idempotent: resolving the same id twice yields the same profile.
            prop_assert!(std::ptr::eq(resolve(&id), resolve(&id)));
        }
    }
}
