//! Validated analysis payload.
//!
//! These types are the trusted form of a model response: they only exist after
//! the response validator has parsed, clamped, and completed the raw output.
//! Field names serialise to the camelCase wire contract used in prompts and
//! stored records.

use serde::{Deserialize, Serialize};

/// Upper bound of every risk score (inclusive). The lower bound is 0.
pub const MAX_RISK_SCORE: u8 = 100;

/// Per-clause risk label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Medium,
    #[default]
    Low,
}

impl RiskLevel {
    /// Parse a risk label, ignoring case and surrounding whitespace.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

/// Whether a standard clause was found in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClauseStatus {
    #[serde(alias = "FOUND")]
    Found,
    #[serde(rename = "MISSING", alias = "Missing")]
    Missing,
}

impl ClauseStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "found" | "present" => Some(Self::Found),
            "missing" | "absent" => Some(Self::Missing),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Found => "Found",
            Self::Missing => "MISSING",
        }
    }
}

/// A clause extracted from the document with its assessed risk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub title: String,
    /// Snippet of the clause text.
    pub text: String,
    #[serde(default)]
    pub risk: RiskLevel,
    pub explanation: String,
}

/// Presence check for one entry of the jurisdiction's standard-clause checklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingClauseFinding {
    #[serde(rename = "clause")]
    pub clause_name: String,
    pub status: ClauseStatus,
    pub risk_score: u8,
    pub recommendation: String,
}

/// The validated analysis of one document.
///
/// Invariants (established by the validator):
/// - `risk_score` and every finding's `risk_score` lie in `0..=100`
/// - `clauses` is non-empty when the source text is non-empty
/// - `missing_clauses` holds exactly one entry per standard clause of the
///   jurisdiction used, in checklist order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub risk_score: u8,
    pub summary: String,
    pub clauses: Vec<Clause>,
    pub missing_clauses: Vec<MissingClauseFinding>,
    pub compliance_alerts: Vec<String>,
}

impl AnalysisResult {
    /// Findings whose status is [`ClauseStatus::Missing`].
    pub fn missing(&self) -> impl Iterator<Item = &MissingClauseFinding> {
        self.missing_clauses
            .iter()
            .filter(|f| f.status == ClauseStatus::Missing)
    }

    pub fn high_risk_clauses(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter().filter(|c| c.risk == RiskLevel::High)
    }

    pub fn risk_band(&self) -> RiskBand {
        RiskBand::from_score(self.risk_score)
    }
}

/// Coarse band of an overall risk score, for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskBand {
    High,
    Medium,
    Low,
}

impl RiskBand {
    /// Above 70 is High, above 40 is Medium, anything else Low.
    pub fn from_score(score: u8) -> Self {
        if score > 70 {
            Self::High
        } else if score > 40 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High Risk",
            Self::Medium => "Medium Risk",
            Self::Low => "Low Risk",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AnalysisResult {
        AnalysisResult {
            risk_score: 72,
            summary: "Supplier-friendly services agreement.".into(),
            clauses: vec![Clause {
                title: "Non-Compete".into(),
                text: "The Employee shall not engage in any competing business...".into(),
                risk: RiskLevel::High,
                explanation: "Likely void under Section 27.".into(),
            }],
            missing_clauses: vec![
                MissingClauseFinding {
                    clause_name: "Confidentiality".into(),
                    status: ClauseStatus::Found,
                    risk_score: 10,
                    recommendation: "Adequate.".into(),
                },
                MissingClauseFinding {
                    clause_name: "Force Majeure".into(),
                    status: ClauseStatus::Missing,
                    risk_score: 80,
                    recommendation: "Add a force majeure clause.".into(),
                },
            ],
            compliance_alerts: vec!["No Stamp Duty reference found.".into()],
        }
    }

    #[test]
    fn serialises_to_wire_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["riskScore"], 72);
        assert_eq!(json["clauses"][0]["risk"], "High");
        assert_eq!(json["missingClauses"][0]["clause"], "Confidentiality");
        assert_eq!(json["missingClauses"][1]["status"], "MISSING");
        assert_eq!(json["missingClauses"][1]["riskScore"], 80);
        assert_eq!(json["complianceAlerts"][0], "No Stamp Duty reference found.");
    }

    #[test]
    fn json_roundtrip() {
        let result = sample();
        let json = serde_json::to_string(&result).unwrap();
        let parsed: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn status_accepts_both_missing_spellings() {
        let a: ClauseStatus = serde_json::from_str("\"MISSING\"").unwrap();
        let b: ClauseStatus = serde_json::from_str("\"Missing\"").unwrap();
        assert_eq!(a, ClauseStatus::Missing);
        assert_eq!(b, ClauseStatus::Missing);
    }

    #[test]
    fn risk_level_parse() {
        assert_eq!(RiskLevel::parse("HIGH"), Some(RiskLevel::High));
        assert_eq!(RiskLevel::parse(" medium "), Some(RiskLevel::Medium));
        assert_eq!(RiskLevel::parse("Low"), Some(RiskLevel::Low));
        assert_eq!(RiskLevel::parse("Critical"), None);
        assert_eq!(RiskLevel::default(), RiskLevel::Low);
    }

    #[test]
    fn clause_risk_defaults_to_low_when_absent() {
        let clause: Clause =
            serde_json::from_str(r#"{"title":"t","text":"x","explanation":"e"}"#).unwrap();
        assert_eq!(clause.risk, RiskLevel::Low);
    }

    #[test]
    fn risk_band_thresholds() {
        assert_eq!(RiskBand::from_score(0), RiskBand::Low);
        assert_eq!(RiskBand::from_score(40), RiskBand::Low);
        assert_eq!(RiskBand::from_score(41), RiskBand::Medium);
        assert_eq!(RiskBand::from_score(70), RiskBand::Medium);
        assert_eq!(RiskBand::from_score(71), RiskBand::High);
        assert_eq!(RiskBand::from_score(100), RiskBand::High);
    }

    #[test]
    fn missing_and_high_risk_filters() {
        let result = sample();
        let missing: Vec<_> = result.missing().map(|f| f.clause_name.as_str()).collect();
        assert_eq!(missing, vec!["Force Majeure"]);
        assert_eq!(result.high_risk_clauses().count(), 1);
        assert_eq!(result.risk_band(), RiskBand::High);
    }
}
