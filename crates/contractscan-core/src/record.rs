//! Analysis records: the durable output of one successful pipeline run.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::AnalysisResult;
use crate::jurisdiction::Jurisdiction;

/// Generated identifier of an [`AnalysisRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Opaque identity of the user who owns a record, supplied by the
/// authentication collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request metadata carried alongside the analysis into the record.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub owner_id: OwnerId,
    pub file_name: String,
    pub jurisdiction: Jurisdiction,
    pub source_text: String,
}

/// A persisted analysis, owned by exactly one user.
///
/// Immutable once created; the only mutation is deletion by its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: RecordId,
    pub owner_id: OwnerId,
    pub file_name: String,
    pub jurisdiction: Jurisdiction,
    pub source_text: String,
    pub analysis: AnalysisResult,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn is_owned_by(&self, owner: &OwnerId) -> bool {
        &self.owner_id == owner
    }
}

/// Combine a validated result with its request metadata.
///
/// Assigns a fresh id and stamps the creation time.
pub fn assemble(analysis: AnalysisResult, meta: RequestMeta) -> AnalysisRecord {
    AnalysisRecord {
        id: RecordId::new(),
        owner_id: meta.owner_id,
        file_name: meta.file_name,
        jurisdiction: meta.jurisdiction,
        source_text: meta.source_text,
        analysis,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Clause, RiskLevel};

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            risk_score: 35,
            summary: "Balanced NDA.".into(),
            clauses: vec![Clause {
                title: "Confidentiality".into(),
                text: "Each party shall keep...".into(),
                risk: RiskLevel::Low,
                explanation: "Mutual and time-limited.".into(),
            }],
            missing_clauses: vec![],
            compliance_alerts: vec![],
        }
    }

    fn meta(owner: &str) -> RequestMeta {
        RequestMeta {
            owner_id: OwnerId::new(owner),
            file_name: "nda.txt".into(),
            jurisdiction: Jurisdiction::Uk,
            source_text: "Each party shall keep the other's information confidential.".into(),
        }
    }

    #[test]
    fn assemble_attaches_metadata() {
        let before = Utc::now();
        let record = assemble(analysis(), meta("alice"));
        assert_eq!(record.owner_id.as_str(), "alice");
        assert_eq!(record.file_name, "nda.txt");
        assert_eq!(record.jurisdiction, Jurisdiction::Uk);
        assert_eq!(record.analysis, analysis());
        assert!(record.created_at >= before);
        assert!(record.is_owned_by(&OwnerId::new("alice")));
        assert!(!record.is_owned_by(&OwnerId::new("bob")));
    }

    #[test]
    fn assemble_generates_distinct_ids() {
        let a = assemble(analysis(), meta("alice"));
        let b = assemble(analysis(), meta("alice"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn record_id_parse_roundtrip() {
        let id = RecordId::new();
        let parsed: RecordId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<RecordId>().is_err());
    }

    #[test]
    fn record_serialises_camel_case() {
        let record = assemble(analysis(), meta("alice"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["ownerId"], "alice");
        assert_eq!(json["fileName"], "nda.txt");
        assert_eq!(json["jurisdiction"], "UK");
        assert_eq!(json["analysis"]["riskScore"], 35);
        assert!(json["createdAt"].is_string());
    }
}
