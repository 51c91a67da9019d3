//! Response validation and normalisation.
//!
//! The model's reply is untrusted free text. [`validate`] turns it into an
//! [`AnalysisResult`] or rejects it:
//!
//! 1. Strip code-fence wrapping (` ```json ... ``` `), which models emit
//!    despite being told not to.
//! 2. Parse as JSON. Failure is [`ValidationError::MalformedJson`].
//! 3. Check structure. A reply that is not an object, or lacks a numeric
//!    `riskScore`, a string `summary`, or a `clauses` array, is
//!    [`ValidationError::InvalidStructure`]. So is an empty `clauses` array
//!    when the source text is non-empty (whitespace-only text counts as
//!    non-empty).
//! 4. Correct recoverable anomalies and record each one as a [`Degradation`]:
//!    scores are rounded and clamped to `0..=100`, unknown risk labels become
//!    `Low`, unknown statuses become `MISSING`, malformed entries are dropped.
//! 5. Complete `missingClauses` against the jurisdiction checklist: exactly
//!    one finding per standard clause, in checklist order, injecting a
//!    `MISSING` finding for any clause the model left out.
//! 6. Apply the jurisdiction's deterministic compliance rules.
//!
//! Degradations never fail the request. They are logged at `warn` and
//! returned alongside the result so callers can surface them.

use std::collections::HashMap;
use std::fmt;

use contractscan_core::{
    AnalysisResult, Clause, ClauseStatus, JurisdictionProfile, MissingClauseFinding, RiskLevel,
    analysis::MAX_RISK_SCORE,
};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

/// Risk score given to a standard clause reported (or injected) as missing
/// when the model supplies no usable score of its own.
pub const MISSING_CLAUSE_RISK: u8 = 80;

/// The model's reply could not be turned into any usable analysis.
///
/// Both variants carry the full raw reply for operator diagnosis.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("model output is not valid JSON: {message}")]
    MalformedJson { message: String, raw: String },
    #[error("model output does not match the analysis schema: {reason}")]
    InvalidStructure { reason: String, raw: String },
}

impl ValidationError {
    /// The unmodified model output that failed validation.
    pub fn raw(&self) -> &str {
        match self {
            Self::MalformedJson { raw, .. } | Self::InvalidStructure { raw, .. } => raw,
        }
    }

    fn structure(reason: impl Into<String>, raw: &str) -> Self {
        Self::InvalidStructure {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }
}

/// A recoverable anomaly in the model output, corrected during validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Degradation {
    /// A score was non-integral, out of range, a numeric string, or absent.
    ScoreAdjusted {
        field: String,
        original: String,
        adjusted: u8,
    },
    /// A clause risk label was absent or not one of High/Medium/Low.
    UnknownRisk {
        clause: String,
        value: Option<String>,
    },
    /// A finding status was absent or not one of Found/MISSING.
    UnknownStatus {
        clause: String,
        value: Option<String>,
    },
    /// An optional top-level field was absent or had the wrong type.
    FieldDefaulted { field: &'static str },
    /// An array entry could not be interpreted and was dropped.
    EntryDropped {
        field: &'static str,
        index: usize,
        reason: &'static str,
    },
    /// The model reported a standard clause more than once; later entries dropped.
    DuplicateFinding { clause: String },
    /// The model reported a clause that is not on the jurisdiction checklist.
    UnlistedFinding { clause: String },
    /// The model omitted a standard clause; a `MISSING` finding was injected.
    InjectedFinding { clause: String },
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScoreAdjusted {
                field,
                original,
                adjusted,
            } => write!(f, "{field}: score {original} adjusted to {adjusted}"),
            Self::UnknownRisk { clause, value } => write!(
                f,
                "clause {clause:?}: risk {} defaulted to Low",
                value.as_deref().unwrap_or("<absent>")
            ),
            Self::UnknownStatus { clause, value } => write!(
                f,
                "finding {clause:?}: status {} defaulted to MISSING",
                value.as_deref().unwrap_or("<absent>")
            ),
            Self::FieldDefaulted { field } => write!(f, "{field}: absent or invalid, defaulted to []"),
            Self::EntryDropped {
                field,
                index,
                reason,
            } => write!(f, "{field}[{index}] dropped: {reason}"),
            Self::DuplicateFinding { clause } => write!(f, "duplicate finding for {clause:?} dropped"),
            Self::UnlistedFinding { clause } => {
                write!(f, "finding for non-standard clause {clause:?} dropped")
            }
            Self::InjectedFinding { clause } => {
                write!(f, "standard clause {clause:?} not reported, injected as MISSING")
            }
        }
    }
}

/// A validated analysis and the corrections made to reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub result: AnalysisResult,
    pub degradations: Vec<Degradation>,
}

impl Validated {
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// Remove surrounding markdown code fences from a model reply.
///
/// Handles ` ```json `/` ``` ` openers (any alphanumeric language tag), a
/// closing fence with or without an opener, and prose before an opening
/// fence. Other text is returned trimmed but otherwise untouched.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut s = raw.trim();

    // Prose before a fence: "Here is the analysis:\n```json ...".
    if !s.starts_with('{')
        && !s.starts_with("```")
        && let Some(start) = s.find("```")
    {
        s = &s[start..];
    }

    if let Some(rest) = s.strip_prefix("```") {
        let tag_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        s = &rest[tag_len..];
        if let Some(end) = s.rfind("```") {
            s = &s[..end];
        }
    } else if let Some(body) = s.strip_suffix("```") {
        s = body;
    }
    s.trim()
}

/// Validate a raw model reply against `profile` for a document with `source_text`.
pub fn validate(
    raw: &str,
    profile: &JurisdictionProfile,
    source_text: &str,
) -> Result<Validated, ValidationError> {
    let payload = strip_code_fences(raw);
    let value: Value =
        serde_json::from_str(payload).map_err(|e| ValidationError::MalformedJson {
            message: e.to_string(),
            raw: raw.to_string(),
        })?;
    let Value::Object(obj) = value else {
        return Err(ValidationError::structure(
            "top-level value is not a JSON object",
            raw,
        ));
    };

    let mut degradations = Vec::new();

    let risk_score = match obj.get("riskScore") {
        Some(v) => match normalize_score(v) {
            Some((score, adjusted)) => {
                if adjusted {
                    degradations.push(Degradation::ScoreAdjusted {
                        field: "riskScore".into(),
                        original: v.to_string(),
                        adjusted: score,
                    });
                }
                score
            }
            None => return Err(ValidationError::structure("riskScore is not a number", raw)),
        },
        None => return Err(ValidationError::structure("riskScore is missing", raw)),
    };

    let summary = match obj.get("summary") {
        Some(Value::String(s)) => s.trim().to_string(),
        _ => return Err(ValidationError::structure("summary is missing or not a string", raw)),
    };

    let clauses = match obj.get("clauses") {
        Some(Value::Array(items)) => normalize_clauses(items, &mut degradations),
        _ => return Err(ValidationError::structure("clauses is missing or not an array", raw)),
    };
    if clauses.is_empty() && !source_text.is_empty() {
        return Err(ValidationError::structure(
            "no clauses extracted from a non-empty document",
            raw,
        ));
    }

    let missing_clauses = complete_findings(&obj, profile, &mut degradations);
    let mut compliance_alerts = normalize_alerts(&obj, &mut degradations);

    for rule in profile.compliance_rules {
        if rule.is_triggered(source_text, &compliance_alerts) {
            info!(jurisdiction = %profile.id, topic = rule.topic, "compliance alert synthesised");
            compliance_alerts.push(rule.alert.to_string());
        }
    }

    for d in &degradations {
        warn!(jurisdiction = %profile.id, degradation = %d, "model output degraded");
    }

    Ok(Validated {
        result: AnalysisResult {
            risk_score,
            summary,
            clauses,
            missing_clauses,
            compliance_alerts,
        },
        degradations,
    })
}

// ── Scores ──

/// Round and clamp a score. Returns `(score, adjusted)`, or `None` if the
/// value is not numeric.
fn normalize_score(v: &Value) -> Option<(u8, bool)> {
    let (n, coerced) = match v {
        Value::Number(n) => (n.as_f64()?, false),
        Value::String(s) => (s.trim().parse::<f64>().ok()?, true),
        _ => return None,
    };
    if !n.is_finite() {
        return None;
    }
    let clamped = n.round().clamp(0.0, MAX_RISK_SCORE as f64);
    Some((clamped as u8, coerced || clamped != n))
}

// ── Clauses ──

fn normalize_clauses(items: &[Value], degradations: &mut Vec<Degradation>) -> Vec<Clause> {
    let mut clauses = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let Value::Object(entry) = item else {
            degradations.push(Degradation::EntryDropped {
                field: "clauses",
                index,
                reason: "not an object",
            });
            continue;
        };

        let title = string_field(entry, "title");
        let raw_risk = entry.get("risk").and_then(Value::as_str);
        let risk = match raw_risk.and_then(RiskLevel::parse) {
            Some(r) => r,
            None => {
                degradations.push(Degradation::UnknownRisk {
                    clause: title.clone(),
                    value: entry.get("risk").map(value_repr),
                });
                RiskLevel::Low
            }
        };

        clauses.push(Clause {
            title,
            text: string_field(entry, "text"),
            risk,
            explanation: string_field(entry, "explanation"),
        });
    }
    clauses
}

// ── Standard-clause findings ──

/// Build exactly one finding per checklist entry, in checklist order.
fn complete_findings(
    obj: &Map<String, Value>,
    profile: &JurisdictionProfile,
    degradations: &mut Vec<Degradation>,
) -> Vec<MissingClauseFinding> {
    let items: &[Value] = match obj.get("missingClauses") {
        Some(Value::Array(items)) => items,
        _ => {
            degradations.push(Degradation::FieldDefaulted {
                field: "missingClauses",
            });
            &[]
        }
    };

    let mut reported: HashMap<&'static str, MissingClauseFinding> = HashMap::new();
    for (index, item) in items.iter().enumerate() {
        let Value::Object(entry) = item else {
            degradations.push(Degradation::EntryDropped {
                field: "missingClauses",
                index,
                reason: "not an object",
            });
            continue;
        };
        let Some(name) = entry
            .get("clause")
            .or_else(|| entry.get("clauseName"))
            .and_then(Value::as_str)
        else {
            degradations.push(Degradation::EntryDropped {
                field: "missingClauses",
                index,
                reason: "no clause name",
            });
            continue;
        };
        let Some(canonical) = profile.standard_clause(name) else {
            degradations.push(Degradation::UnlistedFinding {
                clause: name.to_string(),
            });
            continue;
        };
        if reported.contains_key(canonical) {
            degradations.push(Degradation::DuplicateFinding {
                clause: canonical.to_string(),
            });
            continue;
        }

        let status = match entry
            .get("status")
            .and_then(Value::as_str)
            .and_then(ClauseStatus::parse)
        {
            Some(s) => s,
            None => {
                degradations.push(Degradation::UnknownStatus {
                    clause: canonical.to_string(),
                    value: entry.get("status").map(value_repr),
                });
                ClauseStatus::Missing
            }
        };

        let default_score = match status {
            ClauseStatus::Found => 0,
            ClauseStatus::Missing => MISSING_CLAUSE_RISK,
        };
        let field = format!("missingClauses[{index}].riskScore");
        let risk_score = match entry.get("riskScore") {
            Some(v) => match normalize_score(v) {
                Some((score, adjusted)) => {
                    if adjusted {
                        degradations.push(Degradation::ScoreAdjusted {
                            field,
                            original: v.to_string(),
                            adjusted: score,
                        });
                    }
                    score
                }
                None => {
                    degradations.push(Degradation::ScoreAdjusted {
                        field,
                        original: v.to_string(),
                        adjusted: default_score,
                    });
                    default_score
                }
            },
            None => {
                degradations.push(Degradation::ScoreAdjusted {
                    field,
                    original: "<absent>".into(),
                    adjusted: default_score,
                });
                default_score
            }
        };

        reported.insert(
            canonical,
            MissingClauseFinding {
                clause_name: canonical.to_string(),
                status,
                risk_score,
                recommendation: string_field(entry, "recommendation"),
            },
        );
    }

    profile
        .standard_clauses
        .iter()
        .map(|&name| {
            reported.remove(name).unwrap_or_else(|| {
                degradations.push(Degradation::InjectedFinding {
                    clause: name.to_string(),
                });
                MissingClauseFinding {
                    clause_name: name.to_string(),
                    status: ClauseStatus::Missing,
                    risk_score: MISSING_CLAUSE_RISK,
                    recommendation: generic_recommendation(name),
                }
            })
        })
        .collect()
}

fn generic_recommendation(clause: &str) -> String {
    format!(
        "The analysis did not confirm a {clause} clause. Review the contract and add a \
         {clause} clause if it is absent."
    )
}

// ── Compliance alerts ──

fn normalize_alerts(obj: &Map<String, Value>, degradations: &mut Vec<Degradation>) -> Vec<String> {
    let Some(Value::Array(items)) = obj.get("complianceAlerts") else {
        degradations.push(Degradation::FieldDefaulted {
            field: "complianceAlerts",
        });
        return Vec::new();
    };

    let mut alerts = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match item.as_str().map(str::trim) {
            Some(s) if !s.is_empty() => alerts.push(s.to_string()),
            _ => degradations.push(Degradation::EntryDropped {
                field: "complianceAlerts",
                index,
                reason: "not a non-empty string",
            }),
        }
    }
    alerts
}

// ── Helpers ──

/// A string field, or empty if absent or not a string.
fn string_field(entry: &Map<String, Value>, key: &str) -> String {
    entry
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

fn value_repr(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
