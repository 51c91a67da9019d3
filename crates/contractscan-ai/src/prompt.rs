//! Prompt composition.
//!
//! [`compose`] is a pure function of the jurisdiction profile and the source
//! text: the same inputs always produce byte-identical prompts, so prompts can
//! be tested and diffed without network access.

use contractscan_core::JurisdictionProfile;

/// Maximum number of source-text characters (Unicode scalar values) embedded
/// in a prompt. Longer documents are silently cut to their first
/// `MAX_SOURCE_CHARS` characters.
pub const MAX_SOURCE_CHARS: usize = 30_000;

/// Output schema the model is instructed to follow.
const OUTPUT_SCHEMA: &str = r#"{
  "riskScore": integer (0-100),
  "summary": "string",
  "clauses": [
    {
      "title": "string",
      "text": "string (snippet)",
      "risk": "High" | "Medium" | "Low",
      "explanation": "string"
    }
  ],
  "missingClauses": [
    {
      "clause": "string (name from the standard list)",
      "status": "Found" | "MISSING",
      "riskScore": integer (0-100),
      "recommendation": "string (why it is needed)"
    }
  ],
  "complianceAlerts": ["string (critical compliance warning)"]
}"#;

/// A composed prompt, ready to send to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptDocument {
    text: String,
    excerpt_chars: usize,
    truncated: bool,
}

impl PromptDocument {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    /// Number of source characters embedded in the prompt.
    pub fn excerpt_chars(&self) -> usize {
        self.excerpt_chars
    }

    /// Whether the source text was cut to [`MAX_SOURCE_CHARS`].
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// Build the instruction document for one analysis request.
///
/// Layout: legal context, task list (with the exact standard-clause
/// checklist), output rules, output schema, then the source excerpt last.
pub fn compose(profile: &JurisdictionProfile, source_text: &str) -> PromptDocument {
    let (excerpt, excerpt_chars, truncated) = truncate_chars(source_text, MAX_SOURCE_CHARS);
    let checklist = format_checklist(profile.standard_clauses);

    let text = format!(
        "{context}\n\
         \n\
         Task:\n\
         1. Analyze the contract text.\n\
         2. Extract clauses and identify risks. Rate each clause \"High\", \"Medium\" or \"Low\".\n\
         3. CHECK FOR MISSING CLAUSES from this standard list: {checklist}.\n\
         \x20  - Report every clause in the list exactly once in \"missingClauses\", using the name exactly as written.\n\
         \x20  - If a standard clause is present, mark it as \"Found\".\n\
         \x20  - If a standard clause is absent, mark it as \"MISSING\" with a high risk score.\n\
         4. Generate specific Compliance Alerts for the {jurisdiction} jurisdiction.\n\
         5. Give an overall riskScore from 0 (no risk) to 100 (severe risk).\n\
         \n\
         You must return the result as a single valid JSON object. \
         Do not include any text outside the JSON object. \
         Do not use markdown formatting or code fences.\n\
         \n\
         JSON Format:\n\
         {schema}\n\
         \n\
         Contract Text:\n\
         {excerpt}",
        context = profile.legal_context,
        jurisdiction = profile.id,
        schema = OUTPUT_SCHEMA,
    );

    PromptDocument {
        text,
        excerpt_chars,
        truncated,
    }
}

/// Cut `s` to at most `max` characters on a char boundary.
fn truncate_chars(s: &str, max: usize) -> (&str, usize, bool) {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => (&s[..byte_idx], max, true),
        None => (s, s.chars().count(), false),
    }
}

/// Render the checklist as a JSON array literal, e.g. `["Confidentiality", "Termination"]`.
fn format_checklist(clauses: &[&str]) -> String {
    let quoted: Vec<String> = clauses
        .iter()
        .map(|c| serde_json::Value::from(*c).to_string())
        .collect();
    format!("[{}]", quoted.join(", "))
}
