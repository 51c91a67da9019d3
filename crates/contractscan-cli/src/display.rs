//! Vertical card display for analysis records.
//!
//! Renders a record as grouped, human-readable sections: overview, standard
//! clause checklist, extracted clauses, and compliance alerts.

use chrono::SecondsFormat;
use contractscan_ai::Degradation;
use contractscan_core::{AnalysisRecord, ClauseStatus, Jurisdiction, RiskLevel};

const MAX_LIST_ITEMS: usize = 20;
const SNIPPET_CHARS: usize = 72;

// ── Public API ──

/// Print a single analysis record as a vertical card.
pub fn print_record_card(record: &AnalysisRecord) {
    let analysis = &record.analysis;

    println!("=== {} ===", record.file_name);
    println!(
        "{} / 100 ({})",
        analysis.risk_score,
        analysis.risk_band().as_str()
    );
    println!();

    println!("Overview");
    println!("  {:<22} {}", "id", record.id);
    println!("  {:<22} {}", "jurisdiction", record.jurisdiction.profile().label);
    println!(
        "  {:<22} {}",
        "created_at",
        record.created_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    println!("  {:<22} {}", "source_chars", record.source_text.chars().count());
    if !analysis.summary.is_empty() {
        println!("  {:<22} {}", "summary", analysis.summary);
    }
    println!();

    print_checklist(record);
    print_clauses(record);
    print_alerts(record);
}

/// Print one line per record, newest first as given.
pub fn print_record_table(records: &[AnalysisRecord]) {
    if records.is_empty() {
        println!("No analyses.");
        return;
    }
    println!(
        "{:<36}  {:<20}  {:<6}  {:>5}  {:>7}  file",
        "id", "created_at", "juris", "risk", "missing"
    );
    for r in records {
        println!(
            "{:<36}  {:<20}  {:<6}  {:>5}  {:>7}  {}",
            r.id,
            r.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            r.jurisdiction.as_str(),
            r.analysis.risk_score,
            r.analysis.missing().count(),
            r.file_name
        );
    }
}

/// Print every jurisdiction profile with its checklist.
pub fn print_jurisdictions() {
    for j in Jurisdiction::ALL {
        let profile = j.profile();
        println!("{:<8} {} ({})", j.as_str(), profile.label, profile.description);
        println!("  {}", profile.standard_clauses.join(", "));
    }
}

/// Print corrections the validator applied, if any.
pub fn print_degradations(degradations: &[Degradation]) {
    if degradations.is_empty() {
        return;
    }
    println!("Corrections ({})", degradations.len());
    for d in degradations {
        println!("  - {d}");
    }
    println!();
}

// ── Sections ──

fn print_checklist(record: &AnalysisRecord) {
    let findings = &record.analysis.missing_clauses;
    if findings.is_empty() {
        return;
    }

    let missing = record.analysis.missing().count();
    println!("Standard Clauses ({} of {} missing)", missing, findings.len());
    for f in findings {
        let mark = match f.status {
            ClauseStatus::Found => "ok",
            ClauseStatus::Missing => "!!",
        };
        println!(
            "  [{mark}] {:<22} {:<8} risk {:>3}",
            f.clause_name,
            f.status.as_str(),
            f.risk_score
        );
        if f.status == ClauseStatus::Missing && !f.recommendation.is_empty() {
            println!("       {}", f.recommendation);
        }
    }
    println!();
}

fn print_clauses(record: &AnalysisRecord) {
    let clauses = &record.analysis.clauses;
    if clauses.is_empty() {
        return;
    }

    let high = record.analysis.high_risk_clauses().count();
    println!("Clauses ({}, {} high risk)", clauses.len(), high);
    let show = clauses.len().min(MAX_LIST_ITEMS);
    for c in &clauses[..show] {
        let marker = match c.risk {
            RiskLevel::High => "HIGH",
            RiskLevel::Medium => "MED ",
            RiskLevel::Low => "LOW ",
        };
        println!("  {marker}  {}", c.title);
        let snippet = shorten(&c.text, SNIPPET_CHARS);
        if !snippet.is_empty() {
            println!("        \"{snippet}\"");
        }
        if !c.explanation.is_empty() {
            println!("        {}", c.explanation);
        }
    }
    if clauses.len() > MAX_LIST_ITEMS {
        println!("  ... and {} more", clauses.len() - MAX_LIST_ITEMS);
    }
    println!();
}

fn print_alerts(record: &AnalysisRecord) {
    let alerts = &record.analysis.compliance_alerts;
    if alerts.is_empty() {
        return;
    }
    println!("Compliance Alerts ({})", alerts.len());
    for a in alerts {
        println!("  ! {a}");
    }
    println!();
}

/// Single-line excerpt of at most `max` characters, with an ellipsis when cut.
fn shorten(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max.saturating_sub(3)) {
        Some((idx, _)) if flat.chars().count() > max => format!("{}...", &flat[..idx]),
        _ => flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorten_keeps_short_text() {
        assert_eq!(shorten("Net 30 days.", 72), "Net 30 days.");
    }

    #[test]
    fn shorten_flattens_whitespace() {
        assert_eq!(shorten("  a\n\n b\tc ", 72), "a b c");
    }

    #[test]
    fn shorten_cuts_with_ellipsis() {
        let s = shorten(&"x".repeat(100), 10);
        assert_eq!(s, "xxxxxxx...");
        assert_eq!(s.chars().count(), 10);
    }

    #[test]
    fn shorten_is_char_safe() {
        let s = shorten(&"§".repeat(50), 10);
        assert_eq!(s.chars().count(), 10);
    }
}
