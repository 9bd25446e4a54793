//! Plain-text audit report

use crate::model::{AuditRecord, Verdict};

/// Render a human-readable report for one audit
pub fn generate_audit_report(audit: &AuditRecord) -> String {
    let summary = &audit.comparison;

    let mut report = String::new();
    report.push_str("==================================================\n");
    report.push_str("                Tire Audit Report                  \n");
    report.push_str("==================================================\n\n");
    report.push_str(&format!("  Audit:             {}\n", audit.id));
    report.push_str(&format!("  Unit:              {}\n", audit.unit_id));
    report.push_str(&format!(
        "  Captured at:       {}\n",
        audit.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!("  State:             {}\n\n", audit.state().label()));

    report.push_str("[Summary]\n");
    report.push_str(&format!("  Compared:          {}\n", summary.total));
    report.push_str(&format!("  Matched:           {}\n", summary.matched));
    report.push_str(&format!("  Mismatched:        {}\n", summary.mismatched));
    report.push('\n');

    if audit.verdicts.is_empty() {
        report.push_str("[No positions compared]\n\n");
    } else {
        report.push_str("[Positions]\n");
        report.push_str("-".repeat(70).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:>4}  {:<14} {:<24} {:<24}\n",
            "Pos", "Verdict", "Baseline", "Captured"
        ));
        report.push_str("-".repeat(70).as_str());
        report.push('\n');
        for v in &audit.verdicts {
            report.push_str(&format!(
                "{:>4}  {:<14} {:<24} {:<24}\n",
                v.position,
                v.verdict.label(),
                truncate_str(v.expected.as_deref().unwrap_or("-"), 23),
                truncate_str(v.observed.as_deref().unwrap_or("-"), 23),
            ));
        }
        report.push('\n');
    }

    if !audit.maintenance.is_empty() {
        report.push_str("[Maintenance]\n");
        for signal in &audit.maintenance {
            report.push_str(&format!("  #{:<3} {}\n", signal.position, signal.describe()));
        }
        report.push('\n');
    }

    if let Some(j) = &audit.justification {
        report.push_str("[Justification]\n");
        report.push_str(&format!(
            "  {} at {}\n",
            j.justified_by,
            j.justified_at.format("%Y-%m-%d %H:%M")
        ));
        report.push_str(&format!("  {}\n", j.text));
        for photo in &j.photos {
            report.push_str(&format!("  photo: {}\n", photo));
        }
        report.push('\n');
    } else if audit.requires_justification {
        let unknown = audit
            .verdicts
            .iter()
            .filter(|v| v.verdict == Verdict::Unknown)
            .count();
        report.push_str("[Awaiting justification]\n");
        if unknown > 0 {
            report.push_str(&format!(
                "  {} position(s) could not be read from the photo\n",
                unknown
            ));
        }
        report.push('\n');
    }

    if let Some(a) = &audit.approval {
        report.push_str("[Approval]\n");
        report.push_str(&format!(
            "  {} at {}\n\n",
            a.approved_by,
            a.approved_at.format("%Y-%m-%d %H:%M")
        ));
    }

    report.push_str("==================================================\n");
    report
}

fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}~", truncated)
    }
}
