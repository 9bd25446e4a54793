//! Output formatting module

use serde::Serialize;

use tireguard_app::app::{DrainReport, StoreCommand, WriteOutcome};
use tireguard_domain::model::{AuditRecord, Baseline, DisposalRequest, TireRecord, Unit};
use tireguard_domain::service::{generate_audit_report, WearPrediction};
use tireguard_store::OutboxEntry;
use tireguard_types::{OutputFormat, Position, Result};

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

pub fn print_units(format: OutputFormat, units: &[Unit]) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(units);
    }

    if units.is_empty() {
        println!("No units registered");
        return Ok(());
    }
    println!("{:<16} {:<16} {:<10} {}", "Unit", "Plate", "Pipe", "Active");
    println!("{}", "-".repeat(52));
    for unit in units {
        println!(
            "{:<16} {:<16} {:<10} {}",
            truncate(&unit.id, 16),
            truncate(&unit.plate_id, 16),
            unit.pipe_number.as_deref().unwrap_or("-"),
            if unit.active { "yes" } else { "no" }
        );
    }
    Ok(())
}

pub fn print_baseline(format: OutputFormat, baseline: &Baseline, outcome: Option<WriteOutcome>) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(baseline);
    }

    println!("\nBaseline {}", baseline.unit_id);
    println!("=========={}", "=".repeat(baseline.unit_id.chars().count()));
    println!("Version:         {}", baseline.version);
    println!("Updated:         {}", baseline.updated_at.format("%Y-%m-%d %H:%M:%S"));
    println!("Authorized by:   {}", baseline.approval_ref.describe());
    if let Some(outcome) = outcome {
        println!("Write:           {}", outcome.label());
    }
    println!();
    println!("{:<5} {:<32} {:>9} {}", "Pos", "Tire", "Depth", "Serial/DOT");
    println!("{}", "-".repeat(64));
    for frame in &baseline.frames {
        println!(
            "{:<5} {:<32} {:>9} {}",
            frame.position,
            truncate(&frame.label(), 32),
            frame
                .tread_depth_mm
                .map(|d| format!("{:.1} mm", d))
                .unwrap_or_else(|| "-".to_string()),
            frame.serial_or_dot.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub fn print_audit(format: OutputFormat, audit: &AuditRecord, outcome: Option<WriteOutcome>) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(audit);
    }

    print!("{}", generate_audit_report(audit));
    if let Some(outcome) = outcome {
        println!("Write: {}", outcome.label());
    }
    Ok(())
}

pub fn print_audit_history(format: OutputFormat, audits: &[AuditRecord]) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(audits);
    }

    if audits.is_empty() {
        println!("No audits recorded");
        return Ok(());
    }
    println!(
        "{:<36}  {:<16}  {:>7}  {:>10}  {}",
        "Audit", "Created", "Matched", "Mismatched", "State"
    );
    println!("{}", "-".repeat(96));
    for audit in audits {
        println!(
            "{:<36}  {:<16}  {:>7}  {:>10}  {}",
            audit.id,
            audit.created_at.format("%Y-%m-%d %H:%M"),
            audit.comparison.matched,
            audit.comparison.mismatched,
            audit.state().label()
        );
    }
    Ok(())
}

pub fn print_disposal(format: OutputFormat, disposal: &DisposalRequest, outcome: Option<WriteOutcome>) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(disposal);
    }

    println!("\nDisposal {}", disposal.id);
    println!("=========================================");
    println!("Unit:            {}", disposal.unit_id);
    println!("Position:        {}", disposal.position);
    println!("Reason:          {}", disposal.reason.label());
    println!("Photo:           {}", disposal.photo);
    if !disposal.comments.is_empty() {
        println!("Comments:        {}", disposal.comments);
    }
    println!("Filed by:        {}", disposal.disposed_by);
    println!("Status:          {}", disposal.status.label());
    if let (Some(by), Some(at)) = (&disposal.approved_by, disposal.approved_at) {
        println!("Approved:        {} at {}", by, at.format("%Y-%m-%d %H:%M:%S"));
    }
    if let Some(replacement) = &disposal.replacement {
        println!("Replacement:     {}", replacement.label());
    }
    if let Some(outcome) = outcome {
        println!("Write:           {}", outcome.label());
    }
    Ok(())
}

pub fn print_disposal_history(format: OutputFormat, disposals: &[DisposalRequest]) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(disposals);
    }

    if disposals.is_empty() {
        println!("No disposals recorded");
        return Ok(());
    }
    println!(
        "{:<36}  {:<16}  {:>3}  {:<9}  {}",
        "Disposal", "Created", "Pos", "Reason", "Status"
    );
    println!("{}", "-".repeat(84));
    for disposal in disposals {
        println!(
            "{:<36}  {:<16}  {:>3}  {:<9}  {}",
            disposal.id,
            disposal.created_at.format("%Y-%m-%d %H:%M"),
            disposal.position,
            disposal.reason.label(),
            disposal.status.label()
        );
    }
    Ok(())
}

pub fn print_tires(format: OutputFormat, tires: &[TireRecord]) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(tires);
    }

    if tires.is_empty() {
        println!("No tires cached");
        return Ok(());
    }
    println!("{:<5} {:<16} {:<16} {:>9} {}", "Pos", "Brand", "Model", "Depth", "Status");
    println!("{}", "-".repeat(66));
    for tire in tires {
        println!(
            "{:<5} {:<16} {:<16} {:>9} {}",
            tire.position,
            truncate(tire.brand.as_deref().unwrap_or("-"), 16),
            truncate(tire.model.as_deref().unwrap_or("-"), 16),
            tire.depth_mm
                .map(|d| format!("{:.1} mm", d))
                .unwrap_or_else(|| "-".to_string()),
            tire.status.label()
        );
    }
    Ok(())
}

pub fn print_wear(
    format: OutputFormat,
    unit_id: &str,
    position: Position,
    prediction: Option<&WearPrediction>,
) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(&prediction);
    }

    let Some(p) = prediction else {
        println!(
            "Not enough depth readings for {} position {} (need at least 2)",
            unit_id, position
        );
        return Ok(());
    };

    println!("\nWear Forecast: {} #{}", unit_id, position);
    println!("===============================");
    println!("Current depth:   {:.1} mm", p.current_depth_mm);
    println!("Wear rate:       {:.4} mm/day", p.wear_rate_per_day);
    println!("Days remaining:  {}", p.days_remaining);
    println!("Replace by:      {}", p.predicted_replacement_date);
    println!("Status:          {}", p.status.label());
    println!("Confidence:      {:.0}%", p.confidence * 100.0);
    Ok(())
}

pub fn print_outbox(format: OutputFormat, entries: &[OutboxEntry<StoreCommand>]) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(entries);
    }

    if entries.is_empty() {
        println!("Outbox empty; all writes synced");
        return Ok(());
    }
    println!("{} queued write(s)", entries.len());
    println!();
    for entry in entries {
        println!(
            "{}  {}  attempts={}",
            entry.enqueued_at.format("%Y-%m-%d %H:%M:%S"),
            entry.idempotency_key,
            entry.attempts
        );
        if let Some(err) = &entry.last_error {
            println!("    last error: {}", truncate(err, 80));
        }
    }
    Ok(())
}

pub fn print_drain(format: OutputFormat, report: &DrainReport) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(report);
    }

    if report.busy {
        println!("Another drain is already running ({} queued)", report.remaining);
        return Ok(());
    }
    println!("Replayed:        {}", report.replayed);
    println!("Already current: {}", report.skipped);
    println!("Remaining:       {}", report.remaining);
    if let Some(err) = &report.error {
        println!("Stopped:         {}", err);
    }
    Ok(())
}
