//! Command handlers

use std::path::{Path, PathBuf};

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::{
    AuditCommand, BaselineCommand, CaptureArgs, Cli, Commands, ConfigArgs, DisposalCommand,
    OutboxCommand,
};
use crate::output;
use tireguard_app::app::{capture_fingerprints, ProgressCallback, Services};
use tireguard_app::config::Config;
use tireguard_app::scanner::{scan_capture_dir, validate_photo, PositionedPhoto};
use tireguard_domain::model::NewDisposal;
use tireguard_domain::repository::UnitRepository;
use tireguard_infra::load_depth_readings;
use tireguard_types::{Error, Fingerprint, OutputFormat, Position, Result};
use tireguard_vision::{CommandExtractor, FingerprintExtractor, SidecarExtractor};

/// Execute CLI command
pub fn execute(cli: Cli) -> Result<()> {
    let mut config = Config::load()?;

    // Override from CLI args
    if let Some(ref tenant) = cli.tenant {
        config.tenant_id = tenant.clone();
    }
    if cli.operator.is_some() {
        config.operator = cli.operator.clone();
    }
    if cli.store_dir.is_some() {
        config.store_dir = cli.store_dir.clone();
    }
    let format = cli.format.unwrap_or(config.output_format);

    if let Commands::Config(args) = &cli.command {
        return cmd_config(args);
    }

    let services = Services::open(&config)?;
    sync_pending(&services);

    match &cli.command {
        Commands::Units => {
            let units = services.sync.backend().units.find_all()?;
            output::print_units(format, &units)
        }

        Commands::Baseline(BaselineCommand::Create { unit, capture }) => {
            let frames = capture_folder(&cli, &config, capture)?;
            let written = services.inspection.create_baseline(unit, frames)?;
            output::print_baseline(format, &written.record, Some(written.outcome))
        }

        Commands::Baseline(BaselineCommand::Show { unit }) => {
            let baseline = services.inspection.get_baseline(unit)?;
            output::print_baseline(format, &baseline, None)
        }

        Commands::Audit(command) => cmd_audit(&cli, &config, &services, command, format),

        Commands::Disposal(command) => cmd_disposal(&cli, &config, &services, command, format),

        Commands::Tires { unit } => {
            let tires = services.inspection.tires(unit)?;
            output::print_tires(format, &tires)
        }

        Commands::Wear {
            unit,
            position,
            csv,
        } => {
            let extra = match csv {
                Some(path) => load_depth_readings(path, Some(*position))?,
                None => Vec::new(),
            };
            let today = Utc::now().date_naive();
            let prediction = services
                .inspection
                .predict_wear(unit, *position, &extra, today)?;
            output::print_wear(format, unit, *position, prediction.as_ref())
        }

        Commands::Outbox(OutboxCommand::Status) => output::print_outbox(format, &services.sync.pending()),

        Commands::Outbox(OutboxCommand::Drain) => {
            let report = services.sync.drain()?;
            output::print_drain(format, &report)
        }

        Commands::Config(_) => Ok(()),
    }
}

/// Flush writes left over from an earlier offline session
fn sync_pending(services: &Services) {
    let pending = services.sync.pending_count();
    if pending == 0 {
        return;
    }
    tracing::info!("{} queued write(s) from a previous session; replaying", pending);
    match services.sync.drain() {
        Ok(report) if report.remaining > 0 => {
            eprintln!(
                "Warning: {} write(s) still queued ({})",
                report.remaining,
                report.error.as_deref().unwrap_or("store unreachable")
            );
        }
        Ok(_) => {}
        Err(e) => eprintln!("Warning: outbox replay failed: {}", e),
    }
}

fn cmd_audit(
    cli: &Cli,
    config: &Config,
    services: &Services,
    command: &AuditCommand,
    format: OutputFormat,
) -> Result<()> {
    let inspection = &services.inspection;
    let actor = inspection.session().operator.clone();

    match command {
        AuditCommand::Run { unit, capture } => {
            let frames = capture_folder(cli, config, capture)?;
            let written = inspection.run_audit(unit, frames)?;
            output::print_audit(format, &written.record, Some(written.outcome))
        }

        AuditCommand::Justify {
            audit,
            photos,
            text,
        } => {
            let written = inspection.attach_justification(*audit, photos.clone(), text, &actor)?;
            output::print_audit(format, &written.record, Some(written.outcome))
        }

        AuditCommand::Approve { audit } => {
            let approval = inspection.approve_rebaseline(*audit, &actor)?;
            output::print_audit(format, &approval.audit.record, Some(approval.audit.outcome))?;
            if let Some(baseline) = approval.baseline {
                output::print_baseline(format, &baseline.record, Some(baseline.outcome))?;
            }
            Ok(())
        }

        AuditCommand::History { unit, limit } => {
            let audits: Vec<_> = inspection.audit_history(unit)?.into_iter().take(*limit).collect();
            output::print_audit_history(format, &audits)
        }

        AuditCommand::Report { audit } => {
            let record = inspection.find_audit(*audit)?;
            output::print_audit(format, &record, None)
        }
    }
}

fn cmd_disposal(
    cli: &Cli,
    config: &Config,
    services: &Services,
    command: &DisposalCommand,
    format: OutputFormat,
) -> Result<()> {
    let disposals = &services.disposal;
    let actor = services.inspection.session().operator.clone();

    match command {
        DisposalCommand::File {
            unit,
            position,
            reason,
            photo,
            comments,
        } => {
            let written = disposals.file_disposal(NewDisposal {
                unit_id: unit.clone(),
                position: *position,
                reason: *reason,
                photo: photo.clone(),
                comments: comments.clone(),
                disposed_by: actor,
            })?;
            output::print_disposal(format, &written.record, Some(written.outcome))
        }

        DisposalCommand::Approve {
            disposal,
            replacement,
        } => {
            let replacement = match replacement {
                Some(photo) => {
                    let position = disposals.find_disposal(*disposal)?.position;
                    Some(capture_replacement(cli, config, photo, position)?)
                }
                None => None,
            };
            let approval = disposals.approve_disposal(*disposal, &actor, replacement)?;
            output::print_disposal(format, &approval.disposal.record, Some(approval.disposal.outcome))?;
            if let Some(baseline) = approval.baseline {
                output::print_baseline(format, &baseline.record, Some(baseline.outcome))?;
            }
            Ok(())
        }

        DisposalCommand::History { unit } => {
            let history = disposals.disposal_history(unit)?;
            output::print_disposal_history(format, &history)
        }
    }
}

fn build_extractor(config: &Config) -> Result<Box<dyn FingerprintExtractor>> {
    match &config.extractor_command {
        Some(command) => Ok(Box::new(CommandExtractor::new(command)?)),
        None => Ok(Box::new(SidecarExtractor)),
    }
}

fn capture_folder(cli: &Cli, config: &Config, capture: &CaptureArgs) -> Result<Vec<Fingerprint>> {
    let photos = scan_capture_dir(&capture.folder)?;
    let jobs = match capture.jobs {
        Some(0) => num_cpus::get(),
        Some(n) => n,
        None => config.extraction_jobs(),
    };
    if cli.verbose {
        eprintln!(
            "Found {} photos in {} ({} parallel jobs)",
            photos.len(),
            capture.folder.display(),
            jobs
        );
    }
    extract(config, &photos, jobs)
}

fn capture_replacement(cli: &Cli, config: &Config, photo: &Path, position: Position) -> Result<Fingerprint> {
    validate_photo(photo)?;
    if cli.verbose {
        eprintln!("Extracting replacement tire from {}", photo.display());
    }
    let photos = [PositionedPhoto {
        position,
        path: PathBuf::from(photo),
    }];
    let mut frames = extract(config, &photos, 1)?;
    let frame = frames
        .pop()
        .ok_or_else(|| Error::ExtractionFailure(format!("no fingerprint for {}", photo.display())))?;
    if !frame.has_identity() {
        return Err(Error::ExtractionFailure(format!(
            "could not read brand and model from {}",
            photo.display()
        )));
    }
    Ok(frame)
}

fn extract(config: &Config, photos: &[PositionedPhoto], jobs: usize) -> Result<Vec<Fingerprint>> {
    let extractor = build_extractor(config)?;

    let pb = ProgressBar::new(photos.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map_err(|e| Error::InvalidState(e.to_string()))?
            .progress_chars("#>-"),
    );

    let progress: ProgressCallback = {
        let pb = pb.clone();
        Box::new(move |msg: &str| {
            pb.inc(1);
            pb.set_message(msg.to_string());
        })
    };

    let frames = capture_fingerprints(photos, extractor.as_ref(), jobs, Some(progress));
    pb.finish_and_clear();

    let frames = frames?;
    let unreadable = frames.iter().filter(|f| !f.has_identity()).count();
    if unreadable > 0 {
        eprintln!("Warning: {} photo(s) yielded no tire identity", unreadable);
    }
    Ok(frames)
}

fn cmd_config(args: &ConfigArgs) -> Result<()> {
    if args.reset {
        let config = Config::default();
        config.save()?;
        println!("Configuration reset to defaults");
        println!("\n{}", config);
        return Ok(());
    }

    let mut config = Config::load()?;
    let mut modified = false;

    if let Some(tenant) = &args.set_tenant {
        config.tenant_id = tenant.clone();
        modified = true;
    }

    if let Some(operator) = &args.set_operator {
        config.operator = Some(operator.clone());
        modified = true;
    }

    if let Some(dir) = &args.set_store_dir {
        config.store_dir = Some(dir.clone());
        modified = true;
    }

    if let Some(dir) = &args.set_outbox_dir {
        config.outbox_dir = Some(dir.clone());
        modified = true;
    }

    if let Some(path) = &args.set_units_file {
        config.units_file = Some(path.clone());
        modified = true;
    }

    if let Some(command) = &args.set_extractor {
        // fail early on an unparseable command line
        CommandExtractor::new(command)?;
        config.extractor_command = Some(command.clone());
        modified = true;
    }

    if let Some(jobs) = args.set_jobs {
        config.extraction_jobs = jobs;
        modified = true;
    }

    if let Some(tolerance) = args.set_depth_tolerance {
        if tolerance.is_nan() || tolerance < 0.0 {
            return Err(Error::InvalidInput(
                "depth tolerance must be a non-negative number".to_string(),
            ));
        }
        config.depth_tolerance_mm = tolerance;
        modified = true;
    }

    if let Some(output_format) = args.set_output {
        config.output_format = output_format;
        modified = true;
    }

    if modified {
        config.save()?;
        println!("Configuration updated");
    }

    if args.show || !modified {
        println!("{}", config);
    }

    Ok(())
}
