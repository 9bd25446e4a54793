//! CLI definition using clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tireguard_types::{DisposalReason, OutputFormat, Position};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "tireguard")]
#[command(author = "yuuji")]
#[command(version)]
#[command(about = "Tire identity audits for fleet units")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (json, table). Uses config value if not specified.
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Tenant override
    #[arg(long, global = true)]
    pub tenant: Option<String>,

    /// Actor recorded on justifications, disposals and approvals
    #[arg(long, global = true)]
    pub operator: Option<String>,

    /// Backing store root override
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List registered units
    Units,

    /// Enroll or inspect a unit's baseline
    #[command(subcommand)]
    Baseline(BaselineCommand),

    /// Run and resolve tire identity audits
    #[command(subcommand)]
    Audit(AuditCommand),

    /// File and approve tire disposals
    #[command(subcommand)]
    Disposal(DisposalCommand),

    /// Show the tire cache for a unit
    Tires {
        /// Unit identifier
        unit: String,
    },

    /// Forecast tread wear for one position
    Wear {
        /// Unit identifier
        unit: String,

        /// Mount position (1-based)
        #[arg(long, short = 'p')]
        position: Position,

        /// Extra depth readings (CSV: date,depth_mm[,position])
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Inspect or flush writes queued while offline
    #[command(subcommand)]
    Outbox(OutboxCommand),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Capture folder and extraction options shared by enrollment and audits
#[derive(Args, Debug, Clone)]
pub struct CaptureArgs {
    /// Folder with one photo per position (e.g. 1.jpg, pos-2.png)
    pub folder: PathBuf,

    /// Number of parallel extractions. 0 = auto (CPU count). Uses config value if not specified.
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,
}

#[derive(Subcommand)]
pub enum BaselineCommand {
    /// Enroll a unit's first baseline from a capture folder
    Create {
        /// Unit identifier
        unit: String,

        #[command(flatten)]
        capture: CaptureArgs,
    },

    /// Show the current baseline
    Show {
        /// Unit identifier
        unit: String,
    },
}

#[derive(Subcommand)]
pub enum AuditCommand {
    /// Compare a capture folder against the unit's baseline
    Run {
        /// Unit identifier
        unit: String,

        #[command(flatten)]
        capture: CaptureArgs,
    },

    /// Justify the mismatches of an audit
    Justify {
        /// Audit id
        audit: Uuid,

        /// Evidence photo (repeatable)
        #[arg(long = "photo", required = true)]
        photos: Vec<String>,

        /// Explanation for the mismatches
        #[arg(long, short = 't')]
        text: String,
    },

    /// Approve a justified audit and re-baseline the mismatched positions
    Approve {
        /// Audit id
        audit: Uuid,
    },

    /// List audits for a unit, newest first
    History {
        /// Unit identifier
        unit: String,

        /// Limit number of entries shown
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,
    },

    /// Print the full report of one audit
    Report {
        /// Audit id
        audit: Uuid,
    },
}

#[derive(Subcommand)]
pub enum DisposalCommand {
    /// File a disposal request (photo required)
    File {
        /// Unit identifier
        unit: String,

        /// Mount position (1-based)
        #[arg(long, short = 'p')]
        position: Position,

        /// Why the tire is retired
        #[arg(long, short = 'r', value_enum)]
        reason: DisposalReason,

        /// Evidence photo
        #[arg(long)]
        photo: Option<String>,

        /// Free-form comments
        #[arg(long, short = 'c', default_value = "")]
        comments: String,
    },

    /// Approve a pending disposal
    Approve {
        /// Disposal id
        disposal: Uuid,

        /// Photo of the tire mounted in its place
        #[arg(long)]
        replacement: Option<PathBuf>,
    },

    /// List disposals for a unit, newest first
    History {
        /// Unit identifier
        unit: String,
    },
}

#[derive(Subcommand)]
pub enum OutboxCommand {
    /// Show queued writes
    Status,

    /// Replay queued writes against the backing store
    Drain,
}

#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Show current configuration
    #[arg(long)]
    pub show: bool,

    /// Set tenant
    #[arg(long)]
    pub set_tenant: Option<String>,

    /// Set default operator
    #[arg(long)]
    pub set_operator: Option<String>,

    /// Set backing store root
    #[arg(long)]
    pub set_store_dir: Option<PathBuf>,

    /// Set outbox root
    #[arg(long)]
    pub set_outbox_dir: Option<PathBuf>,

    /// Set units registry file
    #[arg(long)]
    pub set_units_file: Option<PathBuf>,

    /// Set vision extractor command ({image} and {prompt} are substituted)
    #[arg(long)]
    pub set_extractor: Option<String>,

    /// Set default extraction jobs (0 = CPU count)
    #[arg(long)]
    pub set_jobs: Option<usize>,

    /// Set tread depth tolerance (mm)
    #[arg(long)]
    pub set_depth_tolerance: Option<f64>,

    /// Set default output format
    #[arg(long)]
    pub set_output: Option<OutputFormat>,

    /// Reset to defaults
    #[arg(long)]
    pub reset: bool,
}
