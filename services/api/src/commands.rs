use crate::infra::replay_feed;
use clap::Args;
use deal_engine::config::AppConfig;
use deal_engine::data_shift::{load_snapshots, DataShiftAnalyzer};
use deal_engine::deals::feed::{load_deals, load_feed, write_decisions};
use deal_engine::deals::DecisionMatrix;
use deal_engine::error::AppError;
use deal_engine::telemetry;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug, Default)]
pub(crate) struct MatrixArgs {
    /// Emit the rules as JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ReplayArgs {
    /// CSV feed with License ID, Hosting, Event, Date and optional Transaction ID columns
    #[arg(long)]
    pub(crate) feed: PathBuf,
    /// JSON array of existing CRM deals to seed before replaying
    #[arg(long)]
    pub(crate) deals: Option<PathBuf>,
    /// Write the decision log CSV here instead of stdout
    #[arg(long)]
    pub(crate) out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct AuditArgs {
    /// Snapshot JSON files, in any order
    #[arg(required = true, num_args = 1..)]
    pub(crate) snapshots: Vec<PathBuf>,
    /// Override APP_LATE_TRANSACTION_DAYS for this run
    #[arg(long)]
    pub(crate) late_after_days: Option<u32>,
    /// Emit findings as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn print_matrix(args: MatrixArgs) -> Result<(), AppError> {
    let matrix = DecisionMatrix::standard();
    let mut stdout = io::stdout().lock();

    if args.json {
        let rendered = serde_json::to_string_pretty(&matrix.views())
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        writeln!(stdout, "{rendered}")?;
        return Ok(());
    }

    writeln!(stdout, "Deal decision matrix (first match wins)")?;
    for view in matrix.views() {
        writeln!(stdout, "{:>3}. {}", view.index, view.description)?;
    }
    Ok(())
}

pub(crate) fn run_replay(args: ReplayArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let entries = load_feed(&args.feed)?;
    let deals = match &args.deals {
        Some(path) => load_deals(path)?,
        None => Vec::new(),
    };
    info!(
        feed = %args.feed.display(),
        events = entries.len(),
        seeded_deals = deals.len(),
        "replaying event feed"
    );

    let outcome = replay_feed(Arc::new(DecisionMatrix::standard()), entries, deals)?;

    match &args.out {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            write_decisions(writer, &outcome.decisions)?;
            println!(
                "{} decisions ({} applied, {} unmatched), {} deals after replay -> {}",
                outcome.decisions.len(),
                outcome.applied(),
                outcome.decisions.len() - outcome.applied(),
                outcome.deals.len(),
                path.display()
            );
        }
        None => write_decisions(io::stdout().lock(), &outcome.decisions)?,
    }

    Ok(())
}

pub(crate) fn run_audit(args: AuditArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let mut audit = config.audit;
    if let Some(days) = args.late_after_days {
        audit.late_transaction_threshold_days = i64::from(days);
    }

    let snapshots = load_snapshots(&args.snapshots)?;
    let findings = DataShiftAnalyzer::from_config(&audit).run(&snapshots);

    let mut stdout = io::stdout().lock();
    if args.json {
        let rendered = serde_json::to_string_pretty(&findings)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        writeln!(stdout, "{rendered}")?;
    } else {
        for finding in &findings {
            writeln!(stdout, "- {finding}")?;
        }
        writeln!(
            stdout,
            "{} findings across {} snapshots",
            findings.len(),
            snapshots.len()
        )?;
    }

    Ok(())
}
