use crate::commands::{print_matrix, run_audit, run_replay, AuditArgs, MatrixArgs, ReplayArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use deal_engine::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "deal-engine",
    about = "Decide CRM deal actions for marketplace license events",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Print the decision matrix in evaluation order
    Matrix(MatrixArgs),
    /// Replay an event feed against a CRM deal snapshot
    Replay(ReplayArgs),
    /// Compare marketplace snapshots for deleted, late, or altered records
    Audit(AuditArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Matrix(args) => print_matrix(args),
        Command::Replay(args) => run_replay(args),
        Command::Audit(args) => run_audit(args),
    }
}
