use crate::demo::{run_demo, run_optimal_lookup, DemoArgs, OptimalArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use tripwise::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Tripwise",
    about = "Run the congestion-window recommendation and reward service from the command line",
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
    /// Look up the optimal departure window against the baseline congestion model
    Optimal(OptimalArgs),
    /// Run an end-to-end CLI demo covering the recommend, start, and arrive flow
    Demo(DemoArgs),
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
        Command::Optimal(args) => run_optimal_lookup(args),
        Command::Demo(args) => run_demo(args),
    }
}
