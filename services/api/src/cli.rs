use crate::demo::{run_estimate, EstimateArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use rentscope::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Rentscope Pricing Estimator",
    about = "Estimate nightly price and annual revenue for short-term rental listings",
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
    /// Run a one-shot estimate against the built-in demo registry
    Estimate(EstimateArgs),
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
        Command::Estimate(args) => run_estimate(args).await,
    }
}
