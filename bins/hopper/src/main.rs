use clap::{Parser, Subcommand};

mod inspect;
mod serve;

#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

#[derive(Parser)]
#[clap(version, about = "URL frontier service")]
#[clap(propagate_version = true)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the frontier service until interrupted
    Serve(serve::Command),
    /// Print stats for an existing store
    Stats(inspect::StatsCommand),
    /// List dispatchable queues in an existing store
    Queues(inspect::QueuesCommand),
}

fn main() -> anyhow::Result<()> {
    hopper_core::telemetry::init_dev_subscriber_with_env_filter();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => serve::run(&args),
        Commands::Stats(args) => inspect::run_stats(&args),
        Commands::Queues(args) => inspect::run_queues(&args),
    }
}
