use clap::{Parser, Subcommand};

/// Two-channel telemetry feed: push emitter, aggregator and live buffer
#[derive(Parser)]
#[command(name = "telemetry-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Run the push emitter (default)
    Serve,

    /// Run the sliding-window aggregator against the push stream
    Aggregate,

    /// Follow both channels and log the dashboard tiles
    Watch {
        /// Push stream URL (overrides configuration)
        #[arg(long)]
        stream_url: Option<String>,

        /// Aggregate endpoint URL (overrides configuration)
        #[arg(long)]
        aggregate_url: Option<String>,
    },
}
