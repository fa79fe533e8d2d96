use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "llm-metering")]
#[command(about = "LLM usage metering service")]
#[command(version)]
pub struct Cli {
    /// Config file to use instead of the one in the data dir
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the admin HTTP API and the scheduled aggregation job
    Serve {
        /// Override the configured port for this run only
        #[arg(long)]
        port: Option<u16>,
    },
    /// Materialize usage series once and exit
    Aggregate {
        /// hour, day or month; every granularity when omitted
        #[arg(long)]
        granularity: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
}
