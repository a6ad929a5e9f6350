use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "gpuwatch")]
#[command(about = "Watch VRAM, queue depth and temperature of GPU worker servers", long_about = None)]
pub struct Args {
    /// Worker addresses (host:port), comma-separated or repeated
    #[arg(long, env = "GPUWATCH_SERVERS", value_delimiter = ',')]
    pub servers: Vec<String>,

    /// File with one worker address per line (`#` starts a comment)
    #[arg(long, env = "GPUWATCH_SERVERS_FILE")]
    pub servers_file: Option<PathBuf>,

    /// Per-server deadline for both status requests
    #[arg(long, env = "GPUWATCH_TIMEOUT_MS", default_value_t = 5_000)]
    pub timeout_ms: u64,

    /// TCP connect timeout, capped at --timeout-ms
    #[arg(long, env = "GPUWATCH_CONNECT_TIMEOUT_MS", default_value_t = 2_000)]
    pub connect_timeout_ms: u64,

    /// OTLP/HTTP base URL for span export. If not set, logs only go to stderr.
    #[arg(long, env = "GPUWATCH_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Bearer token for the OTLP endpoint
    #[arg(long, env = "GPUWATCH_OTLP_TOKEN")]
    pub otlp_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll all servers once and print a status table
    Status {
        /// Print the records as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Poll all servers repeatedly until interrupted
    Watch {
        /// Seconds between poll cycles
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,

        /// Print each cycle as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Poll a single server and show its details
    Detail {
        /// Server address (host:port)
        address: String,
    },
    /// Serve the latest status of the configured servers over HTTP
    Serve {
        #[arg(long, env = "GPUWATCH_LISTEN_ADDR", default_value = "0.0.0.0:18190")]
        listen_addr: String,
    },
}
