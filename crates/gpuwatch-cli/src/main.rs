mod args;
mod config;
mod output;
mod serve;
mod watch;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use gpuwatch_common::telemetry::init_tracing;
use gpuwatch_common::ServerAddress;
use gpuwatch_poller::StatusAggregator;

use crate::args::{Args, Command};
use crate::config::{build_poll_config, load_addresses};
use crate::output::{print_detail, print_json, print_status_table};
use crate::serve::AppState;
use crate::watch::watch_until;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _telemetry = init_tracing(
        "gpuwatch",
        args.otlp_endpoint.as_deref(),
        args.otlp_token.as_deref(),
    );

    let poll_config = build_poll_config(args.timeout_ms, args.connect_timeout_ms);
    let aggregator = StatusAggregator::new(poll_config)?;

    match args.command {
        Command::Status { json } => {
            let servers = load_addresses(&args.servers, args.servers_file.as_deref())?;
            let statuses = aggregator.poll(&servers).await;
            if json {
                print_json(&statuses)?;
            } else {
                print_status_table(&statuses);
            }
        }
        Command::Watch { interval_secs, json } => {
            let servers = load_addresses(&args.servers, args.servers_file.as_deref())?;
            watch_until(
                &aggregator,
                &servers,
                Duration::from_secs(interval_secs.max(1)),
                tokio::signal::ctrl_c(),
                |statuses| {
                    if json {
                        print_json(statuses)
                    } else {
                        print_status_table(statuses);
                        Ok(())
                    }
                },
            )
            .await?;
        }
        Command::Detail { address } => {
            let address = ServerAddress::parse(&address)
                .with_context(|| format!("invalid server address `{address}`"))?;
            let status = aggregator.poll_one(&address).await;
            print_detail(&status);
        }
        Command::Serve { listen_addr } => {
            let servers = load_addresses(&args.servers, args.servers_file.as_deref())?;
            if servers.is_empty() {
                tracing::warn!("no servers configured, /api/status will be empty");
            }
            let st = AppState {
                aggregator,
                servers: Arc::new(servers),
            };
            serve::run(st, &listen_addr).await?;
        }
    }
    Ok(())
}
