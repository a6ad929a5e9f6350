use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use gpuwatch_common::ServerAddress;
use gpuwatch_poller::PollConfig;

/// The connect timeout is capped by `PollConfig::effective_connect_timeout`.
pub fn build_poll_config(timeout_ms: u64, connect_timeout_ms: u64) -> PollConfig {
    PollConfig {
        connect_timeout: Duration::from_millis(connect_timeout_ms),
        ..PollConfig::with_timeout(Duration::from_millis(timeout_ms.max(1)))
    }
}

/// Addresses from `--servers` followed by `--servers-file`, duplicates dropped
/// (first occurrence wins).
pub fn load_addresses(servers: &[String], servers_file: Option<&Path>) -> Result<Vec<ServerAddress>> {
    let mut raw: Vec<String> = servers
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if let Some(path) = servers_file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read servers file {}", path.display()))?;
        raw.extend(parse_server_lines(&text));
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for entry in raw {
        let address = ServerAddress::parse(&entry)
            .with_context(|| format!("invalid server address `{entry}`"))?;
        if seen.insert(address.clone()) {
            out.push(address);
        } else {
            tracing::debug!(%address, "ignoring duplicate server address");
        }
    }
    Ok(out)
}

fn parse_server_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split_once('#').map_or(line, |(before, _)| before).trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
