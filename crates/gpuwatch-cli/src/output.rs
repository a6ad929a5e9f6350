use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use gpuwatch_common::server_status::round2;
use gpuwatch_common::{ServerState, ServerStatus};

const BAR_WIDTH: usize = 30;
const TASK_WIDTH: usize = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub online: usize,
    pub total: usize,
    pub vram_free_gb: f64,
    pub vram_total_gb: f64,
    pub running: u64,
    pub pending: u64,
}

pub fn summarize(statuses: &[ServerStatus]) -> Summary {
    let mut summary = Summary {
        online: 0,
        total: statuses.len(),
        vram_free_gb: 0.0,
        vram_total_gb: 0.0,
        running: 0,
        pending: 0,
    };
    for snap in statuses.iter().filter_map(ServerStatus::snapshot) {
        summary.online += 1;
        summary.vram_free_gb += snap.vram_free_gb;
        summary.vram_total_gb += snap.vram_total_gb;
        summary.running += snap.queue_running;
        summary.pending += snap.queue_pending;
    }
    summary.vram_free_gb = round2(summary.vram_free_gb);
    summary.vram_total_gb = round2(summary.vram_total_gb);
    summary
}

pub fn print_status_table(statuses: &[ServerStatus]) {
    print!("{}", render_status_table(statuses, Utc::now()));
}

pub fn print_detail(status: &ServerStatus) {
    print!("{}", render_detail(status, Utc::now()));
}

pub fn print_json(statuses: &[ServerStatus]) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(statuses)?);
    Ok(())
}

pub fn render_status_table(statuses: &[ServerStatus], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n=== GPU Worker Status ===\n");
    if statuses.is_empty() {
        let _ = writeln!(out, "  (No servers configured)\n");
        return out;
    }

    let _ = writeln!(
        out,
        "  {:<22} {:<8} {:<12} {:>15} {:>7} {:>4} {:>4}  {:<24} {}",
        "Server", "Status", "Device", "VRAM Used/Tot", "Temp", "Run", "Pend", "Task", "Updated"
    );
    let _ = writeln!(out, "  {:-<118}", "");
    for status in statuses {
        let name = display_name(status);
        let updated = format!("{} ago", humanize_age(status.observed_at(), now));
        match status.state() {
            ServerState::Online(s) => {
                let vram = format!("{:.2}/{:.2} GB", s.vram_used_gb(), s.vram_total_gb);
                let task = s.current_task.as_deref().map(|t| truncate(t, TASK_WIDTH)).unwrap_or_default();
                let _ = writeln!(
                    out,
                    "  {:<22} {:<8} {:<12} {:>15} {:>7} {:>4} {:>4}  {:<24} {}",
                    name,
                    "ONLINE",
                    truncate(&s.device_name, 12),
                    vram,
                    s.gpu_temperature.to_string(),
                    s.queue_running,
                    s.queue_pending,
                    task,
                    updated
                );
            }
            ServerState::Unreachable { .. } => {
                let _ = writeln!(
                    out,
                    "  {:<22} {:<8} {:<12} {:>15} {:>7} {:>4} {:>4}  {:<24} {}",
                    name, "OFFLINE", "-", "-", "-", "-", "-", "", updated
                );
            }
        }
    }

    let warnings: Vec<_> = statuses
        .iter()
        .filter_map(|s| s.error().map(|e| (s.address(), e)))
        .collect();
    if !warnings.is_empty() {
        let _ = writeln!(out);
        for (address, error) in warnings {
            let _ = writeln!(out, "  ✗ {address}: {error}");
        }
    }

    let summary = summarize(statuses);
    let _ = writeln!(
        out,
        "\n  {}/{} servers online, {:.2} GB VRAM free of {:.2} GB, {} running, {} pending\n",
        summary.online,
        summary.total,
        summary.vram_free_gb,
        summary.vram_total_gb,
        summary.running,
        summary.pending
    );
    out
}

pub fn render_detail(status: &ServerStatus, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n=== Server Details: {} ===\n", status.address());

    let snap = match status.state() {
        ServerState::Online(s) => s,
        ServerState::Unreachable { error } => {
            let _ = writeln!(out, "  Status:      OFFLINE");
            let _ = writeln!(out, "  Error:       {error}");
            let _ = writeln!(
                out,
                "  Last Update: {} ago\n",
                humanize_age(status.observed_at(), now)
            );
            return out;
        }
    };

    let _ = writeln!(out, "  Status:      ONLINE");
    let _ = writeln!(out, "  GPU Temp:    {}", snap.gpu_temperature);
    let _ = writeln!(out, "  Pending:     {}", snap.queue_pending);
    let _ = writeln!(out, "  Running:     {}", snap.queue_running);

    let _ = writeln!(out, "\n[Server Information]");
    let _ = writeln!(out, "  Device:      {}", snap.device_name);
    let _ = writeln!(out, "  Port:        {}", status.address().port().unwrap_or("N/A"));
    let _ = writeln!(
        out,
        "  Last Update: {} ago",
        humanize_age(status.observed_at(), now)
    );

    let used = snap.vram_used_gb();
    let _ = writeln!(out, "\n[VRAM Usage]");
    let _ = writeln!(out, "  Used  {} {:>7.2} GB", bar(used, snap.vram_total_gb, BAR_WIDTH), used);
    let _ = writeln!(
        out,
        "  Free  {} {:>7.2} GB",
        bar(snap.vram_free_gb, snap.vram_total_gb, BAR_WIDTH),
        snap.vram_free_gb
    );

    let queue_max = snap.queue_running.max(snap.queue_pending) as f64;
    let _ = writeln!(out, "\n[Queue Status]");
    let _ = writeln!(
        out,
        "  Running {} {:>4}",
        bar(snap.queue_running as f64, queue_max, BAR_WIDTH),
        snap.queue_running
    );
    let _ = writeln!(
        out,
        "  Pending {} {:>4}",
        bar(snap.queue_pending as f64, queue_max, BAR_WIDTH),
        snap.queue_pending
    );

    if let Some(task) = &snap.current_task {
        let _ = writeln!(out, "\n[Current Task]\n  {task}");
    }
    if let Some(workflow) = &snap.workflow {
        let _ = writeln!(out, "\n[Workflow]");
        let pretty = serde_json::to_string_pretty(workflow).unwrap_or_default();
        for line in pretty.lines() {
            let _ = writeln!(out, "  {line}");
        }
    }
    let _ = writeln!(out);
    out
}

/// "42 seconds", "3 minutes", "5 hours".
pub fn humanize_age(observed_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - observed_at).num_seconds().max(0);
    if secs < 60 {
        format!("{secs} seconds")
    } else if secs < 3600 {
        format!("{} minutes", secs / 60)
    } else {
        format!("{} hours", secs / 3600)
    }
}

fn display_name(status: &ServerStatus) -> String {
    let address = status.address();
    match address.port() {
        Some(port) if address.as_str().starts_with("127.0.0.1:") || address.as_str().starts_with("localhost:") => {
            format!(":{port}")
        }
        _ => truncate(address.as_str(), 22),
    }
}

fn bar(value: f64, max: f64, width: usize) -> String {
    let filled = if max > 0.0 {
        ((value / max) * width as f64).round().clamp(0.0, width as f64) as usize
    } else {
        0
    };
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gpuwatch_common::{GpuTemperature, ServerAddress, ServerSnapshot};
    use serde_json::json;

    fn online(addr: &str, running: u64, pending: u64) -> ServerStatus {
        ServerStatus::online(
            ServerAddress::parse(addr).unwrap(),
            Utc::now(),
            ServerSnapshot {
                device_name: "RTX 3090".to_string(),
                vram_total_gb: 24.0,
                vram_free_gb: 6.0,
                gpu_temperature: GpuTemperature::Unknown,
                queue_running: running,
                queue_pending: pending,
                current_task: Some("upscale_batch".to_string()),
                workflow: Some(json!({ "nodes": [{ "widgets_values": ["upscale_batch"] }] })),
            },
        )
    }

    fn offline(addr: &str) -> ServerStatus {
        ServerStatus::unreachable(ServerAddress::parse(addr).unwrap(), Utc::now(), "/system_stats: request failed: timed out")
    }

    #[test]
    fn test_humanize_age() {
        let now = Utc::now();
        assert_eq!(humanize_age(now - Duration::seconds(42), now), "42 seconds");
        assert_eq!(humanize_age(now - Duration::seconds(60), now), "1 minutes");
        assert_eq!(humanize_age(now - Duration::seconds(3599), now), "59 minutes");
        assert_eq!(humanize_age(now - Duration::hours(5), now), "5 hours");
        assert_eq!(humanize_age(now + Duration::seconds(3), now), "0 seconds");
    }

    #[test]
    fn test_summarize() {
        let statuses = vec![online("10.0.0.1:8188", 1, 2), offline("10.0.0.2:8188"), online("10.0.0.3:8188", 0, 4)];
        let summary = summarize(&statuses);
        assert_eq!(summary.online, 2);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.vram_free_gb, 12.0);
        assert_eq!(summary.vram_total_gb, 48.0);
        assert_eq!(summary.running, 1);
        assert_eq!(summary.pending, 6);
    }

    #[test]
    fn test_status_table() {
        let statuses = vec![online("10.0.0.1:8188", 1, 2), offline("10.0.0.2:8188")];
        let table = render_status_table(&statuses, Utc::now());
        assert!(table.contains("ONLINE"));
        assert!(table.contains("OFFLINE"));
        assert!(table.contains("18.00/24.00 GB"));
        assert!(table.contains("N/A"));
        assert!(table.contains("✗ 10.0.0.2:8188: /system_stats: request failed: timed out"));
        assert!(table.contains("1/2 servers online"));

        assert!(render_status_table(&[], Utc::now()).contains("(No servers configured)"));
    }

    #[test]
    fn test_detail() {
        let text = render_detail(&online("127.0.0.1:8188", 2, 0), Utc::now());
        assert!(text.contains("Port:        8188"));
        assert!(text.contains("[Current Task]\n  upscale_batch"));
        assert!(text.contains("[Workflow]"));

        let text = render_detail(&offline("10.0.0.2:8188"), Utc::now());
        assert!(text.contains("OFFLINE"));
        assert!(text.contains("timed out"));
        assert!(!text.contains("[VRAM Usage]"));
    }

    #[test]
    fn test_bar_and_truncate() {
        assert_eq!(bar(5.0, 10.0, 4), "██░░");
        assert_eq!(bar(1.0, 0.0, 3), "░░░");
        assert_eq!(bar(20.0, 10.0, 2), "██");
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("NVIDIA GeForce", 6), "NVIDI…");
    }

    #[test]
    fn test_display_name_uses_port_for_local_servers() {
        assert_eq!(display_name(&offline("127.0.0.1:8189")), ":8189");
        assert_eq!(display_name(&offline("gpu-01.lan:8188")), "gpu-01.lan:8188");
    }
}
