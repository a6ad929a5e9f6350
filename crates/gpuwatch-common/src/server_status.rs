use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ServerAddress;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(from = "Option<f64>", into = "Option<f64>")]
pub enum GpuTemperature {
    Celsius(f64),
    #[default]
    Unknown,
}

impl GpuTemperature {
    pub fn celsius(&self) -> Option<f64> {
        match self {
            GpuTemperature::Celsius(c) => Some(*c),
            GpuTemperature::Unknown => None,
        }
    }
}

impl From<Option<f64>> for GpuTemperature {
    fn from(value: Option<f64>) -> Self {
        value.map_or(GpuTemperature::Unknown, GpuTemperature::Celsius)
    }
}

impl From<GpuTemperature> for Option<f64> {
    fn from(value: GpuTemperature) -> Self {
        value.celsius()
    }
}

impl fmt::Display for GpuTemperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuTemperature::Celsius(c) => write!(f, "{c}°C"),
            GpuTemperature::Unknown => f.write_str("N/A"),
        }
    }
}

/// Normalized data of a server that answered both endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub device_name: String,
    pub vram_total_gb: f64,
    pub vram_free_gb: f64,
    pub gpu_temperature: GpuTemperature,
    pub queue_running: u64,
    pub queue_pending: u64,
    pub current_task: Option<String>,
    /// Opaque workflow of the running job, passed through unmodified.
    pub workflow: Option<Value>,
}

impl ServerSnapshot {
    pub fn vram_used_gb(&self) -> f64 {
        round2((self.vram_total_gb - self.vram_free_gb).max(0.0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerState {
    Online(ServerSnapshot),
    Unreachable { error: String },
}

/// Result of polling one server during one cycle. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StatusRecord", into = "StatusRecord")]
pub struct ServerStatus {
    address: ServerAddress,
    observed_at: DateTime<Utc>,
    state: ServerState,
}

impl ServerStatus {
    pub fn online(address: ServerAddress, observed_at: DateTime<Utc>, snapshot: ServerSnapshot) -> Self {
        Self {
            address,
            observed_at,
            state: ServerState::Online(snapshot),
        }
    }

    pub fn unreachable(
        address: ServerAddress,
        observed_at: DateTime<Utc>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            address,
            observed_at,
            state: ServerState::Unreachable {
                error: error.into(),
            },
        }
    }

    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    pub fn is_reachable(&self) -> bool {
        matches!(self.state, ServerState::Online(_))
    }

    pub fn snapshot(&self) -> Option<&ServerSnapshot> {
        match &self.state {
            ServerState::Online(s) => Some(s),
            ServerState::Unreachable { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            ServerState::Online(_) => None,
            ServerState::Unreachable { error } => Some(error),
        }
    }
}

/// Flat wire shape of [`ServerStatus`] handed to presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StatusRecord {
    address: ServerAddress,
    port: Option<String>,
    reachable: bool,
    observed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default)]
    device_name: Option<String>,
    #[serde(default)]
    vram_total_gb: Option<f64>,
    #[serde(default)]
    vram_free_gb: Option<f64>,
    #[serde(default)]
    vram_used_gb: Option<f64>,
    #[serde(default)]
    gpu_temperature: Option<f64>,
    #[serde(default)]
    queue_running: Option<u64>,
    #[serde(default)]
    queue_pending: Option<u64>,
    #[serde(default)]
    current_task: Option<String>,
    #[serde(default)]
    workflow: Option<Value>,
}

impl From<ServerStatus> for StatusRecord {
    fn from(status: ServerStatus) -> Self {
        let port = status.address.port().map(str::to_string);
        let mut record = StatusRecord {
            address: status.address,
            port,
            reachable: false,
            observed_at: status.observed_at,
            error: None,
            device_name: None,
            vram_total_gb: None,
            vram_free_gb: None,
            vram_used_gb: None,
            gpu_temperature: None,
            queue_running: None,
            queue_pending: None,
            current_task: None,
            workflow: None,
        };
        match status.state {
            ServerState::Online(s) => {
                record.reachable = true;
                record.vram_used_gb = Some(s.vram_used_gb());
                record.device_name = Some(s.device_name);
                record.vram_total_gb = Some(s.vram_total_gb);
                record.vram_free_gb = Some(s.vram_free_gb);
                record.gpu_temperature = s.gpu_temperature.celsius();
                record.queue_running = Some(s.queue_running);
                record.queue_pending = Some(s.queue_pending);
                record.current_task = s.current_task;
                record.workflow = s.workflow;
            }
            ServerState::Unreachable { error } => record.error = Some(error),
        }
        record
    }
}

impl TryFrom<StatusRecord> for ServerStatus {
    type Error = String;

    fn try_from(r: StatusRecord) -> Result<Self, Self::Error> {
        if !r.reachable {
            let error = r.error.unwrap_or_else(|| "unreachable".to_string());
            return Ok(ServerStatus::unreachable(r.address, r.observed_at, error));
        }
        let missing = |field: &str| format!("reachable record for {} is missing `{field}`", r.address);
        let snapshot = ServerSnapshot {
            device_name: r.device_name.clone().ok_or_else(|| missing("device_name"))?,
            vram_total_gb: r.vram_total_gb.ok_or_else(|| missing("vram_total_gb"))?,
            vram_free_gb: r.vram_free_gb.ok_or_else(|| missing("vram_free_gb"))?,
            gpu_temperature: r.gpu_temperature.into(),
            queue_running: r.queue_running.ok_or_else(|| missing("queue_running"))?,
            queue_pending: r.queue_pending.ok_or_else(|| missing("queue_pending"))?,
            current_task: r.current_task,
            workflow: r.workflow,
        };
        Ok(ServerStatus::online(r.address, r.observed_at, snapshot))
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn addr(s: &str) -> ServerAddress {
        ServerAddress::parse(s).unwrap()
    }

    fn snapshot() -> ServerSnapshot {
        ServerSnapshot {
            device_name: "RTX 4090".to_string(),
            vram_total_gb: 23.99,
            vram_free_gb: 20.5,
            gpu_temperature: GpuTemperature::Celsius(61.0),
            queue_running: 1,
            queue_pending: 3,
            current_task: Some("portrait_v2".to_string()),
            workflow: Some(json!({"nodes": []})),
        }
    }

    #[test]
    fn test_vram_used() {
        assert_eq!(snapshot().vram_used_gb(), 3.49);
        let mut s = snapshot();
        s.vram_free_gb = 30.0;
        assert_eq!(s.vram_used_gb(), 0.0);
    }

    #[test]
    fn test_online_record_is_flat() {
        let status = ServerStatus::online(addr("10.0.0.1:8188"), Utc::now(), snapshot());
        let v = serde_json::to_value(&status).unwrap();
        assert_eq!(v["reachable"], json!(true));
        assert_eq!(v["port"], json!("8188"));
        assert_eq!(v["device_name"], json!("RTX 4090"));
        assert_eq!(v["gpu_temperature"], json!(61.0));
        assert_eq!(v["vram_used_gb"], json!(3.49));
        assert!(v.get("error").is_none());

        let back: ServerStatus = serde_json::from_value(v).unwrap();
        assert_eq!(back, status);
    }

    #[test]
    fn test_unreachable_record_has_no_data() {
        let status = ServerStatus::unreachable(addr("10.0.0.2:8188"), Utc::now(), "connection refused");
        assert!(!status.is_reachable());
        assert_eq!(status.error(), Some("connection refused"));
        assert!(status.snapshot().is_none());

        let v = serde_json::to_value(&status).unwrap();
        assert_eq!(v["reachable"], json!(false));
        assert_eq!(v["error"], json!("connection refused"));
        assert_eq!(v["queue_running"], Value::Null);
        assert_eq!(v["device_name"], Value::Null);
    }

    #[test]
    fn test_reachable_record_without_vram_is_rejected() {
        let v = json!({
            "address": "10.0.0.3:8188",
            "port": "8188",
            "reachable": true,
            "observed_at": "2024-05-01T12:00:00Z",
            "device_name": "RTX 3090",
            "queue_running": 0,
            "queue_pending": 0
        });
        assert!(serde_json::from_value::<ServerStatus>(v).is_err());
    }

    #[test]
    fn test_temperature_display() {
        assert_eq!(GpuTemperature::Celsius(72.0).to_string(), "72°C");
        assert_eq!(GpuTemperature::Unknown.to_string(), "N/A");
    }
}
