//! Wire shapes of the worker's `/system_stats` and `/queue` replies.
//!
//! Only the keys the dashboard needs are required; everything else in the
//! reply is ignored so that newer server versions keep working.

use serde::Deserialize;
use serde_json::Value;

pub const SYSTEM_STATS: &str = "/system_stats";
pub const QUEUE: &str = "/queue";

#[derive(Debug, Clone, Deserialize)]
pub struct SystemStats {
    pub devices: Vec<Device>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    pub name: String,
    /// Bytes.
    pub vram_total: u64,
    /// Bytes.
    pub vram_free: u64,
    /// Not every server build reports it; some send a string.
    #[serde(default)]
    pub gpu_temperature: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueState {
    pub queue_running: Vec<Value>,
    pub queue_pending: Vec<Value>,
}
