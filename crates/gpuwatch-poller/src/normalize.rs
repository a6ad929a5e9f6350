use gpuwatch_common::server_status::round2;
use gpuwatch_common::{GpuTemperature, ServerSnapshot};
use serde_json::Value;

use crate::error::PollError;
use crate::payload::{QueueState, SystemStats, SYSTEM_STATS};

const BYTES_PER_GB: f64 = (1u64 << 30) as f64;

/// "RXT" is a transposed spelling some workers report. Unclear whether any
/// server still needs it; kept so those workers keep their short label.
const RTX_MARKERS: [&str; 2] = ["RTX", "RXT"];
const MODEL_CHARS: usize = 6;

/// Combine both replies of one worker into a snapshot. Only the first device is
/// considered.
pub fn normalize(stats: &SystemStats, queue: &QueueState) -> Result<ServerSnapshot, PollError> {
    let device = stats
        .devices
        .first()
        .ok_or_else(|| PollError::format(SYSTEM_STATS, "no devices reported"))?;

    let vram_total_gb = bytes_to_gb(device.vram_total);
    // a free figure above the total is a server glitch
    let vram_free_gb = bytes_to_gb(device.vram_free).min(vram_total_gb);
    let (current_task, workflow) = extract_current_task(&queue.queue_running);

    Ok(ServerSnapshot {
        device_name: device_label(&device.name),
        vram_total_gb,
        vram_free_gb,
        gpu_temperature: temperature(device.gpu_temperature.as_ref()),
        queue_running: queue.queue_running.len() as u64,
        queue_pending: queue.queue_pending.len() as u64,
        current_task,
        workflow,
    })
}

/// Bytes to GiB, rounded to two decimals.
pub fn bytes_to_gb(bytes: u64) -> f64 {
    round2(bytes as f64 / BYTES_PER_GB)
}

/// Short label for GeForce/RTX cards ("NVIDIA GeForce RTX 3090 Ti" -> "RTX 3090"),
/// anything else verbatim.
pub fn device_label(name: &str) -> String {
    for marker in RTX_MARKERS {
        if let Some((_, rest)) = name.split_once(marker) {
            // the model segment ends at a repeated marker
            let segment = rest.split(marker).next().unwrap_or(rest);
            let model: String = segment.chars().take(MODEL_CHARS).collect();
            let model = model.trim();
            if model.is_empty() {
                return "RTX".to_string();
            }
            return format!("RTX {model}");
        }
    }
    name.to_string()
}

fn temperature(raw: Option<&Value>) -> GpuTemperature {
    let celsius = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches("°C").trim().parse::<f64>().ok(),
        _ => None,
    };
    celsius.filter(|c| c.is_finite()).into()
}

/// Current task label and workflow of the first running job.
///
/// A running entry is `[number, prompt_id, prompt, extra_data, ...]`. The
/// `extra_pnginfo` block is looked up in the prompt slot first and then in
/// `extra_data`, where current servers put it. The label is the first widget
/// value of the workflow's last node. Any missing link yields `None` for the
/// parts that could not be resolved.
pub fn extract_current_task(running: &[Value]) -> (Option<String>, Option<Value>) {
    let Some(workflow) = running.first().and_then(embedded_workflow) else {
        return (None, None);
    };

    let task = workflow
        .get("nodes")
        .and_then(Value::as_array)
        .and_then(|nodes| nodes.last())
        .and_then(|node| node.get("widgets_values"))
        .and_then(Value::as_array)
        .and_then(|values| values.first())
        .and_then(widget_text);

    (task, Some(workflow.clone()))
}

fn embedded_workflow(entry: &Value) -> Option<&Value> {
    let entry = entry.as_array()?;
    [2, 3].into_iter().find_map(|slot| {
        entry
            .get(slot)?
            .get("extra_pnginfo")?
            .get("workflow")
            .filter(|w| w.is_object())
    })
}

fn widget_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stats(v: Value) -> SystemStats {
        serde_json::from_value(v).unwrap()
    }

    fn queue(v: Value) -> QueueState {
        serde_json::from_value(v).unwrap()
    }

    fn running_entry(slot: usize, workflow: Value) -> Value {
        let mut entry = vec![json!(7), json!("3f2a-prompt"), json!({}), json!({}), json!([])];
        entry[slot] = json!({ "extra_pnginfo": { "workflow": workflow } });
        Value::Array(entry)
    }

    #[test]
    fn test_bytes_to_gb() {
        assert_eq!(bytes_to_gb(8_589_934_592), 8.0);
        assert_eq!(bytes_to_gb(4_294_967_296), 4.0);
        assert_eq!(bytes_to_gb(25_757_220_864), 23.99);
        assert_eq!(bytes_to_gb(0), 0.0);
    }

    #[test]
    fn test_device_label() {
        assert_eq!(device_label("NVIDIA GeForce RTX 3090 Ti"), "RTX 3090");
        assert_eq!(device_label("cuda:0 NVIDIA GeForce RTX 4090 : cudaMallocAsync"), "RTX 4090");
        assert_eq!(device_label("NVIDIA RTX A6000"), "RTX A6000");
        assert_eq!(device_label("NVIDIA GeForce RXT 4080"), "RTX 4080");
        assert_eq!(device_label("Tesla T4"), "Tesla T4");
        assert_eq!(device_label("cpu"), "cpu");
        assert_eq!(device_label("RTX"), "RTX");
    }

    #[test]
    fn test_rtx_marker_wins_over_typo() {
        assert_eq!(device_label("RXT junk RTX 2080"), "RTX 2080");
    }

    #[test]
    fn test_model_segment_stops_at_repeated_marker() {
        assert_eq!(device_label("RTX RTX 3090"), "RTX");
        assert_eq!(device_label("NVIDIA RTX 40RTX90"), "RTX 40");
    }

    #[test]
    fn test_normalize() {
        let s = stats(json!({
            "system": { "os": "posix" },
            "devices": [
                {
                    "name": "cuda:0 NVIDIA GeForce RTX 3090 : cudaMallocAsync",
                    "type": "cuda",
                    "vram_total": 8589934592u64,
                    "vram_free": 4294967296u64,
                    "gpu_temperature": 64
                },
                { "name": "cuda:1 Tesla T4", "vram_total": 1, "vram_free": 1 }
            ]
        }));
        let q = queue(json!({ "queue_running": [[1], [2]], "queue_pending": [] }));

        let snap = normalize(&s, &q).unwrap();
        assert_eq!(snap.device_name, "RTX 3090");
        assert_eq!(snap.vram_total_gb, 8.0);
        assert_eq!(snap.vram_free_gb, 4.0);
        assert_eq!(snap.gpu_temperature, GpuTemperature::Celsius(64.0));
        assert_eq!(snap.queue_running, 2);
        assert_eq!(snap.queue_pending, 0);
        assert_eq!(snap.current_task, None);
        assert_eq!(snap.workflow, None);
    }

    #[test]
    fn test_missing_temperature_is_unknown() {
        let s = stats(json!({ "devices": [{ "name": "Tesla T4", "vram_total": 0, "vram_free": 0 }] }));
        let q = queue(json!({ "queue_running": [], "queue_pending": [] }));
        let snap = normalize(&s, &q).unwrap();
        assert_eq!(snap.gpu_temperature, GpuTemperature::Unknown);

        assert_eq!(temperature(Some(&json!("71"))), GpuTemperature::Celsius(71.0));
        assert_eq!(temperature(Some(&json!("N/A"))), GpuTemperature::Unknown);
        assert_eq!(temperature(Some(&Value::Null)), GpuTemperature::Unknown);
    }

    #[test]
    fn test_empty_devices_is_format_error() {
        let s = stats(json!({ "devices": [] }));
        let q = queue(json!({ "queue_running": [], "queue_pending": [] }));
        let err = normalize(&s, &q).unwrap_err();
        assert!(matches!(err, PollError::Format { endpoint: SYSTEM_STATS, .. }));
    }

    #[test]
    fn test_free_is_clamped_to_total() {
        let s = stats(json!({ "devices": [{ "name": "x", "vram_total": 1073741824u64, "vram_free": 2147483648u64 }] }));
        let q = queue(json!({ "queue_running": [], "queue_pending": [] }));
        let snap = normalize(&s, &q).unwrap();
        assert_eq!(snap.vram_free_gb, 1.0);
        assert_eq!(snap.vram_used_gb(), 0.0);
    }

    #[test]
    fn test_current_task_from_workflow() {
        let workflow = json!({
            "nodes": [
                { "id": 3, "widgets_values": [42, "fixed"] },
                { "id": 9, "widgets_values": ["ComfyUI_portrait", 1] }
            ]
        });
        for slot in [2, 3] {
            let (task, wf) = extract_current_task(&[running_entry(slot, workflow.clone())]);
            assert_eq!(task.as_deref(), Some("ComfyUI_portrait"));
            assert_eq!(wf.as_ref(), Some(&workflow));
        }
    }

    #[test]
    fn test_current_task_missing_links() {
        assert_eq!(extract_current_task(&[]), (None, None));
        assert_eq!(extract_current_task(&[json!([1, "id", {}, {}])]), (None, None));
        assert_eq!(extract_current_task(&[json!("not-a-tuple")]), (None, None));

        let no_widgets = json!({ "nodes": [{ "id": 1 }] });
        let (task, wf) = extract_current_task(&[running_entry(3, no_widgets.clone())]);
        assert_eq!(task, None);
        assert_eq!(wf, Some(no_widgets));

        let numeric = json!({ "nodes": [{ "widgets_values": [1024] }] });
        let (task, _) = extract_current_task(&[running_entry(3, numeric)]);
        assert_eq!(task.as_deref(), Some("1024"));
    }
}
