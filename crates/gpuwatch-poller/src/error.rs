use std::time::Duration;

/// Why a single server could not be polled.
///
/// Every variant except [`PollError::Client`] is downgraded to an unreachable
/// status record; the `Display` text becomes the record's error cause.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("{endpoint}: request failed: {reason}")]
    Network {
        endpoint: &'static str,
        reason: String,
    },

    #[error("no response within {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("{endpoint}: unexpected HTTP status {status}")]
    Protocol {
        endpoint: &'static str,
        status: u16,
    },

    #[error("{endpoint}: malformed payload: {reason}")]
    Format {
        endpoint: &'static str,
        reason: String,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl PollError {
    pub(crate) fn format(endpoint: &'static str, reason: impl Into<String>) -> Self {
        PollError::Format {
            endpoint,
            reason: reason.into(),
        }
    }

    pub(crate) fn from_reqwest(endpoint: &'static str, err: &reqwest::Error) -> Self {
        if err.is_decode() {
            return PollError::format(endpoint, err.to_string());
        }
        let reason = if err.is_timeout() {
            "timed out".to_string()
        } else if err.is_connect() {
            format!("connection failed ({})", root_cause(err))
        } else {
            root_cause(err)
        };
        PollError::Network { endpoint, reason }
    }
}

/// reqwest wraps hyper/io errors several levels deep; the innermost one is the
/// message an operator can act on ("Connection refused", "dns error").
fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(next) = current.source() {
        current = next;
    }
    current.to_string()
}
