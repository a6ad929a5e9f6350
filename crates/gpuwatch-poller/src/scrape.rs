use gpuwatch_common::ServerAddress;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::PollError;

/// GET one worker endpoint and decode its JSON body.
///
/// Anything but `200 OK` is a protocol error; the body is only read on success.
pub async fn fetch_json<T: DeserializeOwned>(
    http: &reqwest::Client,
    address: &ServerAddress,
    endpoint: &'static str,
) -> Result<T, PollError> {
    let url = address.endpoint_url(endpoint);
    let resp = http.get(&url).send().await.map_err(|e| {
        tracing::debug!(error=%e, %url, "request failed");
        PollError::from_reqwest(endpoint, &e)
    })?;

    let status = resp.status();
    if status != StatusCode::OK {
        tracing::debug!(%url, status = status.as_u16(), "unexpected status");
        return Err(PollError::Protocol {
            endpoint,
            status: status.as_u16(),
        });
    }

    let body = resp
        .bytes()
        .await
        .map_err(|e| PollError::from_reqwest(endpoint, &e))?;
    serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(error=%e, %url, "failed to decode payload");
        PollError::format(endpoint, e.to_string())
    })
}
