//! services/api/src/adapters/http.rs
//!
//! Plumbing shared by the vendors called over plain `reqwest`.

use activity_planner_core::GenerationCause;
use serde::{de::DeserializeOwned, Serialize};

/// Sends `body` as JSON and decodes a successful answer into `T`.
///
/// Non-success statuses keep the vendor's status code and body so callers can
/// surface the reason.
pub(crate) async fn post_json<B, T>(
    request: reqwest::RequestBuilder,
    body: &B,
) -> Result<T, GenerationCause>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| GenerationCause::transport(e.status().map(|s| s.as_u16()), e.to_string()))?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| GenerationCause::transport(Some(status.as_u16()), e.to_string()))?;

    if !status.is_success() {
        return Err(GenerationCause::transport(Some(status.as_u16()), text));
    }

    serde_json::from_str(&text)
        .map_err(|e| GenerationCause::Malformed(format!("Failed to parse response: {}", e)))
}
