//! Low-level HTTP helpers shared by the JSON strategies.

use std::time::Duration;

use crate::error::FetchError;

/// Build the per-job HTTP client.
pub(crate) fn build_client(
    timeout: Duration,
    user_agent: &str,
) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| FetchError::SessionInit(format!("failed to build HTTP client: {e}")))
}

/// Send `request` and decode the body as JSON.
///
/// 429 and 5xx map to transient errors, other non-2xx statuses and
/// undecodable bodies to permanent ones.
pub(crate) async fn fetch_json(
    request: reqwest::RequestBuilder,
) -> Result<serde_json::Value, FetchError> {
    let response = request
        .header(
            reqwest::header::ACCEPT,
            "application/json, text/plain, */*",
        )
        .send()
        .await?;

    let url = response.url().to_string();
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::RateLimited { url });
    }
    if !status.is_success() {
        return Err(FetchError::UnexpectedStatus {
            status: status.as_u16(),
            url,
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| FetchError::Parse {
        context: url,
        reason: e.to_string(),
    })
}
