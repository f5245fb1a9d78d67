//! Retry with exponential backoff for outbound provider calls.
//!
//! - HTTP 429 and 5xx → retry
//! - other 4xx → fail immediately
//! - network errors → retry
//! - backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Send a request built by `make_request` until it succeeds or retries run out.
///
/// Returns the first successful response, or a message describing the last
/// failure prefixed with `label`.
pub async fn send_with_retry<F, Fut>(
    label: &str,
    max_retries: u32,
    base_delay: Duration,
    mut make_request: F,
) -> Result<reqwest::Response, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = reqwest::Result<reqwest::Response>>,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = base_delay * (1u32 << (attempt - 1).min(5));
            warn!(label, attempt, delay_ms = delay.as_millis() as u64, "retrying");
            tokio::time::sleep(delay).await;
        }

        match make_request().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let body_text = response.text().await.unwrap_or_default();
                let msg = format!("{} error {}: {}", label, status, snippet(&body_text));

                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(msg);
                    continue;
                }
                return Err(msg);
            }
            Err(e) => {
                last_err = Some(format!("{} connection error: {}", label, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| format!("{} failed after retries", label)))
}

/// First 300 chars of an error body, for log and error messages.
pub fn snippet(body: &str) -> String {
    const MAX: usize = 300;
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
