//! HTTP retry helper for geocoder requests.
//!
//! Remote calls go through [`send_json`] instead of calling
//! `reqwest::RequestBuilder::send()` directly, so every request gets the
//! same handling of rate limiting and transient failures.
//!
//! ```ignore
//! let body = retry::send_json(&policy, || client.get(&url).query(&params)).await?;
//! ```

use std::time::Duration;

use crate::GeocodeError;

/// How often and how patiently to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay unit; retry `n` waits `n × base_delay`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based). Zero for the first
    /// attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

/// Sends the request built by `build_request` and parses the body as JSON.
///
/// The closure is called once per attempt since builders are consumed by
/// `.send()`.
///
/// Retries HTTP 429, HTTP 5xx and transient transport errors (timeouts,
/// connection failures, truncated bodies). Other 4xx statuses are
/// permanent and returned immediately.
///
/// # Errors
///
/// * [`GeocodeError::RateLimited`] if the provider still answers 429 after
///   all retries
/// * [`GeocodeError::Status`] for a permanent or exhausted non-success
///   status
/// * [`GeocodeError::Http`] for transport failures
/// * [`GeocodeError::Parse`] if the body is not JSON
#[allow(clippy::future_not_send)]
pub async fn send_json<F>(
    policy: &RetryPolicy,
    build_request: F,
) -> Result<serde_json::Value, GeocodeError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let max_retries = policy.max_retries;
    let mut last_error: Option<GeocodeError> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = policy.delay_for(attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        let response = match build_request().send().await {
            Ok(response) => response,
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    last_error = Some(GeocodeError::Http(e));
                    continue;
                }
                return Err(GeocodeError::Http(e));
            }
        };

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            log::warn!("  HTTP 429 (rate limited), attempt {}", attempt + 1);
            last_error = Some(GeocodeError::RateLimited);
            continue;
        }

        if status.is_server_error() {
            log::warn!("  HTTP {status} (server error)");
            last_error = Some(GeocodeError::Status {
                status: status.as_u16(),
            });
            continue;
        }

        if !status.is_success() {
            return Err(GeocodeError::Status {
                status: status.as_u16(),
            });
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  body read failed: {e}");
                    last_error = Some(GeocodeError::Http(e));
                    continue;
                }
                return Err(GeocodeError::Http(e));
            }
        };

        return serde_json::from_str(&text).map_err(|e| GeocodeError::Parse {
            message: format!("JSON parse failed: {e} ({} bytes)", text.len()),
        });
    }

    Err(last_error.unwrap_or(GeocodeError::RateLimited))
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}
