use std::time::Duration;

use tracing::warn;

/// Retry behaviour for idempotent GET requests.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Delay before the first retry; doubles per attempt up to 16x.
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << attempt.min(4))
    }
}

/// Retry an HTTP GET with exponential backoff.
///
/// Retries on network errors and 5xx responses.
/// Returns immediately on success or 4xx; the last 5xx response is returned
/// as-is once retries are exhausted.
pub async fn retry_get(
    client: &reqwest::Client,
    url: &str,
    auth_token: Option<&str>,
    config: &RetryConfig,
) -> Result<reqwest::Response, reqwest::Error> {
    let max_attempts = config.max_retries + 1;
    let mut attempt = 0;

    loop {
        let mut req = client.get(url).header("Accept", "application/json");
        if let Some(token) = auth_token {
            req = req.bearer_auth(token);
        }

        let retries_left = attempt + 1 < max_attempts;
        match req.send().await {
            Ok(resp) if resp.status().is_server_error() && retries_left => {
                let delay = config.delay_for(attempt);
                warn!(
                    "GET {} attempt {}/{} failed (HTTP {}), retrying in {:?}",
                    url,
                    attempt + 1,
                    max_attempts,
                    resp.status(),
                    delay,
                );
                tokio::time::sleep(delay).await;
            }
            Ok(resp) => return Ok(resp),
            Err(e) if retries_left => {
                let delay = config.delay_for(attempt);
                warn!(
                    "GET {} attempt {}/{} failed ({}), retrying in {:?}",
                    url,
                    attempt + 1,
                    max_attempts,
                    e,
                    delay,
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
        attempt += 1;
    }
}
