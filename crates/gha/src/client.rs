//! Authenticated GitHub REST client with blocking rate-limit backoff.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::GhaError;
use crate::models::RateLimitResponse;

const GITHUB_API_URL: &str = "https://api.github.com";

/// Per-request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Pacing delay applied after every API call.
const PACING_DELAY_MS: u64 = 100;

/// Every this many calls, the rate-limit endpoint is consulted.
const RATE_CHECK_INTERVAL: u64 = 50;

/// Remaining-quota floor below which the client sleeps until reset.
const RATE_REMAINING_FLOOR: u64 = 100;

/// Buffer added on top of the advertised reset time.
const RATE_RESET_BUFFER_SECS: i64 = 60;

/// GitHub REST client shared by the collector and the remote labeler.
#[derive(Debug)]
pub struct GhaClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    calls: AtomicU64,
}

impl GhaClient {
    /// Create a client for the public GitHub API.
    ///
    /// # Errors
    ///
    /// Returns [`GhaError::MissingToken`] for an empty token, or an error if
    /// the HTTP client cannot be constructed.
    pub fn new(token: &str) -> Result<Self, GhaError> {
        Self::with_base_url(token, GITHUB_API_URL)
    }

    /// Create a client against an alternate API root (used by tests).
    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self, GhaError> {
        if token.trim().is_empty() {
            return Err(GhaError::MissingToken);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("buildset/0.3"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            calls: AtomicU64::new(0),
        })
    }

    /// Issue a GET and deserialize a successful JSON body.
    ///
    /// Non-2xx responses map to [`GhaError::Status`]; callers decide whether
    /// that is fatal (collector) or a per-item skip (labeler).
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GhaError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(&url)
            .query(query)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GhaError::Status { status, url });
        }

        response
            .json()
            .await
            .map_err(|source| GhaError::Parse { url, source })
    }

    /// Apply rate limiting around one API call: a short pacing sleep after
    /// every call, and a quota check every [`RATE_CHECK_INTERVAL`] calls
    /// that sleeps until reset when the remaining quota runs low. Failures
    /// while checking the quota are swallowed.
    pub async fn throttle(&self) {
        let calls = self.calls.fetch_add(1, Ordering::Relaxed) + 1;

        if calls % RATE_CHECK_INTERVAL == 0 {
            match self
                .get_json::<RateLimitResponse>("/rate_limit", &[])
                .await
            {
                Ok(limits) => {
                    info!(
                        calls,
                        remaining = limits.rate.remaining,
                        "Rate limit checkpoint"
                    );
                    if limits.rate.remaining < RATE_REMAINING_FLOOR {
                        let wait =
                            limits.rate.reset - chrono::Utc::now().timestamp() + RATE_RESET_BUFFER_SECS;
                        if wait > 0 {
                            warn!(wait_secs = wait, "Rate limit low, backing off until reset");
                            tokio::time::sleep(Duration::from_secs(wait.unsigned_abs())).await;
                        }
                    }
                }
                Err(e) => debug!(error = %e, "Rate limit check failed, continuing"),
            }
        }

        tokio::time::sleep(Duration::from_millis(PACING_DELAY_MS)).await;
    }

    /// Total API calls issued through [`throttle`](Self::throttle).
    pub fn calls_made(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_is_rejected() {
        assert!(matches!(GhaClient::new(""), Err(GhaError::MissingToken)));
        assert!(matches!(GhaClient::new("  "), Err(GhaError::MissingToken)));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = GhaClient::with_base_url("t", "http://localhost:9999/").unwrap();
        assert_eq!(client.base_url, "http://localhost:9999");
    }
}
