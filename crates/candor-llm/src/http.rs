use std::time::Duration;

/// Shared HTTP client with a bounded request timeout.
///
/// Every outbound model call goes through a client built here; a hung
/// provider surfaces as [`crate::LlmError::Timeout`] instead of blocking
/// the pipeline indefinitely.
#[must_use]
pub fn default_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}
