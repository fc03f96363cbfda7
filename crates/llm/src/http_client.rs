//! HTTP Client Factory
//!
//! Builds the reqwest client shared by the transport. Kept as a factory so
//! connection-level policy (user agent, TCP keepalive) stays in one place.

use std::time::Duration;

/// Build the `reqwest::Client` used for chat-completion requests.
///
/// No overall request timeout is set: LLM calls have no built-in deadline
/// and streamed responses can legitimately run for minutes. Connection
/// establishment is bounded so dead endpoints fail fast.
pub fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .expect("failed to build reqwest client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let _client = build_http_client();
    }
}
