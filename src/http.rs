use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Request, RequestBuilder};
use serde_json::Value;

/// Build the shared HTTP client. `timeout` bounds every request made through it
/// unless a request overrides it.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(concat!("wlfi-watcher/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

/// Finish a request builder, naming the call in the error.
pub fn build_request(req: RequestBuilder, what: &str) -> Result<Request> {
    req.build().with_context(|| format!("{what}: invalid request"))
}

/// Send a request and decode the body as JSON.
///
/// Connection failures, timeouts and non-2xx statuses are errors. A 2xx body
/// that is not JSON is also an error; callers decide how to read the shape.
pub async fn send_json(client: &Client, req: Request, what: &str) -> Result<Value> {
    let resp = client
        .execute(req)
        .await
        .with_context(|| format!("{what}: request failed"))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("{what}: HTTP {status}: {}", truncate(&body, 200));
    }
    resp.json::<Value>()
        .await
        .with_context(|| format!("{what}: invalid JSON body"))
}

/// Cut `s` to at most `max` bytes on a char boundary.
pub fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_string_untouched() {
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn truncate_respects_char_boundary() {
        // "é" is two bytes; cutting at 2 would split it
        assert_eq!(truncate("aé", 2), "a");
        assert_eq!(truncate("abcdef", 3), "abc");
    }

    #[test]
    fn bad_url_fails_at_build() {
        let client = Client::new();
        let err = build_request(client.get("not a url"), "pools").unwrap_err();
        assert!(format!("{err:#}").starts_with("pools: invalid request"));
    }

    #[test]
    fn client_builds_with_timeout() {
        assert!(build_client(Duration::from_secs(10)).is_ok());
    }
}
