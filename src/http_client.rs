use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;

use crate::retry::{HttpStatusError, RetryPolicy, retry_blocking};

const APP_USER_AGENT: &str = "footy-pipeline/0.1";
const ERROR_SNIPPET_CHARS: usize = 300;

pub fn build_http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build http client")
}

/// GET `url` and return the body, retrying transient failures per `policy`.
pub fn get_text(
    client: &Client,
    policy: &RetryPolicy,
    url: &str,
    query: &[(&str, &str)],
    headers: &[(&str, &str)],
) -> Result<String> {
    retry_blocking(policy, url, || {
        let mut req = client.get(url).query(query).header(USER_AGENT, APP_USER_AGENT);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let resp = req.send().context("request failed")?;
        let status = resp.status();
        let body = resp.text().context("failed reading body")?;
        if !status.is_success() {
            return Err(HttpStatusError {
                status: status.as_u16(),
                body: snippet(&body),
            }
            .into());
        }
        Ok(body)
    })
    .with_context(|| format!("GET {}", redact(url)))
}

fn snippet(body: &str) -> String {
    body.trim()
        .replace(['\n', '\r'], " ")
        .chars()
        .take(ERROR_SNIPPET_CHARS)
        .collect()
}

// Query strings may carry API keys; keep them out of error messages.
fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
