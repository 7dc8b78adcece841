//! Bounded retry with exponential backoff and jitter for provider requests.

use std::time::{Duration, Instant};

use anyhow::Result;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

/// A non-success HTTP response, kept typed so the retry loop can classify it.
#[derive(Debug, Error)]
#[error("http {status}: {body}")]
pub struct HttpStatusError {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Give up once this much time has passed, even with attempts left.
    pub max_elapsed_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 4000,
            max_elapsed_ms: 20_000,
        }
    }
}

impl RetryPolicy {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let num = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        Self {
            max_attempts: num("RETRY_MAX_ATTEMPTS")
                .filter(|&n| n > 0 && n <= 10)
                .map(|n| n as u32)
                .unwrap_or(d.max_attempts),
            base_delay_ms: num("RETRY_BASE_DELAY_MS")
                .filter(|&n| n > 0)
                .unwrap_or(d.base_delay_ms),
            max_delay_ms: num("RETRY_MAX_DELAY_MS")
                .filter(|&n| n > 0)
                .unwrap_or(d.max_delay_ms),
            max_elapsed_ms: num("RETRY_MAX_ELAPSED_MS")
                .filter(|&n| n > 0)
                .unwrap_or(d.max_elapsed_ms),
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Upper bound of the backoff before `attempt + 1`: `min(max, base * 2^(attempt-1))`.
    pub fn backoff_cap_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1);
        let multiplier = if exponent >= 32 { u64::MAX } else { 1u64 << exponent };
        self.base_delay_ms
            .saturating_mul(multiplier)
            .min(self.max_delay_ms)
    }

    /// Full jitter in `[0, cap)`.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let cap = self.backoff_cap_ms(attempt);
        if cap == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..cap)
        }
    }
}

/// Network errors and 408/425/429/5xx responses are worth another try; other
/// client errors and parse failures are not.
pub fn is_retryable(err: &anyhow::Error) -> bool {
    if let Some(status) = err.downcast_ref::<HttpStatusError>() {
        return matches!(status.status, 408 | 425 | 429 | 500..=599);
    }
    if let Some(req) = err.downcast_ref::<reqwest::Error>() {
        if let Some(status) = req.status() {
            return matches!(status.as_u16(), 408 | 425 | 429 | 500..=599);
        }
        return req.is_timeout() || req.is_connect() || req.is_request() || req.is_body();
    }
    false
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or the
/// policy is exhausted.
pub fn retry_blocking<T>(
    policy: &RetryPolicy,
    op_name: &str,
    mut operation: impl FnMut() -> Result<T>,
) -> Result<T> {
    let start = Instant::now();
    let mut attempt = 1u32;
    loop {
        match operation() {
            Ok(value) => {
                if attempt > 1 {
                    debug!(op = op_name, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                let elapsed = start.elapsed().as_millis() as u64;
                if attempt >= policy.max_attempts
                    || elapsed >= policy.max_elapsed_ms
                    || !is_retryable(&err)
                {
                    return Err(err);
                }
                let delay = policy.backoff_ms(attempt);
                warn!(
                    op = op_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay,
                    error = %err,
                    "retrying after error"
                );
                std::thread::sleep(Duration::from_millis(delay));
                attempt += 1;
            }
        }
    }
}
