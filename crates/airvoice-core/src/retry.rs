//! Retry configuration and backoff calculation.
//!
//! The policy is a pure value object: given a retry count it produces the
//! delay before the next connection attempt. The async machinery that
//! actually waits lives in `airvoice-sse` (which has access to tokio);
//! this module contains the portable, sync-only building blocks:
//!
//! - [`RetryConfig`]: retry parameters (max retries, base delay, factor, cap)
//! - [`calculate_backoff_delay`]: geometric backoff with an upper bound
//! - [`should_retry`]: terminal-attempt check

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default maximum retries.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default backoff multiplier applied per attempt.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 1.2;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Configuration for reconnect retry logic.
///
/// These are configuration values, not constants — every client instance
/// can carry its own copy, and all fields have serde defaults so partial
/// JSON configs deserialize cleanly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay before the first retry in ms (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Multiplier applied for each successive attempt (default: 1.2).
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Upper bound on any computed delay in ms (default: 30000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_backoff_factor() -> f64 {
    DEFAULT_BACKOFF_FACTOR
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl RetryConfig {
    /// Delay before the next attempt, per [`calculate_backoff_delay`].
    #[must_use]
    pub fn delay_ms(&self, retry_count: u32) -> u64 {
        calculate_backoff_delay(
            retry_count,
            self.base_delay_ms,
            self.backoff_factor,
            self.max_delay_ms,
        )
    }

    /// Whether another attempt is allowed at the given retry count.
    #[must_use]
    pub fn should_retry(&self, retry_count: u32) -> bool {
        should_retry(retry_count, self.max_retries)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backoff calculation
// ─────────────────────────────────────────────────────────────────────────────

/// Calculate the geometric backoff delay for one retry.
///
/// Formula: `min(base_delay_ms × backoff_factor^retry_count, max_delay_ms)`.
///
/// The result is non-decreasing in `retry_count` for any factor ≥ 1 and
/// never exceeds `max_delay_ms`. Large attempt counts saturate at the cap
/// rather than overflowing (the intermediate math is `f64`).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn calculate_backoff_delay(
    retry_count: u32,
    base_delay_ms: u64,
    backoff_factor: f64,
    max_delay_ms: u64,
) -> u64 {
    let exponential = (base_delay_ms as f64) * backoff_factor.powi(retry_count.min(1024) as i32);
    let capped = exponential.min(max_delay_ms as f64);
    capped.round().max(0.0) as u64
}

/// Whether a retry is allowed: `false` once `retry_count` reaches
/// `max_retries`, `true` below it.
#[must_use]
pub fn should_retry(retry_count: u32, max_retries: u32) -> bool {
    retry_count < max_retries
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
