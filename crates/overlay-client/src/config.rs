//! Local process configuration.
//!
//! Loading flow:
//! 1. Start with [`ClientConfig::default()`]
//! 2. Apply `OVERLAY_*` environment overrides
//! 3. The binary applies CLI flags on top
//!
//! Env values are parsed strictly; out-of-range or unparsable values are
//! warned about and ignored.

use std::time::Duration;

use overlay_core::config::DEFAULT_CAPACITY;

use crate::connection::DEFAULT_RECONNECT_DELAY;

/// Page URL used when nothing else is configured.
pub const DEFAULT_PAGE_URL: &str = "http://127.0.0.1:8080/";

/// Period of the clear and decay sweeps.
pub const DEFAULT_SWEEP_TICK: Duration = Duration::from_millis(500);

/// Timeout applied to settings requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Runtime knobs for the overlay client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// URL the overlay page is served from.
    pub page_url: String,
    /// Fixed delay before each reconnect attempt.
    pub reconnect_delay: Duration,
    /// Sweep period.
    pub sweep_tick: Duration,
    /// Store capacity until settings arrive.
    pub default_capacity: usize,
    /// HTTP timeout for the settings fetch.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            page_url: DEFAULT_PAGE_URL.to_owned(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            sweep_tick: DEFAULT_SWEEP_TICK,
            default_capacity: DEFAULT_CAPACITY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        apply_env_overrides(&mut config);
        config
    }
}

/// Apply `OVERLAY_*` environment overrides.
pub fn apply_env_overrides(config: &mut ClientConfig) {
    if let Some(v) = read_env_string("OVERLAY_PAGE_URL") {
        config.page_url = v;
    }
    if let Some(v) = read_env_u64("OVERLAY_RECONNECT_DELAY_MS", 10, 600_000) {
        config.reconnect_delay = Duration::from_millis(v);
    }
    if let Some(v) = read_env_u64("OVERLAY_SWEEP_TICK_MS", 10, 60_000) {
        config.sweep_tick = Duration::from_millis(v);
    }
    if let Some(v) = read_env_usize("OVERLAY_DEFAULT_CAPACITY", 0, 100_000) {
        config.default_capacity = v;
    }
    if let Some(v) = read_env_u64("OVERLAY_REQUEST_TIMEOUT_MS", 100, 600_000) {
        config.request_timeout = Duration::from_millis(v);
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers ─────────────────────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    let val = std::env::var(name).ok()?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}
