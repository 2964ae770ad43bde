//! # Runtime Configuration Module
//!
//! Environment-variable based configuration for the orchestration engine.
//!
//! ## Environment Variables
//!
//! ### `CAMSHAFT_STACK_SIZE`
//!
//! Stack size for handler coroutines, in decimal (`65536`) or hex (`0x10000`).
//! Default: `0x10000` (64 KB). Larger stacks support deeper call chains;
//! smaller stacks reduce memory for many concurrent coroutines.
//!
//! ### `CAMSHAFT_EMPTY_BODY_STATUS`
//!
//! Status code used when a handler returns no body: `200` (default) or `204`.
//!
//! ### `CAMSHAFT_VALIDATION_STATUS`
//!
//! Status code used for request schema validation failures: `422` (default)
//! or `400`.
//!
//! ### `CAMSHAFT_BACKGROUND_WORKERS` / `CAMSHAFT_BACKGROUND_QUEUE_BOUND`
//!
//! Number of background worker coroutines (default: 2) and the bound above
//! which background jobs are shed (default: 1024).

use std::env;

fn parse_size(val: &str, default: usize) -> usize {
    if let Some(hex) = val.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).unwrap_or(default)
    } else {
        val.parse().unwrap_or(default)
    }
}

/// Configuration for the background job queue (see [`crate::background`]).
#[derive(Debug, Clone, Copy)]
pub struct BackgroundConfig {
    /// Number of worker coroutines draining the queue
    pub workers: usize,
    /// Queue depth above which new jobs are shed
    pub queue_bound: usize,
    /// Stack size for worker coroutines
    pub stack_size: usize,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_bound: 1024,
            stack_size: 0x10000,
        }
    }
}

/// Runtime configuration loaded from environment variables.
///
/// Load at startup with [`RuntimeConfig::from_env()`], or start from
/// `RuntimeConfig::default()` and adjust fields in code.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for handler coroutines in bytes (default: 64 KB / 0x10000)
    pub stack_size: usize,
    /// Status for handler responses with an empty body (200 or 204)
    pub empty_body_status: u16,
    /// Status for request schema validation failures (422 or 400)
    pub validation_status: u16,
    /// Background queue configuration
    pub background: BackgroundConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: 0x10000,
            empty_body_status: 200,
            validation_status: 422,
            background: BackgroundConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable values fall back to defaults; out-of-range status
    /// codes are rejected rather than propagated.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let stack_size = env::var("CAMSHAFT_STACK_SIZE")
            .map(|v| parse_size(&v, defaults.stack_size))
            .unwrap_or(defaults.stack_size);

        let empty_body_status = env::var("CAMSHAFT_EMPTY_BODY_STATUS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|s| *s == 200 || *s == 204)
            .unwrap_or(defaults.empty_body_status);

        let validation_status = env::var("CAMSHAFT_VALIDATION_STATUS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|s| *s == 422 || *s == 400)
            .unwrap_or(defaults.validation_status);

        let workers = env::var("CAMSHAFT_BACKGROUND_WORKERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|w| *w > 0)
            .unwrap_or(defaults.background.workers);

        let queue_bound = env::var("CAMSHAFT_BACKGROUND_QUEUE_BOUND")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.background.queue_bound);

        RuntimeConfig {
            stack_size,
            empty_body_status,
            validation_status,
            background: BackgroundConfig {
                workers,
                queue_bound,
                stack_size,
            },
        }
    }
}
