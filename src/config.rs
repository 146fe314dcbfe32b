use std::time::Duration;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

const DEFAULT_REFETCH_DELAY_MS: u64 = 1_000;
const DEFAULT_DEBOUNCE_MS: u64 = 1_000;
const DEFAULT_STALE_AFTER_SECS: u64 = 120;
const DEFAULT_READ_RECEIPT_MAX_ATTEMPTS: u32 = 4;
const DEFAULT_READ_RECEIPT_BACKOFF_MS: u64 = 400;

/// Runtime tuning for the synchronization engine. Every value has a default;
/// overrides come from `ORDERSYNC_*` environment variables.
#[derive(Clone, Debug, Deserialize)]
pub struct SyncConfig {
    /// Delay before the confirmatory refetch that follows a successful
    /// status update, absorbing backend eventual-consistency windows.
    #[serde(default = "default_refetch_delay_ms")]
    pub refetch_delay_ms: u64,

    /// Coalescing window for realtime-driven refreshes; bursts of push
    /// events collapse into one backend call.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Projection age beyond which a refresh is scheduled.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,

    /// Total remote attempts for read-receipt reconciliation.
    #[serde(default = "default_read_receipt_max_attempts")]
    pub read_receipt_max_attempts: u32,

    /// Base backoff between read-receipt attempts; doubles per retry.
    #[serde(default = "default_read_receipt_backoff_ms")]
    pub read_receipt_backoff_ms: u64,
}

fn default_refetch_delay_ms() -> u64 {
    DEFAULT_REFETCH_DELAY_MS
}
fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}
fn default_stale_after_secs() -> u64 {
    DEFAULT_STALE_AFTER_SECS
}
fn default_read_receipt_max_attempts() -> u32 {
    DEFAULT_READ_RECEIPT_MAX_ATTEMPTS
}
fn default_read_receipt_backoff_ms() -> u64 {
    DEFAULT_READ_RECEIPT_BACKOFF_MS
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refetch_delay_ms: DEFAULT_REFETCH_DELAY_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
            read_receipt_max_attempts: DEFAULT_READ_RECEIPT_MAX_ATTEMPTS,
            read_receipt_backoff_ms: DEFAULT_READ_RECEIPT_BACKOFF_MS,
        }
    }
}

impl SyncConfig {
    /// Loads configuration from the environment (`ORDERSYNC_` prefix),
    /// falling back to the defaults above.
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("ORDERSYNC"))
            .build()?
            .try_deserialize()
    }

    pub fn refetch_delay(&self) -> Duration {
        Duration::from_millis(self.refetch_delay_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    /// Backoff before retry `attempt` (1-based): base, 2×base, 4×base, …
    pub fn read_receipt_backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.read_receipt_backoff_ms << (attempt.saturating_sub(1)))
    }
}
