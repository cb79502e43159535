//! Grant lifecycle configuration.

use std::time::Duration;

use chrono::TimeDelta;

use crate::ports::token_generator::DEFAULT_TOKEN_LEN;

/// What happens to a record once it has been consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Keep consumed records until their TTL elapses.
    #[default]
    RetainUntilExpiry,
    /// Remove the record in the same atomic step that consumes it.
    RemoveOnConsume,
}

/// Built from command line flags by the server; `Default` holds the service contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantConfig {
    /// Lifetime of a record, measured from `created_at`.
    pub ttl: Duration,

    /// Attempts at finding an unused token before `CreationFailed`.
    pub max_create_attempts: u32,

    /// Upper bound for any single store call.
    pub store_timeout: Duration,

    /// How often the sweeper purges expired records.
    pub sweep_interval: Duration,

    pub token_length: usize,

    pub retention: RetentionPolicy,
}

impl Default for GrantConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            max_create_attempts: 3,
            store_timeout: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(60),
            token_length: DEFAULT_TOKEN_LEN,
            retention: RetentionPolicy::default(),
        }
    }
}

impl GrantConfig {
    /// TTL as a calendar delta. Saturates instead of failing on absurd values.
    pub fn ttl_delta(&self) -> TimeDelta {
        TimeDelta::from_std(self.ttl).unwrap_or(TimeDelta::MAX)
    }
}
