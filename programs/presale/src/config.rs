//! Ledger configuration.
//!
//! Operator-level knobs that are not part of any single presale: airdrop
//! batch limits, the post-close claim policy and the month length used by
//! monthly vesting.

use {
    crate::constants::{DEFAULT_MAX_AIRDROP_BATCH, SECONDS_PER_MONTH},
    serde::{Deserialize, Serialize},
};

/// Configuration for a [`PresaleController`](crate::controller::PresaleController).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Maximum allocation accounts accepted by one airdrop instruction.
    /// Default: 64.
    pub max_airdrop_batch: usize,

    /// Whether claims, refunds and airdrops are accepted after `close`.
    /// Contributions always stop at close.
    /// Default: true.
    pub claims_after_close: bool,

    /// Length of one vesting month in seconds.
    /// Default: 2_592_000 (30 days).
    pub seconds_per_month: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_airdrop_batch: DEFAULT_MAX_AIRDROP_BATCH,
            claims_after_close: true,
            seconds_per_month: SECONDS_PER_MONTH,
        }
    }
}

impl LedgerConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_airdrop_batch == 0 {
            return Err(ConfigError::InvalidAirdropBatch);
        }
        if self.seconds_per_month <= 0 {
            return Err(ConfigError::InvalidMonthLength(self.seconds_per_month));
        }
        Ok(())
    }
}

/// Errors in ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_airdrop_batch must be > 0")]
    InvalidAirdropBatch,
    #[error("seconds_per_month must be > 0, got {0}")]
    InvalidMonthLength(i64),
}
