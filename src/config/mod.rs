//! Platform configuration
//!
//! Fee and stake limits are read from environment variables with bounded
//! fallbacks, then injected into the services at construction. Services
//! never read ambient globals.

use serde::{Deserialize, Serialize};
use std::env;

/// Default platform fee as an integer percentage of the combined stake
pub const DEFAULT_PLATFORM_FEE_PERCENT: i64 = 10;

/// Fee percentage sanity bounds
pub const MIN_PLATFORM_FEE_PERCENT: i64 = 0;
pub const MAX_PLATFORM_FEE_PERCENT: i64 = 50;

/// Stake limits per player, in minor currency units ($1.00 - $1000.00)
pub const MIN_STAKE_CENTS: i64 = 100;
pub const MAX_STAKE_CENTS: i64 = 100_000;

/// Deposit limits ($1.00 - $10,000.00)
pub const MIN_DEPOSIT_CENTS: i64 = 100;
pub const MAX_DEPOSIT_CENTS: i64 = 1_000_000;

/// Minimum withdrawal ($1.00)
pub const MIN_WITHDRAWAL_CENTS: i64 = 100;

/// K-factor for ELO rating adjustments
pub const DEFAULT_ELO_K_FACTOR: i32 = 32;

/// Configuration injected into the match/escrow/wallet services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub platform_fee_percent: i64,
    pub min_stake_cents: i64,
    pub max_stake_cents: i64,
    pub min_deposit_cents: i64,
    pub max_deposit_cents: i64,
    pub min_withdrawal_cents: i64,
    pub elo_k_factor: i32,
    pub currency: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            platform_fee_percent: DEFAULT_PLATFORM_FEE_PERCENT,
            min_stake_cents: MIN_STAKE_CENTS,
            max_stake_cents: MAX_STAKE_CENTS,
            min_deposit_cents: MIN_DEPOSIT_CENTS,
            max_deposit_cents: MAX_DEPOSIT_CENTS,
            min_withdrawal_cents: MIN_WITHDRAWAL_CENTS,
            elo_k_factor: DEFAULT_ELO_K_FACTOR,
            currency: "USD".to_string(),
        }
    }
}

impl CoreConfig {
    /// Load configuration from the environment, falling back to defaults.
    ///
    /// Out-of-range fee values are clamped to the valid range rather than
    /// rejected, with a warning.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Some(fee) = env::var("PLATFORM_FEE_PERCENT")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
        {
            config.platform_fee_percent = if fee < MIN_PLATFORM_FEE_PERCENT {
                tracing::warn!(
                    fee = fee,
                    min = MIN_PLATFORM_FEE_PERCENT,
                    "PLATFORM_FEE_PERCENT below minimum, using minimum"
                );
                MIN_PLATFORM_FEE_PERCENT
            } else if fee > MAX_PLATFORM_FEE_PERCENT {
                tracing::warn!(
                    fee = fee,
                    max = MAX_PLATFORM_FEE_PERCENT,
                    "PLATFORM_FEE_PERCENT above maximum, using maximum"
                );
                MAX_PLATFORM_FEE_PERCENT
            } else {
                fee
            };
        }

        if let Some(k) = env::var("ELO_K_FACTOR")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
        {
            config.elo_k_factor = k.clamp(8, 64);
        }

        if let Ok(currency) = env::var("PLATFORM_CURRENCY") {
            if currency.len() == 3 {
                config.currency = currency.to_uppercase();
            } else {
                tracing::warn!(currency = %currency, "PLATFORM_CURRENCY must be a 3-letter code, keeping default");
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CoreConfig::default();
        assert_eq!(config.platform_fee_percent, 10);
        assert_eq!(config.min_stake_cents, 100);
        assert_eq!(config.max_stake_cents, 100_000);
        assert_eq!(config.elo_k_factor, 32);
        assert_eq!(config.currency, "USD");
    }

    #[test]
    fn bounds_are_consistent() {
        assert!(MIN_PLATFORM_FEE_PERCENT <= DEFAULT_PLATFORM_FEE_PERCENT);
        assert!(DEFAULT_PLATFORM_FEE_PERCENT <= MAX_PLATFORM_FEE_PERCENT);
        assert!(MIN_STAKE_CENTS < MAX_STAKE_CENTS);
        assert!(MIN_DEPOSIT_CENTS < MAX_DEPOSIT_CENTS);
    }
}
