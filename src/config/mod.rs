//! Configuration for solbundle.
//!
//! Settings are loaded with priority: env var > default. `DATABASE_URL` and
//! the custody master key come from the environment (a local `.env` is
//! loaded via dotenvy early in startup); numeric knobs all have defaults.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;

use crate::error::ConfigError;

const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
const DEFAULT_CONFIRM_TIMEOUT_SECS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_POLL_INTERVAL_MILLIS: u64 = 2_000;
const DEFAULT_PENDING_TTL_SECS: u64 = 15 * 60;

/// Main configuration for the bundling core.
#[derive(Debug, Clone)]
pub struct Config {
    pub rpc: RpcConfig,
    pub custody: CustodyConfig,
    pub transfer: TransferLimits,
    pub pending: PendingConfig,
    pub database: Option<DatabaseConfig>,
}

impl Config {
    /// Resolve the full configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            rpc: RpcConfig::resolve()?,
            custody: CustodyConfig::resolve()?,
            transfer: TransferLimits::resolve()?,
            pending: PendingConfig::resolve()?,
            database: DatabaseConfig::resolve()?,
        })
    }
}

/// Solana JSON-RPC endpoint and confirmation-wait knobs.
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub url: String,
    /// Per-request HTTP timeout; a hung endpoint must not stall the flow.
    pub request_timeout: Duration,
    /// Upper bound on waiting for a submitted transaction to confirm.
    pub confirm_timeout: Duration,
    /// Interval between signature-status polls while waiting.
    pub poll_interval: Duration,
}

impl RpcConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let url = optional_env("SOLANA_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        let request_timeout = Duration::from_secs(parse_env_u64(
            "RPC_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);
        let confirm_timeout = Duration::from_secs(parse_env_u64(
            "CONFIRM_TIMEOUT_SECS",
            DEFAULT_CONFIRM_TIMEOUT_SECS,
        )?);
        let poll_interval = Duration::from_millis(parse_env_u64(
            "CONFIRM_POLL_INTERVAL_MS",
            DEFAULT_POLL_INTERVAL_MILLIS,
        )?);
        Ok(Self {
            url,
            request_timeout,
            confirm_timeout,
            poll_interval,
        })
    }
}

/// Custody master key configuration.
///
/// The key is process-wide, loaded once at startup, held only in memory,
/// and never derived from user input.
#[derive(Debug, Clone)]
pub struct CustodyConfig {
    /// 64-char hex encoding of the 32-byte AES-256-GCM master key.
    pub master_key_hex: SecretString,
}

impl CustodyConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let raw = optional_env("WALLET_ENCRYPTION_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("WALLET_ENCRYPTION_KEY".to_string()))?;
        Ok(Self {
            master_key_hex: SecretString::from(raw),
        })
    }
}

/// Transfer amount bounds, in SOL.
#[derive(Debug, Clone)]
pub struct TransferLimits {
    pub min_sol: Decimal,
    pub max_sol: Decimal,
}

impl Default for TransferLimits {
    fn default() -> Self {
        Self {
            min_sol: dec!(0.001),
            max_sol: dec!(10),
        }
    }
}

impl TransferLimits {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let min_sol = parse_env_decimal("TRANSFER_MIN_SOL", defaults.min_sol)?;
        let max_sol = parse_env_decimal("TRANSFER_MAX_SOL", defaults.max_sol)?;
        if min_sol <= Decimal::ZERO || max_sol <= min_sol {
            return Err(ConfigError::InvalidValue {
                key: "TRANSFER_MIN_SOL/TRANSFER_MAX_SOL".to_string(),
                message: format!("bounds must satisfy 0 < min < max, got {min_sol}..{max_sol}"),
            });
        }
        Ok(Self { min_sol, max_sol })
    }
}

/// Pending-request lifecycle knobs.
#[derive(Debug, Clone)]
pub struct PendingConfig {
    /// Time-to-live after which a quoted request is no longer actionable.
    pub ttl: Duration,
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_PENDING_TTL_SECS),
        }
    }
}

impl PendingConfig {
    pub(crate) fn resolve() -> Result<Self, ConfigError> {
        let ttl = Duration::from_secs(parse_env_u64(
            "PENDING_REQUEST_TTL_SECS",
            DEFAULT_PENDING_TTL_SECS,
        )?);
        Ok(Self { ttl })
    }
}

/// PostgreSQL connection configuration (used with the `postgres` feature).
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

impl DatabaseConfig {
    pub(crate) fn resolve() -> Result<Option<Self>, ConfigError> {
        Ok(optional_env("DATABASE_URL").map(|url| Self { url }))
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    match optional_env(key) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected an integer, got '{raw}'"),
        }),
        None => Ok(default),
    }
}

fn parse_env_decimal(key: &str, default: Decimal) -> Result<Decimal, ConfigError> {
    match optional_env(key) {
        Some(raw) => Decimal::from_str(&raw).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a decimal, got '{raw}': {e}"),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits_match_contract() {
        let limits = TransferLimits::default();
        assert_eq!(limits.min_sol, dec!(0.001));
        assert_eq!(limits.max_sol, dec!(10));
    }

    #[test]
    fn default_pending_ttl_is_fifteen_minutes() {
        assert_eq!(PendingConfig::default().ttl, Duration::from_secs(900));
    }

    #[test]
    fn rpc_timeouts_default_to_bounded_values() {
        let rpc = RpcConfig::resolve().unwrap();
        assert_eq!(rpc.request_timeout, Duration::from_secs(30));
        assert_eq!(rpc.confirm_timeout, Duration::from_secs(300));
        assert_eq!(rpc.poll_interval, Duration::from_millis(2_000));
    }
}
