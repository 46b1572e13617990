//! Error types for solbundle.

use rust_decimal::Decimal;

/// Top-level error type for the bundling core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Custody error: {0}")]
    Custody(#[from] CustodyError),

    #[error("Quote error: {0}")]
    Quote(#[from] QuoteError),

    #[error("Submit error: {0}")]
    Submit(#[from] SubmitError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Input validation errors. Always user-correctable; never retried by the core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("recipient is not a valid Solana address")]
    InvalidAddress,

    #[error("amount is not a valid SOL value")]
    InvalidAmount,

    #[error("amount is below the minimum transfer of {min} SOL")]
    AmountTooSmall { min: Decimal },

    #[error("amount is above the maximum transfer of {max} SOL")]
    AmountTooLarge { max: Decimal },

    #[error("sender and recipient are the same address")]
    SelfTransfer,
}

/// Key custody errors.
///
/// `Unavailable` is fatal at startup; `DecryptionFailed` is a per-request
/// failure surfaced upstream as a generic signing failure. Cipher internals
/// are never included in the message.
#[derive(Debug, thiserror::Error)]
pub enum CustodyError {
    #[error("custody master key unavailable: {0}")]
    Unavailable(String),

    #[error("failed to decrypt signing key")]
    DecryptionFailed,
}

/// Fee quoting errors.
#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error("network reported no fee for the transfer message")]
    FeeUnavailable,

    #[error("network error while quoting: {0}")]
    Network(#[from] RpcError),
}

/// Confirmation/cancellation errors for an in-flight pending request.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("pending request is expired or unknown")]
    RequestExpiredOrUnknown,

    #[error("pending request belongs to a different user")]
    NotOwner,

    #[error("signing failed")]
    SigningFailed,

    #[error("transaction submission failed: {0}")]
    SubmissionFailed(#[source] RpcError),

    #[error("transaction status unknown; outcome was not recorded, do not retry blindly")]
    StatusUnknown(#[source] DatabaseError),
}

/// Ledger JSON-RPC transport errors.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("invalid RPC response: {0}")]
    InvalidResponse(String),

    #[error("failed to encode transaction: {0}")]
    Encode(String),
}

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Stored record is malformed: {0}")]
    Corrupt(String),

    #[cfg(feature = "postgres")]
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[cfg(feature = "postgres")]
    #[error("Pool build error: {0}")]
    PoolBuild(#[from] deadpool_postgres::CreatePoolError),

    #[cfg(feature = "postgres")]
    #[error("Pool runtime error: {0}")]
    PoolRuntime(#[from] deadpool_postgres::PoolError),
}

/// Result type alias for the bundling core.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn validation_errors_render_bounds() {
        let err = ValidationError::AmountTooSmall { min: dec!(0.001) };
        assert_eq!(
            err.to_string(),
            "amount is below the minimum transfer of 0.001 SOL"
        );

        let err = ValidationError::AmountTooLarge { max: dec!(10) };
        assert_eq!(
            err.to_string(),
            "amount is above the maximum transfer of 10 SOL"
        );
    }

    #[test]
    fn decryption_failure_reveals_no_cipher_detail() {
        let err = CustodyError::DecryptionFailed;
        assert_eq!(err.to_string(), "failed to decrypt signing key");
    }

    #[test]
    fn submit_errors_fold_into_top_level() {
        let err = Error::from(SubmitError::RequestExpiredOrUnknown);
        assert!(matches!(err, Error::Submit(_)));
        assert!(err.to_string().contains("expired or unknown"));
    }
}
