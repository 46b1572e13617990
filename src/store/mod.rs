//! Persistence contracts for wallets, pending requests, and history.
//!
//! Shapes mirror the three persisted collections (`wallets`,
//! `pending_requests`, `transactions`); storage technology stays behind
//! the traits. Backends: in-memory (tests, default wiring) and PostgreSQL
//! behind the `postgres` feature.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngCore;
use rust_decimal::Decimal;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

use crate::custody::EncryptedKey;
use crate::error::DatabaseError;

/// One custodial wallet per user. Immutable once created.
#[derive(Debug, Clone)]
pub struct WalletRecord {
    pub user_id: String,
    pub address: Pubkey,
    pub encrypted_key: EncryptedKey,
    pub created_at: DateTime<Utc>,
}

/// A quoted transfer awaiting confirmation, before the store assigns its id
/// and creation timestamp.
#[derive(Debug, Clone)]
pub struct NewPendingRequest {
    pub user_id: String,
    pub sender: Pubkey,
    pub recipient: Pubkey,
    pub amount_sol: Decimal,
    pub fee_sol: Decimal,
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
    /// Raw amount in lamports; the value that gets signed.
    pub lamports: u64,
}

/// A persisted pending request as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub user_id: String,
    pub sender: Pubkey,
    pub recipient: Pubkey,
    pub amount_sol: Decimal,
    pub fee_sol: Decimal,
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
    pub lamports: u64,
    pub created_at: DateTime<Utc>,
}

impl NewPendingRequest {
    pub(crate) fn into_record(self, created_at: DateTime<Utc>) -> PendingRequest {
        PendingRequest {
            user_id: self.user_id,
            sender: self.sender,
            recipient: self.recipient,
            amount_sol: self.amount_sol,
            fee_sol: self.fee_sol,
            blockhash: self.blockhash,
            last_valid_block_height: self.last_valid_block_height,
            lamports: self.lamports,
            created_at,
        }
    }
}

/// Terminal status of a submission that reached the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Confirmed,
    Failed,
}

impl TxStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "confirmed" => Some(Self::Confirmed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Append-only record of one submission attempt that reached the network.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub user_id: String,
    pub signature: Signature,
    pub amount_sol: Decimal,
    pub fee_sol: Decimal,
    pub sender: Pubkey,
    pub recipient: Pubkey,
    pub status: TxStatus,
    /// Distinguished failure reason (`timeout`, or the network error text).
    pub failure_reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    /// Insert a wallet; a concurrent insert for the same user must not
    /// produce a second record.
    async fn create_wallet(&self, record: &WalletRecord) -> Result<(), DatabaseError>;

    async fn get_wallet(&self, user_id: &str) -> Result<Option<WalletRecord>, DatabaseError>;
}

#[async_trait]
pub trait PendingStore: Send + Sync {
    /// Persist a quoted request under a fresh unguessable id and stamp its
    /// creation time. Never overwrites an existing id.
    async fn create(&self, request: NewPendingRequest) -> Result<String, DatabaseError>;

    /// `None` for unknown ids and for records past the TTL; callers cannot
    /// tell the two apart.
    async fn get(&self, id: &str) -> Result<Option<PendingRequest>, DatabaseError>;

    /// Atomic delete-returning-previous-value with the same TTL rule as
    /// `get`. The linearization point for racing confirm/cancel.
    async fn take(&self, id: &str) -> Result<Option<PendingRequest>, DatabaseError>;

    /// Idempotent; deleting an absent id is not an error.
    async fn delete(&self, id: &str) -> Result<(), DatabaseError>;

    /// Reinstate a taken request under its original id and creation
    /// timestamp, so its remaining TTL is unchanged.
    async fn restore(&self, id: &str, request: PendingRequest) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append-only; at most one record per signature.
    async fn record_transaction(&self, record: &TransactionRecord) -> Result<(), DatabaseError>;

    async fn list_transactions(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>, DatabaseError>;
}

/// Unified persistence surface consumed by the orchestrator.
pub trait Store: WalletStore + PendingStore + HistoryStore {}

impl<T: WalletStore + PendingStore + HistoryStore> Store for T {}

/// 8 random bytes as 16 lowercase hex chars; 64 bits of entropy, collision
/// probability treated as negligible.
pub(crate) fn generate_request_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_sixteen_hex_chars() {
        let id = generate_request_id();
        assert_eq!(id.len(), 16);
        assert!(id.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn tx_status_round_trips_through_storage_form() {
        for status in [TxStatus::Confirmed, TxStatus::Failed] {
            assert_eq!(TxStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TxStatus::parse("pending"), None);
    }
}
