//! PostgreSQL store backend.
//!
//! Addresses, hashes, and decimal amounts are stored as TEXT in their
//! canonical string encodings; lamports and block heights as BIGINT. The
//! pending-request TTL is enforced in the read path: `get` and `take`
//! both carry the freshness predicate, so an expired row is unreachable
//! even before it is physically deleted.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Object, Pool, Runtime};
use rust_decimal::Decimal;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tokio_postgres::{NoTls, Row};

use super::{
    generate_request_id, HistoryStore, NewPendingRequest, PendingRequest, PendingStore,
    TransactionRecord, TxStatus, WalletRecord, WalletStore,
};
use crate::config::DatabaseConfig;
use crate::custody::EncryptedKey;
use crate::error::DatabaseError;

/// PostgreSQL-backed store.
pub struct PgStore {
    pool: Pool,
    ttl: chrono::Duration,
}

impl PgStore {
    /// Connect and bootstrap the schema.
    pub async fn connect(config: &DatabaseConfig, ttl: Duration) -> Result<Self, DatabaseError> {
        let mut cfg = deadpool_postgres::Config::new();
        cfg.url = Some(config.url.clone());
        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;

        let store = Self {
            pool,
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn conn(&self) -> Result<Object, DatabaseError> {
        Ok(self.pool.get().await?)
    }

    async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.conn().await?;
        conn.batch_execute(
            r#"
            CREATE TABLE IF NOT EXISTS wallets (
                user_id TEXT PRIMARY KEY,
                public_address TEXT NOT NULL,
                encrypted_key BYTEA NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );

            CREATE TABLE IF NOT EXISTS pending_requests (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                sender TEXT NOT NULL,
                recipient TEXT NOT NULL,
                amount TEXT NOT NULL,
                fee TEXT NOT NULL,
                blockhash TEXT NOT NULL,
                last_valid_block_height BIGINT NOT NULL,
                lamports BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_pending_requests_user ON pending_requests(user_id);

            CREATE TABLE IF NOT EXISTS transactions (
                signature TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                amount TEXT NOT NULL,
                fee TEXT NOT NULL,
                sender TEXT NOT NULL,
                recipient TEXT NOT NULL,
                status TEXT NOT NULL,
                failure_reason TEXT,
                recorded_at TIMESTAMPTZ NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_transactions_user ON transactions(user_id);
            "#,
        )
        .await?;
        Ok(())
    }

    fn freshness_cutoff(&self) -> DateTime<Utc> {
        Utc::now() - self.ttl
    }

    fn row_to_pending(row: &Row) -> Result<PendingRequest, DatabaseError> {
        let lamports: i64 = row.get("lamports");
        let last_valid_block_height: i64 = row.get("last_valid_block_height");
        Ok(PendingRequest {
            user_id: row.get("user_id"),
            sender: parse_text(row, "sender", Pubkey::from_str)?,
            recipient: parse_text(row, "recipient", Pubkey::from_str)?,
            amount_sol: parse_text(row, "amount", Decimal::from_str)?,
            fee_sol: parse_text(row, "fee", Decimal::from_str)?,
            blockhash: parse_text(row, "blockhash", Hash::from_str)?,
            last_valid_block_height: u64::try_from(last_valid_block_height)
                .map_err(|_| DatabaseError::Corrupt("negative block height".to_string()))?,
            lamports: u64::try_from(lamports)
                .map_err(|_| DatabaseError::Corrupt("negative lamports".to_string()))?,
            created_at: row.get("created_at"),
        })
    }

    fn row_to_transaction(row: &Row) -> Result<TransactionRecord, DatabaseError> {
        let status: String = row.get("status");
        Ok(TransactionRecord {
            user_id: row.get("user_id"),
            signature: parse_text(row, "signature", Signature::from_str)?,
            amount_sol: parse_text(row, "amount", Decimal::from_str)?,
            fee_sol: parse_text(row, "fee", Decimal::from_str)?,
            sender: parse_text(row, "sender", Pubkey::from_str)?,
            recipient: parse_text(row, "recipient", Pubkey::from_str)?,
            status: TxStatus::parse(&status)
                .ok_or_else(|| DatabaseError::Corrupt(format!("unknown status '{status}'")))?,
            failure_reason: row.get("failure_reason"),
            recorded_at: row.get("recorded_at"),
        })
    }
}

fn parse_text<T, E>(
    row: &Row,
    column: &str,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Result<T, DatabaseError> {
    let raw: String = row.get(column);
    parse(&raw).map_err(|_| DatabaseError::Corrupt(format!("malformed {column} '{raw}'")))
}

#[async_trait]
impl WalletStore for PgStore {
    async fn create_wallet(&self, record: &WalletRecord) -> Result<(), DatabaseError> {
        let conn = self.conn().await?;
        conn.execute(
            r#"
            INSERT INTO wallets (user_id, public_address, encrypted_key, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO NOTHING
            "#,
            &[
                &record.user_id,
                &record.address.to_string(),
                &record.encrypted_key.as_bytes(),
                &record.created_at,
            ],
        )
        .await?;
        Ok(())
    }

    async fn get_wallet(&self, user_id: &str) -> Result<Option<WalletRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt("SELECT * FROM wallets WHERE user_id = $1", &[&user_id])
            .await?;
        row.map(|row| {
            let encrypted: Vec<u8> = row.get("encrypted_key");
            Ok(WalletRecord {
                user_id: row.get("user_id"),
                address: parse_text(&row, "public_address", Pubkey::from_str)?,
                encrypted_key: EncryptedKey::from_bytes(encrypted),
                created_at: row.get("created_at"),
            })
        })
        .transpose()
    }
}

#[async_trait]
impl PendingStore for PgStore {
    async fn create(&self, request: NewPendingRequest) -> Result<String, DatabaseError> {
        let id = generate_request_id();
        let record = request.into_record(Utc::now());
        let lamports = i64::try_from(record.lamports)
            .map_err(|_| DatabaseError::Query("lamports exceed BIGINT".to_string()))?;
        let last_valid = i64::try_from(record.last_valid_block_height)
            .map_err(|_| DatabaseError::Query("block height exceeds BIGINT".to_string()))?;

        let conn = self.conn().await?;
        conn.execute(
            r#"
            INSERT INTO pending_requests
                (id, user_id, sender, recipient, amount, fee, blockhash,
                 last_valid_block_height, lamports, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
            &[
                &id,
                &record.user_id,
                &record.sender.to_string(),
                &record.recipient.to_string(),
                &record.amount_sol.to_string(),
                &record.fee_sol.to_string(),
                &record.blockhash.to_string(),
                &last_valid,
                &lamports,
                &record.created_at,
            ],
        )
        .await?;
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<PendingRequest>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                "SELECT * FROM pending_requests WHERE id = $1 AND created_at > $2",
                &[&id, &self.freshness_cutoff()],
            )
            .await?;
        row.map(|row| Self::row_to_pending(&row)).transpose()
    }

    async fn take(&self, id: &str) -> Result<Option<PendingRequest>, DatabaseError> {
        let conn = self.conn().await?;
        let row = conn
            .query_opt(
                "DELETE FROM pending_requests WHERE id = $1 AND created_at > $2 RETURNING *",
                &[&id, &self.freshness_cutoff()],
            )
            .await?;
        row.map(|row| Self::row_to_pending(&row)).transpose()
    }

    async fn delete(&self, id: &str) -> Result<(), DatabaseError> {
        let conn = self.conn().await?;
        conn.execute("DELETE FROM pending_requests WHERE id = $1", &[&id])
            .await?;
        Ok(())
    }

    async fn restore(&self, id: &str, request: PendingRequest) -> Result<(), DatabaseError> {
        let lamports = i64::try_from(request.lamports)
            .map_err(|_| DatabaseError::Query("lamports exceed BIGINT".to_string()))?;
        let last_valid = i64::try_from(request.last_valid_block_height)
            .map_err(|_| DatabaseError::Query("block height exceeds BIGINT".to_string()))?;

        let conn = self.conn().await?;
        conn.execute(
            r#"
            INSERT INTO pending_requests
                (id, user_id, sender, recipient, amount, fee, blockhash,
                 last_valid_block_height, lamports, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO NOTHING
            "#,
            &[
                &id,
                &request.user_id,
                &request.sender.to_string(),
                &request.recipient.to_string(),
                &request.amount_sol.to_string(),
                &request.fee_sol.to_string(),
                &request.blockhash.to_string(),
                &last_valid,
                &lamports,
                &request.created_at,
            ],
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for PgStore {
    async fn record_transaction(&self, record: &TransactionRecord) -> Result<(), DatabaseError> {
        let conn = self.conn().await?;
        conn.execute(
            r#"
            INSERT INTO transactions
                (signature, user_id, amount, fee, sender, recipient,
                 status, failure_reason, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (signature) DO NOTHING
            "#,
            &[
                &record.signature.to_string(),
                &record.user_id,
                &record.amount_sol.to_string(),
                &record.fee_sol.to_string(),
                &record.sender.to_string(),
                &record.recipient.to_string(),
                &record.status.as_str(),
                &record.failure_reason,
                &record.recorded_at,
            ],
        )
        .await?;
        Ok(())
    }

    async fn list_transactions(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>, DatabaseError> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT * FROM transactions WHERE user_id = $1 ORDER BY recorded_at DESC LIMIT $2",
                &[&user_id, &limit],
            )
            .await?;
        rows.iter().map(Self::row_to_transaction).collect()
    }
}
