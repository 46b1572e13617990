//! In-memory store backend.
//!
//! Single-process durability only; used by tests and local wiring. The
//! pending map enforces the same logical-expiry rule as the SQL backend:
//! a record past its TTL is invisible to `get`/`take` even before it is
//! physically removed.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::{
    generate_request_id, NewPendingRequest, PendingRequest, TransactionRecord, WalletRecord,
};
use crate::error::DatabaseError;
use crate::store::{HistoryStore, PendingStore, WalletStore};

#[derive(Default)]
struct Inner {
    wallets: HashMap<String, WalletRecord>,
    pending: HashMap<String, PendingRequest>,
    transactions: Vec<TransactionRecord>,
}

pub struct MemoryStore {
    ttl: chrono::Duration,
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn is_live(&self, request: &PendingRequest) -> bool {
        Utc::now().signed_duration_since(request.created_at) <= self.ttl
    }
}

#[async_trait]
impl WalletStore for MemoryStore {
    async fn create_wallet(&self, record: &WalletRecord) -> Result<(), DatabaseError> {
        let mut inner = self.inner.lock().await;
        inner
            .wallets
            .entry(record.user_id.clone())
            .or_insert_with(|| record.clone());
        Ok(())
    }

    async fn get_wallet(&self, user_id: &str) -> Result<Option<WalletRecord>, DatabaseError> {
        let inner = self.inner.lock().await;
        Ok(inner.wallets.get(user_id).cloned())
    }
}

#[async_trait]
impl PendingStore for MemoryStore {
    async fn create(&self, request: NewPendingRequest) -> Result<String, DatabaseError> {
        let id = generate_request_id();
        let record = request.into_record(Utc::now());
        let mut inner = self.inner.lock().await;
        inner.pending.insert(id.clone(), record);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Option<PendingRequest>, DatabaseError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .pending
            .get(id)
            .filter(|request| self.is_live(request))
            .cloned())
    }

    async fn take(&self, id: &str) -> Result<Option<PendingRequest>, DatabaseError> {
        let mut inner = self.inner.lock().await;
        match inner.pending.remove(id) {
            Some(request) if self.is_live(&request) => Ok(Some(request)),
            // Expired records are dropped here; they were already dead.
            _ => Ok(None),
        }
    }

    async fn delete(&self, id: &str) -> Result<(), DatabaseError> {
        let mut inner = self.inner.lock().await;
        inner.pending.remove(id);
        Ok(())
    }

    async fn restore(&self, id: &str, request: PendingRequest) -> Result<(), DatabaseError> {
        let mut inner = self.inner.lock().await;
        inner.pending.insert(id.to_string(), request);
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn record_transaction(&self, record: &TransactionRecord) -> Result<(), DatabaseError> {
        let mut inner = self.inner.lock().await;
        if inner
            .transactions
            .iter()
            .any(|existing| existing.signature == record.signature)
        {
            return Ok(());
        }
        inner.transactions.push(record.clone());
        Ok(())
    }

    async fn list_transactions(
        &self,
        user_id: &str,
        limit: i64,
    ) -> Result<Vec<TransactionRecord>, DatabaseError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .transactions
            .iter()
            .rev()
            .filter(|record| record.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TxStatus;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use solana_sdk::hash::Hash;
    use solana_sdk::signature::{Keypair, Signature, Signer};

    fn new_request(user_id: &str) -> NewPendingRequest {
        NewPendingRequest {
            user_id: user_id.to_string(),
            sender: Keypair::new().pubkey(),
            recipient: Keypair::new().pubkey(),
            amount_sol: dec!(1.5),
            fee_sol: dec!(0.000005),
            blockhash: Hash::new_unique(),
            last_valid_block_height: 100,
            lamports: 1_500_000_000,
        }
    }

    #[tokio::test]
    async fn get_returns_request_unchanged() {
        let store = MemoryStore::new(Duration::from_secs(900));
        let request = new_request("user-1");
        let id = store.create(request.clone()).await.unwrap();

        let fetched = store.get(&id).await.unwrap().unwrap();
        assert_eq!(fetched.sender, request.sender);
        assert_eq!(fetched.recipient, request.recipient);
        assert_eq!(fetched.amount_sol, request.amount_sol);
        assert_eq!(fetched.lamports, request.lamports);
        assert_eq!(fetched.blockhash, request.blockhash);
    }

    #[tokio::test]
    async fn expired_request_is_invisible() {
        let store = MemoryStore::new(Duration::from_secs(900));
        let id = store.create(new_request("user-1")).await.unwrap();

        // Age the record past the TTL by restoring it with an old timestamp.
        let mut record = store.take(&id).await.unwrap().unwrap();
        record.created_at = Utc::now() - chrono::Duration::seconds(901);
        store.restore(&id, record).await.unwrap();

        assert_eq!(store.get(&id).await.unwrap(), None);
        assert_eq!(store.take(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn restore_preserves_remaining_ttl() {
        let store = MemoryStore::new(Duration::from_secs(900));
        let id = store.create(new_request("user-1")).await.unwrap();

        let record = store.take(&id).await.unwrap().unwrap();
        let created_at = record.created_at;
        store.restore(&id, record).await.unwrap();

        let back = store.get(&id).await.unwrap().unwrap();
        assert_eq!(back.created_at, created_at);
    }

    #[tokio::test]
    async fn take_is_won_exactly_once() {
        let store = std::sync::Arc::new(MemoryStore::new(Duration::from_secs(900)));
        let id = store.create(new_request("user-1")).await.unwrap();

        let a = tokio::spawn({
            let store = store.clone();
            let id = id.clone();
            async move { store.take(&id).await.unwrap() }
        });
        let b = tokio::spawn({
            let store = store.clone();
            let id = id.clone();
            async move { store.take(&id).await.unwrap() }
        });

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert!(a.is_some() ^ b.is_some());
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new(Duration::from_secs(900));
        let id = store.create(new_request("user-1")).await.unwrap();
        store.delete(&id).await.unwrap();
        store.delete(&id).await.unwrap();
        store.delete("0000000000000000").await.unwrap();
    }

    #[tokio::test]
    async fn wallet_insert_keeps_first_record() {
        let store = MemoryStore::new(Duration::from_secs(900));
        let first = WalletRecord {
            user_id: "user-1".to_string(),
            address: Keypair::new().pubkey(),
            encrypted_key: crate::custody::EncryptedKey::from_bytes(vec![1, 2, 3]),
            created_at: Utc::now(),
        };
        let second = WalletRecord {
            address: Keypair::new().pubkey(),
            ..first.clone()
        };

        store.create_wallet(&first).await.unwrap();
        store.create_wallet(&second).await.unwrap();

        let stored = store.get_wallet("user-1").await.unwrap().unwrap();
        assert_eq!(stored.address, first.address);
    }

    #[tokio::test]
    async fn history_is_written_once_per_signature() {
        let store = MemoryStore::new(Duration::from_secs(900));
        let record = TransactionRecord {
            user_id: "user-1".to_string(),
            signature: Signature::default(),
            amount_sol: dec!(1.5),
            fee_sol: dec!(0.000005),
            sender: Keypair::new().pubkey(),
            recipient: Keypair::new().pubkey(),
            status: TxStatus::Confirmed,
            failure_reason: None,
            recorded_at: Utc::now(),
        };

        store.record_transaction(&record).await.unwrap();
        store.record_transaction(&record).await.unwrap();

        let listed = store.list_transactions("user-1", 10).await.unwrap();
        assert_eq!(listed.len(), 1);
    }
}
