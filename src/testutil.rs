//! Shared test doubles.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use solana_sdk::hash::Hash;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;

use crate::error::RpcError;
use crate::rpc::{BlockhashInfo, LedgerRpc, SignatureStatus};

/// What the mock network reports for any submitted signature.
#[derive(Debug, Clone)]
pub(crate) enum MockStatus {
    Confirmed,
    Failed(String),
    /// Never settles; lets tests exercise the confirmation timeout.
    Pending,
}

pub(crate) struct MockLedger {
    blockhash: Hash,
    fee: Mutex<Option<u64>>,
    status: Mutex<MockStatus>,
    submissions: AtomicUsize,
    fail_sends: AtomicBool,
    balance: u64,
}

impl MockLedger {
    pub(crate) fn new(fee: u64) -> Self {
        Self {
            blockhash: Hash::new_unique(),
            fee: Mutex::new(Some(fee)),
            status: Mutex::new(MockStatus::Confirmed),
            submissions: AtomicUsize::new(0),
            fail_sends: AtomicBool::new(false),
            balance: 5_000_000_000,
        }
    }

    pub(crate) fn blockhash(&self) -> Hash {
        self.blockhash
    }

    pub(crate) fn set_fee(&self, fee: Option<u64>) {
        *self.fee.lock().unwrap() = fee;
    }

    pub(crate) fn set_status(&self, status: MockStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub(crate) fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub(crate) fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn latest_blockhash(&self) -> Result<BlockhashInfo, RpcError> {
        Ok(BlockhashInfo {
            blockhash: self.blockhash,
            last_valid_block_height: 1_000,
        })
    }

    async fn fee_for_message(&self, _message: &Message) -> Result<Option<u64>, RpcError> {
        Ok(*self.fee.lock().unwrap())
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(RpcError::Rpc {
                code: -32002,
                message: "transaction simulation failed".to_string(),
            });
        }
        self.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(transaction.signatures[0])
    }

    async fn signature_status(
        &self,
        _signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        match self.status.lock().unwrap().clone() {
            MockStatus::Confirmed => Ok(Some(SignatureStatus::Confirmed)),
            MockStatus::Failed(reason) => Ok(Some(SignatureStatus::Failed(reason))),
            MockStatus::Pending => Ok(None),
        }
    }

    async fn balance(&self, _address: &Pubkey) -> Result<u64, RpcError> {
        Ok(self.balance)
    }
}
