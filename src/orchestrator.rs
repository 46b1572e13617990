//! The conversational surface of the transfer flow.
//!
//! One entry point per user action: intent, confirm, cancel, balance,
//! history. The orchestrator owns no protocol state of its own; the
//! pending store is the only state machine, and the front end (bot,
//! CLI, HTTP handler) only ever sees presentation structs with string
//! addresses and display amounts.

use std::sync::Arc;

use rust_decimal::Decimal;
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use tracing::info;

use crate::config::Config;
use crate::custody::KeyCustody;
use crate::error::Result;
use crate::quote::FeeQuoter;
use crate::rpc::LedgerRpc;
use crate::store::{
    HistoryStore, NewPendingRequest, PendingStore, Store, TransactionRecord, TxStatus,
    WalletRecord, WalletStore,
};
use crate::submit::{CancelAck, TransactionSubmitter};
use crate::validate::validate;

const EXPLORER_TX_URL: &str = "https://solscan.io/tx";

fn lamports_to_sol(lamports: u64) -> Decimal {
    Decimal::from(lamports) / Decimal::from(LAMPORTS_PER_SOL)
}

/// What the front end shows the user before they confirm.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConfirmationPresentation {
    pub request_id: String,
    pub sender: String,
    pub recipient: String,
    pub amount_sol: Decimal,
    pub fee_sol: Decimal,
    /// Amount plus fee; what actually leaves the wallet.
    pub total_sol: Decimal,
    pub expires_in_secs: u64,
}

/// What the front end shows after the transfer settles (or fails).
#[derive(Debug, Clone, serde::Serialize)]
pub struct OutcomePresentation {
    pub signature: String,
    pub status: TxStatus,
    pub failure_reason: Option<String>,
    pub amount_sol: Decimal,
    pub fee_sol: Decimal,
    pub recipient: String,
    pub explorer_url: String,
}

impl From<TransactionRecord> for OutcomePresentation {
    fn from(record: TransactionRecord) -> Self {
        Self {
            signature: record.signature.to_string(),
            status: record.status,
            failure_reason: record.failure_reason,
            amount_sol: record.amount_sol,
            fee_sol: record.fee_sol,
            recipient: record.recipient.to_string(),
            explorer_url: format!("{EXPLORER_TX_URL}/{}", record.signature),
        }
    }
}

/// One row of transfer history, display-ready.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HistoryEntry {
    pub signature: String,
    pub status: TxStatus,
    pub amount_sol: Decimal,
    pub recipient: String,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

/// Ties validation, quoting, custody, and submission into the
/// intent/confirm/cancel flow.
pub struct Orchestrator {
    store: Arc<dyn Store>,
    rpc: Arc<dyn LedgerRpc>,
    custody: Arc<KeyCustody>,
    quoter: FeeQuoter,
    submitter: TransactionSubmitter,
    config: Config,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        rpc: Arc<dyn LedgerRpc>,
        custody: Arc<KeyCustody>,
        config: Config,
    ) -> Self {
        let quoter = FeeQuoter::new(rpc.clone());
        let submitter =
            TransactionSubmitter::new(store.clone(), rpc.clone(), custody.clone(), &config.rpc);
        Self {
            store,
            rpc,
            custody,
            quoter,
            submitter,
            config,
        }
    }

    /// Look up the user's custodial wallet without creating one.
    pub async fn wallet(&self, user_id: &str) -> Result<Option<WalletRecord>> {
        Ok(self.store.get_wallet(user_id).await?)
    }

    /// Fetch the user's custodial wallet, creating one on first contact.
    ///
    /// Creation is first-write-wins at the store; on a racing create the
    /// loser's key is discarded and the stored record is returned, so a
    /// user can never end up with two addresses.
    pub async fn get_or_create_wallet(&self, user_id: &str) -> Result<WalletRecord> {
        if let Some(wallet) = self.store.get_wallet(user_id).await? {
            return Ok(wallet);
        }

        let (address, encrypted_key) = self.custody.generate()?;
        let record = WalletRecord {
            user_id: user_id.to_string(),
            address,
            encrypted_key,
            created_at: chrono::Utc::now(),
        };
        self.store.create_wallet(&record).await?;
        info!(user_id, %address, "custodial wallet created");

        let stored = self.store.get_wallet(user_id).await?;
        Ok(stored.unwrap_or(record))
    }

    /// Handle a transfer intent: validate, quote, persist the pending
    /// request, and hand back what the user must be shown to confirm.
    pub async fn on_intent(
        &self,
        user_id: &str,
        recipient: &str,
        amount: &str,
    ) -> Result<ConfirmationPresentation> {
        let wallet = self.get_or_create_wallet(user_id).await?;
        let request = validate(recipient, amount, &wallet.address, &self.config.transfer)?;

        let quote = self
            .quoter
            .quote(&wallet.address, &request.recipient, request.lamports)
            .await?;
        let fee_sol = lamports_to_sol(quote.fee_lamports);

        let request_id = self
            .store
            .create(NewPendingRequest {
                user_id: user_id.to_string(),
                sender: wallet.address,
                recipient: request.recipient,
                amount_sol: request.amount_sol,
                fee_sol,
                blockhash: quote.blockhash,
                last_valid_block_height: quote.last_valid_block_height,
                lamports: request.lamports,
            })
            .await?;
        info!(user_id, request_id, "transfer quoted and pending");

        Ok(ConfirmationPresentation {
            request_id,
            sender: wallet.address.to_string(),
            recipient: request.recipient.to_string(),
            amount_sol: request.amount_sol,
            fee_sol,
            total_sol: request.amount_sol + fee_sol,
            expires_in_secs: self.config.pending.ttl.as_secs(),
        })
    }

    /// Execute a quoted transfer the user approved.
    pub async fn on_confirm(&self, user_id: &str, request_id: &str) -> Result<OutcomePresentation> {
        let record = self.submitter.confirm(request_id, user_id).await?;
        Ok(record.into())
    }

    /// Discard a quoted transfer. Safe to call at any point; nothing has
    /// been signed or submitted for a request that is still pending.
    pub async fn on_cancel(&self, request_id: &str) -> Result<CancelAck> {
        self.submitter.cancel(request_id).await
    }

    /// Current balance of the user's custodial wallet, in SOL.
    pub async fn balance(&self, user_id: &str) -> Result<Decimal> {
        let wallet = self.get_or_create_wallet(user_id).await?;
        let lamports = self.rpc.balance(&wallet.address).await?;
        Ok(lamports_to_sol(lamports))
    }

    /// Most recent transfers for the user, newest first.
    pub async fn history(&self, user_id: &str, limit: i64) -> Result<Vec<HistoryEntry>> {
        let records = self.store.list_transactions(user_id, limit).await?;
        Ok(records
            .into_iter()
            .map(|record| HistoryEntry {
                signature: record.signature.to_string(),
                status: record.status,
                amount_sol: record.amount_sol,
                recipient: record.recipient.to_string(),
                recorded_at: record.recorded_at,
            })
            .collect())
    }
}
