//! Confirmation and cancellation of quoted transfers.
//!
//! Both paths race for the pending record through [`PendingStore::take`],
//! so at most one of them acts on a given request id. A taken record is
//! put back whenever confirmation fails before the transaction reaches
//! the network, and when the outcome cannot be durably recorded; in the
//! latter case the request id stays actionable so the operator can
//! reconcile instead of losing the outcome silently.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use tracing::{error, info, warn};

use crate::config::RpcConfig;
use crate::custody::KeyCustody;
use crate::error::{Result, SubmitError};
use crate::quote::build_transfer_message;
use crate::rpc::{LedgerRpc, SignatureStatus};
use crate::store::{
    HistoryStore, PendingRequest, PendingStore, Store, TransactionRecord, TxStatus, WalletStore,
};

/// Failure reason recorded when the confirmation wait elapses without a
/// terminal status from the network.
pub const TIMEOUT_REASON: &str = "timeout";

/// Outcome of a cancellation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAck {
    /// This call removed the pending request.
    Cancelled,
    /// The request was already confirmed, cancelled, or expired.
    AlreadyGone,
}

/// Drives a confirmed request through signing, submission, and recording.
pub struct TransactionSubmitter {
    store: Arc<dyn Store>,
    rpc: Arc<dyn LedgerRpc>,
    custody: Arc<KeyCustody>,
    confirm_timeout: Duration,
    poll_interval: Duration,
}

impl TransactionSubmitter {
    pub fn new(
        store: Arc<dyn Store>,
        rpc: Arc<dyn LedgerRpc>,
        custody: Arc<KeyCustody>,
        config: &RpcConfig,
    ) -> Self {
        Self {
            store,
            rpc,
            custody,
            confirm_timeout: config.confirm_timeout,
            poll_interval: config.poll_interval,
        }
    }

    /// Execute a previously quoted transfer.
    ///
    /// Takes the pending record, rebuilds the exact quoted message from it,
    /// signs with the decrypted custodial key, submits, waits for a terminal
    /// status, records the outcome, and only then lets the record die.
    pub async fn confirm(&self, request_id: &str, user_id: &str) -> Result<TransactionRecord> {
        let request = self
            .store
            .take(request_id)
            .await?
            .ok_or(SubmitError::RequestExpiredOrUnknown)?;

        if request.user_id != user_id {
            // A wrong-owner confirm must not act as a cancel on the real
            // owner's quote.
            warn!(request_id, "confirm attempted by non-owner");
            self.put_back(request_id, request).await;
            return Err(SubmitError::NotOwner.into());
        }

        let wallet = match self.store.get_wallet(&request.user_id).await {
            Ok(Some(wallet)) => wallet,
            Ok(None) => {
                error!(request_id, "pending request has no wallet");
                self.put_back(request_id, request).await;
                return Err(SubmitError::SigningFailed.into());
            }
            Err(err) => {
                self.put_back(request_id, request).await;
                return Err(err.into());
            }
        };
        // Invariant from quote time: the stored sender is the wallet address.
        if wallet.address != request.sender {
            error!(request_id, "pending sender does not match wallet address");
            self.put_back(request_id, request).await;
            return Err(SubmitError::SigningFailed.into());
        }

        let keypair = match self.custody.decrypt(&wallet.encrypted_key) {
            Ok(keypair) => keypair,
            Err(err) => {
                error!(request_id, %err, "signing key decryption failed");
                self.put_back(request_id, request).await;
                return Err(SubmitError::SigningFailed.into());
            }
        };

        let message = build_transfer_message(
            &request.sender,
            &request.recipient,
            request.lamports,
            &request.blockhash,
        );
        let transaction = Transaction::new(&[&keypair], message, request.blockhash);
        drop(keypair);

        let signature = match self.rpc.send_transaction(&transaction).await {
            Ok(signature) => signature,
            Err(err) => {
                warn!(request_id, %err, "transaction submission failed");
                self.put_back(request_id, request).await;
                return Err(SubmitError::SubmissionFailed(err).into());
            }
        };
        info!(request_id, %signature, "transaction submitted");

        let (status, failure_reason) = self.await_confirmation(&signature).await;
        let record = TransactionRecord {
            user_id: request.user_id.clone(),
            signature,
            amount_sol: request.amount_sol,
            fee_sol: request.fee_sol,
            sender: request.sender,
            recipient: request.recipient,
            status,
            failure_reason,
            recorded_at: Utc::now(),
        };

        if let Err(err) = self.store.record_transaction(&record).await {
            error!(request_id, %signature, %err, "failed to record outcome");
            self.put_back(request_id, request).await;
            return Err(SubmitError::StatusUnknown(err).into());
        }
        // The record is durable; now the pending request can die for good.
        self.store.delete(request_id).await?;

        info!(
            request_id,
            %signature,
            status = record.status.as_str(),
            "transfer outcome recorded"
        );
        Ok(record)
    }

    /// Cancel a quoted transfer. No network traffic; nothing was signed.
    pub async fn cancel(&self, request_id: &str) -> Result<CancelAck> {
        match self.store.take(request_id).await? {
            Some(_) => {
                info!(request_id, "pending request cancelled");
                Ok(CancelAck::Cancelled)
            }
            None => Ok(CancelAck::AlreadyGone),
        }
    }

    async fn await_confirmation(&self, signature: &Signature) -> (TxStatus, Option<String>) {
        let poll = async {
            loop {
                match self.rpc.signature_status(signature).await {
                    Ok(Some(SignatureStatus::Confirmed)) => return (TxStatus::Confirmed, None),
                    Ok(Some(SignatureStatus::Failed(reason))) => {
                        return (TxStatus::Failed, Some(reason))
                    }
                    Ok(None) => {}
                    // Transient poll failures are absorbed; the outer
                    // timeout bounds the total wait.
                    Err(err) => warn!(%signature, %err, "signature status poll failed"),
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };
        match tokio::time::timeout(self.confirm_timeout, poll).await {
            Ok(outcome) => outcome,
            Err(_) => (TxStatus::Failed, Some(TIMEOUT_REASON.to_string())),
        }
    }

    async fn put_back(&self, request_id: &str, request: PendingRequest) {
        if let Err(err) = self.store.restore(request_id, request).await {
            error!(request_id, %err, "failed to restore pending request");
        }
    }
}
