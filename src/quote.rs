//! Fee quoting for a single-instruction transfer.

use std::sync::Arc;

use solana_sdk::hash::Hash;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_instruction;

use crate::error::QuoteError;
use crate::rpc::LedgerRpc;

/// A quoted, unsigned transfer bound to a recent blockhash.
#[derive(Debug, Clone)]
pub struct Quote {
    pub message: Message,
    pub fee_lamports: u64,
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// Build the exact transfer message that will later be signed.
///
/// Used both at quote time and at confirmation time; the two must agree
/// byte for byte so the quoted fee applies to the submitted message.
pub fn build_transfer_message(
    sender: &Pubkey,
    recipient: &Pubkey,
    lamports: u64,
    blockhash: &Hash,
) -> Message {
    let instruction = system_instruction::transfer(sender, recipient, lamports);
    Message::new_with_blockhash(&[instruction], Some(sender), blockhash)
}

/// Asks the network to price a transfer message. No persistence side effects.
pub struct FeeQuoter {
    rpc: Arc<dyn LedgerRpc>,
}

impl FeeQuoter {
    pub fn new(rpc: Arc<dyn LedgerRpc>) -> Self {
        Self { rpc }
    }

    pub async fn quote(
        &self,
        sender: &Pubkey,
        recipient: &Pubkey,
        lamports: u64,
    ) -> Result<Quote, QuoteError> {
        let info = self.rpc.latest_blockhash().await?;
        let message = build_transfer_message(sender, recipient, lamports, &info.blockhash);
        let fee_lamports = self
            .rpc
            .fee_for_message(&message)
            .await?
            .ok_or(QuoteError::FeeUnavailable)?;
        Ok(Quote {
            message,
            fee_lamports,
            blockhash: info.blockhash,
            last_valid_block_height: info.last_valid_block_height,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockLedger;
    use solana_sdk::signature::{Keypair, Signer};

    #[tokio::test]
    async fn quote_binds_message_to_current_blockhash() {
        let ledger = Arc::new(MockLedger::new(5_000));
        let quoter = FeeQuoter::new(ledger.clone());
        let sender = Keypair::new().pubkey();
        let recipient = Keypair::new().pubkey();

        let quote = quoter.quote(&sender, &recipient, 1_500_000_000).await.unwrap();
        assert_eq!(quote.fee_lamports, 5_000);
        assert_eq!(quote.blockhash, ledger.blockhash());
        assert_eq!(quote.message.recent_blockhash, ledger.blockhash());

        let rebuilt =
            build_transfer_message(&sender, &recipient, 1_500_000_000, &quote.blockhash);
        assert_eq!(rebuilt, quote.message);
    }

    #[tokio::test]
    async fn missing_fee_is_distinct_from_network_error() {
        let ledger = MockLedger::new(5_000);
        ledger.set_fee(None);
        let quoter = FeeQuoter::new(Arc::new(ledger));
        let sender = Keypair::new().pubkey();
        let recipient = Keypair::new().pubkey();

        let err = quoter.quote(&sender, &recipient, 1).await.unwrap_err();
        assert!(matches!(err, QuoteError::FeeUnavailable));
    }
}
