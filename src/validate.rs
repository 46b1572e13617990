//! Transfer input validation.
//!
//! Pure over its inputs and the configured amount bounds. This is the only
//! place a display amount is ever parsed; the resulting raw lamport value
//! travels with the request from here on.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::pubkey::Pubkey;

use crate::config::TransferLimits;
use crate::error::ValidationError;

/// A validated transfer intent, ready for quoting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub recipient: Pubkey,
    /// Display amount in SOL, exactly as validated.
    pub amount_sol: Decimal,
    /// Raw amount in lamports; the single source of truth downstream.
    pub lamports: u64,
}

/// Validate recipient and amount strings against the configured bounds.
pub fn validate(
    recipient: &str,
    amount: &str,
    sender: &Pubkey,
    limits: &TransferLimits,
) -> Result<TransferRequest, ValidationError> {
    let normalized = amount.trim().replace(',', "");
    let amount_sol =
        Decimal::from_str(&normalized).map_err(|_| ValidationError::InvalidAmount)?;

    if amount_sol < limits.min_sol {
        return Err(ValidationError::AmountTooSmall {
            min: limits.min_sol,
        });
    }
    if amount_sol > limits.max_sol {
        return Err(ValidationError::AmountTooLarge {
            max: limits.max_sol,
        });
    }

    let recipient =
        Pubkey::from_str(recipient.trim()).map_err(|_| ValidationError::InvalidAddress)?;
    if &recipient == sender {
        return Err(ValidationError::SelfTransfer);
    }

    let lamports = (amount_sol * Decimal::from(LAMPORTS_PER_SOL))
        .trunc()
        .to_u64()
        .ok_or(ValidationError::InvalidAmount)?;

    Ok(TransferRequest {
        recipient,
        amount_sol,
        lamports,
    })
}
