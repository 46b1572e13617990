//! Solana JSON-RPC access.
//!
//! [`LedgerRpc`] is the seam between the bundling flow and the network;
//! tests substitute it with an in-process mock. The production client
//! speaks the standard JSON-RPC methods the flow needs: blockhash fetch,
//! fee estimation, submission, signature status, and balance lookup.

use std::str::FromStr;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::hash::Hash;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use tracing::debug;

use crate::config::RpcConfig;
use crate::error::RpcError;

/// A recent blockhash and the block height after which it stops being valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockhashInfo {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// Terminal-or-pending status of a submitted signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureStatus {
    /// The network reports the transaction as confirmed or finalized.
    Confirmed,
    /// The network reports the transaction as landed but failed.
    Failed(String),
}

/// Network operations used by the quoting and submission flow.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    async fn latest_blockhash(&self) -> Result<BlockhashInfo, RpcError>;

    /// Fee in lamports for exactly this message, or `None` when the
    /// network reports no fee (distinct from a transport error).
    async fn fee_for_message(&self, message: &Message) -> Result<Option<u64>, RpcError>;

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError>;

    /// `None` while the signature has not landed at a confirmed level yet.
    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError>;

    async fn balance(&self, address: &Pubkey) -> Result<u64, RpcError>;
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// JSON-RPC client over HTTP.
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
}

impl JsonRpcClient {
    pub fn new(config: &RpcConfig) -> Result<Self, RpcError> {
        // Every request gets a hard deadline; a hung endpoint must surface
        // as an error, not stall the caller.
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            url: config.url.clone(),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        debug!(method, "ledger rpc call");
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let envelope: RpcEnvelope = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if let Some(err) = envelope.error {
            return Err(RpcError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        envelope
            .result
            .ok_or_else(|| RpcError::InvalidResponse(format!("{method}: missing result")))
    }
}

#[async_trait]
impl LedgerRpc for JsonRpcClient {
    async fn latest_blockhash(&self) -> Result<BlockhashInfo, RpcError> {
        let result = self
            .call("getLatestBlockhash", json!([{"commitment": "confirmed"}]))
            .await?;
        let value = &result["value"];
        let blockhash = value["blockhash"]
            .as_str()
            .and_then(|s| Hash::from_str(s).ok())
            .ok_or_else(|| RpcError::InvalidResponse("malformed blockhash".to_string()))?;
        let last_valid_block_height = value["lastValidBlockHeight"].as_u64().ok_or_else(|| {
            RpcError::InvalidResponse("missing lastValidBlockHeight".to_string())
        })?;
        Ok(BlockhashInfo {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn fee_for_message(&self, message: &Message) -> Result<Option<u64>, RpcError> {
        let encoded = BASE64.encode(message.serialize());
        let result = self
            .call(
                "getFeeForMessage",
                json!([encoded, {"commitment": "confirmed"}]),
            )
            .await?;
        Ok(result["value"].as_u64())
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, RpcError> {
        let bytes =
            bincode::serialize(transaction).map_err(|e| RpcError::Encode(e.to_string()))?;
        let encoded = BASE64.encode(bytes);
        let result = self
            .call("sendTransaction", json!([encoded, {"encoding": "base64"}]))
            .await?;
        result
            .as_str()
            .and_then(|s| Signature::from_str(s).ok())
            .ok_or_else(|| RpcError::InvalidResponse("malformed signature".to_string()))
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, RpcError> {
        let result = self
            .call("getSignatureStatuses", json!([[signature.to_string()]]))
            .await?;
        let status = &result["value"][0];
        if status.is_null() {
            return Ok(None);
        }
        if !status["err"].is_null() {
            return Ok(Some(SignatureStatus::Failed(status["err"].to_string())));
        }
        match status["confirmationStatus"].as_str() {
            Some("confirmed") | Some("finalized") => Ok(Some(SignatureStatus::Confirmed)),
            // Processed is not durable enough to classify either way.
            _ => Ok(None),
        }
    }

    async fn balance(&self, address: &Pubkey) -> Result<u64, RpcError> {
        let result = self
            .call("getBalance", json!([address.to_string()]))
            .await?;
        result["value"]
            .as_u64()
            .ok_or_else(|| RpcError::InvalidResponse("missing balance value".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn client_is_built_with_a_request_deadline() {
        let config = RpcConfig {
            url: "http://localhost:8899".to_string(),
            request_timeout: Duration::from_secs(5),
            confirm_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_millis(2_000),
        };
        let client = JsonRpcClient::new(&config).unwrap();
        assert_eq!(client.url, "http://localhost:8899");
    }
}
