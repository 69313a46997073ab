//! JSON-RPC 2.0 client for Solana-compatible nodes

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use solana_hash::Hash;
use solana_pubkey::Pubkey;
use solana_signature::Signature;

use super::{Commitment, GuardRpc, SimulationOutcome, TransactionStatus};
use crate::errors::{GuardError, GuardResult};
use crate::models::{EpochInfo, PerformanceSample};

/// Node reports it is behind or unavailable
const NODE_UNHEALTHY: i64 = -32005;
const BLOCK_NOT_AVAILABLE: i64 = -32004;
const SLOT_SKIPPED: i64 = -32007;
const MIN_CONTEXT_SLOT_NOT_REACHED: i64 = -32016;

/// JSON-RPC response envelope
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// `{ context, value }` wrapper used by most methods
#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct UiAccount {
    /// `[payload, encoding]`
    data: (String, String),
}

#[derive(Debug, Deserialize)]
struct UiBlockhash {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiSignatureStatus {
    slot: u64,
    err: Option<Value>,
    confirmation_status: Option<Commitment>,
}

#[derive(Debug, Deserialize)]
struct UiSupply {
    total: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UiSimulation {
    err: Option<Value>,
    logs: Option<Vec<String>>,
    units_consumed: Option<u64>,
}

/// Map a JSON-RPC error object onto the transient/permanent split.
fn classify_rpc_error(method: &str, code: i64, message: &str) -> GuardError {
    let lower = message.to_lowercase();
    if lower.contains("already been processed") || lower.contains("alreadyprocessed") {
        return GuardError::AlreadyProcessed(format!("{} ({}): {}", method, code, message));
    }

    let transient = matches!(
        code,
        NODE_UNHEALTHY | BLOCK_NOT_AVAILABLE | SLOT_SKIPPED | MIN_CONTEXT_SLOT_NOT_REACHED
    ) || lower.contains("blockhash not found")
        || lower.contains("node is behind")
        || lower.contains("too many requests");

    let msg = format!("{} failed ({}): {}", method, code, message);
    if transient {
        GuardError::RpcTransient(msg)
    } else {
        GuardError::Rpc(msg)
    }
}

/// Solana JSON-RPC over HTTP
pub struct HttpRpcClient {
    /// HTTP client
    client: Client,
    /// RPC URL
    rpc_url: String,
    next_id: AtomicU64,
}

impl HttpRpcClient {
    /// Create a client for `rpc_url` with a 30 second request timeout
    pub fn new(rpc_url: &str) -> GuardResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| GuardError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.rpc_url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> GuardResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!("RPC {} (id {})", method, id);
        let response: RpcResponse<T> = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            let err = classify_rpc_error(method, err.code, &err.message);
            warn!("{}", err);
            return Err(err);
        }

        response
            .result
            .ok_or_else(|| GuardError::Rpc(format!("{} returned neither result nor error", method)))
    }
}

fn encode_wire(wire_transaction: &[u8]) -> String {
    base64::encode(wire_transaction)
}

#[async_trait]
impl GuardRpc for HttpRpcClient {
    async fn get_account_data(&self, address: &Pubkey, commitment: Commitment) -> GuardResult<Option<Vec<u8>>> {
        let response: WithContext<Option<UiAccount>> = self
            .call(
                "getAccountInfo",
                json!([address.to_string(), { "encoding": "base64", "commitment": commitment }]),
            )
            .await?;

        match response.value {
            None => Ok(None),
            Some(account) => {
                let (payload, encoding) = account.data;
                if encoding != "base64" {
                    return Err(GuardError::Rpc(format!("unexpected account encoding: {}", encoding)));
                }
                let data = base64::decode(payload)
                    .map_err(|e| GuardError::Rpc(format!("invalid base64 account data: {}", e)))?;
                Ok(Some(data))
            }
        }
    }

    async fn get_latest_blockhash(&self, commitment: Commitment) -> GuardResult<Hash> {
        let response: WithContext<UiBlockhash> = self
            .call("getLatestBlockhash", json!([{ "commitment": commitment }]))
            .await?;

        Hash::from_str(&response.value.blockhash)
            .map_err(|e| GuardError::Rpc(format!("invalid blockhash {}: {}", response.value.blockhash, e)))
    }

    async fn send_transaction(&self, wire_transaction: &[u8]) -> GuardResult<Signature> {
        let signature: String = self
            .call(
                "sendTransaction",
                json!([encode_wire(wire_transaction), {
                    "encoding": "base64",
                    "skipPreflight": false,
                    "maxRetries": 0,
                }]),
            )
            .await?;

        Signature::from_str(&signature)
            .map_err(|e| GuardError::Rpc(format!("invalid signature {}: {}", signature, e)))
    }

    async fn get_signature_status(&self, signature: &Signature) -> GuardResult<Option<TransactionStatus>> {
        let response: WithContext<Vec<Option<UiSignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([[signature.to_string()], { "searchTransactionHistory": false }]),
            )
            .await?;

        Ok(response.value.into_iter().next().flatten().map(|status| TransactionStatus {
            slot: status.slot,
            confirmation: status.confirmation_status,
            err: status.err.map(|e| e.to_string()),
        }))
    }

    async fn get_recent_performance_samples(&self, limit: usize) -> GuardResult<Vec<PerformanceSample>> {
        self.call("getRecentPerformanceSamples", json!([limit])).await
    }

    async fn get_epoch_info(&self, commitment: Commitment) -> GuardResult<EpochInfo> {
        self.call("getEpochInfo", json!([{ "commitment": commitment }])).await
    }

    async fn get_total_supply(&self, commitment: Commitment) -> GuardResult<u64> {
        let response: WithContext<UiSupply> = self
            .call(
                "getSupply",
                json!([{ "commitment": commitment, "excludeNonCirculatingAccountsList": true }]),
            )
            .await?;
        Ok(response.value.total)
    }

    async fn simulate_transaction(&self, wire_transaction: &[u8], commitment: Commitment) -> GuardResult<SimulationOutcome> {
        let response: WithContext<UiSimulation> = self
            .call(
                "simulateTransaction",
                json!([encode_wire(wire_transaction), {
                    "encoding": "base64",
                    "sigVerify": false,
                    "replaceRecentBlockhash": true,
                    "commitment": commitment,
                }]),
            )
            .await?;

        let value = response.value;
        Ok(SimulationOutcome {
            success: value.err.is_none(),
            units_consumed: value.units_consumed.unwrap_or(0),
            error: value.err.map(|e| e.to_string()),
            logs: value.logs.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_rpc_error() {
        assert!(classify_rpc_error("sendTransaction", -32002, "Transaction simulation failed: Blockhash not found")
            .is_transient());
        assert!(classify_rpc_error("getAccountInfo", NODE_UNHEALTHY, "Node is unhealthy").is_transient());
        assert!(!classify_rpc_error("getAccountInfo", -32602, "Invalid params").is_transient());
    }

    #[test]
    fn test_classify_already_processed() {
        let err = classify_rpc_error(
            "sendTransaction",
            -32002,
            "Transaction simulation failed: This transaction has already been processed",
        );
        assert!(matches!(err, GuardError::AlreadyProcessed(_)));
        assert!(matches!(
            classify_rpc_error("sendTransaction", -32002, "Transaction simulation failed: AlreadyProcessed"),
            GuardError::AlreadyProcessed(_)
        ));
        assert!(matches!(
            classify_rpc_error("sendTransaction", -32002, "Transaction simulation failed: Error processing Instruction 0"),
            GuardError::Rpc(_)
        ));
    }

    #[tokio::test]
    async fn test_malformed_url_is_not_retried() {
        let client = HttpRpcClient::new("not a url").unwrap();
        let err = client.get_latest_blockhash(Commitment::Confirmed).await.unwrap_err();
        assert!(!err.is_transient(), "unexpected transient error: {:?}", err);
    }

    #[test]
    fn test_parse_account_response() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":{"context":{"slot":5},"value":{"data":["AQID","base64"],"executable":false,"lamports":1,"owner":"11111111111111111111111111111111","rentEpoch":0}}}"#;
        let response: RpcResponse<WithContext<Option<UiAccount>>> = serde_json::from_str(json).unwrap();
        let account = response.result.unwrap().value.unwrap();
        assert_eq!(base64::decode(account.data.0).unwrap(), vec![1, 2, 3]);

        let missing = r#"{"jsonrpc":"2.0","id":1,"result":{"context":{"slot":5},"value":null}}"#;
        let response: RpcResponse<WithContext<Option<UiAccount>>> = serde_json::from_str(missing).unwrap();
        assert!(response.result.unwrap().value.is_none());
    }

    #[test]
    fn test_parse_signature_status() {
        let json = r#"{"context":{"slot":82},"value":[{"slot":72,"confirmations":10,"err":null,"status":{"Ok":null},"confirmationStatus":"confirmed"},null]}"#;
        let response: WithContext<Vec<Option<UiSignatureStatus>>> = serde_json::from_str(json).unwrap();
        let status = response.value[0].as_ref().unwrap();
        assert_eq!(status.slot, 72);
        assert_eq!(status.confirmation_status, Some(Commitment::Confirmed));
        assert!(status.err.is_none());
        assert!(response.value[1].is_none());
    }

    #[test]
    fn test_parse_error_envelope() {
        let json = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"Node is behind by 42 slots"}}"#;
        let response: RpcResponse<u64> = serde_json::from_str(json).unwrap();
        assert!(response.result.is_none());
        assert_eq!(response.error.unwrap().code, -32005);
    }

    #[test]
    fn test_parse_performance_samples() {
        let json = r#"[{"numSlots":126,"numTransactions":126,"numNonVoteTransactions":1,"samplePeriodSecs":60,"slot":348125}]"#;
        let samples: Vec<PerformanceSample> = serde_json::from_str(json).unwrap();
        assert_eq!(samples[0].num_slots, 126);
        assert_eq!(samples[0].sample_period_secs, 60);
    }
}
