//! In-memory doubles for the RPC and wallet boundaries

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use soon_guard_client::models::{EpochInfo, PerformanceSample};
use soon_guard_client::rpc::{Commitment, GuardRpc, SimulationOutcome, TransactionStatus};
use soon_guard_client::{GuardClient, GuardConfig, GuardError, GuardResult, WalletSigner};
use solana_hash::Hash;
use solana_keypair::Keypair;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_signer::Signer;
use solana_transaction::Transaction;

/// How the mock node treats broadcasts
#[derive(Debug, Clone)]
pub enum SendBehavior {
    /// Every broadcast fails with a transient error
    AlwaysTransient,
    /// Confirmed once this many broadcasts have happened
    ConfirmOnAttempt(usize),
    /// Lands with a program error
    FailOnChain(String),
    /// Broadcast refused with a permanent error
    Refuse(String),
    /// First broadcast accepted; every rebroadcast is answered with
    /// "already processed". With `lands` the status turns confirmed once
    /// a rebroadcast has happened, otherwise it is never seen.
    AlreadyProcessedAfterFirst { lands: bool },
    /// Confirmed straight away, finalized after this many status polls
    FinalizeAfterPolls(usize),
}

pub struct MockRpc {
    accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
    failing_accounts: Mutex<HashSet<Pubkey>>,
    account_delay: Mutex<Option<Duration>>,
    send_behavior: Mutex<SendBehavior>,
    fail_network: AtomicBool,
    pub send_calls: AtomicUsize,
    pub account_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub blockhash_calls: AtomicUsize,
    pub sent: Mutex<Vec<Transaction>>,
}

impl MockRpc {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            failing_accounts: Mutex::new(HashSet::new()),
            account_delay: Mutex::new(None),
            send_behavior: Mutex::new(SendBehavior::ConfirmOnAttempt(1)),
            fail_network: AtomicBool::new(false),
            send_calls: AtomicUsize::new(0),
            account_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            blockhash_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_account(&self, address: Pubkey, data: Vec<u8>) {
        self.accounts.lock().unwrap().insert(address, data);
    }

    pub fn fail_account(&self, address: Pubkey) {
        self.failing_accounts.lock().unwrap().insert(address);
    }

    pub fn set_account_delay(&self, delay: Duration) {
        *self.account_delay.lock().unwrap() = Some(delay);
    }

    pub fn set_send_behavior(&self, behavior: SendBehavior) {
        *self.send_behavior.lock().unwrap() = behavior;
    }

    pub fn fail_network(&self, fail: bool) {
        self.fail_network.store(fail, Ordering::SeqCst);
    }

    pub fn sends(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn status_polls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn last_sent(&self) -> Option<Transaction> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GuardRpc for MockRpc {
    async fn get_account_data(&self, address: &Pubkey, _commitment: Commitment) -> GuardResult<Option<Vec<u8>>> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.account_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing_accounts.lock().unwrap().contains(address) {
            return Err(GuardError::RpcTransient(format!("connection reset fetching {}", address)));
        }
        Ok(self.accounts.lock().unwrap().get(address).cloned())
    }

    async fn get_latest_blockhash(&self, _commitment: Commitment) -> GuardResult<Hash> {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Hash::new_from_array([3u8; 32]))
    }

    async fn send_transaction(&self, wire_transaction: &[u8]) -> GuardResult<Signature> {
        let sends = self.send_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let behavior = self.send_behavior.lock().unwrap().clone();
        match behavior {
            SendBehavior::AlwaysTransient => Err(GuardError::RpcTransient("Blockhash not found".into())),
            SendBehavior::Refuse(msg) => Err(GuardError::Rpc(msg)),
            SendBehavior::AlreadyProcessedAfterFirst { .. } if sends > 1 => Err(GuardError::AlreadyProcessed(
                "sendTransaction (-32002): Transaction simulation failed: This transaction has already been processed"
                    .into(),
            )),
            _ => {
                let tx: Transaction = bincode::deserialize(wire_transaction)
                    .map_err(|e| GuardError::Rpc(e.to_string()))?;
                let signature = tx.signatures[0];
                self.sent.lock().unwrap().push(tx);
                Ok(signature)
            }
        }
    }

    async fn get_signature_status(&self, _signature: &Signature) -> GuardResult<Option<TransactionStatus>> {
        let polls = self.status_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let behavior = self.send_behavior.lock().unwrap().clone();
        let sends = self.sends();
        Ok(match behavior {
            SendBehavior::AlreadyProcessedAfterFirst { lands: true } if sends > 1 => Some(TransactionStatus {
                slot: 43,
                confirmation: Some(Commitment::Confirmed),
                err: None,
            }),
            SendBehavior::FinalizeAfterPolls(n) => Some(TransactionStatus {
                slot: 44,
                confirmation: Some(if polls >= n { Commitment::Finalized } else { Commitment::Confirmed }),
                err: None,
            }),
            SendBehavior::ConfirmOnAttempt(n) if sends >= n => Some(TransactionStatus {
                slot: 42,
                confirmation: Some(Commitment::Finalized),
                err: None,
            }),
            SendBehavior::ConfirmOnAttempt(_) if sends > 1 => Some(TransactionStatus {
                slot: 41,
                confirmation: Some(Commitment::Processed),
                err: None,
            }),
            SendBehavior::FailOnChain(reason) => Some(TransactionStatus {
                slot: 40,
                confirmation: Some(Commitment::Processed),
                err: Some(reason),
            }),
            _ => None,
        })
    }

    async fn get_recent_performance_samples(&self, _limit: usize) -> GuardResult<Vec<PerformanceSample>> {
        if self.fail_network.load(Ordering::SeqCst) {
            return Err(GuardError::RpcTransient("node is behind".into()));
        }
        Ok(vec![PerformanceSample {
            slot: 1_000,
            num_transactions: 60_000,
            num_slots: 150,
            sample_period_secs: 60,
        }])
    }

    async fn get_epoch_info(&self, _commitment: Commitment) -> GuardResult<EpochInfo> {
        Ok(EpochInfo {
            epoch: 7,
            slot_index: 216_000,
            slots_in_epoch: 432_000,
            absolute_slot: 3_240_000,
            block_height: Some(3_200_000),
        })
    }

    async fn get_total_supply(&self, _commitment: Commitment) -> GuardResult<u64> {
        Ok(500_000_000_000_000_000)
    }

    async fn simulate_transaction(&self, wire_transaction: &[u8], _commitment: Commitment) -> GuardResult<SimulationOutcome> {
        let tx: Transaction = bincode::deserialize(wire_transaction)
            .map_err(|e| GuardError::Rpc(e.to_string()))?;
        Ok(SimulationOutcome {
            success: true,
            units_consumed: 1_000 * tx.message.instructions.len() as u64,
            error: None,
            logs: vec!["Program log: Instruction: AnalyzeContract".to_string()],
        })
    }
}

/// Wallet that can be told to refuse
pub struct MockWallet {
    keypair: Keypair,
    reject: bool,
    pub sign_calls: AtomicUsize,
}

impl MockWallet {
    pub fn new() -> Self {
        Self {
            keypair: Keypair::new(),
            reject: false,
            sign_calls: AtomicUsize::new(0),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::new()
        }
    }

    pub fn signs(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletSigner for MockWallet {
    fn address(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign(&self, message: &[u8]) -> GuardResult<Signature> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            return Err(GuardError::TransactionRejected("User rejected the request".into()));
        }
        Ok(self.keypair.sign_message(message))
    }
}

pub fn test_config() -> GuardConfig {
    let mut config = GuardConfig::new(Pubkey::new_unique());
    config.retry_base_delay_ms = 1;
    config.max_retries = 3;
    config.confirm_timeout_ms = Some(5);
    config.status_poll_interval_ms = 1;
    config
}

pub fn client_with(rpc: Arc<MockRpc>, wallet: Option<Arc<MockWallet>>) -> GuardClient {
    client_with_config(test_config(), rpc, wallet)
}

pub fn client_with_config(config: GuardConfig, rpc: Arc<MockRpc>, wallet: Option<Arc<MockWallet>>) -> GuardClient {
    let client = GuardClient::new(config, rpc).unwrap();
    match wallet {
        Some(wallet) => client.with_wallet(wallet),
        None => client,
    }
}
