//! High-level client for the Guard program
//!
//! Ties address derivation, the codecs and the submitter together behind
//! one configuration.

use std::sync::Arc;

use log::{debug, info};
use solana_instruction::Instruction;
use solana_pubkey::Pubkey;
use solana_signature::Signature;

use crate::address::AddressDeriver;
use crate::config::GuardConfig;
use crate::errors::{ErrorContext, ErrorExt, GuardError, GuardResult};
use crate::models::{self, AnalysisRecord, MetricsRecord, NetworkStats};
use crate::rpc::{GuardRpc, HttpRpcClient, SimulationOutcome};
use crate::submitter::{SubmitOptions, TransactionSubmitter};
use crate::wallet::WalletSigner;

/// Only the most recent performance sample is used
const PERFORMANCE_SAMPLE_LIMIT: usize = 1;

/// Client for one deployed Guard program
pub struct GuardClient {
    config: GuardConfig,
    rpc: Arc<dyn GuardRpc>,
    deriver: AddressDeriver,
    submitter: TransactionSubmitter,
    wallet: Option<Arc<dyn WalletSigner>>,
}

impl GuardClient {
    /// Create a client over an existing RPC implementation.
    pub fn new(config: GuardConfig, rpc: Arc<dyn GuardRpc>) -> GuardResult<Self> {
        config.validate()?;
        let deriver = AddressDeriver::new(config.program_id, config.seeds.clone());
        let submitter = TransactionSubmitter::new(rpc.clone());

        Ok(Self {
            config,
            rpc,
            deriver,
            submitter,
            wallet: None,
        })
    }

    /// Create a client talking JSON-RPC to `config.rpc_url`.
    pub fn from_config(config: GuardConfig) -> GuardResult<Self> {
        let rpc = Arc::new(HttpRpcClient::new(&config.rpc_url)?);
        Self::new(config, rpc)
    }

    /// Attach a signing wallet for mutating calls.
    pub fn with_wallet(mut self, wallet: Arc<dyn WalletSigner>) -> Self {
        self.wallet = Some(wallet);
        self
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn deriver(&self) -> &AddressDeriver {
        &self.deriver
    }

    pub fn rpc(&self) -> &Arc<dyn GuardRpc> {
        &self.rpc
    }

    fn wallet(&self) -> GuardResult<&Arc<dyn WalletSigner>> {
        self.wallet.as_ref().ok_or(GuardError::WalletNotConnected)
    }

    /// Analyze instruction for `target`, signed by the connected wallet.
    pub fn analyze_instruction(&self, target: &Pubkey, data_size: u64) -> GuardResult<Instruction> {
        let caller = self.wallet()?.address();
        let analysis = self.deriver.analysis(target)?;
        models::encode_analyze(
            &self.config.program_id,
            target,
            &analysis.address,
            &caller,
            data_size,
        )
    }

    /// Record-metrics instruction, signed by the connected wallet.
    pub fn record_metrics_instruction(&self, gas_used: u64, success: bool) -> GuardResult<Instruction> {
        let caller = self.wallet()?.address();
        let metrics = self.deriver.metrics()?;
        models::encode_record_metrics(&self.config.program_id, &metrics.address, &caller, gas_used, success)
    }

    /// Request an analysis of `target`. `buffer_size` defaults to the
    /// configured analysis buffer size.
    pub async fn analyze_contract(&self, target: &Pubkey, buffer_size: Option<u64>) -> GuardResult<Signature> {
        let wallet = self.wallet()?;
        let data_size = buffer_size.unwrap_or(self.config.analysis_buffer_size);
        let ix = self.analyze_instruction(target, data_size)?;

        info!("Requesting analysis of {} (buffer {} bytes)", target, data_size);
        self.submitter
            .submit(&[ix], wallet.as_ref(), &[], &SubmitOptions::from(&self.config))
            .await
    }

    /// Record one transaction's gas usage and outcome.
    pub async fn record_metrics(&self, gas_used: u64, success: bool) -> GuardResult<Signature> {
        let wallet = self.wallet()?;
        let ix = self.record_metrics_instruction(gas_used, success)?;

        info!("Recording metrics: gas {} success {}", gas_used, success);
        self.submitter
            .submit(&[ix], wallet.as_ref(), &[], &SubmitOptions::from(&self.config))
            .await
    }

    async fn fetch_account(&self, address: &Pubkey, operation: &str) -> GuardResult<Vec<u8>> {
        let context = ErrorContext::new("guard_client", operation).with_address(address);
        let data = self
            .rpc
            .get_account_data(address, self.config.commitment)
            .await
            .with_context(context)?;

        data.ok_or_else(|| GuardError::AccountNotFound(address.to_string()))
    }

    /// Read the analysis stored for `target`.
    pub async fn fetch_analysis(&self, target: &Pubkey) -> GuardResult<AnalysisRecord> {
        let address = self.deriver.analysis(target)?.address;
        let data = self.fetch_account(&address, "fetch_analysis").await?;
        let record = models::decode_analysis(&data)?;
        debug!("Analysis for {}: score {}", target, record.risk_score);
        Ok(record)
    }

    /// Read the global metrics account.
    pub async fn fetch_metrics(&self) -> GuardResult<MetricsRecord> {
        let address = self.deriver.metrics()?.address;
        let data = self.fetch_account(&address, "fetch_metrics").await?;
        models::decode_metrics(&data)
    }

    /// Throughput, epoch progress and supply from the cluster.
    pub async fn fetch_network_stats(&self) -> GuardResult<NetworkStats> {
        let commitment = self.config.commitment;
        let (samples, epoch, supply) = tokio::join!(
            self.rpc.get_recent_performance_samples(PERFORMANCE_SAMPLE_LIMIT),
            self.rpc.get_epoch_info(commitment),
            self.rpc.get_total_supply(commitment),
        );

        let samples = samples?;
        Ok(NetworkStats::from_parts(samples.first(), &epoch?, supply?))
    }

    /// Simulate an analyze request for `target` to estimate compute usage.
    pub async fn simulate_analyze(&self, target: &Pubkey, data_size: u64) -> GuardResult<SimulationOutcome> {
        let fee_payer = self.wallet()?.address();
        let ix = self.analyze_instruction(target, data_size)?;
        self.submitter
            .simulate(&[ix], &fee_payer, self.config.commitment)
            .await
    }
}
