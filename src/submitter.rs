//! Transaction assembly, signing, broadcast and confirmation
//!
//! Signing happens exactly once per submission. Only the broadcast and
//! confirmation phase is retried, and only for transient failures.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use solana_hash::Hash;
use solana_instruction::Instruction;
use solana_message::Message;
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_signer::Signer;
use solana_transaction::Transaction;
use tokio::time::Instant;

use crate::config::GuardConfig;
use crate::constants::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_STATUS_POLL_INTERVAL_MS};
use crate::errors::{ErrorExt, GuardError, GuardResult};
use crate::rpc::{Commitment, GuardRpc, SimulationOutcome};
use crate::wallet::WalletSigner;

/// Confirmation and retry settings for one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOptions {
    pub commitment: Commitment,
    /// Retries after the first attempt; `max_retries + 1` attempts in total
    pub max_retries: usize,
    /// Delay before the first retry, doubled for each one after
    pub retry_base_delay: Duration,
    /// How long one attempt keeps polling status before rebroadcasting
    pub confirm_timeout: Duration,
    pub status_poll_interval: Duration,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        let commitment = Commitment::Confirmed;
        Self {
            commitment,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            confirm_timeout: Duration::from_millis(commitment.default_confirm_timeout_ms()),
            status_poll_interval: Duration::from_millis(DEFAULT_STATUS_POLL_INTERVAL_MS),
        }
    }
}

impl From<&GuardConfig> for SubmitOptions {
    fn from(config: &GuardConfig) -> Self {
        Self {
            commitment: config.commitment,
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay(),
            confirm_timeout: config.confirm_timeout(),
            status_poll_interval: config.status_poll_interval(),
        }
    }
}

impl SubmitOptions {
    /// Backoff before retry number `retry` (1-based).
    pub fn backoff(&self, retry: usize) -> Duration {
        let exponent = retry.saturating_sub(1).min(16) as u32;
        self.retry_base_delay.saturating_mul(1u32 << exponent)
    }
}

/// Instructions, fee payer and blockhash, compiled into a message.
///
/// Built fresh for every submission and consumed by signing.
pub struct TransactionEnvelope {
    message: Message,
}

impl TransactionEnvelope {
    /// Compile `instructions` in the given order with `fee_payer` as the
    /// first signer.
    pub fn new(instructions: &[Instruction], fee_payer: &Pubkey, recent_blockhash: Hash) -> GuardResult<Self> {
        if instructions.is_empty() {
            return Err(GuardError::EncodingError("transaction has no instructions".to_string()));
        }
        let message = Message::new_with_blockhash(instructions, Some(fee_payer), &recent_blockhash);
        Ok(Self { message })
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn message_bytes(&self) -> Vec<u8> {
        self.message.serialize()
    }

    /// Keys that must sign, in signature order.
    pub fn required_signers(&self) -> &[Pubkey] {
        let n = usize::from(self.message.header.num_required_signatures);
        &self.message.account_keys[..n.min(self.message.account_keys.len())]
    }

    /// Attach the fee payer's signature and co-sign with `extra_signers`.
    pub fn into_signed(self, fee_payer_signature: Signature, extra_signers: &[&(dyn Signer + Sync)]) -> GuardResult<Transaction> {
        let message_bytes = self.message_bytes();
        let required: Vec<Pubkey> = self.required_signers().to_vec();
        let mut signatures = vec![Signature::default(); required.len()];

        // the fee payer is always the first required signer
        if let Some(first) = signatures.first_mut() {
            *first = fee_payer_signature;
        }

        for signer in extra_signers {
            let key = signer.pubkey();
            let position = required.iter().position(|k| *k == key).ok_or_else(|| {
                GuardError::EncodingError(format!("{} is not a required signer", key))
            })?;
            signatures[position] = signer
                .try_sign_message(&message_bytes)
                .map_err(|e| GuardError::TransactionRejected(format!("{}: {}", key, e)))?;
        }

        if let Some(missing) = required
            .iter()
            .zip(&signatures)
            .find(|(_, sig)| **sig == Signature::default())
            .map(|(key, _)| key)
        {
            return Err(GuardError::EncodingError(format!("missing signature for {}", missing)));
        }

        Ok(Transaction {
            signatures,
            message: self.message,
        })
    }
}

/// Submits transactions through a [`GuardRpc`] endpoint
#[derive(Clone)]
pub struct TransactionSubmitter {
    rpc: Arc<dyn GuardRpc>,
}

impl TransactionSubmitter {
    pub fn new(rpc: Arc<dyn GuardRpc>) -> Self {
        Self { rpc }
    }

    /// Build, sign, broadcast and confirm `instructions`.
    ///
    /// Returns the signature once the transaction reaches
    /// `options.commitment`. Concurrent calls are independent; nothing is
    /// deduplicated here.
    pub async fn submit(
        &self,
        instructions: &[Instruction],
        wallet: &dyn WalletSigner,
        extra_signers: &[&(dyn Signer + Sync)],
        options: &SubmitOptions,
    ) -> GuardResult<Signature> {
        let fee_payer = wallet.address();
        let blockhash = self
            .rpc
            .get_latest_blockhash(options.commitment)
            .await
            .with_simple_context("transaction_submitter", "fetch_blockhash")?;

        let envelope = TransactionEnvelope::new(instructions, &fee_payer, blockhash)?;
        let fee_payer_signature = wallet.sign(&envelope.message_bytes()).await.map_err(|e| match e {
            GuardError::TransactionRejected(msg) => GuardError::TransactionRejected(msg),
            other => GuardError::TransactionRejected(other.to_string()),
        })?;

        let transaction = envelope.into_signed(fee_payer_signature, extra_signers)?;
        let signature = transaction.signatures[0];
        let wire = bincode::serialize(&transaction)?;
        debug!("Signed transaction {} ({} bytes)", signature, wire.len());

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.broadcast_and_confirm(&wire, &signature, options).await {
                Ok(()) => {
                    info!("Transaction {} confirmed at {} after {} attempt(s)", signature, options.commitment, attempts);
                    return Ok(signature);
                }
                Err(e) if e.is_transient() => {
                    if attempts > options.max_retries {
                        warn!("Giving up on {} after {} attempts: {}", signature, attempts, e);
                        break;
                    }
                    let delay = options.backoff(attempts);
                    warn!("Attempt {} for {} failed, retrying in {:?}: {}", attempts, signature, delay, e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(GuardError::TransactionTimeout { signature, attempts })
    }

    /// One attempt: broadcast, then poll status until the commitment is
    /// reached or the confirmation window closes.
    async fn broadcast_and_confirm(&self, wire: &[u8], signature: &Signature, options: &SubmitOptions) -> GuardResult<()> {
        match self.rpc.send_transaction(wire).await {
            Ok(sent) if sent != *signature => warn!("Node returned signature {} for {}", sent, signature),
            Ok(_) => {}
            // A rebroadcast of something that already landed; its status decides
            Err(GuardError::AlreadyProcessed(msg)) => debug!("{} already processed: {}", signature, msg),
            Err(e) => return Err(e),
        }

        let deadline = Instant::now() + options.confirm_timeout;
        loop {
            let pending = match self.rpc.get_signature_status(signature).await? {
                Some(status) if status.err.is_some() => {
                    return Err(GuardError::TransactionFailed {
                        signature: *signature,
                        reason: status.err.unwrap_or_default(),
                    })
                }
                Some(status) if status.satisfies(options.commitment) => return Ok(()),
                Some(status) => format!(
                    "{} at slot {} has not reached {}",
                    signature, status.slot, options.commitment
                ),
                None => format!("{} not yet seen by the node", signature),
            };

            if Instant::now() + options.status_poll_interval >= deadline {
                return Err(GuardError::RpcTransient(pending));
            }
            tokio::time::sleep(options.status_poll_interval).await;
        }
    }

    /// Simulate `instructions` without signing, for compute estimates.
    pub async fn simulate(
        &self,
        instructions: &[Instruction],
        fee_payer: &Pubkey,
        commitment: Commitment,
    ) -> GuardResult<SimulationOutcome> {
        let blockhash = self.rpc.get_latest_blockhash(commitment).await?;
        let envelope = TransactionEnvelope::new(instructions, fee_payer, blockhash)?;
        let transaction = Transaction::new_unsigned(envelope.message);
        let wire = bincode::serialize(&transaction)?;

        let outcome = self.rpc.simulate_transaction(&wire, commitment).await?;
        debug!("Simulation used {} compute units", outcome.units_consumed);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_instruction::AccountMeta;
    use solana_keypair::Keypair;

    fn instruction(signers: &[Pubkey]) -> Instruction {
        Instruction {
            program_id: Pubkey::new_unique(),
            accounts: signers.iter().map(|k| AccountMeta::new(*k, true)).collect(),
            data: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_envelope_puts_fee_payer_first() {
        let payer = Keypair::new();
        let other = Keypair::new();
        let ix = instruction(&[other.pubkey()]);

        let envelope = TransactionEnvelope::new(&[ix], &payer.pubkey(), Hash::new_from_array([9u8; 32])).unwrap();
        assert_eq!(envelope.required_signers(), &[payer.pubkey(), other.pubkey()]);
    }

    #[test]
    fn test_envelope_rejects_empty_instruction_list() {
        let err = TransactionEnvelope::new(&[], &Pubkey::new_unique(), Hash::default()).err().unwrap();
        assert!(matches!(err, GuardError::EncodingError(_)));
    }

    #[test]
    fn test_envelope_keeps_instruction_order() {
        let payer = Pubkey::new_unique();
        let first = instruction(&[]);
        let second = instruction(&[]);
        let envelope = TransactionEnvelope::new(&[first.clone(), second.clone()], &payer, Hash::default()).unwrap();

        let keys = &envelope.message().account_keys;
        let compiled = &envelope.message().instructions;
        assert_eq!(keys[compiled[0].program_id_index as usize], first.program_id);
        assert_eq!(keys[compiled[1].program_id_index as usize], second.program_id);
    }

    #[test]
    fn test_into_signed_with_extra_signer() {
        let payer = Keypair::new();
        let other = Keypair::new();
        let envelope = TransactionEnvelope::new(&[instruction(&[other.pubkey()])], &payer.pubkey(), Hash::new_from_array([9u8; 32])).unwrap();
        let payer_sig = payer.sign_message(&envelope.message_bytes());

        let tx = envelope.into_signed(payer_sig, &[&other]).unwrap();
        assert_eq!(tx.signatures.len(), 2);
        assert_eq!(tx.signatures[0], payer_sig);
        assert_ne!(tx.signatures[1], Signature::default());
    }

    #[test]
    fn test_into_signed_missing_signer() {
        let payer = Keypair::new();
        let other = Keypair::new();
        let envelope = TransactionEnvelope::new(&[instruction(&[other.pubkey()])], &payer.pubkey(), Hash::new_from_array([9u8; 32])).unwrap();
        let payer_sig = payer.sign_message(&envelope.message_bytes());

        let err = envelope.into_signed(payer_sig, &[]).err().unwrap();
        assert!(matches!(err, GuardError::EncodingError(_)));
    }

    #[test]
    fn test_options_wait_longer_for_finality() {
        let mut config = GuardConfig::new(Pubkey::new_unique());
        config.commitment = Commitment::Finalized;

        let options = SubmitOptions::from(&config);
        assert_eq!(options.commitment, Commitment::Finalized);
        assert!(options.confirm_timeout >= Duration::from_secs(30));
        assert_eq!(options.status_poll_interval, Duration::from_millis(500));
        assert!(SubmitOptions::default().confirm_timeout < options.confirm_timeout);
    }

    #[test]
    fn test_backoff_doubles() {
        let options = SubmitOptions {
            retry_base_delay: Duration::from_millis(500),
            ..SubmitOptions::default()
        };
        assert_eq!(options.backoff(1), Duration::from_millis(500));
        assert_eq!(options.backoff(2), Duration::from_millis(1000));
        assert_eq!(options.backoff(3), Duration::from_millis(2000));
    }
}
