//! Signing capability supplied by the caller's wallet

use std::path::Path;

use async_trait::async_trait;
use solana_keypair::{read_keypair_file, Keypair};
use solana_pubkey::Pubkey;
use solana_signature::Signature;
use solana_signer::Signer;

use crate::errors::{GuardError, GuardResult};

/// A connected wallet that can sign transaction messages.
///
/// `sign` may be interactive; a refusal must be reported as
/// [`GuardError::TransactionRejected`]. The submitter never retries it.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Address the wallet signs for.
    fn address(&self) -> Pubkey;

    /// Sign serialized message bytes.
    async fn sign(&self, message: &[u8]) -> GuardResult<Signature>;
}

/// Local keypair wallet, used by the CLI and for scripting
pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Load a keypair from a JSON keypair file.
    pub fn from_file(path: &Path) -> GuardResult<Self> {
        let keypair = read_keypair_file(path).map_err(|e| {
            GuardError::Config(format!("failed to read keypair {}: {}", path.display(), e))
        })?;
        Ok(Self::new(keypair))
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

#[async_trait]
impl WalletSigner for KeypairWallet {
    fn address(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign(&self, message: &[u8]) -> GuardResult<Signature> {
        self.keypair
            .try_sign_message(message)
            .map_err(|e| GuardError::TransactionRejected(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keypair_wallet_signs_for_its_address() {
        let keypair = Keypair::new();
        let expected = keypair.pubkey();
        let wallet = KeypairWallet::new(keypair);

        assert_eq!(wallet.address(), expected);
        let signature = wallet.sign(b"message").await.unwrap();
        assert_eq!(signature, wallet.keypair().sign_message(b"message"));
    }

    #[test]
    fn test_missing_keypair_file() {
        let err = KeypairWallet::from_file(Path::new("/nonexistent/id.json")).err().unwrap();
        assert!(matches!(err, GuardError::Config(_)));
    }
}
