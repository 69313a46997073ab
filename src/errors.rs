//! Error handling for the SOON Guard client.
//!
//! Every fallible operation in the library returns [`GuardResult`]. The
//! variants of [`GuardError`] are grouped by how a caller should react:
//!
//! * codec and derivation errors (`EncodingError`, `AddressSpaceExhausted`)
//!   are caller bugs and are never retried,
//! * `InvalidAccountData` and `AccountNotFound` mean "no data yet",
//! * `RpcTransient` is the only class the submitter retries,
//! * `TransactionRejected`, `TransactionFailed` and `TransactionTimeout`
//!   distinguish "declined by the user", "definitely failed" and
//!   "unknown outcome, check later".

use std::fmt;

use solana_signature::Signature;
use thiserror::Error;

/// Main error type for the Guard client.
#[derive(Error, Debug)]
pub enum GuardError {
    /// No signing capability is available for a mutating call.
    #[error("Wallet not connected")]
    WalletNotConnected,

    /// No bump seed in `0..=255` produced an off-curve address.
    #[error("Address space exhausted: no valid bump seed for {0}")]
    AddressSpaceExhausted(String),

    /// Caller passed a value that cannot be encoded on the wire.
    #[error("Encoding error: {0}")]
    EncodingError(String),

    /// Account buffer is too short to hold the fixed fields of its record.
    #[error("Invalid account data: {0}")]
    InvalidAccountData(String),

    /// The account does not exist on chain yet.
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// The wallet declined to sign.
    #[error("Transaction rejected by signer: {0}")]
    TransactionRejected(String),

    /// Network or availability failure that is worth retrying.
    #[error("Transient RPC error: {0}")]
    RpcTransient(String),

    /// The node has already processed this exact transaction. Only a
    /// rebroadcast can see this; the outcome is read from its status.
    #[error("Transaction already processed: {0}")]
    AlreadyProcessed(String),

    /// RPC failure that retrying will not fix (bad request, malformed reply).
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The transaction landed and the program returned an error.
    #[error("Transaction {signature} failed: {reason}")]
    TransactionFailed {
        signature: Signature,
        reason: String,
    },

    /// Retries were exhausted before the transaction reached the requested
    /// commitment. It may still land.
    #[error("Transaction {signature} not confirmed after {attempts} attempts")]
    TransactionTimeout {
        signature: Signature,
        attempts: usize,
    },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for the Guard client.
pub type GuardResult<T> = Result<T, GuardError>;

impl GuardError {
    /// Whether the submitter may retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, GuardError::RpcTransient(_))
    }

    /// Whether this error only means the account holds no readable record yet.
    pub fn is_no_data(&self) -> bool {
        matches!(
            self,
            GuardError::InvalidAccountData(_) | GuardError::AccountNotFound(_)
        )
    }

    /// Signature of a transaction whose outcome is unknown, if any.
    pub fn pending_signature(&self) -> Option<&Signature> {
        match self {
            GuardError::TransactionTimeout { signature, .. } => Some(signature),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GuardError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            GuardError::RpcTransient(e.to_string())
        } else if e.status().map_or(false, |s| s.is_server_error() || s.as_u16() == 429) {
            GuardError::RpcTransient(e.to_string())
        } else {
            GuardError::Rpc(e.to_string())
        }
    }
}

impl From<bincode::Error> for GuardError {
    fn from(e: bincode::Error) -> Self {
        GuardError::EncodingError(e.to_string())
    }
}

/// Context information for errors.
///
/// Records which component and operation produced an error, and the
/// account involved when there is one.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// Account address involved, if applicable.
    pub address: Option<String>,

    /// Component where the error occurred (e.g. "account_codec").
    pub component: String,

    /// Operation being performed (e.g. "decode_metrics").
    pub operation: String,
}

impl ErrorContext {
    pub fn new(component: &str, operation: &str) -> Self {
        Self {
            address: None,
            component: component.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn with_address(mut self, address: impl fmt::Display) -> Self {
        self.address = Some(address.to_string());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "In {} while {}", self.component, self.operation)?;
        if let Some(address) = &self.address {
            write!(f, " for account {}", address)?;
        }
        Ok(())
    }
}

/// Extension trait for adding context to errors.
///
/// The variant is preserved so retry classification still works after
/// context has been attached; only the message is prefixed.
pub trait ErrorExt<T> {
    /// Add context to an error.
    fn with_context(self, context: ErrorContext) -> GuardResult<T>;

    /// Add component/operation context to an error.
    fn with_simple_context(self, component: &str, operation: &str) -> GuardResult<T>;
}

impl<T> ErrorExt<T> for GuardResult<T> {
    fn with_context(self, context: ErrorContext) -> GuardResult<T> {
        self.map_err(|e| {
            let prefix = |msg: String| format!("{}: {}", context, msg);
            match e {
                GuardError::AddressSpaceExhausted(m) => GuardError::AddressSpaceExhausted(prefix(m)),
                GuardError::EncodingError(m) => GuardError::EncodingError(prefix(m)),
                GuardError::InvalidAccountData(m) => GuardError::InvalidAccountData(prefix(m)),
                GuardError::AccountNotFound(m) => GuardError::AccountNotFound(prefix(m)),
                GuardError::TransactionRejected(m) => GuardError::TransactionRejected(prefix(m)),
                GuardError::RpcTransient(m) => GuardError::RpcTransient(prefix(m)),
                GuardError::AlreadyProcessed(m) => GuardError::AlreadyProcessed(prefix(m)),
                GuardError::Rpc(m) => GuardError::Rpc(prefix(m)),
                GuardError::Config(m) => GuardError::Config(prefix(m)),
                other => other,
            }
        })
    }

    fn with_simple_context(self, component: &str, operation: &str) -> GuardResult<T> {
        self.with_context(ErrorContext::new(component, operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rpc_transient_is_retryable() {
        assert!(GuardError::RpcTransient("timeout".into()).is_transient());
        assert!(!GuardError::Rpc("bad params".into()).is_transient());
        assert!(!GuardError::TransactionRejected("user".into()).is_transient());
        assert!(!GuardError::EncodingError("negative".into()).is_transient());
    }

    #[test]
    fn test_no_data_classification() {
        assert!(GuardError::InvalidAccountData("short".into()).is_no_data());
        assert!(GuardError::AccountNotFound("missing".into()).is_no_data());
        assert!(!GuardError::WalletNotConnected.is_no_data());
    }

    #[test]
    fn test_context_keeps_variant() {
        let result: GuardResult<()> = Err(GuardError::RpcTransient("connection reset".into()));
        let err = result
            .with_context(ErrorContext::new("rpc", "get_latest_blockhash").with_address("abc"))
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(
            err.to_string(),
            "Transient RPC error: In rpc while get_latest_blockhash for account abc: connection reset"
        );
    }

    #[test]
    fn test_timeout_exposes_signature() {
        let err = GuardError::TransactionTimeout {
            signature: Signature::default(),
            attempts: 4,
        };
        assert_eq!(err.pending_signature(), Some(&Signature::default()));
        assert!(GuardError::WalletNotConnected.pending_signature().is_none());
    }
}
