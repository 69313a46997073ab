//! Client library for the SOON Guard program
//!
//! This crate derives the program's account addresses, encodes its two
//! instructions, decodes its account state, submits transactions with
//! bounded retry, and polls program and cluster state into a live snapshot.

pub mod address;
pub mod client;
pub mod config;
pub mod constants;
pub mod errors;
pub mod models;
pub mod monitor;
pub mod rpc;
pub mod submitter;
pub mod wallet;

pub use address::{derive, AddressDeriver, DerivedAddress};
pub use client::GuardClient;
pub use config::{GuardConfig, SeedConfig};
pub use errors::{GuardError, GuardResult};
pub use monitor::{AnalyticsMonitor, MonitorHandle, Snapshot};
pub use rpc::{Commitment, GuardRpc, HttpRpcClient};
pub use submitter::{SubmitOptions, TransactionSubmitter};
pub use wallet::{KeypairWallet, WalletSigner};

/// Version of the Guard client
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
