//! Guard program instructions and their wire encoding
//!
//! The payload is a discriminant byte followed by fixed-width little-endian
//! arguments. The account list is positional: the program reads accounts
//! by index, so the order built here is part of the wire contract.

use std::fmt::Display;

use solana_instruction::{AccountMeta, Instruction};
use solana_pubkey::Pubkey;
use solana_sdk_ids::system_program;

use crate::constants::discriminant;
use crate::errors::{GuardError, GuardResult};

/// Instructions understood by the Guard program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardInstruction {
    /// Analyzes a contract for common vulnerabilities.
    ///
    /// Accounts expected:
    /// 0. `[]` Target program to analyze
    /// 1. `[writable]` Analysis account (PDA `[analysis, target]`)
    /// 2. `[signer]` Requester
    /// 3. `[]` System program
    AnalyzeContract {
        /// Buffer size for analysis data
        data_size: u64,
    },

    /// Records gas usage and outcome of a transaction.
    ///
    /// Accounts expected:
    /// 0. `[writable]` Metrics account (PDA `[metrics]`)
    /// 1. `[signer]` Submitter
    /// 2. `[]` System program
    RecordMetrics { gas_used: u64, success: bool },
}

impl GuardInstruction {
    pub fn discriminant(&self) -> u8 {
        match self {
            GuardInstruction::AnalyzeContract { .. } => discriminant::ANALYZE_CONTRACT,
            GuardInstruction::RecordMetrics { .. } => discriminant::RECORD_METRICS,
        }
    }

    /// Serialize the instruction payload.
    pub fn pack(&self) -> Vec<u8> {
        match *self {
            GuardInstruction::AnalyzeContract { data_size } => {
                let mut data = Vec::with_capacity(9);
                data.push(self.discriminant());
                data.extend_from_slice(&data_size.to_le_bytes());
                data
            }
            GuardInstruction::RecordMetrics { gas_used, success } => {
                let mut data = Vec::with_capacity(10);
                data.push(self.discriminant());
                data.extend_from_slice(&gas_used.to_le_bytes());
                data.push(u8::from(success));
                data
            }
        }
    }
}

/// Convert a caller-supplied integer into the u64 the wire format carries.
fn to_wire_u64<N>(field: &str, value: N) -> GuardResult<u64>
where
    N: TryInto<u64> + Display + Copy,
{
    value.try_into().map_err(|_| {
        GuardError::EncodingError(format!(
            "{} must be a non-negative integer below 2^64, got {}",
            field, value
        ))
    })
}

/// Build an `AnalyzeContract` instruction.
pub fn encode_analyze<N>(
    program_id: &Pubkey,
    target_program: &Pubkey,
    analysis_account: &Pubkey,
    caller: &Pubkey,
    data_size: N,
) -> GuardResult<Instruction>
where
    N: TryInto<u64> + Display + Copy,
{
    let data_size = to_wire_u64("data_size", data_size)?;
    let ix = GuardInstruction::AnalyzeContract { data_size };

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new_readonly(*target_program, false),
            AccountMeta::new(*analysis_account, false),
            AccountMeta::new_readonly(*caller, true),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: ix.pack(),
    })
}

/// Build a `RecordMetrics` instruction.
pub fn encode_record_metrics<N>(
    program_id: &Pubkey,
    metrics_account: &Pubkey,
    caller: &Pubkey,
    gas_used: N,
    success: bool,
) -> GuardResult<Instruction>
where
    N: TryInto<u64> + Display + Copy,
{
    let gas_used = to_wire_u64("gas_used", gas_used)?;
    let ix = GuardInstruction::RecordMetrics { gas_used, success };

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![
            AccountMeta::new(*metrics_account, false),
            AccountMeta::new_readonly(*caller, true),
            AccountMeta::new_readonly(system_program::ID, false),
        ],
        data: ix.pack(),
    })
}
