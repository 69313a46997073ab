//! Program-derived address computation for Guard accounts
//!
//! Every account the Guard program owns lives at an address derived from
//! the program id and a short list of seeds. The same seeds are used to
//! write an account (as an instruction account) and to read it back.

use log::debug;
use serde::Serialize;
use solana_pubkey::{Pubkey, PubkeyError, MAX_SEEDS, MAX_SEED_LEN};

use crate::config::SeedConfig;
use crate::errors::{GuardError, GuardResult};

/// An address owned by the program together with the bump that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DerivedAddress {
    #[serde(with = "display")]
    pub address: Pubkey,
    pub bump: u8,
}

/// Derive a program address from `seeds` and an optional target address.
///
/// The bump byte is appended after all seeds and tried from 255 downward;
/// the first candidate that is not a valid ed25519 point wins.
pub fn derive(
    program_id: &Pubkey,
    seeds: &[&[u8]],
    target: Option<&Pubkey>,
) -> GuardResult<DerivedAddress> {
    let mut all_seeds: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 2);
    all_seeds.extend_from_slice(seeds);
    if let Some(target) = target {
        all_seeds.push(target.as_ref());
    }

    // one slot is reserved for the bump
    if all_seeds.len() >= MAX_SEEDS {
        return Err(GuardError::EncodingError(format!(
            "too many seeds: {} (max {})",
            all_seeds.len(),
            MAX_SEEDS - 1
        )));
    }
    if let Some(seed) = all_seeds.iter().find(|s| s.len() > MAX_SEED_LEN) {
        return Err(GuardError::EncodingError(format!(
            "seed of {} bytes exceeds the {} byte limit",
            seed.len(),
            MAX_SEED_LEN
        )));
    }

    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut candidate = all_seeds.clone();
        candidate.push(&bump_seed);

        match Pubkey::create_program_address(&candidate, program_id) {
            Ok(address) => return Ok(DerivedAddress { address, bump }),
            Err(PubkeyError::InvalidSeeds) => continue,
            Err(e) => return Err(GuardError::EncodingError(e.to_string())),
        }
    }

    debug!("No off-curve bump found for program {}", program_id);
    Err(GuardError::AddressSpaceExhausted(program_id.to_string()))
}

/// Derives the three well-known Guard accounts for one program id.
#[derive(Debug, Clone)]
pub struct AddressDeriver {
    program_id: Pubkey,
    seeds: SeedConfig,
}

impl AddressDeriver {
    pub fn new(program_id: Pubkey, seeds: SeedConfig) -> Self {
        Self { program_id, seeds }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    /// Analysis account for `target`: seeds `[analysis, target]`.
    pub fn analysis(&self, target: &Pubkey) -> GuardResult<DerivedAddress> {
        derive(
            &self.program_id,
            &[self.seeds.analysis.as_bytes()],
            Some(target),
        )
    }

    /// Global metrics account: seeds `[metrics]`.
    pub fn metrics(&self) -> GuardResult<DerivedAddress> {
        derive(&self.program_id, &[self.seeds.metrics.as_bytes()], None)
    }

    /// Network stats account: seeds `[network-stats]`.
    pub fn network_stats(&self) -> GuardResult<DerivedAddress> {
        derive(&self.program_id, &[self.seeds.network_stats.as_bytes()], None)
    }
}

/// Serialize a value through its `Display` impl (base58 for keys).
pub(crate) mod display {
    use serde::Serializer;
    use std::fmt::Display;

    pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }
}
