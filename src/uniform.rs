//! Uniform reduction of entropy into `[0, bound)` without modulo bias
//!
//! `entropy % bound` over-represents small remainders whenever `bound` does
//! not divide `2^256`. The low region `[0, 2^256 mod bound)` is the surplus,
//! so any candidate falling there is re-hashed until it lands above it:
//!
//! ```text
//! min       = (2^256 - bound) % bound
//! candidate = entropy
//! while candidate < min:
//!     candidate = keccak256(candidate)
//! return candidate % bound
//! ```
//!
//! The raw entropy is tested before any hashing, so entropy that is already
//! unbiased maps straight through (`uniform(6, 10) == 6`). Rejection
//! probability per round is `min / 2^256 < bound / 2^256`.

use crate::crypto::keccak_u256;
use crate::types::{Amount, LedgerError, DEFAULT_MAX_REDUCER_ROUNDS};
use primitive_types::U256;

/// Result of a reduction with the number of re-hash rounds it took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reduction {
    pub value: U256,
    pub rounds: u32,
}

/// Size of the biased low region for `bound`, None for a zero bound
#[inline]
pub fn biased_floor(bound: U256) -> Option<U256> {
    if bound.is_zero() {
        return None;
    }
    Some((U256::MAX - bound + U256::one()) % bound)
}

/// Reduce with an explicit cap on re-hash rounds
pub fn reduce(entropy: U256, bound: U256, max_rounds: u32) -> Result<Reduction, LedgerError> {
    let min = biased_floor(bound).ok_or(LedgerError::ReducerZeroBound)?;
    let mut candidate = entropy;
    let mut rounds = 0u32;

    while candidate < min {
        if rounds >= max_rounds {
            return Err(LedgerError::ReducerExhausted(max_rounds));
        }
        candidate = keccak_u256(candidate);
        rounds += 1;
    }

    Ok(Reduction {
        value: candidate % bound,
        rounds,
    })
}

/// `uniform(seed, bound) -> [0, bound)`, deterministic in its inputs
pub fn uniform(entropy: U256, bound: U256) -> Result<U256, LedgerError> {
    reduce(entropy, bound, DEFAULT_MAX_REDUCER_ROUNDS).map(|r| r.value)
}

/// Ledger-facing variant: the bound is a supply, so the result fits `Amount`
pub fn uniform_amount(entropy: U256, bound: Amount, max_rounds: u32) -> Result<Amount, LedgerError> {
    let reduction = reduce(entropy, U256::from(bound), max_rounds)?;
    Ok(reduction.value.low_u128())
}
