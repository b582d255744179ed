//! Core types for the Draw Ledger

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 32-byte digest (SHA3-256 / Keccak-256)
pub type Hash = [u8; 32];

/// Accounting weight. One unit of weight = one unit of chance.
pub type Amount = u128;

/// Draw epoch counter. 0 means no draw has been opened yet.
pub type DrawIndex = u64;

/// Address length in bytes (EVM-style account id)
pub const ADDRESS_LEN: usize = 20;

/// Default branching factor of the ledger's sortition tree
pub const DEFAULT_BRANCHING_FACTOR: usize = 10;

/// Default cap on entropy re-hash rounds
pub const DEFAULT_MAX_REDUCER_ROUNDS: u32 = 256;

/// Depositor identity. The all-zero address is the null address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// Null address: returned by draws with no eligible weight
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Address whose last 8 bytes hold `n` big-endian. Handy for tests and tooling.
    pub fn from_low_u64(n: u64) -> Self {
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes[ADDRESS_LEN - 8..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(stripped).map_err(|_| LedgerError::InvalidAddress(s.to_string()))?;
        let bytes: [u8; ADDRESS_LEN] = raw
            .try_into()
            .map_err(|_| LedgerError::InvalidAddress(s.to_string()))?;
        Ok(Self(bytes))
    }
}

/// Every failure is an all-or-nothing rejection: no state is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid depositor: null address")]
    InvalidDepositor,

    #[error("no open draw")]
    NoOpenDraw,

    #[error("no committed draw")]
    NoCommittedDraw,

    #[error("amount {requested} exceeds open balance {available}")]
    ExceedsOpenBalance { requested: Amount, available: Amount },

    #[error("amount {requested} exceeds committed balance {available}")]
    ExceedsCommittedBalance { requested: Amount, available: Amount },

    #[error("draw value {value} out of range (committed supply {total})")]
    DrawOutOfRange { value: Amount, total: Amount },

    #[error("uniform reducer: upper bound is zero")]
    ReducerZeroBound,

    #[error("uniform reducer: no unbiased value after {0} rounds")]
    ReducerExhausted(u32),

    #[error("supply overflow")]
    Overflow,

    #[error("branching factor must be at least 2, got {0}")]
    InvalidBranchingFactor(usize),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_roundtrip_display() {
        let addr = Address::from_low_u64(0xdead_beef);
        let text = addr.to_string();
        assert_eq!(text, "0x00000000000000000000000000000000deadbeef");
        assert_eq!(text.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn test_address_parse_without_prefix() {
        let addr: Address = "0000000000000000000000000000000000000001".parse().unwrap();
        assert_eq!(addr, Address::from_low_u64(1));
    }

    #[test]
    fn test_address_parse_rejects_bad_length() {
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzz".parse::<Address>().is_err());
    }

    #[test]
    fn test_zero_address() {
        assert!(Address::ZERO.is_zero());
        assert!(Address::default().is_zero());
        assert!(!Address::from_low_u64(1).is_zero());
    }
}
