//! Ledger configuration

use crate::types::{LedgerError, DEFAULT_BRANCHING_FACTOR, DEFAULT_MAX_REDUCER_ROUNDS};
use serde::{Deserialize, Serialize};

/// Upper limit for the sortition tree fan-out
pub const MAX_BRANCHING_FACTOR: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Children per sortition tree node
    pub branching_factor: usize,

    /// Cap on entropy re-hash rounds in `draw_with_entropy`
    pub max_reducer_rounds: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            branching_factor: DEFAULT_BRANCHING_FACTOR,
            max_reducer_rounds: DEFAULT_MAX_REDUCER_ROUNDS,
        }
    }
}

impl LedgerConfig {
    pub fn with_branching_factor(mut self, k: usize) -> Self {
        self.branching_factor = k;
        self
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.branching_factor < 2 {
            return Err(LedgerError::InvalidBranchingFactor(self.branching_factor));
        }
        if self.branching_factor > MAX_BRANCHING_FACTOR {
            return Err(LedgerError::InvalidConfig(format!(
                "branching_factor must be <= {}",
                MAX_BRANCHING_FACTOR
            )));
        }
        if self.max_reducer_rounds == 0 {
            return Err(LedgerError::InvalidConfig(
                "max_reducer_rounds must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = LedgerConfig::default();
        assert_eq!(config.branching_factor, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bounds() {
        assert_eq!(
            LedgerConfig::default().with_branching_factor(1).validate(),
            Err(LedgerError::InvalidBranchingFactor(1))
        );
        assert!(LedgerConfig::default().with_branching_factor(65).validate().is_err());

        let config = LedgerConfig { max_reducer_rounds: 0, ..LedgerConfig::default() };
        assert!(config.validate().is_err());
    }
}
