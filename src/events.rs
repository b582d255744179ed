//! Domain events emitted by the ledger for off-chain observers

use crate::types::{Address, Amount, DrawIndex};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// A new draw opened; deposits made from now on are ineligible until the next one
    DrawOpened { draw_index: DrawIndex },
    Deposited { depositor: Address, amount: Amount, draw_index: DrawIndex },
    CommittedDeposited { depositor: Address, amount: Amount },
    OpenWithdrawn { depositor: Address, amount: Amount },
    CommittedWithdrawn { depositor: Address, amount: Amount },
    Withdrawn { depositor: Address, open: Amount, committed: Amount },
    /// Open balance from `from_draw` moved into the depositor's eligible weight
    Consolidated { depositor: Address, amount: Amount, from_draw: DrawIndex },
}

impl LedgerEvent {
    pub fn depositor(&self) -> Option<&Address> {
        match self {
            LedgerEvent::DrawOpened { .. } => None,
            LedgerEvent::Deposited { depositor, .. }
            | LedgerEvent::CommittedDeposited { depositor, .. }
            | LedgerEvent::OpenWithdrawn { depositor, .. }
            | LedgerEvent::CommittedWithdrawn { depositor, .. }
            | LedgerEvent::Withdrawn { depositor, .. }
            | LedgerEvent::Consolidated { depositor, .. } => Some(depositor),
        }
    }
}

impl fmt::Display for LedgerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerEvent::DrawOpened { draw_index } => write!(f, "draw {} opened", draw_index),
            LedgerEvent::Deposited { depositor, amount, draw_index } => {
                write!(f, "{} deposited {} in draw {}", depositor, amount, draw_index)
            }
            LedgerEvent::CommittedDeposited { depositor, amount } => {
                write!(f, "{} deposited {} committed", depositor, amount)
            }
            LedgerEvent::OpenWithdrawn { depositor, amount } => {
                write!(f, "{} withdrew {} open", depositor, amount)
            }
            LedgerEvent::CommittedWithdrawn { depositor, amount } => {
                write!(f, "{} withdrew {} committed", depositor, amount)
            }
            LedgerEvent::Withdrawn { depositor, open, committed } => {
                write!(f, "{} withdrew all ({} open, {} committed)", depositor, open, committed)
            }
            LedgerEvent::Consolidated { depositor, amount, from_draw } => {
                write!(f, "{} consolidated {} from draw {}", depositor, amount, from_draw)
            }
        }
    }
}
