//! Draw Ledger: open vs committed balances over one sortition tree
//!
//! # Eligibility
//!
//! Deposits made while draw N is open are *open* and cannot win. When draw
//! N+1 opens they become *committed* and enter the sortition tree, which
//! holds committed weight only:
//!
//! ```text
//! draw 1 open   deposit(a, 10)      open: a=10        tree: {}
//! draw 2 open   ── boundary ──      open: {}          tree: {a: 10}
//!               deposit(b, 5)       open: b=5         tree: {a: 10}
//!               draw(v)             v ∈ [0, 10) → a
//! ```
//!
//! # Reconciliation
//!
//! Every depositor who made an open deposit in the current draw is kept in a
//! registry (first-touch order). `open_next_draw` flushes that registry into
//! the tree before returning, so `draw` never misses newly eligible weight.
//! The same `consolidate` step also runs at the start of every interaction.
//!
//! # Atomicity
//!
//! Every operation validates completely before mutating anything. A call that
//! returns `Err` leaves the ledger exactly as it was and emits no event.

use crate::config::LedgerConfig;
use crate::events::LedgerEvent;
use crate::sortition::SortitionTree;
use crate::types::{Address, Amount, DrawIndex, LedgerError};
use crate::uniform::uniform_amount;
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Per-depositor bookkeeping. Committed weight lives in the tree leaf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Amount deposited in `open_draw`
    pub open_balance: Amount,
    /// Draw the open balance belongs to
    pub open_draw: DrawIndex,
    /// Draw in which the position was first established (0 = none)
    pub consolidated_draw: DrawIndex,
    /// Most recent deposit draw other than `consolidated_draw` (0 = none)
    pub latest_draw: DrawIndex,
}

/// Receipt of a full withdrawal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Withdrawal {
    pub open: Amount,
    pub committed: Amount,
}

impl Withdrawal {
    pub fn total(&self) -> Amount {
        self.open + self.committed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrawLedger {
    config: LedgerConfig,
    current_draw: DrawIndex,
    open_supply: Amount,
    tree: SortitionTree<Address>,
    accounts: HashMap<Address, Account>,
    /// Depositors with open deposits in the current draw
    pending: Vec<Address>,
    #[serde(skip)]
    events: Vec<LedgerEvent>,
}

impl DrawLedger {
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        Ok(Self {
            config,
            current_draw: 0,
            open_supply: 0,
            tree: SortitionTree::new(config.branching_factor)?,
            accounts: HashMap::new(),
            pending: Vec::new(),
            events: Vec::new(),
        })
    }

    // =========================================================================
    // DRAW BOUNDARY
    // =========================================================================

    /// Open the next draw and return its index
    ///
    /// Everything deposited in the closing draw is committed before this
    /// returns.
    pub fn open_next_draw(&mut self) -> Result<DrawIndex, LedgerError> {
        let next = self.current_draw.checked_add(1).ok_or(LedgerError::Overflow)?;
        let closing = self.current_draw;
        let closing_supply = self.open_supply;

        self.current_draw = next;
        let pending = std::mem::take(&mut self.pending);
        for depositor in &pending {
            self.consolidate(depositor)?;
        }
        self.open_supply = 0;

        info!(
            "Draw {} opened: {} committed from draw {} ({} depositors), committed supply {}",
            next,
            closing_supply,
            closing,
            pending.len(),
            self.tree.total()
        );
        self.events.push(LedgerEvent::DrawOpened { draw_index: next });
        Ok(next)
    }

    // =========================================================================
    // DEPOSITS
    // =========================================================================

    /// Deposit into the currently open draw (ineligible until the next one)
    pub fn deposit(&mut self, depositor: Address, amount: Amount) -> Result<(), LedgerError> {
        if depositor.is_zero() {
            return Err(LedgerError::InvalidDepositor);
        }
        if self.current_draw == 0 {
            return Err(LedgerError::NoOpenDraw);
        }
        self.ensure_capacity(amount)?;
        if amount == 0 {
            return Ok(());
        }

        self.consolidate(&depositor)?;

        let current = self.current_draw;
        let account = self.accounts.entry(depositor).or_default();
        if account.open_draw != current {
            account.open_draw = current;
            self.pending.push(depositor);
        }
        account.open_balance += amount;

        if account.consolidated_draw == 0 {
            account.consolidated_draw = current;
        } else if account.consolidated_draw != current {
            account.latest_draw = current;
        }

        self.open_supply += amount;

        debug!("{} deposited {} into draw {}", depositor, amount, current);
        self.events.push(LedgerEvent::Deposited {
            depositor,
            amount,
            draw_index: current,
        });
        Ok(())
    }

    /// Deposit straight into committed (eligible) weight
    pub fn deposit_committed(&mut self, depositor: Address, amount: Amount) -> Result<(), LedgerError> {
        if depositor.is_zero() {
            return Err(LedgerError::InvalidDepositor);
        }
        if !self.has_committed_draw() {
            return Err(LedgerError::NoCommittedDraw);
        }
        self.ensure_capacity(amount)?;
        if amount == 0 {
            return Ok(());
        }

        self.consolidate(&depositor)?;

        let committed = self.tree.stake_of(&depositor) + amount;
        self.tree.set(depositor, committed)?;

        let current = self.current_draw;
        let account = self.accounts.entry(depositor).or_default();
        if account.consolidated_draw == 0 || account.consolidated_draw == current {
            account.latest_draw = account.consolidated_draw;
            account.consolidated_draw = current - 1;
        }

        debug!("{} deposited {} committed (now {})", depositor, amount, committed);
        self.events.push(LedgerEvent::CommittedDeposited { depositor, amount });
        Ok(())
    }

    // =========================================================================
    // WITHDRAWALS
    // =========================================================================

    pub fn withdraw_open(&mut self, depositor: Address, amount: Amount) -> Result<(), LedgerError> {
        if amount == 0 {
            return Ok(());
        }
        if depositor.is_zero() {
            return Err(LedgerError::InvalidDepositor);
        }
        if self.current_draw == 0 {
            return Err(LedgerError::NoOpenDraw);
        }

        let available = self.open_balance_of(&depositor);
        if amount > available {
            return Err(LedgerError::ExceedsOpenBalance {
                requested: amount,
                available,
            });
        }

        self.consolidate(&depositor)?;
        if let Some(account) = self.accounts.get_mut(&depositor) {
            account.open_balance -= amount;
        }
        self.open_supply -= amount;
        self.prune(&depositor);

        debug!("{} withdrew {} open", depositor, amount);
        self.events.push(LedgerEvent::OpenWithdrawn { depositor, amount });
        Ok(())
    }

    /// Withdrawing zero always succeeds and touches nothing.
    pub fn withdraw_committed(&mut self, depositor: Address, amount: Amount) -> Result<(), LedgerError> {
        if amount == 0 {
            return Ok(());
        }
        if depositor.is_zero() {
            return Err(LedgerError::InvalidDepositor);
        }
        if !self.has_committed_draw() {
            return Err(LedgerError::NoCommittedDraw);
        }

        let available = self.committed_balance_of(&depositor);
        if amount > available {
            return Err(LedgerError::ExceedsCommittedBalance {
                requested: amount,
                available,
            });
        }

        self.consolidate(&depositor)?;
        self.tree.set(depositor, available - amount)?;
        self.prune(&depositor);

        debug!("{} withdrew {} committed", depositor, amount);
        self.events.push(LedgerEvent::CommittedWithdrawn { depositor, amount });
        Ok(())
    }

    /// Withdraw the depositor's entire open and committed balance
    pub fn withdraw(&mut self, depositor: Address) -> Result<Withdrawal, LedgerError> {
        if depositor.is_zero() {
            return Err(LedgerError::InvalidDepositor);
        }

        let receipt = Withdrawal {
            open: self.open_balance_of(&depositor),
            committed: self.committed_balance_of(&depositor),
        };

        self.consolidate(&depositor)?;
        self.tree.set(depositor, 0)?;
        self.open_supply -= receipt.open;
        self.accounts.remove(&depositor);

        if receipt.total() > 0 {
            debug!(
                "{} withdrew all: {} open, {} committed",
                depositor, receipt.open, receipt.committed
            );
            self.events.push(LedgerEvent::Withdrawn {
                depositor,
                open: receipt.open,
                committed: receipt.committed,
            });
        }
        Ok(receipt)
    }

    // =========================================================================
    // SELECTION
    // =========================================================================

    /// Depositor owning position `value` of the committed supply
    ///
    /// Returns the null address when nothing is committed.
    pub fn draw(&self, value: Amount) -> Result<Address, LedgerError> {
        if self.tree.total() == 0 {
            return Ok(Address::ZERO);
        }
        self.tree.select(value).copied()
    }

    /// Reduce `entropy` into `[0, committed_supply)` without bias, then draw
    pub fn draw_with_entropy(&self, entropy: U256) -> Result<Address, LedgerError> {
        let total = self.tree.total();
        if total == 0 {
            return Ok(Address::ZERO);
        }
        let value = uniform_amount(entropy, total, self.config.max_reducer_rounds)?;
        self.draw(value)
    }

    // =========================================================================
    // VIEWS
    // =========================================================================

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn current_draw_index(&self) -> DrawIndex {
        self.current_draw
    }

    pub fn has_committed_draw(&self) -> bool {
        self.current_draw >= 2
    }

    pub fn open_supply(&self) -> Amount {
        self.open_supply
    }

    pub fn committed_supply(&self) -> Amount {
        self.tree.total()
    }

    /// Alias of `committed_supply`: the sortition tree root
    pub fn total(&self) -> Amount {
        self.tree.total()
    }

    pub fn total_supply(&self) -> Amount {
        self.open_supply + self.tree.total()
    }

    pub fn open_balance_of(&self, depositor: &Address) -> Amount {
        match self.accounts.get(depositor) {
            Some(account) if account.open_draw == self.current_draw => account.open_balance,
            _ => 0,
        }
    }

    pub fn committed_balance_of(&self, depositor: &Address) -> Amount {
        let stale = match self.accounts.get(depositor) {
            Some(account) if account.open_draw < self.current_draw => account.open_balance,
            _ => 0,
        };
        self.tree.stake_of(depositor) + stale
    }

    pub fn balance_of(&self, depositor: &Address) -> Amount {
        self.open_balance_of(depositor) + self.committed_balance_of(depositor)
    }

    /// Committed leaf weight in the sortition tree
    pub fn stake_of(&self, depositor: &Address) -> Amount {
        self.tree.stake_of(depositor)
    }

    pub fn latest_draw_index(&self, depositor: &Address) -> DrawIndex {
        self.accounts.get(depositor).map(|a| a.latest_draw).unwrap_or(0)
    }

    pub fn consolidated_draw_index(&self, depositor: &Address) -> DrawIndex {
        self.accounts.get(depositor).map(|a| a.consolidated_draw).unwrap_or(0)
    }

    pub fn account(&self, depositor: &Address) -> Option<&Account> {
        self.accounts.get(depositor)
    }

    pub fn depositor_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn tree(&self) -> &SortitionTree<Address> {
        &self.tree
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    // =========================================================================
    // INTERNALS
    // =========================================================================

    /// Fail with `Overflow` if tracked supply cannot grow by `amount`.
    /// Once this holds, every later addition inside the ledger is in range.
    fn ensure_capacity(&self, amount: Amount) -> Result<(), LedgerError> {
        self.total_supply()
            .checked_add(amount)
            .map(|_| ())
            .ok_or(LedgerError::Overflow)
    }

    /// Move an open balance from a past draw into the depositor's tree leaf
    fn consolidate(&mut self, depositor: &Address) -> Result<(), LedgerError> {
        let Some(account) = self.accounts.get_mut(depositor) else {
            return Ok(());
        };
        if account.open_balance == 0 || account.open_draw >= self.current_draw {
            return Ok(());
        }

        let amount = account.open_balance;
        let from_draw = account.open_draw;
        let committed = self.tree.stake_of(depositor) + amount;
        self.tree.set(*depositor, committed)?;
        account.open_balance = 0;

        self.events.push(LedgerEvent::Consolidated {
            depositor: *depositor,
            amount,
            from_draw,
        });
        Ok(())
    }

    /// Drop bookkeeping for depositors left with nothing
    fn prune(&mut self, depositor: &Address) {
        let empty = self
            .accounts
            .get(depositor)
            .map(|a| a.open_balance == 0)
            .unwrap_or(false);
        if empty && !self.tree.contains(depositor) {
            self.accounts.remove(depositor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> DrawLedger {
        DrawLedger::new(LedgerConfig::default()).unwrap()
    }

    fn user(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    #[test]
    fn test_deposit_requires_open_draw() {
        let mut l = ledger();
        assert_eq!(l.deposit(user(1), 10), Err(LedgerError::NoOpenDraw));
        assert!(l.events().is_empty());
    }

    #[test]
    fn test_deposit_rejects_null_address() {
        let mut l = ledger();
        l.open_next_draw().unwrap();
        assert_eq!(l.deposit(Address::ZERO, 10), Err(LedgerError::InvalidDepositor));
        assert_eq!(l.deposit_committed(Address::ZERO, 10), Err(LedgerError::InvalidDepositor));
        assert_eq!(l.withdraw(Address::ZERO), Err(LedgerError::InvalidDepositor));
    }

    #[test]
    fn test_boundary_flushes_open_balances() {
        let mut l = ledger();
        l.open_next_draw().unwrap();
        l.deposit(user(1), 10).unwrap();
        assert_eq!(l.tree().total(), 0);

        l.open_next_draw().unwrap();
        assert_eq!(l.stake_of(&user(1)), 10);
        assert_eq!(l.account(&user(1)).unwrap().open_balance, 0);
        assert_eq!(l.open_supply(), 0);
    }

    #[test]
    fn test_consolidation_event_emitted() {
        let mut l = ledger();
        l.open_next_draw().unwrap();
        l.deposit(user(1), 10).unwrap();
        l.drain_events();

        l.open_next_draw().unwrap();
        let events = l.drain_events();
        assert_eq!(
            events,
            vec![
                LedgerEvent::Consolidated { depositor: user(1), amount: 10, from_draw: 1 },
                LedgerEvent::DrawOpened { draw_index: 2 },
            ]
        );
    }

    #[test]
    fn test_overflow_rejected_without_mutation() {
        let mut l = ledger();
        l.open_next_draw().unwrap();
        l.deposit(user(1), Amount::MAX).unwrap();
        assert_eq!(l.deposit(user(2), 1), Err(LedgerError::Overflow));
        assert_eq!(l.depositor_count(), 1);
        assert_eq!(l.open_supply(), Amount::MAX);
    }

    #[test]
    fn test_prune_after_full_withdrawals() {
        let mut l = ledger();
        l.open_next_draw().unwrap();
        l.deposit(user(1), 10).unwrap();
        l.withdraw_open(user(1), 10).unwrap();
        assert!(l.account(&user(1)).is_none());
        assert_eq!(l.consolidated_draw_index(&user(1)), 0);
    }

    #[test]
    fn test_redeposit_after_withdraw_same_draw() {
        let mut l = ledger();
        l.open_next_draw().unwrap();
        l.deposit(user(1), 10).unwrap();
        l.withdraw(user(1)).unwrap();
        l.deposit(user(1), 4).unwrap();

        l.open_next_draw().unwrap();
        assert_eq!(l.committed_balance_of(&user(1)), 4);
        assert_eq!(l.committed_supply(), 4);
    }
}
