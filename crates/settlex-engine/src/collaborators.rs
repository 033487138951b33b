//! External collaborators and the ledger instruction plan.
//!
//! The keeper never moves funds itself. While a request validates, it
//! appends [`LedgerOp`]s to a [`LedgerPlan`]; the plan is executed against
//! the [`Ledger`] only after validation has fully succeeded. If instruction
//! `k` fails, instructions `0..k` are undone in reverse order and the
//! ledger's error is returned unmodified.

use settlex_types::{Address, Coins, LedgerError, NavUpdate};

/// Holds, releases and moves fungible funds.
pub trait Ledger {
    /// Move `amount` from the account's spendable balance into its held balance.
    fn hold(&mut self, account: &Address, amount: &Coins) -> Result<(), LedgerError>;

    /// Move `amount` from the account's held balance back to spendable.
    fn release(&mut self, account: &Address, amount: &Coins) -> Result<(), LedgerError>;

    /// Move spendable `amount` from one account to another.
    fn transfer(&mut self, from: &Address, to: &Address, amount: &Coins)
    -> Result<(), LedgerError>;
}

/// Answers attribute (identity) requirements.
pub trait AttributeSource {
    fn has_all_attributes(&self, account: &Address, required: &[String]) -> bool;
}

/// Receives net-asset-price notifications. Fire-and-forget.
pub trait NavSink {
    fn notify(&mut self, update: &NavUpdate);
}

// ---------------------------------------------------------------------------
// LedgerOp / LedgerPlan
// ---------------------------------------------------------------------------

/// One ledger instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOp {
    Hold {
        account: Address,
        amount: Coins,
    },
    Release {
        account: Address,
        amount: Coins,
    },
    Transfer {
        from: Address,
        to: Address,
        amount: Coins,
    },
}

impl LedgerOp {
    fn apply<L: Ledger + ?Sized>(&self, ledger: &mut L) -> Result<(), LedgerError> {
        match self {
            Self::Hold { account, amount } => ledger.hold(account, amount),
            Self::Release { account, amount } => ledger.release(account, amount),
            Self::Transfer { from, to, amount } => ledger.transfer(from, to, amount),
        }
    }

    /// The instruction that undoes this one.
    #[must_use]
    pub fn inverse(&self) -> Self {
        match self {
            Self::Hold { account, amount } => Self::Release {
                account: account.clone(),
                amount: amount.clone(),
            },
            Self::Release { account, amount } => Self::Hold {
                account: account.clone(),
                amount: amount.clone(),
            },
            Self::Transfer { from, to, amount } => Self::Transfer {
                from: to.clone(),
                to: from.clone(),
                amount: amount.clone(),
            },
        }
    }
}

/// Ordered ledger instructions collected during one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerPlan {
    ops: Vec<LedgerOp>,
}

impl LedgerPlan {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ops(&self) -> &[LedgerOp] {
        &self.ops
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn hold(&mut self, account: &Address, amount: &Coins) {
        if !amount.is_empty() {
            self.ops.push(LedgerOp::Hold {
                account: account.clone(),
                amount: amount.clone(),
            });
        }
    }

    pub fn release(&mut self, account: &Address, amount: &Coins) {
        if !amount.is_empty() {
            self.ops.push(LedgerOp::Release {
                account: account.clone(),
                amount: amount.clone(),
            });
        }
    }

    /// Empty amounts and self-transfers are dropped.
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: &Coins) {
        if !amount.is_empty() && from != to {
            self.ops.push(LedgerOp::Transfer {
                from: from.clone(),
                to: to.clone(),
                amount: amount.clone(),
            });
        }
    }

    /// Execute every instruction in order, undoing the applied prefix on failure.
    pub fn execute<L: Ledger + ?Sized>(&self, ledger: &mut L) -> Result<(), LedgerError> {
        for (i, op) in self.ops.iter().enumerate() {
            if let Err(err) = op.apply(ledger) {
                tracing::warn!(
                    failed_op = i,
                    rolling_back = i,
                    error = %err,
                    "Ledger instruction failed, rolling back"
                );
                for (j, done) in self.ops[..i].iter().enumerate().rev() {
                    if let Err(undo_err) = done.inverse().apply(ledger) {
                        tracing::error!(
                            op = j,
                            error = %undo_err,
                            "Ledger rollback instruction failed"
                        );
                    }
                }
                return Err(err);
            }
        }
        tracing::debug!(ops = self.ops.len(), "Ledger plan executed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryLedger;

    fn addr(b: u8) -> Address {
        Address::new(vec![b; 20]).unwrap()
    }

    fn coins(s: &str) -> Coins {
        s.parse().unwrap()
    }

    #[test]
    fn empty_and_self_ops_are_dropped() {
        let mut plan = LedgerPlan::new();
        plan.hold(&addr(1), &Coins::empty());
        plan.transfer(&addr(1), &addr(1), &coins("5acorn"));
        plan.release(&addr(1), &Coins::empty());
        assert!(plan.is_empty());
    }

    #[test]
    fn inverse_swaps_direction() {
        let op = LedgerOp::Transfer {
            from: addr(1),
            to: addr(2),
            amount: coins("1acorn"),
        };
        assert_eq!(op.inverse().inverse(), op);
        assert!(matches!(op.inverse(), LedgerOp::Transfer { from, .. } if from == addr(2)));
    }

    #[test]
    fn executes_in_order() {
        let mut ledger = MemoryLedger::new();
        ledger.fund(&addr(1), &coins("10acorn"));
        let mut plan = LedgerPlan::new();
        plan.hold(&addr(1), &coins("10acorn"));
        plan.release(&addr(1), &coins("4acorn"));
        plan.transfer(&addr(1), &addr(2), &coins("4acorn"));
        plan.execute(&mut ledger).unwrap();
        assert_eq!(ledger.held(&addr(1)), coins("6acorn"));
        assert_eq!(ledger.spendable(&addr(2)), coins("4acorn"));
        assert!(ledger.spendable(&addr(1)).is_empty());
    }

    #[test]
    fn failure_rolls_back_applied_prefix() {
        let mut ledger = MemoryLedger::new();
        ledger.fund(&addr(1), &coins("10acorn"));
        let before = ledger.clone();

        let mut plan = LedgerPlan::new();
        plan.transfer(&addr(1), &addr(2), &coins("6acorn"));
        plan.hold(&addr(2), &coins("6acorn"));
        plan.transfer(&addr(1), &addr(3), &coins("6acorn"));

        let err = plan.execute(&mut ledger).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(ledger, before);
    }
}
