//! In-memory collaborators for tests and local tooling.
//!
//! Enabled by the `test-helpers` feature (and always under `cfg(test)`).

use std::collections::{BTreeMap, BTreeSet};

use settlex_types::{Address, Coins, LedgerError, NavUpdate};

use crate::{AttributeSource, Ledger, NavSink};

/// A ledger tracking spendable and held balances per account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryLedger {
    spendable: BTreeMap<Address, Coins>,
    held: BTreeMap<Address, Coins>,
    frozen: BTreeSet<Address>,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit spendable funds.
    ///
    /// # Panics
    /// On amount overflow.
    pub fn fund(&mut self, account: &Address, amount: &Coins) {
        let entry = self.spendable.entry(account.clone()).or_default();
        *entry = entry.checked_add(amount).expect("test funding overflow");
    }

    #[must_use]
    pub fn spendable(&self, account: &Address) -> Coins {
        self.spendable.get(account).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn held(&self, account: &Address) -> Coins {
        self.held.get(account).cloned().unwrap_or_default()
    }

    /// Make every future instruction touching `account` fail.
    pub fn freeze_account(&mut self, account: &Address) {
        self.frozen.insert(account.clone());
    }

    fn check_frozen(&self, account: &Address) -> Result<(), LedgerError> {
        if self.frozen.contains(account) {
            return Err(LedgerError::Rejected {
                reason: format!("account {account} is frozen"),
            });
        }
        Ok(())
    }

    fn debit(
        map: &mut BTreeMap<Address, Coins>,
        account: &Address,
        amount: &Coins,
    ) -> Option<()> {
        let current = map.get(account).cloned().unwrap_or_default();
        let left = current.checked_sub(amount)?;
        if left.is_empty() {
            map.remove(account);
        } else {
            map.insert(account.clone(), left);
        }
        Some(())
    }

    fn credit(
        map: &mut BTreeMap<Address, Coins>,
        account: &Address,
        amount: &Coins,
    ) -> Result<(), LedgerError> {
        let current = map.get(account).cloned().unwrap_or_default();
        let total = current
            .checked_add(amount)
            .map_err(|e| LedgerError::Rejected {
                reason: e.to_string(),
            })?;
        if !total.is_empty() {
            map.insert(account.clone(), total);
        }
        Ok(())
    }
}

impl Ledger for MemoryLedger {
    fn hold(&mut self, account: &Address, amount: &Coins) -> Result<(), LedgerError> {
        self.check_frozen(account)?;
        Self::debit(&mut self.spendable, account, amount).ok_or_else(|| {
            LedgerError::InsufficientFunds {
                account: account.clone(),
                needed: amount.to_string(),
                available: self.spendable(account).to_string(),
            }
        })?;
        Self::credit(&mut self.held, account, amount)
    }

    fn release(&mut self, account: &Address, amount: &Coins) -> Result<(), LedgerError> {
        self.check_frozen(account)?;
        Self::debit(&mut self.held, account, amount).ok_or_else(|| {
            LedgerError::InsufficientHeld {
                account: account.clone(),
                needed: amount.to_string(),
                held: self.held(account).to_string(),
            }
        })?;
        Self::credit(&mut self.spendable, account, amount)
    }

    fn transfer(
        &mut self,
        from: &Address,
        to: &Address,
        amount: &Coins,
    ) -> Result<(), LedgerError> {
        self.check_frozen(from)?;
        self.check_frozen(to)?;
        Self::debit(&mut self.spendable, from, amount).ok_or_else(|| {
            LedgerError::InsufficientFunds {
                account: from.clone(),
                needed: amount.to_string(),
                available: self.spendable(from).to_string(),
            }
        })?;
        Self::credit(&mut self.spendable, to, amount)
    }
}

/// Attribute source backed by a fixed table.
///
/// A required name `*.suffix` matches any held attribute ending in `.suffix`.
#[derive(Debug, Clone, Default)]
pub struct StaticAttributes {
    attributes: BTreeMap<Address, BTreeSet<String>>,
}

impl StaticAttributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&mut self, account: &Address, attribute: impl Into<String>) {
        self.attributes
            .entry(account.clone())
            .or_default()
            .insert(attribute.into());
    }

    fn has(&self, account: &Address, required: &str) -> bool {
        let Some(held) = self.attributes.get(account) else {
            return false;
        };
        match required.strip_prefix("*.") {
            Some(suffix) => held.iter().any(|a| {
                a.strip_suffix(suffix)
                    .is_some_and(|head| head.ends_with('.'))
            }),
            None => held.contains(required),
        }
    }
}

impl AttributeSource for StaticAttributes {
    fn has_all_attributes(&self, account: &Address, required: &[String]) -> bool {
        required.iter().all(|r| self.has(account, r))
    }
}

/// Records every NAV notification.
#[derive(Debug, Clone, Default)]
pub struct RecordingNavSink {
    pub updates: Vec<NavUpdate>,
}

impl NavSink for RecordingNavSink {
    fn notify(&mut self, update: &NavUpdate) {
        self.updates.push(update.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::new(vec![b; 20]).unwrap()
    }

    fn coins(s: &str) -> Coins {
        s.parse().unwrap()
    }

    #[test]
    fn hold_and_release() {
        let mut l = MemoryLedger::new();
        l.fund(&addr(1), &coins("10acorn"));
        l.hold(&addr(1), &coins("7acorn")).unwrap();
        assert_eq!(l.spendable(&addr(1)), coins("3acorn"));
        assert!(l.hold(&addr(1), &coins("4acorn")).is_err());
        assert!(l.release(&addr(1), &coins("8acorn")).is_err());
        l.release(&addr(1), &coins("7acorn")).unwrap();
        assert_eq!(l.spendable(&addr(1)), coins("10acorn"));
        assert!(l.held(&addr(1)).is_empty());
    }

    #[test]
    fn transfer_requires_spendable() {
        let mut l = MemoryLedger::new();
        l.fund(&addr(1), &coins("5acorn"));
        let err = l.transfer(&addr(1), &addr(2), &coins("6acorn")).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        l.transfer(&addr(1), &addr(2), &coins("5acorn")).unwrap();
        assert_eq!(l.spendable(&addr(2)), coins("5acorn"));
    }

    #[test]
    fn frozen_account_rejects() {
        let mut l = MemoryLedger::new();
        l.fund(&addr(1), &coins("5acorn"));
        l.freeze_account(&addr(2));
        assert!(matches!(
            l.transfer(&addr(1), &addr(2), &coins("1acorn")).unwrap_err(),
            LedgerError::Rejected { .. }
        ));
    }

    #[test]
    fn wildcard_attributes() {
        let mut attrs = StaticAttributes::new();
        attrs.grant(&addr(1), "kyc.provenance.io");
        assert!(attrs.has_all_attributes(&addr(1), &["*.provenance.io".into()]));
        assert!(attrs.has_all_attributes(&addr(1), &["kyc.provenance.io".into()]));
        assert!(!attrs.has_all_attributes(&addr(1), &["aml.provenance.io".into()]));
        assert!(!attrs.has_all_attributes(&addr(2), &["*.provenance.io".into()]));
        assert!(attrs.has_all_attributes(&addr(2), &[]));
    }
}
