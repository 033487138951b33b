//! Bilateral payments keyed by (source, external id).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Address, Coins, ExchangeError, Result};

/// A proposed exchange: `source` gives `source_amount` and expects
/// `target_amount` back from `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub source: Address,
    pub source_amount: Coins,
    pub target: Address,
    pub target_amount: Coins,
    pub external_id: String,
}

impl Payment {
    pub fn validate(&self, max_external_id_len: usize) -> Result<()> {
        let invalid = |reason: String| ExchangeError::InvalidPayment { reason };
        if self.source == self.target {
            return Err(invalid(format!(
                "source and target cannot both be {}",
                self.source
            )));
        }
        if self.source_amount.is_empty() && self.target_amount.is_empty() {
            return Err(invalid(
                "source amount and target amount cannot both be zero".into(),
            ));
        }
        if self.external_id.len() > max_external_id_len {
            return Err(invalid(format!(
                "external id length {} exceeds {max_external_id_len}",
                self.external_id.len()
            )));
        }
        Ok(())
    }

    /// Describe the first difference between the stored terms and the terms
    /// an acceptor expects, or `None` when they agree.
    #[must_use]
    pub fn terms_difference(&self, expected: &Self) -> Option<String> {
        if self.target != expected.target {
            return Some(format!(
                "target {} does not match expected {}",
                self.target, expected.target
            ));
        }
        if self.source_amount != expected.source_amount {
            return Some(format!(
                "source amount {:?} does not match expected {:?}",
                self.source_amount.to_string(),
                expected.source_amount.to_string()
            ));
        }
        if self.target_amount != expected.target_amount {
            return Some(format!(
                "target amount {:?} does not match expected {:?}",
                self.target_amount.to_string(),
                expected.target_amount.to_string()
            ));
        }
        None
    }
}

impl fmt::Display for Payment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Payment[{} {:?}] {:?} -> {} for {:?}",
            self.source.short(),
            self.external_id,
            self.source_amount.to_string(),
            self.target.short(),
            self.target_amount.to_string()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::new(vec![b; 20]).unwrap()
    }

    fn payment() -> Payment {
        Payment {
            source: addr(1),
            source_amount: "5hash".parse().unwrap(),
            target: addr(2),
            target_amount: "3stake".parse().unwrap(),
            external_id: "order-42".into(),
        }
    }

    #[test]
    fn valid_payment() {
        payment().validate(100).unwrap();
    }

    #[test]
    fn self_payment_rejected() {
        let mut p = payment();
        p.target = addr(1);
        assert!(matches!(
            p.validate(100).unwrap_err(),
            ExchangeError::InvalidPayment { .. }
        ));
    }

    #[test]
    fn both_amounts_empty_rejected() {
        let mut p = payment();
        p.source_amount = Coins::empty();
        p.validate(100).unwrap();
        p.target_amount = Coins::empty();
        assert!(p.validate(100).is_err());
    }

    #[test]
    fn long_external_id_rejected() {
        let mut p = payment();
        p.external_id = "e".repeat(101);
        assert!(p.validate(100).is_err());
    }

    #[test]
    fn terms_difference_reports_first_mismatch() {
        let p = payment();
        assert!(p.terms_difference(&p).is_none());
        let mut other = p.clone();
        other.target_amount = "4stake".parse().unwrap();
        let diff = p.terms_difference(&other).unwrap();
        assert!(diff.contains("target amount"), "{diff}");
    }
}
