//! Commitments: funds an account has placed under a market's custody.

use serde::{Deserialize, Serialize};

use crate::{Address, Coins, ExchangeError, MarketId, Result};

/// The accumulated amount `account` has committed to `market_id`.
///
/// A stored commitment is never empty; releasing down to zero deletes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub account: Address,
    pub market_id: MarketId,
    pub amount: Coins,
}

impl Commitment {
    #[must_use]
    pub fn new(account: Address, market_id: MarketId, amount: Coins) -> Self {
        Self {
            account,
            market_id,
            amount,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.market_id.is_unassigned() {
            return Err(ExchangeError::InvalidCommitment {
                reason: format!("commitment of {} has market id zero", self.account),
            });
        }
        if self.amount.is_empty() {
            return Err(ExchangeError::InvalidCommitment {
                reason: format!(
                    "commitment of {} in market {} has no amount",
                    self.account, self.market_id
                ),
            });
        }
        Ok(())
    }
}

/// One leg of a commitment settlement: an account and the funds it gives or receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAmount {
    pub account: Address,
    pub amount: Coins,
}

impl AccountAmount {
    #[must_use]
    pub fn new(account: Address, amount: Coins) -> Self {
        Self { account, amount }
    }
}

/// Sum the amounts of a list of settlement legs.
pub fn sum_account_amounts(legs: &[AccountAmount]) -> Result<Coins> {
    let mut total = Coins::empty();
    for leg in legs {
        total = total.checked_add(&leg.amount)?;
    }
    Ok(total)
}

/// Amount to release from a commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseAmount {
    /// Release the whole commitment.
    All,
    /// Release exactly these funds.
    Exact(Coins),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::new(vec![b; 20]).unwrap()
    }

    #[test]
    fn empty_commitment_is_invalid() {
        let c = Commitment::new(addr(1), MarketId(1), Coins::empty());
        assert!(matches!(
            c.validate().unwrap_err(),
            ExchangeError::InvalidCommitment { .. }
        ));
        let c = Commitment::new(addr(1), MarketId(1), "5acorn".parse().unwrap());
        c.validate().unwrap();
    }

    #[test]
    fn legs_sum_per_denom() {
        let legs = vec![
            AccountAmount::new(addr(1), "5acorn,1stake".parse().unwrap()),
            AccountAmount::new(addr(2), "7acorn".parse().unwrap()),
        ];
        assert_eq!(sum_account_amounts(&legs).unwrap().to_string(), "12acorn,1stake");
    }

    #[test]
    fn release_amount_serde() {
        let json = serde_json::to_string(&ReleaseAmount::All).unwrap();
        assert_eq!(json, "\"all\"");
    }
}
