//! Exchange-wide parameters, settable only by the governance authority.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{Coins, ExchangeError, Result, coin::validate_denom, constants};

/// Per-denom override of the exchange's fee share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DenomSplit {
    pub denom: String,
    /// Exchange share in basis points.
    pub split: u16,
}

/// Persisted exchange parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Exchange share of every market fee, in basis points.
    pub default_split: u16,
    pub denom_splits: Vec<DenomSplit>,
    /// Charged to the source when a payment is created.
    pub fee_create_payment_flat: Coins,
    /// Charged to the target when a payment is accepted.
    pub fee_accept_payment_flat: Coins,
}

impl Params {
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_split: constants::DEFAULT_SPLIT_BIPS,
            denom_splits: Vec::new(),
            fee_create_payment_flat: Coins::empty(),
            fee_accept_payment_flat: Coins::empty(),
        }
    }

    /// Exchange share, in bips, for fees paid in `denom`.
    #[must_use]
    pub fn split_for(&self, denom: &str) -> u16 {
        self.denom_splits
            .iter()
            .find(|s| s.denom == denom)
            .map_or(self.default_split, |s| s.split)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| ExchangeError::InvalidParams { reason };
        if self.default_split > constants::MAX_BIPS {
            return Err(invalid(format!(
                "default split {} exceeds {}",
                self.default_split,
                constants::MAX_BIPS
            )));
        }
        let mut seen = BTreeSet::new();
        for split in &self.denom_splits {
            validate_denom(&split.denom).map_err(|e| invalid(e.to_string()))?;
            if split.split > constants::MAX_BIPS {
                return Err(invalid(format!(
                    "{} split {} exceeds {}",
                    split.denom,
                    split.split,
                    constants::MAX_BIPS
                )));
            }
            if !seen.insert(split.denom.as_str()) {
                return Err(invalid(format!("duplicate denom split for {}", split.denom)));
            }
        }
        Ok(())
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_override() {
        let params = Params {
            denom_splits: vec![DenomSplit {
                denom: "nhash".into(),
                split: 50,
            }],
            ..Params::default()
        };
        assert_eq!(params.split_for("nhash"), 50);
        assert_eq!(params.split_for("stake"), constants::DEFAULT_SPLIT_BIPS);
        params.validate().unwrap();
    }

    #[test]
    fn invalid_splits_rejected() {
        let mut params = Params::default();
        params.default_split = 10_001;
        assert!(params.validate().is_err());

        let dup = DenomSplit {
            denom: "nhash".into(),
            split: 1,
        };
        let params = Params {
            denom_splits: vec![dup.clone(), dup],
            ..Params::default()
        };
        assert!(matches!(
            params.validate().unwrap_err(),
            ExchangeError::InvalidParams { .. }
        ));
    }
}
