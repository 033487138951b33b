//! Fungible amounts: a single [`Coin`] and a normalized multi-denom [`Coins`] set.
//!
//! Amounts are unsigned integers in the denom's base unit. `Coins` is always
//! sorted by denom, has at most one entry per denom and never holds a zero
//! entry, so two equal sets always serialize to identical bytes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ExchangeError, Result, constants};

/// Validate a denom: 2..=128 chars, a leading ASCII letter, then letters,
/// digits or one of `/:._-`.
pub fn validate_denom(denom: &str) -> Result<()> {
    let len = denom.len();
    if !(constants::MIN_DENOM_LEN..=constants::MAX_DENOM_LEN).contains(&len) {
        return Err(ExchangeError::InvalidDenom {
            denom: denom.to_string(),
            reason: format!(
                "length {len} outside {}..={}",
                constants::MIN_DENOM_LEN,
                constants::MAX_DENOM_LEN
            ),
        });
    }
    let mut chars = denom.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return Err(ExchangeError::InvalidDenom {
            denom: denom.to_string(),
            reason: "must start with a letter".into(),
        });
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || "/:._-".contains(*c))) {
        return Err(ExchangeError::InvalidDenom {
            denom: denom.to_string(),
            reason: format!("invalid character {bad:?}"),
        });
    }
    Ok(())
}

pub(crate) mod amount_str {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Coin
// ---------------------------------------------------------------------------

/// A single amount of a single denom.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    #[serde(with = "amount_str")]
    pub amount: u128,
}

impl Coin {
    #[must_use]
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.amount > 0
    }

    /// Denom is well-formed (amount is unconstrained).
    pub fn validate(&self) -> Result<()> {
        validate_denom(&self.denom)
    }

    /// Denom is well-formed and amount is non-zero.
    pub fn validate_positive(&self, field: &str) -> Result<()> {
        self.validate()?;
        if self.is_zero() {
            return Err(ExchangeError::InvalidCoin {
                coin: self.to_string(),
                reason: format!("{field} amount must be positive"),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

impl FromStr for Coin {
    type Err = ExchangeError;

    /// Parse `"<amount><denom>"`, e.g. `"10acorn"`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, denom) = s.split_at(split);
        if digits.is_empty() {
            return Err(ExchangeError::InvalidCoin {
                coin: s.to_string(),
                reason: "missing amount".into(),
            });
        }
        let amount = digits.parse::<u128>().map_err(|e| ExchangeError::InvalidCoin {
            coin: s.to_string(),
            reason: e.to_string(),
        })?;
        validate_denom(denom)?;
        Ok(Self::new(amount, denom))
    }
}

// ---------------------------------------------------------------------------
// Coins
// ---------------------------------------------------------------------------

/// A normalized set of coins: sorted by denom, unique denoms, no zero amounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Coin>", into = "Vec<Coin>")]
pub struct Coins(Vec<Coin>);

impl Coins {
    #[must_use]
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build from arbitrary coins: validates denoms, merges duplicates, drops zeros.
    pub fn new(coins: impl IntoIterator<Item = Coin>) -> Result<Self> {
        let mut rv = Self::empty();
        for coin in coins {
            coin.validate()?;
            rv.add_coin(&coin)?;
        }
        Ok(rv)
    }

    /// A set holding one coin (empty if the coin is zero).
    #[must_use]
    pub fn from_coin(coin: Coin) -> Self {
        if coin.is_zero() {
            Self::empty()
        } else {
            Self(vec![coin])
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Coin> {
        self.0.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Coin] {
        &self.0
    }

    /// Amount held of `denom` (zero if absent).
    #[must_use]
    pub fn amount_of(&self, denom: &str) -> u128 {
        self.position(denom).map_or(0, |i| self.0[i].amount)
    }

    #[must_use]
    pub fn denoms(&self) -> Vec<&str> {
        self.0.iter().map(|c| c.denom.as_str()).collect()
    }

    fn position(&self, denom: &str) -> Option<usize> {
        self.0.binary_search_by(|c| c.denom.as_str().cmp(denom)).ok()
    }

    /// Add one coin in place.
    pub fn add_coin(&mut self, coin: &Coin) -> Result<()> {
        if coin.is_zero() {
            return Ok(());
        }
        match self.0.binary_search_by(|c| c.denom.cmp(&coin.denom)) {
            Ok(i) => {
                self.0[i].amount = self.0[i]
                    .amount
                    .checked_add(coin.amount)
                    .ok_or(ExchangeError::Overflow)?;
            }
            Err(i) => self.0.insert(i, coin.clone()),
        }
        Ok(())
    }

    /// Subtract one coin in place. Returns `false` (and leaves `self`
    /// unchanged) if the set holds less than `coin`.
    pub fn sub_coin(&mut self, coin: &Coin) -> bool {
        if coin.is_zero() {
            return true;
        }
        let Some(i) = self.position(&coin.denom) else {
            return false;
        };
        let Some(left) = self.0[i].amount.checked_sub(coin.amount) else {
            return false;
        };
        if left == 0 {
            self.0.remove(i);
        } else {
            self.0[i].amount = left;
        }
        true
    }

    /// `self + other`.
    pub fn checked_add(&self, other: &Self) -> Result<Self> {
        let mut rv = self.clone();
        for coin in other.iter() {
            rv.add_coin(coin)?;
        }
        Ok(rv)
    }

    /// `self - other`, or `None` if any denom would go negative.
    #[must_use]
    pub fn checked_sub(&self, other: &Self) -> Option<Self> {
        let mut rv = self.clone();
        for coin in other.iter() {
            if !rv.sub_coin(coin) {
                return None;
            }
        }
        Some(rv)
    }

    /// True if `self` holds at least every amount in `other`.
    #[must_use]
    pub fn is_all_gte(&self, other: &Self) -> bool {
        other.iter().all(|c| self.amount_of(&c.denom) >= c.amount)
    }

    /// Sum a sequence of coins.
    pub fn sum<'a>(coins: impl IntoIterator<Item = &'a Coin>) -> Result<Self> {
        let mut rv = Self::empty();
        for coin in coins {
            rv.add_coin(coin)?;
        }
        Ok(rv)
    }
}

impl TryFrom<Vec<Coin>> for Coins {
    type Error = ExchangeError;

    fn try_from(coins: Vec<Coin>) -> Result<Self> {
        Self::new(coins)
    }
}

impl From<Coins> for Vec<Coin> {
    fn from(coins: Coins) -> Self {
        coins.0
    }
}

impl<'a> IntoIterator for &'a Coins {
    type Item = &'a Coin;
    type IntoIter = std::slice::Iter<'a, Coin>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, coin) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{coin}")?;
        }
        Ok(())
    }
}

impl FromStr for Coins {
    type Err = ExchangeError;

    /// Parse a comma separated list, e.g. `"10acorn,5stake"`. Empty string is the empty set.
    fn from_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Ok(Self::empty());
        }
        let coins = s
            .split(',')
            .map(str::parse::<Coin>)
            .collect::<Result<Vec<_>>>()?;
        Self::new(coins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coins(s: &str) -> Coins {
        s.parse().unwrap()
    }

    #[test]
    fn parse_coin() {
        let c: Coin = "10acorn".parse().unwrap();
        assert_eq!(c, Coin::new(10, "acorn"));
        assert_eq!(c.to_string(), "10acorn");
    }

    #[test]
    fn parse_coin_rejects_missing_amount_and_bad_denom() {
        assert!("acorn".parse::<Coin>().is_err());
        assert!("10".parse::<Coin>().is_err());
        assert!("10a".parse::<Coin>().is_err());
        assert!("10 acorn".parse::<Coin>().is_err());
        assert!("5nhash!".parse::<Coin>().is_err());
    }

    #[test]
    fn coins_are_normalized() {
        let c = coins("5stake,10acorn,0nhash,3stake");
        assert_eq!(c.to_string(), "10acorn,8stake");
        assert_eq!(c.len(), 2);
        assert_eq!(c.amount_of("stake"), 8);
        assert_eq!(c.amount_of("nhash"), 0);
    }

    #[test]
    fn add_and_sub() {
        let a = coins("10acorn,5stake");
        let b = coins("4acorn,5stake");
        assert_eq!(a.checked_add(&b).unwrap(), coins("14acorn,10stake"));
        assert_eq!(a.checked_sub(&b).unwrap(), coins("6acorn"));
        assert!(b.checked_sub(&a).is_none());
    }

    #[test]
    fn sub_coin_leaves_set_unchanged_on_shortfall() {
        let mut a = coins("3acorn");
        assert!(!a.sub_coin(&Coin::new(4, "acorn")));
        assert_eq!(a, coins("3acorn"));
        assert!(a.sub_coin(&Coin::new(3, "acorn")));
        assert!(a.is_empty());
    }

    #[test]
    fn is_all_gte() {
        let a = coins("10acorn,5stake");
        assert!(a.is_all_gte(&coins("10acorn")));
        assert!(a.is_all_gte(&Coins::empty()));
        assert!(!a.is_all_gte(&coins("1nhash")));
    }

    #[test]
    fn overflow_is_reported() {
        let mut a = Coins::from_coin(Coin::new(u128::MAX, "acorn"));
        let err = a.add_coin(&Coin::new(1, "acorn")).unwrap_err();
        assert!(matches!(err, ExchangeError::Overflow));
    }

    #[test]
    fn serde_uses_string_amounts() {
        let c = coins("10acorn");
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, r#"[{"denom":"acorn","amount":"10"}]"#);
        let back: Coins = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn deserialize_normalizes() {
        let back: Coins =
            serde_json::from_str(r#"[{"denom":"stake","amount":"1"},{"denom":"acorn","amount":"0"}]"#)
                .unwrap();
        assert_eq!(back, coins("1stake"));
    }
}
