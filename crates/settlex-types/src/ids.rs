//! Identifiers used throughout settlex.
//!
//! Market and order ids are plain monotonically assigned integers; they are
//! encoded big-endian in store keys so numeric order equals byte order.
//! Accounts are opaque byte strings.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::{ExchangeError, Result, constants};

// ---------------------------------------------------------------------------
// MarketId
// ---------------------------------------------------------------------------

/// Market identifier. `0` is reserved to mean "assign the next id".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize, Default)]
pub struct MarketId(pub u32);

impl MarketId {
    /// The placeholder id requesting automatic assignment.
    pub const UNASSIGNED: Self = Self(0);

    #[must_use]
    pub fn is_unassigned(self) -> bool {
        self.0 == 0
    }

    /// Next id, or `None` on overflow.
    #[must_use]
    pub fn checked_next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }

    #[must_use]
    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// OrderId
// ---------------------------------------------------------------------------

/// Global order identifier. Strictly increasing and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize, Default)]
pub struct OrderId(pub u64);

impl OrderId {
    /// Id carried by transient orders built during user settlement.
    pub const TRANSIENT: Self = Self(0);

    #[must_use]
    pub fn checked_next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }

    #[must_use]
    pub fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// An account address: raw bytes, displayed and serialized as lowercase hex.
#[derive(Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Default)]
pub struct Address(Vec<u8>);

impl Address {
    /// Wrap raw address bytes.
    ///
    /// # Errors
    /// `InvalidAddress` if empty or longer than [`constants::MAX_ADDRESS_LEN`].
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(ExchangeError::InvalidAddress {
                reason: "address is empty".into(),
            });
        }
        if bytes.len() > constants::MAX_ADDRESS_LEN {
            return Err(ExchangeError::InvalidAddress {
                reason: format!(
                    "address length {} exceeds {}",
                    bytes.len(),
                    constants::MAX_ADDRESS_LEN
                ),
            });
        }
        Ok(Self(bytes))
    }

    /// Parse a lowercase or uppercase hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| ExchangeError::InvalidAddress {
            reason: format!("invalid hex {s:?}: {e}"),
        })?;
        Self::new(bytes)
    }

    /// Deterministic custody address of a market.
    #[must_use]
    pub fn market(market_id: MarketId) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(constants::MARKET_ADDRESS_DOMAIN);
        hasher.update(market_id.to_be_bytes());
        Self(hasher.finalize()[..constants::DERIVED_ADDRESS_LEN].to_vec())
    }

    /// Address that receives the exchange's share of every fee.
    #[must_use]
    pub fn fee_collector() -> Self {
        let hash = Sha256::digest(constants::FEE_COLLECTOR_DOMAIN);
        Self(hash[..constants::DERIVED_ADDRESS_LEN].to_vec())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First four bytes in hex, for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..self.0.len().min(4)])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_id_next() {
        assert_eq!(MarketId(5).checked_next(), Some(MarketId(6)));
        assert_eq!(MarketId(u32::MAX).checked_next(), None);
    }

    #[test]
    fn ids_encode_big_endian() {
        assert_eq!(MarketId(1).to_be_bytes(), [0, 0, 0, 1]);
        assert_eq!(OrderId(258).to_be_bytes(), [0, 0, 0, 0, 0, 0, 1, 2]);
    }

    #[test]
    fn market_addresses_are_distinct_and_stable() {
        let a1 = Address::market(MarketId(1));
        let a2 = Address::market(MarketId(2));
        assert_ne!(a1, a2);
        assert_eq!(a1, Address::market(MarketId(1)));
        assert_eq!(a1.len(), constants::DERIVED_ADDRESS_LEN);
        assert_ne!(a1, Address::fee_collector());
    }

    #[test]
    fn empty_address_rejected() {
        let err = Address::new(Vec::new()).unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidAddress { .. }));
    }

    #[test]
    fn oversize_address_rejected() {
        let err = Address::new(vec![7u8; 256]).unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidAddress { .. }));
    }

    #[test]
    fn address_serde_is_hex() {
        let addr = Address::new(vec![0xab, 0x01]).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"ab01\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, back);
    }
}
