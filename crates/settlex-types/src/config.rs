//! Keeper configuration.

use serde::{Deserialize, Serialize};

use crate::{Address, constants};

/// Maximum lengths of market detail fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailLimits {
    pub max_name_len: usize,
    pub max_description_len: usize,
    pub max_website_url_len: usize,
    pub max_icon_uri_len: usize,
}

impl Default for DetailLimits {
    fn default() -> Self {
        Self {
            max_name_len: constants::MAX_NAME_LEN,
            max_description_len: constants::MAX_DESCRIPTION_LEN,
            max_website_url_len: constants::MAX_WEBSITE_URL_LEN,
            max_icon_uri_len: constants::MAX_ICON_URI_LEN,
        }
    }
}

/// Static configuration of a keeper instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeeperConfig {
    /// Governance address. Bypasses market permission checks and alone may
    /// set commitment settlement bips, intermediary denoms and params.
    pub authority: Address,
    /// Maximum length of order and payment external ids.
    pub max_external_id_len: usize,
    pub detail_limits: DetailLimits,
    /// Maximum number of orders in one settlement request.
    pub max_batch_orders: usize,
}

impl KeeperConfig {
    #[must_use]
    pub fn new(authority: Address) -> Self {
        Self {
            authority,
            max_external_id_len: constants::DEFAULT_MAX_EXTERNAL_ID_LEN,
            detail_limits: DetailLimits::default(),
            max_batch_orders: constants::DEFAULT_MAX_BATCH_ORDERS,
        }
    }

    #[must_use]
    pub fn is_authority(&self, address: &Address) -> bool {
        &self.authority == address
    }
}

impl Default for KeeperConfig {
    /// Uses a derived address as the authority; real deployments set one.
    fn default() -> Self {
        Self::new(Address::fee_collector())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_come_from_constants() {
        let cfg = KeeperConfig::default();
        assert_eq!(cfg.max_external_id_len, 100);
        assert_eq!(cfg.max_batch_orders, 200);
        assert_eq!(cfg.detail_limits.max_name_len, 30);
    }

    #[test]
    fn config_json_roundtrip() {
        let cfg = KeeperConfig::new(Address::new(vec![7; 20]).unwrap());
        let json = serde_json::to_string(&cfg).unwrap();
        let back: KeeperConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
        assert!(back.is_authority(&Address::new(vec![7; 20]).unwrap()));
    }
}
