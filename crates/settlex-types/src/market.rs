//! Market definition: details, fee schedules, toggles, access grants and
//! required attributes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::fee::{validate_fee_ratios, validate_flat_fees};
use crate::permission::validate_access_grants;
use crate::{
    AccessGrant, Address, Coin, DetailLimits, ExchangeError, FeeRatio, MarketId, Permission, Result,
    coin::validate_denom, constants,
};

/// Human-readable market information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketDetails {
    pub name: String,
    pub description: String,
    pub website_url: String,
    pub icon_uri: String,
}

impl MarketDetails {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Validate against the default detail limits.
    pub fn validate(&self) -> Result<()> {
        self.validate_limits(&DetailLimits::default())
    }

    pub fn validate_limits(&self, limits: &DetailLimits) -> Result<()> {
        for (field, value, max) in [
            ("name", &self.name, limits.max_name_len),
            ("description", &self.description, limits.max_description_len),
            ("website url", &self.website_url, limits.max_website_url_len),
            ("icon uri", &self.icon_uri, limits.max_icon_uri_len),
        ] {
            if value.len() > max {
                return Err(ExchangeError::InvalidMarket {
                    market_id: MarketId::UNASSIGNED,
                    reason: format!("{field} length {} exceeds maximum length of {max}", value.len()),
                });
            }
        }
        Ok(())
    }
}

/// An independently configured trading venue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    pub market_id: MarketId,
    pub details: MarketDetails,
    /// Alternatives for the flat fee charged on ask creation.
    pub fee_create_ask_flat: Vec<Coin>,
    /// Alternatives for the flat fee charged on bid creation.
    pub fee_create_bid_flat: Vec<Coin>,
    /// Alternatives for the seller's flat settlement fee.
    pub fee_seller_settlement_flat: Vec<Coin>,
    pub fee_seller_settlement_ratios: Vec<FeeRatio>,
    /// Alternatives for the buyer's flat settlement fee.
    pub fee_buyer_settlement_flat: Vec<Coin>,
    pub fee_buyer_settlement_ratios: Vec<FeeRatio>,
    pub accepting_orders: bool,
    pub allow_user_settlement: bool,
    pub access_grants: Vec<AccessGrant>,
    pub req_attr_create_ask: Vec<String>,
    pub req_attr_create_bid: Vec<String>,
    pub accepting_commitments: bool,
    /// Alternatives for the flat fee charged when adding a commitment.
    pub fee_create_commitment_flat: Vec<Coin>,
    pub commitment_settlement_bips: u16,
    pub intermediary_denom: String,
    pub req_attr_create_commitment: Vec<String>,
}

impl Market {
    /// Custody address holding this market's share of fees.
    #[must_use]
    pub fn address(&self) -> Address {
        Address::market(self.market_id)
    }

    #[must_use]
    pub fn grant_for(&self, address: &Address) -> Option<&AccessGrant> {
        self.access_grants.iter().find(|g| &g.address == address)
    }

    /// Whether `address` holds `permission` through this market's grants.
    #[must_use]
    pub fn has_permission(&self, address: &Address, permission: Permission) -> bool {
        self.grant_for(address).is_some_and(|g| g.can(permission))
    }

    /// Price denoms the market accepts on orders.
    ///
    /// There is no separate list: the set is the price denoms of the seller
    /// and buyer settlement ratios. A ratio's price denom is therefore always
    /// accepted, and `validate` only has to check that the two schedules
    /// agree. With no ratios the set is empty and any price denom is accepted.
    #[must_use]
    pub fn accepted_price_denoms(&self) -> BTreeSet<&str> {
        self.fee_seller_settlement_ratios
            .iter()
            .chain(&self.fee_buyer_settlement_ratios)
            .map(|r| r.price.denom.as_str())
            .collect()
    }

    /// Validate every field and every cross-field invariant.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| ExchangeError::InvalidMarket {
            market_id: self.market_id,
            reason,
        };
        let wrap = |e: ExchangeError| match e {
            ExchangeError::InvalidMarket { reason, .. } => invalid(reason),
            other => other,
        };

        self.details.validate().map_err(wrap)?;
        validate_flat_fees("create-ask flat fee", &self.fee_create_ask_flat)?;
        validate_flat_fees("create-bid flat fee", &self.fee_create_bid_flat)?;
        validate_flat_fees("seller settlement flat fee", &self.fee_seller_settlement_flat)?;
        validate_flat_fees("buyer settlement flat fee", &self.fee_buyer_settlement_flat)?;
        validate_flat_fees("create-commitment flat fee", &self.fee_create_commitment_flat)?;
        validate_fee_ratios(&self.fee_seller_settlement_ratios)?;
        validate_fee_ratios(&self.fee_buyer_settlement_ratios)?;

        for ratio in &self.fee_seller_settlement_ratios {
            if ratio.price.denom != ratio.fee.denom {
                return Err(ExchangeError::InvalidFeeRatio {
                    ratio: ratio.to_string(),
                    reason: "seller settlement ratio price and fee denoms must be equal".into(),
                });
            }
        }

        if !self.fee_seller_settlement_ratios.is_empty()
            && !self.fee_buyer_settlement_ratios.is_empty()
        {
            let sellers: BTreeSet<&str> = self
                .fee_seller_settlement_ratios
                .iter()
                .map(|r| r.price.denom.as_str())
                .collect();
            let buyers: BTreeSet<&str> = self
                .fee_buyer_settlement_ratios
                .iter()
                .map(|r| r.price.denom.as_str())
                .collect();
            if let Some(denom) = sellers.symmetric_difference(&buyers).next() {
                return Err(invalid(format!(
                    "price denom {denom:?} is accepted by only one of the seller and buyer ratio schedules"
                )));
            }
        }

        validate_access_grants(&self.access_grants)?;
        validate_required_attributes("create-ask", &self.req_attr_create_ask).map_err(wrap)?;
        validate_required_attributes("create-bid", &self.req_attr_create_bid).map_err(wrap)?;
        validate_required_attributes("create-commitment", &self.req_attr_create_commitment)
            .map_err(wrap)?;

        if self.commitment_settlement_bips > constants::MAX_BIPS {
            return Err(invalid(format!(
                "commitment settlement bips {} exceeds {}",
                self.commitment_settlement_bips,
                constants::MAX_BIPS
            )));
        }
        if !self.intermediary_denom.is_empty() {
            validate_denom(&self.intermediary_denom)?;
        }
        if self.commitment_settlement_bips > 0 && self.intermediary_denom.is_empty() {
            return Err(invalid(
                "an intermediary denom is required when commitment settlement bips are set".into(),
            ));
        }
        Ok(())
    }
}

/// Attribute names must be non-empty, free of whitespace, and unique.
/// A leading `*.` wildcard is allowed.
pub fn validate_required_attributes(field: &str, attrs: &[String]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for attr in attrs {
        let name = attr.strip_prefix("*.").unwrap_or(attr);
        if name.is_empty() || name.contains(char::is_whitespace) || name.contains('*') {
            return Err(ExchangeError::InvalidMarket {
                market_id: MarketId::UNASSIGNED,
                reason: format!("invalid {field} required attribute {attr:?}"),
            });
        }
        if !seen.insert(attr.to_lowercase()) {
            return Err(ExchangeError::InvalidMarket {
                market_id: MarketId::UNASSIGNED,
                reason: format!("duplicate {field} required attribute {attr:?}"),
            });
        }
    }
    Ok(())
}
