//! Notifications produced by committed requests.
//!
//! [`Event`]s describe state changes and are published only when the request
//! that produced them commits. [`NavUpdate`]s are forwarded to the valuation
//! collaborator under the same rule.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::coin::amount_str;
use crate::{Address, Coin, Coins, MarketId, OrderId, OrderSide, constants};

/// A committed state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    MarketCreated {
        market_id: MarketId,
    },
    MarketDetailsUpdated {
        market_id: MarketId,
        updated_by: Address,
    },
    MarketOrdersEnabled {
        market_id: MarketId,
        enabled: bool,
        updated_by: Address,
    },
    MarketUserSettleEnabled {
        market_id: MarketId,
        enabled: bool,
        updated_by: Address,
    },
    MarketCommitmentsEnabled {
        market_id: MarketId,
        enabled: bool,
        updated_by: Address,
    },
    MarketFeesUpdated {
        market_id: MarketId,
        updated_by: Address,
    },
    MarketCommitmentSettlementUpdated {
        market_id: MarketId,
        bips: u16,
        intermediary_denom: String,
        updated_by: Address,
    },
    MarketPermissionsUpdated {
        market_id: MarketId,
        updated_by: Address,
    },
    MarketReqAttrUpdated {
        market_id: MarketId,
        updated_by: Address,
    },
    MarketWithdraw {
        market_id: MarketId,
        amount: Coins,
        destination: Address,
        withdrawn_by: Address,
    },
    MarketDisabled {
        market_id: MarketId,
        updated_by: Address,
    },
    OrderCreated {
        order_id: OrderId,
        market_id: MarketId,
        side: OrderSide,
        external_id: String,
    },
    OrderCancelled {
        order_id: OrderId,
        market_id: MarketId,
        cancelled_by: Address,
        external_id: String,
    },
    OrderFilled {
        order_id: OrderId,
        market_id: MarketId,
        assets: Coin,
        price: Coin,
        fees: Coins,
        external_id: String,
    },
    OrderPartiallyFilled {
        order_id: OrderId,
        market_id: MarketId,
        assets: Coin,
        price: Coin,
        fees: Coins,
        external_id: String,
    },
    FundsCommitted {
        account: Address,
        market_id: MarketId,
        amount: Coins,
    },
    CommitmentReleased {
        account: Address,
        market_id: MarketId,
        amount: Coins,
    },
    PaymentCreated {
        source: Address,
        external_id: String,
        target: Address,
    },
    PaymentAccepted {
        source: Address,
        external_id: String,
        target: Address,
    },
    PaymentCancelled {
        source: Address,
        external_id: String,
        cancelled_by: Address,
    },
    PaymentRejected {
        source: Address,
        external_id: String,
        target: Address,
    },
    PaymentTargetUpdated {
        source: Address,
        external_id: String,
        old_target: Address,
        new_target: Address,
    },
    ParamsUpdated,
}

/// A clearing price supplied to or produced by a settlement:
/// `assets` traded for `price`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetAssetPrice {
    pub assets: Coin,
    pub price: Coin,
}

impl NetAssetPrice {
    #[must_use]
    pub fn new(assets: Coin, price: Coin) -> Self {
        Self { assets, price }
    }

    /// Price per single unit of assets. `None` for zero assets or amounts
    /// beyond `Decimal`'s range.
    #[must_use]
    pub fn unit_price(&self) -> Option<Decimal> {
        let price = Decimal::from_u128(self.price.amount)?;
        let assets = Decimal::from_u128(self.assets.amount)?;
        price.checked_div(assets)
    }
}

/// Notification sent to the valuation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavUpdate {
    pub denom: String,
    pub price_denom: String,
    #[serde(with = "amount_str")]
    pub price_amount: u128,
    #[serde(with = "amount_str")]
    pub volume_amount: u128,
    /// `"market <id>"`.
    pub source: String,
}

impl NavUpdate {
    #[must_use]
    pub fn from_market(market_id: MarketId, nav: &NetAssetPrice) -> Self {
        Self {
            denom: nav.assets.denom.clone(),
            price_denom: nav.price.denom.clone(),
            price_amount: nav.price.amount,
            volume_amount: nav.assets.amount,
            source: format!("{} {market_id}", constants::NAV_SOURCE_PREFIX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nav_update_source_names_market() {
        let nav = NetAssetPrice::new(Coin::new(10, "acorn"), Coin::new(100, "stake"));
        let update = NavUpdate::from_market(MarketId(1), &nav);
        assert_eq!(update.source, "market 1");
        assert_eq!(update.denom, "acorn");
        assert_eq!(update.price_denom, "stake");
        assert_eq!(update.price_amount, 100);
        assert_eq!(update.volume_amount, 10);
    }

    #[test]
    fn unit_price() {
        let nav = NetAssetPrice::new(Coin::new(4, "acorn"), Coin::new(10, "stake"));
        assert_eq!(nav.unit_price(), Some(Decimal::new(25, 1)));
        let zero = NetAssetPrice::new(Coin::new(0, "acorn"), Coin::new(10, "stake"));
        assert_eq!(zero.unit_price(), None);
    }

    #[test]
    fn event_serde_is_tagged() {
        let ev = Event::MarketCreated {
            market_id: MarketId(3),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert_eq!(json, r#"{"type":"market_created","market_id":3}"#);
    }
}
