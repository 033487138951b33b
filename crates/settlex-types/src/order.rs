//! Order types: an [`Order`] is an id plus either an [`AskOrder`] or a [`BidOrder`].
//!
//! Side-specific behavior always dispatches on [`OrderKind`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Address, Coin, Coins, ExchangeError, MarketId, OrderId, Result};

/// Which side of the book an order is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderSide {
    Ask,
    Bid,
}

impl OrderSide {
    /// One-byte tag used in store values and index entries.
    #[must_use]
    pub fn type_byte(self) -> u8 {
        match self {
            Self::Ask => 0x00,
            Self::Bid => 0x01,
        }
    }

    #[must_use]
    pub fn from_type_byte(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Self::Ask),
            0x01 => Some(Self::Bid),
            _ => None,
        }
    }

    /// Article + name, for messages like "order 3 is not an ask order".
    #[must_use]
    pub fn article(self) -> &'static str {
        match self {
            Self::Ask => "an ask",
            Self::Bid => "a bid",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ask => write!(f, "ASK"),
            Self::Bid => write!(f, "BID"),
        }
    }
}

/// An offer to sell `assets` for at least `price`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskOrder {
    pub market_id: MarketId,
    pub seller: Address,
    pub assets: Coin,
    pub price: Coin,
    pub seller_settlement_flat_fee: Option<Coin>,
    pub allow_partial: bool,
    pub external_id: String,
}

/// An offer to buy `assets` for `price`, paying `buyer_settlement_fees` on settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidOrder {
    pub market_id: MarketId,
    pub buyer: Address,
    pub assets: Coin,
    pub price: Coin,
    pub buyer_settlement_fees: Coins,
    pub allow_partial: bool,
    pub external_id: String,
}

/// Side-specific order payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Ask(AskOrder),
    Bid(BidOrder),
}

/// A resting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub kind: OrderKind,
}

impl Order {
    #[must_use]
    pub fn ask(order_id: OrderId, ask: AskOrder) -> Self {
        Self {
            order_id,
            kind: OrderKind::Ask(ask),
        }
    }

    #[must_use]
    pub fn bid(order_id: OrderId, bid: BidOrder) -> Self {
        Self {
            order_id,
            kind: OrderKind::Bid(bid),
        }
    }

    #[must_use]
    pub fn side(&self) -> OrderSide {
        match self.kind {
            OrderKind::Ask(_) => OrderSide::Ask,
            OrderKind::Bid(_) => OrderSide::Bid,
        }
    }

    #[must_use]
    pub fn as_ask(&self) -> Option<&AskOrder> {
        match &self.kind {
            OrderKind::Ask(ask) => Some(ask),
            OrderKind::Bid(_) => None,
        }
    }

    #[must_use]
    pub fn as_bid(&self) -> Option<&BidOrder> {
        match &self.kind {
            OrderKind::Bid(bid) => Some(bid),
            OrderKind::Ask(_) => None,
        }
    }

    #[must_use]
    pub fn market_id(&self) -> MarketId {
        match &self.kind {
            OrderKind::Ask(ask) => ask.market_id,
            OrderKind::Bid(bid) => bid.market_id,
        }
    }

    /// The seller of an ask or the buyer of a bid.
    #[must_use]
    pub fn owner(&self) -> &Address {
        match &self.kind {
            OrderKind::Ask(ask) => &ask.seller,
            OrderKind::Bid(bid) => &bid.buyer,
        }
    }

    #[must_use]
    pub fn assets(&self) -> &Coin {
        match &self.kind {
            OrderKind::Ask(ask) => &ask.assets,
            OrderKind::Bid(bid) => &bid.assets,
        }
    }

    #[must_use]
    pub fn price(&self) -> &Coin {
        match &self.kind {
            OrderKind::Ask(ask) => &ask.price,
            OrderKind::Bid(bid) => &bid.price,
        }
    }

    #[must_use]
    pub fn allow_partial(&self) -> bool {
        match &self.kind {
            OrderKind::Ask(ask) => ask.allow_partial,
            OrderKind::Bid(bid) => bid.allow_partial,
        }
    }

    #[must_use]
    pub fn external_id(&self) -> &str {
        match &self.kind {
            OrderKind::Ask(ask) => &ask.external_id,
            OrderKind::Bid(bid) => &bid.external_id,
        }
    }

    /// Funds the ledger holds for this order while it rests on the book:
    /// assets plus the flat settlement fee for an ask, price plus settlement
    /// fees for a bid.
    pub fn held_funds(&self) -> Result<Coins> {
        match &self.kind {
            OrderKind::Ask(ask) => {
                let mut held = Coins::from_coin(ask.assets.clone());
                if let Some(fee) = &ask.seller_settlement_flat_fee {
                    held.add_coin(fee)?;
                }
                Ok(held)
            }
            OrderKind::Bid(bid) => {
                let mut held = bid.buyer_settlement_fees.clone();
                held.add_coin(&bid.price)?;
                Ok(held)
            }
        }
    }

    /// Stateless validation of the order's own fields.
    pub fn validate(&self, max_external_id_len: usize) -> Result<()> {
        let invalid = |reason: String| ExchangeError::InvalidOrder {
            reason: format!("order {}: {reason}", self.order_id),
        };
        if self.market_id().0 == 0 {
            return Err(invalid("market id cannot be zero".into()));
        }
        let assets = self.assets();
        let price = self.price();
        assets
            .validate_positive("assets")
            .map_err(|e| invalid(e.to_string()))?;
        price
            .validate_positive("price")
            .map_err(|e| invalid(e.to_string()))?;
        if assets.denom == price.denom {
            return Err(invalid(format!(
                "price denom {:?} cannot be the same as the assets denom",
                price.denom
            )));
        }
        if self.external_id().len() > max_external_id_len {
            return Err(invalid(format!(
                "external id length {} exceeds {max_external_id_len}",
                self.external_id().len()
            )));
        }
        if let OrderKind::Ask(ask) = &self.kind {
            if let Some(fee) = &ask.seller_settlement_flat_fee {
                fee.validate_positive("seller settlement flat fee")
                    .map_err(|e| invalid(e.to_string()))?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order[{}] {} market {} {} @ {} by {}",
            self.order_id,
            self.side(),
            self.market_id(),
            self.assets(),
            self.price(),
            self.owner()
        )
    }
}
