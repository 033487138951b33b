//! Bulk state load/dump format.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    Commitment, ExchangeError, KeeperConfig, Market, MarketId, Order, OrderId, Params, Payment,
    Result,
};

/// The full persisted state of the exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub params: Params,
    pub markets: Vec<Market>,
    pub orders: Vec<Order>,
    pub last_market_id: MarketId,
    pub last_order_id: OrderId,
    pub commitments: Vec<Commitment>,
    pub payments: Vec<Payment>,
}

impl GenesisState {
    /// Validate every record and every cross-reference.
    pub fn validate(&self, config: &KeeperConfig) -> Result<()> {
        let invalid = |reason: String| ExchangeError::InvalidGenesis { reason };

        self.params
            .validate()
            .map_err(|e| invalid(format!("invalid params: {e}")))?;

        let mut market_ids = BTreeSet::new();
        for (i, market) in self.markets.iter().enumerate() {
            if market.market_id.is_unassigned() {
                return Err(invalid(format!("markets[{i}] has market id zero")));
            }
            market
                .validate()
                .and_then(|()| market.details.validate_limits(&config.detail_limits))
                .map_err(|e| invalid(format!("invalid market[{i}]: {e}")))?;
            if !market_ids.insert(market.market_id) {
                return Err(invalid(format!(
                    "market id {} appears more than once",
                    market.market_id
                )));
            }
        }
        if let Some(max) = market_ids.last() {
            if self.last_market_id < *max {
                return Err(invalid(format!(
                    "last market id {} is less than largest market id {max}",
                    self.last_market_id
                )));
            }
        }

        let mut order_ids = BTreeSet::new();
        for (i, order) in self.orders.iter().enumerate() {
            if order.order_id == OrderId::TRANSIENT {
                return Err(invalid(format!("orders[{i}] has order id zero")));
            }
            order
                .validate(config.max_external_id_len)
                .map_err(|e| invalid(format!("invalid orders[{i}]: {e}")))?;
            if !market_ids.contains(&order.market_id()) {
                return Err(invalid(format!(
                    "order {} references unknown market {}",
                    order.order_id,
                    order.market_id()
                )));
            }
            if !order_ids.insert(order.order_id) {
                return Err(invalid(format!(
                    "order id {} appears more than once",
                    order.order_id
                )));
            }
        }
        if let Some(max) = order_ids.last() {
            if self.last_order_id < *max {
                return Err(invalid(format!(
                    "last order id {} is less than largest order id {max}",
                    self.last_order_id
                )));
            }
        }

        let mut commitment_keys = BTreeSet::new();
        for (i, com) in self.commitments.iter().enumerate() {
            com.validate()
                .map_err(|e| invalid(format!("invalid commitments[{i}]: {e}")))?;
            if !market_ids.contains(&com.market_id) {
                return Err(invalid(format!(
                    "commitment of {} references unknown market {}",
                    com.account, com.market_id
                )));
            }
            if !commitment_keys.insert((com.market_id, &com.account)) {
                return Err(invalid(format!(
                    "commitment of {} in market {} appears more than once",
                    com.account, com.market_id
                )));
            }
        }

        let mut payment_keys = BTreeSet::new();
        for (i, payment) in self.payments.iter().enumerate() {
            payment
                .validate(config.max_external_id_len)
                .map_err(|e| invalid(format!("invalid payments[{i}]: {e}")))?;
            if !payment_keys.insert((&payment.source, payment.external_id.as_str())) {
                return Err(invalid(format!(
                    "payment from {} with external id {:?} appears more than once",
                    payment.source, payment.external_id
                )));
            }
        }
        Ok(())
    }
}
