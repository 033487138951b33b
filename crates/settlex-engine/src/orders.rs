//! Order book store: ask/bid creation, cancellation and lookups.
//!
//! A resting order's funds stay with the owner under a ledger hold:
//! assets plus the flat settlement fee for an ask, price plus declared
//! settlement fees for a bid. Cancelling releases exactly what the
//! current record holds.

use settlex_types::{
    Address, AskOrder, BidOrder, Coin, Event, ExchangeError, Market, MarketId, Order, OrderId,
    Permission, Result, fee,
};

use crate::collaborators::{AttributeSource, Ledger, NavSink};
use crate::keeper::{Keeper, Tx};
use crate::state::StoreExt;

// ---------------------------------------------------------------------------
// Market-dependent order checks
// ---------------------------------------------------------------------------

fn check_price_denom(market: &Market, order_id: OrderId, price: &Coin) -> Result<()> {
    let accepted = market.accepted_price_denoms();
    if accepted.is_empty() || accepted.contains(price.denom.as_str()) {
        return Ok(());
    }
    Err(ExchangeError::InvalidOrder {
        reason: format!(
            "order {order_id}: price denom {:?} is not accepted by market {}",
            price.denom, market.market_id
        ),
    })
}

/// Check an ask's settlement fee terms against the market's seller schedules.
pub(crate) fn validate_ask_for_market(market: &Market, order_id: OrderId, ask: &AskOrder) -> Result<()> {
    check_price_denom(market, order_id, &ask.price)?;
    fee::check_flat_fee(
        "seller settlement flat",
        &market.fee_seller_settlement_flat,
        ask.seller_settlement_flat_fee.as_ref(),
    )?;
    let ratio = fee::ratio_fees(&market.fee_seller_settlement_ratios, &ask.price)?;
    if let Some(flat) = &ask.seller_settlement_flat_fee {
        if flat.denom == ask.price.denom {
            let total = ratio
                .amount_of(&flat.denom)
                .checked_add(flat.amount)
                .ok_or(ExchangeError::Overflow)?;
            if total > ask.price.amount {
                return Err(ExchangeError::InsufficientFee {
                    reason: format!(
                        "order {order_id}: settlement fees {total}{} exceed price {}",
                        flat.denom, ask.price
                    ),
                });
            }
        }
    }
    Ok(())
}

/// Check a bid's declared settlement fees against the market's buyer schedules.
pub(crate) fn validate_bid_for_market(market: &Market, order_id: OrderId, bid: &BidOrder) -> Result<()> {
    check_price_denom(market, order_id, &bid.price)?;
    fee::check_buyer_settlement_fees(
        &market.fee_buyer_settlement_flat,
        &market.fee_buyer_settlement_ratios,
        &bid.price,
        &bid.buyer_settlement_fees,
    )
}

impl<A: AttributeSource> Tx<'_, A> {
    /// Market checks shared by order creation and user settlement.
    pub(crate) fn open_market_for_orders(&self, market_id: MarketId) -> Result<Market> {
        let market = self.load_market(market_id)?;
        if !market.accepting_orders {
            return Err(ExchangeError::MarketNotAcceptingOrders(market_id));
        }
        Ok(market)
    }

    fn next_order_id(&mut self) -> Result<OrderId> {
        let id = self
            .store
            .last_order_id()?
            .checked_next()
            .ok_or(ExchangeError::Overflow)?;
        self.store.set_last_order_id(id);
        Ok(id)
    }

    /// Persist a validated order, hold its funds and collect the creation fee.
    fn place_order(&mut self, market: &Market, mut order: Order, creation_fee: Option<&Coin>) -> Result<OrderId> {
        order.order_id = self.next_order_id()?;
        let held = order.held_funds()?;
        let owner = order.owner().clone();
        self.store.set_order(&order)?;
        self.plan.hold(&owner, &held);
        let params = self.params()?;
        self.pay_market_fee_coin(&owner, market, creation_fee, &params)?;
        self.emit(Event::OrderCreated {
            order_id: order.order_id,
            market_id: market.market_id,
            side: order.side(),
            external_id: order.external_id().to_owned(),
        });
        Ok(order.order_id)
    }
}

impl<L: Ledger, A: AttributeSource, N: NavSink> Keeper<L, A, N> {
    /// Place an ask. The seller's assets and flat settlement fee are held.
    pub fn create_ask(&mut self, ask: AskOrder, creation_fee: Option<Coin>) -> Result<OrderId> {
        let seller = ask.seller.clone();
        let order_id = self.run("create_ask", |tx| {
            let market = tx.open_market_for_orders(ask.market_id)?;
            tx.require_attributes(&ask.seller, &market.req_attr_create_ask)?;
            let order = Order::ask(OrderId::TRANSIENT, ask);
            order.validate(tx.config.max_external_id_len)?;
            if let Some(ask) = order.as_ask() {
                validate_ask_for_market(&market, order.order_id, ask)?;
            }
            fee::check_flat_fee(
                "ask order creation",
                &market.fee_create_ask_flat,
                creation_fee.as_ref(),
            )?;
            tx.place_order(&market, order, creation_fee.as_ref())
        })?;
        tracing::info!(order = %order_id, seller = %seller.short(), "Ask created");
        Ok(order_id)
    }

    /// Place a bid. The buyer's price and settlement fees are held.
    pub fn create_bid(&mut self, bid: BidOrder, creation_fee: Option<Coin>) -> Result<OrderId> {
        let buyer = bid.buyer.clone();
        let order_id = self.run("create_bid", |tx| {
            let market = tx.open_market_for_orders(bid.market_id)?;
            tx.require_attributes(&bid.buyer, &market.req_attr_create_bid)?;
            let order = Order::bid(OrderId::TRANSIENT, bid);
            order.validate(tx.config.max_external_id_len)?;
            if let Some(bid) = order.as_bid() {
                validate_bid_for_market(&market, order.order_id, bid)?;
            }
            fee::check_flat_fee(
                "bid order creation",
                &market.fee_create_bid_flat,
                creation_fee.as_ref(),
            )?;
            tx.place_order(&market, order, creation_fee.as_ref())
        })?;
        tracing::info!(order = %order_id, buyer = %buyer.short(), "Bid created");
        Ok(order_id)
    }

    /// Cancel an order. Allowed for its owner and for holders of the market's
    /// cancel permission.
    pub fn cancel_order(&mut self, actor: &Address, order_id: OrderId) -> Result<()> {
        self.run("cancel_order", |tx| {
            let order = tx
                .store
                .get_order(order_id)?
                .ok_or(ExchangeError::UnknownOrder(order_id))?;
            if order.owner() != actor {
                let market = tx.load_market(order.market_id())?;
                tx.require_permission(&market, actor, Permission::Cancel)?;
            }
            tx.plan.release(order.owner(), &order.held_funds()?);
            tx.store.delete_order(&order)?;
            tx.emit(Event::OrderCancelled {
                order_id,
                market_id: order.market_id(),
                cancelled_by: actor.clone(),
                external_id: order.external_id().to_owned(),
            });
            Ok(())
        })?;
        tracing::info!(order = %order_id, by = %actor.short(), "Order cancelled");
        Ok(())
    }

    // -- queries ------------------------------------------------------------

    pub fn order(&self, order_id: OrderId) -> Result<Order> {
        self.store()
            .get_order(order_id)?
            .ok_or(ExchangeError::UnknownOrder(order_id))
    }

    /// Orders in a market, by order id.
    pub fn orders_in_market(&self, market_id: MarketId) -> Result<Vec<Order>> {
        self.store().orders_in_market(market_id)
    }

    /// Orders owned by an address, by order id.
    pub fn orders_of_owner(&self, owner: &Address) -> Result<Vec<Order>> {
        self.store().orders_of_owner(owner)
    }

    pub fn orders_with_external_id(&self, market_id: MarketId, external_id: &str) -> Result<Vec<Order>> {
        self.store().orders_with_external_id(market_id, external_id)
    }

    pub fn all_orders(&self) -> Result<Vec<Order>> {
        self.store().all_orders()
    }
}
