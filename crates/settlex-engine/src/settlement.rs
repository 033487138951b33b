//! Settlement engine: executes explicit ask/bid matches atomically.
//!
//! A batch is validated completely before any ledger instruction is planned:
//!
//! 1. batch shape (non-empty, bounded, no repeated order ids)
//! 2. orders exist, sit on the expected side and in the settled market
//! 3. requested fill amounts are positive, bounded and respect `allow_partial`
//! 4. ask and bid assets balance per asset denom, then per
//!    (asset denom, price denom) group
//! 5. partial fills scale the order's price exactly
//! 6. bids pay at least what the asks require in every group
//!
//! Prices are then allocated to asks (own price first, surplus pro-rata by
//! assets, leftover units one each in request order), fees computed, and the
//! ledger plan built: hold releases, asset and price transfers paired in
//! request order, then fees. One net asset price is reported per group.

use std::collections::{BTreeMap, BTreeSet};

use settlex_types::{
    Address, AskOrder, BidOrder, Coin, Coins, Event, ExchangeError, Market, MarketId, NavUpdate,
    NetAssetPrice, Order, OrderId, OrderKind, OrderSide, Permission, Result, fee,
};

use crate::collaborators::{AttributeSource, Ledger, NavSink};
use crate::keeper::{Keeper, Tx};
use crate::orders::{validate_ask_for_market, validate_bid_for_market};
use crate::state::StoreExt;

// ---------------------------------------------------------------------------
// Requests and results
// ---------------------------------------------------------------------------

/// One order referenced by a settlement, with the assets to fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderFill {
    pub order_id: OrderId,
    /// `None` fills the order completely.
    pub assets: Option<u128>,
}

impl OrderFill {
    #[must_use]
    pub fn full(order_id: OrderId) -> Self {
        Self {
            order_id,
            assets: None,
        }
    }

    #[must_use]
    pub fn partial(order_id: OrderId, assets: u128) -> Self {
        Self {
            order_id,
            assets: Some(assets),
        }
    }
}

/// A seller filling resting bids with assets it supplies directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillBidsRequest {
    pub seller: Address,
    pub market_id: MarketId,
    /// Must equal the bids' combined assets.
    pub total_assets: Coin,
    pub bid_order_ids: Vec<OrderId>,
    pub seller_settlement_flat_fee: Option<Coin>,
    pub ask_order_creation_fee: Option<Coin>,
}

/// A buyer filling resting asks with funds it supplies directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillAsksRequest {
    pub buyer: Address,
    pub market_id: MarketId,
    /// Must cover the asks' combined price.
    pub total_price: Coin,
    pub ask_order_ids: Vec<OrderId>,
    pub buyer_settlement_fees: Coins,
    pub bid_order_creation_fee: Option<Coin>,
}

/// What happened to one order in a settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillResult {
    /// [`OrderId::TRANSIENT`] for the counter-order of a user settlement.
    pub order_id: OrderId,
    pub side: OrderSide,
    pub assets: Coin,
    /// Proceeds for an ask, amount paid for a bid.
    pub price: Coin,
    pub fees: Coins,
    pub fully_filled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettlementSummary {
    pub fills: Vec<FillResult>,
    /// One per (asset denom, price denom) group, in denom order.
    pub navs: Vec<NetAssetPrice>,
}

// ---------------------------------------------------------------------------
// Pipeline internals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Fill {
    order: Order,
    transient: bool,
    /// Assets filled.
    assets: u128,
    /// The order's price for the filled assets. For asks, replaced by the
    /// allocated proceeds.
    price: u128,
    /// Part of the order's hold consumed by this fill.
    released: Coins,
    fees: Coins,
    /// The reduced order left on the book by a partial fill.
    remaining: Option<Order>,
}

impl Fill {
    fn full(&self) -> bool {
        self.assets == self.order.assets().amount
    }

    fn asset_coin(&self) -> Coin {
        Coin::new(self.assets, self.order.assets().denom.clone())
    }

    fn price_coin(&self) -> Coin {
        Coin::new(self.price, self.order.price().denom.clone())
    }

    fn group_key(&self) -> (String, String) {
        (
            self.order.assets().denom.clone(),
            self.order.price().denom.clone(),
        )
    }
}

/// Ask and bid positions sharing one (asset denom, price denom) pair.
#[derive(Debug, Default)]
struct Group {
    asks: Vec<usize>,
    bids: Vec<usize>,
}

fn fill_amount(order: &Order, requested: Option<u128>) -> Result<u128> {
    let total = order.assets().amount;
    match requested {
        None => Ok(total),
        Some(0) => Err(ExchangeError::InvalidFill {
            order_id: order.order_id,
            reason: "fill amount cannot be zero".into(),
        }),
        Some(amount) if amount > total => Err(ExchangeError::InvalidFill {
            order_id: order.order_id,
            reason: format!("fill of {amount} exceeds order assets {}", order.assets()),
        }),
        Some(amount) if amount < total && !order.allow_partial() => {
            Err(ExchangeError::PartialFillNotAllowed {
                order_id: order.order_id,
            })
        }
        Some(amount) => Ok(amount),
    }
}

/// Sum of `amounts`, failing on overflow.
fn checked_sum(amounts: impl IntoIterator<Item = u128>) -> Result<u128> {
    amounts
        .into_iter()
        .try_fold(0u128, |acc, a| acc.checked_add(a).ok_or(ExchangeError::Overflow))
}

/// Split `bid_total` across asks: each ask keeps its own price, the surplus
/// is shared by assets (floor), leftover units go one each in order.
fn allocate_prices(ask_prices: &[u128], ask_assets: &[u128], bid_total: u128) -> Result<Vec<u128>> {
    let ask_total = checked_sum(ask_prices.iter().copied())?;
    let assets_total = checked_sum(ask_assets.iter().copied())?;
    let surplus = bid_total
        .checked_sub(ask_total)
        .ok_or_else(|| ExchangeError::Internal("bid total below ask total".into()))?;
    let mut allocated = ask_prices.to_vec();
    if surplus == 0 || allocated.is_empty() {
        return Ok(allocated);
    }
    let mut shared = 0u128;
    for (price, assets) in allocated.iter_mut().zip(ask_assets) {
        let share = surplus.checked_mul(*assets).ok_or(ExchangeError::Overflow)? / assets_total;
        *price = price.checked_add(share).ok_or(ExchangeError::Overflow)?;
        shared += share;
    }
    let mut leftover = surplus - shared;
    let mut i = 0;
    while leftover > 0 {
        let price = &mut allocated[i % ask_prices.len()];
        *price = price.checked_add(1).ok_or(ExchangeError::Overflow)?;
        leftover -= 1;
        i += 1;
    }
    Ok(allocated)
}

/// Pair givers with takers in order, returning
/// `(giver index, taker index, amount)` chunks.
pub(crate) fn pair_amounts(givers: &[u128], takers: &[u128]) -> Vec<(usize, usize, u128)> {
    let mut chunks = Vec::new();
    let (mut i, mut j) = (0, 0);
    let mut give_left = givers.first().copied().unwrap_or(0);
    let mut take_left = takers.first().copied().unwrap_or(0);
    while i < givers.len() && j < takers.len() {
        let amount = give_left.min(take_left);
        if amount > 0 {
            chunks.push((i, j, amount));
        }
        give_left -= amount;
        take_left -= amount;
        if give_left == 0 {
            i += 1;
            give_left = givers.get(i).copied().unwrap_or(0);
        }
        if take_left == 0 {
            j += 1;
            take_left = takers.get(j).copied().unwrap_or(0);
        }
    }
    chunks
}

/// Seller fees and the reduced ask, once proceeds are known.
fn finish_ask(fill: &mut Fill, ask: &AskOrder, market: &Market, proceeds: u128) -> Result<()> {
    let full = fill.full();
    let own_price = fill.price;
    let flat_part = match &ask.seller_settlement_flat_fee {
        Some(flat) if full => Some(flat.clone()),
        Some(flat) => Some(Coin::new(
            fee::prorate_ceil(flat.amount, fill.assets, ask.assets.amount)?,
            flat.denom.clone(),
        )),
        None => None,
    };
    fill.price = proceeds;
    let mut fees = fee::ratio_fees(&market.fee_seller_settlement_ratios, &fill.price_coin())?;
    let mut released = Coins::from_coin(fill.asset_coin());
    if let Some(part) = &flat_part {
        fees.add_coin(part)?;
        released.add_coin(part)?;
    }
    fill.fees = fees;
    fill.released = released;

    if !full {
        let flat_left = match (&ask.seller_settlement_flat_fee, &flat_part) {
            (Some(flat), Some(part)) => Some(Coin::new(flat.amount - part.amount, flat.denom.clone()))
                .filter(Coin::is_positive),
            _ => None,
        };
        fill.remaining = Some(Order::ask(
            fill.order.order_id,
            AskOrder {
                assets: Coin::new(ask.assets.amount - fill.assets, ask.assets.denom.clone()),
                price: Coin::new(ask.price.amount - own_price, ask.price.denom.clone()),
                seller_settlement_flat_fee: flat_left,
                ..ask.clone()
            },
        ));
    }
    Ok(())
}

/// Buyer fees and the reduced bid.
fn finish_bid(fill: &mut Fill, bid: &BidOrder) -> Result<()> {
    let full = fill.full();
    let fee_part = if full {
        bid.buyer_settlement_fees.clone()
    } else {
        let mut part = Coins::empty();
        for coin in &bid.buyer_settlement_fees {
            part.add_coin(&Coin::new(
                fee::prorate_ceil(coin.amount, fill.assets, bid.assets.amount)?,
                coin.denom.clone(),
            ))?;
        }
        part
    };
    let mut released = fee_part.clone();
    released.add_coin(&fill.price_coin())?;
    fill.released = released;

    if !full {
        let fees_left = bid
            .buyer_settlement_fees
            .checked_sub(&fee_part)
            .ok_or_else(|| ExchangeError::Internal("pro-rated fees exceed declared fees".into()))?;
        fill.remaining = Some(Order::bid(
            fill.order.order_id,
            BidOrder {
                assets: Coin::new(bid.assets.amount - fill.assets, bid.assets.denom.clone()),
                price: Coin::new(bid.price.amount - fill.price, bid.price.denom.clone()),
                buyer_settlement_fees: fees_left,
                ..bid.clone()
            },
        ));
    }
    fill.fees = fee_part;
    Ok(())
}

fn totals_by_denom(fills: &[Fill]) -> Result<Coins> {
    Coins::sum(&fills.iter().map(Fill::asset_coin).collect::<Vec<_>>())
}

impl<A: AttributeSource> Tx<'_, A> {
    fn check_batch(&self, asks: &[OrderFill], bids: &[OrderFill]) -> Result<()> {
        if asks.is_empty() || bids.is_empty() {
            return Err(ExchangeError::InvalidSettlement {
                reason: "at least one ask and one bid are required".into(),
            });
        }
        let count = asks.len() + bids.len();
        if count > self.config.max_batch_orders {
            return Err(ExchangeError::InvalidSettlement {
                reason: format!(
                    "{count} orders exceed the limit of {}",
                    self.config.max_batch_orders
                ),
            });
        }
        check_unique_ids(asks.iter().chain(bids).map(|f| f.order_id))
    }

    fn load_fill(&self, market_id: MarketId, side: OrderSide, request: OrderFill) -> Result<Fill> {
        let order = self
            .store
            .get_order(request.order_id)?
            .ok_or(ExchangeError::UnknownOrder(request.order_id))?;
        if order.side() != side {
            return Err(ExchangeError::OrderSideMismatch {
                order_id: order.order_id,
                expected: side.article(),
            });
        }
        if order.market_id() != market_id {
            return Err(ExchangeError::MarketMismatch {
                order_id: order.order_id,
                expected: market_id,
                actual: order.market_id(),
            });
        }
        let assets = fill_amount(&order, request.assets)?;
        Ok(Fill {
            order,
            transient: false,
            assets,
            price: 0,
            released: Coins::empty(),
            fees: Coins::empty(),
            remaining: None,
        })
    }

    /// Validate and plan a settlement of loaded fills.
    fn settle_fills(
        &mut self,
        market: &Market,
        mut asks: Vec<Fill>,
        mut bids: Vec<Fill>,
    ) -> Result<SettlementSummary> {
        let ask_totals = totals_by_denom(&asks)?;
        let bid_totals = totals_by_denom(&bids)?;
        if ask_totals != bid_totals {
            return Err(ExchangeError::AssetsMismatch {
                ask_assets: ask_totals.to_string(),
                bid_assets: bid_totals.to_string(),
            });
        }

        let mut groups: BTreeMap<(String, String), Group> = BTreeMap::new();
        for (i, fill) in asks.iter().enumerate() {
            groups.entry(fill.group_key()).or_default().asks.push(i);
        }
        for (i, fill) in bids.iter().enumerate() {
            groups.entry(fill.group_key()).or_default().bids.push(i);
        }
        for ((asset_denom, price_denom), group) in &groups {
            let ask_assets = checked_sum(group.asks.iter().map(|&i| asks[i].assets))?;
            let bid_assets = checked_sum(group.bids.iter().map(|&i| bids[i].assets))?;
            if ask_assets != bid_assets {
                return Err(ExchangeError::AssetsMismatch {
                    ask_assets: format!("{ask_assets}{asset_denom} priced in {price_denom}"),
                    bid_assets: format!("{bid_assets}{asset_denom} priced in {price_denom}"),
                });
            }
        }

        for fill in asks.iter_mut().chain(bids.iter_mut()) {
            let order = &fill.order;
            fill.price = if fill.full() {
                order.price().amount
            } else {
                fee::prorate_exact(order.price().amount, fill.assets, order.assets().amount)?
                    .ok_or_else(|| ExchangeError::UnevenPartialFill {
                        order_id: order.order_id,
                        reason: format!(
                            "price {} does not divide evenly for {} of {}",
                            order.price(),
                            fill.assets,
                            order.assets()
                        ),
                    })?
            };
        }

        let mut navs = Vec::with_capacity(groups.len());
        for ((asset_denom, price_denom), group) in &groups {
            let ask_prices: Vec<u128> = group.asks.iter().map(|&i| asks[i].price).collect();
            let ask_assets: Vec<u128> = group.asks.iter().map(|&i| asks[i].assets).collect();
            let ask_total = checked_sum(ask_prices.iter().copied())?;
            let bid_total = checked_sum(group.bids.iter().map(|&i| bids[i].price))?;
            if bid_total < ask_total {
                return Err(ExchangeError::PriceMismatch {
                    ask_price: format!("{ask_total}{price_denom}"),
                    bid_price: format!("{bid_total}{price_denom}"),
                });
            }
            let proceeds = allocate_prices(&ask_prices, &ask_assets, bid_total)?;
            for (&i, proceeds) in group.asks.iter().zip(proceeds) {
                let fill = &mut asks[i];
                let ask = fill
                    .order
                    .as_ask()
                    .cloned()
                    .ok_or_else(|| ExchangeError::Internal("ask fill without ask".into()))?;
                finish_ask(fill, &ask, market, proceeds)?;
            }
            for &i in &group.bids {
                let fill = &mut bids[i];
                let bid = fill
                    .order
                    .as_bid()
                    .cloned()
                    .ok_or_else(|| ExchangeError::Internal("bid fill without bid".into()))?;
                finish_bid(fill, &bid)?;
            }
            navs.push(NetAssetPrice::new(
                Coin::new(checked_sum(ask_assets)?, asset_denom.clone()),
                Coin::new(bid_total, price_denom.clone()),
            ));
        }

        self.plan_settlement(market, &groups, &asks, &bids)?;

        for fill in asks.iter().chain(&bids) {
            self.record_fill(fill)?;
        }
        for nav in &navs {
            self.navs.push(NavUpdate::from_market(market.market_id, nav));
        }

        let fills = asks
            .iter()
            .chain(&bids)
            .map(|f| FillResult {
                order_id: f.order.order_id,
                side: f.order.side(),
                assets: f.asset_coin(),
                price: f.price_coin(),
                fees: f.fees.clone(),
                fully_filled: f.full(),
            })
            .collect();
        Ok(SettlementSummary { fills, navs })
    }

    fn plan_settlement(
        &mut self,
        market: &Market,
        groups: &BTreeMap<(String, String), Group>,
        asks: &[Fill],
        bids: &[Fill],
    ) -> Result<()> {
        for fill in asks.iter().chain(bids).filter(|f| !f.transient) {
            self.plan.release(fill.order.owner(), &fill.released);
        }
        for ((asset_denom, price_denom), group) in groups {
            let sellers: Vec<&Fill> = group.asks.iter().map(|&i| &asks[i]).collect();
            let buyers: Vec<&Fill> = group.bids.iter().map(|&i| &bids[i]).collect();

            let given: Vec<u128> = sellers.iter().map(|f| f.assets).collect();
            let taken: Vec<u128> = buyers.iter().map(|f| f.assets).collect();
            for (s, b, amount) in pair_amounts(&given, &taken) {
                self.plan.transfer(
                    sellers[s].order.owner(),
                    buyers[b].order.owner(),
                    &Coins::from_coin(Coin::new(amount, asset_denom.clone())),
                );
            }

            let paid: Vec<u128> = buyers.iter().map(|f| f.price).collect();
            let owed: Vec<u128> = sellers.iter().map(|f| f.price).collect();
            for (b, s, amount) in pair_amounts(&paid, &owed) {
                self.plan.transfer(
                    buyers[b].order.owner(),
                    sellers[s].order.owner(),
                    &Coins::from_coin(Coin::new(amount, price_denom.clone())),
                );
            }
        }
        let params = self.params()?;
        for fill in asks.iter().chain(bids) {
            self.pay_market_fee(fill.order.owner(), market, &fill.fees, &params)?;
        }
        Ok(())
    }

    fn record_fill(&mut self, fill: &Fill) -> Result<()> {
        tracing::debug!(
            order = %fill.order.order_id,
            side = %fill.order.side(),
            assets = %fill.asset_coin(),
            price = %fill.price_coin(),
            fees = %fill.fees,
            transient = fill.transient,
            "Order filled"
        );
        if fill.transient {
            return Ok(());
        }
        let order = &fill.order;
        let event = match &fill.remaining {
            Some(remaining) => {
                self.store.set_order(remaining)?;
                Event::OrderPartiallyFilled {
                    order_id: order.order_id,
                    market_id: order.market_id(),
                    assets: fill.asset_coin(),
                    price: fill.price_coin(),
                    fees: fill.fees.clone(),
                    external_id: order.external_id().to_owned(),
                }
            }
            None => {
                self.store.delete_order(order)?;
                Event::OrderFilled {
                    order_id: order.order_id,
                    market_id: order.market_id(),
                    assets: fill.asset_coin(),
                    price: fill.price_coin(),
                    fees: fill.fees.clone(),
                    external_id: order.external_id().to_owned(),
                }
            }
        };
        self.emit(event);
        Ok(())
    }

    /// User settlement gate: the market must allow it unless `actor` can settle.
    fn require_user_settlement(&self, market: &Market, actor: &Address) -> Result<()> {
        if market.allow_user_settlement
            || self.is_authority(actor)
            || market.has_permission(actor, Permission::Settle)
        {
            return Ok(());
        }
        Err(ExchangeError::MarketSettlementDisabled(market.market_id))
    }

    fn load_full_fills(&self, market_id: MarketId, side: OrderSide, ids: &[OrderId]) -> Result<Vec<Fill>> {
        if ids.is_empty() {
            return Err(ExchangeError::InvalidSettlement {
                reason: "at least one order is required".into(),
            });
        }
        if ids.len() + 1 > self.config.max_batch_orders {
            return Err(ExchangeError::InvalidSettlement {
                reason: format!(
                    "{} orders exceed the limit of {}",
                    ids.len() + 1,
                    self.config.max_batch_orders
                ),
            });
        }
        check_unique_ids(ids.iter().copied())?;
        ids.iter()
            .map(|&id| self.load_fill(market_id, side, OrderFill::full(id)))
            .collect()
    }
}

/// The never-stored counter-order of a user settlement, filled completely.
fn transient_fill(order: Order) -> Fill {
    Fill {
        assets: order.assets().amount,
        order,
        transient: true,
        price: 0,
        released: Coins::empty(),
        fees: Coins::empty(),
        remaining: None,
    }
}

fn check_unique_ids(ids: impl IntoIterator<Item = OrderId>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ExchangeError::InvalidSettlement {
                reason: format!("order {id} appears more than once"),
            });
        }
    }
    Ok(())
}

/// Sum the coins of one denom-uniform list, or fail with `what` when denoms differ.
fn uniform_total<'a>(what: &str, coins: impl IntoIterator<Item = &'a Coin>) -> Result<Coin> {
    let total = Coins::sum(coins)?;
    match total.as_slice() {
        [single] => Ok(single.clone()),
        _ => Err(ExchangeError::InvalidSettlement {
            reason: format!("{what} must share a single denom, got {total}"),
        }),
    }
}

impl<L: Ledger, A: AttributeSource, N: NavSink> Keeper<L, A, N> {
    /// Settle resting asks against resting bids. Requires the market's settle
    /// permission.
    pub fn settle_orders(
        &mut self,
        actor: &Address,
        market_id: MarketId,
        asks: &[OrderFill],
        bids: &[OrderFill],
    ) -> Result<SettlementSummary> {
        let summary = self.run("settle_orders", |tx| {
            let market = tx.market_for(market_id, actor, Permission::Settle)?;
            tx.check_batch(asks, bids)?;
            let ask_fills = asks
                .iter()
                .map(|&f| tx.load_fill(market_id, OrderSide::Ask, f))
                .collect::<Result<Vec<_>>>()?;
            let bid_fills = bids
                .iter()
                .map(|&f| tx.load_fill(market_id, OrderSide::Bid, f))
                .collect::<Result<Vec<_>>>()?;
            tx.settle_fills(&market, ask_fills, bid_fills)
        })?;
        tracing::info!(
            market = %market_id,
            asks = asks.len(),
            bids = bids.len(),
            groups = summary.navs.len(),
            "Orders settled"
        );
        Ok(summary)
    }

    /// A seller fills bids in full with a one-off ask that is never stored.
    pub fn fill_bids(&mut self, request: FillBidsRequest) -> Result<SettlementSummary> {
        let market_id = request.market_id;
        let summary = self.run("fill_bids", |tx| {
            let FillBidsRequest {
                seller,
                market_id,
                total_assets,
                bid_order_ids,
                seller_settlement_flat_fee,
                ask_order_creation_fee,
            } = request;
            let market = tx.open_market_for_orders(market_id)?;
            tx.require_user_settlement(&market, &seller)?;
            tx.require_attributes(&seller, &market.req_attr_create_ask)?;
            let bids = tx.load_full_fills(market_id, OrderSide::Bid, &bid_order_ids)?;
            let price = uniform_total("bid prices", bids.iter().map(|f| f.order.price()))?;

            let order = Order::ask(
                OrderId::TRANSIENT,
                AskOrder {
                    market_id,
                    seller: seller.clone(),
                    assets: total_assets,
                    price,
                    seller_settlement_flat_fee,
                    allow_partial: false,
                    external_id: String::new(),
                },
            );
            order.validate(tx.config.max_external_id_len)?;
            if let OrderKind::Ask(ask) = &order.kind {
                validate_ask_for_market(&market, order.order_id, ask)?;
            }
            fee::check_flat_fee(
                "ask order creation",
                &market.fee_create_ask_flat,
                ask_order_creation_fee.as_ref(),
            )?;
            let params = tx.params()?;
            tx.pay_market_fee_coin(&seller, &market, ask_order_creation_fee.as_ref(), &params)?;
            tx.settle_fills(&market, vec![transient_fill(order)], bids)
        })?;
        tracing::info!(market = %market_id, bids = summary.fills.len() - 1, "Bids filled by seller");
        Ok(summary)
    }

    /// A buyer fills asks in full with a one-off bid that is never stored.
    pub fn fill_asks(&mut self, request: FillAsksRequest) -> Result<SettlementSummary> {
        let market_id = request.market_id;
        let summary = self.run("fill_asks", |tx| {
            let FillAsksRequest {
                buyer,
                market_id,
                total_price,
                ask_order_ids,
                buyer_settlement_fees,
                bid_order_creation_fee,
            } = request;
            let market = tx.open_market_for_orders(market_id)?;
            tx.require_user_settlement(&market, &buyer)?;
            tx.require_attributes(&buyer, &market.req_attr_create_bid)?;
            let asks = tx.load_full_fills(market_id, OrderSide::Ask, &ask_order_ids)?;
            let assets = uniform_total("ask assets", asks.iter().map(|f| f.order.assets()))?;

            let order = Order::bid(
                OrderId::TRANSIENT,
                BidOrder {
                    market_id,
                    buyer: buyer.clone(),
                    assets,
                    price: total_price,
                    buyer_settlement_fees,
                    allow_partial: false,
                    external_id: String::new(),
                },
            );
            order.validate(tx.config.max_external_id_len)?;
            if let OrderKind::Bid(bid) = &order.kind {
                validate_bid_for_market(&market, order.order_id, bid)?;
            }
            fee::check_flat_fee(
                "bid order creation",
                &market.fee_create_bid_flat,
                bid_order_creation_fee.as_ref(),
            )?;
            let params = tx.params()?;
            tx.pay_market_fee_coin(&buyer, &market, bid_order_creation_fee.as_ref(), &params)?;
            tx.settle_fills(&market, asks, vec![transient_fill(order)])
        })?;
        tracing::info!(market = %market_id, asks = summary.fills.len() - 1, "Asks filled by buyer");
        Ok(summary)
    }
}
