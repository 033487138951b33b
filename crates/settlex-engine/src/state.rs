//! Typed record access over any [`KvStore`].
//!
//! Index entries are written and removed together with their records, so
//! callers never touch the secondary keys directly.

use settlex_store::{KvStore, codec, keys};
use settlex_types::{Address, Coins, Commitment, Market, MarketId, Order, OrderId, Params, Payment, Result};

/// Record-level accessors, available on every store.
pub trait StoreExt: KvStore {
    // -- params / counters --------------------------------------------------

    fn params(&self) -> Result<Params> {
        match self.get(&keys::params_key()) {
            Some(bytes) => codec::decode_json(&bytes),
            None => Ok(Params::default()),
        }
    }

    fn set_params(&mut self, params: &Params) -> Result<()> {
        self.set(keys::params_key(), codec::encode_json(params)?);
        Ok(())
    }

    fn last_market_id(&self) -> Result<MarketId> {
        match self.get(&keys::last_market_id_key()) {
            Some(bytes) => Ok(MarketId(codec::decode_u32(&bytes)?)),
            None => Ok(MarketId::UNASSIGNED),
        }
    }

    fn set_last_market_id(&mut self, id: MarketId) {
        self.set(keys::last_market_id_key(), codec::encode_u32(id.0));
    }

    fn last_order_id(&self) -> Result<OrderId> {
        match self.get(&keys::last_order_id_key()) {
            Some(bytes) => Ok(OrderId(codec::decode_u64(&bytes)?)),
            None => Ok(OrderId::TRANSIENT),
        }
    }

    fn set_last_order_id(&mut self, id: OrderId) {
        self.set(keys::last_order_id_key(), codec::encode_u64(id.0));
    }

    // -- markets ------------------------------------------------------------

    fn get_market(&self, market_id: MarketId) -> Result<Option<Market>> {
        self.get(&keys::market_key(market_id))
            .map(|bytes| codec::decode_json(&bytes))
            .transpose()
    }

    fn has_market(&self, market_id: MarketId) -> bool {
        self.has(&keys::market_key(market_id))
    }

    /// Write a market and its custody address index entry.
    fn set_market(&mut self, market: &Market) -> Result<()> {
        self.set(keys::market_key(market.market_id), codec::encode_json(market)?);
        self.set(
            keys::address_to_market_key(&market.address(), market.market_id)?,
            Vec::new(),
        );
        Ok(())
    }

    fn all_markets(&self) -> Result<Vec<Market>> {
        self.iterate_prefix(&keys::market_prefix())
            .into_iter()
            .map(|(_, v)| codec::decode_json(&v))
            .collect()
    }

    /// The market whose custody address is `address`, if any.
    fn market_with_address(&self, address: &Address) -> Result<Option<Market>> {
        let Some((k, _)) = self
            .iterate_prefix(&keys::address_to_market_prefix(address)?)
            .into_iter()
            .next()
        else {
            return Ok(None);
        };
        let (_, market_id) = keys::parse_address_to_market_key(&k)?;
        self.get_market(market_id)
    }

    // -- orders -------------------------------------------------------------

    fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        self.get(&keys::order_key(order_id))
            .map(|bytes| codec::decode_order(order_id, &bytes))
            .transpose()
    }

    /// Write an order and its market, owner and external-id index entries.
    fn set_order(&mut self, order: &Order) -> Result<()> {
        let side = vec![order.side().type_byte()];
        self.set(keys::order_key(order.order_id), codec::encode_order(order)?);
        self.set(
            keys::market_to_order_key(order.market_id(), order.order_id),
            side.clone(),
        );
        self.set(keys::owner_to_order_key(order.owner(), order.order_id)?, side);
        if !order.external_id().is_empty() {
            self.set(
                keys::external_id_to_order_key(
                    order.market_id(),
                    order.external_id(),
                    order.order_id,
                )?,
                Vec::new(),
            );
        }
        Ok(())
    }

    fn delete_order(&mut self, order: &Order) -> Result<()> {
        self.delete(&keys::order_key(order.order_id));
        self.delete(&keys::market_to_order_key(order.market_id(), order.order_id));
        self.delete(&keys::owner_to_order_key(order.owner(), order.order_id)?);
        if !order.external_id().is_empty() {
            self.delete(&keys::external_id_to_order_key(
                order.market_id(),
                order.external_id(),
                order.order_id,
            )?);
        }
        Ok(())
    }

    fn all_orders(&self) -> Result<Vec<Order>> {
        self.iterate_prefix(&keys::order_prefix())
            .into_iter()
            .map(|(k, v)| codec::decode_order(keys::parse_order_key(&k)?, &v))
            .collect()
    }

    fn orders_in_market(&self, market_id: MarketId) -> Result<Vec<Order>> {
        let ids = self
            .iterate_prefix(&keys::market_to_order_prefix(market_id))
            .into_iter()
            .map(|(k, _)| keys::parse_market_to_order_key(&k).map(|(_, id)| id))
            .collect::<Result<Vec<_>>>()?;
        self.load_orders(ids)
    }

    fn orders_of_owner(&self, owner: &Address) -> Result<Vec<Order>> {
        let ids = self
            .iterate_prefix(&keys::owner_to_order_prefix(owner)?)
            .into_iter()
            .map(|(k, _)| keys::parse_owner_to_order_key(&k).map(|(_, id)| id))
            .collect::<Result<Vec<_>>>()?;
        self.load_orders(ids)
    }

    fn orders_with_external_id(&self, market_id: MarketId, external_id: &str) -> Result<Vec<Order>> {
        let ids = self
            .iterate_prefix(&keys::external_id_to_order_prefix(market_id, external_id)?)
            .into_iter()
            .map(|(k, _)| keys::parse_external_id_to_order_key(&k).map(|(_, _, id)| id))
            .collect::<Result<Vec<_>>>()?;
        self.load_orders(ids)
    }

    /// Resolve index entries. An index pointing at a missing order is skipped.
    fn load_orders(&self, ids: Vec<OrderId>) -> Result<Vec<Order>> {
        let mut orders = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(order) = self.get_order(id)? {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    // -- commitments --------------------------------------------------------

    /// Committed amount; empty when nothing is committed.
    fn get_commitment(&self, market_id: MarketId, account: &Address) -> Result<Coins> {
        match self.get(&keys::commitment_key(market_id, account)?) {
            Some(bytes) => codec::decode_json(&bytes),
            None => Ok(Coins::empty()),
        }
    }

    /// Store a commitment amount and its account index entry; an empty
    /// amount deletes both.
    fn set_commitment(&mut self, market_id: MarketId, account: &Address, amount: &Coins) -> Result<()> {
        let key = keys::commitment_key(market_id, account)?;
        let index = keys::account_to_commitment_key(account, market_id)?;
        if amount.is_empty() {
            self.delete(&key);
            self.delete(&index);
        } else {
            self.set(key, codec::encode_json(amount)?);
            self.set(index, Vec::new());
        }
        Ok(())
    }

    fn commitments_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Commitment>> {
        self.iterate_prefix(prefix)
            .into_iter()
            .map(|(k, v)| {
                let (market_id, account) = keys::parse_commitment_key(&k)?;
                Ok(Commitment::new(account, market_id, codec::decode_json(&v)?))
            })
            .collect()
    }

    fn all_commitments(&self) -> Result<Vec<Commitment>> {
        self.commitments_with_prefix(&keys::commitment_prefix())
    }

    fn commitments_in_market(&self, market_id: MarketId) -> Result<Vec<Commitment>> {
        self.commitments_with_prefix(&keys::commitment_market_prefix(market_id))
    }

    /// Commitments of one account, by market id.
    fn commitments_of_account(&self, account: &Address) -> Result<Vec<Commitment>> {
        let mut commitments = Vec::new();
        for (k, _) in self.iterate_prefix(&keys::account_to_commitment_prefix(account)?) {
            let (_, market_id) = keys::parse_account_to_commitment_key(&k)?;
            let amount = self.get_commitment(market_id, account)?;
            if !amount.is_empty() {
                commitments.push(Commitment::new(account.clone(), market_id, amount));
            }
        }
        Ok(commitments)
    }

    // -- payments -----------------------------------------------------------

    fn get_payment(&self, source: &Address, external_id: &str) -> Result<Option<Payment>> {
        self.get(&keys::payment_key(source, external_id)?)
            .map(|bytes| codec::decode_json(&bytes))
            .transpose()
    }

    /// Write a payment and its target index entry.
    fn set_payment(&mut self, payment: &Payment) -> Result<()> {
        self.set(
            keys::payment_key(&payment.source, &payment.external_id)?,
            codec::encode_json(payment)?,
        );
        self.set(
            keys::target_to_payment_key(&payment.target, &payment.source, &payment.external_id)?,
            Vec::new(),
        );
        Ok(())
    }

    fn delete_payment(&mut self, payment: &Payment) -> Result<()> {
        self.delete(&keys::payment_key(&payment.source, &payment.external_id)?);
        self.delete(&keys::target_to_payment_key(
            &payment.target,
            &payment.source,
            &payment.external_id,
        )?);
        Ok(())
    }

    fn payments_with_prefix(&self, prefix: &[u8]) -> Result<Vec<Payment>> {
        self.iterate_prefix(prefix)
            .into_iter()
            .map(|(_, v)| codec::decode_json(&v))
            .collect()
    }

    fn all_payments(&self) -> Result<Vec<Payment>> {
        self.payments_with_prefix(&keys::payment_prefix())
    }

    fn payments_from_source(&self, source: &Address) -> Result<Vec<Payment>> {
        self.payments_with_prefix(&keys::payment_source_prefix(source)?)
    }

    fn payments_with_target(&self, target: &Address) -> Result<Vec<Payment>> {
        let mut payments = Vec::new();
        for (k, _) in self.iterate_prefix(&keys::target_to_payment_prefix(target)?) {
            let (_, source, external_id) = keys::parse_target_to_payment_key(&k)?;
            if let Some(payment) = self.get_payment(&source, &external_id)? {
                payments.push(payment);
            }
        }
        Ok(payments)
    }
}

impl<S: KvStore + ?Sized> StoreExt for S {}
