//! The [`Keeper`] and its transactional request runner.
//!
//! Every mutating request runs inside [`Keeper::run`]: it reads and writes
//! through a write-buffered [`Tx`] and collects ledger instructions, events
//! and NAV notifications. Only when the request returns `Ok` is the ledger
//! plan executed, the writes committed, and the notifications published.
//! On any error nothing changes.

use settlex_store::{CacheStore, KvStore, MemStore, state_root};
use settlex_types::{
    Address, Coin, Coins, Event, ExchangeError, KeeperConfig, Market, MarketId, NavUpdate, Params,
    Permission, Result, fee,
};

use crate::collaborators::{AttributeSource, Ledger, LedgerPlan, NavSink};
use crate::state::StoreExt;

/// The exchange state machine.
#[derive(Debug)]
pub struct Keeper<L, A, N> {
    store: MemStore,
    ledger: L,
    attributes: A,
    nav_sink: N,
    config: KeeperConfig,
    events: Vec<Event>,
}

impl<L: Ledger, A: AttributeSource, N: NavSink> Keeper<L, A, N> {
    #[must_use]
    pub fn new(config: KeeperConfig, ledger: L, attributes: A, nav_sink: N) -> Self {
        Self {
            store: MemStore::new(),
            ledger,
            attributes,
            nav_sink,
            config,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &KeeperConfig {
        &self.config
    }

    /// Committed state.
    #[must_use]
    pub fn store(&self) -> &MemStore {
        &self.store
    }

    #[must_use]
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    #[must_use]
    pub fn attributes(&self) -> &A {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut A {
        &mut self.attributes
    }

    #[must_use]
    pub fn nav_sink(&self) -> &N {
        &self.nav_sink
    }

    /// Events published by committed requests, oldest first.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Drain the published events.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Digest of the committed state.
    #[must_use]
    pub fn state_root(&self) -> [u8; 32] {
        state_root(&self.store)
    }

    /// Run one request atomically.
    pub(crate) fn run<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut Tx<'_, A>) -> Result<T>,
    ) -> Result<T> {
        let mut tx = Tx {
            store: CacheStore::new(&self.store),
            config: &self.config,
            attributes: &self.attributes,
            plan: LedgerPlan::new(),
            events: Vec::new(),
            navs: Vec::new(),
        };
        let out = match f(&mut tx) {
            Ok(out) => out,
            Err(err) => {
                tracing::warn!(op, error = %err, "Request rejected");
                return Err(err);
            }
        };

        let Tx {
            store,
            plan,
            events,
            navs,
            ..
        } = tx;
        let writes = store.into_writes();
        if let Err(err) = plan.execute(&mut self.ledger) {
            tracing::warn!(op, error = %err, "Ledger rejected request, state unchanged");
            return Err(err.into());
        }
        tracing::debug!(op, writes = writes.len(), ledger_ops = plan.ops().len(), "Request committed");
        self.store.apply(writes);
        for nav in &navs {
            self.nav_sink.notify(nav);
        }
        self.events.extend(events);
        Ok(out)
    }
}

/// Per-request working state.
pub struct Tx<'a, A> {
    pub(crate) store: CacheStore<'a, MemStore>,
    pub(crate) config: &'a KeeperConfig,
    pub(crate) attributes: &'a A,
    pub(crate) plan: LedgerPlan,
    pub(crate) events: Vec<Event>,
    pub(crate) navs: Vec<NavUpdate>,
}

impl<A: AttributeSource> Tx<'_, A> {
    pub(crate) fn load_market(&self, market_id: MarketId) -> Result<Market> {
        self.store
            .get_market(market_id)?
            .ok_or(ExchangeError::UnknownMarket(market_id))
    }

    pub(crate) fn params(&self) -> Result<Params> {
        self.store.params()
    }

    pub(crate) fn is_authority(&self, address: &Address) -> bool {
        self.config.is_authority(address)
    }

    /// The authority, or a holder of `permission` in `market`.
    pub(crate) fn require_permission(
        &self,
        market: &Market,
        actor: &Address,
        permission: Permission,
    ) -> Result<()> {
        if self.is_authority(actor) || market.has_permission(actor, permission) {
            return Ok(());
        }
        Err(ExchangeError::Unauthorized {
            address: actor.clone(),
            reason: format!(
                "does not have {permission} permission for market {}",
                market.market_id
            ),
        })
    }

    pub(crate) fn require_authority(&self, actor: &Address, what: &str) -> Result<()> {
        if self.is_authority(actor) {
            return Ok(());
        }
        Err(ExchangeError::Unauthorized {
            address: actor.clone(),
            reason: format!("is not the authority and cannot {what}"),
        })
    }

    pub(crate) fn require_attributes(&self, account: &Address, required: &[String]) -> Result<()> {
        if required.is_empty() || self.attributes.has_all_attributes(account, required) {
            return Ok(());
        }
        Err(ExchangeError::MissingRequiredAttribute {
            address: account.clone(),
            required: required.join(","),
        })
    }

    /// Pay a market fee: the exchange share goes to the fee collector, the
    /// rest to the market account.
    pub(crate) fn pay_market_fee(
        &mut self,
        payer: &Address,
        market: &Market,
        fees: &Coins,
        params: &Params,
    ) -> Result<()> {
        let mut to_exchange = Coins::empty();
        let mut to_market = Coins::empty();
        for coin in fees {
            let (exchange, market_share) = fee::split_fee(coin, params.split_for(&coin.denom))?;
            to_exchange.add_coin(&exchange)?;
            to_market.add_coin(&market_share)?;
        }
        self.plan
            .transfer(payer, &Address::fee_collector(), &to_exchange);
        self.plan.transfer(payer, &market.address(), &to_market);
        Ok(())
    }

    /// Pay an optional single-coin market fee.
    pub(crate) fn pay_market_fee_coin(
        &mut self,
        payer: &Address,
        market: &Market,
        fee: Option<&Coin>,
        params: &Params,
    ) -> Result<()> {
        match fee {
            Some(fee) => self.pay_market_fee(payer, market, &Coins::from_coin(fee.clone()), params),
            None => Ok(()),
        }
    }

    /// Pay a fee entirely to the exchange.
    pub(crate) fn pay_exchange_fee(&mut self, payer: &Address, fees: &Coins) {
        self.plan.transfer(payer, &Address::fee_collector(), fees);
    }

    pub(crate) fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryLedger, RecordingNavSink, StaticAttributes};
    use settlex_types::MarketDetails;

    type TestKeeper = Keeper<MemoryLedger, StaticAttributes, RecordingNavSink>;

    fn addr(b: u8) -> Address {
        Address::new(vec![b; 20]).unwrap()
    }

    fn keeper() -> TestKeeper {
        Keeper::new(
            KeeperConfig::new(addr(0xAA)),
            MemoryLedger::new(),
            StaticAttributes::new(),
            RecordingNavSink::default(),
        )
    }

    #[test]
    fn failed_request_discards_writes_and_events() {
        let mut k = keeper();
        let root = k.state_root();
        let err = k
            .run("test", |tx| {
                tx.store.set_market(&Market {
                    market_id: MarketId(1),
                    details: MarketDetails::named("x"),
                    ..Market::default()
                })?;
                tx.emit(Event::MarketCreated {
                    market_id: MarketId(1),
                });
                Err::<(), _>(ExchangeError::Internal("boom".into()))
            })
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Internal(_)));
        assert_eq!(k.state_root(), root);
        assert!(k.events().is_empty());
    }

    #[test]
    fn ledger_failure_discards_writes() {
        let mut k = keeper();
        let root = k.state_root();
        let err = k
            .run("test", |tx| {
                tx.store.set_last_market_id(MarketId(9));
                tx.plan.hold(&addr(1), &"5acorn".parse().unwrap());
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Ledger(_)));
        assert_eq!(k.state_root(), root);
    }

    #[test]
    fn success_commits_everything() {
        let mut k = keeper();
        k.ledger_mut().fund(&addr(1), &"5acorn".parse().unwrap());
        k.run("test", |tx| {
            tx.store.set_last_market_id(MarketId(9));
            tx.plan.hold(&addr(1), &"5acorn".parse().unwrap());
            tx.emit(Event::ParamsUpdated);
            Ok(())
        })
        .unwrap();
        assert_eq!(k.store().last_market_id().unwrap(), MarketId(9));
        assert_eq!(k.ledger().held(&addr(1)).to_string(), "5acorn");
        assert_eq!(k.take_events(), vec![Event::ParamsUpdated]);
        assert!(k.events().is_empty());
    }

    #[test]
    fn authority_bypasses_permissions() {
        let k = keeper();
        let tx = Tx {
            store: CacheStore::new(&k.store),
            config: &k.config,
            attributes: &k.attributes,
            plan: LedgerPlan::new(),
            events: Vec::new(),
            navs: Vec::new(),
        };
        let market = Market {
            market_id: MarketId(1),
            ..Market::default()
        };
        tx.require_permission(&market, &addr(0xAA), Permission::Settle)
            .unwrap();
        let err = tx
            .require_permission(&market, &addr(1), Permission::Settle)
            .unwrap_err();
        assert!(matches!(err, ExchangeError::Unauthorized { .. }));
    }
}
