//! Genesis load and dump.

use settlex_store::state_root_hex;
use settlex_types::{GenesisState, Result};

use crate::collaborators::{AttributeSource, Ledger, NavSink};
use crate::keeper::Keeper;
use crate::state::StoreExt;

impl<L: Ledger, A: AttributeSource, N: NavSink> Keeper<L, A, N> {
    /// Load a full state. Everything is validated before anything is written.
    ///
    /// Ledger holds are not placed: the ledger's own genesis is expected to
    /// already reflect held order, commitment and payment funds.
    pub fn init_genesis(&mut self, genesis: &GenesisState) -> Result<()> {
        genesis.validate(self.config())?;
        self.run("init_genesis", |tx| {
            tx.store.set_params(&genesis.params)?;
            for market in &genesis.markets {
                tx.store.set_market(market)?;
            }
            tx.store.set_last_market_id(genesis.last_market_id);
            for order in &genesis.orders {
                tx.store.set_order(order)?;
            }
            tx.store.set_last_order_id(genesis.last_order_id);
            for commitment in &genesis.commitments {
                tx.store
                    .set_commitment(commitment.market_id, &commitment.account, &commitment.amount)?;
            }
            for payment in &genesis.payments {
                tx.store.set_payment(payment)?;
            }
            Ok(())
        })?;
        tracing::info!(
            markets = genesis.markets.len(),
            orders = genesis.orders.len(),
            commitments = genesis.commitments.len(),
            payments = genesis.payments.len(),
            root = %state_root_hex(self.store()),
            "Genesis loaded"
        );
        Ok(())
    }

    /// Dump the full state, records in store-key order.
    pub fn export_genesis(&self) -> Result<GenesisState> {
        let store = self.store();
        Ok(GenesisState {
            params: store.params()?,
            markets: store.all_markets()?,
            orders: store.all_orders()?,
            last_market_id: store.last_market_id()?,
            last_order_id: store.last_order_id()?,
            commitments: store.all_commitments()?,
            payments: store.all_payments()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use settlex_types::{
        AccessGrant, Address, AskOrder, Coins, Commitment, ExchangeError, KeeperConfig, Market,
        MarketDetails, MarketId, Order, OrderId, Payment,
    };

    use super::*;
    use crate::testing::{MemoryLedger, RecordingNavSink, StaticAttributes};

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

    fn market(id: u32) -> Market {
        Market {
            market_id: MarketId(id),
            details: MarketDetails::named(format!("m{id}")),
            accepting_orders: true,
            access_grants: vec![AccessGrant::everything(addr(1))],
            ..Market::default()
        }
    }

    fn ask(id: u64, market_id: u32) -> Order {
        Order::ask(
            OrderId(id),
            AskOrder {
                market_id: MarketId(market_id),
                seller: addr(2),
                assets: "10acorn".parse().unwrap(),
                price: "100stake".parse().unwrap(),
                seller_settlement_flat_fee: None,
                allow_partial: false,
                external_id: "g".into(),
            },
        )
    }

    fn genesis() -> GenesisState {
        GenesisState {
            markets: vec![market(3), market(1)],
            orders: vec![ask(7, 3), ask(2, 1)],
            last_market_id: MarketId(3),
            last_order_id: OrderId(9),
            commitments: vec![Commitment::new(
                addr(4),
                MarketId(1),
                "5apple".parse::<Coins>().unwrap(),
            )],
            payments: vec![Payment {
                source: addr(5),
                source_amount: "1hash".parse().unwrap(),
                target: addr(6),
                target_amount: Coins::empty(),
                external_id: "x".into(),
            }],
            ..GenesisState::default()
        }
    }

    #[test]
    fn load_then_export_in_key_order() {
        let mut k = keeper();
        k.init_genesis(&genesis()).unwrap();
        let out = k.export_genesis().unwrap();
        let ids: Vec<_> = out.markets.iter().map(|m| m.market_id).collect();
        assert_eq!(ids, vec![MarketId(1), MarketId(3)]);
        let ids: Vec<_> = out.orders.iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec![OrderId(2), OrderId(7)]);
        assert_eq!(out.last_order_id, OrderId(9));
        assert_eq!(out.commitments.len(), 1);
        assert_eq!(out.payments.len(), 1);
        assert_eq!(k.orders_with_external_id(MarketId(3), "g").unwrap().len(), 1);
    }

    #[test]
    fn new_ids_continue_after_genesis() {
        let mut k = keeper();
        k.init_genesis(&genesis()).unwrap();
        let id = k.create_market(&addr(1), market(0)).unwrap();
        assert_eq!(id, MarketId(4));
    }

    #[test]
    fn invalid_genesis_writes_nothing() {
        let mut k = keeper();
        let root = k.state_root();
        let mut bad = genesis();
        bad.orders.push(ask(8, 5));
        let err = k.init_genesis(&bad).unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidGenesis { .. }));
        assert_eq!(k.state_root(), root);
    }

    #[test]
    fn replay_yields_identical_root() {
        let mut a = keeper();
        let mut b = keeper();
        a.init_genesis(&genesis()).unwrap();
        let mut reordered = genesis();
        reordered.markets.reverse();
        reordered.orders.reverse();
        b.init_genesis(&reordered).unwrap();
        assert_eq!(a.state_root(), b.state_root());

        let mut c = keeper();
        c.init_genesis(&a.export_genesis().unwrap()).unwrap();
        assert_eq!(c.state_root(), a.state_root());
    }
}
