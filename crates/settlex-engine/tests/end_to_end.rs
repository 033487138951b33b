//! End-to-end flows through the public keeper API.
//!
//! Each test drives a fresh keeper with in-memory collaborators and checks
//! the externally visible results: ledger balances, stored records, state
//! root, and NAV notifications.

use settlex_engine::testing::{MemoryLedger, RecordingNavSink, StaticAttributes};
use settlex_engine::{
    CommitmentRelease, CommitmentSettlement, FillAsksRequest, Keeper, OrderFill, PermissionsUpdate,
};
use settlex_types::*;

type TestKeeper = Keeper<MemoryLedger, StaticAttributes, RecordingNavSink>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn addr(b: u8) -> Address {
    Address::new(vec![b; 20]).unwrap()
}

fn coin(s: &str) -> Coin {
    s.parse().unwrap()
}

fn coins(s: &str) -> Coins {
    s.parse().unwrap()
}

const AUTHORITY: u8 = 0xAA;
const ADMIN: u8 = 0x01;
const SETTLER: u8 = 0x02;
const SELLER: u8 = 0x11;
const BUYER: u8 = 0x21;

/// A keeper with one open market administered by `ADMIN`.
struct Exchange {
    keeper: TestKeeper,
    market_id: MarketId,
}

impl Exchange {
    fn new() -> Self {
        init_tracing();
        let mut keeper = Keeper::new(
            KeeperConfig::new(addr(AUTHORITY)),
            MemoryLedger::new(),
            StaticAttributes::new(),
            RecordingNavSink::default(),
        );
        let market_id = keeper
            .create_market(
                &addr(ADMIN),
                Market {
                    details: MarketDetails::named("End to end"),
                    accepting_orders: true,
                    accepting_commitments: true,
                    access_grants: vec![AccessGrant::everything(addr(ADMIN))],
                    ..Market::default()
                },
            )
            .unwrap();
        Self { keeper, market_id }
    }

    fn fund(&mut self, who: u8, amount: &str) {
        self.keeper.ledger_mut().fund(&addr(who), &coins(amount));
    }

    fn ask(&mut self, seller: u8, assets: &str, price: &str) -> OrderId {
        self.keeper
            .create_ask(
                AskOrder {
                    market_id: self.market_id,
                    seller: addr(seller),
                    assets: coin(assets),
                    price: coin(price),
                    seller_settlement_flat_fee: None,
                    allow_partial: false,
                    external_id: String::new(),
                },
                None,
            )
            .unwrap()
    }

    fn bid(&mut self, buyer: u8, assets: &str, price: &str) -> OrderId {
        self.keeper
            .create_bid(
                BidOrder {
                    market_id: self.market_id,
                    buyer: addr(buyer),
                    assets: coin(assets),
                    price: coin(price),
                    buyer_settlement_fees: Coins::empty(),
                    allow_partial: false,
                    external_id: String::new(),
                },
                None,
            )
            .unwrap()
    }
}

// ---------------------------------------------------------------------------
// Order settlement
// ---------------------------------------------------------------------------

#[test]
fn matched_orders_swap_funds_and_report_nav() {
    let mut ex = Exchange::new();
    ex.fund(SELLER, "10acorn");
    ex.fund(BUYER, "100stake");
    let a = ex.ask(SELLER, "10acorn", "100stake");
    let b = ex.bid(BUYER, "10acorn", "100stake");
    assert_eq!(ex.keeper.ledger().held(&addr(SELLER)), coins("10acorn"));
    assert_eq!(ex.keeper.ledger().held(&addr(BUYER)), coins("100stake"));

    let summary = ex
        .keeper
        .settle_orders(&addr(ADMIN), ex.market_id, &[OrderFill::full(a)], &[OrderFill::full(b)])
        .unwrap();
    assert_eq!(summary.fills.len(), 2);
    assert_eq!(summary.navs, vec![NetAssetPrice::new(coin("10acorn"), coin("100stake"))]);

    assert_eq!(ex.keeper.ledger().spendable(&addr(SELLER)), coins("100stake"));
    assert_eq!(ex.keeper.ledger().spendable(&addr(BUYER)), coins("10acorn"));
    assert!(ex.keeper.order(a).is_err());
    assert!(ex.keeper.order(b).is_err());
    assert!(ex.keeper.orders_in_market(ex.market_id).unwrap().is_empty());

    let navs = &ex.keeper.nav_sink().updates;
    assert_eq!(navs.len(), 1);
    assert_eq!(navs[0].denom, "acorn");
    assert_eq!(navs[0].price_denom, "stake");
    assert_eq!(navs[0].price_amount, 100);
    assert_eq!(navs[0].volume_amount, 10);
}

#[test]
fn mismatched_assets_change_nothing() {
    let mut ex = Exchange::new();
    ex.fund(SELLER, "10acorn");
    ex.fund(BUYER, "100stake");
    let a = ex.ask(SELLER, "10acorn", "100stake");
    let b = ex.bid(BUYER, "9acorn", "100stake");
    let root = ex.keeper.state_root();
    let ledger = ex.keeper.ledger().clone();
    let events = ex.keeper.events().len();

    let err = ex
        .keeper
        .settle_orders(&addr(ADMIN), ex.market_id, &[OrderFill::full(a)], &[OrderFill::full(b)])
        .unwrap_err();
    assert!(matches!(err, ExchangeError::AssetsMismatch { .. }));
    assert_eq!(ex.keeper.state_root(), root);
    assert_eq!(ex.keeper.ledger(), &ledger);
    assert_eq!(ex.keeper.events().len(), events);
    assert!(ex.keeper.nav_sink().updates.is_empty());
}

#[test]
fn settle_permission_granted_at_runtime() {
    let mut ex = Exchange::new();
    ex.fund(SELLER, "10acorn");
    ex.fund(BUYER, "100stake");
    let a = ex.ask(SELLER, "10acorn", "100stake");
    let b = ex.bid(BUYER, "10acorn", "100stake");
    let (asks, bids) = ([OrderFill::full(a)], [OrderFill::full(b)]);

    let err = ex
        .keeper
        .settle_orders(&addr(SETTLER), ex.market_id, &asks, &bids)
        .unwrap_err();
    assert!(matches!(err, ExchangeError::Unauthorized { .. }));

    ex.keeper
        .manage_permissions(
            &addr(ADMIN),
            ex.market_id,
            &PermissionsUpdate {
                to_grant: vec![AccessGrant::new(addr(SETTLER), [Permission::Settle])],
                ..PermissionsUpdate::default()
            },
        )
        .unwrap();
    ex.keeper
        .settle_orders(&addr(SETTLER), ex.market_id, &asks, &bids)
        .unwrap();
    assert!(ex.keeper.all_orders().unwrap().is_empty());
}

#[test]
fn buyer_fills_resting_asks_when_user_settlement_allowed() {
    let mut ex = Exchange::new();
    ex.fund(SELLER, "10acorn");
    ex.fund(BUYER, "100stake");
    let a = ex.ask(SELLER, "10acorn", "100stake");
    let request = FillAsksRequest {
        buyer: addr(BUYER),
        market_id: ex.market_id,
        total_price: coin("100stake"),
        ask_order_ids: vec![a],
        buyer_settlement_fees: Coins::empty(),
        bid_order_creation_fee: None,
    };

    let err = ex.keeper.fill_asks(request.clone()).unwrap_err();
    assert_eq!(err, ExchangeError::MarketSettlementDisabled(ex.market_id));

    ex.keeper
        .set_allow_user_settlement(&addr(ADMIN), ex.market_id, true)
        .unwrap();
    let summary = ex.keeper.fill_asks(request).unwrap();
    assert!(summary.fills.iter().all(|f| f.fully_filled));
    assert_eq!(ex.keeper.ledger().spendable(&addr(BUYER)), coins("10acorn"));
    assert_eq!(ex.keeper.ledger().spendable(&addr(SELLER)), coins("100stake"));
    assert!(ex.keeper.all_orders().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

#[test]
fn payment_lifecycle() {
    let mut ex = Exchange::new();
    ex.fund(SELLER, "10hash");
    ex.fund(BUYER, "5stake");
    let payment = Payment {
        source: addr(SELLER),
        source_amount: coins("5hash"),
        target: addr(BUYER),
        target_amount: coins("3stake"),
        external_id: "order-42".into(),
    };

    ex.keeper.create_payment(payment.clone()).unwrap();
    assert!(matches!(
        ex.keeper.create_payment(payment.clone()).unwrap_err(),
        ExchangeError::DuplicatePayment { .. }
    ));
    assert_eq!(ex.keeper.ledger().held(&addr(SELLER)), coins("5hash"));

    ex.keeper.accept_payment(&addr(BUYER), &payment).unwrap();
    assert_eq!(ex.keeper.ledger().spendable(&addr(SELLER)), coins("5hash,3stake"));
    assert_eq!(ex.keeper.ledger().spendable(&addr(BUYER)), coins("5hash,2stake"));
    assert!(ex.keeper.ledger().held(&addr(SELLER)).is_empty());
    assert!(matches!(
        ex.keeper.payment(&addr(SELLER), "order-42").unwrap_err(),
        ExchangeError::UnknownPayment { .. }
    ));
}

// ---------------------------------------------------------------------------
// Commitments
// ---------------------------------------------------------------------------

#[test]
fn unbalanced_commitment_settlement_changes_nothing() {
    let mut ex = Exchange::new();
    ex.fund(SELLER, "20apple");
    ex.keeper
        .add_commitment(&addr(SELLER), ex.market_id, &coins("10apple"), None)
        .unwrap();
    let ledger = ex.keeper.ledger().clone();
    let root = ex.keeper.state_root();

    let mut settlement = CommitmentSettlement {
        market_id: ex.market_id,
        inputs: vec![AccountAmount::new(addr(SELLER), coins("10apple"))],
        outputs: vec![AccountAmount::new(addr(BUYER), coins("9apple"))],
        navs: vec![],
    };
    assert!(matches!(
        ex.keeper.settle_commitments(&addr(ADMIN), &settlement).unwrap_err(),
        ExchangeError::CommitmentSettlementUnbalanced { .. }
    ));
    assert_eq!(ex.keeper.ledger(), &ledger);
    assert_eq!(ex.keeper.state_root(), root);

    settlement.outputs = vec![AccountAmount::new(addr(BUYER), coins("10apple"))];
    ex.keeper.settle_commitments(&addr(ADMIN), &settlement).unwrap();
    assert!(matches!(
        ex.keeper.commitment(&addr(SELLER), ex.market_id).unwrap_err(),
        ExchangeError::UnknownCommitment { .. }
    ));
    assert_eq!(ex.keeper.commitment(&addr(BUYER), ex.market_id).unwrap(), coins("10apple"));
    assert_eq!(ex.keeper.ledger().held(&addr(BUYER)), coins("10apple"));
    assert_eq!(ex.keeper.ledger().spendable(&addr(SELLER)), coins("10apple"));
}

#[test]
fn releasing_everything_removes_commitment() {
    let mut ex = Exchange::new();
    ex.fund(SELLER, "10apple");
    ex.keeper
        .add_commitment(&addr(SELLER), ex.market_id, &coins("10apple"), None)
        .unwrap();
    ex.keeper
        .release_commitments(
            &addr(ADMIN),
            ex.market_id,
            &[CommitmentRelease {
                account: addr(SELLER),
                amount: ReleaseAmount::Exact(coins("10apple")),
            }],
        )
        .unwrap();
    assert!(ex.keeper.all_commitments().unwrap().is_empty());
    assert_eq!(
        ex.keeper.commitment(&addr(SELLER), ex.market_id).unwrap_err(),
        ExchangeError::UnknownCommitment {
            account: addr(SELLER),
            market_id: ex.market_id,
        }
    );
    assert_eq!(ex.keeper.ledger().spendable(&addr(SELLER)), coins("10apple"));
    assert!(ex.keeper.export_genesis().unwrap().commitments.is_empty());
}

// ---------------------------------------------------------------------------
// Genesis
// ---------------------------------------------------------------------------

#[test]
fn exported_state_replays_to_same_root() {
    let mut ex = Exchange::new();
    ex.fund(SELLER, "10acorn");
    ex.fund(BUYER, "100stake");
    ex.ask(SELLER, "10acorn", "100stake");
    ex.bid(BUYER, "5acorn", "50stake");
    let exported = ex.keeper.export_genesis().unwrap();

    let mut replica: TestKeeper = Keeper::new(
        KeeperConfig::new(addr(AUTHORITY)),
        MemoryLedger::new(),
        StaticAttributes::new(),
        RecordingNavSink::default(),
    );
    replica.init_genesis(&exported).unwrap();
    assert_eq!(replica.state_root(), ex.keeper.state_root());
    assert_eq!(replica.all_orders().unwrap(), ex.keeper.all_orders().unwrap());
}
