//! # settlex-engine
//!
//! The **settlex** keeper: the exchange state machine over a deterministic
//! key/value store.
//!
//! - [`Keeper`]: owns the store and the external collaborators; every
//!   mutating request runs as one all-or-nothing unit
//! - [`market`]: market registry, configuration and access grants
//! - [`orders`]: ask/bid creation, cancellation and lookups
//! - [`settlement`]: explicit ask/bid matching with fee distribution and
//!   net-asset-price reporting
//! - [`commitments`]: funds committed to a market outside the order book
//! - [`payments`]: bilateral payments keyed by (source, external id)
//! - [`genesis`]: bulk state load and dump
//! - [`Ledger`], [`AttributeSource`], [`NavSink`]: the collaborator seams
//!
//! ## Request lifecycle
//!
//! ```text
//! request ──▶ Tx (buffered writes, ledger plan, events, navs)
//!               │ validate everything
//!               ▼
//!          Ok? ──no──▶ discard, return error
//!               │yes
//!               ▼
//!          execute ledger plan ──fail──▶ undo applied prefix, discard
//!               │
//!               ▼
//!          commit writes, publish events and navs
//! ```

pub mod collaborators;
pub mod commitments;
pub mod genesis;
pub mod keeper;
pub mod market;
pub mod orders;
pub mod payments;
pub mod settlement;
pub mod state;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use collaborators::{AttributeSource, Ledger, LedgerOp, LedgerPlan, NavSink};
pub use commitments::{CommitmentRelease, CommitmentSettlement};
pub use keeper::Keeper;
pub use market::{FeeScheduleUpdate, PermissionsUpdate, RequiredAttributesUpdate};
pub use settlement::{
    FillAsksRequest, FillBidsRequest, FillResult, OrderFill, SettlementSummary,
};
pub use state::StoreExt;
