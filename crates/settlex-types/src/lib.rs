//! # settlex-types
//!
//! Shared types, errors, and configuration for the **settlex** exchange core.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`MarketId`], [`OrderId`], [`Address`]
//! - **Amounts**: [`Coin`], [`Coins`]
//! - **Fee model**: [`FeeRatio`] and the flat/ratio fee helpers in [`fee`]
//! - **Markets**: [`Market`], [`MarketDetails`], [`AccessGrant`], [`Permission`]
//! - **Orders**: [`Order`], [`OrderKind`], [`AskOrder`], [`BidOrder`], [`OrderSide`]
//! - **Commitments**: [`Commitment`], [`AccountAmount`], [`ReleaseAmount`]
//! - **Payments**: [`Payment`]
//! - **Params / config**: [`Params`], [`DenomSplit`], [`KeeperConfig`]
//! - **Notifications**: [`Event`], [`NetAssetPrice`], [`NavUpdate`]
//! - **Genesis**: [`GenesisState`]
//! - **Errors**: [`ExchangeError`] with `EX_ERR_` prefix codes, [`LedgerError`]
//! - **Constants**: system-wide limits and defaults

pub mod coin;
pub mod commitment;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod fee;
pub mod genesis;
pub mod ids;
pub mod market;
pub mod order;
pub mod params;
pub mod payment;
pub mod permission;

// Re-export all primary types at crate root:
//   use settlex_types::{Market, Order, Coins, ...};

pub use coin::*;
pub use commitment::*;
pub use config::*;
pub use error::*;
pub use event::*;
pub use fee::FeeRatio;
pub use genesis::*;
pub use ids::*;
pub use market::*;
pub use order::*;
pub use params::*;
pub use payment::*;
pub use permission::*;

// Constants are accessed via `settlex_types::constants::FOO`
// (not re-exported to avoid name collisions).
