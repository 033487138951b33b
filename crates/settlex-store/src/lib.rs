//! # settlex-store
//!
//! Key/value state store adapter for the settlex exchange core.
//!
//! - [`keys`]: the versioned binary key format and its decoders
//! - [`codec`]: record value encoding
//! - [`KvStore`], [`MemStore`], [`CacheStore`]: ordered storage with
//!   write buffering for all-or-nothing requests
//! - [`state_root`]: whole-store digest for determinism checks

pub mod codec;
pub mod keys;
pub mod kv;
pub mod root;

pub use kv::{CacheStore, KvStore, MemStore, WriteSet};
pub use root::{state_root, state_root_hex, verify_state_root};
