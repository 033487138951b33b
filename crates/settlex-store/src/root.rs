//! State root: a digest over the whole store.
//!
//! Two stores with the same entries always have the same root, so replaying
//! the same requests on two nodes must yield equal roots, and a rejected
//! request must leave the root unchanged.

use sha2::{Digest, Sha256};

use crate::KvStore;

/// SHA-256 over every (key, value) pair in key order.
#[must_use]
pub fn state_root<S: KvStore + ?Sized>(store: &S) -> [u8; 32] {
    let entries = store.iterate_prefix(&[]);
    let mut hasher = Sha256::new();
    hasher.update(b"settlex:state_root:v1:");
    hasher.update((entries.len() as u64).to_le_bytes());
    for (key, value) in &entries {
        hasher.update((key.len() as u64).to_le_bytes());
        hasher.update(key);
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value);
    }
    let digest = hasher.finalize();
    let mut root = [0u8; 32];
    root.copy_from_slice(&digest);
    root
}

/// Hex form of [`state_root`], for logs.
#[must_use]
pub fn state_root_hex<S: KvStore + ?Sized>(store: &S) -> String {
    hex::encode(state_root(store))
}

#[must_use]
pub fn verify_state_root<S: KvStore + ?Sized>(store: &S, expected: &[u8; 32]) -> bool {
    state_root(store) == *expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemStore;

    #[test]
    fn empty_store_root_is_stable() {
        assert_eq!(state_root(&MemStore::new()), state_root(&MemStore::new()));
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let mut a = MemStore::new();
        a.set(vec![1], vec![1]);
        a.set(vec![2], vec![2]);
        let mut b = MemStore::new();
        b.set(vec![2], vec![2]);
        b.set(vec![1], vec![1]);
        assert_eq!(state_root(&a), state_root(&b));
    }

    #[test]
    fn any_change_changes_root() {
        let mut a = MemStore::new();
        a.set(vec![1], vec![1]);
        let before = state_root(&a);
        a.set(vec![1], vec![2]);
        assert_ne!(before, state_root(&a));
        assert!(verify_state_root(&a, &state_root(&a)));
        assert!(!verify_state_root(&a, &before));
    }

    #[test]
    fn length_framing_prevents_ambiguity() {
        let mut a = MemStore::new();
        a.set(vec![1, 2], vec![3]);
        let mut b = MemStore::new();
        b.set(vec![1], vec![2, 3]);
        assert_ne!(state_root(&a), state_root(&b));
        assert_eq!(state_root_hex(&a).len(), 64);
    }
}
