//! Ordered key/value stores.
//!
//! [`MemStore`] is the committed state. A request reads and writes through a
//! [`CacheStore`] layered over it; the cache's write set is applied to the
//! parent only when the request succeeds, so a failed request leaves the
//! committed state untouched.

use std::collections::BTreeMap;

/// Pending writes: `Some(value)` sets, `None` deletes.
pub type WriteSet = BTreeMap<Vec<u8>, Option<Vec<u8>>>;

/// Byte-ordered key/value storage.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>);

    fn delete(&mut self, key: &[u8]);

    /// All entries whose key starts with `prefix`, in ascending key order.
    fn iterate_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;

    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Apply a write set produced by a [`CacheStore`].
    fn apply(&mut self, writes: WriteSet) {
        for (key, value) in writes {
            match value {
                Some(value) => self.set(key, value),
                None => self.delete(&key),
            }
        }
    }
}

fn prefix_range<'a, V>(
    map: &'a BTreeMap<Vec<u8>, V>,
    prefix: &'a [u8],
) -> impl Iterator<Item = (&'a Vec<u8>, &'a V)> + 'a {
    map.range(prefix.to_vec()..)
        .take_while(move |(k, _)| k.starts_with(prefix))
}

// ---------------------------------------------------------------------------
// MemStore
// ---------------------------------------------------------------------------

/// In-memory committed store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemStore {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.get(key).cloned()
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.data.insert(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.data.remove(key);
    }

    fn iterate_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        prefix_range(&self.data, prefix)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// CacheStore
// ---------------------------------------------------------------------------

/// Write-buffering view over a parent store.
///
/// Reads see the buffered writes layered over the parent. Nothing reaches
/// the parent until [`CacheStore::into_writes`] is applied to it.
#[derive(Debug)]
pub struct CacheStore<'a, S: KvStore> {
    parent: &'a S,
    writes: WriteSet,
}

impl<'a, S: KvStore> CacheStore<'a, S> {
    #[must_use]
    pub fn new(parent: &'a S) -> Self {
        Self {
            parent,
            writes: WriteSet::new(),
        }
    }

    /// Number of buffered writes (sets and deletes).
    #[must_use]
    pub fn pending(&self) -> usize {
        self.writes.len()
    }

    /// Consume the cache, yielding its write set.
    #[must_use]
    pub fn into_writes(self) -> WriteSet {
        self.writes
    }
}

impl<S: KvStore> KvStore for CacheStore<'_, S> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.writes.get(key) {
            Some(buffered) => buffered.clone(),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    fn delete(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }

    fn iterate_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.parent.iterate_prefix(prefix).into_iter().collect();
        for (key, value) in prefix_range(&self.writes, prefix) {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        merged.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemStore {
        let mut s = MemStore::new();
        s.set(vec![1, 1], b"a".to_vec());
        s.set(vec![1, 2], b"b".to_vec());
        s.set(vec![2, 1], b"c".to_vec());
        s
    }

    #[test]
    fn prefix_iteration_is_ordered_and_bounded() {
        let s = store();
        let got: Vec<_> = s.iterate_prefix(&[1]).into_iter().map(|(k, _)| k).collect();
        assert_eq!(got, vec![vec![1, 1], vec![1, 2]]);
        assert_eq!(s.iterate_prefix(&[]).len(), 3);
        assert!(s.iterate_prefix(&[3]).is_empty());
    }

    #[test]
    fn cache_overlays_parent() {
        let parent = store();
        let mut cache = CacheStore::new(&parent);
        cache.set(vec![1, 0], b"z".to_vec());
        cache.delete(&[1, 2]);
        cache.set(vec![1, 1], b"A".to_vec());

        assert_eq!(cache.get(&[1, 1]), Some(b"A".to_vec()));
        assert_eq!(cache.get(&[1, 2]), None);
        assert!(cache.has(&[2, 1]));

        let got = cache.iterate_prefix(&[1]);
        assert_eq!(
            got,
            vec![(vec![1, 0], b"z".to_vec()), (vec![1, 1], b"A".to_vec())]
        );
        // Parent untouched until the writes are applied.
        assert_eq!(parent.get(&[1, 1]), Some(b"a".to_vec()));
    }

    #[test]
    fn applying_writes_commits() {
        let mut parent = store();
        let writes = {
            let mut cache = CacheStore::new(&parent);
            cache.delete(&[1, 1]);
            cache.set(vec![3], b"d".to_vec());
            assert_eq!(cache.pending(), 2);
            cache.into_writes()
        };
        parent.apply(writes);
        assert_eq!(parent.get(&[1, 1]), None);
        assert_eq!(parent.get(&[3]), Some(b"d".to_vec()));
        assert_eq!(parent.len(), 3);
    }

    #[test]
    fn dropped_cache_discards_writes() {
        let parent = store();
        {
            let mut cache = CacheStore::new(&parent);
            cache.delete(&[1, 1]);
        }
        assert_eq!(parent, store());
    }
}
