//! RobinHashMap: insertion-ordered map over an entry store and a Robin Hood probe index.
//!
//! Every keyed operation first resolves the key through the probe index to an
//! entry-store handle, then mutates both structures together. The index grows
//! once the load factor passes one half; growth rebuilds only the index, in
//! entry-store order, from the cached hashes.

use crate::entry_store::{self, EntryStore, Handle};
use crate::error::MapError;
use crate::probe_index::ProbeIndex;
use crate::trace::trace;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::iter::FusedIterator;
use core::ops::Index;
use std::collections::hash_map::RandomState;

/// Index capacity of an empty or freshly cleared map.
pub const BASE_CAPACITY: usize = 20;
const GROWTH_FACTOR: usize = 5;
const GROWTH_OFFSET: usize = 20;

#[inline]
fn grown_capacity(len: usize) -> usize {
    GROWTH_FACTOR * len + GROWTH_OFFSET
}

// Handles resolve against whichever map they are given; only the issuing map
// and its clones give a meaningful answer.
impl Handle {
    /// Key of the entry in `map`, or `None` once the entry has been removed.
    pub fn key<'a, K, V, S>(&self, map: &'a RobinHashMap<K, V, S>) -> Option<&'a K> {
        map.entries.get(*self).map(|n| &n.key)
    }

    pub fn value<'a, K, V, S>(&self, map: &'a RobinHashMap<K, V, S>) -> Option<&'a V> {
        map.entries.get(*self).map(|n| &n.value)
    }

    pub fn value_mut<'a, K, V, S>(&self, map: &'a mut RobinHashMap<K, V, S>) -> Option<&'a mut V> {
        map.entries.get_mut(*self).map(|n| &mut n.value)
    }
}

/// A hash map that iterates in insertion order and resolves keys through a
/// Robin Hood open-addressing index.
///
/// Inserting a key that is already present leaves the stored value untouched;
/// use [`get_or_insert_with`](Self::get_or_insert_with) or
/// [`get_mut`](Self::get_mut) to update in place.
#[derive(Clone)]
pub struct RobinHashMap<K, V, S = RandomState> {
    hasher: S,
    index: ProbeIndex,
    entries: EntryStore<K, V>,
}

impl<K, V> RobinHashMap<K, V> {
    pub fn new() -> Self {
        Self::with_hasher(RandomState::new())
    }

    /// Size the index as if `capacity` entries had just been inserted.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, RandomState::new())
    }
}

impl<K, V, S: Default> Default for RobinHashMap<K, V, S> {
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> RobinHashMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            hasher,
            index: ProbeIndex::with_capacity(BASE_CAPACITY),
            entries: EntryStore::new(),
        }
    }

    pub fn with_capacity_and_hasher(capacity: usize, hasher: S) -> Self {
        Self {
            hasher,
            index: ProbeIndex::with_capacity(grown_capacity(capacity)),
            entries: EntryStore::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of slots in the probe index.
    pub fn capacity(&self) -> usize {
        self.index.capacity()
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Drop every entry and shrink the index back to [`BASE_CAPACITY`].
    pub fn clear(&mut self) {
        trace!(len = self.entries.len(), "clearing map");
        self.entries.clear();
        self.index = ProbeIndex::with_capacity(BASE_CAPACITY);
    }

    /// Remove the entry a handle refers to. Stale handles return `None`.
    pub fn remove_handle(&mut self, handle: Handle) -> Option<(K, V)> {
        let hash = self.entries.get(handle)?.hash;
        let (pos, _) = self.index.locate(hash, |h| h == handle)?;
        let removed = self.entries.remove(handle);
        self.index.remove_at(pos);
        removed
    }

    /// Keep only the entries for which `keep` returns `true`. Survivors keep
    /// their relative order.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let doomed: Vec<Handle> = self
            .entries
            .iter_mut()
            .filter_map(|(h, k, v)| (!keep(k, v)).then_some(h))
            .collect();
        for h in doomed {
            self.remove_handle(h);
        }
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.entries.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.entries.iter_mut(),
        }
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    // Runs after every insert path, including ones that found the key present.
    fn grow_if_needed(&mut self) {
        let len = self.entries.len();
        // Load factor len / capacity above one half.
        if 2 * len <= self.index.capacity() {
            return;
        }
        self.rehash(grown_capacity(len));
    }

    fn rehash(&mut self, capacity: usize) {
        let mut index = ProbeIndex::with_capacity(capacity);
        for (handle, node) in self.entries.iter() {
            index.place(handle, node.hash);
        }
        trace!(
            old_capacity = self.index.capacity(),
            new_capacity = capacity,
            len = self.entries.len(),
            "rehashed probe index"
        );
        self.index = index;
    }

    fn push_entry(&mut self, key: K, value: V, hash: u64) -> Handle {
        let handle = self.entries.push_back(key, value, hash);
        self.index.place(handle, hash);
        handle
    }

    fn value_of_mut(&mut self, handle: Handle) -> &mut V {
        match self.entries.get_mut(handle) {
            Some(node) => &mut node.value,
            None => unreachable!("probe index refers to a removed entry"),
        }
    }
}

impl<K, V, S> RobinHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    fn locate<Q>(&self, hash: u64, q: &Q) -> Option<(usize, Handle)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let entries = &self.entries;
        self.index.locate(hash, |h| {
            entries
                .get(h)
                .is_some_and(|n| n.hash == hash && n.key.borrow() == q)
        })
    }

    /// Resolve a key to the handle of its entry.
    pub fn find<Q>(&self, q: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        self.locate(hash, q).map(|(_, h)| h)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_key_value(q).map(|(_, v)| v)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let handle = self.find(q)?;
        self.entries.get(handle).map(|n| (&n.key, &n.value))
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let handle = self.find(q)?;
        self.entries.get_mut(handle).map(|n| &mut n.value)
    }

    /// Checked lookup: [`MapError::KeyNotFound`] when the key is absent.
    pub fn at<Q>(&self, q: &Q) -> Result<&V, MapError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(q).ok_or(MapError::KeyNotFound)
    }

    pub fn at_mut<Q>(&mut self, q: &Q) -> Result<&mut V, MapError>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_mut(q).ok_or(MapError::KeyNotFound)
    }

    /// Insert `key` if it is absent. An existing entry keeps its value and the
    /// arguments are dropped. Returns whether a new entry was added.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let hash = self.make_hash(&key);
        let inserted = match self.locate(hash, &key) {
            Some(_) => false,
            None => {
                self.push_entry(key, value, hash);
                true
            }
        };
        self.grow_if_needed();
        inserted
    }

    /// Return the value for `key`, inserting `default()` first if the key is
    /// absent. `default` only runs on insertion.
    pub fn get_or_insert_with<F>(&mut self, key: K, default: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let hash = self.make_hash(&key);
        let handle = match self.locate(hash, &key) {
            Some((_, handle)) => handle,
            None => self.push_entry(key, default(), hash),
        };
        self.grow_if_needed();
        self.value_of_mut(handle)
    }

    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    /// Remove `key`, returning its value. Absent keys are a no-op.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(q).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let hash = self.make_hash(q);
        let (pos, handle) = self.locate(hash, q)?;
        let removed = self.entries.remove(handle);
        self.index.remove_at(pos);
        removed
    }
}

impl<K, V, S> fmt::Debug for RobinHashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> PartialEq for RobinHashMap<K, V, S>
where
    K: Eq + Hash,
    V: PartialEq,
    S: BuildHasher,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K, V, S> Eq for RobinHashMap<K, V, S>
where
    K: Eq + Hash,
    V: Eq,
    S: BuildHasher,
{
}

impl<K, Q, V, S> Index<&Q> for RobinHashMap<K, V, S>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Eq + Hash,
    S: BuildHasher,
{
    type Output = V;

    fn index(&self, key: &Q) -> &V {
        match self.at(key) {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for RobinHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut map = Self::with_capacity_and_hasher(iter.size_hint().0, S::default());
        map.extend(iter);
        map
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for RobinHashMap<K, V>
where
    K: Eq + Hash,
{
    fn from(pairs: [(K, V); N]) -> Self {
        Self::from_iter(pairs)
    }
}

impl<K, V, S> Extend<(K, V)> for RobinHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<'a, K, V, S> Extend<(&'a K, &'a V)> for RobinHashMap<K, V, S>
where
    K: Eq + Hash + Copy,
    V: Copy,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (&'a K, &'a V)>>(&mut self, iter: I) {
        self.extend(iter.into_iter().map(|(&k, &v)| (k, v)));
    }
}

impl<'a, K, V, S> IntoIterator for &'a RobinHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut RobinHashMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

impl<K, V, S> IntoIterator for RobinHashMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> IntoIter<K, V> {
        IntoIter {
            inner: self.entries.into_iter(),
        }
    }
}

/// Iterator over `(&K, &V)` in insertion order.
pub struct Iter<'a, K, V> {
    inner: entry_store::Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, n)| (&n.key, &n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Iterator over `(&K, &mut V)` in insertion order.
pub struct IterMut<'a, K, V> {
    inner: entry_store::IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, k, v)| (k, v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    #[inline]
    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}
impl<K, V> FusedIterator for Keys<'_, K, V> {}

pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    #[inline]
    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}
impl<K, V> FusedIterator for Values<'_, K, V> {}

pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    #[inline]
    fn next(&mut self) -> Option<&'a mut V> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}
impl<K, V> FusedIterator for ValuesMut<'_, K, V> {}

/// Owning iterator over `(K, V)` in insertion order.
pub struct IntoIter<K, V> {
    inner: entry_store::IntoIter<K, V>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    #[inline]
    fn next(&mut self) -> Option<(K, V)> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}
impl<K, V> FusedIterator for IntoIter<K, V> {}

#[cfg(test)]
impl<K, V, S> RobinHashMap<K, V, S> {
    /// Panics unless the index and the entry store agree: one occupied slot
    /// per live entry, distances match home offsets, and a displaced entry is
    /// never preceded by an empty slot or a much richer neighbour.
    pub(crate) fn assert_invariants(&self) {
        use crate::probe_index::Slot;
        use std::collections::HashSet;

        let cap = self.index.capacity();
        let slots = self.index.slots();
        let mut seen = HashSet::new();
        for (pos, handle, distance) in self.index.occupied() {
            let node = self
                .entries
                .get(handle)
                .expect("occupied slot refers to a live entry");
            let home = self.index.home(node.hash);
            assert_eq!(distance, (pos + cap - home) % cap, "distance at slot {pos}");
            assert!(seen.insert(handle), "handle indexed twice");
            if distance > 0 {
                match slots[(pos + cap - 1) % cap] {
                    Slot::Occupied { distance: prev, .. } => {
                        assert!(prev + 1 >= distance, "robin hood ordering at slot {pos}")
                    }
                    Slot::Empty => panic!("displaced entry at slot {pos} follows an empty slot"),
                }
            }
        }
        assert_eq!(seen.len(), self.entries.len(), "every entry is indexed");
        assert!(2 * self.entries.len() <= cap, "load factor stays at or below one half");
    }

    /// Slot position and probe distance of the entry behind `handle`.
    pub(crate) fn slot_of(&self, handle: Handle) -> Option<(usize, usize)> {
        self.index
            .occupied()
            .find(|&(_, h, _)| h == handle)
            .map(|(pos, _, d)| (pos, d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::hash::Hasher;
    use std::cell::Cell;

    // `u64` keys hash to themselves so home slots can be chosen by hand.
    #[derive(Clone, Default)]
    struct IdentityBuildHasher;
    struct IdentityHasher(u64);
    impl BuildHasher for IdentityBuildHasher {
        type Hasher = IdentityHasher;
        fn build_hasher(&self) -> IdentityHasher {
            IdentityHasher(0)
        }
    }
    impl Hasher for IdentityHasher {
        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.0 = (self.0 << 8) | b as u64;
            }
        }
        fn write_u64(&mut self, n: u64) {
            self.0 = n;
        }
        fn finish(&self) -> u64 {
            self.0
        }
    }

    #[derive(Clone, Default)]
    struct ConstBuildHasher;
    struct ConstHasher;
    impl BuildHasher for ConstBuildHasher {
        type Hasher = ConstHasher;
        fn build_hasher(&self) -> ConstHasher {
            ConstHasher
        }
    }
    impl Hasher for ConstHasher {
        fn write(&mut self, _bytes: &[u8]) {}
        fn finish(&self) -> u64 {
            0
        }
    }

    type IdMap<V> = RobinHashMap<u64, V, IdentityBuildHasher>;

    fn slot(m: &IdMap<&'static str>, key: u64) -> Option<(usize, usize)> {
        m.find(&key).and_then(|h| m.slot_of(h))
    }

    /// Invariant: the index starts at 20 slots and grows to 5 * len + 20 right
    /// after the insert that pushes the load factor past one half.
    #[test]
    fn eleventh_insert_grows_to_75() {
        let mut m: IdMap<u64> = IdMap::with_hasher(IdentityBuildHasher);
        assert_eq!(m.capacity(), BASE_CAPACITY);
        for k in 0..10 {
            assert!(m.insert(k, k * 10));
            assert_eq!(m.capacity(), 20, "no growth at {} entries", k + 1);
        }
        assert!(m.insert(10, 100));
        assert_eq!(m.capacity(), 75);
        for k in 0..11 {
            assert_eq!(m.get(&k), Some(&(k * 10)));
        }
        m.assert_invariants();
    }

    /// Invariant: repeated growth follows 20 -> 75 -> 210 and keeps every pair.
    #[test]
    fn repeated_growth_keeps_pairs() {
        let mut m: IdMap<u64> = IdMap::with_hasher(IdentityBuildHasher);
        let mut capacities = vec![m.capacity()];
        for k in 0..40 {
            m.insert(k * 7, k);
            if *capacities.last().unwrap() != m.capacity() {
                capacities.push(m.capacity());
            }
            m.assert_invariants();
        }
        assert_eq!(capacities, vec![20, 75, 210]);
        for k in 0..40 {
            assert_eq!(m.get(&(k * 7)), Some(&k));
        }
        let order: Vec<u64> = m.values().copied().collect();
        assert_eq!(order, (0..40).collect::<Vec<_>>());
    }

    /// Invariant: erasing the head of a three-entry collision run shifts the
    /// displaced successors back by one and stops at an entry sitting at home.
    #[test]
    fn erase_backward_shifts_cluster() {
        let mut m: IdMap<&str> = IdMap::with_hasher(IdentityBuildHasher);
        m.insert(1, "a");
        m.insert(21, "b");
        m.insert(41, "c");
        m.insert(4, "home");
        assert_eq!(slot(&m, 1), Some((1, 0)));
        assert_eq!(slot(&m, 21), Some((2, 1)));
        assert_eq!(slot(&m, 41), Some((3, 2)));
        assert_eq!(slot(&m, 4), Some((4, 0)));

        assert_eq!(m.remove(&1), Some("a"));
        assert_eq!(slot(&m, 21), Some((1, 0)));
        assert_eq!(slot(&m, 41), Some((2, 1)));
        assert_eq!(slot(&m, 4), Some((4, 0)), "home entry does not move");
        assert!(m.find(&1).is_none());
        assert_eq!(m.get(&41), Some(&"c"));
        m.assert_invariants();
    }

    /// Invariant: erasing the tail of a run leaves the predecessors in place.
    #[test]
    fn erase_stops_at_empty_slot() {
        let mut m: IdMap<&str> = IdMap::with_hasher(IdentityBuildHasher);
        m.insert(5, "a");
        m.insert(25, "b");
        m.insert(9, "c");
        assert_eq!(m.remove(&25), Some("b"));
        assert_eq!(slot(&m, 5), Some((5, 0)));
        assert_eq!(slot(&m, 9), Some((9, 0)));
        m.assert_invariants();
    }

    /// Invariant: a newcomer that has travelled further steals the slot of a
    /// resident sitting at its own home.
    #[test]
    fn insert_displaces_richer_resident() {
        let mut m: IdMap<&str> = IdMap::with_hasher(IdentityBuildHasher);
        m.insert(1, "a");
        m.insert(2, "b");
        m.insert(21, "c");
        assert_eq!(slot(&m, 1), Some((1, 0)));
        assert_eq!(slot(&m, 21), Some((2, 1)));
        assert_eq!(slot(&m, 2), Some((3, 1)));
        let order: Vec<u64> = m.keys().copied().collect();
        assert_eq!(order, vec![1, 2, 21], "displacement never reorders iteration");
        m.assert_invariants();
    }

    /// Invariant: probes wrap from the last slot to the first.
    #[test]
    fn probe_wraps_around() {
        let mut m: IdMap<&str> = IdMap::with_hasher(IdentityBuildHasher);
        m.insert(19, "a");
        m.insert(39, "b");
        m.insert(59, "c");
        assert_eq!(slot(&m, 19), Some((19, 0)));
        assert_eq!(slot(&m, 39), Some((0, 1)));
        assert_eq!(slot(&m, 59), Some((1, 2)));
        assert_eq!(m.remove(&19), Some("a"));
        assert_eq!(slot(&m, 39), Some((19, 0)));
        assert_eq!(slot(&m, 59), Some((0, 1)));
        m.assert_invariants();
    }

    /// Invariant: a second insert of the same key keeps the first value.
    #[test]
    fn insert_does_not_overwrite() {
        let mut m = RobinHashMap::new();
        assert!(m.insert("k".to_string(), 1));
        assert!(!m.insert("k".to_string(), 2));
        assert_eq!(m.get("k"), Some(&1));
        assert_eq!(m.len(), 1);
    }

    /// Invariant: indexed access on a present key returns it without running
    /// the constructor and without growing the index.
    #[test]
    fn get_or_insert_with_is_lazy() {
        let mut m: IdMap<String> = IdMap::with_hasher(IdentityBuildHasher);
        let calls = Cell::new(0);
        *m.get_or_insert_with(3, || {
            calls.set(calls.get() + 1);
            "v".to_string()
        }) += "!";
        let cap = m.capacity();
        let v = m.get_or_insert_with(3, || {
            calls.set(calls.get() + 1);
            "other".to_string()
        });
        assert_eq!(v.as_str(), "v!");
        assert_eq!(calls.get(), 1);
        assert_eq!(m.capacity(), cap);
    }

    /// Invariant: default-inserting the eleventh key grows the index and still
    /// hands back a reference to the new value.
    #[test]
    fn get_or_insert_default_across_growth() {
        let mut m: IdMap<u32> = IdMap::with_hasher(IdentityBuildHasher);
        for k in 0..10 {
            *m.get_or_insert_default(k) += 1;
        }
        assert_eq!(m.capacity(), 20);
        *m.get_or_insert_default(10) += 5;
        assert_eq!(m.capacity(), 75);
        assert_eq!(m.get(&10), Some(&5));
        *m.get_or_insert_default(10) += 5;
        assert_eq!(m.get(&10), Some(&10));
        assert_eq!(m.len(), 11);
    }

    #[test]
    fn at_reports_missing_key() {
        let mut m = RobinHashMap::new();
        m.insert("a", 1);
        assert_eq!(m.at(&"a"), Ok(&1));
        assert_eq!(m.at(&"b"), Err(MapError::KeyNotFound));
        *m.at_mut(&"a").unwrap() = 7;
        assert_eq!(m[&"a"], 7);
        assert_eq!(m.at_mut(&"b").unwrap_err().to_string(), "key not found");
    }

    #[test]
    #[should_panic(expected = "key not found")]
    fn index_panics_on_missing_key() {
        let m: RobinHashMap<&str, i32> = RobinHashMap::new();
        let _value: i32 = m[&"nope"];
    }

    /// Invariant: clear empties both stores and returns to the base capacity.
    #[test]
    fn clear_resets_capacity() {
        let mut m: IdMap<u64> = IdMap::with_hasher(IdentityBuildHasher);
        for k in 0..30 {
            m.insert(k, k);
        }
        assert!(m.capacity() > BASE_CAPACITY);
        let h = m.find(&3).unwrap();
        m.clear();
        assert!(m.is_empty());
        assert_eq!(m.capacity(), BASE_CAPACITY);
        assert!(h.value(&m).is_none());
        assert!(m.insert(3, 33));
        assert_eq!(m.get(&3), Some(&33));
        m.assert_invariants();
    }

    /// Invariant: handles survive rehashes and removals of other entries.
    #[test]
    fn handles_stable_across_rehash() {
        let mut m: IdMap<u64> = IdMap::with_hasher(IdentityBuildHasher);
        m.insert(100, 1);
        let h = m.find(&100).unwrap();
        for k in 0..50 {
            m.insert(k, k);
        }
        m.remove(&7);
        assert_eq!(h.key(&m), Some(&100));
        *h.value_mut(&mut m).unwrap() += 1;
        assert_eq!(m.get(&100), Some(&2));
        assert_eq!(m.find(&100), Some(h));
    }

    /// Invariant: removal by handle goes through the same backward shift and
    /// rejects stale handles.
    #[test]
    fn remove_handle_and_stale_handle() {
        let mut m: IdMap<&str> = IdMap::with_hasher(IdentityBuildHasher);
        m.insert(1, "a");
        m.insert(21, "b");
        let h = m.find(&1).unwrap();
        assert_eq!(m.remove_handle(h), Some((1, "a")));
        assert_eq!(m.remove_handle(h), None);
        assert_eq!(slot(&m, 21), Some((1, 0)));
        m.insert(41, "c");
        assert!(h.value(&m).is_none(), "reused slot does not alias");
        m.assert_invariants();
    }

    /// Invariant: retain drops rejected entries, keeps order and the index
    /// consistent.
    #[test]
    fn retain_keeps_order() {
        let mut m: RobinHashMap<u64, u64, ConstBuildHasher> =
            RobinHashMap::with_hasher(ConstBuildHasher);
        for k in 0..9 {
            m.insert(k, k * k);
        }
        m.retain(|k, v| {
            *v += 1;
            k % 3 != 0
        });
        let kept: Vec<(u64, u64)> = m.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(kept, vec![(1, 2), (2, 5), (4, 17), (5, 26), (7, 50), (8, 65)]);
        for k in [0, 3, 6] {
            assert!(!m.contains_key(&k));
        }
        m.assert_invariants();
    }

    /// Invariant: with every key colliding, lookups and erasures still resolve
    /// by equality and the structure stays consistent.
    #[test]
    fn full_collision_churn() {
        let mut m: RobinHashMap<u64, u64, ConstBuildHasher> =
            RobinHashMap::with_hasher(ConstBuildHasher);
        for k in 0..25 {
            m.insert(k, k);
            m.assert_invariants();
        }
        for k in (0..25).step_by(2) {
            assert_eq!(m.remove(&k), Some(k));
            m.assert_invariants();
        }
        for k in 0..25 {
            assert_eq!(m.contains_key(&k), k % 2 == 1);
        }
        assert_eq!(m.remove(&0), None, "second erase is a no-op");
        assert_eq!(m.len(), 12);
    }

    #[test]
    fn with_capacity_presizes_index() {
        let m: RobinHashMap<u8, u8> = RobinHashMap::with_capacity(4);
        assert_eq!(m.capacity(), 40);
        let m: RobinHashMap<u8, u8> = RobinHashMap::from([(1, 1), (2, 2), (1, 3)]);
        assert_eq!(m.capacity(), 35);
        assert_eq!(m.len(), 2);
        assert_eq!(m[&1], 1, "literal construction is first-wins");
    }

    #[test]
    fn equality_ignores_order() {
        let a: RobinHashMap<&str, i32> = [("x", 1), ("y", 2)].into_iter().collect();
        let b: RobinHashMap<&str, i32> = [("y", 2), ("x", 1)].into_iter().collect();
        let c: RobinHashMap<&str, i32> = [("y", 2), ("x", 3)].into_iter().collect();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(format!("{a:?}"), r#"{"x": 1, "y": 2}"#);
        assert_eq!(format!("{b:?}"), r#"{"y": 2, "x": 1}"#);
    }

    #[test]
    fn clone_is_independent() {
        let mut a: IdMap<u64> = IdMap::with_hasher(IdentityBuildHasher);
        for k in 0..12 {
            a.insert(k, k);
        }
        let h = a.find(&5).unwrap();
        let mut b = a.clone();
        b.remove(&5);
        b.insert(99, 99);
        assert_eq!(h.value(&a), Some(&5));
        assert!(h.value(&b).is_none());
        assert_eq!(a.len(), 12);
        assert_eq!(b.len(), 12);
        b.assert_invariants();
    }
}
