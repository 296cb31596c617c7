//! EntryStore: owns every entry, keeps insertion order, hands out stable handles.
//!
//! Nodes live in a dense vector in insertion order. A generational `SlotMap`
//! maps each handle to its node's position, so append is O(1) and removal
//! only clears the node's place, leaving a hole. Holes are squeezed out once
//! they outnumber live entries, which keeps removal amortized O(1) and
//! iteration proportional to `len`. A handle stays valid until its own entry
//! is removed, and a stale handle never resolves even if the slot is reused.

use core::iter::FusedIterator;
use slotmap::{DefaultKey, SlotMap};

// Holes tolerated on top of `len` before compacting, so small maps that
// churn a few entries never compact.
const COMPACT_SLACK: usize = 8;

/// Stable reference to one entry of a [`RobinHashMap`](crate::RobinHashMap).
///
/// Obtained from [`RobinHashMap::find`](crate::RobinHashMap::find). Unrelated
/// inserts, removals and rehashes never invalidate it.
///
/// A handle is only meaningful on the map that issued it, or on clones of
/// that map. It carries no owner, so resolving it against an unrelated map
/// may yield that map's entry in the same slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(DefaultKey);

impl Handle {
    pub(crate) fn raw_handle(&self) -> DefaultKey {
        self.0
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    // Cached so the probe index can be rebuilt without calling `K: Hash`.
    pub(crate) hash: u64,
    slot: DefaultKey,
}

#[derive(Clone, Debug)]
pub(crate) struct EntryStore<K, V> {
    // Handle -> index into `order`.
    positions: SlotMap<DefaultKey, usize>,
    // Insertion order; `None` marks a removed entry until the next compaction.
    order: Vec<Option<Node<K, V>>>,
}

impl<K, V> EntryStore<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            positions: SlotMap::with_key(),
            order: Vec::new(),
        }
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: SlotMap::with_capacity_and_key(capacity),
            order: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.positions.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Append a new entry at the back of the insertion order.
    pub(crate) fn push_back(&mut self, key: K, value: V, hash: u64) -> Handle {
        let slot = self.positions.insert(self.order.len());
        self.order.push(Some(Node {
            key,
            value,
            hash,
            slot,
        }));
        Handle(slot)
    }

    /// Take the entry out of the order; `None` when the handle is stale.
    pub(crate) fn remove(&mut self, handle: Handle) -> Option<(K, V)> {
        let pos = self.positions.remove(handle.raw_handle())?;
        let node = self.order.get_mut(pos)?.take()?;
        while let Some(None) = self.order.last() {
            self.order.pop();
        }
        if self.order.len() > 2 * self.len() + COMPACT_SLACK {
            self.compact();
        }
        Some((node.key, node.value))
    }

    // Drop the holes and repoint every handle at its node's new position.
    fn compact(&mut self) {
        self.order.retain(Option::is_some);
        for (pos, node) in self.order.iter().enumerate() {
            if let Some(p) = node.as_ref().and_then(|n| self.positions.get_mut(n.slot)) {
                *p = pos;
            }
        }
    }

    pub(crate) fn get(&self, handle: Handle) -> Option<&Node<K, V>> {
        let pos = *self.positions.get(handle.raw_handle())?;
        self.order.get(pos)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, handle: Handle) -> Option<&mut Node<K, V>> {
        let pos = *self.positions.get(handle.raw_handle())?;
        self.order.get_mut(pos)?.as_mut()
    }

    pub(crate) fn clear(&mut self) {
        self.positions.clear();
        self.order.clear();
    }

    pub(crate) fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.order.iter(),
            remaining: self.len(),
        }
    }

    pub(crate) fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            remaining: self.len(),
            inner: self.order.iter_mut(),
        }
    }
}

impl<K, V> IntoIterator for EntryStore<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> IntoIter<K, V> {
        IntoIter {
            remaining: self.len(),
            inner: self.order.into_iter(),
        }
    }
}

/// Insertion-order walk over nodes, with their handles.
pub(crate) struct Iter<'a, K, V> {
    inner: core::slice::Iter<'a, Option<Node<K, V>>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (Handle, &'a Node<K, V>);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let node = self.inner.find_map(Option::as_ref)?;
        self.remaining -= 1;
        Some((Handle(node.slot), node))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            remaining: self.remaining,
        }
    }
}

/// Insertion-order walk with mutable access to values.
pub(crate) struct IterMut<'a, K, V> {
    inner: core::slice::IterMut<'a, Option<Node<K, V>>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (Handle, &'a K, &'a mut V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let Node {
            key, value, slot, ..
        } = self.inner.find_map(Option::as_mut)?;
        self.remaining -= 1;
        Some((Handle(*slot), &*key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}
impl<K, V> FusedIterator for IterMut<'_, K, V> {}

/// Owning insertion-order walk.
pub(crate) struct IntoIter<K, V> {
    inner: std::vec::IntoIter<Option<Node<K, V>>>,
    remaining: usize,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        let node = self.inner.find_map(|n| n)?;
        self.remaining -= 1;
        Some((node.key, node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}
impl<K, V> FusedIterator for IntoIter<K, V> {}
