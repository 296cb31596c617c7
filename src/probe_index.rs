//! ProbeIndex: open-addressing slot array with Robin Hood displacement.
//!
//! Slots never own entries; they hold a [`Handle`] into the entry store and
//! the probe distance from the entry's home slot (`hash % capacity`). The
//! array keeps the Robin Hood ordering: walking forward from any home slot,
//! distances never drop by more than the step taken, so a lookup may stop as
//! soon as it meets an entry that sits closer to its home than the probe has
//! travelled. Removal uses backward shifting, so there are no tombstones.

use crate::entry_store::Handle;
use core::mem;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Slot {
    Empty,
    Occupied { handle: Handle, distance: usize },
}

#[derive(Clone, Debug)]
pub(crate) struct ProbeIndex {
    slots: Box<[Slot]>,
}

impl ProbeIndex {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "probe index needs at least one slot");
        Self {
            slots: vec![Slot::Empty; capacity].into_boxed_slice(),
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub(crate) fn slots(&self) -> &[Slot] {
        &self.slots
    }

    #[inline]
    pub(crate) fn home(&self, hash: u64) -> usize {
        (hash % self.slots.len() as u64) as usize
    }

    #[inline]
    fn next(&self, pos: usize) -> usize {
        let n = pos + 1;
        if n == self.slots.len() {
            0
        } else {
            n
        }
    }

    /// Find the slot whose handle satisfies `is_match`, probing from the home
    /// slot of `hash`. Returns the slot position and its handle.
    pub(crate) fn locate<F>(&self, hash: u64, mut is_match: F) -> Option<(usize, Handle)>
    where
        F: FnMut(Handle) -> bool,
    {
        let mut pos = self.home(hash);
        for steps in 0..self.slots.len() {
            match self.slots[pos] {
                Slot::Empty => return None,
                // A richer resident means the key would have displaced it.
                Slot::Occupied { distance, .. } if distance < steps => return None,
                Slot::Occupied { handle, .. } => {
                    if is_match(handle) {
                        return Some((pos, handle));
                    }
                }
            }
            pos = self.next(pos);
        }
        None
    }

    /// Insert `handle` for an entry hashing to `hash`, displacing richer
    /// residents along the way. The caller guarantees the key is absent and
    /// that at least one slot is empty.
    pub(crate) fn place(&mut self, handle: Handle, hash: u64) {
        let mut carried = (handle, 0usize);
        let mut pos = self.home(hash);
        for _ in 0..self.slots.len() {
            let slot = &mut self.slots[pos];
            match slot {
                Slot::Empty => {
                    *slot = Slot::Occupied {
                        handle: carried.0,
                        distance: carried.1,
                    };
                    return;
                }
                Slot::Occupied { handle, distance } => {
                    if *distance < carried.1 {
                        mem::swap(handle, &mut carried.0);
                        mem::swap(distance, &mut carried.1);
                    }
                }
            }
            carried.1 += 1;
            pos = self.next(pos);
        }
        unreachable!("probe index is full; growth policy must keep a free slot");
    }

    /// Empty the slot at `pos` and close the gap by shifting the following
    /// displaced run back by one. Returns the handle that occupied `pos`.
    pub(crate) fn remove_at(&mut self, pos: usize) -> Option<Handle> {
        let Slot::Occupied { handle, .. } = mem::replace(&mut self.slots[pos], Slot::Empty) else {
            return None;
        };
        let mut hole = pos;
        let mut next = self.next(pos);
        while let Slot::Occupied { handle, distance } = self.slots[next] {
            if distance == 0 {
                break;
            }
            self.slots[hole] = Slot::Occupied {
                handle,
                distance: distance - 1,
            };
            self.slots[next] = Slot::Empty;
            hole = next;
            next = self.next(next);
        }
        Some(handle)
    }

    /// Occupied slots in slot order.
    #[cfg(test)]
    pub(crate) fn occupied(&self) -> impl Iterator<Item = (usize, Handle, usize)> + '_ {
        self.slots.iter().enumerate().filter_map(|(pos, slot)| match *slot {
            Slot::Occupied { handle, distance } => Some((pos, handle, distance)),
            Slot::Empty => None,
        })
    }
}
