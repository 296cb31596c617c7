//! robin-hashmap: a single-threaded, insertion-ordered hash map with a Robin
//! Hood open-addressing index and stable entry handles.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep the probing algorithm and the ownership of entries in
//!   separate layers so each can be reasoned about on its own.
//! - Layers:
//!   - EntryStore<K, V>: owns every `(key, value, hash)` node in a dense
//!     vector kept in insertion order; a generational slot map resolves
//!     handles to positions. O(1) append, amortized O(1) removal; handles
//!     stay valid until their own entry is removed.
//!   - ProbeIndex: fixed-size slot array of `(Handle, distance)` pairs.
//!     Lookup, Robin Hood insertion and backward-shift deletion happen
//!     entirely inside it; it never owns or touches entries.
//!   - RobinHashMap<K, V, S>: public API. Hashes keys with `S`, resolves
//!     them through the index, mutates both layers together and grows the
//!     index when the load factor passes one half.
//!
//! Constraints
//! - Single-threaded; no interior mutability, so `&mut self` serializes
//!   every mutation.
//! - Iteration order is insertion order and never depends on capacity.
//! - Inserting a present key is a no-op: the old value is kept.
//! - The index starts at 20 slots, grows to `5 * len + 20` and only
//!   shrinks on `clear`.
//!
//! Hasher and rehashing invariants
//! - Each node stores its precomputed `u64` hash and the index always uses
//!   the stored hash; `K: Hash` is never invoked after insertion. Growth
//!   builds the new index completely before swapping it in.
//!
//! Robin Hood invariants
//! - A slot's distance equals its offset from `hash % capacity`.
//! - Walking forward from a home slot, a displaced entry is never preceded
//!   by an empty slot, and distance rises by at most one per step. Lookup
//!   stops at the first resident that sits closer to home than the probe
//!   has travelled.
//!
//! Cargo features
//! - `serde`: `Serialize`/`Deserialize` as a map, in insertion order.
//! - `tracing`: trace events for index growth and `clear`.

mod entry_store;
mod error;
mod probe_index;
pub mod robin_hash_map;
mod robin_hash_map_proptest;
#[cfg(feature = "serde")]
mod serde_impls;
mod trace;

// Public surface
pub use entry_store::Handle;
pub use error::MapError;
pub use robin_hash_map::{RobinHashMap, BASE_CAPACITY};
