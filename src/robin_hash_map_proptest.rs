#![cfg(test)]

// Property tests for RobinHashMap kept inside the crate so they can check the
// probe-index invariants after every operation.

use crate::{Handle, MapError, RobinHashMap};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    GetOrInsert(usize, i32),
    Remove(usize),
    Find(usize),
    At(String),
    Mutate(usize, i32),
    Retain(i32),
    Clear,
    Iterate,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=40).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let at_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            6 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::GetOrInsert(i, v)),
            3 => idx.clone().prop_map(OpI::Remove),
            2 => idx.clone().prop_map(OpI::Find),
            1 => prop_oneof![at_pool.prop_map(|s: String| s), "[a-z]{0,5}".prop_map(|s| s)]
                .prop_map(OpI::At),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => (2..5i32).prop_map(OpI::Retain),
            1 => Just(OpI::Clear),
            1 => Just(OpI::Iterate),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Insertion-ordered model: a std map for values plus a key order vector.
#[derive(Default)]
struct Model {
    values: HashMap<Key, i32>,
    order: Vec<Key>,
}

impl Model {
    fn insert(&mut self, k: Key, v: i32) -> bool {
        if self.values.contains_key(&k) {
            return false;
        }
        self.order.push(k.clone());
        self.values.insert(k, v);
        true
    }

    fn remove(&mut self, k: &Key) -> Option<i32> {
        let v = self.values.remove(k)?;
        self.order.retain(|o| o != k);
        Some(v)
    }
}

fn run_state_machine<S: BuildHasher>(
    mut sut: RobinHashMap<Key, i32, S>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model = Model::default();
    let mut live: HashMap<Key, Handle> = HashMap::new();
    let mut stale: Vec<Handle> = Vec::new();

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(&pool, i);
                let fresh = model.insert(k.clone(), v);
                prop_assert_eq!(sut.insert(k.clone(), v), fresh);
                if fresh {
                    let h = sut.find(&k).expect("inserted key resolves");
                    prop_assert!(live.insert(k, h).is_none());
                }
            }
            OpI::GetOrInsert(i, v) => {
                let k = key_from(&pool, i);
                model.insert(k.clone(), v);
                let got = *sut.get_or_insert_with(k.clone(), || v);
                prop_assert_eq!(Some(&got), model.values.get(&k));
                if let Some(h) = sut.find(&k) {
                    live.insert(k, h);
                }
            }
            OpI::Remove(i) => {
                let k = key_from(&pool, i);
                let expected = model.remove(&k);
                prop_assert_eq!(sut.remove(&k), expected);
                if let Some(h) = live.remove(&k) {
                    stale.push(h);
                }
                prop_assert!(sut.find(&k).is_none());
            }
            OpI::Find(i) => {
                let k = key_from(&pool, i);
                let s = sut.find(&k);
                prop_assert_eq!(s.is_some(), model.values.contains_key(&k));
                if let Some(h) = s {
                    prop_assert_eq!(Some(&h), live.get(&k), "handle is stable");
                    prop_assert_eq!(h.value(&sut), model.values.get(&k));
                }
            }
            OpI::At(s) => {
                let expected = model.values.get(s.as_str()).ok_or(MapError::KeyNotFound);
                prop_assert_eq!(sut.at(s.as_str()), expected);
            }
            OpI::Mutate(i, d) => {
                let k = key_from(&pool, i);
                if let Some(&h) = live.get(&k) {
                    let vr = h.value_mut(&mut sut).expect("live handle resolves");
                    *vr = vr.saturating_add(d);
                    let mv = model.values.get_mut(&k).expect("present in model");
                    *mv = mv.saturating_add(d);
                }
            }
            OpI::Retain(m) => {
                sut.retain(|_, v| v.rem_euclid(m) != 0);
                let doomed: Vec<Key> = model
                    .order
                    .iter()
                    .filter(|k| model.values[*k].rem_euclid(m) == 0)
                    .cloned()
                    .collect();
                for k in doomed {
                    model.remove(&k);
                    if let Some(h) = live.remove(&k) {
                        stale.push(h);
                    }
                }
            }
            OpI::Clear => {
                sut.clear();
                prop_assert_eq!(sut.capacity(), crate::BASE_CAPACITY);
                model = Model::default();
                stale.extend(live.drain().map(|(_, h)| h));
            }
            OpI::Iterate => {
                let s_keys: BTreeSet<_> = sut.keys().cloned().collect();
                let found: BTreeSet<_> = model
                    .order
                    .iter()
                    .filter(|k| sut.find(*k).is_some())
                    .cloned()
                    .collect();
                prop_assert_eq!(s_keys, found, "iteration and lookup agree");
            }
        }

        // Post-conditions after each op
        // 1) Structural invariants of the index and store
        sut.assert_invariants();
        // 2) Iteration follows insertion order with the model's values
        let pairs: Vec<(Key, i32)> = sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
        let expected: Vec<(Key, i32)> = model
            .order
            .iter()
            .map(|k| (k.clone(), model.values[k]))
            .collect();
        prop_assert_eq!(pairs, expected);
        // 3) Stale handles never resolve
        for &h in &stale {
            prop_assert!(h.value(&sut).is_none());
        }
        // 4) Size parity
        prop_assert_eq!(sut.len(), model.values.len());
        prop_assert_eq!(sut.is_empty(), model.values.is_empty());
    }
    Ok(())
}

// Property: State-machine equivalence against an insertion-ordered model.
// Invariants exercised across random operation sequences:
// - Inserting a present key is a no-op and keeps the first value.
// - `find`/`at` parity with the model; handles stay stable for live entries.
// - `remove` returns the model's value and invalidates the handle.
// - Iteration yields model pairs in insertion order across rehashes.
// - Probe distances, Robin Hood ordering and the store/index bijection hold
//   after every operation.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_state_machine(RobinHashMap::new(), pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Few distinct hashes: long clusters that overlap, wrap and get displaced.
#[derive(Clone, Default)]
struct NarrowBuildHasher;
struct NarrowHasher(u64);
impl BuildHasher for NarrowBuildHasher {
    type Hasher = NarrowHasher;
    fn build_hasher(&self) -> Self::Hasher {
        NarrowHasher(0)
    }
}
impl Hasher for NarrowHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = self.0.wrapping_mul(31).wrapping_add(b as u64);
        }
    }
    fn finish(&self) -> u64 {
        // Homes cluster on the last slots of the base table and wrap.
        17 + self.0 % 4
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_state_machine(RobinHashMap::with_hasher(ConstBuildHasher), pool, ops)?;
    }

    #[test]
    fn prop_state_machine_with_wrapping_clusters((pool, ops) in arb_scenario()) {
        run_state_machine(RobinHashMap::with_hasher(NarrowBuildHasher), pool, ops)?;
    }
}

// Property: a key hashing the same as many others is found by equality, and
// its absence is detected, regardless of where it sits in the cluster.
proptest! {
    #[test]
    fn prop_lookup_in_shared_cluster(n in 1usize..60, probe in 0usize..80) {
        let mut m = RobinHashMap::with_hasher(ConstBuildHasher);
        for i in 0..n {
            m.insert(Key(format!("k{i}")), i);
        }
        let q = format!("k{probe}");
        prop_assert_eq!(m.get(q.as_str()).copied(), (probe < n).then_some(probe));
        m.assert_invariants();
    }
}
