use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use std::fmt::{self, Formatter};
use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;

use crate::RobinHashMap;

// Upper bound on what an untrusted length prefix may preallocate.
const MAX_PREALLOC_BYTES: usize = 1024 * 1024;

fn cautious<K, V>(hint: usize) -> usize {
    hint.min(MAX_PREALLOC_BYTES / std::mem::size_of::<(K, V)>().max(1))
}

// Serialized as a plain map in insertion order.
impl<K, V, S> Serialize for RobinHashMap<K, V, S>
where
    K: Serialize,
    V: Serialize,
{
    fn serialize<Sr>(&self, serializer: Sr) -> Result<Sr::Ok, Sr::Error>
    where
        Sr: Serializer,
    {
        serializer.collect_map(self)
    }
}

impl<'de, K, V, S> Deserialize<'de> for RobinHashMap<K, V, S>
where
    K: Deserialize<'de> + Hash + Eq,
    V: Deserialize<'de>,
    S: Default + BuildHasher,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(MapVisitor::new())
    }
}

struct MapVisitor<K, V, S> {
    _marker: PhantomData<RobinHashMap<K, V, S>>,
}

impl<K, V, S> MapVisitor<K, V, S> {
    fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<'de, K, V, S> Visitor<'de> for MapVisitor<K, V, S>
where
    K: Deserialize<'de> + Hash + Eq,
    V: Deserialize<'de>,
    S: Default + BuildHasher,
{
    type Value = RobinHashMap<K, V, S>;

    fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "a map")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let mut values = match access.size_hint() {
            Some(size) => {
                RobinHashMap::with_capacity_and_hasher(cautious::<K, V>(size), S::default())
            }
            None => RobinHashMap::default(),
        };

        // Duplicate keys keep the first value, like `insert`.
        while let Some((key, value)) = access.next_entry()? {
            values.insert(key, value);
        }

        Ok(values)
    }
}
