//! Users specify a map and a reduce function, and a coordinator hands the
//! resulting map and reduce tasks out to workers. Intermediate and final
//! data is kept on the local filesystem, named by the conventions in
//! [`store`].

use std::fmt;
use std::fmt::Formatter;
use std::hash::Hasher;

use bytes::Bytes;

pub mod codec;
pub mod error;
pub mod rpc;
pub mod source;
pub mod store;
pub mod task;
pub mod utils;

pub use error::Error;

/////////////////////////////////////////////////////////////////////////////
// MapReduce application types
/////////////////////////////////////////////////////////////////////////////

/// The output of an application map function.
///
/// There are 2 layers of [`anyhow::Result`]s here. The outer layer
/// accounts for errors that arise while creating the iterator.
/// The inner layer accounts for errors that occur during iteration.
///
/// This accomodates both batch (all keys emitted at once) and lazy
/// (keys only emitted when the iterator is consumed) map operations.
pub type MapOutput = anyhow::Result<Box<dyn Iterator<Item = anyhow::Result<KeyValue>>>>;

/// A map function takes a key-value pair and auxiliary arguments.
///
/// The key is the name of the input file and the value its contents.
/// It returns an iterator that yields new key-value pairs. The function
/// must be deterministic: a map task may run more than once.
pub type MapFn = fn(kv: KeyValue, aux: Bytes) -> MapOutput;

/// A reduce function takes in a key, an iterator over every value emitted
/// for that key, and an auxiliary argument. It returns an
/// [`anyhow::Result`] containing a single output value.
pub type ReduceFn = fn(
    key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    aux: Bytes,
) -> anyhow::Result<Bytes>;

/// A map reduce application.
#[derive(Copy, Clone)]
pub struct Workload {
    pub map_fn: MapFn,
    pub reduce_fn: ReduceFn,
}

impl fmt::Debug for Workload {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workload").finish_non_exhaustive()
    }
}

/////////////////////////////////////////////////////////////////////////////
// Key-value pairs
/////////////////////////////////////////////////////////////////////////////

/// A single key-value pair.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct KeyValue {
    /// The key.
    pub key: Bytes,

    /// The value.
    pub value: Bytes,
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            String::from_utf8_lossy(&self.key),
            String::from_utf8_lossy(&self.value)
        )
    }
}

impl KeyValue {
    /// Construct a new key-value pair from the given key and value.
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Get the key of this key-value pair.
    ///
    /// This method is cheap, since [`Bytes`] are cheaply cloneable.
    #[inline]
    pub fn key(&self) -> Bytes {
        self.key.clone()
    }

    /// Consumes the key-value pair and returns the value.
    #[inline]
    pub fn into_value(self) -> Bytes {
        self.value
    }
}

/// Hashes an intermediate key. Compute a reduce bucket for a given key
/// by calculating `ihash(key) % n_reduce`.
///
/// Must stay stable across processes and platforms, so the standard
/// library's randomly seeded hasher is not an option.
pub fn ihash(key: &[u8]) -> u32 {
    let mut hasher = fnv::FnvHasher::with_key(0);
    hasher.write(key);
    (hasher.finish() & 0x7fff_ffff) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ihash_is_stable() {
        assert_eq!(ihash(b"the"), ihash(b"the"));
        assert_ne!(ihash(b"the"), ihash(b"cat"));
        assert!(ihash(b"anything") <= 0x7fff_ffff);
    }

    #[test]
    fn key_value_display() {
        let kv = KeyValue::new("sat", "2");
        assert_eq!(kv.to_string(), "sat 2");
        assert_eq!(kv.key(), Bytes::from("sat"));
    }
}
