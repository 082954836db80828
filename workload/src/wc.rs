//! Word count: how often each whitespace-separated word occurs.

use anyhow::Result;
use bytes::Bytes;

use common::utils::string_from_bytes;
use common::{KeyValue, MapOutput};

pub fn map(kv: KeyValue, _aux: Bytes) -> MapOutput {
    let text = string_from_bytes(kv.value)?;
    let words: Vec<_> = text
        .split_whitespace()
        .map(|word| Ok(KeyValue::new(word.to_string(), "1")))
        .collect();
    Ok(Box::new(words.into_iter()))
}

pub fn reduce(
    _key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> Result<Bytes> {
    let mut count = 0u64;
    for value in values {
        count += string_from_bytes(value)?.parse::<u64>()?;
    }
    Ok(Bytes::from(count.to_string()))
}
