//! A MapReduce-compatible application that computes the
//! degree of each vertex in a graph, given a list of edges.
//!
//! Each input line is an edge: two whitespace-separated vertex numbers.
//! Blank lines are skipped.

use anyhow::{anyhow, Result};
use bytes::Bytes;

use common::utils::string_from_bytes;
use common::{KeyValue, MapOutput};

fn parse_line(line: &str) -> Result<(u64, u64)> {
    let mut iter = line.split_whitespace().take(2);
    let a = iter
        .next()
        .ok_or_else(|| anyhow!("Invalid edge `{line}`"))?
        .parse()?;
    let b = iter
        .next()
        .ok_or_else(|| anyhow!("Invalid edge `{line}`"))?
        .parse()?;
    Ok((a, b))
}

pub fn map(kv: KeyValue, _aux: Bytes) -> MapOutput {
    let s = string_from_bytes(kv.value)?;
    let edges = s
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect::<Result<Vec<_>>>()?;

    let iter = edges.into_iter().flat_map(move |(a, b)| {
        [
            Ok(KeyValue::new(a.to_string(), "1")),
            Ok(KeyValue::new(b.to_string(), "1")),
        ]
    });
    Ok(Box::new(iter))
}

pub fn reduce(
    _key: Bytes,
    values: Box<dyn Iterator<Item = Bytes> + '_>,
    _aux: Bytes,
) -> Result<Bytes> {
    let mut degree = 0u64;

    for value in values {
        degree += string_from_bytes(value)?.parse::<u64>()?;
    }

    Ok(Bytes::from(degree.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_both_endpoints() {
        let kv = KeyValue::new("edges", "1 2\n\n2 3\n");
        let keys: Vec<_> = map(kv, Bytes::new())
            .unwrap()
            .map(|kv| kv.unwrap().key())
            .collect();
        assert_eq!(keys, ["1", "2", "2", "3"].map(Bytes::from));
    }

    #[test]
    fn malformed_edge_fails_the_map() {
        assert!(map(KeyValue::new("edges", "1\n"), Bytes::new()).is_err());
    }
}
