//! Line format of intermediate files.
//!
//! Each pair is one line: `base64url(key) SP base64url(value) LF`. Keys and
//! values may contain arbitrary bytes (including spaces and newlines), so
//! both are encoded. Encoding is deterministic, which keeps re-executed
//! map tasks byte-for-byte identical.

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use bytes::{BufMut, Bytes, BytesMut};

use crate::KeyValue;

/// Append the encoded form of `kv` to `buf`.
pub fn encode_into(kv: &KeyValue, buf: &mut BytesMut) {
    buf.put_slice(URL_SAFE.encode(&kv.key).as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(URL_SAFE.encode(&kv.value).as_bytes());
    buf.put_u8(b'\n');
}

/// Decode a single line (without its trailing newline).
pub fn decode_line(line: &str) -> Result<KeyValue> {
    let (key, value) = line
        .split_once(' ')
        .ok_or_else(|| anyhow!("malformed intermediate record `{line}`"))?;

    Ok(KeyValue {
        key: Bytes::from(URL_SAFE.decode(key)?),
        value: Bytes::from(URL_SAFE.decode(value)?),
    })
}

/// Decode every record in the contents of an intermediate file.
pub fn decode_all(data: &[u8]) -> Result<Vec<KeyValue>> {
    let text = std::str::from_utf8(data)?;
    text.lines()
        .filter(|line| !line.is_empty())
        .map(decode_line)
        .collect()
}
