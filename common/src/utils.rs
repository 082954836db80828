use anyhow::Result;
use bytes::Bytes;

/// Interpret `bytes` as UTF-8, failing on invalid sequences.
pub fn string_from_bytes(bytes: Bytes) -> Result<String> {
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// Separates auxiliary arguments in the blob handed to user functions.
/// Cannot occur inside a command line argument.
pub const AUX_SEPARATOR: &str = "\0";

/// Join auxiliary arguments into the single blob handed to user functions.
pub fn aux_bytes(aux: &[String]) -> Bytes {
    Bytes::from(aux.join(AUX_SEPARATOR))
}

/// Split an auxiliary blob back into the arguments it was built from.
pub fn aux_args(aux: &[u8]) -> Result<Vec<String>> {
    let aux = std::str::from_utf8(aux)?;
    if aux.is_empty() {
        return Ok(vec![]);
    }
    Ok(aux.split(AUX_SEPARATOR).map(str::to_string).collect())
}
