//! Just enough Solidity ABI for the four calls the keeper makes.

use sha3::{Digest, Keccak256};

use super::rpc::RpcError;

pub const LAST_DRAW_TIMESTAMP: &str = "lastDrawTimestamp()";
pub const INTERVAL: &str = "interval()";
pub const CHECK_UPKEEP: &str = "checkUpkeep(bytes)";
pub const PERFORM_UPKEEP: &str = "performUpkeep(bytes)";

const WORD: usize = 32;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// First four bytes of the keccak hash of a canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Calldata for a function without arguments.
pub fn encode_no_args(signature: &str) -> Vec<u8> {
    selector(signature).to_vec()
}

/// Calldata for a function taking one empty `bytes` argument.
pub fn encode_empty_bytes_arg(signature: &str) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 2 * WORD);
    data.extend_from_slice(&selector(signature));
    // head: offset of the dynamic argument
    data.extend_from_slice(&uint_word(WORD as u64));
    // tail: length zero, no payload
    data.extend_from_slice(&uint_word(0));
    data
}

fn uint_word(value: u64) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&value.to_be_bytes());
    word
}

pub fn format_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn parse_hex_prefixed(input: &str) -> Result<Vec<u8>, RpcError> {
    let raw = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    hex::decode(raw).map_err(|e| RpcError::Decode(format!("invalid hex: {e}")))
}

fn word_at(data: &[u8], index: usize) -> Result<&[u8], RpcError> {
    let start = index * WORD;
    data.get(start..start + WORD).ok_or_else(|| {
        RpcError::Decode(format!(
            "return data too short: {} bytes, need word {index}",
            data.len()
        ))
    })
}

/// Decode return word `index` as a `uint256` that must fit in `u64`.
pub fn decode_u64_word(data: &[u8], index: usize) -> Result<u64, RpcError> {
    let word = word_at(data, index)?;
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(RpcError::Decode(format!(
            "uint256 value 0x{} does not fit in u64",
            hex::encode(word)
        )));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(buf))
}

/// Decode return word `index` as a strict `bool` (0 or 1).
pub fn decode_bool_word(data: &[u8], index: usize) -> Result<bool, RpcError> {
    match decode_u64_word(data, index) {
        Ok(0) => Ok(false),
        Ok(1) => Ok(true),
        Ok(other) => Err(RpcError::Decode(format!("invalid bool word {other}"))),
        Err(e) => Err(e),
    }
}
