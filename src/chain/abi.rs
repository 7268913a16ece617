//! Minimal Solidity ABI encoding for the handful of view calls gating needs.

use super::{ChainError, ChainResult};
use crate::crypto::keccak256;
use crate::gating::{Address, Amount, TokenId};

const WORD: usize = 32;

/// Call argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(u128),
    FixedBytes([u8; 32]),
    Bytes(Vec<u8>),
}

impl From<TokenId> for Token {
    fn from(id: TokenId) -> Self {
        Token::FixedBytes(*id.as_bytes())
    }
}

/// First four bytes of the Keccak-256 of a function signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn address_word(address: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

fn uint_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(WORD) * WORD
}

/// Encode `selector(signature) ++ args`
pub fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let mut head = Vec::with_capacity(args.len() * WORD);
    let mut tail = Vec::new();
    let head_len = args.len() * WORD;

    for arg in args {
        match arg {
            Token::Address(address) => head.extend_from_slice(&address_word(address)),
            Token::Uint(value) => head.extend_from_slice(&uint_word(*value)),
            Token::FixedBytes(bytes) => head.extend_from_slice(bytes),
            Token::Bytes(bytes) => {
                head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
                tail.extend_from_slice(&uint_word(bytes.len() as u128));
                let start = tail.len();
                tail.extend_from_slice(bytes);
                tail.resize(start + padded_len(bytes.len()), 0);
            }
        }
    }

    let mut out = Vec::with_capacity(4 + head.len() + tail.len());
    out.extend_from_slice(&selector(signature));
    out.extend_from_slice(&head);
    out.extend_from_slice(&tail);
    out
}

fn word(data: &[u8], index: usize) -> ChainResult<&[u8]> {
    let start = index * WORD;
    data.get(start..start + WORD)
        .ok_or_else(|| ChainError::Decode(format!("return data too short for word {}", index)))
}

fn word_as_usize(word: &[u8]) -> ChainResult<usize> {
    if word[..24].iter().any(|b| *b != 0) {
        return Err(ChainError::Decode("offset out of range".to_string()));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(buf))
        .map_err(|_| ChainError::Decode("offset out of range".to_string()))
}

/// Decode a `uint256`, saturating values above 128 bits
pub fn decode_uint(data: &[u8]) -> ChainResult<Amount> {
    let w = word(data, 0)?;
    if w[..16].iter().any(|b| *b != 0) {
        return Ok(Amount(u128::MAX));
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&w[16..]);
    Ok(Amount(u128::from_be_bytes(buf)))
}

pub fn decode_bool(data: &[u8]) -> ChainResult<bool> {
    let w = word(data, 0)?;
    Ok(w.iter().any(|b| *b != 0))
}

pub fn decode_address(data: &[u8]) -> ChainResult<Address> {
    let w = word(data, 0)?;
    let mut out = [0u8; 20];
    out.copy_from_slice(&w[12..]);
    Ok(Address::from_bytes(out))
}

/// Left-aligned `bytes4` return value
pub fn decode_bytes4(data: &[u8]) -> ChainResult<[u8; 4]> {
    let w = word(data, 0)?;
    Ok([w[0], w[1], w[2], w[3]])
}

fn slice_at<'a>(data: &'a [u8], start: usize, len: usize, what: &str) -> ChainResult<&'a [u8]> {
    let end = start
        .checked_add(len)
        .ok_or_else(|| ChainError::Decode(format!("{} out of range", what)))?;
    data.get(start..end)
        .ok_or_else(|| ChainError::Decode(format!("{} out of range", what)))
}

/// Single dynamic `string` return value
pub fn decode_string(data: &[u8]) -> ChainResult<String> {
    let offset = word_as_usize(word(data, 0)?)?;
    let len = word_as_usize(slice_at(data, offset, WORD, "string length")?)?;
    let start = offset
        .checked_add(WORD)
        .ok_or_else(|| ChainError::Decode("string data out of range".to_string()))?;
    let bytes = slice_at(data, start, len, "string data")?;
    String::from_utf8(bytes.to_vec()).map_err(|e| ChainError::Decode(e.to_string()))
}
