//! Primitive on-chain value types: addresses, base-unit amounts and token ids.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::{GatingError, GatingResult};
use crate::crypto::keccak256;

/// 20-byte account or contract address
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Derive the address of an uncompressed secp256k1 public key
    /// (64 bytes, without the 0x04 prefix).
    pub fn from_public_key(uncompressed: &[u8]) -> GatingResult<Self> {
        if uncompressed.len() != 64 {
            return Err(GatingError::MalformedSignature);
        }
        let hash = keccak256(uncompressed);
        let mut out = [0u8; 20];
        out.copy_from_slice(&hash[12..]);
        Ok(Self(out))
    }

    /// Lowercase hex without checksum, `0x`-prefixed
    pub fn to_lower_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// EIP-55 mixed-case checksum encoding
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl FromStr for Address {
    type Err = GatingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| GatingError::InvalidAddress(s.to_string()))?;
        if digits.len() != 40 {
            return Err(GatingError::InvalidAddress(s.to_string()));
        }
        let mut out = [0u8; 20];
        hex::decode_to_slice(digits, &mut out)
            .map_err(|_| GatingError::InvalidAddress(s.to_string()))?;
        Ok(Self(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Unsigned amount in base units (wei, token base units)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(pub u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Render with a decimal point, trimming trailing zeros
    pub fn format_units(&self, decimals: u32) -> String {
        if decimals == 0 {
            return self.0.to_string();
        }
        let scale = 10u128.pow(decimals);
        let whole = self.0 / scale;
        let frac = self.0 % scale;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{:0width$}", frac, width = decimals as usize);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }
}

impl FromStr for Amount {
    type Err = GatingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u128>()
            .map(Amount)
            .map_err(|_| GatingError::InvalidAmount(s.to_string()))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl<'de> Visitor<'de> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a non-negative integer or decimal string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount(u128::from(v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                u128::try_from(v)
                    .map(Amount)
                    .map_err(|_| E::custom("amount must not be negative"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// 32-byte token identifier (uint256 for ERC-721/1155, bytes32 for LSP8)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenId([u8; 32]);

impl TokenId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_u128(value: u128) -> Self {
        let mut out = [0u8; 32];
        out[16..].copy_from_slice(&value.to_be_bytes());
        Self(out)
    }

    fn parse_decimal(s: &str) -> Option<Self> {
        // u256 from decimal via two u128 limbs
        let mut limbs = [0u128; 2]; // [high, low]
        for c in s.chars() {
            let digit = c.to_digit(10)? as u128;
            let low = limbs[1];
            let high = limbs[0];
            // low * 10 + digit, carrying into high
            let low_hi = (low >> 64) * 10;
            let low_lo = (low & u64::MAX as u128) * 10 + digit;
            let carry_mid = low_lo >> 64;
            let mid = low_hi + carry_mid;
            let new_low = ((mid & u64::MAX as u128) << 64) | (low_lo & u64::MAX as u128);
            let carry = mid >> 64;
            let new_high = high.checked_mul(10)?.checked_add(carry)?;
            limbs = [new_high, new_low];
        }
        let mut out = [0u8; 32];
        out[..16].copy_from_slice(&limbs[0].to_be_bytes());
        out[16..].copy_from_slice(&limbs[1].to_be_bytes());
        Some(Self(out))
    }
}

impl FromStr for TokenId {
    type Err = GatingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(GatingError::InvalidAmount(s.to_string()));
        }
        if let Some(digits) = trimmed.strip_prefix("0x") {
            if digits.is_empty() || digits.len() > 64 {
                return Err(GatingError::InvalidAmount(s.to_string()));
            }
            let padded = format!("{:0>64}", digits);
            let mut out = [0u8; 32];
            hex::decode_to_slice(padded, &mut out)
                .map_err(|_| GatingError::InvalidAmount(s.to_string()))?;
            return Ok(Self(out));
        }
        Self::parse_decimal(trimmed).ok_or_else(|| GatingError::InvalidAmount(s.to_string()))
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0[..16].iter().all(|b| *b == 0) {
            let mut low = [0u8; 16];
            low.copy_from_slice(&self.0[16..]);
            write!(f, "{}", u128::from_be_bytes(low))
        } else {
            write!(f, "0x{}", hex::encode(self.0))
        }
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({})", self)
    }
}

impl Serialize for TokenId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TokenIdVisitor;

        impl<'de> Visitor<'de> for TokenIdVisitor {
            type Value = TokenId;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a token id as integer, decimal string or 0x hex string")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<TokenId, E> {
                Ok(TokenId::from_u128(u128::from(v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<TokenId, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(TokenIdVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_encoding() {
        // EIP-55 reference vectors
        let addr: Address = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap();
        assert_eq!(
            addr.to_checksum(),
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
        let addr: Address = "0xFB6916095CA1DF60BB79CE92CE3EA74C37C5D359".parse().unwrap();
        assert_eq!(
            addr.to_checksum(),
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359"
        );
    }

    #[test]
    fn test_address_rejects_bad_input() {
        assert!("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse::<Address>().is_err());
        assert!("0x5aaeb6".parse::<Address>().is_err());
        assert!("0xzzaeb6053f3e94c9b9a09f33669435e7ef1beaed"
            .parse::<Address>()
            .is_err());
    }

    #[test]
    fn test_amount_from_json_string_and_number() {
        let a: Amount = serde_json::from_str("\"1500000000000000000\"").unwrap();
        assert_eq!(a, Amount(1_500_000_000_000_000_000));
        let b: Amount = serde_json::from_str("42").unwrap();
        assert_eq!(b, Amount(42));
        assert!(serde_json::from_str::<Amount>("-1").is_err());
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"1500000000000000000\"");
    }

    #[test]
    fn test_format_units() {
        assert_eq!(Amount(1_500_000_000_000_000_000).format_units(18), "1.5");
        assert_eq!(Amount(2_000_000_000_000_000_000).format_units(18), "2");
        assert_eq!(Amount(1).format_units(18), "0.000000000000000001");
        assert_eq!(Amount(7).format_units(0), "7");
    }

    #[test]
    fn test_token_id_parsing() {
        assert_eq!("42".parse::<TokenId>().unwrap(), TokenId::from_u128(42));
        assert_eq!("0x2a".parse::<TokenId>().unwrap(), TokenId::from_u128(42));
        assert_eq!(TokenId::from_u128(42).to_string(), "42");

        let big: TokenId =
            "0x0100000000000000000000000000000000000000000000000000000000000000"
                .parse()
                .unwrap();
        assert_eq!(big.as_bytes()[0], 1);

        // 2^128 = 340282366920938463463374607431768211456
        let wide: TokenId = "340282366920938463463374607431768211456".parse().unwrap();
        assert_eq!(wide.as_bytes()[15], 1);
        assert!(wide.as_bytes()[16..].iter().all(|b| *b == 0));

        assert!("abc".parse::<TokenId>().is_err());
    }
}
