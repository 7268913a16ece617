//! ENS name hashing (EIP-137) and reverse-record names.

use crate::crypto::keccak256;
use crate::gating::ethereum::normalize_name;
use crate::gating::Address;

/// Mainnet ENS registry
pub const DEFAULT_REGISTRY: &str = "0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e";

/// EIP-137 namehash of a normalized name
pub fn namehash(name: &str) -> [u8; 32] {
    let normalized = normalize_name(name);
    let mut node = [0u8; 32];
    if normalized.is_empty() {
        return node;
    }
    for label in normalized.rsplit('.') {
        let label_hash = keccak256(label.as_bytes());
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(&node);
        buf[32..].copy_from_slice(&label_hash);
        node = keccak256(&buf);
    }
    node
}

/// `<hex address>.addr.reverse`
pub fn reverse_name(account: &Address) -> String {
    format!("{}.addr.reverse", hex::encode(account.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namehash_vectors() {
        assert_eq!(namehash(""), [0u8; 32]);
        assert_eq!(
            hex::encode(namehash("eth")),
            "93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae"
        );
        assert_eq!(
            hex::encode(namehash("foo.eth")),
            "de9b09fd7c5f901e23a3f19fecc54828e9c848539801e86591bd9801b019f84f"
        );
    }

    #[test]
    fn test_namehash_is_case_insensitive() {
        assert_eq!(namehash("Foo.ETH"), namehash("foo.eth"));
    }

    #[test]
    fn test_reverse_name() {
        let account = Address::from_bytes([0xab; 20]);
        assert_eq!(
            reverse_name(&account),
            format!("{}.addr.reverse", "ab".repeat(20))
        );
    }
}
