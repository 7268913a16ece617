//! EIP-191 personal-message signatures.
//!
//! Externally owned accounts are checked by secp256k1 public-key recovery.
//! Contract accounts (Universal Profiles, smart wallets) are checked by
//! calling ERC-1271 `isValidSignature` on the claimed address.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use serde::Serialize;
use tracing::debug;

use crate::chain::{Chain, SnapshotCollector};
use crate::crypto::keccak256;
use crate::gating::{Address, GatingError, GatingResult};

/// `r || s || v`
pub const SIGNATURE_LEN: usize = 65;

/// Keccak-256 of `"\x19Ethereum Signed Message:\n" || len || message`
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", message.len());
    let mut data = Vec::with_capacity(prefix.len() + message.len());
    data.extend_from_slice(prefix.as_bytes());
    data.extend_from_slice(message);
    keccak256(&data)
}

/// Decode a hex signature (with or without `0x`)
pub fn parse_signature(signature: &str) -> GatingResult<Vec<u8>> {
    let digits = signature.strip_prefix("0x").unwrap_or(signature);
    let bytes = hex::decode(digits).map_err(|_| GatingError::MalformedSignature)?;
    if bytes.len() != SIGNATURE_LEN {
        return Err(GatingError::MalformedSignature);
    }
    Ok(bytes)
}

/// Address derived from a public key
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    // skip the 0x04 uncompressed tag
    let mut out = [0u8; 20];
    out.copy_from_slice(&keccak256(&point.as_bytes()[1..])[12..]);
    Address::from_bytes(out)
}

/// Recover the signing address of a 65-byte signature over `hash`
pub fn recover_address(hash: &[u8; 32], signature: &[u8]) -> GatingResult<Address> {
    if signature.len() != SIGNATURE_LEN {
        return Err(GatingError::MalformedSignature);
    }
    let v = match signature[64] {
        0 | 27 => 0,
        1 | 28 => 1,
        _ => return Err(GatingError::MalformedSignature),
    };
    let mut sig =
        Signature::from_slice(&signature[..64]).map_err(|_| GatingError::MalformedSignature)?;
    let mut recovery_id = RecoveryId::from_byte(v).ok_or(GatingError::MalformedSignature)?;

    // high-s signatures are the mirror point; flip parity with s
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    let key = VerifyingKey::recover_from_prehash(hash, &sig, recovery_id)
        .map_err(|_| GatingError::MalformedSignature)?;
    Ok(address_of(&key))
}

/// Sign `message` the way `personal_sign` does, returning `0x` hex with v = 27/28
pub fn sign_personal_message(key: &SigningKey, message: &str) -> GatingResult<String> {
    let hash = personal_message_hash(message.as_bytes());
    let (sig, recovery_id) = key
        .sign_prehash_recoverable(&hash)
        .map_err(|_| GatingError::MalformedSignature)?;
    let mut bytes = sig.to_bytes().to_vec();
    bytes.push(27 + recovery_id.to_byte());
    Ok(format!("0x{}", hex::encode(bytes)))
}

/// How a claim's signature was accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureKind {
    /// ECDSA recovery matched the address
    Eoa,
    /// The address is a contract that accepted the signature (ERC-1271)
    Contract,
}

/// Verifies that a claimed address signed a challenge message
#[derive(Clone)]
pub struct SignatureVerifier {
    collector: SnapshotCollector,
}

impl SignatureVerifier {
    pub fn new(collector: SnapshotCollector) -> Self {
        Self { collector }
    }

    pub async fn verify(
        &self,
        chain: Chain,
        message: &str,
        claimed: Address,
        signature: &[u8],
    ) -> GatingResult<SignatureKind> {
        let hash = personal_message_hash(message.as_bytes());

        // An unrecoverable signature may still be valid for a contract account.
        let recovered = recover_address(&hash, signature).ok();
        if recovered == Some(claimed) {
            return Ok(SignatureKind::Eoa);
        }

        let reader = self.collector.reader(chain)?;
        if reader.is_valid_signature(claimed, hash, signature).await? {
            return Ok(SignatureKind::Contract);
        }

        debug!(%claimed, ?recovered, %chain, "signature rejected");
        Err(GatingError::SignatureMismatch(claimed.to_checksum()))
    }
}
