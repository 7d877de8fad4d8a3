use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{LedgerError, Result};

/// SHA-256 over the canonical encoding of `inputs`.
///
/// Each input is rendered as JSON, the renderings are sorted and joined with
/// a single space, so the digest does not depend on argument order.
/// `serde_json` emits object keys in sorted order, which keeps map-valued
/// inputs deterministic too.
pub fn content_digest(inputs: &[Value]) -> [u8; 32] {
    let mut parts: Vec<String> = inputs.iter().map(Value::to_string).collect();
    parts.sort();
    let mut hasher = Sha256::new();
    hasher.update(parts.join(" ").as_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

/// Hex-encoded [`content_digest`].
pub fn crypto_hash(inputs: &[Value]) -> String {
    hex::encode(content_digest(inputs))
}

/// Expand a hex string into its binary digits, four per hex character.
/// Returns `None` on any non-hex character.
pub fn hex_to_binary(hex: &str) -> Option<String> {
    let mut bits = String::with_capacity(hex.len() * 4);
    for c in hex.chars() {
        let nibble = c.to_digit(16)?;
        bits.push_str(&format!("{nibble:04b}"));
    }
    Some(bits)
}

/// Proof-of-work predicate: the first `difficulty` binary digits of `hash`
/// are all `'0'`.
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let Some(bits) = hex_to_binary(hash) else {
        return false;
    };
    let wanted = difficulty as usize;
    bits.len() >= wanted && bits.chars().take(wanted).all(|c| c == '0')
}

/// Sign the content digest of `data`, returning a hex DER signature.
pub fn sign_data(secret_key: &SecretKey, data: &Value) -> Result<String> {
    let secp = Secp256k1::signing_only();
    let digest = content_digest(std::slice::from_ref(data));
    let msg = Message::from_digest_slice(&digest)
        .map_err(|_| LedgerError::Crypto("invalid message length"))?;
    let sig = secp.sign_ecdsa(&msg, secret_key);
    Ok(hex::encode(sig.serialize_der().to_vec()))
}

/// Verify a hex DER signature over `data` against a hex compressed pubkey.
/// Malformed keys or signatures simply fail verification.
pub fn verify_signature(public_key_hex: &str, data: &Value, signature_hex: &str) -> bool {
    let secp = Secp256k1::verification_only();

    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(sig) = Signature::from_der(&sig_bytes) else {
        return false;
    };
    let Ok(pk_bytes) = hex::decode(public_key_hex) else {
        return false;
    };
    let Ok(pk) = PublicKey::from_slice(&pk_bytes) else {
        return false;
    };

    let digest = content_digest(std::slice::from_ref(data));
    let Ok(msg) = Message::from_digest_slice(&digest) else {
        return false;
    };
    secp.verify_ecdsa(&msg, &sig, &pk).is_ok()
}
