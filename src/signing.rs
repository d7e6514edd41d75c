// Request signing module
// Ed25519 signatures over API request bodies, bound to a per-caller nonce and
// an expiry, and derivation of the caller address from the signing key
//

use crate::errors::AuthError;
use crate::state::Address;
use base64::{engine::general_purpose::STANDARD_NO_PAD as B64, Engine as _};
use blake2::{Blake2b512, Digest};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use hex::FromHex;

const ED25519_FLAG: u8 = 0x00;
const REQUEST_DOMAIN: &[u8] = b"trade-router/request/v1";

/// Caller address for a public key: Blake2b(flag || pubkey), first 20 bytes.
pub fn address_from_public_key(public_key: &[u8; 32]) -> Address {
    let mut hasher = Blake2b512::new();
    hasher.update([ED25519_FLAG]);
    hasher.update(public_key);
    let hash = hasher.finalize();
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[..20]);
    Address::new(bytes)
}

/// Replay envelope carried next to the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestStamp {
    /// Must be strictly greater than the caller's last accepted nonce.
    pub nonce: u64,
    /// Unix seconds after which the signature is no longer accepted.
    pub expires_at: u64,
}

impl RequestStamp {
    pub fn new(nonce: u64, expires_at: u64) -> Self {
        Self { nonce, expires_at }
    }
}

/// 32-byte digest actually signed: Blake2b over the domain tag, the stamp
/// (big-endian) and the body.
fn request_digest(body: &[u8], stamp: RequestStamp) -> [u8; 32] {
    let mut hasher = Blake2b512::new();
    hasher.update(REQUEST_DOMAIN);
    hasher.update(stamp.nonce.to_be_bytes());
    hasher.update(stamp.expires_at.to_be_bytes());
    hasher.update(body);
    let hash = hasher.finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hash[..32]);
    digest
}

pub fn signing_key_from_hex(secret_hex: &str) -> Result<SigningKey, AuthError> {
    let bytes = <[u8; 32]>::from_hex(secret_hex.trim_start_matches("0x"))
        .map_err(|e| AuthError::BadKey(format!("bad hex key: {e}")))?;
    Ok(SigningKey::from_bytes(&bytes))
}

pub fn public_key_from_hex(public_hex: &str) -> Result<VerifyingKey, AuthError> {
    let bytes = <[u8; 32]>::from_hex(public_hex.trim_start_matches("0x"))
        .map_err(|e| AuthError::BadKey(format!("bad hex public key: {e}")))?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| AuthError::BadKey(e.to_string()))
}

/// Sign a request body under `stamp`. Returns the base64 signature and the
/// hex public key, the two values the API expects next to the stamp headers.
pub fn sign_request(
    body: &[u8],
    stamp: RequestStamp,
    secret_hex: &str,
) -> Result<(String, String), AuthError> {
    let signing_key = signing_key_from_hex(secret_hex)?;
    let sig = signing_key.sign(&request_digest(body, stamp));
    Ok((
        B64.encode(sig.to_bytes()),
        hex::encode(signing_key.verifying_key().to_bytes()),
    ))
}

/// Verify a signed request body and return the caller address it authenticates.
///
/// Only the signature is checked here; nonce freshness and expiry are
/// enforced by [`crate::control::ReplayGuard`].
pub fn verify_request(
    body: &[u8],
    stamp: RequestStamp,
    public_hex: &str,
    signature_b64: &str,
) -> Result<Address, AuthError> {
    let key = public_key_from_hex(public_hex)?;
    let sig_bytes = B64
        .decode(signature_b64.trim_end_matches('='))
        .map_err(|e| AuthError::BadSignature(e.to_string()))?;
    let sig_bytes: [u8; 64] = sig_bytes
        .as_slice()
        .try_into()
        .map_err(|_| AuthError::BadSignature(format!("expected 64 bytes, got {}", sig_bytes.len())))?;
    key.verify(&request_digest(body, stamp), &Signature::from_bytes(&sig_bytes))
        .map_err(|_| AuthError::VerificationFailed)?;
    Ok(address_from_public_key(&key.to_bytes()))
}
