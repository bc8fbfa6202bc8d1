use k256::{
    ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint,
};

use crate::{
    constants::{SIGNATURE_LEN, V_OFFSET},
    error::EnvelopeError,
    hash::{eip191_digest, keccak256},
};

/// Process-wide signing handle: loaded once at startup, read-only after.
///
/// Holds the secp256k1 key and the Ethereum address derived from it
/// (keccak-256 of the uncompressed public key, last 20 bytes).
pub struct GatewaySigner {
    key: SigningKey,
    address: [u8; 20],
}

impl GatewaySigner {
    /// Construct from a raw 32-byte scalar. The zero scalar (and any other
    /// value outside the curve order) is rejected.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self, EnvelopeError> {
        let key = SigningKey::from_slice(bytes)
            .map_err(|e| EnvelopeError::SigningKeyUnavailable(e.to_string()))?;
        let address = eth_address(key.verifying_key());
        Ok(Self { key, address })
    }

    /// Construct from a hex string, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, EnvelopeError> {
        let raw = hex::decode(s.trim().trim_start_matches("0x"))
            .map_err(|e| EnvelopeError::SigningKeyUnavailable(format!("invalid hex: {e}")))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| EnvelopeError::SigningKeyUnavailable("key must be 32 bytes".into()))?;
        Self::from_bytes(&bytes)
    }

    pub fn address(&self) -> [u8; 20] {
        self.address
    }

    /// `0x`-prefixed lower-case hex of the signer address.
    pub fn address_hex(&self) -> String {
        format!("0x{}", hex::encode(self.address))
    }

    /// Sign a 32-byte digest under the EIP-191 personal-message wrapping.
    ///
    /// Output is `r || s || v` with `v` in {27, 28}. `s` is low-S
    /// normalized; the recovery id parity flips with it so recovery still
    /// yields the same key.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<[u8; 65], EnvelopeError> {
        let prehash = eip191_digest(digest);
        let (mut sig, mut recid) = self
            .key
            .sign_prehash_recoverable(&prehash)
            .map_err(|e| EnvelopeError::SigningFailed(e.to_string()))?;

        if let Some(normalized) = sig.normalize_s() {
            sig = normalized;
            recid = RecoveryId::new(!recid.is_y_odd(), recid.is_x_reduced());
        }

        let mut out = [0u8; SIGNATURE_LEN];
        out[..64].copy_from_slice(&sig.to_bytes());
        out[64] = V_OFFSET + recid.to_byte();
        Ok(out)
    }
}

/// Recover the signer address from a digest and a 65-byte `r || s || v`
/// signature produced by [`GatewaySigner::sign_digest`].
///
/// Only `v` in {27, 28} is accepted, and high-S signatures are rejected so a
/// malleated copy of a valid signature does not also recover.
pub fn recover_signer(digest: &[u8; 32], sig: &[u8; 65]) -> Result<[u8; 20], EnvelopeError> {
    let recid = sig[64]
        .checked_sub(V_OFFSET)
        .and_then(RecoveryId::from_byte)
        .ok_or(EnvelopeError::InvalidSignature)?;

    let signature =
        Signature::from_slice(&sig[..64]).map_err(|_| EnvelopeError::InvalidSignature)?;
    if signature.normalize_s().is_some() {
        return Err(EnvelopeError::InvalidSignature);
    }

    let prehash = eip191_digest(digest);
    let key = VerifyingKey::recover_from_prehash(&prehash, &signature, recid)
        .map_err(|_| EnvelopeError::InvalidSignature)?;
    Ok(eth_address(&key))
}

fn eth_address(key: &VerifyingKey) -> [u8; 20] {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 SEC1 tag byte.
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}
