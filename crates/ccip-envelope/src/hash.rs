use tiny_keccak::{Hasher, Keccak};

use crate::constants::EIP191_PREFIX;

/// Keccak-256 hash of the input bytes.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut k = Keccak::v256();
    let mut out = [0u8; 32];
    k.update(data);
    k.finalize(&mut out);
    out
}

/// The digest that is actually signed: keccak256 of the EIP-191 personal
/// message wrapping of a 32-byte hash.
pub fn eip191_digest(hash: &[u8; 32]) -> [u8; 32] {
    let mut prefixed = Vec::with_capacity(EIP191_PREFIX.len() + 32);
    prefixed.extend_from_slice(EIP191_PREFIX);
    prefixed.extend_from_slice(hash);
    keccak256(&prefixed)
}

/// EIP-137 namehash: recursive keccak over dot-separated labels.
///
/// `namehash("") == [0; 32]`; labels are hashed right-to-left:
/// `node = keccak256(node || keccak256(label))`.
pub fn namehash(name: &str) -> [u8; 32] {
    let mut node = [0u8; 32];
    if name.is_empty() {
        return node;
    }
    for label in name.rsplit('.') {
        let label_hash = keccak256(label.as_bytes());
        let mut combined = [0u8; 64];
        combined[..32].copy_from_slice(&node);
        combined[32..].copy_from_slice(&label_hash);
        node = keccak256(&combined);
    }
    node
}

/// Whether a name can be fed to [`namehash`] without producing a degenerate
/// node: non-empty, no NUL or whitespace, no empty labels.
pub fn namehash_accepts(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty()
        && !name.contains('\0')
        && !name.contains(char::is_whitespace)
        && name.split('.').all(|label| !label.is_empty())
}
