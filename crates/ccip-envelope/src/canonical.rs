use serde::Serialize;

/// The envelope content fields covered by the digest, borrowed from wherever
/// they live. `digest` and `signature` are never part of the preimage.
#[derive(Debug, Clone, Copy)]
pub struct ContentFields<'a> {
    pub name: &'a str,
    pub method: &'a str,
    pub params: &'a str,
    pub result: &'a str,
    pub cursor: Option<&'a str>,
    pub prev_digest: Option<&'a [u8; 32]>,
    pub meta: &'a str,
    pub cache_ttl: u64,
}

/// Serialization order IS the canonical order: ASCII-lexicographic keys.
/// serde_json emits fields in declaration order, compact, fully escaped,
/// with `None` as literal `null` — exactly the preimage grammar the on-chain
/// verifier reconstructs.
#[derive(Serialize)]
struct Preimage<'a> {
    cache_ttl: u64,
    cursor: Option<&'a str>,
    meta: &'a str,
    method: &'a str,
    name: &'a str,
    params: &'a str,
    prev_digest: Option<String>,
    result: &'a str,
}

/// Produce the deterministic byte string whose keccak-256 is the envelope
/// digest. Total function: equal content always yields equal bytes.
pub fn canonicalize(fields: &ContentFields<'_>) -> Vec<u8> {
    let preimage = Preimage {
        cache_ttl: fields.cache_ttl,
        cursor: fields.cursor,
        meta: fields.meta,
        method: fields.method,
        name: fields.name,
        params: fields.params,
        prev_digest: fields.prev_digest.map(|d| format!("0x{}", hex::encode(d))),
        result: fields.result,
    };
    serde_json::to_vec(&preimage).expect("canonical fields always serialize")
}
