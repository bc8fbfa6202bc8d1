// ============================================================================
// Envelope protocol constants
// ============================================================================

/// Maximum serialized size of a request `data` field or a signed envelope.
/// The bound is mirrored on both sides so the gateway can never be used to
/// amplify a small request into an oversized response.
pub const MAX_ENVELOPE_SIZE: usize = 100 * 1024; // 100 KiB

/// Cache hint applied when a caller does not ask for one (seconds).
pub const DEFAULT_CACHE_TTL: u64 = 30;

/// Prefix applied to a 32-byte digest before signing (EIP-191, version 0x45).
pub const EIP191_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// Signature layout is r (32) || s (32) || v (1).
pub const SIGNATURE_LEN: usize = 65;

/// `v` values accepted on the wire. Recovery ids 0/1 are shifted up by this.
pub const V_OFFSET: u8 = 27;
