//! ABI wire codec.
//!
//! Two fixed on-wire contracts, distinct from the digest-canonical form:
//!
//!   envelope: (string name, string method, string params, string result,
//!              string cursor, bytes32 prev_digest, string meta,
//!              uint256 cache_ttl, bytes32 digest, bytes signature)
//!   legacy:   (bytes result_json_utf8, bytes signature)
//!
//! On the wire an absent `cursor` is the empty string and an absent
//! `prev_digest` is 32 zero bytes; the digest preimage sees literal `null`
//! for both, so decode maps the sentinels back before any rehashing.

use ethabi::{ParamType, Token};

use crate::{envelope::Envelope, error::EnvelopeError};

fn envelope_param() -> ParamType {
    ParamType::Tuple(vec![
        ParamType::String,
        ParamType::String,
        ParamType::String,
        ParamType::String,
        ParamType::String,
        ParamType::FixedBytes(32),
        ParamType::String,
        ParamType::Uint(256),
        ParamType::FixedBytes(32),
        ParamType::Bytes,
    ])
}

/// ABI-encode a signed envelope as a single tuple in wire order.
pub fn encode_envelope(env: &Envelope) -> Vec<u8> {
    ethabi::encode(&[Token::Tuple(vec![
        Token::String(env.name.clone()),
        Token::String(env.method.clone()),
        Token::String(env.params.clone()),
        Token::String(env.result.clone()),
        Token::String(env.cursor.clone().unwrap_or_default()),
        Token::FixedBytes(env.prev_digest.unwrap_or([0u8; 32]).to_vec()),
        Token::String(env.meta.clone()),
        Token::Uint(env.cache_ttl.into()),
        Token::FixedBytes(env.digest.to_vec()),
        Token::Bytes(env.signature.to_vec()),
    ])])
}

/// Decode a wire-encoded envelope tuple back into its fields.
///
/// Used by round-trip verification; the gateway itself only encodes.
pub fn decode_envelope(data: &[u8]) -> Result<Envelope, EnvelopeError> {
    let tokens = ethabi::decode(&[envelope_param()], data)
        .map_err(|e| EnvelopeError::AbiDecode(e.to_string()))?;
    let fields = match tokens.into_iter().next() {
        Some(Token::Tuple(fields)) if fields.len() == 10 => fields,
        _ => return Err(EnvelopeError::AbiDecode("expected 10-field tuple".into())),
    };
    let mut it = fields.into_iter();

    let name = take_string(&mut it)?;
    let method = take_string(&mut it)?;
    let params = take_string(&mut it)?;
    let result = take_string(&mut it)?;
    let cursor = take_string(&mut it)?;
    let prev_digest = take_bytes32(&mut it)?;
    let meta = take_string(&mut it)?;
    let cache_ttl = take_u64(&mut it)?;
    let digest = take_bytes32(&mut it)?;
    let signature: [u8; 65] = it
        .next()
        .and_then(Token::into_bytes)
        .ok_or_else(|| EnvelopeError::AbiDecode("expected bytes signature".into()))?
        .try_into()
        .map_err(|_| EnvelopeError::AbiDecode("signature must be 65 bytes".into()))?;

    Ok(Envelope {
        name,
        method,
        params,
        result,
        cursor: (!cursor.is_empty()).then_some(cursor),
        prev_digest: (prev_digest != [0u8; 32]).then_some(prev_digest),
        meta,
        cache_ttl,
        digest,
        signature,
    })
}

/// ABI-encode the legacy response: `(bytes result_json_utf8, bytes signature)`.
pub fn encode_legacy(result_utf8: &[u8], signature: &[u8; 65]) -> Vec<u8> {
    ethabi::encode(&[
        Token::Bytes(result_utf8.to_vec()),
        Token::Bytes(signature.to_vec()),
    ])
}

/// Decode a legacy `(bytes, bytes)` response.
pub fn decode_legacy(data: &[u8]) -> Result<(Vec<u8>, Vec<u8>), EnvelopeError> {
    let tokens = ethabi::decode(&[ParamType::Bytes, ParamType::Bytes], data)
        .map_err(|e| EnvelopeError::AbiDecode(e.to_string()))?;
    let mut it = tokens.into_iter();
    let result = it
        .next()
        .and_then(Token::into_bytes)
        .ok_or_else(|| EnvelopeError::AbiDecode("expected result bytes".into()))?;
    let signature = it
        .next()
        .and_then(Token::into_bytes)
        .ok_or_else(|| EnvelopeError::AbiDecode("expected signature bytes".into()))?;
    Ok((result, signature))
}

/// ABI-encode lookup call data: `(string method, bytes params_json_utf8)`.
pub fn encode_lookup_calldata(method: &str, params_utf8: &[u8]) -> Vec<u8> {
    ethabi::encode(&[
        Token::String(method.to_string()),
        Token::Bytes(params_utf8.to_vec()),
    ])
}

/// Decode lookup call data `(string, bytes)` into the method name and the
/// raw UTF-8 parameter bytes.
pub fn decode_lookup_calldata(data: &[u8]) -> Result<(String, Vec<u8>), EnvelopeError> {
    let tokens = ethabi::decode(&[ParamType::String, ParamType::Bytes], data)
        .map_err(|e| EnvelopeError::AbiDecode(e.to_string()))?;
    let mut it = tokens.into_iter();
    let method = it
        .next()
        .and_then(Token::into_string)
        .ok_or_else(|| EnvelopeError::AbiDecode("expected method string".into()))?;
    let params = it
        .next()
        .and_then(Token::into_bytes)
        .ok_or_else(|| EnvelopeError::AbiDecode("expected params bytes".into()))?;
    Ok((method, params))
}

fn take_string(it: &mut impl Iterator<Item = Token>) -> Result<String, EnvelopeError> {
    it.next()
        .and_then(Token::into_string)
        .ok_or_else(|| EnvelopeError::AbiDecode("expected string field".into()))
}

fn take_bytes32(it: &mut impl Iterator<Item = Token>) -> Result<[u8; 32], EnvelopeError> {
    it.next()
        .and_then(Token::into_fixed_bytes)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| EnvelopeError::AbiDecode("expected bytes32 field".into()))
}

fn take_u64(it: &mut impl Iterator<Item = Token>) -> Result<u64, EnvelopeError> {
    let value = it
        .next()
        .and_then(Token::into_uint)
        .ok_or_else(|| EnvelopeError::AbiDecode("expected uint field".into()))?;
    if value.bits() > 64 {
        return Err(EnvelopeError::AbiDecode("uint exceeds u64".into()));
    }
    Ok(value.low_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        canonical::canonicalize,
        envelope::{BuildContext, EnvelopeDraft},
        hash::keccak256,
        signer::GatewaySigner,
    };
    use serde_json::json;

    fn signed_envelope() -> Envelope {
        let mut sk = [0u8; 32];
        sk[31] = 1;
        let signer = GatewaySigner::from_bytes(&sk).unwrap();
        let ctx = BuildContext {
            provider: "test-gateway".into(),
            version: "1.0.0".into(),
            nonce: Some("feed".into()),
            timestamp: Some(1_700_000_000),
        };
        Envelope::build(
            EnvelopeDraft::new("pricefeed.eth", "pricefeed", json!({}), json!({"p": 1})),
            &ctx,
            &signer,
        )
        .unwrap()
    }

    #[test]
    fn envelope_round_trip_preserves_digest() {
        let env = signed_envelope();
        let decoded = decode_envelope(&encode_envelope(&env)).unwrap();

        assert_eq!(decoded.digest, env.digest);
        assert_eq!(decoded.signature, env.signature);
        // The digest recomputed from decoded content matches the original.
        assert_eq!(keccak256(&canonicalize(&decoded.content_fields())), env.digest);
    }

    #[test]
    fn absent_optionals_use_wire_sentinels() {
        let env = signed_envelope();
        assert!(env.cursor.is_none());
        let decoded = decode_envelope(&encode_envelope(&env)).unwrap();
        // Empty-string cursor and zero prev_digest come back as None.
        assert!(decoded.cursor.is_none());
        assert!(decoded.prev_digest.is_none());
    }

    #[test]
    fn present_optionals_survive() {
        let mut env = signed_envelope();
        env.cursor = Some("page-2".into());
        env.prev_digest = Some([7u8; 32]);
        let decoded = decode_envelope(&encode_envelope(&env)).unwrap();
        assert_eq!(decoded.cursor.as_deref(), Some("page-2"));
        assert_eq!(decoded.prev_digest, Some([7u8; 32]));
    }

    #[test]
    fn lookup_calldata_round_trip() {
        let params = serde_json::to_vec(&json!({"pair": "ethereum"})).unwrap();
        let data = encode_lookup_calldata("pricefeed", &params);
        let (method, raw) = decode_lookup_calldata(&data).unwrap();
        assert_eq!(method, "pricefeed");
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&raw).unwrap(),
            json!({"pair": "ethereum"}),
        );
    }

    #[test]
    fn legacy_round_trip() {
        let env = signed_envelope();
        let result = br#"{"p":1}"#;
        let data = encode_legacy(result, &env.signature);
        let (decoded_result, decoded_sig) = decode_legacy(&data).unwrap();
        assert_eq!(decoded_result, result);
        assert_eq!(decoded_sig, env.signature.to_vec());
    }

    #[test]
    fn truncated_envelope_rejected() {
        let data = encode_envelope(&signed_envelope());
        assert!(decode_envelope(&data[..data.len() / 2]).is_err());
    }
}
