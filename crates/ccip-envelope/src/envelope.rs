use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Map, Value};

use crate::{
    canonical::{canonicalize, ContentFields},
    constants::{DEFAULT_CACHE_TTL, MAX_ENVELOPE_SIZE},
    error::EnvelopeError,
    hash::keccak256,
    signer::GatewaySigner,
};

/// Caller inputs for one envelope. Structured `params`/`result`/`meta` are
/// JSON-serialized to strings by the builder.
#[derive(Debug, Clone)]
pub struct EnvelopeDraft {
    pub name: String,
    pub method: String,
    pub params: Value,
    pub result: Value,
    pub cursor: Option<String>,
    pub prev_digest: Option<[u8; 32]>,
    pub meta: Option<Value>,
    pub cache_ttl: Option<u64>,
}

impl EnvelopeDraft {
    pub fn new(name: impl Into<String>, method: impl Into<String>, params: Value, result: Value) -> Self {
        Self {
            name: name.into(),
            method: method.into(),
            params,
            result,
            cursor: None,
            prev_digest: None,
            meta: None,
            cache_ttl: None,
        }
    }
}

/// Build-time metadata: `provider`/`version` identify the gateway; `nonce`
/// and `timestamp` are generated per build unless pinned by the caller.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub provider: String,
    pub version: String,
    pub nonce: Option<String>,
    pub timestamp: Option<u64>,
}

impl BuildContext {
    pub fn new(provider: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            version: version.into(),
            nonce: None,
            timestamp: None,
        }
    }
}

/// A signed compute envelope. Constructed per lookup, never mutated after
/// signing, never persisted: the HTTP response is the only copy.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub name: String,
    pub method: String,
    pub params: String,
    pub result: String,
    pub cursor: Option<String>,
    pub prev_digest: Option<[u8; 32]>,
    pub meta: String,
    pub cache_ttl: u64,
    pub digest: [u8; 32],
    pub signature: [u8; 65],
}

impl Envelope {
    /// Assemble, digest, and sign an envelope.
    ///
    /// Defaults: `cache_ttl` 30, absent `cursor`/`prev_digest` stay null,
    /// `meta` starts at `{}`. The builder always injects `provider`,
    /// `version`, `nonce`, and `timestamp` into `meta`.
    pub fn build(
        draft: EnvelopeDraft,
        ctx: &BuildContext,
        signer: &GatewaySigner,
    ) -> Result<Self, EnvelopeError> {
        let params = draft.params.to_string();
        let result = draft.result.to_string();
        let meta = build_meta(draft.meta, ctx)?;
        let cache_ttl = draft.cache_ttl.unwrap_or(DEFAULT_CACHE_TTL);

        let preimage = canonicalize(&ContentFields {
            name: &draft.name,
            method: &draft.method,
            params: &params,
            result: &result,
            cursor: draft.cursor.as_deref(),
            prev_digest: draft.prev_digest.as_ref(),
            meta: &meta,
            cache_ttl,
        });
        let digest = keccak256(&preimage);
        let signature = signer.sign_digest(&digest)?;

        let envelope = Self {
            name: draft.name,
            method: draft.method,
            params,
            result,
            cursor: draft.cursor,
            prev_digest: draft.prev_digest,
            meta,
            cache_ttl,
            digest,
            signature,
        };

        let size = envelope.to_json().to_string().len();
        if size > MAX_ENVELOPE_SIZE {
            return Err(EnvelopeError::EnvelopeTooLarge {
                size,
                limit: MAX_ENVELOPE_SIZE,
            });
        }
        Ok(envelope)
    }

    /// The digest-covered content, borrowed for canonicalization.
    pub fn content_fields(&self) -> ContentFields<'_> {
        ContentFields {
            name: &self.name,
            method: &self.method,
            params: &self.params,
            result: &self.result,
            cursor: self.cursor.as_deref(),
            prev_digest: self.prev_digest.as_ref(),
            meta: &self.meta,
            cache_ttl: self.cache_ttl,
        }
    }

    /// Response-body JSON view. Byte fields are `0x`-prefixed hex; absent
    /// `cursor`/`prev_digest` are literal `null`.
    pub fn to_json(&self) -> Value {
        json!({
            "name":        self.name,
            "method":      self.method,
            "params":      self.params,
            "result":      self.result,
            "cursor":      self.cursor,
            "prev_digest": self.prev_digest.map(|d| format!("0x{}", hex::encode(d))),
            "meta":        self.meta,
            "cache_ttl":   self.cache_ttl,
            "digest":      format!("0x{}", hex::encode(self.digest)),
            "signature":   format!("0x{}", hex::encode(self.signature)),
        })
    }
}

fn build_meta(meta: Option<Value>, ctx: &BuildContext) -> Result<String, EnvelopeError> {
    let mut map = match meta {
        None => Map::new(),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(EnvelopeError::Serialization(format!(
                "meta must be a JSON object, got {other}",
            )))
        }
    };

    let timestamp = match ctx.timestamp {
        Some(t) => t,
        None => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
    };
    let nonce = match &ctx.nonce {
        Some(n) => n.clone(),
        None => hex::encode(rand::random::<[u8; 16]>()),
    };

    map.insert("provider".into(), Value::String(ctx.provider.clone()));
    map.insert("version".into(), Value::String(ctx.version.clone()));
    map.insert("nonce".into(), Value::String(nonce));
    map.insert("timestamp".into(), Value::from(timestamp));
    Ok(Value::Object(map).to_string())
}
