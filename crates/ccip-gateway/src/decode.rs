//! Lookup call-data decoding.
//!
//! The `data` field of a lookup arrives in one of three shapes: hex-encoded
//! ABI bytes `(string method, bytes params_json)`, a JSON string with
//! `function`/`params` fields, or an already-parsed object with the same
//! fields. Each shape gets its own variant and decoder; anything that fails
//! to decode degrades to the defaults instead of erroring, so legacy SDK
//! callers with sloppy payloads still resolve.

use ccip_envelope::abi;
use serde_json::{Map, Value};

/// Method dispatched when call data is absent or undecodable.
pub const DEFAULT_METHOD: &str = "pricefeed";

/// Classified call-data shape.
#[derive(Debug)]
pub enum CallData<'a> {
    /// `0x`-prefixed ABI-encoded `(string, bytes)`.
    Hex(&'a str),
    /// JSON text carrying `function` and `params`.
    JsonText(&'a str),
    /// Already-parsed object carrying `function` and `params`.
    Object(&'a Map<String, Value>),
    /// Absent, empty, or unclassifiable.
    Defaults,
}

impl<'a> CallData<'a> {
    pub fn classify(data: Option<&'a Value>) -> Self {
        match data {
            Some(Value::String(s)) if s.starts_with("0x") => CallData::Hex(s),
            Some(Value::String(s)) if !s.is_empty() => CallData::JsonText(s),
            Some(Value::Object(map)) => CallData::Object(map),
            _ => CallData::Defaults,
        }
    }

    /// Decode into `(method, params)`, falling back to
    /// `(DEFAULT_METHOD, {})` on any decoding failure.
    pub fn decode(self) -> (String, Map<String, Value>) {
        let decoded = match self {
            CallData::Hex(s) => decode_hex(s),
            CallData::JsonText(s) => serde_json::from_str::<Value>(s)
                .ok()
                .and_then(|v| decode_object(v.as_object()?)),
            CallData::Object(map) => decode_object(map),
            CallData::Defaults => None,
        };
        decoded.unwrap_or_else(|| (DEFAULT_METHOD.to_string(), Map::new()))
    }
}

/// Convenience wrapper: classify then decode.
pub fn decode_call_data(data: Option<&Value>) -> (String, Map<String, Value>) {
    CallData::classify(data).decode()
}

fn decode_hex(s: &str) -> Option<(String, Map<String, Value>)> {
    let raw = hex::decode(s.trim_start_matches("0x")).ok()?;
    let (method, params_utf8) = abi::decode_lookup_calldata(&raw).ok()?;
    let params = match serde_json::from_slice::<Value>(&params_utf8) {
        Ok(Value::Object(map)) => map,
        _ => return None,
    };
    Some((method, params))
}

fn decode_object(map: &Map<String, Value>) -> Option<(String, Map<String, Value>)> {
    let method = map.get("function")?.as_str()?.to_string();
    let params = match map.get("params") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(params)) => params.clone(),
        Some(_) => return None,
    };
    Some((method, params))
}
