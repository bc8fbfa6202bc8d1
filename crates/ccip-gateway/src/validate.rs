//! Request-body validation and sanitation.
//!
//! Runs after admission and before decoding. The body is mutated in place:
//! `name` is written back sanitized and string params are truncated, so
//! everything downstream only ever sees clean values. All failure reasons
//! are collected rather than short-circuiting on the first.

use std::sync::OnceLock;

use ccip_envelope::{hash::namehash_accepts, MAX_ENVELOPE_SIZE};
use regex::Regex;
use serde_json::{Map, Value};

const MAX_NAME_LEN: usize = 255;
const MAX_PARAM_STRING_LEN: usize = 1000;

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9-]+\.eth$").expect("name pattern compiles"))
}

/// Validate and sanitize a request body. Returns every failed rule.
pub fn validate_body(body: &mut Value) -> Result<(), Vec<String>> {
    let Some(obj) = body.as_object_mut() else {
        return Err(vec!["Request body must be a JSON object".to_string()]);
    };

    let mut errors = Vec::new();

    if let Some(node) = obj.get("node") {
        if !node_is_valid(node) {
            errors.push("Invalid node parameter".to_string());
        }
    }

    if let Some(name) = obj.get("name") {
        match sanitize_name(name) {
            Some(clean) => {
                obj.insert("name".to_string(), Value::String(clean));
            }
            None => errors.push("Invalid ENS name".to_string()),
        }
    }

    if let Some(data) = obj.get("data") {
        if data.to_string().len() > MAX_ENVELOPE_SIZE {
            errors.push("Request data too large (max 100KB)".to_string());
        }
    }

    if let Some(params) = obj.get_mut("params") {
        match params.as_object_mut() {
            Some(map) => sanitize_params(map),
            None => errors.push("Invalid params: expected an object".to_string()),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `node` is either a 32-byte hex node id or a name the namehash algorithm
/// accepts.
fn node_is_valid(node: &Value) -> bool {
    let Some(s) = node.as_str() else { return false };
    if let Some(rest) = s.strip_prefix("0x") {
        return s.len() == 66 && rest.bytes().all(|b| b.is_ascii_hexdigit());
    }
    namehash_accepts(s)
}

fn sanitize_name(name: &Value) -> Option<String> {
    let raw = name.as_str()?;
    let clean = raw.replace('\0', "").trim().to_string();
    (clean.len() <= MAX_NAME_LEN && name_pattern().is_match(&clean)).then_some(clean)
}

/// Strip NUL bytes from and truncate every string-valued param.
fn sanitize_params(params: &mut Map<String, Value>) {
    for value in params.values_mut() {
        if let Value::String(s) = value {
            let mut clean: String = s.replace('\0', "");
            if clean.chars().count() > MAX_PARAM_STRING_LEN {
                clean = clean.chars().take(MAX_PARAM_STRING_LEN).collect();
            }
            *s = clean;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_body_passes_untouched() {
        let mut body = json!({
            "node": format!("0x{}", "00".repeat(32)),
            "name": "pricefeed.eth",
            "data": "",
        });
        assert!(validate_body(&mut body).is_ok());
        assert_eq!(body["name"], "pricefeed.eth");
    }

    #[test]
    fn name_is_sanitized_in_place() {
        let mut body = json!({"name": "  pricefeed.eth\0  "});
        assert!(validate_body(&mut body).is_ok());
        assert_eq!(body["name"], "pricefeed.eth");
    }

    #[test]
    fn bad_name_rejected() {
        for bad in ["bad name!", "no-tld", "under_score.eth", "x.com", ""] {
            let mut body = json!({ "name": bad });
            let errors = validate_body(&mut body).unwrap_err();
            assert!(
                errors.contains(&"Invalid ENS name".to_string()),
                "expected rejection for {bad:?}",
            );
        }
    }

    #[test]
    fn overlong_name_rejected() {
        let mut body = json!({"name": format!("{}.eth", "a".repeat(260))});
        assert!(validate_body(&mut body).is_err());
    }

    #[test]
    fn node_accepts_hex_and_names() {
        for good in [&format!("0x{}", "ab".repeat(32)), "pricefeed.eth", "a.b.c"] {
            let mut body = json!({ "node": good });
            assert!(validate_body(&mut body).is_ok(), "expected accept for {good:?}");
        }
        let non_hex = format!("0x{}", "zz".repeat(32));
        for bad in ["0x1234", non_hex.as_str(), "", "foo..eth", "has space.eth"] {
            let mut body = json!({ "node": bad });
            let errors = validate_body(&mut body).unwrap_err();
            assert!(
                errors.contains(&"Invalid node parameter".to_string()),
                "expected rejection for {bad:?}",
            );
        }
    }

    #[test]
    fn oversized_data_rejected() {
        let mut body = json!({"data": "0".repeat(MAX_ENVELOPE_SIZE + 1)});
        let errors = validate_body(&mut body).unwrap_err();
        assert!(errors.contains(&"Request data too large (max 100KB)".to_string()));
    }

    #[test]
    fn params_strings_truncated_and_stripped() {
        let mut body = json!({"params": {
            "long":  "x".repeat(1500),
            "nul":   "a\0b",
            "other": 42,
        }});
        assert!(validate_body(&mut body).is_ok());
        assert_eq!(body["params"]["long"].as_str().unwrap().len(), 1000);
        assert_eq!(body["params"]["nul"], "ab");
        assert_eq!(body["params"]["other"], 42);
    }

    #[test]
    fn non_object_params_rejected() {
        let mut body = json!({"params": [1, 2]});
        let errors = validate_body(&mut body).unwrap_err();
        assert!(errors.contains(&"Invalid params: expected an object".to_string()));
    }

    #[test]
    fn all_reasons_collected() {
        let mut body = json!({
            "name":   "bad name!",
            "node":   "0x12",
            "params": "not-a-map",
        });
        let errors = validate_body(&mut body).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
