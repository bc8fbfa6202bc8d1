use async_trait::async_trait;
use ccip_envelope::hash::keccak256;
use serde_json::{json, Map, Value};

use crate::registry::ComputeFunction;

/// Built-in development price feed.
///
/// Real deployments register their own feed backed by an upstream source;
/// this one derives a stable pseudo-quote from the pair name so the gateway
/// answers lookups out of the box and stays deterministic in its inputs.
pub struct StaticPricefeed;

#[async_trait]
impl ComputeFunction for StaticPricefeed {
    async fn call(&self, params: &Map<String, Value>) -> anyhow::Result<Value> {
        let pair = params
            .get("pair")
            .and_then(Value::as_str)
            .unwrap_or("ethereum");

        let seed = keccak256(pair.as_bytes());
        let mut word = [0u8; 8];
        word.copy_from_slice(&seed[..8]);
        let price = (u64::from_be_bytes(word) % 1_000_000) as f64 / 100.0;

        Ok(json!({
            "success": true,
            "data": { "pair": pair, "price": price },
            "type": "pricefeed",
        }))
    }
}
