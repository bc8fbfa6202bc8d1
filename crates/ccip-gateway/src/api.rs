//! HTTP surface and lookup pipeline.
//!
//!   POST /lookup       — CCIP-Read lookup: admit → validate → decode →
//!                        dispatch → sign → ABI-encode
//!   POST /compute      — direct dispatch, bypassing call-data decoding and
//!                        the envelope (test surface; same limiter/validator)
//!   GET  /health       — signer address, uptime
//!   GET  /metrics      — Prometheus text exposition
//!   GET  /api/metrics  — JSON metrics snapshot
//!   GET  /functions    — registered compute function names

use std::{net::SocketAddr, sync::Arc, time::Instant};

use axum::{
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ccip_envelope::{
    abi,
    envelope::{BuildContext, Envelope, EnvelopeDraft},
    hash::keccak256,
    GatewaySigner,
};
use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::{
    decode::decode_call_data,
    error::GatewayError,
    metrics::Metrics,
    rate_limit::{self, Decision, RateLimiters},
    registry::ComputeRegistry,
    validate::validate_body,
};

/// Method label recorded for requests that fail before call-data decoding.
const METHOD_UNKNOWN: &str = "unknown";

struct AppInner {
    signer: GatewaySigner,
    registry: ComputeRegistry,
    limiters: Arc<RateLimiters>,
    metrics: Metrics,
    provider: String,
    gateway_name: String,
}

/// Cheaply cloneable shared state passed to all handlers.
#[derive(Clone)]
pub struct AppState(Arc<AppInner>);

impl AppState {
    pub fn new(
        signer: GatewaySigner,
        registry: ComputeRegistry,
        provider: impl Into<String>,
        gateway_name: impl Into<String>,
    ) -> Self {
        Self(Arc::new(AppInner {
            signer,
            registry,
            limiters: Arc::new(RateLimiters::standard()),
            metrics: Metrics::new(),
            provider: provider.into(),
            gateway_name: gateway_name.into(),
        }))
    }

    pub fn metrics(&self) -> &Metrics {
        &self.0.metrics
    }

    /// Start the periodic limiter sweep. Call once after startup.
    pub fn spawn_sweeper(&self) {
        rate_limit::spawn_sweeper(self.0.limiters.clone());
    }

    fn admit(&self, headers: &HeaderMap, addr: &SocketAddr) -> Decision {
        let api_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
        self.0.limiters.admit(api_key, &addr.ip().to_string())
    }

    // ── Lookup pipeline ──────────────────────────────────────────────────────

    async fn run_lookup(&self, body: &mut Value) -> (String, Result<Value, GatewayError>) {
        if let Err(reasons) = validate_body(body) {
            return (METHOD_UNKNOWN.into(), Err(GatewayError::Validation(reasons)));
        }

        let (method, params) = decode_call_data(body.get("data"));

        let result = match self.0.registry.dispatch(&method, &params).await {
            Ok(result) => result,
            Err(e) => return (method, Err(e)),
        };

        // Envelope unless the caller opted out with the literal `false`.
        let outcome = if matches!(body.get("useEnvelope"), Some(Value::Bool(false))) {
            self.legacy_response(&result)
        } else {
            // No silent fallback to the legacy shape: a caller that asked
            // for an envelope gets an envelope or an error.
            self.envelope_response(body, &method, params, result)
        };
        (method, outcome)
    }

    fn envelope_response(
        &self,
        body: &Value,
        method: &str,
        params: Map<String, Value>,
        result: Value,
    ) -> Result<Value, GatewayError> {
        let name = body
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&self.0.gateway_name)
            .to_string();

        let draft = EnvelopeDraft::new(name, method, Value::Object(params), result);
        let ctx = BuildContext::new(self.0.provider.as_str(), env!("CARGO_PKG_VERSION"));
        let envelope = Envelope::build(draft, &ctx, &self.0.signer)?;
        self.0.metrics.record_signature_generated();

        let data = abi::encode_envelope(&envelope);
        Ok(json!({
            "data":     format!("0x{}", hex::encode(data)),
            "envelope": envelope.to_json(),
        }))
    }

    /// Pre-envelope wire shape: sign the raw result JSON, return
    /// `(bytes result, bytes signature)`. The result is hashed as produced,
    /// without canonicalization, so key order matters to the signature.
    fn legacy_response(&self, result: &Value) -> Result<Value, GatewayError> {
        let result_bytes = result.to_string().into_bytes();
        let signature = self.0.signer.sign_digest(&keccak256(&result_bytes))?;
        self.0.metrics.record_signature_generated();

        let data = abi::encode_legacy(&result_bytes, &signature);
        Ok(json!({ "data": format!("0x{}", hex::encode(data)) }))
    }

    async fn run_compute(&self, body: &mut Value) -> (String, Result<Value, GatewayError>) {
        if let Err(reasons) = validate_body(body) {
            return (METHOD_UNKNOWN.into(), Err(GatewayError::Validation(reasons)));
        }

        let Some(method) = body.get("function").and_then(Value::as_str).map(String::from)
        else {
            let reasons = vec!["Missing function parameter".to_string()];
            return (METHOD_UNKNOWN.into(), Err(GatewayError::Validation(reasons)));
        };
        let params = body
            .get("params")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let result = match self.0.registry.dispatch(&method, &params).await {
            Ok(result) => result,
            Err(e) => return (method, Err(e)),
        };

        let result_bytes = result.to_string().into_bytes();
        let outcome = self
            .0
            .signer
            .sign_digest(&keccak256(&result_bytes))
            .map(|signature| {
                self.0.metrics.record_signature_generated();
                json!({
                    "result":    result,
                    "signature": format!("0x{}", hex::encode(signature)),
                    "signer":    self.0.signer.address_hex(),
                })
            })
            .map_err(GatewayError::from);
        (method, outcome)
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/lookup", post(lookup))
        .route("/compute", post(compute))
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .route("/api/metrics", get(metrics_json))
        .route("/functions", get(functions))
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Route handlers
// ============================================================================

async fn lookup(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    let started = Instant::now();

    let decision = state.admit(&headers, &addr);
    if !decision.allowed {
        return GatewayError::RateLimited {
            retry_after: decision.retry_after_secs,
        }
        .into_response();
    }

    let (method, outcome) = state.run_lookup(&mut body).await;
    let latency_ms = started.elapsed().as_millis() as u64;
    state.0.metrics.record_request(&method, outcome.is_ok(), latency_ms);

    if let Err(ref e) = outcome {
        tracing::warn!(%method, error = %e, "lookup failed");
    }

    let response = match outcome {
        Ok(body) => Json(body).into_response(),
        Err(e) => e.into_response(),
    };
    with_rate_limit_headers(response, &decision)
}

async fn compute(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    let started = Instant::now();

    let decision = state.admit(&headers, &addr);
    if !decision.allowed {
        return GatewayError::RateLimited {
            retry_after: decision.retry_after_secs,
        }
        .into_response();
    }

    let (method, outcome) = state.run_compute(&mut body).await;
    let latency_ms = started.elapsed().as_millis() as u64;
    state.0.metrics.record_request(&method, outcome.is_ok(), latency_ms);

    let response = match outcome {
        Ok(body) => Json(body).into_response(),
        Err(e) => e.into_response(),
    };
    with_rate_limit_headers(response, &decision)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status":    "ok",
        "signer":    state.0.signer.address_hex(),
        "timestamp": Utc::now().to_rfc3339(),
        "uptime":    state.0.metrics.uptime_secs(),
    }))
}

async fn metrics_text(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.0.metrics.render_text(),
    )
}

async fn metrics_json(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.0.metrics.snapshot())
}

async fn functions(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "functions": state.0.registry.names() }))
}

fn with_rate_limit_headers(mut response: Response, decision: &Decision) -> Response {
    let headers = response.headers_mut();
    let entries = [
        ("x-ratelimit-limit", decision.limit.to_string()),
        ("x-ratelimit-remaining", decision.remaining.to_string()),
        ("x-ratelimit-reset", decision.reset.clone()),
    ];
    for (name, value) in entries {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ComputeFunction;
    use async_trait::async_trait;

    struct Fixed;

    #[async_trait]
    impl ComputeFunction for Fixed {
        async fn call(&self, _params: &Map<String, Value>) -> anyhow::Result<Value> {
            Ok(json!({"ok": true}))
        }
    }

    fn state() -> AppState {
        let mut sk = [0u8; 32];
        sk[31] = 1;
        let signer = GatewaySigner::from_bytes(&sk).unwrap();
        let mut registry = ComputeRegistry::new();
        registry.register("pricefeed", Arc::new(Fixed)).unwrap();
        AppState::new(signer, registry, "test-gateway", "pricefeed.eth")
    }

    #[tokio::test]
    async fn envelope_unless_literal_false() {
        let state = state();

        // Explicit opt-out.
        let mut body = json!({"data": "", "useEnvelope": false});
        let (_, outcome) = state.run_lookup(&mut body).await;
        assert!(outcome.unwrap().get("envelope").is_none());

        // Absent flag and non-literal values keep the envelope path.
        for flag in [json!(null), json!("false"), json!(0), json!(true)] {
            let mut body = json!({"data": "", "useEnvelope": flag});
            let (_, outcome) = state.run_lookup(&mut body).await;
            assert!(outcome.unwrap().get("envelope").is_some(), "flag {flag:?}");
        }
    }

    #[tokio::test]
    async fn validation_failure_stops_before_dispatch() {
        let state = state();
        let mut body = json!({"name": "bad name!"});
        let (method, outcome) = state.run_lookup(&mut body).await;
        assert_eq!(method, METHOD_UNKNOWN);
        assert!(matches!(outcome, Err(GatewayError::Validation(_))));
    }

    #[tokio::test]
    async fn envelope_name_falls_back_to_gateway_name() {
        let state = state();
        let mut body = json!({"data": ""});
        let (_, outcome) = state.run_lookup(&mut body).await;
        let response = outcome.unwrap();
        assert_eq!(response["envelope"]["name"], "pricefeed.eth");
    }
}
