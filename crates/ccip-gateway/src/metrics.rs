//! Request counters and latency histogram, with Prometheus-text and JSON
//! expositions.
//!
//! All counters are lock-free atomics; only the per-method breakdown sits
//! behind a mutex. The histogram is cumulative: a sample increments every
//! bucket whose upper bound is >= the observed latency, and always the
//! infinity bucket, so `le_inf` equals the total sample count.

use std::{
    collections::HashMap,
    fmt::Write as _,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
    time::Instant,
};

use chrono::Utc;
use serde_json::{json, Value};

/// Upper bounds of the finite latency buckets, in milliseconds.
pub const LATENCY_BUCKETS_MS: [u64; 6] = [10, 50, 100, 500, 1000, 5000];

pub struct Metrics {
    total: AtomicU64,
    success: AtomicU64,
    errors: AtomicU64,
    signatures_generated: AtomicU64,
    signatures_verified_ok: AtomicU64,
    signatures_verified_failed: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cumulative_latency_ms: AtomicU64,
    /// One counter per finite bucket plus the trailing infinity bucket.
    buckets: [AtomicU64; LATENCY_BUCKETS_MS.len() + 1],
    by_method: Mutex<HashMap<String, u64>>,
    started: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            success: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            signatures_generated: AtomicU64::new(0),
            signatures_verified_ok: AtomicU64::new(0),
            signatures_verified_failed: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cumulative_latency_ms: AtomicU64::new(0),
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            by_method: Mutex::new(HashMap::new()),
            started: Instant::now(),
        }
    }

    /// Record one completed request, successful or not.
    pub fn record_request(&self, method: &str, success: bool, latency_ms: u64) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if success {
            self.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        self.cumulative_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);

        for (i, bound) in LATENCY_BUCKETS_MS.iter().enumerate() {
            if latency_ms <= *bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
        self.buckets[LATENCY_BUCKETS_MS.len()].fetch_add(1, Ordering::Relaxed);

        *self
            .by_method
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_insert(0) += 1;
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_signature_generated(&self) {
        self.signatures_generated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_signature_verified(&self, success: bool) {
        if success {
            self.signatures_verified_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.signatures_verified_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    fn average_latency_ms(&self) -> f64 {
        let total = self.total.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        self.cumulative_latency_ms.load(Ordering::Relaxed) as f64 / total as f64
    }

    /// Prometheus text exposition.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let mut counter = |name: &str, help: &str, value: u64| {
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} counter");
            let _ = writeln!(out, "{name} {value}");
        };

        counter(
            "ens_compute_requests_total",
            "Total lookup requests received",
            self.total.load(Ordering::Relaxed),
        );
        counter(
            "ens_compute_requests_success_total",
            "Lookup requests answered successfully",
            self.success.load(Ordering::Relaxed),
        );
        counter(
            "ens_compute_requests_errors_total",
            "Lookup requests that failed",
            self.errors.load(Ordering::Relaxed),
        );
        counter(
            "ens_compute_cache_hits_total",
            "Compute result cache hits",
            self.cache_hits.load(Ordering::Relaxed),
        );
        counter(
            "ens_compute_cache_misses_total",
            "Compute result cache misses",
            self.cache_misses.load(Ordering::Relaxed),
        );

        let _ = writeln!(
            out,
            "# HELP ens_compute_latency_seconds Average request latency in seconds",
        );
        let _ = writeln!(out, "# TYPE ens_compute_latency_seconds gauge");
        let _ = writeln!(
            out,
            "ens_compute_latency_seconds {:.6}",
            self.average_latency_ms() / 1000.0,
        );
        out
    }

    /// JSON snapshot for `/api/metrics`.
    pub fn snapshot(&self) -> Value {
        let by_method: HashMap<String, u64> = self.by_method.lock().unwrap().clone();

        let mut distribution = serde_json::Map::new();
        for (i, bound) in LATENCY_BUCKETS_MS.iter().enumerate() {
            distribution.insert(
                format!("le_{bound}"),
                json!(self.buckets[i].load(Ordering::Relaxed)),
            );
        }
        distribution.insert(
            "le_inf".to_string(),
            json!(self.buckets[LATENCY_BUCKETS_MS.len()].load(Ordering::Relaxed)),
        );

        json!({
            "requests": {
                "total":     self.total.load(Ordering::Relaxed),
                "success":   self.success.load(Ordering::Relaxed),
                "errors":    self.errors.load(Ordering::Relaxed),
                "by_method": by_method,
            },
            "signatures": {
                "generated":       self.signatures_generated.load(Ordering::Relaxed),
                "verified_ok":     self.signatures_verified_ok.load(Ordering::Relaxed),
                "verified_failed": self.signatures_verified_failed.load(Ordering::Relaxed),
            },
            "cache": {
                "hits":   self.cache_hits.load(Ordering::Relaxed),
                "misses": self.cache_misses.load(Ordering::Relaxed),
            },
            "latency": {
                "average_ms":   self.average_latency_ms(),
                "distribution": distribution,
            },
            "uptime_seconds": self.uptime_secs(),
            "timestamp":      Utc::now().to_rfc3339(),
        })
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_is_cumulative() {
        let m = Metrics::new();
        m.record_request("pricefeed", true, 75);

        let snap = m.snapshot();
        let dist = &snap["latency"]["distribution"];
        // 75 ms falls above 10 and 50, inside 100 and everything wider.
        assert_eq!(dist["le_10"], 0);
        assert_eq!(dist["le_50"], 0);
        assert_eq!(dist["le_100"], 1);
        assert_eq!(dist["le_500"], 1);
        assert_eq!(dist["le_1000"], 1);
        assert_eq!(dist["le_5000"], 1);
        assert_eq!(dist["le_inf"], 1);
    }

    #[test]
    fn inf_bucket_counts_every_sample() {
        let m = Metrics::new();
        m.record_request("a", true, 1);
        m.record_request("a", true, 10_000);
        m.record_request("b", false, 200);

        let snap = m.snapshot();
        assert_eq!(snap["latency"]["distribution"]["le_inf"], 3);
        assert_eq!(snap["requests"]["total"], 3);
        assert_eq!(snap["requests"]["success"], 2);
        assert_eq!(snap["requests"]["errors"], 1);
        assert_eq!(snap["requests"]["by_method"]["a"], 2);
        assert_eq!(snap["requests"]["by_method"]["b"], 1);
    }

    #[test]
    fn bucket_boundary_is_inclusive() {
        let m = Metrics::new();
        m.record_request("a", true, 10);
        let snap = m.snapshot();
        assert_eq!(snap["latency"]["distribution"]["le_10"], 1);
    }

    #[test]
    fn text_exposition_has_fixed_names() {
        let m = Metrics::new();
        m.record_request("pricefeed", true, 20);
        m.record_request("pricefeed", false, 40);
        m.record_cache_hit();

        let text = m.render_text();
        assert!(text.contains("# TYPE ens_compute_requests_total counter"));
        assert!(text.contains("ens_compute_requests_total 2"));
        assert!(text.contains("ens_compute_requests_success_total 1"));
        assert!(text.contains("ens_compute_requests_errors_total 1"));
        assert!(text.contains("ens_compute_cache_hits_total 1"));
        assert!(text.contains("ens_compute_cache_misses_total 0"));
        assert!(text.contains("# TYPE ens_compute_latency_seconds gauge"));
        assert!(text.contains("ens_compute_latency_seconds 0.030000"));
    }

    #[test]
    fn signature_counters() {
        let m = Metrics::new();
        m.record_signature_generated();
        m.record_signature_verified(true);
        m.record_signature_verified(false);

        let snap = m.snapshot();
        assert_eq!(snap["signatures"]["generated"], 1);
        assert_eq!(snap["signatures"]["verified_ok"], 1);
        assert_eq!(snap["signatures"]["verified_failed"], 1);
    }

    #[test]
    fn average_latency_of_nothing_is_zero() {
        let m = Metrics::new();
        assert_eq!(m.average_latency_ms(), 0.0);
        assert!(m.render_text().contains("ens_compute_latency_seconds 0.000000"));
    }
}
