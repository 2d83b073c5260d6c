//! Gateway metrics for Prometheus (§6 Observability). Hand-rolled
//! atomics behind a global `OnceLock`, matching the counter/histogram
//! pair an `S3Metrics`-style collector exports, but scoped to the
//! metric names this gateway actually promises: request completion
//! counts and latency, streamed-byte counters, and deleted bytes.
//! Labels deliberately exclude remote IP, object owner, and caller
//! name to avoid cardinality explosion.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

const LATENCY_BUCKET_BOUNDARIES_MS: [u64; 11] =
    [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteLabel {
    pub method: &'static str,
    pub route: &'static str,
}

#[derive(Debug, Default)]
struct RouteMetrics {
    completed_2xx: AtomicU64,
    completed_4xx: AtomicU64,
    completed_5xx: AtomicU64,
    completed_other: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_buckets: [AtomicU64; 11],
    time_sum_ms: AtomicU64,
}

impl RouteMetrics {
    fn record_completion(&self, status: u16, latency_ms: u64, processing_ms: u64) {
        match status {
            200..=299 => self.completed_2xx.fetch_add(1, Ordering::Relaxed),
            400..=499 => self.completed_4xx.fetch_add(1, Ordering::Relaxed),
            500..=599 => self.completed_5xx.fetch_add(1, Ordering::Relaxed),
            _ => self.completed_other.fetch_add(1, Ordering::Relaxed),
        };
        self.latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.time_sum_ms.fetch_add(processing_ms, Ordering::Relaxed);
        for (i, &boundary) in LATENCY_BUCKET_BOUNDARIES_MS.iter().enumerate() {
            if latency_ms <= boundary {
                self.latency_buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn total(&self) -> u64 {
        self.completed_2xx.load(Ordering::Relaxed)
            + self.completed_4xx.load(Ordering::Relaxed)
            + self.completed_5xx.load(Ordering::Relaxed)
            + self.completed_other.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct GatewayMetrics {
    routes: RwLock<HashMap<RouteLabel, RouteMetrics>>,
    inbound_streamed_bytes: AtomicU64,
    outbound_streamed_bytes: AtomicU64,
    deleted_bytes: AtomicU64,
}

impl GatewayMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, label: RouteLabel, status: u16, latency_ms: u64, processing_ms: u64) {
        let routes = self.routes.read();
        if let Some(m) = routes.get(&label) {
            m.record_completion(status, latency_ms, processing_ms);
            return;
        }
        drop(routes);
        let mut routes = self.routes.write();
        routes
            .entry(label)
            .or_default()
            .record_completion(status, latency_ms, processing_ms);
    }

    pub fn add_inbound_bytes(&self, n: u64) {
        self.inbound_streamed_bytes.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_outbound_bytes(&self, n: u64) {
        self.outbound_streamed_bytes.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_deleted_bytes(&self, n: u64) {
        self.deleted_bytes.fetch_add(n, Ordering::Relaxed);
    }

    #[must_use]
    pub fn export_prometheus(&self) -> String {
        let mut out = String::with_capacity(4 * 1024);

        writeln!(out, "# HELP http_requests_completed Completed HTTP requests").unwrap();
        writeln!(out, "# TYPE http_requests_completed counter").unwrap();
        let routes = self.routes.read();
        for (label, m) in routes.iter() {
            for (status, count) in [
                ("2xx", m.completed_2xx.load(Ordering::Relaxed)),
                ("4xx", m.completed_4xx.load(Ordering::Relaxed)),
                ("5xx", m.completed_5xx.load(Ordering::Relaxed)),
            ] {
                writeln!(
                    out,
                    "http_requests_completed{{method=\"{}\",route=\"{}\",status=\"{}\"}} {}",
                    label.method, label.route, status, count
                )
                .unwrap();
            }
        }

        writeln!(out, "# HELP http_request_latency_ms End-to-end request latency").unwrap();
        writeln!(out, "# TYPE http_request_latency_ms histogram").unwrap();
        for (label, m) in routes.iter() {
            let total = m.total();
            let mut cumulative = 0u64;
            for (i, &boundary) in LATENCY_BUCKET_BOUNDARIES_MS.iter().enumerate() {
                cumulative += m.latency_buckets[i].load(Ordering::Relaxed);
                writeln!(
                    out,
                    "http_request_latency_ms_bucket{{method=\"{}\",route=\"{}\",le=\"{}\"}} {}",
                    label.method, label.route, boundary, cumulative
                )
                .unwrap();
            }
            writeln!(
                out,
                "http_request_latency_ms_bucket{{method=\"{}\",route=\"{}\",le=\"+Inf\"}} {}",
                label.method, label.route, total
            )
            .unwrap();
            writeln!(
                out,
                "http_request_latency_ms_sum{{method=\"{}\",route=\"{}\"}} {}",
                label.method,
                label.route,
                m.latency_sum_ms.load(Ordering::Relaxed)
            )
            .unwrap();
            writeln!(
                out,
                "http_request_latency_ms_count{{method=\"{}\",route=\"{}\"}} {}",
                label.method, label.route, total
            )
            .unwrap();
        }

        writeln!(out, "# HELP http_request_time_ms Handler processing time excluding body transfer").unwrap();
        writeln!(out, "# TYPE http_request_time_ms histogram").unwrap();
        for (label, m) in routes.iter() {
            writeln!(
                out,
                "http_request_time_ms_sum{{method=\"{}\",route=\"{}\"}} {}",
                label.method,
                label.route,
                m.time_sum_ms.load(Ordering::Relaxed)
            )
            .unwrap();
            writeln!(
                out,
                "http_request_time_ms_count{{method=\"{}\",route=\"{}\"}} {}",
                label.method,
                label.route,
                m.total()
            )
            .unwrap();
        }

        writeln!(out, "# HELP inbound_streamed_bytes Bytes streamed from clients into storage writes").unwrap();
        writeln!(out, "# TYPE inbound_streamed_bytes counter").unwrap();
        writeln!(
            out,
            "inbound_streamed_bytes {}",
            self.inbound_streamed_bytes.load(Ordering::Relaxed)
        )
        .unwrap();

        writeln!(out, "# HELP outbound_streamed_bytes Bytes streamed from storage reads to clients").unwrap();
        writeln!(out, "# TYPE outbound_streamed_bytes counter").unwrap();
        writeln!(
            out,
            "outbound_streamed_bytes {}",
            self.outbound_streamed_bytes.load(Ordering::Relaxed)
        )
        .unwrap();

        writeln!(out, "# HELP deleted_bytes Bytes freed by object deletion").unwrap();
        writeln!(out, "# TYPE deleted_bytes counter").unwrap();
        writeln!(out, "deleted_bytes {}", self.deleted_bytes.load(Ordering::Relaxed)).unwrap();

        out
    }
}

static GATEWAY_METRICS: std::sync::OnceLock<GatewayMetrics> = std::sync::OnceLock::new();

pub fn gateway_metrics() -> &'static GatewayMetrics {
    GATEWAY_METRICS.get_or_init(GatewayMetrics::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_exports_requests() {
        let m = GatewayMetrics::new();
        let label = RouteLabel { method: "GET", route: "/objects" };
        m.record_request(label, 200, 12, 8);
        m.record_request(label, 404, 3, 2);
        let out = m.export_prometheus();
        assert!(out.contains("http_requests_completed"));
        assert!(out.contains("status=\"2xx\""));
        assert!(out.contains("status=\"4xx\""));
    }

    #[test]
    fn tracks_streamed_and_deleted_bytes() {
        let m = GatewayMetrics::new();
        m.add_inbound_bytes(100);
        m.add_outbound_bytes(50);
        m.add_deleted_bytes(10);
        let out = m.export_prometheus();
        assert!(out.contains("inbound_streamed_bytes 100"));
        assert!(out.contains("outbound_streamed_bytes 50"));
        assert!(out.contains("deleted_bytes 10"));
    }
}
