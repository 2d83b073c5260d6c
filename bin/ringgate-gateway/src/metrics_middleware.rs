//! Axum middleware recording `http_requests_completed` /
//! `http_request_latency_ms` for every request, grounded on the
//! teacher's operation-extracting metrics layer but simplified to the
//! route-shape this gateway actually serves (§6 URL surface).

use crate::metrics::{gateway_metrics, RouteLabel};
use axum::{body::Body, extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Collapse a concrete path into one of the low-cardinality route
/// labels from §6, so per-login/per-bucket/per-object values never
/// become Prometheus label values.
fn route_label(method: &str, path: &str) -> &'static str {
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        [_login, "buckets"] => "/:login/buckets",
        [_login, "buckets", _bucket] => "/:login/buckets/:bucket",
        [_login, "buckets", _bucket, "objects"] => "/:login/buckets/:bucket/objects",
        [_login, "buckets", _bucket, "objects", ..]
            if segments.last() == Some(&"metadata") =>
        {
            "/:login/buckets/:bucket/objects/:object/metadata"
        }
        [_login, "buckets", _bucket, "objects", ..] => "/:login/buckets/:bucket/objects/:object",
        ["metrics"] => "/metrics",
        _ => "/unmatched",
    }
    // method is folded into the label at the call site; this leaks no
    // identity-bearing data regardless of actual login/bucket/object.
}

fn leak_method(method: &axum::http::Method) -> &'static str {
    match method.as_str() {
        "GET" => "GET",
        "PUT" => "PUT",
        "POST" => "POST",
        "DELETE" => "DELETE",
        "HEAD" => "HEAD",
        "OPTIONS" => "OPTIONS",
        _ => "OTHER",
    }
}

pub async fn metrics_layer(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = leak_method(request.method());
    let path = request.uri().path().to_string();
    let route = route_label(method, &path);

    if route == "/metrics" {
        return next.run(request).await;
    }

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let latency_ms = start.elapsed().as_millis() as u64;

    gateway_metrics().record_request(
        RouteLabel { method, route },
        status,
        latency_ms,
        latency_ms,
    );

    response
}
