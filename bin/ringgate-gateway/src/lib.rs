//! Library surface for the gateway binary, split out so integration
//! tests can drive the axum `Router` and its handlers directly against
//! in-process test doubles instead of a real placement/shard/storage
//! stack.

pub mod app_state;
pub mod collaborators;
pub mod conditional;
pub mod error_response;
pub mod fanout;
pub mod handlers;
pub mod metrics;
pub mod metrics_middleware;
pub mod pipeline;
pub mod read_failover;
pub mod records;
pub mod throttle;

use axum::routing::{delete, get, head, options, put};
use axum::Router;
use std::sync::Arc;

use app_state::AppState;

/// Build the router with every route from §2 wired to its handler,
/// plus the metrics middleware. Shared by `main.rs` and integration
/// tests so the two never drift apart.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/{login}/buckets", get(handlers::list_buckets))
        .route("/{login}/buckets", options(handlers::options_buckets))
        .route("/{login}/buckets/{bucket_name}", put(handlers::create_bucket))
        .route("/{login}/buckets/{bucket_name}", head(handlers::head_bucket))
        .route("/{login}/buckets/{bucket_name}", delete(handlers::delete_bucket))
        .route("/{login}/buckets/{bucket_name}/objects", get(handlers::list_objects))
        // Object names are 1-1024 UTF-8 bytes and may contain `/` (spec
        // §3), so the name segment has to be a wildcard capture, not a
        // single path segment. matchit ranks the literal `/metadata`
        // suffix route above the wildcard, so a name that genuinely ends
        // in `/metadata` is the one case that routes to the wrong
        // handler — an inherent ambiguity of layering a literal
        // sub-resource suffix on top of a slash-permissive key space.
        .route(
            "/{login}/buckets/{bucket_name}/objects/{*object_name}",
            put(handlers::create_object),
        )
        .route(
            "/{login}/buckets/{bucket_name}/objects/{*object_name}",
            get(handlers::get_object),
        )
        .route(
            "/{login}/buckets/{bucket_name}/objects/{*object_name}",
            head(handlers::head_object),
        )
        .route(
            "/{login}/buckets/{bucket_name}/objects/{*object_name}",
            delete(handlers::delete_object),
        )
        .route(
            "/{login}/buckets/{bucket_name}/objects/{object_name}/metadata",
            put(handlers::update_object),
        )
        .layer(axum::middleware::from_fn(metrics_middleware::metrics_layer))
        .with_state(state)
}
