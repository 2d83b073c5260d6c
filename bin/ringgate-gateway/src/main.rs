//! Gateway entry point: wires the Placement Ring, Shard Client Pool,
//! storage collaborators, and Throttle into an axum `Router` serving
//! the routes from §2.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use rand::RngCore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ringgate_common::config::Config;
use ringgate_gateway::app_state::AppState;
use ringgate_gateway::collaborators::{HttpAuthorizer, HttpPlacementSource, HttpStorageNodeChooser};
use ringgate_gateway::throttle::Throttle;
use ringgate_gateway::{metrics, router};
use ringgate_ring::PlacementRing;
use ringgate_shard::ShardPool;
use ringgate_storage::StorageNodePool;

#[derive(Parser, Debug)]
#[command(name = "ringgate-gateway")]
#[command(about = "HTTP gateway for a distributed object store")]
#[command(version)]
struct Args {
    /// Configuration file path (TOML), overridable by RINGGATE_* env vars.
    #[arg(short, long)]
    config: Option<String>,

    /// Placement-data service URL (§4.1).
    #[arg(long, default_value = "http://localhost:9101/ring")]
    ring_source: String,

    /// Storage-node-inventory chooser URL (§4.6 `startSharkStreams`).
    #[arg(long, default_value = "http://localhost:9102/storage-nodes")]
    storage_chooser: String,

    /// Authorization-check service URL.
    #[arg(long, default_value = "http://localhost:9103/authorize")]
    authorizer: String,

    /// Log level.
    #[arg(long, default_value = "info")]
    log_level: String,
}

async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        metrics::gateway_metrics().export_prometheus(),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(args.config.as_deref())?;

    info!(ring_source = %args.ring_source, "bootstrapping placement ring");
    let http = reqwest::Client::new();
    let placement_source = Arc::new(HttpPlacementSource::new(http.clone(), args.ring_source.clone()));
    let ring = PlacementRing::bootstrap(placement_source)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bootstrap placement ring: {e}"))?;
    tokio::spawn(ring.clone().run_refresh_loop(config.ring.refresh_interval()));

    let shards = Arc::new(ShardPool::new());
    let storage_transport = Arc::new(StorageNodePool::new());
    let storage_chooser = Arc::new(HttpStorageNodeChooser::new(http.clone(), args.storage_chooser.clone()));
    let authorizer = Arc::new(HttpAuthorizer::new(http, args.authorizer.clone()));
    let throttle = Arc::new(Throttle::with_noop_observer(
        config.throttle.max_concurrent,
        config.throttle.max_queue_depth,
    ));

    // Signing key only has to be stable for this process's lifetime —
    // continuation tokens never outlive a restart.
    let mut listing_signing_key = vec![0u8; 32];
    rand::thread_rng().fill_bytes(&mut listing_signing_key);

    let state = AppState::new(
        ring,
        shards,
        storage_chooser,
        storage_transport,
        authorizer,
        throttle,
        config.clone(),
        listing_signing_key,
    );

    let app = router(state).layer(TraceLayer::new_for_http());

    let metrics_addr = config.network.metrics_listen;
    info!(%metrics_addr, "starting metrics endpoint");
    let metrics_listener = TcpListener::bind(metrics_addr).await?;
    let metrics_app = Router::new().route("/metrics", get(metrics_handler));
    tokio::spawn(async move {
        if let Err(err) = axum::serve(metrics_listener, metrics_app.into_make_service()).await {
            tracing::error!(%err, "metrics endpoint exited");
        }
    });

    let addr = config.network.listen;
    info!(%addr, "starting gateway");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("gateway shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received");
    // Give in-flight requests a moment to finish streaming before the
    // process actually exits.
    tokio::time::sleep(Duration::from_millis(50)).await;
}
