//! Exercises the boundary scenarios against an in-process router built
//! from fakes: `FakeShardRpc`, `FakeStorageNodeChooser` +
//! `FakeStorageNodeTransport`, `SingleNodePlacementSource`, and
//! `AllowListAuthorizer::allow_all()`. No network, no real metadata
//! shard or storage node.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::Engine;
use tower::ServiceExt;
use uuid::Uuid;

use ringgate_auth::AllowListAuthorizer;
use ringgate_common::config::Config;
use ringgate_common::types::NodeId;
use ringgate_gateway::app_state::AppState;
use ringgate_gateway::throttle::Throttle;
use ringgate_ring::{PNode, PlacementRing, SingleNodePlacementSource};
use ringgate_shard::ShardPool;
use ringgate_shard::rpc::ShardRpc;
use ringgate_storage::{FakeStorageNodeChooser, FakeStorageNodeTransport, StorageNodeDescriptor};

const OWNER: &str = "11111111-1111-1111-1111-111111111111";

async fn build_app() -> axum::Router {
    let node_id = NodeId::new(Uuid::new_v4());
    let pnode = PNode {
        id: node_id,
        address: "http://shard.local".to_string(),
    };
    let placement_source = Arc::new(SingleNodePlacementSource::new(pnode.clone()));
    let ring = PlacementRing::bootstrap(placement_source).await.unwrap();

    let shards = Arc::new(ShardPool::new());
    let fake_shard: Arc<dyn ShardRpc> = Arc::new(ringgate_shard::FakeShardRpc::new());
    shards.insert_for_test(node_id, &pnode.address, fake_shard);

    let storage_node = StorageNodeDescriptor {
        storage_id: "storage-1".to_string(),
        datacenter: "dc1".to_string(),
        base_url: "http://storage-1.local".to_string(),
    };
    let storage_chooser = Arc::new(FakeStorageNodeChooser::new(vec![vec![storage_node]]));
    let storage_transport = Arc::new(FakeStorageNodeTransport::new());

    let authorizer = Arc::new(AllowListAuthorizer::allow_all());
    let throttle = Arc::new(Throttle::with_noop_observer(64, 1024));

    let state = AppState::new(
        ring,
        shards,
        storage_chooser,
        storage_transport,
        authorizer,
        throttle,
        Config::default(),
        vec![0u8; 32],
    );
    ringgate_gateway::router(state)
}

fn req(method: &str, uri: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-owner-id", OWNER)
        .header("x-roles", "admin")
}

#[tokio::test]
async fn scenario_1_bucket_name_validation() {
    let app = build_app().await;

    let resp = app
        .clone()
        .oneshot(req("PUT", "/alice/buckets/a-b").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .clone()
        .oneshot(
            req("PUT", "/alice/buckets/1.2.3.4")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let resp = app
        .oneshot(req("PUT", "/alice/buckets/ab").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn scenario_2_put_object_with_correct_content_md5() {
    let app = build_app().await;
    create_bucket(&app, "b").await;

    let body = b"hello world";
    let digest = base64::engine::general_purpose::STANDARD.encode(md5::compute(body).0);

    let resp = app
        .oneshot(
            req("PUT", "/alice/buckets/b/objects/k")
                .header("content-type", "text/plain")
                .header("content-length", body.len().to_string())
                .header("content-md5", digest.clone())
                .body(Body::from(body.to_vec()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let etag = resp.headers().get("etag").unwrap().to_str().unwrap();
    assert!(Uuid::parse_str(etag.trim_matches('"')).is_ok());
    let computed = resp.headers().get("computed-md5").unwrap().to_str().unwrap();
    assert_eq!(computed, digest);
}

#[tokio::test]
async fn scenario_3_put_object_with_corrupted_content_md5() {
    let app = build_app().await;
    create_bucket(&app, "b").await;

    let body = b"hello world";
    let resp = app
        .oneshot(
            req("PUT", "/alice/buckets/b/objects/k")
                .header("content-type", "text/plain")
                .header("content-length", body.len().to_string())
                .header("content-md5", "not-the-right-digest")
                .body(Body::from(body.to_vec()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn scenario_4_zero_byte_put() {
    let app = build_app().await;
    create_bucket(&app, "b").await;

    let resp = app
        .oneshot(
            req("PUT", "/alice/buckets/b/objects/empty")
                .header("content-type", "text/plain")
                .header("content-length", "0")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let computed = resp.headers().get("computed-md5").unwrap().to_str().unwrap();
    assert_eq!(computed, "1B2M2Y8AsgTpgAmY7PhCfg==");
}

#[tokio::test]
async fn scenario_7_conditional_get_not_modified() {
    let app = build_app().await;
    create_bucket(&app, "b").await;

    let body = b"conditional body";
    let digest = base64::engine::general_purpose::STANDARD.encode(md5::compute(body).0);
    let put_resp = app
        .clone()
        .oneshot(
            req("PUT", "/alice/buckets/b/objects/cond")
                .header("content-type", "text/plain")
                .header("content-length", body.len().to_string())
                .header("content-md5", digest)
                .body(Body::from(body.to_vec()))
                .unwrap(),
        )
        .await
        .unwrap();
    let etag = put_resp.headers().get("etag").unwrap().to_str().unwrap().to_string();

    let resp = app
        .oneshot(
            req("GET", "/alice/buckets/b/objects/cond")
                .header("if-none-match", etag.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(resp.headers().get("etag").unwrap().to_str().unwrap(), etag);
    assert!(resp.headers().get("last-modified").is_some());
}

#[tokio::test]
async fn scenario_8_delete_nonempty_bucket_conflicts() {
    let app = build_app().await;
    create_bucket(&app, "b").await;

    let body = b"x";
    let digest = base64::engine::general_purpose::STANDARD.encode(md5::compute(body).0);
    let put_resp = app
        .clone()
        .oneshot(
            req("PUT", "/alice/buckets/b/objects/only")
                .header("content-type", "text/plain")
                .header("content-length", body.len().to_string())
                .header("content-md5", digest)
                .body(Body::from(body.to_vec()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(put_resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .oneshot(
            req("DELETE", "/alice/buckets/b")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

async fn create_bucket(app: &axum::Router, name: &str) {
    let resp = app
        .clone()
        .oneshot(
            req("PUT", &format!("/alice/buckets/{name}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}
