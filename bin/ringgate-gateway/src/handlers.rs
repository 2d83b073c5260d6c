//! Bucket/Object Handlers (§2): thin per-verb glue composing the
//! Placement Ring, Shard Client Pool, Conditional Engine, and write
//! fan-out/read-failover streaming into OPTIONS/GET/HEAD/PUT/DELETE
//! and the metadata-update endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use serde::Deserialize;
use uuid::Uuid;

use ringgate_auth::{Action, AuthError, AuthorizeRequest};
use ringgate_common::checksum::ZERO_BYTE_MD5_BASE64;
use ringgate_common::types::{BucketName, ObjectId, ObjectKey, StorageLayoutVersion};
use ringgate_common::Error;
use ringgate_listing::{ListingError, ListingItem, MergePaginator, PageSource};
use ringgate_ring::RingError;
use ringgate_shard::rpc::{Conditions, ObjectRecord, Shark, ShardRpcError};
use ringgate_storage::StorageNodeDescriptor;

use crate::app_state::AppState;
use crate::conditional::{evaluate_read, parse_conditions, ReadOutcome};
use crate::error_response::{map_bucket_error, map_object_error, ApiError};
use crate::fanout::stream_to_replicas;
use crate::pipeline::resource_path;
use crate::read_failover::get_with_failover;
use crate::records::{BucketPageSource, ListableBucket, ListableObject, ObjectPageSource};

fn extract_identity(headers: &HeaderMap) -> Result<(Uuid, Vec<String>), Error> {
    let owner = headers
        .get("x-owner-id")
        .and_then(|v| v.to_str().ok())
        .ok_or(Error::AccessDenied)?;
    let owner = Uuid::parse_str(owner).map_err(|_| Error::AccessDenied)?;
    let roles = headers
        .get("x-roles")
        .and_then(|v| v.to_str().ok())
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Ok((owner, roles))
}

fn map_auth_error(e: AuthError) -> Error {
    match e {
        AuthError::Denied => Error::AccessDenied,
        AuthError::Unavailable(message) => Error::ServiceUnavailable { message },
    }
}

fn map_ring_error(e: RingError) -> Error {
    Error::internal_with_cause("placement ring lookup failed", e)
}

fn map_listing_error(e: ListingError) -> Error {
    match e {
        ListingError::MarkerRegressed { .. } => Error::invalid_argument("marker"),
        ListingError::Upstream(message) => Error::internal_with_cause("listing error", message),
    }
}

/// `m-*` user metadata plus the small whitelisted first-class header
/// set (§4.6 `parseArguments`, §9 CORS design note) that rides along
/// on the stored object.
fn collect_stored_headers(headers: &HeaderMap, max_bytes: usize) -> Result<HashMap<String, String>, Error> {
    let mut out = HashMap::new();
    let mut total = 0usize;
    for (name, value) in headers.iter() {
        let name_str = name.as_str();
        let keep = name_str.starts_with("m-")
            || name_str.starts_with("access-control-")
            || name_str == "cache-control"
            || name_str == "surrogate-key";
        if !keep {
            continue;
        }
        let v = value
            .to_str()
            .map_err(|_| Error::invalid_request("header value is not valid UTF-8"))?;
        total += name_str.len() + v.len();
        out.insert(name_str.to_string(), v.to_string());
    }
    if total > max_bytes {
        return Err(Error::invalid_request(format!(
            "user metadata exceeds {max_bytes} bytes"
        )));
    }
    Ok(out)
}

async fn authorize(
    state: &AppState,
    owner: Uuid,
    roles: Vec<String>,
    action: &str,
    login: &str,
    bucket_name: Option<&str>,
    object_name: Option<&str>,
) -> Result<(), Error> {
    let request = AuthorizeRequest::new(
        owner,
        Action::new(action),
        resource_path(login, bucket_name, object_name),
        roles,
    );
    state
        .authorizer
        .authorize(&request)
        .await
        .map_err(map_auth_error)
}

pub async fn options_buckets() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
    pub marker: Option<String>,
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
}

pub async fn list_buckets(
    State(state): State<Arc<AppState>>,
    Path(login): Path<String>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let (owner, roles) = extract_identity(&headers)?;
    authorize(&state, owner, roles, "ListBuckets", &login, None, None).await?;
    let _admission = state.throttle.admit().await?;

    let limit = query
        .limit
        .unwrap_or(state.config.s3.default_list_limit)
        .clamp(1, state.config.s3.max_list_limit);

    let snapshot = state.ring.current();
    let mut sources: Vec<Box<dyn PageSource<ListableBucket>>> = Vec::new();
    for loc in snapshot.all_nodes() {
        state
            .shards
            .connect(loc.pnode.id, &loc.pnode.address)
            .await
            .map_err(from_generic_shard_error)?;
        let shard = state
            .shards
            .get_client(loc.pnode.id)
            .ok_or_else(|| Error::internal("shard client missing after connect"))?;
        sources.push(Box::new(BucketPageSource {
            shard,
            owner: owner.to_string(),
            vnode: loc.vnode,
        }));
    }

    let mut paginator = match query.marker.as_deref() {
        Some(token) => MergePaginator::from_continuation_token(
            sources,
            limit,
            token,
            state.listing_signing_key.clone(),
        )
        .map_err(map_listing_error)?,
        None => MergePaginator::new(sources, limit, vec![], "", None, state.listing_signing_key.clone()),
    };
    let page = paginator.next_page(limit).await.map_err(map_listing_error)?;

    let mut body = String::new();
    for item in &page.items {
        let line = match item {
            ListingItem::Object(b) => serde_json::json!({
                "type": "bucket",
                "id": b.0.id,
                "name": b.0.name,
                "owner": b.0.owner,
                "mtime": b.0.mtime_unix_ms,
            }),
            ListingItem::CommonPrefix(p) => serde_json::json!({ "name": p, "type": "group" }),
        };
        body.push_str(&line.to_string());
        body.push('\n');
    }
    Ok(ndjson_response(body, &page.next_token, page.finished))
}

pub async fn create_bucket(
    State(state): State<Arc<AppState>>,
    Path((login, bucket_name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (owner, roles) = extract_identity(&headers)?;
    let name = BucketName::parse(&bucket_name)
        .map_err(|e| Error::InvalidBucketName { reason: e.to_string() })?;
    authorize(&state, owner, roles, "CreateBucket", &login, Some(name.as_str()), None).await?;
    let _admission = state.throttle.admit().await?;

    let loc = state
        .ring
        .current()
        .locate(&format!("{owner}:{}", name.as_str()))
        .map_err(map_ring_error)?;
    state
        .shards
        .connect(loc.pnode.id, &loc.pnode.address)
        .await
        .map_err(|e| map_bucket_error(e, name.as_str()))?;
    let shard = state
        .shards
        .get_client(loc.pnode.id)
        .ok_or_else(|| Error::internal("shard client missing after connect"))?;
    shard
        .create_bucket(&owner.to_string(), name.as_str(), loc.vnode)
        .await
        .map_err(|e| map_bucket_error(e, name.as_str()))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn head_bucket(
    State(state): State<Arc<AppState>>,
    Path((login, bucket_name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (owner, roles) = extract_identity(&headers)?;
    let name = BucketName::parse(&bucket_name)
        .map_err(|e| Error::InvalidBucketName { reason: e.to_string() })?;
    authorize(&state, owner, roles, "HeadBucket", &login, Some(name.as_str()), None).await?;
    let _admission = state.throttle.admit().await?;

    let loc = state
        .ring
        .current()
        .locate(&format!("{owner}:{}", name.as_str()))
        .map_err(map_ring_error)?;
    state
        .shards
        .connect(loc.pnode.id, &loc.pnode.address)
        .await
        .map_err(|e| map_bucket_error(e, name.as_str()))?;
    let shard = state
        .shards
        .get_client(loc.pnode.id)
        .ok_or_else(|| Error::internal("shard client missing after connect"))?;
    shard
        .get_bucket(&owner.to_string(), name.as_str(), loc.vnode)
        .await
        .map_err(|e| map_bucket_error(e, name.as_str()))?;
    Ok(StatusCode::OK.into_response())
}

pub async fn delete_bucket(
    State(state): State<Arc<AppState>>,
    Path((login, bucket_name)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (owner, roles) = extract_identity(&headers)?;
    let name = BucketName::parse(&bucket_name)
        .map_err(|e| Error::InvalidBucketName { reason: e.to_string() })?;
    authorize(&state, owner, roles, "DeleteBucket", &login, Some(name.as_str()), None).await?;
    let _admission = state.throttle.admit().await?;

    let loc = state
        .ring
        .current()
        .locate(&format!("{owner}:{}", name.as_str()))
        .map_err(map_ring_error)?;
    state
        .shards
        .connect(loc.pnode.id, &loc.pnode.address)
        .await
        .map_err(|e| map_bucket_error(e, name.as_str()))?;
    let shard = state
        .shards
        .get_client(loc.pnode.id)
        .ok_or_else(|| Error::internal("shard client missing after connect"))?;
    shard
        .delete_bucket(&owner.to_string(), name.as_str(), loc.vnode)
        .await
        .map_err(|e| map_bucket_error(e, name.as_str()))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn list_objects(
    State(state): State<Arc<AppState>>,
    Path((login, bucket_name)): Path<(String, String)>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError> {
    let (owner, roles) = extract_identity(&headers)?;
    let name = BucketName::parse(&bucket_name)
        .map_err(|e| Error::InvalidBucketName { reason: e.to_string() })?;
    authorize(&state, owner, roles, "ListObjects", &login, Some(name.as_str()), None).await?;
    let _admission = state.throttle.admit().await?;

    let snapshot = state.ring.current();
    let bucket_loc = snapshot
        .locate(&format!("{owner}:{}", name.as_str()))
        .map_err(map_ring_error)?;
    state
        .shards
        .connect(bucket_loc.pnode.id, &bucket_loc.pnode.address)
        .await
        .map_err(|e| map_bucket_error(e, name.as_str()))?;
    let bucket_shard = state
        .shards
        .get_client(bucket_loc.pnode.id)
        .ok_or_else(|| Error::internal("shard client missing after connect"))?;
    let bucket = bucket_shard
        .get_bucket(&owner.to_string(), name.as_str(), bucket_loc.vnode)
        .await
        .map_err(|e| map_bucket_error(e, name.as_str()))?;

    let limit = query
        .limit
        .unwrap_or(state.config.s3.default_list_limit)
        .clamp(1, state.config.s3.max_list_limit);
    let prefix = query.prefix.clone().unwrap_or_default();

    let mut sources: Vec<Box<dyn PageSource<ListableObject>>> = Vec::new();
    for loc in snapshot.all_nodes() {
        state
            .shards
            .connect(loc.pnode.id, &loc.pnode.address)
            .await
            .map_err(from_generic_shard_error)?;
        let shard = state
            .shards
            .get_client(loc.pnode.id)
            .ok_or_else(|| Error::internal("shard client missing after connect"))?;
        sources.push(Box::new(ObjectPageSource {
            shard,
            owner: owner.to_string(),
            bucket_id: bucket.id.clone(),
            vnode: loc.vnode,
            prefix: prefix.clone(),
        }));
    }

    let mut paginator = match query.marker.as_deref() {
        Some(token) => MergePaginator::from_continuation_token(
            sources,
            limit,
            token,
            state.listing_signing_key.clone(),
        )
        .map_err(map_listing_error)?,
        None => MergePaginator::new(
            sources,
            limit,
            vec![],
            prefix,
            query.delimiter.clone(),
            state.listing_signing_key.clone(),
        ),
    };
    let page = paginator.next_page(limit).await.map_err(map_listing_error)?;

    let mut body = String::new();
    for item in &page.items {
        let line = match item {
            ListingItem::Object(o) => serde_json::json!({
                "type": "bucketobject",
                "id": o.0.id,
                "name": o.0.name,
                "contentLength": o.0.content_length,
                "contentType": o.0.content_type,
                "etag": o.0.id,
                "modified": o.0.modified_unix_ms,
            }),
            ListingItem::CommonPrefix(p) => serde_json::json!({ "name": p, "type": "group" }),
        };
        body.push_str(&line.to_string());
        body.push('\n');
    }
    Ok(ndjson_response(body, &page.next_token, page.finished))
}

fn from_generic_shard_error(e: ShardRpcError) -> Error {
    crate::error_response::from_shard_error(e)
}

fn ndjson_response(body: String, next_token: &Option<String>, finished: bool) -> Response {
    let mut response = (StatusCode::OK, body).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/x-ndjson"));
    if !finished {
        if let Some(token) = next_token {
            if let Ok(v) = HeaderValue::from_str(token) {
                response.headers_mut().insert("next-marker", v);
            }
        }
    }
    response
}

/// Resolve `{vnode, pnode}` for the bucket, fetch it, and return the
/// connected shard client + bucket record (shared by every object
/// operation, which all need the bucket first).
async fn load_bucket(
    state: &AppState,
    owner: Uuid,
    name: &BucketName,
) -> Result<(Arc<dyn ringgate_shard::rpc::ShardRpc>, ringgate_shard::rpc::BucketRecord), Error> {
    let loc = state
        .ring
        .current()
        .locate(&format!("{owner}:{}", name.as_str()))
        .map_err(map_ring_error)?;
    state
        .shards
        .connect(loc.pnode.id, &loc.pnode.address)
        .await
        .map_err(|e| map_bucket_error(e, name.as_str()))?;
    let shard = state
        .shards
        .get_client(loc.pnode.id)
        .ok_or_else(|| Error::internal("shard client missing after connect"))?;
    let bucket = shard
        .get_bucket(&owner.to_string(), name.as_str(), loc.vnode)
        .await
        .map_err(|e| map_bucket_error(e, name.as_str()))?;
    Ok((shard, bucket))
}

async fn load_object_shard(
    state: &AppState,
    owner: Uuid,
    bucket_id: &str,
    object_key: &ObjectKey,
) -> Result<(Arc<dyn ringgate_shard::rpc::ShardRpc>, u32), Error> {
    let loc = state
        .ring
        .current()
        .locate(&format!("{owner}:{bucket_id}:{}", object_key.name_hash_hex()))
        .map_err(map_ring_error)?;
    state
        .shards
        .connect(loc.pnode.id, &loc.pnode.address)
        .await
        .map_err(from_generic_shard_error)?;
    let shard = state
        .shards
        .get_client(loc.pnode.id)
        .ok_or_else(|| Error::internal("shard client missing after connect"))?;
    Ok((shard, loc.vnode))
}

/// `maybeGetObject` (§4.6 conditional peek for create): when the
/// request carries any `If-*` header, peek the current object with
/// the condition subset the metadata tier accepts — `If-Match`,
/// `If-None-Match`, `If-Unmodified-Since` — strictly before opening
/// shark streams. `ObjectNotFound` is swallowed so a create against a
/// missing object can proceed; any other shard error, including a
/// failed precondition, aborts the request before a byte is streamed.
async fn maybe_get_object(
    object_shard: &Arc<dyn ringgate_shard::rpc::ShardRpc>,
    owner: Uuid,
    bucket_id: &str,
    object_key: &ObjectKey,
    vnode: u32,
    conditions: &Conditions,
    bucket_name: &str,
) -> Result<(), Error> {
    if conditions.if_match.is_none()
        && conditions.if_none_match.is_none()
        && conditions.if_unmodified_since_unix_ms.is_none()
    {
        return Ok(());
    }
    let peek_conditions = Conditions {
        if_match: conditions.if_match.clone(),
        if_none_match: conditions.if_none_match.clone(),
        if_unmodified_since_unix_ms: conditions.if_unmodified_since_unix_ms,
        if_modified_since_unix_ms: None,
    };
    match object_shard
        .get_object(&owner.to_string(), bucket_id, object_key.as_str(), vnode, &peek_conditions)
        .await
    {
        Ok(_) | Err(ShardRpcError::NotFound(_)) => Ok(()),
        Err(e) => Err(map_object_error(e, bucket_name, object_key.as_str())),
    }
}

pub async fn create_object(
    State(state): State<Arc<AppState>>,
    Path((login, bucket_name, object_name)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    let (owner, roles) = extract_identity(&headers)?;
    let bucket_name = BucketName::parse(&bucket_name)
        .map_err(|e| Error::InvalidBucketName { reason: e.to_string() })?;
    let object_key = ObjectKey::parse(&object_name)
        .map_err(|e| Error::InvalidObjectKey { reason: e.to_string() })?;
    authorize(
        &state,
        owner,
        roles,
        "CreateObject",
        &login,
        Some(bucket_name.as_str()),
        Some(object_key.as_str()),
    )
    .await?;
    let _admission = state.throttle.admit().await?;

    let (_bucket_shard, bucket) = load_bucket(&state, owner, &bucket_name).await?;
    let (object_shard, vnode) = load_object_shard(&state, owner, &bucket.id, &object_key).await?;
    let conditions = parse_conditions(&headers);
    maybe_get_object(
        &object_shard,
        owner,
        &bucket.id,
        &object_key,
        vnode,
        &conditions,
        bucket_name.as_str(),
    )
    .await?;

    let content_length: u64 = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::invalid_request("Content-Length is required"))?;
    if content_length > state.config.s3.max_object_size {
        return Err(Error::EntityTooLarge {
            size: content_length,
            max: state.config.s3.max_object_size,
        }
        .into());
    }
    let requested_durability: Option<u8> = headers
        .get("durability-level")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok());
    let args = crate::pipeline::parse_write_arguments(
        content_length,
        requested_durability,
        state.config.s3.default_durability_level,
        state.config.s3.max_durability_level,
    );

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::invalid_request("Content-Type is required"))?
        .to_string();
    let stored_headers = collect_stored_headers(&headers, state.config.s3.max_user_metadata_bytes)?;

    let object_id = ObjectId::from(args.object_id);
    let (content_md5, sharks) = if args.zero_byte_fast_path {
        (ZERO_BYTE_MD5_BASE64.to_string(), Vec::new())
    } else {
        let object_path = StorageLayoutVersion::current().path_for(object_id, &object_key.name_hash_hex());
        let candidate_sets = state
            .storage_chooser
            .choose(args.durability_level)
            .await
            .map_err(|_| Error::SharksExhausted { retry_after_secs: 30 })?;
        let Some(first_set) = candidate_sets.first() else {
            return Err(Error::SharksExhausted { retry_after_secs: 30 }.into());
        };

        let data_stream = body.into_data_stream().map_err(|e| e.to_string());
        let result = stream_to_replicas(
            data_stream,
            content_length,
            state.config.stream.check_stream_idle_timeout(),
            state.storage_transport.as_ref(),
            &object_path,
            first_set,
        )
        .await?;

        if let Some(declared) = headers.get("content-md5").and_then(|v| v.to_str().ok()) {
            if declared != result.digest_base64 {
                return Err(Error::ContentMd5Invalid.into());
            }
        }

        let sharks: Vec<Shark> = first_set
            .iter()
            .map(|n| Shark {
                datacenter: n.datacenter.clone(),
                storage_id: n.storage_id.clone(),
            })
            .collect();
        crate::metrics::gateway_metrics().add_inbound_bytes(result.bytes_seen);
        (result.digest_base64, sharks)
    };

    let record = ObjectRecord {
        id: object_id.to_string(),
        name: object_key.as_str().to_string(),
        name_hash: object_key.name_hash_hex(),
        bucket_id: bucket.id.clone(),
        owner: owner.to_string(),
        content_length,
        content_md5,
        content_type,
        headers: stored_headers,
        sharks,
        storage_layout_version: 2,
        created_unix_ms: 0,
        modified_unix_ms: 0,
        roles: vec![],
    };
    let created = object_shard
        .create_object(&owner.to_string(), &bucket.id, object_key.as_str(), vnode, &conditions, record)
        .await
        .map_err(|e| map_object_error(e, bucket_name.as_str(), object_key.as_str()))?;

    let mut response = StatusCode::NO_CONTENT.into_response();
    let hdrs = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&format!("\"{}\"", created.id)) {
        hdrs.insert(header::ETAG, v);
    }
    if let Ok(v) = HeaderValue::from_str(&created.content_md5) {
        hdrs.insert("computed-md5", v);
    }
    Ok(response)
}

pub async fn get_object(
    State(state): State<Arc<AppState>>,
    Path((login, bucket_name, object_name)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    read_object(state, login, bucket_name, object_name, headers, true).await
}

pub async fn head_object(
    State(state): State<Arc<AppState>>,
    Path((login, bucket_name, object_name)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    read_object(state, login, bucket_name, object_name, headers, false).await
}

async fn read_object(
    state: Arc<AppState>,
    login: String,
    bucket_name: String,
    object_name: String,
    headers: HeaderMap,
    with_body: bool,
) -> Result<Response, ApiError> {
    let (owner, roles) = extract_identity(&headers)?;
    let bucket_name = BucketName::parse(&bucket_name)
        .map_err(|e| Error::InvalidBucketName { reason: e.to_string() })?;
    let object_key = ObjectKey::parse(&object_name)
        .map_err(|e| Error::InvalidObjectKey { reason: e.to_string() })?;
    let action = if with_body { "GetObject" } else { "HeadObject" };
    authorize(
        &state,
        owner,
        roles,
        action,
        &login,
        Some(bucket_name.as_str()),
        Some(object_key.as_str()),
    )
    .await?;
    let _admission = state.throttle.admit().await?;

    let (_bucket_shard, bucket) = load_bucket(&state, owner, &bucket_name).await?;
    let (object_shard, vnode) = load_object_shard(&state, owner, &bucket.id, &object_key).await?;

    let conditions = parse_conditions(&headers);
    let object = object_shard
        .get_object(&owner.to_string(), &bucket.id, object_key.as_str(), vnode, &conditions)
        .await
        .map_err(|e| map_object_error(e, bucket_name.as_str(), object_key.as_str()))?;

    let last_modified = object.modified_unix_ms;
    if evaluate_read(&conditions, &object.id, last_modified) == ReadOutcome::NotModified {
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        insert_etag_and_last_modified(response.headers_mut(), &object.id, last_modified);
        return Ok(response);
    }

    if !with_body || object.content_length == 0 {
        let mut response = StatusCode::OK.into_response();
        insert_read_headers(response.headers_mut(), &object);
        return Ok(response);
    }

    let nodes = resolve_sharks(&state, &object.sharks).await?;
    let outcome = get_with_failover(state.storage_transport.as_ref(), &nodes, &object_path_for(&object)).await?;

    let mut response = Response::builder().status(StatusCode::OK);
    {
        let hdrs = response.headers_mut().expect("builder still open");
        insert_read_headers(hdrs, &object);
    }
    crate::metrics::gateway_metrics().add_outbound_bytes(object.content_length);
    let body = Body::from_stream(outcome.body);
    Ok(response
        .body(body)
        .map_err(|e| Error::internal_with_cause("failed to build response", e))?)
}

fn object_path_for(o: &ObjectRecord) -> String {
    let object_id = Uuid::parse_str(&o.id).unwrap_or_else(|_| Uuid::nil());
    StorageLayoutVersion::current()
        .path_for(ObjectId::from(object_id), &o.name_hash)
}

async fn resolve_sharks(state: &AppState, sharks: &[Shark]) -> Result<Vec<StorageNodeDescriptor>, Error> {
    let mut nodes = Vec::with_capacity(sharks.len());
    for shark in sharks {
        let node = state
            .storage_chooser
            .resolve(&shark.storage_id)
            .await
            .map_err(|e| Error::internal_with_cause("could not resolve storage node", e))?;
        nodes.push(node);
    }
    Ok(nodes)
}

fn insert_etag_and_last_modified(headers: &mut HeaderMap, etag: &str, last_modified_unix_ms: u64) {
    if let Ok(v) = HeaderValue::from_str(&format!("\"{etag}\"")) {
        headers.insert(header::ETAG, v);
    }
    if let Ok(v) = HeaderValue::from_str(&last_modified_unix_ms.to_string()) {
        headers.insert("last-modified", v);
    }
}

fn insert_read_headers(headers: &mut HeaderMap, object: &ObjectRecord) {
    insert_etag_and_last_modified(headers, &object.id, object.modified_unix_ms);
    if let Ok(v) = HeaderValue::from_str(&object.content_md5) {
        headers.insert("content-md5", v);
    }
    if let Ok(v) = HeaderValue::from_str(&object.content_type) {
        headers.insert(header::CONTENT_TYPE, v);
    }
    if let Ok(v) = HeaderValue::from_str(&object.content_length.to_string()) {
        headers.insert(header::CONTENT_LENGTH, v);
    }
    let durability = if object.sharks.is_empty() { 0 } else { object.sharks.len() };
    if let Ok(v) = HeaderValue::from_str(&durability.to_string()) {
        headers.insert("durability-level", v);
    }
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
}

pub async fn delete_object(
    State(state): State<Arc<AppState>>,
    Path((login, bucket_name, object_name)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (owner, roles) = extract_identity(&headers)?;
    let bucket_name = BucketName::parse(&bucket_name)
        .map_err(|e| Error::InvalidBucketName { reason: e.to_string() })?;
    let object_key = ObjectKey::parse(&object_name)
        .map_err(|e| Error::InvalidObjectKey { reason: e.to_string() })?;
    authorize(
        &state,
        owner,
        roles,
        "DeleteObject",
        &login,
        Some(bucket_name.as_str()),
        Some(object_key.as_str()),
    )
    .await?;
    let _admission = state.throttle.admit().await?;

    let (_bucket_shard, bucket) = load_bucket(&state, owner, &bucket_name).await?;
    let (object_shard, vnode) = load_object_shard(&state, owner, &bucket.id, &object_key).await?;
    let object = object_shard
        .get_object(&owner.to_string(), &bucket.id, object_key.as_str(), vnode, &Conditions::default())
        .await
        .map_err(|e| map_object_error(e, bucket_name.as_str(), object_key.as_str()))?;
    object_shard
        .delete_object(&owner.to_string(), &bucket.id, object_key.as_str(), vnode)
        .await
        .map_err(|e| map_object_error(e, bucket_name.as_str(), object_key.as_str()))?;
    crate::metrics::gateway_metrics().add_deleted_bytes(object.content_length);
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn update_object(
    State(state): State<Arc<AppState>>,
    Path((login, bucket_name, object_name)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let (owner, roles) = extract_identity(&headers)?;
    let bucket_name = BucketName::parse(&bucket_name)
        .map_err(|e| Error::InvalidBucketName { reason: e.to_string() })?;
    let object_key = ObjectKey::parse(&object_name)
        .map_err(|e| Error::InvalidObjectKey { reason: e.to_string() })?;
    authorize(
        &state,
        owner,
        roles,
        "UpdateObject",
        &login,
        Some(bucket_name.as_str()),
        Some(object_key.as_str()),
    )
    .await?;
    let _admission = state.throttle.admit().await?;

    let (_bucket_shard, bucket) = load_bucket(&state, owner, &bucket_name).await?;
    let (object_shard, vnode) = load_object_shard(&state, owner, &bucket.id, &object_key).await?;
    let new_headers = collect_stored_headers(&headers, state.config.s3.max_user_metadata_bytes)?;
    object_shard
        .update_object(&owner.to_string(), &bucket.id, object_key.as_str(), vnode, new_headers)
        .await
        .map_err(|e| map_object_error(e, bucket_name.as_str(), object_key.as_str()))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
