//! The `ShardRpc` trait: the client-side contract this gateway speaks
//! against the out-of-scope metadata shard server, plus the concrete
//! `tonic`-backed implementation and the ergonomic domain records used
//! on this side of the wire (converted to/from the generated proto
//! types at the boundary, mirroring the teacher's `osd_pool.rs` helper
//! functions).

use async_trait::async_trait;
use ringgate_proto::shard::{self as wire, shard_service_client::ShardServiceClient};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tonic::transport::Channel;

const RPC_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ShardRpcError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("timed out")]
    Timeout,
    #[error("unrecognized upstream error: {0}")]
    Other(String),
}

#[derive(Debug, Clone, Default)]
pub struct Conditions {
    pub if_match: Option<Vec<String>>,
    pub if_none_match: Option<Vec<String>>,
    pub if_modified_since_unix_ms: Option<u64>,
    pub if_unmodified_since_unix_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shark {
    pub datacenter: String,
    pub storage_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketRecord {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub mtime_unix_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    pub id: String,
    pub name: String,
    pub name_hash: String,
    pub bucket_id: String,
    pub owner: String,
    pub content_length: u64,
    pub content_md5: String,
    pub content_type: String,
    pub headers: HashMap<String, String>,
    pub sharks: Vec<Shark>,
    pub storage_layout_version: u32,
    pub created_unix_ms: u64,
    pub modified_unix_ms: u64,
    pub roles: Vec<String>,
}

/// Client-side contract against a physical metadata shard. One RPC
/// call per Request Pipeline stage that needs metadata (§4.6).
#[async_trait]
pub trait ShardRpc: Send + Sync {
    async fn get_bucket(
        &self,
        owner: &str,
        name: &str,
        vnode: u32,
    ) -> Result<BucketRecord, ShardRpcError>;

    async fn create_bucket(
        &self,
        owner: &str,
        name: &str,
        vnode: u32,
    ) -> Result<BucketRecord, ShardRpcError>;

    async fn delete_bucket(&self, owner: &str, name: &str, vnode: u32)
    -> Result<(), ShardRpcError>;

    async fn list_buckets_page(
        &self,
        owner: &str,
        vnode: u32,
        marker: &str,
        limit: u32,
    ) -> Result<(Vec<BucketRecord>, bool), ShardRpcError>;

    async fn get_object(
        &self,
        owner: &str,
        bucket_id: &str,
        name: &str,
        vnode: u32,
        conditions: &Conditions,
    ) -> Result<ObjectRecord, ShardRpcError>;

    async fn create_object(
        &self,
        owner: &str,
        bucket_id: &str,
        name: &str,
        vnode: u32,
        conditions: &Conditions,
        object: ObjectRecord,
    ) -> Result<ObjectRecord, ShardRpcError>;

    async fn delete_object(
        &self,
        owner: &str,
        bucket_id: &str,
        name: &str,
        vnode: u32,
    ) -> Result<(), ShardRpcError>;

    async fn update_object(
        &self,
        owner: &str,
        bucket_id: &str,
        name: &str,
        vnode: u32,
        headers: HashMap<String, String>,
    ) -> Result<ObjectRecord, ShardRpcError>;

    async fn list_objects_page(
        &self,
        owner: &str,
        bucket_id: &str,
        vnode: u32,
        marker: &str,
        limit: u32,
        prefix: &str,
    ) -> Result<(Vec<ObjectRecord>, bool), ShardRpcError>;
}

pub struct TonicShardRpc {
    inner: tokio::sync::Mutex<ShardServiceClient<Channel>>,
}

impl TonicShardRpc {
    #[must_use]
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tokio::sync::Mutex::new(ShardServiceClient::new(channel)),
        }
    }

    fn status_to_error(status: tonic::Status) -> ShardRpcError {
        match status.code() {
            tonic::Code::NotFound => ShardRpcError::NotFound(status.message().to_string()),
            tonic::Code::AlreadyExists => ShardRpcError::Conflict(status.message().to_string()),
            tonic::Code::FailedPrecondition => {
                ShardRpcError::PreconditionFailed(status.message().to_string())
            }
            tonic::Code::DeadlineExceeded => ShardRpcError::Timeout,
            tonic::Code::Unavailable => ShardRpcError::Connection(status.message().to_string()),
            _ => ShardRpcError::Other(status.message().to_string()),
        }
    }

    async fn with_timeout<T>(
        fut: impl std::future::Future<Output = Result<T, tonic::Status>>,
    ) -> Result<T, ShardRpcError> {
        tokio::time::timeout(RPC_TIMEOUT, fut)
            .await
            .map_err(|_| ShardRpcError::Timeout)?
            .map_err(Self::status_to_error)
    }
}

fn conditions_to_wire(c: &Conditions) -> wire::Conditions {
    wire::Conditions {
        if_match: c.if_match.clone().unwrap_or_default(),
        if_none_match: c.if_none_match.clone().unwrap_or_default(),
        has_if_modified_since: c.if_modified_since_unix_ms.is_some(),
        if_modified_since_unix_ms: c.if_modified_since_unix_ms.unwrap_or_default(),
        has_if_unmodified_since: c.if_unmodified_since_unix_ms.is_some(),
        if_unmodified_since_unix_ms: c.if_unmodified_since_unix_ms.unwrap_or_default(),
    }
}

fn bucket_from_wire(b: wire::Bucket) -> BucketRecord {
    BucketRecord {
        id: b.id,
        name: b.name,
        owner: b.owner,
        mtime_unix_ms: b.mtime_unix_ms,
    }
}

fn object_from_wire(o: wire::BucketObject) -> ObjectRecord {
    ObjectRecord {
        id: o.id,
        name: o.name,
        name_hash: o.name_hash,
        bucket_id: o.bucket_id,
        owner: o.owner,
        content_length: o.content_length,
        content_md5: o.content_md5,
        content_type: o.content_type,
        headers: o.headers,
        sharks: o
            .sharks
            .into_iter()
            .map(|s| Shark {
                datacenter: s.datacenter,
                storage_id: s.storage_id,
            })
            .collect(),
        storage_layout_version: o.storage_layout_version,
        created_unix_ms: o.created_unix_ms,
        modified_unix_ms: o.modified_unix_ms,
        roles: o.roles,
    }
}

fn object_to_wire(o: ObjectRecord) -> wire::BucketObject {
    wire::BucketObject {
        id: o.id,
        name: o.name,
        name_hash: o.name_hash,
        bucket_id: o.bucket_id,
        owner: o.owner,
        content_length: o.content_length,
        content_md5: o.content_md5,
        content_type: o.content_type,
        headers: o.headers,
        sharks: o
            .sharks
            .into_iter()
            .map(|s| wire::Shark {
                datacenter: s.datacenter,
                storage_id: s.storage_id,
            })
            .collect(),
        storage_layout_version: o.storage_layout_version,
        created_unix_ms: o.created_unix_ms,
        modified_unix_ms: o.modified_unix_ms,
        roles: o.roles,
    }
}

#[async_trait]
impl ShardRpc for TonicShardRpc {
    async fn get_bucket(
        &self,
        owner: &str,
        name: &str,
        vnode: u32,
    ) -> Result<BucketRecord, ShardRpcError> {
        let req = wire::GetBucketRequest {
            owner: owner.to_string(),
            name: name.to_string(),
            vnode,
        };
        let mut client = self.inner.lock().await;
        let resp = Self::with_timeout(client.get_bucket(req)).await?;
        Ok(bucket_from_wire(resp.into_inner()))
    }

    async fn create_bucket(
        &self,
        owner: &str,
        name: &str,
        vnode: u32,
    ) -> Result<BucketRecord, ShardRpcError> {
        let req = wire::CreateBucketRequest {
            owner: owner.to_string(),
            name: name.to_string(),
            vnode,
        };
        let mut client = self.inner.lock().await;
        let resp = Self::with_timeout(client.create_bucket(req)).await?;
        Ok(bucket_from_wire(resp.into_inner()))
    }

    async fn delete_bucket(
        &self,
        owner: &str,
        name: &str,
        vnode: u32,
    ) -> Result<(), ShardRpcError> {
        let req = wire::DeleteBucketRequest {
            owner: owner.to_string(),
            name: name.to_string(),
            vnode,
        };
        let mut client = self.inner.lock().await;
        Self::with_timeout(client.delete_bucket(req)).await?;
        Ok(())
    }

    async fn list_buckets_page(
        &self,
        owner: &str,
        vnode: u32,
        marker: &str,
        limit: u32,
    ) -> Result<(Vec<BucketRecord>, bool), ShardRpcError> {
        let req = wire::ListBucketsPageRequest {
            owner: owner.to_string(),
            vnode,
            marker: marker.to_string(),
            limit,
        };
        let mut client = self.inner.lock().await;
        let resp = Self::with_timeout(client.list_buckets_page(req))
            .await?
            .into_inner();
        Ok((
            resp.buckets.into_iter().map(bucket_from_wire).collect(),
            resp.truncated,
        ))
    }

    async fn get_object(
        &self,
        owner: &str,
        bucket_id: &str,
        name: &str,
        vnode: u32,
        conditions: &Conditions,
    ) -> Result<ObjectRecord, ShardRpcError> {
        let req = wire::GetObjectRequest {
            owner: owner.to_string(),
            bucket_id: bucket_id.to_string(),
            name: name.to_string(),
            vnode,
            conditions: Some(conditions_to_wire(conditions)),
        };
        let mut client = self.inner.lock().await;
        let resp = Self::with_timeout(client.get_object(req)).await?;
        Ok(object_from_wire(resp.into_inner()))
    }

    async fn create_object(
        &self,
        owner: &str,
        bucket_id: &str,
        name: &str,
        vnode: u32,
        conditions: &Conditions,
        object: ObjectRecord,
    ) -> Result<ObjectRecord, ShardRpcError> {
        let req = wire::CreateObjectRequest {
            owner: owner.to_string(),
            bucket_id: bucket_id.to_string(),
            name: name.to_string(),
            vnode,
            conditions: Some(conditions_to_wire(conditions)),
            object: Some(object_to_wire(object)),
        };
        let mut client = self.inner.lock().await;
        let resp = Self::with_timeout(client.create_object(req)).await?;
        Ok(object_from_wire(resp.into_inner()))
    }

    async fn delete_object(
        &self,
        owner: &str,
        bucket_id: &str,
        name: &str,
        vnode: u32,
    ) -> Result<(), ShardRpcError> {
        let req = wire::DeleteObjectRequest {
            owner: owner.to_string(),
            bucket_id: bucket_id.to_string(),
            name: name.to_string(),
            vnode,
        };
        let mut client = self.inner.lock().await;
        Self::with_timeout(client.delete_object(req)).await?;
        Ok(())
    }

    async fn update_object(
        &self,
        owner: &str,
        bucket_id: &str,
        name: &str,
        vnode: u32,
        headers: HashMap<String, String>,
    ) -> Result<ObjectRecord, ShardRpcError> {
        let req = wire::UpdateObjectRequest {
            owner: owner.to_string(),
            bucket_id: bucket_id.to_string(),
            name: name.to_string(),
            vnode,
            headers,
        };
        let mut client = self.inner.lock().await;
        let resp = Self::with_timeout(client.update_object(req)).await?;
        Ok(object_from_wire(resp.into_inner()))
    }

    async fn list_objects_page(
        &self,
        owner: &str,
        bucket_id: &str,
        vnode: u32,
        marker: &str,
        limit: u32,
        prefix: &str,
    ) -> Result<(Vec<ObjectRecord>, bool), ShardRpcError> {
        let req = wire::ListObjectsPageRequest {
            owner: owner.to_string(),
            bucket_id: bucket_id.to_string(),
            vnode,
            marker: marker.to_string(),
            limit,
            prefix: prefix.to_string(),
        };
        let mut client = self.inner.lock().await;
        let resp = Self::with_timeout(client.list_objects_page(req))
            .await?
            .into_inner();
        Ok((
            resp.objects.into_iter().map(object_from_wire).collect(),
            resp.truncated,
        ))
    }
}
