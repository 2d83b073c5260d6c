//! The Shard Client Pool (§4.2): one long-lived RPC client per
//! physical metadata node, looked up by pnode id, plus the `ShardRpc`
//! client-side contract against the out-of-scope metadata shard
//! server.
//!
//! Pooling follows the teacher's `osd_pool.rs` double-checked-locking
//! pattern: a write lock is taken only to check-then-insert, the
//! network connect happens with no lock held, and a second check
//! guards against a concurrent connect to the same node winning the
//! race.

pub mod rpc;

use async_trait::async_trait;
use parking_lot::RwLock;
use ringgate_common::types::NodeId;
pub use rpc::{
    BucketRecord, Conditions, ObjectRecord, Shark, ShardRpc, ShardRpcError,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

struct PoolEntry {
    address: String,
    client: Arc<dyn ShardRpc>,
}

/// Connection pool keyed by `NodeId`, one client per physical shard.
pub struct ShardPool {
    nodes: RwLock<HashMap<NodeId, PoolEntry>>,
    address_to_node: RwLock<HashMap<String, NodeId>>,
}

impl Default for ShardPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardPool {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            address_to_node: RwLock::new(HashMap::new()),
        }
    }

    /// Open (or reuse) a client for `node_id` at `address`. Idempotent:
    /// a second call for the same address returns the existing client
    /// even if presented under a different `node_id`, mirroring the
    /// teacher's address-based dedup.
    pub async fn connect(&self, node_id: NodeId, address: &str) -> Result<(), ShardRpcError> {
        if self.nodes.read().contains_key(&node_id) {
            return Ok(());
        }
        if let Some(&existing) = self.address_to_node.read().get(address) {
            if existing != node_id {
                tracing::debug!(address, "address already pooled under a different node id");
            }
            return Ok(());
        }

        let channel = tonic::transport::Endpoint::from_shared(address.to_string())
            .map_err(|e| ShardRpcError::Connection(e.to_string()))?
            .connect_timeout(CONNECT_TIMEOUT)
            .connect()
            .await
            .map_err(|e| ShardRpcError::Connection(e.to_string()))?;
        let client: Arc<dyn ShardRpc> = Arc::new(rpc::TonicShardRpc::new(channel));

        let mut nodes = self.nodes.write();
        let mut addrs = self.address_to_node.write();
        if nodes.contains_key(&node_id) {
            return Ok(());
        }
        nodes.insert(
            node_id,
            PoolEntry {
                address: address.to_string(),
                client,
            },
        );
        addrs.insert(address.to_string(), node_id);
        Ok(())
    }

    #[must_use]
    pub fn get_client(&self, node_id: NodeId) -> Option<Arc<dyn ShardRpc>> {
        self.nodes.read().get(&node_id).map(|e| e.client.clone())
    }

    pub fn disconnect(&self, node_id: NodeId) {
        if let Some(entry) = self.nodes.write().remove(&node_id) {
            self.address_to_node.write().remove(&entry.address);
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    /// Insert a pre-built client directly — used by tests to register
    /// a `FakeShardRpc` without a real network connection.
    pub fn insert_for_test(&self, node_id: NodeId, address: &str, client: Arc<dyn ShardRpc>) {
        self.nodes.write().insert(
            node_id,
            PoolEntry {
                address: address.to_string(),
                client,
            },
        );
        self.address_to_node
            .write()
            .insert(address.to_string(), node_id);
    }
}

/// Fake in-process implementation of the shard RPC surface, for
/// exercising the Request Pipeline's boundary scenarios without a real
/// metadata shard.
#[derive(Default)]
pub struct FakeShardRpc {
    state: parking_lot::Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    buckets: HashMap<(String, String), BucketRecord>,
    objects: HashMap<(String, String), ObjectRecord>,
}

impl FakeShardRpc {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ShardRpc for FakeShardRpc {
    async fn get_bucket(
        &self,
        owner: &str,
        name: &str,
        _vnode: u32,
    ) -> Result<BucketRecord, ShardRpcError> {
        self.state
            .lock()
            .buckets
            .get(&(owner.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ShardRpcError::NotFound("BucketNotFound".into()))
    }

    async fn create_bucket(
        &self,
        owner: &str,
        name: &str,
        _vnode: u32,
    ) -> Result<BucketRecord, ShardRpcError> {
        let mut state = self.state.lock();
        let key = (owner.to_string(), name.to_string());
        if state.buckets.contains_key(&key) {
            return Err(ShardRpcError::Conflict("BucketAlreadyExists".into()));
        }
        let record = BucketRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            owner: owner.to_string(),
            mtime_unix_ms: 0,
        };
        state.buckets.insert(key, record.clone());
        Ok(record)
    }

    async fn delete_bucket(
        &self,
        owner: &str,
        name: &str,
        _vnode: u32,
    ) -> Result<(), ShardRpcError> {
        let mut state = self.state.lock();
        let key = (owner.to_string(), name.to_string());
        let has_objects = state
            .objects
            .keys()
            .any(|(b, _)| state.buckets.get(&key).map(|bk| &bk.id) == Some(b));
        if has_objects {
            return Err(ShardRpcError::Conflict("BucketNotEmpty".into()));
        }
        state
            .buckets
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| ShardRpcError::NotFound("BucketNotFound".into()))
    }

    async fn list_buckets_page(
        &self,
        owner: &str,
        _vnode: u32,
        marker: &str,
        limit: u32,
    ) -> Result<(Vec<BucketRecord>, bool), ShardRpcError> {
        let state = self.state.lock();
        let mut matching: Vec<_> = state
            .buckets
            .values()
            .filter(|b| b.owner == owner && b.name.as_str() > marker)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        let truncated = matching.len() > limit as usize;
        matching.truncate(limit as usize);
        Ok((matching, truncated))
    }

    async fn get_object(
        &self,
        _owner: &str,
        bucket_id: &str,
        name: &str,
        _vnode: u32,
        _conditions: &Conditions,
    ) -> Result<ObjectRecord, ShardRpcError> {
        self.state
            .lock()
            .objects
            .get(&(bucket_id.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| ShardRpcError::NotFound("ObjectNotFound".into()))
    }

    async fn create_object(
        &self,
        _owner: &str,
        bucket_id: &str,
        name: &str,
        _vnode: u32,
        _conditions: &Conditions,
        object: ObjectRecord,
    ) -> Result<ObjectRecord, ShardRpcError> {
        let mut state = self.state.lock();
        state
            .objects
            .insert((bucket_id.to_string(), name.to_string()), object.clone());
        Ok(object)
    }

    async fn delete_object(
        &self,
        _owner: &str,
        bucket_id: &str,
        name: &str,
        _vnode: u32,
    ) -> Result<(), ShardRpcError> {
        self.state
            .lock()
            .objects
            .remove(&(bucket_id.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| ShardRpcError::NotFound("ObjectNotFound".into()))
    }

    async fn update_object(
        &self,
        _owner: &str,
        bucket_id: &str,
        name: &str,
        _vnode: u32,
        headers: HashMap<String, String>,
    ) -> Result<ObjectRecord, ShardRpcError> {
        let mut state = self.state.lock();
        let key = (bucket_id.to_string(), name.to_string());
        let record = state
            .objects
            .get_mut(&key)
            .ok_or_else(|| ShardRpcError::NotFound("ObjectNotFound".into()))?;
        record.headers.extend(headers);
        Ok(record.clone())
    }

    async fn list_objects_page(
        &self,
        _owner: &str,
        bucket_id: &str,
        _vnode: u32,
        marker: &str,
        limit: u32,
        prefix: &str,
    ) -> Result<(Vec<ObjectRecord>, bool), ShardRpcError> {
        let state = self.state.lock();
        let mut matching: Vec<_> = state
            .objects
            .values()
            .filter(|o| {
                o.bucket_id == bucket_id && o.name.as_str() > marker && o.name.starts_with(prefix)
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        let truncated = matching.len() > limit as usize;
        matching.truncate(limit as usize);
        Ok((matching, truncated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_rpc_round_trips_bucket_and_object() {
        let rpc = FakeShardRpc::new();
        let bucket = rpc.create_bucket("alice", "pics", 0).await.unwrap();
        assert_eq!(bucket.owner, "alice");

        let err = rpc.create_bucket("alice", "pics", 0).await.unwrap_err();
        assert!(matches!(err, ShardRpcError::Conflict(_)));

        let fetched = rpc.get_bucket("alice", "pics", 0).await.unwrap();
        assert_eq!(fetched.id, bucket.id);

        let obj = ObjectRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: "a.txt".into(),
            name_hash: "deadbeef".into(),
            bucket_id: bucket.id.clone(),
            owner: "alice".into(),
            content_length: 11,
            content_md5: "xxx".into(),
            content_type: "text/plain".into(),
            headers: HashMap::new(),
            sharks: vec![],
            storage_layout_version: 2,
            created_unix_ms: 0,
            modified_unix_ms: 0,
            roles: vec![],
        };
        rpc.create_object("alice", &bucket.id, "a.txt", 0, &Conditions::default(), obj)
            .await
            .unwrap();
        let got = rpc
            .get_object("alice", &bucket.id, "a.txt", 0, &Conditions::default())
            .await
            .unwrap();
        assert_eq!(got.name, "a.txt");
    }

    #[tokio::test]
    async fn delete_bucket_blocked_while_objects_remain() {
        let rpc = FakeShardRpc::new();
        let bucket = rpc.create_bucket("alice", "pics", 0).await.unwrap();
        let obj = ObjectRecord {
            id: uuid::Uuid::new_v4().to_string(),
            name: "a.txt".into(),
            name_hash: "deadbeef".into(),
            bucket_id: bucket.id.clone(),
            owner: "alice".into(),
            content_length: 0,
            content_md5: ringgate_common::checksum::ZERO_BYTE_MD5_BASE64.into(),
            content_type: "text/plain".into(),
            headers: HashMap::new(),
            sharks: vec![],
            storage_layout_version: 2,
            created_unix_ms: 0,
            modified_unix_ms: 0,
            roles: vec![],
        };
        rpc.create_object("alice", &bucket.id, "a.txt", 0, &Conditions::default(), obj)
            .await
            .unwrap();
        let err = rpc.delete_bucket("alice", "pics", 0).await.unwrap_err();
        assert!(matches!(err, ShardRpcError::Conflict(_)));
    }
}
