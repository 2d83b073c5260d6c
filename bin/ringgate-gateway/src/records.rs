//! Per-vnode `PageSource` implementations feeding the Merge-Paginator
//! (§4.5): one page source per `{vnode, pnode}` location, delegating
//! each page fetch to that pnode's `ShardRpc` client.

use async_trait::async_trait;
use ringgate_listing::{ListingError, ListingRecord, PageSource};
use ringgate_shard::rpc::{BucketRecord, ObjectRecord, ShardRpc};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListableBucket(pub BucketRecord);

impl ListingRecord for ListableBucket {
    fn key(&self) -> &str {
        &self.0.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListableObject(pub ObjectRecord);

impl ListingRecord for ListableObject {
    fn key(&self) -> &str {
        &self.0.name
    }
}

pub struct BucketPageSource {
    pub shard: Arc<dyn ShardRpc>,
    pub owner: String,
    pub vnode: u32,
}

#[async_trait]
impl PageSource<ListableBucket> for BucketPageSource {
    async fn open_page(&self, marker: &str, limit: u32) -> Result<Vec<ListableBucket>, ListingError> {
        let (records, _truncated) = self
            .shard
            .list_buckets_page(&self.owner, self.vnode, marker, limit)
            .await
            .map_err(|e| ListingError::Upstream(e.to_string()))?;
        Ok(records.into_iter().map(ListableBucket).collect())
    }
}

pub struct ObjectPageSource {
    pub shard: Arc<dyn ShardRpc>,
    pub owner: String,
    pub bucket_id: String,
    pub vnode: u32,
    pub prefix: String,
}

#[async_trait]
impl PageSource<ListableObject> for ObjectPageSource {
    async fn open_page(&self, marker: &str, limit: u32) -> Result<Vec<ListableObject>, ListingError> {
        let (records, _truncated) = self
            .shard
            .list_objects_page(&self.owner, &self.bucket_id, self.vnode, marker, limit, &self.prefix)
            .await
            .map_err(|e| ListingError::Upstream(e.to_string()))?;
        Ok(records.into_iter().map(ListableObject).collect())
    }
}
