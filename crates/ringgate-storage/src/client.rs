//! Per-storage-node HTTP client for PUT/GET of object bodies, pooled
//! the same way as the Shard Client Pool (§4.2) is pooled for
//! metadata: one client is reused across requests, no client creation
//! happens on the hot path.

use crate::chooser::StorageNodeDescriptor;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("checksum error reported by storage node")]
    ChecksumError,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("storage node returned status {0}")]
    ServerError(u16),
}

#[derive(Debug, Clone)]
pub struct PutOutcome {
    pub status: u16,
    pub reported_md5_base64: Option<String>,
}

pub struct GetOutcome {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes, StorageError>>,
}

/// Transport contract for a single storage-node round trip. `put`
/// takes the already-teed body (from the Check Stream) as a
/// `reqwest::Body` so the same bytes can be fanned out to N nodes in
/// parallel without re-buffering.
#[async_trait]
pub trait StorageNodeTransport: Send + Sync {
    async fn put(
        &self,
        node: &StorageNodeDescriptor,
        object_path: &str,
        body: reqwest::Body,
        content_length: u64,
    ) -> Result<PutOutcome, StorageError>;

    async fn get(
        &self,
        node: &StorageNodeDescriptor,
        object_path: &str,
    ) -> Result<GetOutcome, StorageError>;
}

/// Shared `reqwest::Client` pool. A single `reqwest::Client` already
/// pools connections per host internally; this wrapper exists so every
/// caller goes through one shared instance (mirroring the teacher's
/// `OsdPool`) rather than constructing a fresh client per request.
pub struct StorageNodePool {
    http: reqwest::Client,
}

impl Default for StorageNodePool {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageNodePool {
    #[must_use]
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .expect("reqwest client builds with static config");
        Self { http }
    }
}

#[async_trait]
impl StorageNodeTransport for StorageNodePool {
    async fn put(
        &self,
        node: &StorageNodeDescriptor,
        object_path: &str,
        body: reqwest::Body,
        content_length: u64,
    ) -> Result<PutOutcome, StorageError> {
        let url = format!("{}/{}", node.base_url.trim_end_matches('/'), object_path);
        let resp = self
            .http
            .put(&url)
            .header(reqwest::header::CONTENT_LENGTH, content_length)
            .body(body)
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let status = resp.status().as_u16();
        let reported_md5_base64 = resp
            .headers()
            .get("content-md5")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        match status {
            469 => Err(StorageError::ChecksumError),
            400 => Err(StorageError::BadRequest(
                "storage node rejected Content-MD5".to_string(),
            )),
            s if s >= 400 => Err(StorageError::ServerError(s)),
            _ => Ok(PutOutcome {
                status,
                reported_md5_base64,
            }),
        }
    }

    async fn get(
        &self,
        node: &StorageNodeDescriptor,
        object_path: &str,
    ) -> Result<GetOutcome, StorageError> {
        let url = format!("{}/{}", node.base_url.trim_end_matches('/'), object_path);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let status = resp.status().as_u16();
        let content_length = resp.content_length();
        if status >= 400 {
            return Err(match status {
                469 => StorageError::ChecksumError,
                s => StorageError::ServerError(s),
            });
        }
        let body = futures::StreamExt::boxed(futures::StreamExt::map(
            resp.bytes_stream(),
            |r| r.map_err(|e| StorageError::Connection(e.to_string())),
        ));
        Ok(GetOutcome {
            status,
            content_length,
            body,
        })
    }
}

/// Descriptor-keyed view used by tests that don't want real HTTP.
pub type FakeResponses = HashMap<String, Result<PutOutcome, StorageError>>;

/// In-memory `StorageNodeTransport` for exercising fan-out/failover
/// without a real storage node. Stores each PUT body keyed by
/// `(storage_id, object_path)` and serves it back on GET. A node can be
/// marked to reject every PUT with `ChecksumError`, for exercising the
/// read-failover and write-abort paths.
#[derive(Default)]
pub struct FakeStorageNodeTransport {
    bodies: parking_lot::Mutex<HashMap<(String, String), Bytes>>,
    rejecting: parking_lot::Mutex<std::collections::HashSet<String>>,
}

impl FakeStorageNodeTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `storage_id` to fail every subsequent `put` with
    /// `StorageError::ChecksumError`.
    pub fn reject_puts_from(&self, storage_id: &str) {
        self.rejecting.lock().insert(storage_id.to_string());
    }
}

#[async_trait]
impl StorageNodeTransport for FakeStorageNodeTransport {
    async fn put(
        &self,
        node: &StorageNodeDescriptor,
        object_path: &str,
        body: reqwest::Body,
        _content_length: u64,
    ) -> Result<PutOutcome, StorageError> {
        if self.rejecting.lock().contains(&node.storage_id) {
            return Err(StorageError::ChecksumError);
        }
        let collected = http_body_util::BodyExt::collect(body)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let buf = collected.to_bytes().to_vec();
        let digest = ringgate_common::checksum::md5_base64(&buf);
        self.bodies
            .lock()
            .insert((node.storage_id.clone(), object_path.to_string()), Bytes::from(buf));
        Ok(PutOutcome {
            status: 204,
            reported_md5_base64: Some(digest),
        })
    }

    async fn get(
        &self,
        node: &StorageNodeDescriptor,
        object_path: &str,
    ) -> Result<GetOutcome, StorageError> {
        let body = self
            .bodies
            .lock()
            .get(&(node.storage_id.clone(), object_path.to_string()))
            .cloned()
            .ok_or(StorageError::ServerError(404))?;
        let content_length = Some(body.len() as u64);
        let stream = futures::stream::once(async move { Ok(body) });
        Ok(GetOutcome {
            status: 200,
            content_length,
            body: futures::StreamExt::boxed(stream),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_builds_without_panicking() {
        let _pool = StorageNodePool::new();
    }

    #[tokio::test]
    async fn fake_transport_round_trips_a_body() {
        let transport = FakeStorageNodeTransport::new();
        let node = StorageNodeDescriptor {
            storage_id: "s1".into(),
            datacenter: "dc1".into(),
            base_url: "http://s1".into(),
        };
        transport
            .put(&node, "obj/path", reqwest::Body::from("hello world"), 11)
            .await
            .unwrap();
        let outcome = transport.get(&node, "obj/path").await.unwrap();
        let body: Vec<Bytes> = futures::StreamExt::collect::<Vec<_>>(outcome.body)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(body.concat(), b"hello world");
    }

    #[tokio::test]
    async fn fake_transport_honors_rejection() {
        let transport = FakeStorageNodeTransport::new();
        transport.reject_puts_from("s1");
        let node = StorageNodeDescriptor {
            storage_id: "s1".into(),
            datacenter: "dc1".into(),
            base_url: "http://s1".into(),
        };
        let err = transport
            .put(&node, "obj/path", reqwest::Body::from("x"), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ChecksumError));
    }
}
