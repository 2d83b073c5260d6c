//! The Placement Ring (§4.1): maps routing keys to `{vnode, pnode}`
//! through a periodically refreshed, immutable versioned snapshot.
//!
//! The ring's contents come from an external placement-data service —
//! out of scope here per spec.md. This crate only defines the
//! `PlacementSource` contract against that service and the ring
//! structure itself.

use arc_swap::ArcSwap;
use async_trait::async_trait;
use ringgate_common::types::NodeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub type Vnode = u32;

/// One physical metadata node as seen by the ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PNode {
    pub id: NodeId,
    pub address: String,
}

/// The raw data an external placement service hands back: the hash
/// algorithm name, the interval, and the vnode→pnode assignment.
#[derive(Debug, Clone)]
pub struct RingSnapshotData {
    pub version: u64,
    pub hash_algorithm: String,
    pub vnode_hash_interval: u64,
    pub vnode_to_pnode: HashMap<Vnode, PNode>,
}

#[derive(Debug, Error)]
pub enum RingError {
    #[error("failed to fetch initial placement data: {0}")]
    InitialFetchFailed(String),
    #[error("no pnode assigned for vnode {0}")]
    UnassignedVnode(Vnode),
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedHashAlgorithm(String),
}

/// Client-side contract against the out-of-scope placement-data
/// service: it supplies ring snapshots on demand.
#[async_trait]
pub trait PlacementSource: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<RingSnapshotData, RingError>;
}

/// An immutable, versioned ring snapshot. Readers hold an `Arc` for
/// the lifetime of a single request so that "the ring snapshot
/// observed within a single request is consistent" (§3).
pub struct RingSnapshot {
    data: RingSnapshotData,
    pnode_to_vnodes: HashMap<NodeId, Vec<Vnode>>,
}

impl RingSnapshot {
    fn build(data: RingSnapshotData) -> Self {
        let mut pnode_to_vnodes: HashMap<NodeId, Vec<Vnode>> = HashMap::new();
        for (&vnode, pnode) in &data.vnode_to_pnode {
            pnode_to_vnodes.entry(pnode.id).or_default().push(vnode);
        }
        Self {
            data,
            pnode_to_vnodes,
        }
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.data.version
    }

    fn hash(&self, key: &str) -> Result<u64, RingError> {
        match self.data.hash_algorithm.as_str() {
            "xxh64" => Ok(xxhash_rust::xxh64::xxh64(key.as_bytes(), 0)),
            other => Err(RingError::UnsupportedHashAlgorithm(other.to_string())),
        }
    }

    /// `h = hash(key); vnode = h / VNODE_HASH_INTERVAL; pnode =
    /// vnode_to_pnode[vnode]`.
    pub fn locate(&self, key: &str) -> Result<Location, RingError> {
        let h = self.hash(key)?;
        let vnode = (h / self.data.vnode_hash_interval) as Vnode;
        let pnode = self
            .data
            .vnode_to_pnode
            .get(&vnode)
            .cloned()
            .ok_or(RingError::UnassignedVnode(vnode))?;
        Ok(Location { vnode, pnode })
    }

    /// All `{vnode, pnode}` pairs, for listing fan-out (§4.4/§4.5).
    #[must_use]
    pub fn all_nodes(&self) -> Vec<Location> {
        self.data
            .vnode_to_pnode
            .iter()
            .map(|(&vnode, pnode)| Location {
                vnode,
                pnode: pnode.clone(),
            })
            .collect()
    }

    #[must_use]
    pub fn vnodes_for(&self, pnode: NodeId) -> &[Vnode] {
        self.pnode_to_vnodes
            .get(&pnode)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone)]
pub struct Location {
    pub vnode: Vnode,
    pub pnode: PNode,
}

/// Owns the live snapshot pointer and the background refresh loop.
pub struct PlacementRing {
    snapshot: ArcSwap<RingSnapshot>,
    source: Arc<dyn PlacementSource>,
}

impl PlacementRing {
    /// Bootstrap the ring. A failure here is fatal — the service
    /// cannot route without an initial snapshot (§4.1).
    pub async fn bootstrap(source: Arc<dyn PlacementSource>) -> Result<Arc<Self>, RingError> {
        let data = source
            .fetch_snapshot()
            .await
            .map_err(|e| RingError::InitialFetchFailed(e.to_string()))?;
        Ok(Arc::new(Self {
            snapshot: ArcSwap::from_pointee(RingSnapshot::build(data)),
            source,
        }))
    }

    /// Current snapshot. Callers should hold the returned `Arc` for
    /// the duration of one request.
    #[must_use]
    pub fn current(&self) -> Arc<RingSnapshot> {
        self.snapshot.load_full()
    }

    /// Fetch a fresh snapshot and swap it in atomically. On failure,
    /// the previous snapshot is retained and the error is returned for
    /// the caller to log (§4.1: "a failure during periodic refresh is
    /// logged and the previous snapshot is retained").
    pub async fn refresh_once(&self) -> Result<(), RingError> {
        let data = self.source.fetch_snapshot().await?;
        self.snapshot.store(Arc::new(RingSnapshot::build(data)));
        Ok(())
    }

    /// Run the periodic refresh loop until the process shuts down.
    /// Never blocks in-flight requests and never publishes a partially
    /// built snapshot — `refresh_once` only swaps after a complete
    /// fetch succeeds.
    pub async fn run_refresh_loop(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            if let Err(err) = self.refresh_once().await {
                tracing::warn!(error = %err, "placement ring refresh failed, retaining previous snapshot");
            } else {
                tracing::info!(version = self.current().version(), "placement ring refreshed");
            }
        }
    }
}

/// A `PlacementSource` that always places every key on vnode 0,
/// mapped to a single pnode. Used by integration tests that need a
/// working ring without a real placement-data service: the interval
/// is set to `u64::MAX` so `hash / interval` collapses to 0 for every
/// key the `xxh64` hash can produce short of the maximum value itself.
pub struct SingleNodePlacementSource {
    pub pnode: PNode,
}

impl SingleNodePlacementSource {
    #[must_use]
    pub fn new(pnode: PNode) -> Self {
        Self { pnode }
    }
}

#[async_trait]
impl PlacementSource for SingleNodePlacementSource {
    async fn fetch_snapshot(&self) -> Result<RingSnapshotData, RingError> {
        let mut vnode_to_pnode = HashMap::new();
        vnode_to_pnode.insert(0, self.pnode.clone());
        Ok(RingSnapshotData {
            version: 1,
            hash_algorithm: "xxh64".to_string(),
            vnode_hash_interval: u64::MAX,
            vnode_to_pnode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct FixedSource {
        interval: u64,
        nodes: Vec<(Vnode, &'static str)>,
        fetches: AtomicU64,
        fail_after_first: bool,
    }

    #[async_trait]
    impl PlacementSource for FixedSource {
        async fn fetch_snapshot(&self) -> Result<RingSnapshotData, RingError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_after_first && n > 0 {
                return Err(RingError::InitialFetchFailed("simulated".into()));
            }
            let mut map = HashMap::new();
            for &(vnode, addr) in &self.nodes {
                map.insert(
                    vnode,
                    PNode {
                        id: NodeId::new(uuid::Uuid::new_v4()),
                        address: addr.to_string(),
                    },
                );
            }
            Ok(RingSnapshotData {
                version: n + 1,
                hash_algorithm: "xxh64".to_string(),
                vnode_hash_interval: self.interval,
                vnode_to_pnode: map,
            })
        }
    }

    #[tokio::test]
    async fn locate_is_stable_across_calls_for_same_snapshot() {
        let source = Arc::new(FixedSource {
            interval: 1 << 20,
            nodes: vec![(0, "a"), (1, "b"), (2, "c")],
            fetches: AtomicU64::new(0),
            fail_after_first: false,
        });
        let ring = PlacementRing::bootstrap(source).await.unwrap();
        let snap = ring.current();
        let loc1 = snap.locate("owner:bucket").unwrap();
        let loc2 = snap.locate("owner:bucket").unwrap();
        assert_eq!(loc1.vnode, loc2.vnode);
        assert_eq!(loc1.pnode, loc2.pnode);
    }

    #[tokio::test]
    async fn refresh_failure_retains_previous_snapshot() {
        let source = Arc::new(FixedSource {
            interval: 1 << 20,
            nodes: vec![(0, "a")],
            fetches: AtomicU64::new(0),
            fail_after_first: true,
        });
        let ring = PlacementRing::bootstrap(source).await.unwrap();
        let before = ring.current().version();
        let err = ring.refresh_once().await;
        assert!(err.is_err());
        assert_eq!(ring.current().version(), before);
    }

    #[tokio::test]
    async fn all_nodes_covers_every_vnode() {
        let source = Arc::new(FixedSource {
            interval: 1 << 20,
            nodes: vec![(0, "a"), (1, "b")],
            fetches: AtomicU64::new(0),
            fail_after_first: false,
        });
        let ring = PlacementRing::bootstrap(source).await.unwrap();
        assert_eq!(ring.current().all_nodes().len(), 2);
    }
}
