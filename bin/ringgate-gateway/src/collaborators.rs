//! Thin HTTP clients for the three external collaborators spec.md
//! places out of scope: the placement-data service, the
//! storage-node-inventory chooser, and the authorization check. Each
//! type here is just wire-format glue around the trait its own crate
//! defines (`PlacementSource`, `StorageNodeChooser`, `Authorizer`).

use async_trait::async_trait;
use ringgate_auth::{AuthError, AuthorizeRequest, Authorizer};
use ringgate_common::types::NodeId;
use ringgate_ring::{PNode, PlacementSource, RingError, RingSnapshotData};
use ringgate_storage::{ChooserError, StorageNodeChooser, StorageNodeDescriptor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub struct HttpPlacementSource {
    http: reqwest::Client,
    url: String,
}

impl HttpPlacementSource {
    #[must_use]
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self { http, url: url.into() }
    }
}

#[derive(Debug, Deserialize)]
struct WirePNode {
    vnode: u32,
    pnode_id: String,
    address: String,
}

#[derive(Debug, Deserialize)]
struct WireRingSnapshot {
    version: u64,
    hash_algorithm: String,
    vnode_hash_interval: u64,
    nodes: Vec<WirePNode>,
}

#[async_trait]
impl PlacementSource for HttpPlacementSource {
    async fn fetch_snapshot(&self) -> Result<RingSnapshotData, RingError> {
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| RingError::InitialFetchFailed(e.to_string()))?;
        let wire: WireRingSnapshot = resp
            .json()
            .await
            .map_err(|e| RingError::InitialFetchFailed(e.to_string()))?;

        let mut vnode_to_pnode = HashMap::with_capacity(wire.nodes.len());
        for node in wire.nodes {
            let id = node
                .pnode_id
                .parse::<uuid::Uuid>()
                .map_err(|e| RingError::InitialFetchFailed(e.to_string()))?;
            vnode_to_pnode.insert(
                node.vnode,
                PNode {
                    id: NodeId::new(id),
                    address: node.address,
                },
            );
        }

        Ok(RingSnapshotData {
            version: wire.version,
            hash_algorithm: wire.hash_algorithm,
            vnode_hash_interval: wire.vnode_hash_interval,
            vnode_to_pnode,
        })
    }
}

pub struct HttpStorageNodeChooser {
    http: reqwest::Client,
    url: String,
}

impl HttpStorageNodeChooser {
    #[must_use]
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self { http, url: url.into() }
    }
}

#[derive(Debug, Deserialize)]
struct WireChooserResponse {
    candidate_sets: Vec<Vec<StorageNodeDescriptor>>,
}

// `StorageNodeDescriptor` is defined without `Deserialize` in
// ringgate-storage since it has no other need for serde; derive it
// locally via a mirror type instead of modifying that crate's public
// shape for one caller.
#[derive(Debug, Deserialize)]
struct WireStorageNodeDescriptor {
    storage_id: String,
    datacenter: String,
    base_url: String,
}

impl From<WireStorageNodeDescriptor> for StorageNodeDescriptor {
    fn from(w: WireStorageNodeDescriptor) -> Self {
        StorageNodeDescriptor {
            storage_id: w.storage_id,
            datacenter: w.datacenter,
            base_url: w.base_url,
        }
    }
}

#[async_trait]
impl StorageNodeChooser for HttpStorageNodeChooser {
    async fn choose(
        &self,
        durability_level: u8,
    ) -> Result<Vec<Vec<StorageNodeDescriptor>>, ChooserError> {
        let resp = self
            .http
            .get(&self.url)
            .query(&[("durability_level", durability_level)])
            .send()
            .await
            .map_err(|_| ChooserError::NoNodesAvailable)?;
        let wire: Vec<Vec<WireStorageNodeDescriptor>> = resp
            .json()
            .await
            .map_err(|_| ChooserError::NoNodesAvailable)?;
        let candidate_sets: Vec<Vec<StorageNodeDescriptor>> = wire
            .into_iter()
            .map(|set| set.into_iter().map(Into::into).collect())
            .collect();
        if candidate_sets.is_empty() {
            return Err(ChooserError::NoNodesAvailable);
        }
        Ok(candidate_sets)
    }

    async fn resolve(&self, storage_id: &str) -> Result<StorageNodeDescriptor, ChooserError> {
        let resp = self
            .http
            .get(format!("{}/{}", self.url.trim_end_matches('/'), storage_id))
            .send()
            .await
            .map_err(|_| ChooserError::UnknownNode(storage_id.to_string()))?;
        let wire: WireStorageNodeDescriptor = resp
            .json()
            .await
            .map_err(|_| ChooserError::UnknownNode(storage_id.to_string()))?;
        Ok(wire.into())
    }
}

pub struct HttpAuthorizer {
    http: reqwest::Client,
    url: String,
}

impl HttpAuthorizer {
    #[must_use]
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self { http, url: url.into() }
    }
}

#[derive(Debug, Serialize)]
struct WireAuthorizeRequest<'a> {
    owner: String,
    action: &'a str,
    resource: &'a str,
    roles: &'a [String],
}

#[derive(Debug, Deserialize)]
struct WireAuthorizeDecision {
    allow: bool,
}

#[async_trait]
impl Authorizer for HttpAuthorizer {
    async fn authorize(&self, request: &AuthorizeRequest) -> Result<(), AuthError> {
        let wire = WireAuthorizeRequest {
            owner: request.owner.to_string(),
            action: &request.action.0,
            resource: &request.resource.0,
            roles: &request.roles,
        };
        let resp = self
            .http
            .post(&self.url)
            .json(&wire)
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;
        let decision: WireAuthorizeDecision = resp
            .json()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;
        if decision.allow {
            Ok(())
        } else {
            Err(AuthError::Denied)
        }
    }
}
