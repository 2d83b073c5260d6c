//! The context object threaded through every Request Pipeline stage
//! (§9: "a context object threaded through every stage... `{log, ring,
//! shardClients, storageChooser, storageAgent, config, probes}`").

use crate::throttle::Throttle;
use ringgate_auth::Authorizer;
use ringgate_common::config::Config;
use ringgate_ring::PlacementRing;
use ringgate_shard::ShardPool;
use ringgate_storage::{StorageNodeChooser, StorageNodeTransport};
use std::sync::Arc;

pub struct AppState {
    pub ring: Arc<PlacementRing>,
    pub shards: Arc<ShardPool>,
    pub storage_chooser: Arc<dyn StorageNodeChooser>,
    pub storage_transport: Arc<dyn StorageNodeTransport>,
    pub authorizer: Arc<dyn Authorizer>,
    pub throttle: Arc<Throttle>,
    pub config: Config,
    /// Key the Merge-Paginator signs continuation tokens with. Not a
    /// secret shared with any external collaborator; it only has to be
    /// stable across this process's lifetime.
    pub listing_signing_key: Vec<u8>,
}

impl AppState {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ring: Arc<PlacementRing>,
        shards: Arc<ShardPool>,
        storage_chooser: Arc<dyn StorageNodeChooser>,
        storage_transport: Arc<dyn StorageNodeTransport>,
        authorizer: Arc<dyn Authorizer>,
        throttle: Arc<Throttle>,
        config: Config,
        listing_signing_key: Vec<u8>,
    ) -> Arc<Self> {
        Arc::new(Self {
            ring,
            shards,
            storage_chooser,
            storage_transport,
            authorizer,
            throttle,
            config,
            listing_signing_key,
        })
    }
}
