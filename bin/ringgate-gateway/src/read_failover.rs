//! Read streaming with failover (§1 item 5, §4.6 `getObject`): try
//! storage-node replicas sequentially until one responds, then hand
//! the response stream back for the Check Stream to verify on the way
//! to the client.

use ringgate_common::Error;
use ringgate_storage::{GetOutcome, StorageError, StorageNodeDescriptor, StorageNodeTransport};

use crate::error_response::map_storage_error;

pub async fn get_with_failover(
    transport: &dyn StorageNodeTransport,
    nodes: &[StorageNodeDescriptor],
    object_path: &str,
) -> Result<GetOutcome, Error> {
    let mut last_err: Option<StorageError> = None;
    for node in nodes {
        match transport.get(node, object_path).await {
            Ok(outcome) => return Ok(outcome),
            Err(StorageError::ChecksumError) => {
                // A checksum failure on one replica is this replica's
                // problem, not the object's — keep trying the others.
                last_err = Some(StorageError::ChecksumError);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err
        .map(map_storage_error)
        .unwrap_or_else(|| Error::ServiceUnavailable {
            message: "no storage-node replica responded".to_string(),
        }))
}
