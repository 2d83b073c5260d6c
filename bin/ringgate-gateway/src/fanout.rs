//! Write fan-out streaming (§4.6 `startSharkStreams`/`sharkStreams`):
//! the client body is piped through a Check Stream and teed, chunk by
//! chunk, to every open storage-node PUT in the current candidate set.
//! A barrier waits for the client to finish AND every node to respond
//! before the caller is allowed to commit metadata.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use ringgate_common::Error;
use ringgate_storage::{
    check_stream, CheckStreamError, PutOutcome, StorageError, StorageNodeDescriptor,
    StorageNodeTransport,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error_response::map_storage_error;

pub struct FanoutResult {
    pub digest_base64: String,
    pub bytes_seen: u64,
    pub outcomes: Vec<(StorageNodeDescriptor, PutOutcome)>,
}

/// Attempt a full fan-out to `nodes`. On any failure — client-side
/// abort, a node rejecting the body, or a digest mismatch — every open
/// stream is aborted by dropping its sender.
pub async fn stream_to_replicas<S, E>(
    body: S,
    content_length: u64,
    idle_timeout: Duration,
    transport: &dyn StorageNodeTransport,
    object_path: &str,
    nodes: &[StorageNodeDescriptor],
) -> Result<FanoutResult, Error>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let (checked, handle) = check_stream(body, content_length, idle_timeout);

    let mut senders = Vec::with_capacity(nodes.len());
    let mut puts = Vec::with_capacity(nodes.len());
    for node in nodes {
        let (tx, rx) = mpsc::unbounded_channel::<Result<Bytes, StorageError>>();
        senders.push(tx);
        let body = reqwest::Body::wrap_stream(UnboundedReceiverStream::new(rx));
        puts.push(transport.put(node, object_path, body, content_length));
    }

    let pump = async {
        futures::pin_mut!(checked);
        while let Some(item) = checked.next().await {
            match item {
                Ok(chunk) => {
                    for tx in &senders {
                        let _ = tx.send(Ok(chunk.clone()));
                    }
                }
                Err(e) => {
                    let err = match e {
                        CheckStreamError::Timeout => Error::UploadTimeout,
                        CheckStreamError::LengthExceeded { max } => Error::EntityTooLarge {
                            size: content_length,
                            max,
                        },
                        CheckStreamError::Upstream(_) => Error::UploadAbandoned,
                    };
                    senders.clear(); // drop every sender: aborts every open PUT body
                    return Err(err);
                }
            }
        }
        senders.clear();
        Ok(())
    };

    let (pump_result, put_results) = futures::join!(pump, futures::future::join_all(puts));
    pump_result?;

    let mut outcomes = Vec::with_capacity(nodes.len());
    for (node, result) in nodes.iter().zip(put_results) {
        let outcome = result.map_err(map_storage_error)?;
        outcomes.push((node.clone(), outcome));
    }

    let digest = handle
        .digest()
        .ok_or_else(|| Error::internal("check stream finished without producing a digest"))?;
    for (_, outcome) in &outcomes {
        if let Some(reported) = &outcome.reported_md5_base64 {
            if reported != &digest {
                return Err(Error::ChecksumMismatch {
                    expected: digest.clone(),
                    actual: reported.clone(),
                });
            }
        }
    }

    Ok(FanoutResult {
        digest_base64: digest,
        bytes_seen: handle.bytes_seen(),
        outcomes,
    })
}
