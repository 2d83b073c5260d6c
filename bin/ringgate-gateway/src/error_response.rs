//! Translates `ringgate_common::Error` into the `{code, message}` body
//! and status/headers described in §6, and maps collaborator-specific
//! error types (shard RPC, storage transport) into that taxonomy.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use ringgate_common::Error;
use ringgate_shard::rpc::ShardRpcError;
use ringgate_storage::StorageError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            code: err.error_code(),
            message: err.to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = err.retry_after_secs() {
            if let Ok(v) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, v);
            }
        }
        if let Some(range) = err.content_range() {
            if let Ok(v) = HeaderValue::from_str(range) {
                response.headers_mut().insert(header::CONTENT_RANGE, v);
            }
        }
        response
    }
}

/// Generic shard-RPC-to-taxonomy mapping for calls that don't know
/// which specific bucket/object name failed (§4.7 default path).
#[must_use]
pub fn from_shard_error(e: ShardRpcError) -> Error {
    match e {
        ShardRpcError::NotFound(name) | ShardRpcError::Conflict(name) => {
            Error::from_upstream_name(&name, false)
        }
        ShardRpcError::PreconditionFailed(message) => Error::PreconditionFailed { message },
        ShardRpcError::Timeout => Error::ServiceUnavailable {
            message: "shard RPC timed out".to_string(),
        },
        ShardRpcError::Connection(message) => Error::ServiceUnavailable { message },
        ShardRpcError::Other(message) => Error::internal_with_cause("shard RPC error", message),
    }
}

/// Bucket-scoped mapping, filling in the bucket name the generic path
/// doesn't know about.
#[must_use]
pub fn map_bucket_error(e: ShardRpcError, name: &str) -> Error {
    match e {
        ShardRpcError::NotFound(n) if n == "BucketNotFound" => Error::BucketNotFound {
            name: name.to_string(),
        },
        ShardRpcError::Conflict(n) if n == "BucketAlreadyExists" => Error::BucketAlreadyExists {
            name: name.to_string(),
        },
        ShardRpcError::Conflict(n) if n == "BucketNotEmpty" => Error::BucketNotEmpty {
            name: name.to_string(),
        },
        other => from_shard_error(other),
    }
}

/// Object-scoped mapping, filling in bucket/key.
#[must_use]
pub fn map_object_error(e: ShardRpcError, bucket: &str, key: &str) -> Error {
    match e {
        ShardRpcError::NotFound(n) if n == "ObjectNotFound" => Error::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        other => from_shard_error(other),
    }
}

/// Storage-node transport error mapping (§4.6 `sharkStreams`: `469` →
/// `ChecksumError`, `400` with a bad `Content-MD5` → invalid request,
/// other `≥400` → internal).
#[must_use]
pub fn map_storage_error(e: StorageError) -> Error {
    match e {
        StorageError::ChecksumError => Error::ChecksumMismatch {
            expected: String::new(),
            actual: String::new(),
        },
        StorageError::BadRequest(_) => Error::ContentMd5Invalid,
        StorageError::Connection(message) => {
            Error::internal_with_cause("storage node connection error", message)
        }
        StorageError::ServerError(status) => {
            Error::internal_with_cause("storage node returned an error", status)
        }
    }
}
