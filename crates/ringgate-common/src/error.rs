//! The gateway's error taxonomy.
//!
//! Every recognized upstream (shard/storage) error is translated into a
//! value of this enum; unrecognized errors collapse into `Internal`.
//! Each variant knows its own HTTP status and stable external error
//! code, so translation is a single match rather than scattered string
//! comparisons.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("bucket already exists: {name}")]
    BucketAlreadyExists { name: String },

    #[error("bucket not found: {name}")]
    BucketNotFound { name: String },

    #[error("bucket not empty: {name}")]
    BucketNotEmpty { name: String },

    #[error("object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("precondition failed: {message}")]
    PreconditionFailed { message: String },

    #[error("concurrent request conflict: {message}")]
    ConcurrentRequest { message: String },

    #[error("requested range not satisfiable")]
    RangeNotSatisfiable { content_range: Option<String> },

    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("throttled")]
    Throttled { retry_after_secs: u64 },

    #[error("invalid bucket name: {reason}")]
    InvalidBucketName { reason: String },

    #[error("invalid object key: {reason}")]
    InvalidObjectKey { reason: String },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("access denied")]
    AccessDenied,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("entity too large: {size} exceeds maximum {max}")]
    EntityTooLarge { size: u64, max: u64 },

    #[error("Content-MD5 invalid")]
    ContentMd5Invalid,

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("upload timed out")]
    UploadTimeout,

    #[error("upload abandoned by client")]
    UploadAbandoned,

    #[error("client disconnected during response write")]
    ClientClosed,

    #[error("storage full")]
    StorageFull,

    #[error("no candidate storage-node set could satisfy the durability level")]
    SharksExhausted { retry_after_secs: u64 },

    #[error("not implemented: {what}")]
    NotImplemented { what: String },

    #[error("internal error: {message}")]
    Internal {
        message: String,
        cause: Option<String>,
    },
}

impl Error {
    /// Build an `Internal` error, preserving the original cause for logs.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            cause: None,
        }
    }

    pub fn internal_with_cause(message: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::Internal {
            message: message.into(),
            cause: Some(cause.to_string()),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// HTTP status code for this error, per the §4.7 mapping table.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::BucketAlreadyExists { .. } => 409,
            Self::BucketNotFound { .. } => 404,
            Self::BucketNotEmpty { .. } => 409,
            Self::ObjectNotFound { .. } => 404,
            Self::PreconditionFailed { .. } => 412,
            Self::ConcurrentRequest { .. } => 409,
            Self::RangeNotSatisfiable { .. } => 416,
            Self::ServiceUnavailable { .. } => 503,
            Self::Throttled { .. } => 503,
            Self::InvalidBucketName { .. } | Self::InvalidObjectKey { .. } => 422,
            Self::InvalidRequest { .. } | Self::ContentMd5Invalid => 400,
            Self::InvalidArgument { .. } => 400,
            Self::AccessDenied => 403,
            Self::MethodNotAllowed => 405,
            Self::EntityTooLarge { .. } => 413,
            Self::ChecksumMismatch { .. } => 500,
            Self::UploadTimeout => 408,
            Self::UploadAbandoned => 499,
            Self::ClientClosed => 499,
            Self::StorageFull => 507,
            Self::SharksExhausted { .. } => 503,
            Self::NotImplemented { .. } => 501,
            Self::Internal { .. } => 500,
        }
    }

    /// Stable, externally-visible error code (the `code` field of the
    /// error body described in §6).
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BucketAlreadyExists { .. } => "BucketAlreadyExistsError",
            Self::BucketNotFound { .. } => "BucketNotFoundError",
            Self::BucketNotEmpty { .. } => "BucketNotEmpty",
            Self::ObjectNotFound { .. } => "ObjectNotFoundError",
            Self::PreconditionFailed { .. } => "PreconditionFailedError",
            Self::ConcurrentRequest { .. } => "ConcurrentRequestError",
            Self::RangeNotSatisfiable { .. } => "RequestedRangeNotSatisfiable",
            Self::ServiceUnavailable { .. } => "ServiceUnavailableError",
            Self::Throttled { .. } => "ThrottledError",
            Self::InvalidBucketName { .. } => "InvalidBucketNameError",
            Self::InvalidObjectKey { .. } => "InvalidObjectKeyError",
            Self::InvalidRequest { .. } => "InvalidRequestError",
            Self::InvalidArgument { .. } => "InvalidArgumentError",
            Self::AccessDenied => "AccessDeniedError",
            Self::MethodNotAllowed => "MethodNotAllowedError",
            Self::EntityTooLarge { .. } => "EntityTooLargeError",
            Self::ContentMd5Invalid => "ContentMd5InvalidError",
            Self::ChecksumMismatch { .. } => "ChecksumError",
            Self::UploadTimeout => "UploadTimeoutError",
            Self::UploadAbandoned => "UploadAbandonedError",
            Self::ClientClosed => "ClientClosedRequest",
            Self::StorageFull => "StorageFullError",
            Self::SharksExhausted { .. } => "SharksExhaustedError",
            Self::NotImplemented { .. } => "NotImplementedError",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// `Retry-After` seconds to advertise, if any.
    #[must_use]
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::Throttled { retry_after_secs } | Self::SharksExhausted { retry_after_secs } => {
                Some(*retry_after_secs)
            }
            _ => None,
        }
    }

    /// `Content-Range` to preserve on a 416, if any.
    #[must_use]
    pub fn content_range(&self) -> Option<&str> {
        match self {
            Self::RangeNotSatisfiable { content_range } => content_range.as_deref(),
            _ => None,
        }
    }

    /// True for the subset of errors that represent a broken connection
    /// rather than a response the gateway can still write.
    #[must_use]
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::UploadAbandoned | Self::ClientClosed | Self::UploadTimeout
        )
    }

    /// Translate an upstream shard/storage error identified by its
    /// `name` field (per §4.7) into this taxonomy. Unrecognized names
    /// collapse to `Internal`, preserving the original name as cause.
    #[must_use]
    pub fn from_upstream_name(name: &str, overloaded: bool) -> Self {
        match name {
            "BucketAlreadyExists" => Self::BucketAlreadyExists {
                name: String::new(),
            },
            "BucketNotFound" => Self::BucketNotFound {
                name: String::new(),
            },
            "ObjectNotFound" => Self::ObjectNotFound {
                bucket: String::new(),
                key: String::new(),
            },
            "PreconditionFailed" => Self::PreconditionFailed {
                message: String::new(),
            },
            "EtagConflict" | "UniqueAttribute" => Self::ConcurrentRequest {
                message: name.to_string(),
            },
            "RequestedRangeNotSatisfiable" => Self::RangeNotSatisfiable {
                content_range: None,
            },
            "NoDatabasePeers" if overloaded => Self::ServiceUnavailable {
                message: "no database peers (overloaded)".to_string(),
            },
            "Throttled" => Self::Throttled {
                retry_after_secs: 1,
            },
            other => Self::internal_with_cause("unrecognized upstream error", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping_matches_table() {
        assert_eq!(
            Error::BucketAlreadyExists { name: "b".into() }.http_status_code(),
            409
        );
        assert_eq!(
            Error::BucketNotFound { name: "b".into() }.http_status_code(),
            404
        );
        assert_eq!(
            Error::ObjectNotFound {
                bucket: "b".into(),
                key: "k".into()
            }
            .http_status_code(),
            404
        );
        assert_eq!(
            Error::PreconditionFailed {
                message: String::new()
            }
            .http_status_code(),
            412
        );
        assert_eq!(
            Error::RangeNotSatisfiable {
                content_range: None
            }
            .http_status_code(),
            416
        );
        assert_eq!(
            Error::Throttled {
                retry_after_secs: 1
            }
            .http_status_code(),
            503
        );
        assert_eq!(Error::internal("x").http_status_code(), 500);
    }

    #[test]
    fn from_upstream_name_distinguishes_overloaded() {
        let e = Error::from_upstream_name("NoDatabasePeers", true);
        assert_eq!(e.http_status_code(), 503);
        let e = Error::from_upstream_name("NoDatabasePeers", false);
        assert_eq!(e.http_status_code(), 500);
    }

    #[test]
    fn unknown_upstream_name_is_internal() {
        let e = Error::from_upstream_name("SomethingNovel", false);
        assert_eq!(e.error_code(), "InternalError");
    }
}
