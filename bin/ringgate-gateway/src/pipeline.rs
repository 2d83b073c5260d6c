//! The Request Pipeline (§4.6, §9): each stage either advances,
//! short-circuits a response, or fails — modeled explicitly as
//! `StageOutcome` rather than a callback chain.

use ringgate_auth::{Action, Resource};
use ringgate_common::types::{BucketName, ObjectKey};
use ringgate_common::Error;
use ringgate_shard::rpc::Conditions;
use uuid::Uuid;

/// What a pipeline stage did with the request.
pub enum StageOutcome<T> {
    /// Proceed to the next stage with this value.
    Continue(T),
    /// Short-circuit: send this status/body straight to the client.
    Respond { status: u16, not_modified: bool },
    /// Fail the request with a translated error.
    Error(Error),
}

/// Everything `loadRequest` extracts from the URL and headers before
/// any collaborator call is made.
#[derive(Debug, Clone)]
pub struct ParsedRequest {
    pub login: String,
    pub owner: Uuid,
    pub bucket_name: Option<BucketName>,
    pub object_name: Option<ObjectKey>,
    pub conditions: Conditions,
    pub action: Action,
}

/// Decide the authorization action name from `{method, request_type}`
/// (§4.6 `loadRequest`).
#[must_use]
pub fn action_name(method: &str, request_type: RequestType) -> Action {
    let name = match (method, request_type) {
        ("OPTIONS", _) => "OptionsBuckets",
        ("GET", RequestType::Buckets) => "ListBuckets",
        ("GET", RequestType::Bucket) => "HeadBucket",
        ("PUT", RequestType::Bucket) => "CreateBucket",
        ("DELETE", RequestType::Bucket) => "DeleteBucket",
        ("HEAD", RequestType::Bucket) => "HeadBucket",
        ("GET", RequestType::Objects) => "ListObjects",
        ("PUT", RequestType::Object) => "CreateObject",
        ("GET", RequestType::Object) => "GetObject",
        ("HEAD", RequestType::Object) => "HeadObject",
        ("DELETE", RequestType::Object) => "DeleteObject",
        ("PUT", RequestType::ObjectMetadata) => "UpdateObject",
        _ => "Unknown",
    };
    Action::new(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Buckets,
    Bucket,
    Objects,
    Object,
    ObjectMetadata,
}

#[must_use]
pub fn resource_path(
    login: &str,
    bucket_name: Option<&str>,
    object_name: Option<&str>,
) -> Resource {
    let mut path = login.to_string();
    if let Some(b) = bucket_name {
        path.push('/');
        path.push_str(b);
    }
    if let Some(o) = object_name {
        path.push('/');
        path.push_str(o);
    }
    Resource::new(path)
}

/// `parseArguments` (§4.6): resolve the write-side sizing/durability
/// arguments for a create, clamping against configured maxima.
#[derive(Debug, Clone, Copy)]
pub struct WriteArguments {
    pub content_length: u64,
    pub durability_level: u8,
    pub object_id: Uuid,
    pub zero_byte_fast_path: bool,
}

#[must_use]
pub fn parse_write_arguments(
    content_length: u64,
    requested_durability: Option<u8>,
    default_durability: u8,
    max_durability: u8,
) -> WriteArguments {
    let durability_level = requested_durability
        .unwrap_or(default_durability)
        .clamp(1, max_durability);
    WriteArguments {
        content_length,
        durability_level,
        object_id: Uuid::new_v4(),
        zero_byte_fast_path: content_length == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_name_covers_core_verbs() {
        assert_eq!(action_name("PUT", RequestType::Object).0, "CreateObject");
        assert_eq!(action_name("GET", RequestType::Objects).0, "ListObjects");
        assert_eq!(action_name("DELETE", RequestType::Bucket).0, "DeleteBucket");
    }

    #[test]
    fn write_arguments_clamp_durability() {
        let args = parse_write_arguments(100, Some(50), 2, 6);
        assert_eq!(args.durability_level, 6);
        let args = parse_write_arguments(100, Some(0), 2, 6);
        assert_eq!(args.durability_level, 1);
    }

    #[test]
    fn zero_length_triggers_fast_path() {
        let args = parse_write_arguments(0, None, 2, 6);
        assert!(args.zero_byte_fast_path);
        assert_eq!(args.durability_level, 2);
    }
}
