//! Core domain newtypes: bucket/object identity, name validation, and
//! the storage-layout-version policy (§9 Open Question 1).

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Server-assigned object identifier; doubles as the object's etag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From, Into, Serialize, Deserialize)]
pub struct ObjectId(Uuid);

impl ObjectId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

/// Physical metadata shard identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From, Into, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BucketNameError {
    #[error("bucket name must be between 3 and 63 characters")]
    BadLength,
    #[error("bucket name contains an invalid label: {0}")]
    InvalidLabel(String),
    #[error("bucket name must not resemble an IP address")]
    LooksLikeIpAddress,
    #[error("bucket name must not contain a NUL byte")]
    ContainsNul,
}

/// A validated bucket name: 3-63 chars, lowercase dot-separated labels,
/// each label `[a-z0-9]([a-z0-9-]*[a-z0-9])?`, not IP-shaped, no NUL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BucketName(String);

impl BucketName {
    pub fn parse(raw: &str) -> Result<Self, BucketNameError> {
        if raw.contains('\0') {
            return Err(BucketNameError::ContainsNul);
        }
        if raw.len() < 3 || raw.len() > 63 {
            return Err(BucketNameError::BadLength);
        }
        if looks_like_ip_address(raw) {
            return Err(BucketNameError::LooksLikeIpAddress);
        }
        for label in raw.split('.') {
            if !is_valid_label(label) {
                return Err(BucketNameError::InvalidLabel(label.to_string()));
            }
        }
        Ok(Self(raw.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for BucketName {
    type Error = BucketNameError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BucketName> for String {
    fn from(value: BucketName) -> Self {
        value.0
    }
}

fn is_valid_label(label: &str) -> bool {
    if label.is_empty() {
        return false;
    }
    let bytes = label.as_bytes();
    let is_alnum = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    if !is_alnum(bytes[0]) || !is_alnum(bytes[bytes.len() - 1]) {
        return false;
    }
    bytes
        .iter()
        .all(|&b| is_alnum(b) || b == b'-')
}

fn looks_like_ip_address(raw: &str) -> bool {
    let parts: Vec<&str> = raw.split('.').collect();
    if parts.len() != 4 {
        return false;
    }
    parts
        .iter()
        .all(|p| !p.is_empty() && p.len() <= 3 && p.chars().all(|c| c.is_ascii_digit()))
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ObjectKeyError {
    #[error("object name must be between 1 and 1024 bytes")]
    BadLength,
    #[error("object name must not contain a NUL byte")]
    ContainsNul,
}

/// A validated object name: 1-1024 bytes UTF-8, no NUL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn parse(raw: &str) -> Result<Self, ObjectKeyError> {
        if raw.as_bytes().is_empty() || raw.as_bytes().len() > 1024 {
            return Err(ObjectKeyError::BadLength);
        }
        if raw.contains('\0') {
            return Err(ObjectKeyError::ContainsNul);
        }
        Ok(Self(raw.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// MD5 hex digest of the object name, used as the routing-key
    /// component and as `name_hash` on the stored record (§3).
    #[must_use]
    pub fn name_hash_hex(&self) -> String {
        hex::encode(md5::compute(self.0.as_bytes()).0)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = ObjectKeyError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ObjectKey> for String {
    fn from(value: ObjectKey) -> Self {
        value.0
    }
}

/// §9 Open Question 1: the storage path layout in effect for an object.
/// New writes default to `V2`; existing objects keep whatever version
/// they were written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageLayoutVersion {
    /// Object-name-derived subdirectories of constant size.
    V1,
    /// Object-id prefix plus `objectId,nameHash` leaf.
    V2,
}

impl StorageLayoutVersion {
    #[must_use]
    pub fn current() -> Self {
        Self::V2
    }

    /// Compute the on-disk path a storage node would use for this
    /// object, given its id and the MD5 hex of its name.
    #[must_use]
    pub fn path_for(self, object_id: ObjectId, name_hash_hex: &str) -> String {
        match self {
            Self::V1 => {
                let hash = name_hash_hex;
                format!(
                    "{}/{}/{}/{object_id}",
                    &hash[0..2],
                    &hash[2..4],
                    &hash[4..6]
                )
            }
            Self::V2 => {
                let id = object_id.to_string();
                format!("{}/{id},{name_hash_hex}", &id[0..2])
            }
        }
    }
}

/// Durability level (number of storage-node replicas), clamped to
/// `[1, max]` by `parseArguments` (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DurabilityLevel(u8);

impl DurabilityLevel {
    pub const DEFAULT: u8 = 2;

    #[must_use]
    pub fn clamp(requested: u8, max: u8) -> Self {
        Self(requested.clamp(1, max.max(1)))
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_name_accepts_valid_dotted_labels() {
        assert!(BucketName::parse("a-b").is_ok());
        assert!(BucketName::parse("my.bucket.name").is_ok());
    }

    #[test]
    fn bucket_name_rejects_ip_address_shape() {
        assert_eq!(
            BucketName::parse("1.2.3.4"),
            Err(BucketNameError::LooksLikeIpAddress)
        );
    }

    #[test]
    fn bucket_name_rejects_too_short() {
        assert_eq!(BucketName::parse("ab"), Err(BucketNameError::BadLength));
    }

    #[test]
    fn bucket_name_rejects_bad_label_edges() {
        assert!(BucketName::parse("-abc").is_err());
        assert!(BucketName::parse("abc-").is_err());
    }

    #[test]
    fn object_key_rejects_nul_and_empty() {
        assert_eq!(ObjectKey::parse(""), Err(ObjectKeyError::BadLength));
        assert_eq!(
            ObjectKey::parse("a\0b"),
            Err(ObjectKeyError::ContainsNul)
        );
    }

    #[test]
    fn object_key_name_hash_is_deterministic() {
        let k = ObjectKey::parse("dir1/a.txt").unwrap();
        assert_eq!(k.name_hash_hex().len(), 32);
        assert_eq!(k.name_hash_hex(), k.name_hash_hex());
    }

    #[test]
    fn durability_level_clamps_into_range() {
        assert_eq!(DurabilityLevel::clamp(0, 5).get(), 1);
        assert_eq!(DurabilityLevel::clamp(9, 5).get(), 5);
        assert_eq!(DurabilityLevel::clamp(2, 5).get(), 2);
    }

    #[test]
    fn storage_layout_version_paths_differ() {
        let id = ObjectId::new();
        let v1 = StorageLayoutVersion::V1.path_for(id, "0123456789abcdef0123456789abcdef");
        let v2 = StorageLayoutVersion::V2.path_for(id, "0123456789abcdef0123456789abcdef");
        assert_ne!(v1, v2);
        assert_eq!(StorageLayoutVersion::current(), StorageLayoutVersion::V2);
    }
}
