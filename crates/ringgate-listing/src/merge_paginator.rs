//! Merge-Paginator (§4.5): pulls one record per non-exhausted shard
//! stream, picks the lowest key, and emits either the object itself or
//! a synthesized common-prefix group record when a delimiter collapses
//! a run of keys. Continuation tokens are HMAC-signed the same way a
//! scatter-gather listing signs its per-shard cursors.

use crate::limit_marker::{ListingError, ListingRecord, LimitMarkerStream, PageSource};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

type HmacSha256 = Hmac<Sha256>;

#[async_trait::async_trait]
impl<R: ListingRecord> PageSource<R> for Box<dyn PageSource<R>> {
    async fn open_page(&self, marker: &str, limit: u32) -> Result<Vec<R>, ListingError> {
        (**self).open_page(marker, limit).await
    }
}

/// One merged page entry: either a real object or a synthesized
/// "directory" record standing in for every key sharing a
/// `prefix + delimiter` run (§3: the Group Record shape).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingItem<R> {
    Object(R),
    CommonPrefix(String),
}

/// Signed cursor over every shard stream's current marker, so a page
/// boundary can resume without re-scanning from the start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListContinuationToken {
    pub prefix: String,
    pub delimiter: Option<String>,
    pub markers: Vec<String>,
    #[serde(with = "sig_bytes")]
    pub signature: Vec<u8>,
}

mod sig_bytes {
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(d)?;
        URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(serde::de::Error::custom)
    }
}

impl ListContinuationToken {
    fn compute_signature(
        prefix: &str,
        delimiter: Option<&str>,
        markers: &[String],
        key: &[u8],
    ) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
        mac.update(prefix.as_bytes());
        mac.update(&[0u8]);
        mac.update(delimiter.unwrap_or("").as_bytes());
        for m in markers {
            mac.update(&[0u8]);
            mac.update(m.as_bytes());
        }
        mac.finalize().into_bytes().to_vec()
    }

    #[must_use]
    pub fn new(prefix: &str, delimiter: Option<&str>, markers: Vec<String>, key: &[u8]) -> Self {
        let signature = Self::compute_signature(prefix, delimiter, &markers, key);
        Self {
            prefix: prefix.to_string(),
            delimiter: delimiter.map(str::to_string),
            markers,
            signature,
        }
    }

    #[must_use]
    pub fn verify(&self, key: &[u8]) -> bool {
        let expected =
            Self::compute_signature(&self.prefix, self.delimiter.as_deref(), &self.markers, key);
        expected == self.signature
    }

    pub fn encode(&self) -> Result<String, ListingError> {
        let json = serde_json::to_vec(self).map_err(|e| ListingError::Upstream(e.to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    pub fn decode(s: &str) -> Result<Self, ListingError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s)
            .map_err(|_| ListingError::Upstream("malformed continuation token".to_string()))?;
        serde_json::from_slice(&bytes)
            .map_err(|_| ListingError::Upstream("malformed continuation token".to_string()))
    }
}

struct MergeEntry<R> {
    key: String,
    stream_index: usize,
    record: R,
}

impl<R> PartialEq for MergeEntry<R> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}
impl<R> Eq for MergeEntry<R> {}
impl<R> PartialOrd for MergeEntry<R> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<R> Ord for MergeEntry<R> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) pops the lowest key first.
        other.key.cmp(&self.key)
    }
}

pub struct MergePage<R> {
    pub items: Vec<ListingItem<R>>,
    pub next_token: Option<String>,
    pub finished: bool,
}

/// Bumps the last byte of `prefix` so that `prefix <= x < bumped`
/// exactly covers every key sharing `prefix` (the standard
/// range-scan upper-bound trick); `None` if `prefix` is all `0xff`.
fn upper_bound(prefix: &str) -> Option<String> {
    let mut bytes = prefix.as_bytes().to_vec();
    while let Some(&last) = bytes.last() {
        if last == 0xff {
            bytes.pop();
            continue;
        }
        *bytes.last_mut().unwrap() += 1;
        return Some(String::from_utf8_lossy(&bytes).into_owned());
    }
    None
}

pub struct MergePaginator<R: ListingRecord> {
    streams: Vec<LimitMarkerStream<R, Box<dyn PageSource<R>>>>,
    prefix: String,
    delimiter: Option<String>,
    signing_key: Vec<u8>,
}

impl<R: ListingRecord> MergePaginator<R> {
    #[must_use]
    pub fn new(
        sources: Vec<Box<dyn PageSource<R>>>,
        page_limit: u32,
        start_markers: Vec<String>,
        prefix: impl Into<String>,
        delimiter: Option<String>,
        signing_key: impl Into<Vec<u8>>,
    ) -> Self {
        let streams = sources
            .into_iter()
            .zip(start_markers.into_iter().chain(std::iter::repeat(String::new())))
            .map(|(src, marker)| LimitMarkerStream::new(src, page_limit, marker))
            .collect();
        Self {
            streams,
            prefix: prefix.into(),
            delimiter,
            signing_key: signing_key.into(),
        }
    }

    pub fn from_continuation_token(
        sources: Vec<Box<dyn PageSource<R>>>,
        page_limit: u32,
        token: &str,
        signing_key: impl Into<Vec<u8>>,
    ) -> Result<Self, ListingError> {
        let signing_key = signing_key.into();
        let parsed = ListContinuationToken::decode(token)?;
        if !parsed.verify(&signing_key) {
            return Err(ListingError::Upstream(
                "continuation token signature mismatch".to_string(),
            ));
        }
        Ok(Self::new(
            sources,
            page_limit,
            parsed.markers,
            parsed.prefix,
            parsed.delimiter,
            signing_key,
        ))
    }

    /// Group key a record collapses into under the configured
    /// delimiter, if any: `prefix` plus everything up to and including
    /// the first delimiter occurrence after `prefix`.
    fn group_key_for(&self, key: &str) -> Option<String> {
        let delimiter = self.delimiter.as_deref()?;
        if delimiter.is_empty() {
            return None;
        }
        let rest = key.strip_prefix(&self.prefix)?;
        let idx = rest.find(delimiter)?;
        Some(format!("{}{}{}", self.prefix, &rest[..idx], delimiter))
    }

    pub async fn next_page(&mut self, limit: u32) -> Result<MergePage<R>, ListingError> {
        let mut items = Vec::with_capacity(limit as usize);

        while (items.len() as u32) < limit {
            let mut heap: BinaryHeap<MergeEntry<R>> = BinaryHeap::new();
            for (idx, stream) in self.streams.iter_mut().enumerate() {
                if let Some(record) = stream.peek().await? {
                    heap.push(MergeEntry {
                        key: record.key().to_string(),
                        stream_index: idx,
                        record: record.clone(),
                    });
                }
            }

            let Some(winner) = heap.pop() else {
                return Ok(MergePage {
                    items,
                    next_token: None,
                    finished: true,
                });
            };

            if let Some(group_key) = self.group_key_for(&winner.key) {
                let Some(bound) = upper_bound(&group_key) else {
                    // Exhaust every stream still inside this final group.
                    for stream in &mut self.streams {
                        while let Some(record) = stream.peek().await? {
                            if !record.key().starts_with(group_key.as_str()) {
                                break;
                            }
                            stream.next().await?;
                        }
                    }
                    items.push(ListingItem::CommonPrefix(group_key));
                    continue;
                };
                for stream in &mut self.streams {
                    if let Some(record) = stream.peek().await? {
                        if record.key().starts_with(group_key.as_str()) {
                            stream.advance_to(&bound).await?;
                        }
                    }
                }
                items.push(ListingItem::CommonPrefix(group_key));
            } else {
                self.streams[winner.stream_index].next().await?;
                items.push(ListingItem::Object(winner.record));
            }
        }

        let all_done = self.streams.iter().all(LimitMarkerStream::done);
        if all_done {
            // Still report whether a final peek truly finds nothing so a
            // stream left exactly at its page boundary isn't mistaken for
            // exhausted.
            let mut truly_done = true;
            for stream in &mut self.streams {
                if stream.peek().await?.is_some() {
                    truly_done = false;
                    break;
                }
            }
            if truly_done {
                return Ok(MergePage {
                    items,
                    next_token: None,
                    finished: true,
                });
            }
        }

        let markers: Vec<String> = self
            .streams
            .iter()
            .map(|s| s.current_marker().to_string())
            .collect();
        let token = ListContinuationToken::new(
            &self.prefix,
            self.delimiter.as_deref(),
            markers,
            &self.signing_key,
        )
        .encode()?;
        Ok(MergePage {
            items,
            next_token: Some(token),
            finished: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Clone, Debug, PartialEq, Eq)]
    struct Rec(String);

    impl ListingRecord for Rec {
        fn key(&self) -> &str {
            &self.0
        }
    }

    struct StaticSource(std::sync::Mutex<Vec<Rec>>);

    #[async_trait]
    impl PageSource<Rec> for StaticSource {
        async fn open_page(&self, marker: &str, limit: u32) -> Result<Vec<Rec>, ListingError> {
            let remaining = self.0.lock().unwrap();
            let page: Vec<Rec> = remaining
                .iter()
                .filter(|r| r.0.as_str() > marker)
                .take(limit as usize)
                .cloned()
                .collect();
            Ok(page)
        }
    }

    fn source(names: &[&str]) -> Box<dyn PageSource<Rec>> {
        Box::new(StaticSource(std::sync::Mutex::new(
            names.iter().map(|n| Rec((*n).to_string())).collect(),
        )))
    }

    #[tokio::test]
    async fn merges_two_shards_in_order() {
        let sources = vec![source(&["a", "c", "e"]), source(&["b", "d"])];
        let mut p = MergePaginator::new(sources, 10, vec![], "", None, b"k".to_vec());
        let page = p.next_page(10).await.unwrap();
        let keys: Vec<String> = page
            .items
            .iter()
            .map(|i| match i {
                ListingItem::Object(r) => r.0.clone(),
                ListingItem::CommonPrefix(p) => p.clone(),
            })
            .collect();
        assert_eq!(keys, vec!["a", "b", "c", "d", "e"]);
        assert!(page.finished);
    }

    #[tokio::test]
    async fn deduplicates_identical_keys_across_shards() {
        let sources = vec![source(&["a", "b"]), source(&["b", "c"])];
        let mut p = MergePaginator::new(sources, 10, vec![], "", None, b"k".to_vec());
        let page = p.next_page(10).await.unwrap();
        assert_eq!(page.items.len(), 4);
    }

    #[tokio::test]
    async fn synthesizes_common_prefix_groups() {
        let sources = vec![source(&["photos/a.jpg", "photos/b.jpg", "readme.txt"])];
        let mut p = MergePaginator::new(sources, 10, vec![], "", Some("/".to_string()), b"k".to_vec());
        let page = p.next_page(10).await.unwrap();
        assert_eq!(
            page.items,
            vec![
                ListingItem::CommonPrefix("photos/".to_string()),
                ListingItem::Object(Rec("readme.txt".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn truncates_at_limit_and_returns_resumable_token() {
        let sources = vec![source(&["a", "b", "c", "d"])];
        let mut p = MergePaginator::new(sources, 10, vec![], "", None, b"k".to_vec());
        let page = p.next_page(2).await.unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(!page.finished);
        let token = page.next_token.unwrap();
        let decoded = ListContinuationToken::decode(&token).unwrap();
        assert!(decoded.verify(b"k"));
    }
}
