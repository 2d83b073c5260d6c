//! Limit-Marker Stream (§4.4): wraps a caller-supplied `open_page`
//! call, transparently re-issuing it whenever a page comes back full.

use async_trait::async_trait;
use std::collections::VecDeque;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("advanceTo target {target} is less than the current marker {current}")]
    MarkerRegressed { current: String, target: String },
    #[error("upstream listing error: {0}")]
    Upstream(String),
}

/// A record a `LimitMarkerStream` yields must expose the byte-wise
/// sort key used for merge ordering (§3: "sorted by name ascending
/// using byte-wise UTF-8 collation").
pub trait ListingRecord: Clone + Send + Sync + 'static {
    fn key(&self) -> &str;
}

/// Caller-supplied page source: one RPC per page, keyed by marker and
/// bounded by limit.
#[async_trait]
pub trait PageSource<R: ListingRecord>: Send + Sync {
    async fn open_page(&self, marker: &str, limit: u32) -> Result<Vec<R>, ListingError>;
}

/// State machine described in §4.4: `Idle → Fetching → Reading →
/// (Exhausted | Refetching) → …`. Transitions on page boundary depend
/// on whether the last page was full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Reading,
    Exhausted,
}

pub struct LimitMarkerStream<R: ListingRecord, S: PageSource<R>> {
    source: S,
    page_limit: u32,
    marker: String,
    buffer: VecDeque<R>,
    state: State,
    last_page_was_full: bool,
}

impl<R: ListingRecord, S: PageSource<R>> LimitMarkerStream<R, S> {
    #[must_use]
    pub fn new(source: S, page_limit: u32, start_marker: impl Into<String>) -> Self {
        Self {
            source,
            page_limit,
            marker: start_marker.into(),
            buffer: VecDeque::new(),
            state: State::Idle,
            last_page_was_full: false,
        }
    }

    #[must_use]
    pub fn current_marker(&self) -> &str {
        &self.marker
    }

    /// True once the underlying source reports end and the current
    /// page was not full.
    #[must_use]
    pub fn done(&self) -> bool {
        self.state == State::Exhausted && self.buffer.is_empty()
    }

    async fn fetch_next_page(&mut self) -> Result<(), ListingError> {
        let page = self.source.open_page(&self.marker, self.page_limit).await?;
        self.last_page_was_full = page.len() as u32 == self.page_limit;
        if let Some(last) = page.last() {
            self.marker = last.key().to_string();
        }
        self.buffer.extend(page);
        self.state = if self.last_page_was_full {
            State::Reading
        } else {
            State::Exhausted
        };
        Ok(())
    }

    /// Next record, or `None` at end of stream.
    pub async fn next(&mut self) -> Result<Option<R>, ListingError> {
        if self.buffer.is_empty() {
            match self.state {
                State::Idle => self.fetch_next_page().await?,
                State::Exhausted => return Ok(None),
                State::Reading if self.last_page_was_full => self.fetch_next_page().await?,
                State::Reading => self.state = State::Exhausted,
            }
        }
        Ok(self.buffer.pop_front())
    }

    /// Peek without consuming, fetching a page first if the buffer is
    /// empty and the source is not exhausted.
    pub async fn peek(&mut self) -> Result<Option<&R>, ListingError> {
        if self.buffer.is_empty() && self.state != State::Exhausted {
            if self.state == State::Idle || self.last_page_was_full {
                self.fetch_next_page().await?;
            } else {
                self.state = State::Exhausted;
            }
        }
        Ok(self.buffer.front())
    }

    /// Discard records until one with key ≥ `new_marker` appears,
    /// buffering it as pending. Idempotent for any marker ≥ the
    /// current marker (§9 Open Question 2); rejects a strictly lesser
    /// marker.
    pub async fn advance_to(&mut self, new_marker: &str) -> Result<(), ListingError> {
        if new_marker < self.marker.as_str() && !self.buffer.is_empty() {
            let head_key = self.buffer.front().map(|r| r.key().to_string());
            if let Some(head_key) = head_key {
                if new_marker < head_key.as_str() {
                    return Err(ListingError::MarkerRegressed {
                        current: self.marker.clone(),
                        target: new_marker.to_string(),
                    });
                }
            }
        }
        loop {
            match self.peek().await? {
                None => return Ok(()),
                Some(record) if record.key() >= new_marker => return Ok(()),
                Some(_) => {
                    self.buffer.pop_front();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq, Eq)]
    struct Rec(String);

    impl ListingRecord for Rec {
        fn key(&self) -> &str {
            &self.0
        }
    }

    struct FixedPages {
        pages: std::sync::Mutex<Vec<Vec<Rec>>>,
    }

    #[async_trait]
    impl PageSource<Rec> for FixedPages {
        async fn open_page(&self, _marker: &str, _limit: u32) -> Result<Vec<Rec>, ListingError> {
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                Ok(vec![])
            } else {
                Ok(pages.remove(0))
            }
        }
    }

    fn recs(names: &[&str]) -> Vec<Rec> {
        names.iter().map(|n| Rec((*n).to_string())).collect()
    }

    #[tokio::test]
    async fn reopens_on_full_page_and_exhausts_on_partial() {
        let source = FixedPages {
            pages: std::sync::Mutex::new(vec![recs(&["a", "b"]), recs(&["c"])]),
        };
        let mut s = LimitMarkerStream::new(source, 2, "");
        assert_eq!(s.next().await.unwrap().unwrap().0, "a");
        assert_eq!(s.next().await.unwrap().unwrap().0, "b");
        assert_eq!(s.next().await.unwrap().unwrap().0, "c");
        assert!(s.next().await.unwrap().is_none());
        assert!(s.done());
    }

    #[tokio::test]
    async fn advance_to_skips_buffered_records() {
        let source = FixedPages {
            pages: std::sync::Mutex::new(vec![recs(&["a", "b", "c"])]),
        };
        let mut s = LimitMarkerStream::new(source, 10, "");
        s.advance_to("b").await.unwrap();
        assert_eq!(s.next().await.unwrap().unwrap().0, "b");
    }

    #[tokio::test]
    async fn advance_to_lesser_marker_is_rejected() {
        let source = FixedPages {
            pages: std::sync::Mutex::new(vec![recs(&["b", "c"])]),
        };
        let mut s = LimitMarkerStream::new(source, 10, "");
        s.advance_to("c").await.unwrap();
        let err = s.advance_to("a").await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn advance_to_same_marker_is_idempotent() {
        let source = FixedPages {
            pages: std::sync::Mutex::new(vec![recs(&["b", "c"])]),
        };
        let mut s = LimitMarkerStream::new(source, 10, "");
        s.advance_to("b").await.unwrap();
        s.advance_to("b").await.unwrap();
        assert_eq!(s.next().await.unwrap().unwrap().0, "b");
    }
}
