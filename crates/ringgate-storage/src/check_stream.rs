//! Check Stream (§4.3): a pass-through byte stream parameterized by
//! `{algorithm, maxBytes, timeout, counter}`. Computes MD5 as bytes
//! flow through, fires `timeout` if no byte has been observed for
//! `timeout`, `length_exceeded` if the running count would exceed
//! `maxBytes`, and `done` when input ends.

use bytes::Bytes;
use futures::Stream;
use parking_lot::Mutex;
use ringgate_common::checksum::Md5Calculator;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CheckStreamError {
    #[error("no byte observed for the configured idle timeout")]
    Timeout,
    #[error("body exceeded the configured maximum of {max} bytes")]
    LengthExceeded { max: u64 },
    #[error("upstream body error: {0}")]
    Upstream(String),
}

struct SharedState {
    calculator: Md5Calculator,
    digest_base64: Option<String>,
}

/// A handle kept by the caller to read the running/final digest and
/// byte count; cheap to clone, shares state with the stream.
#[derive(Clone)]
pub struct CheckStreamHandle {
    state: Arc<Mutex<SharedState>>,
}

impl CheckStreamHandle {
    #[must_use]
    pub fn bytes_seen(&self) -> u64 {
        self.state.lock().calculator.bytes_seen()
    }

    /// Base64 digest. Only meaningful once the stream has reached
    /// `done` — returns `None` while bytes are still being read.
    #[must_use]
    pub fn digest(&self) -> Option<String> {
        self.state.lock().digest_base64.clone()
    }
}

/// Wrap `inner` with MD5 accounting, an idle timeout, and a max-size
/// guard. Returns the wrapped stream plus a handle for reading the
/// digest after the stream completes.
pub fn check_stream<S, E>(
    inner: S,
    max_bytes: u64,
    idle_timeout: Duration,
) -> (
    impl Stream<Item = Result<Bytes, CheckStreamError>> + Send + 'static,
    CheckStreamHandle,
)
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = Arc::new(Mutex::new(SharedState {
        calculator: Md5Calculator::new(),
        digest_base64: None,
    }));
    let handle = CheckStreamHandle {
        state: state.clone(),
    };

    let stream = async_stream::stream! {
        futures::pin_mut!(inner);
        loop {
            let next = tokio::time::timeout(idle_timeout, futures::StreamExt::next(&mut inner)).await;
            let item = match next {
                Err(_) => {
                    yield Err(CheckStreamError::Timeout);
                    return;
                }
                Ok(None) => {
                    let mut guard = state.lock();
                    let calc = std::mem::take(&mut guard.calculator);
                    let (_, b64) = calc.finalize();
                    guard.digest_base64 = Some(b64);
                    return;
                }
                Ok(Some(Err(e))) => {
                    yield Err(CheckStreamError::Upstream(e.to_string()));
                    return;
                }
                Ok(Some(Ok(chunk))) => chunk,
            };

            {
                let mut guard = state.lock();
                let would_be = guard.calculator.bytes_seen() + item.len() as u64;
                if would_be > max_bytes {
                    drop(guard);
                    yield Err(CheckStreamError::LengthExceeded { max: max_bytes });
                    return;
                }
                guard.calculator.update(&item);
            }
            yield Ok(item);
        }
    };

    (stream, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{stream, StreamExt};

    #[tokio::test]
    async fn computes_digest_matching_one_shot_md5() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"hello, ")),
            Ok(Bytes::from_static(b"world!")),
        ];
        let (s, handle) = check_stream(stream::iter(chunks), 1024, Duration::from_secs(5));
        let collected: Vec<_> = s.collect().await;
        assert!(collected.iter().all(Result::is_ok));
        assert_eq!(handle.bytes_seen(), 13);
        assert_eq!(
            handle.digest(),
            Some(ringgate_common::checksum::md5_base64(b"hello, world!"))
        );
    }

    #[tokio::test]
    async fn fires_length_exceeded_before_overrunning_max() {
        let chunks: Vec<Result<Bytes, std::io::Error>> =
            vec![Ok(Bytes::from_static(b"0123456789"))];
        let (s, _handle) = check_stream(stream::iter(chunks), 5, Duration::from_secs(5));
        futures::pin_mut!(s);
        let first = s.next().await.unwrap();
        assert_eq!(first, Err(CheckStreamError::LengthExceeded { max: 5 }));
    }

    #[tokio::test]
    async fn fires_timeout_when_no_byte_arrives_in_time() {
        let never = stream::pending::<Result<Bytes, std::io::Error>>();
        let (s, _handle) = check_stream(never, 1024, Duration::from_millis(10));
        futures::pin_mut!(s);
        let first = s.next().await.unwrap();
        assert_eq!(first, Err(CheckStreamError::Timeout));
    }
}
