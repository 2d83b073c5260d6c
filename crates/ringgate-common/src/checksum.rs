//! Streaming MD5 computation for the Check Stream, plus the canonical
//! zero-byte constant used for empty object bodies.
//!
//! The gateway's computed digest must equal exactly what each storage
//! node reports having received (§3), so this wraps the real `md5`
//! crate rather than a fast/approximate hash.

use base64::Engine as _;

/// Base64 MD5 of the empty byte string, stored verbatim on zero-byte
/// objects per §3's invariant.
pub const ZERO_BYTE_MD5_BASE64: &str = "1B2M2Y8AsgTpgAmY7PhCfg==";

/// Streaming MD5 calculator. `update()` may be called any number of
/// times before `finalize()`.
#[derive(Default)]
pub struct Md5Calculator {
    ctx: md5::Context,
    len: u64,
}

impl Md5Calculator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ctx: md5::Context::new(),
            len: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.ctx.consume(data);
        self.len += data.len() as u64;
    }

    #[must_use]
    pub fn bytes_seen(&self) -> u64 {
        self.len
    }

    /// Finalize, returning the raw digest and its base64 encoding (the
    /// form stored as `content_md5` and returned in `Content-MD5`).
    #[must_use]
    pub fn finalize(self) -> ([u8; 16], String) {
        let digest = self.ctx.compute();
        let bytes: [u8; 16] = digest.0;
        let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
        (bytes, b64)
    }
}

/// Compute the base64 MD5 of a complete in-memory buffer (used for
/// `Content-MD5` request-header verification against an already-
/// buffered small body, and in tests).
#[must_use]
pub fn md5_base64(data: &[u8]) -> String {
    let digest = md5::compute(data);
    base64::engine::general_purpose::STANDARD.encode(digest.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_byte_constant_matches_real_md5_of_empty_input() {
        assert_eq!(md5_base64(b""), ZERO_BYTE_MD5_BASE64);
    }

    #[test]
    fn streaming_matches_one_shot() {
        let data = b"hello, world!";
        let mut calc = Md5Calculator::new();
        calc.update(&data[..7]);
        calc.update(&data[7..]);
        let (_, streamed) = calc.finalize();
        assert_eq!(streamed, md5_base64(data));
    }

    #[test]
    fn bytes_seen_tracks_total_length() {
        let mut calc = Md5Calculator::new();
        calc.update(b"abc");
        calc.update(b"de");
        assert_eq!(calc.bytes_seen(), 5);
    }
}
