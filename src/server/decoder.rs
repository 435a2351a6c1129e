//! Incremental UTF-8 decoding for byte streams.
//!
//! Network chunks can end in the middle of a multi-byte character. The
//! decoder holds back such a trailing partial sequence until the bytes that
//! complete it arrive.

/// Stateful UTF-8 decoder.
///
/// Invalid sequences become U+FFFD; incomplete trailing sequences are kept
/// for the next call.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + bytes` as forms complete codepoints.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::with_capacity(self.pending.len());
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    out.push_str(s);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    if let Ok(prefix) = std::str::from_utf8(&self.pending[..valid_up_to]) {
                        out.push_str(prefix);
                    }
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            self.pending.drain(..valid_up_to);
                            return out;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + len);
                        }
                    }
                }
            }
        }
    }

    /// Flush at end of input. A held-back partial sequence becomes U+FFFD.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        self.pending.clear();
        Some(char::REPLACEMENT_CHARACTER.to_string())
    }

    /// Number of bytes held back awaiting a complete codepoint.
    pub fn pending_bytes(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"hello"), "hello");
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn test_split_multibyte_char() {
        // "é" = C3 A9, "€" = E2 82 AC
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&[b'a', 0xC3]), "a");
        assert_eq!(decoder.pending_bytes(), 1);
        assert_eq!(decoder.decode(&[0xA9, 0xE2]), "é");
        assert_eq!(decoder.decode(&[0x82]), "");
        assert_eq!(decoder.decode(&[0xAC, b'!']), "€!");
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn test_four_byte_char_one_byte_at_a_time() {
        let bytes = "🦀".as_bytes();
        let mut decoder = Utf8Decoder::new();
        let mut out = String::new();
        for b in bytes {
            out.push_str(&decoder.decode(std::slice::from_ref(b)));
        }
        assert_eq!(out, "🦀");
    }

    #[test]
    fn test_finish_flushes_truncated_char() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(decoder.finish().as_deref(), Some("\u{FFFD}"));
        assert_eq!(decoder.pending_bytes(), 0);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_invalid_byte_replaced() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
        assert_eq!(decoder.pending_bytes(), 0);
    }
}
