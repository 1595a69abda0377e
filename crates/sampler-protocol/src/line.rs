//! Line token codec
//!
//! Data sources write one value per line. Lines end with `\r` or `\n` (either
//! terminator on its own, so `\r\n` simply yields an empty segment that is
//! skipped). Each segment is truncated to the token cap, trimmed of spaces,
//! tabs and line terminators, and yielded if anything remains.
//!
//! Bytes of an unterminated segment beyond the cap are dropped as they
//! arrive, so the pending buffer never grows past the cap no matter how the
//! input is fragmented.

use std::collections::VecDeque;

use crate::StreamCodec;

/// Default maximum token length in bytes
pub const DEFAULT_MAX_TOKEN_LEN: usize = 511;

fn is_terminator(b: u8) -> bool {
    b == b'\r' || b == b'\n'
}

fn is_trimmed(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Streaming line codec
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Bytes of the current, not yet terminated segment
    partial: Vec<u8>,
    /// Terminated segments waiting to be taken
    ready: VecDeque<Vec<u8>>,
    max_token_len: usize,
    /// Bytes dropped from the current segment
    truncated: usize,
}

impl LineCodec {
    /// Create a codec with the default token cap
    pub fn new() -> Self {
        Self::with_max_token_len(DEFAULT_MAX_TOKEN_LEN)
    }

    /// Create a codec with a custom token cap
    pub fn with_max_token_len(max_token_len: usize) -> Self {
        let max_token_len = max_token_len.max(1);
        Self {
            partial: Vec::with_capacity(max_token_len.min(512)),
            ready: VecDeque::new(),
            max_token_len,
            truncated: 0,
        }
    }

    /// The token cap in bytes
    pub fn max_token_len(&self) -> usize {
        self.max_token_len
    }

    fn finish_segment(&mut self) {
        if self.truncated > 0 {
            tracing::debug!(
                "Truncated token of {} bytes to {}",
                self.partial.len() + self.truncated,
                self.max_token_len
            );
            self.truncated = 0;
        }
        let segment = std::mem::take(&mut self.partial);
        self.ready.push_back(segment);
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamCodec for LineCodec {
    type Item = String;

    fn push_bytes(&mut self, data: &[u8]) {
        let mut rest = data;
        while !rest.is_empty() {
            match rest.iter().position(|&b| is_terminator(b)) {
                Some(pos) => {
                    self.extend_partial(&rest[..pos]);
                    self.finish_segment();
                    rest = &rest[pos + 1..];
                }
                None => {
                    self.extend_partial(rest);
                    break;
                }
            }
        }
    }

    fn next_token(&mut self) -> Option<Self::Item> {
        while let Some(segment) = self.ready.pop_front() {
            let text = String::from_utf8_lossy(&segment);
            let token = text.trim_matches(is_trimmed);
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
        None
    }

    fn pending(&self) -> usize {
        self.partial.len()
    }

    fn clear(&mut self) {
        self.partial.clear();
        self.ready.clear();
        self.truncated = 0;
    }
}

impl LineCodec {
    fn extend_partial(&mut self, bytes: &[u8]) {
        let room = self.max_token_len - self.partial.len();
        let take = bytes.len().min(room);
        self.partial.extend_from_slice(&bytes[..take]);
        self.truncated += bytes.len() - take;
    }
}
