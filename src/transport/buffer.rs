//! Accumulation buffer with tail-bounded prompt search.
//!
//! Only the last `search_depth` bytes are searched for the prompt
//! pattern, not the entire output. For large responses (full interface
//! or routing tables) this keeps prompt detection O(search_depth).

use bytes::BytesMut;
use memchr::memmem;
use regex::bytes::Regex;

/// Buffer holding the raw response text for the command in flight.
#[derive(Debug)]
pub struct PromptBuffer {
    buf: BytesMut,
    search_depth: usize,
}

impl PromptBuffer {
    /// Create a buffer that searches the last `search_depth` bytes for
    /// the prompt.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            search_depth: search_depth.max(1),
        }
    }

    /// Append a chunk of channel data.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Whether the accumulated text contains `needle` anywhere.
    /// An empty needle trivially matches.
    pub fn contains(&self, needle: &[u8]) -> bool {
        needle.is_empty() || memmem::find(&self.buf, needle).is_some()
    }

    /// Whether the buffer tail matches the prompt pattern.
    pub fn ends_with_prompt(&self, pattern: &Regex) -> bool {
        let start = self.buf.len().saturating_sub(self.search_depth);
        pattern.is_match(&self.buf[start..])
    }

    /// A response is complete once the issued command has been echoed
    /// back and the output ends with the device prompt.
    pub fn response_complete(&self, echo: &[u8], prompt: &Regex) -> bool {
        self.contains(echo) && self.ends_with_prompt(prompt)
    }

    /// Take the accumulated text, lossily decoded with carriage returns
    /// stripped. Leaves the buffer empty.
    pub fn take_text(&mut self) -> String {
        let raw = self.buf.split();
        let text = String::from_utf8_lossy(&raw);
        text.replace('\r', "")
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
