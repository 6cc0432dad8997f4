//! TTL cache for command responses.
//!
//! Keyed by exact command text; entries expire after a fixed TTL.
//! Owned by one client, never shared across devices.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Default response time-to-live.
pub const DEFAULT_RESPONSE_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct CachedResponse {
    output: String,
    captured_at: Instant,
}

/// Command text → (response text, capture timestamp).
#[derive(Debug)]
pub struct ResponseCache {
    entries: HashMap<String, CachedResponse>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Look up a live entry. Expired entries read as absent.
    pub fn get(&self, command: &str) -> Option<String> {
        self.entries
            .get(command)
            .filter(|entry| entry.captured_at.elapsed() <= self.ttl)
            .map(|entry| entry.output.clone())
    }

    /// Store a fresh response. Piggybacks a purge of expired entries so
    /// long-lived clients do not accumulate stale text.
    pub fn insert(&mut self, command: String, output: String) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| entry.captured_at.elapsed() <= ttl);
        self.entries.insert(
            command,
            CachedResponse {
                output,
                captured_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_RESPONSE_TTL)
    }
}
