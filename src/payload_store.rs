use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::metrics::{emit_counter, MetricName};

// chrono::Duration::seconds panics above i64::MAX / 1000.
const MAX_TTL_SECS: u64 = (i64::MAX / 1000) as u64;

/// A generated file waiting to be downloaded once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPayload {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

/// Transient in-process store for generated downloads, keyed by opaque tokens.
///
/// Entries are removed when taken, when older than the TTL, or when the
/// store is full (oldest first). Nothing survives a restart.
#[derive(Clone)]
pub struct PayloadStore {
    entries: Arc<Mutex<HashMap<String, StoredPayload>>>,
    ttl: Duration,
    max_entries: usize,
}

impl PayloadStore {
    pub fn new(ttl_secs: u64, max_entries: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ttl: Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64),
            max_entries: max_entries.max(1),
        }
    }

    /// Store a payload and return its download token.
    pub fn store(&self, filename: &str, content_type: &str, bytes: Vec<u8>) -> String {
        self.store_at(filename, content_type, bytes, Utc::now())
    }

    pub fn store_at(&self, filename: &str, content_type: &str, bytes: Vec<u8>, now: DateTime<Utc>) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let payload = StoredPayload {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            bytes,
            stored_at: now,
        };

        let mut entries = self.lock();
        self.evict(&mut entries, now);
        while entries.len() >= self.max_entries {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, p)| p.stored_at)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            entries.remove(&oldest);
            emit_counter(MetricName::PayloadsExpired, 1);
        }
        entries.insert(token.clone(), payload);
        emit_counter(MetricName::PayloadsStored, 1);
        debug!("Stored payload '{}' ({} entries)", filename, entries.len());

        token
    }

    /// Remove and return the payload for `token`, if it is still live.
    pub fn take(&self, token: &str) -> Option<StoredPayload> {
        self.take_at(token, Utc::now())
    }

    pub fn take_at(&self, token: &str, now: DateTime<Utc>) -> Option<StoredPayload> {
        let mut entries = self.lock();
        self.evict(&mut entries, now);
        let payload = entries.remove(token)?;
        emit_counter(MetricName::PayloadsDownloaded, 1);
        Some(payload)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict(&self, entries: &mut HashMap<String, StoredPayload>, now: DateTime<Utc>) {
        let before = entries.len();
        entries.retain(|_, p| now - p.stored_at < self.ttl);
        let expired = before - entries.len();
        if expired > 0 {
            emit_counter(MetricName::PayloadsExpired, expired as u64);
            debug!("Expired {} stored payloads", expired);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredPayload>> {
        // A poisoned lock only means another request panicked mid-insert;
        // the map itself is still usable.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_is_one_shot() {
        let store = PayloadStore::new(60, 10);
        let token = store.store("a.tsv", "text/plain", b"x".to_vec());

        let payload = store.take(&token).unwrap();
        assert_eq!(payload.filename, "a.tsv");
        assert_eq!(payload.bytes, b"x");
        assert!(store.take(&token).is_none());
        assert!(store.take("unknown").is_none());
    }

    #[test]
    fn test_expired_payloads_are_gone() {
        let store = PayloadStore::new(60, 10);
        let now = Utc::now();
        let token = store.store_at("a.tsv", "text/plain", vec![1], now);

        assert!(store.take_at(&token, now + Duration::seconds(61)).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_full_store_drops_oldest() {
        let store = PayloadStore::new(600, 2);
        let now = Utc::now();
        let first = store.store_at("1", "t", vec![], now);
        let second = store.store_at("2", "t", vec![], now + Duration::seconds(1));
        let third = store.store_at("3", "t", vec![], now + Duration::seconds(2));

        assert_eq!(store.len(), 2);
        assert!(store.take_at(&first, now + Duration::seconds(3)).is_none());
        assert!(store.take_at(&second, now + Duration::seconds(3)).is_some());
        assert!(store.take_at(&third, now + Duration::seconds(3)).is_some());
    }
}
