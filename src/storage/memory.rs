// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process metadata store.
//!
//! Mirrors the Redis semantics the share service relies on: per-key expiry,
//! `HSET` on an absent key creating a record without expiry, `TTL` sentinels
//! mapping to `NotFound`, and an expiry notification for every key that
//! lapses. Expired keys are evicted lazily on access or by [`InMemoryStore::sweep`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use super::{
    ExpiryEvents, FieldSet, MetadataStore, StoreError, StoreResult, FIELD_VIEWS_COUNT,
};

const EXPIRY_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
struct Entry {
    fields: FieldSet,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

pub struct InMemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    expired_tx: broadcast::Sender<String>,
    available: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        let (expired_tx, _) = broadcast::channel(EXPIRY_CHANNEL_CAPACITY);
        Self {
            entries: Mutex::new(HashMap::new()),
            expired_tx,
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evict every lapsed key, publishing an expiry notification for each.
    /// Returns the number of evicted keys.
    pub fn sweep(&self) -> usize {
        let mut entries = self.lock();
        self.evict_expired(&mut entries)
    }

    /// Expire a key immediately, as if its TTL had just run out.
    pub fn expire_now(&self, key: &str) -> bool {
        let removed = self.lock().remove(key).is_some();
        if removed {
            self.publish_expired(key);
        }
        removed
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let mut entries = self.lock();
        self.evict_expired(&mut entries);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        let mut entries = self.lock();
        self.evict_expired(&mut entries);
        entries.contains_key(key)
    }

    /// Simulate the backing engine going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("in-memory store offline".to_string()))
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        // A poisoned map is still structurally valid.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn evict_expired(&self, entries: &mut HashMap<String, Entry>) -> usize {
        let now = Instant::now();
        let lapsed: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &lapsed {
            entries.remove(key);
            self.publish_expired(key);
        }
        lapsed.len()
    }

    fn publish_expired(&self, key: &str) {
        debug!(key = %key, "in-memory key expired");
        // No subscribers is fine.
        let _ = self.expired_tx.send(key.to_string());
    }
}

#[async_trait]
impl MetadataStore for InMemoryStore {
    async fn create(&self, key: &str, fields: &FieldSet, ttl: Duration) -> StoreResult<()> {
        self.check_available()?;
        if ttl.is_zero() {
            return Err(StoreError::Invalid("ttl must be positive".to_string()));
        }

        let mut entries = self.lock();
        self.evict_expired(&mut entries);

        let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
            fields: FieldSet::new(),
            expires_at: None,
        });
        for (name, value) in fields.iter() {
            entry.fields.set(name, value.clone());
        }
        entry.expires_at = Some(Instant::now() + ttl);
        Ok(())
    }

    async fn read_all(&self, key: &str) -> StoreResult<FieldSet> {
        self.check_available()?;
        let mut entries = self.lock();
        self.evict_expired(&mut entries);
        entries
            .get(key)
            .map(|entry| entry.fields.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn set_field(&self, key: &str, name: &str, value: &[u8]) -> StoreResult<()> {
        self.check_available()?;
        let mut entries = self.lock();
        self.evict_expired(&mut entries);

        entries
            .entry(key.to_string())
            .or_insert_with(|| Entry {
                fields: FieldSet::new(),
                expires_at: None,
            })
            .fields
            .set(name, value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.check_available()?;
        self.lock().remove(key);
        Ok(())
    }

    async fn remaining_ttl(&self, key: &str) -> StoreResult<u64> {
        self.check_available()?;
        let mut entries = self.lock();
        self.evict_expired(&mut entries);

        let expires_at = entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .ok_or(StoreError::NotFound)?;
        let remaining = expires_at.saturating_duration_since(Instant::now());
        // Round to the nearest second, like Redis TTL.
        Ok(((remaining.as_millis() + 500) / 1000) as u64)
    }

    async fn consume_view(&self, key: &str) -> StoreResult<i64> {
        self.check_available()?;
        let mut entries = self.lock();
        self.evict_expired(&mut entries);

        let entry = entries.get_mut(key).ok_or(StoreError::NotFound)?;
        let consumed = entry.fields.int(FIELD_VIEWS_COUNT).unwrap_or(0) + 1;
        entry
            .fields
            .set(FIELD_VIEWS_COUNT, consumed.to_string().into_bytes());
        Ok(consumed)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check_available()
    }
}

#[async_trait]
impl ExpiryEvents for InMemoryStore {
    async fn subscribe_expired(&self) -> StoreResult<BoxStream<'static, String>> {
        self.check_available()?;
        let rx = self.expired_tx.subscribe();

        let events = stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(key) => return Some((key, rx)),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return None,
                }
            }
        });
        Ok(events.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FIELD_TOKEN, FIELD_VIEWS};

    fn record() -> FieldSet {
        FieldSet::new()
            .with_bytes(FIELD_TOKEN, b"sealed".to_vec())
            .with_int(FIELD_VIEWS, 2)
            .with_int(FIELD_VIEWS_COUNT, 0)
    }

    #[tokio::test]
    async fn create_read_delete() {
        let store = InMemoryStore::new();
        store
            .create("k", &record(), Duration::from_secs(60))
            .await
            .unwrap();

        let fields = store.read_all("k").await.unwrap();
        assert_eq!(fields.bytes(FIELD_TOKEN), Some(&b"sealed"[..]));
        assert_eq!(fields.int(FIELD_VIEWS), Some(2));

        store.delete("k").await.unwrap();
        assert_eq!(store.read_all("k").await, Err(StoreError::NotFound));
        // idempotent
        store.delete("k").await.unwrap();
    }

    #[tokio::test]
    async fn zero_ttl_is_rejected() {
        let store = InMemoryStore::new();
        let err = store.create("k", &record(), Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn remaining_ttl_reports_seconds() {
        let store = InMemoryStore::new();
        store
            .create("k", &record(), Duration::from_secs(3600))
            .await
            .unwrap();
        let ttl = store.remaining_ttl("k").await.unwrap();
        assert!((3599..=3600).contains(&ttl));
        assert_eq!(store.remaining_ttl("missing").await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn set_field_on_absent_key_has_no_expiry() {
        let store = InMemoryStore::new();
        store.set_field("ghost", FIELD_VIEWS_COUNT, b"3").await.unwrap();

        let fields = store.read_all("ghost").await.unwrap();
        assert_eq!(fields.int(FIELD_VIEWS_COUNT), Some(3));
        assert_eq!(fields.bytes(FIELD_TOKEN), None);
        assert_eq!(store.remaining_ttl("ghost").await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn consume_view_only_touches_live_keys() {
        let store = InMemoryStore::new();
        store
            .create("k", &record(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.consume_view("k").await.unwrap(), 1);
        assert_eq!(store.consume_view("k").await.unwrap(), 2);
        assert_eq!(store.consume_view("absent").await, Err(StoreError::NotFound));
        assert!(!store.contains("absent"));
    }

    #[tokio::test]
    async fn lapsed_keys_are_evicted_and_announced() {
        let store = InMemoryStore::new();
        let mut events = store.subscribe_expired().await.unwrap();

        store
            .create("short", &record(), Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(store.sweep(), 1);
        assert_eq!(events.next().await.as_deref(), Some("short"));
        assert_eq!(store.read_all("short").await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn expire_now_announces_once() {
        let store = InMemoryStore::new();
        let mut events = store.subscribe_expired().await.unwrap();
        store
            .create("k", &record(), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(store.expire_now("k"));
        assert!(!store.expire_now("k"));
        assert_eq!(events.next().await.as_deref(), Some("k"));
    }

    #[tokio::test]
    async fn explicit_delete_is_not_an_expiry() {
        let store = InMemoryStore::new();
        let mut events = store.subscribe_expired().await.unwrap();
        store
            .create("deleted", &record(), Duration::from_secs(60))
            .await
            .unwrap();
        store
            .create("expired", &record(), Duration::from_secs(60))
            .await
            .unwrap();

        store.delete("deleted").await.unwrap();
        store.expire_now("expired");
        assert_eq!(events.next().await.as_deref(), Some("expired"));
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = InMemoryStore::new();
        store.set_available(false);
        assert!(matches!(
            store.read_all("k").await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(store.ping().await, Err(StoreError::Unavailable(_))));

        store.set_available(true);
        assert!(store.ping().await.is_ok());
    }
}
