// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Cleanup Watcher
//!
//! Background task that removes file bundles whose File Record expired.
//!
//! ## Strategy
//!
//! The metadata store publishes the name of every key whose TTL runs out.
//! The watcher keeps the names of File Records of its own key space
//! (`<prefix>file_<uuid>`) and removes the matching bundle. Secret Records
//! have no bundle and are ignored, as are other tenants' keys.
//!
//! A linked Secret Record is *not* deleted when its File Record expires.
//! Both are created with the same TTL and lapse together.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown. The loop
//! also ends when the notification stream closes.

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::storage::{BlobStore, ExpiryEvents, KeySpace, StoreResult};

pub struct CleanupWatcher {
    events: BoxStream<'static, String>,
    cleaner: BundleCleaner,
}

/// The part of the watcher that acts on a single expired key.
///
/// Kept apart from the notification stream, which is `Send` but not `Sync`.
#[derive(Clone)]
pub struct BundleCleaner {
    blobs: Arc<dyn BlobStore>,
    keys: KeySpace,
}

impl CleanupWatcher {
    /// Subscribe to expiry notifications.
    ///
    /// Subscription failure is returned so the caller can treat it as fatal.
    pub async fn subscribe(
        source: &dyn ExpiryEvents,
        blobs: Arc<dyn BlobStore>,
        keys: KeySpace,
    ) -> StoreResult<Self> {
        let events = source.subscribe_expired().await?;
        Ok(Self {
            events,
            cleaner: BundleCleaner { blobs, keys },
        })
    }

    pub fn cleaner(&self) -> &BundleCleaner {
        &self.cleaner
    }

    /// Run until cancelled or until the notification stream ends.
    ///
    /// ```rust,ignore
    /// tokio::spawn(watcher.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        let Self {
            mut events,
            cleaner,
        } = self;
        info!(prefix = %cleaner.keys.prefix(), "Cleanup watcher starting");

        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(key_name) => {
                        cleaner.handle_expired(&key_name).await;
                    }
                    None => {
                        warn!("Expiry notification stream closed; cleanup watcher stopping");
                        return;
                    }
                },
                _ = shutdown.cancelled() => {
                    info!("Cleanup watcher shutting down");
                    return;
                }
            }
        }
    }
}

impl BundleCleaner {
    /// React to one expired key. Returns whether a bundle removal was attempted.
    pub async fn handle_expired(&self, key_name: &str) -> bool {
        let Some(storage_key) = self.keys.file_storage_key(key_name) else {
            debug!(key = %key_name, "Ignoring expiry of non-file key");
            return false;
        };

        match self.blobs.remove(&storage_key).await {
            Ok(()) => info!(storage_key = %storage_key, "Removed bundle of expired file share"),
            Err(e) => warn!(
                storage_key = %storage_key,
                error = %e,
                "Failed to remove bundle of expired file share"
            ),
        }
        true
    }
}
