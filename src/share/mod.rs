// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Share Core
//!
//! Deposit, reveal, summary and deletion of Secret Records and File Records.
//!
//! ## Record Lifecycle
//!
//! ```text
//! deposit ──► Active(views_remaining, ttl_remaining)
//!                 │ reveal (views_consumed + 1)
//!                 ├──────────────► Active            (views left)
//!                 └──────────────► Absent            (budget spent: delete + cascade)
//!             TTL expiry ────────► Absent            (any time)
//!             explicit delete ───► Absent            (deletable only)
//! ```
//!
//! ## View Accounting
//!
//! By default a reveal reads the record, decides between delete and update,
//! and then writes. Two concurrent reveals can read the same
//! `views_consumed` and both succeed, granting one view beyond the budget.
//! With strict accounting enabled the counter is incremented server side
//! first and any reveal that lands beyond the budget gets `NotFound`.
//!
//! ## Envelope Age
//!
//! Ciphertext is opened with the record's *current* remaining TTL as the
//! age budget, read just before the state transition.

mod file;
pub mod limits;
mod record;
mod secret;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::crypto::{self, EnvelopeError};
use crate::error::ShareError;
use crate::storage::{BlobStore, KeySpace, MetadataStore, StoreError, FIELD_VIEWS_COUNT};
use crate::token::TokenCodec;

pub use file::{FileDeposit, FileDownload, FileShareRequest};
use record::Record;

/// Result of a deposit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    pub token: String,
    pub storage_key: String,
    /// Normalised view budget.
    pub views: u32,
    /// Normalised lifetime in seconds.
    pub ttl_secs: u64,
}

/// Decrypted secret plus what is left of its budgets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revealed {
    pub plaintext: Vec<u8>,
    pub views_remaining: u32,
    pub ttl_secs: u64,
    pub ttl_text: String,
}

/// Metadata of a live record, read without consuming a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub views_allowed: u32,
    pub views_remaining: u32,
    pub ttl_secs: u64,
    pub ttl_text: String,
    pub deletable: bool,
    /// File shares only: a download password is required.
    pub password_required: bool,
}

/// Outcome of counting one view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Consumption {
    consumed: i64,
    views_remaining: u32,
    ttl_secs: u64,
    exhausted: bool,
}

#[derive(Clone)]
pub struct ShareService {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    codec: TokenCodec,
    keys: KeySpace,
    strict_views: bool,
}

impl ShareService {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        codec: TokenCodec,
        keys: KeySpace,
    ) -> Self {
        Self {
            metadata,
            blobs,
            codec,
            keys,
            strict_views: false,
        }
    }

    /// Count views with a server-side increment instead of read-then-write.
    pub fn with_strict_views(mut self, strict: bool) -> Self {
        self.strict_views = strict;
        self
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn keys(&self) -> &KeySpace {
        &self.keys
    }

    pub fn metadata(&self) -> &Arc<dyn MetadataStore> {
        &self.metadata
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    pub fn strict_views(&self) -> bool {
        self.strict_views
    }

    async fn load(&self, key: &str) -> Result<Record, ShareError> {
        let fields = self.metadata.read_all(key).await?;
        Record::from_fields(&fields)
    }

    async fn summarize(&self, key: &str, record: &Record) -> Result<Summary, ShareError> {
        let ttl_secs = self.metadata.remaining_ttl(key).await?;
        Ok(Summary {
            views_allowed: clamp_views(record.views_allowed),
            views_remaining: clamp_views(record.views_remaining()),
            ttl_secs,
            ttl_text: limits::ttl_text(ttl_secs),
            deletable: record.deletable,
            password_required: record.password_provided,
        })
    }

    /// Count one view of `record` stored under `key`, deleting the record
    /// when this was the last one. Cascades are left to the caller.
    async fn consume(&self, key: &str, record: &Record) -> Result<Consumption, ShareError> {
        if self.strict_views {
            return self.consume_strict(key, record).await;
        }

        let consumed = record.views_consumed + 1;
        let views_remaining = clamp_views(record.views_allowed - consumed);
        let ttl_secs = self.metadata.remaining_ttl(key).await?;

        let exhausted = consumed >= record.views_allowed;
        if exhausted {
            self.metadata.delete(key).await?;
        } else {
            self.metadata
                .set_field(key, FIELD_VIEWS_COUNT, consumed.to_string().as_bytes())
                .await?;
        }

        Ok(Consumption {
            consumed,
            views_remaining,
            ttl_secs,
            exhausted,
        })
    }

    async fn consume_strict(&self, key: &str, record: &Record) -> Result<Consumption, ShareError> {
        let ttl_secs = self.metadata.remaining_ttl(key).await?;
        let consumed = self.metadata.consume_view(key).await?;

        if consumed > record.views_allowed {
            debug!(key = %key, consumed, "View budget already spent");
            return Err(ShareError::NotFound);
        }

        let exhausted = consumed >= record.views_allowed;
        if exhausted {
            self.metadata.delete(key).await?;
        }

        Ok(Consumption {
            consumed,
            views_remaining: clamp_views(record.views_allowed - consumed),
            ttl_secs,
            exhausted,
        })
    }

    /// Best-effort removal of everything hanging off a File Record.
    async fn cascade(&self, storage_key: &str, linked_key: Option<&str>) {
        if let Some(linked) = linked_key {
            if let Err(e) = self.metadata.delete(&self.keys.secret(linked)).await {
                warn!(storage_key = %storage_key, error = %e, "Failed to delete linked secret");
            }
        }
        if let Err(e) = self.blobs.remove(storage_key).await {
            warn!(storage_key = %storage_key, error = %e, "Failed to remove file bundle");
        }
    }
}

/// Storage keys used for deletion come straight from the URL; glob
/// characters must never reach the backing store.
fn reject_wildcards(storage_key: &str) -> Result<(), ShareError> {
    if storage_key.contains(['*', '?', '[', ']']) {
        return Err(ShareError::NotFound);
    }
    Ok(())
}

/// Open an envelope with the record's remaining lifetime as the age budget.
fn open_envelope(ciphertext: &[u8], key: &str, ttl_secs: u64) -> Result<Vec<u8>, ShareError> {
    crypto::open(ciphertext, key, ttl_secs).map_err(|e| match e {
        EnvelopeError::InvalidKey => ShareError::InvalidToken,
        EnvelopeError::Expired { .. } => ShareError::NotFound,
        other => ShareError::Crypto(other),
    })
}

fn clamp_views(views: i64) -> u32 {
    views.clamp(0, i64::from(u32::MAX)) as u32
}

fn store_missing_is_ok(result: Result<(), StoreError>) -> Result<(), ShareError> {
    match result {
        Ok(()) | Err(StoreError::NotFound) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
