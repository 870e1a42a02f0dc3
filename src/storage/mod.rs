// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Metadata Storage Module
//!
//! Share metadata lives in a TTL-capable key-value engine (Redis in
//! production). Each record is a hash of fields with an expiry attached to
//! the key. File bundles are kept out of the engine and managed by the
//! [`BlobStore`](blobs::BlobStore).
//!
//! ## Key Layout
//!
//! ```text
//! <prefix><storage_key>         → Secret Record
//! <prefix>file_<storage_key>    → File Record
//! ```
//!
//! ## Record Fields
//!
//! ```text
//! token         sealed envelope (bytes)
//! views         view budget
//! views_count   views consumed so far
//! deletable     0/1
//! provided      0/1          (File Records only)
//! provided_key  storage key  (File Records only, when provided = 1)
//! ```
//!
//! ## Concurrency
//!
//! Every single call is atomic at key granularity. Sequences of calls are
//! not: a read followed by a write can interleave with another client. Use
//! [`MetadataStore::consume_view`] when a view must be counted exactly once.

pub mod blobs;
pub mod memory;
pub mod redis_store;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;
use uuid::Uuid;

pub use blobs::{BlobError, BlobStore, FsBlobStore, StagedFile};
pub use memory::InMemoryStore;
pub use redis_store::RedisStore;

/// Field holding the sealed envelope.
pub const FIELD_TOKEN: &str = "token";
/// Field holding the view budget.
pub const FIELD_VIEWS: &str = "views";
/// Field holding the number of consumed views.
pub const FIELD_VIEWS_COUNT: &str = "views_count";
pub const FIELD_DELETABLE: &str = "deletable";
pub const FIELD_PROVIDED: &str = "provided";
pub const FIELD_PROVIDED_KEY: &str = "provided_key";

/// Marker between the prefix and the storage key of File Records.
const FILE_MARKER: &str = "file_";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Key absent, expired, or without an expiry.
    #[error("record not found")]
    NotFound,
    /// Backing engine could not be reached or rejected the command.
    #[error("metadata store unavailable: {0}")]
    Unavailable(String),
    /// Request could not be expressed against the engine.
    #[error("invalid store request: {0}")]
    Invalid(String),
}

impl From<::redis::RedisError> for StoreError {
    fn from(e: ::redis::RedisError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Hash fields of one record, values kept as raw bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSet(HashMap<String, Vec<u8>>);

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bytes(mut self, name: &str, value: impl Into<Vec<u8>>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn with_int(self, name: &str, value: i64) -> Self {
        self.with_bytes(name, value.to_string())
    }

    pub fn with_bool(self, name: &str, value: bool) -> Self {
        self.with_bytes(name, if value { "1" } else { "0" })
    }

    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        self.0.get(name).map(Vec::as_slice)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.bytes(name).and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Integer field; absent or unparsable values read as `None`.
    pub fn int(&self, name: &str) -> Option<i64> {
        self.text(name).and_then(|s| s.trim().parse().ok())
    }

    /// Boolean field accepting `1`/`0` and `true`/`false`. Absent is `false`.
    pub fn flag(&self, name: &str) -> bool {
        matches!(
            self.text(name).map(str::trim),
            Some("1") | Some("true") | Some("TRUE") | Some("True")
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<u8>)> {
        self.0.iter()
    }

    pub(crate) fn set(&mut self, name: &str, value: Vec<u8>) {
        self.0.insert(name.to_string(), value);
    }
}

impl FromIterator<(String, Vec<u8>)> for FieldSet {
    fn from_iter<I: IntoIterator<Item = (String, Vec<u8>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// TTL-bearing record storage.
///
/// Keys passed in are fully qualified (see [`KeySpace`]).
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Write all fields and attach `ttl`. A zero TTL is rejected.
    async fn create(&self, key: &str, fields: &FieldSet, ttl: Duration) -> StoreResult<()>;

    /// Full field set of a live record, or `NotFound`.
    async fn read_all(&self, key: &str) -> StoreResult<FieldSet>;

    /// Overwrite a single field.
    async fn set_field(&self, key: &str, name: &str, value: &[u8]) -> StoreResult<()>;

    /// Remove a record. Absent keys are not an error.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Whole seconds left before the record expires.
    ///
    /// Keys without an expiry and absent keys both map to `NotFound`.
    async fn remaining_ttl(&self, key: &str) -> StoreResult<u64>;

    /// Increment `views_count` if and only if the record exists, returning the
    /// new count. Runs as a single server-side step.
    async fn consume_view(&self, key: &str) -> StoreResult<i64>;

    /// Connectivity check.
    async fn ping(&self) -> StoreResult<()>;
}

/// Source of key-expiry notifications.
#[async_trait]
pub trait ExpiryEvents: Send + Sync {
    /// Subscribe to expiry notifications. Each item is the expired key name.
    async fn subscribe_expired(&self) -> StoreResult<BoxStream<'static, String>>;
}

/// Record class, which decides the key layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Secret,
    File,
}

/// Prefix-aware key composition shared by the core and the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn key(&self, kind: RecordKind, storage_key: &str) -> String {
        match kind {
            RecordKind::Secret => self.secret(storage_key),
            RecordKind::File => self.file(storage_key),
        }
    }

    pub fn secret(&self, storage_key: &str) -> String {
        format!("{}{storage_key}", self.prefix)
    }

    pub fn file(&self, storage_key: &str) -> String {
        format!("{}{FILE_MARKER}{storage_key}", self.prefix)
    }

    /// Storage key of a File Record from an expired key name.
    ///
    /// Only names of the form `<prefix>file_<uuid>` qualify; anything else,
    /// including Secret Records and other tenants' keys, yields `None`.
    pub fn file_storage_key(&self, key_name: &str) -> Option<String> {
        let rest = key_name
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix(FILE_MARKER)?;
        let parsed = Uuid::parse_str(rest).ok()?;
        let canonical = parsed.hyphenated().to_string();
        (canonical == rest).then_some(canonical)
    }
}

/// Generate a storage key for a new record.
pub fn new_storage_key() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_set_accessors() {
        let fields = FieldSet::new()
            .with_bytes(FIELD_TOKEN, vec![0u8, 1, 2])
            .with_int(FIELD_VIEWS, 5)
            .with_bool(FIELD_DELETABLE, true)
            .with_bool(FIELD_PROVIDED, false);

        assert_eq!(fields.bytes(FIELD_TOKEN), Some(&[0u8, 1, 2][..]));
        assert_eq!(fields.int(FIELD_VIEWS), Some(5));
        assert!(fields.flag(FIELD_DELETABLE));
        assert!(!fields.flag(FIELD_PROVIDED));
        assert!(!fields.flag("missing"));
        assert_eq!(fields.int("missing"), None);
    }

    #[test]
    fn flag_accepts_textual_booleans() {
        let fields = FieldSet::new()
            .with_bytes("a", "true")
            .with_bytes("b", "false")
            .with_bytes("c", "1");
        assert!(fields.flag("a"));
        assert!(!fields.flag("b"));
        assert!(fields.flag("c"));
    }

    #[test]
    fn key_space_layout() {
        let keys = KeySpace::new("okuru_");
        assert_eq!(keys.secret("abc"), "okuru_abc");
        assert_eq!(keys.file("abc"), "okuru_file_abc");
        assert_eq!(keys.key(RecordKind::File, "abc"), "okuru_file_abc");
    }

    #[test]
    fn file_storage_key_parses_only_file_records() {
        let keys = KeySpace::new("okuru_");
        let id = "2b4a7a4e-6e0b-4a8e-9d62-8a1f3c1b9e10";

        assert_eq!(
            keys.file_storage_key(&format!("okuru_file_{id}")),
            Some(id.to_string())
        );
        // secret record
        assert_eq!(keys.file_storage_key(&format!("okuru_{id}")), None);
        // other tenant
        assert_eq!(keys.file_storage_key(&format!("other_file_{id}")), None);
        // nested marker or path tricks
        assert_eq!(keys.file_storage_key(&format!("okuru_file_file_{id}")), None);
        assert_eq!(keys.file_storage_key("okuru_file_../../etc/passwd"), None);
        assert_eq!(keys.file_storage_key("okuru_file_"), None);
        // non-canonical uuid forms
        assert_eq!(
            keys.file_storage_key(&format!("okuru_file_{}", id.replace('-', ""))),
            None
        );
        assert_eq!(
            keys.file_storage_key(&format!("okuru_file_{}", id.to_uppercase())),
            None
        );
    }

    #[test]
    fn storage_keys_are_unique_uuids() {
        let a = new_storage_key();
        let b = new_storage_key();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }
}
