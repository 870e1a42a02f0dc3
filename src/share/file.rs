// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File shares: a File Record guarding a zip bundle, optionally linked to a
//! Secret Record that carries the download password.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    limits, open_envelope, reject_wildcards, store_missing_is_ok, Record, ShareService, Summary,
};
use crate::crypto;
use crate::error::ShareError;
use crate::storage::{new_storage_key, BlobError, StagedFile, StoreError, FIELD_VIEWS_COUNT};

/// Input of [`ShareService::deposit_file`].
#[derive(Debug, Clone)]
pub struct FileShareRequest {
    pub files: Vec<StagedFile>,
    /// Download password chosen by the depositor. Empty means none.
    pub password: Option<String>,
    pub ttl_secs: u64,
    pub views: u32,
    pub deletable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDeposit {
    pub token: String,
    pub storage_key: String,
    pub views: u32,
    pub ttl_secs: u64,
    /// Token of the linked Secret Record, when a password was chosen.
    pub password_token: Option<String>,
}

/// A successful file reveal: an open handle on the bundle.
///
/// The handle stays readable even if this reveal removed the bundle.
#[derive(Debug)]
pub struct FileDownload {
    pub file: tokio::fs::File,
    pub file_name: String,
    pub views_remaining: u32,
    pub ttl_secs: u64,
    pub ttl_text: String,
}

impl ShareService {
    /// Store a file bundle behind a new File Record.
    ///
    /// With a password, a non-deletable linked Secret Record holding it is
    /// created first. Without one, a random passphrase is sealed instead so
    /// the record always carries ciphertext.
    pub async fn deposit_file(&self, request: FileShareRequest) -> Result<FileDeposit, ShareError> {
        if request.files.is_empty() {
            return Err(BlobError::Empty.into());
        }

        let views = limits::normalize_views(request.views);
        let ttl_secs = limits::normalize_ttl(request.ttl_secs);
        let password = request.password.filter(|p| !p.is_empty());

        let (plaintext, linked) = match password {
            Some(password) => {
                let linked = self
                    .deposit_secret(password.as_bytes(), ttl_secs, views, false)
                    .await?;
                (password, Some(linked))
            }
            None => (crypto::random_passphrase()?, None),
        };

        let storage_key = new_storage_key();
        let linked_key = linked.as_ref().map(|d| d.storage_key.clone());
        let sealed = match crypto::seal(plaintext.as_bytes()) {
            Ok(sealed) => sealed,
            Err(e) => {
                self.rollback(&storage_key, None, linked_key.as_deref()).await;
                return Err(e.into());
            }
        };
        let record = Record::file(sealed.ciphertext, views, request.deletable, linked_key.clone());
        let key = self.keys.file(&storage_key);

        if let Err(e) = self
            .metadata
            .create(&key, &record.to_fields(true), Duration::from_secs(ttl_secs))
            .await
        {
            self.rollback(&storage_key, None, linked_key.as_deref()).await;
            return Err(e.into());
        }

        let file_count = request.files.len();
        if let Err(e) = self.blobs.store(&storage_key, request.files).await {
            self.rollback(&storage_key, Some(&key), linked_key.as_deref())
                .await;
            return Err(e.into());
        }

        info!(
            storage_key = %storage_key,
            files = file_count,
            views,
            ttl_secs,
            deletable = request.deletable,
            password_provided = linked.is_some(),
            "File share deposited"
        );

        Ok(FileDeposit {
            token: self.codec.encode(&storage_key, &sealed.key),
            storage_key,
            views,
            ttl_secs,
            password_token: linked.map(|d| d.token),
        })
    }

    async fn rollback(&self, storage_key: &str, file_key: Option<&str>, linked_key: Option<&str>) {
        if let Some(key) = file_key {
            if let Err(e) = self.metadata.delete(key).await {
                warn!(storage_key = %storage_key, error = %e, "Failed to roll back file record");
            }
        }
        self.cascade(storage_key, linked_key).await;
    }

    /// Check the download password, consume a view and hand out the bundle.
    ///
    /// A wrong or missing password yields `Unauthorized` without consuming a
    /// view. The last permitted reveal deletes the File Record, its linked
    /// Secret Record and the bundle.
    pub async fn reveal_file(
        &self,
        token: &str,
        password: Option<&str>,
    ) -> Result<FileDownload, ShareError> {
        let token = self.codec.decode(token)?;
        reject_wildcards(&token.storage_key)?;
        let key = self.keys.file(&token.storage_key);

        let record = self.load(&key).await?;
        let ttl_secs = self.metadata.remaining_ttl(&key).await?;
        let expected = open_envelope(&record.ciphertext, &token.encryption_key, ttl_secs)?;

        if record.password_provided
            && !crypto::passwords_match(&expected, password.unwrap_or_default().as_bytes())
        {
            warn!(storage_key = %token.storage_key, "Rejected file download password");
            return Err(ShareError::Unauthorized);
        }

        let file = self
            .blobs
            .open(&token.storage_key)
            .await
            .map_err(|e| match e {
                BlobError::NotFound => ShareError::NotFound,
                other => ShareError::Blob(other),
            })?;

        let consumption = self.consume(&key, &record).await?;
        if consumption.exhausted {
            self.cascade(&token.storage_key, record.linked_key.as_deref())
                .await;
            debug!(storage_key = %token.storage_key, "File share exhausted and removed");
        } else if let Some(linked) = record.linked_key.as_deref() {
            self.sync_linked_views(linked, consumption.consumed).await;
        }

        Ok(FileDownload {
            file,
            file_name: format!("{}.zip", token.storage_key),
            views_remaining: consumption.views_remaining,
            ttl_secs: consumption.ttl_secs,
            ttl_text: limits::ttl_text(consumption.ttl_secs),
        })
    }

    /// Mirror the File Record's consumed count onto the linked secret, but
    /// only while it still exists: writing to an absent key would recreate
    /// it without an expiry.
    async fn sync_linked_views(&self, linked_storage_key: &str, consumed: i64) {
        let key = self.keys.secret(linked_storage_key);
        match self.metadata.remaining_ttl(&key).await {
            Ok(_) => {
                if let Err(e) = self
                    .metadata
                    .set_field(&key, FIELD_VIEWS_COUNT, consumed.to_string().as_bytes())
                    .await
                {
                    warn!(
                        storage_key = %linked_storage_key,
                        error = %e,
                        "Failed to sync linked secret views"
                    );
                }
            }
            Err(StoreError::NotFound) => {
                debug!(storage_key = %linked_storage_key, "Linked secret already gone");
            }
            Err(e) => {
                warn!(
                    storage_key = %linked_storage_key,
                    error = %e,
                    "Failed to read linked secret TTL"
                );
            }
        }
    }

    /// Read a file share's metadata without consuming a view.
    pub async fn peek_file(&self, token: &str) -> Result<Summary, ShareError> {
        let token = self.codec.decode(token)?;
        reject_wildcards(&token.storage_key)?;
        let key = self.keys.file(&token.storage_key);

        let record = self.load(&key).await?;
        self.summarize(&key, &record).await
    }

    /// Delete a deletable file share together with its linked secret and
    /// bundle.
    pub async fn delete_file(&self, token: &str) -> Result<(), ShareError> {
        let token = self.codec.decode(token)?;
        let storage_key = token.storage_key.as_str();
        reject_wildcards(storage_key)?;
        let key = self.keys.file(storage_key);

        let record = self.load(&key).await?;
        if !record.deletable {
            return Err(ShareError::Unauthorized);
        }

        self.metadata.delete(&key).await?;
        if let Some(linked) = record.linked_key.as_deref() {
            store_missing_is_ok(self.metadata.delete(&self.keys.secret(linked)).await)?;
        }
        self.blobs.remove(storage_key).await?;

        info!(storage_key = %storage_key, "File share deleted");
        Ok(())
    }
}
