// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bare password shares.

use std::time::Duration;

use tracing::{debug, info};

use super::{
    limits, open_envelope, reject_wildcards, Deposit, Record, Revealed, ShareService, Summary,
};
use crate::crypto;
use crate::error::ShareError;
use crate::storage::new_storage_key;

impl ShareService {
    /// Seal `plaintext` and store it as a Secret Record.
    ///
    /// `ttl_secs` and `views` are normalised before use.
    pub async fn deposit_secret(
        &self,
        plaintext: &[u8],
        ttl_secs: u64,
        views: u32,
        deletable: bool,
    ) -> Result<Deposit, ShareError> {
        let views = limits::normalize_views(views);
        let ttl_secs = limits::normalize_ttl(ttl_secs);

        let sealed = crypto::seal(plaintext)?;
        let storage_key = new_storage_key();
        let record = Record::secret(sealed.ciphertext, views, deletable);

        self.metadata
            .create(
                &self.keys.secret(&storage_key),
                &record.to_fields(false),
                Duration::from_secs(ttl_secs),
            )
            .await?;

        info!(storage_key = %storage_key, views, ttl_secs, deletable, "Secret deposited");
        Ok(Deposit {
            token: self.codec.encode(&storage_key, &sealed.key),
            storage_key,
            views,
            ttl_secs,
        })
    }

    /// Decrypt a secret, consuming one view.
    pub async fn reveal_secret(&self, token: &str) -> Result<Revealed, ShareError> {
        let token = self.codec.decode(token)?;
        reject_wildcards(&token.storage_key)?;
        let key = self.keys.secret(&token.storage_key);

        let record = self.load(&key).await?;
        let consumption = self.consume(&key, &record).await?;
        if consumption.exhausted {
            debug!(storage_key = %token.storage_key, "Secret exhausted and deleted");
        }

        let plaintext = open_envelope(
            &record.ciphertext,
            &token.encryption_key,
            consumption.ttl_secs,
        )?;

        Ok(Revealed {
            plaintext,
            views_remaining: consumption.views_remaining,
            ttl_secs: consumption.ttl_secs,
            ttl_text: limits::ttl_text(consumption.ttl_secs),
        })
    }

    /// Read a secret's metadata without consuming a view.
    pub async fn peek_secret(&self, token: &str) -> Result<Summary, ShareError> {
        let token = self.codec.decode(token)?;
        reject_wildcards(&token.storage_key)?;
        let key = self.keys.secret(&token.storage_key);

        let record = self.load(&key).await?;
        self.summarize(&key, &record).await
    }

    /// Delete a deletable secret. The token must be complete, even though
    /// only its storage key locates the record.
    pub async fn delete_secret(&self, token: &str) -> Result<(), ShareError> {
        let token = self.codec.decode(token)?;
        let storage_key = token.storage_key.as_str();
        reject_wildcards(storage_key)?;
        let key = self.keys.secret(storage_key);

        let record = self.load(&key).await?;
        if !record.deletable {
            return Err(ShareError::Unauthorized);
        }

        self.metadata.delete(&key).await?;
        info!(storage_key = %storage_key, "Secret deleted");
        Ok(())
    }
}
