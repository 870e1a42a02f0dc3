// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::config::Config;
use crate::share::ShareService;
use crate::storage::{BlobError, BlobStore, FsBlobStore, InMemoryStore, KeySpace, MetadataStore};
use crate::token::TokenCodec;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub shares: ShareService,
}

impl AppState {
    pub fn new(
        config: Config,
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        let shares = ShareService::new(
            metadata,
            blobs,
            TokenCodec::new(config.token_separator.clone()),
            KeySpace::new(config.key_prefix.clone()),
        )
        .with_strict_views(config.strict_views);

        Self {
            config: Arc::new(config),
            shares,
        }
    }

    /// State backed by an [`InMemoryStore`] and a bundle directory under
    /// `config.file_folder`.
    pub fn in_memory(config: Config) -> Result<(Self, Arc<InMemoryStore>), BlobError> {
        let store = Arc::new(InMemoryStore::new());
        let blobs = Arc::new(FsBlobStore::new(&config.file_folder)?);
        Ok((Self::new(config, store.clone(), blobs), store))
    }
}
