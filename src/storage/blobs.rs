// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! File bundle storage.
//!
//! Uploaded files are archived into one uncompressed zip per File Record,
//! named after the record's storage key:
//!
//! ```text
//! <root>/<storage_key>.zip
//! ```
//!
//! Bundles are written once (temp file + rename) and only ever removed as a
//! whole.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Extension appended to the storage key.
pub const BUNDLE_EXTENSION: &str = "zip";

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob not found")]
    NotFound,
    #[error("invalid blob key '{0}'")]
    InvalidKey(String),
    #[error("bundle has no files")]
    Empty,
    #[error("blob already exists")]
    AlreadyExists,
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("blob I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for BlobError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => BlobError::NotFound,
            io::ErrorKind::AlreadyExists => BlobError::AlreadyExists,
            _ => BlobError::Io(e),
        }
    }
}

/// One uploaded file waiting to be archived.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub file_name: String,
    pub contents: Vec<u8>,
}

impl StagedFile {
    pub fn new(file_name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            contents: contents.into(),
        }
    }
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Archive `files` under `key`. Fails if a bundle already exists.
    async fn store(&self, key: &str, files: Vec<StagedFile>) -> Result<(), BlobError>;

    /// Remove the bundle. A missing bundle is not an error.
    async fn remove(&self, key: &str) -> Result<(), BlobError>;

    /// Location of the bundle for `key`.
    fn path(&self, key: &str) -> Result<PathBuf, BlobError>;

    /// Open the bundle for reading.
    async fn open(&self, key: &str) -> Result<tokio::fs::File, BlobError>;

    /// Write-read-delete check of the bundle directory.
    async fn health_check(&self) -> Result<(), BlobError>;
}

/// Bundles kept as zip files in a local directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Use `root` as the bundle directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, BlobError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(BlobError::Io)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bundle_path(&self, key: &str) -> Result<PathBuf, BlobError> {
        validate_key(key)?;
        Ok(self.root.join(format!("{key}.{BUNDLE_EXTENSION}")))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn store(&self, key: &str, files: Vec<StagedFile>) -> Result<(), BlobError> {
        if files.is_empty() {
            return Err(BlobError::Empty);
        }
        let path = self.bundle_path(key)?;
        let count = files.len();

        tokio::task::spawn_blocking(move || write_bundle(&path, files))
            .await
            .map_err(|e| BlobError::Io(io::Error::other(e)))??;

        debug!(storage_key = %key, files = count, "Stored file bundle");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BlobError> {
        let path = self.bundle_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(storage_key = %key, "Removed file bundle");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobError::Io(e)),
        }
    }

    fn path(&self, key: &str) -> Result<PathBuf, BlobError> {
        self.bundle_path(key)
    }

    async fn open(&self, key: &str) -> Result<tokio::fs::File, BlobError> {
        let path = self.bundle_path(key)?;
        Ok(tokio::fs::File::open(&path).await?)
    }

    async fn health_check(&self) -> Result<(), BlobError> {
        let scratch = self
            .root
            .join(format!("{HEALTH_CHECK_PREFIX}{}", uuid::Uuid::new_v4()));
        let data = b"health_check_data";

        tokio::fs::write(&scratch, data).await.map_err(BlobError::Io)?;
        let read_back = tokio::fs::read(&scratch).await.map_err(BlobError::Io)?;
        tokio::fs::remove_file(&scratch).await.map_err(BlobError::Io)?;

        if read_back != data {
            return Err(BlobError::Io(io::Error::other("health check data mismatch")));
        }
        Ok(())
    }
}

/// Scratch files of concurrent health checks get a unique suffix each.
const HEALTH_CHECK_PREFIX: &str = ".health_check-";

/// Keys name files directly, so only `[A-Za-z0-9-]` is accepted.
fn validate_key(key: &str) -> Result<(), BlobError> {
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn write_bundle(path: &Path, files: Vec<StagedFile>) -> Result<(), BlobError> {
    if path.exists() {
        return Err(BlobError::AlreadyExists);
    }

    let temp_path = path.with_extension("part");
    let result = (|| {
        let file = File::create(&temp_path)?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        let mut used = HashSet::new();
        for staged in files {
            let name = unique_name(&mut used, entry_name(&staged.file_name));
            zip.start_file(name, options)?;
            zip.write_all(&staged.contents)?;
        }

        let mut writer = zip.finish()?;
        writer.flush()?;
        Ok::<(), BlobError>(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Base name of an uploaded file, stripped of any directory components.
fn entry_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    match base {
        "" | "." | ".." => "file".to_string(),
        name => name.to_string(),
    }
}

/// Zip entries must be unique; repeats get a ` (n)` suffix before the extension.
fn unique_name(used: &mut HashSet<String>, name: String) -> String {
    if used.insert(name.clone()) {
        return name;
    }

    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], &name[dot..]),
        _ => (name.as_str(), ""),
    };
    let mut n = 1;
    loop {
        let candidate = format!("{stem} ({n}){ext}");
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
