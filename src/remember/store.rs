// SPDX-FileCopyrightText: 2025-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    error::Result,
    subject::{Subject, SubjectContext},
};

/// Persistence backend for sealed identity records. The manager hands every
/// backend opaque bytes; where and how they are stored (and how storage is
/// keyed) is entirely the backend's concern.
///
/// `remember_serialized_identity` and the two forget operations must be
/// idempotent and safe to invoke concurrently for different subjects.
#[async_trait]
pub trait Store: Send + Sync {
    /// Persists the sealed identity bytes for later retrieval.
    async fn remember_serialized_identity(&self, subject: &Subject, sealed: &[u8]) -> Result<()>;

    /// Retrieves the previously persisted bytes, or `None` if no record is
    /// available for the given construction context.
    async fn get_remembered_serialized_identity(
        &self,
        context: &SubjectContext,
    ) -> Result<Option<Vec<u8>>>;

    /// Removes any remembered identity for the subject.
    async fn forget_identity(&self, subject: &Subject) -> Result<()>;

    /// Removes any remembered identity resolvable from the construction
    /// context. Used when a record turns out to be unusable before a subject
    /// exists to attribute it to.
    async fn forget_context_identity(&self, context: &SubjectContext) -> Result<()>;
}

/// A single-slot in-memory backend: one remembered identity per store
/// instance, the native analog of a per-device record.
pub struct Memory {
    record: RwLock<Option<Vec<u8>>>,
}

impl Memory {
    pub fn new() -> Self {
        Self {
            record: RwLock::new(None),
        }
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for Memory {
    async fn remember_serialized_identity(&self, _subject: &Subject, sealed: &[u8]) -> Result<()> {
        let mut record = self.record.write().await;
        *record = Some(sealed.to_vec());
        Ok(())
    }

    async fn get_remembered_serialized_identity(
        &self,
        _context: &SubjectContext,
    ) -> Result<Option<Vec<u8>>> {
        let record = self.record.read().await;
        Ok(record.clone())
    }

    async fn forget_identity(&self, _subject: &Subject) -> Result<()> {
        let mut record = self.record.write().await;
        *record = None;
        Ok(())
    }

    async fn forget_context_identity(&self, _context: &SubjectContext) -> Result<()> {
        let mut record = self.record.write().await;
        *record = None;
        Ok(())
    }
}

/// A single-slot backend persisting the sealed record to a file. The record
/// is already sealed when it reaches the backend, so the file contents are
/// opaque bytes.
pub struct File {
    path: PathBuf,
}

impl File {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_owned(),
        }
    }

    fn write(&self, sealed: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, sealed)?;
        Ok(())
    }

    fn read(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(sealed) => Ok(Some(sealed)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl Store for File {
    async fn remember_serialized_identity(&self, _subject: &Subject, sealed: &[u8]) -> Result<()> {
        self.write(sealed)
    }

    async fn get_remembered_serialized_identity(
        &self,
        _context: &SubjectContext,
    ) -> Result<Option<Vec<u8>>> {
        self.read()
    }

    async fn forget_identity(&self, _subject: &Subject) -> Result<()> {
        self.clear()
    }

    async fn forget_context_identity(&self, _context: &SubjectContext) -> Result<()> {
        self.clear()
    }
}
