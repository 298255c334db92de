//! Stats Persistence
//!
//! Durable storage for the stats table. Loading happens once, while the pool
//! is being built; saving happens after every call's terminal outcome.
//! Persistence is best-effort: the pool logs store failures and carries on.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::StatsDocument;
use crate::error::StoreError;

/// Durable home of the stats table
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Read the last saved document.
    ///
    /// Called during pool construction, before any request is served.
    /// A store with nothing saved yet returns an empty document.
    fn load(&self) -> Result<StatsDocument, StoreError>;

    /// Replace the saved document
    async fn save(&self, document: &StatsDocument) -> Result<(), StoreError>;
}

// ============================================================================
// JSON File Store
// ============================================================================

/// Stats table kept as a pretty-printed JSON file
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by the given file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl StatsStore for JsonFileStore {
    fn load(&self) -> Result<StatsDocument, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No saved stats, starting fresh");
                return Ok(StatsDocument::new());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let document: StatsDocument = serde_json::from_str(&raw)?;
        tracing::debug!(
            path = %self.path.display(),
            providers = document.len(),
            "Loaded saved stats"
        );
        Ok(document)
    }

    async fn save(&self, document: &StatsDocument) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(document)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error(e))?;
            }
        }

        // Readers never observe a half-written document
        let staging = self.staging_path();
        tokio::fs::write(&staging, &json)
            .await
            .map_err(|e| self.io_error(e))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        Ok(())
    }
}

// ============================================================================
// Memory Store
// ============================================================================

/// In-process store for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: Mutex<StatsDocument>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with a document
    #[must_use]
    pub fn with_document(document: StatsDocument) -> Self {
        Self {
            document: Mutex::new(document),
        }
    }

    /// Copy of the currently saved document
    #[must_use]
    pub fn document(&self) -> StatsDocument {
        self.document.lock().clone()
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    fn load(&self) -> Result<StatsDocument, StoreError> {
        Ok(self.document())
    }

    async fn save(&self, document: &StatsDocument) -> Result<(), StoreError> {
        *self.document.lock() = document.clone();
        Ok(())
    }
}
