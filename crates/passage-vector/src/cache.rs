//! Process-wide cache of parsed artifacts keyed by path.
//!
//! Every load stats the file. An entry whose recorded modification time
//! equals the on-disk one is returned as is; anything else is parsed fresh
//! and replaces the entry. Each path has its own lock held across the whole
//! stat/compare/parse/replace sequence, so two callers never parse the same
//! file concurrently and distinct paths never wait on each other. Failed
//! parses leave the previous entry untouched.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use passage_core::artifacts::read_chunks;
use passage_core::types::Chunk;
use passage_core::{Error, Result};

use crate::matrix::EmbeddingMatrix;

struct CacheSlot<T> {
    modified: SystemTime,
    payload: Arc<T>,
}

struct ArtifactStore<T> {
    entries: DashMap<PathBuf, Arc<Mutex<Option<CacheSlot<T>>>>>,
}

impl<T> ArtifactStore<T> {
    fn new() -> Self {
        Self { entries: DashMap::new() }
    }

    fn load(&self, path: &Path, disk_reads: &AtomicU64, parse: impl FnOnce(&Path) -> Result<T>) -> Result<Arc<T>> {
        // Clone the slot out so the map shard is released before blocking on the slot.
        let slot = self.entries.entry(path.to_path_buf()).or_default().clone();
        let mut guard = slot.lock();

        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| Error::io(path, e))?;
        if let Some(cached) = guard.as_ref() {
            if cached.modified == modified {
                debug!(path = %path.display(), "artifact cache hit");
                return Ok(Arc::clone(&cached.payload));
            }
        }

        disk_reads.fetch_add(1, Ordering::Relaxed);
        let payload = Arc::new(parse(path)?);
        debug!(path = %path.display(), reloaded = guard.is_some(), "artifact parsed");
        *guard = Some(CacheSlot { modified, payload: Arc::clone(&payload) });
        Ok(payload)
    }

    fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.value().lock().is_some()).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub chunk_artifacts: usize,
    pub embedding_artifacts: usize,
    pub disk_reads: u64,
}

pub struct ArtifactCache {
    chunks: ArtifactStore<Vec<Chunk>>,
    embeddings: ArtifactStore<EmbeddingMatrix>,
    disk_reads: AtomicU64,
}

impl Default for ArtifactCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self {
            chunks: ArtifactStore::new(),
            embeddings: ArtifactStore::new(),
            disk_reads: AtomicU64::new(0),
        }
    }

    /// The instance shared by everything in this process.
    pub fn global() -> Arc<ArtifactCache> {
        static GLOBAL: OnceLock<Arc<ArtifactCache>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ArtifactCache::new())))
    }

    pub fn load_chunks(&self, path: &Path) -> Result<Arc<Vec<Chunk>>> {
        self.chunks.load(path, &self.disk_reads, read_chunks)
    }

    pub fn load_embeddings(&self, path: &Path) -> Result<Arc<EmbeddingMatrix>> {
        self.embeddings.load(path, &self.disk_reads, EmbeddingMatrix::read_npy)
    }

    pub fn status(&self) -> CacheStatus {
        CacheStatus {
            chunk_artifacts: self.chunks.len(),
            embedding_artifacts: self.embeddings.len(),
            disk_reads: self.disk_reads.load(Ordering::Relaxed),
        }
    }
}
