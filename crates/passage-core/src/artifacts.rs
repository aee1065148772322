//! On-disk artifact layout for an ingested document.
//!
//! A document `report.pdf` ingested into `data_dir` owns three files:
//! `report_chunks.json`, `report_embedding.npy` and `report_meta.json`.
//! Writers go through [`write_atomic`] so a reader never sees a partial file.
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{Chunk, DocumentMeta};

const CHUNKS_SUFFIX: &str = "_chunks.json";
const EMBEDDING_SUFFIX: &str = "_embedding.npy";
const META_SUFFIX: &str = "_meta.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub stem: String,
    pub chunks: PathBuf,
    pub embeddings: PathBuf,
    pub meta: PathBuf,
}

impl ArtifactPaths {
    /// Derive artifact paths from the uploaded file name's stem.
    pub fn for_document(data_dir: &Path, filename: &str) -> Result<Self> {
        let stem = Path::new(filename)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Validation(format!("cannot derive a document name from '{filename}'")))?;
        Ok(Self {
            chunks: data_dir.join(format!("{stem}{CHUNKS_SUFFIX}")),
            embeddings: data_dir.join(format!("{stem}{EMBEDDING_SUFFIX}")),
            meta: data_dir.join(format!("{stem}{META_SUFFIX}")),
            stem,
        })
    }

    pub fn all(&self) -> [&Path; 3] {
        [&self.chunks, &self.embeddings, &self.meta]
    }
}

pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Write `path` by filling a temporary sibling file and renaming it into place.
pub fn write_atomic<F>(path: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        fill(&mut writer)?;
        writer.flush().map_err(|e| Error::io(path, e))?;
    }
    tmp.as_file().sync_all().map_err(|e| Error::io(path, e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    debug!(path = %path.display(), "artifact written");
    Ok(())
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, |w| {
        serde_json::to_writer_pretty(w, value)
            .map_err(|e| Error::io(path, std::io::Error::other(e)))
    })
}

pub fn write_chunks(path: &Path, chunks: &[Chunk]) -> Result<()> {
    write_json(path, chunks)
}

/// Parse a chunk-list artifact and check that it is a well-formed, ordered list.
pub fn read_chunks(path: &Path) -> Result<Vec<Chunk>> {
    let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let chunks: Vec<Chunk> = serde_json::from_str(&raw)
        .map_err(|e| Error::Consistency(format!("chunk artifact {}: {e}", path.display())))?;
    for (position, chunk) in chunks.iter().enumerate() {
        if chunk.chunk_id != position {
            return Err(Error::Consistency(format!(
                "chunk artifact {}: record {position} carries chunk_id {}",
                path.display(),
                chunk.chunk_id
            )));
        }
        if chunk.char_start >= chunk.char_end {
            return Err(Error::Consistency(format!(
                "chunk artifact {}: chunk {position} has empty span {}..{}",
                path.display(),
                chunk.char_start,
                chunk.char_end
            )));
        }
    }
    Ok(chunks)
}

pub fn write_meta(path: &Path, meta: &DocumentMeta) -> Result<()> {
    write_json(path, meta)
}

pub fn read_meta(path: &Path) -> Result<DocumentMeta> {
    let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::Consistency(format!("meta artifact {}: {e}", path.display())))
}

/// All documents ingested into `data_dir`, sorted by file name.
pub fn list_documents(data_dir: &Path) -> Result<Vec<DocumentMeta>> {
    if !data_dir.exists() {
        return Ok(vec![]);
    }
    let mut docs = Vec::new();
    for entry in walkdir::WalkDir::new(data_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let is_meta = entry.file_name().to_string_lossy().ends_with(META_SUFFIX);
        if !is_meta {
            continue;
        }
        match read_meta(entry.path()) {
            Ok(meta) => docs.push(meta),
            Err(err) => warn!(path = %entry.path().display(), %err, "skipping unreadable meta"),
        }
    }
    docs.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(docs)
}

/// Remove every artifact of `filename`, returning the paths that existed.
pub fn delete_document(data_dir: &Path, filename: &str) -> Result<Vec<PathBuf>> {
    let paths = ArtifactPaths::for_document(data_dir, filename)?;
    let mut deleted = Vec::new();
    for path in paths.all() {
        match fs::remove_file(path) {
            Ok(()) => deleted.push(path.to_path_buf()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(path, e)),
        }
    }
    if deleted.is_empty() {
        return Err(Error::NotFound(format!("no artifacts for document '{filename}'")));
    }
    Ok(deleted)
}
