// src/index/store.rs
use crate::extractors::text::{list_sources, read_source_text_lossy};
use crate::index::chunker::{split_text, CHUNK_OVERLAP, CHUNK_SIZE};
use crate::llm::Embedder;
use crate::utils::error::IndexError;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const INDEX_FILE: &str = "index.json";
const LOCK_FILE: &str = ".build.lock";
const EMBED_BATCH_SIZE: usize = 32;
// A lock older than this is treated as left behind by a killed build.
const STALE_LOCK_AFTER: Duration = Duration::from_secs(6 * 60 * 60);

/// One transcript chunk and its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub source: String,
    pub chunk: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedIndex {
    embedding_model: String,
    chunk_size: usize,
    chunk_overlap: usize,
    built_at: String,
    entries: Vec<IndexEntry>,
}

/// Transcript passages with embeddings, persisted as JSON in `index_dir`.
#[derive(Debug)]
pub struct SemanticIndex {
    data: PersistedIndex,
}

/// Contents of the lock file: who holds it and since when.
#[derive(Debug, Serialize, Deserialize)]
struct LockOwner {
    pid: u32,
    acquired_at: String,
}

/// Held for the duration of a build; removes the lock file when dropped.
struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    fn acquire(index_dir: &Path) -> Result<Self, IndexError> {
        fs::create_dir_all(index_dir)?;
        let path = index_dir.join(LOCK_FILE);
        match Self::create(&path) {
            Err(IndexError::Busy(_)) if lock_is_stale(&path) => {
                tracing::warn!("Removing stale index build lock {}", path.display());
                fs::remove_file(&path)?;
                Self::create(&path)
            }
            other => other,
        }
    }

    fn create(path: &Path) -> Result<Self, IndexError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Err(IndexError::Busy(path.to_path_buf())),
            Err(e) => return Err(IndexError::Io(e)),
        };
        let lock = Self { path: path.to_path_buf() };
        let owner = LockOwner { pid: std::process::id(), acquired_at: chrono::Utc::now().to_rfc3339() };
        file.write_all(&serde_json::to_vec(&owner)?)?;
        tracing::debug!("Acquired index build lock {} (pid {})", path.display(), owner.pid);
        Ok(lock)
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Failed to release index build lock {}: {}", self.path.display(), e);
        }
    }
}

/// A lock is stale when its owner process is gone or it is older than
/// `STALE_LOCK_AFTER`. Unreadable contents fall back to the file's age.
fn lock_is_stale(path: &Path) -> bool {
    let owner = fs::read(path).ok().and_then(|raw| serde_json::from_slice::<LockOwner>(&raw).ok());
    match owner {
        Some(owner) => {
            if !process_alive(owner.pid) {
                return true;
            }
            chrono::DateTime::parse_from_rfc3339(&owner.acquired_at)
                .map(|at| chrono::Utc::now().signed_duration_since(at))
                .ok()
                .and_then(|age| age.to_std().ok())
                .is_some_and(|age| age > STALE_LOCK_AFTER)
        }
        None => fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > STALE_LOCK_AFTER),
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

// No cheap liveness check elsewhere; rely on the lock's age.
#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

/// Reads every transcript and splits it into `(source, chunk, text)` triples.
fn collect_chunks(transcripts_dir: &Path, extensions: &[String]) -> std::io::Result<Vec<(String, usize, String)>> {
    let mut pending = Vec::new();
    for path in list_sources(transcripts_dir, extensions)? {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let text = read_source_text_lossy(&path);
        // pdf-extract separates pages with form feeds; chunk each page on its own
        let chunks: Vec<String> = text
            .split('\u{c}')
            .flat_map(|page| split_text(page, CHUNK_SIZE, CHUNK_OVERLAP))
            .collect();
        tracing::debug!("{}: {} chunks", source, chunks.len());
        pending.extend(chunks.into_iter().enumerate().map(|(i, c)| (source.clone(), i, c)));
    }
    Ok(pending)
}

impl SemanticIndex {
    /// Loads the persisted index, or `None` if none has been built yet.
    pub fn load(index_dir: &Path) -> Result<Option<Self>, IndexError> {
        let path = index_dir.join(INDEX_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let data: PersistedIndex = serde_json::from_str(&raw)?;
        tracing::info!("Loaded semantic index with {} chunks from {}", data.entries.len(), path.display());
        Ok(Some(Self { data }))
    }

    /// (Re)builds the index from every transcript in `transcripts_dir` while
    /// holding the exclusive build lock, then persists it atomically.
    pub async fn build(
        index_dir: &Path,
        transcripts_dir: &Path,
        extensions: &[String],
        embedder: &dyn Embedder,
    ) -> Result<Self, IndexError> {
        let _lock = BuildLock::acquire(index_dir)?;
        tracing::info!("Building semantic index from {}", transcripts_dir.display());

        let dir = transcripts_dir.to_path_buf();
        let extensions = extensions.to_vec();
        let pending = tokio::task::spawn_blocking(move || collect_chunks(&dir, &extensions)).await??;

        let mut entries = Vec::with_capacity(pending.len());
        for batch in pending.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|(_, _, text)| text.clone()).collect();
            let vectors = embedder.embed(&texts).await?;
            for ((source, chunk, text), embedding) in batch.iter().cloned().zip(vectors) {
                entries.push(IndexEntry { source, chunk, text, embedding });
            }
        }

        let index = Self {
            data: PersistedIndex {
                embedding_model: embedder.model_name().to_string(),
                chunk_size: CHUNK_SIZE,
                chunk_overlap: CHUNK_OVERLAP,
                built_at: chrono::Utc::now().to_rfc3339(),
                entries,
            },
        };
        index.persist(index_dir)?;
        tracing::info!("Semantic index built: {} chunks", index.len());
        Ok(index)
    }

    /// Index for answering queries: the persisted one, or an empty index if
    /// nothing has been built yet. Never builds and never takes the lock.
    pub fn load_or_empty(index_dir: &Path, embedding_model: &str) -> Result<Self, IndexError> {
        match Self::load(index_dir)? {
            Some(index) => {
                if index.data.embedding_model != embedding_model {
                    tracing::warn!(
                        "Index was built with '{}' but queries use '{}'; run build-index to refresh",
                        index.data.embedding_model,
                        embedding_model
                    );
                }
                Ok(index)
            }
            None => {
                tracing::warn!("No semantic index at {}; run build-index to create it", index_dir.display());
                Ok(Self::empty(embedding_model))
            }
        }
    }

    fn empty(embedding_model: &str) -> Self {
        Self {
            data: PersistedIndex {
                embedding_model: embedding_model.to_string(),
                chunk_size: CHUNK_SIZE,
                chunk_overlap: CHUNK_OVERLAP,
                built_at: String::new(),
                entries: Vec::new(),
            },
        }
    }

    fn persist(&self, index_dir: &Path) -> Result<(), IndexError> {
        let tmp = index_dir.join(format!("{}.tmp", INDEX_FILE));
        fs::write(&tmp, serde_json::to_vec(&self.data)?)?;
        // Readers see either the old file or the new one, never a partial write
        fs::rename(&tmp, index_dir.join(INDEX_FILE))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.entries.is_empty()
    }

    /// The `top_k` entries most similar to `query`, best first.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        embedder: &dyn Embedder,
    ) -> Result<Vec<&IndexEntry>, IndexError> {
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut scored: Vec<(f32, &IndexEntry)> = self
            .data
            .entries
            .iter()
            .map(|e| (cosine_similarity(&query_vec, &e.embedding), e))
            .collect();
        // Stable sort: equal scores keep index order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored.into_iter().map(|(_, e)| e).collect())
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
