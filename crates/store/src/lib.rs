//! propscribe seen-set stores.
//!
//! Implements the [`pipeline::SeenStore`] trait with two backends:
//!
//! - [`FileSeenStore`]: a JSON file mapping proposal id to the time its
//!   marker was written. Every `record` rewrites the file through a temporary
//!   sibling and a rename, so a crash never leaves a half-written file.
//! - [`MemorySeenStore`]: process-local, used by `watch` when no store path
//!   is configured (markers then last as long as the process) and by tests.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Serialisation and file handling live here. The
//! [`pipeline`] crate sees only [`pipeline::SeenStore`].

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pipeline::{ProposalId, SeenStore, StoreError, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SeenFile {
    version: u32,
    seen: BTreeMap<ProposalId, Timestamp>,
}

impl Default for SeenFile {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            seen: BTreeMap::new(),
        }
    }
}

/// Seen markers persisted in a JSON file.
#[derive(Debug)]
pub struct FileSeenStore {
    path: PathBuf,
    state: Mutex<SeenFile>,
}

impl FileSeenStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let file: SeenFile = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))?;
                if file.version != FORMAT_VERSION {
                    return Err(StoreError::Corrupt(format!(
                        "{}: unsupported format version {}",
                        path.display(),
                        file.version
                    )));
                }
                file
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SeenFile::default(),
            Err(e) => return Err(StoreError::Io(format!("{}: {e}", path.display()))),
        };
        debug!(path = %path.display(), markers = state.seen.len(), "opened seen-set store");
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, state: &SeenFile) -> Result<(), StoreError> {
        let io_err = |e: std::io::Error| StoreError::Io(format!("{}: {e}", self.path.display()));

        let bytes = serde_json::to_vec_pretty(state).map_err(|e| StoreError::Io(e.to_string()))?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)
    }
}

#[async_trait]
impl SeenStore for FileSeenStore {
    async fn exists(&self, id: &ProposalId) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.seen.contains_key(id))
    }

    async fn record(&self, id: &ProposalId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.seen.contains_key(id) {
            return Ok(());
        }
        state.seen.insert(id.clone(), Timestamp::now());
        if let Err(err) = self.persist(&state).await {
            state.seen.remove(id);
            return Err(err);
        }
        debug!(proposal_id = %id, "recorded seen marker");
        Ok(())
    }
}

/// Seen markers held in memory only.
#[derive(Debug, Default)]
pub struct MemorySeenStore {
    seen: Mutex<HashSet<ProposalId>>,
}

impl MemorySeenStore {
    /// Creates a store pre-populated with `ids`.
    pub fn with_ids(ids: impl IntoIterator<Item = ProposalId>) -> Self {
        Self {
            seen: Mutex::new(ids.into_iter().collect()),
        }
    }

    /// Returns the number of recorded markers.
    pub async fn len(&self) -> usize {
        self.seen.lock().await.len()
    }

    /// Returns `true` if no marker has been recorded.
    pub async fn is_empty(&self) -> bool {
        self.seen.lock().await.is_empty()
    }
}

#[async_trait]
impl SeenStore for MemorySeenStore {
    async fn exists(&self, id: &ProposalId) -> Result<bool, StoreError> {
        Ok(self.seen.lock().await.contains(id))
    }

    async fn record(&self, id: &ProposalId) -> Result<(), StoreError> {
        self.seen.lock().await.insert(id.clone());
        Ok(())
    }
}
