use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::StateBackend;
use crate::errors::StoreError;
use crate::lock_info::LockInfo;
use crate::metrics;

const STATE_SUFFIX: &str = ".tfstate";
const LOCK_SUFFIX: &str = ".lock";

// A lock file can vanish between a failed exclusive create and the read that
// follows it; the acquire is retried once in that case.
const ACQUIRE_ATTEMPTS: usize = 2;

/// Filesystem-backed state store rooted at a single directory.
///
/// For a state id `foo` the store keeps:
/// - `<dir>/foo.tfstate`: the state document, byte-for-byte
/// - `<dir>/foo.lock`: the current lock record, indented JSON
///
/// An id already ending in `.tfstate` names the state file verbatim, while the
/// lock file is always `<id>.lock` (so `foo.tfstate` locks via `foo.tfstate.lock`).
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the state document for `id`.
    pub fn state_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        validate_id(id)?;
        if id.ends_with(STATE_SUFFIX) {
            Ok(self.dir.join(id))
        } else {
            Ok(self.dir.join(format!("{id}{STATE_SUFFIX}")))
        }
    }

    /// Path of the lock record for `id`.
    pub fn lock_path(&self, id: &str) -> Result<PathBuf, StoreError> {
        validate_id(id)?;
        Ok(self.dir.join(format!("{id}{LOCK_SUFFIX}")))
    }

    pub async fn get(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let res = self.read_state(id).await;
        metrics::observe("get", &res);
        res
    }

    pub async fn update(&self, id: &str, state: &[u8]) -> Result<(), StoreError> {
        let res = self.write_state(id, state).await;
        metrics::observe("update", &res);
        res
    }

    pub async fn purge(&self, id: &str) -> Result<(), StoreError> {
        let res = self.remove_state(id).await;
        metrics::observe("purge", &res);
        res
    }

    pub async fn lock(&self, id: &str, lock_info: &[u8]) -> Result<Vec<u8>, StoreError> {
        let res = self.acquire(id, lock_info).await;
        metrics::observe("lock", &res);
        res
    }

    pub async fn unlock(&self, id: &str, lock_info: &[u8]) -> Result<(), StoreError> {
        let res = self.release(id, lock_info).await;
        metrics::observe("unlock", &res);
        res
    }

    async fn read_state(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.state_path(id)?;
        match fs::read(&path).await {
            Ok(bytes) => {
                debug!(path = %path.display(), size = bytes.len(), "state read");
                Ok(bytes)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "state file not found");
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read state file");
                Err(StoreError::io(path, e))
            }
        }
    }

    async fn write_state(&self, id: &str, state: &[u8]) -> Result<(), StoreError> {
        let path = self.state_path(id)?;
        if let Err(e) = fs::write(&path, state).await {
            warn!(path = %path.display(), error = %e, "cannot write state file");
            return Err(StoreError::io(path, e));
        }
        debug!(path = %path.display(), size = state.len(), "state written");
        Ok(())
    }

    async fn remove_state(&self, id: &str) -> Result<(), StoreError> {
        let path = self.state_path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(path = %path.display(), "state purged");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "state file not found; nothing to purge");
                Ok(())
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot delete state file");
                Err(StoreError::io(path, e))
            }
        }
    }

    async fn acquire(&self, id: &str, lock_info: &[u8]) -> Result<Vec<u8>, StoreError> {
        let requested = parse_lock_info(lock_info)?;
        let path = self.lock_path(id)?;
        let encoded = requested.to_indented_json().map_err(|e| {
            error!(error = %e, "cannot encode lock info");
            StoreError::Encode(e)
        })?;

        for _ in 0..ACQUIRE_ATTEMPTS {
            match create_exclusive(&path, &encoded).await {
                Ok(()) => {
                    info!(path = %path.display(), holder = %requested.id, "lock acquired");
                    return Ok(encoded);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => {
                    error!(path = %path.display(), error = %e, "cannot write lock file");
                    return Err(StoreError::io(path, e));
                }
            }

            let stored = match fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(path = %path.display(), "lock released while acquiring; retrying");
                    continue;
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "cannot read lock file");
                    return Err(StoreError::io(path, e));
                }
            };
            let current = parse_lock_info(&stored)?;
            if !current.same_holder(&requested) {
                info!(
                    path = %path.display(),
                    held_by = %current.id,
                    requested_by = %requested.id,
                    "state is locked by another holder"
                );
                return Err(StoreError::Conflict { held_by: current.id, requested_by: requested.id });
            }
            debug!(path = %path.display(), holder = %current.id, "lock refreshed by its holder");
            return Ok(stored);
        }

        error!(path = %path.display(), "lock file kept disappearing during acquire");
        Err(StoreError::io(path, std::io::Error::new(ErrorKind::Interrupted, "lock acquire raced with release")))
    }

    async fn release(&self, id: &str, lock_info: &[u8]) -> Result<(), StoreError> {
        let requested = parse_lock_info(lock_info)?;
        let path = self.lock_path(id)?;

        let stored = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "lock file is already gone; nothing to unlock");
                return Ok(());
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "cannot read lock file");
                return Err(StoreError::io(path, e));
            }
        };
        let current = parse_lock_info(&stored)?;
        if !current.same_holder(&requested) {
            info!(
                path = %path.display(),
                held_by = %current.id,
                requested_by = %requested.id,
                "unlock requested by a holder that does not own the lock"
            );
            return Err(StoreError::Conflict { held_by: current.id, requested_by: requested.id });
        }

        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(path = %path.display(), holder = %current.id, "lock released");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot delete lock file");
                Err(StoreError::io(path, e))
            }
        }
    }
}

#[async_trait]
impl StateBackend for FileStateStore {
    async fn get(&self, id: &str) -> Result<Vec<u8>, StoreError> { self.get(id).await }
    async fn update(&self, id: &str, state: &[u8]) -> Result<(), StoreError> { self.update(id, state).await }
    async fn purge(&self, id: &str) -> Result<(), StoreError> { self.purge(id).await }
    async fn lock(&self, id: &str, lock_info: &[u8]) -> Result<Vec<u8>, StoreError> { self.lock(id, lock_info).await }
    async fn unlock(&self, id: &str, lock_info: &[u8]) -> Result<(), StoreError> { self.unlock(id, lock_info).await }
}

fn parse_lock_info(bytes: &[u8]) -> Result<LockInfo, StoreError> {
    LockInfo::from_slice(bytes).map_err(|e| {
        error!(error = %e, "unexpected lock info json");
        StoreError::Decode(e)
    })
}

/// Ids must name a single entry inside the storage directory.
fn validate_id(id: &str) -> Result<(), StoreError> {
    let bad = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\', '\0']);
    if bad {
        warn!(%id, "rejecting state id");
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// Publish `contents` at `path` only if nothing is there yet.
///
/// The record is written to a private sibling first and hard-linked into place,
/// so readers of `path` never observe an empty or partially written lock file.
/// `AlreadyExists` means another holder published first.
async fn create_exclusive(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let tmp = temp_sibling(path);
    let res = match fs::write(&tmp, contents).await {
        Ok(()) => fs::hard_link(&tmp, path).await,
        Err(e) => Err(e),
    };
    match fs::remove_file(&tmp).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %tmp.display(), error = %e, "cannot remove temporary lock file"),
    }
    res
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.tmp", Uuid::new_v4()))
}
