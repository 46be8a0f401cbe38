//! Delayed removal of served files
//!
//! Every consumer of a result file holds a [`FileLease`]. When the last
//! lease on a path goes away, the file is deleted after a grace delay unless
//! somebody leased it again in the meantime.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::core::error::AppError;
use crate::download::ResultFile;

#[derive(Debug, Default)]
struct LeaseCount {
    active: usize,
    /// Bumped on every new lease; a pending deletion only proceeds if it
    /// still sees the generation it was scheduled with
    generation: u64,
    /// Unlink in progress, new leases are refused
    deleting: bool,
}

#[derive(Debug)]
struct ReaperInner {
    leases: Mutex<HashMap<PathBuf, LeaseCount>>,
    delay: Duration,
}

impl ReaperInner {
    fn leases(&self) -> MutexGuard<'_, HashMap<PathBuf, LeaseCount>> {
        self.leases.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn release(self: &Arc<Self>, path: &Path) {
        let generation = {
            let mut leases = self.leases();
            let Some(count) = leases.get_mut(path) else { return };
            count.active = count.active.saturating_sub(1);
            if count.active > 0 {
                return;
            }
            count.generation
        };

        let inner = Arc::clone(self);
        let path = path.to_path_buf();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(inner.delay).await;
                    if inner.begin_reap(&path, generation) {
                        let result = tokio::fs::remove_file(&path).await;
                        inner.finish_reap(&path, result);
                    }
                });
            }
            Err(_) => {
                if inner.begin_reap(path.as_path(), generation) {
                    let result = std::fs::remove_file(&path);
                    inner.finish_reap(&path, result);
                }
            }
        }
    }

    /// Claims the file for deletion if nobody leased it since `generation`.
    ///
    /// Until [`finish_reap`](Self::finish_reap) runs, `lease` on the path
    /// fails with `NotFound`, so no lease can outlive the unlink.
    fn begin_reap(&self, path: &Path, generation: u64) -> bool {
        let mut leases = self.leases();
        match leases.get_mut(path) {
            Some(count) if count.active == 0 && count.generation == generation => {
                count.deleting = true;
                true
            }
            _ => {
                log::debug!("Keeping {}: leased again", path.display());
                false
            }
        }
    }

    fn finish_reap(&self, path: &Path, result: std::io::Result<()>) {
        self.leases().remove(path);
        match result {
            Ok(()) => log::info!("Deleted served file {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to delete {}: {}", path.display(), e),
        }
    }
}

/// Hands out leases on result files and deletes them once unused.
#[derive(Debug, Clone)]
pub struct FileReaper {
    inner: Arc<ReaperInner>,
}

impl FileReaper {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: Arc::new(ReaperInner {
                leases: Mutex::new(HashMap::new()),
                delay,
            }),
        }
    }

    /// Takes a lease on `file`. Fails with `NotFound` if it no longer exists.
    pub fn lease(&self, file: &ResultFile) -> Result<FileLease, AppError> {
        let mut leases = self.inner.leases();
        if leases.get(&file.path).is_some_and(|count| count.deleting) {
            return Err(AppError::NotFound(format!("file {} is being deleted", file.path.display())));
        }
        let meta = std::fs::metadata(&file.path)
            .ok()
            .filter(|meta| meta.is_file())
            .ok_or_else(|| AppError::NotFound(format!("file {} no longer exists", file.path.display())))?;

        let count = leases.entry(file.path.clone()).or_default();
        count.active += 1;
        count.generation += 1;

        Ok(FileLease {
            file: ResultFile {
                path: file.path.clone(),
                size: meta.len(),
            },
            reaper: Arc::clone(&self.inner),
        })
    }

    /// Number of live leases on `path`.
    pub fn active_leases(&self, path: &Path) -> usize {
        self.inner.leases().get(path).map_or(0, |count| count.active)
    }
}

/// Keeps a result file on disk while held.
#[derive(Debug)]
pub struct FileLease {
    file: ResultFile,
    reaper: Arc<ReaperInner>,
}

impl FileLease {
    pub fn path(&self) -> &Path {
        &self.file.path
    }

    /// Size at the time the lease was taken.
    pub fn size(&self) -> u64 {
        self.file.size
    }

    pub fn file(&self) -> &ResultFile {
        &self.file
    }
}

impl Drop for FileLease {
    fn drop(&mut self) {
        self.reaper.release(&self.file.path);
    }
}
