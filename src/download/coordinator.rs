//! Deduplicating download coordinator
//!
//! Every `(video id, format)` pair maps to at most one live task. Requests
//! arriving while a task is registered join it and observe the same outcome.
//! The outcome is published through a `watch` channel before the key leaves
//! the registry, so a late joiner either sees the finished task or starts a
//! new one, never a half-removed entry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use tokio::sync::{watch, Semaphore};

use crate::core::config::AppConfig;
use crate::core::process::CommandRunner;
use crate::core::utils::sanitize_title;
use crate::download::error::DownloadError;
use crate::download::ytdlp::{expected_output, YtdlpTemplate};
use crate::download::{DownloadKey, MediaFormat, ResultFile};

type Outcome = Result<ResultFile, DownloadError>;

/// Externally visible lifecycle of a download task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Registered, waiting for the output folder check or a worker slot
    Pending,
    /// yt-dlp has been launched
    Running,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone)]
enum TaskStatus {
    Pending,
    Running,
    Finished(Outcome),
}

impl TaskStatus {
    fn is_finished(&self) -> bool {
        matches!(self, TaskStatus::Finished(_))
    }
}

#[derive(Debug)]
struct Task {
    key: DownloadKey,
    status: watch::Sender<TaskStatus>,
}

impl Task {
    fn new(key: DownloadKey) -> Self {
        let (status, _) = watch::channel(TaskStatus::Pending);
        Self { key, status }
    }
}

/// Handle to a registered task. Dropping it does not cancel the download.
#[derive(Debug, Clone)]
pub struct DownloadHandle {
    task: Arc<Task>,
}

impl DownloadHandle {
    pub fn key(&self) -> &DownloadKey {
        &self.task.key
    }

    pub fn state(&self) -> TaskState {
        match &*self.task.status.borrow() {
            TaskStatus::Pending => TaskState::Pending,
            TaskStatus::Running => TaskState::Running,
            TaskStatus::Finished(Ok(_)) => TaskState::Succeeded,
            TaskStatus::Finished(Err(_)) => TaskState::Failed,
        }
    }

    /// Whether both handles observe the same task.
    pub fn same_task(&self, other: &DownloadHandle) -> bool {
        Arc::ptr_eq(&self.task, &other.task)
    }

    /// Suspends until the task has finished and returns its outcome.
    pub async fn wait(&self) -> Outcome {
        let mut rx = self.task.status.subscribe();
        let status = rx
            .wait_for(TaskStatus::is_finished)
            .await
            .map_err(|_| DownloadError::Aborted(format!("task {} vanished", self.task.key)))?;
        match &*status {
            TaskStatus::Finished(outcome) => outcome.clone(),
            _ => Err(DownloadError::Aborted(format!("task {} has no outcome", self.task.key))),
        }
    }
}

struct Inner {
    registry: Mutex<HashMap<DownloadKey, Arc<Task>>>,
    runner: Arc<dyn CommandRunner>,
    template: YtdlpTemplate,
    folder: PathBuf,
    slots: Arc<Semaphore>,
}

impl Inner {
    fn registry(&self) -> MutexGuard<'_, HashMap<DownloadKey, Arc<Task>>> {
        // Nothing panics while holding the lock; recover the map if it ever did
        self.registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publishes the outcome, then removes the key if it still refers to
    /// `task`. Both happen under the registry lock, so a waiter that wakes up
    /// and asks again always registers a fresh task.
    fn finish(&self, task: &Arc<Task>, outcome: Outcome) {
        let mut registry = self.registry();
        task.status.send_replace(TaskStatus::Finished(outcome));
        if registry.get(&task.key).is_some_and(|current| Arc::ptr_eq(current, task)) {
            registry.remove(&task.key);
        }
    }
}

/// Runs yt-dlp at most once per [`DownloadKey`] at a time, with a global
/// bound on simultaneously running processes.
#[derive(Clone)]
pub struct DownloadCoordinator {
    inner: Arc<Inner>,
}

impl DownloadCoordinator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        template: YtdlpTemplate,
        folder: impl Into<PathBuf>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(HashMap::new()),
                runner,
                template,
                folder: folder.into(),
                slots: Arc::new(Semaphore::new(max_concurrent.max(1))),
            }),
        }
    }

    pub fn from_config(config: &AppConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self::new(
            runner,
            YtdlpTemplate::from_config(config),
            config.download_folder.clone(),
            config.max_concurrent_downloads,
        )
    }

    /// Registers a download or joins the one already in flight for the key.
    ///
    /// Input is validated before anything is registered.
    pub fn request_download(
        &self,
        video_id: &str,
        title: &str,
        format: MediaFormat,
    ) -> Result<DownloadHandle, DownloadError> {
        validate_video_id(video_id)?;
        if title.trim().is_empty() {
            return Err(DownloadError::InvalidRequest("title must not be empty".to_string()));
        }

        let key = DownloadKey::new(video_id, format);
        let (task, created) = {
            let mut registry = self.inner.registry();
            match registry.get(&key) {
                Some(task) => (Arc::clone(task), false),
                None => {
                    let task = Arc::new(Task::new(key.clone()));
                    registry.insert(key.clone(), Arc::clone(&task));
                    (task, true)
                }
            }
        };

        if created {
            log::info!("Download {} registered (title: {:?})", key, title);
            self.spawn_task(Arc::clone(&task), sanitize_title(title));
        } else {
            log::info!("Download {} already in flight, joining", key);
        }

        Ok(DownloadHandle { task })
    }

    /// Convenience: request and wait for the outcome.
    pub async fn download(&self, video_id: &str, title: &str, format: MediaFormat) -> Outcome {
        self.request_download(video_id, title, format)?.wait().await
    }

    /// Number of registered keys.
    pub fn in_flight(&self) -> usize {
        self.inner.registry().len()
    }

    pub fn is_in_flight(&self, key: &DownloadKey) -> bool {
        self.inner.registry().contains_key(key)
    }

    fn spawn_task(&self, task: Arc<Task>, stem: String) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let run = tokio::spawn(run_task(Arc::clone(&inner), Arc::clone(&task), stem));
            let outcome = match run.await {
                Ok(outcome) => outcome,
                Err(e) => Err(DownloadError::Aborted(e.to_string())),
            };

            match &outcome {
                Ok(file) => log::info!("Download {} finished: {} ({} bytes)", task.key, file.path.display(), file.size),
                Err(e) => {
                    log::error!("Download {} failed [{}]: {}", task.key, e.subcategory(), e);
                    for line in e.output() {
                        log::debug!("  {}", line);
                    }
                }
            }

            inner.finish(&task, outcome);
        });
    }
}

async fn run_task(inner: Arc<Inner>, task: Arc<Task>, stem: String) -> Outcome {
    let folder = &inner.folder;
    let format = task.key.format;

    tokio::fs::create_dir_all(folder).await.map_err(|e| {
        DownloadError::launch(format!("cannot create download folder {}", folder.display()), e)
    })?;

    // The name depends on title and format only: two ids sharing a title
    // reuse (or race on) the same file.
    let expected = expected_output(folder, &stem, format);
    if let Some(existing) = existing_file(&expected).await {
        log::info!("Reusing {} for {}", existing.path.display(), task.key);
        return Ok(existing);
    }

    let _permit = Arc::clone(&inner.slots)
        .acquire_owned()
        .await
        .map_err(|_| DownloadError::Aborted("worker pool closed".to_string()))?;
    task.status.send_replace(TaskStatus::Running);

    let command = inner.template.build(&task.key.video_id, format, folder, &stem);
    log::info!("Running: {}", command.join(" "));
    let outcome = inner.runner.run(&command).await?;
    if !outcome.success() {
        return Err(DownloadError::ExtractionFailed {
            exit_code: outcome.exit_code,
            output: outcome.captured_lines,
        });
    }

    locate_output(folder, &expected, format).await
}

fn validate_video_id(video_id: &str) -> Result<(), DownloadError> {
    if video_id.is_empty() {
        return Err(DownloadError::InvalidRequest("videoId must not be empty".to_string()));
    }
    if !video_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(DownloadError::InvalidRequest(format!("invalid videoId {:?}", video_id)));
    }
    Ok(())
}

async fn existing_file(path: &Path) -> Option<ResultFile> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    meta.is_file().then(|| ResultFile {
        path: path.to_path_buf(),
        size: meta.len(),
    })
}

/// Finds the file yt-dlp produced.
///
/// Prefers the exact expected path. Otherwise falls back to the most
/// recently modified file in `folder` with the format's extension, since
/// yt-dlp occasionally rewrites the name during post-processing.
pub async fn locate_output(folder: &Path, expected: &Path, format: MediaFormat) -> Outcome {
    if let Some(file) = existing_file(expected).await {
        return Ok(file);
    }

    let mut entries = tokio::fs::read_dir(folder)
        .await
        .map_err(|e| DownloadError::io(format!("cannot list {}", folder.display()), e))?;

    let mut newest: Option<(SystemTime, ResultFile)> = None;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| DownloadError::io(format!("cannot list {}", folder.display()), e))?
    {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(format.extension()) {
            continue;
        }
        let Ok(meta) = entry.metadata().await else { continue };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().map_or(true, |(best, _)| modified > *best) {
            newest = Some((modified, ResultFile { path, size: meta.len() }));
        }
    }

    match newest {
        Some((_, file)) => {
            log::warn!("Expected {} missing, using {}", expected.display(), file.path.display());
            Ok(file)
        }
        None => Err(DownloadError::FileNotFound(expected.display().to_string())),
    }
}
