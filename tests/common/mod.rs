//! Common test utilities
//!
//! This module is shared across all integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tubefetch::core::process::{CommandRunner, ExitOutcome};
use tubefetch::download::ytdlp::YtdlpTemplate;
use tubefetch::download::{DownloadCoordinator, DownloadError, DownloadKey};

/// What the scripted runner does on each call.
#[derive(Debug, Clone)]
pub enum Script {
    /// Write the `-o` file and exit 0
    Succeed,
    /// Exit 0 without producing a file
    SucceedWithoutFile,
    /// Exit with the given code and a yt-dlp style error line
    Fail(i32),
    Panic,
}

/// [`CommandRunner`] that never spawns anything.
pub struct ScriptedRunner {
    script: Script,
    delay: Duration,
    calls: AtomicUsize,
    running: AtomicUsize,
    max_running: AtomicUsize,
    commands: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            max_running: AtomicUsize::new(0),
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_running(&self) -> usize {
        self.max_running.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &[String]) -> Result<ExitOutcome, DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.commands.lock().unwrap().push(command.to_vec());

        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        match &self.script {
            Script::Succeed => {
                let output = output_path(command).expect("-o argument");
                std::fs::write(output, b"fake media bytes").unwrap();
                Ok(ExitOutcome {
                    exit_code: Some(0),
                    captured_lines: vec!["[download] 100% of 16.00B".to_string()],
                })
            }
            Script::SucceedWithoutFile => Ok(ExitOutcome {
                exit_code: Some(0),
                captured_lines: Vec::new(),
            }),
            Script::Fail(code) => Ok(ExitOutcome {
                exit_code: Some(*code),
                captured_lines: vec!["ERROR: [youtube] abc: Video unavailable".to_string()],
            }),
            Script::Panic => panic!("scripted runner panic"),
        }
    }
}

/// Value following `-o` in a yt-dlp argv.
pub fn output_path(command: &[String]) -> Option<&str> {
    let pos = command.iter().position(|arg| arg == "-o")?;
    command.get(pos + 1).map(String::as_str)
}

pub fn template() -> YtdlpTemplate {
    YtdlpTemplate {
        bin: "yt-dlp".to_string(),
        cookies_file: None,
        max_video_height: 1080,
    }
}

pub fn coordinator(runner: Arc<ScriptedRunner>, folder: &Path, max_concurrent: usize) -> DownloadCoordinator {
    DownloadCoordinator::new(runner, template(), folder, max_concurrent)
}

/// Polls until the key has left the registry.
pub async fn wait_released(coordinator: &DownloadCoordinator, key: &DownloadKey) {
    for _ in 0..200 {
        if !coordinator.is_in_flight(key) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{} still in flight", key);
}
