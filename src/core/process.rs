//! Process execution utilities with bounded output capture and timeouts
//!
//! [`ProcessRunner`] is the one place where the extraction tool is spawned.
//! stdout and stderr are merged into a single line stream, only the first
//! few lines are kept for diagnostics and the rest is drained so the child
//! never blocks on a full pipe.

use async_trait::async_trait;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::download::error::DownloadError;

/// Result of one finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitOutcome {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    /// First lines of merged stdout/stderr
    pub captured_lines: Vec<String>,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs an argument vector to completion.
///
/// `command[0]` is the program, the rest are its arguments. Implementations
/// suspend the caller until the process has exited; they never retry.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &[String]) -> Result<ExitOutcome, DownloadError>;
}

/// [`CommandRunner`] backed by real OS processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    max_lines: usize,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(max_lines: usize, timeout: Option<Duration>) -> Self {
        Self { max_lines, timeout }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &[String]) -> Result<ExitOutcome, DownloadError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| DownloadError::InvalidRequest("empty command line".to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout also takes down ffmpeg children
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| DownloadError::launch(format!("failed to start {}", program), e))?;
        log::debug!("Spawned {} (pid {:?})", program, child.id());

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let max_lines = self.max_lines;
        let drive = async {
            let mut captured = Vec::new();
            let mut discarded = 0usize;
            while let Some(line) = rx.recv().await {
                if captured.len() < max_lines {
                    log::debug!("{}: {}", program, line);
                    captured.push(line);
                } else {
                    discarded += 1;
                }
            }
            let status = child.wait().await;
            (captured, discarded, status)
        };

        let (captured_lines, discarded, status) = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, drive).await {
                Ok(result) => result,
                Err(_) => {
                    log::error!("{} timed out after {}s, killing", program, limit.as_secs());
                    kill_tree(&mut child).await;
                    return Err(DownloadError::Timeout {
                        seconds: limit.as_secs(),
                    });
                }
            },
            None => drive.await,
        };

        let status = status.map_err(|e| DownloadError::io(format!("waiting for {}", program), e))?;
        if discarded > 0 {
            log::debug!("{}: {} further output lines discarded", program, discarded);
        }

        Ok(ExitOutcome {
            exit_code: status.code(),
            captured_lines,
        })
    }
}

/// Reads a pipe line by line until EOF. Invalid UTF-8 is replaced rather
/// than treated as the end of the stream, so the pipe is always drained.
async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim_end_matches(['\r', '\n']).to_string();
                // Receiver gone means the run was abandoned; keep draining anyway
                let _ = tx.send(line);
            }
        }
    }
}

/// Kills the child's whole process group and reaps it.
async fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;
        if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
            log::warn!("Failed to kill process group {}: {}", pid, e);
        }
    }
    let _ = child.start_kill();
    let _ = child.wait().await;
}

/// Run an async Command with a timeout.
///
/// Returns the process Output on success, or a DownloadError on timeout/IO failure.
pub async fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<Output, DownloadError> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(DownloadError::launch("failed to run command", e)),
        Err(_) => Err(DownloadError::Timeout {
            seconds: timeout.as_secs(),
        }),
    }
}
