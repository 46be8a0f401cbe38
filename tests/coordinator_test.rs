//! Integration tests for the download coordinator
//!
//! Run with: cargo test --test coordinator_test

mod common;

use common::{coordinator, wait_released, Script, ScriptedRunner};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tubefetch::download::{DownloadError, DownloadKey, MediaFormat, TaskState};

const ID: &str = "dQw4w9WgXcQ";

// ============================================================================
// Deduplication
// ============================================================================

mod dedup_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_concurrent_requests_share_one_subprocess() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(Script::Succeed).with_delay(Duration::from_millis(100)));
        let coordinator = coordinator(runner.clone(), dir.path(), 2);

        let handles: Vec<_> = (0..5)
            .map(|_| coordinator.request_download(ID, "Never Gonna", MediaFormat::Mp3).unwrap())
            .collect();
        assert!(handles.iter().all(|h| h.same_task(&handles[0])));
        assert_eq!(coordinator.in_flight(), 1);

        let mut outcomes = Vec::new();
        for handle in &handles {
            outcomes.push(handle.wait().await.unwrap());
        }
        assert!(outcomes.iter().all(|file| *file == outcomes[0]));
        assert_eq!(outcomes[0].path, dir.path().join("Never Gonna.mp3"));
        assert_eq!(runner.calls(), 1);
        assert_eq!(handles[0].state(), TaskState::Succeeded);
        assert!(!coordinator.is_in_flight(handles[0].key()));
    }

    #[tokio::test]
    async fn test_concurrent_waiters_from_many_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(Script::Succeed).with_delay(Duration::from_millis(50)));
        let coordinator = coordinator(runner.clone(), dir.path(), 2);

        let joins: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = coordinator.clone();
                tokio::spawn(async move { coordinator.download("abc", "abc song", MediaFormat::Mp3).await })
            })
            .collect();
        for join in joins {
            join.await.unwrap().unwrap();
        }
        assert_eq!(runner.calls(), 1);
    }

    #[tokio::test]
    async fn test_formats_are_separate_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(Script::Succeed).with_delay(Duration::from_millis(50)));
        let coordinator = coordinator(runner.clone(), dir.path(), 2);

        let mp3 = coordinator.request_download(ID, "song", MediaFormat::Mp3).unwrap();
        let mp4 = coordinator.request_download(ID, "song", MediaFormat::Mp4).unwrap();
        assert!(!mp3.same_task(&mp4));
        assert_eq!(coordinator.in_flight(), 2);

        let audio = mp3.wait().await.unwrap();
        let video = mp4.wait().await.unwrap();
        assert_eq!(audio.path, dir.path().join("song.mp3"));
        assert_eq!(video.path, dir.path().join("song.mp4"));
        assert_eq!(runner.calls(), 2);
    }

    #[tokio::test]
    async fn test_finished_file_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(Script::Succeed));
        let coordinator = coordinator(runner.clone(), dir.path(), 2);

        let first = coordinator.download(ID, "Never Gonna", MediaFormat::Mp3).await.unwrap();
        let second = coordinator.download(ID, "Never Gonna", MediaFormat::Mp3).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(runner.calls(), 1);
    }

    #[tokio::test]
    async fn test_reuse_is_by_title_and_format() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(Script::Succeed));
        let coordinator = coordinator(runner.clone(), dir.path(), 2);

        let first = coordinator.download(ID, "Song", MediaFormat::Mp3).await.unwrap();
        let other_id = coordinator.download("aaaaaaaaaaa", "Song", MediaFormat::Mp3).await.unwrap();
        assert_eq!(other_id.path, first.path);
        assert_eq!(runner.calls(), 1);

        coordinator.download(ID, "Song", MediaFormat::Mp4).await.unwrap();
        assert_eq!(runner.calls(), 2);
    }

    #[tokio::test]
    async fn test_dropped_handle_does_not_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(Script::Succeed).with_delay(Duration::from_millis(30)));
        let coordinator = coordinator(runner.clone(), dir.path(), 2);

        let handle = coordinator.request_download(ID, "kept", MediaFormat::Mp3).unwrap();
        let key = handle.key().clone();
        drop(handle);

        wait_released(&coordinator, &key).await;
        assert!(dir.path().join("kept.mp3").exists());
        assert_eq!(runner.calls(), 1);
    }
}

// ============================================================================
// Failures
// ============================================================================

mod failure_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_exit_code_one_releases_key() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(Script::Fail(1)));
        let coordinator = coordinator(runner.clone(), dir.path(), 2);

        let handle = coordinator.request_download(ID, "broken", MediaFormat::Mp3).unwrap();
        let err = handle.wait().await.unwrap_err();
        match &err {
            DownloadError::ExtractionFailed { exit_code, output } => {
                assert_eq!(*exit_code, Some(1));
                assert_eq!(output, &vec!["ERROR: [youtube] abc: Video unavailable".to_string()]);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(handle.state(), TaskState::Failed);
        assert!(!coordinator.is_in_flight(&DownloadKey::new(ID, MediaFormat::Mp3)));

        let retry = coordinator.request_download(ID, "broken", MediaFormat::Mp3).unwrap();
        assert!(!retry.same_task(&handle));
        assert!(retry.wait().await.is_err());
        assert_eq!(runner.calls(), 2);
        assert!(!dir.path().join("broken.mp3").exists());
    }

    #[tokio::test]
    async fn test_all_waiters_see_the_same_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(Script::Fail(2)).with_delay(Duration::from_millis(50)));
        let coordinator = coordinator(runner.clone(), dir.path(), 2);

        let a = coordinator.request_download(ID, "x", MediaFormat::Mp4).unwrap();
        let b = coordinator.request_download(ID, "x", MediaFormat::Mp4).unwrap();
        let (ra, rb) = tokio::join!(a.wait(), b.wait());
        assert_eq!(ra.unwrap_err().to_string(), "yt-dlp failed with exit code 2");
        assert_eq!(rb.unwrap_err().to_string(), "yt-dlp failed with exit code 2");
        assert_eq!(runner.calls(), 1);
    }

    #[tokio::test]
    async fn test_success_without_file_is_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(Script::SucceedWithoutFile));
        let coordinator = coordinator(runner, dir.path(), 2);

        let err = coordinator.download(ID, "ghost", MediaFormat::Mp3).await.unwrap_err();
        assert!(matches!(err, DownloadError::FileNotFound(_)), "{:?}", err);
        assert_eq!(coordinator.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_panicking_run_becomes_failure() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(Script::Panic));
        let coordinator = coordinator(runner, dir.path(), 2);

        let err = coordinator.download(ID, "boom", MediaFormat::Mp3).await.unwrap_err();
        assert!(matches!(err, DownloadError::Aborted(_)), "{:?}", err);
        assert_eq!(coordinator.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_unwritable_folder_is_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let runner = Arc::new(ScriptedRunner::new(Script::Succeed));
        let coordinator = coordinator(runner.clone(), &blocker.join("downloads"), 2);

        let err = coordinator.download(ID, "song", MediaFormat::Mp3).await.unwrap_err();
        assert!(matches!(err, DownloadError::Launch { .. }), "{:?}", err);
        assert_eq!(runner.calls(), 0);
        assert_eq!(coordinator.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_invalid_input_registers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(Script::Succeed));
        let coordinator = coordinator(runner.clone(), dir.path(), 2);

        for (id, title) in [("", "title"), (ID, "   "), ("bad id!", "title")] {
            let err = coordinator.request_download(id, title, MediaFormat::Mp3).unwrap_err();
            assert!(matches!(err, DownloadError::InvalidRequest(_)), "{:?}", err);
        }
        assert_eq!(coordinator.in_flight(), 0);
        assert_eq!(runner.calls(), 0);
    }
}

// ============================================================================
// Worker slots
// ============================================================================

mod concurrency_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_running_processes_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(Script::Succeed).with_delay(Duration::from_millis(50)));
        let coordinator = coordinator(runner.clone(), dir.path(), 2);

        let ids = ["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc", "ddddddddddd", "eeeeeeeeeee"];
        let handles: Vec<_> = ids
            .iter()
            .map(|id| coordinator.request_download(id, id, MediaFormat::Mp3).unwrap())
            .collect();
        for handle in &handles {
            handle.wait().await.unwrap();
        }

        assert_eq!(runner.calls(), 5);
        assert_eq!(runner.max_running(), 2);
        assert_eq!(coordinator.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_excess_tasks_stay_pending() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(Script::Succeed).with_delay(Duration::from_millis(200)));
        let coordinator = coordinator(runner.clone(), dir.path(), 1);

        let first = coordinator.request_download("aaaaaaaaaaa", "first", MediaFormat::Mp3).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = coordinator.request_download("bbbbbbbbbbb", "second", MediaFormat::Mp3).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(first.state(), TaskState::Running);
        assert_eq!(second.state(), TaskState::Pending);

        first.wait().await.unwrap();
        second.wait().await.unwrap();
        assert_eq!(runner.max_running(), 1);
    }

    #[tokio::test]
    async fn test_command_line_targets_sanitized_path() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new(Script::Succeed));
        let coordinator = coordinator(runner.clone(), dir.path(), 2);

        let file = coordinator
            .download(ID, "AC/DC: Thunderstruck!", MediaFormat::Mp4)
            .await
            .unwrap();
        assert_eq!(file.file_name(), "AC_DC_ Thunderstruck_.mp4");

        let command = &runner.commands()[0];
        assert_eq!(command.last().unwrap(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(
            common::output_path(command),
            Some(dir.path().join("AC_DC_ Thunderstruck_.mp4").to_str().unwrap())
        );
    }
}
