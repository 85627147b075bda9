//! Process lifecycle and teardown tests

use termcord_pty::{ExitOutcome, PtyError, SessionBuilder, WindowSize};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

#[cfg(unix)]
mod unix_tests {
    use super::*;

    #[tokio::test]
    async fn test_kill_reports_signal() {
        let mut session = SessionBuilder::new("sleep")
            .args(["30"])
            .spawn()
            .expect("Should create session");

        session.kill().expect("Should kill child");
        let outcome = timeout(Duration::from_secs(5), session.wait())
            .await
            .expect("Killed child should be reaped")
            .unwrap();

        assert_eq!(outcome, ExitOutcome::Signal(libc::SIGKILL));
        assert_eq!(outcome.code(), 128 + libc::SIGKILL);
    }

    #[tokio::test]
    async fn test_terminate_reaps_child() {
        let mut session = SessionBuilder::new("sleep").args(["30"]).spawn().unwrap();
        timeout(Duration::from_secs(5), session.terminate())
            .await
            .expect("Terminate should not hang");
        assert!(session.pid().is_none(), "Child should have been reaped");
    }

    #[tokio::test]
    async fn test_close_before_exit_and_after_exit() {
        let mut session = SessionBuilder::new("true").spawn().unwrap();
        session.close();
        assert!(session.wait().await.unwrap().success());
        // Closing again after the child is gone is fine
        session.close();
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn test_resize_after_close_is_closed_error() {
        let mut session = SessionBuilder::new("true").spawn().unwrap();
        let resizer = session.resizer();
        session.close();

        assert!(matches!(
            resizer.resize(WindowSize::new(24, 80)),
            Err(PtyError::Closed)
        ));
        let _ = session.wait().await;
    }

    #[tokio::test]
    async fn test_repeated_resize_is_stable() {
        let mut session = SessionBuilder::new("sleep").args(["30"]).spawn().unwrap();

        for _ in 0..5 {
            session
                .resize(WindowSize::new(33, 101))
                .expect("Repeated resize should succeed");
        }
        assert_eq!(session.size().unwrap(), WindowSize::new(33, 101));

        session.resize(WindowSize::new(50, 200)).unwrap();
        assert_eq!(session.size().unwrap(), WindowSize::new(50, 200));

        session.terminate().await;
    }

    #[tokio::test]
    async fn test_send_eof_ends_line_reader() {
        let mut session = SessionBuilder::new("cat").spawn().unwrap();
        let mut writer = session.writer().unwrap();
        let mut reader = session.reader().unwrap();

        writer.write_all(b"line\n").await.unwrap();
        assert!(session.send_eof().await.unwrap(), "cat runs in canonical mode");
        drop(writer);

        let mut output = Vec::new();
        timeout(Duration::from_secs(5), reader.read_to_end(&mut output))
            .await
            .expect("cat should exit after EOF")
            .unwrap();

        assert!(String::from_utf8_lossy(&output).contains("line"));
        assert!(session.wait().await.unwrap().success());
    }
}
