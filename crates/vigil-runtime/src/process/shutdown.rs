//! Graceful shutdown of a `tokio::process::Child` with SIGTERM → SIGKILL
//! escalation.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;

#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
#[cfg(unix)]
use tokio::time::timeout;

/// Shut down a child, escalating to a kill after `grace`.
///
/// - Unix: SIGTERM, wait up to `grace`, then SIGKILL
/// - Windows: immediate kill (no graceful signal available)
///
/// Returns once the process has been reaped.
pub async fn shutdown_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        shutdown_unix(child, grace).await
    }

    #[cfg(not(unix))]
    {
        let _ = grace;
        child.kill().await?;
        child.wait().await
    }
}

#[cfg(unix)]
async fn shutdown_unix(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    let Some(pid) = child.id() else {
        // Already reaped
        return child.wait().await;
    };
    let pid = i32::try_from(pid).map_err(io::Error::other)?;

    if let Err(e) = signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
        if e == nix::errno::Errno::ESRCH {
            return child.wait().await;
        }
        return Err(io::Error::other(e));
    }

    if let Ok(result) = timeout(grace, child.wait()).await {
        return result;
    }

    tracing::warn!(pid, grace_secs = grace.as_secs(), "Server ignored SIGTERM, killing");
    child.kill().await?;
    child.wait().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::process::Command;

    #[tokio::test]
    #[cfg(unix)]
    async fn test_shutdown_responds_to_sigterm() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let status = shutdown_child(&mut child, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_shutdown_escalates_when_term_ignored() {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg("trap '' TERM; sleep 30")
            .spawn()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        let result = shutdown_child(&mut child, Duration::from_millis(200)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_shutdown_handles_already_exited() {
        let mut child = Command::new("true").spawn().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(shutdown_child(&mut child, Duration::from_secs(1)).await.is_ok());
    }
}
