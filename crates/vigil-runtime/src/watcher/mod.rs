//! Log stream watcher.
//!
//! Waits for the server log to appear, then follows it as a lazy stream of
//! complete lines. The stream survives truncation and recreation of the file
//! and can be paused, resumed and stopped from the owning watcher without
//! losing its read offset.

mod tail;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures_util::Stream;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use vigil_core::ProcessLogSink;

use tail::{Poll, TailCursor};

/// Delivery state of the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Running,
    Paused,
    Stopped,
}

/// Errors from starting a watch.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The file did not appear before the wait timeout.
    #[error("Log file {} did not appear within {timeout_secs}s", .path.display())]
    FileNotFound { path: PathBuf, timeout_secs: u64 },

    /// `stop_watching` was called while waiting for the file.
    #[error("Watch stopped while waiting for {}", .path.display())]
    Cancelled { path: PathBuf },
}

/// Control value shared with active streams. The generation retires streams
/// from earlier `start_watching` calls.
type Control = (u64, WatchState);

/// Follows one log file at a time.
pub struct LogStreamWatcher {
    poll_interval: Duration,
    mirror: Option<Arc<dyn ProcessLogSink>>,
    control: watch::Sender<Control>,
}

impl LogStreamWatcher {
    /// Create an idle watcher.
    ///
    /// Every raw line read is appended to `mirror` with stream type `"log"`.
    pub fn new(poll_interval: Duration, mirror: Option<Arc<dyn ProcessLogSink>>) -> Self {
        let (control, _) = watch::channel((0, WatchState::Stopped));
        Self {
            poll_interval,
            mirror,
            control,
        }
    }

    pub fn state(&self) -> WatchState {
        self.control.borrow().1
    }

    /// Wait for `path` to exist (bounded by `timeout`) and return a stream of
    /// its lines, starting at the beginning of the file.
    ///
    /// Starting again retires any stream from a previous call.
    pub async fn start_watching(
        &self,
        path: &Path,
        timeout: Duration,
    ) -> Result<impl Stream<Item = String> + Send + use<>, WatchError> {
        let mut generation = 0;
        self.control.send_modify(|(g, state)| {
            *g += 1;
            generation = *g;
            *state = WatchState::Running;
        });
        let mut control = self.control.subscribe();

        wait_for_file(path, timeout, self.poll_interval, &control).await?;
        info!(path = %path.display(), "Following server log");

        let poll_interval = self.poll_interval;
        let mirror = self.mirror.clone();
        let mut cursor = TailCursor::new(path);

        Ok(stream! {
            'outer: loop {
                if !hold_while_paused(&mut control, generation).await {
                    break;
                }

                match cursor.poll().await {
                    Ok(Poll::Lines(lines)) if !lines.is_empty() => {
                        for line in lines {
                            if !hold_while_paused(&mut control, generation).await {
                                break 'outer;
                            }
                            if let Some(ref mirror) = mirror {
                                mirror.append("log", &line);
                            }
                            yield line;
                        }
                        continue;
                    }
                    Ok(Poll::Lines(_)) => {}
                    Ok(Poll::Vanished) => {
                        warn!(path = %cursor.path().display(), "Log file disappeared, ending watch");
                        break;
                    }
                    Err(e) => {
                        warn!(path = %cursor.path().display(), error = %e, "Log file read failed, ending watch");
                        break;
                    }
                }

                tokio::select! {
                    () = sleep(poll_interval) => {}
                    changed = control.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!(path = %cursor.path().display(), "Log watch ended");
        })
    }

    /// End delivery. The active stream finishes after its current line.
    pub fn stop_watching(&self) {
        self.control.send_modify(|(_, state)| *state = WatchState::Stopped);
    }

    /// Hold delivery, keeping the read offset.
    pub fn pause_watching(&self) {
        self.control.send_if_modified(|(_, state)| {
            if *state == WatchState::Running {
                *state = WatchState::Paused;
                true
            } else {
                false
            }
        });
    }

    /// Continue delivery after a pause.
    pub fn resume_watching(&self) {
        self.control.send_if_modified(|(_, state)| {
            if *state == WatchState::Paused {
                *state = WatchState::Running;
                true
            } else {
                false
            }
        });
    }
}

/// Block while paused. Returns `false` once the stream should end.
async fn hold_while_paused(control: &mut watch::Receiver<Control>, generation: u64) -> bool {
    loop {
        let (current, state) = *control.borrow_and_update();
        if current != generation {
            return false;
        }
        match state {
            WatchState::Running => return true,
            WatchState::Stopped => return false,
            WatchState::Paused => {
                if control.changed().await.is_err() {
                    return false;
                }
            }
        }
    }
}

async fn wait_for_file(
    path: &Path,
    timeout: Duration,
    poll_interval: Duration,
    control: &watch::Receiver<Control>,
) -> Result<(), WatchError> {
    let deadline = Instant::now() + timeout;
    loop {
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(());
        }
        if control.borrow().1 == WatchState::Stopped {
            return Err(WatchError::Cancelled {
                path: path.to_path_buf(),
            });
        }
        let now = Instant::now();
        if now >= deadline {
            return Err(WatchError::FileNotFound {
                path: path.to_path_buf(),
                timeout_secs: timeout.as_secs(),
            });
        }
        debug!(path = %path.display(), "Waiting for log file");
        sleep(poll_interval.min(deadline - now)).await;
    }
}
