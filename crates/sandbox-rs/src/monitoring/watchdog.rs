//! Wall-clock watchdog
//!
//! RLIMIT_CPU only bounds CPU time; a program blocked on input or sleeping
//! never hits it. The watchdog kills the child once the real-time limit has
//! elapsed.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use sandbox_core::{ProcessFailure, Result, SandboxError};

/// Kills a process after a deadline unless dropped first.
///
/// Dropping the watchdog cancels it and joins its thread.
pub struct Watchdog {
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub fn spawn(pid: Pid, limit: Duration) -> Result<Self> {
        let (cancel, cancelled) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name(format!("sandbox-watchdog-{}", pid))
            .spawn(move || match cancelled.recv_timeout(limit) {
                Err(RecvTimeoutError::Timeout) => enforce(pid, limit),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            })
            .map_err(|e| {
                SandboxError::process_os(
                    ProcessFailure::MonitorThreadStartFailed,
                    "Failed to start monitor thread",
                    e,
                )
            })?;

        Ok(Self {
            cancel: Some(cancel),
            handle: Some(handle),
        })
    }

    /// Stop watching and wait for the thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("Watchdog thread panicked");
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn enforce(pid: Pid, limit: Duration) {
    // Signal 0 checks existence; an unreaped zombie still counts
    if kill(pid, None).is_err() {
        return;
    }

    info!(
        "Program (pid @{}) killed: timeout after {}ms",
        pid,
        limit.as_millis()
    );
    if let Err(e) = kill(pid, Signal::SIGKILL) {
        warn!("Failed to kill process {}: {}", pid, e);
    }
}
