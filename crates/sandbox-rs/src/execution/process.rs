//! Fork and reap the sandboxed process

use std::time::Instant;

use nix::errno::Errno;
use nix::unistd::{ForkResult, Pid, fork};
use sandbox_core::{ProcessFailure, Result, SandboxError};

use crate::execution::child::PreparedExec;

/// How the child ended and what it consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit status, 0 when terminated by a signal
    pub exit_code: i32,
    /// Terminating signal, 0 when the process exited
    pub signal: i32,
    /// User CPU time in milliseconds
    pub cpu_time_ms: u64,
    /// Wall-clock time from fork to reap in milliseconds
    pub real_time_ms: u64,
    /// Peak resident set size in bytes
    pub memory_bytes: u64,
}

impl ProcessExit {
    fn from_wait(status: libc::c_int, usage: &libc::rusage, real_time_ms: u64) -> Self {
        let (exit_code, signal) = if libc::WIFSIGNALED(status) {
            (0, libc::WTERMSIG(status))
        } else {
            (libc::WEXITSTATUS(status), 0)
        };

        let user = usage.ru_utime;
        let cpu_time_ms = (user.tv_sec.max(0) as u64) * 1000 + (user.tv_usec.max(0) as u64) / 1000;

        Self {
            exit_code,
            signal,
            cpu_time_ms,
            real_time_ms,
            memory_bytes: (usage.ru_maxrss.max(0) as u64) * 1024,
        }
    }
}

/// Fork and run `exec` in the child. Returns the child's pid in the parent.
pub fn spawn(exec: &PreparedExec) -> Result<Pid> {
    match unsafe { fork() } {
        Ok(ForkResult::Child) => exec.exec_child(),
        Ok(ForkResult::Parent { child }) => Ok(child),
        Err(e) => Err(SandboxError::process_os(
            ProcessFailure::ForkFailed,
            "Failed to fork process",
            e,
        )),
    }
}

/// Wait for the child with `wait4`, collecting its resource usage.
pub fn wait_for_exit(pid: Pid, started: Instant) -> Result<ProcessExit> {
    let mut status: libc::c_int = 0;
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };

    loop {
        let ret = unsafe { libc::wait4(pid.as_raw(), &mut status, 0, &mut usage) };
        if ret == pid.as_raw() {
            break;
        }
        match Errno::last() {
            Errno::EINTR => continue,
            errno => {
                return Err(SandboxError::process_os(
                    ProcessFailure::WaitFailed,
                    &format!("Failed to wait for process {}", pid),
                    errno,
                ));
            }
        }
    }

    let real_time_ms = started.elapsed().as_millis() as u64;
    Ok(ProcessExit::from_wait(status, &usage, real_time_ms))
}
