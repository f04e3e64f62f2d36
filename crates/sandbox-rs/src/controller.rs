//! Main sandbox controller: runs one task and classifies the outcome

use std::ffi::CStr;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use serde::Serialize;

use sandbox_core::{Result, SandboxError};
use sandbox_limits::ResourceConfig;

use crate::abi::{SandboxResult, SandboxStatus};
use crate::config::TaskConfig;
use crate::execution::child::CHILD_ERROR_SIGNAL;
use crate::execution::{PreparedExec, ProcessExit, spawn, wait_for_exit};
use crate::logging;
use crate::monitoring::Watchdog;

/// Outcome of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SandboxReport {
    pub status: SandboxStatus,
    /// Exit status, 0 when killed by a signal
    pub exit_code: i32,
    /// Terminating signal, 0 when the program exited
    pub signal: i32,
    /// User CPU time, ms
    pub cpu_time_ms: u64,
    /// Wall-clock time, ms
    pub real_time_ms: u64,
    /// Peak resident set size, byte
    pub memory_bytes: u64,
}

impl SandboxReport {
    pub fn new(status: SandboxStatus, exit: &ProcessExit) -> Self {
        Self {
            status,
            exit_code: exit.exit_code,
            signal: exit.signal,
            cpu_time_ms: exit.cpu_time_ms,
            real_time_ms: exit.real_time_ms,
            memory_bytes: exit.memory_bytes,
        }
    }

    /// Convert into the C result record
    pub fn to_raw(&self) -> SandboxResult {
        SandboxResult {
            Status: self.status.code(),
            ExitCode: self.exit_code,
            Signal: self.signal,
            CpuTimeUsage: self.cpu_time_ms,
            RealTimeUsage: self.real_time_ms,
            MemoryUsage: self.memory_bytes,
        }
    }

    /// `SIGKILL (Killed)` style description, `None` when no signal.
    pub fn signal_description(&self) -> Option<String> {
        if self.signal == 0 {
            return None;
        }

        let text = unsafe {
            let ptr = libc::strsignal(self.signal);
            if ptr.is_null() {
                String::from("Unknown signal")
            } else {
                CStr::from_ptr(ptr).to_string_lossy().into_owned()
            }
        };

        match Signal::try_from(self.signal) {
            Ok(signal) => Some(format!("{} ({})", signal.as_str(), text)),
            Err(_) => Some(format!("signal {} ({})", self.signal, text)),
        }
    }
}

/// Classify a finished run against its limits.
pub fn classify(limits: &ResourceConfig, exit: &ProcessExit) -> SandboxStatus {
    let mut status = SandboxStatus::Success;

    if exit.exit_code != 0 || exit.signal != 0 {
        status = match exit.signal {
            libc::SIGSEGV if limits.max_memory != 0 && exit.memory_bytes > limits.max_memory => {
                SandboxStatus::MemoryLimitExceeded
            }
            libc::SIGKILL
                if limits.max_real_time != 0 && exit.real_time_ms >= limits.max_real_time =>
            {
                SandboxStatus::RealTimeLimitExceeded
            }
            libc::SIGXFSZ if limits.max_output_size != 0 => SandboxStatus::OutputLimitExceeded,
            _ => SandboxStatus::RuntimeError,
        };
    }

    if limits.max_memory != 0 && exit.memory_bytes >= limits.max_memory {
        status = SandboxStatus::MemoryLimitExceeded;
    } else if limits.max_cpu_time != 0 && exit.cpu_time_ms >= limits.max_cpu_time {
        status = SandboxStatus::CpuTimeLimitExceeded;
    }

    status
}

/// A validated task, ready to run
pub struct Sandbox {
    config: TaskConfig,
}

impl Sandbox {
    /// Validate `config` and wrap it.
    pub fn create(config: TaskConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// Run the task to completion.
    ///
    /// `Ok` means the program ran and was classified, whatever its verdict.
    /// `Err` means the sandbox itself failed.
    pub fn run(&self) -> Result<SandboxReport> {
        logging::init_task_logger(&self.config.task_name, self.config.log_file.as_deref());
        info!("Start running sandboxed process");

        let exec = PreparedExec::new(&self.config)?;
        debug!(
            "Prepared {} with policy {} and {:?}",
            exec.program().to_string_lossy(),
            self.config.policy,
            self.config.limits
        );

        let started = Instant::now();
        let pid = spawn(&exec)?;
        debug!("Forked sandboxed process {}", pid);

        let exit = self.supervise(pid, started)?;

        if exit.signal == CHILD_ERROR_SIGNAL as i32 {
            error!("Internal error in sandboxed process, terminated");
            return Err(SandboxError::ChildAborted);
        }

        let status = classify(&self.config.limits, &exit);
        let report = SandboxReport::new(status, &exit);
        info!(
            "Program (pid @{}) finished: {}, exit code {}, signal {}, cpu {}ms, real {}ms, memory {} bytes",
            pid,
            status,
            report.exit_code,
            report.signal,
            report.cpu_time_ms,
            report.real_time_ms,
            report.memory_bytes
        );

        Ok(report)
    }

    /// Watch the child until it is reaped.
    fn supervise(&self, pid: Pid, started: Instant) -> Result<ProcessExit> {
        let real_time = self.config.limits.max_real_time;
        let watchdog = if real_time != 0 {
            match Watchdog::spawn(pid, Duration::from_millis(real_time)) {
                Ok(watchdog) => Some(watchdog),
                Err(e) => {
                    kill_and_reap(pid);
                    return Err(e);
                }
            }
        } else {
            None
        };

        let exit = wait_for_exit(pid, started);
        drop(watchdog);

        exit.inspect_err(|_| kill_and_reap(pid))
    }
}

fn kill_and_reap(pid: Pid) {
    if let Err(e) = kill(pid, Signal::SIGKILL) {
        warn!("Failed to kill process {}: {}", pid, e);
        return;
    }
    let _ = nix::sys::wait::waitpid(pid, None);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn judge_limits() -> ResourceConfig {
        ResourceConfig {
            max_memory: 64 * 1024 * 1024,
            max_cpu_time: 1000,
            max_real_time: 3000,
            max_output_size: 1024,
            max_process_count: 0,
            ..Default::default()
        }
    }

    fn exited(exit_code: i32) -> ProcessExit {
        ProcessExit {
            exit_code,
            cpu_time_ms: 10,
            real_time_ms: 20,
            memory_bytes: 1024 * 1024,
            ..Default::default()
        }
    }

    fn signaled(signal: i32) -> ProcessExit {
        ProcessExit {
            signal,
            ..exited(0)
        }
    }

    #[test]
    fn test_classify_success() {
        assert_eq!(classify(&judge_limits(), &exited(0)), SandboxStatus::Success);
    }

    #[test]
    fn test_classify_runtime_error() {
        assert_eq!(classify(&judge_limits(), &exited(1)), SandboxStatus::RuntimeError);
        assert_eq!(
            classify(&judge_limits(), &signaled(libc::SIGABRT)),
            SandboxStatus::RuntimeError
        );
        assert_eq!(
            classify(&judge_limits(), &signaled(libc::SIGSYS)),
            SandboxStatus::RuntimeError
        );
    }

    #[test]
    fn test_classify_segv_over_memory() {
        let exit = ProcessExit {
            memory_bytes: 65 * 1024 * 1024,
            ..signaled(libc::SIGSEGV)
        };
        assert_eq!(classify(&judge_limits(), &exit), SandboxStatus::MemoryLimitExceeded);

        // Plain crash under the limit
        assert_eq!(
            classify(&judge_limits(), &signaled(libc::SIGSEGV)),
            SandboxStatus::RuntimeError
        );
    }

    #[test]
    fn test_classify_real_time() {
        let exit = ProcessExit {
            real_time_ms: 3000,
            ..signaled(libc::SIGKILL)
        };
        assert_eq!(classify(&judge_limits(), &exit), SandboxStatus::RealTimeLimitExceeded);

        let early = ProcessExit {
            real_time_ms: 100,
            ..signaled(libc::SIGKILL)
        };
        assert_eq!(classify(&judge_limits(), &early), SandboxStatus::RuntimeError);
    }

    #[test]
    fn test_classify_output_limit() {
        assert_eq!(
            classify(&judge_limits(), &signaled(libc::SIGXFSZ)),
            SandboxStatus::OutputLimitExceeded
        );

        let unlimited = ResourceConfig {
            max_output_size: 0,
            ..judge_limits()
        };
        assert_eq!(
            classify(&unlimited, &signaled(libc::SIGXFSZ)),
            SandboxStatus::RuntimeError
        );
    }

    #[test]
    fn test_classify_cpu_time_overrides() {
        // Killed for exceeding RLIMIT_CPU; CPU usage decides the verdict
        let exit = ProcessExit {
            cpu_time_ms: 1500,
            real_time_ms: 1600,
            ..signaled(libc::SIGKILL)
        };
        assert_eq!(classify(&judge_limits(), &exit), SandboxStatus::CpuTimeLimitExceeded);

        let clean = ProcessExit {
            cpu_time_ms: 1000,
            ..exited(0)
        };
        assert_eq!(classify(&judge_limits(), &clean), SandboxStatus::CpuTimeLimitExceeded);
    }

    #[test]
    fn test_classify_memory_wins_over_cpu() {
        let exit = ProcessExit {
            cpu_time_ms: 5000,
            memory_bytes: 64 * 1024 * 1024,
            ..exited(0)
        };
        assert_eq!(classify(&judge_limits(), &exit), SandboxStatus::MemoryLimitExceeded);
    }

    #[test]
    fn test_classify_unlimited() {
        let exit = ProcessExit {
            cpu_time_ms: u64::MAX,
            memory_bytes: u64::MAX,
            ..exited(0)
        };
        assert_eq!(classify(&ResourceConfig::default(), &exit), SandboxStatus::Success);
    }

    #[test]
    fn test_report_to_raw() {
        let exit = ProcessExit {
            exit_code: 3,
            signal: 0,
            cpu_time_ms: 12,
            real_time_ms: 34,
            memory_bytes: 5678,
        };
        let raw = SandboxReport::new(SandboxStatus::RuntimeError, &exit).to_raw();
        assert_eq!(raw.Status, 2);
        assert_eq!(raw.ExitCode, 3);
        assert_eq!(raw.Signal, 0);
        assert_eq!(raw.CpuTimeUsage, 12);
        assert_eq!(raw.RealTimeUsage, 34);
        assert_eq!(raw.MemoryUsage, 5678);
    }

    #[test]
    fn test_signal_description() {
        let report = SandboxReport::new(SandboxStatus::RuntimeError, &signaled(libc::SIGKILL));
        let text = report.signal_description().unwrap();
        assert!(text.starts_with("SIGKILL ("), "{}", text);

        let report = SandboxReport::new(SandboxStatus::Success, &exited(0));
        assert!(report.signal_description().is_none());
    }

    #[test]
    fn test_report_serializes_status_name() {
        let report = SandboxReport::new(SandboxStatus::CpuTimeLimitExceeded, &exited(0));
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["status"], "CPU_TIME_LIMIT_EXCEEDED");
        assert_eq!(json["memory_bytes"], 1024 * 1024);
    }

    #[test]
    fn test_create_validates() {
        let mut config = TaskConfig::new("create", "/bin/true");
        config.limits.max_process_count = -3;
        assert!(Sandbox::create(config).is_err());

        let config = TaskConfig::new("create", "/bin/true");
        let sandbox = Sandbox::create(config).unwrap();
        assert_eq!(sandbox.config().task_name, "create");
    }
}
