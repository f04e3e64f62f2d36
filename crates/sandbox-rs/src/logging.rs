//! Task logger
//!
//! A `log::Log` implementation that prefixes every line with a timestamp and
//! the task name:
//!
//! ```text
//! [2024-05-01 12:00:00][my-task][INFO] Start running sandboxed process
//! ```
//!
//! The logger is installed on first use and re-targeted by every run. When
//! the host process already installed a logger, records go there instead and
//! the task logger stays idle.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, OnceLock, TryLockError};

use log::{LevelFilter, Log, Metadata, Record, warn};

const DEFAULT_TASK_NAME: &str = "sandbox";

static TASK_LOGGER: OnceLock<TaskLogger> = OnceLock::new();
static INSTALLED: AtomicBool = AtomicBool::new(false);

enum Sink {
    Stderr,
    File(File),
}

struct Target {
    task: String,
    sink: Sink,
}

pub struct TaskLogger {
    target: Mutex<Target>,
    /// Process that configured the target. Any other pid is a forked child.
    owner: AtomicU32,
}

impl TaskLogger {
    fn new() -> Self {
        Self {
            target: Mutex::new(Target {
                task: DEFAULT_TASK_NAME.to_string(),
                sink: Sink::Stderr,
            }),
            owner: AtomicU32::new(std::process::id()),
        }
    }

    fn format_line(task: &str, record: &Record) -> String {
        format!(
            "[{}][{}][{}] {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            task,
            record.level(),
            record.args()
        )
    }

    fn write_line(target: &mut Target, line: &str) {
        match &mut target.sink {
            Sink::Stderr => {
                let _ = io::stderr().write_all(line.as_bytes());
            }
            Sink::File(file) => {
                let fd = file.as_raw_fd();
                // The forked child shares the file with the parent
                unsafe { libc::flock(fd, libc::LOCK_EX) };
                let _ = file.write_all(line.as_bytes());
                unsafe { libc::flock(fd, libc::LOCK_UN) };
            }
        }
    }
}

impl Log for TaskLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let in_forked_child = self.owner.load(Ordering::Relaxed) != std::process::id();
        let locked = if in_forked_child {
            // The lock may have been held by a parent thread at fork time
            match self.target.try_lock() {
                Ok(target) => Some(target),
                Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => None,
            }
        } else {
            Some(self.target.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
        };

        let Some(mut target) = locked else {
            let line = Self::format_line(DEFAULT_TASK_NAME, record);
            let _ = io::stderr().write_all(line.as_bytes());
            return;
        };

        let line = Self::format_line(&target.task, record);
        Self::write_line(&mut target, &line);
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

/// Install the task logger (once) and point it at `log_file` or stderr.
///
/// Returns `true` when records emitted by this process reach the task logger.
pub fn init_task_logger(task_name: &str, log_file: Option<&Path>) -> bool {
    let logger = TASK_LOGGER.get_or_init(TaskLogger::new);

    if !INSTALLED.load(Ordering::Acquire) && log::set_logger(logger).is_ok() {
        log::set_max_level(LevelFilter::Info);
        INSTALLED.store(true, Ordering::Release);
    }

    let mut failed_file = None;
    let sink = match log_file {
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Sink::File(file),
            Err(err) => {
                failed_file = Some((path, err));
                Sink::Stderr
            }
        },
        None => Sink::Stderr,
    };

    {
        let mut target = logger
            .target
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        target.task = task_name.to_string();
        target.sink = sink;
        logger.owner.store(std::process::id(), Ordering::Relaxed);
    }

    if let Some((path, err)) = failed_file {
        warn!(
            "Failed to open log file '{}' ({}), switched to stderr sink",
            path.display(),
            err
        );
    }

    is_installed()
}

/// True when the task logger is the process-wide `log` logger.
pub fn is_installed() -> bool {
    INSTALLED.load(Ordering::Acquire)
}
