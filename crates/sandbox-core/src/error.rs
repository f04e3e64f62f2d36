//! Error types for sandbox operations

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for sandbox operations
pub type Result<T> = std::result::Result<T, SandboxError>;

/// Failure categories of the execution path.
///
/// Finer grained than the public status codes: every category is reported to
/// C callers as `SANDBOX_STATUS_INTERNAL_ERROR`, but logs keep the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessFailure {
    InvalidWorkingDirectory,
    InvalidCommandArgs,
    ResourceLimitFailed,
    InputFileOpenFailed,
    OutputFileOpenFailed,
    ErrorFileOpenFailed,
    FileRedirectFailed,
    ForkFailed,
    ExecFailed,
    WaitFailed,
    PolicyApplicationFailed,
    MonitorThreadStartFailed,
}

impl ProcessFailure {
    pub fn description(&self) -> &'static str {
        match self {
            ProcessFailure::InvalidWorkingDirectory => "Invalid working directory",
            ProcessFailure::InvalidCommandArgs => "Invalid command arguments",
            ProcessFailure::ResourceLimitFailed => "Resource limit setup failed",
            ProcessFailure::InputFileOpenFailed => "Input file open failed",
            ProcessFailure::OutputFileOpenFailed => "Output file open failed",
            ProcessFailure::ErrorFileOpenFailed => "Error file open failed",
            ProcessFailure::FileRedirectFailed => "File redirect failed",
            ProcessFailure::ForkFailed => "Fork failed",
            ProcessFailure::ExecFailed => "Exec failed",
            ProcessFailure::WaitFailed => "Wait failed",
            ProcessFailure::PolicyApplicationFailed => "Policy application failed",
            ProcessFailure::MonitorThreadStartFailed => "Monitor thread start failed",
        }
    }
}

impl fmt::Display for ProcessFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Errors that can occur during sandbox operations
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Rlimit error: {0}")]
    Rlimit(String),

    #[error("Seccomp error: {0}")]
    Seccomp(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}: {1}")]
    Process(ProcessFailure, String),

    #[error("Internal error in sandboxed process, terminated")]
    ChildAborted,
}

impl SandboxError {
    /// Build a process error for a failure category.
    pub fn process(failure: ProcessFailure, message: impl Into<String>) -> Self {
        SandboxError::Process(failure, message.into())
    }

    /// Build a process error carrying an explicit OS error.
    pub fn process_os(failure: ProcessFailure, message: &str, err: impl fmt::Display) -> Self {
        SandboxError::Process(failure, format!("{}: {}", message, err))
    }

    /// The failure category, if this error came from the execution path.
    pub fn failure(&self) -> Option<ProcessFailure> {
        match self {
            SandboxError::Process(failure, _) => Some(*failure),
            _ => None,
        }
    }
}
