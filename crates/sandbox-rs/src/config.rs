//! Owned task configuration and the builder for Rust callers

use std::ffi::{CStr, OsStr, OsString};
use std::os::raw::c_char;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use sandbox_core::{ProcessFailure, Result, SandboxError};
use sandbox_limits::ResourceConfig;
use sandbox_seccomp::SecurePolicy;

use crate::abi::{MAX_ENVIRONMENT_VARIABLES, SandboxConfiguration};
use crate::controller::Sandbox;

/// Maximum number of words in a command line, program included.
pub const MAX_COMMAND_ARGS: usize = 127;

/// One execution request with every caller buffer copied into owned values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskConfig {
    pub task_name: String,
    /// Command line as given by the caller, not required to be UTF-8.
    pub command: OsString,
    pub working_directory: Option<PathBuf>,
    /// `NAME=value` entries. Empty means the parent environment is inherited.
    pub environment: Vec<String>,
    pub input_file: Option<PathBuf>,
    pub output_file: Option<PathBuf>,
    pub error_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub limits: ResourceConfig,
    pub policy: SecurePolicy,
}

impl TaskConfig {
    pub fn new(task_name: impl Into<String>, command: impl Into<OsString>) -> Self {
        Self {
            task_name: task_name.into(),
            command: command.into(),
            working_directory: None,
            environment: Vec::new(),
            input_file: None,
            output_file: None,
            error_file: None,
            log_file: None,
            limits: ResourceConfig::default(),
            policy: SecurePolicy::Default,
        }
    }

    /// Copy a C configuration record.
    ///
    /// # Safety
    ///
    /// Every non-NULL string pointer in `raw` must point to a NUL-terminated
    /// string, and `EnvironmentVariables` must point to at least
    /// `EnvironmentVariablesCount` entries when the count is not zero.
    pub unsafe fn from_raw(raw: &SandboxConfiguration) -> Result<Self> {
        let task_name = unsafe { c_string(raw.TaskName) }
            .ok_or_else(|| SandboxError::InvalidConfig("TaskName must be set".to_string()))?;
        let command = unsafe { c_os_string(raw.UserCommand) }
            .ok_or_else(|| SandboxError::InvalidConfig("UserCommand must be set".to_string()))?;

        let policy = SecurePolicy::from_id(raw.Policy).ok_or_else(|| {
            SandboxError::InvalidConfig(format!("Unknown policy id {}", raw.Policy))
        })?;

        let mut environment = Vec::with_capacity(raw.EnvironmentVariablesCount as usize);
        if raw.EnvironmentVariablesCount > 0 && !raw.EnvironmentVariables.is_null() {
            let entries = unsafe {
                std::slice::from_raw_parts(
                    raw.EnvironmentVariables,
                    raw.EnvironmentVariablesCount as usize,
                )
            };
            environment.extend(entries.iter().filter_map(|&entry| unsafe { c_string(entry) }));
        }

        Ok(Self {
            task_name,
            command,
            working_directory: unsafe { c_path(raw.WorkingDirectory) },
            environment,
            input_file: unsafe { c_path(raw.InputFile) },
            output_file: unsafe { c_path(raw.OutputFile) },
            error_file: unsafe { c_path(raw.ErrorFile) },
            log_file: unsafe { c_path(raw.LogFile) },
            limits: raw.limits(),
            policy,
        })
    }

    /// Checks shared with the C validator that apply to owned values.
    pub fn validate(&self) -> Result<()> {
        if self.environment.len() > MAX_ENVIRONMENT_VARIABLES as usize {
            return Err(SandboxError::InvalidConfig(format!(
                "Too many environment variables: {} (max {})",
                self.environment.len(),
                MAX_ENVIRONMENT_VARIABLES
            )));
        }
        self.limits.validate()
    }

    /// Split the command line on ASCII whitespace into program and arguments.
    pub fn command_args(&self) -> Result<Vec<&OsStr>> {
        let args: Vec<&OsStr> = self
            .command
            .as_bytes()
            .split(u8::is_ascii_whitespace)
            .filter(|word| !word.is_empty())
            .map(OsStr::from_bytes)
            .collect();
        if args.is_empty() {
            return Err(SandboxError::process(
                ProcessFailure::InvalidCommandArgs,
                "Command is empty",
            ));
        }
        if args.len() > MAX_COMMAND_ARGS {
            return Err(SandboxError::process(
                ProcessFailure::InvalidCommandArgs,
                format!(
                    "Too many command arguments: {} (max {})",
                    args.len(),
                    MAX_COMMAND_ARGS
                ),
            ));
        }
        Ok(args)
    }

    /// True when stderr is redirected to the same file as stdout.
    pub fn error_shares_output(&self) -> bool {
        matches!((&self.output_file, &self.error_file), (Some(out), Some(err)) if out == err)
    }
}

unsafe fn c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

unsafe fn c_os_string(ptr: *const c_char) -> Option<OsString> {
    if ptr.is_null() {
        return None;
    }
    let bytes = unsafe { CStr::from_ptr(ptr) }.to_bytes();
    Some(OsStr::from_bytes(bytes).to_os_string())
}

unsafe fn c_path(ptr: *const c_char) -> Option<PathBuf> {
    unsafe { c_os_string(ptr) }.map(PathBuf::from)
}

/// Builder pattern for sandbox creation
pub struct SandboxBuilder {
    config: TaskConfig,
}

impl SandboxBuilder {
    /// Create new builder
    pub fn new(task_name: &str, command: impl AsRef<OsStr>) -> Self {
        Self {
            config: TaskConfig::new(task_name, command.as_ref()),
        }
    }

    pub fn working_directory(mut self, path: impl AsRef<Path>) -> Self {
        self.config.working_directory = Some(path.as_ref().to_path_buf());
        self
    }

    /// Add a `NAME=value` environment entry
    pub fn env(mut self, name: &str, value: &str) -> Self {
        self.config.environment.push(format!("{}={}", name, value));
        self
    }

    pub fn input_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config.input_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn output_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config.output_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn error_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config.error_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn log_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config.log_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set memory limit
    pub fn max_memory(mut self, bytes: u64) -> Self {
        self.config.limits.max_memory = bytes;
        self
    }

    /// Set memory limit from string (e.g., "100M")
    pub fn max_memory_str(self, s: &str) -> Result<Self> {
        let bytes = sandbox_core::util::parse_memory_size(s)?;
        Ok(self.max_memory(bytes))
    }

    pub fn max_memory_to_crash(mut self, bytes: u64) -> Self {
        self.config.limits.max_memory_to_crash = bytes;
        self
    }

    pub fn max_stack(mut self, bytes: u64) -> Self {
        self.config.limits.max_stack = bytes;
        self
    }

    /// CPU time limit in milliseconds
    pub fn max_cpu_time(mut self, ms: u64) -> Self {
        self.config.limits.max_cpu_time = ms;
        self
    }

    /// Wall-clock limit in milliseconds
    pub fn max_real_time(mut self, ms: u64) -> Self {
        self.config.limits.max_real_time = ms;
        self
    }

    pub fn max_output_size(mut self, bytes: u64) -> Self {
        self.config.limits.max_output_size = bytes;
        self
    }

    pub fn max_process_count(mut self, count: i32) -> Self {
        self.config.limits.max_process_count = count;
        self
    }

    /// Set secure policy
    pub fn policy(mut self, policy: SecurePolicy) -> Self {
        self.config.policy = policy;
        self
    }

    /// Build sandbox
    pub fn build(self) -> Result<Sandbox> {
        Sandbox::create(self.config)
    }
}
