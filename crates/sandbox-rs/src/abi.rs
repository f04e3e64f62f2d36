//! C ABI data model
//!
//! Field order and types of the records below are part of the public ABI and
//! must match `Sandbox.h` byte for byte.

use serde::Serialize;
use std::os::raw::{c_char, c_int};
use std::ptr;

/// Library version, `0xMMmmpp`.
pub const SANDBOX_VERSION: c_int = 0x010302;

/// Maximum number of entries in `EnvironmentVariables`.
pub const MAX_ENVIRONMENT_VARIABLES: u16 = 256;

pub use sandbox_limits::MAX_MEMORY_FOR_SANDBOX_PROCESS;
use sandbox_limits::ResourceConfig;

pub const SANDBOX_POLICY_DEFAULT: c_int = 0;
pub const SANDBOX_POLICY_CXX_PROGRAM: c_int = 1;
/// One past the last valid policy id.
pub const MAX_POLICY: c_int = 2;

pub const fn version_major(version: c_int) -> c_int {
    (version >> 16) & 0xFF
}

pub const fn version_minor(version: c_int) -> c_int {
    (version >> 8) & 0xFF
}

pub const fn version_patch(version: c_int) -> c_int {
    version & 0xFF
}

/// One execution request, as passed by C callers.
///
/// Every pointer is owned by the caller and only borrowed for the duration
/// of a call.
#[repr(C)]
#[allow(non_snake_case)]
#[derive(Debug, Clone, Copy)]
pub struct SandboxConfiguration {
    pub TaskName: *const c_char,
    pub UserCommand: *const c_char,
    pub WorkingDirectory: *const c_char,
    pub EnvironmentVariables: *const *const c_char,
    pub EnvironmentVariablesCount: u16,
    pub InputFile: *const c_char,
    pub OutputFile: *const c_char,
    pub ErrorFile: *const c_char,
    pub LogFile: *const c_char,
    pub MaxMemoryToCrash: u64,
    pub MaxMemory: u64,
    pub MaxStack: u64,
    pub MaxCpuTime: u64,
    pub MaxRealTime: u64,
    pub MaxOutputSize: u64,
    pub MaxProcessCount: c_int,
    pub Policy: c_int,
}

impl Default for SandboxConfiguration {
    fn default() -> Self {
        Self {
            TaskName: ptr::null(),
            UserCommand: ptr::null(),
            WorkingDirectory: ptr::null(),
            EnvironmentVariables: ptr::null(),
            EnvironmentVariablesCount: 0,
            InputFile: ptr::null(),
            OutputFile: ptr::null(),
            ErrorFile: ptr::null(),
            LogFile: ptr::null(),
            MaxMemoryToCrash: 0,
            MaxMemory: 0,
            MaxStack: 0,
            MaxCpuTime: 0,
            MaxRealTime: 0,
            MaxOutputSize: 0,
            MaxProcessCount: -1,
            Policy: SANDBOX_POLICY_DEFAULT,
        }
    }
}

impl SandboxConfiguration {
    /// Resource limits carried by the record.
    pub fn limits(&self) -> ResourceConfig {
        ResourceConfig {
            max_memory_to_crash: self.MaxMemoryToCrash,
            max_memory: self.MaxMemory,
            max_stack: self.MaxStack,
            max_cpu_time: self.MaxCpuTime,
            max_real_time: self.MaxRealTime,
            max_output_size: self.MaxOutputSize,
            max_process_count: self.MaxProcessCount,
        }
    }
}

/// Outcome of one execution, written by `StartSandbox`.
#[repr(C)]
#[allow(non_snake_case)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SandboxResult {
    pub Status: c_int,
    pub ExitCode: c_int,
    pub Signal: c_int,
    /// User CPU time, ms
    pub CpuTimeUsage: u64,
    /// Wall-clock time, ms
    pub RealTimeUsage: u64,
    /// Peak resident set size, byte
    pub MemoryUsage: u64,
}

/// Verdict of a run. The numeric values are ABI.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SandboxStatus {
    Success = 0,
    MemoryLimitExceeded = 1,
    RuntimeError = 2,
    CpuTimeLimitExceeded = 3,
    RealTimeLimitExceeded = 4,
    ProcessLimitExceeded = 5,
    OutputLimitExceeded = 6,
    IllegalOperation = 7,
    InternalError = 0xFFFF,
}

impl SandboxStatus {
    pub fn all() -> [Self; 9] {
        [
            SandboxStatus::Success,
            SandboxStatus::MemoryLimitExceeded,
            SandboxStatus::RuntimeError,
            SandboxStatus::CpuTimeLimitExceeded,
            SandboxStatus::RealTimeLimitExceeded,
            SandboxStatus::ProcessLimitExceeded,
            SandboxStatus::OutputLimitExceeded,
            SandboxStatus::IllegalOperation,
            SandboxStatus::InternalError,
        ]
    }

    pub fn code(self) -> c_int {
        self as c_int
    }

    pub fn from_code(code: c_int) -> Option<Self> {
        Self::all().into_iter().find(|status| status.code() == code)
    }

    /// Stable C name of the status.
    pub fn name(self) -> &'static str {
        match self {
            SandboxStatus::Success => "SANDBOX_STATUS_SUCCESS",
            SandboxStatus::MemoryLimitExceeded => "SANDBOX_STATUS_MEMORY_LIMIT_EXCEEDED",
            SandboxStatus::RuntimeError => "SANDBOX_STATUS_RUNTIME_ERROR",
            SandboxStatus::CpuTimeLimitExceeded => "SANDBOX_STATUS_CPU_TIME_LIMIT_EXCEEDED",
            SandboxStatus::RealTimeLimitExceeded => "SANDBOX_STATUS_REAL_TIME_LIMIT_EXCEEDED",
            SandboxStatus::ProcessLimitExceeded => "SANDBOX_STATUS_PROCESS_LIMIT_EXCEEDED",
            SandboxStatus::OutputLimitExceeded => "SANDBOX_STATUS_OUTPUT_LIMIT_EXCEEDED",
            SandboxStatus::IllegalOperation => "SANDBOX_STATUS_ILLEGAL_OPERATION",
            SandboxStatus::InternalError => "SANDBOX_STATUS_INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for SandboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
