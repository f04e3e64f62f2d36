//! Resource configuration of one execution request

use log::debug;
use sandbox_core::{Result, SandboxError};

use crate::rlimit::RlimitConfig;

/// The maximum memory for the sandboxed process, byte
pub const MAX_MEMORY_FOR_SANDBOX_PROCESS: u64 = 0x7FFF_FFFF;

/// Limits requested for a sandboxed process.
///
/// Every field uses 0 for "no limit", except `max_process_count` where -1
/// means no limit and 0 forbids creating processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceConfig {
    /// Hard address-space limit, byte. 0 or below `max_memory` means two
    /// times `max_memory`.
    pub max_memory_to_crash: u64,
    /// Soft memory limit, byte. Exceeding it is reported, not enforced.
    pub max_memory: u64,
    /// Stack limit, byte
    pub max_stack: u64,
    /// CPU time limit, ms
    pub max_cpu_time: u64,
    /// Wall-clock limit, ms
    pub max_real_time: u64,
    /// Output size limit, byte
    pub max_output_size: u64,
    /// Process count limit
    pub max_process_count: i32,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            max_memory_to_crash: 0,
            max_memory: 0,
            max_stack: 0,
            max_cpu_time: 0,
            max_real_time: 0,
            max_output_size: 0,
            max_process_count: -1,
        }
    }
}

impl ResourceConfig {
    /// Address-space limit actually handed to the kernel, 0 when unlimited.
    pub fn effective_max_memory_to_crash(&self) -> u64 {
        if self.max_memory_to_crash != 0
            && (self.max_memory == 0 || self.max_memory_to_crash >= self.max_memory)
        {
            return self.max_memory_to_crash;
        }

        if self.max_memory == 0 {
            return 0;
        }

        self.max_memory.saturating_mul(2)
    }

    /// RLIMIT_CPU in whole seconds, `(ms + 1000) / 1000`, 0 when unlimited.
    pub fn effective_cpu_limit_seconds(&self) -> u64 {
        if self.max_cpu_time == 0 {
            return 0;
        }

        (self.max_cpu_time + 1000) / 1000
    }

    /// Check limits that the kernel or the ABI cannot represent.
    pub fn validate(&self) -> Result<()> {
        if self.max_memory > MAX_MEMORY_FOR_SANDBOX_PROCESS {
            return Err(SandboxError::InvalidConfig(
                "MaxMemory exceeds MAX_MEMORY_FOR_SANDBOX_PROCESS".to_string(),
            ));
        }

        if self.max_process_count < -1 {
            return Err(SandboxError::InvalidConfig(
                "MaxProcessCount cannot be less than -1".to_string(),
            ));
        }

        Ok(())
    }

    /// Translate into setrlimit values. Zero limits are left untouched;
    /// a process count of 0 is applied.
    pub fn to_rlimits(&self) -> RlimitConfig {
        let non_zero = |value: u64| (value != 0).then_some(value);

        let rlimits = RlimitConfig {
            max_address_space: non_zero(self.effective_max_memory_to_crash()),
            max_stack: non_zero(self.max_stack),
            max_cpu_seconds: non_zero(self.effective_cpu_limit_seconds()),
            max_processes: u64::try_from(self.max_process_count).ok(),
            max_file_size: non_zero(self.max_output_size),
            max_open_files: None,
        };
        debug!("Derived rlimits: {:?}", rlimits);
        rlimits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn judge_limits() -> ResourceConfig {
        ResourceConfig {
            max_memory_to_crash: 0,
            max_memory: 128 * 1024 * 1024,
            max_stack: 8 * 1024 * 1024,
            max_cpu_time: 1000,
            max_real_time: 3000,
            max_output_size: 64 * 1024,
            max_process_count: 1,
        }
    }

    #[test]
    fn default_is_unlimited() {
        let limits = ResourceConfig::default();
        assert_eq!(limits.effective_max_memory_to_crash(), 0);
        assert_eq!(limits.effective_cpu_limit_seconds(), 0);
        assert!(limits.to_rlimits().is_empty());
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn crash_limit_defaults_to_double_memory() {
        let limits = judge_limits();
        assert_eq!(
            limits.effective_max_memory_to_crash(),
            2 * 128 * 1024 * 1024
        );
    }

    #[test]
    fn crash_limit_below_memory_falls_back_to_double_memory() {
        let limits = ResourceConfig {
            max_memory_to_crash: 1,
            ..judge_limits()
        };
        assert_eq!(
            limits.effective_max_memory_to_crash(),
            limits.max_memory * 2
        );
    }

    #[test]
    fn explicit_crash_limit_is_kept() {
        let limits = ResourceConfig {
            max_memory_to_crash: 300 * 1024 * 1024,
            ..judge_limits()
        };
        assert_eq!(limits.effective_max_memory_to_crash(), 300 * 1024 * 1024);

        let unbounded = ResourceConfig {
            max_memory_to_crash: u64::MAX,
            max_memory: 512 * 1024 * 1024,
            ..judge_limits()
        };
        assert_eq!(unbounded.effective_max_memory_to_crash(), u64::MAX);
    }

    #[test]
    fn crash_limit_without_memory_limit() {
        let limits = ResourceConfig {
            max_memory_to_crash: 4096,
            max_memory: 0,
            ..Default::default()
        };
        assert_eq!(limits.effective_max_memory_to_crash(), 4096);
    }

    #[test]
    fn cpu_limit_rounds_up_to_seconds() {
        let mut limits = judge_limits();
        limits.max_cpu_time = 1001;
        assert_eq!(limits.effective_cpu_limit_seconds(), 2);
        limits.max_cpu_time = 1000;
        assert_eq!(limits.effective_cpu_limit_seconds(), 2);
        limits.max_cpu_time = 1;
        assert_eq!(limits.effective_cpu_limit_seconds(), 1);
    }

    #[test]
    fn validate_accepts_judge_limits() {
        assert!(judge_limits().validate().is_ok());
    }

    #[test]
    fn validate_rejects_too_large_memory() {
        let limits = ResourceConfig {
            max_memory: MAX_MEMORY_FOR_SANDBOX_PROCESS + 1,
            ..judge_limits()
        };
        let err = limits.validate().unwrap_err();
        assert!(err.to_string().contains("MAX_MEMORY_FOR_SANDBOX_PROCESS"));
    }

    #[test]
    fn validate_rejects_process_count_below_minus_one() {
        let limits = ResourceConfig {
            max_process_count: -2,
            ..judge_limits()
        };
        assert!(limits.validate().is_err());

        let unlimited = ResourceConfig {
            max_process_count: -1,
            ..judge_limits()
        };
        assert!(unlimited.validate().is_ok());
    }

    #[test]
    fn rlimits_follow_effective_values() {
        let rlimits = judge_limits().to_rlimits();
        assert_eq!(rlimits.max_address_space, Some(256 * 1024 * 1024));
        assert_eq!(rlimits.max_stack, Some(8 * 1024 * 1024));
        assert_eq!(rlimits.max_cpu_seconds, Some(2));
        assert_eq!(rlimits.max_processes, Some(1));
        assert_eq!(rlimits.max_file_size, Some(64 * 1024));
        assert_eq!(rlimits.max_open_files, None);
    }

    #[test]
    fn zero_process_count_is_applied() {
        let limits = ResourceConfig {
            max_process_count: 0,
            ..Default::default()
        };
        assert_eq!(limits.to_rlimits().max_processes, Some(0));
    }
}
