//! setrlimit-based resource limits
//!
//! Applied in the forked child before the policy is loaded and the target
//! program is executed. Soft and hard limits are set to the same value, so
//! the kernel enforces them without letting the program raise them back.

use sandbox_core::{Result, SandboxError};

/// Resource limits via setrlimit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RlimitConfig {
    /// Maximum address space size in bytes (RLIMIT_AS)
    pub max_address_space: Option<u64>,
    /// Maximum stack size in bytes (RLIMIT_STACK)
    pub max_stack: Option<u64>,
    /// Maximum CPU time in seconds (RLIMIT_CPU)
    pub max_cpu_seconds: Option<u64>,
    /// Maximum number of processes (RLIMIT_NPROC)
    pub max_processes: Option<u64>,
    /// Maximum file size in bytes (RLIMIT_FSIZE)
    pub max_file_size: Option<u64>,
    /// Maximum number of open files (RLIMIT_NOFILE)
    pub max_open_files: Option<u64>,
}

impl RlimitConfig {
    /// Apply resource limits to the current process.
    /// This should be called in the child process after fork.
    pub fn apply(&self) -> Result<()> {
        if let Some(bytes) = self.max_address_space {
            set_rlimit(libc::RLIMIT_AS, bytes)?;
        }
        if let Some(bytes) = self.max_stack {
            set_rlimit(libc::RLIMIT_STACK, bytes)?;
        }
        if let Some(cpu) = self.max_cpu_seconds {
            set_rlimit(libc::RLIMIT_CPU, cpu)?;
        }
        if let Some(nproc) = self.max_processes {
            set_rlimit(libc::RLIMIT_NPROC, nproc)?;
        }
        if let Some(fsize) = self.max_file_size {
            set_rlimit(libc::RLIMIT_FSIZE, fsize)?;
        }
        if let Some(nofile) = self.max_open_files {
            set_rlimit(libc::RLIMIT_NOFILE, nofile)?;
        }
        Ok(())
    }

    /// True when no limit is configured.
    pub fn is_empty(&self) -> bool {
        *self == RlimitConfig::default()
    }
}

fn set_rlimit(resource: libc::__rlimit_resource_t, limit: u64) -> Result<()> {
    let rlim = libc::rlimit {
        rlim_cur: limit,
        rlim_max: limit,
    };

    let ret = unsafe { libc::setrlimit(resource, &rlim) };
    if ret != 0 {
        return Err(SandboxError::Rlimit(format!(
            "setrlimit({}, {}) failed: {}",
            resource_name(resource),
            limit,
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

fn resource_name(resource: libc::__rlimit_resource_t) -> &'static str {
    match resource {
        libc::RLIMIT_AS => "RLIMIT_AS",
        libc::RLIMIT_STACK => "RLIMIT_STACK",
        libc::RLIMIT_CPU => "RLIMIT_CPU",
        libc::RLIMIT_NPROC => "RLIMIT_NPROC",
        libc::RLIMIT_FSIZE => "RLIMIT_FSIZE",
        libc::RLIMIT_NOFILE => "RLIMIT_NOFILE",
        _ => "UNKNOWN",
    }
}
