//! Secure policy registry

use std::fmt;

/// Syscalls a compiled C++ program may issue after `execve`.
const CXX_PROGRAM_SYSCALLS: &[&str] = &[
    "access",
    "arch_prctl",
    "brk",
    "clock_gettime",
    "clock_nanosleep",
    "close",
    "exit_group",
    "faccessat",
    "fcntl",
    "fstat",
    "futex",
    "flock",
    "getpid",
    "getrandom",
    "lseek",
    "mmap",
    "mprotect",
    "munmap",
    "newfstatat",
    "pread64",
    "prlimit64",
    "prctl",
    "pipe2",
    "read",
    "readlink",
    "readlinkat",
    "readv",
    "rseq",
    "set_robust_list",
    "set_tid_address",
    "write",
    "writev",
    "seccomp",
    "ioctl",
    "rt_sigprocmask",
];

/// Secure policy selected by the `Policy` field of a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SecurePolicy {
    /// No syscall filter
    #[default]
    Default,
    /// Allow-list for compiled C/C++ programs
    CxxProgram,
}

impl SecurePolicy {
    /// Every registered policy, ordered by id.
    pub fn all() -> Vec<Self> {
        vec![SecurePolicy::Default, SecurePolicy::CxxProgram]
    }

    /// Numeric id used on the C ABI.
    pub fn id(&self) -> i32 {
        match self {
            SecurePolicy::Default => 0,
            SecurePolicy::CxxProgram => 1,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(SecurePolicy::Default),
            1 => Some(SecurePolicy::CxxProgram),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SecurePolicy::Default => "DEFAULT",
            SecurePolicy::CxxProgram => "CXX_PROGRAM",
        }
    }

    /// Resolve the rules enforced for this policy.
    pub fn rules(&self) -> PolicyRules {
        match self {
            SecurePolicy::Default => PolicyRules::unrestricted(),
            SecurePolicy::CxxProgram => PolicyRules {
                allowed_syscalls: CXX_PROGRAM_SYSCALLS.to_vec(),
                restrict_execve_to_program: true,
                allow_io: true,
            },
        }
    }
}

impl fmt::Display for SecurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Syscall rules of a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRules {
    /// Syscalls allowed without conditions
    pub allowed_syscalls: Vec<&'static str>,
    /// Allow `execve` only for the program path of the task
    pub restrict_execve_to_program: bool,
    /// Allow opening files for writing and duplicating descriptors.
    /// Without it, open/openat are restricted to read-only flags.
    pub allow_io: bool,
}

impl PolicyRules {
    /// Rules that install no filter at all.
    pub fn unrestricted() -> Self {
        Self {
            allowed_syscalls: Vec::new(),
            restrict_execve_to_program: false,
            allow_io: true,
        }
    }

    /// True when no seccomp filter has to be loaded.
    pub fn is_unrestricted(&self) -> bool {
        self.allowed_syscalls.is_empty() && !self.restrict_execve_to_program
    }

    /// Add a syscall to the allow list.
    pub fn allow_syscall(&mut self, name: &'static str) {
        if !self.allowed_syscalls.contains(&name) {
            self.allowed_syscalls.push(name);
        }
    }
}
