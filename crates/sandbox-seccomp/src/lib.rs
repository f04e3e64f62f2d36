//! sandbox-seccomp: secure policies and seccomp BPF syscall filtering
//!
//! A policy is selected by its integer id in the C configuration record and
//! resolves to a set of rules. Rules are compiled to a BPF program in the
//! parent and loaded in the forked child right before `execve`.
//! Seccomp does NOT require root - it only needs `PR_SET_NO_NEW_PRIVS`.

pub mod bpf;
pub mod policy;
pub mod syscall_table;

pub use bpf::SeccompBpf;
pub use policy::{PolicyRules, SecurePolicy};
pub use seccompiler::BpfProgram;
