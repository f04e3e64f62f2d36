//! Seccomp BPF filter compilation and loading using seccompiler

use crate::policy::PolicyRules;
use crate::syscall_table::get_syscall_number_from_name;
use log::debug;
use sandbox_core::{Result, SandboxError};
use seccompiler::{
    BpfProgram, SeccompAction, SeccompCmpArgLen, SeccompCmpOp, SeccompCondition, SeccompFilter,
    SeccompRule, TargetArch, apply_filter,
};
use std::collections::BTreeMap;
use std::convert::TryInto;

type RuleMap = BTreeMap<i64, Vec<SeccompRule>>;

/// Seccomp BPF filter compiler and loader
pub struct SeccompBpf;

impl SeccompBpf {
    /// Compile policy rules to a BPF program.
    ///
    /// `program` is the address of the NUL-terminated program path that will
    /// be handed to `execve`; the restricted execve rule compares the first
    /// syscall argument against it, so the same buffer must be used for the
    /// call. Returns `None` when the rules need no filter.
    pub fn compile(
        rules: &PolicyRules,
        program: *const libc::c_char,
    ) -> Result<Option<BpfProgram>> {
        if rules.is_unrestricted() {
            return Ok(None);
        }

        let mut map: RuleMap = BTreeMap::new();

        for name in &rules.allowed_syscalls {
            allow_unconditional(&mut map, name);
        }

        if rules.restrict_execve_to_program {
            let only_program = condition(
                0,
                SeccompCmpArgLen::Qword,
                SeccompCmpOp::Eq,
                program as usize as u64,
            )?;
            add_rule(&mut map, "execve", vec![only_program])?;
        } else {
            allow_unconditional(&mut map, "execve");
        }

        if rules.allow_io {
            for name in ["open", "openat", "dup", "dup2", "dup3"] {
                allow_unconditional(&mut map, name);
            }
        } else {
            let write_flags = (libc::O_WRONLY | libc::O_RDWR) as u64;
            let read_only = |flags_arg: u8| {
                condition(
                    flags_arg,
                    SeccompCmpArgLen::Dword,
                    SeccompCmpOp::MaskedEq(write_flags),
                    0,
                )
            };
            add_rule(&mut map, "open", vec![read_only(1)?])?;
            add_rule(&mut map, "openat", vec![read_only(2)?])?;
        }

        let arch: TargetArch = std::env::consts::ARCH
            .try_into()
            .map_err(|e| SandboxError::Seccomp(format!("Unsupported architecture: {:?}", e)))?;

        let filter = SeccompFilter::new(map, SeccompAction::KillProcess, SeccompAction::Allow, arch)
            .map_err(|e| SandboxError::Seccomp(format!("Failed to create filter: {}", e)))?;

        let program: BpfProgram = filter
            .try_into()
            .map_err(|e| SandboxError::Seccomp(format!("Failed to compile filter: {}", e)))?;

        Ok(Some(program))
    }

    /// Load a compiled program into the calling process.
    /// NOTE: This does NOT require root - only PR_SET_NO_NEW_PRIVS is needed.
    pub fn load(program: &BpfProgram) -> Result<()> {
        unsafe {
            if libc::prctl(libc::PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) != 0 {
                return Err(SandboxError::Seccomp(format!(
                    "Failed to set PR_SET_NO_NEW_PRIVS: {}",
                    std::io::Error::last_os_error()
                )));
            }
        }

        apply_filter(program)
            .map_err(|e| SandboxError::Seccomp(format!("Failed to apply seccomp filter: {}", e)))?;

        Ok(())
    }
}

fn allow_unconditional(map: &mut RuleMap, name: &str) {
    match get_syscall_number_from_name(name) {
        Some(num) => {
            // An empty rule list matches the syscall regardless of arguments
            map.insert(num, Vec::new());
        }
        None => debug!("Syscall '{}' is not available on this architecture, skipped", name),
    }
}

fn add_rule(map: &mut RuleMap, name: &str, conditions: Vec<SeccompCondition>) -> Result<()> {
    let Some(num) = get_syscall_number_from_name(name) else {
        debug!("Syscall '{}' is not available on this architecture, skipped", name);
        return Ok(());
    };

    let rule = SeccompRule::new(conditions)
        .map_err(|e| SandboxError::Seccomp(format!("Invalid rule for '{}': {}", name, e)))?;

    match map.get_mut(&num) {
        // Already allowed unconditionally
        Some(rules) if rules.is_empty() => {}
        Some(rules) => rules.push(rule),
        None => {
            map.insert(num, vec![rule]);
        }
    }
    Ok(())
}

fn condition(
    arg: u8,
    len: SeccompCmpArgLen,
    op: SeccompCmpOp,
    value: u64,
) -> Result<SeccompCondition> {
    SeccompCondition::new(arg, len, op, value)
        .map_err(|e| SandboxError::Seccomp(format!("Invalid condition on arg {}: {}", arg, e)))
}
