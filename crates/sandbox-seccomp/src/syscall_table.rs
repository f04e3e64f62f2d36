//! Syscall name to number lookup for the build architecture

/// Look up the syscall number for `name`, `None` when the syscall does not
/// exist on this architecture or is not known to the table.
pub fn get_syscall_number_from_name(name: &str) -> Option<i64> {
    let number = match name {
        "brk" => libc::SYS_brk,
        "clock_gettime" => libc::SYS_clock_gettime,
        "clock_nanosleep" => libc::SYS_clock_nanosleep,
        "clone" => libc::SYS_clone,
        "close" => libc::SYS_close,
        "dup" => libc::SYS_dup,
        "dup3" => libc::SYS_dup3,
        "execve" => libc::SYS_execve,
        "execveat" => libc::SYS_execveat,
        "exit" => libc::SYS_exit,
        "exit_group" => libc::SYS_exit_group,
        "faccessat" => libc::SYS_faccessat,
        "fcntl" => libc::SYS_fcntl,
        "flock" => libc::SYS_flock,
        "fstat" => libc::SYS_fstat,
        "futex" => libc::SYS_futex,
        "getcwd" => libc::SYS_getcwd,
        "getpid" => libc::SYS_getpid,
        "getppid" => libc::SYS_getppid,
        "getrandom" => libc::SYS_getrandom,
        "gettid" => libc::SYS_gettid,
        "ioctl" => libc::SYS_ioctl,
        "kill" => libc::SYS_kill,
        "lseek" => libc::SYS_lseek,
        "madvise" => libc::SYS_madvise,
        "mmap" => libc::SYS_mmap,
        "mprotect" => libc::SYS_mprotect,
        "munmap" => libc::SYS_munmap,
        "nanosleep" => libc::SYS_nanosleep,
        "newfstatat" => libc::SYS_newfstatat,
        "openat" => libc::SYS_openat,
        "pipe2" => libc::SYS_pipe2,
        "prctl" => libc::SYS_prctl,
        "pread64" => libc::SYS_pread64,
        "prlimit64" => libc::SYS_prlimit64,
        "read" => libc::SYS_read,
        "readlinkat" => libc::SYS_readlinkat,
        "readv" => libc::SYS_readv,
        "rseq" => libc::SYS_rseq,
        "rt_sigaction" => libc::SYS_rt_sigaction,
        "rt_sigprocmask" => libc::SYS_rt_sigprocmask,
        "rt_sigreturn" => libc::SYS_rt_sigreturn,
        "seccomp" => libc::SYS_seccomp,
        "set_robust_list" => libc::SYS_set_robust_list,
        "set_tid_address" => libc::SYS_set_tid_address,
        "socket" => libc::SYS_socket,
        "uname" => libc::SYS_uname,
        "write" => libc::SYS_write,
        "writev" => libc::SYS_writev,
        _ => return legacy_syscall_number(name),
    };
    Some(number as i64)
}

/// Syscalls that newer architectures only provide through their `*at` forms.
#[cfg(target_arch = "x86_64")]
fn legacy_syscall_number(name: &str) -> Option<i64> {
    let number = match name {
        "access" => libc::SYS_access,
        "arch_prctl" => libc::SYS_arch_prctl,
        "dup2" => libc::SYS_dup2,
        "fork" => libc::SYS_fork,
        "open" => libc::SYS_open,
        "readlink" => libc::SYS_readlink,
        "stat" => libc::SYS_stat,
        _ => return None,
    };
    Some(number as i64)
}

#[cfg(not(target_arch = "x86_64"))]
fn legacy_syscall_number(_name: &str) -> Option<i64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_syscalls_resolve() {
        assert_eq!(get_syscall_number_from_name("read"), Some(libc::SYS_read as i64));
        assert_eq!(get_syscall_number_from_name("execve"), Some(libc::SYS_execve as i64));
        assert!(get_syscall_number_from_name("openat").is_some());
    }

    #[test]
    fn test_unknown_syscall() {
        assert_eq!(get_syscall_number_from_name("syscall_que_nao_existe_xyz_123"), None);
        assert_eq!(get_syscall_number_from_name(""), None);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_legacy_syscalls_on_x86_64() {
        assert_eq!(get_syscall_number_from_name("open"), Some(libc::SYS_open as i64));
        assert_eq!(get_syscall_number_from_name("arch_prctl"), Some(libc::SYS_arch_prctl as i64));
    }
}
