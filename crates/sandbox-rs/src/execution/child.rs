//! Child side of a sandboxed run

use std::convert::Infallible;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;

use log::{debug, error};
use nix::sys::signal::{self, SigHandler, SigSet, Signal};
use sandbox_core::util::{describe_errno, last_errno};
use sandbox_core::{ProcessFailure, Result, SandboxError};
use sandbox_limits::RlimitConfig;
use sandbox_seccomp::{BpfProgram, SeccompBpf};

use crate::config::TaskConfig;

/// Signal the child raises to report an internal error to the parent.
pub const CHILD_ERROR_SIGNAL: Signal = Signal::SIGUSR1;

/// Exit status used if raising the error signal did not terminate the child.
const CHILD_ERROR_EXIT: i32 = 255;

/// Buffers and limits for one child, built before fork.
pub struct PreparedExec {
    // Owners of the pointers in `argv_ptrs` / `envp_ptrs`; argv[0] is the program
    argv: Vec<CString>,
    _envp: Vec<CString>,
    argv_ptrs: Vec<*const c_char>,
    envp_ptrs: Vec<*const c_char>,
    working_directory: Option<CString>,
    input_file: Option<CString>,
    output_file: Option<CString>,
    error_file: Option<CString>,
    error_shares_output: bool,
    rlimits: RlimitConfig,
    seccomp: Option<BpfProgram>,
}

/// A failed child step, with the errno captured right after the failing call.
struct ChildFailure {
    failure: ProcessFailure,
    message: String,
    errno: i32,
}

impl ChildFailure {
    /// Reads errno before `message` runs, since formatting may clobber it.
    fn new(failure: ProcessFailure, message: impl FnOnce() -> String) -> Self {
        let errno = last_errno();
        Self {
            failure,
            message: message(),
            errno,
        }
    }
}

impl PreparedExec {
    pub fn new(config: &TaskConfig) -> Result<Self> {
        let args = config.command_args()?;

        let argv = args
            .iter()
            .map(|arg| c_arg(arg.as_bytes()))
            .collect::<Result<Vec<_>>>()?;

        let envp = if config.environment.is_empty() {
            inherited_environment()
        } else {
            config
                .environment
                .iter()
                .map(|entry| c_arg(entry.as_bytes()))
                .collect::<Result<Vec<_>>>()?
        };

        let argv_ptrs = null_terminated(&argv);
        let envp_ptrs = null_terminated(&envp);

        // Compiled against the argv[0] buffer, which execve receives as its path
        let seccomp =
            SeccompBpf::compile(&config.policy.rules(), argv[0].as_ptr()).map_err(|e| {
                SandboxError::process(ProcessFailure::PolicyApplicationFailed, e.to_string())
            })?;

        Ok(Self {
            argv,
            _envp: envp,
            argv_ptrs,
            envp_ptrs,
            working_directory: c_path(config.working_directory.as_deref())?,
            input_file: c_path(config.input_file.as_deref())?,
            output_file: c_path(config.output_file.as_deref())?,
            error_file: c_path(config.error_file.as_deref())?,
            error_shares_output: config.error_shares_output(),
            rlimits: config.limits.to_rlimits(),
            seccomp,
        })
    }

    pub fn program(&self) -> &CStr {
        &self.argv[0]
    }

    pub fn has_seccomp(&self) -> bool {
        self.seccomp.is_some()
    }

    /// Set up the forked child and execute the program. Never returns: on
    /// failure the child terminates itself with [`CHILD_ERROR_SIGNAL`].
    pub fn exec_child(&self) -> ! {
        let failure = match self.enter() {
            Ok(never) => match never {},
            Err(failure) => failure,
        };
        abort_child(&failure)
    }

    /// Order of operations:
    /// 1. Chdir
    /// 2. Resource limits
    /// 3. stdin / stdout / stderr redirection
    /// 4. Seccomp filter (last - irreversible lockdown before execve)
    /// 5. Execve
    fn enter(&self) -> std::result::Result<Infallible, ChildFailure> {
        if let Some(dir) = &self.working_directory
            && unsafe { libc::chdir(dir.as_ptr()) } != 0
        {
            return Err(ChildFailure::new(
                ProcessFailure::InvalidWorkingDirectory,
                || format!("Failed to change directory to {}", dir.to_string_lossy()),
            ));
        }

        if let Err(e) = self.rlimits.apply() {
            return Err(ChildFailure::new(
                ProcessFailure::ResourceLimitFailed,
                || e.to_string(),
            ));
        }

        if let Some(path) = &self.input_file {
            redirect(
                path,
                libc::O_RDONLY,
                libc::STDIN_FILENO,
                ProcessFailure::InputFileOpenFailed,
            )?;
        }

        if let Some(path) = &self.output_file {
            redirect(
                path,
                libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
                libc::STDOUT_FILENO,
                ProcessFailure::OutputFileOpenFailed,
            )?;
        }

        if self.error_shares_output {
            debug!("Error file is the output file, sharing the stdout descriptor");
            if unsafe { libc::dup2(libc::STDOUT_FILENO, libc::STDERR_FILENO) } < 0 {
                return Err(ChildFailure::new(
                    ProcessFailure::FileRedirectFailed,
                    || "Failed to share stdout with stderr".to_string(),
                ));
            }
        } else if let Some(path) = &self.error_file {
            redirect(
                path,
                libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC,
                libc::STDERR_FILENO,
                ProcessFailure::ErrorFileOpenFailed,
            )?;
        }

        if let Some(program) = &self.seccomp
            && let Err(e) = SeccompBpf::load(program)
        {
            return Err(ChildFailure::new(
                ProcessFailure::PolicyApplicationFailed,
                || e.to_string(),
            ));
        }

        unsafe {
            libc::execve(
                self.argv[0].as_ptr(),
                self.argv_ptrs.as_ptr(),
                self.envp_ptrs.as_ptr(),
            );
        }

        Err(ChildFailure::new(
            ProcessFailure::ExecFailed,
            || format!("Failed to execute {}", self.program().to_string_lossy()),
        ))
    }
}

fn redirect(
    path: &CStr,
    flags: libc::c_int,
    target: libc::c_int,
    open_failure: ProcessFailure,
) -> std::result::Result<(), ChildFailure> {
    let fd = unsafe { libc::open(path.as_ptr(), flags, 0o644 as libc::c_uint) };
    if fd < 0 {
        return Err(ChildFailure::new(
            open_failure,
            || format!("Failed to open {}", path.to_string_lossy()),
        ));
    }

    if unsafe { libc::dup2(fd, target) } < 0 {
        let failure = ChildFailure::new(
            ProcessFailure::FileRedirectFailed,
            || format!("Failed to redirect fd {} to {}", target, path.to_string_lossy()),
        );
        unsafe { libc::close(fd) };
        return Err(failure);
    }

    unsafe { libc::close(fd) };
    Ok(())
}

/// Report `failure` and terminate the child with [`CHILD_ERROR_SIGNAL`].
fn abort_child(failure: &ChildFailure) -> ! {
    error!(
        "(CHILD {}): {}: {}, {}",
        std::process::id(),
        failure.failure,
        failure.message,
        describe_errno(failure.errno)
    );

    // The host may ignore or block SIGUSR1; the child must still die from it
    unsafe {
        let _ = signal::signal(CHILD_ERROR_SIGNAL, SigHandler::SigDfl);
    }
    let mut mask = SigSet::empty();
    mask.add(CHILD_ERROR_SIGNAL);
    let _ = mask.thread_unblock();
    let _ = signal::raise(CHILD_ERROR_SIGNAL);

    unsafe { libc::_exit(CHILD_ERROR_EXIT) }
}

fn c_arg(value: &[u8]) -> Result<CString> {
    CString::new(value).map_err(|_| {
        SandboxError::process(
            ProcessFailure::InvalidCommandArgs,
            format!(
                "Argument contains a NUL byte: {:?}",
                String::from_utf8_lossy(value)
            ),
        )
    })
}

fn c_path(path: Option<&Path>) -> Result<Option<CString>> {
    path.map(|path| {
        CString::new(path.as_os_str().as_bytes()).map_err(|_| {
            SandboxError::InvalidConfig(format!("Path contains a NUL byte: {}", path.display()))
        })
    })
    .transpose()
}

fn inherited_environment() -> Vec<CString> {
    std::env::vars_os()
        .filter_map(|(name, value)| {
            let mut entry = name.as_bytes().to_vec();
            entry.push(b'=');
            entry.extend_from_slice(value.as_bytes());
            CString::new(entry).ok()
        })
        .collect()
}

fn null_terminated(strings: &[CString]) -> Vec<*const c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(ptr::null()))
        .collect()
}
