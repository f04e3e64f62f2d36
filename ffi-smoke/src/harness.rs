//! Smoke-test sequence against the sandbox C ABI
//!
//! Every string handed to the library is owned by a [`NativeStrings`] arena
//! that lives for the whole call sequence and releases its buffers when it
//! goes out of scope, on success and on every early return.

use std::ffi::{CString, OsStr};
use std::fs;
use std::io;
use std::os::raw::c_char;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use log::{debug, info};
use sandbox::abi::SANDBOX_POLICY_CXX_PROGRAM;
use sandbox::ffi::{IsSandboxConfigurationVaild, StartSandbox};
use sandbox::{SandboxConfiguration, SandboxResult, SandboxStatus};
use thiserror::Error;

pub const TASK_NAME: &str = "PInvokeSmoke";
pub const SAMPLE_NAME: &str = "ExpectedAccepted";
pub const INPUT_FILE: &str = "test_data.in";
pub const OUTPUT_FILE: &str = "pinvoke_smoke.out";

pub const MAX_MEMORY: u64 = 128 * 1024 * 1024;
pub const MAX_CPU_TIME: u64 = 1000;
pub const MAX_REAL_TIME: u64 = 3000;
pub const MAX_OUTPUT_SIZE: u64 = 10 * 1024;

#[derive(Debug, Error)]
pub enum SmokeError {
    #[error("Input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Failed to remove stale output {}: {source}", .path.display())]
    StaleOutput { path: PathBuf, source: io::Error },

    #[error("Path contains a NUL byte: {}", .0.display())]
    NulInPath(PathBuf),

    #[error("Sandbox configuration is invalid")]
    InvalidConfiguration,

    #[error("StartSandbox returned {0}")]
    StartFailed(i32),

    #[error("Unexpected result: status {status}, exit code {exit_code}")]
    UnexpectedResult { status: String, exit_code: i32 },

    #[error("Sample program not found under {}", .0.display())]
    MissingSample(PathBuf),
}

impl SmokeError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SmokeError::MissingInput(_) | SmokeError::StaleOutput { .. } => 1,
            SmokeError::NulInPath(_) | SmokeError::InvalidConfiguration => 2,
            SmokeError::StartFailed(_) => 3,
            SmokeError::UnexpectedResult { .. } => 4,
            SmokeError::MissingSample(_) => 5,
        }
    }
}

/// NUL-terminated copies of the strings a configuration points into.
#[derive(Default)]
pub struct NativeStrings {
    buffers: Vec<CString>,
}

impl NativeStrings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `value` and return a pointer valid until the arena is dropped.
    pub fn alloc(&mut self, value: &OsStr) -> Option<*const c_char> {
        let owned = CString::new(value.as_bytes()).ok()?;
        let ptr = owned.as_ptr();
        self.buffers.push(owned);
        Some(ptr)
    }

    pub fn alloc_path(&mut self, path: &Path) -> Result<*const c_char, SmokeError> {
        self.alloc(path.as_os_str())
            .ok_or_else(|| SmokeError::NulInPath(path.to_path_buf()))
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }
}

/// The three exports, behind a seam so tests can record the calls.
pub trait SandboxApi {
    /// # Safety
    ///
    /// Every string in `config` must stay valid for the call.
    unsafe fn is_configuration_valid(&self, config: &SandboxConfiguration) -> bool;

    /// # Safety
    ///
    /// Every string in `config` must stay valid for the call.
    unsafe fn start(&self, config: &SandboxConfiguration, result: &mut SandboxResult) -> i32;
}

/// Calls straight into the library's C exports.
pub struct NativeSandbox;

impl SandboxApi for NativeSandbox {
    unsafe fn is_configuration_valid(&self, config: &SandboxConfiguration) -> bool {
        unsafe { IsSandboxConfigurationVaild(config) }
    }

    unsafe fn start(&self, config: &SandboxConfiguration, result: &mut SandboxResult) -> i32 {
        unsafe { StartSandbox(config, result) }
    }
}

/// `Samples/ExpectedAccepted`, then `Samples/ExpectedAccepted.exe`.
pub fn resolve_sample(root: &Path) -> Option<PathBuf> {
    let samples = root.join("Samples");
    [
        samples.join(SAMPLE_NAME),
        samples.join(format!("{}.exe", SAMPLE_NAME)),
    ]
    .into_iter()
    .find(|candidate| candidate.is_file())
}

fn build_configuration(
    strings: &mut NativeStrings,
    root: &Path,
    sample: &Path,
    input: &Path,
    output: &Path,
) -> Result<SandboxConfiguration, SmokeError> {
    Ok(SandboxConfiguration {
        TaskName: strings.alloc_path(Path::new(TASK_NAME))?,
        UserCommand: strings.alloc_path(sample)?,
        WorkingDirectory: strings.alloc_path(root)?,
        InputFile: strings.alloc_path(input)?,
        OutputFile: strings.alloc_path(output)?,
        MaxMemoryToCrash: 0,
        MaxMemory: MAX_MEMORY,
        MaxStack: 0,
        MaxCpuTime: MAX_CPU_TIME,
        MaxRealTime: MAX_REAL_TIME,
        MaxOutputSize: MAX_OUTPUT_SIZE,
        MaxProcessCount: 0,
        Policy: SANDBOX_POLICY_CXX_PROGRAM,
        ..Default::default()
    })
}

/// Run the accepted sample under `root` and check that it was accepted.
pub fn run_smoke(api: &impl SandboxApi, root: &Path) -> Result<SandboxResult, SmokeError> {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

    let sample = resolve_sample(&root).ok_or_else(|| SmokeError::MissingSample(root.clone()))?;
    debug!("Sample: {}", sample.display());

    let test_data = root.join("TestData");
    let input = test_data.join(INPUT_FILE);
    if !input.is_file() {
        return Err(SmokeError::MissingInput(input));
    }

    let output = test_data.join(OUTPUT_FILE);
    match fs::remove_file(&output) {
        Ok(()) => debug!("Removed stale output {}", output.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(source) => return Err(SmokeError::StaleOutput { path: output, source }),
    }

    let mut strings = NativeStrings::new();
    let config = build_configuration(&mut strings, &root, &sample, &input, &output)?;
    debug!("Configuration holds {} native strings", strings.len());

    if !unsafe { api.is_configuration_valid(&config) } {
        return Err(SmokeError::InvalidConfiguration);
    }

    let mut result = SandboxResult::default();
    let status = unsafe { api.start(&config, &mut result) };
    if status != 0 {
        return Err(SmokeError::StartFailed(status));
    }

    info!(
        "Result: status {}, exit code {}, {} ms, {} bytes",
        result.Status, result.ExitCode, result.CpuTimeUsage, result.MemoryUsage
    );

    if result.Status != SandboxStatus::Success.code() || result.ExitCode != 0 {
        let status = SandboxStatus::from_code(result.Status)
            .map(|s| s.name().to_string())
            .unwrap_or_else(|| result.Status.to_string());
        return Err(SmokeError::UnexpectedResult {
            status,
            exit_code: result.ExitCode,
        });
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::ffi::CStr;
    use tempfile::{TempDir, tempdir};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Validate,
        Start,
    }

    /// Copies of the strings seen by the last call.
    #[derive(Debug, Default, Clone)]
    struct Seen {
        task_name: String,
        command: String,
        working_directory: String,
        input: String,
        output: String,
        error_is_null: bool,
        log_is_null: bool,
        env_count: u16,
        limits: (u64, u64, u64, u64, u64, u64, i32, i32),
    }

    struct RecordingSandbox {
        valid: bool,
        start_status: i32,
        result: SandboxResult,
        calls: RefCell<Vec<Call>>,
        seen: RefCell<Seen>,
    }

    impl RecordingSandbox {
        fn accepting() -> Self {
            Self {
                valid: true,
                start_status: 0,
                result: SandboxResult {
                    Status: SandboxStatus::Success.code(),
                    ..Default::default()
                },
                calls: RefCell::new(Vec::new()),
                seen: RefCell::new(Seen::default()),
            }
        }

        unsafe fn record(&self, config: &SandboxConfiguration) {
            let text = |ptr: *const c_char| unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
            *self.seen.borrow_mut() = Seen {
                task_name: text(config.TaskName),
                command: text(config.UserCommand),
                working_directory: text(config.WorkingDirectory),
                input: text(config.InputFile),
                output: text(config.OutputFile),
                error_is_null: config.ErrorFile.is_null(),
                log_is_null: config.LogFile.is_null(),
                env_count: config.EnvironmentVariablesCount,
                limits: (
                    config.MaxMemoryToCrash,
                    config.MaxMemory,
                    config.MaxStack,
                    config.MaxCpuTime,
                    config.MaxRealTime,
                    config.MaxOutputSize,
                    config.MaxProcessCount,
                    config.Policy,
                ),
            };
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }
    }

    impl SandboxApi for RecordingSandbox {
        unsafe fn is_configuration_valid(&self, config: &SandboxConfiguration) -> bool {
            self.calls.borrow_mut().push(Call::Validate);
            unsafe { self.record(config) };
            self.valid
        }

        unsafe fn start(&self, config: &SandboxConfiguration, result: &mut SandboxResult) -> i32 {
            self.calls.borrow_mut().push(Call::Start);
            unsafe { self.record(config) };
            *result = self.result;
            self.start_status
        }
    }

    fn layout(sample: Option<&str>, input: bool) -> TempDir {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Samples")).unwrap();
        fs::create_dir_all(dir.path().join("TestData")).unwrap();
        if let Some(name) = sample {
            fs::write(dir.path().join("Samples").join(name), b"").unwrap();
        }
        if input {
            fs::write(dir.path().join("TestData").join(INPUT_FILE), "1 2\n").unwrap();
        }
        dir
    }

    #[test]
    fn accepted_run_passes() {
        let dir = layout(Some(SAMPLE_NAME), true);
        let root = dir.path().canonicalize().unwrap();
        let api = RecordingSandbox::accepting();

        run_smoke(&api, dir.path()).unwrap();

        assert_eq!(api.calls(), vec![Call::Validate, Call::Start]);
        let seen = api.seen.borrow().clone();
        assert_eq!(seen.task_name, TASK_NAME);
        assert_eq!(
            seen.command,
            root.join("Samples").join(SAMPLE_NAME).to_str().unwrap()
        );
        assert_eq!(seen.working_directory, root.to_str().unwrap());
        assert_eq!(
            seen.input,
            root.join("TestData").join(INPUT_FILE).to_str().unwrap()
        );
        assert_eq!(
            seen.output,
            root.join("TestData").join(OUTPUT_FILE).to_str().unwrap()
        );
        assert!(seen.error_is_null);
        assert!(seen.log_is_null);
        assert_eq!(seen.env_count, 0);
        assert_eq!(
            seen.limits,
            (
                0,
                128 * 1024 * 1024,
                0,
                1000,
                3000,
                10 * 1024,
                0,
                SANDBOX_POLICY_CXX_PROGRAM
            )
        );
    }

    #[test]
    fn exe_sample_is_used_as_fallback() {
        let dir = layout(Some("ExpectedAccepted.exe"), true);
        let api = RecordingSandbox::accepting();

        run_smoke(&api, dir.path()).unwrap();

        assert!(api.seen.borrow().command.ends_with("ExpectedAccepted.exe"));
    }

    #[test]
    fn missing_input_makes_no_native_call() {
        let dir = layout(Some(SAMPLE_NAME), false);
        let api = RecordingSandbox::accepting();

        let err = run_smoke(&api, dir.path()).unwrap_err();

        assert!(matches!(err, SmokeError::MissingInput(_)));
        assert_eq!(err.exit_code(), 1);
        assert!(api.calls().is_empty());
    }

    #[test]
    fn missing_sample_fails_before_any_native_call() {
        let dir = layout(None, true);
        let api = RecordingSandbox::accepting();

        let err = run_smoke(&api, dir.path()).unwrap_err();

        assert!(matches!(err, SmokeError::MissingSample(_)));
        assert_eq!(err.exit_code(), 5);
        assert!(api.calls().is_empty());
    }

    #[test]
    fn stale_output_is_removed() {
        let dir = layout(Some(SAMPLE_NAME), true);
        let stale = dir.path().join("TestData").join(OUTPUT_FILE);
        fs::write(&stale, "old").unwrap();

        run_smoke(&RecordingSandbox::accepting(), dir.path()).unwrap();

        assert!(!stale.exists());
    }

    #[test]
    fn invalid_configuration_skips_start() {
        let dir = layout(Some(SAMPLE_NAME), true);
        let api = RecordingSandbox {
            valid: false,
            ..RecordingSandbox::accepting()
        };

        let err = run_smoke(&api, dir.path()).unwrap_err();

        assert_eq!(err.exit_code(), 2);
        assert_eq!(api.calls(), vec![Call::Validate]);
    }

    #[test]
    fn start_failure() {
        let dir = layout(Some(SAMPLE_NAME), true);
        let api = RecordingSandbox {
            start_status: SandboxStatus::InternalError.code(),
            ..RecordingSandbox::accepting()
        };

        let err = run_smoke(&api, dir.path()).unwrap_err();

        assert!(matches!(err, SmokeError::StartFailed(0xFFFF)));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn rejected_verdict() {
        let dir = layout(Some(SAMPLE_NAME), true);
        let api = RecordingSandbox {
            result: SandboxResult {
                Status: SandboxStatus::RuntimeError.code(),
                ExitCode: 1,
                ..Default::default()
            },
            ..RecordingSandbox::accepting()
        };

        let err = run_smoke(&api, dir.path()).unwrap_err();

        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("SANDBOX_STATUS_RUNTIME_ERROR"));
    }

    #[test]
    fn success_with_non_zero_exit_code_is_rejected() {
        let dir = layout(Some(SAMPLE_NAME), true);
        let api = RecordingSandbox {
            result: SandboxResult {
                Status: SandboxStatus::Success.code(),
                ExitCode: 3,
                ..Default::default()
            },
            ..RecordingSandbox::accepting()
        };

        assert_eq!(run_smoke(&api, dir.path()).unwrap_err().exit_code(), 4);
    }

    #[test]
    fn arena_keeps_pointers_stable() {
        let mut strings = NativeStrings::new();
        let first = strings.alloc(OsStr::new("first")).unwrap();
        for i in 0..64 {
            strings.alloc(OsStr::new(&format!("filler-{}", i))).unwrap();
        }

        assert_eq!(strings.len(), 65);
        assert_eq!(unsafe { CStr::from_ptr(first) }.to_str().unwrap(), "first");
    }

    #[test]
    fn arena_rejects_interior_nul() {
        let mut strings = NativeStrings::new();
        let err = strings.alloc_path(Path::new("bad\0path")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert_eq!(strings.len(), 0);
    }

    /// Needs a compiled accepted sample: `SMOKE_ROOT=/path cargo test -- --ignored`
    #[test]
    #[ignore]
    fn native_library_accepts_sample() {
        let root = std::env::var_os("SMOKE_ROOT").map(PathBuf::from).unwrap();
        let result = run_smoke(&NativeSandbox, &root).unwrap();
        assert_eq!(result.Status, SandboxStatus::Success.code());
    }
}
