//! C exports
//!
//! ```c
//! int  StartSandbox(const SandboxConfiguration *config, SandboxResult *result);
//! bool IsSandboxConfigurationVaild(const SandboxConfiguration *config);
//! int  GetSandboxVersion(void);
//! ```

use std::os::raw::c_int;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, error};
use sandbox_core::{Result, SandboxError};

use crate::abi::{SANDBOX_VERSION, SandboxConfiguration, SandboxResult, SandboxStatus};
use crate::config::TaskConfig;
use crate::controller::{Sandbox, SandboxReport};
use crate::validation::validate_configuration;

const INTERNAL_ERROR: c_int = SandboxStatus::InternalError as c_int;

/// Run one task.
///
/// Returns 0 when the program ran (its verdict is in `result.Status`) and
/// `SANDBOX_STATUS_INTERNAL_ERROR` when the sandbox could not run it.
///
/// # Safety
///
/// `config` must be NULL or point to a valid record whose strings stay valid
/// for the duration of the call. `result` must be NULL or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn StartSandbox(
    config: *const SandboxConfiguration,
    result: *mut SandboxResult,
) -> c_int {
    if result.is_null() {
        return INTERNAL_ERROR;
    }
    unsafe { result.write(SandboxResult::default()) };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| unsafe { start(config) }));

    let (code, raw) = match outcome {
        Ok(Ok(report)) => (SandboxStatus::Success.code(), report.to_raw()),
        Ok(Err(err)) => {
            error!("StartSandbox failed: {}", err);
            (INTERNAL_ERROR, internal_error_result())
        }
        Err(_) => {
            error!("StartSandbox panicked");
            (INTERNAL_ERROR, internal_error_result())
        }
    };

    unsafe { result.write(raw) };
    code
}

/// Check a configuration without running it.
///
/// # Safety
///
/// `config` must be NULL or point to a valid record.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn IsSandboxConfigurationVaild(config: *const SandboxConfiguration) -> bool {
    let checked = panic::catch_unwind(AssertUnwindSafe(|| {
        validate_configuration(unsafe { config.as_ref() })
    }));

    match checked {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            debug!("Configuration rejected: {}", err);
            false
        }
        Err(_) => false,
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn GetSandboxVersion() -> c_int {
    SANDBOX_VERSION
}

unsafe fn start(config: *const SandboxConfiguration) -> Result<SandboxReport> {
    let Some(config) = (unsafe { config.as_ref() }) else {
        return Err(SandboxError::InvalidConfig(
            "configuration cannot be null".to_string(),
        ));
    };
    validate_configuration(Some(config))?;

    let task = unsafe { TaskConfig::from_raw(config) }?;
    Sandbox::create(task)?.run()
}

fn internal_error_result() -> SandboxResult {
    SandboxResult {
        Status: INTERNAL_ERROR,
        ..Default::default()
    }
}
