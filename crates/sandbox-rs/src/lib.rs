//! sandbox: run judged programs under resource limits
//!
//! A task is a command line plus optional stdin/stdout/stderr redirections,
//! `setrlimit` limits, a wall-clock limit and a secure policy (seccomp
//! allow-list). The library forks, confines and executes the program,
//! reaps it with `wait4` and classifies the outcome into a verdict.
//!
//! The same functionality is exported as a C ABI (see [`ffi`]) so that any
//! language can load `libsandbox.so`.
//!
//! # Example
//!
//! ```no_run
//! use sandbox::{SandboxBuilder, SandboxStatus, SecurePolicy};
//!
//! let sandbox = SandboxBuilder::new("a-plus-b", "./solution")
//!     .input_file("1.in")
//!     .output_file("1.out")
//!     .max_memory_str("256M")?
//!     .max_cpu_time(1000)
//!     .max_real_time(3000)
//!     .max_process_count(0)
//!     .policy(SecurePolicy::CxxProgram)
//!     .build()?;
//!
//! let report = sandbox.run()?;
//! assert_eq!(report.status, SandboxStatus::Success);
//! # Ok::<(), sandbox::SandboxError>(())
//! ```

pub mod abi;
pub mod config;
pub mod controller;
pub mod execution;
pub mod ffi;
pub mod logging;
pub mod monitoring;
pub mod validation;

// Re-export sub-crate types for convenience
pub use sandbox_core::{self as core, ProcessFailure, Result, SandboxError, util};
pub use sandbox_limits::{ResourceConfig, RlimitConfig};
pub use sandbox_seccomp::{PolicyRules, SeccompBpf, SecurePolicy};

pub use abi::{SandboxConfiguration, SandboxResult, SandboxStatus};
pub use config::{SandboxBuilder, TaskConfig};
pub use controller::{Sandbox, SandboxReport, classify};
pub use execution::ProcessExit;
pub use monitoring::Watchdog;
pub use validation::validate_configuration;
