//! sandbox-core: shared types and errors for the sandbox runner
//!
//! This crate provides the foundational types used by all sandbox sub-crates:
//! - Error types, the `Result` alias and the internal failure categories
//! - Utility functions (memory size parsing, errno helpers)

pub mod error;
pub mod util;

pub use error::{ProcessFailure, Result, SandboxError};
