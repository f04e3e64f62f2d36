//! sandbox-limits: resource limits for sandboxed processes
//!
//! `ResourceConfig` carries the limits of one execution request and derives
//! the effective kernel limits; `RlimitConfig` applies them with setrlimit.

pub mod resource;
pub mod rlimit;

pub use resource::{MAX_MEMORY_FOR_SANDBOX_PROCESS, ResourceConfig};
pub use rlimit::RlimitConfig;
