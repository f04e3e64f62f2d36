//! Execution layer: fork, child setup and reaping
//!
//! Everything the child needs is prepared in the parent as [`PreparedExec`];
//! the child only issues syscalls on already-built buffers before `execve`.

pub mod child;
pub mod process;

pub use child::PreparedExec;
pub use process::{ProcessExit, spawn, wait_for_exit};
