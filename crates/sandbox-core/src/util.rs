//! Utility functions for sandbox operations

use crate::error::{Result, SandboxError};
use std::io;

/// Parse memory size string (e.g., "100M", "1G")
pub fn parse_memory_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();

    let (num_str, multiplier) = if let Some(num) = s.strip_suffix('G') {
        (num, 1024u64 * 1024 * 1024)
    } else if let Some(num) = s.strip_suffix('M') {
        (num, 1024u64 * 1024)
    } else if let Some(num) = s.strip_suffix('K') {
        (num, 1024u64)
    } else if let Some(num) = s.strip_suffix('B') {
        (num, 1u64)
    } else {
        (s.as_str(), 1u64)
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| SandboxError::InvalidConfig(format!("Invalid memory size: {}", s)))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| SandboxError::InvalidConfig(format!("Memory size overflow: {}", s)))
}

/// The calling thread's current `errno`, or 0.
pub fn last_errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Format an errno as `errno: N (text)` for log lines.
pub fn describe_errno(errno: i32) -> String {
    format!(
        "errno: {} ({})",
        errno,
        io::Error::from_raw_os_error(errno)
    )
}
