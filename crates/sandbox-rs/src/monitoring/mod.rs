//! Monitoring layer: wall-clock enforcement for a running child

pub mod watchdog;

pub use watchdog::Watchdog;
