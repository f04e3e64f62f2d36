use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use sandbox::SecurePolicy;

#[derive(Parser, Debug)]
#[command(name = "sandbox-runner")]
#[command(version, about = "Run a command under resource limits and a secure policy", long_about = None)]
#[command(after_help = "EXAMPLES:
    sandbox-runner /bin/echo hello
    sandbox-runner -i 1.in -o 1.out --memory 256M --cpu 1000 --real 3000 -p cxx ./solution
    sandbox-runner --json --real 500 /bin/sleep 5
")]
pub struct Cli {
    /// Task name used in log lines (random UUID if not provided)
    #[arg(short, long, value_name = "NAME")]
    pub name: Option<String>,

    /// Working directory of the program
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    pub dir: PathBuf,

    /// File connected to stdin
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// File connected to stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// File connected to stderr
    #[arg(short, long, value_name = "FILE")]
    pub error: Option<PathBuf>,

    /// Log file (stderr if not provided)
    #[arg(short, long, value_name = "FILE", env = "SANDBOX_LOG_FILE")]
    pub log: Option<PathBuf>,

    /// Reported memory limit (100M, 1G)
    #[arg(long, value_name = "SIZE")]
    pub memory: Option<String>,

    /// Enforced address-space limit (defaults to twice --memory)
    #[arg(long, value_name = "SIZE")]
    pub memory_to_crash: Option<String>,

    /// Stack limit
    #[arg(long, value_name = "SIZE")]
    pub stack: Option<String>,

    /// CPU time limit in milliseconds
    #[arg(long, value_name = "MS")]
    pub cpu: Option<u64>,

    /// Wall-clock limit in milliseconds
    #[arg(long, value_name = "MS")]
    pub real: Option<u64>,

    /// Process count limit, -1 for unlimited
    #[arg(long, value_name = "COUNT", default_value_t = 0, allow_negative_numbers = true)]
    pub process: i32,

    /// Output size limit
    #[arg(long, value_name = "SIZE")]
    pub output_size: Option<String>,

    /// Secure policy
    #[arg(short, long, value_enum, default_value_t = PolicyArg::Default)]
    pub policy: PolicyArg,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Program and its arguments
    #[arg(
        value_name = "COMMAND",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// No syscall filter
    Default,
    /// Allow-list for compiled C/C++ programs
    Cxx,
}

impl From<PolicyArg> for SecurePolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Default => SecurePolicy::Default,
            PolicyArg::Cxx => SecurePolicy::CxxProgram,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_defaults() {
        let cli = Cli::try_parse_from(["sandbox-runner", "/bin/true"]).unwrap();
        assert_eq!(cli.dir, PathBuf::from("."));
        assert_eq!(cli.process, 0);
        assert_eq!(cli.policy, PolicyArg::Default);
        assert!(!cli.json);
        assert_eq!(cli.command, vec!["/bin/true"]);
    }

    #[test]
    fn trailing_command_keeps_its_flags() {
        let cli = Cli::try_parse_from([
            "sandbox-runner",
            "--real",
            "500",
            "-p",
            "cxx",
            "/bin/ls",
            "-l",
            "/tmp",
        ])
        .unwrap();
        assert_eq!(cli.real, Some(500));
        assert_eq!(cli.policy, PolicyArg::Cxx);
        assert_eq!(cli.command, vec!["/bin/ls", "-l", "/tmp"]);
    }

    #[test]
    fn command_is_required() {
        assert!(Cli::try_parse_from(["sandbox-runner", "--json"]).is_err());
    }

    #[test]
    fn unknown_policy_is_rejected() {
        assert!(Cli::try_parse_from(["sandbox-runner", "-p", "strict", "/bin/true"]).is_err());
    }

    #[test]
    fn unlimited_process_count() {
        let cli = Cli::try_parse_from(["sandbox-runner", "--process", "-1", "/bin/true"]).unwrap();
        assert_eq!(cli.process, -1);
    }

    #[test]
    fn policy_conversion() {
        assert_eq!(SecurePolicy::from(PolicyArg::Default), SecurePolicy::Default);
        assert_eq!(SecurePolicy::from(PolicyArg::Cxx), SecurePolicy::CxxProgram);
    }
}
