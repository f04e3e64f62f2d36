use console::style;
use log::debug;
use sandbox::util::parse_memory_size;
use sandbox::{Result, SandboxBuilder, SandboxReport, SandboxStatus};

use crate::cli::Cli;

/// Turn the command line into a sandbox builder.
pub fn builder_from_cli(cli: &Cli) -> Result<SandboxBuilder> {
    let name = cli
        .name
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let command = cli.command.join(" ");
    debug!("Task '{}': {}", name, command);

    let mut builder = SandboxBuilder::new(&name, &command)
        .working_directory(&cli.dir)
        .max_process_count(cli.process)
        .policy(cli.policy.into());

    if let Some(path) = &cli.input {
        builder = builder.input_file(path);
    }
    if let Some(path) = &cli.output {
        builder = builder.output_file(path);
    }
    if let Some(path) = &cli.error {
        builder = builder.error_file(path);
    }
    if let Some(path) = &cli.log {
        builder = builder.log_file(path);
    }
    if let Some(size) = &cli.memory {
        builder = builder.max_memory(parse_memory_size(size)?);
    }
    if let Some(size) = &cli.memory_to_crash {
        builder = builder.max_memory_to_crash(parse_memory_size(size)?);
    }
    if let Some(size) = &cli.stack {
        builder = builder.max_stack(parse_memory_size(size)?);
    }
    if let Some(size) = &cli.output_size {
        builder = builder.max_output_size(parse_memory_size(size)?);
    }
    if let Some(ms) = cli.cpu {
        builder = builder.max_cpu_time(ms);
    }
    if let Some(ms) = cli.real {
        builder = builder.max_real_time(ms);
    }

    Ok(builder)
}

pub fn run(cli: &Cli) -> Result<SandboxReport> {
    builder_from_cli(cli)?.build()?.run()
}

pub fn print_report(report: &SandboxReport) {
    let status = if report.status == SandboxStatus::Success {
        style(report.status.name()).green().bold()
    } else {
        style(report.status.name()).red().bold()
    };

    println!("{:<12}{}", style("status").dim(), status);
    println!("{:<12}{}", style("exit code").dim(), report.exit_code);
    match report.signal_description() {
        Some(signal) => println!("{:<12}{}", style("signal").dim(), signal),
        None => println!("{:<12}-", style("signal").dim()),
    }
    println!("{:<12}{} bytes", style("memory").dim(), report.memory_bytes);
    println!("{:<12}{} ms", style("real time").dim(), report.real_time_ms);
    println!("{:<12}{} ms", style("user time").dim(), report.cpu_time_ms);
}

pub fn print_json(report: &SandboxReport) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
