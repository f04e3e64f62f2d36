//! Run a command under the sandbox and print the report.
//!
//! ```text
//! cargo run -p sandbox-rs --example basic -- /bin/echo hello
//! ```

use sandbox::{Result, SandboxBuilder};

fn main() -> Result<()> {
    let command: Vec<String> = std::env::args().skip(1).collect();
    let command = if command.is_empty() {
        "/bin/echo hello from the sandbox".to_string()
    } else {
        command.join(" ")
    };

    let sandbox = SandboxBuilder::new("basic-example", &command)
        .max_memory_str("256M")?
        .max_cpu_time(1000)
        .max_real_time(3000)
        .build()?;

    let report = sandbox.run()?;
    println!("Status: {}", report.status);
    println!("Exit code: {}", report.exit_code);
    if let Some(signal) = report.signal_description() {
        println!("Signal: {}", signal);
    }
    println!("CPU time: {}ms", report.cpu_time_ms);
    println!("Real time: {}ms", report.real_time_ms);
    println!("Memory: {} bytes", report.memory_bytes);
    Ok(())
}
