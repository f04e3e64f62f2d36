//! FFI smoke test - run the accepted sample through `StartSandbox`

mod harness;
mod logging;

use clap::Parser;
use console::style;
use std::path::PathBuf;

use harness::{NativeSandbox, run_smoke};

#[derive(Parser)]
#[command(name = "ffi-smoke")]
#[command(version, about = "Run the accepted sample through the sandbox C ABI", long_about = None)]
#[command(after_help = "LAYOUT:
    <ROOT>/Samples/ExpectedAccepted[.exe]   program expected to be accepted
    <ROOT>/TestData/test_data.in            its input
    <ROOT>/TestData/pinvoke_smoke.out       written by the run
")]
struct Cli {
    /// Directory holding Samples/ and TestData/
    #[arg(value_name = "ROOT", default_value = ".")]
    root: PathBuf,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    logging::init_logger(cli.verbose);

    if let Err(e) = run_smoke(&NativeSandbox, &cli.root) {
        eprintln!("{} {}", style("error:").red().bold(), e);
        std::process::exit(e.exit_code());
    }

    println!("{}", style("FFI smoke test passed").green().bold());
}
