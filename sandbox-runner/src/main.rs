//! Sandbox runner CLI - run one command under the sandbox and print its verdict

mod cli;
mod runner;

use clap::Parser;
use cli::Cli;
use console::style;

fn main() {
    let cli = Cli::parse();

    let report = match runner::run(&cli) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} {}", style("error:").red().bold(), e);
            std::process::exit(1);
        }
    };

    if cli.json {
        if let Err(e) = runner::print_json(&report) {
            eprintln!("{} {}", style("error:").red().bold(), e);
            std::process::exit(1);
        }
    } else {
        runner::print_report(&report);
    }
}
