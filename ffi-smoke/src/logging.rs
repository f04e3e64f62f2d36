use console::style;
use env_logger::Builder;
use log::Level;
use std::io::Write;

/// Filter directives: `--verbose` forces debug, otherwise `RUST_LOG` or info.
fn filters(verbose: bool, rust_log: Option<String>) -> String {
    if verbose {
        return "debug".to_string();
    }
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .unwrap_or_else(|| "info".to_string())
}

fn builder(filters: &str) -> Builder {
    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            let level = match record.level() {
                Level::Error => format!("{}", style("ERROR").red().bold()),
                Level::Warn => format!("{}", style("WARN ").yellow().bold()),
                Level::Info => format!("{}", style("INFO ").green()),
                Level::Debug => format!("{}", style("DEBUG").cyan()),
                Level::Trace => format!("{}", style("TRACE").dim()),
            };
            writeln!(buf, "{} {}", level, record.args())
        })
        .parse_filters(filters);
    builder
}

/// Initialize logger based on verbose flag and `RUST_LOG`
pub fn init_logger(verbose: bool) {
    let filters = filters(verbose, std::env::var("RUST_LOG").ok());
    builder(&filters).init();
}
