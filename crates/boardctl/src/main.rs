//! `boardctl` - read sensors and send infrared patterns through the RasPi
//! extension board.

use std::process::ExitCode;

use boardctl::cli::{self, Cli};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "boardctl=warn,boardctl_protocol=warn",
        1 => "boardctl=info,boardctl_protocol=info",
        _ => "boardctl=trace,boardctl_protocol=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // stdout carries the JSON result only.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return cli::report_parse_error(e),
    };
    init_logging(cli.verbose);

    let envelope = cli::run(&cli);
    println!("{}", envelope.to_json());
    envelope.exit_code()
}
