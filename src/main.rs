//! hunit - declarative HTTP contract testing
//!
//! Runs YAML test suites against a service, or serves YAML-declared mock
//! endpoints.

use clap::builder::BoolishValueParser;
use clap::Parser;
use hunit::common::logging;
use hunit::{cli, commands, Error};
use commands::Commands;

#[derive(Parser)]
#[command(name = "hunit", about = "Declarative HTTP contract testing")]
#[command(version, long_about = None)]
struct Cli {
    /// Verbose logging; also prints every request and response
    #[arg(
        long,
        short,
        global = true,
        env = "HUNIT_VERBOSE",
        value_parser = BoolishValueParser::new()
    )]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_cli(cli.verbose);

    if let Err(e) = cli::dispatch(cli.command, cli.verbose).await {
        // Run outcomes have already been summarized
        if !matches!(e, Error::TestFailures { .. } | Error::SuiteErrors(_)) {
            eprintln!("Error: {e}");
        }
        std::process::exit(1);
    }
}
