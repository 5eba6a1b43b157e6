//! CLI command definitions
//!
//! Defines the clap commands for the hunit CLI.

use clap::builder::BoolishValueParser;
use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run test suites against a service
    Run {
        /// Suite files, run in order
        #[arg(required = true)]
        suites: Vec<PathBuf>,

        /// Base URL relative case URLs are resolved against
        #[arg(long, short = 'b', env = "HUNIT_BASE_URL")]
        base_url: Option<String>,

        /// Compare entities exactly, including trailing whitespace
        #[arg(long)]
        no_trim: bool,

        /// Trim trailing whitespace before literal comparison
        #[arg(
            long,
            env = "HUNIT_TRIM_ENTITY",
            value_name = "BOOL",
            value_parser = BoolishValueParser::new()
        )]
        trim_entity: Option<bool>,

        /// Send request templates without expanding ${...} expressions
        #[arg(long)]
        no_interpolate: bool,

        /// Expand ${...} expressions in request templates
        #[arg(
            long,
            env = "HUNIT_EXPAND_VARS",
            value_name = "BOOL",
            value_parser = BoolishValueParser::new()
        )]
        interpolate: Option<bool>,

        /// Serve a mock endpoint file for the duration of the run
        /// Can be specified multiple times: --service 127.0.0.1:8080=api.yml
        #[arg(long = "service", short = 's', value_name = "ADDR=FILE")]
        services: Vec<String>,

        /// Print each request as it is sent (implied by --verbose)
        #[arg(long, env = "HUNIT_DUMP_REQUESTS", value_parser = BoolishValueParser::new())]
        requests: bool,

        /// Print each response as it is received (implied by --verbose)
        #[arg(long, env = "HUNIT_DUMP_RESPONSES", value_parser = BoolishValueParser::new())]
        responses: bool,
    },

    /// Serve mock endpoints until interrupted
    Mock {
        /// Address to listen on
        #[arg(long, short = 'l', default_value = "127.0.0.1:8080")]
        listen: String,

        /// Endpoint file
        file: PathBuf,
    },
}
