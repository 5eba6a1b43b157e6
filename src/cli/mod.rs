//! CLI command handling
//!
//! Loads suites, drives the runner and formats results.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::http::{HttpRequest, HttpResponse, ReqwestClient};
use crate::mock::{MockRouter, MockService};
use crate::runner::{CaseResult, RunContext, Runner, ShellCommandRunner};
use crate::suite::{load_endpoints_file, load_suite_file, Suite, SuiteOptions};

/// Address self-mocking suites are served on
const SELF_MOCK_ADDR: &str = "127.0.0.1:0";

/// What to print for each exchange
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Dump {
    requests: bool,
    responses: bool,
}

impl Dump {
    /// Verbose output prints every exchange
    fn new(requests: bool, responses: bool, verbose: bool) -> Self {
        Self {
            requests: requests || verbose,
            responses: responses || verbose,
        }
    }
}

/// Running totals across suites
#[derive(Debug, Default)]
struct Tally {
    tests: usize,
    failures: usize,
    errors: usize,
}

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, verbose: bool) -> Result<()> {
    let config = Config::load()?;

    match command {
        Commands::Run {
            suites,
            base_url,
            no_trim,
            trim_entity,
            no_interpolate,
            interpolate,
            services,
            requests,
            responses,
        } => {
            let options = SuiteOptions {
                trim_entity: !no_trim && trim_entity.unwrap_or(config.defaults.trim_entity),
                interpolate: !no_interpolate && interpolate.unwrap_or(config.defaults.interpolate),
                ..Default::default()
            };
            let base_url = base_url.unwrap_or_else(|| config.defaults.base_url.clone());
            let dump = Dump::new(requests, responses, verbose);
            run(&config, &suites, base_url, options, &services, dump).await
        }

        Commands::Mock { listen, file } => mock(&config, &listen, &file).await,
    }
}

async fn run(
    config: &Config,
    paths: &[PathBuf],
    base_url: String,
    mut options: SuiteOptions,
    services: &[String],
    dump: Dump,
) -> Result<()> {
    let mut running = Vec::with_capacity(services.len());
    for spec in services {
        running.push(start_service(config, spec).await?);
    }

    let client = Arc::new(ReqwestClient::new(config.timeouts.request())?);
    let commands = Arc::new(ShellCommandRunner);
    let mut tally = Tally::default();

    for path in paths {
        println!("{} {}", "====>".blue().bold(), base_name(path).white().bold());

        let suite = match load_suite_file(path, &options) {
            Ok(suite) => suite,
            Err(e) => {
                println!("{} {}", "Could not load test suite:".red(), e);
                tally.errors += 1;
                continue;
            }
        };
        // Options set by this suite carry into the next one
        options = suite.options.clone();

        if let Some(title) = &suite.title {
            println!("     {}", title.dimmed());
        }

        let outcome = run_suite(config, &suite, &base_url, client.clone(), commands.clone()).await;
        match outcome {
            Ok(results) => print_results(&results, dump, &mut tally),
            Err(e) => {
                println!("{} {}", "Could not run test suite:".red(), e);
                tally.errors += 1;
            }
        }
    }

    for service in running {
        if let Err(e) = service.stop().await {
            tracing::error!(error = %e, "Mock service failed");
        }
    }

    summarize(&tally)
}

/// Run one suite, serving its own endpoints first when it declares any
async fn run_suite(
    config: &Config,
    suite: &Suite,
    base_url: &str,
    client: Arc<ReqwestClient>,
    commands: Arc<ShellCommandRunner>,
) -> Result<Vec<CaseResult>> {
    if !suite.is_self_mocking() {
        let runner = Runner::new(RunContext::new(base_url), client, commands);
        return Ok(runner.run(suite).await?.results);
    }

    let router = MockRouter::new(&suite.endpoints)?;
    let service = MockService::start(SELF_MOCK_ADDR, router, config.timeouts.io()).await?;
    tracing::debug!(url = %service.base_url(), "Serving suite endpoints");

    let runner = Runner::new(RunContext::new(service.base_url()), client, commands);
    let run = runner.run(suite).await;
    let stopped = service.stop().await;

    let run = run?;
    stopped?;
    Ok(run.results)
}

/// Start a mock service from an `ADDR=FILE` argument
async fn start_service(config: &Config, spec: &str) -> Result<MockService> {
    let (addr, file) = spec
        .split_once('=')
        .ok_or_else(|| Error::Config(format!("Expected ADDR=FILE, got '{}'", spec)))?;
    let endpoints = load_endpoints_file(Path::new(file))?;
    let router = MockRouter::new(&endpoints)?;
    let routes = router.len();
    let service = MockService::start(addr, router, config.timeouts.io()).await?;
    println!(
        "{} {} ({} routes) at {}",
        "Serving".cyan(),
        file,
        routes,
        service.base_url()
    );
    Ok(service)
}

async fn mock(config: &Config, listen: &str, file: &Path) -> Result<()> {
    let endpoints = load_endpoints_file(file)?;
    let router = MockRouter::new(&endpoints)?;
    let routes = router.len();
    let service = MockService::start(listen, router, config.timeouts.io()).await?;

    println!(
        "{} {} routes at {}",
        "Serving".green().bold(),
        routes,
        service.base_url()
    );
    println!("Press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    println!();
    service.stop().await
}

fn print_results(results: &[CaseResult], dump: Dump, tally: &mut Tally) {
    let mut count = 0;
    for result in results {
        tally.tests += 1;
        if !result.success {
            tally.failures += 1;
        }

        if dump.requests {
            if let Some(request) = &result.request {
                print_request(request);
            }
        }
        if dump.responses {
            if let Some(response) = &result.response {
                print_response(response);
            }
        }

        let marker = if result.success {
            "✓".green()
        } else {
            "✗".red()
        };
        println!("{} {} {}", "---->".dimmed(), marker, result.name);
        for error in &result.errors {
            count += 1;
            println!("      {} {}", format!("#{}", count).red(), error);
        }
    }
}

fn print_request(request: &HttpRequest) {
    println!("{} {} {}", "=>".cyan(), request.method.bold(), request.url);
    for (name, value) in &request.headers {
        println!("   {}: {}", name, value);
    }
    if !request.entity.is_empty() {
        println!("\n{}\n", request.entity);
    }
}

fn print_response(response: &HttpResponse) {
    println!("{} {}", "<=".cyan(), response.status.to_string().bold());
    for (name, value) in &response.headers {
        println!("   {}: {}", name, value);
    }
    if !response.entity.is_empty() {
        println!("\n{}\n", response.entity);
    }
}

fn summarize(tally: &Tally) -> Result<()> {
    println!();
    if tally.errors > 0 {
        println!(
            "{} {} {} could not be run due to errors.",
            "ERRORS!".red().bold(),
            tally.errors,
            plural(tally.errors, "suite", "suites")
        );
        return Err(Error::SuiteErrors(tally.errors));
    }
    if tally.failures > 0 {
        println!(
            "{} {} of {} tests failed.",
            "FAILURES!".red().bold(),
            tally.failures,
            tally.tests
        );
        return Err(Error::TestFailures {
            failed: tally.failures,
            total: tally.tests,
        });
    }
    if tally.tests == 1 {
        println!("{} The test passed.", "SUCCESS!".green().bold());
    } else {
        println!("{} All {} tests passed.", "SUCCESS!".green().bold(), tally.tests);
    }
    Ok(())
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}
