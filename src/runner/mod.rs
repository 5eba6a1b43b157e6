//! Suite execution
//!
//! Runs one loaded suite against a target: waits for dependencies, starts the
//! suite's process, runs setup, executes every case in order and finally runs
//! teardown. Case failures are recorded on the result and never stop the run;
//! dependency and setup failures abort the suite.

mod exec;

pub use exec::{CommandOutput, CommandRunner, ProcessGuard, ShellCommandRunner};

use std::sync::Arc;

use base64::Engine;
use serde_json::{Map, Value};
use url::Url;

use crate::common::{Error, Result};
use crate::compare::{self, CompareOptions, EntityFormat};
use crate::expr::{self, Scope};
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use crate::net;
use crate::suite::{Case, Request, Suite, SuiteOptions};

/// Name under which the last response is visible to output variables
pub const RESPONSE_VARIABLE: &str = "response";

/// Where and how cases are sent
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Relative case URLs are resolved against this
    pub base_url: String,
}

impl RunContext {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

/// The outcome of one case instance
#[derive(Debug, Clone)]
pub struct CaseResult {
    pub name: String,
    pub success: bool,
    /// Failure messages, one per discrepancy or error
    pub errors: Vec<String>,
    /// The request as sent, when it could be built
    pub request: Option<HttpRequest>,
    /// The response, when one was received
    pub response: Option<HttpResponse>,
}

impl CaseResult {
    fn failed(name: String, request: Option<HttpRequest>, error: &Error) -> Self {
        Self {
            name,
            success: false,
            errors: vec![error.to_string()],
            request,
            response: None,
        }
    }
}

/// Results for a whole suite, in execution order
#[derive(Debug, Clone, Default)]
pub struct SuiteRun {
    pub title: Option<String>,
    pub results: Vec<CaseResult>,
    /// Output variables bound by the end of the run
    pub variables: Map<String, Value>,
}

impl SuiteRun {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

/// Executes suites with a given HTTP client and command runner
pub struct Runner {
    context: RunContext,
    client: Arc<dyn HttpClient>,
    commands: Arc<dyn CommandRunner>,
}

impl Runner {
    pub fn new(
        context: RunContext,
        client: Arc<dyn HttpClient>,
        commands: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            context,
            client,
            commands,
        }
    }

    /// Run every case in a suite
    ///
    /// Returns `Err` only when the suite could not be run at all: a dependency
    /// never became ready, the process could not start, or setup failed.
    pub async fn run(&self, suite: &Suite) -> Result<SuiteRun> {
        if let Some(depends) = &suite.depends {
            let urls: Vec<String> = depends.resources.iter().map(|r| net::probe_url(r)).collect();
            tracing::info!(count = urls.len(), "Waiting for dependencies");
            net::await_ready(&urls, depends.timeout).await?;
        }

        let process = match &suite.process {
            Some(command) => {
                let guard = self.commands.spawn(command).await?;
                if !command.wait.is_zero() {
                    tracing::debug!(wait = ?command.wait, "Waiting for process to start");
                    tokio::time::sleep(command.wait).await;
                }
                Some(guard)
            }
            None => None,
        };

        if let Err(e) = self.setup(suite).await {
            if let Some(process) = process {
                process.kill().await;
            }
            return Err(e);
        }

        let mut run = SuiteRun {
            title: suite.title.clone(),
            ..Default::default()
        };
        for case in &suite.cases {
            for iteration in 0..case.iterations() {
                tracing::debug!(case = %case.name(), iteration, "Running case");
                let result = self.run_case(case, &suite.options, &mut run.variables).await;
                run.results.push(result);
            }
        }

        self.teardown(suite).await;
        if let Some(process) = process {
            process.kill().await;
        }
        Ok(run)
    }

    async fn setup(&self, suite: &Suite) -> Result<()> {
        for command in &suite.setup {
            let output = self.commands.run(command).await?;
            if !output.success() {
                return Err(Error::command_failed(
                    &command.command,
                    format!(
                        "exited with status {:?}: {}",
                        output.status,
                        output.stderr.trim()
                    ),
                ));
            }
        }
        Ok(())
    }

    async fn teardown(&self, suite: &Suite) {
        for command in &suite.teardown {
            match self.commands.run(command).await {
                Ok(output) if output.success() => {}
                Ok(output) => tracing::warn!(
                    command = %command.command,
                    status = ?output.status,
                    "Teardown command failed"
                ),
                Err(e) => tracing::warn!(command = %command.command, error = %e, "Teardown command failed"),
            }
        }
    }

    async fn run_case(
        &self,
        case: &Case,
        options: &SuiteOptions,
        variables: &mut Map<String, Value>,
    ) -> CaseResult {
        let name = case.name();
        if !case.wait.is_zero() {
            tokio::time::sleep(case.wait).await;
        }

        let mut scope = Scope::new().with_variables(variables.clone());
        for (param, value) in case.params.iter() {
            match expand(value, &scope, options.interpolate) {
                Ok(value) => scope.set(param, Value::String(value)),
                Err(e) => return CaseResult::failed(name, None, &e),
            }
        }

        let request = match self.build_request(&case.request, &scope, options.interpolate) {
            Ok(request) => request,
            Err(e) => return CaseResult::failed(name, None, &e),
        };

        tracing::debug!(method = %request.method, url = %request.url, "Sending request");
        let response = match self.client.send(&request).await {
            Ok(response) => response,
            Err(e) => return CaseResult::failed(name, Some(request), &e),
        };

        let mut errors = Vec::new();
        let compare_options = CompareOptions {
            trim_entity: options.trim_entity,
        };
        if let Err(mismatch) = compare::compare(&case.response, &response, compare_options) {
            errors.extend(mismatch.diagnostics.iter().map(|d| d.to_string()));
        }

        scope.set(RESPONSE_VARIABLE, response.to_scope_value());
        for (var, source) in case.vars.iter() {
            match expr::bind(source, &scope) {
                Ok(value) => {
                    scope.set(var, value.clone());
                    variables.insert(var.to_string(), value);
                }
                Err(e) => errors.push(format!("Could not bind variable '{}': {}", var, e)),
            }
        }

        CaseResult {
            name,
            success: errors.is_empty(),
            errors,
            request: Some(request),
            response: Some(response),
        }
    }

    /// Resolve a request template into a request ready to send
    fn build_request(&self, template: &Request, scope: &Scope, interpolate: bool) -> Result<HttpRequest> {
        let raw_url = expand(&template.url, scope, interpolate)?;
        let base = Url::parse(&self.context.base_url)
            .map_err(|e| Error::Config(format!("invalid base URL '{}': {}", self.context.base_url, e)))?;
        let mut url = base
            .join(&raw_url)
            .map_err(|e| Error::Transport(format!("invalid request URL '{}': {}", raw_url, e)))?;

        if !template.params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in template.params.iter() {
                pairs.append_pair(name, &expand(value, scope, interpolate)?);
            }
        }

        let mut headers = Vec::with_capacity(template.headers.len() + 2);
        for (name, value) in template.headers.iter() {
            headers.push((name.to_string(), expand(value, scope, interpolate)?));
        }

        // A declared Authorization header takes precedence over basic-auth
        let has_authorization = headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("Authorization"));
        if let Some(auth) = template.basic_auth.as_ref().filter(|_| !has_authorization) {
            let credentials = format!("{}:{}", auth.username, auth.password);
            let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
            headers.push(("Authorization".to_string(), format!("Basic {}", encoded)));
        }

        let entity = expand(&template.entity, scope, interpolate)?;
        if let Some(format) = template.format.as_deref() {
            let has_content_type = headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("Content-Type"));
            if !entity.is_empty() && !has_content_type {
                let format = EntityFormat::resolve(Some(format), None)
                    .map_err(|e| Error::MalformedSuite(format!("request {}", e)))?;
                headers.push(("Content-Type".to_string(), format.content_type().to_string()));
            }
        }

        Ok(HttpRequest {
            method: template.method.to_ascii_uppercase(),
            url: url.to_string(),
            headers,
            entity,
        })
    }
}

fn expand(template: &str, scope: &Scope, interpolate: bool) -> Result<String> {
    if interpolate {
        expr::interpolate(template, scope)
    } else {
        Ok(template.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::{load_suite, ExecCommand};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers every request from a fixed list of responses, in order
    struct ScriptedClient {
        responses: Mutex<Vec<HttpResponse>>,
        sent: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<HttpResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<HttpRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for ScriptedClient {
        async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
            self.sent.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| Error::Transport("connection refused".into()))
        }
    }

    /// Records commands and fails any whose line contains "fail"
    #[derive(Default)]
    struct RecordingCommands {
        ran: Mutex<Vec<String>>,
    }

    impl RecordingCommands {
        fn ran(&self) -> Vec<String> {
            self.ran.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for RecordingCommands {
        async fn run(&self, command: &ExecCommand) -> Result<CommandOutput> {
            self.ran.lock().unwrap().push(command.command.clone());
            let status = if command.command.contains("fail") { 1 } else { 0 };
            Ok(CommandOutput {
                status: Some(status),
                ..Default::default()
            })
        }

        async fn spawn(&self, command: &ExecCommand) -> Result<ProcessGuard> {
            self.ran.lock().unwrap().push(format!("spawn {}", command.command));
            Ok(ProcessGuard::detached())
        }
    }

    fn ok(entity: &str) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: vec![("Content-Type".into(), "application/json".into())],
            entity: entity.into(),
        }
    }

    fn runner(client: Arc<ScriptedClient>, commands: Arc<RecordingCommands>) -> Runner {
        Runner::new(RunContext::new("http://api.test/v1/"), client, commands)
    }

    fn suite(yaml: &str) -> Suite {
        load_suite(yaml, &SuiteOptions::default()).unwrap()
    }

    #[tokio::test]
    async fn test_token_flows_to_next_case() {
        let client = ScriptedClient::new(vec![ok(r#"{"token":"T1"}"#), ok("")]);
        let runner = runner(client.clone(), Arc::default());
        let suite = suite(
            r#"
- request:
    method: post
    url: login
  response:
    status: 200
    entity: '{"token":"T1"}'
  vars:
    token: response.value.token
- request:
    url: me
    headers:
      Authorization: Bearer ${token}
  response:
    status: 200
"#,
        );

        let run = runner.run(&suite).await.unwrap();
        assert_eq!(run.failed(), 0, "{:?}", run.results);
        assert_eq!(run.variables["token"], Value::String("T1".into()));

        let sent = client.sent();
        assert_eq!(sent[0].method, "POST");
        assert_eq!(sent[0].url, "http://api.test/v1/login");
        assert_eq!(sent[1].header("Authorization"), Some("Bearer T1"));
    }

    #[tokio::test]
    async fn test_repeat_produces_ordered_results() {
        let client = ScriptedClient::new(vec![ok(""), ok(""), ok("")]);
        let runner = runner(client.clone(), Arc::default());
        let suite = suite("- id: ping\n  repeat: 3\n  request:\n    url: /ping\n");

        let run = runner.run(&suite).await.unwrap();
        assert_eq!(run.total(), 3);
        assert!(run.results.iter().all(|r| r.name == "ping" && r.success));
        assert_eq!(client.sent()[0].url, "http://api.test/ping");
    }

    #[tokio::test]
    async fn test_setup_failure_skips_cases_and_teardown() {
        let client = ScriptedClient::new(vec![]);
        let commands = Arc::new(RecordingCommands::default());
        let runner = runner(client.clone(), commands.clone());
        let suite = suite(
            r#"
setup: [prepare, fail-here]
teardown: [cleanup]
tests:
  - request: {url: /x}
"#,
        );

        let err = runner.run(&suite).await.unwrap_err();
        assert!(matches!(err, Error::Command { .. }));
        assert_eq!(commands.ran(), vec!["prepare", "fail-here"]);
        assert!(client.sent().is_empty());
    }

    #[tokio::test]
    async fn test_teardown_runs_after_failures() {
        let client = ScriptedClient::new(vec![ok("nope")]);
        let commands = Arc::new(RecordingCommands::default());
        let runner = runner(client, commands.clone());
        let suite = suite(
            r#"
process: ./server
setup: [prepare]
teardown: [cleanup, fail-cleanup]
tests:
  - request: {url: /x}
    response: {status: 200, entity: yes}
"#,
        );

        let run = runner.run(&suite).await.unwrap();
        assert_eq!(run.failed(), 1);
        assert_eq!(
            commands.ran(),
            vec!["spawn ./server", "prepare", "cleanup", "fail-cleanup"]
        );
    }

    #[tokio::test]
    async fn test_case_errors_are_isolated() {
        let client = ScriptedClient::new(vec![ok("")]);
        let runner = runner(client.clone(), Arc::default());
        let suite = suite(
            r#"
- id: broken
  request: {url: '/${missing}'}
- id: answered
  request: {url: /a}
- id: refused
  request: {url: /b}
"#,
        );

        // One scripted response: the third case gets a transport error
        let run = runner.run(&suite).await.unwrap();
        assert_eq!(run.total(), 3);
        assert!(!run.results[0].success);
        assert!(run.results[0].errors[0].contains("missing"));
        assert!(run.results[0].request.is_none());
        assert!(run.results[1].success);
        assert!(!run.results[2].success);
        assert!(run.results[2].request.is_some());
        assert_eq!(client.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_request_construction() {
        let client = ScriptedClient::new(vec![ok("")]);
        let runner = runner(client.clone(), Arc::default());
        let suite = suite(
            r#"
- params:
    user: alice
  request:
    method: put
    url: users/${user}
    params:
      verbose: 'yes'
      q: a b
    basic-auth: {username: admin, password: secret}
    format: json
    entity: '{"name":"${user}"}'
"#,
        );

        runner.run(&suite).await.unwrap();
        let sent = &client.sent()[0];
        assert_eq!(sent.method, "PUT");
        assert_eq!(sent.url, "http://api.test/v1/users/alice?verbose=yes&q=a+b");
        assert_eq!(sent.header("Authorization"), Some("Basic YWRtaW46c2VjcmV0"));
        assert_eq!(sent.header("content-type"), Some("application/json"));
        assert_eq!(sent.entity, r#"{"name":"alice"}"#);
    }

    #[tokio::test]
    async fn test_declared_authorization_wins_over_basic_auth() {
        let client = ScriptedClient::new(vec![ok("")]);
        let runner = runner(client.clone(), Arc::default());
        let suite = suite(
            r#"
- request:
    url: /me
    headers:
      authorization: Bearer T-1
    basic-auth: {username: admin, password: secret}
"#,
        );

        runner.run(&suite).await.unwrap();
        let sent = &client.sent()[0];
        let auth: Vec<&str> = sent
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("Authorization"))
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(auth, vec!["Bearer T-1"]);
    }

    #[tokio::test]
    async fn test_interpolation_disabled() {
        let client = ScriptedClient::new(vec![ok("")]);
        let runner = runner(client.clone(), Arc::default());
        let suite = suite("options: {interpolate: false}\ntests:\n  - request: {url: /x, entity: '${raw}'}\n");

        let run = runner.run(&suite).await.unwrap();
        assert!(run.results[0].success);
        assert_eq!(client.sent()[0].entity, "${raw}");
    }

    #[tokio::test]
    async fn test_params_are_case_local() {
        let client = ScriptedClient::new(vec![ok(""), ok("")]);
        let runner = runner(client.clone(), Arc::default());
        let suite = suite(
            "- params: {id: '7'}\n  request: {url: '/a/${id}'}\n- request: {url: '/b/${id}'}\n",
        );

        let run = runner.run(&suite).await.unwrap();
        assert!(run.results[0].success);
        assert!(!run.results[1].success);
        assert!(!run.variables.contains_key("id"));
    }
}
