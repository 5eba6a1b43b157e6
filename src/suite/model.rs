//! Suite document types
//!
//! Defines the data structures for deserializing YAML test suites and mock
//! endpoint declarations.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use super::bindings::Bindings;
use super::duration;
use crate::compare::Comparison;

/// A complete test suite
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Suite {
    /// Suite title
    pub title: Option<String>,
    /// Free-text documentation
    pub comments: Option<String>,
    /// Test cases in execution order
    pub cases: Vec<Case>,
    /// Resolved options: the base options overlaid with this suite's own
    pub options: SuiteOptions,
    /// Commands run once before the first case
    pub setup: Vec<ExecCommand>,
    /// Commands run once after the last case
    pub teardown: Vec<ExecCommand>,
    /// A long-running process kept alive for the duration of the suite
    pub process: Option<ExecCommand>,
    /// Resources that must be reachable before the suite starts
    pub depends: Option<Dependencies>,
    /// Mock endpoints; a suite that declares any is served by the built-in mock
    pub endpoints: Vec<Endpoint>,
}

impl Suite {
    /// Whether cases should target the built-in mock service
    pub fn is_self_mocking(&self) -> bool {
        !self.endpoints.is_empty()
    }
}

/// Options that carry from one suite to the next within a run
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteOptions {
    /// Trim trailing whitespace from entities before literal comparison
    pub trim_entity: bool,
    /// Expand `${...}` expressions in request templates
    pub interpolate: bool,
    /// Extra time given to streaming I/O before it is abandoned
    pub stream_io_grace_period: Duration,
    /// Pretty-print entities in generated documentation
    pub format_entities: bool,
    /// Include raw HTTP exchanges in generated documentation
    pub include_http: bool,
}

impl Default for SuiteOptions {
    fn default() -> Self {
        Self {
            trim_entity: true,
            interpolate: true,
            stream_io_grace_period: Duration::ZERO,
            format_entities: false,
            include_http: false,
        }
    }
}

/// The `options` section of a suite document
///
/// Every field is optional; absent fields keep the value inherited from the
/// base options.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub(crate) struct OptionsSection {
    #[serde(alias = "trim-entity")]
    pub entity_trim: Option<bool>,
    pub interpolate: Option<bool>,
    #[serde(deserialize_with = "optional_duration")]
    pub stream_io_grace_period: Option<Duration>,
    #[serde(alias = "format-entities")]
    pub doc_format_entities: Option<bool>,
    pub doc_include_http: Option<bool>,
}

impl OptionsSection {
    /// Overlay this section onto a base
    pub fn apply(&self, base: &SuiteOptions) -> SuiteOptions {
        SuiteOptions {
            trim_entity: self.entity_trim.unwrap_or(base.trim_entity),
            interpolate: self.interpolate.unwrap_or(base.interpolate),
            stream_io_grace_period: self
                .stream_io_grace_period
                .unwrap_or(base.stream_io_grace_period),
            format_entities: self.doc_format_entities.unwrap_or(base.format_entities),
            include_http: self.doc_include_http.unwrap_or(base.include_http),
        }
    }
}

fn optional_duration<'de, D: serde::Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error> {
    duration::deserialize(deserializer).map(Some)
}

/// A single request/expected-response case
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Case {
    /// Identifier, used as the result name when present
    pub id: Option<String>,
    /// Delay before the request is sent
    #[serde(deserialize_with = "duration::deserialize")]
    pub wait: Duration,
    /// Number of times to run the case (0 and 1 both mean once)
    pub repeat: u32,
    /// Force inclusion in generated documentation
    pub gendoc: bool,
    pub title: Option<String>,
    #[serde(rename = "doc")]
    pub comments: Option<String>,
    /// Case-local variables, visible only to this case's templates
    pub params: Bindings,
    pub request: Request,
    pub response: Response,
    /// Output variables, evaluated in order after the response arrives
    pub vars: Bindings,
}

impl Case {
    /// Determine if this case is documented or not
    pub fn documented(&self) -> bool {
        self.gendoc || self.title.is_some() || self.comments.is_some()
    }

    /// Name used when reporting the result of this case
    pub fn name(&self) -> String {
        match (&self.id, &self.title) {
            (Some(id), _) => id.clone(),
            (None, Some(title)) => title.clone(),
            (None, None) => format!("{} {}", self.request.method, self.request.url),
        }
    }

    /// Number of result instances this case produces
    pub fn iterations(&self) -> u32 {
        self.repeat.max(1)
    }
}

/// Basic credentials
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BasicCredentials {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// A test request template
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub headers: Bindings,
    /// Query parameters appended to the URL
    pub params: Bindings,
    pub entity: String,
    pub format: Option<String>,
    #[serde(rename = "basic-auth")]
    pub basic_auth: Option<BasicCredentials>,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            url: String::new(),
            headers: Bindings::new(),
            params: Bindings::new(),
            entity: String::new(),
            format: None,
            basic_auth: None,
        }
    }
}

/// An expected response
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Response {
    /// Expected status; 0 accepts any status
    pub status: u16,
    /// Headers that must be present with exactly these values
    pub headers: Bindings,
    pub entity: String,
    #[serde(rename = "compare")]
    pub comparison: Comparison,
    pub format: Option<String>,
}

/// Resources that must be reachable before the suite starts
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Dependencies {
    /// URLs, or `host:port` pairs probed over HTTP
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default = "default_dependency_timeout", deserialize_with = "duration::deserialize")]
    pub timeout: Duration,
}

fn default_dependency_timeout() -> Duration {
    Duration::from_secs(30)
}

/// An external command
///
/// Written either as a bare shell line or as a mapping with options.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(from = "RawCommand")]
pub struct ExecCommand {
    /// Shell command line, run with `sh -c`
    pub command: String,
    /// Extra environment variables
    pub env: Bindings,
    /// Working directory
    pub dir: Option<PathBuf>,
    /// For long-running processes: how long to wait after starting it
    pub wait: Duration,
}

impl ExecCommand {
    pub fn shell(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Default::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCommand {
    Line(String),
    Full {
        command: String,
        #[serde(default)]
        env: Bindings,
        #[serde(default)]
        dir: Option<PathBuf>,
        #[serde(default, deserialize_with = "duration::deserialize")]
        wait: Duration,
    },
}

impl From<RawCommand> for ExecCommand {
    fn from(raw: RawCommand) -> Self {
        match raw {
            RawCommand::Line(command) => Self::shell(command),
            RawCommand::Full {
                command,
                env,
                dir,
                wait,
            } => Self {
                command,
                env,
                dir,
                wait,
            },
        }
    }
}

/// A mock endpoint declaration
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Endpoint {
    /// Matching rules; an endpoint without one is never routed
    pub request: Option<EndpointRequest>,
    /// Response template; absent means a bare 200
    pub response: Option<EndpointResponse>,
}

/// How a mock endpoint is matched
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct EndpointRequest {
    /// Path pattern; `{name}` segments capture into `request.vars`
    pub path: String,
    /// Allowed methods; empty allows any
    pub methods: Vec<String>,
    /// Query parameters that must be present with exactly these values
    pub params: Bindings,
}

/// A mock response template
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct EndpointResponse {
    /// Status to emit; 0 means 200
    pub status: u16,
    /// Headers overlaid verbatim after the computed ones
    pub headers: Bindings,
    /// Entity template, interpolated per request
    pub entity: String,
}
