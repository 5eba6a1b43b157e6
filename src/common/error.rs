//! Error types for hunit
//!
//! Comparison mismatches are not errors: they are recorded as diagnostics on
//! the case result. Everything here aborts the operation that produced it.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for hunit
#[derive(Error, Debug)]
pub enum Error {
    // === Suite Errors ===
    #[error("Malformed suite: {0}")]
    MalformedSuite(String),

    // === Expression Errors ===
    #[error("Could not parse expression at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    #[error("Undefined variable: {0}")]
    UndefinedVariable(String),

    #[error("Function 'std.{name}' failed: {message}")]
    Function { name: String, message: String },

    // === Network Errors ===
    #[error("Timed out after {after:?} waiting for: {pending}")]
    Timeout { after: Duration, pending: String },

    #[error("Wait was cancelled")]
    Cancelled,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Could not bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Mock service exited while serving: {0}")]
    ServerExited(String),

    // === Command Errors ===
    #[error("Command '{command}' failed: {reason}")]
    Command { command: String, reason: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Run Outcome ===
    #[error("{failed} of {total} tests failed")]
    TestFailures { failed: usize, total: usize },

    #[error("{0} test suite(s) could not be run due to errors")]
    SuiteErrors(usize),
}

impl Error {
    /// Create a parse error at a byte offset in the template
    pub fn parse(offset: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            offset,
            message: message.into(),
        }
    }

    /// Create a helper function failure
    pub fn function(name: &str, message: impl Into<String>) -> Self {
        Self::Function {
            name: name.to_string(),
            message: message.into(),
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: &str, reason: impl Into<String>) -> Self {
        Self::Command {
            command: command.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error means a deadline elapsed rather than a transport failure
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
