//! Response comparison
//!
//! Checks an actual response against an expected one. Status must match
//! exactly and only the headers named in the expectation are checked. The
//! entity is compared either literally (byte equality, optionally ignoring
//! trailing whitespace) or semantically (parsed and compared structurally).
//! Every discrepancy is reported, not just the first.

mod semantic;

pub use semantic::EntityFormat;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::http::HttpResponse;
use crate::suite::Response;

/// Entity equivalence rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Comparison {
    /// Byte-level equality
    #[default]
    Literal,
    /// Structural, format-aware equality
    Semantic,
}

impl FromStr for Comparison {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "literal" | "" => Ok(Self::Literal),
            "smart" | "semantic" | "values" => Ok(Self::Semantic),
            other => Err(format!("Unsupported comparison type: {}", other)),
        }
    }
}

impl TryFrom<String> for Comparison {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Comparison> for String {
    fn from(c: Comparison) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal => write!(f, "literal"),
            Self::Semantic => write!(f, "smart"),
        }
    }
}

/// Comparison settings taken from the suite options
#[derive(Debug, Clone, Copy)]
pub struct CompareOptions {
    /// Ignore trailing whitespace on both entities in literal mode
    pub trim_entity: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self { trim_entity: true }
    }
}

/// Which side of the comparison a parse failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Expected,
    Actual,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expected => write!(f, "expected"),
            Self::Actual => write!(f, "actual"),
        }
    }
}

/// A single discrepancy between expected and actual
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    Status { expected: u16, actual: u16 },
    HeaderMissing { name: String, expected: String },
    HeaderMismatch { name: String, expected: String, actual: String },
    Entity { expected: String, actual: String },
    Value { path: String, message: String },
    Parse { side: Side, format: EntityFormat, message: String },
    Format(String),
}

impl Diagnostic {
    pub(crate) fn value(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Value {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { expected, actual } => {
                write!(f, "Unexpected status code: expected {}, got {}", expected, actual)
            }
            Self::HeaderMissing { name, expected } => {
                write!(f, "Missing header '{}': expected {:?}", name, expected)
            }
            Self::HeaderMismatch {
                name,
                expected,
                actual,
            } => write!(
                f,
                "Unexpected value for header '{}': expected {:?}, got {:?}",
                name, expected, actual
            ),
            Self::Entity { expected, actual } => write!(
                f,
                "Entities do not match:\n  expected: {:?}\n    actual: {:?}",
                expected, actual
            ),
            Self::Value { path, message } => write!(f, "Entity value at {}: {}", path, message),
            Self::Parse {
                side,
                format,
                message,
            } => write!(f, "Could not parse {} entity as {}: {}", side, format, message),
            Self::Format(message) => write!(f, "Could not compare entities: {}", message),
        }
    }
}

/// One or more discrepancies
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub diagnostics: Vec<Diagnostic>,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.diagnostics.iter().map(|d| d.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// Compare an actual response against an expectation
///
/// The entity rule comes from `expected.comparison`.
pub fn compare(
    expected: &Response,
    actual: &HttpResponse,
    options: CompareOptions,
) -> Result<(), Mismatch> {
    let mut diagnostics = Vec::new();

    if expected.status != 0 && expected.status != actual.status {
        diagnostics.push(Diagnostic::Status {
            expected: expected.status,
            actual: actual.status,
        });
    }

    for (name, value) in expected.headers.iter() {
        match actual.header(name) {
            None => diagnostics.push(Diagnostic::HeaderMissing {
                name: name.to_string(),
                expected: value.to_string(),
            }),
            Some(found) if found != value => diagnostics.push(Diagnostic::HeaderMismatch {
                name: name.to_string(),
                expected: value.to_string(),
                actual: found.to_string(),
            }),
            Some(_) => {}
        }
    }

    match expected.comparison {
        Comparison::Literal => compare_literal(expected, actual, options, &mut diagnostics),
        Comparison::Semantic => compare_semantic(expected, actual, &mut diagnostics),
    }

    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(Mismatch { diagnostics })
    }
}

fn compare_literal(
    expected: &Response,
    actual: &HttpResponse,
    options: CompareOptions,
    out: &mut Vec<Diagnostic>,
) {
    let (e, a) = if options.trim_entity {
        (expected.entity.trim_end(), actual.entity.trim_end())
    } else {
        (expected.entity.as_str(), actual.entity.as_str())
    };
    if e.as_bytes() != a.as_bytes() {
        out.push(Diagnostic::Entity {
            expected: e.to_string(),
            actual: a.to_string(),
        });
    }
}

fn compare_semantic(expected: &Response, actual: &HttpResponse, out: &mut Vec<Diagnostic>) {
    if expected.entity.trim().is_empty() && actual.entity.trim().is_empty() {
        return;
    }

    let format = match EntityFormat::resolve(expected.format.as_deref(), actual.header("Content-Type")) {
        Ok(format) => format,
        Err(message) => {
            out.push(Diagnostic::Format(message));
            return;
        }
    };

    let parsed_expected = format.parse(&expected.entity).map_err(|message| Diagnostic::Parse {
        side: Side::Expected,
        format,
        message,
    });
    let parsed_actual = format.parse(&actual.entity).map_err(|message| Diagnostic::Parse {
        side: Side::Actual,
        format,
        message,
    });

    match (parsed_expected, parsed_actual) {
        (Ok(e), Ok(a)) => semantic::diff("", &e, &a, out),
        (e, a) => {
            out.extend(e.err());
            out.extend(a.err());
        }
    }
}
