//! Suite loading
//!
//! A suite document is either a bare sequence of cases or a full mapping.
//! Options are threaded explicitly: the caller passes the options resolved by
//! the previous suite as the base for the next one.

use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

use super::model::{Case, Dependencies, Endpoint, ExecCommand, OptionsSection, Suite, SuiteOptions};
use crate::common::{Error, Result};

/// The mapping form of a suite document
#[derive(Deserialize, Default)]
#[serde(default)]
struct SuiteDocument {
    title: Option<String>,
    doc: Option<String>,
    tests: Vec<Case>,
    options: OptionsSection,
    setup: Vec<ExecCommand>,
    teardown: Vec<ExecCommand>,
    process: Option<ExecCommand>,
    depends: Option<Dependencies>,
    endpoints: Vec<Endpoint>,
}

/// The mapping form of an endpoint document
#[derive(Deserialize)]
struct EndpointDocument {
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

/// Load a test suite from YAML text
///
/// The returned suite's `options` are `base` overlaid with the document's own
/// `options` section; pass them as `base` to the next load to carry them over.
pub fn load_suite(source: &str, base: &SuiteOptions) -> Result<Suite> {
    let node: Value = serde_yaml::from_str(source)?;
    match node {
        Value::Sequence(_) => {
            let cases: Vec<Case> = decode(node)?;
            Ok(Suite {
                cases,
                options: base.clone(),
                ..Default::default()
            })
        }
        Value::Mapping(_) => {
            let doc: SuiteDocument = decode(node)?;
            Ok(Suite {
                title: doc.title,
                comments: doc.doc,
                cases: doc.tests,
                options: doc.options.apply(base),
                setup: doc.setup,
                teardown: doc.teardown,
                process: doc.process,
                depends: doc.depends,
                endpoints: doc.endpoints,
            })
        }
        other => Err(Error::MalformedSuite(format!(
            "expected a sequence of tests or a mapping, found {}",
            describe(&other)
        ))),
    }
}

/// Load a test suite from a file
pub fn load_suite_file(path: &Path, base: &SuiteOptions) -> Result<Suite> {
    let content = read(path)?;
    load_suite(&content, base)
}

/// Load mock endpoints from YAML text
///
/// Accepts a bare sequence of endpoints or a mapping with an `endpoints` key
/// (so a self-mocking suite file can be served on its own).
pub fn load_endpoints(source: &str) -> Result<Vec<Endpoint>> {
    let node: Value = serde_yaml::from_str(source)?;
    match node {
        Value::Sequence(_) => decode(node),
        Value::Mapping(_) => decode::<EndpointDocument>(node).map(|doc| doc.endpoints),
        other => Err(Error::MalformedSuite(format!(
            "expected a sequence of endpoints or a mapping, found {}",
            describe(&other)
        ))),
    }
}

/// Load mock endpoints from a file
pub fn load_endpoints_file(path: &Path) -> Result<Vec<Endpoint>> {
    let content = read(path)?;
    load_endpoints(&content)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::FileRead {
        path: path.display().to_string(),
        error: e.to_string(),
    })
}

fn decode<T: serde::de::DeserializeOwned>(node: Value) -> Result<T> {
    serde_yaml::from_value(node).map_err(|e| Error::MalformedSuite(e.to_string()))
}

fn describe(node: &Value) -> &'static str {
    match node {
        Value::Null => "an empty document",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Tagged(_) => "a tagged value",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::Comparison;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_bare_sequence_uses_base() {
        let base = SuiteOptions {
            trim_entity: false,
            ..Default::default()
        };
        let suite = load_suite(
            r#"
- request:
    url: /a
- request:
    method: POST
    url: /b
"#,
            &base,
        )
        .unwrap();

        let expected: Vec<Case> = serde_yaml::from_str(
            "- request:\n    url: /a\n- request:\n    method: POST\n    url: /b\n",
        )
        .unwrap();
        assert_eq!(suite.cases, expected);
        assert_eq!(suite.options, base);
        assert_eq!(suite.title, None);
        assert!(suite.setup.is_empty());
        assert!(suite.teardown.is_empty());
        assert!(suite.depends.is_none());
        assert!(suite.process.is_none());
    }

    #[test]
    fn test_full_mapping() {
        let suite = load_suite(
            r#"
title: Accounts
doc: Account API contract
options:
  entity-trim: false
setup:
  - echo ready
depends:
  resources: ["localhost:5432"]
  timeout: 5s
tests:
  - id: get
    request:
      url: /accounts/1
    response:
      status: 200
      compare: smart
      format: json
      entity: '{"id": 1}'
"#,
            &SuiteOptions::default(),
        )
        .unwrap();

        assert_eq!(suite.title.as_deref(), Some("Accounts"));
        assert_eq!(suite.comments.as_deref(), Some("Account API contract"));
        assert!(!suite.options.trim_entity);
        assert!(suite.options.interpolate);
        assert_eq!(suite.setup, vec![ExecCommand::shell("echo ready")]);
        assert_eq!(suite.depends.unwrap().timeout, Duration::from_secs(5));
        assert_eq!(suite.cases.len(), 1);
        assert_eq!(suite.cases[0].response.comparison, Comparison::Semantic);
    }

    #[test]
    fn test_options_propagate_to_next_suite() {
        let first = load_suite(
            "options:\n  interpolate: false\ntests: []\n",
            &SuiteOptions::default(),
        )
        .unwrap();
        let second = load_suite("- request:\n    url: /x\n", &first.options).unwrap();
        assert!(!second.options.interpolate);
    }

    #[test]
    fn test_scalar_document_is_malformed() {
        for source in ["just a string", "42", "", "true"] {
            let err = load_suite(source, &SuiteOptions::default()).unwrap_err();
            assert!(
                matches!(err, Error::MalformedSuite(_)),
                "{:?} should be malformed, got {:?}",
                source,
                err
            );
        }
    }

    #[test]
    fn test_unknown_comparison_rejected() {
        let err = load_suite(
            "- response:\n    compare: fuzzy\n",
            &SuiteOptions::default(),
        )
        .unwrap_err();
        match err {
            Error::MalformedSuite(message) => assert!(message.contains("fuzzy")),
            other => panic!("Expected MalformedSuite, got {:?}", other),
        }
    }

    #[test]
    fn test_load_endpoints_both_forms() {
        let seq = load_endpoints("- request:\n    path: /a\n").unwrap();
        assert_eq!(seq.len(), 1);
        let map = load_endpoints(
            "endpoints:\n  - request:\n      path: /b\n      methods: [GET]\n",
        )
        .unwrap();
        assert_eq!(map[0].request.as_ref().unwrap().path, "/b");
        assert!(matches!(load_endpoints("3"), Err(Error::MalformedSuite(_))));
    }

    #[test]
    fn test_load_suite_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.yml");
        std::fs::write(&path, "- request:\n    url: /health\n").unwrap();
        let suite = load_suite_file(&path, &SuiteOptions::default()).unwrap();
        assert_eq!(suite.cases[0].request.url, "/health");

        let missing = load_suite_file(&dir.path().join("nope.yml"), &SuiteOptions::default());
        assert!(matches!(missing, Err(Error::FileRead { .. })));
    }
}
