//! Layered variable scope
//!
//! Lookup precedence, highest first:
//! 1. `std.*` helpers (call position only, resolved by the evaluator)
//! 2. the `request` namespace, when the scope carries one
//! 3. user variables (case params and output variables)
//!
//! A scope is built for one evaluation and dropped afterwards; nothing in it
//! is shared between concurrent mock requests.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::common::{Error, Result};

/// Namespace holding the inbound request bindings
pub const REQUEST_NAMESPACE: &str = "request";

/// The `request` namespace: route captures, query params and form fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestScope {
    /// Route capture bindings
    pub vars: BTreeMap<String, String>,
    /// Decoded query parameters
    pub params: BTreeMap<String, String>,
    /// Decoded form-body fields
    pub form: BTreeMap<String, String>,
}

impl RequestScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vars<I: IntoIterator<Item = (String, String)>>(mut self, vars: I) -> Self {
        self.vars.extend(vars);
        self
    }

    /// Decode a raw query string; the first value wins when a key repeats
    pub fn with_query(mut self, query: &str) -> Self {
        self.params = first_wins(query);
        self
    }

    /// Decode an `application/x-www-form-urlencoded` body; first value wins
    pub fn with_form(mut self, body: &str) -> Self {
        self.form = first_wins(body);
        self
    }

    fn namespace(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        match name {
            "vars" => Some(&self.vars),
            "params" => Some(&self.params),
            "form" => Some(&self.form),
            _ => None,
        }
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("vars".into(), strings(&self.vars));
        map.insert("params".into(), strings(&self.params));
        map.insert("form".into(), strings(&self.form));
        Value::Object(map)
    }
}

fn first_wins(encoded: &str) -> BTreeMap<String, String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(encoded).unwrap_or_default();
    let mut map = BTreeMap::new();
    for (k, v) in pairs {
        map.entry(k).or_insert(v);
    }
    map
}

fn strings(map: &BTreeMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// Variables visible to an expression
#[derive(Debug, Clone, Default)]
pub struct Scope {
    request: Option<RequestScope>,
    variables: Map<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request(mut self, request: RequestScope) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables.extend(variables);
        self
    }

    /// Bind (or rebind) a user variable
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }

    /// Resolve a dotted path to a value
    pub fn resolve(&self, path: &[String]) -> Result<Value> {
        let undefined = || Error::UndefinedVariable(path.join("."));
        let (head, rest) = path.split_first().ok_or_else(undefined)?;

        if let (REQUEST_NAMESPACE, Some(request)) = (head.as_str(), &self.request) {
            return match rest {
                [] => Ok(request.to_value()),
                [ns] => request.namespace(ns).map(strings).ok_or_else(undefined),
                [ns, key] => request
                    .namespace(ns)
                    .and_then(|m| m.get(key))
                    .map(|v| Value::String(v.clone()))
                    .ok_or_else(undefined),
                _ => Err(undefined()),
            };
        }

        let mut current = self.variables.get(head).ok_or_else(undefined)?;
        for segment in rest {
            current = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            }
            .ok_or_else(undefined)?;
        }
        Ok(current.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(path: &str) -> Vec<String> {
        path.split('.').map(String::from).collect()
    }

    #[test]
    fn test_request_namespaces() {
        let scope = Scope::new().with_request(
            RequestScope::new()
                .with_vars([("id".to_string(), "42".to_string())])
                .with_query("q=first&q=second&page=2")
                .with_form("name=Ada+Lovelace&name=ignored"),
        );
        assert_eq!(scope.resolve(&p("request.vars.id")).unwrap(), json!("42"));
        assert_eq!(scope.resolve(&p("request.params.q")).unwrap(), json!("first"));
        assert_eq!(scope.resolve(&p("request.form.name")).unwrap(), json!("Ada Lovelace"));
        assert_eq!(
            scope.resolve(&p("request.params")).unwrap(),
            json!({"q": "first", "page": "2"})
        );
    }

    #[test]
    fn test_request_shadows_variable() {
        let mut scope = Scope::new().with_request(RequestScope::new());
        scope.set("request", json!({"vars": {"id": "from-variable"}}));
        assert!(matches!(
            scope.resolve(&p("request.vars.id")),
            Err(Error::UndefinedVariable(_))
        ));
    }

    #[test]
    fn test_variable_traversal() {
        let mut scope = Scope::new();
        scope.set("response", json!({"value": {"items": [{"id": 7}]}}));
        assert_eq!(scope.resolve(&p("response.value.items.0.id")).unwrap(), json!(7));
        let err = scope.resolve(&p("response.value.missing")).unwrap_err();
        match err {
            Error::UndefinedVariable(name) => assert_eq!(name, "response.value.missing"),
            other => panic!("Expected UndefinedVariable, got {:?}", other),
        }
    }

    #[test]
    fn test_request_namespace_absent_without_request() {
        let scope = Scope::new();
        assert!(matches!(
            scope.resolve(&p("request.params.q")),
            Err(Error::UndefinedVariable(_))
        ));
    }
}
