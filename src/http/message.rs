//! HTTP exchange types
//!
//! Transport-neutral request/response values passed between the runner, the
//! client and the comparison engine.

use serde_json::{Map, Value};

/// A fully resolved request, ready to send
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub entity: String,
}

impl HttpRequest {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A response as received from the target
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub entity: String,
}

impl HttpResponse {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// The value exposed to output-variable expressions as `response`
    ///
    /// `value` holds the entity parsed as JSON, or null when it is not JSON.
    pub fn to_scope_value(&self) -> Value {
        let headers: Map<String, Value> = self
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        let parsed = serde_json::from_str::<Value>(&self.entity).unwrap_or(Value::Null);

        let mut map = Map::new();
        map.insert("status".into(), Value::from(self.status));
        map.insert("headers".into(), Value::Object(headers));
        map.insert("entity".into(), Value::String(self.entity.clone()));
        map.insert("value".into(), parsed);
        Value::Object(map)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
