//! Structural comparison of parsed entities

use std::fmt;

use serde_json::Value;

use super::Diagnostic;

/// How an entity is parsed for semantic comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityFormat {
    Json,
    Yaml,
    Text,
}

impl EntityFormat {
    /// Resolve a format from a declared tag, falling back to a content type
    ///
    /// With neither available the entity is treated as JSON.
    pub fn resolve(tag: Option<&str>, content_type: Option<&str>) -> Result<Self, String> {
        match tag.map(str::trim).filter(|t| !t.is_empty()) {
            Some(tag) => Self::from_tag(tag).ok_or_else(|| format!("unsupported format '{}'", tag)),
            None => Ok(content_type.and_then(Self::from_tag).unwrap_or(Self::Json)),
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        match tag.as_str() {
            "json" | "application/json" => Some(Self::Json),
            "yaml" | "yml" | "application/yaml" | "application/x-yaml" | "text/yaml" => {
                Some(Self::Yaml)
            }
            "text" | "text/plain" => Some(Self::Text),
            t if t.ends_with("+json") => Some(Self::Json),
            _ => None,
        }
    }

    /// Content type sent with a request entity declared in this format
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Yaml => "application/yaml",
            Self::Text => "text/plain; charset=utf-8",
        }
    }

    /// Parse an entity into a structured value
    pub fn parse(self, entity: &str) -> Result<Value, String> {
        match self {
            Self::Json => serde_json::from_str(entity).map_err(|e| e.to_string()),
            Self::Yaml => {
                let value: serde_yaml::Value =
                    serde_yaml::from_str(entity).map_err(|e| e.to_string())?;
                serde_json::to_value(value).map_err(|e| e.to_string())
            }
            Self::Text => Ok(Value::String(entity.trim().to_string())),
        }
    }
}

impl fmt::Display for EntityFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// Record every structural difference between two values
pub fn diff(path: &str, expected: &Value, actual: &Value, out: &mut Vec<Diagnostic>) {
    match (expected, actual) {
        (Value::Object(e), Value::Object(a)) => {
            for (key, ev) in e {
                let child = format!("{}/{}", path, key);
                match a.get(key) {
                    Some(av) => diff(&child, ev, av, out),
                    None => out.push(Diagnostic::value(child, "missing in actual entity")),
                }
            }
            for key in a.keys().filter(|k| !e.contains_key(*k)) {
                out.push(Diagnostic::value(
                    format!("{}/{}", path, key),
                    "unexpected in actual entity",
                ));
            }
        }
        (Value::Array(e), Value::Array(a)) => {
            if e.len() != a.len() {
                out.push(Diagnostic::value(
                    display_path(path),
                    format!("expected {} element(s), got {}", e.len(), a.len()),
                ));
            }
            for (i, (ev, av)) in e.iter().zip(a.iter()).enumerate() {
                diff(&format!("{}/{}", path, i), ev, av, out);
            }
        }
        (Value::Number(e), Value::Number(a)) => {
            let equal = match (e.as_i64(), a.as_i64()) {
                (Some(x), Some(y)) => x == y,
                _ => e.as_f64() == a.as_f64(),
            };
            if !equal {
                out.push(mismatch(path, expected, actual));
            }
        }
        (e, a) if e == a => {}
        _ => out.push(mismatch(path, expected, actual)),
    }
}

fn mismatch(path: &str, expected: &Value, actual: &Value) -> Diagnostic {
    Diagnostic::value(
        display_path(path),
        format!("expected {}, got {}", expected, actual),
    )
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}
