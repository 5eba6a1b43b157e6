//! Ordered string bindings
//!
//! Headers, params and output variables are declared as YAML mappings whose
//! order matters (output variables are evaluated in declaration order) and
//! whose values may be written as bare scalars (`page: 2`).

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

/// An ordered list of unique `name -> text` pairs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings(Vec<(String, String)>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a binding, replacing an existing value in place
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Exact (case-sensitive) lookup
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bindings = Self::new();
        for (k, v) in iter {
            bindings.insert(k, v);
        }
        bindings
    }
}

/// Render a YAML scalar as the text it was written as
fn scalar_text(value: serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::Null => Some(String::new()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::String(s) => Some(s),
        _ => None,
    }
}

impl<'de> Deserialize<'de> for Bindings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BindingsVisitor;

        impl<'de> Visitor<'de> for BindingsVisitor {
            type Value = Bindings;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of names to scalar values")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Bindings, E> {
                Ok(Bindings::new())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Bindings, A::Error> {
                let mut bindings = Bindings::new();
                while let Some((name, value)) =
                    map.next_entry::<String, serde_yaml::Value>()?
                {
                    let text = scalar_text(value).ok_or_else(|| {
                        de::Error::custom(format!("value of '{}' must be a scalar", name))
                    })?;
                    if bindings.get(&name).is_some() {
                        return Err(de::Error::custom(format!("duplicate key '{}'", name)));
                    }
                    bindings.insert(name, text);
                }
                Ok(bindings)
            }
        }

        deserializer.deserialize_any(BindingsVisitor)
    }
}
