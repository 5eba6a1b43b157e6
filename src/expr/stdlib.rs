//! Helper functions available under `std`
//!
//! The library is built once and shared read-only by every evaluation.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use base64::Engine as _;
use serde_json::Value;

use super::render;
use crate::common::{Error, Result};

type Function = fn(&[Value]) -> std::result::Result<Value, String>;

/// The immutable helper function table
pub struct Stdlib {
    functions: BTreeMap<&'static str, Function>,
}

static STDLIB: OnceLock<Stdlib> = OnceLock::new();

/// Get the shared helper library
pub fn stdlib() -> &'static Stdlib {
    STDLIB.get_or_init(Stdlib::build)
}

impl Stdlib {
    fn build() -> Self {
        let mut functions: BTreeMap<&'static str, Function> = BTreeMap::new();
        functions.insert("upper", upper);
        functions.insert("lower", lower);
        functions.insert("trim", trim);
        functions.insert("len", len);
        functions.insert("concat", concat);
        functions.insert("default", default);
        functions.insert("base64", encode_base64);
        functions.insert("unbase64", decode_base64);
        functions.insert("urlencode", urlencode);
        functions.insert("json", json);
        functions.insert("now", now);
        functions.insert("uuid", uuid);
        Self { functions }
    }

    /// Call a helper by name
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| Error::UndefinedVariable(format!("std.{}", name)))?;
        function(args).map_err(|message| Error::function(name, message))
    }
}

fn arity(args: &[Value], expected: usize) -> std::result::Result<(), String> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(format!("expected {} argument(s), got {}", expected, args.len()))
    }
}

fn unary_text(args: &[Value]) -> std::result::Result<String, String> {
    arity(args, 1)?;
    Ok(render(&args[0]))
}

fn upper(args: &[Value]) -> std::result::Result<Value, String> {
    Ok(Value::String(unary_text(args)?.to_uppercase()))
}

fn lower(args: &[Value]) -> std::result::Result<Value, String> {
    Ok(Value::String(unary_text(args)?.to_lowercase()))
}

fn trim(args: &[Value]) -> std::result::Result<Value, String> {
    Ok(Value::String(unary_text(args)?.trim().to_string()))
}

fn len(args: &[Value]) -> std::result::Result<Value, String> {
    arity(args, 1)?;
    let n = match &args[0] {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::Null => 0,
        other => render(other).chars().count(),
    };
    Ok(Value::from(n))
}

fn concat(args: &[Value]) -> std::result::Result<Value, String> {
    Ok(Value::String(args.iter().map(render).collect()))
}

fn default(args: &[Value]) -> std::result::Result<Value, String> {
    arity(args, 2)?;
    match &args[0] {
        Value::Null => Ok(args[1].clone()),
        Value::String(s) if s.is_empty() => Ok(args[1].clone()),
        other => Ok(other.clone()),
    }
}

fn encode_base64(args: &[Value]) -> std::result::Result<Value, String> {
    let text = unary_text(args)?;
    Ok(Value::String(
        base64::engine::general_purpose::STANDARD.encode(text.as_bytes()),
    ))
}

fn decode_base64(args: &[Value]) -> std::result::Result<Value, String> {
    let text = unary_text(args)?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(text.trim())
        .map_err(|e| e.to_string())?;
    String::from_utf8(bytes)
        .map(Value::String)
        .map_err(|_| "decoded data is not valid UTF-8".to_string())
}

fn urlencode(args: &[Value]) -> std::result::Result<Value, String> {
    let text = unary_text(args)?;
    Ok(Value::String(
        url::form_urlencoded::byte_serialize(text.as_bytes()).collect(),
    ))
}

fn json(args: &[Value]) -> std::result::Result<Value, String> {
    arity(args, 1)?;
    serde_json::to_string(&args[0])
        .map(Value::String)
        .map_err(|e| e.to_string())
}

fn now(args: &[Value]) -> std::result::Result<Value, String> {
    arity(args, 0)?;
    Ok(Value::String(chrono::Utc::now().to_rfc3339()))
}

fn uuid(args: &[Value]) -> std::result::Result<Value, String> {
    arity(args, 0)?;
    Ok(Value::String(uuid::Uuid::new_v4().to_string()))
}
