//! Expression interpolation
//!
//! Shared by the mock router (response templates) and the runner (request
//! templates and output variables). Evaluation is pure: a template and a
//! scope go in, text comes out.

mod parser;
mod scope;
mod stdlib;

pub use parser::{parse_expression, parse_template, Expr, Segment};
pub use scope::{RequestScope, Scope};
pub use stdlib::{stdlib, Stdlib};

use serde_json::Value;

use crate::common::Result;

/// Expand every `${...}` expression in a template
pub fn interpolate(template: &str, scope: &Scope) -> Result<String> {
    if !template.contains("${") {
        return Ok(template.to_string());
    }
    let mut out = String::with_capacity(template.len());
    for segment in parse_template(template)? {
        match segment {
            Segment::Text(text) => out.push_str(&text),
            Segment::Expr(expr) => out.push_str(&render(&eval(&expr, scope)?)),
        }
    }
    Ok(out)
}

/// Evaluate a bare expression to a value
pub fn evaluate(source: &str, scope: &Scope) -> Result<Value> {
    eval(&parse_expression(source)?, scope)
}

/// Evaluate an output-variable binding
///
/// A binding containing `${` is a template and yields text; anything else is
/// a bare expression and keeps the type of the value it selects.
pub fn bind(source: &str, scope: &Scope) -> Result<Value> {
    if source.contains("${") {
        interpolate(source, scope).map(Value::String)
    } else {
        evaluate(source, scope)
    }
}

fn eval(expr: &Expr, scope: &Scope) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Path(path) => scope.resolve(path),
        Expr::Call { function, args } => {
            let args = args
                .iter()
                .map(|arg| eval(arg, scope))
                .collect::<Result<Vec<_>>>()?;
            stdlib().call(function, &args)
        }
    }
}

/// Render a value as template text
///
/// Strings are emitted unquoted and null as nothing; everything else uses its
/// JSON form.
pub fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Error;
    use serde_json::json;

    fn request_scope() -> Scope {
        Scope::new().with_request(
            RequestScope::new()
                .with_vars([("id".to_string(), "17".to_string())])
                .with_query("name=ada"),
        )
    }

    #[test]
    fn test_interpolate_request_values() {
        let out = interpolate(
            r#"{"id": ${request.vars.id}, "name": "${std.upper(request.params.name)}"}"#,
            &request_scope(),
        )
        .unwrap();
        assert_eq!(out, r#"{"id": 17, "name": "ADA"}"#);
    }

    #[test]
    fn test_interpolate_without_expressions_is_identity() {
        let out = interpolate("plain {text}", &Scope::new()).unwrap();
        assert_eq!(out, "plain {text}");
    }

    #[test]
    fn test_undefined_variable() {
        let err = interpolate("${request.vars.missing}", &request_scope()).unwrap_err();
        assert!(matches!(err, Error::UndefinedVariable(name) if name == "request.vars.missing"));
    }

    #[test]
    fn test_parse_error() {
        let err = interpolate("${request.vars.id", &request_scope()).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_render_values() {
        assert_eq!(render(&json!(null)), "");
        assert_eq!(render(&json!("s")), "s");
        assert_eq!(render(&json!(1.5)), "1.5");
        assert_eq!(render(&json!([1, "a"])), r#"[1,"a"]"#);
    }

    #[test]
    fn test_bind_keeps_types() {
        let mut scope = Scope::new();
        scope.set("response", json!({"value": {"count": 3}}));
        assert_eq!(bind("response.value.count", &scope).unwrap(), json!(3));
        assert_eq!(
            bind("n=${response.value.count}", &scope).unwrap(),
            json!("n=3")
        );
    }
}
