//! Template and expression parsing
//!
//! Templates are plain text with embedded `${expr}` expressions; `\${` emits a
//! literal `${`. Expressions are a path (`request.vars.id`, `token`), a
//! literal (`"text"`, `'text'`, `12`, `1.5`, `true`, `false`, `null`) or a
//! call to a helper (`std.upper(request.params.q)`).

use serde_json::{Number, Value};

use crate::common::{Error, Result};

/// Namespace holding the helper functions
pub const STD_NAMESPACE: &str = "std";

/// A parsed expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(Vec<String>),
    Call { function: String, args: Vec<Expr> },
}

/// A piece of a parsed template
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Expr(Expr),
}

/// Split a template into text and expression segments
pub fn parse_template(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let bytes = template.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if template[i..].starts_with("\\${") {
            text.push_str("${");
            i += 3;
        } else if template[i..].starts_with("${") {
            let start = i + 2;
            let end = find_closing(template, start)?;
            if !text.is_empty() {
                segments.push(Segment::Text(std::mem::take(&mut text)));
            }
            segments.push(Segment::Expr(parse_expression_at(
                &template[start..end],
                start,
            )?));
            i = end + 1;
        } else {
            let ch = template[i..].chars().next().unwrap_or_default();
            text.push(ch);
            i += ch.len_utf8().max(1);
        }
    }

    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

/// Parse a bare expression
pub fn parse_expression(source: &str) -> Result<Expr> {
    parse_expression_at(source, 0)
}

/// Find the `}` closing an expression that starts at `start`, skipping quoted strings
fn find_closing(template: &str, start: usize) -> Result<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (offset, ch) in template[start..].char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '}' => return Ok(start + offset),
                _ => {}
            },
        }
    }
    Err(Error::parse(start - 2, "unterminated expression, expected '}'"))
}

fn parse_expression_at(source: &str, base: usize) -> Result<Expr> {
    let mut parser = Parser {
        src: source,
        pos: 0,
        base,
    };
    parser.skip_ws();
    if parser.peek().is_none() {
        return Err(parser.error("empty expression"));
    }
    let expr = parser.expr()?;
    parser.skip_ws();
    if parser.peek().is_some() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    /// Offset of `src` within the whole template, for error reporting
    base: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn error(&self, message: &str) -> Error {
        Error::parse(self.base + self.pos, message)
    }

    fn expr(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(q @ ('"' | '\'')) => self.string(q),
            Some(c) if c.is_ascii_digit() || c == '-' => self.number(),
            Some(c) if is_ident_start(c) => self.path_or_call(),
            Some(c) => Err(self.error(&format!("unexpected character '{}'", c))),
            None => Err(self.error("expected an expression")),
        }
    }

    fn string(&mut self, quote: char) -> Result<Expr> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(c) => out.push(c),
                    None => break,
                },
                Some(c) if c == quote => return Ok(Expr::Literal(Value::String(out))),
                Some(c) => out.push(c),
                None => break,
            }
        }
        Err(Error::parse(self.base + start, "unterminated string literal"))
    }

    fn number(&mut self) -> Result<Expr> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.bump();
        }
        let text = &self.src[start..self.pos];
        let number = if text.contains('.') {
            text.parse::<f64>().ok().and_then(Number::from_f64)
        } else {
            text.parse::<i64>().ok().map(Number::from)
        };
        number
            .map(|n| Expr::Literal(Value::Number(n)))
            .ok_or_else(|| Error::parse(self.base + start, format!("invalid number '{}'", text)))
    }

    fn ident(&mut self) -> Result<String> {
        let start = self.pos;
        match self.peek() {
            Some(c) if is_ident_start(c) || c.is_ascii_digit() => {
                self.bump();
            }
            _ => return Err(self.error("expected an identifier")),
        }
        while self.peek().is_some_and(is_ident_char) {
            self.bump();
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn path_or_call(&mut self) -> Result<Expr> {
        let start = self.pos;
        let mut path = vec![self.ident()?];
        while self.peek() == Some('.') {
            self.bump();
            path.push(self.ident()?);
        }

        self.skip_ws();
        if self.peek() == Some('(') {
            if path.len() != 2 || path[0] != STD_NAMESPACE {
                return Err(Error::parse(
                    self.base + start,
                    format!("'{}' is not callable; only std functions may be called", path.join(".")),
                ));
            }
            self.bump();
            let args = self.args()?;
            return Ok(Expr::Call {
                function: path.remove(1),
                args,
            });
        }

        if path.len() == 1 {
            match path[0].as_str() {
                "true" => return Ok(Expr::Literal(Value::Bool(true))),
                "false" => return Ok(Expr::Literal(Value::Bool(false))),
                "null" => return Ok(Expr::Literal(Value::Null)),
                _ => {}
            }
        }
        if path[0] == STD_NAMESPACE {
            return Err(Error::parse(
                self.base + start,
                format!("'{}' is a function and must be called", path.join(".")),
            ));
        }
        Ok(Expr::Path(path))
    }

    fn args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        self.skip_ws();
        if self.peek() == Some(')') {
            self.bump();
            return Ok(args);
        }
        loop {
            self.skip_ws();
            args.push(self.expr()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(')') => return Ok(args),
                _ => return Err(self.error("expected ',' or ')' in argument list")),
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(parts: &[&str]) -> Expr {
        Expr::Path(parts.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_plain_text() {
        let segments = parse_template("no expressions here").unwrap();
        assert_eq!(segments, vec![Segment::Text("no expressions here".into())]);
    }

    #[test]
    fn test_mixed_template() {
        let segments = parse_template("id=${request.vars.id}&q=${ q }").unwrap();
        assert_eq!(
            segments,
            vec![
                Segment::Text("id=".into()),
                Segment::Expr(path(&["request", "vars", "id"])),
                Segment::Text("&q=".into()),
                Segment::Expr(path(&["q"])),
            ]
        );
    }

    #[test]
    fn test_escaped_marker() {
        let segments = parse_template(r"cost: \${price}").unwrap();
        assert_eq!(segments, vec![Segment::Text("cost: ${price}".into())]);
    }

    #[test]
    fn test_call_with_literal_containing_brace() {
        let segments = parse_template(r#"${std.concat("}", 'x', 3, 1.5, true)}"#).unwrap();
        match &segments[0] {
            Segment::Expr(Expr::Call { function, args }) => {
                assert_eq!(function, "concat");
                assert_eq!(args.len(), 5);
                assert_eq!(args[0], Expr::Literal(Value::String("}".into())));
                assert_eq!(args[2], Expr::Literal(Value::from(3)));
                assert_eq!(args[4], Expr::Literal(Value::Bool(true)));
            }
            other => panic!("Expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_array_index_segment() {
        let expr = parse_expression("response.value.items.0.id").unwrap();
        assert_eq!(expr, path(&["response", "value", "items", "0", "id"]));
    }

    #[test]
    fn test_unterminated_expression() {
        let err = parse_template("abc ${request.vars.id").unwrap_err();
        match err {
            Error::Parse { offset, .. } => assert_eq!(offset, 4),
            other => panic!("Expected Parse, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_expressions() {
        for source in ["${}", "${a b}", "${a.}", "${foo(1)}", "${std.upper}", "${std.upper(1,}", "${'open}"] {
            assert!(
                matches!(parse_template(source), Err(Error::Parse { .. })),
                "{} should fail to parse",
                source
            );
        }
    }
}
