//! Positioned evaluation errors.
//!
//! Value errors from the decode engine know which [`Value`] failed but not
//! where it came from. [`decorate`] walks the error chain and uses the
//! association map kept during evaluation to find the syntax node behind the
//! most specific value it can, rendering messages like
//! `{ a = true }.a should be number, got bool`.

use std::fmt;

use crate::ast::{self, Expression, Span};
use crate::value::{Value, ValueError};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Diagnostic {
    pub span: Option<Span>,
    /// Source text of the node the error was attributed to.
    pub snippet: Option<String>,
    /// Access path below the snippet, e.g. `.tls[0]`.
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    /// A diagnostic at `span`. Spans without position degrade to
    /// message-only.
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span: span.is_valid().then_some(span),
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn is_positioned(&self) -> bool {
        self.span.is_some()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some(span) => write!(f, "{}:{}: {}", span.start.line, span.start.column, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for Diagnostic {}

fn push_field(path: &mut String, field: &str) {
    if ast::is_identifier(field) {
        path.push('.');
        path.push_str(field);
    } else {
        path.push_str(&format!("[{}]", ast::quote(field)));
    }
}

/// Rewrite a value error into a diagnostic.
///
/// `root` is the node that produced the outermost value of the chain, used
/// when `lookup` has nothing better: scalars are not tracked by identity.
pub(crate) fn decorate<'e>(
    err: &ValueError,
    root: Option<&'e Expression>,
    lookup: impl Fn(&Value) -> Option<&'e Expression>,
) -> Diagnostic {
    let mut node = root;
    let mut path = String::new();
    let mut link = err;
    loop {
        if let Some(found) = lookup(link.value()) {
            node = Some(found);
            path.clear();
        }
        match link {
            ValueError::Element { index, inner, .. } => {
                path.push_str(&format!("[{index}]"));
                link = inner;
            }
            ValueError::Field { field, inner, .. } => {
                push_field(&mut path, field);
                link = inner;
            }
            // the inner error refers to the argument itself
            ValueError::Argument { inner, .. } => link = inner,
            _ => break,
        }
    }

    let Some(node) = node else {
        return Diagnostic {
            path,
            ..Diagnostic::message(link.to_string())
        };
    };

    let snippet = node.to_string();
    let message = match link {
        ValueError::Type {
            value, expected, ..
        } => format!("{snippet}{path} should be {expected}, got {}", value.describe()),
        ValueError::MissingKey { missing, .. } => {
            format!("{snippet}{path} does not have field named {missing:?}")
        }
        other => format!("{snippet}{path}: {other}"),
    };
    Diagnostic {
        snippet: Some(snippet),
        path,
        ..Diagnostic::new(node.span(), message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Pos;
    use crate::value::Type;
    use pretty_assertions::assert_eq;

    fn span(column: usize) -> Span {
        Span::new(Pos::new(column - 1, 1, column), Pos::new(column + 3, 1, column + 4))
    }

    #[test]
    fn test_display() {
        let positioned = Diagnostic::new(span(5), "boom");
        assert_eq!(positioned.to_string(), "1:5: boom");
        assert_eq!(Diagnostic::message("boom").to_string(), "boom");
        assert!(!Diagnostic::new(Span::default(), "x").is_positioned());
    }

    #[test]
    fn test_decorate_with_root_node() {
        let object = Value::from_entries([("a", Value::from(true))]);
        let err = ValueError::field(
            &object,
            "a",
            ValueError::type_mismatch(&Value::from(true), Type::Number),
        );
        let expr = Expression::object(vec![("a", Expression::bool(true))]).with_span(span(1));
        let diagnostic = decorate(&err, Some(&expr), |_| None);
        assert_eq!(diagnostic.message, "{ a = true }.a should be number, got bool");
        assert_eq!(diagnostic.path, ".a");
        assert_eq!(diagnostic.to_string(), "1:1: { a = true }.a should be number, got bool");
    }

    #[test]
    fn test_decorate_prefers_deepest_known_node() {
        let inner = Value::from_entries([("b", Value::from(1i64))]);
        let outer = Value::from_entries([("a", inner.clone())]);
        let err = ValueError::field(&outer, "a", ValueError::missing_key(&inner, "b"));
        let inner_expr = Expression::ident("nested").with_span(span(9));
        let diagnostic = decorate(&err, None, |value| match value {
            Value::Object(_) if value == &inner => Some(&inner_expr),
            _ => None,
        });
        assert_eq!(diagnostic.message, r#"nested does not have field named "b""#);
        assert_eq!(diagnostic.span, Some(span(9)));
    }

    #[test]
    fn test_decorate_without_nodes_is_message_only() {
        let array = Value::array(vec![Value::from("x")]);
        let err = ValueError::element(
            &array,
            0,
            ValueError::type_mismatch(&Value::from("x"), Type::Bool),
        );
        let diagnostic = decorate(&err, None, |_| None);
        assert_eq!(diagnostic.to_string(), "expected bool, got string");
        assert_eq!(diagnostic.path, "[0]");
    }

    #[test]
    fn test_quoted_field_path() {
        let object = Value::from_entries([("with space", Value::Null)]);
        let err = ValueError::field(
            &object,
            "with space",
            ValueError::wrapped(&Value::Null, "bad"),
        );
        let expr = Expression::ident("obj");
        let diagnostic = decorate(&err, Some(&expr), |_| None);
        assert_eq!(diagnostic.message, r#"obj["with space"]: bad"#);
    }
}
