use indexmap::IndexMap;

use crate::ast::{self, Expression, LiteralKind};
use crate::stdlib;
use crate::value::{Number, Value, ValueError};

use super::diagnostic::Diagnostic;
use super::evaluator::Session;
use super::operator;
use super::scope::Scope;

/// Build the value of a literal from its source text.
pub fn literal(kind: LiteralKind, text: &str) -> Result<Value, String> {
    match kind {
        LiteralKind::Null => Ok(Value::Null),
        LiteralKind::Number => parse_int(text).map(Value::Number),
        LiteralKind::Float => text
            .replace('_', "")
            .parse::<f64>()
            .map(Value::from)
            .map_err(|e| format!("invalid float literal {text}: {e}")),
        LiteralKind::String => ast::unquote(text).map(Value::from),
        LiteralKind::Bool => Ok(Value::Bool(text == "true")),
    }
}

/// Integer literals: decimal, `0x`, `0o`, `0b`, a leading `0` for octal, and
/// `_` separators. Values past `i64::MAX` become unsigned.
fn parse_int(text: &str) -> Result<Number, String> {
    let digits = text.replace('_', "");
    let lower = digits.to_ascii_lowercase();
    let (radix, body) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };

    match i64::from_str_radix(body, radix) {
        Ok(value) => Ok(Number::int(value)),
        Err(_) => u64::from_str_radix(body, radix)
            .map(Number::uint)
            .map_err(|e| format!("invalid number literal {text}: {e}")),
    }
}

impl<'a> Session<'a> {
    /// Evaluate an expression, recording the produced value against it.
    pub(crate) fn evaluate_expr(&mut self, scope: Option<&Scope>, expr: &'a Expression) -> Result<Value, Diagnostic> {
        let value = self.nested(expr.span(), |session| session.evaluate_node(scope, expr))?;
        self.associate(&value, expr);
        Ok(value)
    }

    fn evaluate_node(&mut self, scope: Option<&Scope>, expr: &'a Expression) -> Result<Value, Diagnostic> {
        match expr {
            Expression::Literal { kind, text, span } => {
                literal(*kind, text).map_err(|message| Diagnostic::new(*span, message))
            }

            Expression::BinaryOp {
                op,
                left,
                right,
                span,
            } => {
                let left = self.evaluate_expr(scope, left)?;
                let right = self.evaluate_expr(scope, right)?;
                operator::binary(*op, &left, &right).map_err(|e| Diagnostic::new(*span, e.to_string()))
            }

            Expression::UnaryOp { op, operand, span } => {
                let operand = self.evaluate_expr(scope, operand)?;
                operator::unary(*op, &operand).map_err(|e| Diagnostic::new(*span, e.to_string()))
            }

            Expression::Array { elements, .. } => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.evaluate_expr(scope, element)?);
                }
                Ok(Value::array(items))
            }

            Expression::Object { fields, .. } => {
                let mut entries = IndexMap::with_capacity(fields.len());
                for field in fields {
                    let value = self.evaluate_expr(scope, &field.value)?;
                    entries.insert(field.name.name.clone(), value);
                }
                Ok(Value::object(entries))
            }

            Expression::Identifier(ident) => {
                let found = match scope {
                    Some(scope) => scope.lookup(&ident.name),
                    None => stdlib::lookup(&ident.name),
                };
                found.ok_or_else(|| {
                    Diagnostic::new(ident.span, format!("identifier {:?} does not exist", ident.name))
                })
            }

            Expression::Access { value, name } => {
                let target = self.evaluate_expr(scope, value)?;
                match &target {
                    Value::Object(object) => object.get(&name.name).cloned().ok_or_else(|| {
                        Diagnostic::new(name.span, format!("field {:?} does not exist", name.name))
                    }),
                    other => Err(Diagnostic::new(
                        name.span,
                        format!(
                            "cannot access field {:?} on value of type {}",
                            name.name,
                            other.describe()
                        ),
                    )),
                }
            }

            Expression::Index { value, index, span } => {
                let target = self.evaluate_expr(scope, value)?;
                let key = self.evaluate_expr(scope, index)?;
                self.index(&target, &key, index, *span)
            }

            Expression::FunctionCall {
                function,
                arguments,
                span,
            } => {
                let callee = self.evaluate_expr(scope, function)?;
                if !matches!(callee, Value::Function(_)) {
                    return Err(Diagnostic::new(
                        *span,
                        format!("expected value of type function, got {}", callee.describe()),
                    ));
                }
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate_expr(scope, argument)?);
                }
                callee.call(&args).map_err(|err| match &err {
                    ValueError::Argument { index, .. } => self.decorate(&err, arguments.get(*index)),
                    _ => Diagnostic::new(*span, err.to_string()),
                })
            }

            Expression::Paren { inner, .. } => self.evaluate_expr(scope, inner),
        }
    }

    fn index(
        &self,
        target: &Value,
        key: &Value,
        index_expr: &Expression,
        span: ast::Span,
    ) -> Result<Value, Diagnostic> {
        match target {
            Value::Array(array) => {
                let Value::Number(n) = key else {
                    return Err(Diagnostic::new(
                        span,
                        format!("expected value of type number, got {}", key.describe()),
                    ));
                };
                let i = n.as_i64();
                usize::try_from(i)
                    .ok()
                    .and_then(|i| array.get(i).cloned())
                    .ok_or_else(|| {
                        Diagnostic::new(
                            span,
                            format!("index {i} is out of range of array with length {}", array.len()),
                        )
                    })
            }
            Value::Object(object) => {
                let Value::String(name) = key else {
                    return Err(Diagnostic::new(
                        span,
                        format!("expected value of type string, got {}", key.describe()),
                    ));
                };
                object.get(name).cloned().ok_or_else(|| {
                    Diagnostic::new(index_expr.span(), format!("field {:?} does not exist", name.as_ref()))
                })
            }
            other => Err(Diagnostic::new(
                span,
                format!("expected object or array, got {}", other.describe()),
            )),
        }
    }
}
