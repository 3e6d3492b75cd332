use core::fmt;

use strum::Display;

// ソース上の位置
// line が 0 の場合は位置情報なし
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pos {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Self {
            offset,
            line,
            column,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.line > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Pos,
    pub end: Pos,
}

impl Span {
    pub fn new(start: Pos, end: Pos) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start.is_valid()
    }

    /// Smallest span covering both.
    pub fn to(self, other: Span) -> Span {
        match (self.is_valid(), other.is_valid()) {
            (true, true) => Span::new(self.start, other.end),
            (true, false) => self,
            _ => other,
        }
    }
}

// ファイル全体
#[derive(Debug, Clone, PartialEq, Default)]
pub struct File {
    pub name: String,
    pub body: Body,
}

pub type Body = Vec<Statement>;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Attribute(AttributeStatement),
    Block(BlockStatement),
}

// name = value
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeStatement {
    pub name: Ident,
    pub value: Expression,
}

// name.part "label" { body }
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockStatement {
    pub name: Vec<String>,
    pub name_span: Span,
    pub label: Option<String>,
    pub label_span: Span,
    pub body: Body,
    pub span: Span,
}

impl BlockStatement {
    pub fn full_name(&self) -> String {
        self.name.join(".")
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            span: Span::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Null,
    Number,
    Float,
    String,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BinaryOperator {
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "==")]
    Equal,
    #[strum(serialize = "!=")]
    NotEqual,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "<=")]
    LessThanEqual,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = ">=")]
    GreaterThanEqual,
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Subtract,
    #[strum(serialize = "*")]
    Multiply,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "%")]
    Modulo,
    #[strum(serialize = "^")]
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum UnaryOperator {
    #[strum(serialize = "!")]
    Not,
    #[strum(serialize = "-")]
    Negate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectField {
    pub name: Ident,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// `text` is the literal as written, quotes included for strings.
    Literal {
        kind: LiteralKind,
        text: String,
        span: Span,
    },
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
        span: Span,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expression>,
        span: Span,
    },
    Array {
        elements: Vec<Expression>,
        span: Span,
    },
    Object {
        fields: Vec<ObjectField>,
        span: Span,
    },
    Identifier(Ident),
    Access {
        value: Box<Expression>,
        name: Ident,
    },
    Index {
        value: Box<Expression>,
        index: Box<Expression>,
        span: Span,
    },
    FunctionCall {
        function: Box<Expression>,
        arguments: Vec<Expression>,
        span: Span,
    },
    Paren {
        inner: Box<Expression>,
        span: Span,
    },
}

// 組み立て用ヘルパー
impl Expression {
    fn literal(kind: LiteralKind, text: impl Into<String>) -> Self {
        Expression::Literal {
            kind,
            text: text.into(),
            span: Span::default(),
        }
    }

    pub fn null() -> Self {
        Self::literal(LiteralKind::Null, "null")
    }

    pub fn number(value: i64) -> Self {
        Self::literal(LiteralKind::Number, value.to_string())
    }

    /// A number literal spelled exactly as given, e.g. `0x1F`.
    pub fn number_text(text: impl Into<String>) -> Self {
        Self::literal(LiteralKind::Number, text)
    }

    pub fn float(value: f64) -> Self {
        let text = if value.fract() == 0.0 && value.is_finite() {
            format!("{value:.1}")
        } else {
            value.to_string()
        };
        Self::literal(LiteralKind::Float, text)
    }

    pub fn string(value: &str) -> Self {
        Self::literal(LiteralKind::String, quote(value))
    }

    pub fn bool(value: bool) -> Self {
        Self::literal(LiteralKind::Bool, value.to_string())
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Expression::Identifier(Ident::new(name))
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: Span::default(),
        }
    }

    pub fn unary(op: UnaryOperator, operand: Expression) -> Self {
        Expression::UnaryOp {
            op,
            operand: Box::new(operand),
            span: Span::default(),
        }
    }

    pub fn array(elements: Vec<Expression>) -> Self {
        Expression::Array {
            elements,
            span: Span::default(),
        }
    }

    pub fn object<K: Into<String>>(fields: Vec<(K, Expression)>) -> Self {
        Expression::Object {
            fields: fields
                .into_iter()
                .map(|(name, value)| ObjectField {
                    name: Ident::new(name),
                    value,
                })
                .collect(),
            span: Span::default(),
        }
    }

    pub fn paren(inner: Expression) -> Self {
        Expression::Paren {
            inner: Box::new(inner),
            span: Span::default(),
        }
    }

    pub fn access(self, name: impl Into<String>) -> Self {
        Expression::Access {
            value: Box::new(self),
            name: Ident::new(name),
        }
    }

    pub fn index(self, index: Expression) -> Self {
        Expression::Index {
            value: Box::new(self),
            index: Box::new(index),
            span: Span::default(),
        }
    }

    pub fn call(self, arguments: Vec<Expression>) -> Self {
        Expression::FunctionCall {
            function: Box::new(self),
            arguments,
            span: Span::default(),
        }
    }

    /// Replace the node's own span. Access nodes take it on their name.
    pub fn with_span(mut self, new_span: Span) -> Self {
        match &mut self {
            Expression::Literal { span, .. }
            | Expression::BinaryOp { span, .. }
            | Expression::UnaryOp { span, .. }
            | Expression::Array { span, .. }
            | Expression::Object { span, .. }
            | Expression::Index { span, .. }
            | Expression::FunctionCall { span, .. }
            | Expression::Paren { span, .. } => *span = new_span,
            Expression::Identifier(ident) | Expression::Access { name: ident, .. } => {
                ident.span = new_span
            }
        }
        self
    }

    pub fn span(&self) -> Span {
        match self {
            Expression::Literal { span, .. }
            | Expression::BinaryOp { span, .. }
            | Expression::UnaryOp { span, .. }
            | Expression::Array { span, .. }
            | Expression::Object { span, .. }
            | Expression::Index { span, .. }
            | Expression::FunctionCall { span, .. }
            | Expression::Paren { span, .. } => *span,
            Expression::Identifier(ident) => ident.span,
            Expression::Access { value, name } => value.span().to(name.span),
        }
    }
}

impl Statement {
    pub fn attribute(name: impl Into<String>, value: Expression) -> Self {
        Statement::Attribute(AttributeStatement {
            name: Ident::new(name),
            value,
        })
    }

    /// A block; `name` may be dotted.
    pub fn block(name: &str, body: Body) -> Self {
        Statement::Block(BlockStatement {
            name: name.split('.').map(str::to_string).collect(),
            body,
            ..BlockStatement::default()
        })
    }

    pub fn labeled_block(name: &str, label: impl Into<String>, body: Body) -> Self {
        Statement::Block(BlockStatement {
            name: name.split('.').map(str::to_string).collect(),
            label: Some(label.into()),
            body,
            ..BlockStatement::default()
        })
    }

    pub fn span(&self) -> Span {
        match self {
            Statement::Attribute(attr) => attr.name.span.to(attr.value.span()),
            Statement::Block(block) => block.span,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal { text, .. } => write!(f, "{text}"),
            Expression::BinaryOp {
                op, left, right, ..
            } => write!(f, "{left} {op} {right}"),
            Expression::UnaryOp { op, operand, .. } => write!(f, "{op}{operand}"),
            Expression::Array { elements, .. } => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{element}")?;
                }
                write!(f, "]")
            }
            Expression::Object { fields, .. } => {
                if fields.is_empty() {
                    return write!(f, "{{}}");
                }
                write!(f, "{{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", object_key(&field.name.name), field.value)?;
                }
                write!(f, " }}")
            }
            Expression::Identifier(ident) => write!(f, "{}", ident.name),
            Expression::Access { value, name } => write!(f, "{value}.{}", name.name),
            Expression::Index { value, index, .. } => write!(f, "{value}[{index}]"),
            Expression::FunctionCall {
                function,
                arguments,
                ..
            } => {
                write!(f, "{function}(")?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                write!(f, ")")
            }
            Expression::Paren { inner, .. } => write!(f, "({inner})"),
        }
    }
}

/// Quote a string as a River string literal.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Object keys print bare when they are identifiers.
pub fn object_key(key: &str) -> String {
    if is_identifier(key) {
        key.to_string()
    } else {
        quote(key)
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, radix: u32, count: usize) -> Option<u32> {
    let mut value = 0u32;
    for _ in 0..count {
        let digit = chars.next()?.to_digit(radix)?;
        value = value.checked_mul(radix)?.checked_add(digit)?;
    }
    Some(value)
}

/// Interpret a quoted string literal, resolving escape sequences.
pub fn unquote(literal: &str) -> Result<String, String> {
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| format!("invalid string literal {literal}"))?;

    let invalid = || format!("invalid escape sequence in {literal}");
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = chars.next().ok_or_else(invalid)?;
        let decoded = match escaped {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'a' => '\u{07}',
            'b' => '\u{08}',
            'f' => '\u{0c}',
            'v' => '\u{0b}',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            'x' => take_digits(&mut chars, 16, 2)
                .and_then(char::from_u32)
                .ok_or_else(invalid)?,
            'u' => take_digits(&mut chars, 16, 4)
                .and_then(char::from_u32)
                .ok_or_else(invalid)?,
            'U' => take_digits(&mut chars, 16, 8)
                .and_then(char::from_u32)
                .ok_or_else(invalid)?,
            first @ '0'..='7' => {
                let rest = take_digits(&mut chars, 8, 2).ok_or_else(invalid)?;
                let value = (first as u32 - '0' as u32) * 64 + rest;
                if value > 0xff {
                    return Err(invalid());
                }
                char::from_u32(value).ok_or_else(invalid)?
            }
            _ => return Err(invalid()),
        };
        out.push(decoded);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display() {
        let expr = Expression::binary(
            BinaryOperator::Add,
            Expression::number(3),
            Expression::binary(
                BinaryOperator::Multiply,
                Expression::number(5),
                Expression::number(2),
            ),
        );
        assert_eq!(expr.to_string(), "3 + 5 * 2");

        let expr = Expression::object(vec![("a", Expression::string("x"))])
            .access("a")
            .index(Expression::number(0));
        assert_eq!(expr.to_string(), r#"{ a = "x" }.a[0]"#);

        let call = Expression::ident("concat").call(vec![Expression::array(vec![]), Expression::null()]);
        assert_eq!(call.to_string(), "concat([], null)");
    }

    #[test]
    fn test_quote_and_unquote() {
        let text = "line\n\t\"quoted\" \\";
        assert_eq!(unquote(&quote(text)).unwrap(), text);
        assert_eq!(unquote(r#""\x41é\101""#).unwrap(), "AéA");
        assert!(unquote(r#""\q""#).is_err());
        assert!(unquote("noquotes").is_err());
    }

    #[test]
    fn test_object_keys() {
        assert_eq!(object_key("name"), "name");
        assert_eq!(object_key("with space"), r#""with space""#);
        assert_eq!(object_key("1st"), r#""1st""#);
    }

    #[test]
    fn test_spans() {
        let start = Span::new(Pos::new(0, 1, 1), Pos::new(3, 1, 4));
        let expr = Expression::ident("foo").with_span(start);
        let access = expr.access("bar").with_span(Span::new(Pos::new(4, 1, 5), Pos::new(7, 1, 8)));
        assert_eq!(access.span(), Span::new(Pos::new(0, 1, 1), Pos::new(7, 1, 8)));
        assert!(!Expression::null().span().is_valid());
    }
}
