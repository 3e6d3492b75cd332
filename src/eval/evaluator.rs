use std::collections::HashMap;

use tracing::debug;

use crate::ast::{BlockStatement, Body, Expression, File, Span};
use crate::config::EvalConfig;
use crate::value::{decode, HookError, HostValue, Value, ValueError};

use super::diagnostic::{self, Diagnostic};
use super::scope::Scope;

/// What an [`Evaluator`] evaluates.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    File(File),
    Body(Body),
    Block(BlockStatement),
    Expression(Expression),
}

impl Node {
    fn kind(&self) -> &'static str {
        match self {
            Node::File(_) => "file",
            Node::Body(_) => "body",
            Node::Block(_) => "block",
            Node::Expression(_) => "expression",
        }
    }
}

impl From<File> for Node {
    fn from(file: File) -> Self {
        Node::File(file)
    }
}

impl From<Body> for Node {
    fn from(body: Body) -> Self {
        Node::Body(body)
    }
}

impl From<BlockStatement> for Node {
    fn from(block: BlockStatement) -> Self {
        Node::Block(block)
    }
}

impl From<Expression> for Node {
    fn from(expr: Expression) -> Self {
        Node::Expression(expr)
    }
}

/// Evaluates one syntax tree node into host values.
///
/// Expressions are evaluated and decoded into the target. Files, bodies and
/// blocks are decoded statement by statement into a record. An evaluator can
/// be reused with different scopes and targets.
#[derive(Debug, Clone)]
pub struct Evaluator {
    node: Node,
    config: EvalConfig,
}

impl Evaluator {
    pub fn new(node: impl Into<Node>) -> Self {
        Self {
            node: node.into(),
            config: EvalConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Top level entry point: evaluate the node into `target`.
    ///
    /// # Panics
    ///
    /// When a file, body or block is evaluated into something that is not a
    /// record, or a record's field tags are malformed.
    #[tracing::instrument(level = "debug", skip_all, fields(node = self.node.kind()))]
    pub fn evaluate(&self, scope: Option<&Scope>, target: &mut dyn HostValue) -> Result<(), Diagnostic> {
        let mut session = Session::new(&self.config);
        let result = match &self.node {
            Node::File(file) => session.decode_block(scope, &file.body, None, target, true),
            Node::Body(body) => session.decode_block(scope, body, None, target, true),
            Node::Block(block) => session.decode_block(scope, &block.body, Some(block), target, true),
            Node::Expression(expr) => session
                .evaluate_expr(scope, expr)
                .and_then(|value| decode(&value, target).map_err(|e| session.decorate(&e, Some(expr)))),
        };
        if let Err(diagnostic) = &result {
            debug!(%diagnostic, "evaluation failed");
        }
        result
    }

    /// Evaluate into a fresh `T`.
    pub fn evaluate_into<T: HostValue + Default>(&self, scope: Option<&Scope>) -> Result<T, Diagnostic> {
        let mut out = T::default();
        self.evaluate(scope, &mut out)?;
        Ok(out)
    }
}

/// State of one `evaluate` call.
pub(crate) struct Session<'a> {
    config: &'a EvalConfig,
    // 値の同一性 → 最後にその値を生成したノード。
    // 値も保持して、解放済みアドレスが別の値に再利用されないようにする
    assoc: HashMap<usize, (Value, &'a Expression)>,
    depth: usize,
}

impl<'a> Session<'a> {
    pub(crate) fn new(config: &'a EvalConfig) -> Self {
        Self {
            config,
            assoc: HashMap::new(),
            depth: 0,
        }
    }

    /// Remember that `expr` produced `value`. Later writes win, so the
    /// outermost node producing a value is the one reported.
    pub(crate) fn associate(&mut self, value: &Value, expr: &'a Expression) {
        if !self.config.decorate_errors {
            return;
        }
        if let Some(identity) = value.identity() {
            self.assoc.insert(identity, (value.clone(), expr));
        }
    }

    pub(crate) fn decorate(&self, err: &ValueError, root: Option<&'a Expression>) -> Diagnostic {
        if !self.config.decorate_errors {
            return Diagnostic::message(err.to_string());
        }
        diagnostic::decorate(err, root, |value| {
            value
                .identity()
                .and_then(|identity| self.assoc.get(&identity))
                .map(|(_, expr)| *expr)
        })
    }

    /// Turn an error returned by a user hook into a diagnostic, positioned at
    /// `span` unless it already carries a better position.
    pub(crate) fn hook_diagnostic(&self, err: HookError, span: Span) -> Diagnostic {
        let err = match err.downcast::<Diagnostic>() {
            Ok(diagnostic) => return *diagnostic,
            Err(err) => err,
        };
        match err.downcast::<ValueError>() {
            Ok(value_error) => self.decorate(&value_error, None),
            Err(err) => Diagnostic::new(span, err.to_string()),
        }
    }

    /// Run `f` one nesting level deeper.
    pub(crate) fn nested<T>(
        &mut self,
        span: Span,
        f: impl FnOnce(&mut Self) -> Result<T, Diagnostic>,
    ) -> Result<T, Diagnostic> {
        if self.depth >= self.config.max_depth {
            return Err(Diagnostic::new(
                span,
                format!("maximum nesting depth of {} exceeded", self.config.max_depth),
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }
}
