mod block;
pub mod diagnostic;
pub mod evaluator;
pub mod expression;
pub mod operator;
pub mod scope;

pub use diagnostic::Diagnostic;
pub use evaluator::{Evaluator, Node};
pub use operator::OperatorError;
pub use scope::Scope;

/// River Evaluator
///
/// Walks syntax tree nodes and writes what they describe into host values.
///
/// ## Expressions
/// - Literals, operators, arrays, objects, identifiers, field access,
///   indexing and calls evaluate to [`crate::Value`]s
/// - Identifiers resolve through the [`Scope`] chain, then the standard library
/// - The result is decoded into the target with the decode engine
///
/// ## Bodies and blocks
/// - Attribute statements are evaluated and decoded into attribute fields
/// - Block statements are decoded recursively into record, sequence, fixed
///   array and enum fields
/// - Uniqueness, labels and required fields are checked per body
/// - Unmarshal, default and validate hooks run around every record
///
/// ## Errors
/// Every failure is reported as one [`Diagnostic`]. Value errors raised while
/// decoding are traced back to the syntax node that produced the failing value.
pub fn evaluate_expression(
    expr: &crate::ast::Expression,
    scope: Option<&Scope>,
) -> Result<crate::Value, Diagnostic> {
    let config = crate::EvalConfig::default();
    let mut session = evaluator::Session::new(&config);
    session.evaluate_expr(scope, expr)
}
