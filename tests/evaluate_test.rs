use pretty_assertions::assert_eq;
use proptest::prelude::*;
use river::ast::{BinaryOperator, Expression, Pos, Span, Statement};
use river::eval::evaluate_expression;
use river::{Evaluator, Function, NumberKind, River, Scope, Value};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[ctor::ctor]
fn init_tests() {
    // tracing_subscriberの初期化
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[derive(River, Debug, Clone, Default, PartialEq)]
struct Person {
    #[river("age,attr")]
    age: i64,
}

#[derive(River, Debug, Clone, Default, PartialEq)]
struct Rule {
    #[river("action,attr,optional")]
    action: String,
}

#[derive(River, Debug, Clone, Default, PartialEq)]
struct Relabel {
    #[river("rule,block,optional")]
    rules: Vec<Rule>,
}

#[derive(River, Debug, Clone, Default, PartialEq)]
struct Endpoint {
    #[river("url,attr")]
    url: String,
    #[river("headers,attr,optional")]
    headers: std::collections::HashMap<String, String>,
}

#[derive(River, Debug, Clone, Default, PartialEq)]
struct Remote {
    #[river("endpoint,block")]
    endpoints: Vec<Endpoint>,
    #[river("timeout,attr,optional")]
    timeout: std::time::Duration,
}

fn at(line: usize, column: usize) -> Span {
    Span::new(Pos::new(0, line, column), Pos::new(1, line, column + 1))
}

#[test]
fn test_attribute_into_record() {
    let body = vec![Statement::attribute("age", Expression::number(19))];
    let person: Person = Evaluator::new(body).evaluate_into(None).unwrap();
    assert_eq!(person.age, 19);
}

#[test]
fn test_repeated_blocks_fill_sequence_in_order() {
    let body = vec![
        Statement::block("rule", vec![Statement::attribute("action", Expression::string("keep"))]),
        Statement::block("rule", vec![]),
        Statement::block("rule", vec![Statement::attribute("action", Expression::string("drop"))]),
    ];
    let relabel: Relabel = Evaluator::new(body).evaluate_into(None).unwrap();
    let actions: Vec<&str> = relabel.rules.iter().map(|r| r.action.as_str()).collect();
    assert_eq!(actions, vec!["keep", "", "drop"]);
}

#[test]
fn test_operator_precedence_tree() {
    let expr = Expression::binary(
        BinaryOperator::Add,
        Expression::number(3),
        Expression::binary(BinaryOperator::Multiply, Expression::number(5), Expression::number(2)),
    );
    let value = evaluate_expression(&expr, None).unwrap();
    assert_eq!(value.to_int(), 13);
}

#[test]
fn test_nested_object_access() {
    let expr = Expression::object(vec![(
        "a",
        Expression::object(vec![("b", Expression::number(12))]),
    )])
    .access("a")
    .access("b");
    let out: i64 = Evaluator::new(expr).evaluate_into(None).unwrap();
    assert_eq!(out, 12);
}

#[test]
fn test_unknown_object_key_is_reported() {
    let expr = Expression::object(vec![("name", Expression::string("John"))]).with_span(at(1, 1));
    let err = Evaluator::new(expr).evaluate_into::<Person>(None).unwrap_err();
    assert!(err.message.contains("\"name\""), "{}", err.message);
    assert!(err.is_positioned());
}

#[test]
fn test_full_configuration() {
    let scope = Scope::with_variables([("base", Value::from("https://example.com"))]);
    let body = vec![
        Statement::attribute("timeout", Expression::string("1m30s")),
        Statement::block(
            "endpoint",
            vec![
                Statement::attribute(
                    "url",
                    Expression::binary(
                        BinaryOperator::Add,
                        Expression::ident("base"),
                        Expression::string("/push"),
                    ),
                ),
                Statement::attribute(
                    "headers",
                    Expression::object(vec![(
                        "X-Scope",
                        Expression::ident("to_upper").call(vec![Expression::string("tenant")]),
                    )]),
                ),
            ],
        ),
        Statement::block(
            "endpoint",
            vec![Statement::attribute("url", Expression::string("https://backup"))],
        ),
    ];
    let remote: Remote = Evaluator::new(body).evaluate_into(Some(&scope)).unwrap();
    assert_eq!(remote.timeout, std::time::Duration::from_secs(90));
    assert_eq!(remote.endpoints.len(), 2);
    assert_eq!(remote.endpoints[0].url, "https://example.com/push");
    assert_eq!(remote.endpoints[0].headers.get("X-Scope").map(String::as_str), Some("TENANT"));
    assert_eq!(remote.endpoints[1].url, "https://backup");
    assert!(remote.endpoints[1].headers.is_empty());
}

#[test]
fn test_missing_required_block() {
    let body = vec![Statement::attribute("timeout", Expression::string("5s"))];
    let err = Evaluator::new(body).evaluate_into::<Remote>(None).unwrap_err();
    assert_eq!(err.message, "missing required block \"endpoint\"");
}

#[test]
fn test_nested_decode_error_carries_path() {
    let headers = Expression::object(vec![("X-Scope", Expression::bool(true))]).with_span(at(3, 15));
    let body = vec![Statement::block(
        "endpoint",
        vec![
            Statement::attribute("url", Expression::string("x")),
            Statement::attribute("headers", headers),
        ],
    )];
    let err = Evaluator::new(body).evaluate_into::<Remote>(None).unwrap_err();
    assert_eq!(err.span.map(|s| s.start.line), Some(3));
    assert_eq!(err.path, "[\"X-Scope\"]");
    assert!(err.message.ends_with("should be string, got bool"), "{}", err.message);
}

#[test]
fn test_call_argument_error_points_at_argument() {
    let argument = Expression::number(1).with_span(at(2, 12));
    let expr = Expression::ident("concat").call(vec![argument]).with_span(at(2, 5));
    let err = evaluate_expression(&expr, None).unwrap_err();
    assert_eq!(err.to_string(), "2:12: 1 should be array, got number");
}

#[derive(River, Debug, Clone, Default, PartialEq)]
struct Generated {
    #[river("a,attr")]
    a: String,
    #[river("xs,attr")]
    xs: Vec<bool>,
}

#[test]
fn test_error_in_function_result_after_temporaries_are_freed() {
    let mut scope = Scope::new();
    scope.insert(
        "mk",
        Value::from(Function::new("func() array", |_: &[Value]| {
            Ok(Value::array(vec![Value::from("zz")]))
        })),
    );
    let concat = Expression::binary(
        BinaryOperator::Add,
        Expression::string("ab"),
        Expression::string("cd").with_span(at(1, 12)),
    )
    .with_span(at(1, 5));
    let call = Expression::ident("mk").call(vec![]).with_span(at(5, 6));
    let body = vec![
        Statement::attribute("a", concat),
        Statement::attribute("xs", call),
    ];
    let evaluator = Evaluator::new(body);
    // 解放されたオペランドのアドレスが再利用されても誤った位置を指さない
    for _ in 0..50 {
        let err = evaluator.evaluate_into::<Generated>(Some(&scope)).unwrap_err();
        assert_eq!(err.to_string(), "5:6: mk()[0] should be bool, got string");
        assert_eq!(err.path, "[0]");
    }
}

#[test]
fn test_identifier_from_parent_scope() {
    let parent = std::sync::Arc::new(Scope::with_variables([("region", Value::from("eu"))]));
    let mut child = Scope::with_parent(parent);
    child.insert("zone", Value::from("a"));
    let expr = Expression::binary(
        BinaryOperator::Add,
        Expression::ident("region"),
        Expression::ident("zone"),
    );
    let out: String = Evaluator::new(expr).evaluate_into(Some(&child)).unwrap();
    assert_eq!(out, "eua");
}

fn number_of(kind: NumberKind, n: u8) -> Value {
    match kind {
        NumberKind::Uint => Value::from(n as u64),
        NumberKind::Int => Value::from(n as i64),
        NumberKind::Float => Value::from(n as f64 + 0.5),
    }
}

fn any_kind() -> impl Strategy<Value = NumberKind> {
    prop_oneof![
        Just(NumberKind::Uint),
        Just(NumberKind::Int),
        Just(NumberKind::Float),
    ]
}

proptest! {
    #[test]
    fn test_arithmetic_promotes_to_wider_kind(
        left in any_kind(),
        right in any_kind(),
        a in 0u8..100,
        b in 0u8..100,
    ) {
        let scope = Scope::with_variables([("a", number_of(left, a)), ("b", number_of(right, b))]);
        for op in [BinaryOperator::Add, BinaryOperator::Multiply] {
            let expr = Expression::binary(op, Expression::ident("a"), Expression::ident("b"));
            let value = evaluate_expression(&expr, Some(&scope)).unwrap();
            prop_assert_eq!(value.number().kind(), left.max(right));
        }
    }
}

#[test]
fn test_uint_plus_float() {
    let scope = Scope::with_variables([("a", Value::from(3u64)), ("b", Value::from(5.5))]);
    let expr = Expression::binary(BinaryOperator::Add, Expression::ident("a"), Expression::ident("b"));
    let value = evaluate_expression(&expr, Some(&scope)).unwrap();
    assert_eq!(value.number().kind(), NumberKind::Float);
    assert_eq!(value.to_float(), 8.5);
}
