use pipecore::Value;
use piperuntime::condition::{evaluate_str, satisfied, ConditionError};

#[test]
fn test_empty_guard_is_always_satisfied() {
    assert!(satisfied("", None));
    assert!(satisfied("   ", Some(&Value::Int(0))));
}

#[test]
fn test_comparison_suffix_against_output() {
    assert!(satisfied(">10", Some(&Value::Int(15))));
    assert!(!satisfied(">10", Some(&Value::Int(5))));
    assert!(satisfied("==5", Some(&Value::Int(5))));
    assert!(satisfied("!= 'done'", Some(&Value::from("pending"))));
    assert!(satisfied("<= 2.5", Some(&Value::Float(2.5))));
    assert!(satisfied("> 1", Some(&Value::Float(1.5))));
}

#[test]
fn test_comparison_suffix_without_output_is_not_satisfied() {
    assert!(!satisfied(">10", None));
}

#[test]
fn test_incomparable_types_are_not_satisfied() {
    assert!(!satisfied(">10", Some(&Value::from("many"))));
    assert!(matches!(
        evaluate_str("'a' > 1", None),
        Err(ConditionError::IncomparableTypes { .. })
    ));
}

#[test]
fn test_standalone_expressions() {
    assert!(satisfied("3 > 2 and true", None));
    assert!(!satisfied("3 > 2 && false", None));
    assert!(satisfied("not (1 == 2) or false", None));
    assert!(satisfied("-1 < 0", None));
    // `value` is only bound when the guard starts with a comparison
    assert!(!satisfied("value > 3", Some(&Value::Int(4))));
}

#[test]
fn test_literal_fallback_matches_output_text() {
    assert!(satisfied("approved", Some(&Value::from("approved"))));
    assert!(!satisfied("approved", Some(&Value::from("rejected"))));
    assert!(!satisfied("approved", None));
}

#[test]
fn test_truthiness_of_results() {
    assert_eq!(evaluate_str("1 and 'x'", None), Ok(Value::Bool(true)));
    assert_eq!(evaluate_str("0 or ''", None), Ok(Value::Bool(false)));
    assert_eq!(evaluate_str("null", None), Ok(Value::Null));
    assert!(!satisfied("None", Some(&Value::Int(1))));
}

#[test]
fn test_mixed_number_equality() {
    assert_eq!(evaluate_str("1 == 1.0", None), Ok(Value::Bool(true)));
    assert_eq!(evaluate_str("true == 1", None), Ok(Value::Bool(false)));
}

#[test]
fn test_undefined_names_fail() {
    assert!(matches!(
        evaluate_str("price > 3", None),
        Err(ConditionError::UndefinedVariable(name)) if name == "price"
    ));
}

#[test]
fn test_negation_overflow_is_not_satisfied() {
    assert!(!satisfied("== -value", Some(&Value::Int(i64::MIN))));
    assert_eq!(
        evaluate_str("-value", Some(&Value::Int(i64::MIN))),
        Err(ConditionError::Overflow(i64::MIN))
    );
    assert!(satisfied("== -value", Some(&Value::Int(0))));
}

#[test]
fn test_deeply_nested_guard_is_rejected() {
    let deep = format!("{}1{}", "(".repeat(20_000), ")".repeat(20_000));
    assert!(!satisfied(&deep, Some(&Value::Int(1))));
    assert!(matches!(
        evaluate_str(&deep, None),
        Err(ConditionError::TooDeep(_))
    ));

    let negations = format!("{}true", "not ".repeat(20_000));
    assert!(!satisfied(&negations, Some(&Value::Bool(true))));
    assert!(matches!(
        evaluate_str(&negations, None),
        Err(ConditionError::TooDeep(_))
    ));
}

#[test]
fn test_long_boolean_chain_evaluates() {
    let chain = vec!["true"; 20_000].join(" and ");
    assert!(satisfied(&chain, None));
    let chain = format!("{} or 3 > 1", vec!["false"; 20_000].join(" or "));
    assert!(satisfied(&chain, None));
}

#[test]
fn test_out_of_range_integer_literal() {
    assert!(matches!(
        evaluate_str("99999999999999999999", None),
        Err(ConditionError::InvalidNumber(_))
    ));
    assert!(!satisfied("> 99999999999999999999", Some(&Value::Int(5))));
    assert!(satisfied(
        "99999999999999999999",
        Some(&Value::from("99999999999999999999"))
    ));
    assert!(!satisfied("99999999999999999999", Some(&Value::Int(5))));
}
