//! Conversion between evaluated values and `serde_json` values.
//!
//! | value | JSON |
//! |---|---|
//! | nil | `null` |
//! | number | integer number |
//! | string | string |
//! | list | array |
//!
//! JSON booleans read as `1` and `0`. Quoted code has no JSON form, and
//! JSON objects and non-integer numbers have no value form; all of these are
//! rejected with `TypeError`.

use crate::ast::Value;
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Convert a value to `serde_json::Value`
pub fn value_to_json(value: &Value) -> Result<serde_json::Value, Error> {
    match value {
        Value::Nil => Ok(serde_json::Value::Null),
        Value::Number(n) => Ok(serde_json::Value::Number(serde_json::Number::from(*n))),
        Value::String(s) => Ok(serde_json::Value::String(s.clone())),
        Value::List(items) => items
            .iter()
            .map(value_to_json)
            .collect::<Result<Vec<_>, _>>()
            .map(serde_json::Value::Array),
        Value::Quote(node) => Err(Error::TypeError(format!(
            "quoted code '{node} has no JSON representation"
        ))),
    }
}

/// Convert a `serde_json::Value` to a value
pub fn value_from_json(json: serde_json::Value) -> Result<Value, Error> {
    value_from_json_with_depth(json, 0)
}

fn value_from_json_with_depth(json: serde_json::Value, depth: usize) -> Result<Value, Error> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(Error::TypeError(format!(
            "JSON value too deeply nested (max depth: {MAX_PARSE_DEPTH})"
        )));
    }
    match json {
        serde_json::Value::Null => Ok(Value::Nil),
        serde_json::Value::Bool(b) => Ok(Value::from(b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Number)
            .ok_or_else(|| Error::TypeError(format!("number too large or not integer: {n}"))),
        serde_json::Value::String(s) => Ok(Value::String(s)),
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| value_from_json_with_depth(item, depth + 1))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        serde_json::Value::Object(_) => Err(Error::TypeError(
            "JSON objects have no value representation".into(),
        )),
    }
}

/// Parse JSON text into a value
pub fn parse_json(input: &str) -> Result<Value, Error> {
    let json: serde_json::Value = serde_json::from_str(input).map_err(|e| {
        Error::SyntaxError(ParseError::new(
            ParseErrorKind::InvalidSyntax,
            format!("Invalid JSON: {e}"),
            None,
            None,
        ))
    })?;
    value_from_json(json)
}

/// Render a value as compact JSON text
pub fn to_json_string(value: &Value) -> Result<String, Error> {
    let json = value_to_json(value)?;
    serde_json::to_string(&json)
        .map_err(|e| Error::EvalError(format!("JSON serialization failed: {e}")))
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::Node;
    use serde_json::json;

    #[test]
    fn test_value_to_json() {
        let test_cases = vec![
            (Value::Nil, json!(null)),
            (Value::Number(-3), json!(-3)),
            (Value::from("héllo"), json!("héllo")),
            (Value::List(vec![]), json!([])),
            (
                Value::List(vec![
                    Value::Number(1),
                    Value::from("a"),
                    Value::Nil,
                    Value::List(vec![Value::Number(2)]),
                ]),
                json!([1, "a", null, [2]]),
            ),
        ];
        for (value, expected) in test_cases {
            assert_eq!(value_to_json(&value).unwrap(), expected, "{value}");
        }

        assert!(matches!(
            value_to_json(&Value::List(vec![Value::Quote(Node::atom("x"))])),
            Err(Error::TypeError(_))
        ));
    }

    #[test]
    fn test_value_from_json() {
        assert_eq!(parse_json("null").unwrap(), Value::Nil);
        assert_eq!(parse_json("true").unwrap(), Value::Number(1));
        assert_eq!(parse_json("false").unwrap(), Value::Number(0));
        assert_eq!(
            parse_json("[1, \"x\", [null]]").unwrap(),
            Value::List(vec![
                Value::Number(1),
                Value::from("x"),
                Value::List(vec![Value::Nil]),
            ])
        );

        assert!(matches!(parse_json("1.5"), Err(Error::TypeError(_))));
        assert!(matches!(parse_json("{\"a\": 1}"), Err(Error::TypeError(_))));
        assert!(matches!(
            parse_json("18446744073709551615"),
            Err(Error::TypeError(_))
        ));
        assert!(matches!(parse_json("[1,"), Err(Error::SyntaxError(_))));

        let deep = format!("{}{}", "[".repeat(MAX_PARSE_DEPTH + 1), "]".repeat(MAX_PARSE_DEPTH + 1));
        assert!(parse_json(&deep).is_err());
    }

    #[test]
    fn test_json_string_output() {
        let value = Value::List(vec![Value::Number(1), Value::from("a\"b")]);
        assert_eq!(to_json_string(&value).unwrap(), r#"[1,"a\"b"]"#);
    }
}
