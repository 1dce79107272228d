#![expect(clippy::unwrap_used)] // test code OK

use std::cell::RefCell;
use std::rc::Rc;

use sexpr::reader::parse;
use sexpr::{Environment, Error, ErrorPolicy, ParseErrorKind, Value, run, run_program};

/// Helper function to run a program in a fresh environment
fn run_fresh(source: &str) -> Result<Value, Error> {
    let mut env = Environment::new();
    run(source, &mut env)
}

#[test]
fn test_arithmetic_and_nesting() {
    assert_eq!(run_fresh("(+ 1 (* 2 3))").unwrap(), Value::Number(7));
    assert_eq!(run_fresh("(- (* 4 5) (/ 9 3))").unwrap(), Value::Number(17));
    assert_eq!(run_fresh("(/ -7 2)").unwrap(), Value::Number(-3));
    assert!(matches!(run_fresh("(/ 1 0)"), Err(Error::EvalError(_))));
}

#[test]
fn test_defun_and_defmacro() {
    let mut env = Environment::new();
    run("(defun double (x) (+ x x))", &mut env).unwrap();
    assert_eq!(run("(double 5)", &mut env).unwrap(), Value::Number(10));
    assert_eq!(run("(double 7)", &mut env).unwrap(), Value::Number(14));

    run(
        "(defmacro inc (var) (list 'setq var (list '+ var 1))) (setq x 0)",
        &mut env,
    )
    .unwrap();
    for _ in 0..5 {
        run("(inc x)", &mut env).unwrap();
    }
    assert_eq!(env.value("x"), Some(&Value::Number(5)));
}

#[test]
fn test_errors_surface_by_kind() {
    let mut env = Environment::new();
    run("(defun add2 (a b) (+ a b))", &mut env).unwrap();

    assert_eq!(
        run("(add2 1)", &mut env),
        Err(Error::ArityError {
            form: "add2".into(),
            expected: 2,
            got: 1
        })
    );
    assert_eq!(
        run("missing", &mut env),
        Err(Error::UnboundSymbol("missing".into()))
    );
    assert_eq!(
        run("(missing 1)", &mut env),
        Err(Error::UnsupportedOperation("missing".into()))
    );
    assert_eq!(
        run("missing", &mut env).unwrap_err().to_string(),
        "UnboundSymbolError: missing"
    );
}

#[test]
fn test_if_truthiness() {
    let test_cases = vec![
        ("(if 0 \"t\" \"f\")", "f"),
        ("(if \"\" \"t\" \"f\")", "f"),
        ("(if (progn) \"t\" \"f\")", "f"),
        ("(if 1 \"t\" \"f\")", "t"),
        ("(if \"0\" \"t\" \"f\")", "t"),
        ("(if (= 2 (+ 1 1)) \"t\" \"f\")", "t"),
    ];
    for (source, expected) in test_cases {
        assert_eq!(run_fresh(source).unwrap(), Value::from(expected), "{source}");
    }
}

#[test]
fn test_quote_and_eval() {
    assert_eq!(run_fresh("(eval (quote (+ 1 2)))").unwrap(), Value::Number(3));
    assert_eq!(run_fresh("(eval '(+ 1 2))").unwrap(), Value::Number(3));
    assert_eq!(
        run_fresh("(quote (a b))").unwrap().to_string(),
        "'(a b)"
    );
}

#[test]
fn test_parse_is_pure() {
    let source = "(defun f (x) (concat \"x\" x)) (f 1)";
    let first = parse(source).unwrap();
    let second = parse(source).unwrap();
    assert_eq!(first, second);
    assert!(!first.same_node(&second));

    let mut env = Environment::new();
    run(source, &mut env).unwrap();
    assert_eq!(parse(source).unwrap(), first);
}

#[test]
fn test_host_function_captures_calls() {
    let captured = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&captured);

    let mut env = Environment::new();
    env.register_host_fn("printf", move |value| {
        if let Value::String(text) = &value {
            sink.borrow_mut().push(text.clone());
        }
        Ok(Value::Nil)
    });
    env.register_host_function::<(i64,), _>("triple", |n: i64| n * 3);

    run(
        "(defun greet (who) (php printf (concat \"hello \" who)))
         (greet \"world\")
         (php printf (concat \"n=\" (php triple 4)))",
        &mut env,
    )
    .unwrap();
    assert_eq!(*captured.borrow(), vec!["hello world", "n=12"]);

    assert!(matches!(
        run("(php unknown 1)", &mut env),
        Err(Error::UnboundSymbol(_))
    ));
}

#[test]
fn test_run_program_policies() {
    let source = "(setq a 1) (nope) (setq a (+ a 1)) a";

    let mut env = Environment::new();
    let outcome = run_program(source, &mut env, ErrorPolicy::Halt).unwrap();
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(env.value("a"), Some(&Value::Number(1)));

    let mut env = Environment::new();
    let outcome = run_program(source, &mut env, ErrorPolicy::Continue).unwrap();
    assert_eq!(outcome.form_count, 4);
    assert_eq!(outcome.errors().count(), 1);
    assert_eq!(outcome.last_value(), Some(&Value::Number(2)));

    let mut env = Environment::new();
    let err = run_program("(setq a 1))", &mut env, ErrorPolicy::Continue).unwrap_err();
    assert!(matches!(
        err,
        Error::SyntaxError(ref e) if e.kind == ParseErrorKind::UnbalancedClose
    ));
    assert!(env.value("a").is_none());
}

#[test]
fn test_depth_limit_stops_runaway_macro() {
    let mut env = Environment::new();
    env.set_max_depth(Some(64));
    run("(defmacro loop () (list 'loop))", &mut env).unwrap();
    assert_eq!(run("(loop)", &mut env), Err(Error::DepthLimitExceeded(64)));
}

#[cfg(feature = "json")]
#[test]
fn test_json_output() {
    use sexpr::json::{parse_json, to_json_string};

    let value = run_fresh("(list 1 \"two\" (list (+ 1 2)))").unwrap();
    assert_eq!(to_json_string(&value).unwrap(), r#"[1,"two",[3]]"#);
    assert_eq!(parse_json(r#"[1,"two",[3]]"#).unwrap(), value);
}
