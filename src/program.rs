//! Top-level driver: read a whole source text and evaluate its forms in order.

use crate::Error;
use crate::ast::{NodeKind, Value};
use crate::environment::Environment;
use crate::evaluator::eval_form;
use crate::reader::parse;

/// What to do when a top-level form fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop at the first failing form
    #[default]
    Halt,
    /// Report the failure and carry on with the next form
    Continue,
}

/// Per-form results of one program run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramOutcome {
    /// One entry per evaluated form, in source order
    pub results: Vec<Result<Value, Error>>,
    /// Number of forms the program contained
    pub form_count: usize,
}

impl ProgramOutcome {
    /// Value of the last evaluated form, if it succeeded
    pub fn last_value(&self) -> Option<&Value> {
        self.results.last().and_then(|result| result.as_ref().ok())
    }

    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        self.results.iter().filter_map(|result| result.as_ref().err())
    }

    pub fn is_success(&self) -> bool {
        self.results.iter().all(Result::is_ok) && self.results.len() == self.form_count
    }
}

/// Parse and evaluate `source`, stopping at the first error.
///
/// Returns the value of the last form, or nil for an empty program.
///
/// ```
/// use sexpr::{Environment, Value, run};
///
/// let mut env = Environment::new();
/// let value = run("(defun double (x) (+ x x)) (double 21)", &mut env).unwrap();
/// assert_eq!(value, Value::Number(42));
/// ```
pub fn run(source: &str, env: &mut Environment) -> Result<Value, Error> {
    let NodeKind::List(forms) = parse(source)?.into_kind() else {
        return Ok(Value::Nil);
    };
    let mut result = Value::Nil;
    for form in forms {
        result = eval_form(form, env)?;
    }
    Ok(result)
}

/// Parse and evaluate `source` under an explicit error policy.
///
/// A syntax error fails the whole run before anything is evaluated.
pub fn run_program(
    source: &str,
    env: &mut Environment,
    policy: ErrorPolicy,
) -> Result<ProgramOutcome, Error> {
    let NodeKind::List(forms) = parse(source)?.into_kind() else {
        return Ok(ProgramOutcome {
            results: Vec::new(),
            form_count: 0,
        });
    };

    let form_count = forms.len();
    let mut results = Vec::with_capacity(form_count);
    for (index, form) in forms.into_iter().enumerate() {
        let result = eval_form(form, env);
        if let Err(e) = &result {
            log::debug!("form #{} failed: {e}", index + 1);
        }
        let failed = result.is_err();
        results.push(result);
        if failed && policy == ErrorPolicy::Halt {
            break;
        }
    }

    Ok(ProgramOutcome {
        results,
        form_count,
    })
}
