//! Built-in forms registry.
//!
//! Every built-in operator is a [`SpecialForm`]: the evaluator receives its
//! operands unevaluated and decides how many to take, from which end of the
//! call-site list, and in what order to evaluate them. The registry records
//! that contract per operator so it can be audited in one place:
//!
//! | form | arity | consumption |
//! |---|---|---|
//! | `+ - * /` | 2 | front, front |
//! | `= != and or` | 2 | back, back |
//! | `true false` | 0 | none |
//! | `if` | 3 | back, back, back |
//! | `quote '` | 1 | front |
//! | `list` | any | front until exhausted |
//! | `concat` | 2 | front, front |
//! | `defun defmacro` | 3 | front, front, front |
//! | `setq define` | 2 | back, back |
//! | `progn` | any | front until exhausted |
//! | `php host` | 2 | front, front |
//! | `eval` | 1 | front |
//!
//! Operands left over once a form has taken what it needs are ignored.
//!
//! The value-level helpers at the bottom of this module implement the pure
//! part of the arithmetic, comparison and string forms; they never see syntax.

use crate::Error;
use crate::ast::{NumberType, Value};
use std::collections::HashMap;
use std::sync::LazyLock;

/// The closed set of built-in operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialForm {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    And,
    Or,
    True,
    False,
    If,
    Quote,
    List,
    Concat,
    Defun,
    Defmacro,
    Setq,
    Progn,
    Host,
    Eval,
}

impl SpecialForm {
    /// Resolve an operator name, including aliases such as `'` and `define`.
    pub fn from_symbol(name: &str) -> Option<SpecialForm> {
        find_builtin(name).map(|op| op.form)
    }

    /// Canonical name of the form
    pub fn symbol(self) -> &'static str {
        match self {
            SpecialForm::Add => "+",
            SpecialForm::Sub => "-",
            SpecialForm::Mul => "*",
            SpecialForm::Div => "/",
            SpecialForm::Eq => "=",
            SpecialForm::NotEq => "!=",
            SpecialForm::And => "and",
            SpecialForm::Or => "or",
            SpecialForm::True => "true",
            SpecialForm::False => "false",
            SpecialForm::If => "if",
            SpecialForm::Quote => "quote",
            SpecialForm::List => "list",
            SpecialForm::Concat => "concat",
            SpecialForm::Defun => "defun",
            SpecialForm::Defmacro => "defmacro",
            SpecialForm::Setq => "setq",
            SpecialForm::Progn => "progn",
            SpecialForm::Host => "php",
            SpecialForm::Eval => "eval",
        }
    }
}

/// Number of operands a form consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many operands are consumed; more are ignored
    Exact(usize),
    /// Every operand is consumed
    Any,
}

impl Arity {
    pub fn required(self) -> usize {
        match self {
            Arity::Exact(n) => n,
            Arity::Any => 0,
        }
    }

    /// Check that `got` operands are enough for the form `id`.
    pub fn validate(self, id: &str, got: usize) -> Result<(), Error> {
        let required = self.required();
        if got < required {
            return Err(Error::arity_error(id, required, got));
        }
        Ok(())
    }

    /// How many of `got` operands the form leaves untouched.
    pub fn surplus(self, got: usize) -> usize {
        match self {
            Arity::Exact(n) => got.saturating_sub(n),
            Arity::Any => 0,
        }
    }
}

/// Which end of the call-site list a form takes its operands from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumption {
    /// Removed from the front, in source order
    Front,
    /// Removed from the back, last operand first
    Back,
    /// Removed from the front until the list is empty
    Drain,
    /// No operands
    Nothing,
}

/// Definition of a built-in operator
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltinOp {
    /// The identifier this entry is found under
    pub id: &'static str,
    pub form: SpecialForm,
    pub arity: Arity,
    pub consumption: Consumption,
}

impl BuiltinOp {
    pub(crate) fn validate_arity(&self, got: usize) -> Result<(), Error> {
        self.arity.validate(self.id, got)
    }
}

static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn op(
        id: &'static str,
        form: SpecialForm,
        arity: Arity,
        consumption: Consumption,
    ) -> BuiltinOp {
        BuiltinOp {
            id,
            form,
            arity,
            consumption,
        }
    }

    use Consumption::*;
    use SpecialForm as F;

    vec![
        // Arithmetic
        op("+", F::Add, Arity::Exact(2), Front),
        op("-", F::Sub, Arity::Exact(2), Front),
        op("*", F::Mul, Arity::Exact(2), Front),
        op("/", F::Div, Arity::Exact(2), Front),
        // Comparison and logic
        op("=", F::Eq, Arity::Exact(2), Back),
        op("!=", F::NotEq, Arity::Exact(2), Back),
        op("and", F::And, Arity::Exact(2), Back),
        op("or", F::Or, Arity::Exact(2), Back),
        op("true", F::True, Arity::Exact(0), Nothing),
        op("false", F::False, Arity::Exact(0), Nothing),
        op("if", F::If, Arity::Exact(3), Back),
        // Code as data
        op("quote", F::Quote, Arity::Exact(1), Front),
        op("'", F::Quote, Arity::Exact(1), Front),
        op("list", F::List, Arity::Any, Drain),
        op("eval", F::Eval, Arity::Exact(1), Front),
        op("concat", F::Concat, Arity::Exact(2), Front),
        // Definitions
        op("defun", F::Defun, Arity::Exact(3), Front),
        op("defmacro", F::Defmacro, Arity::Exact(3), Front),
        op("setq", F::Setq, Arity::Exact(2), Back),
        op("define", F::Setq, Arity::Exact(2), Back),
        op("progn", F::Progn, Arity::Any, Drain),
        // Host boundary
        op("php", F::Host, Arity::Exact(2), Front),
        op("host", F::Host, Arity::Exact(2), Front),
    ]
});

/// Lazy static map from identifier to BuiltinOp (private - use find_builtin)
static BUILTIN_BY_ID: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.id, op)).collect()
});

/// All built-in operators, aliases included, in registry order
pub fn builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

pub fn find_builtin(id: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_ID.get(id).copied()
}

//
// Value-level helpers
//

fn expect_number(form: SpecialForm, value: Value) -> Result<NumberType, Error> {
    match value {
        Value::Number(n) => Ok(n),
        other => Err(Error::TypeError(format!(
            "{} expects numbers, got {}",
            form.symbol(),
            other.type_name()
        ))),
    }
}

/// Checked integer arithmetic for `+ - * /`.
///
/// Division truncates toward zero.
pub(crate) fn arithmetic(form: SpecialForm, a: Value, b: Value) -> Result<Value, Error> {
    let a = expect_number(form, a)?;
    let b = expect_number(form, b)?;

    let result = match form {
        SpecialForm::Add => a.checked_add(b),
        SpecialForm::Sub => a.checked_sub(b),
        SpecialForm::Mul => a.checked_mul(b),
        SpecialForm::Div => {
            if b == 0 {
                return Err(Error::EvalError("division by zero".into()));
            }
            a.checked_div(b)
        }
        other => {
            return Err(Error::UnsupportedOperation(format!(
                "{} is not arithmetic",
                other.symbol()
            )));
        }
    };

    result
        .map(Value::Number)
        .ok_or_else(|| Error::EvalError(format!("integer overflow in {}", form.symbol())))
}

/// Text form of a value as used by `concat`
pub(crate) fn text_of(value: &Value) -> Result<String, Error> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Nil => Ok(String::new()),
        other => Err(Error::TypeError(format!(
            "concat expects strings or numbers, got {}",
            other.type_name()
        ))),
    }
}

pub(crate) fn concat(a: &Value, b: &Value) -> Result<Value, Error> {
    let mut text = text_of(a)?;
    text.push_str(&text_of(b)?);
    Ok(Value::String(text))
}
