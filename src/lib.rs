//! sexpr - a small homoiconic expression-language engine
//!
//! Source text is read into a tree of atoms, string literals and nested lists,
//! and that same tree is what the evaluator interprets. Code and data share one
//! representation, which is what makes the macro facility possible.
//!
//! ```lisp
//! (defun double (x) (+ x x))
//! (double 21)                      ; 42
//!
//! (defmacro inc (v) (list (quote setq) v (list (quote +) 1 v)))
//! (setq n 1)
//! (inc n)                          ; n is now 2
//!
//! (php printf (concat "n = " n))   ; calls a host function
//! ```
//!
//! ## Semantics worth knowing
//!
//! - There is one flat global environment. `defun`, `defmacro` and `setq`
//!   overwrite earlier bindings of the same name.
//! - Function and macro calls substitute the *unevaluated* argument syntax into
//!   a fresh copy of the body, then evaluate the result. Substitution is by
//!   node identity, not by name, and no renaming takes place: macros are not
//!   hygienic.
//! - Built-in forms consume their operands either from the front or from the
//!   back of the call-site list. The order is part of the contract because it
//!   decides which operands are evaluated first and which surplus operands are
//!   ignored.
//! - Integers are the only numbers. `0`, `""` and nil are false; everything
//!   else is true.
//!
//! ## Modules
//!
//! - `ast`: node and value types
//! - `reader`: text to syntax tree
//! - `builtinops`: the closed set of built-in forms
//! - `environment`: the global binding table and host function registry
//! - `substitute`: identity substitution, deep copy and macro expansion
//! - `evaluator`: the tree-walking interpreter
//! - `program`: top-level driver over a whole source text
//! - `json`: conversion of values to and from `serde_json` (feature `json`)

use std::fmt;

/// Default maximum nesting depth accepted by the reader.
pub const MAX_PARSE_DEPTH: usize = 256;

/// Categorizes the different kinds of reader failures.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ParseErrorKind {
    /// Unexpected character or token
    InvalidSyntax,
    /// Input ended inside a list or a string literal
    Incomplete,
    /// A `)` with no matching `(`
    UnbalancedClose,
    /// List nesting exceeded the configured maximum depth
    TooDeeplyNested,
}

/// A structured error providing detailed information about a reader failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 60 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a ParseError with context extracted from `input` around byte `error_offset`
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 60;
        const LEAD: usize = 20;

        let error_offset = error_offset.min(input.len());
        let chars_before = input[..error_offset].chars().count();
        let context_start = chars_before.saturating_sub(LEAD);

        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.chars().count() < input.chars().count() {
            display_context.push_str("[...]");
        }

        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

/// Error types for the reader and evaluator.
///
/// Every error aborts evaluation of the current top-level form. Whether the
/// driver moves on to the next form is decided by the host, see
/// [`program::ErrorPolicy`].
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed parenthesization, unterminated string or excessive nesting
    SyntaxError(ParseError),
    /// Atom that is neither an integer literal nor bound in the environment
    UnboundSymbol(String),
    /// Operator that is neither a built-in form nor bound
    UnsupportedOperation(String),
    /// Too few operands for a built-in form or a function/macro parameter list
    ArityError {
        form: String,
        expected: usize,
        got: usize,
    },
    /// The macro expansion pass met an operator it cannot resolve
    MacroExpansion(String),
    /// Operation applied to a value of the wrong kind
    TypeError(String),
    /// Arithmetic overflow, division by zero and similar runtime failures
    EvalError(String),
    /// A host function reported a failure
    HostError(String),
    /// The host-configured evaluation depth limit was reached
    DepthLimitExceeded(usize),
}

impl Error {
    pub fn arity_error(form: impl Into<String>, expected: usize, got: usize) -> Self {
        Error::ArityError {
            form: form.into(),
            expected,
            got,
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::SyntaxError(e) => {
                write!(f, "SyntaxError: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::UnboundSymbol(name) => write!(f, "UnboundSymbolError: {name}"),
            Error::UnsupportedOperation(op) => write!(f, "UnsupportedOperationError: {op}"),
            Error::ArityError {
                form,
                expected,
                got,
            } => write!(
                f,
                "ArityError: {form} expected {expected} arguments, got {got}"
            ),
            Error::MacroExpansion(msg) => write!(f, "MacroExpansionError: {msg}"),
            Error::TypeError(msg) => write!(f, "TypeError: {msg}"),
            Error::EvalError(msg) => write!(f, "EvaluationError: {msg}"),
            Error::HostError(msg) => write!(f, "HostError: {msg}"),
            Error::DepthLimitExceeded(limit) => {
                write!(f, "EvaluationError: depth limit exceeded (max: {limit})")
            }
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::SyntaxError(e)
    }
}

pub mod ast;
pub mod builtinops;
pub mod environment;
pub mod evaluator;
pub mod program;
pub mod reader;
pub mod substitute;

#[cfg(feature = "json")]
pub mod json;

pub use ast::{Node, NodeId, NodeKind, Value};
pub use environment::{Binding, Definition, Environment};
pub use program::{ErrorPolicy, ProgramOutcome, run, run_program};
