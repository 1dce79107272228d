use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::Error;
use crate::ast::{Node, Value};
use crate::evaluator::hostfn::{HostFn, IntoHostFunction};
use crate::substitute::bind_params;

/// A named parameter list and body, as created by `defun` or `defmacro`.
///
/// The body's parameter occurrences are linked to the parameter atoms by
/// identity when the definition is built; see [`crate::substitute`].
#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    name: String,
    params: Vec<Node>,
    body: Node,
}

impl Definition {
    /// Build a definition from parameter atoms and a body.
    ///
    /// Fails with `TypeError` if a parameter is not an atom or is repeated.
    pub fn new(name: impl Into<String>, params: Vec<Node>, mut body: Node) -> Result<Self, Error> {
        let name = name.into();
        let mut seen = HashSet::new();
        for param in &params {
            let Some(param_name) = param.as_atom() else {
                return Err(Error::TypeError(format!(
                    "parameter of {name} must be a symbol, got {param}"
                )));
            };
            if !seen.insert(param_name) {
                return Err(Error::TypeError(format!(
                    "duplicate parameter {param_name} in {name}"
                )));
            }
        }

        bind_params(&params, &mut body);
        Ok(Definition { name, params, body })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Node] {
        &self.params
    }

    pub fn body(&self) -> &Node {
        &self.body
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ") {}", self.body)
    }
}

/// What a name is bound to
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Function(Definition),
    Macro(Definition),
    Value(Value),
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Function(def) => write!(f, "#<function {def}>"),
            Binding::Macro(def) => write!(f, "#<macro {def}>"),
            Binding::Value(value) => write!(f, "{value}"),
        }
    }
}

/// The single global binding table for one program run.
///
/// There are no nested scopes. Every `define` overwrites whatever the name
/// was bound to before, and nothing is ever removed. Host functions live in
/// a table of their own and are only reachable through the `php` form.
///
/// The environment is not `Sync`; callers sharing one across threads must
/// wrap it in their own lock.
#[derive(Clone, Default)]
pub struct Environment {
    bindings: HashMap<String, Binding>,
    host_fns: HashMap<String, Rc<HostFn>>,
    max_depth: Option<usize>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    /// Bind `name`, replacing any earlier binding.
    pub fn define(&mut self, name: impl Into<String>, binding: Binding) {
        let name = name.into();
        if let Some(previous) = self.bindings.get(&name) {
            log::debug!("redefining {name} (was {previous})");
        } else {
            log::debug!("defining {name}");
        }
        self.bindings.insert(name, binding);
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// The bound value of `name`, if it is bound to a plain value
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.bindings.get(name) {
            Some(Binding::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// All bindings sorted by name
    pub fn bindings(&self) -> Vec<(&str, &Binding)> {
        let mut result: Vec<_> = self
            .bindings
            .iter()
            .map(|(name, binding)| (name.as_str(), binding))
            .collect();
        result.sort_by(|a, b| a.0.cmp(b.0));
        result
    }

    /// Register a host function taking the raw evaluated argument.
    ///
    /// # Example
    /// ```
    /// use sexpr::{Environment, Value, run};
    ///
    /// let mut env = Environment::new();
    /// env.register_host_fn("twice", |v: Value| match v {
    ///     Value::Number(n) => Ok(Value::Number(n * 2)),
    ///     other => Ok(other),
    /// });
    /// assert_eq!(run("(php twice 21)", &mut env).unwrap(), Value::Number(42));
    /// ```
    pub fn register_host_fn<F>(&mut self, name: &str, func: F)
    where
        F: Fn(Value) -> Result<Value, Error> + 'static,
    {
        log::debug!("registering host function {name}");
        self.host_fns.insert(name.to_owned(), Rc::new(func));
    }

    /// Register a strongly-typed Rust function or closure as a host function.
    ///
    /// Supported parameter types are `i64`, `bool` (truthiness), `String`,
    /// `&str` and `Value`; a zero-parameter function ignores its argument.
    /// The return type may be anything `Into<Value>` or a
    /// `Result<T: Into<Value>, Error>`. A mismatched argument raises
    /// `TypeError`.
    ///
    /// ```
    /// use sexpr::{Environment, Value, run};
    ///
    /// let mut env = Environment::new();
    /// env.register_host_function::<(&str,), _>("shout", |s: &str| s.to_uppercase());
    /// assert_eq!(run("(php shout \"hi\")", &mut env).unwrap(), Value::from("HI"));
    /// ```
    pub fn register_host_function<Args, F>(&mut self, name: &str, func: F)
    where
        F: IntoHostFunction<Args>,
    {
        log::debug!("registering host function {name}");
        self.host_fns.insert(name.to_owned(), func.into_host_fn());
    }

    pub fn host_fn(&self, name: &str) -> Option<Rc<HostFn>> {
        self.host_fns.get(name).cloned()
    }

    /// Names of the registered host functions, sorted
    pub fn host_fn_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.host_fns.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Limit evaluation nesting; `None` (the default) means unlimited.
    pub fn set_max_depth(&mut self, max_depth: Option<usize>) {
        self.max_depth = max_depth;
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("bindings", &self.bindings)
            .field("host_fns", &self.host_fn_names())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}
