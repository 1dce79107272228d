pub mod hostfn;

use std::collections::VecDeque;

use crate::Error;
use crate::ast::{Node, NodeKind, Value};
use crate::builtinops::{self, BuiltinOp, Consumption, SpecialForm, find_builtin};
use crate::environment::{Binding, Definition, Environment};
use crate::substitute::{instantiate, macro_expand, substitute};

/// Evaluate a node (public API)
///
/// The node is cloned first, so the caller's tree is never consumed. Top-level
/// drivers that own their forms use [`eval_form`] instead.
pub fn eval(node: &Node, env: &mut Environment) -> Result<Value, Error> {
    eval_with_depth_tracking(node.clone(), env, 0)
}

/// Evaluate an owned top-level form
pub fn eval_form(node: Node, env: &mut Environment) -> Result<Value, Error> {
    eval_with_depth_tracking(node, env, 0)
}

/// Evaluate a node, failing once the environment's depth limit (if any) is reached
fn eval_with_depth_tracking(
    node: Node,
    env: &mut Environment,
    depth: usize,
) -> Result<Value, Error> {
    if let Some(max_depth) = env.max_depth()
        && depth >= max_depth
    {
        return Err(Error::DepthLimitExceeded(max_depth));
    }

    match node.into_kind() {
        NodeKind::Str(text) => Ok(Value::String(text)),
        NodeKind::Atom(text) => eval_atom(text, env, depth),
        NodeKind::List(children) => eval_list(children, env, depth),
    }
}

/// An atom is an integer literal only if it is the canonical decimal text of an i64
fn parse_integer(text: &str) -> Option<i64> {
    text.parse::<i64>().ok().filter(|n| n.to_string() == text)
}

fn eval_atom(text: String, env: &mut Environment, depth: usize) -> Result<Value, Error> {
    if let Some(n) = parse_integer(&text) {
        return Ok(Value::Number(n));
    }

    match env.lookup(&text) {
        Some(Binding::Value(value)) => Ok(value.clone()),
        // A bare reference to a function or macro is a call without arguments
        Some(Binding::Function(_) | Binding::Macro(_)) => {
            call_definition(&text, VecDeque::new(), env, depth)
        }
        None => Err(Error::UnboundSymbol(text)),
    }
}

fn eval_list(
    mut children: VecDeque<Node>,
    env: &mut Environment,
    depth: usize,
) -> Result<Value, Error> {
    let Some(head) = children.pop_front() else {
        return Ok(Value::Nil);
    };

    let name = match head.kind() {
        NodeKind::Atom(name) => name.clone(),
        NodeKind::Str(text) => {
            return Err(Error::UnsupportedOperation(format!("\"{text}\"")));
        }
        NodeKind::List(_) => {
            // A nested form in operator position is evaluated first. On its
            // own it is just a value; followed by operands it must name an operator.
            let value = eval_with_depth_tracking(head, env, depth + 1)?;
            if children.is_empty() {
                return Ok(value);
            }
            operator_name(value)?
        }
    };

    apply_operator(&name, children, env, depth)
}

fn operator_name(value: Value) -> Result<String, Error> {
    match value {
        Value::String(name) => Ok(name),
        Value::Quote(node) => node
            .as_atom()
            .map(str::to_owned)
            .ok_or_else(|| Error::TypeError(format!("cannot use '{node} as an operator"))),
        other => Err(Error::TypeError(format!(
            "cannot use {} {other} as an operator",
            other.type_name()
        ))),
    }
}

fn apply_operator(
    name: &str,
    operands: VecDeque<Node>,
    env: &mut Environment,
    depth: usize,
) -> Result<Value, Error> {
    let result = match find_builtin(name) {
        Some(op) => eval_special_form(op, operands, env, depth),
        None => call_definition(name, operands, env, depth),
    };
    result.map_err(|err| add_context(err, name))
}

/// Helper function to add the failing operator to type and evaluation errors
fn add_context(error: Error, name: &str) -> Error {
    const MARKER: &str = "\n  Context: ";
    match error {
        Error::EvalError(msg) if !msg.contains(MARKER) => {
            Error::EvalError(format!("{msg}{MARKER}while evaluating ({name} ...)"))
        }
        Error::TypeError(msg) if !msg.contains(MARKER) => {
            Error::TypeError(format!("{msg}{MARKER}while evaluating ({name} ...)"))
        }
        other => other,
    }
}

/// Apply a user-defined function or macro.
///
/// The definition is copied, each parameter is replaced by the matching raw
/// argument syntax, and the result is evaluated. Macro bodies additionally go
/// through the `list`/`quote` expansion pass before evaluation. Arguments
/// beyond the parameter list are ignored.
fn call_definition(
    name: &str,
    args: VecDeque<Node>,
    env: &mut Environment,
    depth: usize,
) -> Result<Value, Error> {
    let (def, is_macro) = match env.lookup(name) {
        Some(Binding::Function(def)) => (def, false),
        Some(Binding::Macro(def)) => (def, true),
        Some(Binding::Value(value)) => {
            return Err(Error::TypeError(format!(
                "{name} is bound to a {} and cannot be called",
                value.type_name()
            )));
        }
        None => return Err(Error::UnsupportedOperation(name.to_owned())),
    };

    if args.len() < def.arity() {
        return Err(Error::arity_error(name, def.arity(), args.len()));
    }
    if args.len() > def.arity() {
        log::debug!(
            "{name}: ignoring {} surplus argument(s)",
            args.len() - def.arity()
        );
    }

    let (param_ids, mut body) = instantiate(def.params(), def.body());
    for (param_id, arg) in param_ids.into_iter().zip(args) {
        substitute(&mut body, param_id, &arg);
    }

    if is_macro {
        body = macro_expand(body)?;
        log::trace!("macro {name} expanded to {body}");
    } else {
        log::trace!("calling {name}: {body}");
    }

    eval_with_depth_tracking(body, env, depth + 1)
}

/// Call-site operands of a built-in form, taken from the end its registry entry names
struct Operands {
    op: &'static BuiltinOp,
    items: VecDeque<Node>,
}

impl Operands {
    fn new(op: &'static BuiltinOp, items: VecDeque<Node>) -> Result<Self, Error> {
        op.validate_arity(items.len())?;
        let surplus = op.arity.surplus(items.len());
        if surplus > 0 {
            log::debug!("{}: ignoring {surplus} surplus operand(s)", op.id);
        }
        Ok(Operands { op, items })
    }

    fn next(&mut self) -> Result<Node, Error> {
        let node = match self.op.consumption {
            Consumption::Front | Consumption::Drain => self.items.pop_front(),
            Consumption::Back => self.items.pop_back(),
            Consumption::Nothing => None,
        };
        node.ok_or_else(|| Error::arity_error(self.op.id, self.op.arity.required(), 0))
    }

    fn drain(self) -> impl Iterator<Item = Node> {
        self.items.into_iter()
    }
}

fn symbol_name(node: Node, form: &str) -> Result<String, Error> {
    match node.into_kind() {
        NodeKind::Atom(name) => Ok(name),
        other => Err(Error::TypeError(format!(
            "{form} expects a symbol, got {}",
            Node::new(other)
        ))),
    }
}

fn eval_special_form(
    op: &'static BuiltinOp,
    operands: VecDeque<Node>,
    env: &mut Environment,
    depth: usize,
) -> Result<Value, Error> {
    let mut ops = Operands::new(op, operands)?;
    let depth = depth + 1;

    match op.form {
        SpecialForm::Add | SpecialForm::Sub | SpecialForm::Mul | SpecialForm::Div => {
            let a = eval_with_depth_tracking(ops.next()?, env, depth)?;
            let b = eval_with_depth_tracking(ops.next()?, env, depth)?;
            builtinops::arithmetic(op.form, a, b)
        }

        SpecialForm::Eq | SpecialForm::NotEq => {
            let branch2 = ops.next()?;
            let branch1 = ops.next()?;
            let left = eval_with_depth_tracking(branch1, env, depth)?;
            let right = eval_with_depth_tracking(branch2, env, depth)?;
            Ok(Value::from((left == right) == (op.form == SpecialForm::Eq)))
        }

        SpecialForm::And | SpecialForm::Or => {
            let branch2 = ops.next()?;
            let branch1 = ops.next()?;
            let first = eval_with_depth_tracking(branch1, env, depth)?.is_truthy();
            // and stops on a false first branch, or on a true one
            if first == (op.form == SpecialForm::Or) {
                return Ok(Value::from(first));
            }
            let second = eval_with_depth_tracking(branch2, env, depth)?;
            Ok(Value::from(second.is_truthy()))
        }

        SpecialForm::True => Ok(Value::from(true)),
        SpecialForm::False => Ok(Value::from(false)),

        SpecialForm::If => {
            let else_branch = ops.next()?;
            let then_branch = ops.next()?;
            let condition = ops.next()?;
            if eval_with_depth_tracking(condition, env, depth)?.is_truthy() {
                eval_with_depth_tracking(then_branch, env, depth)
            } else {
                eval_with_depth_tracking(else_branch, env, depth)
            }
        }

        SpecialForm::Quote => Ok(Value::Quote(ops.next()?)),

        SpecialForm::List => ops
            .drain()
            .map(|node| eval_with_depth_tracking(node, env, depth))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),

        SpecialForm::Eval => match eval_with_depth_tracking(ops.next()?, env, depth)? {
            Value::Quote(code) => eval_with_depth_tracking(code, env, depth),
            other => Ok(other),
        },

        SpecialForm::Concat => {
            let a = eval_with_depth_tracking(ops.next()?, env, depth)?;
            let b = eval_with_depth_tracking(ops.next()?, env, depth)?;
            builtinops::concat(&a, &b)
        }

        SpecialForm::Defun | SpecialForm::Defmacro => {
            let name = symbol_name(ops.next()?, op.id)?;
            let params = ops.next()?;
            let body = ops.next()?;

            let NodeKind::List(params) = params.into_kind() else {
                return Err(Error::TypeError(format!(
                    "{} {name}: parameters must be a list",
                    op.id
                )));
            };
            let def = Definition::new(name.clone(), params.into_iter().collect(), body)?;
            let binding = if op.form == SpecialForm::Defun {
                Binding::Function(def)
            } else {
                Binding::Macro(def)
            };
            env.define(name, binding);
            Ok(Value::Nil)
        }

        SpecialForm::Setq => {
            let value = ops.next()?;
            let name = symbol_name(ops.next()?, op.id)?;
            let value = eval_with_depth_tracking(value, env, depth)?;
            env.define(name, Binding::Value(value.clone()));
            Ok(value)
        }

        SpecialForm::Progn => {
            let mut result = Value::Nil;
            for node in ops.drain() {
                result = eval_with_depth_tracking(node, env, depth)?;
            }
            Ok(result)
        }

        SpecialForm::Host => {
            let target = ops.next()?;
            let arg = ops.next()?;

            let name = match target.kind() {
                NodeKind::Atom(name) | NodeKind::Str(name) => name.clone(),
                NodeKind::List(_) => {
                    return Err(Error::TypeError(format!(
                        "{} expects a host function name, got {target}",
                        op.id
                    )));
                }
            };
            let Some(func) = env.host_fn(&name) else {
                return Err(Error::UnboundSymbol(name));
            };

            let value = eval_with_depth_tracking(arg, env, depth)?;
            log::debug!("calling host function {name} with {value}");
            func(value)
        }
    }
}
