//! Identity-based substitution and the macro expansion pass.
//!
//! A definition's body is linked to its formal parameters once, when the
//! definition is made: every body atom whose text names a parameter is
//! re-tagged with that parameter's [`NodeId`] ([`bind_params`]). From then on
//! the occurrences *are* the parameter as far as substitution is concerned, and
//! an atom elsewhere that merely has the same text is left alone.
//!
//! A call works on a fresh copy of the definition ([`instantiate`]), replaces
//! every node carrying a parameter's identity with the caller's argument
//! syntax ([`substitute`]) and, for macros, resolves `list`/`quote` templates
//! into plain code ([`macro_expand`]). No renaming ever happens, so argument
//! syntax can capture names used by the body.

use std::collections::{HashMap, VecDeque};

use crate::Error;
use crate::ast::{Node, NodeId, NodeKind};

/// Tag every atom in `body` that names one of `params` with that parameter's identity.
///
/// String literals are never tagged. Non-atom entries in `params` are skipped.
pub fn bind_params(params: &[Node], body: &mut Node) {
    let by_name: HashMap<&str, NodeId> = params
        .iter()
        .filter_map(|param| param.as_atom().map(|name| (name, param.id())))
        .collect();
    if !by_name.is_empty() {
        stamp(body, &by_name);
    }
}

fn stamp(node: &mut Node, by_name: &HashMap<&str, NodeId>) {
    let id = match node.kind_mut() {
        NodeKind::Atom(text) => by_name.get(text.as_str()).copied(),
        NodeKind::Str(_) => None,
        NodeKind::List(children) => {
            for child in children.iter_mut() {
                stamp(child, by_name);
            }
            None
        }
    };
    if let Some(id) = id {
        node.set_id(id);
    }
}

fn copy_with(node: &Node, ids: &mut HashMap<NodeId, NodeId>) -> Node {
    let id = *ids.entry(node.id()).or_insert_with(NodeId::fresh);
    let kind = match node.kind() {
        NodeKind::List(children) => {
            NodeKind::List(children.iter().map(|child| copy_with(child, ids)).collect())
        }
        other => other.clone(),
    };
    Node::from_parts(id, kind)
}

/// Structural copy with fresh identities.
///
/// Nodes that share an identity in `node` share one fresh identity in the copy.
pub fn deep_copy(node: &Node) -> Node {
    copy_with(node, &mut HashMap::new())
}

/// Copy a definition's parameters and body together.
///
/// The returned parameter ids are the identities the copied body's parameter
/// occurrences carry. Nothing in the result is identity-equal to the original.
pub fn instantiate(params: &[Node], body: &Node) -> (Vec<NodeId>, Node) {
    let mut ids = HashMap::new();
    let param_ids = params
        .iter()
        .map(|param| copy_with(param, &mut ids).id())
        .collect();
    (param_ids, copy_with(body, &mut ids))
}

/// Replace every node in `node` whose identity is `target` with a clone of `replacement`.
///
/// The inserted replacement is not searched again during this pass. When the
/// root itself is the target the whole tree is replaced.
pub fn substitute(node: &mut Node, target: NodeId, replacement: &Node) {
    if node.id() == target {
        *node = replacement.clone();
        return;
    }
    if let NodeKind::List(children) = node.kind_mut() {
        for child in children.iter_mut() {
            substitute(child, target, replacement);
        }
    }
}

/// Resolve `list` and `quote` templates in a substituted macro body.
///
/// - `(list a b ...)` becomes a new list of the expanded `a b ...`
/// - `(quote x)` and `(' x)` become `x`, unexpanded
/// - atoms, string literals and `()` pass through
///
/// Any other non-empty list is an expansion error.
pub fn macro_expand(mut node: Node) -> Result<Node, Error> {
    let NodeKind::List(children) = node.kind_mut() else {
        return Ok(node);
    };
    let Some(head) = children.front() else {
        return Ok(node);
    };

    match head.as_atom() {
        Some("list") => {
            let mut children = std::mem::take(children);
            children.pop_front();
            let expanded = children
                .into_iter()
                .map(macro_expand)
                .collect::<Result<VecDeque<_>, _>>()?;
            log::trace!("expanded list template into {} element(s)", expanded.len());
            Ok(Node::new(NodeKind::List(expanded)))
        }
        Some("quote" | "'") => {
            children.pop_front();
            children.pop_front().ok_or_else(|| {
                Error::MacroExpansion("quote in macro template needs an operand".into())
            })
        }
        _ => Err(Error::MacroExpansion(format!(
            "cannot expand {head} in macro template, expected list or quote"
        ))),
    }
}
