use std::sync::Arc;

use super::{Symbol, Value};
use crate::util::error::{Error, ErrorKind, Result};

/// Persistent binding environment. Extension never touches existing
/// nodes, so closures can hold a snapshot cheaply and contexts can cross
/// threads.
#[derive(Clone, Debug, Default)]
pub struct Context {
    head: Option<Arc<Node>>,
}

#[derive(Debug)]
struct Node {
    name: Symbol,
    value: Value,
    next: Option<Arc<Node>>,
}

impl Context {
    pub fn empty() -> Context {
        Context { head: None }
    }

    pub fn bind(&self, name: &str, value: Value) -> Context {
        Context {
            head: Some(Arc::new(Node {
                name: name.to_string(),
                value,
                next: self.head.clone(),
            })),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut current = self.head.as_deref();
        while let Some(node) = current {
            if node.name == name {
                return Some(&node.value);
            }
            current = node.next.as_deref();
        }
        None
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        self.lookup(name).cloned().ok_or_else(|| {
            Error::with_message(ErrorKind::Eval, format!("unbound variable {}", name))
        })
    }

    /// Names bound in this context, innermost first, without duplicates
    /// hidden by shadowing.
    pub fn names(&self) -> Vec<Symbol> {
        let mut res = Vec::new();
        let mut current = self.head.as_deref();
        while let Some(node) = current {
            if !res.contains(&node.name) {
                res.push(node.name.clone());
            }
            current = node.next.as_deref();
        }
        res
    }
}
