//! Lexical environments

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ScriptError, ScriptResult};
use crate::value::Value;

struct Binding {
    value: Value,
    mutable: bool,
    /// `var` and function declarations may be declared again
    redeclarable: bool,
}

/// One block or function scope, chained to its parent.
pub struct Scope {
    bindings: Mutex<HashMap<Arc<str>, Binding>>,
    parent: Option<Arc<Scope>>,
}

/// How a name is introduced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Const,
    Let,
    Var,
    Function,
}

impl Scope {
    pub fn root() -> Arc<Self> {
        Arc::new(Self {
            bindings: Mutex::new(HashMap::new()),
            parent: None,
        })
    }

    pub fn child(parent: &Arc<Self>) -> Arc<Self> {
        Arc::new(Self {
            bindings: Mutex::new(HashMap::new()),
            parent: Some(Arc::clone(parent)),
        })
    }

    pub fn declare(&self, name: &Arc<str>, value: Value, kind: BindingKind) -> ScriptResult<()> {
        let redeclarable = matches!(kind, BindingKind::Var | BindingKind::Function);
        let mut bindings = self.bindings.lock();
        if let Some(existing) = bindings.get(name)
            && !(existing.redeclarable && redeclarable)
        {
            return Err(ScriptError::syntax_at_runtime(format!(
                "Identifier '{name}' has already been declared"
            )));
        }
        bindings.insert(
            Arc::clone(name),
            Binding {
                value,
                mutable: kind != BindingKind::Const,
                redeclarable,
            },
        );
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(binding) = self.bindings.lock().get(name) {
            return Some(binding.value.clone());
        }
        let mut current = self.parent.clone();
        while let Some(scope) = current {
            if let Some(binding) = scope.bindings.lock().get(name) {
                return Some(binding.value.clone());
            }
            current = scope.parent.clone();
        }
        None
    }

    pub fn assign(&self, name: &str, value: Value) -> ScriptResult<()> {
        if Self::assign_local(self, name, &value)? {
            return Ok(());
        }
        let mut current = self.parent.clone();
        while let Some(scope) = current {
            if Self::assign_local(&scope, name, &value)? {
                return Ok(());
            }
            current = scope.parent.clone();
        }
        Err(ScriptError::reference(name))
    }

    fn assign_local(scope: &Self, name: &str, value: &Value) -> ScriptResult<bool> {
        let mut bindings = scope.bindings.lock();
        match bindings.get_mut(name) {
            Some(binding) if !binding.mutable => {
                Err(ScriptError::type_error("Assignment to constant variable."))
            }
            Some(binding) => {
                binding.value = value.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop every binding of this scope and its ancestors. Closures keep
    /// their defining scope alive, so a closure stored in a scope it can
    /// see forms a cycle only this breaks.
    pub fn release_chain(&self) {
        self.release();
        let mut current = self.parent.clone();
        while let Some(scope) = current {
            scope.release();
            current = scope.parent.clone();
        }
    }

    /// Values are dropped after the lock is released.
    pub fn release(&self) {
        let bindings = std::mem::take(&mut *self.bindings.lock());
        drop(bindings);
    }

    /// Names declared directly in this scope.
    pub fn local_names(&self) -> Vec<Arc<str>> {
        self.bindings.lock().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Arc<str> {
        Arc::from(s)
    }

    #[test]
    fn lookup_walks_parents() {
        let root = Scope::root();
        root.declare(&name("x"), Value::from(1.0), BindingKind::Let).unwrap();
        let inner = Scope::child(&Scope::child(&root));
        assert_eq!(inner.lookup("x").map(|v| v.to_number()), Some(1.0));
        assert!(inner.lookup("y").is_none());
    }

    #[test]
    fn const_rejects_assignment() {
        let root = Scope::root();
        root.declare(&name("x"), Value::from(1.0), BindingKind::Const).unwrap();
        let err = Scope::child(&root).assign("x", Value::from(2.0)).unwrap_err();
        assert_eq!(err.message(), "Assignment to constant variable.");
    }

    #[test]
    fn let_cannot_be_redeclared_but_var_can() {
        let root = Scope::root();
        root.declare(&name("a"), Value::Null, BindingKind::Let).unwrap();
        assert!(root.declare(&name("a"), Value::Null, BindingKind::Let).is_err());
        root.declare(&name("b"), Value::Null, BindingKind::Var).unwrap();
        assert!(root.declare(&name("b"), Value::Null, BindingKind::Var).is_ok());
    }

    #[test]
    fn release_chain_clears_ancestors() {
        let root = Scope::root();
        root.declare(&name("x"), Value::from(1.0), BindingKind::Let).unwrap();
        let inner = Scope::child(&root);
        inner.declare(&name("y"), Value::from(2.0), BindingKind::Let).unwrap();
        inner.release_chain();
        assert!(inner.lookup("x").is_none());
        assert!(inner.lookup("y").is_none());
        assert!(root.local_names().is_empty());
    }

    #[test]
    fn assignment_to_undeclared_is_a_reference_error() {
        let err = Scope::root().assign("ghost", Value::Null).unwrap_err();
        assert_eq!(err.message(), "ghost is not defined");
    }
}
