//! Lexical scope chain
//!
//! Each block, function call and loop iteration gets a child [`Scope`];
//! lookups walk the parent chain. Bindings remember whether they may be
//! reassigned so `const` is enforced at assignment time.
//!
//! Closures hold their defining scope and scopes hold closures, so a run
//! leaves reference cycles behind. A [`Scope::tracked_child`] records every
//! scope derived from it; [`Scope::release`] empties all of them at once.

use crate::value::Value;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Failure to declare or assign a binding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeError {
    /// Name is not bound anywhere in the chain
    #[error("{0} is not defined")]
    Undefined(String),

    /// Binding was declared with `const`
    #[error("Assignment to constant variable '{0}'")]
    Constant(String),

    /// `let`/`const` declared twice in one scope
    #[error("Identifier '{0}' has already been declared")]
    Redeclared(String),
}

#[derive(Debug, Clone)]
struct Binding {
    value: Value,
    mutable: bool,
}

#[derive(Debug, Default)]
struct ScopeInner {
    bindings: RwLock<HashMap<String, Binding>>,
    parent: Option<Scope>,
    tracker: Option<Arc<Tracker>>,
}

/// Scopes derived from one tracked root
#[derive(Debug, Default)]
struct Tracker {
    scopes: Mutex<Vec<Weak<ScopeInner>>>,
}

impl Tracker {
    fn track(&self, scope: &Arc<ScopeInner>) {
        let mut scopes = self.scopes.lock();
        if scopes.len() == scopes.capacity() {
            scopes.retain(|s| s.strong_count() > 0);
        }
        scopes.push(Arc::downgrade(scope));
    }

    fn live(&self) -> Vec<Arc<ScopeInner>> {
        std::mem::take(&mut *self.scopes.lock())
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }
}

/// One level of the scope chain
///
/// Cheap to clone; clones refer to the same bindings.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    /// Create root scope
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create root scope from name/value pairs; all bindings are constant
    pub fn with_bindings(bindings: impl IntoIterator<Item = (String, Value)>) -> Self {
        let scope = Self::new();
        {
            let mut map = scope.inner.bindings.write();
            for (name, value) in bindings {
                map.insert(name, Binding { value, mutable: false });
            }
        }
        scope
    }

    /// Create child scope
    #[must_use]
    pub fn child(&self) -> Self {
        self.derive(HashMap::new(), Some(self.clone()), self.inner.tracker.clone())
    }

    /// Create child scope that records every scope derived from it
    #[must_use]
    pub fn tracked_child(&self) -> Self {
        self.derive(HashMap::new(), Some(self.clone()), Some(Arc::default()))
    }

    /// Sibling scope holding copies of this scope's own bindings
    ///
    /// Used for per-iteration `let` bindings in `for` loops so closures
    /// created in one iteration keep that iteration's values.
    #[must_use]
    pub fn fork(&self) -> Self {
        let bindings = self.inner.bindings.read().clone();
        self.derive(bindings, self.inner.parent.clone(), self.inner.tracker.clone())
    }

    fn derive(
        &self,
        bindings: HashMap<String, Binding>,
        parent: Option<Scope>,
        tracker: Option<Arc<Tracker>>,
    ) -> Self {
        let inner = Arc::new(ScopeInner {
            bindings: RwLock::new(bindings),
            parent,
            tracker,
        });
        if let Some(tracker) = &inner.tracker {
            tracker.track(&inner);
        }
        Self { inner }
    }

    /// Declare a binding in this scope
    ///
    /// `var` (`redeclare = true`) silently replaces an existing binding.
    ///
    /// # Errors
    /// Returns [`ScopeError::Redeclared`] when the name already exists in
    /// this scope and `redeclare` is false.
    pub fn declare(
        &self,
        name: &str,
        value: Value,
        mutable: bool,
        redeclare: bool,
    ) -> Result<(), ScopeError> {
        let mut bindings = self.inner.bindings.write();
        if !redeclare && bindings.contains_key(name) {
            return Err(ScopeError::Redeclared(name.to_string()));
        }
        bindings.insert(name.to_string(), Binding { value, mutable });
        Ok(())
    }

    /// Look up a binding through the chain
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut scope = self;
        loop {
            if let Some(binding) = scope.inner.bindings.read().get(name) {
                return Some(binding.value.clone());
            }
            scope = scope.inner.parent.as_ref()?;
        }
    }

    /// Check if a name is bound anywhere in the chain
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Reassign the nearest binding for `name`
    ///
    /// # Errors
    /// Returns [`ScopeError::Undefined`] for unknown names and
    /// [`ScopeError::Constant`] for `const` bindings.
    pub fn assign(&self, name: &str, value: Value) -> Result<(), ScopeError> {
        let mut scope = self;
        loop {
            if let Some(binding) = scope.inner.bindings.write().get_mut(name) {
                if !binding.mutable {
                    return Err(ScopeError::Constant(name.to_string()));
                }
                binding.value = value;
                return Ok(());
            }
            scope = scope
                .inner
                .parent
                .as_ref()
                .ok_or_else(|| ScopeError::Undefined(name.to_string()))?;
        }
    }

    /// Names bound directly in this scope
    #[must_use]
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.bindings.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop every binding in this scope
    ///
    /// Closures capture their defining scope, so a function stored in the
    /// scope it closes over forms a reference cycle until cleared.
    pub fn clear(&self) {
        let bindings = std::mem::take(&mut *self.inner.bindings.write());
        drop(bindings);
    }

    /// Drop the bindings of every scope tracked with this one
    ///
    /// All tracked scopes stay alive until every one of them is empty, so
    /// releasing never recurses through chains of closures. Untracked
    /// scopes only clear themselves.
    pub fn release(&self) {
        let Some(tracker) = &self.inner.tracker else {
            self.clear();
            return;
        };
        let live = tracker.live();
        let bindings: Vec<_> = live
            .iter()
            .map(|scope| std::mem::take(&mut *scope.bindings.write()))
            .collect();
        drop(bindings);
        drop(live);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_parents() {
        let root = Scope::with_bindings([("x".to_string(), Value::Number(1.0))]);
        let child = root.child().child();
        assert!(matches!(child.get("x"), Some(Value::Number(n)) if n == 1.0));
        assert!(child.get("y").is_none());
    }

    #[test]
    fn shadowing_does_not_touch_parent() {
        let root = Scope::new();
        root.declare("x", Value::Number(1.0), true, false).unwrap();
        let child = root.child();
        child.declare("x", Value::Number(2.0), true, false).unwrap();

        assert!(matches!(child.get("x"), Some(Value::Number(n)) if n == 2.0));
        assert!(matches!(root.get("x"), Some(Value::Number(n)) if n == 1.0));
    }

    #[test]
    fn assign_updates_nearest_binding() {
        let root = Scope::new();
        root.declare("count", Value::Number(0.0), true, false).unwrap();
        root.child().assign("count", Value::Number(5.0)).unwrap();
        assert!(matches!(root.get("count"), Some(Value::Number(n)) if n == 5.0));
    }

    #[test]
    fn const_and_undefined_assignments_fail() {
        let root = Scope::with_bindings([("codemode".to_string(), Value::Null)]);
        assert_eq!(
            root.assign("codemode", Value::Null),
            Err(ScopeError::Constant("codemode".to_string()))
        );
        assert_eq!(
            root.assign("fetch", Value::Null),
            Err(ScopeError::Undefined("fetch".to_string()))
        );
    }

    #[test]
    fn let_redeclaration_fails_var_replaces() {
        let scope = Scope::new();
        scope.declare("a", Value::Null, true, false).unwrap();
        assert!(scope.declare("a", Value::Null, true, false).is_err());
        assert!(scope.declare("a", Value::Bool(true), true, true).is_ok());
    }

    #[test]
    fn fork_copies_bindings() {
        let root = Scope::new();
        let loop_scope = root.child();
        loop_scope.declare("i", Value::Number(0.0), true, false).unwrap();

        let next = loop_scope.fork();
        next.assign("i", Value::Number(1.0)).unwrap();

        assert!(matches!(loop_scope.get("i"), Some(Value::Number(n)) if n == 0.0));
        assert!(matches!(next.get("i"), Some(Value::Number(n)) if n == 1.0));
    }

    fn closure_over(scope: &Scope) -> Value {
        let program = crate::parse("function f() {}").unwrap();
        let crate::ast::Stmt::Function(def) = &program.body[0] else {
            unreachable!("parsed a function declaration");
        };
        Value::Function(crate::value::Function::Closure(Arc::new(crate::value::Closure {
            def: def.clone(),
            scope: scope.clone(),
        })))
    }

    #[test]
    fn release_breaks_closure_cycles_in_every_tracked_scope() {
        let globals = Scope::with_bindings([("x".to_string(), Value::Null)]);
        let run = globals.tracked_child();
        let block = run.child().child();
        block.declare("f", closure_over(&block), true, false).unwrap();
        let weak = Arc::downgrade(&block.inner);
        drop(block);

        assert!(weak.upgrade().is_some());
        run.release();
        assert!(weak.upgrade().is_none());
        assert!(run.local_names().is_empty());
        assert_eq!(Arc::strong_count(&globals.inner), 2);
        drop(run);
        assert_eq!(Arc::strong_count(&globals.inner), 1);
    }

    #[test]
    fn untracked_scopes_release_only_themselves() {
        let root = Scope::new();
        let child = root.child();
        root.declare("a", Value::Null, true, false).unwrap();
        child.declare("b", Value::Null, true, false).unwrap();
        child.release();
        assert!(child.local_names().is_empty());
        assert_eq!(root.local_names(), vec!["a".to_string()]);
    }

    #[test]
    fn tracker_prunes_dropped_scopes() {
        let run = Scope::new().tracked_child();
        for _ in 0..10_000 {
            drop(run.child());
        }
        let tracker = run.inner.tracker.as_ref().unwrap();
        assert!(tracker.scopes.lock().len() < 10_000);
    }

    #[test]
    fn clear_drops_local_bindings_only() {
        let root = Scope::with_bindings([("x".to_string(), Value::Null)]);
        let child = root.child();
        child.declare("y", Value::Null, true, false).unwrap();
        child.clear();
        assert!(child.local_names().is_empty());
        assert!(child.contains("x"));
    }
}
