//! Scope chains and execution contexts (§10).
//!
//! A scope chain is a persistent linked list of object handles, shared
//! structurally between closures: pushing a `with` object or an activation
//! creates a new head node and leaves every captured chain untouched. The
//! Global object is always the tail.

use std::rc::Rc;

use crate::{heap::ObjectId, intern::StringId, object::Attr, value::Reference};

#[derive(Debug)]
struct ScopeLink {
    object: ObjectId,
    parent: Option<Rc<ScopeLink>>,
}

/// A shared, immutable scope chain. Cloning is O(1).
#[derive(Debug, Clone)]
pub struct ScopeChain {
    head: Option<Rc<ScopeLink>>,
}

impl ScopeChain {
    /// The empty chain; only used transiently while bootstrapping Global.
    #[must_use]
    pub fn empty() -> Self {
        Self { head: None }
    }

    /// A one-element chain (the Global object at interpreter init).
    #[must_use]
    pub fn root(global: ObjectId) -> Self {
        Self::empty().push(global)
    }

    /// Returns a new chain with `object` in front; `self` is unchanged.
    #[must_use]
    pub fn push(&self, object: ObjectId) -> Self {
        Self {
            head: Some(Rc::new(ScopeLink {
                object,
                parent: self.head.clone(),
            })),
        }
    }

    /// Front-to-back iteration; the tail (Global) comes last.
    pub fn iter(&self) -> impl Iterator<Item = ObjectId> + '_ {
        ScopeIter {
            next: self.head.as_deref(),
        }
    }
}

struct ScopeIter<'a> {
    next: Option<&'a ScopeLink>,
}

impl Iterator for ScopeIter<'_> {
    type Item = ObjectId;

    fn next(&mut self) -> Option<ObjectId> {
        let link = self.next?;
        self.next = link.parent.as_deref();
        Some(link.object)
    }
}

/// An execution context (§10.2): the `this` binding, the scope chain for
/// identifier resolution, and the variable object receiving `var` and
/// function declarations with `var_attrs`.
///
/// Contexts are values: calls clone the relevant parts rather than pushing
/// onto an interpreter-global stack, so `with` and `catch` scopes restore
/// themselves by simply dropping the modified copy.
#[derive(Debug, Clone)]
pub struct Context {
    pub this: ObjectId,
    pub scope: ScopeChain,
    pub variable: ObjectId,
    /// `DONT_DELETE` for function and program code, empty for eval code
    /// (§10.2.2: eval variables are deletable).
    pub var_attrs: Attr,
}

impl Context {
    /// Returns this context with `object` pushed on the scope front, for
    /// `with` statements and catch blocks.
    #[must_use]
    pub fn with_scope_front(&self, object: ObjectId) -> Self {
        Self {
            this: self.this,
            scope: self.scope.push(object),
            variable: self.variable,
            var_attrs: self.var_attrs,
        }
    }
}

/// Builds the reference a scope-chain lookup produces for `name`: the
/// caller supplies the first object whose [[HasProperty]] answered true, or
/// `None` when the chain is exhausted (§10.1.4).
#[must_use]
pub fn unresolved(name: StringId) -> Reference {
    Reference {
        base: None,
        property: name,
    }
}
