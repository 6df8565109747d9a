//! Field visibility by caller-defined access scope hierarchies.
//!
//! Scopes form an explicit tree: each scope names its parent. A caller scope
//! grants access to a field scope when the field scope is the caller scope
//! itself or one of its ancestors, so more specific scopes see strictly more.
//!
//! ```
//! use formgate_core::AccessScope;
//!
//! let public = AccessScope::root("public");
//! let member = public.child("member");
//! let admin = member.child("admin");
//!
//! assert!(admin.grants(&member));
//! assert!(!member.grants(&admin));
//! ```

use std::fmt;
use std::sync::Arc;

struct ScopeNode {
    name: String,
    parent: Option<AccessScope>,
}

/// A node in an access scope hierarchy.
#[derive(Clone)]
pub struct AccessScope(Arc<ScopeNode>);

impl AccessScope {
    /// Creates a scope with no parent.
    #[must_use]
    pub fn root(name: impl Into<String>) -> Self {
        Self(Arc::new(ScopeNode {
            name: name.into(),
            parent: None,
        }))
    }

    /// Creates a scope nested under `self`.
    #[must_use]
    pub fn child(&self, name: impl Into<String>) -> Self {
        Self(Arc::new(ScopeNode {
            name: name.into(),
            parent: Some(self.clone()),
        }))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[must_use]
    pub fn parent(&self) -> Option<&AccessScope> {
        self.0.parent.as_ref()
    }

    /// Iterates `self` followed by each ancestor up to the root.
    pub fn ancestors(&self) -> impl Iterator<Item = &AccessScope> {
        std::iter::successors(Some(self), |scope| scope.parent())
    }

    /// Whether a caller holding `self` may see a field restricted to `required`.
    #[must_use]
    pub fn grants(&self, required: &AccessScope) -> bool {
        self.ancestors().any(|scope| scope == required)
    }
}

/// Visibility of a field for a caller.
///
/// A caller without a scope has full access; a field without a scope is
/// unrestricted.
#[must_use]
pub fn is_visible(caller: Option<&AccessScope>, field: Option<&AccessScope>) -> bool {
    match (caller, field) {
        (None, _) | (_, None) => true,
        (Some(caller), Some(field)) => caller.grants(field),
    }
}

impl PartialEq for AccessScope {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.name == other.0.name && self.0.parent == other.0.parent)
    }
}

impl Eq for AccessScope {}

impl fmt::Display for AccessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(parent) = self.parent() {
            write!(f, "{parent}/")?;
        }
        f.write_str(self.name())
    }
}

impl fmt::Debug for AccessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessScope({self})")
    }
}
