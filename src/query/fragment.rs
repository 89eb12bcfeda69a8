//! Named, reusable selection fragments.
//!
//! Fragment names are resolved when a selection is first built, not when it
//! is assembled. A document may therefore spread a fragment before the
//! fragment is declared, as long as the table is complete by build time.

use indexmap::IndexMap;

use crate::error::{QueryError, Result};
use crate::query::expr::Placeholder;
use crate::query::node::SelectionNode;

/// Reusable list of field templates written against `select_context`.
///
/// Inlining clones and rebases the templates; the fragment itself is never
/// modified after construction.
#[derive(Clone, Debug)]
pub struct Fragment {
    name: String,
    fields: Vec<SelectionNode>,
    select_context: Placeholder,
}

impl Fragment {
    /// Creates a fragment whose fields reference `select_context`.
    pub fn new(
        name: impl Into<String>,
        select_context: Placeholder,
        fields: Vec<SelectionNode>,
    ) -> Self {
        Self {
            name: name.into(),
            fields,
            select_context,
        }
    }

    /// Fragment name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field templates in declaration order.
    pub fn fields(&self) -> &[SelectionNode] {
        &self.fields
    }

    /// Placeholder the templates are written against.
    pub fn select_context(&self) -> &Placeholder {
        &self.select_context
    }
}

/// Name-to-fragment lookup consulted during selection builds.
pub trait FragmentTable {
    /// Returns the fragment called `name`, if declared.
    fn lookup(&self, name: &str) -> Option<&Fragment>;
}

/// Fragments of one document, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct FragmentStore {
    fragments: IndexMap<String, Fragment>,
}

impl FragmentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fragment. Names must be unique within the store.
    pub fn insert(&mut self, fragment: Fragment) -> Result<()> {
        if self.fragments.contains_key(fragment.name()) {
            return Err(QueryError::DuplicateFragment {
                name: fragment.name,
            });
        }
        self.fragments.insert(fragment.name.clone(), fragment);
        Ok(())
    }

    /// Number of registered fragments.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Returns `true` when no fragments are registered.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Iterates fragments in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Fragment> {
        self.fragments.values()
    }
}

impl FragmentTable for FragmentStore {
    fn lookup(&self, name: &str) -> Option<&Fragment> {
        self.fragments.get(name)
    }
}
