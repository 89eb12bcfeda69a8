//! Field-name to backing-expression resolution.
//!
//! Document builders ask a [`SchemaProvider`] for the expression behind each
//! field they read so that selection nodes can be created with the right
//! base. Plain record members resolve to member access. Computed fields are
//! expression templates written against their own placeholder and rebased
//! onto the context they are read from.

use std::collections::HashMap;

use crate::error::{QueryError, Result};
use crate::query::compiled::CompiledExpression;
use crate::query::expr::{Expr, Placeholder};
use crate::query::node::SelectionNode;
use crate::query::rebase::rebase;
use crate::query::types::is_enumerable;

/// Expression backing a field, as seen from one context.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldBinding {
    /// Expression producing the field value.
    pub expression: CompiledExpression,
    /// Whether the field yields a sequence.
    pub is_sequence: bool,
}

impl FieldBinding {
    /// Creates a selection node named `name` over this binding.
    ///
    /// The node has no child selections yet; add them with
    /// [`SelectionNode::add_field`].
    pub fn into_node(self, name: impl Into<String>) -> Result<SelectionNode> {
        SelectionNode::new(name, Some(self.expression), Vec::new())
    }
}

/// Resolves field names against a context expression.
pub trait SchemaProvider {
    /// Returns the binding for field `name` read from `context`.
    fn field(&self, context: &Expr, name: &str) -> Result<FieldBinding>;
}

/// Schema built in memory, used for tests or embedding.
#[derive(Clone, Debug, Default)]
pub struct InMemorySchema {
    computed: HashMap<(String, String), (Placeholder, Expr)>,
}

impl InMemorySchema {
    /// Creates a schema that only exposes record members.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `field` on `type_name` as `template`, written against
    /// `context`.
    pub fn with_computed_field(
        mut self,
        type_name: impl Into<String>,
        field: impl Into<String>,
        context: Placeholder,
        template: Expr,
    ) -> Self {
        self.computed
            .insert((type_name.into(), field.into()), (context, template));
        self
    }
}

impl SchemaProvider for InMemorySchema {
    fn field(&self, context: &Expr, name: &str) -> Result<FieldBinding> {
        let ty = context.ty();
        let unknown = || QueryError::UnknownField {
            type_name: ty.to_string(),
            field: name.to_owned(),
        };
        let record = ty.as_record().ok_or_else(unknown)?;
        let key = (record.display_name().to_owned(), name.to_owned());
        let expr = match self.computed.get(&key) {
            Some((placeholder, template)) => rebase(template, placeholder, context),
            None if record.field(name).is_some() => Expr::member(context.clone(), name)?,
            None => return Err(unknown()),
        };
        Ok(FieldBinding {
            is_sequence: is_enumerable(&expr.ty()),
            expression: CompiledExpression::wrap(expr),
        })
    }
}
