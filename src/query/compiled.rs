//! Expression paired with the literal values extracted from it.

use indexmap::IndexMap;

use crate::error::{QueryError, Result};
use crate::query::expr::{Expr, Placeholder};
use crate::query::types::ValueType;
use crate::query::value::Value;

/// An expression plus the constants its placeholders stand for.
///
/// Literals pulled out of a tree by an earlier stage stay out of the tree
/// itself; they travel here and are supplied positionally at invocation.
#[derive(Clone, Debug)]
pub struct CompiledExpression {
    expr: Expr,
    constants: IndexMap<Placeholder, Value>,
}

impl CompiledExpression {
    /// Wraps a raw expression with an empty constant set.
    ///
    /// Any constants that belonged to an earlier wrapper around `expr` are
    /// not carried over.
    pub fn wrap(expr: Expr) -> Self {
        Self {
            expr,
            constants: IndexMap::new(),
        }
    }

    /// Extracts `value` behind a fresh placeholder.
    ///
    /// The resulting expression is a bare parameter reference and the
    /// constant set holds the single `placeholder -> value` entry.
    pub fn literal(value: impl Into<Value>) -> Self {
        let value = value.into();
        let placeholder = Placeholder::new("const", value.static_type());
        let mut constants = IndexMap::new();
        constants.insert(placeholder.clone(), value);
        Self {
            expr: Expr::Parameter(placeholder),
            constants,
        }
    }

    /// Borrows the underlying expression.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Consumes the wrapper, returning the expression and dropping constants.
    pub fn unwrap(self) -> Expr {
        self.expr
    }

    /// Consumes the wrapper, returning both halves.
    pub fn into_parts(self) -> (Expr, Vec<(Placeholder, Value)>) {
        (self.expr, self.constants.into_iter().collect())
    }

    /// Records a constant for `placeholder`.
    pub fn add_constant(&mut self, placeholder: Placeholder, value: Value) -> Result<()> {
        if self.constants.contains_key(&placeholder) {
            return Err(QueryError::DuplicateParameter {
                placeholder: placeholder.name().to_owned(),
            });
        }
        self.constants.insert(placeholder, value);
        Ok(())
    }

    /// Builder form of [`add_constant`](Self::add_constant).
    pub fn with_constant(mut self, placeholder: Placeholder, value: Value) -> Result<Self> {
        self.add_constant(placeholder, value)?;
        Ok(self)
    }

    /// Constants in insertion order.
    pub fn constants(&self) -> impl Iterator<Item = (&Placeholder, &Value)> {
        self.constants.iter()
    }

    /// Number of constants.
    pub fn constant_count(&self) -> usize {
        self.constants.len()
    }

    /// Static type of the wrapped expression.
    pub fn ty(&self) -> ValueType {
        self.expr.ty()
    }
}

// Constant order is the binding order, so equality is order-sensitive.
impl PartialEq for CompiledExpression {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr && self.constants.iter().eq(other.constants.iter())
    }
}
