//! Builders for the two projection shapes a selection can compile to.

use crate::error::Result;
use crate::query::expr::{Expr, Placeholder};
use crate::query::types::{FieldType, RecordType};

/// A named field expression handed to a projection builder.
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectedField {
    /// Output field name.
    pub name: String,
    /// Expression producing the field value.
    pub expr: Expr,
}

impl ProjectedField {
    /// Creates a projected field.
    pub fn new(name: impl Into<String>, expr: Expr) -> Self {
        Self {
            name: name.into(),
            expr,
        }
    }
}

/// Constructs projection expressions for selection nodes.
pub trait ProjectionBuilder {
    /// Builds an expression mapping every element of `sequence` (bound to
    /// `element`) to a record of `fields`.
    ///
    /// The result must tolerate a null or empty `sequence`.
    fn build_map(
        &self,
        sequence: &Expr,
        element: &Placeholder,
        fields: &[ProjectedField],
    ) -> Result<Expr>;

    /// Builds an expression constructing a record of `fields` evaluated
    /// against `base`, returning it with the record's type.
    ///
    /// The record type lists exactly `fields`, in order.
    fn build_record(&self, base: &Expr, fields: &[ProjectedField]) -> Result<(Expr, RecordType)>;
}

/// Default builder producing [`Expr::Map`] and [`Expr::Record`] nodes.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExprProjection;

impl ExprProjection {
    fn record(fields: &[ProjectedField]) -> (Expr, RecordType) {
        let ty = RecordType::anonymous(
            fields
                .iter()
                .map(|field| FieldType {
                    name: field.name.clone(),
                    ty: field.expr.ty(),
                })
                .collect(),
        );
        let expr = Expr::record(
            ty.clone(),
            fields
                .iter()
                .map(|field| (field.name.clone(), field.expr.clone()))
                .collect(),
        );
        (expr, ty)
    }
}

impl ProjectionBuilder for ExprProjection {
    fn build_map(
        &self,
        sequence: &Expr,
        element: &Placeholder,
        fields: &[ProjectedField],
    ) -> Result<Expr> {
        let (body, _) = Self::record(fields);
        Ok(Expr::map(sequence.clone(), element.clone(), body))
    }

    // Field expressions already reference `base` (or a placeholder it binds),
    // so the record itself does not need to mention it.
    fn build_record(&self, _base: &Expr, fields: &[ProjectedField]) -> Result<(Expr, RecordType)> {
        Ok(Self::record(fields))
    }
}
