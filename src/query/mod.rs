#![forbid(unsafe_code)]

//! Selection compilation and execution.
//!
//! This module turns trees of selected fields, possibly spreading named
//! fragments, into expression trees and evaluates them against in-memory
//! values.

/// Expression wrapper carrying extracted constants.
pub mod compiled;

/// Compilation of expressions into positional callables.
pub mod eval;

/// Expression tree grammar.
///
/// Closed set of node kinds shared by projections, rebasing, and evaluation.
pub mod expr;

/// Named, reusable fragments and fragment tables.
pub mod fragment;

/// Selection nodes and the lazy build that turns them into expressions.
pub mod node;

/// Document-level execution across top-level fields.
pub mod operation;

/// Projection builders for record and sequence selections.
pub mod projection;

/// Placeholder substitution over expression trees.
pub mod rebase;

/// Schema lookups mapping field names to backing expressions.
pub mod schema;

/// Static types of expressions.
pub mod types;

/// Runtime values.
pub mod value;

pub use compiled::CompiledExpression;
pub use expr::{Expr, Placeholder};
pub use fragment::{Fragment, FragmentStore, FragmentTable};
pub use node::{BuildScope, BuildState, Selection, SelectionNode};
pub use operation::{Operation, QueryDocument, QueryResponse};
pub use value::{Record, Value};
