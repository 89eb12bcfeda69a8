//! Compiles hierarchical field selections into expression trees.
//!
//! A selection tree names fields to read from a context value, possibly
//! through reusable fragments. Each node lazily compiles into a single
//! expression that either constructs a record or maps over a sequence, and
//! then evaluates against in-memory [`query::Value`]s. Literal values stay
//! out of the compiled tree and are bound positionally at execution.

#![warn(missing_docs)]

pub mod error;
pub mod options;
pub mod query;

pub use error::{InvocationError, QueryError, Result};
pub use options::{CompilerOptions, ConfigError};
