use thiserror::Error;

/// Result alias used throughout the compiler.
pub type Result<T> = std::result::Result<T, QueryError>;

/// Errors raised while assembling, compiling, or executing a selection tree.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryError {
    /// A selection node was assembled in an invalid shape.
    #[error("cannot construct selection '{node}': {reason}")]
    Construction {
        /// Name of the offending node.
        node: String,
        /// What was wrong with it.
        reason: &'static str,
    },
    /// A fragment spread names a fragment that the table does not hold.
    #[error("fragment '{name}' not found")]
    FragmentNotFound {
        /// Fragment name as written at the spread site.
        name: String,
    },
    /// A fragment with the same name was already registered.
    #[error("fragment '{name}' is declared more than once")]
    DuplicateFragment {
        /// Fragment name.
        name: String,
    },
    /// A fragment spreads itself, directly or through other fragments.
    #[error("fragment '{name}' spreads itself (via {path})")]
    FragmentCycle {
        /// Fragment that closed the cycle.
        name: String,
        /// Spread chain leading back to `name`.
        path: String,
    },
    /// A placeholder was added twice to the same compiled expression.
    #[error("parameter '{placeholder}' already has a constant value")]
    DuplicateParameter {
        /// Placeholder name.
        placeholder: String,
    },
    /// Selection or fragment nesting went past the configured limit.
    #[error("{what} nesting exceeds {max}")]
    DepthExceeded {
        /// Which limit tripped.
        what: &'static str,
        /// Configured maximum.
        max: usize,
    },
    /// The schema has no field with this name on the context type.
    #[error("type '{type_name}' has no field '{field}'")]
    UnknownField {
        /// Context type name.
        type_name: String,
        /// Requested field.
        field: String,
    },
    /// Member access was built against a type that does not declare it.
    #[error("cannot access '{member}' on {ty}")]
    UnknownMember {
        /// Requested member.
        member: String,
        /// Rendered type of the target.
        ty: String,
    },
    /// The document has no operation with this name.
    #[error("operation '{name}' not found")]
    UnknownOperation {
        /// Requested operation name.
        name: String,
    },
    /// Evaluating the compiled expression failed.
    #[error(transparent)]
    Invocation(#[from] InvocationError),
}

/// Failures raised while evaluating a compiled expression.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvocationError {
    /// Argument list length does not match the parameter list.
    #[error("expected {expected} arguments, got {got}")]
    ArgumentCount {
        /// Number of declared parameters.
        expected: usize,
        /// Number of supplied arguments.
        got: usize,
    },
    /// The expression references a placeholder that was never bound.
    #[error("parameter '{0}' is not bound")]
    UnboundParameter(String),
    /// Member access on a null value.
    #[error("cannot read '{member}' of null")]
    NullNavigation {
        /// Member that was being read.
        member: String,
    },
    /// Member access on a record that lacks the member.
    #[error("record has no member '{member}'")]
    MissingMember {
        /// Member that was being read.
        member: String,
    },
    /// Operand had the wrong runtime shape for the operation.
    #[error("{context} expected {expected}, found {found}")]
    TypeMismatch {
        /// Operation being evaluated.
        context: &'static str,
        /// Expected shape.
        expected: &'static str,
        /// Actual runtime kind.
        found: &'static str,
    },
    /// Integer division by zero.
    #[error("division by zero")]
    DivisionByZero,
}

impl QueryError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Construction { .. } => "Construction",
            QueryError::FragmentNotFound { .. } => "FragmentNotFound",
            QueryError::DuplicateFragment { .. } => "DuplicateFragment",
            QueryError::FragmentCycle { .. } => "FragmentCycle",
            QueryError::DuplicateParameter { .. } => "DuplicateParameter",
            QueryError::DepthExceeded { .. } => "DepthExceeded",
            QueryError::UnknownField { .. } => "UnknownField",
            QueryError::UnknownMember { .. } => "UnknownMember",
            QueryError::UnknownOperation { .. } => "UnknownOperation",
            QueryError::Invocation(inner) => inner.code(),
        }
    }

    pub(crate) fn construction(node: impl Into<String>, reason: &'static str) -> Self {
        QueryError::Construction {
            node: node.into(),
            reason,
        }
    }

    pub(crate) fn fragment_not_found(name: impl Into<String>) -> Self {
        QueryError::FragmentNotFound { name: name.into() }
    }
}

impl InvocationError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            InvocationError::ArgumentCount { .. } => "ArgumentCount",
            InvocationError::UnboundParameter(_) => "UnboundParameter",
            InvocationError::NullNavigation { .. } => "NullNavigation",
            InvocationError::MissingMember { .. } => "MissingMember",
            InvocationError::TypeMismatch { .. } => "TypeMismatch",
            InvocationError::DivisionByZero => "DivisionByZero",
        }
    }

    pub(crate) fn mismatch(
        context: &'static str,
        expected: &'static str,
        found: &'static str,
    ) -> Self {
        InvocationError::TypeMismatch {
            context,
            expected,
            found,
        }
    }
}
