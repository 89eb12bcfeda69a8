//! Document-level execution of top-level selections.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{QueryError, Result};
use crate::options::CompilerOptions;
use crate::query::expr::Placeholder;
use crate::query::fragment::{Fragment, FragmentStore};
use crate::query::node::{BuildScope, SelectionNode};
use crate::query::value::{Record, Value};

/// Failure of one top-level field.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldError {
    /// Top-level field that failed.
    pub field: String,
    /// Machine-readable error code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
}

impl FieldError {
    fn new(field: &str, err: &QueryError) -> Self {
        Self {
            field: field.to_owned(),
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Result of running an operation.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryResponse {
    /// Record keyed by top-level field name; failed fields are `null`.
    pub data: Value,
    /// Per-field failures.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl QueryResponse {
    /// Renders the response as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Top-level selections evaluated against one root context.
#[derive(Clone, Debug)]
pub struct Operation {
    name: Option<String>,
    context: Placeholder,
    fields: Vec<SelectionNode>,
}

impl Operation {
    /// Creates an operation whose fields read from `context`.
    pub fn new(name: Option<String>, context: Placeholder) -> Self {
        Self {
            name,
            context,
            fields: Vec::new(),
        }
    }

    /// Operation name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Root context placeholder.
    pub fn context(&self) -> &Placeholder {
        &self.context
    }

    /// Top-level fields.
    pub fn fields(&self) -> &[SelectionNode] {
        &self.fields
    }

    /// Adds a top-level field, appending the root context to its required
    /// parameters unless it already lists it.
    ///
    /// Execution supplies only the root value, so a field that requires
    /// further parameters fails with an argument count error.
    pub fn add_field(&mut self, mut node: SelectionNode) {
        if !node.required_parameters().contains(&self.context) {
            node.add_required_parameter(self.context.clone());
        }
        self.fields.push(node);
    }

    /// Executes every top-level field against `root`.
    ///
    /// A failing field contributes `null` data and a [`FieldError`]; the
    /// remaining fields still run.
    pub fn execute(&mut self, scope: &mut BuildScope<'_>, root: &Value) -> QueryResponse {
        let mut data = Record::new();
        let mut errors = Vec::new();
        for field in &mut self.fields {
            let value = match field.execute(scope, std::slice::from_ref(root)) {
                Ok(value) => value,
                Err(err) => {
                    warn!(field = field.name(), code = err.code(), %err, "field failed");
                    errors.push(FieldError::new(field.name(), &err));
                    Value::Null
                }
            };
            data.push(field.name(), value);
        }
        debug!(
            operation = self.name.as_deref().unwrap_or("<anonymous>"),
            fields = self.fields.len(),
            errors = errors.len(),
            "operation executed"
        );
        QueryResponse {
            data: Value::Record(data),
            errors,
        }
    }
}

/// Operations and fragments of one query document.
///
/// Operations and fragments may be added in any order; spreads resolve when
/// an operation is executed.
#[derive(Clone, Debug, Default)]
pub struct QueryDocument {
    fragments: FragmentStore,
    operations: Vec<Operation>,
    options: CompilerOptions,
}

impl QueryDocument {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `options` for every build this document runs.
    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    /// Limits applied when executing operations.
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Declares a fragment.
    pub fn add_fragment(&mut self, fragment: Fragment) -> Result<()> {
        self.fragments.insert(fragment)
    }

    /// Adds an operation.
    pub fn add_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    /// Declared fragments.
    pub fn fragments(&self) -> &FragmentStore {
        &self.fragments
    }

    /// Operations in document order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Runs the named operation, or the first one when `name` is `None`.
    pub fn execute(&mut self, name: Option<&str>, root: &Value) -> Result<QueryResponse> {
        let operation = match name {
            Some(name) => self
                .operations
                .iter_mut()
                .find(|op| op.name() == Some(name)),
            None => self.operations.first_mut(),
        }
        .ok_or_else(|| QueryError::UnknownOperation {
            name: name.unwrap_or("<default>").to_owned(),
        })?;
        let mut scope = BuildScope::new(&self.fragments).with_options(&self.options);
        Ok(operation.execute(&mut scope, root))
    }
}
