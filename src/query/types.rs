//! Static types carried by expression trees.
//!
//! Every [`Expr`](crate::query::expr::Expr) can report its [`ValueType`]
//! without evaluation. Records are structural: two record types are equal
//! when their names and ordered field lists match.

use std::fmt;

/// Static type of an expression or placeholder.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Type not known statically; checked at evaluation time.
    Any,
    /// Boolean.
    Bool,
    /// Signed 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// UTF-8 string.
    String,
    /// Named or anonymous record with ordered fields.
    Record(RecordType),
    /// Homogeneous sequence.
    List(Box<ValueType>),
}

/// Ordered record shape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RecordType {
    /// Type name, `None` for records synthesised by projections.
    pub name: Option<String>,
    /// Fields in declaration order.
    pub fields: Vec<FieldType>,
}

/// Single field of a [`RecordType`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldType {
    /// Field name.
    pub name: String,
    /// Field type.
    pub ty: ValueType,
}

impl RecordType {
    /// Creates an empty record type with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            fields: Vec::new(),
        }
    }

    /// Creates an anonymous record type from ordered fields.
    pub fn anonymous(fields: Vec<FieldType>) -> Self {
        Self { name: None, fields }
    }

    /// Appends a field, returning the updated type.
    pub fn with_field(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.fields.push(FieldType {
            name: name.into(),
            ty,
        });
        self
    }

    /// Returns the type of the first field called `name`.
    pub fn field(&self, name: &str) -> Option<&ValueType> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.ty)
    }

    /// Display name used in diagnostics.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

impl ValueType {
    /// Wraps `inner` in a list type.
    pub fn list_of(inner: ValueType) -> Self {
        ValueType::List(Box::new(inner))
    }

    /// Element type when this is a sequence.
    pub fn element(&self) -> Option<&ValueType> {
        match self {
            ValueType::List(inner) => Some(inner),
            _ => None,
        }
    }

    /// Record shape when this is a record.
    pub fn as_record(&self) -> Option<&RecordType> {
        match self {
            ValueType::Record(record) => Some(record),
            _ => None,
        }
    }
}

/// Returns `true` when values of `ty` are sequences that projections map over.
pub fn is_enumerable(ty: &ValueType) -> bool {
    matches!(ty, ValueType::List(_))
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => write!(f, "any"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Int => write!(f, "int"),
            ValueType::Float => write!(f, "float"),
            ValueType::String => write!(f, "string"),
            ValueType::Record(record) => write!(f, "{}", record.display_name()),
            ValueType::List(inner) => write!(f, "[{inner}]"),
        }
    }
}

impl From<RecordType> for ValueType {
    fn from(value: RecordType) -> Self {
        ValueType::Record(value)
    }
}
