//! Closed expression grammar that selections compile into.
//!
//! Trees are immutable values: transformations such as
//! [`rebase`](crate::query::rebase::rebase) build new trees and never edit
//! the input. Each node can report its static [`ValueType`] via
//! [`Expr::ty`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{QueryError, Result};
use crate::query::types::{RecordType, ValueType};
use crate::query::value::Value;

static NEXT_PLACEHOLDER_ID: AtomicU64 = AtomicU64::new(1);

/// Named parameter slot bound positionally at invocation time.
///
/// Identity is the allocation id, so two placeholders with the same name
/// and type are still distinct parameters.
#[derive(Clone, Debug)]
pub struct Placeholder {
    id: u64,
    name: Arc<str>,
    ty: ValueType,
}

impl Placeholder {
    /// Allocates a fresh placeholder.
    pub fn new(name: impl AsRef<str>, ty: ValueType) -> Self {
        Self {
            id: NEXT_PLACEHOLDER_ID.fetch_add(1, Ordering::Relaxed),
            name: Arc::from(name.as_ref()),
            ty,
        }
    }

    /// Unique identity of this placeholder.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Human-readable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Static type of values bound to this placeholder.
    pub fn ty(&self) -> &ValueType {
        &self.ty
    }
}

impl PartialEq for Placeholder {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Placeholder {}

impl Hash for Placeholder {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.name)
    }
}

/// Binary operators.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum BinaryOp {
    /// Structural equality.
    Eq,
    /// Structural inequality.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
    /// Logical and.
    And,
    /// Logical or.
    Or,
    /// Addition, or concatenation for strings.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division.
    Div,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }

    fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div
        )
    }
}

/// Built-in functions callable from expressions.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Function {
    /// Element count of a list or character count of a string.
    Len,
    /// Lowercases a string.
    Lower,
    /// Uppercases a string.
    Upper,
    /// Concatenates string arguments.
    Concat,
    /// First non-null argument.
    Coalesce,
}

impl Function {
    /// Name used when rendering expressions.
    pub fn name(self) -> &'static str {
        match self {
            Function::Len => "len",
            Function::Lower => "lower",
            Function::Upper => "upper",
            Function::Concat => "concat",
            Function::Coalesce => "coalesce",
        }
    }

    fn return_type(self, args: &[Expr]) -> ValueType {
        match self {
            Function::Len => ValueType::Int,
            Function::Lower | Function::Upper | Function::Concat => ValueType::String,
            Function::Coalesce => args
                .iter()
                .map(Expr::ty)
                .find(|ty| *ty != ValueType::Any)
                .unwrap_or(ValueType::Any),
        }
    }
}

/// Expression tree node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// Reference to a placeholder parameter.
    Parameter(Placeholder),
    /// Literal value with its static type.
    Constant {
        /// The literal.
        value: Value,
        /// Static type; lets a `null` carry the type it stands in for.
        ty: ValueType,
    },
    /// Member read on a record.
    Member {
        /// Record-valued target.
        target: Box<Expr>,
        /// Member name.
        member: String,
        /// Static type of the member.
        ty: ValueType,
    },
    /// `if test { if_true } else { if_false }`.
    Conditional {
        /// Boolean condition.
        test: Box<Expr>,
        /// Result when `test` holds.
        if_true: Box<Expr>,
        /// Result otherwise.
        if_false: Box<Expr>,
    },
    /// Binary operator application.
    Binary {
        /// Operator.
        op: BinaryOp,
        /// Left operand.
        lhs: Box<Expr>,
        /// Right operand.
        rhs: Box<Expr>,
    },
    /// Built-in function call.
    Call {
        /// Called function.
        function: Function,
        /// Arguments in order.
        args: Vec<Expr>,
    },
    /// Projects every element of `source` through `body`.
    Map {
        /// Sequence-valued source.
        source: Box<Expr>,
        /// Placeholder bound to each element while evaluating `body`.
        element: Placeholder,
        /// Per-element projection.
        body: Box<Expr>,
    },
    /// Constructs a record from ordered field expressions.
    Record {
        /// Shape of the constructed record.
        ty: RecordType,
        /// Field expressions, same order as `ty.fields`.
        fields: Vec<(String, Expr)>,
    },
}

impl Expr {
    /// References `placeholder`.
    pub fn param(placeholder: &Placeholder) -> Self {
        Expr::Parameter(placeholder.clone())
    }

    /// Literal whose type is inferred from the value.
    pub fn constant(value: impl Into<Value>) -> Self {
        let value = value.into();
        let ty = value.static_type();
        Expr::Constant { value, ty }
    }

    /// `null` typed as `ty`.
    pub fn null_of(ty: ValueType) -> Self {
        Expr::Constant {
            value: Value::Null,
            ty,
        }
    }

    /// Member read, type-checked against the target's record shape.
    pub fn member(target: Expr, member: impl Into<String>) -> Result<Self> {
        let member = member.into();
        let ty = match target.ty() {
            ValueType::Any => ValueType::Any,
            ValueType::Record(record) => match record.field(&member) {
                Some(ty) => ty.clone(),
                None => {
                    return Err(QueryError::UnknownMember {
                        member,
                        ty: record.display_name().to_owned(),
                    })
                }
            },
            other => {
                return Err(QueryError::UnknownMember {
                    member,
                    ty: other.to_string(),
                })
            }
        };
        Ok(Expr::Member {
            target: Box::new(target),
            member,
            ty,
        })
    }

    /// Conditional expression.
    pub fn conditional(test: Expr, if_true: Expr, if_false: Expr) -> Self {
        Expr::Conditional {
            test: Box::new(test),
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
        }
    }

    /// Binary operator application.
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Function call.
    pub fn call(function: Function, args: Vec<Expr>) -> Self {
        Expr::Call { function, args }
    }

    /// Sequence map.
    pub fn map(source: Expr, element: Placeholder, body: Expr) -> Self {
        Expr::Map {
            source: Box::new(source),
            element,
            body: Box::new(body),
        }
    }

    /// Record construction.
    pub fn record(ty: RecordType, fields: Vec<(String, Expr)>) -> Self {
        Expr::Record { ty, fields }
    }

    /// Static type of the expression.
    pub fn ty(&self) -> ValueType {
        match self {
            Expr::Parameter(p) => p.ty().clone(),
            Expr::Constant { ty, .. } | Expr::Member { ty, .. } => ty.clone(),
            Expr::Conditional {
                if_true, if_false, ..
            } => match if_true.ty() {
                ValueType::Any => if_false.ty(),
                ty => ty,
            },
            Expr::Binary { op, lhs, rhs } => {
                if !op.is_arithmetic() {
                    return ValueType::Bool;
                }
                match (lhs.ty(), rhs.ty()) {
                    (ValueType::Int, ValueType::Int) => ValueType::Int,
                    (ValueType::String, ValueType::String) if *op == BinaryOp::Add => {
                        ValueType::String
                    }
                    (ValueType::Int | ValueType::Float, ValueType::Int | ValueType::Float) => {
                        ValueType::Float
                    }
                    _ => ValueType::Any,
                }
            }
            Expr::Call { function, args } => function.return_type(args),
            Expr::Map { body, .. } => ValueType::list_of(body.ty()),
            Expr::Record { ty, .. } => ValueType::Record(ty.clone()),
        }
    }

    /// Returns `true` if `placeholder` is referenced anywhere in the tree.
    pub fn references(&self, placeholder: &Placeholder) -> bool {
        match self {
            Expr::Parameter(p) => p == placeholder,
            Expr::Constant { .. } => false,
            Expr::Member { target, .. } => target.references(placeholder),
            Expr::Conditional {
                test,
                if_true,
                if_false,
            } => {
                test.references(placeholder)
                    || if_true.references(placeholder)
                    || if_false.references(placeholder)
            }
            Expr::Binary { lhs, rhs, .. } => {
                lhs.references(placeholder) || rhs.references(placeholder)
            }
            Expr::Call { args, .. } => args.iter().any(|arg| arg.references(placeholder)),
            Expr::Map { source, body, .. } => {
                source.references(placeholder) || body.references(placeholder)
            }
            Expr::Record { fields, .. } => {
                fields.iter().any(|(_, expr)| expr.references(placeholder))
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Parameter(p) => write!(f, "{p}"),
            Expr::Constant { value, .. } => match value {
                Value::String(s) => write!(f, "{s:?}"),
                other => write!(f, "{}", other.to_json()),
            },
            Expr::Member { target, member, .. } => write!(f, "{target}.{member}"),
            Expr::Conditional {
                test,
                if_true,
                if_false,
            } => write!(f, "(if {test} then {if_true} else {if_false})"),
            Expr::Binary { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            Expr::Call { function, args } => {
                write!(f, "{}(", function.name())?;
                for (idx, arg) in args.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expr::Map {
                source,
                element,
                body,
            } => write!(f, "{source}.map({element} => {body})"),
            Expr::Record { fields, .. } => {
                write!(f, "{{")?;
                for (idx, (name, expr)) in fields.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {name}: {expr}")?;
                }
                write!(f, " }}")
            }
        }
    }
}
