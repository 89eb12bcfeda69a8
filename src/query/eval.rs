//! Compilation of expression trees into invocable units.
//!
//! A [`Callable`] fixes an ordered parameter list over an expression body.
//! Invocation binds arguments positionally and evaluates the body against
//! in-memory [`Value`]s.

use std::cmp::Ordering;

use crate::error::InvocationError;
use crate::query::expr::{BinaryOp, Expr, Function, Placeholder};
use crate::query::value::{Record, Value};

type EvalResult<T> = std::result::Result<T, InvocationError>;

/// Expression body closed over an ordered parameter list.
#[derive(Clone, Debug)]
pub struct Callable {
    params: Vec<Placeholder>,
    body: Expr,
}

impl Callable {
    /// Compiles `body` with positional `params`.
    pub fn compile(body: Expr, params: Vec<Placeholder>) -> Self {
        Self { params, body }
    }

    /// Declared parameters in order.
    pub fn params(&self) -> &[Placeholder] {
        &self.params
    }

    /// Evaluates the body with `args` bound positionally to the parameters.
    ///
    /// Fails with [`InvocationError::ArgumentCount`] when the lengths differ.
    pub fn invoke(&self, args: &[Value]) -> EvalResult<Value> {
        if args.len() != self.params.len() {
            return Err(InvocationError::ArgumentCount {
                expected: self.params.len(),
                got: args.len(),
            });
        }
        let mut env = Env {
            bindings: self
                .params
                .iter()
                .map(Placeholder::id)
                .zip(args.iter().cloned())
                .collect(),
        };
        env.eval(&self.body)
    }
}

struct Env {
    bindings: Vec<(u64, Value)>,
}

impl Env {
    fn lookup(&self, placeholder: &Placeholder) -> EvalResult<&Value> {
        // Innermost binding wins so map elements shadow outer parameters.
        self.bindings
            .iter()
            .rev()
            .find(|(id, _)| *id == placeholder.id())
            .map(|(_, value)| value)
            .ok_or_else(|| InvocationError::UnboundParameter(placeholder.name().to_owned()))
    }

    fn eval(&mut self, expr: &Expr) -> EvalResult<Value> {
        match expr {
            Expr::Parameter(p) => self.lookup(p).cloned(),
            Expr::Constant { value, .. } => Ok(value.clone()),
            Expr::Member { target, member, .. } => match self.eval(target)? {
                Value::Null => Err(InvocationError::NullNavigation {
                    member: member.clone(),
                }),
                Value::Record(record) => {
                    record
                        .get(member)
                        .cloned()
                        .ok_or_else(|| InvocationError::MissingMember {
                            member: member.clone(),
                        })
                }
                other => Err(InvocationError::mismatch("member access", "record", other.kind())),
            },
            Expr::Conditional {
                test,
                if_true,
                if_false,
            } => match self.eval(test)? {
                Value::Bool(true) => self.eval(if_true),
                Value::Bool(false) => self.eval(if_false),
                other => Err(InvocationError::mismatch("condition", "bool", other.kind())),
            },
            Expr::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs),
            Expr::Call { function, args } => {
                let args = args
                    .iter()
                    .map(|arg| self.eval(arg))
                    .collect::<EvalResult<Vec<_>>>()?;
                call(*function, args)
            }
            Expr::Map {
                source,
                element,
                body,
            } => {
                let items = match self.eval(source)? {
                    Value::Null => return Ok(Value::Null),
                    Value::List(items) => items,
                    other => return Err(InvocationError::mismatch("map", "list", other.kind())),
                };
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    self.bindings.push((element.id(), item));
                    let result = self.eval(body);
                    self.bindings.pop();
                    out.push(result?);
                }
                Ok(Value::List(out))
            }
            Expr::Record { fields, .. } => {
                let mut record = Record::new();
                for (name, field) in fields {
                    record.push(name.clone(), self.eval(field)?);
                }
                Ok(Value::Record(record))
            }
        }
    }

    fn eval_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> EvalResult<Value> {
        // Logical operators short-circuit.
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let left = expect_bool(self.eval(lhs)?, "logical operand")?;
            if (op == BinaryOp::And && !left) || (op == BinaryOp::Or && left) {
                return Ok(Value::Bool(left));
            }
            return Ok(Value::Bool(expect_bool(self.eval(rhs)?, "logical operand")?));
        }
        let left = self.eval(lhs)?;
        let right = self.eval(rhs)?;
        match op {
            BinaryOp::Eq => Ok(Value::Bool(left == right)),
            BinaryOp::Ne => Ok(Value::Bool(left != right)),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ordering = compare(&left, &right)?;
                Ok(Value::Bool(match op {
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::Le => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }))
            }
            _ => arithmetic(op, left, right),
        }
    }
}

fn expect_bool(value: Value, context: &'static str) -> EvalResult<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        other => Err(InvocationError::mismatch(context, "bool", other.kind())),
    }
}

fn compare(left: &Value, right: &Value) -> EvalResult<Ordering> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let (a, b) = (as_f64(left), as_f64(right));
            a.partial_cmp(&b)
                .ok_or_else(|| InvocationError::mismatch("comparison", "ordered number", "NaN"))
        }
        _ => Err(InvocationError::mismatch(
            "comparison",
            "matching numbers or strings",
            right.kind(),
        )),
    }
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Int(v) => *v as f64,
        Value::Float(v) => *v,
        _ => f64::NAN,
    }
}

fn arithmetic(op: BinaryOp, left: Value, right: Value) -> EvalResult<Value> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => {
            let result = match op {
                BinaryOp::Add => a.checked_add(b),
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div if b == 0 => return Err(InvocationError::DivisionByZero),
                BinaryOp::Div => a.checked_div(b),
                _ => None,
            };
            result
                .map(Value::Int)
                .ok_or_else(|| InvocationError::mismatch("arithmetic", "in-range int", "overflow"))
        }
        (Value::String(a), Value::String(b)) if op == BinaryOp::Add => {
            Ok(Value::String(a + &b))
        }
        (l @ (Value::Int(_) | Value::Float(_)), r @ (Value::Int(_) | Value::Float(_))) => {
            let (a, b) = (as_f64(&l), as_f64(&r));
            Ok(Value::Float(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                _ => a / b,
            }))
        }
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (l, _) => Err(InvocationError::mismatch("arithmetic", "number", l.kind())),
    }
}

fn call(function: Function, args: Vec<Value>) -> EvalResult<Value> {
    match function {
        Function::Coalesce => Ok(args
            .into_iter()
            .find(|arg| !arg.is_null())
            .unwrap_or(Value::Null)),
        Function::Concat => {
            let mut out = String::new();
            for arg in args {
                match arg {
                    Value::String(s) => out.push_str(&s),
                    Value::Null => {}
                    other => {
                        return Err(InvocationError::mismatch("concat", "string", other.kind()))
                    }
                }
            }
            Ok(Value::String(out))
        }
        Function::Len | Function::Lower | Function::Upper => {
            let arg = single(args)?;
            match (function, arg) {
                (_, Value::Null) => Ok(Value::Null),
                (Function::Len, Value::List(items)) => Ok(Value::Int(items.len() as i64)),
                (Function::Len, Value::String(s)) => Ok(Value::Int(s.chars().count() as i64)),
                (Function::Lower, Value::String(s)) => Ok(Value::String(s.to_lowercase())),
                (Function::Upper, Value::String(s)) => Ok(Value::String(s.to_uppercase())),
                (_, other) => Err(InvocationError::mismatch(
                    function.name(),
                    "string or list",
                    other.kind(),
                )),
            }
        }
    }
}

fn single(args: Vec<Value>) -> EvalResult<Value> {
    let got = args.len();
    let mut iter = args.into_iter();
    match (iter.next(), iter.next()) {
        (Some(arg), None) => Ok(arg),
        _ => Err(InvocationError::ArgumentCount { expected: 1, got }),
    }
}
