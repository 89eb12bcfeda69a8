//! Selection nodes and their lazy compilation into expressions.
//!
//! A [`SelectionNode`] is assembled in two phases. The document builder
//! first creates nodes holding either a finished leaf expression or a
//! pending list of [`Selection`]s, which may name fragments that have not
//! been declared yet. The first call to
//! [`compiled_expression`](SelectionNode::compiled_expression) then resolves
//! fragment spreads against a complete [`FragmentTable`], builds every child,
//! and caches the resulting projection. Later reads return the cached tree.

use std::mem;

use tracing::{debug, trace};

use crate::error::{QueryError, Result};
use crate::options::CompilerOptions;
use crate::query::compiled::CompiledExpression;
use crate::query::eval::Callable;
use crate::query::expr::{BinaryOp, Expr, Placeholder};
use crate::query::fragment::{Fragment, FragmentTable};
use crate::query::projection::{ExprProjection, ProjectedField, ProjectionBuilder};
use crate::query::rebase::rebase;
use crate::query::types::{is_enumerable, ValueType};
use crate::query::value::Value;

/// Entry in a node's pending child list.
#[derive(Clone, Debug)]
pub enum Selection {
    /// A field node, used as-is.
    Field(SelectionNode),
    /// Reference to a fragment by name, resolved at build time.
    FragmentSpread(String),
}

impl Selection {
    /// Spread of the fragment called `name`.
    pub fn spread(name: impl Into<String>) -> Self {
        Selection::FragmentSpread(name.into())
    }
}

impl From<SelectionNode> for Selection {
    fn from(value: SelectionNode) -> Self {
        Selection::Field(value)
    }
}

/// Observable build progress of a node.
///
/// A build borrows the node mutably from start to finish, so its
/// in-progress state is never visible from outside.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildState {
    /// No expression cached yet, either never requested or last build failed.
    Unbuilt,
    /// Expression cached.
    Built,
}

// `Building` only exists inside `build`, while the selections are taken out.
#[derive(Clone, Debug)]
enum NodeState {
    Unbuilt(Vec<Selection>),
    Building,
    Built {
        expr: Expr,
        fields: Vec<SelectionNode>,
    },
}

/// Collaborators and limits shared by one build.
pub struct BuildScope<'a> {
    fragments: &'a dyn FragmentTable,
    projection: &'a dyn ProjectionBuilder,
    options: CompilerOptions,
    depth: usize,
    spreads: Vec<String>,
}

impl<'a> BuildScope<'a> {
    /// Scope resolving spreads against `fragments` with default options and
    /// the [`ExprProjection`] builder.
    pub fn new(fragments: &'a dyn FragmentTable) -> Self {
        Self {
            fragments,
            projection: &ExprProjection,
            options: CompilerOptions::default(),
            depth: 0,
            spreads: Vec::new(),
        }
    }

    /// Replaces the compiler limits.
    pub fn with_options(mut self, options: &CompilerOptions) -> Self {
        self.options = options.clone();
        self
    }

    /// Replaces the projection builder.
    pub fn with_projection(mut self, projection: &'a dyn ProjectionBuilder) -> Self {
        self.projection = projection;
        self
    }

    /// Limits in effect.
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }
}

/// One node of a selection tree.
#[derive(Clone, Debug)]
pub struct SelectionNode {
    name: String,
    base: Option<CompiledExpression>,
    element: Option<Placeholder>,
    required: Vec<Placeholder>,
    constants: Vec<(Placeholder, Value)>,
    state: NodeState,
}

struct Resolution {
    kind: &'static str,
    expr: Expr,
    inlined: Vec<Vec<SelectionNode>>,
    constants: Vec<(Placeholder, Value)>,
}

impl SelectionNode {
    /// Leaf field whose expression is already known.
    ///
    /// The wrapper's constants become the node's constant parameters.
    pub fn leaf(name: impl Into<String>, expression: CompiledExpression) -> Self {
        let (expr, constants) = expression.into_parts();
        Self {
            name: name.into(),
            base: None,
            element: None,
            required: Vec::new(),
            constants,
            state: NodeState::Built {
                expr,
                fields: Vec::new(),
            },
        }
    }

    /// Object or collection field selecting `selections` from `base`.
    ///
    /// When `base` is a sequence a fresh element placeholder is allocated;
    /// child fields should be written against [`element`](Self::element).
    /// With no selections the node compiles to `base` itself.
    pub fn new(
        name: impl Into<String>,
        base: Option<CompiledExpression>,
        selections: Vec<Selection>,
    ) -> Result<Self> {
        let name = name.into();
        let Some(base) = base else {
            return Err(QueryError::construction(
                name,
                "child fields need a base expression",
            ));
        };
        let element = base
            .ty()
            .element()
            .map(|ty| Placeholder::new(&name, ty.clone()));
        Ok(Self {
            name,
            base: Some(base),
            element,
            required: Vec::new(),
            constants: Vec::new(),
            state: NodeState::Unbuilt(selections),
        })
    }

    /// Uses `element` as the per-item placeholder of a collection selection.
    pub fn with_element(mut self, element: Placeholder) -> Self {
        self.element = Some(element);
        self
    }

    /// Declares placeholders the caller supplies positionally to
    /// [`execute`](Self::execute).
    pub fn with_required_parameters(mut self, params: Vec<Placeholder>) -> Self {
        self.required = params;
        self
    }

    /// Appends one required placeholder.
    pub fn add_required_parameter(&mut self, param: Placeholder) {
        self.required.push(param);
    }

    /// Appends a child selection. Only valid before the first build.
    pub fn add_field(&mut self, selection: impl Into<Selection>) -> Result<()> {
        if self.base.is_none() {
            return Err(QueryError::construction(
                &self.name,
                "child fields need a base expression",
            ));
        }
        match &mut self.state {
            NodeState::Unbuilt(selections) => {
                selections.push(selection.into());
                Ok(())
            }
            _ => Err(QueryError::construction(
                &self.name,
                "fields cannot be added after the expression was built",
            )),
        }
    }

    /// Appends constants; duplicates are kept.
    pub fn add_constant_parameters(
        &mut self,
        constants: impl IntoIterator<Item = (Placeholder, Value)>,
    ) {
        self.constants.extend(constants);
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Expression child fields are evaluated against.
    pub fn base(&self) -> Option<&CompiledExpression> {
        self.base.as_ref()
    }

    /// Per-element placeholder for collection selections.
    pub fn element(&self) -> Option<&Placeholder> {
        self.element.as_ref()
    }

    /// Placeholders supplied by the caller at execution.
    pub fn required_parameters(&self) -> &[Placeholder] {
        &self.required
    }

    /// Constants merged so far, in binding order.
    pub fn constant_parameters(&self) -> &[(Placeholder, Value)] {
        &self.constants
    }

    /// Current build state.
    pub fn state(&self) -> BuildState {
        match self.state {
            NodeState::Unbuilt(_) | NodeState::Building => BuildState::Unbuilt,
            NodeState::Built { .. } => BuildState::Built,
        }
    }

    /// Resolved child nodes; empty until built.
    pub fn fields(&self) -> &[SelectionNode] {
        match &self.state {
            NodeState::Built { fields, .. } => fields,
            _ => &[],
        }
    }

    /// Returns the node's expression, building it on first call.
    pub fn compiled_expression(&mut self, scope: &mut BuildScope<'_>) -> Result<&Expr> {
        if matches!(self.state, NodeState::Unbuilt(_)) {
            self.build(scope)?;
        }
        match &self.state {
            NodeState::Built { expr, .. } => Ok(expr),
            _ => Err(QueryError::construction(
                &self.name,
                "expression read while the node is still building",
            )),
        }
    }

    /// Builds the expression if needed and evaluates it.
    ///
    /// Parameters are the required placeholders followed by every constant
    /// placeholder; arguments are `args` followed by the constant values.
    pub fn execute(&mut self, scope: &mut BuildScope<'_>, args: &[Value]) -> Result<Value> {
        let body = self.compiled_expression(scope)?.clone();
        let params: Vec<Placeholder> = self
            .required
            .iter()
            .cloned()
            .chain(self.constants.iter().map(|(p, _)| p.clone()))
            .collect();
        let mut values = args.to_vec();
        values.extend(self.constants.iter().map(|(_, v)| v.clone()));
        debug!(
            node = %self.name,
            required = self.required.len(),
            constants = self.constants.len(),
            "executing selection"
        );
        Ok(Callable::compile(body, params).invoke(&values)?)
    }

    fn build(&mut self, scope: &mut BuildScope<'_>) -> Result<()> {
        let mut selections = match mem::replace(&mut self.state, NodeState::Building) {
            NodeState::Unbuilt(selections) => selections,
            other => {
                self.state = other;
                return Ok(());
            }
        };
        if scope.depth >= scope.options.max_depth {
            self.state = NodeState::Unbuilt(selections);
            return Err(QueryError::DepthExceeded {
                what: "selection",
                max: scope.options.max_depth,
            });
        }
        scope.depth += 1;
        let resolved = self.resolve(&mut selections, scope);
        scope.depth -= 1;
        let resolution = match resolved {
            Ok(resolution) => resolution,
            Err(err) => {
                self.state = NodeState::Unbuilt(selections);
                return Err(err);
            }
        };

        let mut fields = Vec::new();
        for (selection, inlined) in selections.into_iter().zip(resolution.inlined) {
            match selection {
                Selection::Field(node) => fields.push(node),
                Selection::FragmentSpread(_) => fields.extend(inlined),
            }
        }
        self.constants.extend(resolution.constants);
        debug!(
            node = %self.name,
            projection = resolution.kind,
            fields = fields.len(),
            constants = self.constants.len(),
            "selection built"
        );
        self.state = NodeState::Built {
            expr: resolution.expr,
            fields,
        };
        Ok(())
    }

    fn resolve(
        &self,
        selections: &mut [Selection],
        scope: &mut BuildScope<'_>,
    ) -> Result<Resolution> {
        let Some(base) = self.base.as_ref() else {
            return Err(QueryError::construction(
                &self.name,
                "child fields need a base expression",
            ));
        };
        let base_constants = base.constants().map(|(p, v)| (p.clone(), v.clone()));
        if selections.is_empty() {
            return Ok(Resolution {
                kind: "base",
                expr: base.expr().clone(),
                inlined: Vec::new(),
                constants: base_constants.collect(),
            });
        }

        let base_ty = base.ty();
        let element = if is_enumerable(&base_ty) {
            Some(self.element.as_ref().ok_or_else(|| {
                QueryError::construction(&self.name, "collection selection has no element")
            })?)
        } else {
            None
        };
        let context = match element {
            Some(element) => Expr::param(element),
            None => base.expr().clone(),
        };

        let mut constants = Vec::new();
        let mut inlined = Vec::with_capacity(selections.len());
        let mut projected = Vec::new();
        for selection in selections.iter_mut() {
            match selection {
                Selection::Field(node) => {
                    let expr = node.compiled_expression(scope)?.clone();
                    projected.push(ProjectedField::new(node.name.clone(), expr));
                    constants.extend(node.constants.iter().cloned());
                    inlined.push(Vec::new());
                }
                Selection::FragmentSpread(name) => {
                    let nodes = inline_fragment(name, &context, scope)?;
                    for node in &nodes {
                        if let NodeState::Built { expr, .. } = &node.state {
                            projected.push(ProjectedField::new(node.name.clone(), expr.clone()));
                        }
                        constants.extend(node.constants.iter().cloned());
                    }
                    inlined.push(nodes);
                }
            }
        }

        let kind = if element.is_some() { "collection" } else { "record" };
        let expr = match element {
            Some(element) => scope
                .projection
                .build_map(base.expr(), element, &projected)?,
            None => {
                let (record, record_ty) = scope.projection.build_record(base.expr(), &projected)?;
                Expr::conditional(
                    Expr::binary(
                        BinaryOp::Eq,
                        base.expr().clone(),
                        Expr::null_of(base_ty.clone()),
                    ),
                    Expr::null_of(ValueType::Record(record_ty)),
                    record,
                )
            }
        };
        constants.extend(base_constants);
        Ok(Resolution {
            kind,
            expr,
            inlined,
            constants,
        })
    }
}

/// Expands the fragment `name` into fresh nodes anchored on `context`.
fn inline_fragment(
    name: &str,
    context: &Expr,
    scope: &mut BuildScope<'_>,
) -> Result<Vec<SelectionNode>> {
    if scope.spreads.iter().any(|open| open == name) {
        let mut path = scope.spreads.join(" -> ");
        path.push_str(" -> ");
        path.push_str(name);
        return Err(QueryError::FragmentCycle {
            name: name.to_owned(),
            path,
        });
    }
    if scope.spreads.len() >= scope.options.max_fragment_depth {
        return Err(QueryError::DepthExceeded {
            what: "fragment",
            max: scope.options.max_fragment_depth,
        });
    }
    let fragments = scope.fragments;
    let fragment = fragments
        .lookup(name)
        .ok_or_else(|| QueryError::fragment_not_found(name))?;
    trace!(fragment = name, fields = fragment.fields().len(), "inlining fragment");

    scope.spreads.push(name.to_owned());
    let expanded = expand_fragment(fragment, context, scope);
    scope.spreads.pop();
    expanded
}

fn expand_fragment(
    fragment: &Fragment,
    context: &Expr,
    scope: &mut BuildScope<'_>,
) -> Result<Vec<SelectionNode>> {
    fragment
        .fields()
        .iter()
        .map(|template| -> Result<SelectionNode> {
            let mut field = template.clone();
            let expr = rebase(
                field.compiled_expression(scope)?,
                fragment.select_context(),
                context,
            );
            Ok(field.into_rebased(expr))
        })
        .collect()
}

impl SelectionNode {
    fn into_rebased(self, expr: Expr) -> Self {
        let fields = match self.state {
            NodeState::Built { fields, .. } => fields,
            _ => Vec::new(),
        };
        Self {
            name: self.name,
            base: None,
            element: None,
            required: Vec::new(),
            constants: self.constants,
            state: NodeState::Built { expr, fields },
        }
    }
}
