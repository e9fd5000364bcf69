//! Execution plans: the schema-bound form of one operation.

mod compiler;
mod complexity;

use std::{fmt, sync::Arc};

use async_graphql_parser::types::OperationType;
use async_graphql_value::{ConstValue, Name};
use indexmap::IndexMap;

pub(crate) use self::complexity::FieldComplexities;
pub use self::{compiler::PlanCompiler, complexity::ComplexityFn};
use crate::{
    bindings::Binding,
    error::Location,
    registry::{MetaInputValue, TypeRef},
    resolvers::Arguments,
};

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("could not parse the query: {0}")]
    Parse(String),
    #[error("unknown operation named `{0}`")]
    UnknownOperation(String),
    #[error("an operation name is required when the document contains several operations")]
    OperationNameRequired,
    #[error("the schema does not support {} operations", operation_name(*.0))]
    UnsupportedOperation(OperationType),
    #[error("unknown fragment `{0}`")]
    UnknownFragment(String),
    #[error("fragment `{0}` spreads itself")]
    FragmentCycle(String),
    #[error("type `{type_name}` has no field `{field}`")]
    UnknownField { type_name: String, field: String },
    #[error("field `{type_name}.{field}` has no argument `{argument}`")]
    UnknownArgument {
        type_name: String,
        field: String,
        argument: String,
    },
    #[error("variable `${0}` is not defined by the operation")]
    UndefinedVariable(String),
    #[error("{0}")]
    InvalidVariable(String),
    #[error("fields selected under `{response_key}` cannot be merged: {reason}")]
    Unmergeable { response_key: String, reason: String },
    #[error("leaf field `{type_name}.{field}` cannot have a selection set")]
    LeafSelection { type_name: String, field: String },
    #[error("field `{type_name}.{field}` of type `{ty}` needs a selection set")]
    MissingSelection {
        type_name: String,
        field: String,
        ty: String,
    },
    #[error("no binding for `{type_name}.{field}`")]
    Unbound { type_name: String, field: String },
    #[error("subscription operations must select exactly one root field")]
    InvalidSubscriptionRoot,
    #[error("operation has complexity {complexity}, which exceeds the limit of {limit}")]
    ComplexityLimit { complexity: usize, limit: usize },
}

impl CompileError {
    /// Machine readable code reported in the error extensions, if any.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            CompileError::ComplexityLimit { .. } => Some("COMPLEXITY_LIMIT_EXCEEDED"),
            _ => None,
        }
    }
}

pub(crate) fn operation_name(operation: OperationType) -> &'static str {
    match operation {
        OperationType::Query => "query",
        OperationType::Mutation => "mutation",
        OperationType::Subscription => "subscription",
    }
}

/// A compiled operation, ready to be executed any number of times.
#[derive(Debug)]
pub struct ExecutionPlan {
    pub(crate) operation_type: OperationType,
    pub(crate) operation_name: Option<String>,
    pub(crate) root: SelectionSetPlan,
    pub(crate) complexity: usize,
}

impl ExecutionPlan {
    pub fn operation_type(&self) -> OperationType {
        self.operation_type
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    /// Static cost of the operation, see [`ComplexityFn`].
    pub fn complexity(&self) -> usize {
        self.complexity
    }

    /// Fails when the cost of the operation is above `limit`.
    pub fn check_complexity(&self, limit: usize) -> Result<(), CompileError> {
        if self.complexity > limit {
            return Err(CompileError::ComplexityLimit {
                complexity: self.complexity,
                limit,
            });
        }
        Ok(())
    }

    /// Response keys of the root selection, in document order.
    pub fn root_fields(&self) -> impl Iterator<Item = &str> {
        self.root.fields.iter().map(|field| field.response_key.as_str())
    }
}

/// Selections on one concrete object type, in document order.
#[derive(Debug)]
pub(crate) struct SelectionSetPlan {
    pub(crate) type_name: String,
    pub(crate) fields: Vec<FieldPlan>,
    /// Whether the fields may run concurrently, false for mutation roots.
    pub(crate) concurrent: bool,
}

#[derive(Debug)]
pub(crate) struct FieldPlan {
    pub(crate) response_key: Name,
    pub(crate) field_name: Name,
    /// `Type.field`, used in error messages and traces.
    pub(crate) coordinate: String,
    pub(crate) locations: Arc<[Location]>,
    pub(crate) kind: FieldPlanKind,
}

#[derive(Debug)]
pub(crate) enum FieldPlanKind {
    /// `__typename`, answered from the type of the selection set.
    Typename,
    Bound(BoundField),
}

#[derive(Debug)]
pub(crate) struct BoundField {
    pub(crate) ty: TypeRef,
    pub(crate) binding: Binding,
    /// Argument values with variables substituted, still to be decoded.
    pub(crate) arguments: IndexMap<Name, ConstValue>,
    pub(crate) argument_definitions: IndexMap<String, MetaInputValue>,
    /// Schema directives applied to the field definition, in declaration order.
    pub(crate) directives: Vec<FieldDirective>,
    pub(crate) child: ChildPlan,
}

#[derive(Debug)]
pub(crate) struct FieldDirective {
    pub(crate) name: String,
    pub(crate) arguments: Arguments,
}

#[derive(Debug)]
pub(crate) enum ChildPlan {
    Leaf,
    Object(SelectionSetPlan),
    /// Concrete type name to the selection of that type, for interface and union fields.
    Dispatch(IndexMap<String, SelectionSetPlan>),
}

impl fmt::Display for SelectionSetPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.type_name)?;
        for field in &self.fields {
            write!(f, " {}", field.response_key)?;
            if let FieldPlanKind::Bound(bound) = &field.kind {
                match &bound.child {
                    ChildPlan::Leaf => {}
                    ChildPlan::Object(plan) => write!(f, ": {plan}")?,
                    ChildPlan::Dispatch(plans) => {
                        f.write_str(": (")?;
                        for (i, plan) in plans.values().enumerate() {
                            if i != 0 {
                                f.write_str(" | ")?;
                            }
                            write!(f, "{plan}")?;
                        }
                        f.write_str(")")?;
                    }
                }
            }
        }
        f.write_str(" }")
    }
}
