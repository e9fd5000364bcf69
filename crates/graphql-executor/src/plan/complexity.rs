use std::sync::Arc;

use indexmap::IndexMap;

use super::{ChildPlan, FieldPlan, FieldPlanKind, SelectionSetPlan};
use crate::{registry::SCHEMA_TYPE, resolvers::Arguments};

/// Cost of one field from the cost of its selection set and its arguments.
///
/// Results below 1 are ignored in favour of the default, one plus the cost of the selection set.
pub type ComplexityFn = Arc<dyn Fn(usize, &Arguments) -> usize + Send + Sync>;

/// Custom costs keyed by object type, then field name.
pub(crate) type FieldComplexities = IndexMap<String, IndexMap<String, ComplexityFn>>;

/// Sums the cost of every selected field. Abstract fields cost as much as their most expensive
/// concrete selection, `__schema` is free. Additions saturate.
pub(crate) struct ComplexityCalculator<'a> {
    custom: Option<&'a FieldComplexities>,
}

impl<'a> ComplexityCalculator<'a> {
    pub(crate) fn new(custom: Option<&'a FieldComplexities>) -> Self {
        ComplexityCalculator { custom }
    }

    pub(crate) fn selection_set(&self, plan: &SelectionSetPlan) -> usize {
        plan.fields
            .iter()
            .fold(0, |total: usize, field| total.saturating_add(self.field(&plan.type_name, field)))
    }

    fn field(&self, parent_type: &str, field: &FieldPlan) -> usize {
        let bound = match &field.kind {
            FieldPlanKind::Typename => return 1,
            FieldPlanKind::Bound(bound) => bound,
        };
        if bound.ty.named_type() == SCHEMA_TYPE {
            return 0;
        }

        let child = match &bound.child {
            ChildPlan::Leaf => 0,
            ChildPlan::Object(plan) => self.selection_set(plan),
            ChildPlan::Dispatch(plans) => plans.values().map(|plan| self.selection_set(plan)).max().unwrap_or(0),
        };

        self.custom
            .and_then(|custom| custom.get(parent_type))
            .and_then(|fields| fields.get(field.field_name.as_str()))
            .map(|complexity| complexity(child, &Arguments::new(bound.arguments.clone())))
            .filter(|complexity| *complexity >= 1)
            .unwrap_or_else(|| child.saturating_add(1))
    }
}
