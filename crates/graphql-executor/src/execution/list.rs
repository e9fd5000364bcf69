use async_graphql_value::ConstValue;

use super::{ExecutionResult, Executor};
use crate::{
    context::ResolverContext,
    plan::{ChildPlan, FieldPlan},
    registry::TypeRef,
    FieldValue,
};

impl<'a> Executor<'a> {
    /// Completes every item of a list.
    ///
    /// Items are nulled independently when `item_ty` is nullable. A failing non-null item fails the
    /// whole list, which the caller nulls or propagates according to the list's own nullability.
    pub(crate) async fn complete_list(
        &self,
        field: &FieldPlan,
        item_ty: &TypeRef,
        child: &ChildPlan,
        value: FieldValue,
        ctx: &ResolverContext,
    ) -> ExecutionResult {
        let items = match value {
            FieldValue::List(items) => items,
            FieldValue::Value(ConstValue::List(values)) => values.into_iter().map(FieldValue::Value).collect(),
            other => {
                return Err(self.fail(
                    ctx,
                    format!("`{}` expects a list, got {}", field.coordinate, other.describe()),
                ))
            }
        };

        let futures = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| self.complete_value(field, item_ty, child, item, ctx.with_path(index)))
            .collect::<Vec<_>>();

        let values = match child {
            ChildPlan::Leaf => {
                let mut values = Vec::new();
                for future in futures {
                    values.push(future.await);
                }
                values
            }
            ChildPlan::Object(_) | ChildPlan::Dispatch(_) => self.run_concurrently(futures).await,
        };

        values.into_iter().collect::<Result<Vec<_>, _>>().map(ConstValue::List)
    }
}
