use std::future::Future;

use async_graphql_value::ConstValue;
use futures_util::{future::BoxFuture, FutureExt, StreamExt};
use indexmap::IndexMap;

use super::{ExecutionResult, Executor};
use crate::{context::ResolverContext, plan::SelectionSetPlan, FieldValue};

impl<'a> Executor<'a> {
    /// Resolves every field of `plan` on `parent`, keeping document order in the result.
    pub(crate) fn resolve_selection_set<'s>(
        &'s self,
        plan: &'s SelectionSetPlan,
        parent: &'s FieldValue,
        ctx: &'s ResolverContext,
    ) -> BoxFuture<'s, ExecutionResult> {
        async move {
            let values = if plan.concurrent {
                let futures = plan
                    .fields
                    .iter()
                    .map(|field| self.resolve_field(plan, field, parent, ctx).boxed())
                    .collect::<Vec<BoxFuture<'s, ExecutionResult>>>();
                self.run_concurrently(futures).await
            } else {
                let mut values = Vec::with_capacity(plan.fields.len());
                for field in &plan.fields {
                    let value = self.resolve_field(plan, field, parent, ctx).await;
                    let failed = value.is_err();
                    values.push(value);
                    // The whole selection is null already, later side effects must not run.
                    if failed {
                        break;
                    }
                }
                values
            };

            let mut object = IndexMap::with_capacity(plan.fields.len());
            for (field, value) in plan.fields.iter().zip(values) {
                object.insert(field.response_key.clone(), value?);
            }
            Ok(ConstValue::Object(object))
        }
        .boxed()
    }

    /// Polls all `futures` at once, or at most `max_concurrency` of them. Outputs keep input order.
    pub(crate) async fn run_concurrently<F: Future>(&self, futures: impl IntoIterator<Item = F>) -> Vec<F::Output> {
        match self.schema.config.execution.max_concurrency {
            Some(limit) => {
                futures_util::stream::iter(futures)
                    .buffered(limit.get())
                    .collect()
                    .await
            }
            None => futures_util::future::join_all(futures).await,
        }
    }
}
