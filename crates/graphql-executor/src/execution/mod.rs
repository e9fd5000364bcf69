//! Walks an [`ExecutionPlan`](crate::ExecutionPlan) against live values.
//!
//! Errors are recorded in the request's error sink where they happen. A failing non-null position
//! returns [`PropagateNull`] so that the nearest nullable ancestor becomes null.

mod container;
mod field;
mod input;
mod list;

use std::sync::Arc;

use async_graphql_value::ConstValue;
use tracing::Instrument;

pub(crate) use self::input::InputCoercion;
use crate::{
    context::{RequestState, ResolverContext},
    error::QueryError,
    plan::{operation_name, ExecutionPlan},
    response::Response,
    schema::SchemaInner,
    FieldValue,
};

/// A non-null position failed, its error has already been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PropagateNull;

pub(crate) type ExecutionResult = Result<ConstValue, PropagateNull>;

/// Everything the steps of one execution pass share.
pub(crate) struct Executor<'a> {
    pub(crate) schema: &'a SchemaInner,
    /// Payload of the subscription event being resolved, the value of the subscription root field.
    pub(crate) event: Option<FieldValue>,
}

impl<'a> Executor<'a> {
    pub(crate) fn new(schema: &'a SchemaInner) -> Self {
        Executor { schema, event: None }
    }

    pub(crate) fn for_event(schema: &'a SchemaInner, event: FieldValue) -> Self {
        Executor {
            schema,
            event: Some(event),
        }
    }

    pub(crate) async fn execute(&self, plan: &ExecutionPlan, root: FieldValue, request: Arc<RequestState>) -> Response {
        let span = tracing::info_span!(
            "execute",
            operation = plan.operation_name().unwrap_or_default(),
            kind = operation_name(plan.operation_type())
        );

        async {
            let ctx = ResolverContext::new(Arc::clone(&request));
            let data = self
                .resolve_selection_set(&plan.root, &root, &ctx)
                .await
                .unwrap_or(ConstValue::Null);
            Response::new(data, self.schema.present_errors(request.take_errors()))
        }
        .instrument(span)
        .await
    }

    /// Records `message` at the current field and returns the marker to propagate.
    pub(crate) fn fail(&self, ctx: &ResolverContext, message: impl Into<String>) -> PropagateNull {
        ctx.request.add_error(field_error(ctx, message));
        PropagateNull
    }
}

pub(crate) fn field_error(ctx: &ResolverContext, message: impl Into<String>) -> QueryError {
    QueryError::new(message)
        .with_path(ctx.path.clone())
        .with_locations(ctx.locations.iter().copied())
}
