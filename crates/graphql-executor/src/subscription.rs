//! Drives a subscription: one execution pass per source event, pulled by the caller.

use std::{
    pin::Pin,
    sync::Arc,
    task::{ready, Context, Poll},
};

use futures_util::{future::BoxFuture, FutureExt, Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    bindings::Binding,
    context::{Data, RequestState, ResolverContext},
    error::QueryError,
    execution::{field_error, Executor, InputCoercion},
    plan::{ExecutionPlan, FieldPlanKind},
    resolvers::{Arguments, EventStream, ResolverInput},
    response::{Response, ResponsePath},
    schema::SchemaInner,
    FieldValue, ResolverError,
};

enum SubscriptionState {
    /// Opening the event source.
    Idle(BoxFuture<'static, Result<EventStream, Response>>),
    Active {
        events: EventStream,
        /// Execution pass of the event being resolved.
        pass: Option<BoxFuture<'static, Response>>,
    },
    Completed,
    Cancelled,
    Failed,
}

impl SubscriptionState {
    fn name(&self) -> &'static str {
        match self {
            SubscriptionState::Idle(_) => "idle",
            SubscriptionState::Active { .. } => "active",
            SubscriptionState::Completed => "completed",
            SubscriptionState::Cancelled => "cancelled",
            SubscriptionState::Failed => "failed",
        }
    }
}

/// Stream of responses of one subscription. Not restartable.
///
/// At most one event is resolved at a time and the next event is only pulled from the source
/// once the response of the previous one has been taken. Cancellation is observed while the source
/// opens and between events.
pub(crate) struct SubscriptionStream {
    schema: Arc<SchemaInner>,
    plan: Arc<ExecutionPlan>,
    cancellation: CancellationToken,
    cancelled: BoxFuture<'static, ()>,
    request_data: Arc<Data>,
    state: SubscriptionState,
}

impl SubscriptionStream {
    pub(crate) fn new(
        schema: Arc<SchemaInner>,
        plan: Arc<ExecutionPlan>,
        cancellation: CancellationToken,
        request_data: Arc<Data>,
    ) -> Self {
        let request = Arc::new(RequestState::new(
            cancellation.clone(),
            Arc::clone(&schema.data),
            Arc::clone(&request_data),
        ));
        let open = open_source(Arc::clone(&schema), Arc::clone(&plan), request).boxed();

        let token = cancellation.clone();
        SubscriptionStream {
            schema,
            plan,
            cancellation,
            cancelled: async move { token.cancelled().await }.boxed(),
            request_data,
            state: SubscriptionState::Idle(open),
        }
    }

    fn transition(&mut self, state: SubscriptionState) {
        tracing::debug!("subscription {} -> {}", self.state.name(), state.name());
        self.state = state;
    }

    fn event_pass(&self, payload: FieldValue) -> BoxFuture<'static, Response> {
        let schema = Arc::clone(&self.schema);
        let plan = Arc::clone(&self.plan);
        let request = Arc::new(RequestState::new(
            self.cancellation.clone(),
            Arc::clone(&schema.data),
            Arc::clone(&self.request_data),
        ));

        async move {
            let root = schema.subscription_root.clone();
            Executor::for_event(&schema, payload)
                .execute(&plan, root, request)
                .await
        }
        .instrument(tracing::info_span!("subscription_event"))
        .boxed()
    }

    /// The terminal response of a failing event source.
    fn source_error(&self, error: ResolverError) -> Response {
        let error = match self.plan.root.fields.first() {
            Some(field) => error.into_query_error(ResponsePath::empty().child(&field.response_key), &field.locations),
            None => error.into_query_error(ResponsePath::empty(), &[]),
        };
        Response::from_errors(self.schema.present_errors(vec![error]))
    }
}

impl Stream for SubscriptionStream {
    type Item = Response;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Response>> {
        let this = self.get_mut();

        loop {
            match &mut this.state {
                SubscriptionState::Idle(open) => {
                    if this.cancelled.poll_unpin(cx).is_ready() {
                        this.transition(SubscriptionState::Cancelled);
                        return Poll::Ready(None);
                    }

                    match ready!(open.poll_unpin(cx)) {
                        Ok(events) => this.transition(SubscriptionState::Active { events, pass: None }),
                        Err(response) => {
                            this.transition(SubscriptionState::Failed);
                            return Poll::Ready(Some(response));
                        }
                    }
                }
                SubscriptionState::Active { events, pass } => {
                    if let Some(running) = pass {
                        let response = ready!(running.poll_unpin(cx));
                        *pass = None;
                        return Poll::Ready(Some(response));
                    }

                    if this.cancelled.poll_unpin(cx).is_ready() {
                        this.transition(SubscriptionState::Cancelled);
                        return Poll::Ready(None);
                    }

                    match ready!(events.poll_next_unpin(cx)) {
                        Some(Ok(payload)) => {
                            let next = this.event_pass(payload);
                            if let SubscriptionState::Active { pass, .. } = &mut this.state {
                                *pass = Some(next);
                            }
                        }
                        Some(Err(error)) => {
                            let response = this.source_error(error);
                            this.transition(SubscriptionState::Failed);
                            return Poll::Ready(Some(response));
                        }
                        None => {
                            this.transition(SubscriptionState::Completed);
                            return Poll::Ready(None);
                        }
                    }
                }
                SubscriptionState::Completed | SubscriptionState::Cancelled | SubscriptionState::Failed => {
                    return Poll::Ready(None)
                }
            }
        }
    }
}

/// Invokes the subscription resolver of the root field.
async fn open_source(
    schema: Arc<SchemaInner>,
    plan: Arc<ExecutionPlan>,
    request: Arc<RequestState>,
) -> Result<EventStream, Response> {
    subscribe(&schema, &plan, request)
        .await
        .map_err(|error| Response::from_errors(schema.present_errors(vec![error])))
}

async fn subscribe(
    schema: &SchemaInner,
    plan: &ExecutionPlan,
    request: Arc<RequestState>,
) -> Result<EventStream, QueryError> {
    let Some(field) = plan.root.fields.first() else {
        return Err(QueryError::new("subscription operations must select exactly one root field"));
    };
    let ctx = ResolverContext::new(request)
        .with_field(ResponsePath::empty().child(&field.response_key), Arc::clone(&field.locations));

    let FieldPlanKind::Bound(bound) = &field.kind else {
        return Err(field_error(&ctx, "subscription operations must select exactly one root field"));
    };
    let Binding::Subscription { key } = &bound.binding else {
        return Err(field_error(&ctx, format!("{} is not bound to a subscription resolver", field.coordinate)));
    };
    let Some(resolver) = schema.subscriptions.get(key) else {
        return Err(field_error(&ctx, format!("no subscription resolver is registered for {key}")));
    };

    let arguments = InputCoercion::new(&schema.registry, &schema.scalars)
        .coerce_arguments(&bound.argument_definitions, bound.arguments.clone())
        .map_err(|message| field_error(&ctx, message))?;
    let input = ResolverInput {
        parent: schema.subscription_root.clone(),
        args: Arguments::new(arguments),
        ctx: ctx.clone(),
    };

    tracing::debug!("opening event source of {}", field.coordinate);
    resolver
        .subscribe(input)
        .await
        .map_err(|error| error.into_query_error(ctx.path.clone(), &ctx.locations))
}
