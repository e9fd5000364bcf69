use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use async_graphql_value::{ConstValue, Name};
use futures_util::{future::BoxFuture, FutureExt};

use super::{field_error, ExecutionResult, Executor, InputCoercion, PropagateNull};
use crate::{
    bindings::Binding,
    context::ResolverContext,
    error::QueryError,
    introspection::{SchemaIntrospection, TypeIntrospection},
    middleware::{FieldInfo, Layer, Next, Terminal},
    plan::{BoundField, ChildPlan, FieldPlan, FieldPlanKind, SelectionSetPlan},
    registry::{MetaType, TypeRef},
    resolvers::{Arguments, ResolverInput},
    value::MapObject,
    FieldValue, ResolverError, ResolverResult,
};

impl<'a> Executor<'a> {
    pub(crate) async fn resolve_field(
        &self,
        parent_plan: &SelectionSetPlan,
        field: &FieldPlan,
        parent: &FieldValue,
        parent_ctx: &ResolverContext,
    ) -> ExecutionResult {
        let bound = match &field.kind {
            FieldPlanKind::Typename => return Ok(ConstValue::String(parent_plan.type_name.clone())),
            FieldPlanKind::Bound(bound) => bound,
        };

        let ctx = parent_ctx.with_field(
            parent_ctx.path.child(&field.response_key),
            Arc::clone(&field.locations),
        );
        tracing::trace!("Resolving {} at {}", field.coordinate, ctx.path);

        match self.invoke(&parent_plan.type_name, field, bound, parent, &ctx).await {
            Ok(value) => self.complete_value(field, &bound.ty, &bound.child, value, ctx).await,
            Err(error) => {
                ctx.request.add_error(error);
                if bound.ty.is_non_null() {
                    Err(PropagateNull)
                } else {
                    Ok(ConstValue::Null)
                }
            }
        }
    }

    /// Decodes the arguments and runs the binding of `field` inside its middleware layers.
    async fn invoke(
        &self,
        parent_type: &str,
        field: &FieldPlan,
        bound: &BoundField,
        parent: &FieldValue,
        ctx: &ResolverContext,
    ) -> Result<FieldValue, QueryError> {
        if ctx.is_cancelled() {
            return Err(field_error(ctx, "operation cancelled"));
        }

        let arguments = InputCoercion::new(&self.schema.registry, &self.schema.scalars)
            .coerce_arguments(&bound.argument_definitions, bound.arguments.clone())
            .map_err(|message| field_error(ctx, message))?;
        let input = ResolverInput {
            parent: parent.clone(),
            args: Arguments::new(arguments),
            ctx: ctx.clone(),
        };

        let layers = self.layers(bound).map_err(|message| field_error(ctx, message))?;
        let info = FieldInfo {
            parent_type,
            field_name: field.field_name.as_str(),
            return_type: &bound.ty,
        };
        let terminal: Terminal<'_> = Box::new(move |input| self.call_binding(&bound.binding, input).boxed());
        let call = Next::new(&layers, terminal).run(info, input);

        let result = if self.schema.config.execution.recover_panics {
            match AssertUnwindSafe(call).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    tracing::error!("panic while resolving {}: {}", field.coordinate, panic_message(&*payload));
                    Err(ResolverError::new("internal system error"))
                }
            }
        } else {
            call.await
        };

        result.map_err(|error| error.into_query_error(ctx.path.clone(), &ctx.locations))
    }

    /// Schema middlewares, then the schema directives of the field.
    fn layers<'s>(&'s self, bound: &'s BoundField) -> Result<Vec<Layer<'s>>, String> {
        let middlewares = self
            .schema
            .middlewares
            .iter()
            .map(|middleware| Layer::Middleware(middleware.as_ref()));
        let directives = bound.directives.iter().map(|directive| {
            self.schema
                .directives
                .get(&directive.name)
                .map(|handler| Layer::Directive(handler.as_ref(), &directive.arguments))
                .ok_or_else(|| format!("directive {} is not implemented", directive.name))
        });

        middlewares.map(Ok).chain(directives).collect()
    }

    async fn call_binding(&self, binding: &Binding, input: ResolverInput) -> ResolverResult<FieldValue> {
        let ResolverInput { parent, args, ctx } = input;
        match binding {
            Binding::Attribute { name } => match &parent {
                FieldValue::Object(object) => object.attribute(name).ok_or_else(|| {
                    ResolverError::new(format!("{} has no attribute {name}", object.type_name()))
                }),
                other => Err(ResolverError::new(format!(
                    "cannot read attribute {name} of {}",
                    other.describe()
                ))),
            },
            Binding::Method { name, arguments, .. } => {
                let Some(object) = parent.as_object() else {
                    return Err(ResolverError::new(format!("cannot call method {name} of {}", parent.describe())));
                };
                let args = args
                    .into_inner()
                    .into_iter()
                    .map(|(argument, value)| match arguments.get(argument.as_str()) {
                        Some(param) => (Name::new(param), value),
                        None => (argument, value),
                    })
                    .collect();
                let input = ResolverInput {
                    parent: parent.clone(),
                    args: Arguments::new(args),
                    ctx,
                };
                object.call(name, input).await
            }
            Binding::Resolver { key } => {
                let Some(resolver) = self.schema.resolvers.get(key) else {
                    return Err(ResolverError::new(format!("no resolver is registered for {key}")));
                };
                resolver.resolve(ResolverInput { parent, args, ctx }).await
            }
            Binding::Subscription { .. } => Ok(self.event.clone().unwrap_or_default()),
            Binding::Entities => self.resolve_entities(args, &ctx).await,
            Binding::Service => self.resolve_service(),
            Binding::IntrospectSchema | Binding::IntrospectType if self.schema.config.execution.disable_introspection => {
                Err(ResolverError::new("introspection disabled"))
            }
            Binding::IntrospectSchema => Ok(FieldValue::object(SchemaIntrospection::new(Arc::clone(
                &self.schema.registry,
            )))),
            Binding::IntrospectType => {
                let name = args.get_as::<String>("name")?;
                Ok(match self.schema.registry.lookup(&name) {
                    Some(_) => FieldValue::object(TypeIntrospection::new(&self.schema.registry, TypeRef::named(name))),
                    None => FieldValue::Null,
                })
            }
        }
    }

    /// Completes `value` against the declared type `ty`, resolving sub-selections.
    ///
    /// A nullable position turns a failure below it into null, a non-null position propagates it.
    pub(crate) fn complete_value<'s>(
        &'s self,
        field: &'s FieldPlan,
        ty: &'s TypeRef,
        child: &'s ChildPlan,
        value: FieldValue,
        ctx: ResolverContext,
    ) -> BoxFuture<'s, ExecutionResult> {
        async move {
            match ty {
                TypeRef::NonNull(inner) => match self.complete_nullable(field, inner, child, value, &ctx).await {
                    Ok(ConstValue::Null) => Err(self.fail(&ctx, format!("`{}` must not be null", field.coordinate))),
                    result => result,
                },
                _ => Ok(self
                    .complete_nullable(field, ty, child, value, &ctx)
                    .await
                    .unwrap_or(ConstValue::Null)),
            }
        }
        .boxed()
    }

    async fn complete_nullable(
        &self,
        field: &FieldPlan,
        ty: &TypeRef,
        child: &ChildPlan,
        value: FieldValue,
        ctx: &ResolverContext,
    ) -> ExecutionResult {
        if value.is_null() {
            return Ok(ConstValue::Null);
        }

        match ty {
            TypeRef::NonNull(_) => self.complete_value(field, ty, child, value, ctx.clone()).await,
            TypeRef::List(item_ty) => self.complete_list(field, item_ty, child, value, ctx).await,
            TypeRef::Named(type_name) => match child {
                ChildPlan::Leaf => self.complete_leaf(field, type_name, value, ctx),
                ChildPlan::Object(plan) => {
                    let object = self.as_object(field, value, Some(type_name.as_str()), ctx)?;
                    self.resolve_selection_set(plan, &object, ctx).await
                }
                ChildPlan::Dispatch(plans) => {
                    let object = self.as_object(field, value, None, ctx)?;
                    let concrete_type = object.as_object().map(|object| object.type_name()).unwrap_or_default();
                    let Some(plan) = plans.get(concrete_type) else {
                        tracing::debug!("{} resolved to {}, which is not a possible type", field.coordinate, concrete_type);
                        return Err(self.fail(ctx, format!("unresolved concrete type for field {}", field.coordinate)));
                    };
                    self.resolve_selection_set(plan, &object, ctx).await
                }
            },
        }
    }

    /// Map-like values become [`MapObject`]s, typed by their `__typename` or `default_type`.
    fn as_object(
        &self,
        field: &FieldPlan,
        value: FieldValue,
        default_type: Option<&str>,
        ctx: &ResolverContext,
    ) -> Result<FieldValue, PropagateNull> {
        match value {
            FieldValue::Object(_) => Ok(value),
            FieldValue::Value(ConstValue::Object(fields)) => MapObject::from_map(fields, default_type)
                .map(FieldValue::object)
                .ok_or_else(|| self.fail(ctx, format!("unresolved concrete type for field {}", field.coordinate))),
            other => Err(self.fail(
                ctx,
                format!("`{}` expects an object, got {}", field.coordinate, other.describe()),
            )),
        }
    }

    fn complete_leaf(
        &self,
        field: &FieldPlan,
        type_name: &str,
        value: FieldValue,
        ctx: &ResolverContext,
    ) -> ExecutionResult {
        let FieldValue::Value(value) = value else {
            return Err(self.fail(
                ctx,
                format!("`{}` expects a {type_name} value, got {}", field.coordinate, value.describe()),
            ));
        };

        match self.schema.registry.lookup(type_name) {
            Some(MetaType::Enum(enum_type)) => {
                let name = match &value {
                    ConstValue::Enum(name) => Some(name.as_str()),
                    ConstValue::String(name) => Some(name.as_str()),
                    _ => None,
                };
                match name {
                    Some(name) if enum_type.values.contains_key(name) => Ok(ConstValue::Enum(Name::new(name))),
                    _ => Err(self.fail(ctx, format!("Enum `{type_name}` cannot represent {value}"))),
                }
            }
            _ => match self.schema.scalars.get(type_name) {
                Some(codec) => codec.marshal(value).map_err(|error| self.fail(ctx, error.0)),
                None => Err(self.fail(ctx, format!("no codec is registered for scalar {type_name}"))),
            },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
