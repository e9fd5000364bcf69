use std::sync::{Arc, Mutex};

use graphql_executor::{
    Arguments, Config, ConstValue, DirectiveHandler, FieldInfo, FieldMiddleware, FieldValue, Next, Request,
    ResolverError, ResolverInput, ResolverResult, Schema, SchemaBuilder,
};
use indoc::indoc;
use serde_json::json;

use crate::errors;

const SDL: &str = indoc! {r#"
    directive @upper on FIELD_DEFINITION
    directive @prefix(with: String = "Dr. ") on FIELD_DEFINITION
    directive @audited on FIELD_DEFINITION

    type Query {
        greeting: String! @upper
        doctor: String @prefix
        title: String @prefix(with: "Prof. ") @upper
        audited: String @audited
        plain: String
    }
"#};

struct Upper;

#[async_trait::async_trait]
impl DirectiveHandler for Upper {
    async fn resolve(
        &self,
        _: &Arguments,
        info: FieldInfo<'_>,
        input: ResolverInput,
        next: Next<'_>,
    ) -> ResolverResult<FieldValue> {
        match next.run(info, input).await? {
            FieldValue::Value(ConstValue::String(value)) => Ok(value.to_uppercase().into()),
            other => Ok(other),
        }
    }
}

struct Prefix;

#[async_trait::async_trait]
impl DirectiveHandler for Prefix {
    async fn resolve(
        &self,
        arguments: &Arguments,
        info: FieldInfo<'_>,
        input: ResolverInput,
        next: Next<'_>,
    ) -> ResolverResult<FieldValue> {
        let prefix = arguments.get_as::<String>("with")?;
        match next.run(info, input).await? {
            FieldValue::Value(ConstValue::String(value)) => Ok(format!("{prefix}{value}").into()),
            other => Ok(other),
        }
    }
}

/// Records the fields it runs for and marks string results.
#[derive(Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl FieldMiddleware for Recorder {
    async fn resolve(&self, info: FieldInfo<'_>, input: ResolverInput, next: Next<'_>) -> ResolverResult<FieldValue> {
        self.seen
            .lock()
            .unwrap()
            .push(format!("{}.{}: {}", info.parent_type, info.field_name, info.return_type));
        match next.run(info, input).await? {
            FieldValue::Value(ConstValue::String(value)) => Ok(format!("{value}!").into()),
            other => Ok(other),
        }
    }
}

struct Refuse(&'static str);

#[async_trait::async_trait]
impl FieldMiddleware for Refuse {
    async fn resolve(&self, info: FieldInfo<'_>, input: ResolverInput, next: Next<'_>) -> ResolverResult<FieldValue> {
        if info.field_name == self.0 {
            return Err(ResolverError::new(format!("{} is not available", info.field_name)));
        }
        next.run(info, input).await
    }
}

fn builder() -> SchemaBuilder {
    Schema::from_sdl(SDL)
        .resolver_fn("Query", "greeting", |_| async { Ok("hello".into()) })
        .resolver_fn("Query", "doctor", |_| async { Ok("Who".into()) })
        .resolver_fn("Query", "title", |_| async { Ok("Moriarty".into()) })
        .resolver_fn("Query", "audited", |_| async { Ok("secret".into()) })
        .resolver_fn("Query", "plain", |_| async { Ok("plain".into()) })
        .directive("upper", Upper)
        .directive("prefix", Prefix)
}

#[tokio::test]
async fn directive_handlers_wrap_their_fields() {
    let schema = builder().directive("audited", Upper).build().unwrap();

    let response = schema.execute("{ greeting doctor title plain }").await;

    assert_eq!(
        response.to_json_value(),
        json!({ "data": {
            "greeting": "HELLO",
            "doctor": "Dr. Who",
            "title": "Prof. MORIARTY",
            "plain": "plain",
        } })
    );
}

#[tokio::test]
async fn directives_without_a_handler_fail_their_field() {
    let schema = builder().build().unwrap();

    let response = schema.execute("{ audited plain }").await;

    assert_eq!(response.to_json_value()["data"], json!({ "audited": null, "plain": "plain" }));
    assert_eq!(
        errors(&response),
        json!([{ "message": "directive audited is not implemented", "path": ["audited"] }])
    );
}

#[tokio::test]
async fn middlewares_run_outside_directives_for_every_bound_field() {
    let recorder = Recorder::default();
    let seen = Arc::clone(&recorder.seen);
    let schema = builder()
        .directive("audited", Upper)
        .middleware(recorder)
        .build()
        .unwrap();

    let response = schema.execute("{ __typename greeting doctor }").await;

    assert_eq!(
        response.to_json_value(),
        json!({ "data": { "__typename": "Query", "greeting": "HELLO!", "doctor": "Dr. Who!" } })
    );
    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, ["Query.doctor: String", "Query.greeting: String!"]);
}

#[tokio::test]
async fn middlewares_can_answer_without_the_binding() {
    let schema = builder()
        .directive("audited", Upper)
        .middleware(Refuse("greeting"))
        .middleware(Refuse("doctor"))
        .build()
        .unwrap();

    let response = schema.execute("{ doctor plain }").await;

    assert_eq!(response.to_json_value()["data"], json!({ "doctor": null, "plain": "plain" }));
    assert_eq!(
        errors(&response),
        json!([{ "message": "doctor is not available", "path": ["doctor"] }])
    );

    let response = schema.execute("{ greeting plain }").await;
    assert_eq!(response.to_json_value()["data"], json!(null));
}

#[tokio::test]
async fn complexity_limit_from_the_config_rejects_the_request() {
    let config = Config::from_toml("[execution]\ncomplexity_limit = 2").unwrap();
    let schema = builder().directive("audited", Upper).config(config).build().unwrap();

    let response = schema.execute("{ greeting doctor }").await;
    assert!(response.is_ok());

    let response = schema.execute("{ greeting doctor title }").await;
    assert_eq!(
        response.to_json_value(),
        json!({
            "data": null,
            "errors": [{
                "message": "operation has complexity 3, which exceeds the limit of 2",
                "extensions": { "code": "COMPLEXITY_LIMIT_EXCEEDED" },
            }],
        })
    );
}

#[tokio::test]
async fn complexity_limit_can_depend_on_the_request() {
    struct Trusted;

    let config = Config::from_toml("[execution]\ncomplexity_limit = 100").unwrap();
    let schema = builder()
        .directive("audited", Upper)
        .config(config)
        .field_complexity("Query", "plain", |_, _| 10)
        .complexity_limit_fn(|request| match request.data.get::<Trusted>() {
            Some(_) => None,
            None => Some(5),
        })
        .build()
        .unwrap();

    let response = schema.execute("{ plain }").await;
    assert_eq!(
        errors(&response),
        json!([{ "message": "operation has complexity 10, which exceeds the limit of 5", "path": [] }])
    );

    let response = schema.execute(Request::new("{ plain }").data(Trusted)).await;
    assert_eq!(response.to_json_value(), json!({ "data": { "plain": "plain" } }));
}
