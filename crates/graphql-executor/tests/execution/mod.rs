use graphql_executor::{
    DynamicObject, ImplementationDescriptor, Request, ResolverError, Schema, SchemaBuilder, Variables,
};
use indoc::indoc;
use rstest::rstest;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::errors;

mod mutations;
mod scheduling;

const SDL: &str = indoc! {r#"
    type Query {
        me: User
        account: User!
        user(id: Int!): User
        users: [User!]
        version: String!
        pet(kind: String!): Pet
        greeting(name: String = "world"): String!
        role: Role
        viewer: String
        explode: String
        price(amount: Money): String
        pets: [Pet]
        strictPets: [Pet!]
    }

    scalar Money

    enum Role {
        ADMIN
        MEMBER
    }

    interface Pet {
        name: String!
    }

    type Dog implements Pet {
        name: String!
        barks: Boolean!
    }

    type Cat implements Pet {
        name: String!
        lives: Int!
    }

    type User {
        id: ID!
        name: String!
        email: String
    }
"#};

struct Viewer(&'static str);

#[allow(clippy::panic)]
fn schema() -> SchemaBuilder {
    Schema::from_sdl(SDL)
        .descriptor(ImplementationDescriptor::map("User"))
        .descriptor(ImplementationDescriptor::map("Dog"))
        .descriptor(ImplementationDescriptor::new("Cat").attribute("name").attribute("lives"))
        .resolver_fn("Query", "me", |_| async {
            Ok(json!({ "id": 1, "name": "Ada" }).into())
        })
        .resolver_fn("Query", "account", |_| async {
            Err(ResolverError::new("account service unavailable"))
        })
        .resolver_fn("Query", "user", |input| async move {
            let id = input.args.get_as::<i64>("id")?;
            Ok(json!({ "id": id, "name": format!("User {id}") }).into())
        })
        .resolver_fn("Query", "users", |_| async {
            Ok(json!([
                { "id": 1, "name": "Ada" },
                { "id": 2, "name": null },
                { "id": 3, "name": "Grace" }
            ])
            .into())
        })
        .resolver_fn("Query", "version", |_| async { Ok("1.0".into()) })
        .resolver_fn("Query", "pet", |input| async move {
            let pet = match input.args.get_as::<String>("kind")?.as_str() {
                "dog" => json!({ "__typename": "Dog", "name": "Rex", "barks": true }).into(),
                "cat" => DynamicObject::new("Cat")
                    .with_attribute("name", "Tom")
                    .with_attribute("lives", 9)
                    .into_value(),
                "stray" => DynamicObject::new("Cat").with_attribute("name", "Tom").into_value(),
                _ => json!({ "__typename": "Fish", "name": "Nemo" }).into(),
            };
            Ok(pet)
        })
        .resolver_fn("Query", "greeting", |input| async move {
            let name = input.args.get_as::<String>("name")?;
            Ok(format!("Hello, {name}!").into())
        })
        .resolver_fn("Query", "role", |_| async { Ok("ADMIN".into()) })
        .resolver_fn("Query", "viewer", |input| async move {
            Ok(input.ctx.data::<Viewer>().map(|viewer| viewer.0).into())
        })
        .resolver_fn("Query", "explode", |_| async { panic!("kaboom") })
        .resolver_fn("Query", "price", |input| async move {
            Ok(input.args.get_as::<Option<String>>("amount")?.into())
        })
        .resolver_fn("Query", "pets", |_| async { Ok(mixed_pets().into()) })
        .resolver_fn("Query", "strictPets", |_| async { Ok(mixed_pets().into()) })
        .scalar("Money", graphql_executor::scalars::StringScalar)
}

fn mixed_pets() -> Value {
    json!([
        { "__typename": "Dog", "name": "a", "barks": true },
        { "__typename": "Fish", "name": "b" },
        { "__typename": "Dog", "name": "c", "barks": false }
    ])
}

#[tokio::test]
async fn nearest_nullable_ancestor_absorbs_the_failure() {
    let schema = schema().build().unwrap();
    let response = schema.execute("{ me { id name } users { id name } version }").await;

    assert_eq!(
        response.to_json_value(),
        json!({
            "data": {
                "me": { "id": "1", "name": "Ada" },
                "users": null,
                "version": "1.0"
            },
            "errors": [{
                "message": "`User.name` must not be null",
                "locations": [{ "line": 1, "column": 29 }],
                "path": ["users", 1, "name"]
            }]
        })
    );
}

#[tokio::test]
async fn failing_non_null_root_field_nulls_data() {
    let schema = schema().build().unwrap();
    let response = schema.execute("{ version account { id } }").await;

    assert_eq!(response.data.clone().into_json().unwrap(), Value::Null);
    assert_eq!(
        errors(&response),
        json!([{ "message": "account service unavailable", "path": ["account"] }])
    );
}

#[tokio::test]
async fn invalid_argument_fails_only_its_field() {
    let schema = schema().build().unwrap();

    let response = schema.execute(r#"{ user(id: "abc") { id } version }"#).await;
    assert_eq!(
        response.data.clone().into_json().unwrap(),
        json!({ "user": null, "version": "1.0" })
    );
    assert_eq!(
        errors(&response),
        json!([{ "message": r#"Int cannot represent the string "abc" for id"#, "path": ["user"] }])
    );

    let response = schema.execute(r#"{ user(id: "7") { id name } }"#).await;
    assert!(response.is_ok());
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({ "user": { "id": "7", "name": "User 7" } })
    );
}

#[tokio::test]
async fn custom_scalar_variables_fail_only_their_field() {
    let schema = schema().build().unwrap();
    let query = "query Price($amount: Money) { price(amount: $amount) version }";

    let response = schema
        .execute(Request::new(query).variables(Variables::from_json(json!({ "amount": 5 }))))
        .await;
    assert_eq!(
        response.data.clone().into_json().unwrap(),
        json!({ "price": null, "version": "1.0" })
    );
    assert_eq!(
        errors(&response),
        json!([{ "message": "String cannot represent the number 5 for amount", "path": ["price"] }])
    );

    let response = schema
        .execute(Request::new(query).variables(Variables::from_json(json!({ "amount": "5 EUR" }))))
        .await;
    assert!(response.is_ok(), "{:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({ "price": "5 EUR", "version": "1.0" })
    );
}

#[tokio::test]
async fn invalid_variables_reject_the_request() {
    let schema = schema().build().unwrap();
    let request = Request::new("query User($id: Int!) { user(id: $id) { id } }")
        .variables(Variables::from_json(json!({ "id": "abc" })));

    let response = schema.execute(request).await;
    assert_eq!(
        response.to_json_value(),
        json!({
            "data": null,
            "errors": [{ "message": r#"Int cannot represent the string "abc" for $id"# }]
        })
    );
}

const PET_QUERY: &str = indoc! {r#"
    query Pet($kind: String!) {
        pet(kind: $kind) {
            __typename
            name
            ... on Dog { barks }
            ... on Cat { lives }
        }
        version
    }
"#};

#[rstest]
#[case::map_backed("dog", json!({ "__typename": "Dog", "name": "Rex", "barks": true }))]
#[case::dynamic("cat", json!({ "__typename": "Cat", "name": "Tom", "lives": 9 }))]
#[tokio::test]
async fn abstract_fields_dispatch_on_the_concrete_type(#[case] kind: &str, #[case] expected: Value) {
    let schema = schema().build().unwrap();
    let request = Request::new(PET_QUERY).variables(Variables::from_json(json!({ "kind": kind })));

    let response = schema.execute(request).await;
    assert!(response.is_ok(), "{:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({ "pet": expected, "version": "1.0" })
    );
}

#[tokio::test]
async fn unknown_concrete_type_leaves_siblings_intact() {
    let schema = schema().build().unwrap();
    let request = Request::new(PET_QUERY).variables(Variables::from_json(json!({ "kind": "fish" })));

    let response = schema.execute(request).await;
    assert_eq!(
        response.data.clone().into_json().unwrap(),
        json!({ "pet": null, "version": "1.0" })
    );
    assert_eq!(
        errors(&response),
        json!([{ "message": "unresolved concrete type for field Query.pet", "path": ["pet"] }])
    );
}

#[rstest]
#[case::nullable_items("pets", json!([{ "name": "a" }, null, { "name": "c" }]))]
#[case::non_null_items("strictPets", Value::Null)]
#[tokio::test]
async fn unresolvable_list_items_follow_item_nullability(#[case] field: &str, #[case] expected: Value) {
    let schema = schema().build().unwrap();
    let response = schema.execute(format!("{{ {field} {{ name }} version }}")).await;

    assert_eq!(
        response.data.clone().into_json().unwrap(),
        json!({ field: expected, "version": "1.0" })
    );
    assert_eq!(
        errors(&response),
        json!([{ "message": format!("unresolved concrete type for field Query.{field}"), "path": [field, 1] }])
    );
}

#[tokio::test]
async fn missing_attributes_are_field_errors() {
    let schema = schema().build().unwrap();
    let request = Request::new(PET_QUERY).variables(Variables::from_json(json!({ "kind": "stray" })));

    let response = schema.execute(request).await;
    assert_eq!(
        response.data.clone().into_json().unwrap(),
        json!({ "pet": null, "version": "1.0" })
    );
    assert_eq!(
        errors(&response),
        json!([{ "message": "Cat has no attribute lives", "path": ["pet", "lives"] }])
    );
}

#[tokio::test]
async fn defaults_aliases_and_enums() {
    let schema = schema().build().unwrap();
    let response = schema
        .execute(r#"{ plain: greeting named: greeting(name: "Grace") role }"#)
        .await;

    assert!(response.is_ok());
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({ "plain": "Hello, world!", "named": "Hello, Grace!", "role": "ADMIN" })
    );
}

#[tokio::test]
async fn request_data_shadows_schema_data() {
    let anonymous = schema().build().unwrap();
    let response = anonymous.execute("{ viewer }").await;
    assert_eq!(response.data.into_json().unwrap(), json!({ "viewer": null }));

    let with_viewer = schema().data(Viewer("schema")).build().unwrap();
    let response = with_viewer.execute("{ viewer }").await;
    assert_eq!(response.data.into_json().unwrap(), json!({ "viewer": "schema" }));

    let response = with_viewer
        .execute(Request::new("{ viewer }").data(Viewer("request")))
        .await;
    assert_eq!(response.data.into_json().unwrap(), json!({ "viewer": "request" }));
}

#[tokio::test]
async fn panics_become_field_errors() {
    let schema = schema().build().unwrap();
    let response = schema.execute("{ explode version }").await;

    assert_eq!(
        response.data.clone().into_json().unwrap(),
        json!({ "explode": null, "version": "1.0" })
    );
    assert_eq!(
        errors(&response),
        json!([{ "message": "internal system error", "path": ["explode"] }])
    );
}

#[tokio::test]
async fn error_presenter_sees_every_error() {
    let schema = schema()
        .error_presenter(|error| error.with_extension("code", "UPSTREAM"))
        .build()
        .unwrap();

    let response = schema.execute("{ me { id } account { id } }").await;
    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].extensions["code"], json!("UPSTREAM"));

    let response = schema.execute("{ nope }").await;
    assert_eq!(response.errors[0].extensions["code"], json!("UPSTREAM"));
}

#[tokio::test]
async fn cancelled_requests_do_not_start_fields() {
    let schema = schema().build().unwrap();
    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let response = schema
        .execute_with_cancellation("{ me { id } role }", cancellation)
        .await;
    assert_eq!(
        response.data.clone().into_json().unwrap(),
        json!({ "me": null, "role": null })
    );
    assert_eq!(
        errors(&response),
        json!([
            { "message": "operation cancelled", "path": ["me"] },
            { "message": "operation cancelled", "path": ["role"] }
        ])
    );
}

#[tokio::test]
async fn invalid_documents_are_request_errors() {
    let schema = schema().build().unwrap();

    insta::assert_json_snapshot!(schema.execute("{ nope }").await, @r###"
    {
      "data": null,
      "errors": [
        {
          "message": "type `Query` has no field `nope`"
        }
      ]
    }
    "###);

    insta::assert_json_snapshot!(schema.execute("{ me }").await, @r###"
    {
      "data": null,
      "errors": [
        {
          "message": "field `Query.me` of type `User` needs a selection set"
        }
      ]
    }
    "###);
}
