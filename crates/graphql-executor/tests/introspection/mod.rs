use graphql_executor::{Config, Schema, SchemaBuilder};
use indoc::indoc;
use serde_json::{json, Value};

use crate::errors;

const SDL: &str = indoc! {r#"
    directive @cached(seconds: Int = 60) on FIELD_DEFINITION

    type Query {
        me: User
        role: Role
    }

    "A registered user."
    type User {
        id: ID!
        name: String!
        nickname: String @deprecated(reason: "use name")
        friends: [User!]!
    }

    enum Role {
        ADMIN
        MEMBER @deprecated
    }
"#};

fn builder() -> SchemaBuilder {
    Schema::from_sdl(SDL)
        .resolver_fn("Query", "me", |_| async { Ok(json!({ "id": "1", "name": "Ada" }).into()) })
        .resolver_fn("Query", "role", |_| async { Ok("ADMIN".into()) })
}

async fn data(query: &str) -> Value {
    let schema = builder().build().unwrap();
    let response = schema.execute(query).await;
    assert!(response.is_ok(), "{:?}", response.errors);
    response.to_json_value()["data"].clone()
}

#[tokio::test]
async fn types_describe_their_fields() {
    let data = data(indoc! {r#"
        {
            __schema { queryType { name } mutationType { name } }
            __type(name: "User") {
                kind
                name
                description
                fields {
                    name
                    type { kind name ofType { kind name ofType { kind name } } }
                }
            }
        }
    "#})
    .await;

    assert_eq!(
        data,
        json!({
            "__schema": { "queryType": { "name": "Query" }, "mutationType": null },
            "__type": {
                "kind": "OBJECT",
                "name": "User",
                "description": "A registered user.",
                "fields": [
                    {
                        "name": "id",
                        "type": { "kind": "NON_NULL", "name": null, "ofType": { "kind": "SCALAR", "name": "ID", "ofType": null } },
                    },
                    {
                        "name": "name",
                        "type": { "kind": "NON_NULL", "name": null, "ofType": { "kind": "SCALAR", "name": "String", "ofType": null } },
                    },
                    {
                        "name": "friends",
                        "type": {
                            "kind": "NON_NULL",
                            "name": null,
                            "ofType": { "kind": "LIST", "name": null, "ofType": { "kind": "NON_NULL", "name": null } },
                        },
                    },
                ],
            },
        })
    );
}

#[tokio::test]
async fn deprecations_are_listed_on_request() {
    let data = data(indoc! {r#"
        {
            user: __type(name: "User") {
                fields(includeDeprecated: true) { name isDeprecated deprecationReason }
            }
            role: __type(name: "Role") {
                enumValues(includeDeprecated: true) { name isDeprecated deprecationReason }
            }
            hidden: __type(name: "Role") { enumValues { name } }
        }
    "#})
    .await;

    assert_eq!(
        data["user"]["fields"][2],
        json!({ "name": "nickname", "isDeprecated": true, "deprecationReason": "use name" })
    );
    assert_eq!(
        data["role"]["enumValues"],
        json!([
            { "name": "ADMIN", "isDeprecated": false, "deprecationReason": null },
            { "name": "MEMBER", "isDeprecated": true, "deprecationReason": "No longer supported" },
        ])
    );
    assert_eq!(data["hidden"]["enumValues"], json!([{ "name": "ADMIN" }]));
}

#[tokio::test]
async fn schema_lists_types_and_directives_by_name() {
    let data = data(indoc! {r#"
        {
            __schema {
                types { name }
                directives { name locations args { name defaultValue } }
            }
            missing: __type(name: "Missing") { name }
        }
    "#})
    .await;

    let names = data["__schema"]["types"]
        .as_array()
        .unwrap()
        .iter()
        .map(|ty| ty["name"].as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
    assert!(names.iter().any(|name| name == "User"));
    assert!(names.iter().all(|name| !name.starts_with("__")));

    assert_eq!(
        data["__schema"]["directives"],
        json!([
            { "name": "cached", "locations": ["FIELD_DEFINITION"], "args": [{ "name": "seconds", "defaultValue": "60" }] },
            {
                "name": "deprecated",
                "locations": ["FIELD_DEFINITION", "ARGUMENT_DEFINITION", "INPUT_FIELD_DEFINITION", "ENUM_VALUE"],
                "args": [{ "name": "reason", "defaultValue": "\"No longer supported\"" }],
            },
            {
                "name": "include",
                "locations": ["FIELD", "FRAGMENT_SPREAD", "INLINE_FRAGMENT"],
                "args": [{ "name": "if", "defaultValue": null }],
            },
            {
                "name": "skip",
                "locations": ["FIELD", "FRAGMENT_SPREAD", "INLINE_FRAGMENT"],
                "args": [{ "name": "if", "defaultValue": null }],
            },
        ])
    );
    assert_eq!(data["missing"], json!(null));
}

#[tokio::test]
async fn typename_of_introspection_objects() {
    let data = data(r#"{ __schema { __typename queryType { __typename } } }"#).await;

    assert_eq!(
        data,
        json!({ "__schema": { "__typename": "__Schema", "queryType": { "__typename": "__Type" } } })
    );
}

#[tokio::test]
async fn disabled_introspection_fails_the_introspection_fields() {
    let config = Config::from_toml("[execution]\ndisable_introspection = true").unwrap();
    let schema = builder().config(config).build().unwrap();

    let response = schema.execute("{ __schema { queryType { name } } }").await;
    assert_eq!(response.to_json_value()["data"], json!(null));
    assert_eq!(
        errors(&response),
        json!([{ "message": "introspection disabled", "path": ["__schema"] }])
    );

    let response = schema.execute(r#"{ me { name } __type(name: "User") { name } }"#).await;
    assert_eq!(
        response.to_json_value()["data"],
        json!({ "me": { "name": "Ada" }, "__type": null })
    );
    assert_eq!(
        errors(&response),
        json!([{ "message": "introspection disabled", "path": ["__type"] }])
    );

    let response = schema.execute("{ __typename role }").await;
    assert_eq!(
        response.to_json_value(),
        json!({ "data": { "__typename": "Query", "role": "ADMIN" } })
    );
}
