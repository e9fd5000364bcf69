use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use graphql_executor::{
    Config, DynamicObject, FieldValue, ImplementationDescriptor, Request, ResolverError, ResolverResult, Schema,
    SchemaBuilder, Variables,
};
use indoc::indoc;
use serde_json::{json, Value};

use crate::errors;

const SDL: &str = indoc! {r#"
    type Query {
        topProduct: Product
    }

    type Product @key(fields: "upc") {
        upc: String!
        name: String
        price: Int
    }

    type User @key(fields: "id") {
        id: ID!
        username: String!
    }

    type Review @key(fields: "id", resolvable: false) {
        id: ID!
    }
"#};

const ENTITIES_QUERY: &str = indoc! {r#"
    query Entities($representations: [_Any!]!) {
        _entities(representations: $representations) {
            __typename
            ... on Product { upc name }
            ... on User { id username }
        }
    }
"#};

#[derive(serde::Deserialize)]
struct ProductKey {
    upc: String,
}

#[derive(serde::Deserialize)]
struct UserKey {
    id: String,
}

type Batches = Arc<Mutex<Vec<usize>>>;

fn schema() -> (SchemaBuilder, Batches) {
    let batches = Batches::default();
    let product_batches = Arc::clone(&batches);

    let builder = Schema::from_sdl(SDL)
        .descriptor(ImplementationDescriptor::map("Product"))
        .descriptor(ImplementationDescriptor::new("User").attribute("id").attribute("username"))
        .descriptor(ImplementationDescriptor::map("Review"))
        .resolver_fn("Query", "topProduct", |_| async {
            Ok(json!({ "upc": "1", "name": "Product 1" }).into())
        })
        .entity_resolver_fn("Product", move |representations, _| {
            product_batches.lock().unwrap().push(representations.len());
            async move {
                representations
                    .iter()
                    .map(|representation| -> ResolverResult<FieldValue> {
                        let ProductKey { upc } = representation.to_typed()?;
                        if upc == "0" {
                            return Err(ResolverError::new("discontinued"));
                        }
                        Ok(json!({ "upc": upc, "name": format!("Product {upc}"), "price": 10 }).into())
                    })
                    .collect()
            }
        })
        .entity_resolver_fn("User", |representations, _| async move {
            representations
                .iter()
                .map(|representation| -> ResolverResult<FieldValue> {
                    let UserKey { id } = representation.to_typed()?;
                    Ok(DynamicObject::new("User")
                        .with_attribute("username", format!("user-{id}"))
                        .with_attribute("id", id)
                        .into_value())
                })
                .collect()
        });

    (builder, batches)
}

fn entities(representations: Value) -> Request {
    Request::new(ENTITIES_QUERY).variables(Variables::from_json(json!({ "representations": representations })))
}

#[tokio::test]
async fn entities_keep_representation_order() {
    let (builder, batches) = schema();
    let schema = builder.build().unwrap();

    let response = schema
        .execute(entities(json!([
            { "__typename": "Product", "upc": "1" },
            { "__typename": "User", "id": "u1" },
            { "__typename": "Product", "upc": "0" },
            { "__typename": "Product", "sku": "x" },
            { "__typename": "Review", "id": "r1" },
            { "upc": "2" },
            { "__typename": "Product", "upc": "2" }
        ])))
        .await;

    assert_eq!(
        response.data.clone().into_json().unwrap(),
        json!({
            "_entities": [
                { "__typename": "Product", "upc": "1", "name": "Product 1" },
                { "__typename": "User", "id": "u1", "username": "user-u1" },
                null,
                null,
                null,
                null,
                { "__typename": "Product", "upc": "2", "name": "Product 2" }
            ]
        })
    );
    assert_eq!(
        errors(&response),
        json!([
            {
                "message": r#"finding resolver for Entity "Product": no key matched the representation"#,
                "path": ["_entities", 3]
            },
            { "message": "unknown type: Review", "path": ["_entities", 4] },
            { "message": "__typename must be an existing string", "path": ["_entities", 5] },
            { "message": r#"resolving Entity "Product": discontinued"#, "path": ["_entities", 2] }
        ])
    );

    // One call per entity type, with every valid representation of that type.
    assert_eq!(*batches.lock().unwrap(), [3]);
}

#[tokio::test]
async fn slow_entity_groups_keep_their_positions() {
    let (builder, _) = schema();
    let schema = builder
        .entity_resolver_fn("Product", |representations, _| async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            representations
                .iter()
                .map(|representation| -> ResolverResult<FieldValue> {
                    let ProductKey { upc } = representation.to_typed()?;
                    Ok(json!({ "upc": upc, "name": format!("Slow {upc}") }).into())
                })
                .collect()
        })
        .build()
        .unwrap();

    let response = schema
        .execute(entities(json!([
            { "__typename": "Product", "upc": "1" },
            { "__typename": "User", "id": "u2" },
            { "__typename": "Product", "upc": "3" }
        ])))
        .await;

    assert!(response.is_ok(), "{:?}", response.errors);
    assert_eq!(
        response.data.into_json().unwrap(),
        json!({
            "_entities": [
                { "__typename": "Product", "upc": "1", "name": "Slow 1" },
                { "__typename": "User", "id": "u2", "username": "user-u2" },
                { "__typename": "Product", "upc": "3", "name": "Slow 3" }
            ]
        })
    );
}

#[tokio::test]
async fn short_entity_batches_fail_every_entry() {
    let (builder, _) = schema();
    let schema = builder
        .entity_resolver_fn("User", |_, _| async { Vec::new() })
        .build()
        .unwrap();

    let response = schema
        .execute(entities(json!([
            { "__typename": "User", "id": "u1" },
            { "__typename": "Product", "upc": "1" },
            { "__typename": "User", "id": "u2" }
        ])))
        .await;

    assert_eq!(
        response.data.clone().into_json().unwrap(),
        json!({
            "_entities": [null, { "__typename": "Product", "upc": "1", "name": "Product 1" }, null]
        })
    );
    let message = r#"resolving Entity "User": the entity resolver returned 0 results for 2 representations"#;
    assert_eq!(
        errors(&response),
        json!([
            { "message": message, "path": ["_entities", 0] },
            { "message": message, "path": ["_entities", 2] }
        ])
    );
}

#[tokio::test]
async fn service_exposes_the_schema_document() {
    let (builder, _) = schema();
    let schema = builder.build().unwrap();

    let response = schema.execute("{ _service { sdl } }").await;
    assert_eq!(
        response.to_json_value(),
        json!({ "data": { "_service": { "sdl": SDL } } })
    );
}

#[tokio::test]
async fn service_can_be_hidden() {
    let (builder, _) = schema();
    let schema = builder
        .config(Config::from_toml("[execution]\ndisable_introspection = true").unwrap())
        .build()
        .unwrap();

    let response = schema.execute("{ _service { sdl } }").await;
    assert_eq!(response.data.clone().into_json().unwrap(), Value::Null);
    assert_eq!(
        errors(&response),
        json!([{ "message": "federated introspection disabled", "path": ["_service"] }])
    );
}

#[test]
fn entity_types_are_generated() {
    let (builder, _) = schema();
    let schema = builder.build().unwrap();
    let registry = schema.registry();

    assert!(registry.has_federation());
    assert!(registry.is_possible_type("_Entity", "Product"));
    assert!(registry.is_possible_type("_Entity", "User"));
    assert!(!registry.is_possible_type("_Entity", "Review"));
}
