use graphql_executor::{
    Binding, Config, DynamicObject, FieldValue, ImplementationDescriptor, MethodDescriptor, ResolverKey, Schema,
    SchemaBuilder, TypeRef,
};
use indoc::indoc;
use serde_json::json;

const SDL: &str = indoc! {r#"
    type Query {
        library: Library!
    }

    type Library {
        name: String!
        bookCount: Int!
        displayTitle: String!
        motto: String
        books(maxCount: Int = 2): [Book!]!
    }

    type Book {
        title: String!
        isbn: ID!
    }
"#};

const CONFIG: &str = indoc! {r#"
    [models.Library.fields.displayTitle]
    field_name = "title"

    [models.Library.fields.motto]
    resolver = true
"#};

const BOOKS: [(&str, &str); 3] = [("Dune", "1"), ("Emma", "2"), ("Ulysses", "3")];

fn library() -> FieldValue {
    DynamicObject::new("Library")
        .with_attribute("name", "Alexandria")
        .with_attribute("book_count", 3)
        .with_attribute("title", "The Great Library")
        .with_attribute("motto", "never read")
        .with_method("books", |input| async move {
            let max_count = input.args.get_as::<usize>("max_count")?;
            let books = BOOKS
                .iter()
                .take(max_count)
                .map(|(title, isbn)| json!({ "title": title, "isbn": isbn }))
                .collect::<Vec<_>>();
            Ok(books.into())
        })
        .into_value()
}

fn schema() -> SchemaBuilder {
    let root = DynamicObject::new("Query").with_method("library", |_| async { Ok(library()) });

    Schema::from_sdl(SDL)
        .config(Config::from_toml(CONFIG).unwrap())
        .query_root(root.into_value())
        .descriptor(ImplementationDescriptor::new("Query").method(MethodDescriptor::new("library").with_context()))
        .descriptor(
            ImplementationDescriptor::new("Library")
                .attribute("name")
                .attribute("book_count")
                .attribute("title")
                .attribute("motto")
                .method(MethodDescriptor::new("books").param("max_count")),
        )
        .descriptor(ImplementationDescriptor::map("Book"))
        .resolver_fn("Library", "motto", |_| async { Ok("Knowledge is power".into()) })
}

#[test]
fn bindings_follow_descriptors_and_configuration() {
    let schema = schema().build().unwrap();
    let bindings = schema.bindings();

    assert_eq!(
        bindings.get("Query", "library"),
        Some(&Binding::Method {
            name: "library".into(),
            arguments: Default::default(),
            takes_context: true,
        })
    );
    assert_eq!(
        bindings.get("Library", "bookCount"),
        Some(&Binding::Attribute {
            name: "book_count".into()
        })
    );
    assert_eq!(
        bindings.get("Library", "displayTitle"),
        Some(&Binding::Attribute { name: "title".into() })
    );
    assert_eq!(
        bindings.get("Library", "motto"),
        Some(&Binding::Resolver {
            key: ResolverKey::new("Library", "motto")
        })
    );
    assert_eq!(
        bindings.get("Library", "books"),
        Some(&Binding::Method {
            name: "books".into(),
            arguments: [("maxCount".to_string(), "max_count".to_string())].into_iter().collect(),
            takes_context: false,
        })
    );
    assert_eq!(bindings.get("Book", "isbn"), Some(&Binding::Attribute { name: "isbn".into() }));
}

#[tokio::test]
async fn bound_members_are_invoked() {
    let schema = schema().build().unwrap();
    let response = schema
        .execute(indoc! {r#"
            {
                library {
                    name
                    bookCount
                    displayTitle
                    motto
                    books { title }
                    few: books(maxCount: 1) { isbn }
                }
            }
        "#})
        .await;

    insta::assert_json_snapshot!(response, @r###"
    {
      "data": {
        "library": {
          "name": "Alexandria",
          "bookCount": 3,
          "displayTitle": "The Great Library",
          "motto": "Knowledge is power",
          "books": [
            {
              "title": "Dune"
            },
            {
              "title": "Emma"
            }
          ],
          "few": [
            {
              "isbn": "1"
            }
          ]
        }
      }
    }
    "###);
}

#[test]
fn ambiguous_members_fail_the_build() {
    let error = Schema::from_sdl("type Query { me: User } type User { fullName: String }")
        .resolver_fn("Query", "me", |_| async { Ok(FieldValue::Null) })
        .descriptor(
            ImplementationDescriptor::new("User")
                .attribute("full_name")
                .attribute("FullName"),
        )
        .build()
        .unwrap_err();

    assert_eq!(
        error.to_string(),
        "could not bind the schema: ambiguous binding for `User.fullName`: attribute full_name, attribute FullName"
    );
}

#[test]
fn incompatible_member_types_are_skipped() {
    let error = Schema::from_sdl("type Query { me: User } type User { fullName: String }")
        .resolver_fn("Query", "me", |_| async { Ok(FieldValue::Null) })
        .descriptor(ImplementationDescriptor::new("User").typed_attribute("full_name", TypeRef::named("String").list()))
        .build()
        .unwrap_err();

    assert_eq!(
        error.to_string(),
        "could not bind the schema: no attribute, method or resolver matches `User.fullName`"
    );
}

#[test]
fn registrations_must_name_schema_fields() {
    let error = Schema::from_sdl("type Query { me: String }")
        .resolver_fn("Query", "me", |_| async { Ok(FieldValue::Null) })
        .resolver_fn("Query", "you", |_| async { Ok(FieldValue::Null) })
        .descriptor(ImplementationDescriptor::map("Robot"))
        .build()
        .unwrap_err();

    assert_eq!(
        error.to_string(),
        "could not bind the schema: an implementation is declared for `Robot` which is not an object type of the schema; \
         a resolver is registered for `Query.you` which is not a field of the schema"
    );
}
