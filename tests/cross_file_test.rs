// Handlers, routes and models split across files (and languages) must still be resolved
use polyglot_openapi::extractor::{Framework, ParameterLocation, Route};
use polyglot_openapi::model::{HttpMethod, SourceUnit};
use polyglot_openapi::parser::{parse_batch, Language, SourceFile};
use pretty_assertions::assert_eq;

fn units(files: &[(&str, Language, &str)]) -> Vec<SourceUnit> {
    let sources: Vec<SourceFile> = files
        .iter()
        .map(|(path, language, code)| SourceFile::new(*path, *language, code.as_bytes()))
        .collect();
    let (units, report) = parse_batch(&sources);
    assert!(report.is_clean(), "unexpected diagnostics: {:?}", report);
    units
}

fn find<'a>(routes: &'a [Route], path: &str) -> &'a Route {
    routes
        .iter()
        .find(|r| r.path == path)
        .unwrap_or_else(|| panic!("no route {}", path))
}

#[test]
fn test_cross_file_function_resolution() {
    let handlers_code = r#"
        use axum::Json;
        use serde::Serialize;

        #[derive(Serialize)]
        pub struct User {
            id: u32,
            name: String,
        }

        pub async fn get_user() -> Json<User> {
            Json(User { id: 1, name: "Test".to_string() })
        }

        pub async fn list_users() -> Json<Vec<User>> {
            Json(vec![])
        }
    "#;

    let routes_code = r#"
        use axum::{Router, routing::get};

        pub fn app() -> Router {
            Router::new()
                .route("/user", get(get_user))
                .route("/users", get(list_users))
        }
    "#;

    let units = units(&[
        ("src/handlers.rs", Language::Rust, handlers_code),
        ("src/routes.rs", Language::Rust, routes_code),
    ]);
    let routes = Framework::Axum.extractor().extract_routes(&units);
    assert_eq!(routes.len(), 2);

    let user_route = find(&routes, "/user");
    assert_eq!(user_route.handler, "get_user");
    assert_eq!(user_route.source_file.to_str(), Some("src/routes.rs"));
    let response = user_route.response.as_ref().unwrap();
    assert_eq!(response.reference.as_deref(), Some("#/components/schemas/User"));

    let users_route = find(&routes, "/users");
    assert_eq!(users_route.handler, "list_users");
    let response = users_route.response.as_ref().unwrap();
    assert_eq!(response.schema_type.as_deref(), Some("array"));
    assert_eq!(
        response.items.as_ref().and_then(|s| s.reference.as_deref()),
        Some("#/components/schemas/User")
    );
}

#[test]
fn test_same_handler_name_prefers_the_routing_file() {
    let first = r#"
        use axum::{Router, routing::get, Json};
        async fn index() -> Json<Vec<String>> { Json(vec![]) }
        pub fn router() -> Router { Router::new().route("/tags", get(index)) }
    "#;
    let second = r#"
        use axum::{Router, routing::get, Json};
        async fn index() -> Json<i64> { Json(0) }
        pub fn router() -> Router { Router::new().route("/count", get(index)) }
    "#;
    let units = units(&[("src/tags.rs", Language::Rust, first), ("src/count.rs", Language::Rust, second)]);
    let routes = Framework::Axum.extractor().extract_routes(&units);

    let tags = find(&routes, "/tags");
    assert_eq!(tags.response.as_ref().and_then(|s| s.schema_type.as_deref()), Some("array"));
    let count = find(&routes, "/count");
    assert_eq!(count.response.as_ref().and_then(|s| s.schema_type.as_deref()), Some("integer"));
    assert_eq!(tags.operation_id, "index");
    assert_eq!(count.operation_id, "index_2");
}

#[test]
fn test_kotlin_controller_with_java_dto() {
    let controller = r#"
package com.example.books

@RestController
@RequestMapping("/api/books")
class BookController(private val service: BookService) {
    @GetMapping("/{id}")
    fun get(@PathVariable id: Long): BookDto = service.get(id)
}
"#;
    let dto = r#"
package com.example.books;

public class BookDto {
    private Long id;
    @JsonProperty("book_title")
    private String title;
}
"#;
    let units = units(&[
        ("src/main/kotlin/BookController.kt", Language::Kotlin, controller),
        ("src/main/java/BookDto.java", Language::Java, dto),
    ]);
    let extractor = Framework::Spring.extractor();
    let routes = extractor.extract_routes(&units);
    assert_eq!(routes.len(), 1);
    let get = &routes[0];
    assert_eq!(get.path, "/api/books/{id}");
    assert_eq!(get.operation_id, "bookGet");
    assert_eq!(get.parameters[0].location, ParameterLocation::Path);
    assert_eq!(get.response.as_ref().and_then(|s| s.reference.as_deref()), Some("#/components/schemas/BookDto"));

    let schemas = extractor.extract_schemas(&units);
    let book = schemas.iter().find(|s| s.title.as_deref() == Some("BookDto")).unwrap();
    let properties: Vec<&str> = book.properties.as_ref().unwrap().keys().map(String::as_str).collect();
    assert_eq!(properties, vec!["book_title", "id"]);
}

#[test]
fn test_rails_routes_resolve_controller_actions() {
    let routes_rb = r#"Rails.application.routes.draw do
  resources :users, only: [:index, :show]
end
"#;
    let controller = r#"class UsersController < ApplicationController
  def index
    render json: User.all
  end

  def show
    render json: User.find(params[:id])
  end
end
"#;
    let units = units(&[
        ("config/routes.rb", Language::Ruby, routes_rb),
        ("app/controllers/users_controller.rb", Language::Ruby, controller),
    ]);
    let routes = Framework::Rails.extractor().extract_routes(&units);
    let summary: Vec<(HttpMethod, &str, &str)> = routes
        .iter()
        .map(|r| (r.method, r.path.as_str(), r.operation_id.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (HttpMethod::Get, "/users", "usersIndex"),
            (HttpMethod::Get, "/users/{id}", "usersShow"),
        ]
    );
    assert!(routes.iter().all(|r| r.tags == vec!["Users".to_string()]));
    assert!(routes.iter().all(|r| r.source_file.to_str() == Some("config/routes.rb")));
}
