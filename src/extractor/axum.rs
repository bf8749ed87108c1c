use crate::extractor::{
    build_routes, rust_extractor_io, Extractor, Framework, Handler, HandlerIo, ParameterConvention, Route,
    RouteExtractor, SchemaGenerator,
};
use crate::model::SourceUnit;
use crate::parser::Language;

use log::debug;

/// Axum route extractor
pub struct AxumExtractor;

impl RouteExtractor for AxumExtractor {
    fn framework(&self) -> Framework {
        Framework::Axum
    }

    fn extract_routes(&self, units: &[SourceUnit]) -> Vec<Route> {
        let routes = build_routes(units, is_axum_unit, &AxumConvention);
        debug!("Found {} Axum routes", routes.len());
        routes
    }
}

/// Rust files that use axum, or at least not actix-web.
fn is_axum_unit(unit: &SourceUnit) -> bool {
    unit.language == Language::Rust
        && (imports(unit, "axum") || !imports(unit, "actix_web"))
}

pub(crate) fn imports(unit: &SourceUnit, krate: &str) -> bool {
    unit.imports
        .iter()
        .any(|i| i == krate || i.strip_prefix(krate).is_some_and(|rest| rest.starts_with("::")))
}

struct AxumConvention;

impl ParameterConvention for AxumConvention {
    fn handler_io(&self, handler: &Handler<'_>, schemas: &mut SchemaGenerator<'_>) -> HandlerIo {
        rust_extractor_io(handler, schemas, |wrapper| match wrapper {
            "Json" | "Form" => Some(Extractor::Body),
            "Path" => Some(Extractor::Path),
            "Query" => Some(Extractor::Query),
            "TypedHeader" => Some(Extractor::Header),
            // State, Extension, ConnectInfo and friends
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{Parameter, ParameterLocation, Schema};
    use crate::model::HttpMethod;
    use crate::parser::parse_source;
    use crate::type_map::TypeMapping;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn parse_code(code: &str) -> SourceUnit {
        parse_source(Path::new("src/main.rs"), Language::Rust, code.as_bytes()).expect("Failed to parse test code")
    }

    #[test]
    fn test_simple_route_extraction() {
        let code = r#"
            use axum::{Router, routing::get};

            async fn handler() -> &'static str {
                "Hello, World!"
            }

            fn app() -> Router {
                Router::new().route("/", get(handler))
            }
        "#;

        let routes = AxumExtractor.extract_routes(&[parse_code(code)]);

        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].path, "/");
        assert_eq!(routes[0].method, HttpMethod::Get);
        assert_eq!(routes[0].handler, "handler");
        assert_eq!(routes[0].tags, vec!["default".to_string()]);
        // &'static str renders as str
        assert_eq!(routes[0].response, Some(Schema::string()));
    }

    #[test]
    fn test_chained_methods_and_nest() {
        let code = r#"
            use axum::{Router, routing::{get, post}};

            async fn list_users() {}
            async fn create_user() {}
            async fn get_user() {}

            fn users_router() -> Router {
                Router::new()
                    .route("/", get(list_users).post(create_user))
                    .route("/:id", get(get_user))
            }

            fn app() -> Router {
                Router::new().nest("/users", users_router())
            }
        "#;

        let routes = AxumExtractor.extract_routes(&[parse_code(code)]);
        let mut triples: Vec<(HttpMethod, &str, &str)> =
            routes.iter().map(|r| (r.method, r.path.as_str(), r.handler.as_str())).collect();
        triples.sort();
        assert_eq!(
            triples,
            vec![
                (HttpMethod::Get, "/users", "list_users"),
                (HttpMethod::Get, "/users/{id}", "get_user"),
                (HttpMethod::Post, "/users", "create_user"),
            ]
        );
    }

    #[test]
    fn test_extractor_recognition() {
        let code = r#"
            use axum::{Router, routing::post, Json, extract::{Path, State}};
            use serde::Deserialize;

            #[derive(Deserialize)]
            struct CreateUser {
                name: String,
            }

            async fn create_user(
                State(state): State<AppState>,
                Path(id): Path<u32>,
                Json(payload): Json<CreateUser>,
            ) -> String {
                format!("Created user {} with id {}", payload.name, id)
            }

            fn app() -> Router {
                Router::new().route("/users/:id", post(create_user))
            }
        "#;

        let routes = AxumExtractor.extract_routes(&[parse_code(code)]);

        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].handler, "create_user");
        assert_eq!(
            routes[0].parameters,
            vec![Parameter::new("id", ParameterLocation::Path, true, Schema::of(TypeMapping::INT32))]
        );
        assert_eq!(routes[0].request_body, Some(Schema::reference("CreateUser")));
        assert_eq!(routes[0].response, Some(Schema::string()));
    }

    #[test]
    fn test_tuple_path_and_query_struct() {
        let code = r#"
            use axum::{Router, routing::get, extract::{Path, Query}};
            use serde::Deserialize;

            #[derive(Deserialize)]
            struct Pagination {
                page: u32,
                limit: Option<u32>,
            }

            async fn get_comment(Path((post_id, comment_id)): Path<(u64, String)>, Query(p): Query<Pagination>) {}

            fn app() -> Router {
                Router::new().route("/posts/{post_id}/comments/{comment_id}", get(get_comment))
            }
        "#;

        let routes = AxumExtractor.extract_routes(&[parse_code(code)]);

        assert_eq!(routes.len(), 1);
        assert_eq!(
            routes[0].parameters,
            vec![
                Parameter::new("post_id", ParameterLocation::Path, true, Schema::of(TypeMapping::INT64)),
                Parameter::new("comment_id", ParameterLocation::Path, true, Schema::string()),
                Parameter::new("page", ParameterLocation::Query, true, Schema::of(TypeMapping::INT32)),
                Parameter::new("limit", ParameterLocation::Query, false, Schema::of(TypeMapping::INT32)),
            ]
        );
        assert_eq!(routes[0].response, None);
    }

    #[test]
    fn test_tuple_response_type() {
        let code = r#"
            use axum::{Router, routing::post, Json, http::StatusCode};
            use serde::Serialize;

            #[derive(Serialize)]
            struct CreatedUser {
                id: u32,
                name: String,
            }

            async fn create_user() -> (StatusCode, Json<CreatedUser>) {
                (StatusCode::CREATED, Json(CreatedUser { id: 1, name: "Test".to_string() }))
            }

            async fn list_users() -> Result<Json<Vec<CreatedUser>>, AppError> {
                Ok(Json(vec![]))
            }

            async fn delete_user() -> impl IntoResponse {
                StatusCode::NO_CONTENT
            }

            fn app() -> Router {
                Router::new()
                    .route("/user", post(create_user))
                    .route("/users", get(list_users).delete(delete_user))
            }
        "#;

        let routes = AxumExtractor.extract_routes(&[parse_code(code)]);
        let response = |handler: &str| routes.iter().find(|r| r.handler == handler).and_then(|r| r.response.clone());

        assert_eq!(response("create_user"), Some(Schema::reference("CreatedUser")));
        assert_eq!(response("list_users"), Some(Schema::array(Schema::reference("CreatedUser"))));
        assert_eq!(response("delete_user"), None);
    }

    #[test]
    fn test_handlers_resolved_across_files() {
        let main = parse_code(
            r#"
            use axum::{Router, routing::get};
            mod handlers;

            fn app() -> Router {
                Router::new().route("/health", get(handlers::health))
            }
        "#,
        );
        let handlers = parse_source(
            Path::new("src/handlers.rs"),
            Language::Rust,
            b"use axum::Json;\npub async fn health() -> Json<Status> { todo!() }\npub struct Status { pub ok: bool }\n",
        )
        .unwrap();

        let routes = AxumExtractor.extract_routes(&[main, handlers]);

        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].operation_id, "health");
        assert_eq!(routes[0].response, Some(Schema::reference("Status")));
    }

    #[test]
    fn test_actix_units_are_skipped() {
        let code = r#"
            use actix_web::{web, App};

            async fn index() -> &'static str { "hi" }

            fn app() -> App {
                App::new().route("/", web::get().to(index))
            }
        "#;
        assert!(AxumExtractor.extract_routes(&[parse_code(code)]).is_empty());
    }
}
