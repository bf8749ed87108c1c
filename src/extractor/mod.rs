//! Route extraction: turns route and resource facts into output routes.
//!
//! Every framework plugin implements [`RouteExtractor`]. The shared work of
//! joining group prefixes, expanding resources, resolving handlers by name
//! across the batch, and naming operations lives in [`build_routes`]; a
//! plugin only decides how a handler's signature maps onto request
//! parameters, a request body and a response (a [`ParameterConvention`]).
//!
//! # Supported Frameworks
//!
//! - **Axum**: See [`axum::AxumExtractor`]
//! - **Actix-Web**: See [`actix::ActixExtractor`]
//! - Everything else: See [`convention::ConventionExtractor`]
//!
//! # Example
//!
//! ```no_run
//! use polyglot_openapi::extractor::{Framework, RouteExtractor};
//! use polyglot_openapi::parser::{parse_source, Language};
//! use std::path::Path;
//!
//! let code = std::fs::read("app/main.py").unwrap();
//! let unit = parse_source(Path::new("app/main.py"), Language::Python, &code).unwrap();
//! let routes = Framework::FastApi.extractor().extract_routes(&[unit]);
//! println!("Found {} routes", routes.len());
//! ```

pub mod actix;
pub mod axum;
pub mod convention;

use crate::model::{HttpMethod, MethodDecl, RouteFact, SourceUnit};
use crate::parser::Language;
use crate::path::{extract_path_params, join_paths};
use crate::resource::expand_resource;
use crate::type_map::{generic, simple_name};
use clap::ValueEnum;
use log::debug;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

pub use crate::schema_generator::{Schema, SchemaGenerator};

/// Trait implemented by every framework plugin.
pub trait RouteExtractor {
    /// The framework this plugin understands.
    fn framework(&self) -> Framework;

    /// Extracts all routes from the parsed units of a project.
    ///
    /// Units in languages the framework does not use are ignored, so the
    /// whole batch can be handed to every selected plugin.
    fn extract_routes(&self, units: &[SourceUnit]) -> Vec<Route>;

    /// Component schemas for every data-carrying type in the framework's languages.
    fn extract_schemas(&self, units: &[SourceUnit]) -> Vec<Schema> {
        let mut schemas = SchemaGenerator::new(units);
        schemas.generate_all(self.framework().languages());
        schemas.into_schemas()
    }
}

/// Complete information about a single API endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub method: HttpMethod,
    /// Canonical path (`/users/{id}`)
    pub path: String,
    pub handler: String,
    pub operation_id: String,
    pub tags: Vec<String>,
    pub parameters: Vec<Parameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Schema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Schema>,
    pub source_file: PathBuf,
    pub source_line: usize,
}

/// Information about a single parameter in a route handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    /// Where the parameter is extracted from (path, query, header)
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    pub required: bool,
    pub schema: Schema,
}

impl Parameter {
    pub fn new(name: impl Into<String>, location: ParameterLocation, required: bool, schema: Schema) -> Self {
        Self {
            name: name.into(),
            location,
            required,
            schema,
        }
    }
}

/// The location where a parameter value is extracted from in an HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    /// Path parameter embedded in the URL (e.g., `/users/{id}`)
    Path,
    /// Query string parameter (e.g., `?page=1&limit=10`)
    Query,
    /// HTTP header parameter
    Header,
}

/// What a handler's signature says about the request and response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerIo {
    pub parameters: Vec<Parameter>,
    pub request_body: Option<Schema>,
    pub response: Option<Schema>,
}

/// A resolved handler together with the route it serves.
pub struct Handler<'a> {
    pub method: &'a MethodDecl,
    pub language: Language,
    /// Parameter names of the route's canonical path, left to right
    pub path_params: &'a [String],
}

/// How a framework binds handler parameters to the request.
pub trait ParameterConvention {
    fn handler_io(&self, handler: &Handler<'_>, schemas: &mut SchemaGenerator<'_>) -> HandlerIo;
}

/// Web frameworks with a route plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Framework {
    Axum,
    #[value(name = "actix-web")]
    ActixWeb,
    Flask,
    #[value(name = "fastapi")]
    FastApi,
    Django,
    Gin,
    Echo,
    Chi,
    #[value(name = "aspnet")]
    AspNet,
    Spring,
    #[value(name = "jax-rs")]
    JaxRs,
    Ktor,
    Laravel,
    Symfony,
    Rails,
    Sinatra,
    Phoenix,
    Express,
    #[value(name = "nestjs")]
    Nest,
    Play,
    Vapor,
    Crow,
    Pistache,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Axum => "axum",
            Framework::ActixWeb => "actix-web",
            Framework::Flask => "flask",
            Framework::FastApi => "fastapi",
            Framework::Django => "django",
            Framework::Gin => "gin",
            Framework::Echo => "echo",
            Framework::Chi => "chi",
            Framework::AspNet => "aspnet",
            Framework::Spring => "spring",
            Framework::JaxRs => "jax-rs",
            Framework::Ktor => "ktor",
            Framework::Laravel => "laravel",
            Framework::Symfony => "symfony",
            Framework::Rails => "rails",
            Framework::Sinatra => "sinatra",
            Framework::Phoenix => "phoenix",
            Framework::Express => "express",
            Framework::Nest => "nestjs",
            Framework::Play => "play",
            Framework::Vapor => "vapor",
            Framework::Crow => "crow",
            Framework::Pistache => "pistache",
        }
    }

    /// Source languages whose units this framework's plugin reads.
    pub fn languages(&self) -> &'static [Language] {
        match self {
            Framework::Axum | Framework::ActixWeb => &[Language::Rust],
            Framework::Flask | Framework::FastApi | Framework::Django => &[Language::Python],
            Framework::Gin | Framework::Echo | Framework::Chi => &[Language::Go],
            Framework::AspNet => &[Language::CSharp],
            Framework::Spring => &[Language::Java, Language::Kotlin],
            Framework::JaxRs => &[Language::Java],
            Framework::Ktor => &[Language::Kotlin],
            Framework::Laravel | Framework::Symfony => &[Language::Php],
            Framework::Rails | Framework::Sinatra => &[Language::Ruby],
            Framework::Phoenix => &[Language::Elixir],
            Framework::Express | Framework::Nest => &[Language::TypeScript],
            Framework::Play => &[Language::Scala],
            Framework::Vapor => &[Language::Swift],
            Framework::Crow | Framework::Pistache => &[Language::Cpp],
        }
    }

    /// Frameworks assumed for a language when none is requested explicitly.
    pub fn defaults_for(language: Language) -> &'static [Framework] {
        match language {
            Language::Rust => &[Framework::Axum, Framework::ActixWeb],
            Language::Python => &[Framework::FastApi],
            Language::Go => &[Framework::Gin],
            Language::CSharp => &[Framework::AspNet],
            Language::Java | Language::Kotlin => &[Framework::Spring],
            Language::Php => &[Framework::Laravel],
            Language::Ruby => &[Framework::Rails],
            Language::Elixir => &[Framework::Phoenix],
            Language::TypeScript => &[Framework::Nest],
            Language::Scala => &[Framework::Play],
            Language::Swift => &[Framework::Vapor],
            Language::Cpp => &[Framework::Crow],
        }
    }

    /// The plugin for this framework.
    pub fn extractor(self) -> Box<dyn RouteExtractor> {
        match self {
            Framework::Axum => Box::new(axum::AxumExtractor),
            Framework::ActixWeb => Box::new(actix::ActixExtractor),
            framework => Box::new(convention::ConventionExtractor::new(framework)),
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build output routes from the facts of every unit accepted by `selected`.
///
/// Resource facts are expanded first; handlers are looked up by name across
/// all selected units, preferring a method whose owner matches the fact's.
pub fn build_routes(
    units: &[SourceUnit],
    selected: impl Fn(&SourceUnit) -> bool,
    convention: &dyn ParameterConvention,
) -> Vec<Route> {
    let mut schemas = SchemaGenerator::new(units);
    let handlers: Vec<(&MethodDecl, &SourceUnit)> = units
        .iter()
        .filter(|u| selected(u))
        .flat_map(|u| u.all_methods().map(move |m| (m, u)))
        .collect();

    let mut routes = Vec::new();
    for unit in units.iter().filter(|u| selected(u)) {
        let expanded = unit.resources.iter().flat_map(expand_resource);
        for fact in unit.routes.iter().cloned().chain(expanded) {
            let path = join_paths(fact.group.as_deref(), &fact.path, fact.syntax);
            let path_params = extract_path_params(&path);
            let resolved = resolve_handler(&handlers, &fact, unit);
            let io = match resolved {
                Some((method, owner_unit)) => {
                    let handler = Handler {
                        method,
                        language: owner_unit.language,
                        path_params: &path_params,
                    };
                    convention.handler_io(&handler, &mut schemas)
                }
                None => {
                    if !fact.is_lambda() {
                        debug!("No handler {} found for {} {}", fact.handler, fact.method, path);
                    }
                    HandlerIo::default()
                }
            };
            let typed_by = resolved.map(|(m, u)| (m, u.language));
            let parameters = merge_parameters(&path_params, typed_by, io.parameters, &mut schemas);
            routes.push(Route {
                method: fact.method,
                operation_id: operation_id(&fact, &path),
                tags: vec![tag(&fact, &path)],
                path,
                handler: fact.handler.clone(),
                parameters,
                request_body: io.request_body,
                response: io.response,
                source_file: unit.path.clone(),
                source_line: fact.line,
            });
        }
    }
    unique_operation_ids(&mut routes);
    routes
}

fn resolve_handler<'u>(
    handlers: &[(&'u MethodDecl, &'u SourceUnit)],
    fact: &RouteFact,
    unit: &SourceUnit,
) -> Option<(&'u MethodDecl, &'u SourceUnit)> {
    if fact.is_lambda() {
        return None;
    }
    let name = simple_name(&fact.handler);
    let mut candidates = handlers.iter().filter(|(m, _)| m.name == name).copied();
    match fact.owner.as_deref().map(simple_name) {
        Some(owner) => {
            let candidates: Vec<_> = candidates.collect();
            candidates
                .iter()
                .find(|(m, _)| m.owner.as_deref().map(simple_name) == Some(owner))
                .or_else(|| candidates.iter().find(|(m, _)| m.owner.is_none()))
                .copied()
        }
        None => {
            let first = candidates.next()?;
            Some(
                std::iter::once(first)
                    .chain(candidates)
                    .find(|(_, u)| u.path == unit.path)
                    .unwrap_or(first),
            )
        }
    }
}

/// Path parameters first, in path order, then the handler's other parameters.
fn merge_parameters(
    path_params: &[String],
    handler: Option<(&MethodDecl, Language)>,
    declared: Vec<Parameter>,
    schemas: &mut SchemaGenerator<'_>,
) -> Vec<Parameter> {
    let mut parameters: Vec<Parameter> = path_params
        .iter()
        .map(|name| {
            match declared.iter().find(|p| p.location == ParameterLocation::Path && &p.name == name) {
                Some(p) => Parameter { required: true, ..p.clone() },
                None => Parameter::new(name, ParameterLocation::Path, true, path_schema(name, handler, schemas)),
            }
        })
        .collect();
    for p in declared {
        let duplicate = parameters.iter().any(|q| q.name == p.name && q.location == p.location);
        if p.location != ParameterLocation::Path && !duplicate {
            parameters.push(p);
        }
    }
    parameters
}

/// `string` unless the handler declares a same-named parameter of a scalar type.
fn path_schema(name: &str, handler: Option<(&MethodDecl, Language)>, schemas: &mut SchemaGenerator<'_>) -> Schema {
    handler
        .and_then(|(method, language)| {
            let param = method.param(name).filter(|p| !p.raw_type.is_empty())?;
            Some(schemas.schema_for(&param.raw_type, language))
        })
        .filter(Schema::is_primitive)
        .unwrap_or_else(Schema::string)
}

const OWNER_SUFFIXES: &[&str] = &["Controller", "Handler", "Resource"];

fn owner_base(owner: &str) -> &str {
    let owner = simple_name(owner);
    OWNER_SUFFIXES
        .iter()
        .find_map(|s| owner.strip_suffix(s).filter(|b| !b.is_empty()))
        .unwrap_or(owner)
}

fn upper_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lower_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn camel_words(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric()).map(upper_first).collect()
}

fn operation_id(fact: &RouteFact, path: &str) -> String {
    if fact.is_lambda() {
        let words: String = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|segment| match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(param) => format!("By{}", camel_words(param)),
                None => camel_words(segment),
            })
            .collect();
        let words = if words.is_empty() { "Root".to_string() } else { words };
        return format!("{}{}", fact.method.as_str().to_lowercase(), words);
    }
    let handler = simple_name(&fact.handler);
    match fact.owner.as_deref() {
        Some(owner) => format!("{}{}", lower_first(owner_base(owner)), upper_first(handler)),
        None => handler.to_string(),
    }
}

fn tag(fact: &RouteFact, path: &str) -> String {
    if let Some(owner) = fact.owner.as_deref() {
        return owner_base(owner).to_string();
    }
    path.split('/')
        .filter(|s| !s.is_empty() && !s.starts_with('{'))
        .find(|s| !is_version_segment(s))
        .map(str::to_string)
        .unwrap_or_else(|| "default".to_string())
}

fn is_version_segment(segment: &str) -> bool {
    segment == "api"
        || segment
            .strip_prefix('v')
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// Suffix repeated operation IDs with `_2`, `_3`, ... in route order.
pub fn unique_operation_ids(routes: &mut [Route]) {
    let mut used = HashSet::new();
    for route in routes.iter_mut() {
        if used.insert(route.operation_id.clone()) {
            continue;
        }
        let mut n = 2;
        while !used.insert(format!("{}_{}", route.operation_id, n)) {
            n += 1;
        }
        route.operation_id = format!("{}_{}", route.operation_id, n);
    }
}

/// Split a Rust extractor type into its simple wrapper name and argument:
/// `web::Json<User>` -> `("Json", "User")`.
pub(crate) fn rust_wrapper(raw: &str) -> Option<(&str, &str)> {
    let (base, inner) = generic(raw, '<', '>')?;
    Some((simple_name(base), inner.trim()))
}

/// Request part a Rust extractor type reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Extractor {
    Body,
    Path,
    Query,
    Header,
}

/// Handler I/O from Rust extractor arguments (`Json<T>`, `Path<T>`, `Query<T>`)
/// and the declared return type. `classify` names the framework's extractors.
pub(crate) fn rust_extractor_io(
    handler: &Handler<'_>,
    schemas: &mut SchemaGenerator<'_>,
    classify: impl Fn(&str) -> Option<Extractor>,
) -> HandlerIo {
    let mut io = HandlerIo::default();
    for param in &handler.method.params {
        let Some((wrapper, inner)) = rust_wrapper(&param.raw_type) else {
            continue;
        };
        match classify(wrapper) {
            Some(Extractor::Body) => io.request_body = Some(schemas.schema_for(inner, Language::Rust)),
            Some(Extractor::Path) => io.parameters.extend(rust_path_parameters(inner, handler, schemas)),
            Some(Extractor::Query) => {
                if let Some(fields) = struct_parameters(inner, ParameterLocation::Query, schemas) {
                    io.parameters.extend(fields);
                }
            }
            Some(Extractor::Header) => {
                let name = header_name(type_base(inner));
                io.parameters.push(Parameter::new(name, ParameterLocation::Header, true, Schema::string()));
            }
            None => debug!("Ignoring extractor {} in {}", wrapper, handler.method.name),
        }
    }
    io.response = handler
        .method
        .return_type
        .as_deref()
        .and_then(|r| schemas.response_schema(r, Language::Rust));
    io
}

/// `Path<(u32, String)>` binds path placeholders by position, `Path<T>` of a
/// struct by field name, and a scalar `Path<u32>` the last placeholder.
fn rust_path_parameters(inner: &str, handler: &Handler<'_>, schemas: &mut SchemaGenerator<'_>) -> Vec<Parameter> {
    if let Some(elements) = inner.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        return handler
            .path_params
            .iter()
            .zip(crate::type_map::type_args(elements))
            .map(|(name, ty)| path_parameter(name, ty.trim(), schemas))
            .collect();
    }
    if let Some(fields) = struct_parameters(inner, ParameterLocation::Path, schemas) {
        return fields;
    }
    handler
        .path_params
        .last()
        .map(|name| path_parameter(name, inner, schemas))
        .into_iter()
        .collect()
}

fn path_parameter(name: &str, ty: &str, schemas: &mut SchemaGenerator<'_>) -> Parameter {
    Parameter::new(name, ParameterLocation::Path, true, schemas.schema_for(ty, Language::Rust))
}

fn type_base(raw: &str) -> &str {
    simple_name(raw.split('<').next().unwrap_or(raw))
}

/// Header name from a typed header: `UserAgent` -> `User-Agent`.
fn header_name(type_name: &str) -> String {
    let mut name = String::with_capacity(type_name.len() + 4);
    for (i, c) in type_name.char_indices() {
        if i > 0 && c.is_uppercase() {
            name.push('-');
        }
        name.push(c);
    }
    name
}

/// Query parameters from the fields of a declared aggregate type.
pub(crate) fn struct_parameters(
    raw: &str,
    location: ParameterLocation,
    schemas: &mut SchemaGenerator<'_>,
) -> Option<Vec<Parameter>> {
    let (decl, language) = schemas.find(raw)?;
    if decl.fields.is_empty() {
        return None;
    }
    let parameters = decl
        .fields
        .iter()
        .filter_map(|field| {
            let name = crate::schema_generator::wire_name(field)?;
            let schema = schemas.schema_for(&field.raw_type, language);
            Some(Parameter::new(name, location, crate::schema_generator::is_required(field), schema))
        })
        .collect();
    Some(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use crate::path::PathSyntax;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn fact(method: HttpMethod, path: &str, handler: &str, owner: Option<&str>) -> RouteFact {
        RouteFact::new(method, path, handler, PathSyntax::Canonical, 1).with_owner(owner.map(String::from))
    }

    #[test]
    fn test_operation_ids() {
        let owned = fact(HttpMethod::Get, "/users", "index", Some("UsersController"));
        assert_eq!(operation_id(&owned, "/users"), "usersIndex");
        let free = fact(HttpMethod::Get, "/users", "list_users", None);
        assert_eq!(operation_id(&free, "/users"), "list_users");
        let lambda = fact(HttpMethod::Get, "/users/{id}", "lambda", None);
        assert_eq!(operation_id(&lambda, "/users/{id}"), "getUsersById");
        let root = fact(HttpMethod::Post, "/", "lambda", None);
        assert_eq!(operation_id(&root, "/"), "postRoot");
    }

    #[test]
    fn test_tags() {
        let owned = fact(HttpMethod::Get, "/x", "show", Some("App\\Http\\Controllers\\PostController"));
        assert_eq!(tag(&owned, "/x"), "Post");
        let free = fact(HttpMethod::Get, "/api/v2/orders/{id}", "get_order", None);
        assert_eq!(tag(&free, "/api/v2/orders/{id}"), "orders");
        let root = fact(HttpMethod::Get, "/", "lambda", None);
        assert_eq!(tag(&root, "/"), "default");
    }

    #[test]
    fn test_unique_operation_ids() {
        let unit_path = PathBuf::from("a.rs");
        let route = |id: &str| Route {
            method: HttpMethod::Get,
            path: "/".to_string(),
            handler: "h".to_string(),
            operation_id: id.to_string(),
            tags: Vec::new(),
            parameters: Vec::new(),
            request_body: None,
            response: None,
            source_file: unit_path.clone(),
            source_line: 1,
        };
        let mut routes = vec![route("list"), route("list"), route("list_2"), route("list")];
        unique_operation_ids(&mut routes);
        let ids: Vec<&str> = routes.iter().map(|r| r.operation_id.as_str()).collect();
        assert_eq!(ids, vec!["list", "list_2", "list_2_2", "list_3"]);
    }

    #[test]
    fn test_resources_expand_and_resolve_owned_handlers() {
        let routes = parse_source(
            Path::new("routes/web.php"),
            Language::Php,
            b"<?php\nRoute::apiResource('posts', PostController::class);\n",
        )
        .unwrap();
        let controller = parse_source(
            Path::new("app/Http/Controllers/PostController.php"),
            Language::Php,
            b"<?php\nclass PostController extends Controller {\n    public function show(int $post) {}\n    public function index() {}\n}\n",
        )
        .unwrap();
        let units = vec![routes, controller];
        let routes = Framework::Laravel.extractor().extract_routes(&units);
        assert_eq!(routes.len(), 6);
        let show = routes.iter().find(|r| r.handler == "show").unwrap();
        assert_eq!(show.path, "/posts/{id}");
        assert_eq!(show.operation_id, "postShow");
        assert_eq!(show.tags, vec!["Post".to_string()]);
        assert_eq!(show.parameters, vec![Parameter::new("id", ParameterLocation::Path, true, Schema::string())]);
    }

    #[test]
    fn test_framework_names() {
        assert_eq!(Framework::from_str("actix-web", true), Ok(Framework::ActixWeb));
        assert_eq!(Framework::from_str("fastapi", true), Ok(Framework::FastApi));
        assert_eq!(Framework::Nest.to_string(), "nestjs");
        assert_eq!(Framework::Spring.languages(), &[Language::Java, Language::Kotlin]);
    }
}
