//! Ruby scanner: Rails route files, Sinatra handlers, classes and `schema.rb` tables.

use super::clike::Text;
use super::keyword::{call_args, named, statements, Statement};
use crate::lexer::{list_items, split_top_level, string_literal, symbol_name, CommentStyle, RUBY_BLOCKS};
use crate::model::{
    DeclKind, FieldDecl, HttpMethod, MethodDecl, Param, ResourceFact, RouteFact, SourceUnit, TypeDecl,
    Visibility, LAMBDA,
};
use crate::parser::Language;
use crate::path::PathSyntax;
use crate::resource::{controller_for, nested_prefix, ResourceStyle};
use crate::type_map::ruby::shape;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

crate::parser::scanner_backend!(RubyBackend, Language::Ruby, ruby);

static REQUIRE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s*require(?:_relative)?\s*\(?\s*['"]([^'"]+)['"]"#).unwrap());

const VERBS: &[&str] = &["get", "post", "put", "patch", "delete", "options", "head", "match"];

pub fn scan(path: &Path, content: &str) -> SourceUnit {
    let text = Text::new(content, CommentStyle::Hash);
    let mut unit = SourceUnit::new(path, Language::Ruby, content);
    unit.imports = REQUIRE.captures_iter(&text.masked).map(|c| c[1].to_string()).collect();

    let end = text.clean.len();
    walk_types(&text, 0, end, &[], &mut unit);
    if text.clean.contains("routes.draw") {
        rails_routes(&text, 0, end, &RouteScope::default(), &mut unit);
        debug!(
            "Rails routes in {}: {} routes, {} resources",
            unit.path.display(),
            unit.routes.len(),
            unit.resources.len()
        );
    } else {
        sinatra_routes(&text, 0, end, "", None, &mut unit);
    }
    unit
}

fn walk_types(text: &Text, start: usize, end: usize, namespace: &[String], unit: &mut SourceUnit) {
    for stmt in statements(text, start, end, &RUBY_BLOCKS) {
        let body = stmt.body();
        match stmt.keyword() {
            // an unterminated class still declares its name
            "class" | "module" => {
                let Some(mut decl) = type_header(&stmt, namespace) else {
                    continue;
                };
                class_members(text, &stmt, &mut decl);
                let mut inner = namespace.to_vec();
                inner.push(decl.name.clone());
                unit.types.push(decl);
                if let Some(body) = body {
                    walk_types(text, body.start, body.end, &inner, unit);
                }
            }
            "def" => {}
            _ => {
                let Some(body) = body else {
                    continue;
                };
                if stmt.keyword() == "create_table" {
                    if let Some(table) = create_table(text, &stmt) {
                        unit.types.push(table);
                    }
                } else {
                    walk_types(text, body.start, body.end, namespace, unit);
                }
            }
        }
    }
}

/// `class Admin::User < ApplicationRecord`, `module Billing`; `class << self` is skipped.
fn type_header(stmt: &Statement, namespace: &[String]) -> Option<TypeDecl> {
    let rest = stmt.args();
    if rest.starts_with("<<") {
        return None;
    }
    let (name, base) = match rest.split_once('<') {
        Some((name, base)) => (name.trim(), Some(base.trim())),
        None => (rest.trim(), None),
    };
    let kind = if stmt.keyword() == "module" { DeclKind::Module } else { DeclKind::Class };
    let mut parts: Vec<String> = namespace.to_vec();
    parts.extend(name.split("::").map(String::from));
    let simple = parts.pop()?;
    let mut decl = TypeDecl::new(simple, kind, stmt.line)?
        .with_namespace(Some(parts.join("::")).filter(|n| !n.is_empty()));
    if let Some(base) = base.filter(|b| !b.is_empty()) {
        decl.supertypes.push(base.trim_start_matches("::").to_string());
    }
    Some(decl)
}

fn class_members(text: &Text, stmt: &Statement, decl: &mut TypeDecl) {
    let Some(body) = stmt.body() else {
        return;
    };
    let mut visibility = Visibility::Public;
    let mut present: Vec<String> = Vec::new();
    for member in statements(text, body.start, body.end, &RUBY_BLOCKS) {
        let (positional, options) = call_args(member.args());
        match member.keyword() {
            "attr_accessor" | "attr_reader" | "attr_writer" => {
                for name in positional.iter().map(|p| symbol_name(p)) {
                    let mut field = FieldDecl::new(name, "", shape(""), member.line);
                    field.optional = true;
                    decl.fields.push(field);
                }
            }
            // ActiveModel::Attributes and dry-struct
            "attribute" | "attribute?" => {
                let Some(name) = positional.first().map(|p| symbol_name(p)) else {
                    continue;
                };
                let ty = positional.get(1).map(|t| t.trim().trim_start_matches(':')).unwrap_or("");
                let mut field = FieldDecl::new(name, ty, shape(ty), member.line)
                    .with_default(named(&options, "default").map(String::from));
                if member.keyword() == "attribute?" {
                    field.optional = true;
                }
                decl.fields.push(field);
            }
            "validates" | "validates_presence_of" => {
                let presence = member.keyword() == "validates_presence_of"
                    || named(&options, "presence").is_some_and(|v| v != "false");
                if presence {
                    present.extend(positional.iter().map(|p| symbol_name(p)));
                }
            }
            "private" | "protected" if member.args().is_empty() => {
                visibility = if member.keyword() == "private" {
                    Visibility::Private
                } else {
                    Visibility::Protected
                };
            }
            "public" if member.args().is_empty() => visibility = Visibility::Public,
            "def" => {
                if let Some(mut method) = method_decl(&member) {
                    method.visibility = visibility;
                    method.owner = Some(decl.name.clone());
                    decl.methods.push(method);
                }
            }
            _ => {}
        }
    }
    for field in decl.fields.iter_mut().filter(|f| present.contains(&f.name)) {
        field.optional = false;
    }
}

/// `def show(id, format = :json, limit: 10, key:)`; `def self.find` keeps `find`.
fn method_decl(stmt: &Statement) -> Option<MethodDecl> {
    let rest = stmt.args();
    let rest = rest.split_once('=').filter(|(l, _)| !l.contains('(')).map(|(l, _)| l).unwrap_or(rest);
    let name_end = rest
        .find(|c: char| c == '(' || c == ';' || c.is_whitespace())
        .unwrap_or(rest.len());
    let name = rest[..name_end].trim_start_matches("self.");
    if name.is_empty() {
        return None;
    }
    let params_text = rest[name_end..].trim();
    let params_text = match params_text.strip_prefix('(') {
        Some(inner) => inner.rsplit_once(')').map(|(p, _)| p).unwrap_or(inner),
        None => params_text.split(';').next().unwrap_or(""),
    };
    let mut method = MethodDecl::new(name, stmt.line);
    for raw in split_top_level(params_text, b',') {
        if raw.starts_with(['*', '&']) {
            continue;
        }
        // `a = 1` and `key: 1` are optional, a bare `key:` is required
        let (name, default) = match raw.find(['=', ':']) {
            Some(i) => (raw[..i].trim(), Some(raw[i + 1..].trim()).filter(|d| !d.is_empty())),
            None => (raw.trim(), None),
        };
        method.params.push(Param::new(name, "").with_default(default.map(String::from)));
    }
    Some(method)
}

/// `create_table "users", force: :cascade do |t| ... end`.
fn create_table(text: &Text, stmt: &Statement) -> Option<TypeDecl> {
    let body = stmt.body()?;
    let (positional, options) = call_args(stmt.args());
    let name = symbol_name(positional.first()?);
    let mut table = TypeDecl::new(name, DeclKind::Table, stmt.line)?;
    if named(&options, "id").map_or(true, |v| v != "false") {
        let id_type = named(&options, "id").map(|v| v.trim_start_matches(':')).unwrap_or("bigint");
        table.fields.push(FieldDecl::new("id", id_type, shape(id_type), stmt.line));
    }
    for column in statements(text, body.start, body.end, &RUBY_BLOCKS) {
        let Some((_, column_type)) = column.keyword().split_once('.') else {
            continue;
        };
        let (positional, options) = call_args(column.args());
        let not_null = named(&options, "null") == Some("false");
        match column_type {
            "timestamps" => {
                for name in ["created_at", "updated_at"] {
                    table.fields.push(FieldDecl::new(name, "datetime", shape("datetime"), column.line));
                }
            }
            "index" | "check_constraint" | "foreign_key" => {}
            _ => {
                let Some(raw_name) = positional.first() else {
                    continue;
                };
                let mut name = symbol_name(raw_name);
                if matches!(column_type, "references" | "belongs_to") {
                    name.push_str("_id");
                }
                let mut field = FieldDecl::new(name, column_type, shape(column_type), column.line)
                    .with_default(named(&options, "default").map(String::from));
                field.optional = !not_null;
                table.fields.push(field);
            }
        }
    }
    Some(table)
}

/// Paths of the resource whose block is being walked.
#[derive(Debug, Clone)]
struct ResourcePaths {
    member: String,
    collection: String,
}

#[derive(Debug, Clone, Default)]
struct RouteScope {
    prefix: String,
    controller: Option<String>,
    resource: Option<ResourcePaths>,
}

impl RouteScope {
    fn nest(&self, segment: &str) -> RouteScope {
        RouteScope {
            prefix: format!("{}/{}", self.prefix.trim_end_matches('/'), segment.trim_matches('/')),
            resource: None,
            ..self.clone()
        }
    }
}

/// Path argument of a route statement: `'photos/:id'` or `:preview`.
fn path_arg(raw: &str) -> Option<String> {
    string_literal(raw).or_else(|| raw.trim().starts_with(':').then(|| symbol_name(raw)))
}

/// `'photos#show'` as (controller class, action).
fn endpoint(raw: &str) -> Option<(String, String)> {
    let target = string_literal(raw)?;
    let (controller, action) = target.split_once('#')?;
    Some((controller_for(controller), action.to_string()))
}

fn rails_routes(text: &Text, start: usize, end: usize, scope: &RouteScope, unit: &mut SourceUnit) {
    for stmt in statements(text, start, end, &RUBY_BLOCKS) {
        let keyword = stmt.keyword();
        let (positional, options) = call_args(stmt.args());
        let body = stmt.body();
        let walk = |scope: &RouteScope, unit: &mut SourceUnit| {
            if let Some(body) = body {
                rails_routes(text, body.start, body.end, scope, unit);
            }
        };
        match keyword {
            "namespace" => {
                let Some(name) = positional.first().map(|p| symbol_name(p)) else {
                    continue;
                };
                let path = named(&options, "path").map(symbol_name).unwrap_or(name);
                walk(&scope.nest(&path), unit);
            }
            "scope" => {
                let path = positional
                    .first()
                    .and_then(|p| path_arg(p))
                    .or_else(|| named(&options, "path").and_then(path_arg));
                let mut inner = match path {
                    Some(path) => scope.nest(&path),
                    None => scope.clone(),
                };
                if let Some(controller) = named(&options, "controller") {
                    inner.controller = Some(controller_for(&symbol_name(controller)));
                }
                walk(&inner, unit);
            }
            "controller" => {
                let mut inner = scope.clone();
                inner.controller = positional.first().map(|c| controller_for(&symbol_name(c)));
                walk(&inner, unit);
            }
            "resources" | "resource" => {
                let singular = keyword == "resource";
                for name in positional.iter().map(|p| symbol_name(p)).filter(|n| !n.is_empty()) {
                    let inner = resource(&stmt, &name, singular, &options, scope, unit);
                    walk(&inner, unit);
                }
            }
            "member" | "collection" => {
                let Some(paths) = &scope.resource else {
                    continue;
                };
                let mut inner = scope.clone();
                inner.prefix = if keyword == "member" {
                    paths.member.clone()
                } else {
                    paths.collection.clone()
                };
                inner.resource = None;
                walk(&inner, unit);
            }
            "root" => {
                let target = positional.first().map(String::as_str).or_else(|| named(&options, "to"));
                let (owner, action) = target.and_then(endpoint).unwrap_or((String::new(), LAMBDA.to_string()));
                unit.routes.push(
                    RouteFact::new(HttpMethod::Get, "/", action, PathSyntax::Colon, stmt.line)
                        .with_owner(Some(owner))
                        .with_group(Some(scope.prefix.clone())),
                );
            }
            verb if VERBS.contains(&verb) => {
                if let Some(route) = rails_verb(&stmt, &positional, &options, scope) {
                    unit.routes.extend(route);
                }
            }
            _ => walk(scope, unit),
        }
    }
}

/// Record a `resources`/`resource` fact and return the scope for its block.
fn resource(
    stmt: &Statement,
    name: &str,
    singular: bool,
    options: &[(String, String)],
    scope: &RouteScope,
    unit: &mut SourceUnit,
) -> RouteScope {
    let path = named(options, "path").map(symbol_name).unwrap_or_else(|| name.to_string());
    // `resource :profile` routes to the plural ProfilesController
    let controller = named(options, "controller")
        .map(|c| controller_for(&symbol_name(c)))
        .unwrap_or_else(|| controller_for(&if singular { format!("{}s", name) } else { name.to_string() }));
    let mut fact = ResourceFact::new(path.clone(), controller.clone(), ResourceStyle::Rails, stmt.line);
    fact.singular = singular;
    fact.only = named(options, "only").map(list_items).unwrap_or_default();
    fact.except = named(options, "except").map(list_items).unwrap_or_default();
    fact.group = Some(scope.prefix.clone()).filter(|g| !g.is_empty());
    unit.resources.push(fact);

    let collection = format!("{}/{}", scope.prefix.trim_end_matches('/'), path);
    let (member, nested) = if singular {
        (collection.clone(), collection.clone())
    } else {
        (
            format!("{}/{{id}}", collection),
            format!("{}{}", scope.prefix.trim_end_matches('/'), nested_prefix(&path)),
        )
    };
    RouteScope {
        prefix: nested,
        controller: Some(controller),
        resource: Some(ResourcePaths { member, collection }),
    }
}

/// `get 'photos/search', to: 'photos#search'`, `get :preview, on: :member`,
/// `match 'x' => 'c#a', via: [:get, :post]`.
fn rails_verb(
    stmt: &Statement,
    positional: &[String],
    options: &[(String, String)],
    scope: &RouteScope,
) -> Option<Vec<RouteFact>> {
    let first = positional.first()?;
    let (raw_path, rocket) = match first.split_once("=>") {
        Some((path, target)) => (path.trim(), Some(target.trim())),
        None => (first.as_str(), None),
    };
    let path = path_arg(raw_path)?;

    let target = rocket.or_else(|| named(options, "to"));
    let (mut owner, mut action) = match target.and_then(endpoint) {
        Some((owner, action)) => (Some(owner), Some(action)),
        None => (None, None),
    };
    if owner.is_none() {
        owner = named(options, "controller")
            .map(|c| controller_for(&symbol_name(c)))
            .or_else(|| scope.controller.clone());
    }
    if action.is_none() {
        action = named(options, "action").map(symbol_name);
    }
    let segments: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty() && !s.starts_with([':', '*', '(']))
        .collect();
    if owner.is_none() && segments.len() > 1 {
        owner = segments.first().map(|s| controller_for(s));
    }
    let action = action
        .or_else(|| segments.last().map(|s| s.to_string()))
        .unwrap_or_else(|| LAMBDA.to_string());

    let group = match (named(options, "on"), &scope.resource) {
        (Some(":member"), Some(paths)) => paths.member.clone(),
        (Some(":collection"), Some(paths)) => paths.collection.clone(),
        _ => scope.prefix.clone(),
    };
    let methods: Vec<HttpMethod> = if stmt.keyword() == "match" {
        let via = named(options, "via").map(list_items).unwrap_or_default();
        let mut methods: Vec<HttpMethod> = via.iter().filter_map(|v| HttpMethod::parse(v)).collect();
        if methods.is_empty() {
            methods.push(HttpMethod::Get);
        }
        methods
    } else {
        vec![HttpMethod::parse(stmt.keyword())?]
    };
    Some(
        methods
            .into_iter()
            .map(|method| {
                RouteFact::new(method, path.clone(), action.clone(), PathSyntax::Colon, stmt.line)
                    .with_owner(owner.clone())
                    .with_group(Some(group.clone()))
            })
            .collect(),
    )
}

/// `get '/hello/:name' do ... end`, inside an optional `namespace '/api'`.
fn sinatra_routes(text: &Text, start: usize, end: usize, prefix: &str, owner: Option<&str>, unit: &mut SourceUnit) {
    for stmt in statements(text, start, end, &RUBY_BLOCKS) {
        let Some(body) = stmt.body() else {
            continue;
        };
        let keyword = stmt.keyword();
        let (positional, _) = call_args(stmt.args());
        let path = positional.first().and_then(|p| string_literal(p));
        match keyword {
            "class" => {
                let name = stmt.args().split('<').next().unwrap_or("").trim();
                let name = name.rsplit("::").next().unwrap_or(name);
                sinatra_routes(text, body.start, body.end, prefix, Some(name), unit);
            }
            "namespace" => {
                let Some(path) = path else {
                    continue;
                };
                let inner = format!("{}/{}", prefix.trim_end_matches('/'), path.trim_matches('/'));
                sinatra_routes(text, body.start, body.end, &inner, owner, unit);
            }
            verb if VERBS.contains(&verb) && verb != "match" => {
                let (Some(method), Some(path)) = (HttpMethod::parse(verb), path) else {
                    continue;
                };
                if !path.starts_with('/') {
                    continue;
                }
                unit.routes.push(
                    RouteFact::new(method, path, LAMBDA, PathSyntax::Colon, stmt.line)
                        .with_owner(owner.map(String::from))
                        .with_group(Some(prefix.to_string())),
                );
            }
            "def" => {}
            _ => sinatra_routes(text, body.start, body.end, prefix, owner, unit),
        }
    }
}
