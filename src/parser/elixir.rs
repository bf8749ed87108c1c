//! Elixir scanner: Phoenix routers, Ecto schemas and plain structs.

use super::clike::Text;
use super::keyword::{call_args, named, statements, Statement};
use crate::lexer::{
    annotations_before, find_matching, list_items, split_top_level, string_literal, symbol_name,
    AnnotationSyntax, CommentStyle, ELIXIR_BLOCKS,
};
use crate::model::{
    DeclKind, FieldDecl, HttpMethod, MethodDecl, Param, ResourceFact, RouteFact, SourceUnit, TypeDecl,
    Visibility,
};
use crate::parser::Language;
use crate::path::PathSyntax;
use crate::resource::{nested_prefix, ResourceStyle};
use crate::type_map::elixir::shape;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

crate::parser::scanner_backend!(ElixirBackend, Language::Elixir, elixir);

static IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:alias|import|use|require)\s+([A-Z][\w.]*)").unwrap());
static VALIDATE_REQUIRED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"validate_required\(\s*(?:[\w.]+\s*,\s*)?(\[[^\]]*\])").unwrap());
static MAP_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r#""(\w+)"\s*=>"#).unwrap());

const VERBS: &[&str] = &["get", "post", "put", "patch", "delete", "options", "head"];

pub fn scan(path: &Path, content: &str) -> SourceUnit {
    let text = Text::new(content, CommentStyle::Hash);
    let mut unit = SourceUnit::new(path, Language::Elixir, content);
    unit.imports = IMPORT.captures_iter(&text.clean).map(|c| c[1].to_string()).collect();
    let end = text.clean.len();
    modules(&text, 0, end, None, &mut unit);
    if content.contains(":router") || content.contains("Phoenix.Router") {
        phoenix_routes(&text, 0, end, "", &mut unit);
    }
    unit
}

fn modules(text: &Text, start: usize, end: usize, outer: Option<&str>, unit: &mut SourceUnit) {
    for stmt in statements(text, start, end, &ELIXIR_BLOCKS) {
        if stmt.keyword() != "defmodule" {
            continue;
        }
        let Some(body) = stmt.body() else {
            continue;
        };
        let full = match outer {
            Some(outer) => format!("{}.{}", outer, stmt.args()),
            None => stmt.args().to_string(),
        };
        let (namespace, name) = match full.rsplit_once('.') {
            Some((ns, name)) => (Some(ns.to_string()), name.to_string()),
            None => (None, full.clone()),
        };
        if let Some(mut decl) = TypeDecl::new(name, DeclKind::Module, stmt.line) {
            decl = decl.with_namespace(namespace);
            module_members(text, &stmt, &mut decl);
            unit.types.push(decl);
        }
        modules(text, body.start, body.end, Some(&full), unit);
    }
}

/// Typespec field types from `@type t :: %__MODULE__{name: String.t()}`.
fn struct_typespec(args: &str) -> HashMap<String, String> {
    let Some(open) = args.find('{') else {
        return HashMap::new();
    };
    let Some(close) = find_matching(args, open) else {
        return HashMap::new();
    };
    split_top_level(&args[open + 1..close], b',')
        .into_iter()
        .filter_map(|pair| {
            let (name, ty) = pair.split_once(':')?;
            Some((name.trim().to_string(), ty.trim().to_string()))
        })
        .collect()
}

/// Ecto gives every `schema` an implicit `id` primary key. `@primary_key false`
/// removes it and `@primary_key {:uuid, :binary_id, autogenerate: true}` renames it.
fn primary_key_field(args: &str) -> Option<(String, String)> {
    let args = args.trim();
    if args == "false" {
        return None;
    }
    let tuple = args.trim_start_matches('{').trim_end_matches('}');
    let parts = split_top_level(tuple, b',');
    match (parts.first(), parts.get(1)) {
        (Some(name), Some(ty)) if name.trim().starts_with(':') => {
            Some((name.trim().trim_start_matches(':').to_string(), ty.trim().to_string()))
        }
        _ => Some(("id".to_string(), ":id".to_string())),
    }
}

fn module_members(text: &Text, stmt: &Statement, decl: &mut TypeDecl) {
    let Some(body) = stmt.body() else {
        return;
    };
    let mut typespec = HashMap::new();
    let mut enforced: Vec<String> = Vec::new();
    let mut primary_key = Some(("id".to_string(), ":id".to_string()));
    let mut structural = false;

    for member in statements(text, body.start, body.end, &ELIXIR_BLOCKS) {
        let args = member.args();
        match member.keyword() {
            "@type" | "@typep" if args.starts_with("t ") || args.starts_with("t::") => {
                typespec = struct_typespec(args);
            }
            "@enforce_keys" => enforced = list_items(args),
            "@primary_key" => primary_key = primary_key_field(args),
            "schema" | "embedded_schema" => {
                structural = true;
                if member.keyword() == "schema" {
                    if let Some((name, ty)) = &primary_key {
                        decl.fields.push(FieldDecl::new(name, ty, shape(ty), member.line));
                    }
                }
                if let Some(fields) = member.body() {
                    ecto_fields(text, fields.start, fields.end, decl);
                }
            }
            "defstruct" => {
                structural = true;
                let items = args.trim().trim_start_matches('[').trim_end_matches(']');
                for item in split_top_level(items, b',') {
                    let (name, default) = match item.split_once(':').filter(|(k, _)| !k.is_empty()) {
                        Some((name, default)) => (name.trim().to_string(), Some(default.trim().to_string())),
                        None => (symbol_name(&item), None),
                    };
                    let ty = typespec.get(&name).cloned().unwrap_or_default();
                    let mut field = FieldDecl::new(name, ty.as_str(), shape(&ty), member.line)
                        .with_default(default.filter(|d| d != "nil"));
                    field.optional = field.optional || !enforced.contains(&field.name);
                    decl.fields.push(field);
                }
            }
            "def" | "defp" => {
                if let Some(mut method) = function_decl(&member) {
                    method.visibility = if member.keyword() == "defp" {
                        Visibility::Private
                    } else {
                        Visibility::Public
                    };
                    method.annotations = annotations_before(&text.masked, member.start, AnnotationSyntax::ModuleAttr, 1);
                    method.owner = Some(decl.name.clone());
                    // multi-clause functions are one method
                    if !decl.methods.iter().any(|m| m.name == method.name) {
                        decl.methods.push(method);
                    }
                }
            }
            _ => {}
        }
    }

    if structural {
        decl.kind = DeclKind::Struct;
        let required: Vec<String> = VALIDATE_REQUIRED
            .captures_iter(text.slice(body.start, body.end))
            .flat_map(|c| list_items(&c[1]))
            .collect();
        for field in decl.fields.iter_mut().filter(|f| required.contains(&f.name)) {
            field.optional = false;
        }
    }
}

/// `field :name, :string`, associations, embeds and `timestamps()`.
fn ecto_fields(text: &Text, start: usize, end: usize, decl: &mut TypeDecl) {
    for stmt in statements(text, start, end, &ELIXIR_BLOCKS) {
        let (positional, options) = call_args(stmt.args());
        let name = positional.first().map(|p| symbol_name(p)).unwrap_or_default();
        let target = positional.get(1).map(|t| t.trim().to_string());
        let (name, ty, optional) = match stmt.keyword() {
            "field" => (name, target.unwrap_or_else(|| ":string".to_string()), true),
            "belongs_to" => (format!("{}_id", name), ":id".to_string(), true),
            "has_one" | "embeds_one" => (name, target.unwrap_or_default(), true),
            "has_many" | "many_to_many" | "embeds_many" => {
                (name, format!("[{}]", target.unwrap_or_default()), true)
            }
            "timestamps" => {
                for stamp in ["inserted_at", "updated_at"] {
                    decl.fields.push(FieldDecl::new(stamp, ":naive_datetime", shape(":naive_datetime"), stmt.line));
                }
                continue;
            }
            _ => continue,
        };
        if name.is_empty() {
            continue;
        }
        let mut field = FieldDecl::new(name, ty.as_str(), shape(&ty), stmt.line)
            .with_default(named(&options, "default").map(String::from));
        field.optional = optional;
        decl.fields.push(field);
    }
}

/// `def show(conn, %{"id" => id})`: map patterns contribute their string keys.
fn function_decl(stmt: &Statement) -> Option<MethodDecl> {
    let args = stmt.args();
    let name_end = args
        .find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '?' | '!')))
        .unwrap_or(args.len());
    let name = &args[..name_end];
    if name.is_empty() {
        return None;
    }
    let mut method = MethodDecl::new(name, stmt.line);
    let rest = &args[name_end..];
    if rest.starts_with('(') {
        if let Some(close) = find_matching(rest, 0) {
            for raw in split_top_level(&rest[1..close], b',') {
                if raw.starts_with('%') {
                    method.params.extend(MAP_KEY.captures_iter(&raw).map(|c| Param::new(&c[1], "")));
                    continue;
                }
                // `opts \\ []`, `%User{} = user`
                let (pattern, default) = match raw.split_once("\\\\") {
                    Some((p, d)) => (p.trim(), Some(d.trim().to_string())),
                    None => (raw.as_str(), None),
                };
                let binding = pattern.rsplit('=').next().unwrap_or(pattern).trim();
                if binding.chars().all(|c| c.is_alphanumeric() || c == '_') && !binding.is_empty() {
                    method.params.push(Param::new(binding, "").with_default(default));
                }
            }
        }
    }
    Some(method)
}

/// `scope "/api", MyAppWeb do`, verb macros and `resources` with nesting.
fn phoenix_routes(text: &Text, start: usize, end: usize, prefix: &str, unit: &mut SourceUnit) {
    for stmt in statements(text, start, end, &ELIXIR_BLOCKS) {
        let keyword = stmt.keyword();
        let (positional, options) = call_args(stmt.args());
        let path = positional
            .first()
            .and_then(|p| string_literal(p))
            .or_else(|| named(&options, "path").and_then(string_literal));
        let controller = positional.get(1).map(|c| module_name(c));
        match keyword {
            "scope" => {
                let Some(body) = stmt.body() else {
                    continue;
                };
                let inner = match &path {
                    Some(path) => join(prefix, path),
                    None => prefix.to_string(),
                };
                phoenix_routes(text, body.start, body.end, &inner, unit);
            }
            "resources" => {
                let (Some(path), Some(controller)) = (path, controller) else {
                    continue;
                };
                let mut fact = ResourceFact::new(path.clone(), controller, ResourceStyle::Phoenix, stmt.line);
                fact.singular = named(&options, "singleton") == Some("true");
                fact.only = named(&options, "only").map(list_items).unwrap_or_default();
                fact.except = named(&options, "except").map(list_items).unwrap_or_default();
                fact.group = Some(prefix.to_string()).filter(|p| !p.is_empty());
                let nested = if fact.singular {
                    join(prefix, &path)
                } else {
                    format!("{}{}", prefix.trim_end_matches('/'), nested_prefix(&path))
                };
                unit.resources.push(fact);
                if let Some(body) = stmt.body() {
                    phoenix_routes(text, body.start, body.end, &nested, unit);
                }
            }
            verb if VERBS.contains(&verb) => {
                let (Some(path), Some(method)) = (path, HttpMethod::parse(verb)) else {
                    continue;
                };
                let action = positional.get(2).map(|a| symbol_name(a)).unwrap_or_default();
                if action.is_empty() {
                    continue;
                }
                unit.routes.push(
                    RouteFact::new(method, path, action, PathSyntax::Colon, stmt.line)
                        .with_owner(controller)
                        .with_group(Some(prefix.to_string())),
                );
            }
            "pipeline" => {}
            _ => {
                if let Some(body) = stmt.body() {
                    phoenix_routes(text, body.start, body.end, prefix, unit);
                }
            }
        }
    }
}

fn join(prefix: &str, path: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), path.trim_matches('/'))
}

/// `MyAppWeb.UserController` -> `UserController`.
fn module_name(raw: &str) -> String {
    let raw = raw.trim();
    raw.rsplit('.').next().unwrap_or(raw).to_string()
}
