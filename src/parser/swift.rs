//! Swift scanner: Vapor route builders and Codable/Fluent models.

use super::clike::{
    colon_bases, members, split_default, split_param, strip_call, strip_words, type_spans, GroupVars, Member, Text,
    TypeSpan,
};
use crate::lexer::{
    brace_block, parse_annotation_args, split_top_level, string_literal, AnnotationSyntax, CommentStyle,
};
use crate::model::{DeclKind, FieldDecl, HttpMethod, MethodDecl, Param, RouteFact, SourceUnit, TypeDecl, Visibility, LAMBDA};
use crate::parser::Language;
use crate::path::PathSyntax;
use crate::type_map::swift::shape;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

crate::parser::scanner_backend!(SwiftBackend, Language::Swift, swift);

static TYPE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\w.])(?P<kind>struct|class|enum|protocol|actor)\s+(?P<name>[A-Za-z_]\w*)").unwrap()
});
static IMPORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*import\s+([\w.]+)").unwrap());
static BUILDER_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?P<obj>[A-Za-z_]\w*)\s*\.\s*(?P<verb>get|post|put|delete|patch|on|group|grouped)\s*(?P<open>[({])")
        .unwrap()
});
static GROUPED_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:let|var)\s+(?P<var>\w+)\s*=\s*(?P<obj>\w+)\s*\.\s*grouped\s*\(").unwrap());
static CLOSURE_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(\w+)\s+in\b").unwrap());

const MODIFIERS: &[&str] = &[
    "public", "private", "fileprivate", "internal", "open", "static", "class", "final", "lazy", "weak",
    "unowned", "override", "mutating", "nonmutating", "nonisolated", "dynamic", "required", "convenience",
];

/// Names the type pattern catches in `class func` and `class var`.
const NOT_TYPE_NAMES: &[&str] = &["func", "var", "let"];

fn kind_of(keyword: &str) -> Option<DeclKind> {
    Some(match keyword {
        "struct" => DeclKind::Struct,
        "class" | "actor" => DeclKind::Class,
        "enum" => DeclKind::Enum,
        "protocol" => DeclKind::Interface,
        _ => return None,
    })
}

pub fn scan(path: &Path, content: &str) -> SourceUnit {
    let mut unit = SourceUnit::new(path, Language::Swift, content);
    let text = Text::new(content, CommentStyle::CLike);
    unit.imports = IMPORT.captures_iter(&text.clean).map(|c| c[1].to_string()).collect();

    let spans: Vec<TypeSpan> = type_spans(&text, &TYPE_DECL, b";", AnnotationSyntax::At, kind_of)
        .into_iter()
        .filter(|s| !NOT_TYPE_NAMES.contains(&s.name.as_str()))
        .collect();
    for span in &spans {
        if let Some(decl) = type_decl(&text, span) {
            unit.types.push(decl);
        }
    }
    vapor_routes(&text, &spans, &mut unit.routes);
    unit
}

fn type_decl(text: &Text, span: &TypeSpan) -> Option<TypeDecl> {
    let mut decl = TypeDecl::new(&span.name, span.kind, span.line)?.with_namespace(span.outer.clone());
    decl.annotations = span.annotations.clone();
    decl.supertypes = colon_bases(&span.header);
    let Some(body) = span.body else {
        return Some(decl);
    };
    for member in members(text, &body, AnnotationSyntax::At, true) {
        if decl.kind == DeclKind::Enum {
            if let Some(cases) = member.decl.strip_prefix("case ") {
                decl.variants.extend(
                    split_top_level(cases, b',')
                        .iter()
                        .map(|c| strip_call(split_default(c).0).to_string())
                        .filter(|c| !c.is_empty()),
                );
                continue;
            }
        }
        add_member(&mut decl, &member);
    }
    Some(decl)
}

fn visibility(modifiers: &[&str]) -> Visibility {
    if modifiers.iter().any(|m| matches!(*m, "private" | "fileprivate")) {
        Visibility::Private
    } else if modifiers.contains(&"internal") {
        Visibility::Internal
    } else {
        Visibility::Public
    }
}

fn add_member(decl: &mut TypeDecl, member: &Member) {
    let (modifiers, rest) = strip_words(&member.decl, MODIFIERS);
    let visibility = visibility(&modifiers);
    let is_static = modifiers.iter().any(|m| matches!(*m, "static" | "class"));

    if let Some(signature) = rest.strip_prefix("func ") {
        if let Some(mut method) = method_decl(signature.trim(), member, visibility) {
            method.owner = Some(decl.name.clone());
            decl.methods.push(method);
        }
        return;
    }
    let Some(binding) = rest.strip_prefix("var ").or_else(|| rest.strip_prefix("let ")) else {
        return;
    };
    if is_static || visibility == Visibility::Private {
        return;
    }
    let (left, default) = split_default(binding);
    // computed properties have a body and no initializer
    if member.body.is_some() && default.is_none() {
        return;
    }
    let Some((name, ty)) = left.split_once(':') else {
        return;
    };
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return;
    }
    let mut field = FieldDecl::new(name, ty.trim(), shape(ty), member.line).with_default(default.map(String::from));
    field.annotations = member.annotations.clone();
    decl.fields.push(field);
}

/// `index(req: Request) async throws -> [Todo]`
fn method_decl(signature: &str, member: &Member, visibility: Visibility) -> Option<MethodDecl> {
    let open = signature.find('(')?;
    let name = signature[..open].split('<').next().unwrap_or("").trim();
    if name.is_empty() {
        return None;
    }
    let close = crate::lexer::find_matching(signature, open)?;
    let tail = &signature[close + 1..];
    let mut method = MethodDecl::new(name, member.line);
    method.params = parse_params(&signature[open + 1..close], member.line);
    method.is_async = tail.split_whitespace().any(|w| w == "async");
    method.return_type = tail
        .split_once("->")
        .map(|(_, ret)| ret.split(" where ").next().unwrap_or(ret).trim().to_string())
        .filter(|r| !r.is_empty());
    method.visibility = visibility;
    method.annotations = member.annotations.clone();
    Some(method)
}

/// `_ req: Request`, `for user: User`, `limit: Int = 10`; the internal name wins.
fn parse_params(params: &str, line: usize) -> Vec<Param> {
    split_top_level(params, b',')
        .into_iter()
        .filter_map(|raw| {
            let (annotations, rest) = split_param(&raw, AnnotationSyntax::At, line);
            let (left, default) = split_default(&rest);
            let (names, ty) = left.split_once(':')?;
            let name = names.split_whitespace().last()?;
            let ty = ty.trim().trim_start_matches("inout ").trim();
            let mut param = Param::new(name, ty).with_default(default.map(String::from));
            if shape(ty).optional {
                param.required = false;
            }
            param.annotations = annotations;
            Some(param)
        })
        .collect()
}

/// Vapor route builders: `app.get("users", ":id", use: show)`,
/// `let api = app.grouped("api")`, `routes.group("todos") { todos in ... }`.
fn vapor_routes(text: &Text, spans: &[TypeSpan], routes: &mut Vec<RouteFact>) {
    let mut groups = GroupVars::default();
    for cap in GROUPED_VAR.captures_iter(&text.clean) {
        let (Some(var), Some(obj), Some(all)) = (cap.name("var"), cap.name("obj"), cap.get(0)) else {
            continue;
        };
        if let Some((args, _)) = text.call_args(all.end() - 1) {
            groups.insert(var.as_str(), obj.as_str(), &segments(&args));
        }
    }

    for cap in BUILDER_CALL.captures_iter(&text.clean) {
        let (Some(obj), Some(verb), Some(open)) = (cap.name("obj"), cap.name("verb"), cap.name("open")) else {
            continue;
        };
        let (args, after) = if open.as_str() == "(" {
            match text.call_args(open.start()) {
                Some((args, close)) => (args, close + 1),
                None => continue,
            }
        } else {
            (Vec::new(), open.start())
        };
        let rest = &text.clean[after..];
        let trailing = rest.trim_start().starts_with('{').then(|| after + (rest.len() - rest.trim_start().len()));
        let prefix = groups.prefix(obj.as_str());

        match verb.as_str() {
            "grouped" => {}
            "group" => {
                let Some(block) = trailing.and_then(|at| brace_block(&text.clean, at, b"")) else {
                    continue;
                };
                if let Some(param) = CLOSURE_PARAM.captures(block.body(&text.clean)) {
                    groups.insert(&param[1], obj.as_str(), &segments(&args));
                }
            }
            _ => {
                let (positional, named) = parse_annotation_args(&args.join(", "));
                let (method, path_args) = if verb.as_str() == "on" {
                    let Some(method) = positional
                        .first()
                        .and_then(|m| HttpMethod::parse(m.trim().trim_start_matches('.')))
                    else {
                        continue;
                    };
                    (method, &positional[1..])
                } else {
                    match HttpMethod::parse(verb.as_str()) {
                        Some(method) => (method, &positional[..]),
                        None => continue,
                    }
                };
                let at = obj.start();
                let (handler, owner) = match named.iter().find(|(k, _)| k == "use") {
                    Some((_, target)) => vapor_handler(target, enclosing(spans, at)),
                    None if trailing.is_some() => (LAMBDA.to_string(), None),
                    // `req.parameters.get("id")` and other lookups
                    None => continue,
                };
                let path = path_args
                    .iter()
                    .filter(|a| string_literal(a).is_some())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ");
                routes.push(
                    RouteFact::new(method, path, handler, PathSyntax::Segments, text.line(at))
                        .with_owner(owner)
                        .with_group(Some(prefix)),
                );
            }
        }
    }
}

/// String arguments of a builder call joined as a path: `"api", "v1"` -> `api/v1`.
fn segments(args: &[String]) -> String {
    args.iter().filter_map(|a| string_literal(a)).collect::<Vec<_>>().join("/")
}

fn enclosing(spans: &[TypeSpan], at: usize) -> Option<String> {
    spans
        .iter()
        .filter(|s| s.contains(at))
        .max_by_key(|s| s.body.map(|b| b.start).unwrap_or(0))
        .map(|s| s.name.clone())
}

/// `index`, `self.index`, `UserController().list`, `controller.list`.
fn vapor_handler(target: &str, enclosing: Option<String>) -> (String, Option<String>) {
    let target = target.trim().trim_start_matches("self.");
    match target.rsplit_once('.') {
        Some((receiver, name)) => {
            let receiver = strip_call(receiver);
            let owner = receiver
                .starts_with(|c: char| c.is_ascii_uppercase())
                .then(|| receiver.to_string());
            (name.to_string(), owner)
        }
        None => (target.to_string(), enclosing),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::join_paths;
    use pretty_assertions::assert_eq;

    fn routes(unit: &SourceUnit) -> Vec<(HttpMethod, String, String, Option<String>)> {
        unit.routes
            .iter()
            .map(|r| {
                (
                    r.method,
                    join_paths(r.group.as_deref(), &r.path, r.syntax),
                    r.handler.clone(),
                    r.owner.clone(),
                )
            })
            .collect()
    }

    #[test]
    fn test_vapor_routes() {
        let unit = scan(
            Path::new("Sources/App/routes.swift"),
            r#"import Vapor

func routes(_ app: Application) throws {
    app.get { req async in
        "It works!"
    }
    app.get("hello", ":name") { req -> String in
        let name = req.parameters.get("name")!
        return "Hello, \(name)!"
    }
    app.on(.PATCH, "users", ":id", use: UserController().update)
    let api = app.grouped("api", "v1")
    api.get("users", use: UserController().list)
}

struct TodoController: RouteCollection {
    func boot(routes: RoutesBuilder) throws {
        let todos = routes.grouped("todos")
        todos.get(use: index)
        todos.post(use: self.create)
        todos.group(":todoID") { todo in
            todo.delete(use: delete)
        }
    }
}
"#,
        );
        let owner = |s: &str| Some(s.to_string());
        assert_eq!(
            routes(&unit),
            vec![
                (HttpMethod::Get, "/".to_string(), "lambda".to_string(), None),
                (HttpMethod::Get, "/hello/{name}".to_string(), "lambda".to_string(), None),
                (HttpMethod::Patch, "/users/{id}".to_string(), "update".to_string(), owner("UserController")),
                (HttpMethod::Get, "/api/v1/users".to_string(), "list".to_string(), owner("UserController")),
                (HttpMethod::Get, "/todos".to_string(), "index".to_string(), owner("TodoController")),
                (HttpMethod::Post, "/todos".to_string(), "create".to_string(), owner("TodoController")),
                (HttpMethod::Delete, "/todos/{todoID}".to_string(), "delete".to_string(), owner("TodoController")),
            ]
        );
        assert_eq!(unit.routes[2].line, 11);
    }

    #[test]
    fn test_fluent_models() {
        let unit = scan(
            Path::new("Sources/App/Models/Todo.swift"),
            r#"import Fluent
import Vapor

final class Todo: Model, Content {
    static let schema = "todos"

    @ID(key: .id)
    var id: UUID?

    @Field(key: "title")
    var title: String

    var summary: String { title }

    init() { }

    func toDTO(_ req: Request, limit: Int = 10) async throws -> TodoDTO {
        TodoDTO(id: id, title: title)
    }
}

struct CreateTodo: Content {
    let title: String
    var done: Bool = false
    private var secret: String
}

enum Status: String, Codable {
    case open, closed
    case archived = "gone"
}
"#,
        );
        assert_eq!(unit.imports, vec!["Fluent", "Vapor"]);
        let todo = unit.find_type("Todo").unwrap();
        assert_eq!(todo.kind, DeclKind::Class);
        assert_eq!(todo.supertypes, vec!["Model", "Content"]);
        let fields: Vec<(&str, &str, bool)> = todo
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.raw_type.as_str(), f.is_required()))
            .collect();
        assert_eq!(fields, vec![("id", "UUID?", false), ("title", "String", true)]);
        assert_eq!(todo.fields[1].annotations[0].string_named("key").as_deref(), Some("title"));

        let method = &todo.methods[0];
        assert_eq!(method.name, "toDTO");
        assert!(method.is_async);
        assert_eq!(method.return_type.as_deref(), Some("TodoDTO"));
        let params: Vec<(&str, bool)> = method.params.iter().map(|p| (p.name.as_str(), p.required)).collect();
        assert_eq!(params, vec![("req", true), ("limit", false)]);

        let create = unit.find_type("CreateTodo").unwrap();
        let names: Vec<(&str, bool)> = create.fields.iter().map(|f| (f.name.as_str(), f.is_required())).collect();
        assert_eq!(names, vec![("title", true), ("done", false)]);
        assert_eq!(unit.find_type("Status").unwrap().variants, vec!["open", "closed", "archived"]);
    }
}
