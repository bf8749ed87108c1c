//! PHP scanner: classes with typed properties, Laravel route files and Symfony attributes.

use super::clike::{
    call_split, members, split_default, split_param, strip_words, type_and_name,
    type_spans, Member, Text, TypeSpan,
};
use crate::lexer::{
    brace_block, list_items, split_top_level, string_literal, AnnotationSyntax, CommentStyle,
};
use crate::model::{
    DeclKind, FieldDecl, HttpMethod, MethodDecl, Param, ResourceFact, RouteFact, SourceUnit, TypeDecl,
    Visibility, LAMBDA,
};
use crate::parser::Language;
use crate::path::PathSyntax;
use crate::resource::{nested_prefix, ResourceStyle};
use crate::type_map::php::shape;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

crate::parser::scanner_backend!(PhpBackend, Language::Php, php);

static TYPE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\w$>:])(?P<kind>class|interface|trait|enum)\s+(?P<name>[A-Za-z_]\w*)").unwrap()
});
static NAMESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*namespace\s+([\w\\]+)").unwrap());
static USE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^use\s+([\w\\]+)").unwrap());
static CHAIN_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\bRoute::|\$router\s*->\s*|\$routes\s*->\s*)(?P<name>\w+)\s*\(").unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*->\s*(?P<name>\w+)\s*\(").unwrap());
static ENUM_CASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*case\s+(\w+)").unwrap());
static ARRAY_ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"](\w+)['"]\s*=>\s*(\[[^\]]*\]|'[^']*'|"[^"]*")"#).unwrap());

const MODIFIERS: &[&str] = &[
    "public", "private", "protected", "static", "readonly", "final", "abstract", "var",
];

fn kind_of(keyword: &str) -> Option<DeclKind> {
    Some(match keyword {
        "class" | "trait" => DeclKind::Class,
        "interface" => DeclKind::Interface,
        "enum" => DeclKind::Enum,
        _ => return None,
    })
}

pub fn scan(path: &Path, content: &str) -> SourceUnit {
    let text = Text::new(content, CommentStyle::Php);
    let mut unit = SourceUnit::new(path, Language::Php, content);
    let namespace = NAMESPACE.captures(&text.clean).map(|c| c[1].to_string());
    unit.imports = USE.captures_iter(&text.clean).map(|c| c[1].to_string()).collect();

    for span in type_spans(&text, &TYPE_DECL, b";", AnnotationSyntax::HashBracket, kind_of) {
        if let Some(decl) = type_decl(&text, &span, namespace.as_deref()) {
            symfony_routes(&decl, &mut unit.routes);
            unit.types.push(decl);
        }
    }
    laravel_routes(&text, &mut unit);
    unit
}

fn type_decl(text: &Text, span: &TypeSpan, namespace: Option<&str>) -> Option<TypeDecl> {
    let mut decl = TypeDecl::new(&span.name, span.kind, span.line)?
        .with_namespace(namespace.map(String::from));
    decl.annotations = span.annotations.clone();
    decl.supertypes = supertypes(&span.header);

    let Some(body) = span.body else {
        return Some(decl);
    };
    if decl.kind == DeclKind::Enum {
        decl.variants = ENUM_CASE
            .captures_iter(body.body(&text.clean))
            .map(|c| c[1].to_string())
            .collect();
        return Some(decl);
    }
    for member in members(text, &body, AnnotationSyntax::HashBracket, false) {
        add_member(&mut decl, &member);
    }
    Some(decl)
}

/// `extends Model implements A, B`; an enum backing type (`: string`) is not a base.
fn supertypes(header: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut listing = false;
    for token in header.split(|c: char| c.is_whitespace() || c == ',') {
        match token {
            "" => {}
            "extends" | "implements" => listing = true,
            _ if listing => out.push(token.trim_start_matches('\\').to_string()),
            _ => {}
        }
    }
    out
}

fn visibility(modifiers: &[&str]) -> Visibility {
    if modifiers.contains(&"private") {
        Visibility::Private
    } else if modifiers.contains(&"protected") {
        Visibility::Protected
    } else {
        Visibility::Public
    }
}

fn add_member(decl: &mut TypeDecl, member: &Member) {
    let (modifiers, rest) = strip_words(&member.decl, MODIFIERS);
    let visibility = visibility(&modifiers);

    if let Some(signature) = rest.strip_prefix("function") {
        let Some((head, params, tail)) = call_split(signature) else {
            return;
        };
        let name = head.trim_start_matches('&').trim();
        let params = parse_params(params, member.line);
        // Constructor promotion: public function __construct(private string $name)
        if name == "__construct" {
            for param in params.iter().filter(|p| p.annotations.iter().any(|a| a.name == "__promoted_public")) {
                let mut field = FieldDecl::new(&param.name, &param.raw_type, shape(&param.raw_type), member.line)
                    .with_default(param.default_value.clone());
                field.annotations = param
                    .annotations
                    .iter()
                    .filter(|a| a.name != "__promoted_public")
                    .cloned()
                    .collect();
                decl.fields.push(field);
            }
        }
        let mut method = MethodDecl::new(name, member.line);
        method.return_type = tail.strip_prefix(':').map(|t| t.trim().to_string());
        method.visibility = visibility;
        method.annotations = member.annotations.clone();
        method.params = params
            .into_iter()
            .map(|mut p| {
                p.annotations.retain(|a| a.name != "__promoted_public");
                p
            })
            .collect();
        method.owner = Some(decl.name.clone());
        decl.methods.push(method);
        return;
    }

    if modifiers.contains(&"static") || visibility != Visibility::Public {
        return;
    }
    let first_word = rest.split_whitespace().next().unwrap_or("");
    if matches!(first_word, "const" | "use" | "case") {
        return;
    }
    let (left, default) = split_default(rest);
    let (ty, name) = match type_and_name(left) {
        Some((ty, name)) => (ty, name),
        None => ("", left.trim()),
    };
    let Some(name) = name.strip_prefix('$') else {
        return;
    };
    let mut field = FieldDecl::new(name, ty, shape(ty), member.line).with_default(default.map(String::from));
    field.annotations = member.annotations.clone();
    decl.fields.push(field);
}

/// Promoted constructor parameters carry a `__promoted_public` marker until the caller consumes it.
fn parse_params(params: &str, line: usize) -> Vec<Param> {
    split_top_level(params, b',')
        .into_iter()
        .filter_map(|raw| {
            let (mut annotations, rest) = split_param(&raw, AnnotationSyntax::HashBracket, line);
            let (modifiers, rest) = strip_words(&rest, MODIFIERS);
            if !modifiers.is_empty() && visibility(&modifiers) == Visibility::Public {
                annotations.push(crate::model::Annotation::new("__promoted_public", line));
            }
            let (left, default) = split_default(rest);
            let left = left.replace("...", "").replace('&', "");
            let (ty, name) = match type_and_name(&left) {
                Some((ty, name)) => (ty.to_string(), name.to_string()),
                None => (String::new(), left.trim().to_string()),
            };
            let name = name.strip_prefix('$')?.to_string();
            let mut param = Param::new(name, ty.as_str()).with_default(default.map(String::from));
            if shape(&ty).optional {
                param.required = false;
            }
            param.annotations = annotations;
            Some(param)
        })
        .collect()
}

/// Symfony `#[Route('/x', methods: ['GET'])]` on controller methods.
fn symfony_routes(decl: &TypeDecl, routes: &mut Vec<RouteFact>) {
    let prefix = decl
        .annotation("Route")
        .and_then(|a| a.string_arg(0).or_else(|| a.string_named("path")))
        .unwrap_or_default();
    for method in &decl.methods {
        for ann in method.annotations.iter().filter(|a| a.simple_name() == "Route") {
            let Some(path) = ann.string_arg(0).or_else(|| ann.string_named("path")) else {
                continue;
            };
            let mut verbs: Vec<HttpMethod> = ann
                .named("methods")
                .map(|m| list_items(m).iter().filter_map(|v| HttpMethod::parse(v)).collect())
                .unwrap_or_default();
            if verbs.is_empty() {
                verbs.push(HttpMethod::Get);
            }
            for verb in verbs {
                routes.push(
                    RouteFact::new(verb, path.clone(), &method.name, PathSyntax::Canonical, method.line)
                        .with_owner(Some(decl.name.clone()))
                        .with_group(Some(prefix.clone())),
                );
            }
        }
    }
}

/// One `->name(args)` link of a route builder chain.
#[derive(Debug)]
struct Link {
    name: String,
    args: Vec<String>,
    open: usize,
    close: usize,
}

fn chain_at(text: &Text, name: &str, open: usize) -> Option<Vec<Link>> {
    let (args, close) = text.call_args(open)?;
    let mut chain = vec![Link { name: name.to_string(), args, open, close }];
    let mut cursor = close + 1;
    while let Some(cap) = LINK.captures(&text.clean[cursor..]) {
        let whole = cap.get(0)?;
        let open = cursor + whole.end() - 1;
        let (args, close) = text.call_args(open)?;
        chain.push(Link { name: cap["name"].to_string(), args, open, close });
        cursor = close + 1;
    }
    Some(chain)
}

/// A `group(function () { ... })` region with its prefix and controller.
struct Scope {
    start: usize,
    end: usize,
    prefix: String,
    controller: Option<String>,
}

/// `[UserController::class, 'index']`, `'UserController@index'`, `UserController::class`, closures.
fn handler_of(arg: &str, controller: Option<&str>) -> (Option<String>, String) {
    let arg = arg.trim();
    if arg.starts_with("function") || arg.starts_with("fn") || arg.starts_with("static") {
        return (None, LAMBDA.to_string());
    }
    if arg.starts_with('[') {
        let items = split_top_level(arg.trim_start_matches('[').trim_end_matches(']'), b',');
        let owner = items.first().map(|c| class_ref(c));
        let action = items.get(1).and_then(|a| string_literal(a)).unwrap_or_else(|| "__invoke".to_string());
        return (owner, action);
    }
    if let Some(literal) = string_literal(arg) {
        return match literal.split_once('@') {
            Some((class, action)) => (Some(class_ref(class)), action.to_string()),
            // Route::controller(X::class)->group(...) with bare action names
            None => (controller.map(String::from), literal),
        };
    }
    if arg.ends_with("::class") {
        return (Some(class_ref(arg)), "__invoke".to_string());
    }
    (None, LAMBDA.to_string())
}

fn class_ref(raw: &str) -> String {
    let raw = raw.trim().trim_end_matches("::class");
    let raw = string_literal(raw).unwrap_or_else(|| raw.to_string());
    raw.rsplit('\\').next().unwrap_or(&raw).to_string()
}

/// Options array entries such as `['prefix' => 'admin', 'only' => ['index']]`.
fn array_option(args: &[String], key: &str) -> Option<String> {
    args.iter().find_map(|arg| {
        ARRAY_ENTRY
            .captures_iter(arg)
            .find(|c| &c[1] == key)
            .map(|c| c[2].to_string())
    })
}

fn laravel_routes(text: &Text, unit: &mut SourceUnit) {
    let mut scopes: Vec<Scope> = Vec::new();
    for cap in CHAIN_START.captures_iter(&text.clean) {
        let Some(whole) = cap.get(0) else {
            continue;
        };
        let Some(chain) = chain_at(text, &cap["name"], whole.end() - 1) else {
            continue;
        };
        let at = whole.start();
        let line = text.line(at);
        let enclosing: Vec<&Scope> = scopes.iter().filter(|s| s.start <= at && at < s.end).collect();
        let group_prefix: String = enclosing
            .iter()
            .map(|s| s.prefix.trim_matches('/'))
            .filter(|p| !p.is_empty())
            .map(|p| format!("/{}", p))
            .collect();
        let group_controller = enclosing.iter().rev().find_map(|s| s.controller.clone());

        if let Some(group) = chain.iter().find(|l| l.name == "group") {
            let mut prefix = String::new();
            let mut controller = None;
            for link in &chain {
                match link.name.as_str() {
                    "prefix" => prefix = link.args.first().and_then(|a| string_literal(a)).unwrap_or_default(),
                    "controller" => controller = link.args.first().map(|c| class_ref(c)),
                    _ => {}
                }
            }
            if let Some(p) = array_option(&group.args, "prefix") {
                prefix = string_literal(&p).unwrap_or(p);
            }
            if let Some(block) = brace_block(&text.clean, group.open + 1, b"") {
                if block.end <= group.close {
                    scopes.push(Scope { start: block.start, end: block.end, prefix, controller });
                }
            }
            continue;
        }

        let first = &chain[0];
        match first.name.as_str() {
            "resource" | "apiResource" => {
                let Some(name) = first.args.first().and_then(|a| string_literal(a)) else {
                    continue;
                };
                let controller = first.args.get(1).map(|c| class_ref(c)).unwrap_or_default();
                // photos.comments => /photos/{photo_id}/comments
                let mut segments: Vec<&str> = name.split('.').collect();
                let last = segments.pop().unwrap_or_default();
                let nested: String = segments.iter().map(|s| nested_prefix(s)).collect();
                let mut fact = ResourceFact::new(last, controller, ResourceStyle::Laravel, line);
                fact.is_api = first.name == "apiResource";
                fact.group = Some(format!("{}{}", group_prefix, nested)).filter(|g| !g.is_empty());
                for link in &chain[1..] {
                    let values = link.args.first().map(|a| list_items(a)).unwrap_or_default();
                    match link.name.as_str() {
                        "only" => fact.only = values,
                        "except" => fact.except = values,
                        _ => {}
                    }
                }
                if let Some(only) = array_option(&first.args, "only") {
                    fact.only = list_items(&only);
                }
                if let Some(except) = array_option(&first.args, "except") {
                    fact.except = list_items(&except);
                }
                unit.resources.push(fact);
            }
            verb => {
                let (verbs, rest): (Vec<HttpMethod>, &[String]) = match verb {
                    "match" => (
                        first.args.first().map(|a| list_items(a)).unwrap_or_default().iter().filter_map(|v| HttpMethod::parse(v)).collect(),
                        first.args.get(1..).unwrap_or(&[]),
                    ),
                    "any" => (vec![HttpMethod::Get], &first.args[..]),
                    other => match HttpMethod::parse(other) {
                        Some(m) => (vec![m], &first.args[..]),
                        None => continue,
                    },
                };
                let Some(path) = rest.first().and_then(|a| string_literal(a)) else {
                    continue;
                };
                let (owner, handler) = rest
                    .get(1)
                    .map(|h| handler_of(h, group_controller.as_deref()))
                    .unwrap_or((None, LAMBDA.to_string()));
                for method in verbs {
                    unit.routes.push(
                        RouteFact::new(method, path.clone(), handler.clone(), PathSyntax::Canonical, line)
                            .with_owner(owner.clone())
                            .with_group(Some(group_prefix.clone())),
                    );
                }
            }
        }
    }
    if !unit.resources.is_empty() {
        debug!("{} Laravel resources in {}", unit.resources.len(), unit.path.display());
    }
}
