//! C# scanner: classes, records, properties, ASP.NET controllers and minimal APIs.

use super::clike::{
    call_split, colon_bases, enum_constants, leading_parens, members, skip_generics, split_default,
    split_param, strip_words, type_and_name, type_spans, GroupVars, Member, Text, TypeSpan,
};
use crate::lexer::{split_top_level, string_literal, AnnotationSyntax, CommentStyle};
use crate::model::{
    DeclKind, FieldDecl, HttpMethod, MethodDecl, Param, RouteFact, SourceUnit, TypeDecl, Visibility,
    LAMBDA,
};
use crate::parser::Language;
use crate::path::PathSyntax;
use crate::type_map::csharp::shape;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

crate::parser::scanner_backend!(CSharpBackend, Language::CSharp, csharp);

static TYPE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?P<kind>record\s+struct|record\s+class|record|class|struct|interface|enum)\s+(?P<name>[A-Za-z_]\w*)").unwrap()
});
static NAMESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*namespace\s+([\w.]+)").unwrap());
static USING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:global\s+)?using\s+(?:static\s+)?([\w.]+)\s*;").unwrap());
static MAP_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?P<recv>\w+)\s*\.\s*Map(?P<verb>Get|Post|Put|Delete|Patch|Methods)\s*\(").unwrap()
});
static MAP_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?P<var>\w+)\s*=\s*(?P<recv>\w+)\s*\.\s*MapGroup\s*\(").unwrap());
static VERB_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r#""(\w+)""#).unwrap());

const MODIFIERS: &[&str] = &[
    "public", "private", "protected", "internal", "static", "readonly", "virtual", "override",
    "abstract", "sealed", "async", "new", "partial", "const", "required", "extern", "unsafe",
    "volatile", "file",
];
const PARAM_MODIFIERS: &[&str] = &["this", "ref", "out", "in", "params", "scoped"];
const NESTED: &[&str] = &["class", "struct", "interface", "enum", "record", "delegate", "event"];

fn kind_of(keyword: &str) -> Option<DeclKind> {
    Some(match keyword {
        "class" => DeclKind::Class,
        "struct" => DeclKind::Struct,
        "interface" => DeclKind::Interface,
        "enum" => DeclKind::Enum,
        k if k.starts_with("record") => DeclKind::Record,
        _ => return None,
    })
}

pub fn scan(path: &Path, content: &str) -> SourceUnit {
    let text = Text::new(content, CommentStyle::CLike);
    let mut unit = SourceUnit::new(path, Language::CSharp, content);
    let namespace = NAMESPACE.captures(&text.clean).map(|c| c[1].to_string());
    unit.imports = USING.captures_iter(&text.clean).map(|c| c[1].to_string()).collect();

    for span in type_spans(&text, &TYPE_DECL, b";", AnnotationSyntax::Bracket, kind_of) {
        let Some(decl) = type_decl(&text, &span, namespace.as_deref()) else {
            continue;
        };
        controller_routes(&decl, &mut unit.routes);
        unit.types.push(decl);
    }
    minimal_api_routes(&text, &mut unit.routes);
    unit
}

fn type_decl(text: &Text, span: &TypeSpan, namespace: Option<&str>) -> Option<TypeDecl> {
    let qualifier = match (namespace, &span.outer) {
        (Some(ns), Some(outer)) => Some(format!("{}.{}", ns, outer)),
        (None, Some(outer)) => Some(outer.clone()),
        (Some(ns), None) => Some(ns.to_string()),
        (None, None) => None,
    };
    let mut decl = TypeDecl::new(&span.name, span.kind, span.line)?.with_namespace(qualifier);
    decl.annotations = span.annotations.clone();

    let header = skip_generics(&span.header);
    match leading_parens(header) {
        // record User(string Name, int Age) : Base;
        Some((params, rest)) => {
            for param in parse_params(params, span.line) {
                let mut field = FieldDecl::new(&param.name, &param.raw_type, shape(&param.raw_type), span.line)
                    .with_default(param.default_value.clone());
                field.annotations = param.annotations;
                decl.fields.push(field);
            }
            decl.supertypes = colon_bases(rest);
        }
        None => decl.supertypes = colon_bases(header),
    }

    let Some(body) = span.body else {
        return Some(decl);
    };
    if decl.kind == DeclKind::Enum {
        decl.variants = enum_constants(body.body(&text.masked), AnnotationSyntax::Bracket);
        return Some(decl);
    }
    let interface = decl.kind == DeclKind::Interface;
    for member in members(text, &body, AnnotationSyntax::Bracket, false) {
        add_member(&mut decl, &member, interface);
    }
    Some(decl)
}

fn visibility(modifiers: &[&str], interface: bool) -> Visibility {
    if modifiers.contains(&"public") || interface {
        Visibility::Public
    } else if modifiers.contains(&"protected") {
        Visibility::Protected
    } else if modifiers.contains(&"internal") {
        Visibility::Internal
    } else {
        Visibility::Private
    }
}

fn add_member(decl: &mut TypeDecl, member: &Member, interface: bool) {
    let (modifiers, rest) = strip_words(&member.decl, MODIFIERS);
    let first_word = rest.split(|c: char| !c.is_alphanumeric()).next().unwrap_or("");
    if NESTED.contains(&first_word) || rest.starts_with('~') {
        return;
    }
    let visibility = visibility(&modifiers, interface);

    if let Some((head, params, _)) = call_split(rest) {
        // Constructors have no return type
        let Some((return_type, name)) = type_and_name(head) else {
            return;
        };
        let name = name.split('<').next().unwrap_or(name);
        if name == "operator" || return_type.ends_with("operator") {
            return;
        }
        let mut method = MethodDecl::new(name, member.line);
        method.return_type = Some(return_type.to_string());
        method.is_async = modifiers.contains(&"async");
        method.visibility = visibility;
        method.annotations = member.annotations.clone();
        method.params = parse_params(params, member.line);
        method.owner = Some(decl.name.clone());
        decl.methods.push(method);
        return;
    }

    if modifiers.contains(&"static") || modifiers.contains(&"const") {
        return;
    }
    if !matches!(visibility, Visibility::Public | Visibility::Internal) {
        return;
    }
    let (left, default) = split_default(rest);
    let left = left.split("=>").next().unwrap_or(left);
    let Some((ty, name)) = type_and_name(left) else {
        return;
    };
    let default = default
        .map(|d| d.to_string())
        .or_else(|| member.trailer.strip_prefix('=').map(|d| d.trim().to_string()));
    let mut field = FieldDecl::new(name, ty, shape(ty), member.line).with_default(default);
    field.annotations = member.annotations.clone();
    decl.fields.push(field);
}

fn parse_params(params: &str, line: usize) -> Vec<Param> {
    split_top_level(params, b',')
        .into_iter()
        .filter_map(|raw| {
            let (annotations, rest) = split_param(&raw, AnnotationSyntax::Bracket, line);
            let (_, rest) = strip_words(&rest, PARAM_MODIFIERS);
            let (left, default) = split_default(rest);
            let (ty, name) = type_and_name(left)?;
            let mut param = Param::new(name, ty).with_default(default.map(|d| d.to_string()));
            if shape(ty).optional {
                param.required = false;
            }
            param.annotations = annotations;
            Some(param)
        })
        .collect()
}

/// `[Route("api/[controller]")]` classes with `[HttpGet("{id}")]` actions.
fn controller_routes(decl: &TypeDecl, routes: &mut Vec<RouteFact>) {
    let is_controller = decl.has_annotation("ApiController")
        || decl.has_annotation("Route")
        || decl.name.ends_with("Controller")
        || decl.extends("ControllerBase")
        || decl.extends("Controller");
    if !is_controller || decl.kind == DeclKind::Interface {
        return;
    }
    let base = decl.name.strip_suffix("Controller").unwrap_or(&decl.name);
    let prefix = decl
        .annotation("Route")
        .and_then(|a| a.string_arg(0).or_else(|| a.string_named("template")))
        .unwrap_or_default();

    for method in &decl.methods {
        if method.annotation("NonAction").is_some() || method.visibility != Visibility::Public {
            continue;
        }
        let local = method.annotation("Route").and_then(|a| a.string_arg(0));
        let mut verbs: Vec<(HttpMethod, Option<String>)> = Vec::new();
        for ann in &method.annotations {
            let name = ann.simple_name();
            if name == "AcceptVerbs" {
                for arg in 0..ann.args.len() {
                    if let Some(verb) = ann.string_arg(arg).as_deref().and_then(HttpMethod::parse) {
                        verbs.push((verb, None));
                    }
                }
                continue;
            }
            let Some(verb) = name.strip_prefix("Http").and_then(HttpMethod::parse) else {
                continue;
            };
            verbs.push((verb, ann.string_arg(0).or_else(|| ann.string_named("template"))));
        }
        if verbs.is_empty() {
            match local {
                Some(_) => verbs.push((HttpMethod::Get, None)),
                None => continue,
            }
        }

        let tokens = |s: &str| {
            s.replace("[controller]", base)
                .replace("[Controller]", base)
                .replace("[action]", &method.name)
                .replace("[Action]", &method.name)
        };
        for (verb, template) in verbs {
            let template = template.or_else(|| local.clone()).unwrap_or_default();
            let (group, path) = match template.strip_prefix('~').unwrap_or(&template) {
                absolute if absolute.starts_with('/') => (None, absolute.to_string()),
                relative => (Some(tokens(&prefix)), relative.to_string()),
            };
            routes.push(
                RouteFact::new(verb, tokens(&path), &method.name, PathSyntax::Canonical, method.line)
                    .with_owner(Some(decl.name.clone()))
                    .with_group(group),
            );
        }
    }
}

/// `app.MapGet("/x", handler)` with `MapGroup` prefixes.
fn minimal_api_routes(text: &Text, routes: &mut Vec<RouteFact>) {
    let mut groups = GroupVars::default();
    for cap in MAP_GROUP.captures_iter(&text.clean) {
        let whole = cap.get(0).map(|m| m.end()).unwrap_or(0);
        let Some((args, _)) = text.call_args(whole.saturating_sub(1)) else {
            continue;
        };
        if let Some(prefix) = args.first().and_then(|a| string_literal(a)) {
            groups.insert(&cap["var"], &cap["recv"], &prefix);
        }
    }

    for cap in MAP_CALL.captures_iter(&text.clean) {
        let Some(whole) = cap.get(0) else {
            continue;
        };
        let Some((args, _)) = text.call_args(whole.end() - 1) else {
            continue;
        };
        if args.len() < 2 {
            continue;
        }
        let Some(path) = string_literal(&args[0]) else {
            continue;
        };
        let verbs: Vec<HttpMethod> = match &cap["verb"] {
            "Methods" => VERB_LITERAL
                .captures_iter(&args[1])
                .filter_map(|v| HttpMethod::parse(&v[1]))
                .collect(),
            verb => HttpMethod::parse(verb).into_iter().collect(),
        };
        let handler = handler_name(args.last().map(String::as_str).unwrap_or(""));
        let group = groups.prefix(&cap["recv"]);
        for verb in verbs {
            routes.push(
                RouteFact::new(verb, path.clone(), handler.clone(), PathSyntax::Canonical, text.line(whole.start()))
                    .with_group(Some(group.clone())),
            );
        }
    }
}

fn handler_name(arg: &str) -> String {
    let arg = arg.trim();
    if arg.contains("=>") || arg.starts_with("delegate") || arg.is_empty() {
        return LAMBDA.to_string();
    }
    arg.rsplit('.').next().unwrap_or(arg).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeKind;
    use pretty_assertions::assert_eq;

    fn parse(code: &str) -> SourceUnit {
        scan(Path::new("Test.cs"), code)
    }

    fn routes(unit: &SourceUnit) -> Vec<(HttpMethod, String, String)> {
        unit.routes
            .iter()
            .map(|r| {
                let full = crate::path::join_paths(r.group.as_deref(), &r.path, r.syntax);
                (r.method, full, r.handler.clone())
            })
            .collect()
    }

    #[test]
    fn test_properties_and_nullability() {
        let unit = parse("class User { public string Name { get; set; } public int? Age { get; set; } }");
        let user = unit.find_type("User").unwrap();
        assert_eq!(user.fields.len(), 2);
        assert_eq!(user.fields[0].name, "Name");
        assert!(user.fields[0].is_required());
        assert_eq!(user.fields[1].name, "Age");
        assert!(!user.fields[1].is_required());
        assert_eq!(user.fields[1].kind, TypeKind::Optional);
    }

    #[test]
    fn test_unterminated_class() {
        let unit = parse("class Broken {");
        assert_eq!(unit.types.len(), 1);
        assert_eq!(unit.types[0].name, "Broken");
        assert!(unit.types[0].fields.is_empty());
    }

    #[test]
    fn test_records_enums_and_attributes() {
        let unit = parse(
            r#"
namespace Shop.Models;

using System.Text.Json.Serialization;

public record Product(string Sku, decimal Price, string? Note = null);

public enum Status { Active = 1, Archived }

public class Order : EntityBase, IAuditable
{
    private readonly int _secret;
    public static int Count { get; set; }

    [JsonPropertyName("order_id")]
    public Guid Id { get; init; }

    public List<Product> Items { get; set; } = new();

    public string Label => $"Order {Id}";

    public class Line { public int Qty { get; set; } }
}
"#,
        );
        assert_eq!(unit.imports, vec!["System.Text.Json.Serialization"]);
        let product = unit.find_type("Product").unwrap();
        assert_eq!(product.kind, DeclKind::Record);
        assert_eq!(product.fields.len(), 3);
        assert!(!product.fields[2].is_required());

        let status = unit.find_type("Status").unwrap();
        assert_eq!(status.variants, vec!["Active", "Archived"]);

        let order = unit.find_type("Order").unwrap();
        assert_eq!(order.namespace.as_deref(), Some("Shop.Models"));
        assert_eq!(order.supertypes, vec!["EntityBase", "IAuditable"]);
        let names: Vec<&str> = order.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Id", "Items", "Label"]);
        assert_eq!(order.fields[0].annotation("JsonPropertyName").unwrap().string_arg(0).as_deref(), Some("order_id"));
        assert!(!order.fields[1].is_required());
        assert_eq!(order.fields[0].line, 16);

        let line = unit.find_type("Line").unwrap();
        assert_eq!(line.namespace.as_deref(), Some("Shop.Models.Order"));
        assert_eq!(line.fields.len(), 1);
    }

    #[test]
    fn test_controller_routes() {
        let unit = parse(
            r#"
[ApiController]
[Route("api/[controller]")]
public class UsersController : ControllerBase
{
    [HttpGet]
    public async Task<ActionResult<IEnumerable<UserDto>>> GetAll([FromQuery] int page = 1) => Ok();

    [HttpGet("{id:int}")]
    public async Task<ActionResult<UserDto>> GetById(int id) { return Ok(); }

    [HttpPost]
    public IActionResult Create([FromBody] CreateUserRequest request) { return Ok(); }

    [Route("[action]")]
    public IActionResult Export() { return Ok(); }

    [HttpDelete("/admin/users/{id}")]
    public IActionResult Purge(Guid id) { return Ok(); }

    private void Helper() { }
}
"#,
        );
        assert_eq!(
            routes(&unit),
            vec![
                (HttpMethod::Get, "/api/Users".to_string(), "GetAll".to_string()),
                (HttpMethod::Get, "/api/Users/{id}".to_string(), "GetById".to_string()),
                (HttpMethod::Post, "/api/Users".to_string(), "Create".to_string()),
                (HttpMethod::Get, "/api/Users/Export".to_string(), "Export".to_string()),
                (HttpMethod::Delete, "/admin/users/{id}".to_string(), "Purge".to_string()),
            ]
        );
        let controller = unit.find_type("UsersController").unwrap();
        let get_all = &controller.methods[0];
        assert!(get_all.is_async);
        assert_eq!(get_all.params[0].name, "page");
        assert!(!get_all.params[0].required);
        assert_eq!(get_all.params[0].annotations[0].name, "FromQuery");
        assert_eq!(unit.routes[0].owner.as_deref(), Some("UsersController"));
    }

    #[test]
    fn test_minimal_api() {
        let unit = parse(
            r#"
var app = builder.Build();
var todos = app.MapGroup("/todos");
todos.MapGet("/", GetAllTodos);
todos.MapGet("/{id}", async (int id, TodoDb db) => await db.Todos.FindAsync(id));
app.MapPost("/login", Handlers.Login);
app.MapMethods("/sync", new[] { "PUT", "PATCH" }, Sync);
"#,
        );
        assert_eq!(
            routes(&unit),
            vec![
                (HttpMethod::Get, "/todos".to_string(), "GetAllTodos".to_string()),
                (HttpMethod::Get, "/todos/{id}".to_string(), LAMBDA.to_string()),
                (HttpMethod::Post, "/login".to_string(), "Login".to_string()),
                (HttpMethod::Put, "/sync".to_string(), "Sync".to_string()),
                (HttpMethod::Patch, "/sync".to_string(), "Sync".to_string()),
            ]
        );
    }
}
