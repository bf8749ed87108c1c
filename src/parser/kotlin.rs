//! Kotlin scanner: (data) classes, Spring controllers and Ktor routing blocks.

use super::clike::{
    annotation_prefix, call_split, colon_bases, enum_constants, leading_parens, members, skip_generics,
    split_default, split_param, strip_words, type_spans, Member, Text, TypeSpan,
};
use super::jvm;
use crate::lexer::{brace_block, split_top_level, string_literal, AnnotationSyntax, CommentStyle};
use crate::model::{
    DeclKind, FieldDecl, HttpMethod, MethodDecl, Param, RouteFact, SourceUnit, TypeDecl, Visibility,
    LAMBDA,
};
use crate::parser::Language;
use crate::path::PathSyntax;
use crate::type_map::kotlin::shape;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

crate::parser::scanner_backend!(KotlinBackend, Language::Kotlin, kotlin);

static TYPE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:^|[^\w.:@])(?P<kind>(?:(?:data|sealed|abstract|open|enum|annotation|inner|value|private|internal|public|protected|fun)\s+)*(?:class|interface|object))\s+(?P<name>[A-Za-z_]\w*)",
    )
    .unwrap()
});
static PACKAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*package\s+([\w.]+)").unwrap());
static IMPORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*import\s+([\w.*]+)").unwrap());
static KTOR_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\w.])(?P<verb>get|post|put|delete|patch|head|options|route)\s*(?P<open>[({])").unwrap()
});

const MODIFIERS: &[&str] = &[
    "public", "private", "protected", "internal", "override", "open", "abstract", "final",
    "lateinit", "const", "suspend", "inline", "operator", "infix", "tailrec", "external", "actual",
    "expect", "vararg",
];

fn kind_of(keyword: &str) -> Option<DeclKind> {
    let words: Vec<&str> = keyword.split_whitespace().collect();
    if words.contains(&"annotation") {
        return None;
    }
    Some(match words.last().copied() {
        Some("interface") => DeclKind::Interface,
        Some("class") if words.contains(&"enum") => DeclKind::Enum,
        Some("class") if words.contains(&"data") || words.contains(&"value") => DeclKind::Record,
        Some("class") | Some("object") => DeclKind::Class,
        _ => return None,
    })
}

pub fn scan(path: &Path, content: &str) -> SourceUnit {
    let text = Text::new(content, CommentStyle::CLike);
    let mut unit = SourceUnit::new(path, Language::Kotlin, content);
    let package = PACKAGE.captures(&text.clean).map(|c| c[1].to_string());
    unit.imports = IMPORT.captures_iter(&text.clean).map(|c| c[1].to_string()).collect();

    for span in type_spans(&text, &TYPE_DECL, b";\n", AnnotationSyntax::At, kind_of) {
        if let Some(decl) = type_decl(&text, &span, package.as_deref()) {
            jvm::annotated_routes(&decl, &mut unit.routes);
            unit.types.push(decl);
        }
    }
    if content.contains("routing") || unit.imports.iter().any(|i| i.starts_with("io.ktor")) {
        ktor_routes(&text, &mut unit.routes);
    }
    unit
}

fn type_decl(text: &Text, span: &TypeSpan, package: Option<&str>) -> Option<TypeDecl> {
    let namespace = match (package, &span.outer) {
        (Some(p), Some(o)) => Some(format!("{}.{}", p, o)),
        (None, Some(o)) => Some(o.clone()),
        (p, None) => p.map(String::from),
    };
    let mut decl = TypeDecl::new(&span.name, span.kind, span.line)?.with_namespace(namespace);
    decl.annotations = span.annotations.clone();

    // class User @Inject private constructor(val id: Long) : Base(id)
    let header = skip_generics(&span.header);
    let header = &header[annotation_prefix(header, AnnotationSyntax::At)..];
    let (_, header) = strip_words(header, MODIFIERS);
    let header = header.strip_prefix("constructor").unwrap_or(header);
    let bases = match leading_parens(header) {
        Some((params, rest)) => {
            for param in split_top_level(params, b',') {
                if let Some(field) = constructor_property(&param, span.line, decl.kind == DeclKind::Record) {
                    decl.fields.push(field);
                }
            }
            rest
        }
        None => header,
    };
    decl.supertypes = colon_bases(bases);

    let Some(body) = span.body else {
        return Some(decl);
    };
    if decl.kind == DeclKind::Enum {
        decl.variants = enum_constants(body.body(&text.masked), AnnotationSyntax::At);
        return Some(decl);
    }
    for member in members(text, &body, AnnotationSyntax::At, true) {
        add_member(&mut decl, &member);
    }
    Some(decl)
}

/// `@field:JsonProperty("n") val name: String = ""` in a primary constructor.
fn constructor_property(raw: &str, line: usize, data: bool) -> Option<FieldDecl> {
    let (annotations, rest) = split_param(raw, AnnotationSyntax::At, line);
    let (modifiers, rest) = strip_words(&rest, MODIFIERS);
    if modifiers.contains(&"private") {
        return None;
    }
    let (binding, rest) = strip_words(rest, &["val", "var"]);
    if binding.is_empty() && !data {
        return None;
    }
    let (name, ty, default) = name_type_default(rest)?;
    let mut field = FieldDecl::new(name, ty, shape(ty), line).with_default(default.map(String::from));
    field.annotations = annotations;
    Some(field)
}

/// `name: Type = default`, type and default optional.
fn name_type_default(text: &str) -> Option<(&str, &str, Option<&str>)> {
    let (left, default) = split_default(text);
    let (name, ty) = match left.split_once(':') {
        Some((name, ty)) => (name.trim(), ty.trim()),
        None => (left.trim(), ""),
    };
    let ty = ty.split(" by ").next().unwrap_or(ty).trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '`') {
        return None;
    }
    Some((name.trim_matches('`'), ty, default))
}

fn add_member(decl: &mut TypeDecl, member: &Member) {
    let (modifiers, rest) = strip_words(&member.decl, MODIFIERS);
    let visibility = if modifiers.contains(&"private") {
        Visibility::Private
    } else if modifiers.contains(&"protected") {
        Visibility::Protected
    } else if modifiers.contains(&"internal") {
        Visibility::Internal
    } else {
        Visibility::Public
    };

    if let Some(signature) = rest.strip_prefix("fun ") {
        let signature = skip_generics(signature);
        let Some((head, params, tail)) = call_split(signature) else {
            return;
        };
        // extension receivers: fun String.slug()
        let name = head.rsplit('.').next().unwrap_or(head).trim();
        let mut method = MethodDecl::new(name, member.line);
        method.return_type = tail
            .strip_prefix(':')
            .map(|t| t.split(['=', '{']).next().unwrap_or(t).split(" where ").next().unwrap_or(t).trim().to_string())
            .filter(|t| !t.is_empty());
        method.is_async = modifiers.contains(&"suspend");
        method.visibility = visibility;
        method.annotations = member.annotations.clone();
        method.params = parse_params(params, member.line);
        method.owner = Some(decl.name.clone());
        decl.methods.push(method);
        return;
    }

    let (binding, rest) = strip_words(rest, &["val", "var"]);
    if binding.is_empty() || visibility == Visibility::Private || modifiers.contains(&"const") {
        return;
    }
    let Some((name, ty, default)) = name_type_default(rest) else {
        return;
    };
    let mut field = FieldDecl::new(name, ty, shape(ty), member.line).with_default(default.map(String::from));
    field.annotations = member.annotations.clone();
    decl.fields.push(field);
}

fn parse_params(params: &str, line: usize) -> Vec<Param> {
    split_top_level(params, b',')
        .into_iter()
        .filter_map(|raw| {
            let (annotations, rest) = split_param(&raw, AnnotationSyntax::At, line);
            let (_, rest) = strip_words(&rest, MODIFIERS);
            let (name, ty, default) = name_type_default(rest)?;
            let mut param = Param::new(name, ty).with_default(default.map(String::from));
            if shape(ty).optional {
                param.required = false;
            }
            param.annotations = annotations;
            Some(param)
        })
        .collect()
}

/// Ktor `routing { route("/api") { get("/x") { } } }` blocks.
fn ktor_routes(text: &Text, routes: &mut Vec<RouteFact>) {
    let mut scopes: Vec<(usize, usize, String)> = Vec::new();
    for cap in KTOR_CALL.captures_iter(&text.clean) {
        let (Some(verb), Some(open)) = (cap.name("verb"), cap.name("open")) else {
            continue;
        };
        let (path, after_args) = if open.as_str() == "(" {
            let Some((args, close)) = text.call_args(open.start()) else {
                continue;
            };
            // get<Resource> and get(key) on maps have no string path
            match args.first().and_then(|a| string_literal(a)) {
                Some(path) => (path, close + 1),
                None => continue,
            }
        } else {
            (String::new(), open.start())
        };
        let Some(block) = brace_block(&text.clean, after_args, b";\n") else {
            continue;
        };
        let at = verb.start();
        let prefix: String = scopes
            .iter()
            .filter(|(start, end, _)| *start <= at && at < *end)
            .map(|(_, _, p)| p.trim_matches('/'))
            .filter(|p| !p.is_empty())
            .map(|p| format!("/{}", p))
            .collect();

        if verb.as_str() == "route" {
            scopes.push((block.start, block.end, path));
            continue;
        }
        let Some(method) = HttpMethod::parse(verb.as_str()) else {
            continue;
        };
        routes.push(
            RouteFact::new(method, path, LAMBDA, PathSyntax::Canonical, text.line(at))
                .with_group(Some(prefix)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(code: &str) -> SourceUnit {
        scan(Path::new("App.kt"), code)
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
    fn test_data_classes() {
        let unit = parse(
            r#"
package com.example.dto

import kotlinx.serialization.Serializable

@Serializable
data class User(
    val id: Long,
    @SerialName("display_name") val name: String,
    val email: String? = null,
    val tags: List<String> = emptyList(),
)

class Account(private val secret: String, val owner: User) : Entity(), Auditable {
    var balance: Double = 0.0
    private val cache = mutableMapOf<String, Any>()
    val label: String
        get() = owner.name

    suspend fun refresh(force: Boolean = false): Account {
        return this
    }
}

enum class Role { ADMIN, USER }
"#,
        );
        let user = unit.find_type("User").unwrap();
        assert_eq!(user.kind, DeclKind::Record);
        assert_eq!(user.namespace.as_deref(), Some("com.example.dto"));
        let names: Vec<&str> = user.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "email", "tags"]);
        assert_eq!(user.fields[1].annotations[0].name, "SerialName");
        assert!(user.fields[0].is_required());
        assert!(!user.fields[2].is_required());

        let account = unit.find_type("Account").unwrap();
        assert_eq!(account.supertypes, vec!["Entity", "Auditable"]);
        let names: Vec<&str> = account.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["owner", "balance", "label"]);
        let refresh = &account.methods[0];
        assert_eq!(refresh.name, "refresh");
        assert!(refresh.is_async);
        assert_eq!(refresh.return_type.as_deref(), Some("Account"));
        assert!(!refresh.params[0].required);

        assert_eq!(unit.find_type("Role").unwrap().variants, vec!["ADMIN", "USER"]);
    }

    #[test]
    fn test_spring_kotlin_controller() {
        let unit = parse(
            r#"
@RestController
@RequestMapping("/api/books")
class BookController(private val service: BookService) {
    @GetMapping("/{id}")
    fun get(@PathVariable id: Long): BookDto = service.get(id)

    @PostMapping
    suspend fun create(@RequestBody body: CreateBook): BookDto {
        return service.create(body)
    }
}
"#,
        );
        assert_eq!(
            routes(&unit),
            vec![
                (HttpMethod::Get, "/api/books/{id}".to_string(), "get".to_string()),
                (HttpMethod::Post, "/api/books".to_string(), "create".to_string()),
            ]
        );
        let controller = unit.find_type("BookController").unwrap();
        assert!(controller.fields.is_empty());
        assert_eq!(controller.methods[0].params[0].annotations[0].name, "PathVariable");
    }

    #[test]
    fn test_ktor_routing() {
        let unit = parse(
            r#"
import io.ktor.server.routing.*

fun Application.module() {
    routing {
        get("/health") { call.respondText("ok") }
        route("/api") {
            route("/users") {
                get { call.respond(users) }
                get("/{id}") {
                    val id = call.parameters["id"]
                    val cached = cache.get(id)
                }
                post { }
            }
        }
    }
}
"#,
        );
        assert_eq!(
            routes(&unit),
            vec![
                (HttpMethod::Get, "/health".to_string(), LAMBDA.to_string()),
                (HttpMethod::Get, "/api/users".to_string(), LAMBDA.to_string()),
                (HttpMethod::Get, "/api/users/{id}".to_string(), LAMBDA.to_string()),
                (HttpMethod::Post, "/api/users".to_string(), LAMBDA.to_string()),
            ]
        );
    }
}
