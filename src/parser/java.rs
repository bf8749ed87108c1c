//! Java scanner: classes, records, enums, Spring and JAX-RS controllers.

use super::clike::{
    call_split, enum_constants, leading_parens, members, skip_generics, split_default, split_param,
    strip_words, type_and_name, type_spans, Member, Text, TypeSpan,
};
use super::jvm;
use crate::lexer::{split_top_level, AnnotationSyntax, CommentStyle};
use crate::model::{DeclKind, FieldDecl, MethodDecl, Param, SourceUnit, TypeDecl, Visibility};
use crate::parser::Language;
use crate::type_map::java::{shape, strip_modifiers};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

crate::parser::scanner_backend!(JavaBackend, Language::Java, java);

static TYPE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^@\w.])(?P<kind>class|interface|enum|record)\s+(?P<name>[A-Za-z_]\w*)").unwrap()
});
static PACKAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*package\s+([\w.]+)\s*;").unwrap());
static IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*import\s+(?:static\s+)?([\w.*]+)\s*;").unwrap());

const MODIFIERS: &[&str] = &[
    "public", "private", "protected", "static", "final", "abstract", "synchronized", "native",
    "transient", "volatile", "default", "strictfp", "sealed",
];
const NESTED: &[&str] = &["class", "interface", "enum", "record", "non"];

fn kind_of(keyword: &str) -> Option<DeclKind> {
    Some(match keyword {
        "class" => DeclKind::Class,
        "interface" => DeclKind::Interface,
        "enum" => DeclKind::Enum,
        "record" => DeclKind::Record,
        _ => return None,
    })
}

pub fn scan(path: &Path, content: &str) -> SourceUnit {
    let text = Text::new(content, CommentStyle::CLike);
    let mut unit = SourceUnit::new(path, Language::Java, content);
    let package = PACKAGE.captures(&text.clean).map(|c| c[1].to_string());
    unit.imports = IMPORT.captures_iter(&text.clean).map(|c| c[1].to_string()).collect();

    for span in type_spans(&text, &TYPE_DECL, b";", AnnotationSyntax::At, kind_of) {
        if let Some(decl) = type_decl(&text, &span, package.as_deref()) {
            jvm::annotated_routes(&decl, &mut unit.routes);
            unit.types.push(decl);
        }
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

    let mut header = skip_generics(&span.header);
    if let Some((components, rest)) = leading_parens(header) {
        for param in parse_params(components, span.line) {
            let mut field = FieldDecl::new(&param.name, &param.raw_type, shape(&param.raw_type), span.line);
            field.annotations = param.annotations;
            decl.fields.push(field);
        }
        header = rest;
    }
    decl.supertypes = supertypes(header);

    let Some(body) = span.body else {
        return Some(decl);
    };
    if decl.kind == DeclKind::Enum {
        decl.variants = enum_constants(body.body(&text.masked), AnnotationSyntax::At);
        return Some(decl);
    }
    let interface = decl.kind == DeclKind::Interface;
    for member in members(text, &body, AnnotationSyntax::At, false) {
        add_member(&mut decl, &member, interface);
    }
    Some(decl)
}

/// Names after `extends` and `implements`, generic arguments kept.
fn supertypes(header: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = header;
    while let Some(pos) = find_keyword(rest) {
        let after = &rest[pos..];
        let after = after
            .strip_prefix("extends")
            .or_else(|| after.strip_prefix("implements"))
            .or_else(|| after.strip_prefix("permits"))
            .unwrap_or(after);
        let end = find_keyword(after).unwrap_or(after.len());
        if !rest[pos..].starts_with("permits") {
            out.extend(split_top_level(&after[..end], b','));
        }
        rest = &after[end..];
    }
    out
}

fn find_keyword(text: &str) -> Option<usize> {
    ["extends", "implements", "permits"]
        .iter()
        .filter_map(|k| {
            text.match_indices(k)
                .find(|(i, _)| {
                    let before = text[..*i].chars().last().map_or(true, |c| c.is_whitespace());
                    let after = text[i + k.len()..].chars().next().map_or(true, |c| c.is_whitespace());
                    before && after
                })
                .map(|(i, _)| i)
        })
        .min()
}

fn visibility(modifiers: &[&str], interface: bool) -> Visibility {
    if modifiers.contains(&"public") || interface {
        Visibility::Public
    } else if modifiers.contains(&"protected") {
        Visibility::Protected
    } else if modifiers.contains(&"private") {
        Visibility::Private
    } else {
        Visibility::Internal
    }
}

fn add_member(decl: &mut TypeDecl, member: &Member, interface: bool) {
    let (modifiers, rest) = strip_words(&member.decl, MODIFIERS);
    let first_word = rest.split(|c: char| !c.is_alphanumeric()).next().unwrap_or("");
    if NESTED.contains(&first_word) {
        return;
    }

    if let Some((head, params, _)) = call_split(rest) {
        let head = skip_generics(head);
        let Some((return_type, name)) = type_and_name(head) else {
            return;
        };
        let mut method = MethodDecl::new(name, member.line);
        method.return_type = Some(return_type.to_string());
        method.visibility = visibility(&modifiers, interface);
        method.is_async = return_type.starts_with("CompletableFuture")
            || return_type.starts_with("Mono")
            || return_type.starts_with("Flux");
        method.annotations = member.annotations.clone();
        method.params = parse_params(params, member.line);
        method.owner = Some(decl.name.clone());
        decl.methods.push(method);
        return;
    }

    if modifiers.contains(&"static") || interface {
        return;
    }
    // int a, b = 2;
    let declarators = split_top_level(rest, b',');
    let Some(first) = declarators.first() else {
        return;
    };
    let (left, default) = split_default(first);
    let Some((ty, name)) = type_and_name(left) else {
        return;
    };
    let ty = normalize_array(ty, name);
    let mut names = vec![(name.trim_end_matches("[]").to_string(), default.map(String::from))];
    for extra in &declarators[1..] {
        let (n, d) = split_default(extra);
        names.push((n.to_string(), d.map(String::from)));
    }
    for (name, default) in names {
        let mut field = FieldDecl::new(&name, &ty, shape(&ty), member.line).with_default(default);
        field.annotations = member.annotations.clone();
        decl.fields.push(field);
    }
}

/// `String names[]` is `String[] names`; varargs are arrays.
fn normalize_array(ty: &str, name: &str) -> String {
    let ty = ty.replace("...", "[]");
    if name.ends_with("[]") {
        format!("{}[]", ty)
    } else {
        ty
    }
}

fn parse_params(params: &str, line: usize) -> Vec<Param> {
    split_top_level(params, b',')
        .into_iter()
        .filter_map(|raw| {
            let (annotations, rest) = split_param(&raw, AnnotationSyntax::At, line);
            let rest = strip_modifiers(&rest);
            let (ty, name) = type_and_name(&rest)?;
            let ty = normalize_array(ty, name);
            let mut param = Param::new(name.trim_end_matches("[]"), ty.as_str());
            param.required = !shape(&ty).optional;
            param.annotations = annotations;
            Some(param)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HttpMethod, TypeKind};
    use pretty_assertions::assert_eq;

    fn parse(code: &str) -> SourceUnit {
        scan(Path::new("Test.java"), code)
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
    fn test_entity_fields() {
        let unit = parse(
            r#"
package com.example.model;

import java.util.List;
import jakarta.validation.constraints.NotNull;

@Entity
public class User extends BaseEntity implements Serializable {
    private static final long serialVersionUID = 1L;

    @Id
    private Long id;

    @NotNull
    @JsonProperty("user_name")
    private String name;

    private List<String> roles = new ArrayList<>();
    private Optional<String> nickname;
    private int x, y;

    public String getName() { return name; }
}
"#,
        );
        assert_eq!(unit.imports, vec!["java.util.List", "jakarta.validation.constraints.NotNull"]);
        let user = unit.find_type("User").unwrap();
        assert_eq!(user.namespace.as_deref(), Some("com.example.model"));
        assert_eq!(user.supertypes, vec!["BaseEntity", "Serializable"]);
        assert!(user.has_annotation("Entity"));
        let names: Vec<&str> = user.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "roles", "nickname", "x", "y"]);
        assert_eq!(user.fields[1].annotations.len(), 2);
        assert_eq!(user.fields[1].line, 16);
        assert_eq!(user.fields[2].kind, TypeKind::Sequence);
        assert!(!user.fields[3].is_required());
        assert_eq!(user.methods.len(), 1);
    }

    #[test]
    fn test_records_and_enums() {
        let unit = parse(
            "public record Point(@JsonProperty(\"px\") int x, int y) implements Shape {}\nenum Color { RED, GREEN, BLUE; int code; }\n@interface Marker {}\n",
        );
        let point = unit.find_type("Point").unwrap();
        assert_eq!(point.kind, DeclKind::Record);
        assert_eq!(point.fields.len(), 2);
        assert_eq!(point.fields[0].annotations[0].name, "JsonProperty");
        assert_eq!(point.supertypes, vec!["Shape"]);
        assert_eq!(unit.find_type("Color").unwrap().variants, vec!["RED", "GREEN", "BLUE"]);
        assert!(unit.find_type("Marker").is_none());
    }

    #[test]
    fn test_spring_controller() {
        let unit = parse(
            r#"
@RestController
@RequestMapping("/api/users")
public class UserController {
    @GetMapping
    public List<UserDto> list(@RequestParam(required = false) String q) { return null; }

    @GetMapping("/{id}")
    public ResponseEntity<UserDto> get(@PathVariable("id") Long id) { return null; }

    @PostMapping(value = "/", consumes = "application/json")
    public UserDto create(@Valid @RequestBody CreateUser body) { return null; }

    @RequestMapping(value = "/{id}", method = RequestMethod.DELETE)
    public void delete(@PathVariable Long id) { }

    private void helper() { }
}
"#,
        );
        assert_eq!(
            routes(&unit),
            vec![
                (HttpMethod::Get, "/api/users".to_string(), "list".to_string()),
                (HttpMethod::Get, "/api/users/{id}".to_string(), "get".to_string()),
                (HttpMethod::Post, "/api/users".to_string(), "create".to_string()),
                (HttpMethod::Delete, "/api/users/{id}".to_string(), "delete".to_string()),
            ]
        );
        let controller = unit.find_type("UserController").unwrap();
        let create = controller.methods.iter().find(|m| m.name == "create").unwrap();
        assert_eq!(create.params[0].name, "body");
        assert_eq!(create.params[0].raw_type, "CreateUser");
        let names: Vec<&str> = create.params[0].annotations.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Valid", "RequestBody"]);
    }

    #[test]
    fn test_jaxrs_resource() {
        let unit = parse(
            r#"
@Path("/orders")
@Produces(MediaType.APPLICATION_JSON)
public class OrderResource {
    @GET
    public List<Order> all() { return null; }

    @GET
    @Path("{id: \\d+}")
    public Order one(@PathParam("id") long id) { return null; }

    @PUT
    @Path("/{id}")
    public Order update(@PathParam("id") long id, Order order) { return null; }
}
"#,
        );
        assert_eq!(
            routes(&unit),
            vec![
                (HttpMethod::Get, "/orders".to_string(), "all".to_string()),
                (HttpMethod::Get, "/orders/{id}".to_string(), "one".to_string()),
                (HttpMethod::Put, "/orders/{id}".to_string(), "update".to_string()),
            ]
        );
    }
}
