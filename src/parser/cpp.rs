//! C++ scanner: Crow and Pistache route registrations, struct/class members.

use super::clike::{
    call_split, colon_bases, members, split_default, strip_words, type_and_name, type_spans, Member, Text, TypeSpan,
};
use crate::lexer::{find_matching, split_top_level, string_literal, AnnotationSyntax, CommentStyle};
use crate::model::{DeclKind, FieldDecl, HttpMethod, MethodDecl, Param, RouteFact, SourceUnit, TypeDecl, Visibility, LAMBDA};
use crate::parser::Language;
use crate::path::PathSyntax;
use crate::type_map::cpp::shape;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

crate::parser::scanner_backend!(CppBackend, Language::Cpp, cpp);

static TYPE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\w:])(?P<kind>struct|class|enum\s+class|enum\s+struct|enum)\s+(?P<name>[A-Za-z_]\w*)").unwrap()
});
static NAMESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bnamespace\s+([\w:]+)\s*\{").unwrap());
static INCLUDE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?m)^\s*#\s*include\s*[<"]([^>"]+)[>"]"#).unwrap());
static CROW_ROUTE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bCROW_(?P<bp>BP_)?ROUTE\s*\(").unwrap());
static BLUEPRINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bBlueprint\s+(?P<var>\w+)\s*[({]\s*"(?P<prefix>[^"]*)""#).unwrap());
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\.\s*(?P<name>\w+)\s*(?:<[^>]*>)?\s*\(").unwrap());
static PISTACHE_ROUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bRoutes\s*::\s*(?P<verb>Get|Post|Put|Delete|Patch|Options|Head)\s*\(").unwrap());

const ACCESS: &[&str] = &["public", "protected", "private"];
const SPECIFIERS: &[&str] = &[
    "virtual", "inline", "explicit", "constexpr", "consteval", "friend", "extern", "mutable", "static",
];

fn kind_of(keyword: &str) -> Option<DeclKind> {
    Some(match keyword {
        "struct" => DeclKind::Struct,
        "class" => DeclKind::Class,
        "enum" | "enum class" | "enum struct" => DeclKind::Enum,
        _ => return None,
    })
}

pub fn scan(path: &Path, content: &str) -> SourceUnit {
    let mut unit = SourceUnit::new(path, Language::Cpp, content);
    let text = Text::new(content, CommentStyle::CLike);
    unit.imports = INCLUDE.captures_iter(&text.masked).map(|c| c[1].to_string()).collect();

    let namespaces: Vec<(usize, usize, String)> = NAMESPACE
        .captures_iter(&text.clean)
        .filter_map(|c| {
            let all = c.get(0)?;
            let close = find_matching(&text.clean, all.end() - 1).unwrap_or(text.clean.len());
            Some((all.end(), close, c[1].to_string()))
        })
        .collect();

    for span in type_spans(&text, &TYPE_DECL, b";", AnnotationSyntax::At, kind_of) {
        // `template <class T>` parameters and forward declarations
        let before = text.clean[..span.start].trim_end();
        if before.ends_with(['<', ',']) || span.body.is_none() {
            continue;
        }
        let namespace = namespaces
            .iter()
            .filter(|(start, end, _)| *start <= span.start && span.start < *end)
            .map(|(_, _, ns)| ns.as_str())
            .collect::<Vec<_>>()
            .join("::");
        let namespace = match (&span.outer, namespace.is_empty()) {
            (Some(outer), true) => Some(outer.clone()),
            (Some(outer), false) => Some(format!("{}::{}", namespace, outer)),
            (None, true) => None,
            (None, false) => Some(namespace),
        };
        if let Some(decl) = type_decl(&text, &span, namespace) {
            unit.types.push(decl);
        }
    }

    crow_routes(&text, &mut unit.routes);
    pistache_routes(&text, &mut unit.routes);
    debug!("{} routes in {}", unit.routes.len(), path.display());
    unit
}

fn type_decl(text: &Text, span: &TypeSpan, namespace: Option<String>) -> Option<TypeDecl> {
    let mut decl = TypeDecl::new(&span.name, span.kind, span.line)?.with_namespace(namespace);
    let header = span.header.trim_start_matches("final").trim();
    decl.supertypes = colon_bases(header)
        .into_iter()
        .map(|base| {
            let (_, rest) = strip_words(&base, &["public", "protected", "private", "virtual"]);
            rest.to_string()
        })
        .filter(|b| !b.is_empty())
        .collect();
    let body = span.body?;

    if decl.kind == DeclKind::Enum {
        decl.variants = split_top_level(body.body(&text.clean), b',')
            .iter()
            .map(|v| split_default(v).0.to_string())
            .filter(|v| !v.is_empty())
            .collect();
        return Some(decl);
    }

    let mut visibility = if decl.kind == DeclKind::Class {
        Visibility::Private
    } else {
        Visibility::Public
    };
    for member in members(text, &body, AnnotationSyntax::At, false) {
        let mut decl_text = member.decl.as_str();
        // `public:` labels prefix the statement that follows them
        loop {
            let (words, rest) = strip_words(decl_text, ACCESS);
            let Some(label) = words.last() else {
                break;
            };
            let Some(after) = rest.strip_prefix(':') else {
                break;
            };
            visibility = match *label {
                "public" => Visibility::Public,
                "protected" => Visibility::Protected,
                _ => Visibility::Private,
            };
            decl_text = after.trim_start();
        }
        add_member(text, &mut decl, decl_text, &member, visibility);
    }
    Some(decl)
}

fn add_member(source: &Text, decl: &mut TypeDecl, text: &str, member: &Member, visibility: Visibility) {
    let first = text.split_whitespace().next().unwrap_or("");
    if matches!(
        first,
        "" | "using" | "typedef" | "static_assert" | "template" | "enum" | "struct" | "class" | "union"
    ) || text.starts_with('~')
        || text.contains("operator")
    {
        return;
    }
    let (specifiers, rest) = strip_words(text, SPECIFIERS);
    if specifiers.iter().any(|s| matches!(*s, "static" | "friend")) {
        return;
    }

    if let Some((head, params, tail)) = call_split(rest) {
        // constructors have no return type
        let Some((ret, name)) = type_and_name(head) else {
            return;
        };
        let mut method = MethodDecl::new(name, member.line);
        method.params = parse_params(params);
        method.return_type = (ret != "void").then(|| ret.to_string());
        method.is_async = ret.contains("future<");
        method.visibility = visibility;
        method.owner = Some(decl.name.clone());
        if !tail.ends_with("delete") {
            decl.methods.push(method);
        }
        return;
    }
    if visibility != Visibility::Public {
        return;
    }

    // `int a, b;` `std::vector<int> v = {}` `char name[16];` `int flags : 3;`
    let (left, mut default) = split_default(rest);
    if default == Some("") {
        default = None;
    }
    let brace_init = member.body.map(|b| format!("{{{}}}", source.slice(b.start, b.end).trim()));
    let default = default.map(String::from).or(brace_init);
    let mut declarators = split_top_level(left, b',').into_iter();
    let Some(first) = declarators.next() else {
        return;
    };
    let Some((ty, name)) = declarator(strip_bitfield(&first)) else {
        return;
    };
    push_field(decl, name, &ty, default, member);
    for extra in declarators {
        let name = strip_bitfield(&extra).trim_start_matches(['*', '&']).split('[').next().unwrap_or("").trim();
        push_field(decl, name.to_string(), &ty, None, member);
    }
}

/// `int flags : 3` -> `int flags`; `std::string` keeps its scope operator.
fn strip_bitfield(text: &str) -> &str {
    let bytes = text.as_bytes();
    for (i, &c) in bytes.iter().enumerate() {
        let prev = if i > 0 { bytes[i - 1] } else { b' ' };
        let next = bytes.get(i + 1).copied().unwrap_or(b' ');
        if c == b':' && prev != b':' && next != b':' {
            return text[..i].trim();
        }
    }
    text.trim()
}

/// `const char* name[16]` -> (`const char*`, `name`)
fn declarator(text: &str) -> Option<(String, String)> {
    let text = text.split('[').next().unwrap_or(text);
    let (ty, name) = type_and_name(text)?;
    let stars: String = name.chars().take_while(|c| matches!(c, '*' | '&')).collect();
    let name = name[stars.len()..].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    Some((format!("{}{}", ty, stars), name.to_string()))
}

fn push_field(decl: &mut TypeDecl, name: String, ty: &str, default: Option<String>, member: &Member) {
    if name.is_empty() {
        return;
    }
    let mut field = FieldDecl::new(name, ty, shape(ty), member.line).with_default(default);
    field.annotations = member.annotations.clone();
    decl.fields.push(field);
}

fn parse_params(params: &str) -> Vec<Param> {
    split_top_level(params, b',')
        .into_iter()
        .filter(|p| p.trim() != "void")
        .filter_map(|raw| {
            let (left, default) = split_default(&raw);
            let (ty, name) = declarator(left)?;
            let mut param = Param::new(name, ty.as_str()).with_default(default.map(String::from));
            if shape(&ty).optional {
                param.required = false;
            }
            Some(param)
        })
        .collect()
}

/// `&Ns::Handler::method` -> (`method`, `Handler`); lambdas -> `lambda`.
fn handler_ref(raw: &str) -> (String, Option<String>) {
    let raw = raw.trim();
    if raw.starts_with('[') {
        return (LAMBDA.to_string(), None);
    }
    let raw = raw.trim_start_matches('&').trim();
    let mut parts: Vec<&str> = raw.split("::").map(str::trim).filter(|p| !p.is_empty()).collect();
    let name = parts.pop().unwrap_or(raw).to_string();
    (name, parts.pop().map(String::from))
}

/// `CROW_ROUTE(app, "/users/<int>").methods("GET"_method)(handler)` and
/// `CROW_BP_ROUTE(bp, "/x")` with the prefix of `crow::Blueprint bp("api")`.
fn crow_routes(text: &Text, routes: &mut Vec<RouteFact>) {
    let blueprints: HashMap<String, String> = BLUEPRINT
        .captures_iter(&text.masked)
        .map(|c| (c["var"].to_string(), c["prefix"].to_string()))
        .collect();

    for cap in CROW_ROUTE.captures_iter(&text.clean) {
        let Some(all) = cap.get(0) else {
            continue;
        };
        let Some((args, close)) = text.call_args(all.end() - 1) else {
            continue;
        };
        let Some(path) = args.get(1).and_then(|p| string_literal(p)) else {
            continue;
        };
        let group = if cap.name("bp").is_some() {
            args.first().and_then(|bp| blueprints.get(bp.trim())).cloned()
        } else {
            None
        };

        let mut methods = Vec::new();
        let mut cursor = close + 1;
        while let Some(link) = LINK.captures(&text.clean[cursor..]) {
            let (Some(name), Some(whole)) = (link.name("name"), link.get(0)) else {
                break;
            };
            let open = cursor + whole.end() - 1;
            let Some((link_args, link_close)) = text.call_args(open) else {
                break;
            };
            if name.as_str() == "methods" {
                methods.extend(link_args.iter().filter_map(|m| crow_method(m)));
            }
            cursor = link_close + 1;
        }
        let rest = &text.clean[cursor..];
        let handler = if rest.trim_start().starts_with('(') {
            let open = cursor + (rest.len() - rest.trim_start().len());
            text.call_args(open).and_then(|(a, _)| a.into_iter().next())
        } else {
            None
        };
        let (handler, owner) = match handler {
            Some(h) => handler_ref(&h),
            None => (LAMBDA.to_string(), None),
        };
        if methods.is_empty() {
            methods.push(HttpMethod::Get);
        }
        let line = text.line(all.start());
        for method in methods {
            routes.push(
                RouteFact::new(method, path.as_str(), handler.as_str(), PathSyntax::Angle, line)
                    .with_owner(owner.clone())
                    .with_group(group.clone()),
            );
        }
    }
}

/// `"GET"_method`, `crow::HTTPMethod::Post`, `HTTPMethod::POST`
fn crow_method(raw: &str) -> Option<HttpMethod> {
    let raw = raw.trim();
    if let Some(literal) = raw.strip_suffix("_method") {
        return string_literal(literal).and_then(|m| HttpMethod::parse(&m));
    }
    raw.rsplit("::").next().and_then(HttpMethod::parse)
}

/// `Routes::Get(router, "/users/:id", Routes::bind(&UserEndpoint::get, this))`
fn pistache_routes(text: &Text, routes: &mut Vec<RouteFact>) {
    for cap in PISTACHE_ROUTE.captures_iter(&text.clean) {
        let (Some(verb), Some(all)) = (cap.name("verb"), cap.get(0)) else {
            continue;
        };
        let Some(method) = HttpMethod::parse(verb.as_str()) else {
            continue;
        };
        let Some((args, _)) = text.call_args(all.end() - 1) else {
            continue;
        };
        let Some(path) = args.get(1).and_then(|p| string_literal(p)) else {
            continue;
        };
        let target = args.get(2).map(|h| h.trim()).unwrap_or("");
        let target = match target.find("bind") {
            Some(at) => {
                let inner = &target[at + 4..];
                let inner = inner.trim_start();
                match inner.strip_prefix('(').and_then(|i| i.strip_suffix(')')) {
                    Some(bound) => split_top_level(bound, b',').into_iter().next().unwrap_or_default(),
                    None => inner.to_string(),
                }
            }
            None => target.to_string(),
        };
        let (handler, owner) = if target.is_empty() {
            (LAMBDA.to_string(), None)
        } else {
            handler_ref(&target)
        };
        routes.push(
            RouteFact::new(method, path, handler, PathSyntax::Colon, text.line(all.start())).with_owner(owner),
        );
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
    fn test_crow_routes() {
        let unit = scan(
            Path::new("src/main.cpp"),
            r#"#include "crow.h"

int main() {
    crow::SimpleApp app;
    crow::Blueprint bp("api");

    CROW_ROUTE(app, "/")([]() { return "Hello"; });
    CROW_ROUTE(app, "/users/<int>")
        .methods("GET"_method, "DELETE"_method)
    (getUser);
    CROW_ROUTE(app, "/add/<int>/<int>").methods(crow::HTTPMethod::Post)([](int a, int b) { return a + b; });
    CROW_BP_ROUTE(bp, "/items/<string>")(&ItemHandler::show);
    app.register_blueprint(bp);
}
"#,
        );
        assert_eq!(unit.imports, vec!["crow.h"]);
        let owner = |s: &str| Some(s.to_string());
        assert_eq!(
            routes(&unit),
            vec![
                (HttpMethod::Get, "/".to_string(), "lambda".to_string(), None),
                (HttpMethod::Get, "/users/{param1}".to_string(), "getUser".to_string(), None),
                (HttpMethod::Delete, "/users/{param1}".to_string(), "getUser".to_string(), None),
                (HttpMethod::Post, "/add/{param1}/{param2}".to_string(), "lambda".to_string(), None),
                (HttpMethod::Get, "/api/items/{param1}".to_string(), "show".to_string(), owner("ItemHandler")),
            ]
        );
        assert_eq!(unit.routes[1].line, 8);
    }

    #[test]
    fn test_pistache_routes() {
        let unit = scan(
            Path::new("src/endpoint.cpp"),
            r#"void UserEndpoint::setupRoutes() {
    using namespace Rest;
    Routes::Get(router, "/users/:id", Routes::bind(&UserEndpoint::getUser, this));
    Routes::Post(router, "/users", Routes::bind(&UserEndpoint::createUser, this));
    Rest::Routes::Get(router, "/ready", Routes::bind(&Generic::handleReady));
}
"#,
        );
        let owner = |s: &str| Some(s.to_string());
        assert_eq!(
            routes(&unit),
            vec![
                (HttpMethod::Get, "/users/{id}".to_string(), "getUser".to_string(), owner("UserEndpoint")),
                (HttpMethod::Post, "/users".to_string(), "createUser".to_string(), owner("UserEndpoint")),
                (HttpMethod::Get, "/ready".to_string(), "handleReady".to_string(), owner("Generic")),
            ]
        );
    }

    #[test]
    fn test_structs_and_classes() {
        let unit = scan(
            Path::new("include/models.hpp"),
            r#"#include <string>
#include <optional>

namespace app {

template <class T>
struct Page {
    std::vector<T> items;
};

struct User {
    int id;
    std::string name;
    std::optional<std::string> email;
    std::vector<std::string> tags = {};
    static int count;
    User() = default;
    std::string display() const { return name; }
};

class Account : public Base {
public:
    double balance;
    void deposit(double amount, const std::string& memo = "");
private:
    std::string secret;
};

enum class Role { Admin, Member = 2 };

class Forward;

}
"#,
        );
        assert_eq!(unit.imports, vec!["string", "optional"]);
        let names: Vec<&str> = unit.types.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Page", "User", "Account", "Role"]);

        let user = unit.find_type("User").unwrap();
        assert_eq!(user.namespace.as_deref(), Some("app"));
        let fields: Vec<(&str, &str, bool)> = user
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.raw_type.as_str(), f.is_required()))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("id", "int", true),
                ("name", "std::string", true),
                ("email", "std::optional<std::string>", false),
                ("tags", "std::vector<std::string>", false),
            ]
        );
        assert_eq!(user.methods.len(), 1);
        assert_eq!(user.methods[0].name, "display");

        let account = unit.find_type("Account").unwrap();
        assert_eq!(account.supertypes, vec!["Base"]);
        let fields: Vec<&str> = account.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fields, vec!["balance"]);
        let deposit = &account.methods[0];
        let params: Vec<(&str, &str, bool)> = deposit
            .params
            .iter()
            .map(|p| (p.name.as_str(), p.raw_type.as_str(), p.required))
            .collect();
        assert_eq!(params, vec![("amount", "double", true), ("memo", "const std::string&", false)]);
        assert_eq!(unit.find_type("Role").unwrap().variants, vec!["Admin", "Member"]);
    }
}
