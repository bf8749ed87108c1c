//! Scala scanner: Play `conf/routes` files, case classes and class members.

use super::clike::{
    annotation_prefix, leading_parens, members, split_default, split_param, strip_call, strip_words,
    type_spans, Member, Text, TypeSpan,
};
use crate::lexer::{find_matching, split_top_level, AnnotationSyntax, CommentStyle};
use crate::model::{DeclKind, FieldDecl, HttpMethod, MethodDecl, Param, RouteFact, SourceUnit, TypeDecl, Visibility};
use crate::parser::Language;
use crate::path::PathSyntax;
use crate::type_map::scala::shape;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

crate::parser::scanner_backend!(ScalaBackend, Language::Scala, scala);

static TYPE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\w.])(?P<kind>(?:case\s+)?class|(?:case\s+)?object|trait|enum)\s+(?P<name>[A-Za-z_]\w*)")
        .unwrap()
});
/// A header continued on the next line: `class A(...)\n  extends B {`
static CONTINUED_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*(?:extends|with)\b").unwrap());
static PACKAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*package\s+([\w.]+)").unwrap());
static IMPORT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*import\s+([\w.{}, _]+)").unwrap());
static ROUTE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<verb>GET|POST|PUT|DELETE|PATCH|HEAD|OPTIONS)\s+(?P<path>\S+)\s+(?P<target>.+?)\s*$").unwrap()
});
static INCLUDE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^->\s+\S+\s+(?P<router>\S+)").unwrap());

const MODIFIERS: &[&str] = &[
    "override", "private", "protected", "final", "lazy", "implicit", "abstract", "sealed", "val", "var",
];

fn kind_of(keyword: &str) -> Option<DeclKind> {
    Some(match keyword {
        "case class" => DeclKind::Record,
        "class" => DeclKind::Class,
        "trait" => DeclKind::Interface,
        "object" | "case object" => DeclKind::Module,
        "enum" => DeclKind::Enum,
        _ => return None,
    })
}

fn is_routes_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n == "routes" || n.ends_with(".routes"))
}

pub fn scan(path: &Path, content: &str) -> SourceUnit {
    let mut unit = SourceUnit::new(path, Language::Scala, content);
    if is_routes_file(path) {
        play_routes(content, &mut unit);
        debug!("{} Play routes in {}", unit.routes.len(), path.display());
        return unit;
    }

    let mut text = Text::new(content, CommentStyle::CLike);
    // Offsets stay put: only the newline before `extends`/`with` is blanked.
    let joins: Vec<usize> = CONTINUED_HEADER.find_iter(&text.clean).map(|m| m.start()).collect();
    let mut clean = std::mem::take(&mut text.clean).into_bytes();
    for at in joins {
        clean[at] = b' ';
    }
    text.clean = String::from_utf8_lossy(&clean).into_owned();

    let package = PACKAGE.captures(&text.clean).map(|c| c[1].to_string());
    unit.imports = IMPORT
        .captures_iter(&text.clean)
        .map(|c| c[1].trim().to_string())
        .collect();
    for span in type_spans(&text, &TYPE_DECL, b";\n", AnnotationSyntax::At, kind_of) {
        if let Some(decl) = type_decl(&text, &span, package.clone()) {
            unit.types.push(decl);
        }
    }
    unit
}

/// Skip a leading `[A, B]` type parameter list.
fn skip_type_params(header: &str) -> &str {
    let header = header.trim_start();
    if header.starts_with('[') {
        if let Some(close) = find_matching(header, 0) {
            return header[close + 1..].trim_start();
        }
    }
    header
}

fn type_decl(text: &Text, span: &TypeSpan, package: Option<String>) -> Option<TypeDecl> {
    let namespace = match (&package, &span.outer) {
        (Some(pkg), Some(outer)) => Some(format!("{}.{}", pkg, outer)),
        (None, Some(outer)) => Some(outer.clone()),
        (pkg, None) => pkg.clone(),
    };
    let mut decl = TypeDecl::new(&span.name, span.kind, span.line)?.with_namespace(namespace);
    decl.annotations = span.annotations.clone();

    // `[T] @Inject() private (a: Int)(implicit ec: EC) extends B(a) with C`
    let mut header = skip_type_params(&span.header);
    header = &header[annotation_prefix(header, AnnotationSyntax::At)..];
    let (_, rest) = strip_words(header, &["private", "protected"]);
    header = rest;
    let mut first_list = true;
    while let Some((params, rest)) = leading_parens(header) {
        if first_list {
            for raw in split_top_level(params, b',') {
                if let Some(field) = ctor_field(&raw, span.line, span.kind == DeclKind::Record) {
                    decl.fields.push(field);
                }
            }
            first_list = false;
        }
        header = rest;
    }
    if let Some(bases) = header.trim().strip_prefix("extends") {
        decl.supertypes = bases
            .split(" with ")
            .map(|b| strip_call(b).to_string())
            .filter(|b| !b.is_empty())
            .collect();
    }

    let Some(body) = span.body else {
        return Some(decl);
    };
    if decl.kind == DeclKind::Enum {
        for member in members(text, &body, AnnotationSyntax::At, true) {
            if let Some(cases) = member.decl.strip_prefix("case ") {
                decl.variants.extend(
                    split_top_level(cases, b',')
                        .iter()
                        .map(|c| strip_call(c.split(" extends ").next().unwrap_or(c)).to_string()),
                );
            }
        }
        return Some(decl);
    }
    for member in members(text, &body, AnnotationSyntax::At, true) {
        body_member(&mut decl, &member);
    }
    Some(decl)
}

/// A constructor parameter as a field: every case-class parameter, or a
/// public `val`/`var` of a plain class.
fn ctor_field(raw: &str, line: usize, record: bool) -> Option<FieldDecl> {
    let (annotations, rest) = split_param(raw, AnnotationSyntax::At, line);
    let (modifiers, rest) = strip_words(&rest, MODIFIERS);
    let declared = modifiers.iter().any(|m| matches!(*m, "val" | "var"));
    let hidden = modifiers.iter().any(|m| matches!(*m, "private" | "protected" | "implicit"));
    if hidden || !(record || declared) {
        return None;
    }
    let (left, default) = split_default(rest);
    let (name, ty) = left.split_once(':')?;
    let mut field = FieldDecl::new(name.trim(), ty.trim(), shape(ty), line).with_default(default.map(String::from));
    field.annotations = annotations;
    Some(field)
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

fn body_member(decl: &mut TypeDecl, member: &Member) {
    let (mut modifiers, mut rest) = strip_words(&member.decl, MODIFIERS);
    // `private[pkg] val x`
    while rest.starts_with('[') {
        let Some(close) = find_matching(rest, 0) else {
            return;
        };
        let (more, after) = strip_words(&rest[close + 1..], MODIFIERS);
        modifiers.extend(more);
        rest = after;
    }
    let visibility = visibility(&modifiers);

    if let Some(signature) = rest.strip_prefix("def ") {
        let signature = signature.trim();
        let name_end = signature
            .find(|c: char| matches!(c, '(' | '[' | ':' | '=') || c.is_whitespace())
            .unwrap_or(signature.len());
        let name = &signature[..name_end];
        if name.is_empty() {
            return;
        }
        let mut method = MethodDecl::new(name, member.line);
        let mut after = skip_type_params(&signature[name_end..]);
        let mut first_list = true;
        while let Some((params, rest)) = leading_parens(after) {
            if first_list && !params.trim_start().starts_with("implicit") {
                method.params = parse_params(params, member.line);
                first_list = false;
            }
            after = rest;
        }
        let (ret, _) = split_default(after);
        method.return_type = ret.strip_prefix(':').map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
        method.is_async = method.return_type.as_deref().is_some_and(|t| t.starts_with("Future"))
            || split_default(after).1.is_some_and(|v| v.contains("Action.async"));
        method.visibility = visibility;
        method.annotations = member.annotations.clone();
        method.owner = Some(decl.name.clone());
        decl.methods.push(method);
        return;
    }

    let declared = modifiers.iter().any(|m| matches!(*m, "val" | "var"));
    if !declared || visibility != Visibility::Public || modifiers.contains(&"implicit") {
        return;
    }
    let (left, default) = split_default(rest);
    let (name, ty) = match left.split_once(':') {
        Some((name, ty)) => (name.trim(), ty.trim()),
        None => (left.trim(), ""),
    };
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return;
    }
    let mut field = FieldDecl::new(name, ty, shape(ty), member.line).with_default(default.map(String::from));
    field.annotations = member.annotations.clone();
    decl.fields.push(field);
}

fn parse_params(params: &str, line: usize) -> Vec<Param> {
    split_top_level(params, b',')
        .into_iter()
        .filter_map(|raw| {
            let (annotations, rest) = split_param(&raw, AnnotationSyntax::At, line);
            let (left, default) = split_default(&rest);
            let (name, ty) = left.split_once(':')?;
            let mut param = Param::new(name.trim(), ty.trim()).with_default(default.map(String::from));
            if shape(ty).optional {
                param.required = false;
            }
            param.annotations = annotations;
            Some(param)
        })
        .collect()
}

/// `GET /clients/$id<[0-9]+> controllers.Clients.show(id: Long)` lines.
///
/// Each distinct action also becomes a function fact owned by its
/// controller, carrying the typed parameters declared in the file.
fn play_routes(content: &str, unit: &mut SourceUnit) {
    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('+') {
            continue;
        }
        if let Some(cap) = INCLUDE_LINE.captures(line) {
            unit.imports.push(cap["router"].to_string());
            continue;
        }
        let Some(cap) = ROUTE_LINE.captures(line) else {
            continue;
        };
        let Some(method) = HttpMethod::parse(&cap["verb"]) else {
            continue;
        };
        let target = cap["target"].trim_start_matches('@');
        let (call, params) = match target.find('(') {
            Some(open) => {
                let close = find_matching(target, open).unwrap_or(target.len());
                (&target[..open], target.get(open + 1..close).unwrap_or(""))
            }
            None => (target, ""),
        };
        let Some((owner_path, action)) = call.rsplit_once('.') else {
            continue;
        };
        let owner = owner_path.rsplit('.').next().unwrap_or(owner_path).to_string();
        let line_no = index + 1;

        let known = unit
            .functions
            .iter()
            .any(|f| f.name == action && f.owner.as_deref() == Some(owner.as_str()));
        if !known {
            let mut function = MethodDecl::new(action, line_no);
            function.owner = Some(owner.clone());
            function.params = split_top_level(params, b',')
                .into_iter()
                .filter_map(|p| route_param(&p))
                .collect();
            unit.functions.push(function);
        }
        unit.routes.push(
            RouteFact::new(method, &cap["path"], action, PathSyntax::Dollar, line_no).with_owner(Some(owner)),
        );
    }
}

/// `id: Long`, `page: Int ?= 1`; fixed values (`path = "/public"`) are not parameters.
fn route_param(raw: &str) -> Option<Param> {
    let (name, rest) = raw.split_once(':')?;
    if name.contains('=') {
        return None;
    }
    let (ty, default) = match rest.split_once("?=") {
        Some((ty, default)) => (ty.trim(), Some(default.trim().to_string())),
        None => (rest.trim(), None),
    };
    let mut param = Param::new(name.trim(), ty).with_default(default);
    if shape(ty).optional {
        param.required = false;
    }
    Some(param)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::join_paths;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_play_routes() {
        let unit = scan(
            Path::new("conf/routes"),
            r#"# Routes
GET     /                        controllers.HomeController.index()
GET     /clients/$id<[0-9]+>     controllers.Clients.show(id: Long)
+ nocsrf
POST    /users                   @controllers.UserController.create()
GET     /items                   controllers.ItemController.list(page: Int ?= 1, q: Option[String])
GET     /assets/*file            controllers.Assets.versioned(path = "/public", file: Asset)
->      /v1                      v1.Routes
"#,
        );
        let routes: Vec<(HttpMethod, String, String, Option<String>)> = unit
            .routes
            .iter()
            .map(|r| (r.method, join_paths(None, &r.path, r.syntax), r.handler.clone(), r.owner.clone()))
            .collect();
        assert_eq!(
            routes,
            vec![
                (HttpMethod::Get, "/".to_string(), "index".to_string(), Some("HomeController".to_string())),
                (HttpMethod::Get, "/clients/{id}".to_string(), "show".to_string(), Some("Clients".to_string())),
                (HttpMethod::Post, "/users".to_string(), "create".to_string(), Some("UserController".to_string())),
                (HttpMethod::Get, "/items".to_string(), "list".to_string(), Some("ItemController".to_string())),
                (HttpMethod::Get, "/assets/{file}".to_string(), "versioned".to_string(), Some("Assets".to_string())),
            ]
        );
        assert_eq!(unit.routes[1].line, 3);
        assert_eq!(unit.imports, vec!["v1.Routes"]);

        let list = unit.functions.iter().find(|f| f.name == "list").unwrap();
        let params: Vec<(&str, &str, bool)> = list
            .params
            .iter()
            .map(|p| (p.name.as_str(), p.raw_type.as_str(), p.required))
            .collect();
        assert_eq!(params, vec![("page", "Int", false), ("q", "Option[String]", false)]);
        let versioned = unit.functions.iter().find(|f| f.name == "versioned").unwrap();
        assert_eq!(versioned.params.len(), 1);
    }

    #[test]
    fn test_case_classes() {
        let unit = scan(
            Path::new("app/models/User.scala"),
            r#"package models

import play.api.libs.json._

case class User(
  id: Long,
  @JsonProperty("full_name") name: String,
  email: Option[String] = None,
  tags: Seq[String]
) extends Entity with Serializable

object User {
  implicit val format: OFormat[User] = Json.format[User]
}

class Account(val owner: String, balance: BigDecimal) {
  val currency: String = "EUR"
  private val secret = "x"
  def deposit(amount: BigDecimal): Account = this
}

enum Color {
  case Red, Green
}
"#,
        );
        assert_eq!(unit.imports, vec!["play.api.libs.json._"]);
        let user = unit.types.iter().find(|t| t.name == "User" && t.kind == DeclKind::Record).unwrap();
        assert_eq!(user.namespace.as_deref(), Some("models"));
        assert_eq!(user.supertypes, vec!["Entity", "Serializable"]);
        let fields: Vec<(&str, bool)> = user.fields.iter().map(|f| (f.name.as_str(), f.is_required())).collect();
        assert_eq!(fields, vec![("id", true), ("name", true), ("email", false), ("tags", true)]);
        assert_eq!(user.fields[1].annotations[0].string_arg(0).as_deref(), Some("full_name"));

        let companion = unit.types.iter().find(|t| t.name == "User" && t.kind == DeclKind::Module).unwrap();
        assert!(companion.fields.is_empty());

        let account = unit.find_type("Account").unwrap();
        let names: Vec<&str> = account.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["owner", "currency"]);
        assert_eq!(account.methods[0].name, "deposit");
        assert_eq!(account.methods[0].return_type.as_deref(), Some("Account"));
        assert_eq!(unit.find_type("Color").unwrap().variants, vec!["Red", "Green"]);
    }

    #[test]
    fn test_play_controller() {
        let unit = scan(
            Path::new("app/controllers/UserController.scala"),
            r#"package controllers

class UserController @Inject()(cc: ControllerComponents)
    extends AbstractController(cc) {

  def show(id: Long) = Action.async { implicit request =>
    Future.successful(Ok(Json.toJson(id)))
  }

  def index() = Action {
    Ok("hi")
  }
}
"#,
        );
        let controller = unit.find_type("UserController").unwrap();
        assert_eq!(controller.supertypes, vec!["AbstractController"]);
        assert!(controller.fields.is_empty());
        let names: Vec<&str> = controller.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["show", "index"]);
        assert_eq!(controller.methods[0].params[0].raw_type, "Long");
        assert!(controller.methods[0].is_async);
    }
}
