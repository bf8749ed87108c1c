//! Python backend built on tree-sitter.
//!
//! Top-level statements are walked once. Classes and functions are extracted
//! in one descent into their known children; decorators are collected by
//! walking the definition's previous siblings inside `decorated_definition`.
//! Route facts come from Flask/FastAPI decorators and Django `urlpatterns`.

use super::treesitter::{field_text, line, named_children, parse_tree, preceding_siblings, text};
use crate::error::Result;
use crate::lexer::list_items;
use crate::model::{
    Annotation, DeclKind, FieldDecl, HttpMethod, MethodDecl, Param, RouteFact, SourceUnit,
    SyntaxTree, TypeDecl, Visibility,
};
use crate::parser::{Backend, Language};
use crate::path::PathSyntax;
use crate::type_map::{self, simple_name, TypeMapping, TypeShape};
use log::debug;
use std::collections::HashMap;
use std::path::Path;
use tree_sitter::Node;

#[derive(Debug, Default, Clone, Copy)]
pub struct PythonBackend;

impl Backend for PythonBackend {
    fn language(&self) -> Language {
        Language::Python
    }

    fn parse(&self, path: &Path, content: &str) -> Result<SourceUnit> {
        let tree = parse_tree(path, tree_sitter_python::LANGUAGE.into(), content)?;
        let mut unit = SourceUnit::new(path, Language::Python, content);
        {
            let mut extractor = Extractor::new(content);
            extractor.module(tree.root_node());
            extractor.finish(&mut unit);
        }
        debug!(
            "Extracted {} types, {} routes from {}",
            unit.types.len(),
            unit.routes.len(),
            path.display()
        );
        unit.tree = Some(SyntaxTree::TreeSitter(tree));
        Ok(unit)
    }

    fn map_type(&self, raw: &str) -> TypeMapping {
        type_map::python::map_type(raw)
    }

    fn shape(&self, raw: &str) -> TypeShape {
        type_map::python::shape(raw)
    }
}

/// Parameter markers whose call arguments decide whether a value is required.
const MARKERS: &[&str] = &[
    "Query", "Path", "Body", "Header", "Cookie", "Form", "File", "Depends", "Field", "Security",
];

/// A decorator route waiting for its router prefix to be resolved.
struct PendingRoute {
    receiver: String,
    fact: RouteFact,
}

struct Extractor<'s> {
    source: &'s str,
    types: Vec<TypeDecl>,
    functions: Vec<MethodDecl>,
    imports: Vec<String>,
    routes: Vec<RouteFact>,
    pending: Vec<PendingRoute>,
    /// Router variable -> its own prefix (`APIRouter(prefix=...)`, `Blueprint(url_prefix=...)`)
    routers: HashMap<String, String>,
    /// Router variable -> prefix given when it was mounted on the app
    mounts: HashMap<String, String>,
}

impl<'s> Extractor<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            types: Vec::new(),
            functions: Vec::new(),
            imports: Vec::new(),
            routes: Vec::new(),
            pending: Vec::new(),
            routers: HashMap::new(),
            mounts: HashMap::new(),
        }
    }

    fn text(&self, node: Node) -> &'s str {
        text(node, self.source)
    }

    fn module(&mut self, root: Node) {
        for node in named_children(root) {
            match node.kind() {
                "import_statement" | "import_from_statement" => self.import(node),
                "class_definition" => self.class(node, Vec::new(), None),
                "function_definition" => {
                    let method = self.function(node, Vec::new(), None);
                    self.functions.push(method);
                }
                "decorated_definition" => {
                    if let Some(definition) = node.child_by_field_name("definition") {
                        let decorators = self.decorators(definition);
                        match definition.kind() {
                            "class_definition" => self.class(definition, decorators, None),
                            "function_definition" => {
                                let method = self.function(definition, decorators, None);
                                self.functions.push(method);
                            }
                            _ => {}
                        }
                    }
                }
                "expression_statement" => {
                    for child in named_children(node) {
                        match child.kind() {
                            "assignment" | "augmented_assignment" => self.module_assignment(child),
                            "call" => self.module_call(child),
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn finish(self, unit: &mut SourceUnit) {
        let Extractor {
            types,
            functions,
            imports,
            mut routes,
            pending,
            routers,
            mounts,
            ..
        } = self;
        for PendingRoute { receiver, fact } in pending {
            let own = routers.get(&receiver).map(String::as_str).unwrap_or("");
            let mounted = mounts.get(&receiver).map(String::as_str).unwrap_or("");
            let group = format!("{}{}", mounted.trim_end_matches('/'), own);
            routes.push(fact.with_group(Some(group)));
        }
        routes.sort_by_key(|r| r.line);
        unit.types = types;
        unit.functions = functions;
        unit.imports = imports;
        unit.routes = routes;
    }

    fn import(&mut self, node: Node) {
        let mut cursor = node.walk();
        let names: Vec<Node> = node.children_by_field_name("name", &mut cursor).collect();
        let module = field_text(node, "module_name", self.source);
        for name in names {
            let name = match name.kind() {
                "aliased_import" => field_text(name, "name", self.source).unwrap_or(""),
                _ => self.text(name),
            };
            self.imports.push(match module {
                Some(module) => format!("{}.{}", module, name),
                None => name.to_string(),
            });
        }
    }

    fn decorators(&self, definition: Node) -> Vec<Annotation> {
        preceding_siblings(definition, &["decorator", "comment"])
            .into_iter()
            .filter(|n| n.kind() == "decorator")
            .filter_map(|n| {
                let expr = n.named_child(0)?;
                Some(self.annotation(expr, line(n)))
            })
            .collect()
    }

    /// `name` or `name(args, key=value)` as an annotation.
    fn annotation(&self, expr: Node, at: usize) -> Annotation {
        if expr.kind() != "call" {
            return Annotation::new(self.text(expr), at);
        }
        let name = field_text(expr, "function", self.source).unwrap_or("");
        let mut ann = Annotation::new(name, at);
        if let Some(arguments) = expr.child_by_field_name("arguments") {
            for arg in named_children(arguments) {
                match arg.kind() {
                    "keyword_argument" => {
                        let key = field_text(arg, "name", self.source).unwrap_or("");
                        let value = field_text(arg, "value", self.source).unwrap_or("");
                        ann.named_args.push((key.to_string(), value.to_string()));
                    }
                    "comment" => {}
                    _ => ann.args.push(self.text(arg).to_string()),
                }
            }
        }
        ann
    }

    fn class(&mut self, node: Node, decorators: Vec<Annotation>, namespace: Option<String>) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let supertypes: Vec<String> = node
            .child_by_field_name("superclasses")
            .map(|list| {
                named_children(list)
                    .into_iter()
                    .filter(|n| n.kind() != "keyword_argument" && n.kind() != "comment")
                    .map(|n| self.text(n).to_string())
                    .collect()
            })
            .unwrap_or_default();
        let is_enum = supertypes
            .iter()
            .any(|s| matches!(simple_name(s), "Enum" | "IntEnum" | "StrEnum" | "Flag" | "IntFlag"));
        let kind = if is_enum { DeclKind::Enum } else { DeclKind::Class };
        let Some(decl) = TypeDecl::new(name, kind, line(node)) else {
            return;
        };
        let mut decl = decl.with_namespace(namespace.clone());
        decl.supertypes = supertypes;
        decl.annotations = decorators;

        let qualified = decl.qualified_name();
        let mut nested = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            for stmt in named_children(body) {
                match stmt.kind() {
                    "expression_statement" => {
                        for child in named_children(stmt) {
                            if child.kind() == "assignment" {
                                self.class_assignment(&mut decl, child);
                            }
                        }
                    }
                    "function_definition" => {
                        let method = self.function(stmt, Vec::new(), Some(&decl.name));
                        decl.methods.push(method);
                    }
                    "decorated_definition" => {
                        if let Some(definition) = stmt.child_by_field_name("definition") {
                            let decorators = self.decorators(definition);
                            match definition.kind() {
                                "function_definition" => {
                                    let method = self.function(definition, decorators, Some(&decl.name));
                                    decl.methods.push(method);
                                }
                                "class_definition" => nested.push((definition, decorators)),
                                _ => {}
                            }
                        }
                    }
                    "class_definition" => nested.push((stmt, Vec::new())),
                    _ => {}
                }
            }
        }
        self.types.push(decl);
        for (child, decorators) in nested {
            self.class(child, decorators, Some(qualified.clone()));
        }
    }

    fn class_assignment(&self, decl: &mut TypeDecl, node: Node) {
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        if left.kind() != "identifier" {
            return;
        }
        let name = self.text(left);
        let right = node.child_by_field_name("right");
        let at = line(node);

        if let Some(ty) = node.child_by_field_name("type") {
            let raw = self.text(ty);
            let mut field = FieldDecl::new(name, raw, type_map::python::shape(raw), at);
            match right {
                Some(value) if value.kind() == "call" && self.is_marker(value) => {
                    let ann = self.annotation(value, at);
                    if !marker_required(&ann) {
                        field = field.with_default(Some(self.text(value).to_string()));
                    }
                    field.annotations.push(ann);
                }
                Some(value) => field = field.with_default(Some(self.text(value).to_string())),
                None => {}
            }
            decl.fields.push(field);
            return;
        }

        if decl.kind == DeclKind::Enum {
            if !name.starts_with('_') {
                decl.variants.push(name.to_string());
            }
            return;
        }

        // Django models and serializers: `email = models.EmailField(null=True)`
        let Some(value) = right.filter(|v| v.kind() == "call") else {
            return;
        };
        let function = field_text(value, "function", self.source).unwrap_or("");
        let field_type = simple_name(function);
        if !field_type.ends_with("Field") && !matches!(field_type, "ForeignKey" | "OneToOneField" | "ManyToManyField") {
            return;
        }
        let ann = self.annotation(value, at);
        let mut field = FieldDecl::new(name, field_type, type_map::python::shape(field_type), at);
        field.optional = ["null", "blank"].iter().any(|k| ann.named(k) == Some("True"))
            || ann.named("required") == Some("False");
        field = field.with_default(ann.named("default").map(|d| d.to_string()));
        field.annotations.push(ann);
        decl.fields.push(field);
    }

    fn is_marker(&self, call: Node) -> bool {
        field_text(call, "function", self.source)
            .map(|f| MARKERS.contains(&simple_name(f)))
            .unwrap_or(false)
    }

    fn function(&mut self, node: Node, decorators: Vec<Annotation>, owner: Option<&str>) -> MethodDecl {
        let name = field_text(node, "name", self.source).unwrap_or("");
        let mut method = MethodDecl::new(name, line(node));
        method.is_async = node.child(0).map(|c| c.kind() == "async").unwrap_or(false);
        method.visibility = if name.starts_with('_') && !name.starts_with("__") {
            Visibility::Private
        } else {
            Visibility::Public
        };
        method.return_type = field_text(node, "return_type", self.source).map(|t| t.to_string());
        method.owner = owner.map(|o| o.to_string());
        if let Some(parameters) = node.child_by_field_name("parameters") {
            for param in named_children(parameters) {
                if let Some(param) = self.param(param) {
                    if owner.is_some() && matches!(param.name.as_str(), "self" | "cls") {
                        continue;
                    }
                    method.params.push(param);
                }
            }
        }

        for ann in &decorators {
            self.decorator_routes(ann, name, owner);
        }
        method.annotations = decorators;
        method
    }

    fn param(&self, node: Node) -> Option<Param> {
        let (name, ty, value) = match node.kind() {
            "identifier" => (self.text(node), "", None),
            "typed_parameter" => {
                let name = node.named_child(0).filter(|n| n.kind() == "identifier")?;
                (self.text(name), field_text(node, "type", self.source).unwrap_or(""), None)
            }
            "default_parameter" => (
                field_text(node, "name", self.source)?,
                "",
                node.child_by_field_name("value"),
            ),
            "typed_default_parameter" => (
                field_text(node, "name", self.source)?,
                field_text(node, "type", self.source).unwrap_or(""),
                node.child_by_field_name("value"),
            ),
            _ => return None,
        };
        let mut param = Param::new(name, ty);
        if let Some(value) = value {
            if value.kind() == "call" && self.is_marker(value) {
                let ann = self.annotation(value, line(value));
                if !marker_required(&ann) {
                    param = param.with_default(Some(self.text(value).to_string()));
                }
                param.annotations.push(ann);
            } else {
                param = param.with_default(Some(self.text(value).to_string()));
            }
        }
        if !ty.is_empty() && type_map::python::shape(ty).optional {
            param.required = false;
        }
        Some(param)
    }

    /// `@app.get("/x")`, `@router.post(...)`, `@bp.route("/x", methods=[...])`.
    fn decorator_routes(&mut self, ann: &Annotation, handler: &str, owner: Option<&str>) {
        let Some((receiver, verb)) = ann.name.rsplit_once('.') else {
            return;
        };
        let methods = match verb {
            "route" | "api_route" => {
                let listed: Vec<HttpMethod> = ann
                    .named("methods")
                    .map(list_items)
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|m| HttpMethod::parse(m))
                    .collect();
                if listed.is_empty() {
                    vec![HttpMethod::Get]
                } else {
                    listed
                }
            }
            other => match HttpMethod::parse(other) {
                Some(method) => vec![method],
                None => return,
            },
        };
        let Some(path) = ann
            .string_arg(0)
            .or_else(|| ann.string_named("path"))
            .or_else(|| ann.string_named("rule"))
        else {
            return;
        };
        for method in methods {
            let fact = RouteFact::new(method, path.clone(), handler, decorator_syntax(&path), ann.line)
                .with_owner(owner.map(|o| o.to_string()));
            self.pending.push(PendingRoute {
                receiver: receiver.to_string(),
                fact,
            });
        }
    }

    fn module_assignment(&mut self, node: Node) {
        let (Some(left), Some(right)) = (node.child_by_field_name("left"), node.child_by_field_name("right")) else {
            return;
        };
        let target = self.text(left);
        if target == "urlpatterns" && right.kind() == "list" {
            self.django_patterns(right);
            return;
        }
        if right.kind() != "call" {
            return;
        }
        let ann = self.annotation(right, line(right));
        match simple_name(&ann.name) {
            "APIRouter" => {
                let prefix = ann.string_named("prefix").unwrap_or_default();
                self.routers.insert(target.to_string(), prefix);
            }
            "Blueprint" => {
                let prefix = ann.string_named("url_prefix").unwrap_or_default();
                self.routers.insert(target.to_string(), prefix);
            }
            _ => {}
        }
    }

    /// `app.include_router(router, prefix="/v1")`, `app.register_blueprint(bp, url_prefix="/x")`.
    fn module_call(&mut self, node: Node) {
        let ann = self.annotation(node, line(node));
        let key = match simple_name(&ann.name) {
            "include_router" => "prefix",
            "register_blueprint" => "url_prefix",
            _ => return,
        };
        if let (Some(router), Some(prefix)) = (ann.args.first(), ann.string_named(key)) {
            self.mounts.insert(router.trim().to_string(), prefix);
        }
    }

    /// `path("users/<int:pk>/", views.detail)`, `re_path(r"^x/$", View.as_view())`.
    fn django_patterns(&mut self, list: Node) {
        for item in named_children(list) {
            if item.kind() != "call" {
                continue;
            }
            let ann = self.annotation(item, line(item));
            if !matches!(simple_name(&ann.name), "path" | "re_path" | "url") {
                continue;
            }
            let (Some(route), Some(view)) = (ann.string_arg(0), ann.args.get(1)) else {
                continue;
            };
            let view = view.trim();
            let (owner, handler) = match view.strip_suffix(".as_view()") {
                Some(class) => (Some(simple_name(class).to_string()), "get".to_string()),
                None if view.starts_with("include(") => continue,
                None => (None, simple_name(view).to_string()),
            };
            self.routes.push(
                RouteFact::new(HttpMethod::Get, route, handler, PathSyntax::Angle, ann.line).with_owner(owner),
            );
        }
    }
}

fn decorator_syntax(path: &str) -> PathSyntax {
    if path.contains('<') {
        PathSyntax::Angle
    } else {
        PathSyntax::Canonical
    }
}

/// `Query(...)`, `Field(..., alias="x")` and argument-less markers are required;
/// any other positional value or a `default=` is a default.
fn marker_required(ann: &Annotation) -> bool {
    if ann.named("default").is_some() || ann.named("default_factory").is_some() {
        return false;
    }
    match ann.args.first() {
        None => true,
        Some(first) => first.trim() == "..." || simple_name(&ann.name) == "Depends",
    }
}
