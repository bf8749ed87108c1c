//! Go backend built on tree-sitter.
//!
//! Structs, interfaces, functions and methods come from the top-level
//! declarations. Route facts come from router calls found anywhere inside
//! function bodies: Gin/Echo/Fiber verbs, Chi `Get`/`Route`, `net/http`
//! `HandleFunc` (including Go 1.22 `"GET /x"` patterns) and Gorilla
//! `.Methods(...)`. Swag comments (`// @Param ...`) preceding a function are
//! kept as its annotations.

use super::clike::GroupVars;
use super::treesitter::{field_text, line, named_children, parse_tree, preceding_siblings, text};
use crate::error::Result;
use crate::lexer::string_literal;
use crate::model::{
    Annotation, DeclKind, FieldDecl, HttpMethod, MethodDecl, Param, RouteFact, SourceUnit,
    SyntaxTree, TypeDecl, Visibility, LAMBDA,
};
use crate::parser::{Backend, Language};
use crate::path::PathSyntax;
use crate::type_map::{self, TypeMapping, TypeShape};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tree_sitter::Node;

static STRUCT_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(\w+):"([^"]*)""#).unwrap());

#[derive(Debug, Default, Clone, Copy)]
pub struct GoBackend;

impl Backend for GoBackend {
    fn language(&self) -> Language {
        Language::Go
    }

    fn parse(&self, path: &Path, content: &str) -> Result<SourceUnit> {
        let tree = parse_tree(path, tree_sitter_go::LANGUAGE.into(), content)?;
        let mut unit = SourceUnit::new(path, Language::Go, content);
        {
            let mut extractor = Extractor::new(content);
            extractor.source_file(tree.root_node());
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
        type_map::go::map_type(raw)
    }

    fn shape(&self, raw: &str) -> TypeShape {
        type_map::go::shape(raw)
    }
}

struct Extractor<'s> {
    source: &'s str,
    package: Option<String>,
    types: Vec<TypeDecl>,
    functions: Vec<MethodDecl>,
    methods: Vec<MethodDecl>,
    imports: Vec<String>,
    routes: Vec<RouteFact>,
}

impl<'s> Extractor<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            package: None,
            types: Vec::new(),
            functions: Vec::new(),
            methods: Vec::new(),
            imports: Vec::new(),
            routes: Vec::new(),
        }
    }

    fn text(&self, node: Node) -> &'s str {
        text(node, self.source)
    }

    fn source_file(&mut self, root: Node) {
        for node in named_children(root) {
            match node.kind() {
                "package_clause" => {
                    self.package = node.named_child(0).map(|n| self.text(n).to_string());
                }
                "import_declaration" => self.imports_of(node),
                "type_declaration" => {
                    for spec in named_children(node) {
                        if spec.kind() == "type_spec" {
                            self.type_spec(spec);
                        }
                    }
                }
                "function_declaration" | "method_declaration" => self.function(node),
                _ => {}
            }
        }
    }

    fn finish(self, unit: &mut SourceUnit) {
        let Extractor {
            mut types,
            mut functions,
            methods,
            imports,
            routes,
            ..
        } = self;
        for method in methods {
            let owner = method.owner.clone().unwrap_or_default();
            match types.iter_mut().find(|t| t.name == owner) {
                Some(decl) => decl.methods.push(method),
                None => functions.push(method),
            }
        }
        unit.types = types;
        unit.functions = functions;
        unit.imports = imports;
        unit.routes = routes;
    }

    fn imports_of(&mut self, node: Node) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if current.kind() == "import_spec" {
                if let Some(path) = field_text(current, "path", self.source).and_then(string_literal) {
                    self.imports.push(path);
                }
                continue;
            }
            let mut children = named_children(current);
            children.reverse();
            stack.extend(children);
        }
    }

    fn type_spec(&mut self, spec: Node) {
        let (Some(name), Some(ty)) = (field_text(spec, "name", self.source), spec.child_by_field_name("type")) else {
            return;
        };
        let kind = match ty.kind() {
            "struct_type" => DeclKind::Struct,
            "interface_type" => DeclKind::Interface,
            _ => return,
        };
        let Some(decl) = TypeDecl::new(name, kind, line(spec)) else {
            return;
        };
        let mut decl = decl.with_namespace(self.package.clone());
        if let Some(comments) = spec.parent() {
            decl.annotations = self.swag_annotations(comments);
        }

        match kind {
            DeclKind::Struct => {
                let Some(list) = named_children(ty).into_iter().find(|n| n.kind() == "field_declaration_list") else {
                    self.types.push(decl);
                    return;
                };
                for field in named_children(list) {
                    if field.kind() == "field_declaration" {
                        self.struct_field(&mut decl, field);
                    }
                }
            }
            _ => {
                for elem in named_children(ty) {
                    if matches!(elem.kind(), "method_elem" | "method_spec") {
                        if let Some(name) = field_text(elem, "name", self.source) {
                            let mut method = MethodDecl::new(name, line(elem));
                            method.params = self.params(elem.child_by_field_name("parameters"));
                            method.return_type = field_text(elem, "result", self.source).map(|r| r.to_string());
                            method.owner = Some(decl.name.clone());
                            decl.methods.push(method);
                        }
                    }
                }
            }
        }
        self.types.push(decl);
    }

    fn struct_field(&self, decl: &mut TypeDecl, field: Node) {
        let Some(ty) = field.child_by_field_name("type") else {
            return;
        };
        let raw = self.text(ty);
        let mut cursor = field.walk();
        let names: Vec<&str> = field
            .children_by_field_name("name", &mut cursor)
            .map(|n| self.text(n))
            .collect();
        if names.is_empty() {
            // Embedded struct
            decl.supertypes.push(raw.trim_start_matches('*').to_string());
            return;
        }
        let tags = field_text(field, "tag", self.source)
            .and_then(string_literal)
            .map(|tag| parse_struct_tag(&tag, line(field)))
            .unwrap_or_default();
        let omitempty = tags
            .iter()
            .any(|t| t.name == "json" && t.args.iter().skip(1).any(|o| o == "omitempty"));

        for name in names {
            let mut fd = FieldDecl::new(name, raw, type_map::go::shape(raw), line(field));
            fd.optional |= omitempty;
            fd.annotations = tags.clone();
            decl.fields.push(fd);
        }
    }

    fn function(&mut self, node: Node) {
        let Some(name) = field_text(node, "name", self.source) else {
            return;
        };
        let mut method = MethodDecl::new(name, line(node));
        method.visibility = if name.starts_with(|c: char| c.is_uppercase()) {
            Visibility::Public
        } else {
            Visibility::Private
        };
        method.params = self.params(node.child_by_field_name("parameters"));
        method.return_type = field_text(node, "result", self.source).map(|r| r.to_string());
        method.annotations = self.swag_annotations(node);
        method.owner = node
            .child_by_field_name("receiver")
            .and_then(|receiver| self.params(Some(receiver)).into_iter().next())
            .map(|p| p.raw_type.trim_start_matches('*').to_string());

        if let Some(body) = node.child_by_field_name("body") {
            let mut groups = GroupVars::default();
            self.routes_in(body, &mut groups, None);
        }

        if method.owner.is_some() {
            self.methods.push(method);
        } else {
            self.functions.push(method);
        }
    }

    fn params(&self, list: Option<Node>) -> Vec<Param> {
        let Some(list) = list else {
            return Vec::new();
        };
        let mut params = Vec::new();
        for decl in named_children(list) {
            if !matches!(decl.kind(), "parameter_declaration" | "variadic_parameter_declaration") {
                continue;
            }
            let ty = field_text(decl, "type", self.source).unwrap_or("");
            let ty = if decl.kind() == "variadic_parameter_declaration" {
                format!("[]{}", ty)
            } else {
                ty.to_string()
            };
            let mut cursor = decl.walk();
            let names: Vec<&str> = decl
                .children_by_field_name("name", &mut cursor)
                .map(|n| self.text(n))
                .collect();
            if names.is_empty() {
                params.push(Param::new("_", ty.as_str()));
            }
            for name in names {
                params.push(Param::new(name, ty.as_str()));
            }
        }
        params
    }

    /// `// @Summary`, `// @Param`, `// @Success`, `// @Router` lines right above `node`.
    fn swag_annotations(&self, node: Node) -> Vec<Annotation> {
        preceding_siblings(node, &["comment"])
            .into_iter()
            .filter_map(|comment| {
                let body = self.text(comment).trim_start_matches("//").trim();
                let rest = body.strip_prefix('@')?;
                let (name, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                let mut ann = Annotation::new(name, line(comment));
                ann.args = swag_args(args);
                Some(ann)
            })
            .collect()
    }

    /// Walk a function body for router calls. `prefix` is the enclosing Chi `Route` prefix.
    fn routes_in(&mut self, node: Node, groups: &mut GroupVars, prefix: Option<&str>) {
        match node.kind() {
            "short_var_declaration" | "assignment_statement" => self.group_assignment(node, groups),
            "var_spec" => self.group_var_spec(node, groups),
            "call_expression" => {
                if self.route_call(node, groups, prefix) {
                    return;
                }
            }
            _ => {}
        }
        for child in named_children(node) {
            self.routes_in(child, groups, prefix);
        }
    }

    /// `api := r.Group("/api")`
    fn group_assignment(&self, node: Node, groups: &mut GroupVars) {
        let (Some(left), Some(right)) = (node.child_by_field_name("left"), node.child_by_field_name("right")) else {
            return;
        };
        let targets = named_children(left);
        let values = named_children(right);
        for (target, value) in targets.into_iter().zip(values) {
            self.record_group(self.text(target), value, groups);
        }
    }

    fn group_var_spec(&self, node: Node, groups: &mut GroupVars) {
        let (Some(name), Some(value)) = (field_text(node, "name", self.source), node.child_by_field_name("value")) else {
            return;
        };
        if let Some(first) = named_children(value).into_iter().next() {
            self.record_group(name, first, groups);
        }
    }

    fn record_group(&self, target: &str, value: Node, groups: &mut GroupVars) {
        let Some((receiver, method, args)) = self.selector_call(value) else {
            return;
        };
        if !matches!(method, "Group" | "PathPrefix" | "Subrouter") {
            return;
        }
        let prefix = args
            .first()
            .map(|a| self.text(*a))
            .and_then(string_literal)
            .unwrap_or_default();
        // r.PathPrefix("/api").Subrouter(): the prefix lives on the inner call
        if method == "Subrouter" {
            if let Some(inner) = self.selector_operand(value).and_then(|op| self.selector_call(op)) {
                if inner.1 == "PathPrefix" {
                    let prefix = inner.2.first().map(|a| self.text(*a)).and_then(string_literal).unwrap_or_default();
                    groups.insert(target, inner.0, &prefix);
                }
            }
            return;
        }
        groups.insert(target, receiver, &prefix);
    }

    /// `receiver.method(args...)` where the receiver is an identifier or any expression.
    fn selector_call<'t>(&self, node: Node<'t>) -> Option<(&'s str, &'s str, Vec<Node<'t>>)> {
        if node.kind() != "call_expression" {
            return None;
        }
        let function = node.child_by_field_name("function")?;
        if function.kind() != "selector_expression" {
            return None;
        }
        let operand = function.child_by_field_name("operand")?;
        let field = field_text(function, "field", self.source)?;
        let args = node
            .child_by_field_name("arguments")
            .map(named_children)
            .unwrap_or_default();
        Some((self.text(operand), field, args))
    }

    fn selector_operand<'t>(&self, call: Node<'t>) -> Option<Node<'t>> {
        call.child_by_field_name("function")?.child_by_field_name("operand")
    }

    /// Returns true when `node` was a route registration whose arguments are handled.
    fn route_call(&mut self, node: Node, groups: &mut GroupVars, prefix: Option<&str>) -> bool {
        let Some((receiver, method, args)) = self.selector_call(node) else {
            return false;
        };
        let at = line(node);

        // Chi: r.Route("/users", func(r chi.Router) { ... })
        if method == "Route" && args.len() == 2 && args[1].kind() == "func_literal" {
            let Some(path) = string_literal(self.text(args[0])) else {
                return false;
            };
            let inner = join(&[prefix.unwrap_or(""), &groups.prefix(receiver), &path]);
            if let Some(body) = args[1].child_by_field_name("body") {
                // The closure's router parameter shadows the outer name
                let mut inner_groups = groups.clone();
                for param in self.params(args[1].child_by_field_name("parameters")) {
                    inner_groups.remove(&param.name);
                }
                self.routes_in(body, &mut inner_groups, Some(&inner));
            }
            return true;
        }

        // Gorilla: r.HandleFunc("/x", h).Methods("GET", "POST")
        if method == "Methods" {
            let Some(inner) = self.selector_operand(node).filter(|n| n.kind() == "call_expression") else {
                return false;
            };
            let Some((inner_receiver, inner_method, inner_args)) = self.selector_call(inner) else {
                return false;
            };
            if !matches!(inner_method, "HandleFunc" | "Handle") {
                return false;
            }
            let verbs: Vec<HttpMethod> = args
                .iter()
                .filter_map(|a| string_literal(self.text(*a)).or_else(|| self.text(*a).rsplit('.').next().map(|m| m.to_string())))
                .filter_map(|m| HttpMethod::parse(m.trim_start_matches("Method")))
                .collect();
            let verbs = if verbs.is_empty() { vec![HttpMethod::Get] } else { verbs };
            self.register(inner_receiver, &inner_args, &verbs, groups, prefix, line(inner));
            return true;
        }

        let verbs = match method {
            "GET" | "POST" | "PUT" | "DELETE" | "PATCH" | "HEAD" | "OPTIONS" | "Get" | "Post" | "Put"
            | "Delete" | "Patch" | "Head" | "Options" => match HttpMethod::parse(method) {
                Some(m) => vec![m],
                None => return false,
            },
            "Any" | "All" | "Handle" | "HandleFunc" => Vec::new(),
            _ => return false,
        };

        // Gorilla's Methods() wraps this call; let the outer call register it
        if let Some(parent) = node.parent() {
            if parent.kind() == "selector_expression"
                && field_text(parent, "field", self.source) == Some("Methods")
            {
                return false;
            }
        }

        self.register(receiver, &args, &verbs, groups, prefix, at);
        true
    }

    fn register(
        &mut self,
        receiver: &str,
        args: &[Node],
        verbs: &[HttpMethod],
        groups: &GroupVars,
        prefix: Option<&str>,
        at: usize,
    ) {
        if args.len() < 2 {
            return;
        }
        let Some(raw_path) = string_literal(self.text(args[0])) else {
            return;
        };
        // net/http 1.22: "GET /items/{id}"
        let (pattern_verb, path) = match raw_path.split_once(' ') {
            Some((verb, rest)) if HttpMethod::parse(verb).is_some() => (HttpMethod::parse(verb), rest.trim().to_string()),
            _ => (None, raw_path),
        };
        if !path.starts_with('/') && !path.is_empty() {
            return;
        }
        let verbs: Vec<HttpMethod> = match (verbs.is_empty(), pattern_verb) {
            (false, _) => verbs.to_vec(),
            (true, Some(v)) => vec![v],
            (true, None) => vec![HttpMethod::Get],
        };
        let Some(handler_node) = args.last() else {
            return;
        };
        let handler = self.handler_name(*handler_node);
        let group = join(&[prefix.unwrap_or(""), &groups.prefix(receiver)]);
        for verb in verbs {
            self.routes.push(
                RouteFact::new(verb, path.clone(), handler.clone(), PathSyntax::Colon, at)
                    .with_group(Some(group.clone())),
            );
        }
    }

    fn handler_name(&self, node: Node) -> String {
        match node.kind() {
            "identifier" => self.text(node).to_string(),
            "selector_expression" => field_text(node, "field", self.source).unwrap_or(LAMBDA).to_string(),
            // http.HandlerFunc(h), h.List()
            "call_expression" => {
                let args = node
                    .child_by_field_name("arguments")
                    .map(named_children)
                    .unwrap_or_default();
                match args.first() {
                    Some(first) if matches!(first.kind(), "identifier" | "selector_expression") => {
                        self.handler_name(*first)
                    }
                    _ => node
                        .child_by_field_name("function")
                        .map(|f| self.handler_name(f))
                        .unwrap_or_else(|| LAMBDA.to_string()),
                }
            }
            _ => LAMBDA.to_string(),
        }
    }
}

fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| p.trim_end_matches('/'))
        .collect::<Vec<_>>()
        .concat()
}

/// `json:"name,omitempty" binding:"required"` -> one annotation per key.
fn parse_struct_tag(tag: &str, at: usize) -> Vec<Annotation> {
    STRUCT_TAG
        .captures_iter(tag)
        .map(|cap| {
            let mut ann = Annotation::new(&cap[1], at);
            ann.args = cap[2].split(',').map(|s| s.trim().to_string()).collect();
            ann
        })
        .collect()
}

/// Swag arguments: whitespace-separated tokens, quoted text kept whole.
fn swag_args(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut rest = args.trim();
    while !rest.is_empty() {
        if rest.starts_with('"') {
            let end = rest[1..].find('"').map(|i| i + 2).unwrap_or(rest.len());
            out.push(rest[..end].to_string());
            rest = rest[end..].trim_start();
            continue;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        out.push(rest[..end].to_string());
        rest = rest[end..].trim_start();
    }
    out
}

/// Split a swag `{object} model.User` response spec into kind and type.
pub fn swag_response(args: &[String]) -> Option<(String, String)> {
    let kind = args.get(1)?.trim_matches(|c| c == '{' || c == '}').to_string();
    let ty = args.get(2)?.clone();
    Some((kind, ty))
}
