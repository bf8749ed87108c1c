//! Rust backend built on `syn`.
//!
//! The file is parsed into a `syn::File` and walked once with a [`Visit`]
//! implementation. The `syn` tree is dropped before the unit is returned, so
//! units can move between parser threads. Route facts come from two places:
//! attribute macros on handlers (`#[get("/x")]`,
//! `#[route("/x", method = "POST")]`) and router builder chains
//! (`Router::new().route(..).nest(..)`, `web::scope(..).route(..)`,
//! `web::resource(..).route(..)`).

use crate::error::{Error, Result};
use crate::lexer::parse_annotation_args;
use crate::model::{
    Annotation, DeclKind, FieldDecl, HttpMethod, MethodDecl, Param, RouteFact, SourceUnit,
    TypeDecl, Visibility, LAMBDA,
};
use crate::parser::{Backend, Language};
use crate::path::PathSyntax;
use crate::type_map::{self, TypeMapping, TypeShape};
use log::debug;
use quote::ToTokens;
use std::path::Path;
use syn::spanned::Spanned;
use syn::visit::Visit;
use syn::{Attribute, Expr, ExprCall, ExprMethodCall, FnArg, Lit, Meta, Pat, Type, UseTree};

#[derive(Debug, Default, Clone, Copy)]
pub struct RustBackend;

impl Backend for RustBackend {
    fn language(&self) -> Language {
        Language::Rust
    }

    fn parse(&self, path: &Path, content: &str) -> Result<SourceUnit> {
        let file = syn::parse_file(content)
            .map_err(|e| Error::parse(path, format!("Failed to parse Rust syntax: {}", e)))?;

        let mut visitor = FactVisitor::default();
        visitor.visit_file(&file);

        let mut unit = SourceUnit::new(path, Language::Rust, content);
        visitor.finish(&mut unit);
        debug!(
            "Extracted {} types, {} functions, {} routes from {}",
            unit.types.len(),
            unit.functions.len(),
            unit.routes.len(),
            path.display()
        );
        Ok(unit)
    }

    fn map_type(&self, raw: &str) -> TypeMapping {
        type_map::rust::map_type(raw)
    }

    fn shape(&self, raw: &str) -> TypeShape {
        type_map::rust::shape(raw)
    }
}

/// A route found in a builder chain together with the function it was built in
/// and the `let` binding holding the chain, if any.
#[derive(Debug)]
struct BuiltRoute {
    fact: RouteFact,
    enclosing_fn: Option<String>,
    binding: Option<String>,
}

/// `.nest("/api", api::routes())` or `.nest("/api", api_routes)`.
#[derive(Debug)]
struct NestCall {
    prefix: String,
    target: NestTarget,
}

#[derive(Debug)]
enum NestTarget {
    /// Routes built inside the called function
    Function(String),
    /// Routes built into a local router variable of the same function
    Local {
        function: Option<String>,
        binding: String,
    },
}

impl NestTarget {
    fn matches(&self, route: &BuiltRoute) -> bool {
        match self {
            NestTarget::Function(callee) => route.enclosing_fn.as_deref() == Some(callee.as_str()),
            NestTarget::Local { function, binding } => {
                route.enclosing_fn == *function && route.binding.as_deref() == Some(binding.as_str())
            }
        }
    }
}

#[derive(Debug, Default)]
struct FactVisitor {
    types: Vec<TypeDecl>,
    functions: Vec<MethodDecl>,
    impl_methods: Vec<MethodDecl>,
    trait_impls: Vec<(String, String)>,
    imports: Vec<String>,
    routes: Vec<BuiltRoute>,
    nests: Vec<NestCall>,
    modules: Vec<String>,
    prefixes: Vec<String>,
    current_fn: Option<String>,
    current_binding: Option<String>,
    fn_depth: usize,
}

impl FactVisitor {
    /// Move the collected facts into `unit`, attaching impl methods to their types.
    fn finish(mut self, unit: &mut SourceUnit) {
        for method in self.impl_methods.drain(..) {
            let owner = method.owner.clone().unwrap_or_default();
            match self.types.iter_mut().find(|t| t.name == owner) {
                Some(decl) => decl.methods.push(method),
                None => self.functions.push(method),
            }
        }
        for (type_name, trait_name) in self.trait_impls.drain(..) {
            if let Some(decl) = self.types.iter_mut().find(|t| t.name == type_name) {
                if !decl.supertypes.contains(&trait_name) {
                    decl.supertypes.push(trait_name);
                }
            }
        }

        for nest in &self.nests {
            for route in self.routes.iter_mut().filter(|r| nest.target.matches(r)) {
                let group = join_prefix(Some(&nest.prefix), route.fact.group.as_deref());
                route.fact.group = group;
            }
        }

        unit.types = self.types;
        unit.functions = self.functions;
        unit.imports = self.imports;
        // builder chains are visited outermost call first
        self.routes.sort_by_key(|r| r.fact.line);
        unit.routes = self.routes.into_iter().map(|r| r.fact).collect();
    }

    fn namespace(&self) -> Option<String> {
        (!self.modules.is_empty()).then(|| self.modules.join("::"))
    }

    fn group(&self) -> Option<String> {
        self.prefixes
            .iter()
            .fold(None, |acc, p| join_prefix(acc.as_deref(), Some(p)))
    }

    fn push_route(&mut self, method: HttpMethod, path: String, handler: String, line: usize) {
        let syntax = route_syntax(&path);
        let fact = RouteFact::new(method, path, handler, syntax, line).with_group(self.group());
        self.routes.push(BuiltRoute {
            fact,
            enclosing_fn: self.current_fn.clone(),
            binding: self.current_binding.clone(),
        });
    }

    /// Route attributes on a handler: `#[get("/x")]`, `#[route("/x", method = "GET")]`.
    fn attribute_routes(&mut self, name: &str, attrs: &[Attribute], owner: Option<&str>) {
        for attr in attrs {
            let Some(segment) = attr.path().segments.last() else {
                continue;
            };
            let attr_name = segment.ident.to_string();
            let Meta::List(list) = &attr.meta else {
                continue;
            };
            let (args, named) = parse_annotation_args(&list.tokens.to_string());
            let Some(path) = args.first().and_then(|a| crate::lexer::string_literal(a)) else {
                continue;
            };
            let line = attr.span().start().line;

            let methods: Vec<HttpMethod> = if attr_name == "route" {
                let listed: Vec<HttpMethod> = named
                    .iter()
                    .filter(|(k, _)| k == "method")
                    .filter_map(|(_, v)| HttpMethod::parse(&crate::lexer::unquote(v)))
                    .collect();
                if listed.is_empty() {
                    vec![HttpMethod::Get]
                } else {
                    listed
                }
            } else {
                match HttpMethod::parse(&attr_name) {
                    Some(method) => vec![method],
                    None => continue,
                }
            };

            for method in methods {
                let fact = RouteFact::new(method, path.clone(), name, route_syntax(&path), line)
                    .with_owner(owner.map(|o| o.to_string()));
                self.routes.push(BuiltRoute {
                    fact,
                    enclosing_fn: None,
                    binding: None,
                });
            }
        }
    }

    /// `.route(path, get(h).post(h2))` (Axum) and `.route(path, web::get().to(h))` (Actix).
    fn route_call(&mut self, node: &ExprMethodCall, base: &ChainBase) {
        let line = node.method.span().start().line;
        match node.args.len() {
            2 => {
                let Some(path) = string_literal(&node.args[0]) else {
                    return;
                };
                for (method, handler) in method_router(&node.args[1]) {
                    let path = join_prefix(base.scope.as_deref(), Some(&path)).unwrap_or_default();
                    self.push_route(method, path, handler, line);
                }
            }
            // web::resource("/x").route(web::get().to(h))
            1 => {
                let Some(resource) = base.resource.clone() else {
                    return;
                };
                let path = join_prefix(base.scope.as_deref(), Some(&resource)).unwrap_or_default();
                for (method, handler) in method_router(&node.args[0]) {
                    self.push_route(method, path.clone(), handler, line);
                }
            }
            _ => {}
        }
    }
}

/// The call at the bottom of a builder chain, when it opens a scope or resource.
#[derive(Debug, Default)]
struct ChainBase {
    scope: Option<String>,
    resource: Option<String>,
}

fn chain_base(node: &ExprMethodCall) -> ChainBase {
    let mut receiver: &Expr = &node.receiver;
    while let Expr::MethodCall(inner) = receiver {
        receiver = &inner.receiver;
    }
    let mut base = ChainBase::default();
    if let Expr::Call(call) = receiver {
        let path = call.args.first().and_then(string_literal);
        match call_name(call).as_deref() {
            Some("scope") => base.scope = path,
            Some("resource") => base.resource = path,
            _ => {}
        }
    }
    base
}

fn call_name(call: &ExprCall) -> Option<String> {
    match &*call.func {
        Expr::Path(p) => p.path.segments.last().map(|s| s.ident.to_string()),
        _ => None,
    }
}

/// The (method, handler) pairs a method-router expression routes to.
fn method_router(expr: &Expr) -> Vec<(HttpMethod, String)> {
    match expr {
        // get(handler)
        Expr::Call(call) => match call_name(call).and_then(|n| HttpMethod::parse(&n)) {
            Some(method) => {
                let handler = call.args.first().map(handler_name).unwrap_or_else(|| LAMBDA.to_string());
                vec![(method, handler)]
            }
            None => Vec::new(),
        },
        Expr::MethodCall(call) => {
            let name = call.method.to_string();
            // web::get().to(handler)
            if name == "to" {
                let handler = call.args.first().map(handler_name).unwrap_or_else(|| LAMBDA.to_string());
                return verbs_of(&call.receiver)
                    .into_iter()
                    .map(|m| (m, handler.clone()))
                    .collect();
            }
            // get(a).post(b)
            match HttpMethod::parse(&name) {
                Some(method) => {
                    let mut pairs = method_router(&call.receiver);
                    let handler = call.args.first().map(handler_name).unwrap_or_else(|| LAMBDA.to_string());
                    pairs.push((method, handler));
                    pairs
                }
                None => method_router(&call.receiver),
            }
        }
        _ => Vec::new(),
    }
}

/// Verbs named by `web::get()` or `web::method(Method::POST)`.
fn verbs_of(expr: &Expr) -> Vec<HttpMethod> {
    let Expr::Call(call) = expr else {
        return Vec::new();
    };
    match call_name(call).as_deref() {
        Some("method") => call
            .args
            .first()
            .and_then(|arg| match arg {
                Expr::Path(p) => p.path.segments.last().map(|s| s.ident.to_string()),
                _ => None,
            })
            .and_then(|v| HttpMethod::parse(&v))
            .into_iter()
            .collect(),
        Some(name) => HttpMethod::parse(name).into_iter().collect(),
        None => Vec::new(),
    }
}

fn handler_name(expr: &Expr) -> String {
    match expr {
        Expr::Path(path_expr) => path_expr
            .path
            .segments
            .last()
            .map(|s| s.ident.to_string())
            .unwrap_or_else(|| LAMBDA.to_string()),
        _ => LAMBDA.to_string(),
    }
}

fn string_literal(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Lit(expr_lit) => match &expr_lit.lit {
            Lit::Str(lit_str) => Some(lit_str.value()),
            _ => None,
        },
        _ => None,
    }
}

/// Rocket writes `<id>`; Axum and Actix use `:id` or `{id}`.
fn route_syntax(path: &str) -> PathSyntax {
    if path.contains('<') {
        PathSyntax::Angle
    } else {
        PathSyntax::Colon
    }
}

fn join_prefix(prefix: Option<&str>, path: Option<&str>) -> Option<String> {
    match (prefix, path) {
        (None, None) => None,
        (Some(p), None) | (None, Some(p)) => Some(p.to_string()),
        (Some(prefix), Some(path)) => {
            let prefix = prefix.trim_end_matches('/');
            let path = path.trim_start_matches('/');
            Some(if path.is_empty() {
                prefix.to_string()
            } else {
                format!("{}/{}", prefix, path)
            })
        }
    }
}

impl<'ast> Visit<'ast> for FactVisitor {
    fn visit_item_struct(&mut self, node: &'ast syn::ItemStruct) {
        if self.fn_depth > 0 {
            return;
        }
        let Some(decl) = TypeDecl::new(node.ident.to_string(), DeclKind::Struct, node.ident.span().start().line) else {
            return;
        };
        let mut decl = decl.with_namespace(self.namespace());
        decl.annotations = annotations(&node.attrs);
        if let syn::Fields::Named(fields) = &node.fields {
            for field in &fields.named {
                let Some(ident) = &field.ident else {
                    continue;
                };
                let raw = render_type(&field.ty);
                let field_annotations = annotations(&field.attrs);
                let defaulted = field_annotations
                    .iter()
                    .any(|a| a.name == "serde" && a.args.iter().any(|arg| arg == "default"))
                    || field_annotations
                        .iter()
                        .any(|a| a.name == "serde" && a.named("default").is_some());
                let mut fd = FieldDecl::new(
                    ident.to_string().trim_start_matches("r#"),
                    &raw,
                    type_map::rust::shape(&raw),
                    ident.span().start().line,
                )
                .with_default(defaulted.then(|| "Default::default()".to_string()));
                fd.annotations = field_annotations;
                decl.fields.push(fd);
            }
        }
        self.types.push(decl);
    }

    fn visit_item_enum(&mut self, node: &'ast syn::ItemEnum) {
        if self.fn_depth > 0 {
            return;
        }
        let Some(decl) = TypeDecl::new(node.ident.to_string(), DeclKind::Enum, node.ident.span().start().line) else {
            return;
        };
        let mut decl = decl.with_namespace(self.namespace());
        decl.annotations = annotations(&node.attrs);
        decl.variants = node
            .variants
            .iter()
            .map(|v| {
                annotations(&v.attrs)
                    .iter()
                    .find(|a| a.name == "serde")
                    .and_then(|a| a.string_named("rename"))
                    .unwrap_or_else(|| v.ident.to_string())
            })
            .collect();
        self.types.push(decl);
    }

    fn visit_item_trait(&mut self, node: &'ast syn::ItemTrait) {
        if self.fn_depth > 0 {
            return;
        }
        let Some(decl) = TypeDecl::new(node.ident.to_string(), DeclKind::Interface, node.ident.span().start().line) else {
            return;
        };
        let mut decl = decl.with_namespace(self.namespace());
        decl.annotations = annotations(&node.attrs);
        decl.supertypes = node
            .supertraits
            .iter()
            .map(|b| compact_tokens(&b.to_token_stream().to_string()))
            .collect();
        for item in &node.items {
            if let syn::TraitItem::Fn(f) = item {
                let mut method = method_decl(&f.sig, &f.attrs, Visibility::Public);
                method.owner = Some(decl.name.clone());
                decl.methods.push(method);
            }
        }
        self.types.push(decl);
    }

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        let name = node.sig.ident.to_string();
        if self.fn_depth == 0 {
            debug!("Found function: {}", name);
            self.functions
                .push(method_decl(&node.sig, &node.attrs, visibility(&node.vis)));
            self.attribute_routes(&name, &node.attrs, None);
        }

        let outer = self.current_fn.replace(name);
        self.fn_depth += 1;
        syn::visit::visit_block(self, &node.block);
        self.fn_depth -= 1;
        self.current_fn = outer;
    }

    fn visit_item_impl(&mut self, node: &'ast syn::ItemImpl) {
        if self.fn_depth > 0 {
            return;
        }
        let Type::Path(self_ty) = &*node.self_ty else {
            return;
        };
        let Some(owner) = self_ty.path.segments.last().map(|s| s.ident.to_string()) else {
            return;
        };
        if let Some((_, trait_path, _)) = &node.trait_ {
            if let Some(segment) = trait_path.segments.last() {
                self.trait_impls.push((owner.clone(), segment.ident.to_string()));
            }
        }
        for item in &node.items {
            let syn::ImplItem::Fn(f) = item else {
                continue;
            };
            let name = f.sig.ident.to_string();
            let mut method = method_decl(&f.sig, &f.attrs, visibility(&f.vis));
            method.owner = Some(owner.clone());
            self.impl_methods.push(method);
            self.attribute_routes(&name, &f.attrs, Some(&owner));

            let outer = self.current_fn.replace(name);
            self.fn_depth += 1;
            syn::visit::visit_block(self, &f.block);
            self.fn_depth -= 1;
            self.current_fn = outer;
        }
    }

    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        self.modules.push(node.ident.to_string());
        syn::visit::visit_item_mod(self, node);
        self.modules.pop();
    }

    fn visit_local(&mut self, node: &'ast syn::Local) {
        let binding = match &node.pat {
            Pat::Ident(p) => Some(p.ident.to_string()),
            Pat::Type(p) => match &*p.pat {
                Pat::Ident(inner) => Some(inner.ident.to_string()),
                _ => None,
            },
            _ => None,
        };
        let outer = std::mem::replace(&mut self.current_binding, binding);
        syn::visit::visit_local(self, node);
        self.current_binding = outer;
    }

    fn visit_item_use(&mut self, node: &'ast syn::ItemUse) {
        if self.fn_depth == 0 {
            flatten_use_tree(String::new(), &node.tree, &mut self.imports);
        }
    }

    fn visit_expr_method_call(&mut self, node: &'ast ExprMethodCall) {
        let method_name = node.method.to_string();
        let base = chain_base(node);

        match method_name.as_str() {
            "route" => self.route_call(node, &base),
            // web::resource("/x").to(h)
            "to" if base.resource.is_some() => {
                let path = join_prefix(base.scope.as_deref(), base.resource.as_deref()).unwrap_or_default();
                let handler = node.args.first().map(handler_name).unwrap_or_else(|| LAMBDA.to_string());
                self.push_route(HttpMethod::Get, path, handler, node.method.span().start().line);
            }
            "nest" => {
                if let Some(prefix) = node.args.first().and_then(string_literal) {
                    self.visit_expr(&node.receiver);
                    let target = match node.args.iter().nth(1) {
                        Some(Expr::Call(call)) => call_name(call).map(NestTarget::Function),
                        Some(Expr::Path(local)) => local.path.get_ident().map(|binding| NestTarget::Local {
                            function: self.current_fn.clone(),
                            binding: binding.to_string(),
                        }),
                        _ => None,
                    };
                    if let Some(target) = target {
                        let prefix = join_prefix(self.group().as_deref(), Some(&prefix)).unwrap_or_default();
                        self.nests.push(NestCall { prefix, target });
                    }
                    self.prefixes.push(prefix);
                    for arg in node.args.iter().skip(1) {
                        self.visit_expr(arg);
                    }
                    self.prefixes.pop();
                    return;
                }
            }
            _ => {}
        }

        self.visit_expr(&node.receiver);
        match base.scope {
            Some(scope) => {
                self.prefixes.push(scope);
                for arg in &node.args {
                    self.visit_expr(arg);
                }
                self.prefixes.pop();
            }
            None => {
                for arg in &node.args {
                    self.visit_expr(arg);
                }
            }
        }
    }
}

fn visibility(vis: &syn::Visibility) -> Visibility {
    match vis {
        syn::Visibility::Public(_) => Visibility::Public,
        syn::Visibility::Restricted(_) => Visibility::Internal,
        syn::Visibility::Inherited => Visibility::Private,
    }
}

fn method_decl(sig: &syn::Signature, attrs: &[Attribute], vis: Visibility) -> MethodDecl {
    let mut method = MethodDecl::new(sig.ident.to_string(), sig.ident.span().start().line);
    method.is_async = sig.asyncness.is_some();
    method.visibility = vis;
    method.annotations = annotations(attrs);
    method.return_type = match &sig.output {
        syn::ReturnType::Default => None,
        syn::ReturnType::Type(_, ty) => Some(render_type(ty)),
    };
    for input in &sig.inputs {
        let FnArg::Typed(pat_type) = input else {
            continue;
        };
        let raw = render_type(&pat_type.ty);
        let mut param = Param::new(pattern_name(&pat_type.pat), &raw);
        param.required = !type_map::rust::shape(&raw).optional;
        param.annotations = annotations(&pat_type.attrs);
        method.params.push(param);
    }
    method
}

/// Binding name of a parameter pattern: `id`, `Path(id)`, `Json(payload)`.
fn pattern_name(pat: &Pat) -> String {
    match pat {
        Pat::Ident(p) => p.ident.to_string(),
        Pat::TupleStruct(p) => p
            .elems
            .iter()
            .map(pattern_name)
            .collect::<Vec<_>>()
            .join("_"),
        Pat::Tuple(p) => p
            .elems
            .iter()
            .map(pattern_name)
            .collect::<Vec<_>>()
            .join("_"),
        Pat::Type(p) => pattern_name(&p.pat),
        Pat::Reference(p) => pattern_name(&p.pat),
        Pat::Struct(p) => p
            .path
            .segments
            .last()
            .map(|s| s.ident.to_string().to_lowercase())
            .unwrap_or_else(|| "_".to_string()),
        _ => "_".to_string(),
    }
}

fn annotations(attrs: &[Attribute]) -> Vec<Annotation> {
    attrs
        .iter()
        .filter(|a| !a.path().is_ident("doc"))
        .map(|attr| {
            let name = attr
                .path()
                .segments
                .iter()
                .map(|s| s.ident.to_string())
                .collect::<Vec<_>>()
                .join("::");
            let mut ann = Annotation::new(name, attr.span().start().line);
            match &attr.meta {
                Meta::List(list) => {
                    let (args, named) = parse_annotation_args(&list.tokens.to_string());
                    ann.args = args;
                    ann.named_args = named;
                }
                Meta::NameValue(nv) => {
                    ann.args.push(nv.value.to_token_stream().to_string());
                }
                Meta::Path(_) => {}
            }
            ann
        })
        .collect()
}

fn flatten_use_tree(prefix: String, tree: &UseTree, out: &mut Vec<String>) {
    let join = |name: &str| {
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}::{}", prefix, name)
        }
    };
    match tree {
        UseTree::Path(p) => flatten_use_tree(join(&p.ident.to_string()), &p.tree, out),
        UseTree::Name(n) => out.push(join(&n.ident.to_string())),
        UseTree::Rename(r) => out.push(join(&r.ident.to_string())),
        UseTree::Glob(_) => out.push(join("*")),
        UseTree::Group(g) => {
            for item in &g.items {
                flatten_use_tree(prefix.clone(), item, out);
            }
        }
    }
}

/// Render a type as compact source text: `Vec<User>`, `Option<&str>` becomes `Option<str>`.
///
/// References and lifetimes are dropped; everything else keeps its shape so
/// the string can be fed back to `syn::parse_str`.
pub fn render_type(ty: &Type) -> String {
    match ty {
        Type::Path(type_path) => render_path(&type_path.path),
        Type::Reference(r) => render_type(&r.elem),
        Type::Ptr(p) => render_type(&p.elem),
        Type::Paren(p) => render_type(&p.elem),
        Type::Group(g) => render_type(&g.elem),
        Type::Slice(s) => format!("[{}]", render_type(&s.elem)),
        Type::Array(a) => format!(
            "[{}; {}]",
            render_type(&a.elem),
            compact_tokens(&a.len.to_token_stream().to_string())
        ),
        Type::Tuple(t) => format!(
            "({})",
            t.elems.iter().map(render_type).collect::<Vec<_>>().join(", ")
        ),
        other => compact_tokens(&other.to_token_stream().to_string()),
    }
}

fn render_path(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|segment| {
            let name = segment.ident.to_string();
            match &segment.arguments {
                syn::PathArguments::AngleBracketed(args) => {
                    let rendered: Vec<String> = args
                        .args
                        .iter()
                        .filter_map(|arg| match arg {
                            syn::GenericArgument::Type(t) => Some(render_type(t)),
                            syn::GenericArgument::Lifetime(_) => None,
                            other => Some(compact_tokens(&other.to_token_stream().to_string())),
                        })
                        .collect();
                    if rendered.is_empty() {
                        name
                    } else {
                        format!("{}<{}>", name, rendered.join(", "))
                    }
                }
                _ => name,
            }
        })
        .collect::<Vec<_>>()
        .join("::")
}

/// Undo the token printer's spacing: `Vec < u8 >` -> `Vec<u8>`.
fn compact_tokens(tokens: &str) -> String {
    tokens
        .replace(" :: ", "::")
        .replace(":: ", "::")
        .replace(" < ", "<")
        .replace("< ", "<")
        .replace(" >", ">")
        .replace(" ,", ",")
        .replace("& ", "&")
        .trim()
        .to_string()
}
