//! Language-agnostic fact records produced by every backend.
//!
//! A backend turns one file into a [`SourceUnit`]. The unit owns the raw
//! content, the optional native syntax tree and four fact collections: type
//! declarations, free functions, route facts and resource facts. Nothing in a
//! unit points into another file; resolving a handler name to the file that
//! defines it is left to the framework plugins.

use crate::parser::Language;
use crate::path::PathSyntax;
use crate::resource::ResourceStyle;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Native syntax tree retained by structural backends.
///
/// The tree is owned by exactly one [`SourceUnit`]. Tree-sitter trees wrap
/// memory allocated by the C runtime and are freed when the value is dropped.
/// The `syn` tree of a Rust file is not kept: it holds `proc_macro2` spans,
/// which cannot cross threads, so it is dropped once its facts are extracted.
#[derive(Debug)]
pub enum SyntaxTree {
    /// A tree-sitter tree (Python, Go)
    TreeSitter(tree_sitter::Tree),
}

/// One parsed source file and the facts extracted from it.
#[derive(Debug)]
pub struct SourceUnit {
    pub path: PathBuf,
    pub language: Language,
    pub content: String,
    pub tree: Option<SyntaxTree>,
    pub types: Vec<TypeDecl>,
    pub functions: Vec<MethodDecl>,
    pub routes: Vec<RouteFact>,
    pub resources: Vec<ResourceFact>,
    pub imports: Vec<String>,
}

impl SourceUnit {
    /// Create an empty unit for `path`.
    pub fn new(path: impl Into<PathBuf>, language: Language, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            language,
            content: content.into(),
            tree: None,
            types: Vec::new(),
            functions: Vec::new(),
            routes: Vec::new(),
            resources: Vec::new(),
            imports: Vec::new(),
        }
    }

    /// Drop the native syntax tree, keeping the extracted facts.
    pub fn release_tree(&mut self) {
        if self.tree.take().is_some() {
            log::debug!("Released syntax tree for {}", self.path.display());
        }
    }

    /// Total number of facts across the four collections.
    pub fn fact_count(&self) -> usize {
        self.types.len() + self.functions.len() + self.routes.len() + self.resources.len()
    }

    /// True when the backend found nothing in this file.
    pub fn is_empty(&self) -> bool {
        self.fact_count() == 0
    }

    /// All callables in the unit: free functions followed by type methods.
    pub fn all_methods(&self) -> impl Iterator<Item = &MethodDecl> {
        self.functions
            .iter()
            .chain(self.types.iter().flat_map(|t| t.methods.iter()))
    }

    /// Find a declared type by its simple name.
    pub fn find_type(&self, name: &str) -> Option<&TypeDecl> {
        self.types.iter().find(|t| t.name == name)
    }
}

/// What kind of aggregate a [`TypeDecl`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclKind {
    Class,
    Struct,
    Record,
    Interface,
    Enum,
    Module,
    Table,
}

/// A named aggregate: class, struct, record, data class, case class.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub kind: DeclKind,
    pub namespace: Option<String>,
    pub supertypes: Vec<String>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub annotations: Vec<Annotation>,
    /// Variant names when `kind` is [`DeclKind::Enum`]
    pub variants: Vec<String>,
    pub line: usize,
}

impl TypeDecl {
    /// Returns `None` for an empty name so a partial match never becomes a fact.
    pub fn new(name: impl Into<String>, kind: DeclKind, line: usize) -> Option<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return None;
        }
        Some(Self {
            name,
            kind,
            namespace: None,
            supertypes: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            annotations: Vec::new(),
            variants: Vec::new(),
            line,
        })
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace.filter(|ns| !ns.is_empty());
        self
    }

    /// Namespace-qualified name, `Outer.Inner` style.
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}.{}", ns, self.name),
            None => self.name.clone(),
        }
    }

    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        find_annotation(&self.annotations, name)
    }

    pub fn has_annotation(&self, name: &str) -> bool {
        self.annotation(name).is_some()
    }

    pub fn extends(&self, supertype: &str) -> bool {
        self.supertypes
            .iter()
            .any(|s| s == supertype || s.rsplit(['.', ':', '\\']).next() == Some(supertype))
    }
}

/// Coarse classification of a field's declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Primitive,
    Aggregate,
    Sequence,
    Map,
    Optional,
    Time,
    Unknown,
}

/// One field or property of a [`TypeDecl`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub raw_type: String,
    pub kind: TypeKind,
    /// Element type, present only when `kind` is `Sequence` or `Map`
    pub element_type: Option<String>,
    /// Key type, present only when `kind` is `Map`
    pub key_type: Option<String>,
    pub optional: bool,
    pub default_value: Option<String>,
    pub annotations: Vec<Annotation>,
    pub line: usize,
}

impl FieldDecl {
    /// Build a field, deriving kind and optionality from `shape`.
    pub fn new(
        name: impl Into<String>,
        raw_type: impl Into<String>,
        shape: crate::type_map::TypeShape,
        line: usize,
    ) -> Self {
        let (element_type, key_type) = match shape.kind {
            TypeKind::Sequence => (shape.element, None),
            TypeKind::Map => (shape.element, shape.key),
            _ => (None, None),
        };
        Self {
            name: name.into(),
            raw_type: raw_type.into().trim().to_string(),
            kind: shape.kind,
            element_type,
            key_type,
            optional: shape.optional,
            default_value: None,
            annotations: Vec::new(),
            line,
        }
    }

    pub fn with_default(mut self, default_value: Option<String>) -> Self {
        self.default_value = default_value
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        self
    }

    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        find_annotation(&self.annotations, name)
    }

    /// A field is required when it is neither optional nor defaulted.
    pub fn is_required(&self) -> bool {
        !self.optional && self.default_value.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Protected,
    Internal,
    Private,
}

/// One parameter of a [`MethodDecl`].
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub raw_type: String,
    pub required: bool,
    pub default_value: Option<String>,
    pub annotations: Vec<Annotation>,
}

impl Param {
    pub fn new(name: impl Into<String>, raw_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_type: raw_type.into().trim().to_string(),
            required: true,
            default_value: None,
            annotations: Vec::new(),
        }
    }

    pub fn with_default(mut self, default_value: Option<String>) -> Self {
        self.default_value = default_value
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if self.default_value.is_some() {
            self.required = false;
        }
        self
    }

    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        find_annotation(&self.annotations, name)
    }
}

/// A free function or a type's method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub is_async: bool,
    pub visibility: Visibility,
    pub annotations: Vec<Annotation>,
    /// Enclosing type for methods, `None` for free functions
    pub owner: Option<String>,
    pub line: usize,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_type: None,
            is_async: false,
            visibility: Visibility::Public,
            annotations: Vec::new(),
            owner: None,
            line,
        }
    }

    pub fn annotation(&self, name: &str) -> Option<&Annotation> {
        find_annotation(&self.annotations, name)
    }

    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// A decorator, attribute, annotation or macro marker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Annotation {
    pub name: String,
    pub args: Vec<String>,
    pub named_args: Vec<(String, String)>,
    pub line: usize,
}

impl Annotation {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            named_args: Vec::new(),
            line,
        }
    }

    /// Last segment of a dotted or scoped name (`web.get` -> `get`).
    pub fn simple_name(&self) -> &str {
        self.name
            .rsplit(['.', ':', '\\'])
            .next()
            .unwrap_or(&self.name)
    }

    pub fn named(&self, key: &str) -> Option<&str> {
        self.named_args
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Positional argument `index`, unquoted when it is a string literal.
    pub fn string_arg(&self, index: usize) -> Option<String> {
        self.args
            .get(index)
            .and_then(|a| crate::lexer::string_literal(a))
    }

    /// Named argument `key`, unquoted when it is a string literal.
    pub fn string_named(&self, key: &str) -> Option<String> {
        self.named(key).and_then(crate::lexer::string_literal)
    }
}

fn find_annotation<'a>(annotations: &'a [Annotation], name: &str) -> Option<&'a Annotation> {
    annotations
        .iter()
        .find(|a| a.name == name || a.simple_name() == name)
}

/// HTTP methods recognized by route extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpMethod {
    /// Parse a method name in any case (`get`, `GET`, `HttpGet` is not accepted).
    pub fn parse(method: &str) -> Option<Self> {
        match method.trim().to_lowercase().as_str() {
            "get" => Some(HttpMethod::Get),
            "post" => Some(HttpMethod::Post),
            "put" => Some(HttpMethod::Put),
            "delete" | "del" => Some(HttpMethod::Delete),
            "patch" => Some(HttpMethod::Patch),
            "head" => Some(HttpMethod::Head),
            "options" => Some(HttpMethod::Options),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One route declaration in framework-native syntax.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteFact {
    pub method: HttpMethod,
    /// Raw path template, not yet normalized
    pub path: String,
    /// Handler function/method name, or `lambda` for inline closures
    pub handler: String,
    pub owner: Option<String>,
    /// Raw prefix contributed by an enclosing group/scope/controller
    pub group: Option<String>,
    pub syntax: PathSyntax,
    pub line: usize,
}

impl RouteFact {
    pub fn new(
        method: HttpMethod,
        path: impl Into<String>,
        handler: impl Into<String>,
        syntax: PathSyntax,
        line: usize,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            handler: handler.into(),
            owner: None,
            group: None,
            syntax,
            line,
        }
    }

    pub fn with_owner(mut self, owner: Option<String>) -> Self {
        self.owner = owner.filter(|o| !o.is_empty());
        self
    }

    pub fn with_group(mut self, group: Option<String>) -> Self {
        self.group = group.filter(|g| !g.is_empty() && g != "/");
        self
    }

    pub fn is_lambda(&self) -> bool {
        self.handler == LAMBDA
    }
}

/// Handler name used for inline closures and blocks.
pub const LAMBDA: &str = "lambda";

/// A resource macro (`resources :users`) that expands into CRUD routes.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceFact {
    pub path: String,
    pub controller: String,
    pub only: Vec<String>,
    pub except: Vec<String>,
    pub is_api: bool,
    pub singular: bool,
    pub style: ResourceStyle,
    pub group: Option<String>,
    pub syntax: PathSyntax,
    pub line: usize,
}

impl ResourceFact {
    pub fn new(
        path: impl Into<String>,
        controller: impl Into<String>,
        style: ResourceStyle,
        line: usize,
    ) -> Self {
        Self {
            path: path.into(),
            controller: controller.into(),
            only: Vec::new(),
            except: Vec::new(),
            is_api: false,
            singular: false,
            style,
            group: None,
            syntax: style.path_syntax(),
            line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_map::TypeShape;

    #[test]
    fn test_type_decl_rejects_empty_name() {
        assert!(TypeDecl::new("", DeclKind::Class, 1).is_none());
        assert!(TypeDecl::new("   ", DeclKind::Class, 1).is_none());
        assert!(TypeDecl::new("User", DeclKind::Class, 1).is_some());
    }

    #[test]
    fn test_field_element_only_for_collections() {
        let shape = TypeShape {
            kind: TypeKind::Primitive,
            element: Some("ignored".to_string()),
            key: Some("ignored".to_string()),
            optional: false,
        };
        let field = FieldDecl::new("name", "string", shape, 3);
        assert_eq!(field.element_type, None);
        assert_eq!(field.key_type, None);

        let shape = TypeShape {
            kind: TypeKind::Sequence,
            element: Some("int".to_string()),
            key: Some("ignored".to_string()),
            optional: false,
        };
        let field = FieldDecl::new("ids", "List<int>", shape, 4);
        assert_eq!(field.element_type.as_deref(), Some("int"));
        assert_eq!(field.key_type, None);
    }

    #[test]
    fn test_http_method_parse() {
        assert_eq!(HttpMethod::parse("GET"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::parse("patch"), Some(HttpMethod::Patch));
        assert_eq!(HttpMethod::parse("fetch"), None);
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }

    #[test]
    fn test_annotation_simple_name_and_args() {
        let mut ann = Annotation::new("web.get", 1);
        ann.args.push("\"/users\"".to_string());
        ann.named_args.push(("name".to_string(), "'users'".to_string()));
        assert_eq!(ann.simple_name(), "get");
        assert_eq!(ann.string_arg(0).as_deref(), Some("/users"));
        assert_eq!(ann.string_named("name").as_deref(), Some("users"));
        assert_eq!(ann.string_arg(1), None);
    }

    #[test]
    fn test_release_tree_keeps_facts() {
        let mut unit = SourceUnit::new("a.go", Language::Go, "package a");
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&tree_sitter_go::LANGUAGE.into()).unwrap();
        unit.tree = parser.parse("package a", None).map(SyntaxTree::TreeSitter);
        assert!(unit.tree.is_some());
        unit.types.push(TypeDecl::new("A", DeclKind::Struct, 1).unwrap());
        unit.release_tree();
        assert!(unit.tree.is_none());
        assert_eq!(unit.fact_count(), 1);
    }
}
