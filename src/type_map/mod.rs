//! Per-language type tables mapping source type strings to OpenAPI types.
//!
//! Every language module exposes `map_type` and `shape`, both pure functions
//! built from two language-specific pieces: a `classify` step that recognizes
//! one layer of the language's nullability, wrapper, sequence and map syntax,
//! and a `primitive` table matched on the remaining bare type name. The
//! drivers here apply the steps in a fixed order so all languages degrade the
//! same way: anything unrecognized maps to a plain `object`.

pub mod cpp;
pub mod csharp;
pub mod elixir;
pub mod go;
pub mod java;
pub mod kotlin;
pub mod php;
pub mod python;
pub mod ruby;
pub mod rust;
pub mod scala;
pub mod swift;
pub mod typescript;

use crate::lexer::split_top_level;
use crate::model::TypeKind;

/// An OpenAPI `(type, format)` pair. An empty format means none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeMapping {
    pub openapi_type: &'static str,
    pub format: &'static str,
}

impl TypeMapping {
    pub const OBJECT: TypeMapping = TypeMapping::new("object", "");
    pub const ARRAY: TypeMapping = TypeMapping::new("array", "");
    pub const STRING: TypeMapping = TypeMapping::new("string", "");
    pub const BOOLEAN: TypeMapping = TypeMapping::new("boolean", "");
    pub const INT32: TypeMapping = TypeMapping::new("integer", "int32");
    pub const INT64: TypeMapping = TypeMapping::new("integer", "int64");
    pub const INTEGER: TypeMapping = TypeMapping::new("integer", "");
    pub const FLOAT: TypeMapping = TypeMapping::new("number", "float");
    pub const DOUBLE: TypeMapping = TypeMapping::new("number", "double");
    pub const NUMBER: TypeMapping = TypeMapping::new("number", "");
    pub const DATE_TIME: TypeMapping = TypeMapping::new("string", "date-time");
    pub const DATE: TypeMapping = TypeMapping::new("string", "date");
    pub const TIME: TypeMapping = TypeMapping::new("string", "time");
    pub const UUID: TypeMapping = TypeMapping::new("string", "uuid");
    pub const BINARY: TypeMapping = TypeMapping::new("string", "binary");
    pub const BYTE: TypeMapping = TypeMapping::new("string", "byte");
    pub const DECIMAL: TypeMapping = TypeMapping::new("number", "decimal");
    pub const EMAIL: TypeMapping = TypeMapping::new("string", "email");
    pub const URI: TypeMapping = TypeMapping::new("string", "uri");

    pub const fn new(openapi_type: &'static str, format: &'static str) -> Self {
        Self {
            openapi_type,
            format,
        }
    }

    pub fn format(&self) -> Option<String> {
        (!self.format.is_empty()).then(|| self.format.to_string())
    }

    pub fn is_object(&self) -> bool {
        self.openapi_type == "object"
    }

    fn is_temporal(&self) -> bool {
        matches!(self.format, "date-time" | "date" | "time")
    }
}

/// Structural reading of a type string, used to derive [`TypeKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeShape {
    pub kind: TypeKind,
    /// Element of a sequence, value of a map, or the wrapped type of an optional
    pub element: Option<String>,
    /// Key of a map
    pub key: Option<String>,
    pub optional: bool,
}

impl TypeShape {
    fn of(kind: TypeKind) -> Self {
        Self {
            kind,
            element: None,
            key: None,
            optional: false,
        }
    }
}

/// One layer of a type string as classified by a language table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Form {
    /// Nullability marker around the inner type (`T?`, `Option<T>`, `*T`)
    Optional(String),
    /// Transparent wrapper (`Task<T>`, `Future[T]`, `Box<T>`)
    Wrapper(String),
    Sequence(String),
    Map { key: Option<String>, value: String },
    /// A bare name to look up in the primitive table
    Named(String),
}

pub type Classify = fn(&str) -> Form;
pub type Primitive = fn(&str) -> Option<TypeMapping>;

/// Shared `map_type` driver.
pub fn map_with(raw: &str, classify: Classify, primitive: Primitive) -> TypeMapping {
    match peel(raw, classify) {
        Form::Sequence(_) => TypeMapping::ARRAY,
        Form::Map { .. } => TypeMapping::OBJECT,
        Form::Named(name) => primitive(&name).unwrap_or(TypeMapping::OBJECT),
        Form::Optional(_) | Form::Wrapper(_) => TypeMapping::OBJECT,
    }
}

/// Strip one nullability layer and one wrapper layer, in that order.
fn peel(raw: &str, classify: Classify) -> Form {
    let mut form = classify(raw.trim());
    if let Form::Optional(inner) = form {
        form = classify(inner.trim());
    }
    if let Form::Wrapper(inner) = form {
        form = classify(inner.trim());
        if let Form::Optional(inner) = form {
            form = classify(inner.trim());
        }
    }
    form
}

/// Shared `shape` driver.
pub fn shape_with(raw: &str, classify: Classify, primitive: Primitive) -> TypeShape {
    let mut form = classify(raw.trim());
    if let Form::Wrapper(inner) = form {
        form = classify(inner.trim());
    }
    match form {
        Form::Optional(inner) => TypeShape {
            kind: TypeKind::Optional,
            element: Some(inner.trim().to_string()),
            key: None,
            optional: true,
        },
        Form::Wrapper(_) => TypeShape::of(TypeKind::Unknown),
        Form::Sequence(element) => TypeShape {
            element: Some(element.trim().to_string()),
            ..TypeShape::of(TypeKind::Sequence)
        },
        Form::Map { key, value } => TypeShape {
            kind: TypeKind::Map,
            element: Some(value.trim().to_string()),
            key: key.map(|k| k.trim().to_string()),
            optional: false,
        },
        Form::Named(name) => match primitive(&name) {
            Some(m) if m.is_temporal() => TypeShape::of(TypeKind::Time),
            Some(m) if m.is_object() => TypeShape::of(TypeKind::Unknown),
            Some(_) => TypeShape::of(TypeKind::Primitive),
            None if is_type_name(&name) => TypeShape::of(TypeKind::Aggregate),
            None => TypeShape::of(TypeKind::Unknown),
        },
    }
}

/// Split `Base<Inner>` at the leftmost opener and the rightmost closer.
///
/// Returns `None` unless the string ends with `close`, so `Map<K, V>` yields
/// `("Map", "K, V")` and nested generics stay intact in the inner part.
pub fn generic(ty: &str, open: char, close: char) -> Option<(&str, &str)> {
    let ty = ty.trim();
    if !ty.ends_with(close) {
        return None;
    }
    let start = ty.find(open)?;
    let base = ty[..start].trim();
    if base.is_empty() {
        return None;
    }
    Some((base, &ty[start + 1..ty.len() - close.len_utf8()]))
}

/// Top-level comma-separated generic arguments.
pub fn type_args(inner: &str) -> Vec<String> {
    split_top_level(inner, b',')
}

/// Last segment of a qualified name: `java.util.List` -> `List`.
pub fn simple_name(name: &str) -> &str {
    name.rsplit(['.', ':', '\\']).next().unwrap_or(name).trim()
}

/// Build a map form from generic arguments: one argument means value only.
pub fn map_form(args: &[String]) -> Form {
    match args {
        [key, value, ..] => Form::Map {
            key: Some(key.clone()),
            value: value.clone(),
        },
        [value] => Form::Map {
            key: None,
            value: value.clone(),
        },
        [] => Form::Map {
            key: None,
            value: "object".to_string(),
        },
    }
}

/// Sequence form from generic arguments, defaulting the element to `object`.
pub fn sequence_form(args: &[String]) -> Form {
    Form::Sequence(args.first().cloned().unwrap_or_else(|| "object".to_string()))
}

/// Strip `T | null` / `T | None` / `null | T` unions to the non-null member.
pub fn strip_null_union(ty: &str, nulls: &[&str]) -> Option<String> {
    let members = split_top_level(ty, b'|');
    if members.len() < 2 {
        return None;
    }
    let rest: Vec<&String> = members
        .iter()
        .filter(|m| !nulls.contains(&m.as_str()))
        .collect();
    if rest.len() == members.len() {
        return None;
    }
    Some(
        rest.iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(" | "),
    )
}

fn is_type_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_' || c == '\\')
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | ':' | '\\'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_takes_outermost_pair() {
        assert_eq!(
            generic("Map<String, List<Foo>>", '<', '>'),
            Some(("Map", "String, List<Foo>"))
        );
        assert_eq!(generic("List<int>?", '<', '>'), None);
        assert_eq!(generic("<T>", '<', '>'), None);
    }

    #[test]
    fn test_type_args_depth_aware() {
        assert_eq!(type_args("String, List<Foo>"), vec!["String", "List<Foo>"]);
    }

    #[test]
    fn test_strip_null_union() {
        assert_eq!(strip_null_union("string | null", &["null"]).as_deref(), Some("string"));
        assert_eq!(strip_null_union("None | int", &["None"]).as_deref(), Some("int"));
        assert_eq!(strip_null_union("string | number", &["null"]), None);
        assert_eq!(strip_null_union("string", &["null"]), None);
    }

    #[test]
    fn test_simple_name() {
        assert_eq!(simple_name("java.util.List"), "List");
        assert_eq!(simple_name("std::vector"), "vector");
        assert_eq!(simple_name("App\\Models\\User"), "User");
    }

    #[test]
    fn test_mapping_is_pure_for_every_language() {
        let samples = ["string", "int", "List<User>", "Optional<int>", "Foo", "", "  ?? "];
        for language in crate::parser::Language::all() {
            let backend = crate::parser::backend_for(*language);
            for sample in samples {
                assert_eq!(backend.map_type(sample), backend.map_type(sample));
                assert_eq!(backend.shape(sample), backend.shape(sample));
            }
        }
    }
}
