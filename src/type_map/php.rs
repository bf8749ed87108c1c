//! PHP type table (declared property types and docblock forms).

use super::{generic, map_form, map_with, sequence_form, shape_with, simple_name, strip_null_union, type_args};
use super::{Form, TypeMapping, TypeShape};

pub fn map_type(raw: &str) -> TypeMapping {
    map_with(raw, classify, primitive)
}

pub fn shape(raw: &str) -> TypeShape {
    shape_with(raw, classify, primitive)
}

fn classify(ty: &str) -> Form {
    let ty = ty.trim();
    if let Some(inner) = ty.strip_prefix('?') {
        return Form::Optional(inner.to_string());
    }
    if let Some(inner) = strip_null_union(ty, &["null"]) {
        return Form::Optional(inner);
    }
    if let Some(inner) = ty.strip_suffix("[]") {
        return Form::Sequence(inner.to_string());
    }
    if let Some((base, inner)) = generic(ty, '<', '>') {
        let args = type_args(inner);
        return match simple_name(base) {
            "array" | "list" | "Collection" | "iterable" | "non-empty-array" if args.len() == 1 => {
                sequence_form(&args)
            }
            "array" | "Collection" | "iterable" => map_form(&args),
            other => Form::Named(other.to_string()),
        };
    }
    match simple_name(ty) {
        "array" | "iterable" | "Collection" => Form::Sequence("mixed".to_string()),
        other => Form::Named(other.to_string()),
    }
}

fn primitive(name: &str) -> Option<TypeMapping> {
    Some(match name {
        "string" => TypeMapping::STRING,
        "int" | "integer" => TypeMapping::INTEGER,
        "float" | "double" => TypeMapping::NUMBER,
        "bool" | "boolean" | "true" | "false" => TypeMapping::BOOLEAN,
        "DateTime" | "DateTimeInterface" | "DateTimeImmutable" | "Carbon" | "CarbonImmutable" => {
            TypeMapping::DATE_TIME
        }
        "UuidInterface" | "Uuid" => TypeMapping::UUID,
        "UploadedFile" => TypeMapping::BINARY,
        "mixed" | "object" | "stdClass" => TypeMapping::OBJECT,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeKind;

    #[test]
    fn test_nullable_forms() {
        assert_eq!(map_type("?int"), TypeMapping::INTEGER);
        assert_eq!(map_type("string|null"), TypeMapping::STRING);
        assert!(shape("?string").optional);
        assert!(shape("null|int").optional);
    }

    #[test]
    fn test_arrays() {
        assert_eq!(map_type("array"), TypeMapping::ARRAY);
        assert_eq!(map_type("User[]"), TypeMapping::ARRAY);
        assert_eq!(map_type("array<string, int>"), TypeMapping::OBJECT);
        assert_eq!(shape("array<int>").kind, TypeKind::Sequence);
        assert_eq!(map_type("\\Carbon\\Carbon"), TypeMapping::DATE_TIME);
    }
}
