//! Kotlin type table.

use super::{generic, map_form, map_with, sequence_form, shape_with, simple_name, type_args};
use super::{Form, TypeMapping, TypeShape};

pub fn map_type(raw: &str) -> TypeMapping {
    map_with(raw, classify, primitive)
}

pub fn shape(raw: &str) -> TypeShape {
    shape_with(raw, classify, primitive)
}

fn classify(ty: &str) -> Form {
    let ty = super::java::strip_modifiers(ty);
    if let Some(inner) = ty.strip_suffix('?') {
        return Form::Optional(inner.to_string());
    }
    if let Some((base, inner)) = generic(ty, '<', '>') {
        let args = type_args(inner);
        let first = args.first().cloned().unwrap_or_default();
        return match simple_name(base) {
            "Deferred" | "ResponseEntity" | "Mono" | "Response" => Form::Wrapper(first),
            "List" | "MutableList" | "ArrayList" | "Set" | "MutableSet" | "HashSet" | "Collection"
            | "Iterable" | "Array" | "Sequence" | "Flow" | "Flux" => sequence_form(&args),
            "Map" | "MutableMap" | "HashMap" | "LinkedHashMap" => map_form(&args),
            other => Form::Named(other.to_string()),
        };
    }
    match simple_name(ty) {
        "IntArray" | "LongArray" | "DoubleArray" | "FloatArray" | "BooleanArray" => {
            Form::Sequence(ty.trim_end_matches("Array").to_string())
        }
        other => Form::Named(other.to_string()),
    }
}

fn primitive(name: &str) -> Option<TypeMapping> {
    Some(match name {
        "String" | "Char" => TypeMapping::STRING,
        "Int" | "Short" | "Byte" | "UInt" => TypeMapping::INT32,
        "Long" | "ULong" | "BigInteger" => TypeMapping::INT64,
        "Float" => TypeMapping::FLOAT,
        "Double" => TypeMapping::DOUBLE,
        "BigDecimal" => TypeMapping::NUMBER,
        "Boolean" => TypeMapping::BOOLEAN,
        "LocalDateTime" | "Instant" | "OffsetDateTime" | "ZonedDateTime" | "Date" => TypeMapping::DATE_TIME,
        "LocalDate" => TypeMapping::DATE,
        "LocalTime" => TypeMapping::TIME,
        "UUID" => TypeMapping::UUID,
        "ByteArray" => TypeMapping::BYTE,
        "MultipartFile" => TypeMapping::BINARY,
        "Any" | "Unit" | "JsonObject" | "JsonElement" => TypeMapping::OBJECT,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeKind;

    #[test]
    fn test_nullable() {
        assert_eq!(map_type("String?"), TypeMapping::STRING);
        assert!(shape("Int?").optional);
        assert!(!shape("Int").optional);
    }

    #[test]
    fn test_collections() {
        assert_eq!(map_type("List<User>"), TypeMapping::ARRAY);
        assert_eq!(map_type("IntArray"), TypeMapping::ARRAY);
        assert_eq!(map_type("Map<String, Int>"), TypeMapping::OBJECT);
        assert_eq!(shape("MutableList<String>").kind, TypeKind::Sequence);
        assert_eq!(map_type("ByteArray"), TypeMapping::BYTE);
    }
}
