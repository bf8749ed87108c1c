//! Scala type table.

use super::{generic, map_form, map_with, sequence_form, shape_with, simple_name, type_args};
use super::{Form, TypeMapping, TypeShape};

pub fn map_type(raw: &str) -> TypeMapping {
    map_with(raw, classify, primitive)
}

pub fn shape(raw: &str) -> TypeShape {
    shape_with(raw, classify, primitive)
}

fn classify(ty: &str) -> Form {
    let ty = ty.trim();
    if let Some((base, inner)) = generic(ty, '[', ']') {
        let args = type_args(inner);
        let first = args.first().cloned().unwrap_or_default();
        return match simple_name(base) {
            "Option" => Form::Optional(first),
            "Future" | "IO" | "Task" | "Action" | "Try" | "ZIO" => Form::Wrapper(args.last().cloned().unwrap_or(first)),
            "Seq" | "List" | "Vector" | "Set" | "Array" | "IndexedSeq" | "Iterable" | "Chunk"
            | "NonEmptyList" => sequence_form(&args),
            "Map" => map_form(&args),
            other => Form::Named(other.to_string()),
        };
    }
    Form::Named(simple_name(ty).to_string())
}

fn primitive(name: &str) -> Option<TypeMapping> {
    Some(match name {
        "String" | "Char" => TypeMapping::STRING,
        "Int" | "Short" | "Byte" => TypeMapping::INT32,
        "Long" | "BigInt" => TypeMapping::INT64,
        "Float" => TypeMapping::FLOAT,
        "Double" => TypeMapping::DOUBLE,
        "BigDecimal" => TypeMapping::NUMBER,
        "Boolean" => TypeMapping::BOOLEAN,
        "LocalDateTime" | "Instant" | "ZonedDateTime" | "OffsetDateTime" | "DateTime" => TypeMapping::DATE_TIME,
        "LocalDate" => TypeMapping::DATE,
        "LocalTime" => TypeMapping::TIME,
        "UUID" => TypeMapping::UUID,
        "JsValue" | "JsObject" | "Json" | "Any" | "AnyContent" => TypeMapping::OBJECT,
        _ => return None,
    })
}
