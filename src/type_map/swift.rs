//! Swift type table.

use super::{generic, map_form, map_with, sequence_form, shape_with, simple_name, type_args};
use super::{Form, TypeMapping, TypeShape};
use crate::lexer::split_top_level;

pub fn map_type(raw: &str) -> TypeMapping {
    map_with(raw, classify, primitive)
}

pub fn shape(raw: &str) -> TypeShape {
    shape_with(raw, classify, primitive)
}

fn classify(ty: &str) -> Form {
    let ty = ty.trim();
    if let Some(inner) = ty.strip_suffix('?').or_else(|| ty.strip_suffix('!')) {
        return Form::Optional(inner.to_string());
    }
    // [T] and [K: V]
    if let Some(inner) = ty.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        let parts = split_top_level(inner, b':');
        return match parts.as_slice() {
            [key, value] => Form::Map {
                key: Some(key.clone()),
                value: value.clone(),
            },
            _ => Form::Sequence(inner.trim().to_string()),
        };
    }
    if let Some((base, inner)) = generic(ty, '<', '>') {
        let args = type_args(inner);
        let first = args.first().cloned().unwrap_or_default();
        return match simple_name(base) {
            "Optional" => Form::Optional(first),
            "EventLoopFuture" | "Future" | "Page" => Form::Wrapper(first),
            "Array" | "Set" | "ContiguousArray" => sequence_form(&args),
            "Dictionary" => map_form(&args),
            other => Form::Named(other.to_string()),
        };
    }
    Form::Named(simple_name(ty).to_string())
}

fn primitive(name: &str) -> Option<TypeMapping> {
    Some(match name {
        "String" | "Character" | "Substring" => TypeMapping::STRING,
        "Int" | "UInt" => TypeMapping::INTEGER,
        "Int8" | "Int16" | "Int32" | "UInt8" | "UInt16" | "UInt32" => TypeMapping::INT32,
        "Int64" | "UInt64" => TypeMapping::INT64,
        "Float" => TypeMapping::FLOAT,
        "Double" | "CGFloat" => TypeMapping::DOUBLE,
        "Decimal" => TypeMapping::NUMBER,
        "Bool" => TypeMapping::BOOLEAN,
        "Date" => TypeMapping::DATE_TIME,
        "UUID" => TypeMapping::UUID,
        "Data" => TypeMapping::BYTE,
        "URL" => TypeMapping::URI,
        "Any" | "AnyObject" | "AnyCodable" => TypeMapping::OBJECT,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeKind;

    #[test]
    fn test_swift_types() {
        assert_eq!(map_type("String?"), TypeMapping::STRING);
        assert!(shape("UUID?").optional);
        assert_eq!(map_type("[Todo]"), TypeMapping::ARRAY);
        let s = shape("[String: Int]");
        assert_eq!(s.kind, TypeKind::Map);
        assert_eq!(s.key.as_deref(), Some("String"));
        assert_eq!(map_type("EventLoopFuture<[Todo]>"), TypeMapping::ARRAY);
        assert_eq!(map_type("Foundation.Date"), TypeMapping::DATE_TIME);
    }
}
