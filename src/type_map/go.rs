//! Go type table.

use super::{map_with, shape_with, simple_name};
use super::{Form, TypeMapping, TypeShape};

pub fn map_type(raw: &str) -> TypeMapping {
    map_with(raw, classify, primitive)
}

pub fn shape(raw: &str) -> TypeShape {
    shape_with(raw, classify, primitive)
}

fn classify(ty: &str) -> Form {
    let ty = ty.trim();
    if ty == "[]byte" || ty == "[]uint8" {
        return Form::Named("[]byte".to_string());
    }
    if let Some(inner) = ty.strip_prefix('*') {
        return Form::Optional(inner.to_string());
    }
    if let Some(inner) = ty.strip_prefix("[]") {
        return Form::Sequence(inner.to_string());
    }
    if ty.starts_with('[') {
        if let Some(close) = ty.find(']') {
            return Form::Sequence(ty[close + 1..].to_string());
        }
    }
    if let Some(rest) = ty.strip_prefix("map[") {
        // map[K]V: the key may itself contain brackets
        let mut depth = 1;
        for (i, c) in rest.char_indices() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Form::Map {
                            key: Some(rest[..i].to_string()),
                            value: rest[i + 1..].to_string(),
                        };
                    }
                }
                _ => {}
            }
        }
    }
    Form::Named(ty.to_string())
}

fn primitive(name: &str) -> Option<TypeMapping> {
    Some(match name {
        "string" => TypeMapping::STRING,
        "int" | "int64" | "uint" | "uint64" | "uintptr" => TypeMapping::INT64,
        "int8" | "int16" | "int32" | "uint8" | "uint16" | "uint32" | "rune" | "byte" => TypeMapping::INT32,
        "float32" => TypeMapping::FLOAT,
        "float64" => TypeMapping::DOUBLE,
        "bool" => TypeMapping::BOOLEAN,
        "[]byte" => TypeMapping::BYTE,
        "interface{}" | "any" | "json.RawMessage" | "map" => TypeMapping::OBJECT,
        "time.Time" => TypeMapping::DATE_TIME,
        "time.Duration" => TypeMapping::INT64,
        "uuid.UUID" => TypeMapping::UUID,
        "decimal.Decimal" => TypeMapping::NUMBER,
        "sql.NullString" => TypeMapping::STRING,
        "sql.NullInt64" => TypeMapping::INT64,
        "sql.NullInt32" => TypeMapping::INT32,
        "sql.NullBool" => TypeMapping::BOOLEAN,
        "sql.NullFloat64" => TypeMapping::DOUBLE,
        "sql.NullTime" => TypeMapping::DATE_TIME,
        "multipart.FileHeader" => TypeMapping::BINARY,
        other if other.contains('.') => return primitive_unqualified(simple_name(other)),
        _ => return None,
    })
}

fn primitive_unqualified(name: &str) -> Option<TypeMapping> {
    match name {
        "Time" => Some(TypeMapping::DATE_TIME),
        "UUID" => Some(TypeMapping::UUID),
        _ => None,
    }
}
