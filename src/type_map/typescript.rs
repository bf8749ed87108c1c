//! TypeScript type table.

use super::{generic, map_form, map_with, sequence_form, shape_with, simple_name, strip_null_union, type_args};
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
    if let Some(inner) = strip_null_union(ty, &["null", "undefined"]) {
        return Form::Optional(inner);
    }
    let members = split_top_level(ty, b'|');
    if members.len() > 1 && members.iter().all(|m| crate::lexer::string_literal(m).is_some()) {
        return Form::Named("string".to_string());
    }
    if let Some(inner) = ty.strip_suffix("[]") {
        return Form::Sequence(inner.trim_matches(|c| c == '(' || c == ')').to_string());
    }
    // { [key: string]: V }
    if let Some(inner) = ty.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        let inner = inner.trim().trim_end_matches(';');
        if inner.starts_with('[') {
            if let Some(close) = inner.find(']') {
                let key = inner[1..close].split_once(':').map(|(_, k)| k.trim().to_string());
                let value = inner[close + 1..].trim_start_matches(':').trim().to_string();
                return Form::Map { key, value };
            }
        }
        return Form::Named("object".to_string());
    }
    if let Some((base, inner)) = generic(ty, '<', '>') {
        let args = type_args(inner);
        let first = args.first().cloned().unwrap_or_default();
        return match simple_name(base) {
            "Promise" | "Observable" | "Readonly" | "Partial" | "Required" | "Awaited" => Form::Wrapper(first),
            "Array" | "ReadonlyArray" | "Set" => sequence_form(&args),
            "Record" | "Map" => map_form(&args),
            other => Form::Named(other.to_string()),
        };
    }
    Form::Named(ty.to_string())
}

fn primitive(name: &str) -> Option<TypeMapping> {
    Some(match name {
        "string" | "String" => TypeMapping::STRING,
        "number" | "Number" => TypeMapping::NUMBER,
        "bigint" => TypeMapping::INT64,
        "boolean" | "Boolean" => TypeMapping::BOOLEAN,
        "Date" => TypeMapping::DATE_TIME,
        "Buffer" | "Blob" | "File" => TypeMapping::BINARY,
        "any" | "unknown" | "object" | "Object" => TypeMapping::OBJECT,
        _ => return None,
    })
}
