//! C++ type table.

use super::{generic, map_form, map_with, sequence_form, shape_with, simple_name, type_args};
use super::{Form, TypeMapping, TypeShape};

pub fn map_type(raw: &str) -> TypeMapping {
    map_with(raw, classify, primitive)
}

pub fn shape(raw: &str) -> TypeShape {
    shape_with(raw, classify, primitive)
}

/// Drop cv-qualifiers and references: `const std::string&` -> `std::string`.
fn strip_qualifiers(ty: &str) -> &str {
    let mut ty = ty.trim();
    loop {
        let before = ty;
        for prefix in ["const ", "volatile ", "struct ", "class ", "typename "] {
            if let Some(rest) = ty.strip_prefix(prefix) {
                ty = rest.trim_start();
            }
        }
        ty = ty.trim_end_matches('&').trim_end();
        if let Some(rest) = ty.strip_suffix(" const") {
            ty = rest.trim_end();
        }
        if ty == before {
            return ty;
        }
    }
}

fn classify(ty: &str) -> Form {
    let ty = strip_qualifiers(ty);
    let compact: String = ty.split_whitespace().collect::<Vec<_>>().join(" ");
    if compact == "char*" || compact == "char *" {
        return Form::Named("char*".to_string());
    }
    if let Some(inner) = ty.strip_suffix('*') {
        return Form::Optional(inner.trim().to_string());
    }
    if let Some((base, inner)) = generic(ty, '<', '>') {
        let args = type_args(inner);
        let first = args.first().cloned().unwrap_or_default();
        return match simple_name(base) {
            "optional" => Form::Optional(first),
            "shared_ptr" | "unique_ptr" | "future" | "reference_wrapper" => Form::Wrapper(first),
            "vector" | "list" | "deque" | "set" | "unordered_set" | "array" | "span" => sequence_form(&args),
            "map" | "unordered_map" | "multimap" => map_form(&args),
            other => Form::Named(other.to_string()),
        };
    }
    Form::Named(compact)
}

fn primitive(name: &str) -> Option<TypeMapping> {
    Some(match simple_name(name) {
        "string" | "string_view" | "char*" | "char" => TypeMapping::STRING,
        "int" | "short" | "unsigned" | "unsigned int" | "int32_t" | "uint32_t" | "int16_t"
        | "uint16_t" | "int8_t" | "uint8_t" => TypeMapping::INT32,
        "long" | "long long" | "unsigned long" | "int64_t" | "uint64_t" | "size_t" => TypeMapping::INT64,
        "float" => TypeMapping::FLOAT,
        "double" | "long double" => TypeMapping::DOUBLE,
        "bool" => TypeMapping::BOOLEAN,
        "time_point" => TypeMapping::DATE_TIME,
        "json" | "wvalue" | "rvalue" | "Value" => TypeMapping::OBJECT,
        _ => return None,
    })
}
