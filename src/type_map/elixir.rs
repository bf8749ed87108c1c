//! Elixir type table: Ecto field types and common typespecs.

use super::{map_with, shape_with, strip_null_union};
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
    if let Some(inner) = strip_null_union(ty, &["nil"]) {
        return Form::Optional(inner);
    }
    // {:array, :string} / {:map, :integer}
    if let Some(inner) = ty.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        let parts = split_top_level(inner, b',');
        return match parts.first().map(|p| p.trim_start_matches(':')) {
            Some("array") => Form::Sequence(parts.get(1).cloned().unwrap_or_default()),
            Some("map") => Form::Map {
                key: None,
                value: parts.get(1).cloned().unwrap_or_default(),
            },
            _ => Form::Named("tuple".to_string()),
        };
    }
    if let Some(inner) = ty.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        return Form::Sequence(inner.to_string());
    }
    if let Some(inner) = ty.strip_prefix("list(").and_then(|r| r.strip_suffix(')')) {
        return Form::Sequence(inner.to_string());
    }
    let name = ty.trim_start_matches(':').trim_end_matches("()");
    match name {
        "list" => Form::Sequence("any".to_string()),
        "map" => Form::Map {
            key: None,
            value: "any".to_string(),
        },
        other => Form::Named(other.to_string()),
    }
}

fn primitive(name: &str) -> Option<TypeMapping> {
    Some(match name {
        "string" | "String.t" | "binary" | "atom" | "Ecto.Enum" => TypeMapping::STRING,
        "integer" | "non_neg_integer" | "pos_integer" => TypeMapping::INTEGER,
        "id" => TypeMapping::INT64,
        "float" | "number" => TypeMapping::NUMBER,
        "decimal" | "Decimal.t" => TypeMapping::DOUBLE,
        "boolean" => TypeMapping::BOOLEAN,
        "utc_datetime" | "utc_datetime_usec" | "naive_datetime" | "naive_datetime_usec"
        | "DateTime.t" | "NaiveDateTime.t" => TypeMapping::DATE_TIME,
        "date" | "Date.t" => TypeMapping::DATE,
        "time" | "time_usec" | "Time.t" => TypeMapping::TIME,
        "binary_id" | "Ecto.UUID" => TypeMapping::UUID,
        "any" | "term" | "tuple" => TypeMapping::OBJECT,
        _ => return None,
    })
}
