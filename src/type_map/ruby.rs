//! Ruby type table: ActiveRecord column types, ActiveModel attribute types and
//! dry-types constants.

use super::{map_with, shape_with, simple_name};
use super::{Form, TypeMapping, TypeShape};

pub fn map_type(raw: &str) -> TypeMapping {
    map_with(raw, classify, primitive)
}

pub fn shape(raw: &str) -> TypeShape {
    shape_with(raw, classify, primitive)
}

fn classify(ty: &str) -> Form {
    let ty = ty.trim().trim_start_matches(':');
    if let Some(inner) = ty.strip_suffix(".optional").or_else(|| ty.strip_suffix(".maybe")) {
        return Form::Optional(inner.to_string());
    }
    // Types::Array.of(Types::String), Array(String)
    if let Some(rest) = ty.strip_prefix("Types::Array.of(").or_else(|| ty.strip_prefix("Array(")) {
        return Form::Sequence(rest.trim_end_matches(')').to_string());
    }
    match simple_name(ty) {
        "Array" | "array" => Form::Sequence("object".to_string()),
        "Hash" | "hash" | "hstore" => Form::Map {
            key: None,
            value: "object".to_string(),
        },
        other => Form::Named(other.to_lowercase()),
    }
}

fn primitive(name: &str) -> Option<TypeMapping> {
    Some(match name {
        "string" | "text" | "citext" | "symbol" | "inet" => TypeMapping::STRING,
        "integer" | "int" => TypeMapping::INT32,
        "bigint" | "primary_key" | "references" | "belongs_to" => TypeMapping::INT64,
        "float" => TypeMapping::FLOAT,
        "decimal" | "bigdecimal" | "numeric" => TypeMapping::DOUBLE,
        "boolean" | "bool" | "true" | "false" => TypeMapping::BOOLEAN,
        "datetime" | "timestamp" | "timestamptz" => TypeMapping::DATE_TIME,
        "date" => TypeMapping::DATE,
        "time" => TypeMapping::TIME,
        "uuid" => TypeMapping::UUID,
        "binary" | "blob" => TypeMapping::BINARY,
        "json" | "jsonb" | "object" | "any" => TypeMapping::OBJECT,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeKind;

    #[test]
    fn test_column_types() {
        assert_eq!(map_type(":string"), TypeMapping::STRING);
        assert_eq!(map_type("integer"), TypeMapping::INT32);
        assert_eq!(map_type("datetime"), TypeMapping::DATE_TIME);
        assert_eq!(map_type("jsonb"), TypeMapping::OBJECT);
        assert_eq!(shape("jsonb").kind, TypeKind::Unknown);
    }

    #[test]
    fn test_dry_types() {
        assert_eq!(map_type("Types::String"), TypeMapping::STRING);
        assert_eq!(map_type("Types::Integer.optional"), TypeMapping::INT32);
        assert!(shape("Types::Integer.optional").optional);
        assert_eq!(map_type("Types::Array.of(Types::String)"), TypeMapping::ARRAY);
    }
}
