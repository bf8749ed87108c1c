//! Rust type table.

use super::{generic, map_form, map_with, sequence_form, shape_with, simple_name, type_args};
use super::{Form, TypeMapping, TypeShape};

pub fn map_type(raw: &str) -> TypeMapping {
    map_with(raw, classify, primitive)
}

pub fn shape(raw: &str) -> TypeShape {
    shape_with(raw, classify, primitive)
}

/// Strip references, lifetimes and `mut`: `&'a mut str` -> `str`.
fn strip_reference(ty: &str) -> &str {
    let mut ty = ty.trim();
    while let Some(rest) = ty.strip_prefix('&') {
        ty = rest.trim_start();
        if ty.starts_with('\'') {
            ty = ty
                .split_once(char::is_whitespace)
                .map(|(_, rest)| rest)
                .unwrap_or("")
                .trim_start();
        }
        if let Some(rest) = ty.strip_prefix("mut ") {
            ty = rest.trim_start();
        }
    }
    ty
}

fn classify(ty: &str) -> Form {
    let ty = strip_reference(ty);
    if let Some(inner) = ty.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        let element = inner.split_once(';').map(|(e, _)| e).unwrap_or(inner);
        return Form::Sequence(element.trim().to_string());
    }
    if let Some((base, inner)) = generic(ty, '<', '>') {
        let args = type_args(inner);
        let first = args.first().cloned().unwrap_or_default();
        return match simple_name(base) {
            "Option" => Form::Optional(first),
            "Box" | "Arc" | "Rc" | "Cow" | "Json" | "Result" | "Cell" | "RefCell" | "Mutex"
            | "RwLock" | "Data" => Form::Wrapper(first),
            "Vec" | "VecDeque" | "HashSet" | "BTreeSet" | "IndexSet" | "LinkedList" => sequence_form(&args),
            "HashMap" | "BTreeMap" | "IndexMap" => map_form(&args),
            other => Form::Named(other.to_string()),
        };
    }
    Form::Named(simple_name(ty).to_string())
}

fn primitive(name: &str) -> Option<TypeMapping> {
    Some(match name {
        "String" | "str" | "char" => TypeMapping::STRING,
        "i8" | "i16" | "i32" | "u8" | "u16" | "u32" => TypeMapping::INT32,
        "i64" | "u64" | "i128" | "u128" | "isize" | "usize" => TypeMapping::INT64,
        "f32" => TypeMapping::FLOAT,
        "f64" => TypeMapping::DOUBLE,
        "bool" => TypeMapping::BOOLEAN,
        "DateTime" | "NaiveDateTime" | "SystemTime" | "OffsetDateTime" | "PrimitiveDateTime" => {
            TypeMapping::DATE_TIME
        }
        "NaiveDate" | "Date" => TypeMapping::DATE,
        "NaiveTime" | "Time" => TypeMapping::TIME,
        "Uuid" => TypeMapping::UUID,
        "Decimal" => TypeMapping::DECIMAL,
        "Bytes" => TypeMapping::BINARY,
        "Url" => TypeMapping::URI,
        "Value" => TypeMapping::OBJECT,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeKind;

    #[test]
    fn test_primitives() {
        assert_eq!(map_type("String"), TypeMapping::STRING);
        assert_eq!(map_type("&'a str"), TypeMapping::STRING);
        assert_eq!(map_type("i32"), TypeMapping::INT32);
        assert_eq!(map_type("u64"), TypeMapping::INT64);
        assert_eq!(map_type("chrono::DateTime<Utc>"), TypeMapping::DATE_TIME);
        assert_eq!(map_type("uuid::Uuid"), TypeMapping::UUID);
    }

    #[test]
    fn test_wrappers() {
        assert_eq!(map_type("Option<i64>"), TypeMapping::INT64);
        assert_eq!(map_type("Vec<User>"), TypeMapping::ARRAY);
        assert_eq!(map_type("HashMap<String, Vec<User>>"), TypeMapping::OBJECT);
        assert_eq!(map_type("Box<bool>"), TypeMapping::BOOLEAN);
        assert_eq!(map_type("[u8; 4]"), TypeMapping::ARRAY);
        assert_eq!(map_type("MyThing"), TypeMapping::OBJECT);
    }

    #[test]
    fn test_shapes() {
        let s = shape("Option<String>");
        assert_eq!(s.kind, TypeKind::Optional);
        assert!(s.optional);
        assert_eq!(s.element.as_deref(), Some("String"));

        let s = shape("HashMap<String, Vec<User>>");
        assert_eq!(s.kind, TypeKind::Map);
        assert_eq!(s.key.as_deref(), Some("String"));
        assert_eq!(s.element.as_deref(), Some("Vec<User>"));

        assert_eq!(shape("User").kind, TypeKind::Aggregate);
        assert_eq!(shape("NaiveDate").kind, TypeKind::Time);
        assert_eq!(shape("serde_json::Value").kind, TypeKind::Unknown);
    }
}
