//! C# type table.

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
    if let Some(inner) = ty.strip_suffix('?') {
        return Form::Optional(inner.to_string());
    }
    if ty == "byte[]" {
        return Form::Named(ty.to_string());
    }
    if let Some(inner) = ty.strip_suffix("[]") {
        return Form::Sequence(inner.to_string());
    }
    if let Some((base, inner)) = generic(ty, '<', '>') {
        let args = type_args(inner);
        let first = args.first().cloned().unwrap_or_default();
        return match simple_name(base) {
            "Nullable" => Form::Optional(first),
            "Task" | "ValueTask" | "ActionResult" | "Ok" | "Results" | "Lazy" => Form::Wrapper(first),
            "List" | "IList" | "IEnumerable" | "ICollection" | "IReadOnlyList"
            | "IReadOnlyCollection" | "HashSet" | "ISet" | "Collection" | "IAsyncEnumerable"
            | "ImmutableList" | "ImmutableArray" => sequence_form(&args),
            "Dictionary" | "IDictionary" | "IReadOnlyDictionary" | "ConcurrentDictionary"
            | "SortedDictionary" | "ImmutableDictionary" => map_form(&args),
            other => Form::Named(other.to_string()),
        };
    }
    Form::Named(simple_name(ty).to_string())
}

fn primitive(name: &str) -> Option<TypeMapping> {
    Some(match name {
        "string" | "String" | "char" | "Char" => TypeMapping::STRING,
        "int" | "Int32" | "short" | "Int16" | "byte" | "Byte" | "sbyte" | "ushort" | "uint" => {
            TypeMapping::INT32
        }
        "long" | "Int64" | "ulong" | "UInt64" => TypeMapping::INT64,
        "float" | "Single" => TypeMapping::FLOAT,
        "double" | "Double" | "decimal" | "Decimal" => TypeMapping::DOUBLE,
        "bool" | "Boolean" => TypeMapping::BOOLEAN,
        "DateTime" | "DateTimeOffset" => TypeMapping::DATE_TIME,
        "DateOnly" => TypeMapping::DATE,
        "TimeOnly" => TypeMapping::TIME,
        "TimeSpan" => TypeMapping::STRING,
        "Guid" => TypeMapping::UUID,
        "byte[]" => TypeMapping::BYTE,
        "IFormFile" | "Stream" => TypeMapping::BINARY,
        "Uri" => TypeMapping::URI,
        "object" | "Object" | "dynamic" | "JsonElement" | "JObject" => TypeMapping::OBJECT,
        _ => return None,
    })
}
