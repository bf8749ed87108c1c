//! Java type table.

use super::{generic, map_form, map_with, sequence_form, shape_with, simple_name, type_args};
use super::{Form, TypeMapping, TypeShape};

pub fn map_type(raw: &str) -> TypeMapping {
    map_with(raw, classify, primitive)
}

pub fn shape(raw: &str) -> TypeShape {
    shape_with(raw, classify, primitive)
}

/// Drop leading annotations and `final`: `@Valid final User` -> `User`.
pub(crate) fn strip_modifiers(ty: &str) -> &str {
    let mut ty = ty.trim();
    loop {
        if let Some(rest) = ty.strip_prefix("final ") {
            ty = rest.trim_start();
        } else if ty.starts_with('@') {
            let end = ty
                .find(|c: char| c.is_whitespace())
                .unwrap_or(ty.len());
            let (ann, rest) = ty.split_at(end);
            // annotation arguments may contain spaces
            let rest = match ann.find('(') {
                Some(open) => match crate::lexer::find_matching(ty, open) {
                    Some(close) => &ty[close + 1..],
                    None => rest,
                },
                None => rest,
            };
            ty = rest.trim_start();
        } else {
            return ty;
        }
    }
}

fn classify(ty: &str) -> Form {
    let ty = strip_modifiers(ty);
    if ty == "byte[]" {
        return Form::Named(ty.to_string());
    }
    if let Some(inner) = ty.strip_suffix("[]").or_else(|| ty.strip_suffix("...")) {
        return Form::Sequence(inner.to_string());
    }
    if let Some((base, inner)) = generic(ty, '<', '>') {
        let args = type_args(inner);
        let first = args.first().cloned().unwrap_or_default();
        return match simple_name(base) {
            "Optional" => Form::Optional(first),
            "ResponseEntity" | "CompletableFuture" | "CompletionStage" | "Mono" | "Callable"
            | "DeferredResult" | "HttpEntity" | "Future" | "Uni" => Form::Wrapper(first),
            "List" | "ArrayList" | "LinkedList" | "Set" | "HashSet" | "TreeSet" | "LinkedHashSet"
            | "Collection" | "Iterable" | "Flux" | "Stream" | "Multi" => sequence_form(&args),
            "Map" | "HashMap" | "TreeMap" | "LinkedHashMap" | "ConcurrentHashMap" | "SortedMap" => {
                map_form(&args)
            }
            other => Form::Named(other.to_string()),
        };
    }
    Form::Named(simple_name(ty).to_string())
}

fn primitive(name: &str) -> Option<TypeMapping> {
    Some(match name {
        "String" | "CharSequence" | "char" | "Character" => TypeMapping::STRING,
        "int" | "Integer" | "short" | "Short" | "byte" | "Byte" | "OptionalInt" => TypeMapping::INT32,
        "long" | "Long" | "BigInteger" | "OptionalLong" => TypeMapping::INT64,
        "float" | "Float" => TypeMapping::FLOAT,
        "double" | "Double" | "OptionalDouble" => TypeMapping::DOUBLE,
        "BigDecimal" => TypeMapping::NUMBER,
        "boolean" | "Boolean" => TypeMapping::BOOLEAN,
        "LocalDateTime" | "ZonedDateTime" | "OffsetDateTime" | "Instant" | "Date" | "Timestamp" => {
            TypeMapping::DATE_TIME
        }
        "LocalDate" => TypeMapping::DATE,
        "LocalTime" | "OffsetTime" => TypeMapping::TIME,
        "UUID" => TypeMapping::UUID,
        "byte[]" => TypeMapping::BYTE,
        "MultipartFile" | "InputStream" | "Resource" => TypeMapping::BINARY,
        "URI" | "URL" => TypeMapping::URI,
        "Object" | "JsonNode" | "ObjectNode" => TypeMapping::OBJECT,
        _ => return None,
    })
}
