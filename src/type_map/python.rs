//! Python type table (annotations as written in Pydantic models and signatures).

use super::{generic, map_form, map_with, sequence_form, shape_with, simple_name, strip_null_union, type_args};
use super::{Form, TypeMapping, TypeShape};

pub fn map_type(raw: &str) -> TypeMapping {
    map_with(raw, classify, primitive)
}

pub fn shape(raw: &str) -> TypeShape {
    shape_with(raw, classify, primitive)
}

fn classify(ty: &str) -> Form {
    let ty = ty.trim().trim_matches(|c| c == '"' || c == '\'');
    if let Some(inner) = strip_null_union(ty, &["None", "NoneType"]) {
        return Form::Optional(inner);
    }
    if let Some((base, inner)) = generic(ty, '[', ']') {
        let args = type_args(inner);
        let first = args.first().cloned().unwrap_or_default();
        return match simple_name(base) {
            "Optional" => Form::Optional(first),
            "Union" if args.iter().any(|a| a == "None") => Form::Optional(
                args.iter()
                    .filter(|a| a.as_str() != "None")
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(" | "),
            ),
            "Annotated" | "Awaitable" | "Required" | "NotRequired" | "Final" | "ClassVar" => {
                Form::Wrapper(first)
            }
            "list" | "List" | "Sequence" | "set" | "Set" | "frozenset" | "FrozenSet" | "tuple"
            | "Tuple" | "Iterable" | "Iterator" | "conlist" => sequence_form(&args),
            "dict" | "Dict" | "Mapping" | "MutableMapping" | "DefaultDict" | "OrderedDict" => {
                map_form(&args)
            }
            "Literal" => Form::Named("str".to_string()),
            other => Form::Named(other.to_string()),
        };
    }
    match simple_name(ty) {
        "list" | "List" | "set" | "tuple" => Form::Sequence("Any".to_string()),
        "dict" | "Dict" => Form::Map {
            key: None,
            value: "Any".to_string(),
        },
        other => Form::Named(other.to_string()),
    }
}

fn primitive(name: &str) -> Option<TypeMapping> {
    Some(match name {
        "str" | "constr" | "SecretStr" => TypeMapping::STRING,
        "int" | "conint" | "PositiveInt" | "NonNegativeInt" => TypeMapping::INTEGER,
        "float" | "confloat" | "PositiveFloat" => TypeMapping::NUMBER,
        "Decimal" | "condecimal" => TypeMapping::NUMBER,
        "bool" | "StrictBool" => TypeMapping::BOOLEAN,
        "bytes" => TypeMapping::BINARY,
        "datetime" => TypeMapping::DATE_TIME,
        "date" => TypeMapping::DATE,
        "time" => TypeMapping::TIME,
        "UUID" | "UUID4" | "UUID1" => TypeMapping::UUID,
        "EmailStr" => TypeMapping::EMAIL,
        "HttpUrl" | "AnyUrl" | "AnyHttpUrl" => TypeMapping::URI,
        "UploadFile" => TypeMapping::BINARY,
        "Any" | "object" | "Json" => TypeMapping::OBJECT,
        // Django model and REST framework serializer fields
        "CharField" | "TextField" | "SlugField" | "IPAddressField" | "GenericIPAddressField" => {
            TypeMapping::STRING
        }
        "EmailField" => TypeMapping::EMAIL,
        "URLField" => TypeMapping::URI,
        "IntegerField" | "SmallIntegerField" | "PositiveIntegerField" | "PositiveSmallIntegerField"
        | "AutoField" => TypeMapping::INT32,
        "BigIntegerField" | "BigAutoField" | "PositiveBigIntegerField" => TypeMapping::INT64,
        "FloatField" => TypeMapping::FLOAT,
        "DecimalField" => TypeMapping::DECIMAL,
        "BooleanField" | "NullBooleanField" => TypeMapping::BOOLEAN,
        "DateTimeField" => TypeMapping::DATE_TIME,
        "DateField" => TypeMapping::DATE,
        "TimeField" => TypeMapping::TIME,
        "UUIDField" => TypeMapping::UUID,
        "FileField" | "ImageField" => TypeMapping::BINARY,
        "JSONField" | "DictField" => TypeMapping::OBJECT,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeKind;

    #[test]
    fn test_optional_forms() {
        assert_eq!(map_type("Optional[int]"), TypeMapping::INTEGER);
        assert_eq!(map_type("str | None"), TypeMapping::STRING);
        assert_eq!(map_type("Union[float, None]"), TypeMapping::NUMBER);
        assert!(shape("int | None").optional);
        assert!(!shape("int").optional);
    }

    #[test]
    fn test_containers() {
        assert_eq!(map_type("List[Item]"), TypeMapping::ARRAY);
        assert_eq!(map_type("list[str]"), TypeMapping::ARRAY);
        assert_eq!(map_type("Dict[str, List[int]]"), TypeMapping::OBJECT);
        assert_eq!(shape("list").kind, TypeKind::Sequence);
        assert_eq!(shape("dict[str, int]").key.as_deref(), Some("str"));
    }

    #[test]
    fn test_well_known() {
        assert_eq!(map_type("datetime.datetime"), TypeMapping::DATE_TIME);
        assert_eq!(map_type("uuid.UUID"), TypeMapping::UUID);
        assert_eq!(map_type("EmailStr"), TypeMapping::EMAIL);
        assert_eq!(map_type("Annotated[str, Field(max_length=3)]"), TypeMapping::STRING);
        assert_eq!(map_type("Literal['a', 'b']"), TypeMapping::STRING);
        assert_eq!(map_type("'User'"), TypeMapping::OBJECT);
        assert_eq!(map_type("EmailField"), TypeMapping::EMAIL);
        assert_eq!(shape("DateTimeField").kind, TypeKind::Time);
    }
}
