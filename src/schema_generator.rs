//! Schema generation from type facts.
//!
//! Types are looked up by simple name across every unit handed to the
//! generator; a named aggregate becomes a `$ref` to a component schema that is
//! generated once and cached. Self-referencing types terminate because the
//! component is registered before its fields are visited.

use crate::model::{DeclKind, FieldDecl, SourceUnit, TypeDecl, TypeKind};
use crate::parser::{backend_for, Language};
use crate::type_map::{generic, simple_name, type_args, TypeMapping};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Schema generator - converts type facts to OpenAPI schemas
pub struct SchemaGenerator<'a> {
    /// Declared types by simple name, with the language that declared them
    types: HashMap<&'a str, (&'a TypeDecl, Language)>,
    /// Generated component schemas
    schemas: BTreeMap<String, Schema>,
    /// Components currently being generated
    pending: HashSet<String>,
}

/// OpenAPI Schema definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Format for primitive types (e.g., "int32", "int64", "date-time")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Properties for object types, in name order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,
    /// Required property names for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Reference to a component schema
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Enum values for enum types
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl Schema {
    pub fn of(mapping: TypeMapping) -> Self {
        Self {
            schema_type: Some(mapping.openapi_type.to_string()),
            format: mapping.format(),
            ..Self::default()
        }
    }

    pub fn string() -> Self {
        Self::of(TypeMapping::STRING)
    }

    pub fn object() -> Self {
        Self::of(TypeMapping::OBJECT)
    }

    pub fn array(items: Schema) -> Self {
        Self {
            schema_type: Some("array".to_string()),
            items: Some(Box::new(items)),
            ..Self::default()
        }
    }

    pub fn reference(name: &str) -> Self {
        Self {
            reference: Some(format!("#/components/schemas/{}", name)),
            ..Self::default()
        }
    }

    /// True for a schema carrying a scalar type (string, integer, number, boolean).
    pub fn is_primitive(&self) -> bool {
        self.reference.is_none()
            && matches!(self.schema_type.as_deref(), Some("string" | "integer" | "number" | "boolean"))
    }
}

/// Wrapper generics that only carry the response payload.
const RESPONSE_WRAPPERS: &[&str] = &[
    "ResponseEntity", "ActionResult", "Task", "ValueTask", "Promise", "Observable", "Mono", "Future",
    "CompletableFuture", "CompletionStage", "Result", "Json", "Ok", "IO", "EventLoopFuture",
];

/// Return types that describe no payload.
const NO_PAYLOAD: &[&str] = &[
    "void", "Void", "Unit", "None", "IActionResult", "IResult", "HttpResponse", "Response", "ResponseEntity",
    "impl IntoResponse", "impl Responder", "Result", "()", "any", "unknown", "Any", "JsonResponse", "mixed",
];

impl<'a> SchemaGenerator<'a> {
    /// Index every type declared in `units`; the first declaration of a name wins.
    pub fn new(units: &'a [SourceUnit]) -> Self {
        let mut types = HashMap::new();
        for unit in units {
            for decl in &unit.types {
                types.entry(simple_name(&decl.name)).or_insert((decl, unit.language));
            }
        }
        debug!("Initializing SchemaGenerator with {} types", types.len());
        Self {
            types,
            schemas: BTreeMap::new(),
            pending: HashSet::new(),
        }
    }

    /// Schema for a source type string written in `language`.
    pub fn schema_for(&mut self, raw: &str, language: Language) -> Schema {
        let raw = raw.trim();
        let backend = backend_for(language);
        let shape = backend.shape(raw);
        match shape.kind {
            TypeKind::Optional => match shape.element {
                Some(inner) if inner.trim() != raw => self.schema_for(&inner, language),
                _ => Schema::object(),
            },
            TypeKind::Sequence => {
                let items = shape
                    .element
                    .filter(|e| e.trim() != raw)
                    .map(|e| self.schema_for(&e, language))
                    .unwrap_or_else(Schema::object);
                Schema::array(items)
            }
            TypeKind::Map => Schema::object(),
            _ => {
                let mapping = backend.map_type(raw);
                if !mapping.is_object() {
                    return Schema::of(mapping);
                }
                let name = type_name(raw);
                if self.types.contains_key(name) {
                    self.generate_component(name);
                    return Schema::reference(name);
                }
                debug!("Unknown type: {}, using object placeholder", raw);
                Schema::object()
            }
        }
    }

    /// Schema for a handler's declared return type, or `None` when it carries no payload.
    pub fn response_schema(&mut self, raw: &str, language: Language) -> Option<Schema> {
        let payload = unwrap_response(raw)?;
        Some(self.schema_for(payload, language))
    }

    /// Declared type `name`, if any unit declares it.
    pub fn find(&self, name: &str) -> Option<(&'a TypeDecl, Language)> {
        self.types.get(type_name(name)).copied()
    }

    /// Generate and cache the component schema for declared type `name`.
    fn generate_component(&mut self, name: &str) {
        if self.schemas.contains_key(name) || self.pending.contains(name) {
            return;
        }
        let Some(&(decl, language)) = self.types.get(name) else {
            return;
        };
        self.pending.insert(name.to_string());
        let schema = self.decl_schema(decl, language);
        self.pending.remove(name);
        self.schemas.insert(name.to_string(), schema);
    }

    /// Schema of one declaration: an enum of its variants or an object of its fields.
    pub fn decl_schema(&mut self, decl: &TypeDecl, language: Language) -> Schema {
        debug!("Generating schema for: {}", decl.name);
        if decl.kind == DeclKind::Enum && decl.fields.is_empty() {
            return Schema {
                title: Some(decl.name.clone()),
                schema_type: Some("string".to_string()),
                enum_values: Some(decl.variants.clone()),
                ..Schema::default()
            };
        }

        let mut properties = BTreeMap::new();
        let mut required = Vec::new();
        for field in &decl.fields {
            let Some(name) = wire_name(field) else {
                continue;
            };
            let property = self.schema_for(&field.raw_type, language);
            if is_required(field) {
                required.push(name.clone());
            }
            properties.insert(name, property);
        }
        Schema {
            title: Some(decl.name.clone()),
            schema_type: Some("object".to_string()),
            properties: Some(properties),
            required: (!required.is_empty()).then_some(required),
            ..Schema::default()
        }
    }

    /// Component schemas for every data-carrying type declared in `languages`.
    pub fn generate_all(&mut self, languages: &[Language]) {
        let mut names: Vec<&'a str> = self
            .types
            .iter()
            .filter(|(_, (decl, language))| {
                languages.contains(language) && (!decl.fields.is_empty() || !decl.variants.is_empty())
            })
            .map(|(name, _)| *name)
            .collect();
        names.sort_unstable();
        for name in names {
            self.generate_component(name);
        }
    }

    /// Get all generated schemas
    pub fn get_schemas(&self) -> &BTreeMap<String, Schema> {
        &self.schemas
    }

    /// Generated schemas in name order.
    pub fn into_schemas(self) -> Vec<Schema> {
        self.schemas.into_values().collect()
    }
}

/// Simple name of a type reference: `models.User` -> `User`, `Box<Node>` -> `Box`.
fn type_name(raw: &str) -> &str {
    let raw = raw.trim().trim_start_matches(['&', '*']).trim_end_matches(['?', '*', '&', '!']);
    let base = raw.split(['<', '[', '(']).next().unwrap_or(raw);
    simple_name(base)
}

/// Peel payload-free wrappers off a return type: `Task<ActionResult<User>>` -> `User`.
pub fn unwrap_response(raw: &str) -> Option<&str> {
    let mut ty = raw.trim();
    loop {
        if ty.is_empty() || NO_PAYLOAD.contains(&ty) || ty.starts_with("impl ") {
            return None;
        }
        // `(StatusCode, Json<User>)`
        if let Some(inner) = ty.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            let parts = type_args(inner);
            let payload = parts.iter().position(|p| p.trim().starts_with("Json")).or(parts.len().checked_sub(1))?;
            let start = inner.find(parts[payload].trim())?;
            ty = inner[start..start + parts[payload].trim().len()].trim();
            continue;
        }
        let wrapped = generic(ty, '<', '>').or_else(|| generic(ty, '[', ']'));
        match wrapped {
            Some((base, inner)) if RESPONSE_WRAPPERS.contains(&simple_name(base)) => {
                let first = type_args(inner).into_iter().next().unwrap_or_default();
                let start = inner.find(first.trim())?;
                ty = inner[start..start + first.trim().len()].trim();
            }
            _ => return Some(ty),
        }
    }
}

/// Serialized property name, or `None` when the field is excluded from the wire format.
pub fn wire_name(field: &FieldDecl) -> Option<String> {
    for ann in &field.annotations {
        match ann.simple_name() {
            "serde" => {
                if ann.args.iter().any(|a| a == "skip" || a == "skip_serializing") {
                    return None;
                }
                if let Some(name) = ann.string_named("rename") {
                    return Some(name);
                }
            }
            "json" => match ann.args.first().map(String::as_str) {
                Some("-") => return None,
                Some(name) if !name.is_empty() => return Some(name.to_string()),
                _ => {}
            },
            "JsonIgnore" | "Ignore" | "Exclude" => return None,
            "JsonProperty" | "JsonPropertyName" | "SerializedName" | "SerialName" | "JsonKey" => {
                if let Some(name) = ann.string_arg(0).or_else(|| ann.string_named("value")) {
                    return Some(name);
                }
            }
            "Json" => {
                if let Some(name) = ann.string_named("name") {
                    return Some(name);
                }
            }
            "Field" => {
                if let Some(name) = ann.string_named("alias") {
                    return Some(name);
                }
            }
            _ => {}
        }
    }
    Some(field.name.clone())
}

/// Whether the field must be present: not optional, not defaulted, or explicitly validated.
pub fn is_required(field: &FieldDecl) -> bool {
    let validated = field.annotations.iter().any(|ann| match ann.simple_name() {
        "binding" | "validate" => ann.args.iter().any(|a| a == "required"),
        "NotNull" | "NotBlank" | "NotEmpty" | "Required" | "IsNotEmpty" | "IsDefined" => true,
        _ => false,
    });
    field.is_required() || validated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn units(files: &[(&str, Language, &str)]) -> Vec<SourceUnit> {
        files
            .iter()
            .map(|(path, language, code)| parse_source(Path::new(path), *language, code.as_bytes()).unwrap())
            .collect()
    }

    #[test]
    fn test_primitive_and_container_types() {
        let units = units(&[]);
        let mut schemas = SchemaGenerator::new(&units);
        assert_eq!(schemas.schema_for("i64", Language::Rust), Schema::of(TypeMapping::INT64));
        assert_eq!(schemas.schema_for("Option<String>", Language::Rust), Schema::string());
        assert_eq!(schemas.schema_for("Vec<f32>", Language::Rust), Schema::array(Schema::of(TypeMapping::FLOAT)));
        assert_eq!(schemas.schema_for("HashMap<String, u8>", Language::Rust), Schema::object());
        assert_eq!(schemas.schema_for("Unknown", Language::Rust), Schema::object());
        assert_eq!(schemas.schema_for("List<String>", Language::Java), Schema::array(Schema::string()));
        assert!(schemas.get_schemas().is_empty());
    }

    #[test]
    fn test_struct_schema_with_serde_attributes() {
        let units = units(&[(
            "src/models.rs",
            Language::Rust,
            r#"
            pub struct User {
                pub id: u64,
                #[serde(rename = "userName")]
                pub name: String,
                pub email: Option<String>,
                #[serde(skip)]
                pub password: String,
                pub role: Role,
                pub friends: Vec<User>,
            }
            pub enum Role { Admin, Member }
        "#,
        )]);
        let mut schemas = SchemaGenerator::new(&units);
        assert_eq!(schemas.schema_for("User", Language::Rust), Schema::reference("User"));

        let user = &schemas.get_schemas()["User"];
        let properties = user.properties.as_ref().unwrap();
        let names: Vec<&str> = properties.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["email", "friends", "id", "role", "userName"]);
        assert_eq!(user.required, Some(vec!["id".to_string(), "userName".to_string(), "role".to_string(), "friends".to_string()]));
        assert_eq!(properties["role"], Schema::reference("Role"));
        assert_eq!(properties["friends"], Schema::array(Schema::reference("User")));

        let role = &schemas.get_schemas()["Role"];
        assert_eq!(role.enum_values, Some(vec!["Admin".to_string(), "Member".to_string()]));
    }

    #[test]
    fn test_cross_language_annotations() {
        let units = units(&[
            (
                "models/user.go",
                Language::Go,
                "package models\n\ntype User struct {\n    Name string `json:\"name\" binding:\"required\"`\n    Nick *string `json:\"nick\"`\n    Secret string `json:\"-\"`\n}\n",
            ),
            (
                "Dto.cs",
                Language::CSharp,
                "public class Dto { [JsonPropertyName(\"full_name\")] public string Name { get; set; } public int? Age { get; set; } }",
            ),
        ]);
        let mut schemas = SchemaGenerator::new(&units);
        schemas.generate_all(&[Language::Go, Language::CSharp]);
        let all = schemas.get_schemas();
        let user = &all["User"];
        let names: Vec<&str> = user.properties.as_ref().unwrap().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["name", "nick"]);
        assert_eq!(user.required, Some(vec!["name".to_string()]));

        let dto = &all["Dto"];
        assert_eq!(dto.title.as_deref(), Some("Dto"));
        assert_eq!(dto.required, Some(vec!["full_name".to_string()]));
        assert_eq!(dto.properties.as_ref().unwrap()["Age"], Schema::of(TypeMapping::INT32));
    }

    #[test]
    fn test_unwrap_response() {
        assert_eq!(unwrap_response("Task<ActionResult<User>>"), Some("User"));
        assert_eq!(unwrap_response("ResponseEntity<List<User>>"), Some("List<User>"));
        assert_eq!(unwrap_response("Result<Json<User>, AppError>"), Some("User"));
        assert_eq!(unwrap_response("(StatusCode, Json<User>)"), Some("User"));
        assert_eq!(unwrap_response("Future[Seq[User]]"), Some("Seq[User]"));
        assert_eq!(unwrap_response("impl IntoResponse"), None);
        assert_eq!(unwrap_response("IActionResult"), None);
        assert_eq!(unwrap_response("void"), None);
    }
}
