//! Route plugin for frameworks whose parameter binding follows a fixed convention.
//!
//! Annotation-driven frameworks mark each handler parameter
//! (`@PathVariable`, `[FromBody]`, `@Query()`); signature-driven frameworks
//! decide from the parameter's type and default (FastAPI, Play); the rest
//! only contribute the parameters named in the path.

use super::{
    build_routes, struct_parameters, Framework, Handler, HandlerIo, Parameter, ParameterConvention,
    ParameterLocation, Route, RouteExtractor, Schema, SchemaGenerator,
};
use crate::model::{Param, SourceUnit, TypeKind};
use crate::parser::{backend_for, Language};
use log::debug;

/// How a framework binds handler parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    /// Per-parameter annotations or attributes choose the location
    Annotation,
    /// Parameter types and defaults choose the location
    Signature,
    /// Only path placeholders become parameters
    PathOnly,
}

impl Convention {
    pub fn of(framework: Framework) -> Self {
        match framework {
            Framework::Spring | Framework::JaxRs | Framework::AspNet | Framework::Nest => Convention::Annotation,
            Framework::FastApi | Framework::Play => Convention::Signature,
            _ => Convention::PathOnly,
        }
    }
}

/// Route plugin for every framework without a dedicated extractor.
pub struct ConventionExtractor {
    framework: Framework,
    convention: Convention,
}

impl ConventionExtractor {
    pub fn new(framework: Framework) -> Self {
        Self {
            framework,
            convention: Convention::of(framework),
        }
    }
}

impl RouteExtractor for ConventionExtractor {
    fn framework(&self) -> Framework {
        self.framework
    }

    fn extract_routes(&self, units: &[SourceUnit]) -> Vec<Route> {
        let languages = self.framework.languages();
        let routes = build_routes(units, |u| languages.contains(&u.language), &self.convention);
        debug!("{} plugin produced {} routes", self.framework, routes.len());
        routes
    }
}

impl ParameterConvention for Convention {
    fn handler_io(&self, handler: &Handler<'_>, schemas: &mut SchemaGenerator<'_>) -> HandlerIo {
        match self {
            Convention::Annotation => annotated_io(handler, schemas),
            Convention::Signature => signature_io(handler, schemas),
            Convention::PathOnly => HandlerIo::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Path,
    Query,
    Header,
    Body,
}

impl Binding {
    fn location(self) -> Option<ParameterLocation> {
        match self {
            Binding::Path => Some(ParameterLocation::Path),
            Binding::Query => Some(ParameterLocation::Query),
            Binding::Header => Some(ParameterLocation::Header),
            Binding::Body => None,
        }
    }
}

/// Framework-supplied values that never come from the request payload.
const INJECTED_TYPES: &[&str] = &[
    "HttpServletRequest", "HttpServletResponse", "ServerHttpRequest", "ServerWebExchange", "Model",
    "ModelMap", "Principal", "Authentication", "BindingResult", "Errors", "Locale", "HttpSession",
    "UriInfo", "SecurityContext", "HttpHeaders", "AsyncResponse", "CancellationToken", "HttpContext",
    "ClaimsPrincipal", "Request", "Response", "Session", "BackgroundTasks", "WebSocket",
];

/// Parameter names bound to the framework rather than the request.
const INJECTED_NAMES: &[&str] = &["self", "cls", "request", "req", "response", "res"];

/// A parameter's binding as read from its annotation or inferred from its type.
struct Bound {
    binding: Binding,
    name: Option<String>,
    optional: bool,
}

impl Bound {
    fn implicit(binding: Binding) -> Self {
        Self {
            binding,
            name: None,
            optional: false,
        }
    }
}

fn annotation_binding(param: &Param) -> Option<Bound> {
    param.annotations.iter().find_map(|ann| {
        let binding = match ann.simple_name() {
            "PathVariable" | "PathParam" | "FromRoute" | "Param" => Binding::Path,
            "RequestParam" | "QueryParam" | "FromQuery" | "Query" => Binding::Query,
            "RequestHeader" | "HeaderParam" | "FromHeader" | "Header" | "Headers" => Binding::Header,
            "RequestBody" | "FromBody" | "Body" => Binding::Body,
            _ => return None,
        };
        let name = ann
            .string_arg(0)
            .or_else(|| ann.string_named("value"))
            .or_else(|| ann.string_named("name"))
            .filter(|n| !n.is_empty());
        let optional = ann.named("required") == Some("false") || ann.named("defaultValue").is_some();
        Some(Bound {
            binding,
            name,
            optional,
        })
    })
}

fn annotated_io(handler: &Handler<'_>, schemas: &mut SchemaGenerator<'_>) -> HandlerIo {
    let language = handler.language;
    let mut io = HandlerIo::default();
    for param in &handler.method.params {
        if param.raw_type.is_empty() && param.annotations.is_empty() {
            continue;
        }
        let schema = schemas.schema_for(&param.raw_type, language);
        let bound = match annotation_binding(param) {
            Some(bound) => Some(bound),
            None if language == Language::TypeScript => None,
            None => implicit_binding(handler, param, &schema),
        };
        let Some(bound) = bound else {
            continue;
        };
        let name = bound.name.unwrap_or_else(|| param.name.clone());
        match bound.binding.location() {
            None => io.request_body = Some(schema),
            Some(ParameterLocation::Query) if bound.binding == Binding::Query && schema.reference.is_some() => {
                if let Some(fields) = struct_parameters(&param.raw_type, ParameterLocation::Query, schemas) {
                    io.parameters.extend(fields);
                }
            }
            Some(location) => {
                let required = location == ParameterLocation::Path
                    || (!bound.optional && param.required && !is_optional(&param.raw_type, language));
                io.parameters.push(Parameter::new(name, location, required, schema));
            }
        }
    }
    io.response = response(handler, schemas);
    io
}

/// Location of an unannotated parameter: a path name, a scalar query value or the body.
fn implicit_binding(handler: &Handler<'_>, param: &Param, schema: &Schema) -> Option<Bound> {
    let type_name = crate::type_map::simple_name(param.raw_type.split(['<', '[']).next().unwrap_or(""));
    if INJECTED_TYPES.contains(&type_name) || INJECTED_NAMES.contains(&param.name.as_str()) {
        return None;
    }
    if handler.path_params.contains(&param.name) {
        return Some(Bound::implicit(Binding::Path));
    }
    if is_scalar_or_list(schema) {
        return Some(Bound::implicit(Binding::Query));
    }
    schema.reference.is_some().then(|| Bound::implicit(Binding::Body))
}

fn is_scalar_or_list(schema: &Schema) -> bool {
    schema.is_primitive() || schema.items.as_deref().is_some_and(Schema::is_primitive)
}

fn is_optional(raw: &str, language: Language) -> bool {
    !raw.is_empty() && backend_for(language).shape(raw).kind == TypeKind::Optional
}

fn response(handler: &Handler<'_>, schemas: &mut SchemaGenerator<'_>) -> Option<Schema> {
    let raw = handler.method.return_type.as_deref()?;
    schemas.response_schema(raw, handler.language)
}

fn signature_io(handler: &Handler<'_>, schemas: &mut SchemaGenerator<'_>) -> HandlerIo {
    let language = handler.language;
    let mut io = HandlerIo::default();
    for param in &handler.method.params {
        if INJECTED_NAMES.contains(&param.name.as_str()) || param.raw_type.is_empty() {
            continue;
        }
        let type_name = crate::type_map::simple_name(param.raw_type.split(['<', '[']).next().unwrap_or(""));
        if INJECTED_TYPES.contains(&type_name) {
            continue;
        }
        // `q: str = Query(None)` style markers
        let marker = param.annotations.iter().find(|a| {
            matches!(a.simple_name(), "Query" | "Header" | "Path" | "Body" | "Cookie" | "Form" | "File" | "Depends" | "Security")
        });
        let (binding, name) = match marker.map(|m| (m, m.simple_name())) {
            Some((_, "Depends" | "Security" | "Cookie")) => continue,
            Some((ann, callee)) => {
                let binding = match callee {
                    "Query" => Binding::Query,
                    "Header" => Binding::Header,
                    "Path" => Binding::Path,
                    _ => Binding::Body,
                };
                let name = ann.string_named("alias").unwrap_or_else(|| {
                    if binding == Binding::Header {
                        param.name.replace('_', "-")
                    } else {
                        param.name.clone()
                    }
                });
                (binding, name)
            }
            None => {
                let schema_is_scalar = is_scalar_or_list(&schemas.schema_for(&param.raw_type, language));
                let binding = if handler.path_params.contains(&param.name) {
                    Binding::Path
                } else if schema_is_scalar {
                    Binding::Query
                } else {
                    Binding::Body
                };
                (binding, param.name.clone())
            }
        };
        let schema = schemas.schema_for(&param.raw_type, language);
        match binding.location() {
            Some(location) => {
                let required = location == ParameterLocation::Path || param.required;
                io.parameters.push(Parameter::new(name, location, required, schema));
            }
            None => io.request_body = Some(schema),
        }
    }
    io.response = declared_response_model(handler, schemas).or_else(|| response(handler, schemas));
    io
}

/// `response_model=` on the route decorator.
fn declared_response_model(handler: &Handler<'_>, schemas: &mut SchemaGenerator<'_>) -> Option<Schema> {
    let model = handler
        .method
        .annotations
        .iter()
        .find_map(|ann| ann.named("response_model"))?;
    Some(schemas.schema_for(model, handler.language))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn routes(framework: Framework, files: &[(&str, Language, &str)]) -> Vec<Route> {
        let units: Vec<SourceUnit> = files
            .iter()
            .map(|(path, language, code)| parse_source(Path::new(path), *language, code.as_bytes()).unwrap())
            .collect();
        framework.extractor().extract_routes(&units)
    }

    #[test]
    fn test_spring_annotations() {
        let routes = routes(
            Framework::Spring,
            &[
                (
                    "UserController.java",
                    Language::Java,
                    r#"
@RestController
@RequestMapping("/api/users")
public class UserController {
    @GetMapping("/{id}")
    public ResponseEntity<User> getUser(@PathVariable("id") Long userId, @RequestParam(required = false) String fields) {
        return null;
    }

    @PostMapping
    public User createUser(@RequestBody User user, @RequestHeader("X-Trace") String trace) {
        return user;
    }
}
"#,
                ),
                ("User.java", Language::Java, "public class User { private Long id; private String name; }"),
            ],
        );
        assert_eq!(routes.len(), 2);

        let get = &routes[0];
        assert_eq!(get.path, "/api/users/{id}");
        assert_eq!(get.operation_id, "userGetUser");
        assert_eq!(
            get.parameters,
            vec![
                Parameter::new("id", ParameterLocation::Path, true, Schema::of(crate::type_map::TypeMapping::INT64)),
                Parameter::new("fields", ParameterLocation::Query, false, Schema::string()),
            ]
        );
        assert_eq!(get.response, Some(Schema::reference("User")));

        let create = &routes[1];
        assert_eq!(create.request_body, Some(Schema::reference("User")));
        assert_eq!(
            create.parameters,
            vec![Parameter::new("X-Trace", ParameterLocation::Header, true, Schema::string())]
        );
    }

    #[test]
    fn test_aspnet_implicit_binding() {
        let routes = routes(
            Framework::AspNet,
            &[(
                "OrdersController.cs",
                Language::CSharp,
                r#"
[ApiController]
[Route("api/[controller]")]
public class OrdersController : ControllerBase {
    [HttpGet("{id}")]
    public async Task<ActionResult<Order>> Get(int id, int page, CancellationToken ct) { return null; }

    [HttpPost]
    public IActionResult Create([FromBody] Order order) { return Ok(); }
}

public class Order { public int Id { get; set; } }
"#,
            )],
        );
        assert_eq!(routes.len(), 2);
        let names: Vec<(&str, ParameterLocation)> =
            routes[0].parameters.iter().map(|p| (p.name.as_str(), p.location)).collect();
        assert_eq!(names, vec![("id", ParameterLocation::Path), ("page", ParameterLocation::Query)]);
        assert_eq!(routes[0].parameters[0].schema, Schema::of(crate::type_map::TypeMapping::INT32));
        assert_eq!(routes[0].response, Some(Schema::reference("Order")));
        assert_eq!(routes[1].request_body, Some(Schema::reference("Order")));
        assert_eq!(routes[1].response, None);
    }

    #[test]
    fn test_fastapi_signature() {
        let routes = routes(
            Framework::FastApi,
            &[(
                "main.py",
                Language::Python,
                r#"
from fastapi import FastAPI, Query, Header, Depends
from pydantic import BaseModel

app = FastAPI()

class Item(BaseModel):
    name: str
    price: float

@app.get("/items/{item_id}", response_model=Item)
async def read_item(item_id: int, q: str = Query(None), x_token: str = Header(...), db = Depends(get_db)):
    pass

@app.post("/items")
async def create_item(item: Item, notify: bool = False) -> Item:
    pass
"#,
            )],
        );
        assert_eq!(routes.len(), 2);
        let read = &routes[0];
        assert_eq!(
            read.parameters,
            vec![
                Parameter::new("item_id", ParameterLocation::Path, true, Schema::of(crate::type_map::TypeMapping::INTEGER)),
                Parameter::new("q", ParameterLocation::Query, false, Schema::string()),
                Parameter::new("x-token", ParameterLocation::Header, true, Schema::string()),
            ]
        );
        assert_eq!(read.response, Some(Schema::reference("Item")));

        let create = &routes[1];
        assert_eq!(create.request_body, Some(Schema::reference("Item")));
        assert_eq!(
            create.parameters,
            vec![Parameter::new("notify", ParameterLocation::Query, false, Schema::of(crate::type_map::TypeMapping::BOOLEAN))]
        );
        assert_eq!(create.response, Some(Schema::reference("Item")));
    }

    #[test]
    fn test_path_only_lambda_routes() {
        let routes = routes(
            Framework::Express,
            &[(
                "server.ts",
                Language::TypeScript,
                "const app = express();\napp.get('/users/:id', (req, res) => res.json({}));\n",
            )],
        );
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].path, "/users/{id}");
        assert_eq!(routes[0].operation_id, "getUsersById");
        assert_eq!(routes[0].tags, vec!["users".to_string()]);
        assert_eq!(routes[0].parameters, vec![Parameter::new("id", ParameterLocation::Path, true, Schema::string())]);
    }
}
