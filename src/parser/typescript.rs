//! TypeScript/JavaScript scanner: classes, interfaces, object type aliases,
//! NestJS controllers and Express-style routers.

use super::clike::{
    call_split, enum_constants, leading_parens, members, split_default, split_param, strip_words, type_spans,
    GroupVars, Member, Text, TypeSpan,
};
use crate::lexer::{split_top_level, string_literal, AnnotationSyntax, CommentStyle};
use crate::model::{DeclKind, FieldDecl, HttpMethod, MethodDecl, Param, RouteFact, SourceUnit, TypeDecl, Visibility, LAMBDA};
use crate::parser::Language;
use crate::path::PathSyntax;
use crate::type_map::typescript::shape;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

crate::parser::scanner_backend!(TypeScriptBackend, Language::TypeScript, typescript);

static TYPE_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\w$.])(?P<kind>class|interface|enum)\s+(?P<name>[A-Za-z_$][\w$]*)").unwrap()
});
static TYPE_ALIAS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^\w$.])(?P<kind>type)\s+(?P<name>[A-Za-z_$][\w$]*)\s*(?:<[^=]*>)?\s*=\s*\{").unwrap()
});
static IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:[^'";]*?\s+from\s+)?['"]([^'"]+)['"]|\brequire\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap()
});
static ROUTER_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?P<obj>[A-Za-z_$][\w$]*)\s*\.\s*(?P<verb>get|post|put|delete|patch|options|head|all|use|route)\s*\(")
        .unwrap()
});
static LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\.\s*(?P<name>\w+)\s*\(").unwrap());
static OBJECT_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\bpath\s*:\s*['"`]([^'"`]*)['"`]"#).unwrap());

const MODIFIERS: &[&str] = &[
    "public", "private", "protected", "readonly", "static", "abstract", "declare", "override", "async",
    "get", "set", "accessor",
];

const NEST_VERBS: &[&str] = &["Get", "Post", "Put", "Delete", "Patch", "Options", "Head", "All"];

fn kind_of(keyword: &str) -> Option<DeclKind> {
    Some(match keyword {
        "class" => DeclKind::Class,
        "interface" | "type" => DeclKind::Interface,
        "enum" => DeclKind::Enum,
        _ => return None,
    })
}

pub fn scan(path: &Path, content: &str) -> SourceUnit {
    let text = Text::new(content, CommentStyle::CLike);
    let mut unit = SourceUnit::new(path, Language::TypeScript, content);
    unit.imports = IMPORT
        .captures_iter(&text.masked)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).map(|m| m.as_str().to_string()))
        .collect();

    let mut spans = type_spans(&text, &TYPE_DECL, b";", AnnotationSyntax::At, kind_of);
    spans.extend(type_spans(&text, &TYPE_ALIAS, b";", AnnotationSyntax::At, kind_of));
    spans.sort_by_key(|s| s.start);
    for span in &spans {
        if let Some(decl) = type_decl(&text, span) {
            nest_routes(&decl, &mut unit.routes);
            unit.types.push(decl);
        }
    }
    express_routes(&text, &mut unit.routes);
    unit
}

fn type_decl(text: &Text, span: &TypeSpan) -> Option<TypeDecl> {
    let mut decl = TypeDecl::new(&span.name, span.kind, span.line)?;
    decl.annotations = span.annotations.clone();
    decl.supertypes = supertypes(&span.header);
    let body = span.body?;
    if decl.kind == DeclKind::Enum {
        decl.variants = enum_constants(body.body(&text.masked), AnnotationSyntax::At);
        return Some(decl);
    }
    let is_class = span.keyword == "class";
    for member in members(text, &body, AnnotationSyntax::At, true) {
        add_member(&mut decl, &member, is_class);
    }
    Some(decl)
}

/// `extends Base<T> implements A, B`, generic arguments dropped.
fn supertypes(header: &str) -> Vec<String> {
    let mut out = Vec::new();
    for (i, part) in header.split_whitespace().collect::<Vec<_>>().join(" ").split("implements").enumerate() {
        let part = part.trim();
        let list = match part.split_once("extends") {
            Some((_, rest)) => rest,
            None if i > 0 => part,
            None => continue,
        };
        out.extend(
            split_top_level(list, b',')
                .iter()
                .map(|s| s.split('<').next().unwrap_or(s).trim().to_string())
                .filter(|s| !s.is_empty()),
        );
    }
    out
}

fn visibility(modifiers: &[&str]) -> Visibility {
    if modifiers.contains(&"private") {
        Visibility::Private
    } else if modifiers.contains(&"protected") {
        Visibility::Protected
    } else {
        Visibility::Public
    }
}

/// `name?: Type` as (name, type, optional).
fn name_and_type(left: &str) -> Option<(String, String, bool)> {
    let (name, ty) = match left.split_once(':') {
        Some((name, ty)) => (name.trim(), ty.trim()),
        None => (left.trim(), ""),
    };
    let optional = name.ends_with('?');
    let name = name.trim_end_matches(['?', '!']).trim_start_matches("...");
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$') {
        return None;
    }
    Some((name.to_string(), ty.to_string(), optional))
}

fn add_member(decl: &mut TypeDecl, member: &Member, is_class: bool) {
    let (mut modifiers, mut rest) = strip_words(&member.decl, MODIFIERS);
    // `get(id) {}` is a method named get, `set: number` a field named set
    if rest.is_empty() || rest.starts_with(['(', '<', ':', '?', '=', '!']) {
        if let Some(name) = modifiers.pop() {
            let offset = member.decl.len() - rest.len();
            if let Some(at) = member.decl[..offset].rfind(name) {
                rest = &member.decl[at..];
            }
        }
    }
    let visibility = visibility(&modifiers);
    let is_async = modifiers.contains(&"async");

    if let Some((head, params, tail)) = call_split(rest) {
        if !head.contains(':') {
            if !is_class || head == "constructor" {
                return;
            }
            let name = head.split('<').next().unwrap_or(head).trim_end_matches('?').trim();
            let mut method = MethodDecl::new(name, member.line);
            method.params = parse_params(params, member.line);
            method.return_type = tail.strip_prefix(':').map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
            method.is_async = is_async || method.return_type.as_deref().is_some_and(|t| t.starts_with("Promise"));
            method.visibility = visibility;
            method.annotations = member.annotations.clone();
            method.owner = Some(decl.name.clone());
            decl.methods.push(method);
            return;
        }
    }

    if modifiers.contains(&"static") || visibility == Visibility::Private || rest.starts_with('#') {
        return;
    }
    let (left, default) = split_default(rest);
    let Some((name, mut ty, optional)) = name_and_type(left) else {
        return;
    };
    // Arrow-function properties are handlers: `list = async (req, res) => {}`
    if let Some(value) = default {
        let value = value.strip_prefix("async").unwrap_or(value).trim_start();
        if let Some((params, after)) = leading_parens(value) {
            if after.trim_start().starts_with("=>") && is_class {
                let mut method = MethodDecl::new(name, member.line);
                method.params = parse_params(params, member.line);
                method.is_async = default.is_some_and(|d| d.starts_with("async"));
                method.annotations = member.annotations.clone();
                method.owner = Some(decl.name.clone());
                decl.methods.push(method);
                return;
            }
        }
    }
    // `meta: { a: string }`
    if ty.is_empty() && member.body.is_some() && left.trim_end().ends_with(':') {
        ty = "object".to_string();
    }
    let mut field = FieldDecl::new(name, ty.as_str(), shape(&ty), member.line).with_default(default.map(String::from));
    field.optional = field.optional || optional;
    field.annotations = member.annotations.clone();
    decl.fields.push(field);
}

fn parse_params(params: &str, line: usize) -> Vec<Param> {
    split_top_level(params, b',')
        .into_iter()
        .filter_map(|raw| {
            let (annotations, rest) = split_param(&raw, AnnotationSyntax::At, line);
            let (_, rest) = strip_words(&rest, MODIFIERS);
            let (left, default) = split_default(rest);
            let (name, ty, optional) = name_and_type(left)?;
            let mut param = Param::new(name, ty.as_str()).with_default(default.map(String::from));
            if optional || shape(&ty).optional {
                param.required = false;
            }
            param.annotations = annotations;
            Some(param)
        })
        .collect()
}

/// `@Controller('users')` classes with `@Get(':id')` style method decorators.
fn nest_routes(decl: &TypeDecl, routes: &mut Vec<RouteFact>) {
    let Some(controller) = decl.annotation("Controller") else {
        return;
    };
    let prefix = controller
        .string_arg(0)
        .or_else(|| {
            let arg = controller.args.first()?;
            OBJECT_PATH.captures(arg).map(|c| c[1].to_string())
        })
        .unwrap_or_default();
    for method in &decl.methods {
        for ann in method.annotations.iter().filter(|a| NEST_VERBS.contains(&a.simple_name())) {
            let verb = match ann.simple_name() {
                "All" => HttpMethod::Get,
                other => match HttpMethod::parse(other) {
                    Some(verb) => verb,
                    None => continue,
                },
            };
            let path = ann.string_arg(0).unwrap_or_default();
            routes.push(
                RouteFact::new(verb, path, &method.name, PathSyntax::Colon, method.line)
                    .with_owner(Some(decl.name.clone()))
                    .with_group(Some(prefix.clone())),
            );
        }
    }
}

/// Handler of an Express route: the last argument, unwrapped from wrapper calls.
fn express_handler(arg: &str) -> Option<(Option<String>, String)> {
    let arg = arg.trim();
    if arg.starts_with('{') || arg.starts_with('[') || string_literal(arg).is_some() {
        return None;
    }
    let arrow = ["(", "async ", "async(", "function"].iter().any(|p| arg.starts_with(p));
    if arrow || arg.contains("=>") {
        return Some((None, LAMBDA.to_string()));
    }
    // asyncHandler(getUsers)
    if let Some(open) = arg.find('(') {
        let inner = arg[open + 1..].strip_suffix(')')?;
        let args = split_top_level(inner, b',');
        return express_handler(args.last()?);
    }
    if !arg.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.')) {
        return None;
    }
    Some(match arg.rsplit_once('.') {
        // Static methods keep their class as owner
        Some((owner, name)) if owner.starts_with(char::is_uppercase) => (Some(owner.to_string()), name.to_string()),
        Some((_, name)) => (None, name.to_string()),
        None => (None, arg.to_string()),
    })
}

fn route_path(arg: Option<&String>) -> Option<String> {
    let path = string_literal(arg?)?;
    (path.starts_with('/') || path == "*").then_some(path)
}

/// `router.get('/x', h)`, `router.route('/x').get(h).put(h)` and `app.use('/api', router)`.
fn express_routes(text: &Text, routes: &mut Vec<RouteFact>) {
    let calls: Vec<(usize, String, String, usize)> = ROUTER_CALL
        .captures_iter(&text.clean)
        .filter_map(|c| {
            let whole = c.get(0)?;
            Some((whole.start(), c["obj"].to_string(), c["verb"].to_string(), whole.end() - 1))
        })
        .collect();

    let mut groups = GroupVars::default();
    for (_, obj, verb, open) in &calls {
        if verb != "use" {
            continue;
        }
        let Some((args, _)) = text.call_args(*open) else {
            continue;
        };
        let (Some(prefix), Some(child)) = (route_path(args.first()), args.last()) else {
            continue;
        };
        let child = child.trim();
        if args.len() > 1 && child.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$') {
            groups.insert(child, obj, &prefix);
        }
    }

    for (at, obj, verb, open) in &calls {
        let Some((args, close)) = text.call_args(*open) else {
            continue;
        };
        let line = text.line(*at);
        let group = Some(groups.prefix(obj));
        match verb.as_str() {
            "use" => {}
            "route" => {
                let Some(path) = route_path(args.first()) else {
                    continue;
                };
                let mut cursor = close + 1;
                while let Some(cap) = LINK.captures(&text.clean[cursor..]) {
                    let (Some(whole), Some(name)) = (cap.get(0), cap.name("name")) else {
                        break;
                    };
                    let Some((link_args, link_close)) = text.call_args(cursor + whole.end() - 1) else {
                        break;
                    };
                    let verb = match &cap["name"] {
                        "all" => Some(HttpMethod::Get),
                        name => HttpMethod::parse(name),
                    };
                    if let (Some(verb), Some((owner, handler))) =
                        (verb, link_args.last().and_then(|h| express_handler(h)))
                    {
                        routes.push(
                            RouteFact::new(verb, path.clone(), handler, PathSyntax::Colon, text.line(cursor + name.start()))
                                .with_owner(owner)
                                .with_group(group.clone()),
                        );
                    }
                    cursor = link_close + 1;
                }
            }
            verb => {
                if args.len() < 2 {
                    continue;
                }
                let Some(path) = route_path(args.first()) else {
                    continue;
                };
                let Some((owner, handler)) = args.last().and_then(|h| express_handler(h)) else {
                    continue;
                };
                let method = if verb == "all" { Some(HttpMethod::Get) } else { HttpMethod::parse(verb) };
                if let Some(method) = method {
                    routes.push(
                        RouteFact::new(method, path, handler, PathSyntax::Colon, line)
                            .with_owner(owner)
                            .with_group(group),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::join_paths;
    use pretty_assertions::assert_eq;

    fn routes(unit: &SourceUnit) -> Vec<(HttpMethod, String, String)> {
        unit.routes
            .iter()
            .map(|r| (r.method, join_paths(r.group.as_deref(), &r.path, r.syntax), r.handler.clone()))
            .collect()
    }

    #[test]
    fn test_nest_controller() {
        let unit = scan(
            Path::new("src/users/users.controller.ts"),
            r#"import { Controller, Get, Post, Body, Param, Query } from '@nestjs/common';
import { CreateUserDto } from './dto/create-user.dto';

@Controller('users')
export class UsersController {
  constructor(private readonly usersService: UsersService) {}

  @Get()
  findAll(@Query() query: ListUsersDto): Promise<User[]> {
    return this.usersService.findAll(query);
  }

  @Get(':id')
  async findOne(@Param('id') id: string) {
    return this.usersService.findOne(id);
  }

  @Post()
  @HttpCode(201)
  create(@Body() dto: CreateUserDto) {
    return this.usersService.create(dto);
  }
}
"#,
        );
        assert_eq!(unit.imports, vec!["@nestjs/common", "./dto/create-user.dto"]);
        assert_eq!(
            routes(&unit),
            vec![
                (HttpMethod::Get, "/users".to_string(), "findAll".to_string()),
                (HttpMethod::Get, "/users/{id}".to_string(), "findOne".to_string()),
                (HttpMethod::Post, "/users".to_string(), "create".to_string()),
            ]
        );
        let controller = unit.find_type("UsersController").unwrap();
        assert_eq!(controller.methods.len(), 3);
        let find_one = &controller.methods[1];
        assert!(find_one.is_async);
        assert_eq!(find_one.params[0].annotation("Param").unwrap().string_arg(0).as_deref(), Some("id"));
        assert_eq!(controller.methods[0].return_type.as_deref(), Some("Promise<User[]>"));
        assert!(controller.fields.is_empty());
    }

    #[test]
    fn test_dto_shapes() {
        let unit = scan(
            Path::new("src/dto.ts"),
            r#"export class CreateUserDto extends BaseDto implements Validatable {
  @ApiProperty()
  @IsString()
  name: string;

  @IsOptional()
  nickname?: string;
  tags: string[] = [];
  private secret: string;
  static VERSION = 1;
}

export interface Address {
  street: string
  zip: string | null
  format(): string
}

export type Page = {
  items: Address[];
  total: number;
};

export enum Role { Admin = 'admin', User = 'user' }
"#,
        );
        let dto = unit.find_type("CreateUserDto").unwrap();
        assert_eq!(dto.supertypes, vec!["BaseDto", "Validatable"]);
        let fields: Vec<(&str, bool)> = dto.fields.iter().map(|f| (f.name.as_str(), f.is_required())).collect();
        assert_eq!(fields, vec![("name", true), ("nickname", false), ("tags", false)]);
        assert_eq!(dto.fields[0].annotations.len(), 2);

        let address = unit.find_type("Address").unwrap();
        assert_eq!(address.kind, DeclKind::Interface);
        let fields: Vec<(&str, bool)> = address.fields.iter().map(|f| (f.name.as_str(), f.is_required())).collect();
        assert_eq!(fields, vec![("street", true), ("zip", false)]);

        let page = unit.find_type("Page").unwrap();
        assert_eq!(page.fields[0].element_type.as_deref(), Some("Address"));
        assert_eq!(unit.find_type("Role").unwrap().variants, vec!["Admin", "User"]);
    }

    #[test]
    fn test_express_router() {
        let unit = scan(
            Path::new("src/app.js"),
            r#"const express = require('express');
const app = express();
const router = express.Router();

router.get('/users/:id', getUser);
router.post('/users', auth, asyncHandler(async (req, res) => {
  res.status(201).json(await create(req.body));
}));
router.route('/items/:id')
  .get(itemController.show)
  .delete(ItemController.remove);

app.use('/api', router);
app.get('/health', (req, res) => res.send('ok'));
axios.get('/not-a-route');
const cached = cache.get('/key', { ttl: 5 });
"#,
        );
        assert_eq!(unit.imports, vec!["express"]);
        assert_eq!(
            routes(&unit),
            vec![
                (HttpMethod::Get, "/api/users/{id}".to_string(), "getUser".to_string()),
                (HttpMethod::Post, "/api/users".to_string(), LAMBDA.to_string()),
                (HttpMethod::Get, "/api/items/{id}".to_string(), "show".to_string()),
                (HttpMethod::Delete, "/api/items/{id}".to_string(), "remove".to_string()),
                (HttpMethod::Get, "/health".to_string(), LAMBDA.to_string()),
            ]
        );
        assert_eq!(unit.routes[3].owner.as_deref(), Some("ItemController"));
        assert_eq!(unit.routes[2].line, 10);
    }
}
