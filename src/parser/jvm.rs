//! Annotation routing shared by the Java and Kotlin scanners (Spring MVC, JAX-RS).

use crate::lexer::{split_top_level, string_literal};
use crate::model::{Annotation, HttpMethod, MethodDecl, RouteFact, TypeDecl};
use crate::path::PathSyntax;

const SPRING_VERBS: &[(&str, HttpMethod)] = &[
    ("GetMapping", HttpMethod::Get),
    ("PostMapping", HttpMethod::Post),
    ("PutMapping", HttpMethod::Put),
    ("DeleteMapping", HttpMethod::Delete),
    ("PatchMapping", HttpMethod::Patch),
];

const JAXRS_VERBS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

/// Paths of a mapping annotation: positional, `value` or `path`, arrays expanded.
pub fn mapping_paths(ann: &Annotation) -> Vec<String> {
    let raw = ann
        .args
        .first()
        .map(String::as_str)
        .or_else(|| ann.named("value"))
        .or_else(|| ann.named("path"));
    match raw {
        Some(raw) => literal_list(raw),
        None => Vec::new(),
    }
}

/// `"a"`, `{"a", "b"}`, `["a"]` or `arrayOf("a")` as unquoted strings.
pub fn literal_list(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let inner = raw
        .strip_prefix("arrayOf(")
        .and_then(|r| r.strip_suffix(')'))
        .or_else(|| raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')))
        .or_else(|| raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')))
        .unwrap_or(raw);
    split_top_level(inner, b',')
        .iter()
        .filter_map(|item| string_literal(item))
        .collect()
}

/// `RequestMethod.POST`, `{RequestMethod.GET, RequestMethod.PUT}`, `[RequestMethod.GET]`.
fn request_methods(raw: &str) -> Vec<HttpMethod> {
    let raw = raw.trim().trim_start_matches(['{', '[']).trim_end_matches(['}', ']']);
    split_top_level(raw, b',')
        .iter()
        .filter_map(|item| HttpMethod::parse(item.rsplit('.').next().unwrap_or(item)))
        .collect()
}

/// Class-level prefix from `@RequestMapping` or JAX-RS `@Path`.
fn class_prefixes(decl: &TypeDecl) -> Vec<String> {
    if let Some(ann) = decl.annotation("RequestMapping") {
        let paths = mapping_paths(ann);
        if !paths.is_empty() {
            return paths;
        }
    }
    if let Some(ann) = decl.annotation("Path") {
        return mapping_paths(ann);
    }
    vec![String::new()]
}

/// HTTP methods and paths declared on one handler method.
fn method_mappings(method: &MethodDecl) -> Vec<(HttpMethod, String)> {
    let mut out = Vec::new();
    for ann in &method.annotations {
        let name = ann.simple_name();
        if let Some((_, verb)) = SPRING_VERBS.iter().find(|(n, _)| *n == name) {
            let paths = mapping_paths(ann);
            if paths.is_empty() {
                out.push((*verb, String::new()));
            }
            out.extend(paths.into_iter().map(|p| (*verb, p)));
        } else if name == "RequestMapping" {
            let mut verbs = ann.named("method").map(request_methods).unwrap_or_default();
            if verbs.is_empty() {
                verbs.push(HttpMethod::Get);
            }
            let mut paths = mapping_paths(ann);
            if paths.is_empty() {
                paths.push(String::new());
            }
            for verb in verbs {
                out.extend(paths.iter().map(|p| (verb, p.clone())));
            }
        }
    }
    if out.is_empty() {
        // JAX-RS: @GET plus an optional @Path on the method
        let path = method
            .annotation("Path")
            .map(|a| mapping_paths(a).into_iter().next().unwrap_or_default())
            .unwrap_or_default();
        for ann in &method.annotations {
            if JAXRS_VERBS.contains(&ann.simple_name()) {
                if let Some(verb) = HttpMethod::parse(ann.simple_name()) {
                    out.push((verb, path.clone()));
                }
            }
        }
    }
    out
}

/// Routes of every mapped method of `decl`, prefixed by the class mapping.
pub fn annotated_routes(decl: &TypeDecl, routes: &mut Vec<RouteFact>) {
    if decl.has_annotation("FeignClient") {
        return;
    }
    let prefixes = class_prefixes(decl);
    for method in &decl.methods {
        for (verb, path) in method_mappings(method) {
            for prefix in &prefixes {
                routes.push(
                    RouteFact::new(verb, path.clone(), &method.name, PathSyntax::Canonical, method.line)
                        .with_owner(Some(decl.name.clone()))
                        .with_group(Some(prefix.clone())),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeclKind;
    use pretty_assertions::assert_eq;

    fn annotation(name: &str, args: &[&str], named: &[(&str, &str)]) -> Annotation {
        let mut ann = Annotation::new(name, 1);
        ann.args = args.iter().map(|a| a.to_string()).collect();
        ann.named_args = named.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ann
    }

    #[test]
    fn test_literal_list_forms() {
        assert_eq!(literal_list("\"/a\""), vec!["/a"]);
        assert_eq!(literal_list("{\"/a\", \"/b\"}"), vec!["/a", "/b"]);
        assert_eq!(literal_list("[\"/a\"]"), vec!["/a"]);
        assert_eq!(literal_list("arrayOf(\"/a\")"), vec!["/a"]);
    }

    #[test]
    fn test_request_mapping_methods() {
        let mut decl = TypeDecl::new("ItemController", DeclKind::Class, 1).unwrap();
        decl.annotations.push(annotation("RequestMapping", &[], &[("path", "\"/items\"")]));
        let mut method = MethodDecl::new("sync", 5);
        method.annotations.push(annotation(
            "RequestMapping",
            &["\"/sync\""],
            &[("method", "{RequestMethod.PUT, RequestMethod.PATCH}")],
        ));
        decl.methods.push(method);
        let mut plain = MethodDecl::new("all", 8);
        plain.annotations.push(annotation("RequestMapping", &[], &[]));
        decl.methods.push(plain);

        let mut routes = Vec::new();
        annotated_routes(&decl, &mut routes);
        let got: Vec<(HttpMethod, String, Option<String>)> = routes
            .iter()
            .map(|r| (r.method, r.path.clone(), r.group.clone()))
            .collect();
        assert_eq!(
            got,
            vec![
                (HttpMethod::Put, "/sync".to_string(), Some("/items".to_string())),
                (HttpMethod::Patch, "/sync".to_string(), Some("/items".to_string())),
                (HttpMethod::Get, String::new(), Some("/items".to_string())),
            ]
        );
    }
}
