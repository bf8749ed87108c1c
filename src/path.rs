//! Route path normalization to the `{name}` convention.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Path-parameter syntax of the framework that declared a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PathSyntax {
    /// `{id}`, `{id:int}`, `{id?}`, `{*rest}` (ASP.NET, Spring, JAX-RS, FastAPI, Symfony, Laravel)
    #[default]
    Canonical,
    /// `:id`, `:id?`, `:id(\d+)`, `*splat` (Express, Rails, Sinatra, Gin, Echo, Ktor, Phoenix, Vapor, Pistache, Axum 0.7)
    Colon,
    /// `$id<[0-9]+>` and `:id` (Play routes files)
    Dollar,
    /// `<int:id>`, `<id>`, `<int>` and `(?P<id>...)` (Flask, Django, Crow)
    Angle,
    /// Comma-separated quoted segments: `"users", ":id"` (Vapor)
    Segments,
}

static CONSTRAINED_BRACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\**([A-Za-z_][\w.-]*)(?:\?|:[^{}]*(?:\{[^{}]*\}[^{}]*)*)?\}").unwrap());
static COLON_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(^|/|\.|-):([A-Za-z_]\w*)\??(?:\([^)]*\))?").unwrap());
static SPLAT_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(^|/)\*([A-Za-z_]\w*)").unwrap());
static OPTIONAL_FORMAT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\.:format\)").unwrap());
static DOLLAR_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([A-Za-z_]\w*)(?:<[^>]*>)?").unwrap());
static NAMED_GROUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(\?P<([A-Za-z_]\w*)>[^)]*\)").unwrap());
static TYPED_ANGLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(?:(?:[A-Za-z_]\w*)\s*:\s*)?([A-Za-z_]\w*)>").unwrap());
static BARE_TYPE_ANGLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(int|uint|float|double|string|path|str)>").unwrap());
static PATH_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^{}/]+)\}").unwrap());

/// Convert a framework-native path template to canonical `{name}` form.
///
/// Always yields a path with a single leading `/`, no duplicate slashes and
/// no trailing slash (except the root). Canonical input is returned
/// unchanged, so normalizing twice is the same as normalizing once.
pub fn normalize_path(raw: &str, syntax: PathSyntax) -> String {
    let mut path = match syntax {
        PathSyntax::Segments => join_segments(raw),
        _ => raw.trim().to_string(),
    };

    match syntax {
        PathSyntax::Canonical => {}
        PathSyntax::Colon | PathSyntax::Segments => {
            path = colon_to_canonical(&path);
        }
        PathSyntax::Dollar => {
            path = DOLLAR_PARAM.replace_all(&path, "{$1}").into_owned();
            path = colon_to_canonical(&path);
        }
        PathSyntax::Angle => {
            path = angle_to_canonical(&path);
        }
    }

    path = CONSTRAINED_BRACE.replace_all(&path, "{$1}").into_owned();
    tidy_slashes(&path)
}

fn colon_to_canonical(path: &str) -> String {
    let path = OPTIONAL_FORMAT.replace_all(path, "");
    let path = COLON_PARAM.replace_all(&path, "$1{$2}");
    SPLAT_PARAM.replace_all(&path, "$1{$2}").into_owned()
}

fn angle_to_canonical(path: &str) -> String {
    // Django re_path: r'^users/(?P<pk>\d+)/$'
    let path = path.trim_start_matches('^').trim_end_matches('$');
    let path = NAMED_GROUP.replace_all(path, "{$1}");
    let mut counter = 0;
    let path = BARE_TYPE_ANGLE.replace_all(&path, |_: &Captures| {
        counter += 1;
        format!("{{param{}}}", counter)
    });
    TYPED_ANGLE.replace_all(&path, "{$1}").into_owned()
}

/// `"users", ":id"` -> `users/:id`
fn join_segments(raw: &str) -> String {
    if !raw.contains(['"', '\'']) {
        return raw.trim().to_string();
    }
    crate::lexer::split_top_level(raw, b',')
        .iter()
        .filter_map(|segment| crate::lexer::string_literal(segment))
        .collect::<Vec<_>>()
        .join("/")
}

fn tidy_slashes(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Parameter names of a canonical path, left to right.
pub fn extract_path_params(path: &str) -> Vec<String> {
    PATH_PARAM
        .captures_iter(path)
        .map(|cap| {
            let inner = &cap[1];
            inner
                .split(':')
                .next()
                .unwrap_or(inner)
                .trim_start_matches('*')
                .trim_end_matches('?')
                .to_string()
        })
        .collect()
}

/// Normalize a group prefix and a route path separately, then concatenate.
pub fn join_paths(group: Option<&str>, path: &str, syntax: PathSyntax) -> String {
    let path = normalize_path(path, syntax);
    match group {
        None => path,
        Some(group) => {
            let group = normalize_path(group, syntax);
            match (group.as_str(), path.as_str()) {
                ("/", _) => path,
                (_, "/") => group,
                _ => format!("{}{}", group, path),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colon_params() {
        assert_eq!(normalize_path("/users/:id", PathSyntax::Colon), "/users/{id}");
        assert_eq!(normalize_path("users/:user_id/posts/:id?", PathSyntax::Colon), "/users/{user_id}/posts/{id}");
        assert_eq!(normalize_path("/files/*path", PathSyntax::Colon), "/files/{path}");
        assert_eq!(normalize_path("/n/:id(\\d+)", PathSyntax::Colon), "/n/{id}");
        assert_eq!(normalize_path("/a/:id(.:format)", PathSyntax::Colon), "/a/{id}");
    }

    #[test]
    fn test_dollar_params() {
        assert_eq!(normalize_path("/clients/$id<[0-9]+>", PathSyntax::Dollar), "/clients/{id}");
        assert_eq!(normalize_path("/clients/:id", PathSyntax::Dollar), "/clients/{id}");
    }

    #[test]
    fn test_angle_params() {
        assert_eq!(normalize_path("/users/<int:user_id>", PathSyntax::Angle), "/users/{user_id}");
        assert_eq!(normalize_path("/users/<name>", PathSyntax::Angle), "/users/{name}");
        assert_eq!(normalize_path("/add/<int>/<int>", PathSyntax::Angle), "/add/{param1}/{param2}");
        assert_eq!(normalize_path("users/<int:pk>/", PathSyntax::Angle), "/users/{pk}");
        assert_eq!(normalize_path(r"^users/(?P<pk>\d+)/$", PathSyntax::Angle), "/users/{pk}");
    }

    #[test]
    fn test_canonical_constraints() {
        assert_eq!(normalize_path("api/users/{id:int}", PathSyntax::Canonical), "/api/users/{id}");
        assert_eq!(normalize_path("/posts/{slug?}", PathSyntax::Canonical), "/posts/{slug}");
        assert_eq!(normalize_path("/docs/{*rest}", PathSyntax::Canonical), "/docs/{rest}");
        assert_eq!(normalize_path("/x/{id:[0-9]{3}}", PathSyntax::Canonical), "/x/{id}");
        assert_eq!(normalize_path("", PathSyntax::Canonical), "/");
    }

    #[test]
    fn test_segments() {
        assert_eq!(normalize_path("\"users\", \":id\"", PathSyntax::Segments), "/users/{id}");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let cases = [
            ("/users/:id/:name", PathSyntax::Colon),
            ("/c/$id<[0-9]+>", PathSyntax::Dollar),
            ("/a/<int>/<int:b>", PathSyntax::Angle),
            ("/p/{id:int}/x/", PathSyntax::Canonical),
            ("\"todos\", \":todoID\"", PathSyntax::Segments),
        ];
        for (raw, syntax) in cases {
            let once = normalize_path(raw, syntax);
            assert_eq!(normalize_path(&once, syntax), once, "{}", raw);
            assert_eq!(normalize_path(&once, PathSyntax::Canonical), once);
        }
    }

    #[test]
    fn test_extract_params_in_order() {
        assert_eq!(
            extract_path_params(&normalize_path(":id/:name", PathSyntax::Colon)),
            vec!["id", "name"]
        );
        assert!(extract_path_params("/health").is_empty());
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths(Some("/api/"), "users/:id", PathSyntax::Colon), "/api/users/{id}");
        assert_eq!(join_paths(Some("/api"), "/", PathSyntax::Colon), "/api");
        assert_eq!(join_paths(Some("/"), "/x", PathSyntax::Colon), "/x");
        assert_eq!(join_paths(None, "x", PathSyntax::Canonical), "/x");
    }
}
