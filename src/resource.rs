//! Expansion of resource macros into individual CRUD routes.

use crate::model::{HttpMethod, ResourceFact, RouteFact};
use crate::path::PathSyntax;

/// Which framework's action table a resource follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceStyle {
    Rails,
    Laravel,
    Phoenix,
}

impl ResourceStyle {
    /// Path syntax used by the framework's route files.
    pub fn path_syntax(&self) -> PathSyntax {
        match self {
            ResourceStyle::Rails | ResourceStyle::Phoenix => PathSyntax::Colon,
            ResourceStyle::Laravel => PathSyntax::Canonical,
        }
    }

    fn actions(&self) -> &'static [Action] {
        match self {
            ResourceStyle::Rails => RAILS_ACTIONS,
            ResourceStyle::Laravel => LARAVEL_ACTIONS,
            ResourceStyle::Phoenix => PHOENIX_ACTIONS,
        }
    }
}

/// One row of an action table.
#[derive(Debug)]
struct Action {
    method: HttpMethod,
    /// Suffix appended to the collection path (`{id}` for member routes)
    suffix: &'static str,
    name: &'static str,
    /// HTML form routes are omitted from API-only resources
    form: bool,
    /// Collection-only routes are omitted from singular resources
    collection: bool,
}

const fn action(method: HttpMethod, suffix: &'static str, name: &'static str) -> Action {
    Action {
        method,
        suffix,
        name,
        form: false,
        collection: false,
    }
}

const fn form(mut a: Action) -> Action {
    a.form = true;
    a
}

const fn collection(mut a: Action) -> Action {
    a.collection = true;
    a
}

static RAILS_ACTIONS: &[Action] = &[
    collection(action(HttpMethod::Get, "", "index")),
    form(action(HttpMethod::Get, "/new", "new")),
    action(HttpMethod::Post, "", "create"),
    action(HttpMethod::Get, "/{id}", "show"),
    form(action(HttpMethod::Get, "/{id}/edit", "edit")),
    action(HttpMethod::Patch, "/{id}", "update"),
    action(HttpMethod::Put, "/{id}", "update"),
    action(HttpMethod::Delete, "/{id}", "destroy"),
];

static LARAVEL_ACTIONS: &[Action] = &[
    collection(action(HttpMethod::Get, "", "index")),
    form(action(HttpMethod::Get, "/create", "create")),
    action(HttpMethod::Post, "", "store"),
    action(HttpMethod::Get, "/{id}", "show"),
    form(action(HttpMethod::Get, "/{id}/edit", "edit")),
    action(HttpMethod::Put, "/{id}", "update"),
    action(HttpMethod::Patch, "/{id}", "update"),
    action(HttpMethod::Delete, "/{id}", "destroy"),
];

static PHOENIX_ACTIONS: &[Action] = &[
    collection(action(HttpMethod::Get, "", "index")),
    form(action(HttpMethod::Get, "/{id}/edit", "edit")),
    form(action(HttpMethod::Get, "/new", "new")),
    action(HttpMethod::Get, "/{id}", "show"),
    action(HttpMethod::Post, "", "create"),
    action(HttpMethod::Patch, "/{id}", "update"),
    action(HttpMethod::Put, "/{id}", "update"),
    action(HttpMethod::Delete, "/{id}", "delete"),
];

/// Expand a resource macro into the route facts it implies.
///
/// A non-empty `only` list is an allow-list; otherwise `except` is a
/// deny-list. Singular resources have no collection route and no `{id}`.
pub fn expand_resource(resource: &ResourceFact) -> Vec<RouteFact> {
    let base = format!("/{}", resource.path.trim_matches('/'));
    resource
        .style
        .actions()
        .iter()
        .filter(|a| !(resource.is_api && a.form))
        .filter(|a| !(resource.singular && a.collection))
        .filter(|a| {
            if !resource.only.is_empty() {
                resource.only.iter().any(|o| o == a.name)
            } else {
                !resource.except.iter().any(|e| e == a.name)
            }
        })
        .map(|a| {
            let suffix = if resource.singular {
                a.suffix.replace("/{id}", "")
            } else {
                a.suffix.to_string()
            };
            RouteFact::new(
                a.method,
                format!("{}{}", base, suffix),
                a.name,
                resource.syntax,
                resource.line,
            )
            .with_owner(Some(resource.controller.clone()))
            .with_group(resource.group.clone())
        })
        .collect()
}

/// Naive English singular used for nested resource parameters (`users` -> `user`).
pub fn singularize(word: &str) -> String {
    let word = word.trim_matches('/');
    let word = word.rsplit('/').next().unwrap_or(word);
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    for suffix in ["sses", "shes", "ches", "xes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    match word.strip_suffix('s') {
        Some(stem) if !word.ends_with("ss") && !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}

/// Conventional controller class for a resource name (`blog_posts` -> `BlogPostsController`).
pub fn controller_for(name: &str) -> String {
    let camel: String = name
        .rsplit('/')
        .next()
        .unwrap_or(name)
        .split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();
    format!("{}Controller", camel)
}

/// Member path prefix for children nested under `parent` (`users` -> `/users/{user_id}`).
pub fn nested_prefix(parent: &str) -> String {
    format!("/{}/{{{}_id}}", parent.trim_matches('/'), singularize(parent))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn triples(routes: &[RouteFact]) -> Vec<(HttpMethod, String, String)> {
        routes
            .iter()
            .map(|r| (r.method, r.path.clone(), r.handler.clone()))
            .collect()
    }

    #[test]
    fn test_rails_resources() {
        let fact = ResourceFact::new("users", "UsersController", ResourceStyle::Rails, 3);
        let routes = expand_resource(&fact);
        assert_eq!(routes.len(), 8);
        assert!(triples(&routes).contains(&(HttpMethod::Get, "/users/{id}".to_string(), "show".to_string())));
        assert!(triples(&routes).contains(&(HttpMethod::Get, "/users/new".to_string(), "new".to_string())));
        assert!(routes.iter().all(|r| r.owner.as_deref() == Some("UsersController")));
        assert!(routes.iter().all(|r| r.line == 3));
    }

    #[test]
    fn test_rails_api_only() {
        let mut fact = ResourceFact::new("users", "UsersController", ResourceStyle::Rails, 1);
        fact.is_api = true;
        let routes = expand_resource(&fact);
        assert_eq!(routes.len(), 6);
        assert!(!routes.iter().any(|r| r.handler == "new" || r.handler == "edit"));
    }

    #[test]
    fn test_laravel_resource() {
        let fact = ResourceFact::new("posts", "PostController", ResourceStyle::Laravel, 1);
        let routes = expand_resource(&fact);
        assert_eq!(routes.len(), 8);
        assert_eq!(
            triples(&routes)[1],
            (HttpMethod::Get, "/posts/create".to_string(), "create".to_string())
        );
    }

    #[test]
    fn test_laravel_api_resource() {
        let mut fact = ResourceFact::new("users", "UserController", ResourceStyle::Laravel, 1);
        fact.is_api = true;
        let routes = expand_resource(&fact);
        assert_eq!(
            triples(&routes),
            vec![
                (HttpMethod::Get, "/users".to_string(), "index".to_string()),
                (HttpMethod::Post, "/users".to_string(), "store".to_string()),
                (HttpMethod::Get, "/users/{id}".to_string(), "show".to_string()),
                (HttpMethod::Put, "/users/{id}".to_string(), "update".to_string()),
                (HttpMethod::Patch, "/users/{id}".to_string(), "update".to_string()),
                (HttpMethod::Delete, "/users/{id}".to_string(), "destroy".to_string()),
            ]
        );
    }

    #[test]
    fn test_only_wins_over_except() {
        let mut fact = ResourceFact::new("photos", "PhotosController", ResourceStyle::Rails, 1);
        fact.only = vec!["index".to_string(), "show".to_string()];
        fact.except = vec!["index".to_string()];
        let names: Vec<_> = expand_resource(&fact).into_iter().map(|r| r.handler).collect();
        assert_eq!(names, vec!["index", "show"]);

        fact.only.clear();
        let routes = expand_resource(&fact);
        assert_eq!(routes.len(), 7);
        assert!(!routes.iter().any(|r| r.handler == "index"));
    }

    #[test]
    fn test_phoenix_and_singular() {
        let fact = ResourceFact::new("/users", "UserController", ResourceStyle::Phoenix, 1);
        let routes = expand_resource(&fact);
        assert_eq!(routes.len(), 8);
        assert!(routes.iter().any(|r| r.handler == "delete" && r.method == HttpMethod::Delete));

        let mut fact = ResourceFact::new("profile", "ProfilesController", ResourceStyle::Rails, 1);
        fact.singular = true;
        let routes = expand_resource(&fact);
        assert_eq!(routes.len(), 7);
        assert!(routes.iter().all(|r| !r.path.contains("{id}")));
    }

    #[test]
    fn test_naming_helpers() {
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("address"), "address");
        assert_eq!(controller_for("blog_posts"), "BlogPostsController");
        assert_eq!(nested_prefix("users"), "/users/{user_id}");
    }
}
