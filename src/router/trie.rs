use std::{collections::HashMap, sync::Arc};

use crate::error::RouteError;

use super::{
    params::Params,
    pattern::{Pattern, Segment},
    route::Route,
};

#[derive(Default)]
struct Node {
    statics: HashMap<String, Node>,
    param: Option<(String, Box<Node>)>,
    wildcard: Option<(String, Arc<Route>)>,
    route: Option<Arc<Route>>,
}

/// Routing tree for one HTTP method, keyed by path segment.
///
/// Per segment, a static child is tried first, then the named parameter,
/// then the wildcard. A subtree that fails to match further down falls back
/// to the next candidate at the same depth.
#[derive(Default)]
pub struct Trie {
    root: Node,
    len: usize,
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Adds `route` under its pattern. Nothing is modified when an error is
    /// returned.
    pub fn insert(&mut self, route: Route) -> Result<Arc<Route>, RouteError> {
        self.check(&route)?;

        let route = Arc::new(route);
        let mut node = &mut self.root;
        for segment in route.pattern().segments() {
            node = match segment {
                Segment::Static(s) => node.statics.entry(s.clone()).or_default(),
                Segment::Param(name) => node
                    .param
                    .get_or_insert_with(|| (name.clone(), Box::default()))
                    .1
                    .as_mut(),
                Segment::Wildcard(name) => {
                    node.wildcard = Some((name.clone(), Arc::clone(&route)));
                    self.len += 1;
                    return Ok(route);
                }
            };
        }
        node.route = Some(Arc::clone(&route));
        self.len += 1;
        Ok(route)
    }

    /// Fails the way `insert` would, without inserting.
    pub(crate) fn check(&self, route: &Route) -> Result<(), RouteError> {
        let method = route.method();
        let pattern = route.pattern();
        let duplicate = || RouteError::Duplicate {
            method,
            pattern: pattern.to_string(),
        };
        let wildcard_conflict = || RouteError::WildcardConflict {
            method,
            pattern: pattern.to_string(),
        };

        let mut node = &self.root;
        for segment in pattern.segments() {
            node = match segment {
                Segment::Static(s) => {
                    if node.wildcard.is_some() {
                        return Err(wildcard_conflict());
                    }
                    match node.statics.get(s) {
                        Some(child) => child,
                        None => return Ok(()),
                    }
                }
                Segment::Param(name) => match &node.param {
                    Some((existing, _)) if existing != name => {
                        return Err(RouteError::ParamConflict {
                            method,
                            pattern: pattern.to_string(),
                            name: name.clone(),
                            existing: existing.clone(),
                        })
                    }
                    Some((_, child)) => &**child,
                    None => return Ok(()),
                },
                Segment::Wildcard(name) => {
                    if !node.statics.is_empty() {
                        return Err(wildcard_conflict());
                    }
                    return match &node.wildcard {
                        Some((existing, _)) if existing != name => Err(wildcard_conflict()),
                        Some(_) => Err(duplicate()),
                        None => Ok(()),
                    };
                }
            };
        }

        if node.route.is_some() {
            return Err(duplicate());
        }
        Ok(())
    }

    /// Whether a route with exactly this pattern is registered.
    pub fn contains(&self, pattern: &Pattern) -> bool {
        let mut node = &self.root;
        for segment in pattern.segments() {
            let next = match segment {
                Segment::Static(s) => node.statics.get(s),
                Segment::Param(name) => match &node.param {
                    Some((existing, child)) if existing == name => Some(&**child),
                    _ => None,
                },
                Segment::Wildcard(name) => {
                    return matches!(&node.wildcard, Some((existing, _)) if existing == name)
                }
            };
            match next {
                Some(next) => node = next,
                None => return false,
            }
        }
        node.route.is_some()
    }

    /// Resolves `path` (no query string) to a route, binding parameters into
    /// `params`. On a miss `params` is left as it was.
    pub fn resolve(&self, path: &str, params: &mut Params) -> Option<&Arc<Route>> {
        let rest = path.strip_prefix('/')?;
        let rest = if rest.is_empty() { None } else { Some(rest) };
        let mark = params.len();
        let found = self.root.find(rest, params);
        if found.is_none() {
            params.truncate(mark);
        }
        found
    }
}

impl Node {
    fn find(&self, rest: Option<&str>, params: &mut Params) -> Option<&Arc<Route>> {
        let Some(rest) = rest else {
            if let Some(route) = &self.route {
                return Some(route);
            }
            // A trailing wildcard also matches zero remaining segments.
            return self.wildcard.as_ref().map(|(name, route)| {
                params.push(name, "");
                route
            });
        };

        let (segment, tail) = match rest.split_once('/') {
            Some((segment, tail)) => (segment, Some(tail)),
            None => (rest, None),
        };

        if let Some(child) = self.statics.get(segment) {
            if let Some(route) = child.find(tail, params) {
                return Some(route);
            }
        }

        if !segment.is_empty() {
            if let Some((name, child)) = &self.param {
                let mark = params.len();
                params.push(name, segment);
                if let Some(route) = child.find(tail, params) {
                    return Some(route);
                }
                params.truncate(mark);
            }
        }

        self.wildcard.as_ref().map(|(name, route)| {
            params.push(name, rest);
            route
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        error::RouteError,
        handler::{self, BoxedHandler},
        http_method::HttpMethod,
        router::{params::Params, pattern::Pattern, route::Route},
        test_utils::noop,
    };

    use super::Trie;

    fn route(pattern: &str) -> Route {
        let handlers: Vec<BoxedHandler> = vec![handler::boxed(noop)];
        Route::new(HttpMethod::Get, Pattern::parse(pattern).unwrap(), handlers)
    }

    fn trie(patterns: &[&str]) -> Trie {
        let mut trie = Trie::new();
        for pattern in patterns {
            trie.insert(route(pattern)).unwrap();
        }
        trie
    }

    fn resolve<'t>(trie: &'t Trie, path: &str) -> Option<(&'t str, Vec<(String, String)>)> {
        let mut params = Params::new();
        let route = trie.resolve(path, &mut params)?;
        let bound = params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((route.pattern().as_str(), bound))
    }

    fn bound(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_static() {
        let patterns = ["/", "/users", "/users/", "/users/list", "/a/b/c"];
        let trie = trie(&patterns);
        for pattern in patterns {
            assert_eq!(resolve(&trie, pattern), Some((pattern, vec![])));
        }
        assert_eq!(trie.len(), patterns.len());
    }

    #[test]
    fn test_param_binding() {
        let trie = trie(&["/users/:id", "/users/:id/posts/:post"]);
        assert_eq!(
            resolve(&trie, "/users/42"),
            Some(("/users/:id", bound(&[("id", "42")])))
        );
        assert_eq!(
            resolve(&trie, "/users/7/posts/hello"),
            Some(("/users/:id/posts/:post", bound(&[("id", "7"), ("post", "hello")])))
        );
        // Parameters never match an empty segment.
        assert_eq!(resolve(&trie, "/users/"), None);
        assert_eq!(resolve(&trie, "/users//posts/x"), None);
    }

    #[test]
    fn test_wildcard_binds_suffix() {
        let trie = trie(&["/files/*path"]);
        let tests = [
            ("/files", ""),
            ("/files/", ""),
            ("/files/a", "a"),
            ("/files/a/b/c.txt", "a/b/c.txt"),
            ("/files/a/", "a/"),
        ];
        for (path, want) in tests {
            assert_eq!(
                resolve(&trie, path),
                Some(("/files/*path", bound(&[("path", want)]))),
                "{}",
                path
            );
        }
        assert_eq!(resolve(&trie, "/other"), None);
    }

    #[test]
    fn test_static_precedence() {
        let trie = trie(&["/users/:id", "/users/new"]);
        assert_eq!(resolve(&trie, "/users/new"), Some(("/users/new", vec![])));
        assert_eq!(
            resolve(&trie, "/users/old"),
            Some(("/users/:id", bound(&[("id", "old")])))
        );
    }

    #[test]
    fn test_param_precedence_over_wildcard() {
        let trie = trie(&["/docs/:page", "/docs/*rest"]);
        assert_eq!(
            resolve(&trie, "/docs/intro"),
            Some(("/docs/:page", bound(&[("page", "intro")])))
        );
        assert_eq!(
            resolve(&trie, "/docs/2024/01"),
            Some(("/docs/*rest", bound(&[("rest", "2024/01")])))
        );
    }

    #[test]
    fn test_backtracking() {
        let users = trie(&["/users/new", "/users/:id/edit"]);
        // The static "new" subtree has no "edit" child, so the param branch wins.
        assert_eq!(
            resolve(&users, "/users/new/edit"),
            Some(("/users/:id/edit", bound(&[("id", "new")])))
        );

        // The param branch fails below, its binding is dropped before the
        // wildcard takes the whole suffix.
        let versions = trie(&["/v/:id/edit", "/v/*rest"]);
        assert_eq!(
            resolve(&versions, "/v/9/delete"),
            Some(("/v/*rest", bound(&[("rest", "9/delete")])))
        );
    }

    #[test]
    fn test_miss_leaves_params_untouched() {
        let trie = trie(&["/users/:id/posts"]);
        let mut params = Params::new();
        assert!(trie.resolve("/users/1/comments", &mut params).is_none());
        assert!(params.is_empty());
        assert!(trie.resolve("no-leading-slash", &mut params).is_none());
    }

    #[test]
    fn test_terminal_route_beats_empty_wildcard() {
        let trie = trie(&["/files", "/files/*path"]);
        assert_eq!(resolve(&trie, "/files"), Some(("/files", vec![])));
        assert_eq!(
            resolve(&trie, "/files/x"),
            Some(("/files/*path", bound(&[("path", "x")])))
        );
    }

    #[test]
    fn test_duplicate() {
        let mut trie = trie(&["/a/:id", "/b/*rest", "/"]);
        for pattern in ["/a/:id", "/b/*rest", "/"] {
            let err = trie.insert(route(pattern)).unwrap_err();
            assert!(matches!(err, RouteError::Duplicate { .. }), "{}", pattern);
        }
    }

    #[test]
    fn test_param_conflict() {
        let mut trie = trie(&["/users/:id"]);
        let err = trie.insert(route("/users/:name/posts")).unwrap_err();
        assert_eq!(
            err,
            RouteError::ParamConflict {
                method: HttpMethod::Get,
                pattern: "/users/:name/posts".into(),
                name: "name".into(),
                existing: "id".into(),
            }
        );
        trie.insert(route("/users/:id/posts")).unwrap();
    }

    #[test]
    fn test_wildcard_conflict() {
        let mut statics_first = trie(&["/static/app.js"]);
        let err = statics_first.insert(route("/static/*file")).unwrap_err();
        assert!(matches!(err, RouteError::WildcardConflict { .. }));

        let mut wildcard_first = trie(&["/assets/*path"]);
        let err = wildcard_first.insert(route("/assets/logo.png")).unwrap_err();
        assert!(matches!(err, RouteError::WildcardConflict { .. }));
        let err = wildcard_first.insert(route("/assets/*other")).unwrap_err();
        assert!(matches!(err, RouteError::WildcardConflict { .. }));

        // A param sibling is fine, it has its own precedence.
        wildcard_first.insert(route("/assets/:id")).unwrap();
    }

    #[test]
    fn test_failed_insert_keeps_len() {
        let mut trie = trie(&["/a/:id"]);
        trie.insert(route("/a/:other/x")).unwrap_err();
        trie.insert(route("/a/:id")).unwrap_err();
        assert_eq!(trie.len(), 1);
        trie.insert(route("/a/:id/x")).unwrap();
        assert_eq!(trie.len(), 2);
    }

    #[test]
    fn test_contains() {
        let trie = trie(&["/users/:id", "/files/*path", "/about/"]);
        let contains = |p: &str| trie.contains(&Pattern::parse(p).unwrap());
        assert!(contains("/users/:id"));
        assert!(contains("/files/*path"));
        assert!(contains("/about/"));
        assert!(!contains("/about"));
        assert!(!contains("/users/:name"));
        assert!(!contains("/users"));
    }

    #[test]
    fn test_routes_are_shared() {
        let mut trie = Trie::new();
        let inserted = trie.insert(route("/x")).unwrap();
        let mut params = Params::new();
        let resolved = trie.resolve("/x", &mut params).unwrap();
        assert!(Arc::ptr_eq(&inserted, resolved));
    }
}
