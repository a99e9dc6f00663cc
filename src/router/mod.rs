use std::{collections::HashMap, sync::Arc};

use percent_encoding::percent_decode_str;
use strum::{EnumCount, IntoEnumIterator};
use tracing::debug;

use crate::{
    error::{RouteError, UrlError},
    handler::BoxedHandler,
    http_method::HttpMethod,
};

pub use params::Params;
pub use pattern::{Pattern, Segment};
pub use route::Route;
pub use trie::Trie;

mod params;
mod pattern;
mod route;
mod trie;

/// Prefix and middleware of the enclosing groups, restored on exit.
pub(crate) struct GroupScope {
    prefix: String,
    handlers: Vec<BoxedHandler>,
}

/// One trie per method plus the registration-time state that shapes new
/// routes: group prefix and middleware, auto-HEAD and trailing-slash policy.
#[derive(Default)]
pub struct Router {
    tries: [Trie; HttpMethod::COUNT],
    names: HashMap<String, Arc<Route>>,
    prefix: String,
    group_handlers: Vec<BoxedHandler>,
    pub(crate) auto_head: bool,
    pub(crate) auto_trailing_slash: bool,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn methods() -> impl Iterator<Item = HttpMethod> {
        HttpMethod::iter()
    }

    fn full_pattern(&self, pattern: &str) -> Result<Pattern, RouteError> {
        Pattern::parse(format!("{}{}", self.prefix, pattern))
    }

    /// Registers `handlers` for `method` under the current group prefix, with
    /// the group middleware in front.
    pub fn handle(
        &mut self,
        method: HttpMethod,
        pattern: &str,
        handlers: Vec<BoxedHandler>,
    ) -> Result<Arc<Route>, RouteError> {
        let route = self.build(method, pattern, handlers)?;
        debug!(%method, pattern = %route.pattern(), handlers = route.handlers().len(), "route");
        self.tries[method as usize].insert(route)
    }

    /// Like `handle`, and registers the same pattern and chain under `also`.
    /// Both tries are checked first, so either both routes are added or
    /// neither is.
    pub(crate) fn handle_also(
        &mut self,
        method: HttpMethod,
        also: HttpMethod,
        pattern: &str,
        handlers: Vec<BoxedHandler>,
    ) -> Result<Arc<Route>, RouteError> {
        let route = self.build(method, pattern, handlers)?;
        let mirrored = Route::new(also, route.pattern().clone(), route.handlers().to_vec());
        self.tries[method as usize].check(&route)?;
        self.tries[also as usize].check(&mirrored)?;

        debug!(%method, %also, pattern = %route.pattern(), handlers = route.handlers().len(), "route");
        self.tries[also as usize].insert(mirrored)?;
        self.tries[method as usize].insert(route)
    }

    fn build(&self, method: HttpMethod, pattern: &str, handlers: Vec<BoxedHandler>) -> Result<Route, RouteError> {
        let pattern = self.full_pattern(pattern)?;
        if handlers.is_empty() {
            return Err(RouteError::EmptyChain {
                method,
                pattern: pattern.to_string(),
            });
        }

        let mut chain = Vec::with_capacity(self.group_handlers.len() + handlers.len());
        chain.extend(self.group_handlers.iter().cloned());
        chain.extend(handlers);
        Ok(Route::new(method, pattern, chain))
    }

    /// Whether `pattern`, taken relative to the current group, is registered
    /// for `method`.
    pub fn contains(&self, method: HttpMethod, pattern: &str) -> bool {
        match self.full_pattern(pattern) {
            Ok(pattern) => self.tries[method as usize].contains(&pattern),
            Err(_) => false,
        }
    }

    pub(crate) fn enter_group(&mut self, prefix: &str, handlers: Vec<BoxedHandler>) -> GroupScope {
        let outer = GroupScope {
            prefix: self.prefix.clone(),
            handlers: self.group_handlers.clone(),
        };
        self.prefix.push_str(prefix);
        self.group_handlers.extend(handlers);
        outer
    }

    pub(crate) fn leave_group(&mut self, outer: GroupScope) {
        self.prefix = outer.prefix;
        self.group_handlers = outer.handlers;
    }

    pub fn name(&mut self, route: &Arc<Route>, name: &str) -> Result<(), RouteError> {
        if name.is_empty() {
            return Err(RouteError::EmptyArgument("route name"));
        }
        if self.names.contains_key(name) {
            return Err(RouteError::DuplicateName(name.to_owned()));
        }
        // A route named twice keeps its first name, the alias still resolves.
        route.set_name(name);
        self.names.insert(name.to_owned(), Arc::clone(route));
        Ok(())
    }

    pub fn url_for(&self, name: &str, args: &[&str]) -> Result<String, UrlError> {
        let route = self
            .names
            .get(name)
            .ok_or_else(|| UrlError::UnknownRoute(name.to_owned()))?;
        route.pattern().build(name, args)
    }

    /// Resolves a request. Methods without a trie never match, and a miss
    /// leaves `params` empty. The method is matched exactly, `get` is not GET.
    ///
    /// The path is percent-decoded once before matching, so bound values are
    /// decoded. A decoded `%2F` separates segments like a literal slash.
    ///
    /// With the trailing-slash policy on, a miss is retried once with the
    /// trailing slash toggled. The exact lookup always goes first, so a
    /// wildcard that captures the slash wins over the retry.
    pub fn resolve(&self, method: &str, path: &str, params: &mut Params) -> Option<Arc<Route>> {
        let method = method.parse::<HttpMethod>().ok()?;
        let trie = &self.tries[method as usize];
        let path = percent_decode_str(path).decode_utf8_lossy();
        let path: &str = &path;

        if let Some(route) = trie.resolve(path, params) {
            return Some(Arc::clone(route));
        }
        if !self.auto_trailing_slash || path == "/" {
            return None;
        }

        let route = match path.strip_suffix('/') {
            Some(trimmed) => trie.resolve(trimmed, params),
            None => trie.resolve(&format!("{}/", path), params),
        };
        route.map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        self.tries.iter().map(Trie::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::{RouteError, UrlError},
        handler::{self, BoxedHandler},
        http_method::HttpMethod,
        test_utils::noop,
    };

    use super::{Params, Router};

    fn h() -> Vec<BoxedHandler> {
        vec![handler::boxed(noop)]
    }

    fn resolve(router: &Router, method: &str, path: &str) -> Option<String> {
        let mut params = Params::new();
        router
            .resolve(method, path, &mut params)
            .map(|r| r.pattern().to_string())
    }

    #[test]
    fn test_methods_are_separate() {
        let mut router = Router::new();
        router.handle(HttpMethod::Post, "/todos", h()).unwrap();
        assert_eq!(resolve(&router, "POST", "/todos").as_deref(), Some("/todos"));
        assert_eq!(resolve(&router, "GET", "/todos"), None);
        assert_eq!(resolve(&router, "BREW", "/todos"), None);
    }

    #[test]
    fn test_empty_chain() {
        let mut router = Router::new();
        let err = router.handle(HttpMethod::Get, "/x", vec![]).unwrap_err();
        assert!(matches!(err, RouteError::EmptyChain { .. }));
        assert!(router.is_empty());
    }

    #[test]
    fn test_group_scope_is_restored() {
        let mut router = Router::new();
        let outer = router.enter_group("/api", h());
        let inner = router.enter_group("/v1", h());
        let route = router.handle(HttpMethod::Get, "/ping", h()).unwrap();
        router.leave_group(inner);
        let sibling = router.handle(HttpMethod::Get, "/health", h()).unwrap();
        router.leave_group(outer);
        let root = router.handle(HttpMethod::Get, "/", h()).unwrap();

        assert_eq!(route.pattern().as_str(), "/api/v1/ping");
        assert_eq!(route.handlers().len(), 3);
        assert_eq!(sibling.pattern().as_str(), "/api/health");
        assert_eq!(sibling.handlers().len(), 2);
        assert_eq!(root.pattern().as_str(), "/");
        assert_eq!(root.handlers().len(), 1);
    }

    #[test]
    fn test_url_for() {
        let mut router = Router::new();
        let post = router.handle(HttpMethod::Get, "/posts/:id", h()).unwrap();
        router.name(&post, "post").unwrap();
        let file = router.handle(HttpMethod::Get, "/files/*path", h()).unwrap();
        router.name(&file, "file").unwrap();

        assert_eq!(router.url_for("post", &["42"]).unwrap(), "/posts/42");
        assert_eq!(router.url_for("file", &["a/b.txt"]).unwrap(), "/files/a/b.txt");
        assert_eq!(
            router.url_for("post", &[]),
            Err(UrlError::ArgCount {
                name: "post".into(),
                expected: 1,
                got: 0
            })
        );
        assert_eq!(
            router.url_for("nope", &[]),
            Err(UrlError::UnknownRoute("nope".into()))
        );
        assert_eq!(post.name(), Some("post"));
    }

    #[test]
    fn test_duplicate_name() {
        let mut router = Router::new();
        let a = router.handle(HttpMethod::Get, "/a", h()).unwrap();
        let b = router.handle(HttpMethod::Get, "/b", h()).unwrap();
        router.name(&a, "page").unwrap();
        assert_eq!(
            router.name(&b, "page"),
            Err(RouteError::DuplicateName("page".into()))
        );
        assert_eq!(b.name(), None);
    }

    #[test]
    fn test_trailing_slash_policy() {
        let mut router = Router::new();
        router.handle(HttpMethod::Get, "/users", h()).unwrap();
        router.handle(HttpMethod::Get, "/teams/", h()).unwrap();

        assert_eq!(resolve(&router, "GET", "/users/"), None);
        assert_eq!(resolve(&router, "GET", "/teams"), None);

        router.auto_trailing_slash = true;
        assert_eq!(resolve(&router, "GET", "/users/").as_deref(), Some("/users"));
        assert_eq!(resolve(&router, "GET", "/teams").as_deref(), Some("/teams/"));
        assert_eq!(resolve(&router, "GET", "/nobody/"), None);
    }

    #[test]
    fn test_trailing_slash_keeps_exact_wildcard_match() {
        let mut router = Router::new();
        router.auto_trailing_slash = true;
        router.handle(HttpMethod::Get, "/files/:name", h()).unwrap();
        router.handle(HttpMethod::Get, "/files/*rest", h()).unwrap();

        // The wildcard matches "/files/a/" exactly, so no slash-trimmed retry
        // hands it to "/files/:name".
        let mut params = Params::new();
        let route = router.resolve("GET", "/files/a/", &mut params).unwrap();
        assert_eq!(route.pattern().as_str(), "/files/*rest");
        assert_eq!(params.get("rest"), Some("a/"));
    }

    #[test]
    fn test_method_is_exact() {
        let mut router = Router::new();
        router.handle(HttpMethod::Get, "/x", h()).unwrap();
        assert_eq!(resolve(&router, "GET", "/x").as_deref(), Some("/x"));
        assert_eq!(resolve(&router, "get", "/x"), None);
        assert_eq!(resolve(&router, " GET", "/x"), None);
    }

    #[test]
    fn test_bound_values_are_decoded() {
        let mut router = Router::new();
        router.handle(HttpMethod::Get, "/users/:name", h()).unwrap();
        router.handle(HttpMethod::Get, "/files/*path", h()).unwrap();
        router.handle(HttpMethod::Get, "/caf\u{e9}", h()).unwrap();

        let mut params = Params::new();
        router.resolve("GET", "/users/john%20doe", &mut params).unwrap();
        assert_eq!(params.get("name"), Some("john doe"));

        params.clear();
        router.resolve("GET", "/files/a%2Fb%20c.txt", &mut params).unwrap();
        assert_eq!(params.get("path"), Some("a/b c.txt"));

        // %2F splits segments, so it cannot hide inside a single param.
        params.clear();
        let route = router.resolve("GET", "/users/a%2Fb", &mut params);
        assert!(route.is_none());
        assert!(params.is_empty());

        assert_eq!(resolve(&router, "GET", "/caf%C3%A9").as_deref(), Some("/caf\u{e9}"));
        assert_eq!(resolve(&router, "GET", "/users/100%").as_deref(), Some("/users/:name"));
    }

    #[test]
    fn test_handle_also_is_all_or_nothing() {
        let mut router = Router::new();
        router.handle(HttpMethod::Head, "/x/:name", h()).unwrap();

        let err = router
            .handle_also(HttpMethod::Get, HttpMethod::Head, "/x/:id", h())
            .unwrap_err();
        assert!(matches!(err, RouteError::ParamConflict { method: HttpMethod::Head, .. }));
        assert!(!router.contains(HttpMethod::Get, "/x/:id"));
        assert_eq!(router.len(), 1);

        let route = router
            .handle_also(HttpMethod::Get, HttpMethod::Head, "/y", h())
            .unwrap();
        assert_eq!(route.method(), HttpMethod::Get);
        assert!(router.contains(HttpMethod::Head, "/y"));
        assert_eq!(router.len(), 3);
    }

    #[test]
    fn test_contains_respects_group_prefix() {
        let mut router = Router::new();
        let outer = router.enter_group("/api", vec![]);
        router.handle(HttpMethod::Get, "/ping", h()).unwrap();
        assert!(router.contains(HttpMethod::Get, "/ping"));
        router.leave_group(outer);
        assert!(router.contains(HttpMethod::Get, "/api/ping"));
        assert!(!router.contains(HttpMethod::Head, "/api/ping"));
    }
}
