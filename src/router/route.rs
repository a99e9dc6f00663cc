use std::{fmt, sync::OnceLock};

use crate::{handler::BoxedHandler, http_method::HttpMethod};

use super::pattern::Pattern;

/// A registered route. Immutable once registered, except that it can be
/// named once.
pub struct Route {
    method: HttpMethod,
    pattern: Pattern,
    handlers: Vec<BoxedHandler>,
    name: OnceLock<String>,
}

impl Route {
    pub(crate) fn new(method: HttpMethod, pattern: Pattern, handlers: Vec<BoxedHandler>) -> Self {
        Self {
            method,
            pattern,
            handlers,
            name: OnceLock::new(),
        }
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn handlers(&self) -> &[BoxedHandler] {
        &self.handlers
    }

    pub fn name(&self) -> Option<&str> {
        self.name.get().map(|n| n.as_str())
    }

    /// Returns false if the route already carries a name.
    pub(crate) fn set_name(&self, name: &str) -> bool {
        self.name.set(name.to_owned()).is_ok()
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.as_str())
            .field("handlers", &self.handlers.len())
            .field("name", &self.name())
            .finish()
    }
}
