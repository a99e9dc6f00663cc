use thiserror::Error;

use crate::http_method::HttpMethod;

/// Registration-time failures. Callers treat these as fatal at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: &'static str,
    },
    #[error("{method} {pattern} is already registered")]
    Duplicate { method: HttpMethod, pattern: String },
    #[error("{method} {pattern}: parameter :{name} conflicts with :{existing} at the same position")]
    ParamConflict {
        method: HttpMethod,
        pattern: String,
        name: String,
        existing: String,
    },
    #[error("{method} {pattern}: wildcard conflicts with a sibling route at the same position")]
    WildcardConflict { method: HttpMethod, pattern: String },
    #[error("{method} {pattern}: no handlers")]
    EmptyChain { method: HttpMethod, pattern: String },
    #[error("route name {0:?} is already taken")]
    DuplicateName(String),
    #[error("unknown http method {0:?}")]
    UnknownMethod(String),
    #[error("{0} can not be empty")]
    EmptyArgument(&'static str),
}

/// Reverse URL generation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrlError {
    #[error("no route named {0:?}")]
    UnknownRoute(String),
    #[error("route {name:?} takes {expected} argument(s), got {got}")]
    ArgCount {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("route {name:?}: argument for :{param} is empty")]
    EmptyArg { name: String, param: String },
}

/// Misuse of the DI registry. These point at programming errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiError {
    #[error("nothing registered under {0:?}")]
    Missing(String),
    #[error("{name:?} is not a {expected}")]
    WrongType {
        name: String,
        expected: &'static str,
    },
}
